// SPDX-License-Identifier: AGPL-3.0-or-later
//! Recoverable structural anomalies
//!
//! Parsers never reject input. Whenever they skip a character, close an
//! element implicitly or run into end of input inside a construct, they record
//! an [`Anomaly`] and carry on. Callers that only want the tree use
//! [`Parser::parse`](crate::traits::Parser::parse), which logs and drops them.

use crate::ast::Document;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    /// Character that cannot start any construct was skipped
    UnexpectedChar,
    /// `/* ...` or `<!-- ...` ran into end of input
    UnterminatedComment,
    /// `<? ...` or `<! ...` ran into end of input
    UnterminatedInstruction,
    /// `{ ...` ran into end of input
    UnterminatedBlock,
    /// `( ...` or a quoted value ran into end of input
    UnterminatedAttributeList,
    /// Opening tag without its closing `>`
    UnterminatedTag,
    /// Element still open at end of input
    UnclosedElement,
    /// Closing tag for an outer element closed inner ones implicitly
    MismatchedClose,
    /// Closing tag with no open element of that name
    StrayClose,
    /// Nesting limit reached
    DepthLimit,
}

/// An anomaly and the byte offset where it was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Anomaly {
    pub offset: usize,
    pub kind: AnomalyKind,
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self.kind {
            AnomalyKind::UnexpectedChar => "skipped unexpected character",
            AnomalyKind::UnterminatedComment => "unterminated comment",
            AnomalyKind::UnterminatedInstruction => "unterminated processing instruction",
            AnomalyKind::UnterminatedBlock => "unterminated content block",
            AnomalyKind::UnterminatedAttributeList => "unterminated attribute list",
            AnomalyKind::UnterminatedTag => "unterminated tag",
            AnomalyKind::UnclosedElement => "element left open",
            AnomalyKind::MismatchedClose => "mismatched closing tag",
            AnomalyKind::StrayClose => "stray closing tag",
            AnomalyKind::DepthLimit => "nesting limit reached",
        };
        write!(f, "{} at byte {}", what, self.offset)
    }
}

/// A parsed document together with everything recovered on the way
#[derive(Debug, Clone)]
pub struct ParseOutcome {
    pub document: Document,
    pub anomalies: Vec<Anomaly>,
}

impl ParseOutcome {
    pub fn is_clean(&self) -> bool {
        self.anomalies.is_empty()
    }

    pub fn has(&self, kind: AnomalyKind) -> bool {
        self.anomalies.iter().any(|a| a.kind == kind)
    }
}
