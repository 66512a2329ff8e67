// SPDX-License-Identifier: AGPL-3.0-or-later
//! EMLC Core - document tree and converters between EML and markup
//!
//! This crate provides:
//! - A document tree shared by every format
//! - Parser and renderer traits for format handlers
//! - An EML handler and one markup handler for HTML, PHP, XML, XAML and FXML
//! - Recoverable anomaly reporting: parsing never rejects input

pub mod anomaly;
pub mod ast;
pub mod formats;
pub mod scan;
pub mod traits;

pub use anomaly::{Anomaly, AnomalyKind, ParseOutcome};
pub use ast::{Attribute, Document, MarkupMode, Node, NodeKind, SourceFormat};
pub use formats::{EmlHandler, MarkupHandler};
pub use traits::{
    convert, ConversionError, EmlcConfig, FormatHandler, FormatRegistry, ParseConfig, Parser,
    ParserExt, RenderConfig, Renderer, RendererExt, Result,
};
