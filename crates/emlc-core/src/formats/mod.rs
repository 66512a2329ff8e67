// SPDX-License-Identifier: AGPL-3.0-or-later
//! Format handlers for each supported syntax family

pub mod eml;
pub mod markup;

pub use eml::EmlHandler;
pub use markup::MarkupHandler;

/// Quote an attribute value, falling back to single quotes when the value
/// holds a double quote
pub(crate) fn quoted(value: &str) -> String {
    if value.contains('"') && !value.contains('\'') {
        format!("'{}'", value)
    } else {
        format!("\"{}\"", value)
    }
}

/// Indentation for a nesting depth
pub(crate) fn pad(indent: &str, depth: usize) -> String {
    indent.repeat(depth)
}
