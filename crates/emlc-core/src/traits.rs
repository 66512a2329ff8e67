// SPDX-License-Identifier: AGPL-3.0-or-later
//! Parser and Renderer traits for format handlers

use crate::anomaly::ParseOutcome;
use crate::ast::{Document, MarkupMode, SourceFormat};
use crate::formats::{EmlHandler, MarkupHandler};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::Path;
use tracing::debug;

/// Error type for conversions.
///
/// Parsing itself never fails; these cover the surroundings.
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("No handler for {operation} {format:?}")]
    UnsupportedFormat {
        format: SourceFormat,
        operation: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, ConversionError>;

/// Configuration for parsing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseConfig {
    /// Maximum element nesting; deeper content is flattened
    pub max_depth: usize,
    /// Keep raw source on the document
    pub preserve_raw_source: bool,
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            max_depth: 256,
            preserve_raw_source: false,
        }
    }
}

/// Configuration for rendering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Indentation per nesting level (default: 4 spaces)
    pub indent: String,
    /// Reuse the whitespace recorded before each attribute instead of a single space
    pub preserve_attribute_spacing: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            indent: "    ".to_string(),
            preserve_attribute_spacing: false,
        }
    }
}

/// Contents of an `emlc.toml` file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmlcConfig {
    pub parse: ParseConfig,
    pub render: RenderConfig,
}

impl EmlcConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|e| ConversionError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }
}

/// Parser trait: convert source text to a document tree
pub trait Parser: Send + Sync {
    /// The source format this parser handles
    fn format(&self) -> SourceFormat;

    /// Parse, keeping every recovered anomaly
    fn parse_with_anomalies(&self, input: &str, config: &ParseConfig) -> ParseOutcome;

    /// Parse a string into a Document, logging and dropping anomalies
    fn parse(&self, input: &str, config: &ParseConfig) -> Result<Document> {
        let outcome = self.parse_with_anomalies(input, config);
        for anomaly in &outcome.anomalies {
            debug!(format = self.format().label(), %anomaly, "recovered");
        }
        Ok(outcome.document)
    }
}

/// Renderer trait: convert a document tree to target text
pub trait Renderer: Send + Sync {
    /// The target format this renderer produces
    fn format(&self) -> SourceFormat;

    /// Render a Document to a string
    fn render(&self, doc: &Document, config: &RenderConfig) -> Result<String>;
}

/// Extension trait for I/O (not dyn-compatible)
pub trait ParserExt: Parser {
    /// Parse everything a reader yields
    fn parse_reader<R: Read>(&self, reader: R, config: &ParseConfig) -> Result<Document> {
        let mut input = String::new();
        let mut reader = reader;
        reader.read_to_string(&mut input)?;
        self.parse(&input, config)
    }
}

/// Extension trait for I/O (not dyn-compatible)
pub trait RendererExt: Renderer {
    /// Render into a writer
    fn render_writer<W: Write>(
        &self,
        doc: &Document,
        writer: &mut W,
        config: &RenderConfig,
    ) -> Result<()> {
        let output = self.render(doc, config)?;
        writer.write_all(output.as_bytes())?;
        Ok(())
    }
}

// Blanket implementations
impl<T: Parser + ?Sized> ParserExt for T {}
impl<T: Renderer + ?Sized> RendererExt for T {}

/// Combined parser + renderer for a format
pub trait FormatHandler: Parser + Renderer {
    /// Markup rules used when rendering, `None` for EML
    fn markup_mode(&self) -> Option<MarkupMode>;
}

/// Registry of format handlers
pub struct FormatRegistry {
    handlers: HashMap<SourceFormat, Box<dyn FormatHandler>>,
}

impl FormatRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registry with a handler for every [`SourceFormat`]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(EmlHandler::new()));
        for format in SourceFormat::ALL {
            if format.markup_mode().is_some() {
                registry.register(Box::new(MarkupHandler::new(format)));
            }
        }
        registry
    }

    pub fn register(&mut self, handler: Box<dyn FormatHandler>) {
        let format = Parser::format(handler.as_ref());
        self.handlers.insert(format, handler);
    }

    pub fn get(&self, format: SourceFormat) -> Option<&dyn FormatHandler> {
        self.handlers.get(&format).map(|h| h.as_ref())
    }

    fn handler(&self, format: SourceFormat, operation: &str) -> Result<&dyn FormatHandler> {
        self.get(format)
            .ok_or_else(|| ConversionError::UnsupportedFormat {
                format,
                operation: operation.to_string(),
            })
    }

    /// Parse with the `from` handler and render with the `to` handler.
    ///
    /// Same-format conversions still go through the tree, which normalizes
    /// layout.
    pub fn convert(
        &self,
        input: &str,
        from: SourceFormat,
        to: SourceFormat,
        parse_config: &ParseConfig,
        render_config: &RenderConfig,
    ) -> Result<String> {
        let from_handler = self.handler(from, "parsing")?;
        let to_handler = self.handler(to, "rendering")?;

        let doc = from_handler.parse(input, parse_config)?;
        to_handler.render(&doc, render_config)
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert with default handlers and configuration
pub fn convert(input: &str, from: SourceFormat, to: SourceFormat) -> Result<String> {
    FormatRegistry::with_defaults().convert(
        input,
        from,
        to,
        &ParseConfig::default(),
        &RenderConfig::default(),
    )
}
