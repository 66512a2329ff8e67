// SPDX-License-Identifier: AGPL-3.0-or-later
//! Shared document tree for EML and markup conversion
//!
//! Both front-end parsers produce this tree and both renderers consume it.
//! The tree is a strict ownership hierarchy rooted in a synthetic `ROOT`
//! element that is never rendered with tags.

use crate::traits::{ConversionError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Source or target format of a conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Eml,
    Html,
    Php,
    Xml,
    Xaml,
    Fxml,
}

impl SourceFormat {
    /// File extension for this format
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Eml => "eml",
            Self::Html => "html",
            Self::Php => "php",
            Self::Xml => "xml",
            Self::Xaml => "xaml",
            Self::Fxml => "fxml",
        }
    }

    /// Short display name
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Eml => "EML",
            Self::Html => "HTML",
            Self::Php => "PHP",
            Self::Xml => "XML",
            Self::Xaml => "XAML",
            Self::Fxml => "FXML",
        }
    }

    /// Markup rendering mode, `None` for EML
    pub const fn markup_mode(&self) -> Option<MarkupMode> {
        match self {
            Self::Eml => None,
            Self::Xml | Self::Xaml | Self::Fxml => Some(MarkupMode::Strict),
            Self::Html | Self::Php => Some(MarkupMode::Loose),
        }
    }

    /// Pick a format from a file path.
    ///
    /// Matching is a plain case-sensitive suffix test. Anything that is not
    /// `.eml`, `.php`, `.xml`, `.xaml` or `.fxml` is treated as HTML.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_string_lossy();
        Self::ALL
            .into_iter()
            .find(|format| path.ends_with(&format!(".{}", format.extension())))
            .unwrap_or(Self::Html)
    }

    /// All formats
    pub const ALL: [Self; 6] = [
        Self::Eml,
        Self::Html,
        Self::Php,
        Self::Xml,
        Self::Xaml,
        Self::Fxml,
    ];
}

/// Markup family rendering rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkupMode {
    /// XML family: childless elements self-close unless written as an explicit empty pair
    Strict,
    /// HTML family: only void elements go without a closing tag
    Loose,
}

/// Element attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub key: String,
    /// Empty for a valueless attribute
    pub value: String,
    /// Source text between the previous attribute (or the opening delimiter)
    /// and this key, empty when not parsed from source
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub separator: String,
}

impl Attribute {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            separator: String::new(),
        }
    }
}

/// Kind tag of a [`Node`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Element,
    Text,
    Comment,
    CommentBlock,
    ProcessingInstruction,
    Import,
    Declaration,
    Whitespace,
}

/// A node of the document tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    Element {
        tag: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        attrs: Vec<Attribute>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        children: Vec<Node>,
        /// Source wrote an empty content block (`tag {}` or `<tag></tag>`)
        #[serde(default)]
        explicit_empty: bool,
    },

    Text { payload: String },

    /// Line comment
    Comment { payload: String },

    /// Block comment, payload kept untrimmed
    CommentBlock { payload: String },

    /// `<?tag payload?>`; the `php` tag marks a raw code block
    ProcessingInstruction { tag: String, payload: String },

    Import { payload: String },

    /// `<!payload>` such as a doctype or CDATA section
    Declaration { payload: String },

    /// Run of two or more line breaks between siblings
    Whitespace { line_count: usize },
}

impl Node {
    /// Tag name of raw code processing instructions
    pub const RAW_CODE_TAG: &'static str = "php";

    pub fn element(tag: impl Into<String>) -> Self {
        Node::Element {
            tag: tag.into(),
            attrs: Vec::new(),
            children: Vec::new(),
            explicit_empty: false,
        }
    }

    pub fn text(payload: impl Into<String>) -> Self {
        Node::Text {
            payload: payload.into(),
        }
    }

    pub fn comment(payload: impl Into<String>) -> Self {
        Node::Comment {
            payload: payload.into(),
        }
    }

    pub fn comment_block(payload: impl Into<String>) -> Self {
        Node::CommentBlock {
            payload: payload.into(),
        }
    }

    pub fn instruction(tag: impl Into<String>, payload: impl Into<String>) -> Self {
        Node::ProcessingInstruction {
            tag: tag.into(),
            payload: payload.into(),
        }
    }

    /// Raw code block (`php { ... }` / `<?php ... ?>`)
    pub fn raw_code(payload: impl Into<String>) -> Self {
        Self::instruction(Self::RAW_CODE_TAG, payload)
    }

    pub fn import(payload: impl Into<String>) -> Self {
        Node::Import {
            payload: payload.into(),
        }
    }

    pub fn declaration(payload: impl Into<String>) -> Self {
        Node::Declaration {
            payload: payload.into(),
        }
    }

    pub fn whitespace(line_count: usize) -> Self {
        Node::Whitespace { line_count }
    }

    /// Builder: append an attribute to an element
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        if let Node::Element { attrs, .. } = &mut self {
            attrs.push(Attribute::new(key, value));
        }
        self
    }

    /// Builder: append a child to an element
    pub fn with_child(mut self, child: Node) -> Self {
        self.push_child(child);
        self
    }

    /// Builder: mark an element as written with an explicit empty block
    pub fn explicitly_empty(mut self) -> Self {
        if let Node::Element { explicit_empty, .. } = &mut self {
            *explicit_empty = true;
        }
        self
    }

    /// Append a child; no-op for non-element nodes
    pub fn push_child(&mut self, child: Node) {
        if let Node::Element { children, .. } = self {
            children.push(child);
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Element { .. } => NodeKind::Element,
            Node::Text { .. } => NodeKind::Text,
            Node::Comment { .. } => NodeKind::Comment,
            Node::CommentBlock { .. } => NodeKind::CommentBlock,
            Node::ProcessingInstruction { .. } => NodeKind::ProcessingInstruction,
            Node::Import { .. } => NodeKind::Import,
            Node::Declaration { .. } => NodeKind::Declaration,
            Node::Whitespace { .. } => NodeKind::Whitespace,
        }
    }

    /// Tag name of elements and processing instructions
    pub fn tag(&self) -> Option<&str> {
        match self {
            Node::Element { tag, .. } | Node::ProcessingInstruction { tag, .. } => Some(tag),
            _ => None,
        }
    }

    /// Text payload of non-element nodes
    pub fn payload(&self) -> Option<&str> {
        match self {
            Node::Text { payload }
            | Node::Comment { payload }
            | Node::CommentBlock { payload }
            | Node::ProcessingInstruction { payload, .. }
            | Node::Import { payload }
            | Node::Declaration { payload } => Some(payload),
            Node::Element { .. } | Node::Whitespace { .. } => None,
        }
    }

    pub fn attrs(&self) -> &[Attribute] {
        match self {
            Node::Element { attrs, .. } => attrs,
            _ => &[],
        }
    }

    pub fn children(&self) -> &[Node] {
        match self {
            Node::Element { children, .. } => children,
            _ => &[],
        }
    }

    pub fn is_raw_code(&self) -> bool {
        matches!(self, Node::ProcessingInstruction { tag, .. } if tag == Self::RAW_CODE_TAG)
    }
}

// Deep trees are released with a worklist so teardown never recurses.
impl Drop for Node {
    fn drop(&mut self) {
        let mut pending = match self {
            Node::Element { children, .. } if !children.is_empty() => std::mem::take(children),
            _ => return,
        };
        while let Some(mut node) = pending.pop() {
            if let Node::Element { children, .. } = &mut node {
                pending.append(children);
            }
        }
    }
}

/// A parsed document: the synthetic root and its provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub source_format: SourceFormat,
    pub root: Node,
    /// Preserved raw source (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_source: Option<String>,
}

impl Document {
    /// Reserved tag name of the synthetic root element
    pub const ROOT_TAG: &'static str = "ROOT";

    /// Create a new empty document
    pub fn new(format: SourceFormat) -> Self {
        Self::with_children(format, Vec::new())
    }

    pub fn with_children(format: SourceFormat, children: Vec<Node>) -> Self {
        Self {
            source_format: format,
            root: Node::Element {
                tag: Self::ROOT_TAG.to_string(),
                attrs: Vec::new(),
                children,
                explicit_empty: false,
            },
            raw_source: None,
        }
    }

    /// Top-level nodes
    pub fn children(&self) -> &[Node] {
        self.root.children()
    }

    /// Depth-first, pre-order walk over every node below the root
    pub fn iter(&self) -> Descendants<'_> {
        Descendants {
            stack: self.children().iter().rev().collect(),
        }
    }

    pub fn element_count(&self) -> usize {
        self.iter()
            .filter(|node| node.kind() == NodeKind::Element)
            .count()
    }

    /// Pretty JSON dump of the tree
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ConversionError::Serialization(e.to_string()))
    }
}

/// Iterator returned by [`Document::iter`]
pub struct Descendants<'a> {
    stack: Vec<&'a Node>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children().iter().rev());
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_new() {
        let doc = Document::new(SourceFormat::Eml);
        assert_eq!(doc.source_format, SourceFormat::Eml);
        assert_eq!(doc.root.tag(), Some(Document::ROOT_TAG));
        assert!(doc.children().is_empty());
    }

    #[test]
    fn test_iter_is_preorder() {
        let doc = Document::with_children(
            SourceFormat::Html,
            vec![
                Node::element("div")
                    .with_child(Node::element("span").with_child(Node::text("Hi")))
                    .with_child(Node::element("br")),
                Node::comment("end"),
            ],
        );

        let kinds: Vec<_> = doc
            .iter()
            .map(|n| n.tag().or(n.payload()).unwrap_or_default().to_string())
            .collect();
        assert_eq!(kinds, ["div", "span", "Hi", "br", "end"]);
        assert_eq!(doc.element_count(), 3);
    }

    #[test]
    fn test_from_path() {
        assert_eq!(SourceFormat::from_path("index.eml"), SourceFormat::Eml);
        assert_eq!(SourceFormat::from_path("view.xaml"), SourceFormat::Xaml);
        assert_eq!(SourceFormat::from_path("layout.fxml"), SourceFormat::Fxml);
        assert_eq!(SourceFormat::from_path("data.xml"), SourceFormat::Xml);
        assert_eq!(SourceFormat::from_path("site.php"), SourceFormat::Php);
        assert_eq!(SourceFormat::from_path("index.html"), SourceFormat::Html);
        assert_eq!(SourceFormat::from_path("notes.txt"), SourceFormat::Html);
        assert_eq!(SourceFormat::from_path("INDEX.EML"), SourceFormat::Html);
    }

    #[test]
    fn test_markup_mode() {
        assert_eq!(SourceFormat::Eml.markup_mode(), None);
        assert_eq!(SourceFormat::Fxml.markup_mode(), Some(MarkupMode::Strict));
        assert_eq!(SourceFormat::Php.markup_mode(), Some(MarkupMode::Loose));
    }

    #[test]
    fn test_deep_tree_drop() {
        let mut node = Node::element("leaf");
        for _ in 0..200_000 {
            node = Node::element("d").with_child(node);
        }
        drop(node);
    }

    #[test]
    fn test_to_json() {
        let doc = Document::with_children(
            SourceFormat::Eml,
            vec![Node::element("foo").explicitly_empty()],
        );
        let json = doc.to_json().unwrap();
        assert!(json.contains("\"explicit_empty\": true"));
        assert!(json.contains("\"source_format\": \"eml\""));
    }
}
