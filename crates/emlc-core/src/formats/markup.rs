// SPDX-License-Identifier: AGPL-3.0-or-later
//! Markup format handler (HTML, PHP templates, XML, XAML, FXML)
//!
//! One tolerant tag scanner serves every angle-bracket format. Open elements
//! live on an explicit frame stack, so nesting depth never turns into call
//! depth. The formats only differ in how childless elements are written back:
//! see [`MarkupMode`].

use crate::anomaly::{Anomaly, AnomalyKind, ParseOutcome};
use crate::ast::{Attribute, Document, MarkupMode, Node, SourceFormat};
use crate::formats::{pad, quoted};
use crate::scan::{self, Cursor};
use crate::traits::{FormatHandler, ParseConfig, Parser, RenderConfig, Renderer, Result};

/// Handler for one markup format
pub struct MarkupHandler {
    format: SourceFormat,
    mode: MarkupMode,
}

impl MarkupHandler {
    /// Handler for `format`. EML has no markup rules and is handled as HTML.
    pub fn new(format: SourceFormat) -> Self {
        match format.markup_mode() {
            Some(mode) => Self { format, mode },
            None => Self::html(),
        }
    }

    pub fn html() -> Self {
        Self {
            format: SourceFormat::Html,
            mode: MarkupMode::Loose,
        }
    }

    pub fn xml() -> Self {
        Self {
            format: SourceFormat::Xml,
            mode: MarkupMode::Strict,
        }
    }

    pub fn mode(&self) -> MarkupMode {
        self.mode
    }
}

impl Default for MarkupHandler {
    fn default() -> Self {
        Self::html()
    }
}

impl Parser for MarkupHandler {
    fn format(&self) -> SourceFormat {
        self.format
    }

    fn parse_with_anomalies(&self, input: &str, config: &ParseConfig) -> ParseOutcome {
        let (children, anomalies) = MarkupScanner::new(input, config.max_depth).run();

        let mut document = Document::with_children(self.format, children);
        if config.preserve_raw_source {
            document.raw_source = Some(input.to_string());
        }
        ParseOutcome {
            document,
            anomalies,
        }
    }
}

/// An element whose closing tag has not been seen yet
struct Frame<'a> {
    tag: &'a str,
    attrs: Vec<Attribute>,
    children: Vec<Node>,
    open_at: usize,
}

impl Frame<'_> {
    fn into_node(self) -> Node {
        Node::Element {
            tag: self.tag.to_string(),
            attrs: self.attrs,
            explicit_empty: self.children.is_empty(),
            children: self.children,
        }
    }
}

struct MarkupScanner<'a> {
    cursor: Cursor<'a>,
    /// Open elements, innermost last. The bottom frame collects top-level
    /// nodes and is never closed by a tag.
    stack: Vec<Frame<'a>>,
    max_depth: usize,
    anomalies: Vec<Anomaly>,
}

impl<'a> MarkupScanner<'a> {
    fn new(input: &'a str, max_depth: usize) -> Self {
        Self {
            cursor: Cursor::new(input),
            stack: vec![Frame {
                tag: Document::ROOT_TAG,
                attrs: Vec::new(),
                children: Vec::new(),
                open_at: 0,
            }],
            max_depth,
            anomalies: Vec::new(),
        }
    }

    fn record(&mut self, offset: usize, kind: AnomalyKind) {
        self.anomalies.push(Anomaly { offset, kind });
    }

    fn run(mut self) -> (Vec<Node>, Vec<Anomaly>) {
        while let Some(lt) = self.next_markup_start() {
            let text = self.cursor.slice(self.cursor.pos(), lt);
            self.push_text(text);
            self.cursor.jump_to(lt);

            if self.cursor.starts_with("<!--") {
                self.parse_comment();
            } else if self.cursor.starts_with("<!") {
                self.parse_declaration();
            } else if self.cursor.starts_with("<?") {
                self.parse_instruction();
            } else if self.cursor.starts_with("</") {
                self.parse_close();
            } else {
                self.parse_open();
            }
        }
        let rest = self.cursor.rest();
        self.push_text(rest);
        self.cursor.jump_to_end();

        while self.stack.len() > 1 {
            let open_at = self.stack[self.stack.len() - 1].open_at;
            self.record(open_at, AnomalyKind::UnclosedElement);
            self.close_top();
        }
        let children = self
            .stack
            .pop()
            .map(|root| root.children)
            .unwrap_or_default();
        (children, self.anomalies)
    }

    /// Next `<` that starts a tag, comment, declaration or instruction.
    /// Any other `<` is plain text.
    fn next_markup_start(&self) -> Option<usize> {
        let rest = self.cursor.rest();
        rest.match_indices('<')
            .map(|(i, _)| i)
            .find(|&i| {
                rest[i + 1..]
                    .chars()
                    .next()
                    .is_some_and(|c| scan::is_ident_start(c) || matches!(c, '/' | '!' | '?'))
            })
            .map(|i| self.cursor.pos() + i)
    }

    fn append(&mut self, node: Node) {
        if let Some(frame) = self.stack.last_mut() {
            frame.children.push(node);
        }
    }

    fn push_text(&mut self, text: &str) {
        if let Some(node) = classify_text(text) {
            self.append(node);
        }
    }

    fn close_top(&mut self) {
        if self.stack.len() > 1 {
            if let Some(frame) = self.stack.pop() {
                let node = frame.into_node();
                self.append(node);
            }
        }
    }

    fn skip_past_gt(&mut self) {
        match self.cursor.find(">") {
            Some(gt) => self.cursor.jump_to(gt + 1),
            None => self.cursor.jump_to_end(),
        }
    }

    fn parse_comment(&mut self) {
        let start = self.cursor.pos();
        self.cursor.advance_by(4);
        let body_start = self.cursor.pos();

        let payload = match self.cursor.find("-->") {
            Some(end) => {
                self.cursor.jump_to(end + 3);
                self.cursor.slice(body_start, end)
            }
            None => {
                self.record(start, AnomalyKind::UnterminatedComment);
                let rest = self.cursor.rest();
                self.cursor.jump_to_end();
                rest
            }
        };
        self.append(Node::comment(scan::trim_layout(payload)));
    }

    /// `<!DOCTYPE ...>`, `<![CDATA[...]]>` and other `<!` constructs
    fn parse_declaration(&mut self) {
        let start = self.cursor.pos();
        self.cursor.advance_by(2);
        let body_start = self.cursor.pos();

        // (payload end, resume offset)
        let end = if self.cursor.starts_with("[CDATA[") {
            self.cursor.find("]]>").map(|i| (i + 2, i + 3))
        } else {
            self.cursor.find(">").map(|i| (i, i + 1))
        };
        let payload = match end {
            Some((end, resume)) => {
                self.cursor.jump_to(resume);
                self.cursor.slice(body_start, end)
            }
            None => {
                self.record(start, AnomalyKind::UnterminatedInstruction);
                let rest = self.cursor.rest();
                self.cursor.jump_to_end();
                rest
            }
        };
        self.append(Node::declaration(payload));
    }

    fn parse_instruction(&mut self) {
        let start = self.cursor.pos();
        self.cursor.advance_by(2);
        let body_start = self.cursor.pos();

        let raw = match self.cursor.find("?>") {
            Some(end) => {
                self.cursor.jump_to(end + 2);
                self.cursor.slice(body_start, end)
            }
            None => {
                self.record(start, AnomalyKind::UnterminatedInstruction);
                let rest = self.cursor.rest();
                self.cursor.jump_to_end();
                rest
            }
        };

        let node = if let Some(code) = raw.strip_prefix(Node::RAW_CODE_TAG) {
            Node::raw_code(code)
        } else if let Some(import) = raw.strip_prefix("import ") {
            Node::import(scan::trim_layout(import))
        } else {
            let tag_len = raw
                .find(|c| !scan::is_ident_part(c))
                .unwrap_or(raw.len());
            Node::instruction(&raw[..tag_len], raw[tag_len..].trim_start())
        };
        self.append(node);
    }

    fn parse_close(&mut self) {
        let start = self.cursor.pos();
        self.cursor.advance_by(2);
        let name = self.cursor.read_while(scan::is_ident_part);

        let open = self
            .stack
            .iter()
            .skip(1)
            .rposition(|frame| frame.tag == name)
            .map(|i| i + 1);

        match open {
            Some(index) if index == self.stack.len() - 1 => {
                self.skip_past_gt();
                self.close_top();
            }
            Some(_) => {
                // Close the inner element and leave the tag for its owner
                self.record(start, AnomalyKind::MismatchedClose);
                self.cursor.jump_to(start);
                self.close_top();
            }
            None => {
                self.record(start, AnomalyKind::StrayClose);
                self.skip_past_gt();
            }
        }
    }

    fn parse_open(&mut self) {
        let start = self.cursor.pos();
        self.cursor.bump();
        let tag = self.cursor.read_while(scan::is_ident_part);
        let attrs = self.parse_attrs();

        let self_closing = self.cursor.peek() == Some('/');
        if self_closing {
            self.cursor.bump();
        }
        if self.cursor.peek() == Some('>') {
            self.cursor.bump();
        } else {
            self.record(self.cursor.pos(), AnomalyKind::UnterminatedTag);
        }

        if self_closing || scan::is_void_element(tag) {
            self.append(Node::Element {
                tag: tag.to_string(),
                attrs,
                children: Vec::new(),
                explicit_empty: false,
            });
        } else if scan::is_raw_text_element(tag) {
            self.parse_raw_text(start, tag, attrs);
        } else if self.stack.len() > self.max_depth {
            self.record(start, AnomalyKind::DepthLimit);
            self.append(Node::Element {
                tag: tag.to_string(),
                attrs,
                children: Vec::new(),
                explicit_empty: false,
            });
        } else {
            self.stack.push(Frame {
                tag,
                attrs,
                children: Vec::new(),
                open_at: start,
            });
        }
    }

    /// Attributes up to (not including) `>` or `/`; bare values stop at
    /// whitespace, `>` or `/`
    fn parse_attrs(&mut self) -> Vec<Attribute> {
        let mut attrs = Vec::new();
        loop {
            let separator_start = self.cursor.pos();
            self.cursor.skip_whitespace();
            match self.cursor.peek() {
                None | Some('>') | Some('/') => break,
                Some(c) if scan::is_ident_start(c) => {
                    let separator = self.cursor.slice(separator_start, self.cursor.pos());
                    let key = self.cursor.read_while(scan::is_ident_part);
                    let value = match self.cursor.read_assignment(|c| c == '>' || c == '/') {
                        Some((value, true)) => value,
                        Some((value, false)) => {
                            self.record(self.cursor.pos(), AnomalyKind::UnterminatedTag);
                            value
                        }
                        None => "",
                    };
                    attrs.push(Attribute {
                        key: key.to_string(),
                        value: value.to_string(),
                        separator: separator.to_string(),
                    });
                }
                Some(_) => {
                    self.record(self.cursor.pos(), AnomalyKind::UnexpectedChar);
                    self.cursor.bump();
                }
            }
        }
        attrs
    }

    /// Body of `script`/`style`: raw text up to the matching end tag
    fn parse_raw_text(&mut self, start: usize, tag: &'a str, attrs: Vec<Attribute>) {
        let body_start = self.cursor.pos();
        let closing = format!("</{}", tag);

        let body = match self.cursor.find(&closing) {
            Some(end) => {
                let body = self.cursor.slice(body_start, end);
                self.cursor.jump_to(end + closing.len());
                self.skip_past_gt();
                body
            }
            None => {
                self.record(start, AnomalyKind::UnclosedElement);
                let rest = self.cursor.rest();
                self.cursor.jump_to_end();
                rest
            }
        };

        let children: Vec<Node> = classify_text(body).into_iter().collect();
        self.append(Node::Element {
            tag: tag.to_string(),
            attrs,
            explicit_empty: children.is_empty(),
            children,
        });
    }
}

/// Text between tags. Blank runs only survive as blank-line markers.
fn classify_text(text: &str) -> Option<Node> {
    if scan::trim_layout(text).is_empty() {
        let line_breaks = scan::count_line_breaks(text);
        return (line_breaks > 1).then(|| Node::whitespace(line_breaks));
    }
    Some(Node::text(text))
}

impl Renderer for MarkupHandler {
    fn format(&self) -> SourceFormat {
        self.format
    }

    fn render(&self, doc: &Document, config: &RenderConfig) -> Result<String> {
        let layout = Layout {
            mode: self.mode,
            config,
        };
        let mut output = String::new();
        for node in doc.children() {
            render_node(&mut output, node, 0, layout);
        }
        Ok(output)
    }
}

#[derive(Clone, Copy)]
struct Layout<'c> {
    mode: MarkupMode,
    config: &'c RenderConfig,
}

fn render_node(output: &mut String, node: &Node, depth: usize, layout: Layout<'_>) {
    let prefix = pad(&layout.config.indent, depth);

    match node {
        Node::Whitespace { line_count } => {
            for _ in 1..*line_count {
                output.push('\n');
            }
        }

        Node::Comment { payload } => {
            output.push_str(&format!(
                "{}<!-- {} -->\n",
                prefix,
                scan::trim_layout(payload)
            ));
        }

        Node::CommentBlock { payload } => {
            output.push_str(&format!("{}<!--{}-->\n", prefix, payload));
        }

        Node::Import { payload } => {
            output.push_str(&format!("{}<?import {}?>\n", prefix, payload));
        }

        Node::Declaration { payload } => {
            output.push_str(&format!("{}<!{}>\n", prefix, payload));
        }

        Node::ProcessingInstruction { payload, .. } if node.is_raw_code() => {
            let mut code = payload.replace("\r\n", "\n");
            if !code.starts_with('\n') {
                code.insert(0, '\n');
            }
            code.truncate(scan::trim_trailing_horizontal(&code).len());
            if !code.ends_with('\n') {
                code.push('\n');
            }
            output.push_str(&format!("{}<?php{}{}?>\n", prefix, code, prefix));
        }

        Node::ProcessingInstruction { tag, payload } => {
            if payload.is_empty() {
                output.push_str(&format!("{}<?{}?>\n", prefix, tag));
            } else {
                output.push_str(&format!("{}<?{} {}?>\n", prefix, tag, payload));
            }
        }

        Node::Text { payload } if scan::trim_layout(payload).is_empty() => {}

        Node::Text { payload } => {
            output.push_str(&prefix);
            output.push_str(scan::trim_layout(payload));
            output.push('\n');
        }

        Node::Element {
            tag,
            attrs,
            children,
            explicit_empty,
        } => {
            let open = format!("{}<{}{}", prefix, tag, render_attrs(attrs, layout.config));

            match children.as_slice() {
                [] => {
                    let line = match layout.mode {
                        MarkupMode::Strict if !*explicit_empty => format!("{}/>\n", open),
                        MarkupMode::Loose if scan::is_void_element(tag) => format!("{}>\n", open),
                        _ => format!("{}></{}>\n", open, tag),
                    };
                    output.push_str(&line);
                }
                [Node::Text { payload }] => render_text_content(output, tag, payload, &open, &prefix),
                _ => {
                    output.push_str(&open);
                    output.push_str(">\n");
                    for child in children {
                        render_node(output, child, depth + 1, layout);
                    }
                    output.push_str(&format!("{}</{}>\n", prefix, tag));
                }
            }
        }
    }
}

fn render_attrs(attrs: &[Attribute], config: &RenderConfig) -> String {
    attrs
        .iter()
        .map(|attr| {
            let spacing = if config.preserve_attribute_spacing {
                recorded_spacing(&attr.separator)
            } else {
                " ".to_string()
            };
            format!("{}{}={}", spacing, attr.key, quoted(&attr.value))
        })
        .collect()
}

/// Whitespace of a recorded separator, at least one space
fn recorded_spacing(separator: &str) -> String {
    let spacing: String = separator
        .chars()
        .filter(|c| c.is_ascii_whitespace())
        .collect();
    if spacing.is_empty() {
        " ".to_string()
    } else {
        spacing
    }
}

/// Element whose only child is text: inline when it fits on one line
fn render_text_content(output: &mut String, tag: &str, payload: &str, open: &str, prefix: &str) {
    let text = scan::trim_layout(payload);
    if text.is_empty() {
        output.push_str(&format!("{}></{}>\n", open, tag));
        return;
    }
    if !payload.contains('\n') {
        let inline = if scan::is_verbatim_tag(tag) {
            payload
        } else {
            text
        };
        output.push_str(&format!("{}>{}</{}>\n", open, inline, tag));
        return;
    }

    let body = scan::trim_trailing_horizontal(payload);
    output.push_str(open);
    output.push('>');
    if !body.starts_with('\n') {
        output.push('\n');
    }
    output.push_str(body);
    if !body.ends_with('\n') {
        output.push('\n');
    }
    output.push_str(&format!("{}</{}>\n", prefix, tag));
}

impl FormatHandler for MarkupHandler {
    fn markup_mode(&self) -> Option<MarkupMode> {
        Some(self.mode)
    }
}
