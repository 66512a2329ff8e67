// SPDX-License-Identifier: AGPL-3.0-or-later
//! EML format handler
//!
//! EML writes an element as `tag (key="value", ...) { content }`. How the
//! content block is read depends on the tag:
//!
//! - `php` blocks are raw code and become a processing instruction;
//! - `pre`, `code`, `script` and `style` blocks are kept as verbatim text;
//! - any other block is parsed as nested EML when it looks like it holds
//!   elements, and kept as a single text node otherwise.
//!
//! EML has no syntax for markup-only constructs (generic processing
//! instructions and `<!...>` declarations). They are written out as block
//! comments of the form `/*?tag payload?*/` and `/*!payload*/` and read back
//! as ordinary block comments.

use crate::anomaly::{Anomaly, AnomalyKind, ParseOutcome};
use crate::ast::{Attribute, Document, MarkupMode, Node, SourceFormat};
use crate::formats::{pad, quoted};
use crate::scan::{self, Cursor};
use crate::traits::{FormatHandler, ParseConfig, Parser, RenderConfig, Renderer, Result};
use once_cell::sync::Lazy;
use regex::Regex;

/// An identifier followed by `(` or `{` anywhere in a block means nested EML.
/// Word boundaries and whitespace are ASCII only.
static NESTED_EML: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^a-zA-Z0-9_])[a-zA-Z_][a-zA-Z0-9_.-]*[ \t\n\r\x0B\x0C]*[({]").unwrap()
});

/// EML format handler
pub struct EmlHandler;

impl EmlHandler {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EmlHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser for EmlHandler {
    fn format(&self) -> SourceFormat {
        SourceFormat::Eml
    }

    fn parse_with_anomalies(&self, input: &str, config: &ParseConfig) -> ParseOutcome {
        let mut scanner = EmlScanner::new(input, 0, 0, config.max_depth);
        let children = scanner.parse_nodes();

        let mut document = Document::with_children(SourceFormat::Eml, children);
        if config.preserve_raw_source {
            document.raw_source = Some(input.to_string());
        }
        ParseOutcome {
            document,
            anomalies: scanner.anomalies,
        }
    }
}

/// Recursive-descent scanner over one EML fragment.
///
/// Nested blocks get their own scanner over the block text; `base` maps
/// fragment offsets back into the whole input.
struct EmlScanner<'a> {
    cursor: Cursor<'a>,
    base: usize,
    depth: usize,
    max_depth: usize,
    anomalies: Vec<Anomaly>,
    /// Last `;` lookup: (searched from, next `;` at or after that offset)
    semicolon: Option<(usize, Option<usize>)>,
}

impl<'a> EmlScanner<'a> {
    fn new(input: &'a str, base: usize, depth: usize, max_depth: usize) -> Self {
        Self {
            cursor: Cursor::new(input),
            base,
            depth,
            max_depth,
            anomalies: Vec::new(),
            semicolon: None,
        }
    }

    fn record(&mut self, offset: usize, kind: AnomalyKind) {
        self.anomalies.push(Anomaly {
            offset: self.base + offset,
            kind,
        });
    }

    fn parse_nodes(&mut self) -> Vec<Node> {
        let mut nodes = Vec::new();

        loop {
            let gap = self.cursor.skip_whitespace();
            let line_breaks = scan::count_line_breaks(gap);
            if line_breaks > 1 {
                nodes.push(Node::whitespace(line_breaks));
            }

            let Some(c) = self.cursor.peek() else {
                break;
            };

            if self.cursor.starts_with("//") {
                self.cursor.advance_by(2);
                let line = self.cursor.read_while(|c| c != '\n');
                nodes.push(Node::comment(scan::trim_layout(line)));
            } else if self.cursor.starts_with("/*") {
                nodes.push(self.parse_block_comment());
            } else if let Some(import) = self.parse_import() {
                nodes.push(import);
            } else if scan::is_ident_start(c) {
                nodes.push(self.parse_element());
            } else {
                self.record(self.cursor.pos(), AnomalyKind::UnexpectedChar);
                self.cursor.bump();
            }
        }

        nodes
    }

    fn parse_block_comment(&mut self) -> Node {
        let start = self.cursor.pos();
        self.cursor.advance_by(2);
        let body_start = self.cursor.pos();

        let payload = match self.cursor.find("*/") {
            Some(end) => {
                self.cursor.jump_to(end + 2);
                self.cursor.slice(body_start, end)
            }
            None => {
                self.record(start, AnomalyKind::UnterminatedComment);
                let rest = self.cursor.rest();
                self.cursor.jump_to_end();
                rest
            }
        };
        Node::comment_block(payload)
    }

    /// `import payload;`. Without a `;` the keyword is an ordinary tag.
    fn parse_import(&mut self) -> Option<Node> {
        const KEYWORD: &str = "import";

        if !self.cursor.starts_with(KEYWORD) {
            return None;
        }
        let after = self.cursor.pos() + KEYWORD.len();
        let boundary = self.cursor.rest()[KEYWORD.len()..].chars().next();
        if boundary.is_some_and(|c| !c.is_ascii_whitespace()) {
            return None;
        }

        let semicolon = self.next_semicolon()?;
        let payload = scan::trim_layout(self.cursor.slice(after, semicolon));
        self.cursor.jump_to(semicolon + 1);
        Some(Node::import(payload))
    }

    /// Offset of the next `;`. Lookups are cached so a long run of `import`
    /// keywords without a `;` scans the input once.
    fn next_semicolon(&mut self) -> Option<usize> {
        let pos = self.cursor.pos();
        if let Some((from, found)) = self.semicolon {
            let still_valid = match found {
                Some(at) => from <= pos && pos <= at,
                None => from <= pos,
            };
            if still_valid {
                return found;
            }
        }
        let found = self.cursor.find(";");
        self.semicolon = Some((pos, found));
        found
    }

    fn parse_element(&mut self) -> Node {
        let tag = self.cursor.read_while(scan::is_ident_part);
        let mut attrs = Vec::new();

        // Whitespace is only consumed when `(` or `{` follows, so the gap
        // before the next sibling still reaches the blank-line check.
        let resume = self.cursor.pos();
        self.cursor.skip_whitespace();
        if self.cursor.peek() == Some('(') {
            self.cursor.bump();
            attrs = self.parse_attrs();
        } else {
            self.cursor.jump_to(resume);
        }

        let resume = self.cursor.pos();
        self.cursor.skip_whitespace();
        if self.cursor.peek() != Some('{') {
            self.cursor.jump_to(resume);
            return Node::Element {
                tag: tag.to_string(),
                attrs,
                children: Vec::new(),
                explicit_empty: false,
            };
        }

        let open = self.cursor.pos();
        self.cursor.bump();
        let inner_start = self.cursor.pos();
        let (inner, closed) = self.cursor.read_balanced_braces();
        if !closed {
            self.record(open, AnomalyKind::UnterminatedBlock);
        }

        if tag == Node::RAW_CODE_TAG {
            return Node::raw_code(inner);
        }

        let children = if scan::is_verbatim_tag(tag) || !NESTED_EML.is_match(inner) {
            text_child(inner)
        } else if self.depth >= self.max_depth {
            self.record(open, AnomalyKind::DepthLimit);
            text_child(inner)
        } else {
            let mut nested = EmlScanner::new(
                inner,
                self.base + inner_start,
                self.depth + 1,
                self.max_depth,
            );
            let children = nested.parse_nodes();
            self.anomalies.append(&mut nested.anomalies);
            children
        };

        Node::Element {
            tag: tag.to_string(),
            attrs,
            explicit_empty: children.is_empty(),
            children,
        }
    }

    /// Attribute list after `(`, up to and including `)`
    fn parse_attrs(&mut self) -> Vec<Attribute> {
        let mut attrs = Vec::new();
        let mut separator_start = self.cursor.pos();

        loop {
            self.cursor.skip_whitespace();
            match self.cursor.peek() {
                None => {
                    self.record(self.cursor.pos(), AnomalyKind::UnterminatedAttributeList);
                    break;
                }
                Some(')') => {
                    self.cursor.bump();
                    break;
                }
                Some(',') => {
                    self.cursor.bump();
                }
                Some(c) if scan::is_ident_part(c) => {
                    let separator = self.cursor.slice(separator_start, self.cursor.pos());
                    let key = self.cursor.read_while(scan::is_ident_part);
                    let value = self.parse_attr_value();
                    attrs.push(Attribute {
                        key: key.to_string(),
                        value: value.to_string(),
                        separator: separator.to_string(),
                    });
                    separator_start = self.cursor.pos();
                }
                Some(_) => {
                    self.record(self.cursor.pos(), AnomalyKind::UnexpectedChar);
                    self.cursor.bump();
                }
            }
        }

        attrs
    }

    /// `= value` after a key; a key without `=` is valueless
    fn parse_attr_value(&mut self) -> &'a str {
        match self.cursor.read_assignment(|c| c == ')' || c == ',') {
            Some((value, true)) => value,
            Some((value, false)) => {
                self.record(self.cursor.pos(), AnomalyKind::UnterminatedAttributeList);
                value
            }
            None => "",
        }
    }
}

fn text_child(inner: &str) -> Vec<Node> {
    if inner.is_empty() {
        Vec::new()
    } else {
        vec![Node::text(inner)]
    }
}

impl Renderer for EmlHandler {
    fn format(&self) -> SourceFormat {
        SourceFormat::Eml
    }

    fn render(&self, doc: &Document, config: &RenderConfig) -> Result<String> {
        let mut output = String::new();
        for node in doc.children() {
            render_node(&mut output, node, 0, config);
        }
        Ok(output)
    }
}

fn render_node(output: &mut String, node: &Node, depth: usize, config: &RenderConfig) {
    let prefix = pad(&config.indent, depth);

    match node {
        Node::Whitespace { line_count } => {
            for _ in 1..*line_count {
                output.push('\n');
            }
        }

        // A line comment cannot span lines
        Node::Comment { payload } if payload.contains('\n') => {
            output.push_str(&format!("{}/* {} */\n", prefix, payload));
        }

        Node::Comment { payload } => {
            output.push_str(&format!("{}// {}\n", prefix, payload));
        }

        Node::CommentBlock { payload } => {
            output.push_str(&format!("{}/*{}*/\n", prefix, payload));
        }

        Node::Import { payload } => {
            output.push_str(&format!("{}import {};\n", prefix, payload));
        }

        Node::Declaration { payload } => {
            output.push_str(&format!("{}/*!{}*/\n", prefix, payload));
        }

        Node::ProcessingInstruction { payload, .. } if node.is_raw_code() => {
            let inner = pad(&config.indent, depth + 1);
            render_raw_code(output, payload, &prefix, &inner);
        }

        Node::ProcessingInstruction { tag, payload } => {
            if payload.is_empty() {
                output.push_str(&format!("{}/*?{}?*/\n", prefix, tag));
            } else {
                output.push_str(&format!("{}/*?{} {}?*/\n", prefix, tag, payload));
            }
        }

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
            output.push_str(&prefix);
            output.push_str(tag);

            if !attrs.is_empty() {
                let list: Vec<String> = attrs
                    .iter()
                    .map(|attr| format!("{}={}", attr.key, quoted(&attr.value)))
                    .collect();
                output.push_str(" (");
                output.push_str(&list.join(", "));
                output.push(')');
            }

            match children.as_slice() {
                [] if *explicit_empty => output.push_str(" {}\n"),
                [] => output.push('\n'),
                [Node::Text { payload }] => render_text_block(output, tag, payload, &prefix),
                _ => {
                    output.push_str(" {\n");
                    for child in children {
                        render_node(output, child, depth + 1, config);
                    }
                    output.push_str(&prefix);
                    output.push_str("}\n");
                }
            }
        }
    }
}

/// Block of an element whose only child is text
fn render_text_block(output: &mut String, tag: &str, payload: &str, prefix: &str) {
    if scan::is_verbatim_tag(tag) {
        if !payload.contains('\n') {
            output.push_str(&format!(" {{{}}}\n", payload));
            return;
        }
    } else {
        let text = scan::trim_layout(payload);
        if text.is_empty() && !payload.contains('\n') {
            output.push_str(" { }\n");
            return;
        }
        if !text.is_empty() && !text.contains('\n') {
            output.push_str(&format!(" {{ {} }}\n", text));
            return;
        }
    }

    let body = scan::trim_trailing_horizontal(payload);
    output.push_str(" {");
    if !body.starts_with('\n') {
        output.push('\n');
    }
    output.push_str(body);
    if !body.ends_with('\n') {
        output.push('\n');
    }
    output.push_str(prefix);
    output.push_str("}\n");
}

/// `php { ... }` with the code dedented and re-indented one level deeper
fn render_raw_code(output: &mut String, payload: &str, prefix: &str, inner: &str) {
    let lines: Vec<&str> = payload.lines().map(|line| line.trim_end()).collect();
    output.push_str(prefix);
    output.push_str("php {");

    let Some(first) = lines.iter().position(|line| !line.is_empty()) else {
        output.push_str("}\n");
        return;
    };
    let last = lines
        .iter()
        .rposition(|line| !line.is_empty())
        .unwrap_or(first);
    let body = &lines[first..=last];

    let margin = body
        .iter()
        .filter(|line| !line.is_empty())
        .map(|line| line.len() - line.trim_start_matches([' ', '\t']).len())
        .min()
        .unwrap_or(0);

    output.push('\n');
    for line in body {
        if !line.is_empty() {
            output.push_str(inner);
            output.push_str(&line[margin..]);
        }
        output.push('\n');
    }
    output.push_str(prefix);
    output.push_str("}\n");
}

impl FormatHandler for EmlHandler {
    fn markup_mode(&self) -> Option<MarkupMode> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(input: &str) -> Document {
        EmlHandler::new()
            .parse(input, &ParseConfig::default())
            .unwrap()
    }

    fn render(children: Vec<Node>) -> String {
        let doc = Document::with_children(SourceFormat::Eml, children);
        EmlHandler::new()
            .render(&doc, &RenderConfig::default())
            .unwrap()
    }

    fn roundtrip(input: &str) -> String {
        let handler = EmlHandler::new();
        let doc = parse(input);
        handler.render(&doc, &RenderConfig::default()).unwrap()
    }

    #[test]
    fn test_parse_nested_elements() {
        let doc = parse("div (class=\"a\", id='b') { span { Hi } }");
        let div = &doc.children()[0];
        assert_eq!(div.tag(), Some("div"));
        assert_eq!(div.attrs()[0].key, "class");
        assert_eq!(div.attrs()[0].value, "a");
        assert_eq!(div.attrs()[1].key, "id");
        assert_eq!(div.attrs()[1].value, "b");

        let span = &div.children()[0];
        assert_eq!(span.tag(), Some("span"));
        assert_eq!(span.children(), &[Node::text(" Hi ")]);
    }

    #[test]
    fn test_parse_block_presence() {
        let doc = parse("foo {}\nbar\nbaz { }");
        assert_eq!(doc.children()[0], Node::element("foo").explicitly_empty());
        assert_eq!(doc.children()[1], Node::element("bar"));
        assert_eq!(
            doc.children()[2],
            Node::element("baz").with_child(Node::text(" "))
        );
    }

    #[test]
    fn test_parse_inline_text_keeps_spacing() {
        let doc = parse("h1 {  Hello   World }");
        assert_eq!(
            doc.children()[0].children(),
            &[Node::text("  Hello   World ")]
        );
    }

    #[test]
    fn test_parse_verbatim_block() {
        let doc = parse("pre {\n  a { b }\n}");
        assert_eq!(
            doc.children()[0].children(),
            &[Node::text("\n  a { b }\n")]
        );
    }

    #[test]
    fn test_parse_raw_code() {
        let doc = parse("php { if ($a) { echo 1; } }");
        assert_eq!(
            doc.children()[0],
            Node::raw_code(" if ($a) { echo 1; } ")
        );
    }

    #[test]
    fn test_parse_comments_and_import() {
        let doc = parse("// hi there \n/* keep  */\nimport com.example.Foo ;");
        assert_eq!(
            doc.children(),
            &[
                Node::comment("hi there"),
                Node::comment_block(" keep  "),
                Node::import("com.example.Foo"),
            ]
        );
    }

    #[test]
    fn test_import_without_semicolon_is_a_tag() {
        let doc = parse("import");
        assert_eq!(doc.children(), &[Node::element("import")]);
        let doc = parse("imports { x }");
        assert_eq!(doc.children()[0].tag(), Some("imports"));
    }

    #[test]
    fn test_blank_lines_between_siblings() {
        let doc = parse("a\n\n\nb (x=1)\nc");
        assert_eq!(
            doc.children(),
            &[
                Node::element("a"),
                Node::whitespace(3),
                Node::element("b").with_attr("x", "1"),
                Node::element("c"),
            ]
        );
    }

    #[test]
    fn test_attribute_separators_and_valueless_keys() {
        let doc = parse("input (type=text,  disabled\n  name = \"q\")");
        let attrs = doc.children()[0].attrs();
        let seen: Vec<_> = attrs
            .iter()
            .map(|a| (a.key.as_str(), a.value.as_str(), a.separator.as_str()))
            .collect();
        assert_eq!(
            seen,
            [
                ("type", "text", ""),
                ("disabled", "", ",  "),
                ("name", "q", "\n  "),
            ]
        );
    }

    #[test]
    fn test_heuristic_false_positive_is_preserved() {
        let doc = parse("p { call foo(bar) now }");
        let tags: Vec<_> = doc.children()[0]
            .children()
            .iter()
            .filter_map(Node::tag)
            .collect();
        assert_eq!(tags, ["call", "foo", "now"]);
    }

    #[test]
    fn test_recovery_skips_unexpected_chars() {
        let outcome = EmlHandler::new().parse_with_anomalies("@@ div }", &ParseConfig::default());
        assert_eq!(outcome.document.children(), &[Node::element("div")]);
        let offsets: Vec<_> = outcome.anomalies.iter().map(|a| a.offset).collect();
        assert_eq!(offsets, [0, 1, 7]);
        assert!(outcome
            .anomalies
            .iter()
            .all(|a| a.kind == AnomalyKind::UnexpectedChar));
    }

    #[test]
    fn test_unterminated_constructs() {
        let outcome =
            EmlHandler::new().parse_with_anomalies("div { span", &ParseConfig::default());
        assert!(outcome.has(AnomalyKind::UnterminatedBlock));
        assert_eq!(
            outcome.document.children()[0].children(),
            &[Node::text(" span")]
        );

        let outcome = EmlHandler::new().parse_with_anomalies("/* open", &ParseConfig::default());
        assert!(outcome.has(AnomalyKind::UnterminatedComment));
        assert_eq!(outcome.document.children(), &[Node::comment_block(" open")]);
    }

    #[test]
    fn test_nested_anomaly_offsets_are_absolute() {
        let outcome = EmlHandler::new().parse_with_anomalies("a { b { } @ }", &ParseConfig::default());
        assert_eq!(
            outcome.anomalies,
            [Anomaly {
                offset: 10,
                kind: AnomalyKind::UnexpectedChar
            }]
        );
    }

    #[test]
    fn test_depth_limit_keeps_text() {
        let config = ParseConfig {
            max_depth: 1,
            ..ParseConfig::default()
        };
        let outcome = EmlHandler::new().parse_with_anomalies("a { b { c { } } }", &config);
        assert!(outcome.has(AnomalyKind::DepthLimit));
        let b = &outcome.document.children()[0].children()[0];
        assert_eq!(b.tag(), Some("b"));
        assert_eq!(b.children(), &[Node::text(" c { } ")]);
    }

    #[test]
    fn test_render_element_forms() {
        let output = render(vec![
            Node::element("br"),
            Node::element("div").explicitly_empty(),
            Node::element("h1").with_child(Node::text(" Hello ")),
            Node::element("a")
                .with_attr("href", "/")
                .with_attr("title", "say \"hi\""),
        ]);
        assert_eq!(
            output,
            "br\ndiv {}\nh1 { Hello }\na (href=\"/\", title='say \"hi\"')\n"
        );
    }

    #[test]
    fn test_render_nested_and_comments() {
        let output = render(vec![
            Node::comment("top"),
            Node::whitespace(3),
            Node::element("div")
                .with_child(Node::element("span").with_child(Node::text("Hi")))
                .with_child(Node::comment("a\nb"))
                .with_child(Node::comment_block(" raw ")),
        ]);
        assert_eq!(
            output,
            "// top\n\n\ndiv {\n    span { Hi }\n    /* a\nb */\n    /* raw */\n}\n"
        );
    }

    #[test]
    fn test_render_raw_code_dedents() {
        let output = render(vec![Node::element("body").with_child(Node::raw_code(
            "\n        if ($a) {\n            echo 1;\n        }\n    ",
        ))]);
        assert_eq!(
            output,
            "body {\n    php {\n        if ($a) {\n            echo 1;\n        }\n    }\n}\n"
        );
    }

    #[test]
    fn test_render_empty_raw_code() {
        assert_eq!(render(vec![Node::raw_code("  \n ")]), "php {}\n");
    }

    #[test]
    fn test_markup_only_constructs_render_as_marked_comments() {
        let output = render(vec![
            Node::instruction("xml", "version=\"1.0\""),
            Node::declaration("DOCTYPE html"),
        ]);
        assert_eq!(output, "/*?xml version=\"1.0\"?*/\n/*!DOCTYPE html*/\n");
        assert_eq!(
            parse(&output).children(),
            &[
                Node::comment_block("?xml version=\"1.0\"?"),
                Node::comment_block("!DOCTYPE html"),
            ]
        );
    }

    #[test]
    fn test_block_comments_stay_comments() {
        let doc = parse("/*!important*/\n/*?TODO fix later?*/");
        assert_eq!(
            doc.children(),
            &[
                Node::comment_block("!important"),
                Node::comment_block("?TODO fix later?"),
            ]
        );
    }

    #[test]
    fn test_import_run_without_semicolon() {
        let input = "import ".repeat(40_000);
        let doc = parse(&input);
        assert_eq!(doc.children().len(), 40_000);
        assert!(doc.children().iter().all(|n| n.tag() == Some("import")));

        let doc = parse("import a; import b;");
        assert_eq!(doc.children(), &[Node::import("a"), Node::import("b")]);
    }

    #[test]
    fn test_heuristic_is_ascii_only() {
        assert!(NESTED_EML.is_match("éfoo(x)"));
        assert!(NESTED_EML.is_match("a\x0B{"));
        assert!(!NESTED_EML.is_match("foo\u{a0}(x)"));
        assert!(!NESTED_EML.is_match("9foo(x)"));
        assert!(!NESTED_EML.is_match("plain words"));
    }

    #[test]
    fn test_verbatim_roundtrip() {
        let input = "body {\n    pre {\n        line one\n          line two\n    }\n    code {x < y}\n}\n";
        assert_eq!(roundtrip(input), input);
    }

    #[test]
    fn test_multiline_text_roundtrip() {
        let input = "p {\n    Some text\n    spanning lines\n}\n";
        assert_eq!(roundtrip(input), input);
    }

    #[test]
    fn test_document_roundtrip() {
        let input = "import javafx.scene.control.Label;\n\n// view\nVBox (spacing=\"10\") {\n    Label (text=\"Hi\")\n\n    Button {}\n}\n";
        assert_eq!(roundtrip(input), input);
    }
}
