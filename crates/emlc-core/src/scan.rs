// SPDX-License-Identifier: AGPL-3.0-or-later
//! Scanning primitives shared by the EML and markup parsers

/// HTML void elements: no content model, no closing tag
pub const VOID_ELEMENTS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose content is kept verbatim in EML
pub const VERBATIM_TAGS: [&str; 4] = ["pre", "code", "script", "style"];

/// Markup elements whose content is raw text up to the matching end tag
pub const RAW_TEXT_ELEMENTS: [&str; 2] = ["script", "style"];

pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

pub fn is_verbatim_tag(tag: &str) -> bool {
    VERBATIM_TAGS.contains(&tag)
}

pub fn is_raw_text_element(tag: &str) -> bool {
    RAW_TEXT_ELEMENTS.contains(&tag)
}

pub fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

pub fn is_ident_part(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':')
}

/// Trim spaces, tabs and line breaks from both ends
pub fn trim_layout(s: &str) -> &str {
    s.trim_matches(|c| matches!(c, ' ' | '\t' | '\n' | '\r'))
}

/// Trim trailing spaces and tabs only
pub fn trim_trailing_horizontal(s: &str) -> &str {
    s.trim_end_matches([' ', '\t'])
}

pub fn count_line_breaks(s: &str) -> usize {
    s.bytes().filter(|&b| b == b'\n').count()
}

/// Byte cursor over a source string.
///
/// Positions are byte offsets. The cursor only ever stops on char
/// boundaries: literal matches are ASCII and single steps advance a whole
/// char.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    /// Move to an absolute offset, clamped to the end of input
    pub fn jump_to(&mut self, pos: usize) {
        self.pos = pos.min(self.input.len());
    }

    pub fn jump_to_end(&mut self) {
        self.pos = self.input.len();
    }

    /// Skip `n` bytes of a literal just matched with [`Cursor::starts_with`]
    pub fn advance_by(&mut self, n: usize) {
        self.jump_to(self.pos + n);
    }

    pub fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    pub fn slice(&self, start: usize, end: usize) -> &'a str {
        &self.input[start..end]
    }

    pub fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    pub fn starts_with(&self, literal: &str) -> bool {
        self.rest().starts_with(literal)
    }

    pub fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    /// Absolute offset of the next occurrence of `pattern` at or after the cursor
    pub fn find(&self, pattern: &str) -> Option<usize> {
        self.rest().find(pattern).map(|i| self.pos + i)
    }

    pub fn read_while(&mut self, predicate: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !predicate(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
        &self.input[start..self.pos]
    }

    /// Skip ASCII whitespace, returning what was skipped
    pub fn skip_whitespace(&mut self) -> &'a str {
        self.read_while(|c| c.is_ascii_whitespace())
    }

    /// Read an attribute value: quoted with `"` or `'`, or bare up to
    /// whitespace or a char matching `stop`.
    ///
    /// The second element is false when a quoted value ran into end of input.
    pub fn read_value(&mut self, stop: impl Fn(char) -> bool) -> (&'a str, bool) {
        match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.bump();
                let value = self.read_while(|c| c != quote);
                let closed = self.bump().is_some();
                (value, closed)
            }
            _ => (
                self.read_while(|c| !c.is_ascii_whitespace() && !stop(c)),
                true,
            ),
        }
    }

    /// Read `= value` after an attribute key.
    ///
    /// Returns `None` with the cursor left in place when no `=` follows, which
    /// makes the key valueless.
    pub fn read_assignment(&mut self, stop: impl Fn(char) -> bool) -> Option<(&'a str, bool)> {
        let after_key = self.pos;
        self.skip_whitespace();
        if self.peek() != Some('=') {
            self.pos = after_key;
            return None;
        }
        self.bump();
        self.skip_whitespace();
        Some(self.read_value(stop))
    }

    /// Read up to the `}` matching an already consumed `{`.
    ///
    /// Returns the inner text and whether the closing brace was found; the
    /// closing brace itself is consumed. Unterminated blocks run to end of
    /// input.
    pub fn read_balanced_braces(&mut self) -> (&'a str, bool) {
        let start = self.pos;
        let mut depth = 1usize;
        for (offset, byte) in self.rest().bytes().enumerate() {
            match byte {
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        let end = start + offset;
                        self.pos = end + 1;
                        return (&self.input[start..end], true);
                    }
                }
                _ => {}
            }
        }
        self.jump_to_end();
        (&self.input[start..], false)
    }
}
