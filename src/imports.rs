//! Lightweight scan for module specifiers in TypeScript/JavaScript source.
//!
//! This is not a parser. It tokenizes just enough (comments, strings,
//! template literals, regex literals) to find the specifier strings of
//! `import`/`export ... from`, `import()`, `require()` and triple-slash
//! `reference` directives without being fooled by text inside comments or
//! strings.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecifierKind {
    /// `import ... from "x"`, `import "x"`, `export ... from "x"`.
    Static,
    /// `import("x")`.
    Dynamic,
    /// `require("x")`.
    Require,
    /// `/// <reference path="x" />`.
    ReferencePath,
    /// `/// <reference types="x" />`.
    ReferenceTypes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSpecifier {
    pub text: String,
    pub kind: SpecifierKind,
}

struct Scanner<'a> {
    bytes: &'a [u8],
    pos: usize,
    /// Last significant byte outside comments, used to tell regex literals
    /// from division.
    last_significant: Option<u8>,
    /// Set after `import`/`export` until the statement's `from` or `;`.
    pending_from: bool,
    found: Vec<ModuleSpecifier>,
}

pub fn scan_specifiers(source: &str) -> Vec<ModuleSpecifier> {
    let mut scanner = Scanner {
        bytes: source.as_bytes(),
        pos: 0,
        last_significant: None,
        pending_from: false,
        found: Vec::new(),
    };
    scanner.run();
    scanner.found
}

impl<'a> Scanner<'a> {
    fn peek(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn run(&mut self) {
        while let Some(byte) = self.peek(0) {
            match byte {
                b'/' if self.peek(1) == Some(b'/') => self.line_comment(),
                b'/' if self.peek(1) == Some(b'*') => self.block_comment(),
                b'/' if self.regex_allowed() => {
                    self.skip_regex();
                    self.last_significant = Some(b'/');
                }
                b'\'' | b'"' => {
                    self.read_string(byte);
                    self.last_significant = Some(byte);
                }
                b'`' => {
                    self.skip_template();
                    self.last_significant = Some(b'`');
                }
                b';' => {
                    self.pending_from = false;
                    self.last_significant = Some(b';');
                    self.pos += 1;
                }
                _ if is_ident_start(byte) => self.identifier(),
                _ if byte.is_ascii_whitespace() => self.pos += 1,
                _ => {
                    self.last_significant = Some(byte);
                    self.pos += 1;
                }
            }
        }
    }

    fn regex_allowed(&self) -> bool {
        match self.last_significant {
            None => true,
            Some(prev) => matches!(
                prev,
                b'(' | b',' | b'=' | b':' | b'[' | b'!' | b'&' | b'|' | b'?' | b'{' | b'}' | b';'
                    | b'+' | b'-' | b'*' | b'%' | b'<' | b'>' | b'~' | b'^'
            ),
        }
    }

    fn line_comment(&mut self) {
        let start = self.pos;
        self.pos = memchr::memchr(b'\n', &self.bytes[start..])
            .map(|offset| start + offset)
            .unwrap_or(self.bytes.len());
        let text = String::from_utf8_lossy(&self.bytes[start..self.pos]);
        if let Some(directive) = text.strip_prefix("///") {
            self.reference_directive(directive);
        }
    }

    fn reference_directive(&mut self, directive: &str) {
        let directive = directive.trim_start();
        if !directive.starts_with("<reference") {
            return;
        }
        if let Some(path) = attribute_value(directive, "path") {
            self.push(path, SpecifierKind::ReferencePath);
        } else if let Some(types) = attribute_value(directive, "types") {
            self.push(types, SpecifierKind::ReferenceTypes);
        }
    }

    fn block_comment(&mut self) {
        self.pos += 2;
        while let Some(byte) = self.peek(0) {
            if byte == b'*' && self.peek(1) == Some(b'/') {
                self.pos += 2;
                return;
            }
            self.pos += 1;
        }
    }

    /// Read a quoted string starting at the current position and return its
    /// contents (escapes are kept verbatim, which is fine for specifiers).
    fn read_string(&mut self, quote: u8) -> String {
        self.pos += 1;
        let start = self.pos;
        while let Some(byte) = self.peek(0) {
            if byte == b'\\' {
                self.pos += 2;
                continue;
            }
            if byte == quote || byte == b'\n' {
                break;
            }
            self.pos += 1;
        }
        let end = self.pos.min(self.bytes.len());
        let text = String::from_utf8_lossy(&self.bytes[start..end]).into_owned();
        if self.peek(0) == Some(quote) {
            self.pos += 1;
        }
        text
    }

    fn skip_template(&mut self) {
        self.pos += 1;
        let mut depth = 0usize;
        while let Some(byte) = self.peek(0) {
            match byte {
                b'\\' => {
                    self.pos += 2;
                    continue;
                }
                b'$' if self.peek(1) == Some(b'{') => {
                    depth += 1;
                    self.pos += 2;
                    continue;
                }
                b'}' if depth > 0 => depth -= 1,
                b'`' if depth == 0 => {
                    self.pos += 1;
                    return;
                }
                _ => {}
            }
            self.pos += 1;
        }
    }

    fn skip_regex(&mut self) {
        self.pos += 1;
        let mut in_class = false;
        while let Some(byte) = self.peek(0) {
            match byte {
                b'\\' => {
                    self.pos += 2;
                    continue;
                }
                b'\n' => return,
                b'[' => in_class = true,
                b']' => in_class = false,
                b'/' if !in_class => {
                    self.pos += 1;
                    while self.peek(0).is_some_and(|b| b.is_ascii_alphabetic()) {
                        self.pos += 1;
                    }
                    return;
                }
                _ => {}
            }
            self.pos += 1;
        }
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek(0) {
                Some(byte) if byte.is_ascii_whitespace() => self.pos += 1,
                Some(b'/') if self.peek(1) == Some(b'*') => self.block_comment(),
                Some(b'/') if self.peek(1) == Some(b'/') => self.line_comment(),
                _ => return,
            }
        }
    }

    fn identifier(&mut self) {
        let start = self.pos;
        while self.peek(0).is_some_and(is_ident_part) {
            self.pos += 1;
        }
        let is_member_access = self.last_significant == Some(b'.');
        let word = &self.bytes[start..self.pos];
        self.last_significant = Some(b'a');
        if is_member_access {
            return;
        }

        match word {
            b"import" => self.after_import(),
            b"export" => self.pending_from = true,
            b"require" => self.call_with_string(SpecifierKind::Require),
            b"from" if self.pending_from => {
                self.skip_trivia();
                if let Some(quote @ (b'\'' | b'"')) = self.peek(0) {
                    let text = self.read_string(quote);
                    self.push(&text, SpecifierKind::Static);
                    self.last_significant = Some(quote);
                    self.pending_from = false;
                }
            }
            _ => {}
        }
    }

    fn after_import(&mut self) {
        self.skip_trivia();
        match self.peek(0) {
            Some(b'(') => self.call_with_string(SpecifierKind::Dynamic),
            Some(quote @ (b'\'' | b'"')) => {
                let text = self.read_string(quote);
                self.push(&text, SpecifierKind::Static);
                self.last_significant = Some(quote);
            }
            // import.meta
            Some(b'.') => {}
            _ => self.pending_from = true,
        }
    }

    /// `(` followed by a single string literal argument.
    fn call_with_string(&mut self, kind: SpecifierKind) {
        self.skip_trivia();
        if self.peek(0) != Some(b'(') {
            return;
        }
        self.pos += 1;
        self.last_significant = Some(b'(');
        self.skip_trivia();
        if let Some(quote @ (b'\'' | b'"')) = self.peek(0) {
            let text = self.read_string(quote);
            self.last_significant = Some(quote);
            self.skip_trivia();
            if self.peek(0) == Some(b')') {
                self.push(&text, kind);
            }
        }
    }

    fn push(&mut self, text: &str, kind: SpecifierKind) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        self.found.push(ModuleSpecifier {
            text: text.to_string(),
            kind,
        });
    }
}

fn attribute_value<'s>(directive: &'s str, name: &str) -> Option<&'s str> {
    let mut offset = 0;
    let bytes = directive.as_bytes();
    let needle = format!("{name}=");
    while let Some(idx) = directive[offset..].find(&needle) {
        let start = offset + idx;
        if start > 0 && !bytes[start - 1].is_ascii_whitespace() {
            offset = start + needle.len();
            continue;
        }
        let quote = *bytes.get(start + needle.len())?;
        if quote != b'"' && quote != b'\'' {
            offset = start + needle.len();
            continue;
        }
        let rest = &directive[start + needle.len() + 1..];
        let end = rest.find(quote as char)?;
        return Some(&rest[..end]);
    }
    None
}

fn is_ident_start(byte: u8) -> bool {
    byte.is_ascii_alphabetic() || byte == b'_' || byte == b'$' || byte >= 0x80
}

fn is_ident_part(byte: u8) -> bool {
    is_ident_start(byte) || byte.is_ascii_digit()
}
