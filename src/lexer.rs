// Copyright (c) 2019 Georg Brandl.  Licensed under the Apache License,
// Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at
// your option. This file may not be copied, modified, or distributed except
// according to those terms.

//! Splitting of program text into logical records.
//!
//! A record is one block of the program: usually a single physical line, but
//! a line ending in the continuation marker `~` is joined with the following
//! line(s).  The lexer also strips the leading block number and block-skip
//! slash, and splits the code part of each record into whitespace-separated
//! tokens, keeping double-quoted segments together.

use std::iter::Enumerate;
use std::str::Lines;

use crate::ast::LineSpan;
use crate::error::LexError;

/// Trailing character that joins a physical line to the next one.
pub const CONTINUATION: char = '~';
/// Starts a plain remark, either a whole line or the tail of a code line.
pub const REMARK: char = ';';
/// Starts an annotation line (tool and job metadata written by the CAM system).
pub const ANNOTATION: char = '*';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Code,
    Remark,
    Annotation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub quoted: bool,
}

/// One logical record of the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub lines: LineSpan,
    pub number: Option<u32>,
    pub skip: bool,
    pub kind: RecordKind,
    /// Source text without block number, skip marker and continuation
    /// markers; physical segments are separated by `\n`.
    pub text: String,
    /// Tokens of the code part (remarks excluded).  Empty for comment records.
    pub tokens: Vec<Token>,
}

impl Record {
    /// Token texts of the leading unquoted words.
    pub fn head(&self, n: usize) -> impl Iterator<Item = &str> {
        self.tokens.iter().take(n).map(|t| if t.quoted { "" } else { t.text.as_str() })
    }
}

/// Lazy iterator over the records of a program text.
pub struct Lexer<'a> {
    lines: Enumerate<Lines<'a>>,
    failed: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer { lines: input.lines().enumerate(), failed: false }
    }

    fn next_record(&mut self) -> Option<Result<Record, LexError>> {
        // skip blank lines
        let (idx, first) = loop {
            let (idx, line) = self.lines.next()?;
            if !line.trim().is_empty() {
                break (idx, line);
            }
        };
        let lineno = idx + 1;
        let (number, skip, body) = split_prefix(first);
        // columns count from the start of the physical line
        let mut offset = first[..first.len() - body.len()].chars().count();
        let kind = match body.chars().next() {
            Some(REMARK) => RecordKind::Remark,
            Some(ANNOTATION) => RecordKind::Annotation,
            _ => RecordKind::Code,
        };

        let mut record = Record {
            lines: LineSpan::new(lineno, lineno),
            number,
            skip,
            kind,
            text: String::new(),
            tokens: Vec::new(),
        };
        let mut tokens = Tokenizer::default();
        let mut segment = body;
        let mut seg_line = lineno;
        loop {
            let (content, continued) = strip_continuation(segment);
            if seg_line != lineno {
                record.text.push('\n');
            }
            record.text.push_str(content);
            if kind == RecordKind::Code {
                tokens.feed(content, seg_line, offset);
            }
            offset = 0;
            // a quote may span lines only through `~`
            if !continued {
                break;
            }
            match self.lines.next() {
                Some((idx, line)) => {
                    seg_line = idx + 1;
                    record.lines.last = seg_line;
                    segment = line;
                }
                None => break,
            }
        }
        if let Some((line, column)) = tokens.open {
            return Some(Err(LexError::UnterminatedQuote { line, column }));
        }
        record.tokens = tokens.finish();
        Some(Ok(record))
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Record, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let item = self.next_record();
        if let Some(Err(_)) = item {
            self.failed = true;
        }
        item
    }
}

/// Split off the block number and block-skip slash of a record's first line.
fn split_prefix(line: &str) -> (Option<u32>, bool, &str) {
    let mut rest = line.trim_start();
    let mut skip = false;
    if let Some(r) = rest.strip_prefix('/') {
        skip = true;
        rest = r.trim_start();
    }
    let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    let mut number = None;
    if digits > 0 {
        let tail = &rest[digits..];
        if tail.is_empty() || tail.starts_with(char::is_whitespace) {
            number = rest[..digits].parse().ok();
            if number.is_some() {
                rest = tail.trim_start();
            }
        }
    }
    if let Some(r) = rest.strip_prefix('/') {
        skip = true;
        rest = r.trim_start();
    }
    (number, skip, rest)
}

fn strip_continuation(segment: &str) -> (&str, bool) {
    let trimmed = segment.trim_end();
    match trimmed.strip_suffix(CONTINUATION) {
        Some(content) => (content, true),
        None => (trimmed, false),
    }
}

#[derive(Default)]
struct Tokenizer {
    tokens: Vec<Token>,
    current: String,
    in_token: bool,
    /// Position of a quote that is still open.
    open: Option<(usize, usize)>,
}

impl Tokenizer {
    /// Tokenize one physical segment; `offset` is the column of its first
    /// character minus one.
    fn feed(&mut self, segment: &str, lineno: usize, offset: usize) {
        for (col, ch) in segment.chars().enumerate() {
            if self.open.is_some() {
                if ch == '"' {
                    self.open = None;
                    self.push(true);
                } else {
                    self.current.push(ch);
                }
                continue;
            }
            match ch {
                '"' => {
                    self.push(false);
                    self.open = Some((lineno, offset + col + 1));
                    self.in_token = true;
                }
                REMARK => {
                    self.push(false);
                    return;
                }
                c if c.is_whitespace() => self.push(false),
                c => {
                    self.current.push(c);
                    self.in_token = true;
                }
            }
        }
        if self.open.is_some() {
            self.current.push('\n');
        } else {
            self.push(false);
        }
    }

    fn push(&mut self, quoted: bool) {
        if self.in_token {
            let text = std::mem::take(&mut self.current);
            self.tokens.push(Token { text, quoted });
            self.in_token = false;
        }
    }

    fn finish(mut self) -> Vec<Token> {
        self.push(false);
        self.tokens
    }
}
