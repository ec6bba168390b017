// Copyright (c) 2019 Georg Brandl.  Licensed under the Apache License,
// Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at
// your option. This file may not be copied, modified, or distributed except
// according to those terms.

//! Non-fatal findings collected while a program is parsed.

use std::fmt;

use strum_macros::Display;
use tracing::debug;

use crate::ast::LineSpan;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
pub enum Severity {
    #[strum(serialize = "warning")]
    Warning,
    #[strum(serialize = "error")]
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum DiagKind {
    /// A record no grammar matched; replaced by a placeholder comment.
    UnknownBlock,
    MalformedCycleParameter,
    DuplicateCycleParameter,
    MalformedCycle,
    MalformedJump,
    UnknownMCode,
    /// An axis given more than once in one block; the last value wins.
    DuplicateAxis,
    Expression,
    UnresolvedLabel,
    DuplicateLabel,
    MissingSubroutineEnd,
    MalformedBlockForm,
    ProgramFrame,
    MotionBeforeToolCall,
    UncalledCycle,
}

impl DiagKind {
    pub fn severity(self) -> Severity {
        match self {
            DiagKind::UnresolvedLabel |
            DiagKind::DuplicateLabel |
            DiagKind::MalformedBlockForm => Severity::Error,
            _ => Severity::Warning,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagKind,
    pub message: String,
    pub lines: LineSpan,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({}) in {}: {}", self.severity, self.kind, self.lines, self.message)
    }
}

/// Diagnostics of one program.  Only the parser adds to it; once handed to
/// the caller it is read-only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub(crate) fn record(&mut self, kind: DiagKind, lines: LineSpan, message: impl Into<String>) {
        let diag = Diagnostic { severity: kind.severity(), kind, message: message.into(), lines };
        debug!(%diag, "diagnostic");
        self.items.push(diag);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn of_kind(&self, kind: DiagKind) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(move |d| d.kind == kind)
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
