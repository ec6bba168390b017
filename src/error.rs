// Copyright (c) 2019 Georg Brandl.  Licensed under the Apache License,
// Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at
// your option. This file may not be copied, modified, or distributed except
// according to those terms.

use thiserror::Error;

use crate::parse::Rule;

/// The only fatal error: parsing of the program stops.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("unterminated quoted string starting at line {line}, column {column}")]
    UnterminatedQuote { line: usize, column: usize },
}

/// A malformed numeric or variable expression.
#[derive(Debug, Error)]
pub enum ExprError {
    #[error("malformed expression `{text}`: {message}")]
    Syntax {
        text: String,
        message: String,
        #[source]
        source: Box<pest::error::Error<Rule>>,
    },
    #[error("missing expression")]
    Empty,
}

/// A record that does not match the grammar its keyword selected.
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("unknown block `{0}`")]
    UnknownKeyword(String),
    #[error("malformed {what} block: {message}")]
    Syntax {
        what: &'static str,
        message: String,
        #[source]
        source: Box<pest::error::Error<Rule>>,
    },
    #[error("{0}")]
    Semantic(String),
}
