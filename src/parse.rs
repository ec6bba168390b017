// Copyright (c) 2019 Georg Brandl.  Licensed under the Apache License,
// Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at
// your option. This file may not be copied, modified, or distributed except
// according to those terms.

use pest_derive::Parser;
use tracing::debug_span;

use crate::build::{build, Parsed};
use crate::classify::{classify, ClassifyState};
use crate::diag::Diagnostics;
use crate::error::LexError;
use crate::lexer::Lexer;
use crate::options::ParseOptions;

#[derive(Parser)]
#[grammar = "klartext.pest"]
pub struct KlartextParser;

/// Parse one program with default options.
///
/// `name` is used as program name when the text has no `BEGIN PGM` line.
pub fn parse(name: &str, input: &str) -> Result<Parsed, LexError> {
    parse_with(name, input, &ParseOptions::default())
}

pub fn parse_with(name: &str, input: &str, options: &ParseOptions) -> Result<Parsed, LexError> {
    let _span = debug_span!("parse", program = name).entered();
    let mut diags = Diagnostics::default();
    let mut state = ClassifyState::default();
    let mut blocks = vec![];
    for record in Lexer::new(input) {
        blocks.push(classify(&record?, &mut state, options, &mut diags));
    }
    Ok(build(name, blocks, diags, options))
}

/// Parse several independent programs, given as `(name, text)` pairs.
///
/// With the `parallel` feature the programs are parsed on the rayon thread
/// pool.  Results are in input order either way.
pub fn parse_batch(inputs: &[(&str, &str)], options: &ParseOptions) -> Vec<Result<Parsed, LexError>> {
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        inputs.par_iter().map(|(name, input)| parse_with(name, input, options)).collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        inputs.iter().map(|(name, input)| parse_with(name, input, options)).collect()
    }
}
