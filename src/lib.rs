// Copyright (c) 2019 Georg Brandl.  Licensed under the Apache License,
// Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at
// your option. This file may not be copied, modified, or distributed except
// according to those terms.

//! A parsing library for [Heidenhain] conversational ("Klartext") NC
//! programs, as written by CAM post-processors into `.h` files.
//!
//! The text is split into records by a line-oriented lexer, each record is
//! classified into a typed block using a Pest grammar, and the blocks are
//! assembled into a `Program` with resolved label references.  Problems that
//! do not prevent building the program are recorded as diagnostics.
//!
//! [Heidenhain]: https://www.heidenhain.com/
//!
//! ## Basic usage
//!
//! Use `klartext::parse::parse` to get a `Parsed` program and its
//! diagnostics, then work with the datastructures from `klartext::ast`.
//!
//! The following code (the same as the "klartext-parse" demo binary) takes a
//! file as an argument, parses it and outputs the display form, which is the
//! same program in a consistent format.
//!
//! ```rust,no_run
//! use std::{env, fs};
//! use klartext::parse::parse;
//!
//! fn main() {
//!     let filename = env::args().nth(1).unwrap();
//!     let input = fs::read_to_string(&filename).unwrap();
//!
//!     match parse(&filename, &input) {
//!         Err(e) => eprintln!("Parse error: {}", e),
//!         Ok(parsed) => {
//!             print!("{}", parsed.program);
//!             for diag in &parsed.diagnostics {
//!                 eprintln!("{}", diag);
//!             }
//!         }
//!     }
//! }
//! ```
//!
//! ## Unsupported features
//!
//! Programs are not executed: Q parameters are kept as symbolic expressions,
//! and cycle semantics are not interpreted beyond their parameter lists.

pub mod annotate;
pub mod ast;
pub mod build;
pub mod classify;
pub mod diag;
pub mod error;
pub mod expr;
pub mod lexer;
pub mod options;
pub mod parse;

// internal helpers
pub(crate) mod util;
