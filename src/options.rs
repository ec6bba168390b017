// Copyright (c) 2019 Georg Brandl.  Licensed under the Apache License,
// Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at
// your option. This file may not be copied, modified, or distributed except
// according to those terms.

use crate::ast::Unit;

/// M functions known to the control and to common DMG machines.
const KNOWN_MCODES: &[u16] = &[
    0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 13, 14, 25, 27, 30,
    89, 90, 91, 92, 94, 97, 98, 99,
    101, 102, 103, 104, 105, 106, 107, 108, 109, 110, 111,
    112, 113, 114, 115, 116, 117, 118, 120, 124, 126, 127, 128, 129,
    130, 134, 135, 136, 137, 138, 140, 141, 142, 143, 144, 145,
    148, 149, 150, 197, 198,
];

/// Knobs for a parse.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Unit assumed when the program has no `BEGIN PGM` line.
    pub default_unit: Unit,
    /// Additional machine-specific M functions that are not reported.
    pub extra_mcodes: Vec<u16>,
    pub warn_unknown_mcodes: bool,
    /// Recognize tool and job metadata in `*` comments.
    pub parse_annotations: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            default_unit: Unit::Millimeters,
            extra_mcodes: Vec::new(),
            warn_unknown_mcodes: true,
            parse_annotations: true,
        }
    }
}

impl ParseOptions {
    pub fn default_unit(mut self, unit: Unit) -> Self {
        self.default_unit = unit;
        self
    }

    pub fn extra_mcodes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.extra_mcodes.extend(codes);
        self
    }

    pub fn warn_unknown_mcodes(mut self, warn: bool) -> Self {
        self.warn_unknown_mcodes = warn;
        self
    }

    pub fn parse_annotations(mut self, parse: bool) -> Self {
        self.parse_annotations = parse;
        self
    }

    pub fn is_known_mcode(&self, code: u16) -> bool {
        KNOWN_MCODES.contains(&code) || self.extra_mcodes.contains(&code)
    }
}
