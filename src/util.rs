// Copyright (c) 2019 Georg Brandl.  Licensed under the Apache License,
// Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at
// your option. This file may not be copied, modified, or distributed except
// according to those terms.

use crate::ast::Expr;

/// Helper for converting a decimal digit string to an integer below `max`,
/// or a suitable error.
pub fn num_to_int<T>(inp: &str, max: u32, err: impl FnOnce(&str) -> T) -> Result<u32, T> {
    match inp.trim().parse::<u32>() {
        Ok(v) if v < max => Ok(v),
        _ => Err(err(inp)),
    }
}

/// Format the value of an address word (`X-95`, `A+Q120`): literals as they
/// are, anything else with an explicit sign so it reads as one word.
pub fn fmt_word(value: &Expr) -> String {
    match value {
        Expr::Num(n) => format!("{}", n),
        _ if starts_negative(value) => format!("{}", value),
        _ => format!("+{}", value),
    }
}

/// Format a value with an explicit sign (`DL+0`, `IF +Q1900 EQU +1`).
pub fn fmt_signed(value: &Expr) -> String {
    match value {
        Expr::Num(n) if n.is_sign_negative() && *n != 0. => format!("{}", n),
        Expr::Num(n) => format!("+{}", n.abs()),
        _ if starts_negative(value) => format!("{}", value),
        _ => format!("+{}", value),
    }
}

fn starts_negative(value: &Expr) -> bool {
    match value {
        Expr::Num(n) => n.is_sign_negative(),
        Expr::Var(_) => false,
        Expr::Neg(_) => true,
        Expr::Op(_, lhs, _) => starts_negative(lhs),
    }
}
