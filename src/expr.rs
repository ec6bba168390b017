// Copyright (c) 2019 Georg Brandl.  Licensed under the Apache License,
// Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at
// your option. This file may not be copied, modified, or distributed except
// according to those terms.

//! Expressions in parameter assignments, cycle parameters and address words.
//!
//! Values are never evaluated here: `Q` parameters depend on machine state,
//! so references stay references.

use itertools::Itertools;
use pest::Parser;
use pest::iterators::Pair;

use crate::ast::{Expr, LineSpan, Op};
use crate::diag::{DiagKind, Diagnostics};
use crate::error::ExprError;
use crate::parse::{KlartextParser, Rule};

/// Parse an expression: an optionally signed literal or variable reference,
/// or a chain of them joined by `+` and `-`.
pub fn parse_expr(text: &str) -> Result<Expr, ExprError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ExprError::Empty);
    }
    let mut pairs = KlartextParser::parse(Rule::expression, text).map_err(|e| ExprError::Syntax {
        text: text.into(),
        message: e.variant.message().into_owned(),
        source: Box::new(e),
    })?;
    let entry = pairs.next().expect("expression");
    let expr = entry.into_inner().next().expect("expr before EOI");
    Ok(make_expr(expr))
}

/// Like `parse_expr`, but a malformed expression is recorded as diagnostic
/// and replaced by zero.
pub fn resolve(text: &str, lines: LineSpan, diags: &mut Diagnostics) -> Expr {
    parse_expr(text).unwrap_or_else(|e| {
        diags.record(DiagKind::Expression, lines, e.to_string());
        Expr::Num(0.)
    })
}

fn make_expr(pair: Pair<Rule>) -> Expr {
    let mut inner = pair.into_inner();
    let mut lhs = make_term(inner.next().expect("first term"));
    for (op, rhs) in inner.tuples() {
        let op = match op.as_str() {
            "+" => Op::Add,
            _ => Op::Sub,
        };
        lhs = Expr::Op(op, Box::new(lhs), Box::new(make_term(rhs)));
    }
    lhs
}

fn make_term(pair: Pair<Rule>) -> Expr {
    let mut negative = false;
    for part in pair.into_inner() {
        match part.as_rule() {
            Rule::sign => negative = part.as_str() == "-",
            Rule::number => {
                let n: f64 = part.as_str().parse().expect("valid number");
                return Expr::Num(if negative { -n } else { n });
            }
            Rule::q_ref => {
                let var = Expr::Var(part.as_str().into());
                return if negative { Expr::Neg(Box::new(var)) } else { var };
            }
            _ => unreachable!()
        }
    }
    unreachable!("term without value")
}
