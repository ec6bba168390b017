// Copyright (c) 2019 Georg Brandl.  Licensed under the Apache License,
// Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at
// your option. This file may not be copied, modified, or distributed except
// according to those terms.

//! Turning records into blocks.
//!
//! The leading keyword of a record selects one grammar rule; the record text
//! is then parsed with that rule and the resulting pairs are converted into
//! a `BlockKind`.  A record no rule accepts becomes a placeholder comment and
//! a diagnostic, so the rest of the program is still parsed.

use std::str::FromStr;

use itertools::Itertools;
use pest::Parser;
use pest::iterators::{Pair, Pairs};
use tracing::trace;

use crate::annotate::parse_annotation;
use crate::ast::*;
use crate::diag::{DiagKind, Diagnostics};
use crate::error::ClassifyError;
use crate::expr;
use crate::lexer::{Record, RecordKind};
use crate::options::ParseOptions;
use crate::parse::{KlartextParser, Rule};
use crate::util::num_to_int;

type ClassifyResult<T> = Result<T, ClassifyError>;

/// Keywords selecting a grammar rule.  Two-word keywords come first, so they
/// win over a one-word keyword matching the same record.
const KEYWORDS: &[(&[&str], Rule)] = &[
    (&["BEGIN", "PGM"], Rule::program_begin),
    (&["END", "PGM"], Rule::program_end),
    (&["TOOL", "CALL"], Rule::tool_call),
    (&["CYCL", "DEF"], Rule::cycle_def),
    (&["CYCL", "CALL"], Rule::cycle_call),
    (&["BLK", "FORM"], Rule::blk_form),
    (&["CALL", "LBL"], Rule::call_lbl),
    (&["FN", "0"], Rule::fn_assign),
    (&["FN", "9"], Rule::fn_jump),
    (&["FN", "10"], Rule::fn_jump),
    (&["FN", "11"], Rule::fn_jump),
    (&["FN", "12"], Rule::fn_jump),
    (&["LBL"], Rule::label),
    (&["PLANE"], Rule::plane),
    (&["FUNCTION"], Rule::function),
    (&["L"], Rule::linear),
];

/// Running state carried from one record to the next.
#[derive(Debug, Default)]
pub struct ClassifyState {
    /// Cycle number of the preceding code block, if it was a cycle definition.
    previous_cycle: Option<u16>,
}

/// Classify one record.  Never fails: problems end up in `diags`.
pub fn classify(record: &Record, state: &mut ClassifyState, options: &ParseOptions,
                diags: &mut Diagnostics) -> Block {
    let mut cx = Context { record, options, diags, remark: None };
    let kind = match record.kind {
        RecordKind::Remark => BlockKind::Comment(Comment {
            kind: CommentKind::Remark,
            text: record.text[1..].into(),
            annotation: None,
        }),
        RecordKind::Annotation => {
            let text = &record.text[1..];
            BlockKind::Comment(Comment {
                kind: CommentKind::Annotation,
                text: text.into(),
                annotation: if options.parse_annotations { parse_annotation(text) } else { None },
            })
        }
        RecordKind::Code => match cx.make_block(state) {
            Ok(kind) => kind,
            Err(e) => {
                cx.diags.record(DiagKind::UnknownBlock, record.lines, e.to_string());
                cx.remark = None;
                BlockKind::Comment(Comment {
                    kind: CommentKind::Unrecognized,
                    text: record.text.clone(),
                    annotation: None,
                })
            }
        },
    };
    match &kind {
        BlockKind::Comment(_) => (),
        BlockKind::CycleDefinition(cycle) => state.previous_cycle = Some(cycle.number),
        BlockKind::PlaneTransform(PlaneTransform { kind: PlaneKind::DatumShift { .. }, .. }) =>
            state.previous_cycle = Some(7),
        _ => state.previous_cycle = None,
    }
    trace!(lines = %record.lines, ?kind, "classified");
    Block {
        lines: record.lines,
        number: record.number,
        skip: record.skip,
        kind,
        remark: cx.remark,
    }
}

/// Pick the grammar rule for a code record from its leading tokens.
fn keyword_rule(record: &Record) -> Option<Rule> {
    let head = record.head(2).collect_vec();
    for (words, rule) in KEYWORDS {
        if words.len() <= head.len() &&
            words.iter().zip(&head).all(|(kw, tok)| matches_keyword(tok, kw)) {
            return Some(*rule);
        }
    }
    let first = *head.first()?;
    if first.len() > 1 && first.starts_with('M') && first[1..].chars().all(|c| c.is_ascii_digit()) {
        return Some(Rule::misc);
    }
    let var = first.trim_start_matches("QL").trim_start_matches("QR").trim_start_matches('Q');
    if var.len() < first.len() && var.starts_with(|c: char| c.is_ascii_digit()) {
        return Some(Rule::q_assign);
    }
    None
}

/// A token matches a keyword exactly, or with a number glued to it
/// (`DEF9`, `0:Q2=105`).
fn matches_keyword(token: &str, keyword: &str) -> bool {
    match token.strip_prefix(keyword) {
        Some("") => true,
        Some(rest) => rest.starts_with(|c: char| c.is_ascii_digit() || c == ':'),
        None => false,
    }
}

fn describe(rule: Rule) -> &'static str {
    match rule {
        Rule::program_begin | Rule::program_end => "program frame",
        Rule::tool_call => "tool call",
        Rule::cycle_def => "cycle definition",
        Rule::cycle_call => "cycle call",
        Rule::blk_form => "block form",
        Rule::call_lbl | Rule::fn_jump => "jump",
        Rule::fn_assign | Rule::q_assign => "parameter assignment",
        Rule::label => "label",
        Rule::plane => "plane",
        Rule::function => "function",
        Rule::linear => "linear move",
        Rule::misc => "M function",
        _ => "unknown",
    }
}

struct Context<'a> {
    record: &'a Record,
    options: &'a ParseOptions,
    diags: &'a mut Diagnostics,
    remark: Option<String>,
}

impl<'a> Context<'a> {
    fn make_block(&mut self, state: &ClassifyState) -> ClassifyResult<BlockKind> {
        let record = self.record;
        let rule = keyword_rule(record).ok_or_else(|| {
            ClassifyError::UnknownKeyword(record.head(2).join(" ").trim().into())
        })?;
        let mut pairs = KlartextParser::parse(rule, &record.text).map_err(|e| ClassifyError::Syntax {
            what: describe(rule),
            message: e.variant.message().into_owned(),
            source: Box::new(e),
        })?;
        let pairs = pairs.next().expect("block rule").into_inner();
        match rule {
            Rule::program_begin | Rule::program_end => self.make_frame(rule, pairs),
            Rule::tool_call => self.make_tool_call(pairs),
            Rule::linear => self.make_move(pairs),
            Rule::misc => {
                let codes = self.make_mcodes(pairs)?;
                if codes.is_empty() {
                    return Err(ClassifyError::Semantic("no usable M function".into()));
                }
                Ok(BlockKind::Misc(codes))
            }
            Rule::cycle_def => self.make_cycle_def(pairs, state),
            Rule::cycle_call => self.make_mcodes(pairs).map(BlockKind::CycleCall),
            Rule::blk_form => self.make_blk_form(pairs),
            Rule::fn_assign | Rule::q_assign => self.make_assignment(pairs),
            Rule::fn_jump => self.make_jump(pairs),
            Rule::label => self.make_label(pairs),
            Rule::call_lbl => self.make_call(pairs),
            Rule::plane => self.make_plane(pairs),
            Rule::function => self.make_function(pairs),
            _ => unreachable!()
        }
    }

    fn expr(&mut self, text: &str) -> Expr {
        expr::resolve(text, self.record.lines, self.diags)
    }

    fn set_remark(&mut self, pair: Pair<Rule>) {
        self.remark = Some(remark_text(pair));
    }

    fn mcode(&mut self, pair: Pair<Rule>, codes: &mut MCodes) {
        let (num,) = pair.into_inner().collect_tuple().expect("M number");
        let lines = self.record.lines;
        match num_to_int(num.as_str(), u16::MAX as u32 + 1, |s| format!("M{} is out of range", s)) {
            Ok(code) => {
                let code = code as u16;
                if self.options.warn_unknown_mcodes && !self.options.is_known_mcode(code) {
                    self.diags.record(DiagKind::UnknownMCode, lines, format!("unknown M function M{}", code));
                }
                codes.insert(code);
            }
            Err(msg) => self.diags.record(DiagKind::UnknownMCode, lines, msg),
        }
    }

    fn axis_word(&mut self, pair: Pair<Rule>) -> (Axis, Expr) {
        let (axis, value) = pair.into_inner().collect_tuple().expect("axis and value");
        let axis = Axis::from_str(axis.as_str()).expect("grammar axis");
        (axis, self.expr(value.as_str()))
    }

    fn coord(&mut self, pair: Pair<Rule>, coords: &mut Coords) {
        let (axis, value) = self.axis_word(pair);
        if coords.insert(axis, value) {
            self.diags.record(DiagKind::DuplicateAxis, self.record.lines,
                              format!("axis {} given twice", axis));
        }
    }

    fn make_frame(&mut self, rule: Rule, pairs: Pairs<Rule>) -> ClassifyResult<BlockKind> {
        let mut name = String::new();
        let mut unit = Unit::default();
        for pair in pairs {
            match pair.as_rule() {
                Rule::pgm_name => name = pair.as_str().into(),
                Rule::unit => unit = Unit::from_str(pair.as_str()).expect("grammar unit"),
                Rule::remark => self.set_remark(pair),
                Rule::EOI => (),
                _ => unreachable!()
            }
        }
        Ok(if rule == Rule::program_begin {
            BlockKind::ProgramBegin { name, unit }
        } else {
            BlockKind::ProgramEnd { name, unit }
        })
    }

    fn make_tool_call(&mut self, pairs: Pairs<Rule>) -> ClassifyResult<BlockKind> {
        let mut tc = ToolCall {
            id: ToolId::Number(0),
            axis: None,
            spindle_speed: None,
            feed: None,
            length_offset: None,
            radius_offset: None,
            radius_offset2: None,
        };
        for pair in pairs {
            match pair.as_rule() {
                Rule::tool_id => {
                    let (id,) = pair.into_inner().collect_tuple().expect("tool id");
                    tc.id = match id.as_rule() {
                        Rule::quoted => ToolId::Name(quoted_text(id)),
                        _ => ToolId::Number(parse_number(id.as_str(), "tool number")?),
                    };
                }
                Rule::spindle_axis => tc.axis = Some(Axis::from_str(pair.as_str()).expect("grammar axis")),
                Rule::tool_word => {
                    let (key, value) = pair.into_inner().collect_tuple().expect("key and value");
                    let value = Some(self.expr(value.as_str()));
                    match key.as_str() {
                        "S" => tc.spindle_speed = value,
                        "F" => tc.feed = value,
                        "DL" => tc.length_offset = value,
                        "DR" => tc.radius_offset = value,
                        _ => tc.radius_offset2 = value,
                    }
                }
                Rule::remark => self.set_remark(pair),
                Rule::EOI => (),
                _ => unreachable!()
            }
        }
        Ok(BlockKind::ToolCall(tc))
    }

    fn make_move(&mut self, pairs: Pairs<Rule>) -> ClassifyResult<BlockKind> {
        let mut mv = Move::default();
        for pair in pairs {
            match pair.as_rule() {
                Rule::axis_word => self.coord(pair, &mut mv.coords),
                Rule::radius_comp => mv.radius_comp = Some(RadiusComp::from_str(pair.as_str())
                                                           .expect("grammar radius comp")),
                Rule::feed_max => mv.feed = Some(Feed::Max),
                Rule::feed_auto => mv.feed = Some(Feed::Auto),
                Rule::feed => {
                    let (value,) = pair.into_inner().collect_tuple().expect("feed value");
                    mv.feed = Some(Feed::Value(self.expr(value.as_str())));
                }
                Rule::m_code => self.mcode(pair, &mut mv.mcodes),
                Rule::remark => self.set_remark(pair),
                Rule::EOI => (),
                _ => unreachable!()
            }
        }
        Ok(BlockKind::Move(mv))
    }

    fn make_mcodes(&mut self, pairs: Pairs<Rule>) -> ClassifyResult<MCodes> {
        let mut codes = MCodes::new();
        for pair in pairs {
            match pair.as_rule() {
                Rule::m_code => self.mcode(pair, &mut codes),
                Rule::remark => self.set_remark(pair),
                Rule::EOI => (),
                _ => unreachable!()
            }
        }
        Ok(codes)
    }

    fn make_cycle_def(&mut self, pairs: Pairs<Rule>, state: &ClassifyState) -> ClassifyResult<BlockKind> {
        let lines = self.record.lines;
        let mut cycle = CycleDefinition { number: 0, step: None, title: None, params: vec![] };
        for pair in pairs {
            match pair.as_rule() {
                Rule::cycle_no => {
                    let mut parts = pair.into_inner();
                    let number = parts.next().expect("cycle number");
                    cycle.number = parse_number(number.as_str(), "cycle number")?;
                    if let Some(step) = parts.next() {
                        cycle.step = Some(parse_number(step.as_str(), "cycle step")?);
                    }
                }
                Rule::cycle_title => cycle.title = Some(pair.as_str().trim().into()),
                Rule::cycle_param => {
                    let (key, value) = pair.into_inner().collect_tuple().expect("key and value");
                    let key: u16 = match parse_number(key.as_str(), "cycle parameter") {
                        Ok(key) => key,
                        Err(e) => {
                            self.diags.record(DiagKind::MalformedCycleParameter, lines, e.to_string());
                            continue;
                        }
                    };
                    if cycle.params.iter().any(|p| p.key == key) {
                        self.diags.record(DiagKind::DuplicateCycleParameter, lines,
                                          format!("Q{} given twice in cycle {}", key, cycle.number));
                        continue;
                    }
                    let value = self.expr(value.as_str());
                    cycle.params.push(CycleParam { key, value, hint: None });
                }
                Rule::remark => {
                    // a remark after a parameter is its display label
                    match cycle.params.last_mut() {
                        Some(param) if param.hint.is_none() => param.hint = Some(remark_text(pair)),
                        Some(_) => (),
                        None => self.set_remark(pair),
                    }
                }
                Rule::stray => self.diags.record(
                    DiagKind::MalformedCycleParameter, lines,
                    format!("`{}` is not a Qnnn= cycle parameter", pair.as_str())),
                Rule::EOI => (),
                _ => unreachable!()
            }
        }
        if let Some(step) = cycle.step {
            if step > 0 && state.previous_cycle != Some(cycle.number) {
                self.diags.record(DiagKind::MalformedCycle, lines,
                                  format!("CYCL DEF {}.{} without preceding CYCL DEF {}.0",
                                          cycle.number, step, cycle.number));
            }
        }
        if cycle.number == 7 {
            return self.make_datum_shift(cycle);
        }
        Ok(BlockKind::CycleDefinition(cycle))
    }

    /// The old-style datum shift: `CYCL DEF 7.0` followed by one
    /// `CYCL DEF 7.n <axis><value>` block per shifted axis.
    fn make_datum_shift(&mut self, cycle: CycleDefinition) -> ClassifyResult<BlockKind> {
        let step = cycle.step.unwrap_or(0);
        let mut params = vec![];
        if step > 0 {
            let text = cycle.title.unwrap_or_default();
            let mut pairs = KlartextParser::parse(Rule::coords, &text).map_err(|e| ClassifyError::Syntax {
                what: "datum shift",
                message: e.variant.message().into_owned(),
                source: Box::new(e),
            })?;
            for pair in pairs.next().expect("coords").into_inner() {
                if pair.as_rule() == Rule::axis_word {
                    let (axis, value) = self.axis_word(pair);
                    params.push((axis.to_string(), value));
                }
            }
        }
        Ok(BlockKind::PlaneTransform(PlaneTransform {
            kind: PlaneKind::DatumShift { step },
            params,
            options: vec![],
        }))
    }

    fn make_blk_form(&mut self, pairs: Pairs<Rule>) -> ClassifyResult<BlockKind> {
        let mut bf = BlockForm { corner: Corner::Min, axis: None, coords: Coords::default() };
        for pair in pairs {
            match pair.as_rule() {
                Rule::blk_corner => bf.corner = if pair.as_str() == "0.1" { Corner::Min } else { Corner::Max },
                Rule::spindle_axis => bf.axis = Some(Axis::from_str(pair.as_str()).expect("grammar axis")),
                Rule::axis_word => self.coord(pair, &mut bf.coords),
                Rule::remark => self.set_remark(pair),
                Rule::EOI => (),
                _ => unreachable!()
            }
        }
        Ok(BlockKind::BlockForm(bf))
    }

    fn make_assignment(&mut self, pairs: Pairs<Rule>) -> ClassifyResult<BlockKind> {
        let mut target = String::new();
        let mut value = Expr::Num(0.);
        for pair in pairs {
            match pair.as_rule() {
                Rule::q_target => target = pair.as_str().into(),
                Rule::assign_value => value = self.expr(pair.as_str()),
                Rule::remark => self.set_remark(pair),
                Rule::EOI => (),
                _ => unreachable!()
            }
        }
        Ok(BlockKind::ParameterAssignment(ParameterAssignment { target, value }))
    }

    fn make_jump(&mut self, pairs: Pairs<Rule>) -> ClassifyResult<BlockKind> {
        let mut fn_no = 0;
        let mut operands = vec![];
        let mut cmp = Cmp::Equ;
        let mut target = None;
        for pair in pairs {
            match pair.as_rule() {
                Rule::fn_no => fn_no = parse_number(pair.as_str(), "FN number")?,
                Rule::operand => operands.push(self.expr(pair.as_str())),
                Rule::cmp_op => cmp = Cmp::from_str(pair.as_str()).expect("grammar comparison"),
                Rule::label_id => target = Some(make_label_id(pair)?),
                Rule::remark => self.set_remark(pair),
                Rule::EOI => (),
                _ => unreachable!()
            }
        }
        if fn_no != cmp.fn_number() {
            self.diags.record(DiagKind::MalformedJump, self.record.lines,
                              format!("FN {} used with comparison {}", fn_no, cmp));
        }
        let (lhs, rhs) = operands.into_iter().collect_tuple().expect("two operands");
        Ok(BlockKind::ControlTransfer(ControlTransfer {
            condition: Some(Condition { lhs, cmp, rhs }),
            target: target.expect("jump target"),
            call: false,
            repeat: None,
            resolution: None,
        }))
    }

    fn make_label(&mut self, pairs: Pairs<Rule>) -> ClassifyResult<BlockKind> {
        let mut id = None;
        for pair in pairs {
            match pair.as_rule() {
                Rule::label_id => id = Some(make_label_id(pair)?),
                Rule::remark => self.set_remark(pair),
                Rule::EOI => (),
                _ => unreachable!()
            }
        }
        Ok(BlockKind::Label(id.expect("label id")))
    }

    fn make_call(&mut self, pairs: Pairs<Rule>) -> ClassifyResult<BlockKind> {
        let mut target = None;
        let mut repeat = None;
        for pair in pairs {
            match pair.as_rule() {
                Rule::label_id => target = Some(make_label_id(pair)?),
                Rule::repeat => {
                    let (count,) = pair.into_inner().collect_tuple().expect("repeat count");
                    repeat = Some(parse_number(count.as_str(), "repeat count")?);
                }
                Rule::remark => self.set_remark(pair),
                Rule::EOI => (),
                _ => unreachable!()
            }
        }
        Ok(BlockKind::ControlTransfer(ControlTransfer {
            condition: None,
            target: target.expect("call target"),
            call: true,
            repeat,
            resolution: None,
        }))
    }

    fn make_plane(&mut self, pairs: Pairs<Rule>) -> ClassifyResult<BlockKind> {
        let mut pt = PlaneTransform { kind: PlaneKind::Reset, params: vec![], options: vec![] };
        for pair in pairs {
            match pair.as_rule() {
                Rule::plane_kind => pt.kind = match pair.as_str() {
                    "SPATIAL" => PlaneKind::Spatial,
                    "RESET" => PlaneKind::Reset,
                    other => PlaneKind::Other(other.into()),
                },
                Rule::plane_param => {
                    let (key, value) = pair.into_inner().collect_tuple().expect("key and value");
                    let value = self.expr(value.as_str());
                    pt.params.push((key.as_str().into(), value));
                }
                Rule::plane_option => pt.options.push(pair.as_str().into()),
                Rule::remark => self.set_remark(pair),
                Rule::EOI => (),
                _ => unreachable!()
            }
        }
        Ok(BlockKind::PlaneTransform(pt))
    }

    fn make_function(&mut self, pairs: Pairs<Rule>) -> ClassifyResult<BlockKind> {
        let mut words = vec![];
        for pair in pairs {
            match pair.as_rule() {
                Rule::function_word => words.push(pair.as_str().into()),
                Rule::remark => self.set_remark(pair),
                Rule::EOI => (),
                _ => unreachable!()
            }
        }
        Ok(BlockKind::Function(words))
    }
}

fn make_label_id(pair: Pair<Rule>) -> ClassifyResult<LabelId> {
    let (id,) = pair.into_inner().collect_tuple().expect("label id");
    Ok(match id.as_rule() {
        Rule::quoted => LabelId::Name(quoted_text(id)),
        _ => LabelId::Number(parse_number(id.as_str(), "label number")?),
    })
}

fn quoted_text(pair: Pair<Rule>) -> String {
    pair.into_inner().next().map(|inner| inner.as_str().into()).unwrap_or_default()
}

fn remark_text(pair: Pair<Rule>) -> String {
    pair.as_str()[1..].trim().into()
}

fn parse_number<T: FromStr>(text: &str, what: &str) -> ClassifyResult<T> {
    text.parse().map_err(|_| ClassifyError::Semantic(format!("{} {} is out of range", what, text)))
}
