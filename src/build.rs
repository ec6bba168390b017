// Copyright (c) 2019 Georg Brandl.  Licensed under the Apache License,
// Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at
// your option. This file may not be copied, modified, or distributed except
// according to those terms.

//! Assembling classified blocks into a `Program`.
//!
//! Labels are collected in a first pass and transfers resolved in a second,
//! so jumps may point forward or backward.  Structural problems are recorded
//! as diagnostics; the program is always built.

use std::collections::BTreeMap;

use tracing::debug;

use crate::annotate::{parse_header_field, parse_tool_entry};
use crate::ast::*;
use crate::diag::{DiagKind, Diagnostics};
use crate::error::LexError;
use crate::options::ParseOptions;

/// A built program together with its diagnostics.
#[derive(Debug, Clone)]
pub struct Parsed {
    pub program: Program,
    pub diagnostics: Diagnostics,
}

/// Outcome of parsing one program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    /// The program was built, but diagnostics were recorded.
    Partial,
    /// A fatal lexer error stopped the parse.
    Failure,
}

impl Status {
    pub fn of(result: &Result<Parsed, LexError>) -> Status {
        match result {
            Ok(parsed) => parsed.status(),
            Err(_) => Status::Failure,
        }
    }
}

impl Parsed {
    pub fn status(&self) -> Status {
        if self.diagnostics.is_empty() { Status::Success } else { Status::Partial }
    }
}

/// Build the program from its blocks, in source order.
pub fn build(fallback_name: &str, mut blocks: Vec<Block>, mut diags: Diagnostics,
             options: &ParseOptions) -> Parsed {
    let (name, unit) = check_frame(&blocks, fallback_name, options, &mut diags);
    let (metadata, tools) = collect_header(&blocks, options);
    let labels = collect_labels(&blocks, &mut diags);
    resolve_transfers(&mut blocks, &labels, &mut diags);
    check_block_form(&blocks, &mut diags);
    check_tool_before_motion(&blocks, &mut diags);
    check_cycle_calls(&blocks, &mut diags);

    debug!(program = %name, blocks = blocks.len(), labels = labels.len(),
           diagnostics = diags.len(), "built program");
    Parsed {
        program: Program { name, unit, blocks, labels, metadata, tools },
        diagnostics: diags,
    }
}

fn first_lines(blocks: &[Block]) -> LineSpan {
    blocks.first().map_or(LineSpan::new(1, 1), |b| b.lines)
}

/// Program name and unit from `BEGIN PGM`, checked against `END PGM`.
fn check_frame(blocks: &[Block], fallback_name: &str, options: &ParseOptions,
               diags: &mut Diagnostics) -> (String, Unit) {
    let mut begin = None;
    let mut end = None;
    for block in blocks {
        match &block.kind {
            BlockKind::ProgramBegin { name, unit } => {
                if begin.is_some() {
                    diags.record(DiagKind::ProgramFrame, block.lines, "repeated BEGIN PGM");
                } else {
                    begin = Some((name, *unit));
                }
            }
            BlockKind::ProgramEnd { name, unit } => {
                if end.is_some() {
                    diags.record(DiagKind::ProgramFrame, block.lines, "repeated END PGM");
                } else {
                    end = Some((name, *unit, block.lines));
                }
            }
            _ => ()
        }
    }
    let last_lines = blocks.last().map_or(LineSpan::new(1, 1), |b| b.lines);
    match (begin, end) {
        (Some((name, unit)), Some((end_name, end_unit, lines))) => {
            if name != end_name || unit != end_unit {
                diags.record(DiagKind::ProgramFrame, lines,
                             format!("END PGM {} {} does not match BEGIN PGM {} {}",
                                     end_name, end_unit, name, unit));
            }
            (name.clone(), unit)
        }
        (Some((name, unit)), None) => {
            diags.record(DiagKind::ProgramFrame, last_lines, "missing END PGM");
            (name.clone(), unit)
        }
        (None, end) => {
            diags.record(DiagKind::ProgramFrame, first_lines(blocks), "missing BEGIN PGM");
            if end.is_none() {
                diags.record(DiagKind::ProgramFrame, last_lines, "missing END PGM");
            }
            (fallback_name.into(), options.default_unit)
        }
    }
}

/// Header fields and the CAM tool list from the leading remarks.
fn collect_header(blocks: &[Block], options: &ParseOptions)
                  -> (BTreeMap<String, String>, Vec<ToolEntry>) {
    let mut metadata = BTreeMap::new();
    let mut tools = vec![];
    let mut in_header = true;
    let mut in_tool_list = false;
    for block in blocks {
        let comment = match &block.kind {
            BlockKind::Comment(c) if c.kind == CommentKind::Remark => c,
            BlockKind::Comment(_) | BlockKind::ProgramBegin { .. } => continue,
            _ => {
                in_header = false;
                continue;
            }
        };
        if comment.text.contains("TOOLLIST BEGIN") {
            in_tool_list = true;
        } else if comment.text.contains("TOOLLIST END") {
            in_tool_list = false;
        } else if in_tool_list {
            if options.parse_annotations {
                tools.extend(parse_tool_entry(&comment.text));
            }
        } else if in_header {
            if let Some((key, value)) = parse_header_field(&comment.text) {
                metadata.entry(key).or_insert(value);
            }
        }
    }
    (metadata, tools)
}

/// Pass 1: label definitions.  The first definition of an identity wins.
fn collect_labels(blocks: &[Block], diags: &mut Diagnostics) -> BTreeMap<LabelId, usize> {
    let mut labels: BTreeMap<LabelId, usize> = BTreeMap::new();
    for (idx, block) in blocks.iter().enumerate() {
        if let BlockKind::Label(id) = &block.kind {
            if id.is_subroutine_end() {
                continue;
            }
            if let Some(&first) = labels.get(id) {
                diags.record(DiagKind::DuplicateLabel, block.lines,
                             format!("LBL {} already defined in {}", id, blocks[first].lines));
            } else {
                labels.insert(id.clone(), idx);
            }
        }
    }
    labels
}

/// Pass 2: point every transfer at its label, and calls at the `LBL 0`
/// ending the called subroutine.
fn resolve_transfers(blocks: &mut [Block], labels: &BTreeMap<LabelId, usize>,
                     diags: &mut Diagnostics) {
    let ends: Vec<usize> = blocks.iter().enumerate()
        .filter(|(_, b)| matches!(&b.kind, BlockKind::Label(id) if id.is_subroutine_end()))
        .map(|(idx, _)| idx)
        .collect();
    for block in blocks.iter_mut() {
        let ct = match &mut block.kind {
            BlockKind::ControlTransfer(ct) => ct,
            _ => continue,
        };
        let label = match labels.get(&ct.target) {
            Some(&label) => label,
            None => {
                diags.record(DiagKind::UnresolvedLabel, block.lines,
                             format!("jump to undefined LBL {}", ct.target));
                ct.resolution = None;
                continue;
            }
        };
        let subroutine_end = if ct.call {
            let end = ends.iter().copied().find(|&end| end > label);
            if end.is_none() {
                diags.record(DiagKind::MissingSubroutineEnd, block.lines,
                             format!("no LBL 0 after called LBL {}", ct.target));
            }
            end
        } else {
            None
        };
        ct.resolution = Some(Resolution { label, subroutine_end });
    }
}

/// Exactly one `BLK FORM 0.1` followed by one `BLK FORM 0.2`.
fn check_block_form(blocks: &[Block], diags: &mut Diagnostics) {
    let forms: Vec<(Corner, LineSpan)> = blocks.iter()
        .filter_map(|b| match &b.kind {
            BlockKind::BlockForm(bf) => Some((bf.corner, b.lines)),
            _ => None,
        })
        .collect();
    match forms.as_slice() {
        [(Corner::Min, _), (Corner::Max, _)] => (),
        [] => diags.record(DiagKind::MalformedBlockForm, first_lines(blocks),
                           "program has no BLK FORM"),
        [(_, lines), ..] => diags.record(DiagKind::MalformedBlockForm, *lines, format!(
            "expected BLK FORM 0.1 followed by BLK FORM 0.2, found {} BLK FORM blocks",
            forms.len())),
    }
}

fn check_tool_before_motion(blocks: &[Block], diags: &mut Diagnostics) {
    for block in blocks {
        match &block.kind {
            BlockKind::ToolCall(_) => return,
            BlockKind::Move(mv) if !mv.is_rapid() => {
                diags.record(DiagKind::MotionBeforeToolCall, block.lines,
                             "feed move before the first TOOL CALL");
            }
            _ => ()
        }
    }
}

/// A call-active cycle must be executed (`M99`, `M89` or `CYCL CALL`) before
/// the next cycle definition, tool call or program end.
fn check_cycle_calls(blocks: &[Block], diags: &mut Diagnostics) {
    let calls = |codes: &MCodes| codes.contains(99) || codes.contains(89);
    for (idx, block) in blocks.iter().enumerate() {
        let cycle = match &block.kind {
            BlockKind::CycleDefinition(c) if c.is_call_active() => c,
            _ => continue,
        };
        let mut called = false;
        for next in &blocks[idx + 1..] {
            match &next.kind {
                BlockKind::Move(mv) if calls(&mv.mcodes) => called = true,
                BlockKind::Misc(codes) if calls(codes) => called = true,
                BlockKind::CycleCall(_) => called = true,
                BlockKind::CycleDefinition(_) |
                BlockKind::ToolCall(_) |
                BlockKind::ProgramEnd { .. } => break,
                _ => continue,
            }
            if called {
                break;
            }
        }
        if !called {
            diags.record(DiagKind::UncalledCycle, block.lines,
                         format!("CYCL DEF {} is never called", cycle.number));
        }
    }
}
