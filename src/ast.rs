// Copyright (c) 2019 Georg Brandl.  Licensed under the Apache License,
// Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at
// your option. This file may not be copied, modified, or distributed except
// according to those terms.

//! The program representation produced by the parser.
//!
//! The `Display` implementations write the dialect back out in a consistent
//! format; parsing that output again yields the same block kinds.

use std::collections::BTreeMap;
use std::fmt;

use fixedbitset::FixedBitSet;
use itertools::Itertools;
use strum_macros::{Display, EnumString};

use crate::util::{fmt_signed, fmt_word};

/// Range of physical source lines (1-based, inclusive) a block came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LineSpan {
    pub first: usize,
    pub last: usize,
}

impl LineSpan {
    pub fn new(first: usize, last: usize) -> Self {
        LineSpan { first, last }
    }
}

impl fmt::Display for LineSpan {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.first == self.last {
            write!(f, "line {}", self.first)
        } else {
            write!(f, "lines {}-{}", self.first, self.last)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum Unit {
    #[strum(serialize = "MM")]
    Millimeters,
    #[strum(serialize = "INCH")]
    Inches,
}

impl Default for Unit {
    fn default() -> Self { Unit::Millimeters }
}

/// A machine axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString)]
pub enum Axis {
    X, Y, Z,
    A, B, C,
    U, V, W,
}

/// A parsed program.  Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub(crate) name: String,
    pub(crate) unit: Unit,
    pub(crate) blocks: Vec<Block>,
    pub(crate) labels: BTreeMap<LabelId, usize>,
    pub(crate) metadata: BTreeMap<String, String>,
    pub(crate) tools: Vec<ToolEntry>,
}

impl Program {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Block index of a label definition.
    pub fn label(&self, id: &LabelId) -> Option<usize> {
        self.labels.get(id).copied()
    }

    pub fn labels(&self) -> impl Iterator<Item = (&LabelId, usize)> {
        self.labels.iter().map(|(id, &idx)| (id, idx))
    }

    /// `KEY : value` fields from the remark header of the program.
    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    /// Entries of the CAM tool list written as remarks.
    pub fn tools(&self) -> &[ToolEntry] {
        &self.tools
    }

    pub fn tool_calls(&self) -> impl Iterator<Item = &ToolCall> {
        self.blocks.iter().filter_map(|b| match &b.kind {
            BlockKind::ToolCall(tc) => Some(tc),
            _ => None,
        })
    }

    pub fn block_forms(&self) -> impl Iterator<Item = &BlockForm> {
        self.blocks.iter().filter_map(|b| match &b.kind {
            BlockKind::BlockForm(bf) => Some(bf),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub lines: LineSpan,
    pub number: Option<u32>,
    pub skip: bool,
    pub kind: BlockKind,
    /// Trailing `;` remark of a code block.
    pub remark: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockKind {
    Comment(Comment),
    ProgramBegin { name: String, unit: Unit },
    ProgramEnd { name: String, unit: Unit },
    ToolCall(ToolCall),
    Move(Move),
    Misc(MCodes),
    CycleDefinition(CycleDefinition),
    CycleCall(MCodes),
    ParameterAssignment(ParameterAssignment),
    Label(LabelId),
    ControlTransfer(ControlTransfer),
    PlaneTransform(PlaneTransform),
    Function(Vec<String>),
    BlockForm(BlockForm),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentKind {
    /// A `;` line.
    Remark,
    /// A `*` line.
    Annotation,
    /// Placeholder for a record that could not be classified.
    Unrecognized,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub kind: CommentKind,
    /// Text after the comment marker, or the raw record for placeholders.
    pub text: String,
    pub annotation: Option<Annotation>,
}

/// Structured content recognized in an annotation comment.
#[derive(Debug, Clone, PartialEq)]
pub enum Annotation {
    Tool(ToolEntry),
    Job { number: u32, title: String },
}

/// A tool description as written by the CAM system, e.g.
/// `T1623370207 | KOM-U11-TF39_H63ABS50 / DM=39 CR=0 TL=227`.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolEntry {
    pub id: String,
    pub name: String,
    pub diameter: Option<f64>,
    pub corner_radius: Option<f64>,
    pub length: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ToolId {
    Number(u32),
    Name(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub id: ToolId,
    pub axis: Option<Axis>,
    pub spindle_speed: Option<Expr>,
    pub feed: Option<Expr>,
    pub length_offset: Option<Expr>,
    pub radius_offset: Option<Expr>,
    pub radius_offset2: Option<Expr>,
}

/// Axis coordinates of a block, in source order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Coords(Vec<(Axis, Expr)>);

impl Coords {
    /// Set a coordinate, replacing an earlier value for the same axis.
    /// Returns true if the axis was already present.
    pub fn insert(&mut self, axis: Axis, value: Expr) -> bool {
        match self.0.iter_mut().find(|(a, _)| *a == axis) {
            Some(slot) => {
                slot.1 = value;
                true
            }
            None => {
                self.0.push((axis, value));
                false
            }
        }
    }

    pub fn get(&self, axis: Axis) -> Option<&Expr> {
        self.0.iter().find(|(a, _)| *a == axis).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Axis, &Expr)> {
        self.0.iter().map(|(a, v)| (*a, v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum RadiusComp {
    #[strum(serialize = "R0")]
    Off,
    #[strum(serialize = "RL")]
    Left,
    #[strum(serialize = "RR")]
    Right,
    #[strum(serialize = "R+")]
    Lengthen,
    #[strum(serialize = "R-")]
    Shorten,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Feed {
    /// Rapid traverse, `F MAX`.
    Max,
    Auto,
    Value(Expr),
}

/// Initial capacity of an M function set; larger codes grow the set.
pub const MCODE_CAPACITY: usize = 1000;

/// A set of M functions.
#[derive(Debug, Clone)]
pub struct MCodes(FixedBitSet);

impl MCodes {
    pub fn new() -> Self {
        MCodes(FixedBitSet::with_capacity(MCODE_CAPACITY))
    }

    pub fn insert(&mut self, code: u16) {
        let code = code as usize;
        if code >= self.0.len() {
            self.0.grow(code + 1);
        }
        self.0.insert(code);
    }

    pub fn contains(&self, code: u16) -> bool {
        self.0.contains(code as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        self.0.ones().map(|c| c as u16)
    }

    pub fn is_empty(&self) -> bool {
        self.0.ones().next().is_none()
    }
}

impl Default for MCodes {
    fn default() -> Self { MCodes::new() }
}

impl PartialEq for MCodes {
    fn eq(&self, other: &Self) -> bool {
        self.iter().eq(other.iter())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Move {
    pub coords: Coords,
    pub radius_comp: Option<RadiusComp>,
    pub feed: Option<Feed>,
    pub mcodes: MCodes,
}

impl Move {
    pub fn is_rapid(&self) -> bool {
        self.feed == Some(Feed::Max)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CycleParam {
    pub key: u16,
    pub value: Expr,
    /// The human readable label after `;`, kept for display only.
    pub hint: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CycleDefinition {
    pub number: u16,
    /// Sub-block of an old-style cycle, `CYCL DEF 9.1`.
    pub step: Option<u8>,
    /// Cycle name, or the argument text of an old-style sub-block.
    pub title: Option<String>,
    pub params: Vec<CycleParam>,
}

impl CycleDefinition {
    pub fn param(&self, key: u16) -> Option<&Expr> {
        self.params.iter().find(|p| p.key == key).map(|p| &p.value)
    }

    pub fn keys(&self) -> impl Iterator<Item = u16> + '_ {
        self.params.iter().map(|p| p.key)
    }

    /// Whether the cycle only takes effect when called (`M99`, `CYCL CALL`).
    pub fn is_call_active(&self) -> bool {
        self.step.is_none() && (200..300).contains(&self.number)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterAssignment {
    pub target: String,
    pub value: Expr,
}

/// Identity of a label: `LBL 1` or `LBL "name"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LabelId {
    Number(u32),
    Name(String),
}

impl LabelId {
    /// `LBL 0` terminates a subroutine and is not a jump target.
    pub fn is_subroutine_end(&self) -> bool {
        *self == LabelId::Number(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum Cmp {
    #[strum(serialize = "EQU")]
    Equ,
    #[strum(serialize = "NE")]
    Ne,
    #[strum(serialize = "GT")]
    Gt,
    #[strum(serialize = "LT")]
    Lt,
}

impl Cmp {
    /// The `FN` number that carries this comparison.
    pub fn fn_number(self) -> u8 {
        match self {
            Cmp::Equ => 9,
            Cmp::Ne => 10,
            Cmp::Gt => 11,
            Cmp::Lt => 12,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub lhs: Expr,
    pub cmp: Cmp,
    pub rhs: Expr,
}

/// Where a transfer resolved to, filled in by the program builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// Block index of the target label.
    pub label: usize,
    /// For calls: block index of the `LBL 0` ending the subroutine.
    /// Execution resumes at the block after the call.
    pub subroutine_end: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ControlTransfer {
    /// `None` for unconditional transfers.
    pub condition: Option<Condition>,
    pub target: LabelId,
    /// `CALL LBL`: returns to the block after the call site.
    pub call: bool,
    pub repeat: Option<u16>,
    /// `None` while unresolved, or when the target label does not exist.
    pub resolution: Option<Resolution>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaneKind {
    Spatial,
    Reset,
    /// `CYCL DEF 7.x`, with x as step.
    DatumShift { step: u8 },
    Other(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaneTransform {
    pub kind: PlaneKind,
    pub params: Vec<(String, Expr)>,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Corner {
    Min,
    Max,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockForm {
    pub corner: Corner,
    pub axis: Option<Axis>,
    pub coords: Coords,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Num(f64),
    Var(String),
    Neg(Box<Expr>),
    Op(Op, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Op {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Sub,
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for block in &self.blocks {
            writeln!(f, "{}", block)?;
        }
        Ok(())
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.skip {
            write!(f, "/")?;
        }
        if let Some(n) = self.number {
            write!(f, "{} ", n)?;
        }
        match &self.kind {
            // the header remark belongs on the first line, hints follow
            BlockKind::CycleDefinition(cycle) => cycle.write(f, self.remark.as_deref()),
            kind => {
                write!(f, "{}", kind)?;
                match &self.remark {
                    Some(remark) => write!(f, " ; {}", remark),
                    None => Ok(()),
                }
            }
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BlockKind::Comment(c) => write!(f, "{}", c),
            BlockKind::ProgramBegin { name, unit } => write!(f, "BEGIN PGM {} {}", name, unit),
            BlockKind::ProgramEnd { name, unit } => write!(f, "END PGM {} {}", name, unit),
            BlockKind::ToolCall(tc) => write!(f, "{}", tc),
            BlockKind::Move(mv) => write!(f, "{}", mv),
            BlockKind::Misc(codes) => write!(f, "{}", codes),
            BlockKind::CycleDefinition(cycle) => cycle.write(f, None),
            BlockKind::CycleCall(codes) if codes.is_empty() => write!(f, "CYCL CALL"),
            BlockKind::CycleCall(codes) => write!(f, "CYCL CALL {}", codes),
            BlockKind::ParameterAssignment(pa) => write!(f, "FN 0: {}={}", pa.target, pa.value),
            BlockKind::Label(id) => write!(f, "LBL {}", id),
            BlockKind::ControlTransfer(ct) => write!(f, "{}", ct),
            BlockKind::PlaneTransform(pt) => write!(f, "{}", pt),
            BlockKind::Function(words) => write!(f, "FUNCTION {}", words.iter().join(" ")),
            BlockKind::BlockForm(bf) => write!(f, "{}", bf),
        }
    }
}

impl fmt::Display for Comment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let text = self.text.replace('\n', "~\n");
        match self.kind {
            CommentKind::Remark => write!(f, ";{}", text),
            CommentKind::Annotation => write!(f, "*{}", text),
            CommentKind::Unrecognized => write!(f, "{}", text),
        }
    }
}

impl fmt::Display for ToolId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ToolId::Number(n) => write!(f, "{}", n),
            ToolId::Name(s) => write!(f, "\"{}\"", s),
        }
    }
}

impl fmt::Display for ToolCall {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "TOOL CALL {}", self.id)?;
        if let Some(axis) = self.axis {
            write!(f, " {}", axis)?;
        }
        if let Some(s) = &self.spindle_speed {
            write!(f, " S{}", fmt_word(s))?;
        }
        if let Some(feed) = &self.feed {
            write!(f, " F{}", fmt_word(feed))?;
        }
        if let Some(dl) = &self.length_offset {
            write!(f, " DL{}", fmt_signed(dl))?;
        }
        if let Some(dr) = &self.radius_offset {
            write!(f, " DR{}", fmt_signed(dr))?;
        }
        if let Some(dr2) = &self.radius_offset2 {
            write!(f, " DR2{}", fmt_signed(dr2))?;
        }
        Ok(())
    }
}

impl fmt::Display for Coords {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.iter().map(|(a, v)| format!("{}{}", a, fmt_word(v))).join(" "))
    }
}

impl fmt::Display for MCodes {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.iter().map(|c| format!("M{}", c)).join(" "))
    }
}

impl fmt::Display for Feed {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Feed::Max => write!(f, "F MAX"),
            Feed::Auto => write!(f, "F AUTO"),
            Feed::Value(v) => write!(f, "F{}", fmt_word(v)),
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "L")?;
        if !self.coords.is_empty() {
            write!(f, " {}", self.coords)?;
        }
        if let Some(rc) = self.radius_comp {
            write!(f, " {}", rc)?;
        }
        if let Some(feed) = &self.feed {
            write!(f, " {}", feed)?;
        }
        if !self.mcodes.is_empty() {
            write!(f, " {}", self.mcodes)?;
        }
        Ok(())
    }
}

impl CycleDefinition {
    fn write(&self, f: &mut fmt::Formatter, remark: Option<&str>) -> fmt::Result {
        write!(f, "CYCL DEF {}", self.number)?;
        if let Some(step) = self.step {
            write!(f, ".{}", step)?;
        }
        if let Some(title) = &self.title {
            write!(f, " {}", title)?;
        }
        if let Some(remark) = remark {
            write!(f, " ; {}", remark)?;
        }
        for param in &self.params {
            write!(f, "~\n    Q{}={}", param.key, param.value)?;
            if let Some(hint) = &param.hint {
                write!(f, " ;{}", hint)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for LabelId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LabelId::Number(n) => write!(f, "{}", n),
            LabelId::Name(s) => write!(f, "\"{}\"", s),
        }
    }
}

impl fmt::Display for ControlTransfer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(cond) = &self.condition {
            write!(f, "FN {}: IF {} {} {} GOTO LBL {}", cond.cmp.fn_number(),
                   fmt_signed(&cond.lhs), cond.cmp, fmt_signed(&cond.rhs), self.target)
        } else {
            write!(f, "CALL LBL {}", self.target)?;
            if let Some(rep) = self.repeat {
                write!(f, " REP{}", rep)?;
            }
            Ok(())
        }
    }
}

impl fmt::Display for PlaneTransform {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.kind {
            PlaneKind::DatumShift { step: 0 } => return write!(f, "CYCL DEF 7.0 DATUM SHIFT"),
            PlaneKind::DatumShift { step } => write!(f, "CYCL DEF 7.{}", step)?,
            PlaneKind::Spatial => write!(f, "PLANE SPATIAL")?,
            PlaneKind::Reset => write!(f, "PLANE RESET")?,
            PlaneKind::Other(kind) => write!(f, "PLANE {}", kind)?,
        }
        for (key, value) in &self.params {
            write!(f, " {}{}", key, fmt_word(value))?;
        }
        for opt in &self.options {
            write!(f, " {}", opt)?;
        }
        Ok(())
    }
}

impl fmt::Display for BlockForm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "BLK FORM {}", match self.corner {
            Corner::Min => "0.1",
            Corner::Max => "0.2",
        })?;
        if let Some(axis) = self.axis {
            write!(f, " {}", axis)?;
        }
        if !self.coords.is_empty() {
            write!(f, " {}", self.coords)?;
        }
        Ok(())
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Expr::Num(n) => write!(f, "{}", n),
            Expr::Var(name) => write!(f, "{}", name),
            Expr::Neg(inner) => write!(f, "-{}", inner),
            Expr::Op(op, lhs, rhs) => write!(f, "{}{}{}", lhs, op, rhs),
        }
    }
}
