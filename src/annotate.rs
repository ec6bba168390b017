// Copyright (c) 2019 Georg Brandl.  Licensed under the Apache License,
// Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at
// your option. This file may not be copied, modified, or distributed except
// according to those terms.

//! Heuristic readers for the metadata the CAM system writes into comments.
//!
//! None of these fail: text that does not look like the expected layout is
//! simply not recognized.

use crate::ast::{Annotation, ToolEntry};

/// Recognize the content of a `*` annotation line (text after the `*`):
///
/// - `- T1623370207 | KOM-U11-TF39_H63ABS50 / DM=39 CR=0 TL=227`
/// - `- TOOL: T1556708415 | GUH-5512-BHF8.6_H63Z10L85 / DM=8.6 CR=0 TL=178`
/// - `  - JOB: 9: D8.6-menetalap-CYCL200`
pub fn parse_annotation(text: &str) -> Option<Annotation> {
    let text = text.trim_start().strip_prefix('-')?.trim();
    if let Some(job) = text.strip_prefix("JOB:") {
        let (number, title) = job.split_once(':')?;
        return Some(Annotation::Job {
            number: number.trim().parse().ok()?,
            title: title.trim().into(),
        });
    }
    let text = text.strip_prefix("TOOL:").unwrap_or(text);
    parse_tool_entry(text).map(Annotation::Tool)
}

/// Recognize a tool description `T<id> | <name> / DM=.. CR=.. TL=..`.
pub fn parse_tool_entry(text: &str) -> Option<ToolEntry> {
    let (id, rest) = text.trim().split_once('|')?;
    let id = id.trim();
    if !id.starts_with('T') || id.len() < 2 || !id[1..].chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let (name, dims) = match rest.split_once(" / ") {
        Some((name, dims)) => (name, dims),
        None => (rest, ""),
    };
    let mut entry = ToolEntry {
        id: id.into(),
        name: name.trim().into(),
        diameter: None,
        corner_radius: None,
        length: None,
    };
    for field in dims.split_whitespace() {
        let (key, value) = match field.split_once('=') {
            Some(kv) => kv,
            None => continue,
        };
        let value = value.parse().ok();
        match key {
            "DM" => entry.diameter = value,
            "CR" => entry.corner_radius = value,
            "TL" => entry.length = value,
            _ => ()
        }
    }
    if entry.name.is_empty() {
        return None;
    }
    Some(entry)
}

/// Recognize a header remark of the form ` MACHINE : DMG DMC 105V linear`.
/// The value may be empty.
pub fn parse_header_field(text: &str) -> Option<(String, String)> {
    let (key, value) = text.split_once(':')?;
    let key = key.trim();
    if key.is_empty() || !key.chars().all(|c| c.is_ascii_uppercase() || c == ' ') {
        return None;
    }
    Some((key.into(), value.trim().into()))
}
