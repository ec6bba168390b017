// Copyright (c) 2019 Georg Brandl.  Licensed under the Apache License,
// Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at
// your option. This file may not be copied, modified, or distributed except
// according to those terms.

use klartext::ast::*;
use klartext::classify::{classify, ClassifyState};
use klartext::diag::{DiagKind, Diagnostics};
use klartext::lexer::Lexer;
use klartext::options::ParseOptions;

/// Classify all records of `src` with shared state.
fn classify_all(src: &str, options: &ParseOptions) -> (Vec<Block>, Diagnostics) {
    let mut diags = Diagnostics::default();
    let mut state = ClassifyState::default();
    let blocks = Lexer::new(src)
        .map(|rec| classify(&rec.unwrap(), &mut state, options, &mut diags))
        .collect();
    (blocks, diags)
}

fn classify_one(src: &str) -> (BlockKind, Diagnostics) {
    let (mut blocks, diags) = classify_all(src, &ParseOptions::default());
    assert_eq!(blocks.len(), 1);
    (blocks.remove(0).kind, diags)
}

fn kind(src: &str) -> BlockKind {
    let (kind, diags) = classify_one(src);
    assert!(diags.is_empty(), "{:?}", diags);
    kind
}

fn num(n: f64) -> Expr {
    Expr::Num(n)
}

#[test]
fn test_frame() {
    assert_eq!(kind("1 BEGIN PGM W5246NS01007A1 MM"),
               BlockKind::ProgramBegin { name: "W5246NS01007A1".into(), unit: Unit::Millimeters });
    assert_eq!(kind("END PGM 1234 INCH"),
               BlockKind::ProgramEnd { name: "1234".into(), unit: Unit::Inches });
}

#[test]
fn test_blk_form() {
    let bf = match kind("19 BLK FORM 0.1 Z X-95 Y-258 Z-22.25") {
        BlockKind::BlockForm(bf) => bf,
        other => panic!("{:?}", other),
    };
    assert_eq!(bf.corner, Corner::Min);
    assert_eq!(bf.axis, Some(Axis::Z));
    assert_eq!(bf.coords.len(), 3);
    assert_eq!(bf.coords.get(Axis::X), Some(&num(-95.)));
    assert_eq!(bf.coords.get(Axis::Y), Some(&num(-258.)));
    assert_eq!(bf.coords.get(Axis::Z), Some(&num(-22.25)));

    match kind("BLK FORM 0.2 X95 Y258 Z0.25") {
        BlockKind::BlockForm(bf) => {
            assert_eq!(bf.corner, Corner::Max);
            assert_eq!(bf.axis, None);
            assert_eq!(bf.coords.get(Axis::Z), Some(&num(0.25)));
        }
        other => panic!("{:?}", other),
    }
}

#[test]
fn test_tool_call() {
    let tc = match kind("27 TOOL CALL \"TF39000001670102\" Z S900 DL+0 DR+0") {
        BlockKind::ToolCall(tc) => tc,
        other => panic!("{:?}", other),
    };
    assert_eq!(tc.id, ToolId::Name("TF39000001670102".into()));
    assert_eq!(tc.axis, Some(Axis::Z));
    assert_eq!(tc.spindle_speed, Some(num(900.)));
    assert_eq!(tc.length_offset, Some(num(0.)));
    assert_eq!(tc.radius_offset, Some(num(0.)));
    assert_eq!(tc.feed, None);
    assert_eq!(tc.radius_offset2, None);

    match kind("TOOL CALL 5 Z S4000 F300 DR2-0.1") {
        BlockKind::ToolCall(tc) => {
            assert_eq!(tc.id, ToolId::Number(5));
            assert_eq!(tc.feed, Some(num(300.)));
            assert_eq!(tc.radius_offset2, Some(num(-0.1)));
        }
        other => panic!("{:?}", other),
    }
}

#[test]
fn test_moves() {
    let mv = match kind("L X0 Y85 R0 F MAX M3") {
        BlockKind::Move(mv) => mv,
        other => panic!("{:?}", other),
    };
    assert!(mv.is_rapid());
    assert_eq!(mv.radius_comp, Some(RadiusComp::Off));
    assert!(mv.mcodes.contains(3));
    assert_eq!(mv.coords.iter().map(|(a, _)| a).collect::<Vec<_>>(), [Axis::X, Axis::Y]);

    match kind("L Z+0 R0 FMAX M92") {
        BlockKind::Move(mv) => assert_eq!(mv.feed, Some(Feed::Max)),
        other => panic!("{:?}", other),
    }
    match kind("L X+10 Y-Q5 RL F250 ; finish") {
        BlockKind::Move(mv) => {
            assert!(!mv.is_rapid());
            assert_eq!(mv.feed, Some(Feed::Value(num(250.))));
            assert_eq!(mv.radius_comp, Some(RadiusComp::Left));
            assert_eq!(mv.coords.get(Axis::Y), Some(&Expr::Neg(Box::new(Expr::Var("Q5".into())))));
        }
        other => panic!("{:?}", other),
    }
    match kind("L A+Q120 C+Q122 R0 FMAX M126") {
        BlockKind::Move(mv) => assert_eq!(mv.coords.get(Axis::A), Some(&Expr::Var("Q120".into()))),
        other => panic!("{:?}", other),
    }
    match kind("M9 M5") {
        BlockKind::Misc(codes) => assert_eq!(codes.iter().collect::<Vec<_>>(), [5, 9]),
        other => panic!("{:?}", other),
    }
}

#[test]
fn test_mcodes() {
    let (_, diags) = classify_one("M77");
    assert_eq!(diags.of_kind(DiagKind::UnknownMCode).count(), 1);

    let options = ParseOptions::default().extra_mcodes(vec![77]);
    let (_, diags) = classify_all("M77", &options);
    assert!(diags.is_empty());

    let options = ParseOptions::default().warn_unknown_mcodes(false);
    let (_, diags) = classify_all("M77", &options);
    assert!(diags.is_empty());

    // codes past the table are kept with a warning
    let (kind, diags) = classify_one("M5000 M3");
    match kind {
        BlockKind::Misc(codes) => assert_eq!(codes.iter().collect::<Vec<_>>(), [3, 5000]),
        other => panic!("{:?}", other),
    }
    assert_eq!(diags.of_kind(DiagKind::UnknownMCode).count(), 1);

    // a number too large for any M function leaves nothing to keep
    let (kind, diags) = classify_one("M99999");
    match kind {
        BlockKind::Comment(c) => {
            assert_eq!(c.kind, CommentKind::Unrecognized);
            assert_eq!(c.text, "M99999");
        }
        other => panic!("{:?}", other),
    }
    assert_eq!(diags.of_kind(DiagKind::UnknownMCode).count(), 1);
    assert_eq!(diags.of_kind(DiagKind::UnknownBlock).count(), 1);

    // within a move the oversized code is dropped, the move is not
    let (kind, diags) = classify_one("L X1 F100 M70000");
    match kind {
        BlockKind::Move(mv) => assert!(mv.mcodes.is_empty()),
        other => panic!("{:?}", other),
    }
    assert_eq!(diags.of_kind(DiagKind::UnknownMCode).count(), 1);
}

#[test]
fn test_duplicate_axis() {
    let (kind, diags) = classify_one("L X1 Y2 X3 F100");
    match kind {
        BlockKind::Move(mv) => {
            // the last value wins, in the position of the first
            assert_eq!(mv.coords.iter().map(|(a, _)| a).collect::<Vec<_>>(), [Axis::X, Axis::Y]);
            assert_eq!(mv.coords.get(Axis::X), Some(&num(3.)));
        }
        other => panic!("{:?}", other),
    }
    assert_eq!(diags.len(), 1);
    assert_eq!(diags.of_kind(DiagKind::DuplicateAxis).count(), 1);

    let (kind, diags) = classify_one("BLK FORM 0.1 Z X-1 Y0 Y-5 Z-10");
    match kind {
        BlockKind::BlockForm(bf) => assert_eq!(bf.coords.get(Axis::Y), Some(&num(-5.))),
        other => panic!("{:?}", other),
    }
    assert_eq!(diags.of_kind(DiagKind::DuplicateAxis).count(), 1);
}

#[test]
fn test_cycle_def() {
    let src = "\
42 CYCL DEF 200 DRILLING~
    Q200=5 ;SET-UP CLEARANCE~
    Q201=-24.851 ;DEPTH~
    Q206=Q2 ;FEED RATE FOR PLUNGING~
    Q202=24.851 ;PLUNGING DEPTH~
    Q210=0 ;DWELL TIME AT TOP~
    Q203=0 ;SURFACE COORDINATE~
    Q204=50 ;2ND SET-UP CLEARANCE~
    Q211=0 ;DWELL TIME AT BOTTOM~
    Q395=0 ;DEPTH REFERENCE
";
    let cycle = match kind(src) {
        BlockKind::CycleDefinition(c) => c,
        other => panic!("{:?}", other),
    };
    assert_eq!(cycle.number, 200);
    assert_eq!(cycle.step, None);
    assert_eq!(cycle.title.as_deref(), Some("DRILLING"));
    assert!(cycle.is_call_active());
    assert_eq!(cycle.params.len(), 9);
    assert_eq!(cycle.keys().collect::<Vec<_>>(), [200, 201, 206, 202, 210, 203, 204, 211, 395]);
    assert_eq!(cycle.param(206), Some(&Expr::Var("Q2".into())));
    assert_eq!(cycle.param(201), Some(&num(-24.851)));
    assert_eq!(cycle.params[0].hint.as_deref(), Some("SET-UP CLEARANCE"));
    assert_eq!(cycle.params[8].hint.as_deref(), Some("DEPTH REFERENCE"));
}

#[test]
fn test_cycle_def_problems() {
    let (kind, diags) = classify_one("CYCL DEF 200 DRILLING~\n Q200=5~\n Q200=7~\n Q201=-3");
    match kind {
        BlockKind::CycleDefinition(c) => {
            // the first value is kept
            assert_eq!(c.keys().collect::<Vec<_>>(), [200, 201]);
            assert_eq!(c.param(200), Some(&num(5.)));
        }
        other => panic!("{:?}", other),
    }
    assert_eq!(diags.of_kind(DiagKind::DuplicateCycleParameter).count(), 1);

    let (_, diags) = classify_one("CYCL DEF 200 DRILLING~\n Q200=5~\n DEPTH=7");
    assert_eq!(diags.of_kind(DiagKind::MalformedCycleParameter).count(), 1);

    // an out of range key loses only that parameter
    let (kind, diags) = classify_one("CYCL DEF 200 DRILLING~\n Q200=5~\n Q70000=1~\n Q201=-3");
    match kind {
        BlockKind::CycleDefinition(c) => assert_eq!(c.keys().collect::<Vec<_>>(), [200, 201]),
        other => panic!("{:?}", other),
    }
    assert_eq!(diags.len(), 1);
    assert_eq!(diags.of_kind(DiagKind::MalformedCycleParameter).count(), 1);
}

#[test]
fn test_old_style_cycles() {
    let (blocks, diags) = classify_all("CYCL DEF9 .0 VARAKOZASI IDO\nCYCL DEF9.1 V.IDO5\n",
                                       &ParseOptions::default());
    assert!(diags.is_empty());
    match &blocks[0].kind {
        BlockKind::CycleDefinition(c) => {
            assert_eq!((c.number, c.step), (9, Some(0)));
            assert_eq!(c.title.as_deref(), Some("VARAKOZASI IDO"));
            assert!(!c.is_call_active());
        }
        other => panic!("{:?}", other),
    }
    match &blocks[1].kind {
        BlockKind::CycleDefinition(c) => {
            assert_eq!((c.number, c.step), (9, Some(1)));
            assert_eq!(c.title.as_deref(), Some("V.IDO5"));
        }
        other => panic!("{:?}", other),
    }

    // a sub-block needs its head block right before it
    let (_, diags) = classify_one("CYCL DEF 9.1 V.IDO5");
    assert_eq!(diags.of_kind(DiagKind::MalformedCycle).count(), 1);
}

#[test]
fn test_datum_shift() {
    let src = "CYCL DEF 7.0 DATUM SHIFT\nCYCL DEF 7.1 X0\nCYCL DEF 7.2 Y-12.5\nCYCL DEF 7.3 Z0\n";
    let (blocks, diags) = classify_all(src, &ParseOptions::default());
    assert!(diags.is_empty());
    let kinds: Vec<_> = blocks.iter().map(|b| match &b.kind {
        BlockKind::PlaneTransform(pt) => pt.clone(),
        other => panic!("{:?}", other),
    }).collect();
    assert_eq!(kinds[0].kind, PlaneKind::DatumShift { step: 0 });
    assert!(kinds[0].params.is_empty());
    assert_eq!(kinds[2].kind, PlaneKind::DatumShift { step: 2 });
    assert_eq!(kinds[2].params, [("Y".to_string(), num(-12.5))]);
}

#[test]
fn test_assignments() {
    let src = "34 FN 0:Q2=105 ; Z FEED RATE\nFN 0: Q1901=4\nQ5 = Q2 + 1\n";
    let (blocks, diags) = classify_all(src, &ParseOptions::default());
    assert!(diags.is_empty());
    assert_eq!(blocks[0].kind, BlockKind::ParameterAssignment(ParameterAssignment {
        target: "Q2".into(),
        value: num(105.),
    }));
    assert_eq!(blocks[0].remark.as_deref(), Some("Z FEED RATE"));
    assert_eq!(blocks[1].kind, BlockKind::ParameterAssignment(ParameterAssignment {
        target: "Q1901".into(),
        value: num(4.),
    }));
    assert_eq!(blocks[2].kind, BlockKind::ParameterAssignment(ParameterAssignment {
        target: "Q5".into(),
        value: Expr::Op(Op::Add, Box::new(Expr::Var("Q2".into())), Box::new(num(1.))),
    }));

    // a malformed value is reported and replaced
    let (kind, diags) = classify_one("FN 0: Q1=abc");
    assert_eq!(kind, BlockKind::ParameterAssignment(ParameterAssignment {
        target: "Q1".into(),
        value: num(0.),
    }));
    assert_eq!(diags.of_kind(DiagKind::Expression).count(), 1);
}

#[test]
fn test_jumps_and_labels() {
    match kind("FN 9: IF +Q1900 EQU +1 GOTO LBL \"CuttingEdges1\"") {
        BlockKind::ControlTransfer(ct) => {
            let cond = ct.condition.unwrap();
            assert_eq!(cond.lhs, Expr::Var("Q1900".into()));
            assert_eq!(cond.cmp, Cmp::Equ);
            assert_eq!(cond.rhs, num(1.));
            assert_eq!(ct.target, LabelId::Name("CuttingEdges1".into()));
            assert!(!ct.call);
            assert_eq!(ct.resolution, None);
        }
        other => panic!("{:?}", other),
    }
    match kind("CALL LBL 1 REP 3 ; RESET WORKING PLANE") {
        BlockKind::ControlTransfer(ct) => {
            assert!(ct.call);
            assert_eq!(ct.condition, None);
            assert_eq!(ct.target, LabelId::Number(1));
            assert_eq!(ct.repeat, Some(3));
        }
        other => panic!("{:?}", other),
    }
    assert_eq!(kind("LBL 0"), BlockKind::Label(LabelId::Number(0)));
    assert_eq!(kind("LBL \"Cutting Edges\""), BlockKind::Label(LabelId::Name("Cutting Edges".into())));

    let (_, diags) = classify_one("FN 10: IF +Q1 EQU +1 GOTO LBL 3");
    assert_eq!(diags.of_kind(DiagKind::MalformedJump).count(), 1);
}

#[test]
fn test_plane_and_function() {
    match kind("PLANE SPATIAL SPA0 SPB0 SPC0 STAY SEQ+ TABLE ROT") {
        BlockKind::PlaneTransform(pt) => {
            assert_eq!(pt.kind, PlaneKind::Spatial);
            assert_eq!(pt.params, [("SPA".to_string(), num(0.)),
                                   ("SPB".to_string(), num(0.)),
                                   ("SPC".to_string(), num(0.))]);
            assert_eq!(pt.options, ["STAY", "SEQ+", "TABLE", "ROT"]);
        }
        other => panic!("{:?}", other),
    }
    match kind("PLANE RESET STAY") {
        BlockKind::PlaneTransform(pt) => {
            assert_eq!(pt.kind, PlaneKind::Reset);
            assert_eq!(pt.options, ["STAY"]);
        }
        other => panic!("{:?}", other),
    }
    assert_eq!(kind("FUNCTION RESET TCPM"), BlockKind::Function(vec!["RESET".into(), "TCPM".into()]));
}

#[test]
fn test_comments_and_annotations() {
    let src = "\
; T1623370207 | KOM-U11-TF39_H63ABS50 / DM=39 CR=0 TL=227
* - TOOL: T1556708415 | GUH-5512-BHF8.6_H63Z10L85 / DM=8.6 CR=0 TL=178
*   - JOB: 9: D8.6-menetalap-CYCL200
* --- LBL BEGIN --------------------
";
    let (blocks, diags) = classify_all(src, &ParseOptions::default());
    assert!(diags.is_empty());
    let comments: Vec<_> = blocks.iter().map(|b| match &b.kind {
        BlockKind::Comment(c) => c.clone(),
        other => panic!("{:?}", other),
    }).collect();

    // remarks are never interpreted
    assert_eq!(comments[0].kind, CommentKind::Remark);
    assert_eq!(comments[0].annotation, None);
    assert_eq!(comments[1].kind, CommentKind::Annotation);
    assert_eq!(comments[1].annotation, Some(Annotation::Tool(ToolEntry {
        id: "T1556708415".into(),
        name: "GUH-5512-BHF8.6_H63Z10L85".into(),
        diameter: Some(8.6),
        corner_radius: Some(0.),
        length: Some(178.),
    })));
    assert_eq!(comments[2].annotation, Some(Annotation::Job {
        number: 9,
        title: "D8.6-menetalap-CYCL200".into(),
    }));
    assert_eq!(comments[3].annotation, None);

    let (blocks, _) = classify_all(src, &ParseOptions::default().parse_annotations(false));
    assert!(blocks.iter().all(|b| matches!(&b.kind, BlockKind::Comment(c) if c.annotation.is_none())));
}

#[test]
fn test_unknown_blocks() {
    for snippet in &[
        "CC X10 Y20",             // unsupported keyword
        "TOOL CALL",              // missing tool
        "BLK FORM 0.3 X1",        // invalid corner
        "LBL",                    // missing label
        "FN 9: IF +Q1 EQU GOTO LBL 1",  // missing operand
        "PLANE",                  // missing plane kind
    ] {
        let (kind, diags) = classify_one(snippet);
        assert_eq!(kind, BlockKind::Comment(Comment {
            kind: CommentKind::Unrecognized,
            text: snippet.to_string(),
            annotation: None,
        }), "{}", snippet);
        assert_eq!(diags.len(), 1, "{}", snippet);
        assert_eq!(diags.of_kind(DiagKind::UnknownBlock).count(), 1, "{}", snippet);
    }
}
