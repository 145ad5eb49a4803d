//! Preprocessor arity validation and recovery on malformed streams.

mod common;

use common::{Harness, count_ops, dict, simple_font_dict};
use miranda_core::model::{Dict, Object};
use miranda_core::oplist::OpArgs;
use miranda_core::{EvalError, OpCode};

#[test]
fn test_operators_bleeding_into_each_other_rebalance() {
    // A malformed stream where the gs operands run into the Tf operands:
    // /F2 /GS2 gs 5.711 Tf
    let harness = Harness::new();
    let resources = dict(vec![
        (
            "ExtGState",
            Object::Dict(dict(vec![(
                "GS2",
                Object::Dict(dict(vec![("LW", Object::Int(1))])),
            )])),
        ),
        (
            "Font",
            Object::Dict(dict(vec![("F2", simple_font_dict())])),
        ),
    ]);
    let list = harness.run("/F2 /GS2 gs 5.711 Tf", &resources).unwrap();

    assert_eq!(count_ops(&list, OpCode::SetGState), 1);
    assert_eq!(count_ops(&list, OpCode::SetFont), 1);
    let font_args = list
        .args_array()
        .iter()
        .find_map(|args| match args {
            OpArgs::Font { loaded_name, size } => Some((loaded_name.clone(), *size)),
            _ => None,
        })
        .unwrap();
    assert_eq!(font_args.1, 5.711);
    assert_eq!(font_args.0, "g_font_1");
}

#[test]
fn test_short_fixed_arity_operator_skipped() {
    let harness = Harness::new();
    // cm needs six numbers; the malformed one is dropped, the valid one
    // survives.
    let list = harness
        .run("1 0 cm 1 0 0 1 5 5 cm", &Dict::default())
        .unwrap();
    assert_eq!(list.fn_array(), &[OpCode::Transform]);
    match &list.args_array()[0] {
        OpArgs::Numbers(nums) => assert_eq!(nums.as_slice(), &[1.0, 0.0, 0.0, 1.0, 5.0, 5.0]),
        other => panic!("unexpected transform args: {other:?}"),
    }
}

#[test]
fn test_variable_arity_accepts_fewer_args() {
    let harness = Harness::new();
    // sc with two components is unusual but legal for the preprocessor.
    let list = harness.run("0.1 0.2 sc", &Dict::default()).unwrap();
    assert_eq!(list.fn_array(), &[OpCode::SetFillRgbColor]);
}

#[test]
fn test_too_many_arguments_fail() {
    let harness = Harness::new();
    let content = (1..=34)
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(" ")
        + " cm";
    let err = harness.run(&content, &Dict::default()).unwrap_err();
    assert!(matches!(err, EvalError::Format(_)));
}

#[test]
fn test_leftover_operands_at_eof_are_dropped() {
    let harness = Harness::new();
    let list = harness.run("q Q 1 2 3", &Dict::default()).unwrap();
    assert_eq!(list.fn_array(), &[OpCode::Save, OpCode::Restore]);
}

#[test]
fn test_state_depth_tracked_through_preprocessor() {
    let harness = Harness::new();
    // The transform inside the save must not survive the restore; the
    // second transform composes onto the identity.
    let list = harness
        .run("q 2 0 0 2 0 0 cm Q 1 0 0 1 9 9 cm", &Dict::default())
        .unwrap();
    assert_eq!(
        list.fn_array(),
        &[
            OpCode::Save,
            OpCode::Transform,
            OpCode::Restore,
            OpCode::Transform,
        ]
    );
}
