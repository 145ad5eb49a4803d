//! ExtGState flattening: primitive entries, blend-mode normalization,
//! nested font changes and transfer-function sampling.

mod common;

use common::{Harness, dict, simple_font_dict};
use miranda_core::model::{Dict, ObjRef, Object};
use miranda_core::oplist::{GStateEntry, OpArgs};
use miranda_core::transport::UnsupportedFeature;
use miranda_core::{EvalError, OpCode};

fn gstate_entries(list_args: &OpArgs) -> Vec<GStateEntry> {
    match list_args {
        OpArgs::GState(entries) => entries.as_ref().clone(),
        other => panic!("expected gstate args, got {other:?}"),
    }
}

#[test]
fn test_gstate_flattens_primitive_entries() {
    let harness = Harness::new();
    let resources = dict(vec![(
        "ExtGState",
        Object::Dict(dict(vec![(
            "GS1",
            Object::Dict(dict(vec![
                ("Type", Object::Name("ExtGState".into())),
                ("LW", Object::Real(2.5)),
                ("CA", Object::Real(1.0)),
                ("ca", Object::Real(0.5)),
                ("BM", Object::Name("Multiply".into())),
            ])),
        )])),
    )]);
    let list = harness.run("/GS1 gs", &resources).unwrap();

    assert_eq!(list.fn_array(), &[OpCode::SetGState]);
    let entries = gstate_entries(&list.args_array()[0]);
    // Keys flatten in sorted order: BM, CA, LW, ca.
    assert!(matches!(&entries[0], GStateEntry::BlendMode(mode) if mode == "multiply"));
    assert!(matches!(entries[1], GStateEntry::StrokeAlpha(a) if a == 1.0));
    assert!(matches!(entries[2], GStateEntry::LineWidth(w) if w == 2.5));
    assert!(matches!(entries[3], GStateEntry::FillAlpha(a) if a == 0.5));
}

#[test]
fn test_unknown_blend_mode_falls_back_to_normal() {
    let harness = Harness::new();
    let resources = dict(vec![(
        "ExtGState",
        Object::Dict(dict(vec![(
            "GS1",
            Object::Dict(dict(vec![("BM", Object::Name("Bogus".into()))])),
        )])),
    )]);
    let list = harness.run("/GS1 gs", &resources).unwrap();
    let entries = gstate_entries(&list.args_array()[0]);
    assert!(matches!(&entries[0], GStateEntry::BlendMode(mode) if mode == "normal"));
}

#[test]
fn test_gstate_nested_font_resolves() {
    let harness = Harness::new();
    harness.store.insert(4, simple_font_dict());
    let resources = dict(vec![(
        "ExtGState",
        Object::Dict(dict(vec![(
            "GS1",
            Object::Dict(dict(vec![(
                "Font",
                Object::Array(vec![Object::Ref(ObjRef::new(4, 0)), Object::Int(9)]),
            )])),
        )])),
    )]);
    let list = harness.run("/GS1 gs", &resources).unwrap();

    let entries = gstate_entries(&list.args_array()[list.fn_array().len() - 1]);
    assert!(matches!(
        &entries[0],
        GStateEntry::Font { loaded_name, size } if loaded_name == "g_font_1" && *size == 9.0
    ));
    assert!(list.dependencies().contains("g_font_1"));
}

#[test]
fn test_transfer_function_sampled_into_lut() {
    let harness = Harness::new();
    let resources = dict(vec![(
        "ExtGState",
        Object::Dict(dict(vec![(
            "GS1",
            Object::Dict(dict(vec![(
                "TR",
                Object::Dict(dict(vec![("FunctionType", Object::Int(2))])),
            )])),
        )])),
    )]);
    let list = harness.run("/GS1 gs", &resources).unwrap();
    let entries = gstate_entries(&list.args_array()[0]);
    match &entries[0] {
        GStateEntry::TransferFunction(tables) => {
            assert_eq!(tables.len(), 1);
            // The identity factory samples to the identity ramp.
            assert_eq!(tables[0][0], 0);
            assert_eq!(tables[0][255], 255);
        }
        other => panic!("unexpected entry: {other:?}"),
    }
}

#[test]
fn test_plain_gstate_cached_by_name() {
    let harness = Harness::new();
    let resources = dict(vec![(
        "ExtGState",
        Object::Dict(dict(vec![(
            "GS1",
            Object::Dict(dict(vec![("LW", Object::Int(3))])),
        )])),
    )]);
    let list = harness.run("/GS1 gs /GS1 gs", &resources).unwrap();
    assert_eq!(list.fn_array(), &[OpCode::SetGState, OpCode::SetGState]);
    // Both emissions share the cached entry list.
    let (first, second) = (
        gstate_entries(&list.args_array()[0]),
        gstate_entries(&list.args_array()[1]),
    );
    assert_eq!(first.len(), second.len());
}

#[test]
fn test_missing_gstate_lenient_vs_strict() {
    let lenient = Harness::lenient();
    let list = lenient.run("/Nope gs", &Dict::default()).unwrap();
    assert!(list.fn_array().is_empty());
    assert!(lenient
        .channel
        .unsupported_features()
        .contains(&UnsupportedFeature::ExtGState));

    let strict = Harness::new();
    let err = strict.run("/Nope gs", &Dict::default()).unwrap_err();
    assert!(matches!(err, EvalError::MissingResource(_)));
}

#[test]
fn test_smask_none_clears_mask() {
    let harness = Harness::new();
    let resources = dict(vec![(
        "ExtGState",
        Object::Dict(dict(vec![(
            "GS1",
            Object::Dict(dict(vec![("SMask", Object::Name("None".into()))])),
        )])),
    )]);
    let list = harness.run("/GS1 gs", &resources).unwrap();
    let entries = gstate_entries(&list.args_array()[0]);
    assert!(matches!(&entries[0], GStateEntry::SMask(None)));
}
