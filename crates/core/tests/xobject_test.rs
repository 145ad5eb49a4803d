//! Form XObject recursion, grouping and failure policy.

mod common;

use common::{Harness, count_ops, dict};
use miranda_core::model::{Dict, ObjRef, Object, StreamObject};
use miranda_core::oplist::OpArgs;
use miranda_core::transport::UnsupportedFeature;
use miranda_core::{EvalError, OpCode};

fn form_object(content: &[u8], extra: Vec<(&'static str, Object)>) -> Object {
    let mut entries = vec![
        ("Type", Object::Name("XObject".into())),
        ("Subtype", Object::Name("Form".into())),
        (
            "BBox",
            Object::Array(vec![
                Object::Int(0),
                Object::Int(0),
                Object::Int(100),
                Object::Int(100),
            ]),
        ),
    ];
    entries.extend(extra);
    Object::Stream(Box::new(StreamObject::with_ref(
        dict(entries),
        content.to_vec(),
        ObjRef::new(3, 0),
    )))
}

fn form_resources() -> Dict {
    dict(vec![(
        "XObject",
        Object::Dict(dict(vec![("Fm", Object::Ref(ObjRef::new(3, 0)))])),
    )])
}

#[test]
fn test_form_wraps_nested_evaluation() {
    let harness = Harness::new();
    harness
        .store
        .insert(3, form_object(b"q 0 0 5 5 re f Q", vec![]));
    let list = harness.run("/Fm Do", &form_resources()).unwrap();

    assert_eq!(
        list.fn_array(),
        &[
            OpCode::PaintFormXObjectBegin,
            OpCode::Save,
            OpCode::ConstructPath,
            OpCode::Fill,
            OpCode::Restore,
            OpCode::PaintFormXObjectEnd,
        ]
    );
    match &list.args_array()[0] {
        OpArgs::FormBegin { matrix, bbox } => {
            assert!(matrix.is_none());
            assert_eq!(*bbox, Some((0.0, 0.0, 100.0, 100.0)));
        }
        other => panic!("unexpected form args: {other:?}"),
    }
}

#[test]
fn test_transparency_group_wraps_form() {
    let harness = Harness::new();
    harness.store.insert(
        3,
        form_object(
            b"0 0 5 5 re f",
            vec![(
                "Group",
                Object::Dict(dict(vec![
                    ("S", Object::Name("Transparency".into())),
                    ("I", Object::Bool(true)),
                ])),
            )],
        ),
    );
    let list = harness.run("/Fm Do", &form_resources()).unwrap();

    assert_eq!(list.fn_array()[0], OpCode::BeginGroup);
    assert_eq!(
        list.fn_array()[list.fn_array().len() - 1],
        OpCode::EndGroup
    );
    match &list.args_array()[0] {
        OpArgs::Group { isolated, knockout } => {
            assert!(*isolated);
            assert!(!*knockout);
        }
        other => panic!("unexpected group args: {other:?}"),
    }
}

#[test]
fn test_recursive_form_is_cut_off() {
    let harness = Harness::new();
    // The form invokes itself through its own resources.
    harness.store.insert(
        3,
        form_object(
            b"/Fm Do 0 0 5 5 re f",
            vec![("Resources", Object::Dict(form_resources()))],
        ),
    );
    let list = harness.run("/Fm Do", &form_resources()).unwrap();

    assert_eq!(count_ops(&list, OpCode::PaintFormXObjectBegin), 1);
    assert_eq!(count_ops(&list, OpCode::PaintFormXObjectEnd), 1);
    assert_eq!(count_ops(&list, OpCode::Fill), 1);
}

#[test]
fn test_form_state_is_restored_after_descent() {
    let harness = Harness::new();
    harness
        .store
        .insert(3, form_object(b"2 0 0 2 0 0 cm", vec![]));
    // The nested cm must not leak into the outer evaluation's state; the
    // outer save depth stays balanced.
    let list = harness.run("q /Fm Do Q", &form_resources()).unwrap();
    assert_eq!(
        count_ops(&list, OpCode::Save),
        count_ops(&list, OpCode::Restore)
    );
}

#[test]
fn test_unknown_subtype_lenient_vs_strict() {
    let strict = Harness::new();
    strict.store.insert(
        3,
        Object::Stream(Box::new(StreamObject::with_ref(
            dict(vec![("Subtype", Object::Name("Widget".into()))]),
            Vec::new(),
            ObjRef::new(3, 0),
        ))),
    );
    let err = strict.run("/Fm Do", &form_resources()).unwrap_err();
    assert!(matches!(err, EvalError::Format(_)));

    let lenient = Harness::lenient();
    lenient.store.insert(
        3,
        Object::Stream(Box::new(StreamObject::with_ref(
            dict(vec![("Subtype", Object::Name("Widget".into()))]),
            Vec::new(),
            ObjRef::new(3, 0),
        ))),
    );
    let list = lenient.run("/Fm Do", &form_resources()).unwrap();
    assert!(list.fn_array().is_empty());
    assert!(lenient
        .channel
        .unsupported_features()
        .contains(&UnsupportedFeature::XObject));
}

#[test]
fn test_missing_xobject_lenient() {
    let harness = Harness::lenient();
    let list = harness.run("/Ghost Do", &Dict::default()).unwrap();
    assert!(list.fn_array().is_empty());
    assert!(harness
        .channel
        .unsupported_features()
        .contains(&UnsupportedFeature::XObject));
}

#[test]
fn test_ps_subtype_is_ignored() {
    let harness = Harness::new();
    harness.store.insert(
        3,
        Object::Stream(Box::new(StreamObject::with_ref(
            dict(vec![("Subtype", Object::Name("PS".into()))]),
            Vec::new(),
            ObjRef::new(3, 0),
        ))),
    );
    let list = harness.run("/Fm Do", &form_resources()).unwrap();
    assert!(list.fn_array().is_empty());
}
