//! Font resolution pipeline: hashing, deduplication, single-flight and
//! error-font substitution.

mod common;

use common::{Harness, count_ops, dict};
use miranda_core::model::{Dict, ObjRef, Object};
use miranda_core::oplist::OpArgs;
use miranda_core::transport::{Message, UnsupportedFeature};
use miranda_core::OpCode;
use std::sync::atomic::Ordering;

/// A font dictionary with a descriptor, so its attributes hash.
fn hashed_font_dict(base_font: &str) -> Object {
    let widths: Vec<Object> = (32..=40).map(|_| Object::Int(600)).collect();
    Object::Dict(dict(vec![
        ("Type", Object::Name("Font".into())),
        ("Subtype", Object::Name("TrueType".into())),
        ("BaseFont", Object::Name(base_font.into())),
        ("FirstChar", Object::Int(32)),
        ("LastChar", Object::Int(40)),
        ("Widths", Object::Array(widths)),
        (
            "FontDescriptor",
            Object::Dict(dict(vec![
                ("Type", Object::Name("FontDescriptor".into())),
                ("Flags", Object::Int(32)),
            ])),
        ),
    ]))
}

#[test]
fn test_equivalent_fonts_translate_once() {
    let harness = Harness::new();
    // Two distinct objects with identical defining attributes.
    harness.store.insert(1, hashed_font_dict("Alpha"));
    harness.store.insert(2, hashed_font_dict("Alpha"));
    let resources = dict(vec![(
        "Font",
        Object::Dict(dict(vec![
            ("F1", Object::Ref(ObjRef::new(1, 0))),
            ("F2", Object::Ref(ObjRef::new(2, 0))),
        ])),
    )]);

    let list = harness
        .run("BT /F1 10 Tf (a) Tj /F2 10 Tf (b) Tj ET", &resources)
        .unwrap();

    assert_eq!(harness.fonts.created.load(Ordering::SeqCst), 1);
    let names: Vec<String> = list
        .args_array()
        .iter()
        .filter_map(|args| match args {
            OpArgs::Font { loaded_name, .. } => Some(loaded_name.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(names.len(), 2);
    assert_eq!(names[0], names[1]);
    // One dependency for the shared entry.
    assert_eq!(count_ops(&list, OpCode::Dependency), 1);
}

#[test]
fn test_same_reference_reuses_resolution() {
    let harness = Harness::new();
    harness.store.insert(1, hashed_font_dict("Alpha"));
    let resources = dict(vec![(
        "Font",
        Object::Dict(dict(vec![("F1", Object::Ref(ObjRef::new(1, 0)))])),
    )]);

    harness
        .run("BT /F1 10 Tf (a) Tj /F1 12 Tf (b) Tj ET", &resources)
        .unwrap();
    assert_eq!(harness.fonts.created.load(Ordering::SeqCst), 1);
}

#[test]
fn test_font_export_sent_once() {
    let harness = Harness::new();
    harness.store.insert(1, hashed_font_dict("Alpha"));
    let resources = dict(vec![(
        "Font",
        Object::Dict(dict(vec![("F1", Object::Ref(ObjRef::new(1, 0)))])),
    )]);
    harness
        .run("BT /F1 10 Tf (a) Tj /F1 12 Tf (b) Tj ET", &resources)
        .unwrap();

    let font_messages = harness
        .channel
        .messages
        .lock()
        .iter()
        .filter(|m| matches!(m, Message::Font { .. }))
        .count();
    assert_eq!(font_messages, 1);
}

#[test]
fn test_missing_font_substitutes_error_font() {
    let harness = Harness::lenient();
    let list = harness
        .run("BT /Nope 10 Tf (a) Tj ET", &Dict::default())
        .unwrap();

    assert!(harness
        .channel
        .unsupported_features()
        .contains(&UnsupportedFeature::MissingFont));
    // The operator list still carries a usable setFont; the error font
    // just maps no glyphs.
    assert_eq!(count_ops(&list, OpCode::SetFont), 1);
    assert_eq!(count_ops(&list, OpCode::ShowText), 1);
    match &list.args_array()[list
        .fn_array()
        .iter()
        .position(|op| *op == OpCode::ShowText)
        .unwrap()]
    {
        OpArgs::Glyphs(items) => assert!(items.is_empty()),
        other => panic!("unexpected showText args: {other:?}"),
    }
}

#[test]
fn test_dictionary_font_resolves_via_synthetic_key() {
    let harness = Harness::new();
    // The font entry is a bare dictionary rather than a reference.
    let resources = dict(vec![(
        "Font",
        Object::Dict(dict(vec![("F1", hashed_font_dict("Alpha"))])),
    )]);
    let list = harness.run("BT /F1 10 Tf (a) Tj ET", &resources).unwrap();
    assert_eq!(count_ops(&list, OpCode::SetFont), 1);
    assert_eq!(harness.fonts.created.load(Ordering::SeqCst), 1);
}

#[test]
fn test_dictionary_fonts_dedup_through_hash() {
    let harness = Harness::new();
    let resources = dict(vec![(
        "Font",
        Object::Dict(dict(vec![
            ("F1", hashed_font_dict("Alpha")),
            ("F2", hashed_font_dict("Alpha")),
        ])),
    )]);
    harness
        .run("BT /F1 10 Tf (a) Tj /F2 10 Tf (b) Tj ET", &resources)
        .unwrap();
    // Different synthesized keys, same attribute hash: one translation.
    assert_eq!(harness.fonts.created.load(Ordering::SeqCst), 1);
}
