//! Marked content and optional-content visibility expressions.

mod common;

use common::{Harness, dict};
use miranda_core::model::{Dict, ObjRef, Object};
use miranda_core::oplist::{MarkedProps, OpArgs, VisibilityExpression};
use miranda_core::transport::UnsupportedFeature;
use miranda_core::OpCode;

#[test]
fn test_bmc_passes_tag_through() {
    let harness = Harness::new();
    let list = harness.run("/Artifact BMC EMC", &Dict::default()).unwrap();
    assert_eq!(
        list.fn_array(),
        &[OpCode::BeginMarkedContent, OpCode::EndMarkedContent]
    );
    match &list.args_array()[0] {
        OpArgs::Name(tag) => assert_eq!(tag, "Artifact"),
        other => panic!("unexpected BMC args: {other:?}"),
    }
}

#[test]
fn test_bdc_with_inline_dictionary() {
    let harness = Harness::new();
    let list = harness
        .run("/Span <</ActualText (hi)>> BDC EMC", &Dict::default())
        .unwrap();
    match &list.args_array()[0] {
        OpArgs::MarkedContent { tag, props } => {
            assert_eq!(tag, "Span");
            assert!(matches!(props, MarkedProps::Raw(Object::Dict(_))));
        }
        other => panic!("unexpected BDC args: {other:?}"),
    }
}

#[test]
fn test_bdc_resolves_named_properties() {
    let harness = Harness::new();
    let resources = dict(vec![(
        "Properties",
        Object::Dict(dict(vec![(
            "P0",
            Object::Dict(dict(vec![("MCID", Object::Int(3))])),
        )])),
    )]);
    let list = harness.run("/Span /P0 BDC EMC", &resources).unwrap();
    match &list.args_array()[0] {
        OpArgs::MarkedContent { props, .. } => match props {
            MarkedProps::Raw(Object::Dict(d)) => {
                assert_eq!(d.get("MCID"), Some(&Object::Int(3)));
            }
            other => panic!("unexpected props: {other:?}"),
        },
        other => panic!("unexpected BDC args: {other:?}"),
    }
}

/// Build an OCMD whose visibility expression is `levels` nested arrays
/// deep, bottoming out at an OCG reference.
fn nested_ocmd(levels: usize) -> Object {
    let mut expr = Object::Array(vec![
        Object::Name("Or".into()),
        Object::Ref(ObjRef::new(20, 0)),
    ]);
    for _ in 1..levels {
        expr = Object::Array(vec![Object::Name("Not".into()), expr]);
    }
    Object::Dict(dict(vec![
        ("Type", Object::Name("OCMD".into())),
        ("VE", expr),
        (
            "OCGs",
            Object::Array(vec![Object::Ref(ObjRef::new(20, 0))]),
        ),
    ]))
}

fn oc_resources(ocmd: Object) -> Dict {
    dict(vec![(
        "Properties",
        Object::Dict(dict(vec![("OC1", ocmd)])),
    )])
}

fn optional_content(list_args: &OpArgs) -> &miranda_core::oplist::OptionalContentProps {
    match list_args {
        OpArgs::MarkedContent {
            props: MarkedProps::OptionalContent(oc),
            ..
        } => oc,
        other => panic!("expected optional content props, got {other:?}"),
    }
}

#[test]
fn test_visibility_expression_within_depth_limit() {
    let harness = Harness::new();
    let resources = oc_resources(nested_ocmd(10));
    let list = harness.run("/OC /OC1 BDC EMC", &resources).unwrap();
    let oc = optional_content(&list.args_array()[0]);
    assert_eq!(oc.kind, "OCMD");
    assert!(matches!(
        oc.expression,
        Some(VisibilityExpression::Not(_))
    ));
}

#[test]
fn test_visibility_expression_too_deep_contributes_nothing() {
    let harness = Harness::new();
    let resources = oc_resources(nested_ocmd(11));
    let list = harness.run("/OC /OC1 BDC EMC", &resources).unwrap();
    let oc = optional_content(&list.args_array()[0]);
    // The expression is rejected; group membership still applies.
    assert!(oc.expression.is_none());
    assert_eq!(oc.ids, vec!["20R0".to_string()]);
}

#[test]
fn test_ocg_reference_keeps_identity() {
    let harness = Harness::new();
    harness.store.insert(
        21,
        Object::Dict(dict(vec![("Type", Object::Name("OCG".into()))])),
    );
    let resources = dict(vec![(
        "Properties",
        Object::Dict(dict(vec![("OC1", Object::Ref(ObjRef::new(21, 0)))])),
    )]);
    let list = harness.run("/OC /OC1 BDC EMC", &resources).unwrap();
    let oc = optional_content(&list.args_array()[0]);
    assert_eq!(oc.kind, "OCG");
    assert_eq!(oc.ids, vec!["21R0".to_string()]);
}

#[test]
fn test_bad_marked_content_lenient() {
    let harness = Harness::lenient();
    // The named property list does not exist.
    let list = harness.run("/Span /Ghost BDC EMC", &Dict::default()).unwrap();
    assert_eq!(list.fn_array(), &[OpCode::EndMarkedContent]);
    assert!(harness
        .channel
        .unsupported_features()
        .contains(&UnsupportedFeature::MarkedContent));
}
