//! Text content extraction: run building, spacing heuristics, line
//! breaks and RTL handling.

mod common;

use common::{Harness, dict};
use miranda_core::model::{Dict, Object, StreamObject};
use miranda_core::parser::ContentStream;
use miranda_core::textcontent::{TextContent, TextDirection};
use miranda_core::EvalTask;

/// A font whose space is 250 units and letters 500.
fn extraction_font_dict() -> Object {
    let widths: Vec<Object> = (32..=126)
        .map(|code| Object::Int(if code == 32 { 250 } else { 500 }))
        .collect();
    Object::Dict(dict(vec![
        ("Type", Object::Name("Font".into())),
        ("Subtype", Object::Name("Type1".into())),
        ("BaseFont", Object::Name("Helvetica".into())),
        ("FirstChar", Object::Int(32)),
        ("LastChar", Object::Int(126)),
        ("Widths", Object::Array(widths)),
    ]))
}

fn font_resources() -> Dict {
    dict(vec![(
        "Font",
        Object::Dict(dict(vec![("F1", extraction_font_dict())])),
    )])
}

fn extract(harness: &Harness, content: &str, resources: &Dict) -> TextContent {
    let task = EvalTask::new();
    futures::executor::block_on(harness.evaluator.get_text_content(
        ContentStream::from(content),
        resources,
        &task,
    ))
    .unwrap()
}

#[test]
fn test_simple_run() {
    let harness = Harness::new();
    let content = extract(
        &harness,
        "BT /F1 10 Tf 100 700 Td (Hello) Tj ET",
        &font_resources(),
    );
    assert_eq!(content.items.len(), 1);
    let item = &content.items[0];
    assert_eq!(item.text, "Hello");
    assert_eq!(item.dir, TextDirection::Ltr);
    // Five 500-unit glyphs at size 10.
    assert!((item.width - 25.0).abs() < 1e-6);
    assert_eq!(item.transform.4, 100.0);
    assert_eq!(item.transform.5, 700.0);
    assert!(content.styles.contains_key(&item.font_name));
}

#[test]
fn test_kerning_noise_is_ignored() {
    let harness = Harness::new();
    // Gap of 0.5 units against a 2.5-unit space: kerning.
    let content = extract(
        &harness,
        "BT /F1 10 Tf [(A) -50 (B)] TJ ET",
        &font_resources(),
    );
    assert_eq!(content.items.len(), 1);
    assert_eq!(content.items[0].text, "AB");
}

#[test]
fn test_space_sized_gap_inserts_space() {
    let harness = Harness::new();
    // Gap of 1.0 unit: between 0.3x and 1.3x of the 2.5-unit space.
    let content = extract(
        &harness,
        "BT /F1 10 Tf [(A) -100 (B)] TJ ET",
        &font_resources(),
    );
    assert_eq!(content.items.len(), 1);
    assert_eq!(content.items[0].text, "A B");
}

#[test]
fn test_large_gap_breaks_run() {
    let harness = Harness::new();
    // Gap of 6 units: beyond 1.3x of the space width.
    let content = extract(
        &harness,
        "BT /F1 10 Tf [(A) -600 (B)] TJ ET",
        &font_resources(),
    );
    assert_eq!(content.items.len(), 2);
    assert_eq!(content.items[0].text, "A");
    assert_eq!(content.items[1].text, "B");
}

#[test]
fn test_perpendicular_shift_ends_line() {
    let harness = Harness::new();
    let content = extract(
        &harness,
        "BT /F1 10 Tf (A) Tj 0 -20 Td (B) Tj ET",
        &font_resources(),
    );
    assert_eq!(content.items.len(), 2);
    assert!(content.items[0].has_eol);
    assert!(!content.items[1].has_eol);
}

#[test]
fn test_word_spacing_counts_into_advances() {
    let harness = Harness::new();
    let content = extract(
        &harness,
        "BT /F1 10 Tf 2 Tw (a b) Tj ET",
        &font_resources(),
    );
    assert_eq!(content.items.len(), 1);
    // Widths: 0.5*10*2 letters + space 0.25*10 + word spacing 2.
    assert!((content.items[0].width - 14.5).abs() < 1e-6);
}

#[test]
fn test_rtl_run_is_reversed() {
    let harness = Harness::new();
    // Map codes 65/66 to Hebrew aleph/bet through a ToUnicode stream.
    let to_unicode =
        b"1 beginbfchar <41> <05D0> endbfchar 1 beginbfchar <42> <05D1> endbfchar".to_vec();
    let widths: Vec<Object> = (32..=126).map(|_| Object::Int(500)).collect();
    let font = Object::Dict(dict(vec![
        ("Type", Object::Name("Font".into())),
        ("Subtype", Object::Name("Type1".into())),
        ("BaseFont", Object::Name("David".into())),
        ("FirstChar", Object::Int(32)),
        ("LastChar", Object::Int(126)),
        ("Widths", Object::Array(widths)),
        (
            "ToUnicode",
            Object::Stream(Box::new(StreamObject::new(Dict::default(), to_unicode))),
        ),
    ]));
    let resources = dict(vec![("Font", Object::Dict(dict(vec![("F1", font)])))]);

    let content = extract(&harness, "BT /F1 10 Tf (AB) Tj ET", &resources);
    assert_eq!(content.items.len(), 1);
    let item = &content.items[0];
    assert_eq!(item.dir, TextDirection::Rtl);
    // Physically reversed before emission.
    assert_eq!(item.text, "\u{05D1}\u{05D0}");
}

#[test]
fn test_form_xobject_text_is_extracted() {
    let harness = Harness::new();
    let form_dict = dict(vec![
        ("Type", Object::Name("XObject".into())),
        ("Subtype", Object::Name("Form".into())),
        (
            "Resources",
            Object::Dict(font_resources()),
        ),
    ]);
    let form = Object::Stream(Box::new(StreamObject::new(
        form_dict,
        b"BT /F1 10 Tf (inner) Tj ET".to_vec(),
    )));
    let resources = dict(vec![(
        "XObject",
        Object::Dict(dict(vec![("Fm", form)])),
    )]);

    let content = extract(&harness, "/Fm Do", &resources);
    assert_eq!(content.items.len(), 1);
    assert_eq!(content.items[0].text, "inner");
}

#[test]
fn test_multiple_shows_on_one_line_merge() {
    let harness = Harness::new();
    let content = extract(
        &harness,
        "BT /F1 10 Tf (fo) Tj (od) Tj ET",
        &font_resources(),
    );
    assert_eq!(content.items.len(), 1);
    assert_eq!(content.items[0].text, "food");
}
