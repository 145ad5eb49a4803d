//! Cache behavior: local name/identity memoization, inline image
//! memoization and cross-page promotion in the global image cache.

mod common;

use common::{Harness, count_ops, dict};
use bytes::Bytes;
use miranda_core::model::{Dict, ObjRef, Object, StreamObject};
use miranda_core::oplist::OperatorList;
use miranda_core::parser::ContentStream;
use miranda_core::{ContentEvaluator, EvalTask, OpCode};
use std::sync::atomic::Ordering;

fn image_stream(width: i64, height: i64) -> Object {
    let dict = dict(vec![
        ("Type", Object::Name("XObject".into())),
        ("Subtype", Object::Name("Image".into())),
        ("Width", Object::Int(width)),
        ("Height", Object::Int(height)),
        ("BitsPerComponent", Object::Int(8)),
        ("ColorSpace", Object::Name("DeviceGray".into())),
    ]);
    let data = vec![0x80u8; (width * height) as usize];
    Object::Stream(Box::new(StreamObject::with_ref(
        dict,
        data,
        ObjRef::new(5, 0),
    )))
}

fn image_resources() -> Dict {
    dict(vec![(
        "XObject",
        Object::Dict(dict(vec![("Im1", Object::Ref(ObjRef::new(5, 0)))])),
    )])
}

#[test]
fn test_repeated_image_decodes_once_per_call() {
    let harness = Harness::new();
    harness.store.insert(5, image_stream(4, 4));
    let list = harness.run("/Im1 Do /Im1 Do", &image_resources()).unwrap();

    assert_eq!(harness.images.built.load(Ordering::SeqCst), 1);
    assert_eq!(count_ops(&list, OpCode::PaintImageXObject), 2);
    // One dependency, one delivery.
    assert_eq!(list.dependencies().len(), 1);
    assert_eq!(harness.channel.image_ids().len(), 1);
}

#[test]
fn test_oversized_image_is_dropped() {
    let harness = Harness::with_options(miranda_core::EvaluatorOptions {
        max_image_size: 8,
        ..Default::default()
    });
    harness.store.insert(5, image_stream(4, 4));
    let list = harness.run("/Im1 Do", &image_resources()).unwrap();
    assert_eq!(count_ops(&list, OpCode::PaintImageXObject), 0);
    assert_eq!(harness.images.built.load(Ordering::SeqCst), 0);
}

#[test]
fn test_image_mask_bypasses_image_pipeline() {
    let harness = Harness::new();
    let mask_dict = dict(vec![
        ("Subtype", Object::Name("Image".into())),
        ("Width", Object::Int(8)),
        ("Height", Object::Int(1)),
        ("ImageMask", Object::Bool(true)),
        (
            "Decode",
            Object::Array(vec![Object::Int(1), Object::Int(0)]),
        ),
    ]);
    harness.store.insert(
        5,
        Object::Stream(Box::new(StreamObject::with_ref(
            mask_dict,
            vec![0b1100_0000u8],
            ObjRef::new(5, 0),
        ))),
    );
    let list = harness.run("/Im1 Do", &image_resources()).unwrap();

    assert_eq!(count_ops(&list, OpCode::PaintImageMaskXObject), 1);
    assert_eq!(harness.images.masks.load(Ordering::SeqCst), 1);
    assert_eq!(harness.images.built.load(Ordering::SeqCst), 0);
    assert!(list.dependencies().is_empty());
}

#[test]
fn test_inline_image_memoized_within_call() {
    let harness = Harness::new();
    let content = "BI /W 2 /H 1 /BPC 8 /CS /G ID \x01\x02 EI Q q BI /W 2 /H 1 /BPC 8 /CS /G ID \x01\x02 EI";
    let list = harness.run(content, &Dict::default()).unwrap();

    assert_eq!(count_ops(&list, OpCode::PaintInlineImageXObject), 2);
    // The second occurrence replays the memoized decode.
    assert_eq!(harness.images.built.load(Ordering::SeqCst), 1);
}

#[test]
fn test_global_cache_promotes_after_two_pages() {
    let harness = Harness::new();
    harness.store.insert(5, image_stream(4, 4));
    let resources = image_resources();

    // Page 0: first sighting, not yet shared.
    harness.run("/Im1 Do", &resources).unwrap();
    assert_eq!(harness.images.built.load(Ordering::SeqCst), 1);

    // Page 1: second sighting promotes the entry.
    let page1 = ContentEvaluator::new(
        harness.evaluator.context().clone(),
        1,
        miranda_core::EvaluatorOptions::default(),
    );
    let task = EvalTask::new();
    let mut list1 = OperatorList::new();
    futures::executor::block_on(page1.get_operator_list(
        ContentStream::from("/Im1 Do"),
        &resources,
        &mut list1,
        None,
        &task,
    ))
    .unwrap();
    assert_eq!(harness.images.built.load(Ordering::SeqCst), 2);
    assert!(list1.dependencies().contains("g_img_5R0"));

    // Page 2: served from the global cache, no decode.
    let page2 = ContentEvaluator::new(
        harness.evaluator.context().clone(),
        2,
        miranda_core::EvaluatorOptions::default(),
    );
    let mut list2 = OperatorList::new();
    futures::executor::block_on(page2.get_operator_list(
        ContentStream::from("/Im1 Do"),
        &resources,
        &mut list2,
        None,
        &task,
    ))
    .unwrap();
    assert_eq!(harness.images.built.load(Ordering::SeqCst), 2);
    assert_eq!(count_ops(&list2, OpCode::PaintImageXObject), 1);
    assert!(list2.dependencies().contains("g_img_5R0"));
}
