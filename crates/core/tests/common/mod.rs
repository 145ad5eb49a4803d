//! Shared fixtures for the evaluator integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use miranda_core::caches::GlobalImageCache;
use miranda_core::error::Result;
use miranda_core::font::simple::SimpleFontBackend;
use miranda_core::font::{FontBackend, FontCache, FontProgram, FontProperties};
use miranda_core::function::IdentityFunctionFactory;
use miranda_core::image::{DecodedImage, ImageDecoder, MaskData, RawImageDecoder};
use miranda_core::model::{Dict, Object};
use miranda_core::oplist::OperatorList;
use miranda_core::parser::ContentStream;
use miranda_core::pattern::BasicShadingParser;
use miranda_core::store::MemoryStore;
use miranda_core::transport::{Message, MessageChannel, Request, UnsupportedFeature};
use miranda_core::{ContentEvaluator, EvalTask, EvaluatorContext, EvaluatorOptions, OpCode};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Channel that records every fire-and-forget message.
#[derive(Default)]
pub struct RecordingChannel {
    pub messages: Mutex<Vec<Message>>,
}

impl RecordingChannel {
    pub fn unsupported_features(&self) -> Vec<UnsupportedFeature> {
        self.messages
            .lock()
            .iter()
            .filter_map(|msg| match msg {
                Message::UnsupportedFeature(feature) => Some(*feature),
                _ => None,
            })
            .collect()
    }

    pub fn image_ids(&self) -> Vec<String> {
        self.messages
            .lock()
            .iter()
            .filter_map(|msg| match msg {
                Message::Image { object_id, .. } => Some(object_id.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl MessageChannel for RecordingChannel {
    fn send(&self, msg: Message) {
        self.messages.lock().push(msg);
    }

    async fn send_with_promise(&self, req: Request) -> Result<Object> {
        Err(miranda_core::EvalError::MissingResource(format!("{req:?}")))
    }
}

/// Font backend counting how many translations actually run.
#[derive(Default)]
pub struct CountingFontBackend {
    pub created: AtomicUsize,
}

impl FontBackend for CountingFontBackend {
    fn create_font(&self, props: FontProperties) -> Result<Arc<dyn FontProgram>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        SimpleFontBackend.create_font(props)
    }
}

/// Image decoder counting decode requests.
#[derive(Default)]
pub struct CountingImageDecoder {
    pub built: AtomicUsize,
    pub masks: AtomicUsize,
}

#[async_trait]
impl ImageDecoder for CountingImageDecoder {
    async fn build_image(
        &self,
        dict: &Dict,
        data: Bytes,
        resources: &Dict,
        force_rgba: bool,
    ) -> Result<DecodedImage> {
        self.built.fetch_add(1, Ordering::SeqCst);
        RawImageDecoder
            .build_image(dict, data, resources, force_rgba)
            .await
    }

    fn create_mask(&self, data: Bytes, width: u32, height: u32, invert: bool) -> Result<MaskData> {
        self.masks.fetch_add(1, Ordering::SeqCst);
        RawImageDecoder.create_mask(data, width, height, invert)
    }
}

/// A full test harness: evaluator plus handles on its collaborators.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub channel: Arc<RecordingChannel>,
    pub fonts: Arc<CountingFontBackend>,
    pub images: Arc<CountingImageDecoder>,
    pub evaluator: ContentEvaluator,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_options(EvaluatorOptions::default())
    }

    pub fn lenient() -> Self {
        Self::with_options(EvaluatorOptions {
            ignore_errors: true,
            ..Default::default()
        })
    }

    pub fn with_options(options: EvaluatorOptions) -> Self {
        let store = Arc::new(MemoryStore::new());
        let channel = Arc::new(RecordingChannel::default());
        let fonts = Arc::new(CountingFontBackend::default());
        let images = Arc::new(CountingImageDecoder::default());
        let ctx = EvaluatorContext {
            store: store.clone(),
            channel: channel.clone(),
            fonts: fonts.clone(),
            images: images.clone(),
            shadings: Arc::new(BasicShadingParser),
            functions: Arc::new(IdentityFunctionFactory),
            font_cache: Arc::new(FontCache::new()),
            image_cache: Arc::new(GlobalImageCache::new()),
        };
        let evaluator = ContentEvaluator::new(ctx, 0, options);
        Self {
            store,
            channel,
            fonts,
            images,
            evaluator,
        }
    }

    /// Evaluate a content stream, returning the operator list.
    pub fn run(&self, content: &str, resources: &Dict) -> Result<OperatorList> {
        let task = EvalTask::new();
        let mut op_list = OperatorList::new();
        futures::executor::block_on(self.evaluator.get_operator_list(
            ContentStream::from(content),
            resources,
            &mut op_list,
            None,
            &task,
        ))?;
        Ok(op_list)
    }

    pub fn run_bytes(&self, content: &[u8], resources: &Dict) -> Result<OperatorList> {
        let task = EvalTask::new();
        let mut op_list = OperatorList::new();
        futures::executor::block_on(self.evaluator.get_operator_list(
            ContentStream::from(content),
            resources,
            &mut op_list,
            None,
            &task,
        ))?;
        Ok(op_list)
    }
}

/// Build a dictionary from static keys.
pub fn dict(entries: Vec<(&'static str, Object)>) -> Dict {
    entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

/// A simple font dictionary: widths 500 for codes 32..=126.
pub fn simple_font_dict() -> Object {
    let widths: Vec<Object> = (32..=126).map(|_| Object::Int(500)).collect();
    Object::Dict(dict(vec![
        ("Type", Object::Name("Font".into())),
        ("Subtype", Object::Name("Type1".into())),
        ("BaseFont", Object::Name("Helvetica".into())),
        ("FirstChar", Object::Int(32)),
        ("LastChar", Object::Int(126)),
        ("Widths", Object::Array(widths)),
    ]))
}

/// Count occurrences of an operator code.
pub fn count_ops(list: &OperatorList, op: OpCode) -> usize {
    list.fn_array().iter().filter(|o| **o == op).count()
}
