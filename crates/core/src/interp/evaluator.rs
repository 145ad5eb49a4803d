//! Content evaluator.
//!
//! Owns the main dispatch loop over preprocessed operators: most append
//! directly to the operator list; resource-bearing operators suspend for
//! resolution (synchronously when cache-resident, asynchronously
//! otherwise) and recurse into nested evaluation for Form XObjects,
//! tiling patterns and Type3 glyph programs. Output order always matches
//! input order.

use crate::caches::{GlobalImageCache, ImageCacheEntry, LocalCache};
use crate::colorspace::ColorSpace;
use crate::error::{EvalError, Result};
use crate::font::cache::{FontCache, FontKey};
use crate::font::translate::{TranslatedFont, begin_translation, pre_evaluate_font};
use crate::font::{FontBackend, simple::SimpleFontBackend};
use crate::function::{FunctionFactory, IdentityFunctionFactory};
use crate::image::{ImageDecoder, RawImageDecoder};
use crate::interp::preproc::{Operation, Preprocessor};
use crate::interp::schedule::{EvalTask, TimeSlotManager, yield_now};
use crate::model::{Dict, EvalState, Object};
use crate::oplist::{GStateEntry, GlyphItem, OpArgs, OperatorList, PathOp};
use crate::ops::OpCode;
use crate::parser::content::ContentParser;
use crate::parser::ContentStream;
use crate::pattern::{BasicShadingParser, ShadingParser, TilingPatternIR};
use crate::store::{MemoryStore, ObjectStore};
use crate::transport::{Message, MessageChannel, NullChannel, UnsupportedFeature};
use futures::future::BoxFuture;
use smallvec::SmallVec;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::warn;

/// Evaluator configuration. Immutable: scoped reconfiguration goes
/// through [`ContentEvaluator::with_options`] / `for_type3`.
#[derive(Debug, Clone)]
pub struct EvaluatorOptions {
    /// Maximum image pixel count, -1 for unlimited
    pub max_image_size: i64,
    pub disable_font_face: bool,
    /// Recover from resource resolution failures instead of aborting
    pub ignore_errors: bool,
    /// Whether PDF function evaluation is available
    pub is_eval_supported: bool,
    pub font_extra_properties: bool,
    pub use_system_fonts: bool,
    pub cmap_url: Option<String>,
    pub standard_font_data_url: Option<String>,
}

impl Default for EvaluatorOptions {
    fn default() -> Self {
        Self {
            max_image_size: -1,
            disable_font_face: false,
            ignore_errors: false,
            is_eval_supported: true,
            font_extra_properties: false,
            use_system_fonts: true,
            cmap_url: None,
            standard_font_data_url: None,
        }
    }
}

/// External collaborators plus the document-scoped caches, cheap to
/// clone into resolution futures.
#[derive(Clone)]
pub struct EvaluatorContext {
    pub store: Arc<dyn ObjectStore>,
    pub channel: Arc<dyn MessageChannel>,
    pub fonts: Arc<dyn FontBackend>,
    pub images: Arc<dyn ImageDecoder>,
    pub shadings: Arc<dyn ShadingParser>,
    pub functions: Arc<dyn FunctionFactory>,
    pub font_cache: Arc<FontCache>,
    pub image_cache: Arc<GlobalImageCache>,
}

impl EvaluatorContext {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        channel: Arc<dyn MessageChannel>,
        fonts: Arc<dyn FontBackend>,
        images: Arc<dyn ImageDecoder>,
        shadings: Arc<dyn ShadingParser>,
        functions: Arc<dyn FunctionFactory>,
    ) -> Self {
        Self {
            store,
            channel,
            fonts,
            images,
            shadings,
            functions,
            font_cache: Arc::new(FontCache::new()),
            image_cache: Arc::new(GlobalImageCache::new()),
        }
    }

    /// A context wired to the built-in collaborators: in-memory store,
    /// metrics-only fonts, passthrough image and shading handling.
    pub fn basic(store: Arc<MemoryStore>) -> Self {
        Self::new(
            store,
            Arc::new(NullChannel),
            Arc::new(SimpleFontBackend),
            Arc::new(RawImageDecoder),
            Arc::new(BasicShadingParser),
            Arc::new(IdentityFunctionFactory),
        )
    }
}

/// Call-scoped caches, discarded when one evaluation completes.
#[derive(Default)]
pub(crate) struct LocalCaches {
    pub images: LocalCache<ImageCacheEntry>,
    pub color_spaces: LocalCache<Arc<ColorSpace>>,
    pub gstates: LocalCache<Arc<Vec<GStateEntry>>>,
    pub patterns: LocalCache<Arc<TilingPatternIR>>,
}

/// The content stream evaluator.
pub struct ContentEvaluator {
    pub(crate) ctx: EvaluatorContext,
    pub(crate) options: EvaluatorOptions,
    pub(crate) page_index: usize,
    next_image_id: Arc<AtomicUsize>,
}

impl ContentEvaluator {
    pub fn new(ctx: EvaluatorContext, page_index: usize, options: EvaluatorOptions) -> Self {
        Self {
            ctx,
            options,
            page_index,
            next_image_id: Arc::new(AtomicUsize::new(1)),
        }
    }

    /// A view of this evaluator with different options.
    pub fn with_options(&self, options: EvaluatorOptions) -> Self {
        Self {
            ctx: self.ctx.clone(),
            options,
            page_index: self.page_index,
            next_image_id: self.next_image_id.clone(),
        }
    }

    /// The stricter evaluator used for Type3 glyph programs: resolution
    /// failures there are never recoverable.
    pub fn for_type3(&self) -> Self {
        let mut options = self.options.clone();
        options.ignore_errors = false;
        self.with_options(options)
    }

    pub fn options(&self) -> &EvaluatorOptions {
        &self.options
    }

    pub fn context(&self) -> &EvaluatorContext {
        &self.ctx
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.ctx.store
    }

    pub(crate) fn report_unsupported(&self, feature: UnsupportedFeature) {
        self.ctx.channel.send(Message::UnsupportedFeature(feature));
    }

    /// Resource-resolution boundary: under lenient configuration the
    /// failure is reported and the resource treated as absent; otherwise
    /// it aborts the evaluation. Cancellation always propagates.
    pub(crate) fn recover(&self, feature: UnsupportedFeature, err: EvalError) -> Result<()> {
        if err.is_abort() {
            return Err(err);
        }
        if self.options.ignore_errors {
            warn!("recovered from {}: {err}", feature.tag());
            self.report_unsupported(feature);
            Ok(())
        } else {
            Err(err)
        }
    }

    /// Like [`recover`], for failures that have no feature tag.
    pub(crate) fn recover_quiet(&self, what: &str, err: EvalError) -> Result<()> {
        if err.is_abort() {
            return Err(err);
        }
        if self.options.ignore_errors {
            warn!("recovered from bad {what}: {err}");
            Ok(())
        } else {
            Err(err)
        }
    }

    pub(crate) fn next_image_object_id(&self) -> String {
        let id = self.next_image_id.fetch_add(1, Ordering::Relaxed);
        format!("img_p{}_{}", self.page_index, id)
    }

    /// Resolve a resource sub-dictionary, keeping its entries raw so
    /// reference identities survive for the caches.
    pub(crate) fn resource_dict(&self, resources: &Dict, key: &str) -> Result<Dict> {
        match resources.get(key) {
            Some(obj) => Ok(self
                .ctx
                .store
                .fetch_if_ref(obj)?
                .into_dict()
                .unwrap_or_default()),
            None => Ok(Dict::default()),
        }
    }

    /// Evaluate a content stream against its resource dictionary,
    /// appending to `op_list`.
    pub fn get_operator_list<'a>(
        &'a self,
        stream: ContentStream,
        resources: &'a Dict,
        op_list: &'a mut OperatorList,
        initial_state: Option<EvalState>,
        task: &'a Arc<EvalTask>,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut preproc = Preprocessor::new(
                ContentParser::new(stream.bytes()),
                initial_state.unwrap_or_default(),
            );
            let mut caches = LocalCaches::default();
            let mut time_slots = TimeSlotManager::new();
            let mut parsing_text = false;

            let xobjects = self.resource_dict(resources, "XObject")?;
            let patterns = self.resource_dict(resources, "Pattern")?;

            loop {
                task.ensure_running()?;
                if time_slots.check() {
                    op_list.ready().await;
                    yield_now().await;
                    time_slots.reset();
                }

                let Some(Operation { op, args }) = preproc.read()? else {
                    break;
                };

                match op {
                    OpCode::PaintXObject => {
                        let Some(Object::Name(name)) = args.first() else {
                            warn!("paintXObject without a name argument");
                            continue;
                        };
                        if let Some((cached_op, cached_args)) = caches.images.get_by_name(name) {
                            let (cached_op, cached_args) = (*cached_op, cached_args.clone());
                            op_list.add_op(cached_op, cached_args);
                            continue;
                        }
                        let result = match xobjects.get(name) {
                            Some(raw) => {
                                let raw = raw.clone();
                                self.do_paint_xobject(
                                    raw,
                                    name.clone(),
                                    resources,
                                    op_list,
                                    &mut preproc,
                                    &mut caches,
                                    task,
                                )
                                .await
                            }
                            None => Err(EvalError::MissingResource(format!("XObject {name}"))),
                        };
                        if let Err(err) = result {
                            self.recover(UnsupportedFeature::XObject, err)?;
                        }
                        op_list.ready().await;
                    }
                    OpCode::SetFont => {
                        let size = args.get(1).and_then(|s| s.as_num().ok()).unwrap_or(0.0);
                        let font_name = args
                            .first()
                            .and_then(|n| n.as_name().ok())
                            .map(str::to_string);
                        let translated = self
                            .handle_set_font(resources, font_name.as_deref(), None, op_list, task)
                            .await?;
                        let state = preproc.state_mut();
                        state.font = Some(translated.clone());
                        state.font_size = size;
                        op_list.add_dependency(&translated.loaded_name);
                        op_list.add_op(
                            OpCode::SetFont,
                            OpArgs::Font {
                                loaded_name: translated.loaded_name.clone(),
                                size,
                            },
                        );
                        op_list.ready().await;
                    }
                    OpCode::EndInlineImage => {
                        let Some(Object::Stream(image)) = args.into_iter().next() else {
                            continue;
                        };
                        let cache_key = inline_image_key(&image);
                        if let Some((cached_op, cached_args)) =
                            caches.images.get_by_name(&cache_key)
                        {
                            let (cached_op, cached_args) = (*cached_op, cached_args.clone());
                            op_list.add_op(cached_op, cached_args);
                            continue;
                        }
                        if let Err(err) = self
                            .build_paint_image(
                                &image,
                                None,
                                resources,
                                true,
                                Some(cache_key.as_str()),
                                op_list,
                                &mut caches,
                            )
                            .await
                        {
                            self.recover(UnsupportedFeature::XObject, err)?;
                        }
                        op_list.ready().await;
                    }
                    OpCode::ShowText => {
                        let Some(font) = self.text_font(&preproc)? else {
                            continue;
                        };
                        let glyphs = show_text_glyphs(&font, args.first());
                        op_list.add_op(OpCode::ShowText, OpArgs::Glyphs(glyphs));
                    }
                    OpCode::ShowSpacedText => {
                        let Some(font) = self.text_font(&preproc)? else {
                            continue;
                        };
                        let mut combined = Vec::new();
                        if let Some(Object::Array(items)) = args.first() {
                            for item in items {
                                match item {
                                    Object::String(bytes) => combined.extend(
                                        font.font
                                            .char_to_glyphs(bytes)
                                            .into_iter()
                                            .map(GlyphItem::Glyph),
                                    ),
                                    Object::Int(_) | Object::Real(_) => {
                                        combined.push(GlyphItem::Spacing(
                                            item.as_num().unwrap_or(0.0),
                                        ));
                                    }
                                    _ => {}
                                }
                            }
                        }
                        op_list.add_op(OpCode::ShowText, OpArgs::Glyphs(combined));
                    }
                    OpCode::NextLineShowText => {
                        let Some(font) = self.text_font(&preproc)? else {
                            continue;
                        };
                        op_list.add_op(OpCode::NextLine, OpArgs::None);
                        let glyphs = show_text_glyphs(&font, args.first());
                        op_list.add_op(OpCode::ShowText, OpArgs::Glyphs(glyphs));
                    }
                    OpCode::NextLineSetSpacingShowText => {
                        let Some(font) = self.text_font(&preproc)? else {
                            continue;
                        };
                        let word_spacing = args.first().and_then(|n| n.as_num().ok()).unwrap_or(0.0);
                        let char_spacing =
                            args.get(1).and_then(|n| n.as_num().ok()).unwrap_or(0.0);
                        op_list.add_op(OpCode::NextLine, OpArgs::None);
                        op_list.add_op(OpCode::SetWordSpacing, OpArgs::numbers(&[word_spacing]));
                        op_list.add_op(OpCode::SetCharSpacing, OpArgs::numbers(&[char_spacing]));
                        let glyphs = show_text_glyphs(&font, args.get(2));
                        op_list.add_op(OpCode::ShowText, OpArgs::Glyphs(glyphs));
                    }
                    OpCode::SetTextRenderingMode => {
                        let mode = args.first().and_then(|n| n.as_int().ok()).unwrap_or(0);
                        preproc.state_mut().text_render_mode = mode as i32;
                        op_list.add_op(op, OpArgs::numbers(&[mode as f64]));
                    }
                    OpCode::BeginText => {
                        parsing_text = true;
                        op_list.add_op(op, OpArgs::None);
                    }
                    OpCode::EndText => {
                        parsing_text = false;
                        op_list.add_op(op, OpArgs::None);
                    }
                    OpCode::SetFillColorSpace | OpCode::SetStrokeColorSpace => {
                        match self
                            .parse_color_space(args.first(), resources, &mut caches)
                            .await
                        {
                            Ok(cs) => {
                                let state = preproc.state_mut();
                                if op == OpCode::SetFillColorSpace {
                                    state.fill_color_space = cs;
                                } else {
                                    state.stroke_color_space = cs;
                                }
                            }
                            Err(err) => self.recover(UnsupportedFeature::ColorSpace, err)?,
                        }
                        op_list.ready().await;
                        // The output list never carries abstract color
                        // space references.
                    }
                    OpCode::SetFillGray
                    | OpCode::SetStrokeGray
                    | OpCode::SetFillRgbColor
                    | OpCode::SetStrokeRgbColor
                    | OpCode::SetFillCmykColor
                    | OpCode::SetStrokeCmykColor
                    | OpCode::SetFillColor
                    | OpCode::SetStrokeColor => {
                        let (out_op, out_args) = self.rewrite_color(op, &args, preproc.state_mut());
                        op_list.add_op(out_op, out_args);
                    }
                    OpCode::SetFillColorN | OpCode::SetStrokeColorN => {
                        let cs = if op == OpCode::SetFillColorN {
                            preproc.state().fill_color_space.clone()
                        } else {
                            preproc.state().stroke_color_space.clone()
                        };
                        if cs.is_pattern() {
                            if let Err(err) = self
                                .handle_color_n(
                                    op, &args, &cs, &patterns, resources, op_list, &mut caches,
                                    task,
                                )
                                .await
                            {
                                self.recover(UnsupportedFeature::TilingPattern, err)?;
                            }
                            op_list.ready().await;
                        } else {
                            let comps = numeric_args(&args);
                            let (out_op, out_args) = rgb_op(op, &cs, &comps);
                            op_list.add_op(out_op, out_args);
                        }
                    }
                    OpCode::ShadingFill => {
                        if let Err(err) =
                            self.do_shading_fill(&args, resources, op_list)
                        {
                            self.recover_quiet("shading", err)?;
                        }
                    }
                    OpCode::SetGState => {
                        let Some(Object::Name(name)) = args.first() else {
                            warn!("setGState without a name argument");
                            continue;
                        };
                        if let Some(entries) = caches.gstates.get_by_name(name) {
                            let entries = entries.clone();
                            op_list.add_op(OpCode::SetGState, OpArgs::GState(entries));
                            continue;
                        }
                        let name = name.clone();
                        if let Err(err) = self
                            .do_set_gstate(&name, resources, op_list, &mut caches, task)
                            .await
                        {
                            self.recover(UnsupportedFeature::ExtGState, err)?;
                        }
                        op_list.ready().await;
                    }
                    OpCode::MoveTo
                    | OpCode::LineTo
                    | OpCode::CurveTo
                    | OpCode::CurveTo2
                    | OpCode::CurveTo3
                    | OpCode::ClosePath
                    | OpCode::Rectangle => {
                        self.build_path(op_list, op, &args, parsing_text);
                    }
                    OpCode::BeginMarkedContent
                    | OpCode::BeginMarkedContentProps
                    | OpCode::MarkPoint
                    | OpCode::MarkPointProps
                    | OpCode::EndMarkedContent => {
                        if let Err(err) =
                            self.do_marked_content(op, &args, resources, op_list)
                        {
                            self.recover(UnsupportedFeature::MarkedContent, err)?;
                        }
                    }
                    OpCode::SetDash => {
                        let array = match args.first() {
                            Some(Object::Array(items)) => {
                                items.iter().filter_map(|n| n.as_num().ok()).collect()
                            }
                            _ => Vec::new(),
                        };
                        let phase = args.get(1).and_then(|n| n.as_num().ok()).unwrap_or(0.0);
                        op_list.add_op(op, OpArgs::Dash { array, phase });
                    }
                    OpCode::SetRenderingIntent => {
                        let intent = args
                            .first()
                            .and_then(|n| n.as_name().ok())
                            .unwrap_or("RelativeColorimetric");
                        op_list.add_op(op, OpArgs::Name(intent.to_string()));
                    }
                    _ => {
                        op_list.add_op(op, generic_args(&args));
                    }
                }
            }

            // Some streams do not close all their saves; synthesize the
            // missing restores so the output stays balanced.
            for _ in 0..preproc.saved_states_depth() {
                op_list.add_op(OpCode::Restore, OpArgs::None);
            }

            op_list.flush(false);
            Ok(())
        })
    }

    /// Resolve the active font for a text-showing operator. A missing
    /// font is recoverable only under lenient configuration.
    fn text_font(&self, preproc: &Preprocessor<EvalState>) -> Result<Option<Arc<TranslatedFont>>> {
        match &preproc.state().font {
            Some(font) => Ok(Some(font.clone())),
            None => {
                let err = EvalError::Format(
                    "must have the current font set before a text-showing operator".into(),
                );
                if self.options.ignore_errors {
                    warn!("skipping text-showing operator without a current font");
                    self.report_unsupported(UnsupportedFeature::MissingFontState);
                    Ok(None)
                } else {
                    Err(err)
                }
            }
        }
    }

    /// Resolve a font by resource name or explicit object, returning an
    /// error-font entry instead of failing.
    pub(crate) async fn handle_set_font(
        &self,
        resources: &Dict,
        font_name: Option<&str>,
        font_obj: Option<Object>,
        op_list: &mut OperatorList,
        task: &Arc<EvalTask>,
    ) -> Result<Arc<TranslatedFont>> {
        let translated = match self.load_font(resources, font_name, font_obj).await {
            Ok(translated) => translated,
            Err(err) if err.is_abort() => return Err(err),
            Err(err) => {
                let feature = match &err {
                    EvalError::MissingResource(_) => UnsupportedFeature::MissingFont,
                    _ => UnsupportedFeature::Font,
                };
                warn!("font resolution failed: {err}");
                self.report_unsupported(feature);
                Arc::new(TranslatedFont::error(
                    self.ctx.font_cache.next_loaded_name(),
                    err.to_string(),
                ))
            }
        };

        if translated.font.is_type3() {
            match translated.load_type3_data(self, resources, task).await {
                Ok(type3) => {
                    for dep in &type3.dependencies {
                        op_list.add_dependency(dep);
                    }
                }
                Err(err) if err.is_abort() => return Err(err),
                Err(err) => {
                    warn!("Type3 font data failed to load: {err}");
                    self.report_unsupported(UnsupportedFeature::FontLoadType3);
                }
            }
        }

        Ok(translated)
    }

    pub(crate) async fn load_font(
        &self,
        resources: &Dict,
        font_name: Option<&str>,
        font_obj: Option<Object>,
    ) -> Result<Arc<TranslatedFont>> {
        let raw = match font_obj {
            Some(obj) => obj,
            None => {
                let name =
                    font_name.ok_or_else(|| EvalError::MissingResource("font".into()))?;
                let fonts = self.resource_dict(resources, "Font")?;
                fonts
                    .get(name)
                    .cloned()
                    .ok_or_else(|| EvalError::MissingResource(format!("font {name}")))?
            }
        };

        let (key, spec) = match &raw {
            Object::Ref(r) => (FontKey::Ref(*r), self.ctx.store.fetch(r)?.into_dict()?),
            other => {
                // Malformed producers pass the dictionary instead of a
                // reference; give it a synthesized per-document key so it
                // still deduplicates through the attribute hash.
                let key = FontKey::Synthetic(self.ctx.font_cache.next_synthetic_key());
                (key, other.clone().into_dict()?)
            }
        };

        if let Some(existing) = self.ctx.font_cache.lookup(&key) {
            return Ok(existing.await);
        }

        let pre = pre_evaluate_font(spec, self.ctx.store.as_ref())?;
        if let Some(hash) = pre.hash.clone()
            && let Some(aliased) = self.ctx.font_cache.alias_by_hash(&hash, &key)
        {
            return Ok(aliased.await);
        }

        let loaded_name = self.ctx.font_cache.next_loaded_name();
        let ctx = self.ctx.clone();
        let options = self.options.clone();
        let translation = self
            .ctx
            .font_cache
            .get_or_create(key, || begin_translation(ctx, options, pre, loaded_name));
        Ok(translation.await)
    }

    /// Merge consecutive path construction operators into one entry. A
    /// path operator inside a text object is malformed input and gets
    /// wrapped in synthesized save/restore.
    pub(crate) fn build_path(
        &self,
        op_list: &mut OperatorList,
        op: OpCode,
        args: &[Object],
        parsing_text: bool,
    ) {
        let path_op = match op {
            OpCode::MoveTo => PathOp::MoveTo,
            OpCode::LineTo => PathOp::LineTo,
            OpCode::CurveTo => PathOp::CurveTo,
            OpCode::CurveTo2 => PathOp::CurveTo2,
            OpCode::CurveTo3 => PathOp::CurveTo3,
            OpCode::ClosePath => PathOp::ClosePath,
            _ => PathOp::Rectangle,
        };
        let coords = numeric_args(args);

        if op_list.append_path(path_op, &coords) {
            return;
        }
        if parsing_text {
            warn!("encountered a path operator inside of a text object");
            op_list.add_op(OpCode::Save, OpArgs::None);
        }
        op_list.add_op(
            OpCode::ConstructPath,
            OpArgs::ConstructPath {
                ops: vec![path_op],
                coords,
            },
        );
        if parsing_text {
            op_list.add_op(OpCode::Restore, OpArgs::None);
        }
    }
}

/// Extract the numeric arguments of an operator.
pub(crate) fn numeric_args(args: &[Object]) -> Vec<f64> {
    args.iter().filter_map(|a| a.as_num().ok()).collect()
}

/// Default argument conversion for operators with no special handling.
fn generic_args(args: &[Object]) -> OpArgs {
    if args.is_empty() {
        return OpArgs::None;
    }
    if let [Object::Name(name)] = args {
        return OpArgs::Name(name.clone());
    }
    let nums: SmallVec<[f64; 6]> = args.iter().filter_map(|a| a.as_num().ok()).collect();
    OpArgs::Numbers(nums)
}

/// Rewrite an explicit color operator through the color space, see the
/// color module for the shared conversion.
pub(crate) fn rgb_op(op: OpCode, cs: &ColorSpace, comps: &[f64]) -> (OpCode, OpArgs) {
    let [r, g, b] = cs.get_rgb(comps);
    let out_op = match op {
        OpCode::SetFillGray
        | OpCode::SetFillRgbColor
        | OpCode::SetFillCmykColor
        | OpCode::SetFillColor
        | OpCode::SetFillColorN => OpCode::SetFillRgbColor,
        _ => OpCode::SetStrokeRgbColor,
    };
    (out_op, OpArgs::numbers(&[r as f64, g as f64, b as f64]))
}

fn show_text_glyphs(font: &TranslatedFont, arg: Option<&Object>) -> Vec<GlyphItem> {
    let bytes: &[u8] = match arg {
        Some(Object::String(bytes)) => bytes,
        _ => &[],
    };
    font.font
        .char_to_glyphs(bytes)
        .into_iter()
        .map(GlyphItem::Glyph)
        .collect()
}

/// Content-derived cache key for an inline image.
fn inline_image_key(image: &crate::model::StreamObject) -> String {
    let mut ctx = md5::Context::new();
    ctx.consume(image.data());
    for key in ["Width", "Height"] {
        if let Some(Ok(v)) = image.get(key).map(|o| o.as_int()) {
            ctx.consume(v.to_le_bytes());
        }
    }
    format!("inline_{:x}", ctx.finalize())
}
