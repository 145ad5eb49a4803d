//! Text content extraction.
//!
//! A traversal structurally parallel to operator-list building (same
//! preprocessor and state machinery) that reconstructs logical text runs
//! instead of paint operators. Inter-glyph spacing decides between
//! kerning noise, an inline space and a run break; right-to-left runs are
//! detected and physically reversed before emission.

use crate::error::Result;
use crate::font::translate::TranslatedFont;
use crate::interp::evaluator::{ContentEvaluator, numeric_args};
use crate::interp::preproc::{Operation, Preprocessor};
use crate::interp::schedule::{EvalTask, TimeSlotManager, yield_now};
use crate::model::{Dict, Object, TextState};
use crate::ops::OpCode;
use crate::parser::ContentStream;
use crate::parser::content::ContentParser;
use crate::utils::{Matrix, matrix_from_slice, mult_matrix};
use futures::future::BoxFuture;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;
use tracing::warn;
use unicode_bidi::{BidiClass, bidi_class};

/// Spacing at or below this fraction of the space width is kerning or
/// tracking noise.
const SPACE_FACTOR: f64 = 0.3;
/// Spacing above this fraction of the space width breaks the run.
const MULTI_SPACE_FACTOR: f64 = 1.3;

/// Dominant direction of a text run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextDirection {
    Ltr,
    Rtl,
}

/// One logical text run.
#[derive(Debug, Clone)]
pub struct TextItem {
    pub text: String,
    pub dir: TextDirection,
    /// Advance along the baseline, in user space units
    pub width: f64,
    pub height: f64,
    /// Text rendering matrix at the start of the run
    pub transform: Matrix,
    /// Stable identifier of the active font
    pub font_name: String,
    /// Whether the run ended with a line break
    pub has_eol: bool,
}

/// Style record for a font encountered during extraction.
#[derive(Debug, Clone)]
pub struct TextStyle {
    pub font_family: String,
    pub ascent: f64,
    pub descent: f64,
    pub vertical: bool,
}

/// Extraction output: text runs plus the styles they reference.
#[derive(Debug, Default)]
pub struct TextContent {
    pub items: Vec<TextItem>,
    pub styles: FxHashMap<String, TextStyle>,
}

/// A run being accumulated.
struct TextChunk {
    text: String,
    transform: Matrix,
    width: f64,
    height: f64,
    font_name: String,
    /// Text matrix as of the last glyph, for gap detection
    end_matrix: Matrix,
}

impl TextChunk {
    fn finish(self, has_eol: bool) -> Option<TextItem> {
        if self.text.is_empty() {
            return None;
        }
        let (text, dir) = apply_direction(self.text);
        Some(TextItem {
            text,
            dir,
            width: self.width,
            height: self.height,
            transform: self.transform,
            font_name: self.font_name,
            has_eol,
        })
    }
}

/// Reverse right-to-left runs so the emitted string reads in logical
/// order. Membership is decided by Unicode bidi class.
fn apply_direction(text: String) -> (String, TextDirection) {
    let rtl = text
        .chars()
        .any(|c| matches!(bidi_class(c), BidiClass::R | BidiClass::AL));
    if rtl {
        (text.chars().rev().collect(), TextDirection::Rtl)
    } else {
        (text, TextDirection::Ltr)
    }
}

impl ContentEvaluator {
    /// Extract the logical text runs of a content stream.
    pub fn get_text_content<'a>(
        &'a self,
        stream: ContentStream,
        resources: &'a Dict,
        task: &'a Arc<EvalTask>,
    ) -> BoxFuture<'a, Result<TextContent>> {
        Box::pin(async move {
            let mut content = TextContent::default();
            let mut empty_forms = FxHashSet::default();
            self.extract_text(stream, resources, &mut content, None, &mut empty_forms, task)
                .await?;
            Ok(content)
        })
    }

    fn extract_text<'a>(
        &'a self,
        stream: ContentStream,
        resources: &'a Dict,
        content: &'a mut TextContent,
        initial_state: Option<TextState>,
        empty_forms: &'a mut FxHashSet<crate::model::ObjRef>,
        task: &'a Arc<EvalTask>,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut preproc = Preprocessor::new(
                ContentParser::new(stream.bytes()),
                initial_state.unwrap_or_default(),
            );
            let mut time_slots = TimeSlotManager::new();
            let mut chunk: Option<TextChunk> = None;
            let xobjects = self.resource_dict(resources, "XObject")?;

            loop {
                task.ensure_running()?;
                if time_slots.check() {
                    yield_now().await;
                    time_slots.reset();
                }

                let Some(Operation { op, args }) = preproc.read()? else {
                    break;
                };

                match op {
                    OpCode::SetFont => {
                        let size = args.get(1).and_then(|s| s.as_num().ok()).unwrap_or(0.0);
                        let font_name = args
                            .first()
                            .and_then(|n| n.as_name().ok())
                            .map(str::to_string);
                        let font = match self
                            .load_font(resources, font_name.as_deref(), None)
                            .await
                        {
                            Ok(font) => font,
                            Err(err) if err.is_abort() => return Err(err),
                            Err(err) => {
                                warn!("font resolution failed during text extraction: {err}");
                                Arc::new(TranslatedFont::error(
                                    self.ctx.font_cache.next_loaded_name(),
                                    err.to_string(),
                                ))
                            }
                        };
                        content
                            .styles
                            .entry(font.loaded_name.clone())
                            .or_insert_with(|| TextStyle {
                                font_family: font.font.name().to_string(),
                                ascent: font.font.ascent(),
                                descent: font.font.descent(),
                                vertical: font.font.vertical(),
                            });
                        let state = preproc.state_mut();
                        state.font = Some(font);
                        state.font_size = size;
                    }
                    OpCode::BeginText => {
                        preproc.state_mut().reset_text_matrices();
                    }
                    OpCode::EndText => {}
                    OpCode::SetCharSpacing => {
                        preproc.state_mut().char_spacing =
                            args.first().and_then(|n| n.as_num().ok()).unwrap_or(0.0);
                    }
                    OpCode::SetWordSpacing => {
                        preproc.state_mut().word_spacing =
                            args.first().and_then(|n| n.as_num().ok()).unwrap_or(0.0);
                    }
                    OpCode::SetHScale => {
                        preproc.state_mut().h_scale =
                            args.first().and_then(|n| n.as_num().ok()).unwrap_or(100.0) / 100.0;
                    }
                    OpCode::SetLeading => {
                        preproc.state_mut().leading =
                            args.first().and_then(|n| n.as_num().ok()).unwrap_or(0.0);
                    }
                    OpCode::SetTextRise => {
                        preproc.state_mut().rise =
                            args.first().and_then(|n| n.as_num().ok()).unwrap_or(0.0);
                    }
                    OpCode::MoveText => {
                        let nums = numeric_args(&args);
                        let (tx, ty) = (nums.first().copied().unwrap_or(0.0), nums.get(1).copied().unwrap_or(0.0));
                        preproc.state_mut().translate_text_line_matrix((tx, ty));
                    }
                    OpCode::SetLeadingMoveText => {
                        let nums = numeric_args(&args);
                        let (tx, ty) = (nums.first().copied().unwrap_or(0.0), nums.get(1).copied().unwrap_or(0.0));
                        let state = preproc.state_mut();
                        state.leading = -ty;
                        state.translate_text_line_matrix((tx, ty));
                    }
                    OpCode::SetTextMatrix => {
                        let nums = numeric_args(&args);
                        if let Some(matrix) = matrix_from_slice(&nums) {
                            preproc.state_mut().set_text_matrix(matrix);
                        }
                    }
                    OpCode::NextLine => {
                        preproc.state_mut().carriage_return();
                    }
                    OpCode::ShowText => {
                        if let Some(Object::String(bytes)) = args.first() {
                            self.show_text(bytes, &mut preproc, &mut chunk, content);
                        }
                    }
                    OpCode::ShowSpacedText => {
                        if let Some(Object::Array(items)) = args.first() {
                            let items = items.clone();
                            for item in &items {
                                match item {
                                    Object::String(bytes) => {
                                        self.show_text(bytes, &mut preproc, &mut chunk, content);
                                    }
                                    Object::Int(_) | Object::Real(_) => {
                                        let value = item.as_num().unwrap_or(0.0);
                                        self.apply_spacing(value, &mut preproc, &mut chunk, content);
                                    }
                                    _ => {}
                                }
                            }
                        }
                    }
                    OpCode::NextLineShowText => {
                        preproc.state_mut().carriage_return();
                        if let Some(Object::String(bytes)) = args.first() {
                            self.show_text(bytes, &mut preproc, &mut chunk, content);
                        }
                    }
                    OpCode::NextLineSetSpacingShowText => {
                        {
                            let state = preproc.state_mut();
                            state.word_spacing =
                                args.first().and_then(|n| n.as_num().ok()).unwrap_or(0.0);
                            state.char_spacing =
                                args.get(1).and_then(|n| n.as_num().ok()).unwrap_or(0.0);
                            state.carriage_return();
                        }
                        if let Some(Object::String(bytes)) = args.get(2) {
                            self.show_text(bytes, &mut preproc, &mut chunk, content);
                        }
                    }
                    OpCode::PaintXObject => {
                        flush_chunk(&mut chunk, content, false);
                        let Some(Object::Name(name)) = args.first() else {
                            continue;
                        };
                        if let Err(err) = self
                            .extract_form_text(
                                xobjects.get(name).cloned(),
                                resources,
                                content,
                                &mut preproc,
                                empty_forms,
                                task,
                            )
                            .await
                        {
                            self.recover_quiet("XObject", err)?;
                        }
                    }
                    _ => {}
                }
            }

            flush_chunk(&mut chunk, content, false);
            Ok(())
        })
    }

    /// Recurse into a Form XObject with a wrapped sink; forms that
    /// contribute nothing are memoized and skipped on later encounters.
    async fn extract_form_text(
        &self,
        raw: Option<Object>,
        parent_resources: &Dict,
        content: &mut TextContent,
        preproc: &mut Preprocessor<TextState>,
        empty_forms: &mut FxHashSet<crate::model::ObjRef>,
        task: &Arc<EvalTask>,
    ) -> Result<()> {
        let Some(raw) = raw else {
            return Ok(());
        };
        let obj_ref = raw.ref_identity();
        if let Some(r) = &obj_ref
            && empty_forms.contains(r)
        {
            return Ok(());
        }
        let resolved = self.ctx.store.fetch_if_ref(&raw)?;
        let Ok(stream) = resolved.as_stream() else {
            return Ok(());
        };
        let subtype = stream
            .get("Subtype")
            .and_then(|s| s.as_name().ok())
            .unwrap_or("");
        if subtype != "Form" {
            return Ok(());
        }
        if let Some(r) = obj_ref
            && !task.enter_form(r)
        {
            warn!("skipping recursive form XObject: {}", r.key());
            return Ok(());
        }

        let form_resources = match stream.get("Resources") {
            Some(obj) => self
                .ctx
                .store
                .fetch_if_ref(obj)?
                .into_dict()
                .unwrap_or_else(|_| parent_resources.clone()),
            None => parent_resources.clone(),
        };
        let mut state = preproc.state().clone();
        if let Some(matrix) = stream
            .get("Matrix")
            .and_then(|m| m.as_array().ok())
            .map(|arr| numeric_args(arr))
            .and_then(|nums| matrix_from_slice(&nums))
        {
            state.ctm = mult_matrix(matrix, state.ctm);
        }

        let before = content.items.len();
        let result = self
            .extract_text(
                ContentStream::from_bytes(stream.data()),
                &form_resources,
                content,
                Some(state),
                empty_forms,
                task,
            )
            .await;
        if let Some(r) = obj_ref {
            task.exit_form(r);
            if result.is_ok() && content.items.len() == before {
                empty_forms.insert(r);
            }
        }
        result
    }

    /// Map one shown string through the active font into the current
    /// chunk, advancing the text matrix glyph by glyph.
    fn show_text(
        &self,
        bytes: &[u8],
        preproc: &mut Preprocessor<TextState>,
        chunk: &mut Option<TextChunk>,
        content: &mut TextContent,
    ) {
        let state = preproc.state();
        let Some(font) = state.font.clone() else {
            return;
        };
        let font_size = state.font_size;
        let glyphs = font.font.char_to_glyphs(bytes);
        if glyphs.is_empty() {
            return;
        }

        self.ensure_chunk(preproc, chunk, content, &font);

        let state = preproc.state_mut();
        let sx = (state.text_matrix.0.powi(2) + state.text_matrix.1.powi(2)).sqrt();
        for glyph in glyphs {
            let mut advance = glyph.width / 1000.0 * font_size + state.char_spacing;
            if glyph.is_space {
                advance += state.word_spacing;
            }
            let tx = advance * state.h_scale;
            if let Some(chunk) = chunk.as_mut() {
                chunk.text.push_str(&glyph.unicode);
                chunk.width += tx * sx;
            }
            state.translate_text_matrix((tx, 0.0));
        }
        if let Some(chunk) = chunk.as_mut() {
            chunk.end_matrix = state.text_matrix;
        }
    }

    /// A TJ spacing adjustment: kerning noise is ignored, a space-sized
    /// gap becomes an inline space, anything larger breaks the run.
    fn apply_spacing(
        &self,
        value: f64,
        preproc: &mut Preprocessor<TextState>,
        chunk: &mut Option<TextChunk>,
        content: &mut TextContent,
    ) {
        let state = preproc.state();
        let Some(font) = state.font.clone() else {
            return;
        };
        let font_size = state.font_size;
        let gap = -value / 1000.0 * font_size;
        let space_width = font.font.space_width() / 1000.0 * font_size;

        let state = preproc.state_mut();
        let tx = gap * state.h_scale;
        state.translate_text_matrix((tx, 0.0));

        if space_width <= 0.0 {
            return;
        }
        if gap <= SPACE_FACTOR * space_width {
            // Kerning or tracking noise (including negative values).
            return;
        }
        if gap <= MULTI_SPACE_FACTOR * space_width {
            if let Some(chunk) = chunk.as_mut() {
                chunk.text.push(' ');
                chunk.end_matrix = state.text_matrix;
            }
        } else {
            flush_chunk(chunk, content, false);
        }
    }

    /// Open a chunk for the coming glyphs, deciding whether the pen
    /// moved since the last one: small gaps continue the run (possibly
    /// with an inline space), large or perpendicular moves break it.
    fn ensure_chunk(
        &self,
        preproc: &mut Preprocessor<TextState>,
        chunk: &mut Option<TextChunk>,
        content: &mut TextContent,
        font: &Arc<TranslatedFont>,
    ) {
        let state = preproc.state();
        let font_size = state.font_size;
        let space_width = font.font.space_width() / 1000.0 * font_size;

        enum GapAction {
            Continue,
            InsertSpace,
            Flush { has_eol: bool },
        }

        let action = match chunk.as_ref() {
            None => GapAction::Continue,
            Some(active) if active.font_name != font.loaded_name => {
                GapAction::Flush { has_eol: false }
            }
            Some(active) => {
                let prev = active.end_matrix;
                let cur = state.text_matrix;
                let (dx, dy) = (cur.4 - prev.4, cur.5 - prev.5);
                // Project the move onto the baseline and its
                // perpendicular.
                let len = (prev.0.powi(2) + prev.1.powi(2)).sqrt().max(1e-9);
                let along = (dx * prev.0 + dy * prev.1) / len;
                let perp = (dx * -prev.1 + dy * prev.0) / len;
                let height = (font_size * len).max(1e-9);

                if perp.abs() > height {
                    // A perpendicular shift beyond the run's extent is an
                    // end of line.
                    GapAction::Flush { has_eol: true }
                } else if along < -1e-9 {
                    GapAction::Flush { has_eol: false }
                } else if space_width > 0.0 && along > MULTI_SPACE_FACTOR * space_width * len {
                    GapAction::Flush { has_eol: false }
                } else if space_width > 0.0 && along > SPACE_FACTOR * space_width * len {
                    GapAction::InsertSpace
                } else {
                    GapAction::Continue
                }
            }
        };

        match action {
            GapAction::Continue => {}
            GapAction::InsertSpace => {
                if let Some(active) = chunk.as_mut() {
                    active.text.push(' ');
                }
            }
            GapAction::Flush { has_eol } => flush_chunk(chunk, content, has_eol),
        }

        if chunk.is_none() {
            let state = preproc.state();
            let trm = text_rendering_matrix(state);
            let sy = (state.text_matrix.2.powi(2) + state.text_matrix.3.powi(2)).sqrt();
            *chunk = Some(TextChunk {
                text: String::new(),
                transform: trm,
                width: 0.0,
                height: font_size * sy,
                font_name: font.loaded_name.clone(),
                end_matrix: state.text_matrix,
            });
        }
    }
}

/// The text rendering matrix: font parameters composed with the text
/// matrix and the CTM.
fn text_rendering_matrix(state: &TextState) -> Matrix {
    let params = (
        state.font_size * state.h_scale,
        0.0,
        0.0,
        state.font_size,
        0.0,
        state.rise,
    );
    mult_matrix(params, mult_matrix(state.text_matrix, state.ctm))
}

fn flush_chunk(chunk: &mut Option<TextChunk>, content: &mut TextContent, has_eol: bool) {
    if let Some(active) = chunk.take()
        && let Some(item) = active.finish(has_eol)
    {
        content.items.push(item);
    }
}
