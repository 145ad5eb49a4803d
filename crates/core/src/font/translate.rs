//! Font pre-evaluation, hashing and asynchronous translation.
//!
//! Pre-evaluation hashes the defining attributes of a font (encoding,
//! first/last char, ToUnicode data, widths, composite CID widths) so that
//! visually identical font objects with different identities alias to one
//! resolved entry. Translation itself runs once per entry as a shared
//! future; on failure it substitutes a typed error font instead of
//! failing the evaluation.

use super::cache::SharedTranslation;
use super::cmap::{CMap, load_cmap, parse_to_unicode};
use super::{ErrorFont, FontProgram, FontProperties};
use crate::error::{EvalError, Result};
use crate::interp::evaluator::{ContentEvaluator, EvaluatorContext, EvaluatorOptions};
use crate::interp::schedule::EvalTask;
use crate::model::{Dict, Object};
use crate::oplist::OperatorList;
use crate::ops::OpCode;
use crate::parser::ContentStream;
use crate::store::ObjectStore;
use crate::transport::{Message, Request, UnsupportedFeature};
use crate::utils::matrix_from_slice;
use bytes::Bytes;
use futures::FutureExt;
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// A font definition examined ahead of translation.
#[derive(Debug, Clone)]
pub struct PreEvaluatedFont {
    /// Merged spec: for composite fonts the descendant font dictionary
    /// with ToUnicode/Encoding/BaseFont folded in
    pub spec: Dict,
    pub subtype: String,
    pub composite: bool,
    /// md5 over the defining attributes; absent for descriptor-less fonts
    pub hash: Option<String>,
    pub descriptor: Option<Dict>,
    pub to_unicode_data: Option<Vec<u8>>,
}

/// Examine a font dictionary: merge Type0 descendants, resolve the
/// descriptor and ToUnicode data, and hash the defining attributes.
pub fn pre_evaluate_font(spec: Dict, store: &dyn ObjectStore) -> Result<PreEvaluatedFont> {
    let subtype = spec
        .get("Subtype")
        .and_then(|s| s.as_name().ok())
        .unwrap_or("")
        .to_string();
    let composite = subtype == "Type0";

    let spec = if composite {
        merge_descendant(spec, store)?
    } else {
        spec
    };

    let descriptor = match spec.get("FontDescriptor") {
        Some(obj) => store.fetch_if_ref(obj)?.into_dict().ok(),
        None => None,
    };

    let to_unicode_data = match spec.get("ToUnicode") {
        Some(obj) => match store.fetch_if_ref(obj)? {
            Object::Stream(stream) => Some(stream.data().to_vec()),
            _ => None,
        },
        None => None,
    };

    let hash = if descriptor.is_some() {
        Some(compute_font_hash(
            &spec,
            composite,
            to_unicode_data.as_deref(),
            store,
        ))
    } else {
        None
    };

    Ok(PreEvaluatedFont {
        spec,
        subtype,
        composite,
        hash,
        descriptor,
        to_unicode_data,
    })
}

/// Fold a Type0 font's first descendant into one flat spec.
fn merge_descendant(spec: Dict, store: &dyn ObjectStore) -> Result<Dict> {
    let descendants = match spec.get("DescendantFonts") {
        Some(obj) => store.fetch_if_ref(obj)?,
        None => return Ok(spec),
    };
    let first = match descendants.as_array().ok().and_then(|a| a.first()) {
        Some(first) => store.fetch_if_ref(first)?,
        None => return Ok(spec),
    };
    let mut merged = match first.into_dict() {
        Ok(d) => d,
        Err(_) => return Ok(spec),
    };
    for key in ["ToUnicode", "Encoding"] {
        if let Some(value) = spec.get(key) {
            merged.insert(key.to_string(), value.clone());
        }
    }
    if !merged.contains_key("BaseFont")
        && let Some(base) = spec.get("BaseFont")
    {
        merged.insert("BaseFont".to_string(), base.clone());
    }
    // The merged spec describes a composite font even though the
    // descendant carries a CIDFont subtype.
    merged.insert("Subtype".to_string(), Object::Name("Type0".to_string()));
    Ok(merged)
}

fn compute_font_hash(
    spec: &Dict,
    composite: bool,
    to_unicode: Option<&[u8]>,
    store: &dyn ObjectStore,
) -> String {
    let mut ctx = md5::Context::new();

    if let Some(encoding) = spec.get("Encoding") {
        feed_object(&mut ctx, encoding, store);
    }
    for key in ["FirstChar", "LastChar"] {
        if let Some(obj) = spec.get(key) {
            feed_object(&mut ctx, obj, store);
        }
    }
    if let Some(data) = to_unicode {
        ctx.consume(data);
    }
    if let Some(widths) = spec.get("Widths") {
        feed_object(&mut ctx, widths, store);
    }
    if composite {
        for key in ["W", "DW"] {
            if let Some(obj) = spec.get(key) {
                feed_object(&mut ctx, obj, store);
            }
        }
    }

    format!("{:x}", ctx.finalize())
}

/// Feed an object into the hash in a stable form. References resolve so
/// that equal definitions reached through different objects hash equal.
fn feed_object(ctx: &mut md5::Context, obj: &Object, store: &dyn ObjectStore) {
    let resolved = store.fetch_if_ref(obj).unwrap_or_else(|_| obj.clone());
    match &resolved {
        Object::Null => ctx.consume(b"n"),
        Object::Bool(b) => ctx.consume(if *b { b"T" } else { b"F" }),
        Object::Int(n) => ctx.consume(n.to_le_bytes()),
        Object::Real(n) => ctx.consume(n.to_le_bytes()),
        Object::Name(s) => {
            ctx.consume(b"/");
            ctx.consume(s.as_bytes());
        }
        Object::String(s) => ctx.consume(s),
        Object::Array(items) => {
            ctx.consume(b"[");
            for item in items {
                feed_object(ctx, item, store);
            }
            ctx.consume(b"]");
        }
        Object::Dict(dict) => {
            let mut keys: Vec<&String> = dict.keys().collect();
            keys.sort_unstable();
            ctx.consume(b"<<");
            for key in keys {
                ctx.consume(key.as_bytes());
                feed_object(ctx, &dict[key], store);
            }
            ctx.consume(b">>");
        }
        Object::Stream(stream) => ctx.consume(stream.data()),
        Object::Ref(r) => ctx.consume(r.id.to_le_bytes()),
    }
}

/// Kick off the shared translation for one resolved font entry.
pub fn begin_translation(
    ctx: EvaluatorContext,
    options: EvaluatorOptions,
    pre: PreEvaluatedFont,
    loaded_name: String,
) -> SharedTranslation {
    async move {
        let spec = pre.spec.clone();
        let result = match build_properties(&ctx, &options, &pre).await {
            Ok(props) => {
                let to_unicode = options
                    .font_extra_properties
                    .then(|| props.to_unicode.clone());
                ctx.fonts.create_font(props).map(|font| (font, to_unicode))
            }
            Err(err) => Err(err),
        };
        let (font, to_unicode): (Arc<dyn FontProgram>, _) = match result {
            Ok((font, to_unicode)) => (font, to_unicode),
            Err(err) => {
                warn!("font translation failed for {loaded_name}: {err}");
                ctx.channel
                    .send(Message::UnsupportedFeature(UnsupportedFeature::FontTranslate));
                (Arc::new(ErrorFont::new(err.to_string())), None)
            }
        };
        let mut export = font.export();
        if options.disable_font_face {
            export.program = None;
        }
        export.to_unicode = to_unicode;
        ctx.channel.send(Message::Font {
            loaded_name: loaded_name.clone(),
            export: Arc::new(export),
        });
        Arc::new(TranslatedFont::new(loaded_name, font, spec))
    }
    .boxed()
    .shared()
}

/// Build the properties handed to the binary font subsystem.
async fn build_properties(
    ctx: &EvaluatorContext,
    options: &EvaluatorOptions,
    pre: &PreEvaluatedFont,
) -> Result<FontProperties> {
    let store = ctx.store.as_ref();
    let spec = &pre.spec;

    let name = spec
        .get("BaseFont")
        .or_else(|| spec.get("Name"))
        .and_then(|n| n.as_name().ok())
        .unwrap_or("Unknown")
        .to_string();

    let (default_first, default_last) = if pre.composite { (0, 0xffff) } else { (0, 255) };
    let first_char = spec
        .get("FirstChar")
        .and_then(|n| n.as_int().ok())
        .unwrap_or(default_first) as u32;
    let last_char = spec
        .get("LastChar")
        .and_then(|n| n.as_int().ok())
        .unwrap_or(default_last) as u32;

    let flags = pre
        .descriptor
        .as_ref()
        .and_then(|d| d.get("Flags"))
        .and_then(|f| f.as_int().ok())
        .unwrap_or(0) as u32;

    let cmap = if pre.composite {
        Some(resolve_cmap(spec, ctx, options).await?)
    } else {
        None
    };
    let vertical = cmap.as_ref().is_some_and(|c| c.vertical);

    let (widths, default_width) = if pre.composite {
        composite_widths(spec, store)?
    } else {
        let default_width = pre
            .descriptor
            .as_ref()
            .and_then(|d| d.get("MissingWidth"))
            .and_then(|w| w.as_num().ok())
            .unwrap_or(0.0);
        (simple_widths(spec, first_char, store)?, default_width)
    };

    let encoding = build_encoding(spec, store)?;
    let to_unicode = pre
        .to_unicode_data
        .as_deref()
        .map(parse_to_unicode)
        .unwrap_or_default();

    let mut program = embedded_program(pre.descriptor.as_ref(), store)?;
    // Substitute data for non-embedded standard fonts comes over the
    // channel only when no direct URL is configured.
    if program.is_none()
        && pre.subtype != "Type3"
        && !options.use_system_fonts
        && options.standard_font_data_url.is_none()
    {
        program = fetch_standard_font_data(&name, ctx).await;
    }

    let font_matrix = spec
        .get("FontMatrix")
        .and_then(|m| m.as_array().ok())
        .and_then(|arr| {
            let nums: Vec<f64> = arr.iter().filter_map(|n| n.as_num().ok()).collect();
            matrix_from_slice(&nums)
        })
        .unwrap_or((0.001, 0.0, 0.0, 0.001, 0.0, 0.0));

    let char_procs = if pre.subtype == "Type3" {
        match spec.get("CharProcs") {
            Some(obj) => Some(store.fetch_if_ref(obj)?.into_dict()?),
            None => None,
        }
    } else {
        None
    };

    Ok(FontProperties {
        name,
        subtype: pre.subtype.clone(),
        composite: pre.composite,
        vertical,
        first_char,
        last_char,
        default_width,
        widths,
        encoding,
        to_unicode,
        flags,
        program,
        font_matrix,
        char_procs,
        cmap,
    })
}

async fn resolve_cmap(
    spec: &Dict,
    ctx: &EvaluatorContext,
    options: &EvaluatorOptions,
) -> Result<CMap> {
    match spec.get("Encoding").map(|e| ctx.store.fetch_if_ref(e)) {
        Some(Ok(Object::Name(name))) => {
            if options.cmap_url.is_some() {
                // A direct URL is configured: built-in tables are the
                // host's responsibility, keep the verticality.
                let vertical = name.ends_with("-V");
                return Ok(CMap::identity(&name, vertical));
            }
            load_cmap(&name, ctx.channel.as_ref()).await
        }
        Some(Ok(Object::Stream(_))) => {
            warn!("embedded CMap streams are not supported, using identity");
            Ok(CMap::identity("Identity-H", false))
        }
        _ => Ok(CMap::identity("Identity-H", false)),
    }
}

/// Simple font widths: the Widths array indexed from FirstChar.
fn simple_widths(
    spec: &Dict,
    first_char: u32,
    store: &dyn ObjectStore,
) -> Result<FxHashMap<u32, f64>> {
    let mut widths = FxHashMap::default();
    if let Some(obj) = spec.get("Widths") {
        let resolved = store.fetch_if_ref(obj)?;
        if let Ok(arr) = resolved.as_array() {
            for (i, w) in arr.iter().enumerate() {
                if let Ok(w) = store.fetch_if_ref(w)?.as_num() {
                    widths.insert(first_char + i as u32, w);
                }
            }
        }
    }
    Ok(widths)
}

/// Composite font widths: the W array of CID ranges, with DW as default.
fn composite_widths(spec: &Dict, store: &dyn ObjectStore) -> Result<(FxHashMap<u32, f64>, f64)> {
    let default_width = spec
        .get("DW")
        .and_then(|w| w.as_num().ok())
        .unwrap_or(1000.0);
    let mut widths = FxHashMap::default();

    if let Some(obj) = spec.get("W") {
        let resolved = store.fetch_if_ref(obj)?;
        if let Ok(arr) = resolved.as_array() {
            let mut i = 0;
            while i < arr.len() {
                let Ok(start) = store.fetch_if_ref(&arr[i])?.as_int() else {
                    break;
                };
                match arr.get(i + 1).map(|o| store.fetch_if_ref(o)) {
                    Some(Ok(Object::Array(ws))) => {
                        for (offset, w) in ws.iter().enumerate() {
                            if let Ok(w) = w.as_num() {
                                widths.insert(start as u32 + offset as u32, w);
                            }
                        }
                        i += 2;
                    }
                    Some(Ok(end_obj)) => {
                        let (Ok(end), Some(Ok(w))) = (
                            end_obj.as_int(),
                            arr.get(i + 2).map(|o| store.fetch_if_ref(o)),
                        ) else {
                            break;
                        };
                        let Ok(w) = w.as_num() else { break };
                        for cid in start..=end {
                            widths.insert(cid as u32, w);
                        }
                        i += 3;
                    }
                    _ => break,
                }
            }
        }
    }

    Ok((widths, default_width))
}

/// Encoding differences: code -> glyph name.
fn build_encoding(spec: &Dict, store: &dyn ObjectStore) -> Result<FxHashMap<u32, String>> {
    let mut encoding = FxHashMap::default();
    let Some(obj) = spec.get("Encoding") else {
        return Ok(encoding);
    };
    let resolved = store.fetch_if_ref(obj)?;
    let Ok(dict) = resolved.as_dict() else {
        // A bare name selects a base encoding; the byte-to-char fallback
        // covers those.
        return Ok(encoding);
    };
    if let Some(diffs) = dict.get("Differences") {
        let diffs = store.fetch_if_ref(diffs)?;
        if let Ok(arr) = diffs.as_array() {
            let mut code = 0u32;
            for item in arr {
                match store.fetch_if_ref(item)? {
                    Object::Int(n) => code = n.max(0) as u32,
                    Object::Name(name) => {
                        encoding.insert(code, name);
                        code += 1;
                    }
                    _ => {}
                }
            }
        }
    }
    Ok(encoding)
}

fn embedded_program(descriptor: Option<&Dict>, store: &dyn ObjectStore) -> Result<Option<Bytes>> {
    let Some(descriptor) = descriptor else {
        return Ok(None);
    };
    for key in ["FontFile2", "FontFile3", "FontFile"] {
        if let Some(obj) = descriptor.get(key) {
            if let Object::Stream(stream) = store.fetch_if_ref(obj)? {
                return Ok(Some(stream.data()));
            }
        }
    }
    Ok(None)
}

async fn fetch_standard_font_data(name: &str, ctx: &EvaluatorContext) -> Option<Bytes> {
    // Subset tags (ABCDEF+Helvetica) do not change the standard file.
    let base = name.split('+').next_back().unwrap_or(name);
    let response = ctx
        .channel
        .send_with_promise(Request::StandardFontData {
            filename: format!("{base}.pfb"),
        })
        .await;
    match response {
        Ok(Object::String(bytes)) => Some(Bytes::from(bytes)),
        Ok(_) => None,
        Err(err) => {
            warn!("standard font data for {name} unavailable: {err}");
            None
        }
    }
}

/// Compiled Type3 glyph programs and their accumulated dependencies.
#[derive(Debug)]
pub struct Type3Glyphs {
    pub char_procs: FxHashMap<String, Arc<OperatorList>>,
    pub dependencies: FxHashSet<String>,
}

/// A resolved font bound to its stable output identifier.
///
/// Created once per distinct font hash per document and shared by
/// reference; never mutated after creation.
pub struct TranslatedFont {
    pub loaded_name: String,
    pub font: Arc<dyn FontProgram>,
    /// The merged font spec, kept for Type3 resources
    pub spec: Dict,
    type3: Mutex<Option<Arc<Type3Glyphs>>>,
}

impl TranslatedFont {
    pub fn new(loaded_name: String, font: Arc<dyn FontProgram>, spec: Dict) -> Self {
        Self {
            loaded_name,
            font,
            spec,
            type3: Mutex::new(None),
        }
    }

    /// Shorthand used by tests: an error-font entry.
    pub fn error(loaded_name: String, reason: impl Into<String>) -> Self {
        Self::new(loaded_name, Arc::new(ErrorFont::new(reason)), Dict::default())
    }

    /// Lazily compile the Type3 glyph programs into nested operator lists.
    ///
    /// Glyph programs run under a stricter evaluator (`ignore_errors`
    /// off); a failing glyph substitutes an empty program rather than
    /// failing the font. Color operators are stripped from glyphs that
    /// declare their metrics with d1.
    pub async fn load_type3_data(
        &self,
        evaluator: &ContentEvaluator,
        resources: &Dict,
        task: &Arc<EvalTask>,
    ) -> Result<Arc<Type3Glyphs>> {
        if let Some(existing) = self.type3.lock().clone() {
            return Ok(existing);
        }

        let type3_evaluator = evaluator.for_type3();
        let store = type3_evaluator.store();
        let glyph_resources = match self.spec.get("Resources") {
            Some(obj) => store.fetch_if_ref(obj)?.into_dict().unwrap_or_default(),
            None => resources.clone(),
        };

        let mut char_procs = FxHashMap::default();
        let mut dependencies = FxHashSet::default();
        let procs: Vec<(String, Object)> = match self.font.char_procs() {
            Some(dict) => {
                let mut entries: Vec<_> =
                    dict.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
                entries.sort_by(|a, b| a.0.cmp(&b.0));
                entries
            }
            None => Vec::new(),
        };

        for (glyph_name, proc_obj) in procs {
            let mut list = OperatorList::new();
            let compiled = async {
                let stream = store.fetch_if_ref(&proc_obj)?;
                let stream = stream.as_stream()?;
                type3_evaluator
                    .get_operator_list(
                        ContentStream::from_bytes(stream.data()),
                        &glyph_resources,
                        &mut list,
                        None,
                        task,
                    )
                    .await
            }
            .await;

            match compiled {
                Ok(()) => {
                    if list.fn_array().contains(&OpCode::SetCharWidthAndBounds) {
                        list.retain_ops(|op| !op.is_color_op());
                    }
                }
                Err(err) if err.is_abort() => return Err(EvalError::Aborted),
                Err(err) => {
                    warn!("Type3 glyph {glyph_name} failed to compile: {err}");
                    evaluator.report_unsupported(UnsupportedFeature::FontLoadType3);
                    list = OperatorList::new();
                }
            }

            dependencies.extend(list.dependencies().iter().cloned());
            char_procs.insert(glyph_name, Arc::new(list));
        }

        let data = Arc::new(Type3Glyphs {
            char_procs,
            dependencies,
        });
        *self.type3.lock() = Some(data.clone());
        Ok(data)
    }
}

impl fmt::Debug for TranslatedFont {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranslatedFont")
            .field("loaded_name", &self.loaded_name)
            .field("font", &self.font.name())
            .finish()
    }
}
