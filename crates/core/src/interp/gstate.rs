//! ExtGState resolution.
//!
//! A named graphics-state dictionary flattens into a list of primitive
//! state changes. Entries that pull in other resources (nested fonts,
//! soft masks, transfer functions) make the result uncacheable; plain
//! dictionaries are memoized in the call-local cache.

use super::evaluator::{ContentEvaluator, LocalCaches, numeric_args};
use crate::error::{EvalError, Result};
use crate::function::sample_function_256;
use crate::interp::schedule::EvalTask;
use crate::model::{Dict, Object};
use crate::oplist::{GStateEntry, OpArgs, OperatorList, SMaskData};
use crate::ops::OpCode;
use crate::utils::{MATRIX_IDENTITY, matrix_from_slice};
use std::sync::Arc;
use tracing::{info, warn};

impl ContentEvaluator {
    /// gs: resolve a named ExtGState dictionary and emit the flattened
    /// parameter list.
    pub(crate) async fn do_set_gstate(
        &self,
        name: &str,
        resources: &Dict,
        op_list: &mut OperatorList,
        caches: &mut LocalCaches,
        task: &Arc<EvalTask>,
    ) -> Result<()> {
        let ext_gstates = self.resource_dict(resources, "ExtGState")?;
        let raw = ext_gstates
            .get(name)
            .cloned()
            .ok_or_else(|| EvalError::MissingResource(format!("ExtGState {name}")))?;
        let obj_ref = raw.ref_identity();
        let gstate = self.ctx.store.fetch_if_ref(&raw)?.into_dict()?;

        let mut entries: Vec<GStateEntry> = Vec::new();
        let mut resource_bearing = false;

        let mut keys: Vec<&String> = gstate.keys().collect();
        keys.sort_unstable();

        for key in keys {
            let value = &gstate[key];
            match key.as_str() {
                "Type" => {}
                "LW" => {
                    if let Ok(w) = value.as_num() {
                        entries.push(GStateEntry::LineWidth(w));
                    }
                }
                "LC" => {
                    if let Ok(c) = value.as_int() {
                        entries.push(GStateEntry::LineCap(c));
                    }
                }
                "LJ" => {
                    if let Ok(j) = value.as_int() {
                        entries.push(GStateEntry::LineJoin(j));
                    }
                }
                "ML" => {
                    if let Ok(l) = value.as_num() {
                        entries.push(GStateEntry::MiterLimit(l));
                    }
                }
                "D" => {
                    if let Ok(parts) = self.ctx.store.fetch_if_ref(value)
                        && let Object::Array(parts) = parts
                    {
                        let array = parts
                            .first()
                            .and_then(|a| a.as_array().ok())
                            .map(|arr| numeric_args(arr))
                            .unwrap_or_default();
                        let phase = parts.get(1).and_then(|p| p.as_num().ok()).unwrap_or(0.0);
                        entries.push(GStateEntry::Dash { array, phase });
                    }
                }
                "RI" => {
                    if let Ok(intent) = value.as_name() {
                        entries.push(GStateEntry::RenderingIntent(intent.to_string()));
                    }
                }
                "FL" => {
                    if let Ok(f) = value.as_num() {
                        entries.push(GStateEntry::Flatness(f));
                    }
                }
                "CA" => {
                    if let Ok(a) = value.as_num() {
                        entries.push(GStateEntry::StrokeAlpha(a));
                    }
                }
                "ca" => {
                    if let Ok(a) = value.as_num() {
                        entries.push(GStateEntry::FillAlpha(a));
                    }
                }
                "BM" => {
                    entries.push(GStateEntry::BlendMode(normalize_blend_mode(value)));
                }
                "Font" => {
                    resource_bearing = true;
                    let parts = self.ctx.store.fetch_if_ref(value)?;
                    let parts = parts.as_array()?;
                    let font_obj = parts
                        .first()
                        .cloned()
                        .ok_or_else(|| EvalError::Format("ExtGState Font without entry".into()))?;
                    let size = parts.get(1).and_then(|s| s.as_num().ok()).unwrap_or(0.0);
                    let translated = self
                        .handle_set_font(resources, None, Some(font_obj), op_list, task)
                        .await?;
                    op_list.add_dependency(&translated.loaded_name);
                    entries.push(GStateEntry::Font {
                        loaded_name: translated.loaded_name.clone(),
                        size,
                    });
                }
                "SMask" => {
                    resource_bearing = true;
                    let smask = self.build_smask(value, resources, task).await?;
                    entries.push(GStateEntry::SMask(smask));
                }
                "TR" | "TR2" => {
                    resource_bearing = true;
                    if !self.options.is_eval_supported {
                        warn!("transfer function skipped: function evaluation is unavailable");
                        continue;
                    }
                    let tables = self.sample_transfer_functions(value)?;
                    entries.push(GStateEntry::TransferFunction(tables));
                }
                other => {
                    info!("unknown graphics state parameter: {other}");
                }
            }
        }

        let entries = Arc::new(entries);
        if !resource_bearing {
            caches.gstates.set(Some(name), obj_ref, entries.clone());
        }
        op_list.add_op(OpCode::SetGState, OpArgs::GState(entries));
        Ok(())
    }

    /// Resolve an SMask entry: /None clears the mask, a dictionary
    /// triggers a sub-evaluation of its transparency group.
    async fn build_smask(
        &self,
        value: &Object,
        resources: &Dict,
        task: &Arc<EvalTask>,
    ) -> Result<Option<SMaskData>> {
        let resolved = self.ctx.store.fetch_if_ref(value)?;
        let dict = match &resolved {
            Object::Name(name) if name == "None" => return Ok(None),
            Object::Dict(dict) => dict,
            other => {
                return Err(EvalError::Format(format!(
                    "SMask has unexpected type: {}",
                    other.type_name()
                )));
            }
        };

        let subtype = dict
            .get("S")
            .and_then(|s| s.as_name().ok())
            .unwrap_or("Alpha")
            .to_string();
        let backdrop = dict
            .get("BC")
            .and_then(|b| b.as_array().ok())
            .map(|arr| numeric_args(arr));
        let transfer = match dict.get("TR") {
            Some(tr) if self.options.is_eval_supported => {
                let tr = self.ctx.store.fetch_if_ref(tr)?;
                match &tr {
                    Object::Name(name) if name == "Identity" => None,
                    _ => Some(sample_function_256(
                        self.ctx.functions.create(&tr)?.as_ref(),
                    )),
                }
            }
            _ => None,
        };

        let group_obj = dict
            .get("G")
            .ok_or_else(|| EvalError::Format("SMask without a group".into()))?;
        let group = self.ctx.store.fetch_if_ref(group_obj)?;
        let group = group.as_stream()?;
        let matrix = group
            .get("Matrix")
            .and_then(|m| m.as_array().ok())
            .map(|arr| numeric_args(arr))
            .and_then(|nums| matrix_from_slice(&nums))
            .unwrap_or(MATRIX_IDENTITY);
        let bbox = group
            .get("BBox")
            .and_then(|b| b.as_array().ok())
            .map(|arr| numeric_args(arr))
            .and_then(|nums| (nums.len() >= 4).then(|| (nums[0], nums[1], nums[2], nums[3])));

        let mut group_list = OperatorList::new();
        self.build_form_xobject(
            group,
            resources,
            &mut group_list,
            Default::default(),
            group_obj.ref_identity(),
            task,
        )
        .await?;

        Ok(Some(SMaskData {
            subtype,
            backdrop,
            transfer,
            matrix,
            bbox,
            group: Arc::new(group_list),
        }))
    }

    /// TR/TR2: a single function or an array of four, sampled into
    /// 256-entry lookup tables.
    fn sample_transfer_functions(&self, value: &Object) -> Result<Vec<Arc<[u8; 256]>>> {
        let resolved = self.ctx.store.fetch_if_ref(value)?;
        let descriptors: Vec<Object> = match resolved {
            Object::Array(items) => items,
            other => vec![other],
        };
        let mut tables = Vec::with_capacity(descriptors.len());
        for descriptor in &descriptors {
            let resolved = self.ctx.store.fetch_if_ref(descriptor)?;
            if matches!(&resolved, Object::Name(name) if name == "Identity") {
                tables.push(identity_table());
                continue;
            }
            let func = self.ctx.functions.create(&resolved)?;
            tables.push(sample_function_256(func.as_ref()));
        }
        Ok(tables)
    }
}

fn identity_table() -> Arc<[u8; 256]> {
    let mut table = [0u8; 256];
    for (i, entry) in table.iter_mut().enumerate() {
        *entry = i as u8;
    }
    Arc::new(table)
}

/// Normalize a blend mode name (or fallback array) to its canonical
/// lowercase form. Unknown modes warn and fall back to normal.
pub(crate) fn normalize_blend_mode(value: &Object) -> String {
    let name = match value {
        Object::Name(name) => Some(name.as_str()),
        Object::Array(items) => items.iter().find_map(|item| item.as_name().ok()),
        _ => None,
    };
    let Some(name) = name else {
        return "normal".to_string();
    };
    match name {
        "Normal" | "Compatible" => "normal",
        "Multiply" => "multiply",
        "Screen" => "screen",
        "Overlay" => "overlay",
        "Darken" => "darken",
        "Lighten" => "lighten",
        "ColorDodge" => "color-dodge",
        "ColorBurn" => "color-burn",
        "HardLight" => "hard-light",
        "SoftLight" => "soft-light",
        "Difference" => "difference",
        "Exclusion" => "exclusion",
        "Hue" => "hue",
        "Saturation" => "saturation",
        "Color" => "color",
        "Luminosity" => "luminosity",
        other => {
            warn!("unsupported blend mode: {other}");
            "normal"
        }
    }
    .to_string()
}
