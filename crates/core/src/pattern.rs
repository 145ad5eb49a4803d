//! Pattern payloads and the shading parser seam.
//!
//! Tiling patterns are evaluated in-crate (their bodies are content
//! streams); shading dictionaries are turned into a paintable IR by an
//! external parser.

use crate::error::{EvalError, Result};
use crate::model::{Dict, Object};
use crate::oplist::OperatorList;
use crate::store::ObjectStore;
use crate::utils::Matrix;
use std::sync::Arc;

/// PatternType value for tiling patterns.
pub const TILING_PATTERN: i64 = 1;
/// PatternType value for shading patterns.
pub const SHADING_PATTERN: i64 = 2;

/// Paintable intermediate representation of a shading.
#[derive(Debug, Clone)]
pub struct ShadingIR {
    /// "FunctionBased", "Axial", "Radial" or "Mesh"
    pub kind: String,
    /// The resolved shading dictionary
    pub shading: Object,
    /// Pattern matrix, when the shading came from a shading pattern
    pub matrix: Option<Matrix>,
}

/// External shading subsystem.
pub trait ShadingParser: Send + Sync {
    fn parse_shading(
        &self,
        shading: &Object,
        resources: &Dict,
        store: &dyn ObjectStore,
    ) -> Result<Arc<ShadingIR>>;
}

/// Parser that classifies the shading by type and passes the resolved
/// dictionary through. Backs tests and the CLI tools.
pub struct BasicShadingParser;

impl ShadingParser for BasicShadingParser {
    fn parse_shading(
        &self,
        shading: &Object,
        _resources: &Dict,
        store: &dyn ObjectStore,
    ) -> Result<Arc<ShadingIR>> {
        let resolved = store.fetch_if_ref(shading)?;
        let dict = resolved.as_dict()?;
        let shading_type = dict
            .get("ShadingType")
            .ok_or_else(|| EvalError::Format("shading has no ShadingType".into()))?
            .as_int()?;
        let kind = match shading_type {
            1 => "FunctionBased",
            2 => "Axial",
            3 => "Radial",
            4..=7 => "Mesh",
            other => {
                return Err(EvalError::Format(format!(
                    "unknown ShadingType: {other}"
                )));
            }
        };
        Ok(Arc::new(ShadingIR {
            kind: kind.to_string(),
            shading: resolved.clone(),
            matrix: None,
        }))
    }
}

/// A fully evaluated tiling pattern: its own operator list plus the tiling
/// parameters the renderer needs to replicate the cell.
#[derive(Debug)]
pub struct TilingPatternIR {
    /// 1 = colored, 2 = uncolored
    pub paint_type: i64,
    pub tiling_type: i64,
    pub bbox: [f64; 4],
    pub x_step: f64,
    pub y_step: f64,
    pub matrix: Matrix,
    /// Base color for uncolored patterns, as RGB bytes
    pub color: Option<[u8; 3]>,
    pub op_list: Arc<OperatorList>,
}
