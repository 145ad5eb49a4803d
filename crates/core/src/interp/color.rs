//! Color and pattern handling.
//!
//! Color-space-setting operators resolve (cached by identity first,
//! otherwise parsed asynchronously) into the graphics state; color
//! operators are rewritten to explicit RGB. A pattern color argument
//! resolves to a cached tiling-pattern fragment, a full nested evaluation
//! of the pattern's content stream, or a shading IR.

use super::evaluator::{ContentEvaluator, LocalCaches, numeric_args, rgb_op};
use crate::colorspace::{self, ColorSpace};
use crate::error::{EvalError, Result};
use crate::interp::schedule::EvalTask;
use crate::model::{Dict, EvalState, Object};
use crate::oplist::{OpArgs, OperatorList};
use crate::ops::OpCode;
use crate::parser::ContentStream;
use crate::pattern::{SHADING_PATTERN, ShadingIR, TILING_PATTERN, TilingPatternIR};
use crate::utils::{MATRIX_IDENTITY, matrix_from_slice};
use std::sync::Arc;

impl ContentEvaluator {
    /// Resolve a color space operand, consulting the call-local cache by
    /// name and object identity before parsing.
    pub(crate) async fn parse_color_space(
        &self,
        obj: Option<&Object>,
        resources: &Dict,
        caches: &mut LocalCaches,
    ) -> Result<Arc<ColorSpace>> {
        let obj =
            obj.ok_or_else(|| EvalError::Format("color space operator without operand".into()))?;

        let name = match obj {
            Object::Name(name) => Some(name.as_str()),
            _ => None,
        };
        let obj_ref = obj.ref_identity();
        if let Some(name) = name
            && let Some(cached) = caches.color_spaces.get_by_name(name)
        {
            return Ok(cached.clone());
        }
        if let Some(r) = &obj_ref
            && let Some(cached) = caches.color_spaces.get_by_ref(r)
        {
            return Ok(cached.clone());
        }

        let cs = colorspace::parse(
            obj,
            self.ctx.store.as_ref(),
            resources,
            self.ctx.functions.as_ref(),
        )
        .await?;
        caches.color_spaces.set(name, obj_ref, cs.clone());
        Ok(cs)
    }

    /// Rewrite a device or current-space color operator into an explicit
    /// RGB-setting operator, updating the state's color space where the
    /// operator implies one.
    pub(crate) fn rewrite_color(
        &self,
        op: OpCode,
        args: &[Object],
        state: &mut EvalState,
    ) -> (OpCode, OpArgs) {
        let comps = numeric_args(args);
        match op {
            OpCode::SetFillGray => {
                state.fill_color_space = Arc::new(ColorSpace::DeviceGray);
                rgb_op(op, &ColorSpace::DeviceGray, &comps)
            }
            OpCode::SetStrokeGray => {
                state.stroke_color_space = Arc::new(ColorSpace::DeviceGray);
                rgb_op(op, &ColorSpace::DeviceGray, &comps)
            }
            OpCode::SetFillRgbColor => {
                state.fill_color_space = Arc::new(ColorSpace::DeviceRgb);
                rgb_op(op, &ColorSpace::DeviceRgb, &comps)
            }
            OpCode::SetStrokeRgbColor => {
                state.stroke_color_space = Arc::new(ColorSpace::DeviceRgb);
                rgb_op(op, &ColorSpace::DeviceRgb, &comps)
            }
            OpCode::SetFillCmykColor => {
                state.fill_color_space = Arc::new(ColorSpace::DeviceCmyk);
                rgb_op(op, &ColorSpace::DeviceCmyk, &comps)
            }
            OpCode::SetStrokeCmykColor => {
                state.stroke_color_space = Arc::new(ColorSpace::DeviceCmyk);
                rgb_op(op, &ColorSpace::DeviceCmyk, &comps)
            }
            OpCode::SetFillColor => rgb_op(op, &state.fill_color_space.clone(), &comps),
            _ => rgb_op(op, &state.stroke_color_space.clone(), &comps),
        }
    }

    /// scn/SCN with a Pattern color space active: distinguish tiling
    /// patterns (nested evaluation, cached) from shading patterns.
    #[allow(clippy::too_many_arguments)]
    pub(crate) async fn handle_color_n(
        &self,
        op: OpCode,
        args: &[Object],
        cs: &ColorSpace,
        patterns: &Dict,
        resources: &Dict,
        op_list: &mut OperatorList,
        caches: &mut LocalCaches,
        task: &Arc<EvalTask>,
    ) -> Result<()> {
        let Some(Object::Name(pattern_name)) = args.last() else {
            return Err(EvalError::Format(
                "pattern color operator without a pattern name".into(),
            ));
        };

        if let Some(ir) = caches.patterns.get_by_name(pattern_name) {
            let ir = ir.clone();
            op_list.add_op(op, OpArgs::TilingPattern(ir));
            return Ok(());
        }

        let raw = patterns
            .get(pattern_name)
            .cloned()
            .ok_or_else(|| EvalError::MissingResource(format!("pattern {pattern_name}")))?;
        let obj_ref = raw.ref_identity();
        let resolved = self.ctx.store.fetch_if_ref(&raw)?;
        let dict = resolved.as_dict()?;
        let pattern_type = dict
            .get("PatternType")
            .and_then(|t| t.as_int().ok())
            .unwrap_or(0);

        match pattern_type {
            TILING_PATTERN => {
                // Uncolored patterns carry base color components ahead of
                // the name.
                let color = match cs {
                    ColorSpace::Pattern { base: Some(base) } if args.len() > 1 => {
                        let comps = numeric_args(&args[..args.len() - 1]);
                        Some(base.get_rgb(&comps))
                    }
                    _ => None,
                };
                let stream = resolved.as_stream()?;
                let ir = self
                    .build_tiling_pattern(stream, color, resources, task)
                    .await?;
                op_list.add_dependencies(ir.op_list.dependencies().iter());
                op_list.add_op(op, OpArgs::TilingPattern(ir.clone()));
                caches.patterns.set(Some(pattern_name.as_str()), obj_ref, ir);
                Ok(())
            }
            SHADING_PATTERN => {
                let shading = dict
                    .get("Shading")
                    .ok_or_else(|| EvalError::Format("shading pattern without Shading".into()))?;
                let matrix = dict
                    .get("Matrix")
                    .and_then(|m| m.as_array().ok())
                    .map(|arr| numeric_args(arr))
                    .and_then(|nums| matrix_from_slice(&nums));
                let parsed = self.ctx.shadings.parse_shading(
                    shading,
                    resources,
                    self.ctx.store.as_ref(),
                )?;
                let ir = Arc::new(ShadingIR {
                    matrix,
                    ..(*parsed).clone()
                });
                op_list.add_op(op, OpArgs::Shading(ir));
                Ok(())
            }
            other => Err(EvalError::Format(format!("unknown PatternType: {other}"))),
        }
    }

    /// Evaluate a tiling pattern's content stream into an isolated
    /// operator list.
    async fn build_tiling_pattern(
        &self,
        pattern: &crate::model::StreamObject,
        color: Option<[u8; 3]>,
        parent_resources: &Dict,
        task: &Arc<EvalTask>,
    ) -> Result<Arc<TilingPatternIR>> {
        let dict = &pattern.dict;
        let pattern_resources = match dict.get("Resources") {
            Some(obj) => self
                .ctx
                .store
                .fetch_if_ref(obj)?
                .into_dict()
                .unwrap_or_else(|_| parent_resources.clone()),
            None => parent_resources.clone(),
        };

        let mut tiling_list = OperatorList::new();
        self.get_operator_list(
            ContentStream::from_bytes(pattern.data()),
            &pattern_resources,
            &mut tiling_list,
            None,
            task,
        )
        .await?;

        let bbox_nums = dict
            .get("BBox")
            .and_then(|b| b.as_array().ok())
            .map(|arr| numeric_args(arr))
            .unwrap_or_default();
        if bbox_nums.len() < 4 {
            return Err(EvalError::Format("tiling pattern without a BBox".into()));
        }
        let matrix = dict
            .get("Matrix")
            .and_then(|m| m.as_array().ok())
            .map(|arr| numeric_args(arr))
            .and_then(|nums| matrix_from_slice(&nums))
            .unwrap_or(MATRIX_IDENTITY);

        Ok(Arc::new(TilingPatternIR {
            paint_type: dict
                .get("PaintType")
                .and_then(|t| t.as_int().ok())
                .unwrap_or(1),
            tiling_type: dict
                .get("TilingType")
                .and_then(|t| t.as_int().ok())
                .unwrap_or(1),
            bbox: [bbox_nums[0], bbox_nums[1], bbox_nums[2], bbox_nums[3]],
            x_step: dict
                .get("XStep")
                .and_then(|s| s.as_num().ok())
                .unwrap_or(bbox_nums[2] - bbox_nums[0]),
            y_step: dict
                .get("YStep")
                .and_then(|s| s.as_num().ok())
                .unwrap_or(bbox_nums[3] - bbox_nums[1]),
            matrix,
            color,
            op_list: Arc::new(tiling_list),
        }))
    }

    /// sh: resolve the shading dictionary synchronously and emit its IR.
    pub(crate) fn do_shading_fill(
        &self,
        args: &[Object],
        resources: &Dict,
        op_list: &mut OperatorList,
    ) -> Result<()> {
        let Some(Object::Name(name)) = args.first() else {
            return Err(EvalError::Format("shading fill without a name".into()));
        };
        let shadings = self.resource_dict(resources, "Shading")?;
        let shading = shadings
            .get(name)
            .ok_or_else(|| EvalError::MissingResource(format!("shading {name}")))?;
        let ir = self
            .ctx
            .shadings
            .parse_shading(shading, resources, self.ctx.store.as_ref())?;
        op_list.add_op(OpCode::ShadingFill, OpArgs::Shading(ir));
        Ok(())
    }
}
