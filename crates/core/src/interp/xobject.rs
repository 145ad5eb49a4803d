//! XObject handling.
//!
//! Form XObjects recurse into the evaluator with a saved, cloned state
//! and wrap their output in begin/end (and group) operators. Image
//! XObjects go through sizing checks, the mask special case and the
//! local/global caches before being decoded out-of-band.

use super::evaluator::{ContentEvaluator, LocalCaches, numeric_args};
use crate::caches::GlobalImageData;
use crate::error::{EvalError, Result};
use crate::image::SMALL_IMAGE_BYTES;
use crate::interp::preproc::Preprocessor;
use crate::interp::schedule::EvalTask;
use crate::model::{Dict, EvalState, ObjRef, Object, StreamObject};
use crate::oplist::{OpArgs, OperatorList};
use crate::ops::OpCode;
use crate::parser::ContentStream;
use crate::transport::Message;
use crate::utils::matrix_from_slice;
use std::sync::Arc;
use tracing::{info, warn};

impl ContentEvaluator {
    /// Do: dispatch an external object by subtype.
    #[allow(clippy::too_many_arguments)]
    pub(crate) async fn do_paint_xobject(
        &self,
        raw: Object,
        name: String,
        resources: &Dict,
        op_list: &mut OperatorList,
        preproc: &mut Preprocessor<EvalState>,
        caches: &mut LocalCaches,
        task: &Arc<EvalTask>,
    ) -> Result<()> {
        let obj_ref = raw.ref_identity();

        if let Some(r) = &obj_ref {
            if let Some((cached_op, cached_args)) = caches.images.get_by_ref(r) {
                let (cached_op, cached_args) = (*cached_op, cached_args.clone());
                op_list.add_op(cached_op, cached_args);
                return Ok(());
            }
            if let Some(data) = self.ctx.image_cache.get(r, self.page_index) {
                op_list.add_dependency(&data.object_id);
                op_list.add_op(data.op, data.args);
                return Ok(());
            }
        }

        let resolved = self.ctx.store.fetch_if_ref(&raw)?;
        let stream = resolved.as_stream()?;
        let subtype = stream
            .get("Subtype")
            .and_then(|s| s.as_name().ok())
            .unwrap_or("");

        match subtype {
            "Form" => {
                preproc.save_state();
                let state = preproc.state().clone();
                let result = self
                    .build_form_xobject(stream, resources, op_list, state, obj_ref, task)
                    .await;
                preproc.restore_state();
                result
            }
            "Image" => {
                self.build_paint_image(
                    stream,
                    obj_ref,
                    resources,
                    false,
                    Some(name.as_str()),
                    op_list,
                    caches,
                )
                .await
            }
            "PS" => {
                // PostScript XObjects are unused when rendering.
                info!("ignored XObject subtype PS");
                Ok(())
            }
            other => Err(EvalError::Format(format!(
                "unhandled XObject subtype: {other}"
            ))),
        }
    }

    /// Recursively evaluate a Form XObject into the parent list, wrapped
    /// in paint-form (and transparency-group) operators.
    pub(crate) async fn build_form_xobject(
        &self,
        form: &StreamObject,
        parent_resources: &Dict,
        op_list: &mut OperatorList,
        initial_state: EvalState,
        obj_ref: Option<ObjRef>,
        task: &Arc<EvalTask>,
    ) -> Result<()> {
        if let Some(r) = obj_ref
            && !task.enter_form(r)
        {
            warn!("skipping recursive form XObject: {}", r.key());
            return Ok(());
        }

        let result = self
            .build_form_inner(form, parent_resources, op_list, initial_state, task)
            .await;

        if let Some(r) = obj_ref {
            task.exit_form(r);
        }
        result
    }

    async fn build_form_inner(
        &self,
        form: &StreamObject,
        parent_resources: &Dict,
        op_list: &mut OperatorList,
        initial_state: EvalState,
        task: &Arc<EvalTask>,
    ) -> Result<()> {
        let dict = &form.dict;
        let matrix = dict
            .get("Matrix")
            .and_then(|m| m.as_array().ok())
            .map(|arr| numeric_args(arr))
            .and_then(|nums| matrix_from_slice(&nums));
        let bbox = dict
            .get("BBox")
            .and_then(|b| b.as_array().ok())
            .map(|arr| numeric_args(arr))
            .and_then(|nums| {
                (nums.len() >= 4).then(|| (nums[0], nums[1], nums[2], nums[3]))
            });

        let group = match dict.get("Group") {
            Some(obj) => {
                let group_dict = self.ctx.store.fetch_if_ref(obj)?.into_dict()?;
                let is_transparency = group_dict
                    .get("S")
                    .and_then(|s| s.as_name().ok())
                    .is_some_and(|s| s == "Transparency");
                is_transparency.then(|| OpArgs::Group {
                    isolated: group_dict
                        .get("I")
                        .and_then(|v| v.as_bool().ok())
                        .unwrap_or(false),
                    knockout: group_dict
                        .get("K")
                        .and_then(|v| v.as_bool().ok())
                        .unwrap_or(false),
                })
            }
            None => None,
        };

        if let Some(group_args) = &group {
            op_list.add_op(OpCode::BeginGroup, group_args.clone());
        }
        op_list.add_op(OpCode::PaintFormXObjectBegin, OpArgs::FormBegin { matrix, bbox });

        let form_resources = match dict.get("Resources") {
            Some(obj) => self
                .ctx
                .store
                .fetch_if_ref(obj)?
                .into_dict()
                .unwrap_or_else(|_| parent_resources.clone()),
            None => parent_resources.clone(),
        };

        self.get_operator_list(
            ContentStream::from_bytes(form.data()),
            &form_resources,
            op_list,
            Some(initial_state),
            task,
        )
        .await?;

        op_list.add_op(OpCode::PaintFormXObjectEnd, OpArgs::None);
        if let Some(group_args) = group {
            op_list.add_op(OpCode::EndGroup, group_args);
        }
        Ok(())
    }

    /// Resolve an image to paint operators: mask special case, inline
    /// embedding, or out-of-band decode by identifier.
    #[allow(clippy::too_many_arguments)]
    pub(crate) async fn build_paint_image(
        &self,
        image: &StreamObject,
        obj_ref: Option<ObjRef>,
        resources: &Dict,
        is_inline: bool,
        cache_key: Option<&str>,
        op_list: &mut OperatorList,
        caches: &mut LocalCaches,
    ) -> Result<()> {
        let dict = &image.dict;
        let width = dict.get("Width").and_then(|w| w.as_num().ok()).unwrap_or(0.0);
        let height = dict
            .get("Height")
            .and_then(|h| h.as_num().ok())
            .unwrap_or(0.0);
        if width < 1.0 || height < 1.0 {
            warn!("image dimensions are missing or invalid, skipping");
            return Ok(());
        }
        let (width, height) = (width as u32, height as u32);

        if self.options.max_image_size != -1
            && i64::from(width) * i64::from(height) > self.options.max_image_size
        {
            warn!("image exceeded maximum allowed size and was removed");
            return Ok(());
        }

        let image_mask = dict
            .get("ImageMask")
            .and_then(|m| m.as_bool().ok())
            .unwrap_or(false);
        if image_mask {
            // Mask pixels depend on the fill color at paint time, so the
            // mask is decoded directly rather than through the image
            // pipeline.
            let invert = dict
                .get("Decode")
                .and_then(|d| d.as_array().ok())
                .and_then(|arr| arr.first().and_then(|v| v.as_num().ok()))
                .is_some_and(|v| v == 1.0);
            let mask = self
                .ctx
                .images
                .create_mask(image.data(), width, height, invert)?;
            let args = OpArgs::ImageMask(Arc::new(mask));
            op_list.add_op(OpCode::PaintImageMaskXObject, args.clone());
            caches
                .images
                .set(cache_key, obj_ref, (OpCode::PaintImageMaskXObject, args));
            return Ok(());
        }

        let force_rgba = dict.contains_key("SMask") || dict.contains_key("Mask");

        if is_inline {
            // Inline data is already in the stream; decode eagerly and
            // embed. Only small images are worth memoizing.
            let decoded = self
                .ctx
                .images
                .build_image(dict, image.data(), resources, force_rgba)
                .await?;
            let small = decoded.byte_size() <= SMALL_IMAGE_BYTES as u64;
            let args = OpArgs::InlineImage(Arc::new(decoded));
            op_list.add_op(OpCode::PaintInlineImageXObject, args.clone());
            if small {
                caches
                    .images
                    .set(cache_key, obj_ref, (OpCode::PaintInlineImageXObject, args));
            }
            return Ok(());
        }

        let global = obj_ref.is_some_and(|r| self.ctx.image_cache.should_cache(r, self.page_index));
        let object_id = match (global, obj_ref) {
            (true, Some(r)) => format!("g_img_{}", r.key()),
            _ => self.next_image_object_id(),
        };

        op_list.add_dependency(&object_id);
        let args = OpArgs::Image {
            object_id: object_id.clone(),
            width,
            height,
        };
        op_list.add_op(OpCode::PaintImageXObject, args.clone());
        caches
            .images
            .set(cache_key, obj_ref, (OpCode::PaintImageXObject, args.clone()));

        let decoded = self
            .ctx
            .images
            .build_image(dict, image.data(), resources, force_rgba)
            .await?;
        let byte_size = decoded.byte_size();
        self.ctx.channel.send(Message::Image {
            object_id: object_id.clone(),
            image: Arc::new(decoded),
        });

        if global && let Some(r) = obj_ref {
            self.ctx.image_cache.set_data(
                r,
                GlobalImageData {
                    object_id,
                    op: OpCode::PaintImageXObject,
                    args,
                    byte_size,
                },
            );
        }
        Ok(())
    }
}
