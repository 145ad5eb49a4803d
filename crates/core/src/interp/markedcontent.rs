//! Marked content handling.
//!
//! Property lists resolve against the resource dictionary's Properties
//! table; optional-content (/OC) properties additionally parse membership
//! dictionaries and boolean visibility expressions over OCG references,
//! up to a fixed nesting depth.

use super::evaluator::ContentEvaluator;
use crate::error::{EvalError, Result};
use crate::model::{Dict, Object};
use crate::oplist::{MarkedProps, OpArgs, OperatorList, OptionalContentProps, VisibilityExpression};
use crate::ops::OpCode;
use tracing::warn;

/// Maximum nesting of visibility expressions.
const MAX_NESTING: usize = 10;

impl ContentEvaluator {
    /// BMC/BDC/MP/DP/EMC dispatch.
    pub(crate) fn do_marked_content(
        &self,
        op: OpCode,
        args: &[Object],
        resources: &Dict,
        op_list: &mut OperatorList,
    ) -> Result<()> {
        match op {
            OpCode::EndMarkedContent => {
                op_list.add_op(op, OpArgs::None);
                Ok(())
            }
            OpCode::BeginMarkedContent | OpCode::MarkPoint => {
                let Some(Object::Name(tag)) = args.first() else {
                    return Err(EvalError::Format("marked content without a tag".into()));
                };
                op_list.add_op(op, OpArgs::Name(tag.clone()));
                Ok(())
            }
            _ => {
                // BDC and DP carry a property list.
                let Some(Object::Name(tag)) = args.first() else {
                    return Err(EvalError::Format("marked content without a tag".into()));
                };
                let props = self.resolve_marked_props(tag, args.get(1), resources)?;
                op_list.add_op(
                    op,
                    OpArgs::MarkedContent {
                        tag: tag.clone(),
                        props,
                    },
                );
                Ok(())
            }
        }
    }

    fn resolve_marked_props(
        &self,
        tag: &str,
        value: Option<&Object>,
        resources: &Dict,
    ) -> Result<MarkedProps> {
        let Some(value) = value else {
            return Ok(MarkedProps::None);
        };

        // A name indirects through the Properties resource table; the
        // raw entry is kept so OCG identities survive.
        let raw = match value {
            Object::Name(name) => {
                let properties = self.resource_dict(resources, "Properties")?;
                properties.get(name).cloned().ok_or_else(|| {
                    EvalError::MissingResource(format!("marked content properties {name}"))
                })?
            }
            other => other.clone(),
        };

        if tag == "OC" {
            return Ok(MarkedProps::OptionalContent(
                self.parse_optional_content(&raw)?,
            ));
        }

        Ok(MarkedProps::Raw(self.ctx.store.fetch_if_ref(&raw)?))
    }

    /// Parse an optional-content group or membership dictionary.
    fn parse_optional_content(&self, raw: &Object) -> Result<OptionalContentProps> {
        let id_of = |obj: &Object| -> Option<String> {
            obj.ref_identity().map(|r| r.key())
        };
        let own_id = id_of(raw);
        let dict = self.ctx.store.fetch_if_ref(raw)?.into_dict()?;
        let kind = dict
            .get("Type")
            .and_then(|t| t.as_name().ok())
            .unwrap_or("")
            .to_string();

        match kind.as_str() {
            "OCG" => Ok(OptionalContentProps {
                kind,
                ids: own_id.into_iter().collect(),
                expression: None,
            }),
            "OCMD" => {
                let expression = match dict.get("VE") {
                    Some(Object::Array(items)) => {
                        match self.parse_visibility_expression(items, 0) {
                            Ok(expr) => Some(expr),
                            Err(err) => {
                                // A bad expression contributes no groups
                                // but does not invalidate the sequence.
                                warn!("invalid visibility expression: {err}");
                                None
                            }
                        }
                    }
                    _ => None,
                };
                let ids = match dict.get("OCGs") {
                    Some(Object::Ref(r)) => vec![r.key()],
                    Some(Object::Array(items)) => {
                        items.iter().filter_map(|item| id_of(item)).collect()
                    }
                    _ => Vec::new(),
                };
                Ok(OptionalContentProps {
                    kind,
                    ids,
                    expression,
                })
            }
            other => Err(EvalError::Format(format!(
                "unexpected optional content type: {other}"
            ))),
        }
    }

    /// Recursively parse an And/Or/Not tree over OCG references.
    fn parse_visibility_expression(
        &self,
        items: &[Object],
        depth: usize,
    ) -> Result<VisibilityExpression> {
        if depth >= MAX_NESTING {
            return Err(EvalError::Format(
                "visibility expression is nested too deeply".into(),
            ));
        }
        let operator = items
            .first()
            .and_then(|op| op.as_name().ok())
            .ok_or_else(|| {
                EvalError::Format("visibility expression without an operator".into())
            })?;

        let mut operands = Vec::with_capacity(items.len().saturating_sub(1));
        for item in &items[1..] {
            match item {
                Object::Ref(r) => operands.push(VisibilityExpression::Group(r.key())),
                Object::Array(nested) => {
                    operands.push(self.parse_visibility_expression(nested, depth + 1)?);
                }
                other => {
                    return Err(EvalError::Format(format!(
                        "unexpected visibility expression operand: {}",
                        other.type_name()
                    )));
                }
            }
        }

        match operator {
            "And" => Ok(VisibilityExpression::And(operands)),
            "Or" => Ok(VisibilityExpression::Or(operands)),
            "Not" => Ok(VisibilityExpression::Not(operands)),
            other => Err(EvalError::Format(format!(
                "unknown visibility expression operator: {other}"
            ))),
        }
    }
}
