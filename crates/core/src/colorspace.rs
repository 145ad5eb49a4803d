//! Color spaces.
//!
//! The evaluator pre-resolves every color space reference so the output
//! operator list only ever carries explicit RGB values. Parsing is
//! asynchronous: a color space that is not already cache-resident is a
//! suspend point for the evaluation.

use crate::error::{EvalError, Result};
use crate::function::{FunctionFactory, PdfFunction};
use crate::model::{Dict, Object};
use crate::store::ObjectStore;
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// A resolved color space, able to rewrite component values to RGB.
#[derive(Clone)]
pub enum ColorSpace {
    DeviceGray,
    DeviceRgb,
    DeviceCmyk,
    /// Pattern space; the base applies to uncolored (PaintType 2) patterns
    Pattern { base: Option<Arc<ColorSpace>> },
    Indexed {
        base: Arc<ColorSpace>,
        hi_val: i64,
        lookup: Vec<u8>,
    },
    /// Separation / DeviceN: components map through a tint transform into
    /// an alternate space
    Alternate {
        num_comps: usize,
        alt: Arc<ColorSpace>,
        tint: Arc<dyn PdfFunction>,
    },
}

impl ColorSpace {
    /// Family name, used for Pattern detection and diagnostics.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::DeviceGray => "DeviceGray",
            Self::DeviceRgb => "DeviceRGB",
            Self::DeviceCmyk => "DeviceCMYK",
            Self::Pattern { .. } => "Pattern",
            Self::Indexed { .. } => "Indexed",
            Self::Alternate { .. } => "Alternate",
        }
    }

    pub const fn is_pattern(&self) -> bool {
        matches!(self, Self::Pattern { .. })
    }

    /// Number of color components this space expects.
    pub fn num_comps(&self) -> usize {
        match self {
            Self::DeviceGray | Self::Indexed { .. } => 1,
            Self::DeviceRgb => 3,
            Self::DeviceCmyk => 4,
            Self::Pattern { .. } => 1,
            Self::Alternate { num_comps, .. } => *num_comps,
        }
    }

    /// Convert component values to RGB bytes.
    pub fn get_rgb(&self, comps: &[f64]) -> [u8; 3] {
        match self {
            Self::DeviceGray => {
                let g = to_byte(comps.first().copied().unwrap_or(0.0));
                [g, g, g]
            }
            Self::DeviceRgb => [
                to_byte(comps.first().copied().unwrap_or(0.0)),
                to_byte(comps.get(1).copied().unwrap_or(0.0)),
                to_byte(comps.get(2).copied().unwrap_or(0.0)),
            ],
            Self::DeviceCmyk => {
                let c = comps.first().copied().unwrap_or(0.0);
                let m = comps.get(1).copied().unwrap_or(0.0);
                let y = comps.get(2).copied().unwrap_or(0.0);
                let k = comps.get(3).copied().unwrap_or(0.0);
                [
                    to_byte(1.0 - (c + k).min(1.0)),
                    to_byte(1.0 - (m + k).min(1.0)),
                    to_byte(1.0 - (y + k).min(1.0)),
                ]
            }
            Self::Pattern { base } => match base {
                Some(base) => base.get_rgb(comps),
                None => [0, 0, 0],
            },
            Self::Indexed {
                base,
                hi_val,
                lookup,
            } => {
                let index = (comps.first().copied().unwrap_or(0.0) as i64).clamp(0, *hi_val);
                let n = base.num_comps();
                let start = index as usize * n;
                let base_comps: Vec<f64> = (0..n)
                    .map(|i| lookup.get(start + i).copied().unwrap_or(0) as f64 / 255.0)
                    .collect();
                base.get_rgb(&base_comps)
            }
            Self::Alternate {
                num_comps: _,
                alt,
                tint,
            } => {
                let mut out = vec![0.0; alt.num_comps()];
                tint.eval(comps, &mut out);
                alt.get_rgb(&out)
            }
        }
    }
}

impl fmt::Debug for ColorSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Indexed { hi_val, base, .. } => f
                .debug_struct("Indexed")
                .field("base", base)
                .field("hi_val", hi_val)
                .finish(),
            Self::Alternate { num_comps, alt, .. } => f
                .debug_struct("Alternate")
                .field("num_comps", num_comps)
                .field("alt", alt)
                .finish(),
            Self::Pattern { base } => f.debug_struct("Pattern").field("base", base).finish(),
            other => f.write_str(other.name()),
        }
    }
}

fn to_byte(v: f64) -> u8 {
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Parse a color space descriptor against a resource dictionary.
///
/// A plain name either denotes a device space or refers into the resource
/// dictionary's ColorSpace table; arrays carry the parameterized families.
pub fn parse<'a>(
    obj: &'a Object,
    store: &'a dyn ObjectStore,
    resources: &'a Dict,
    functions: &'a dyn FunctionFactory,
) -> BoxFuture<'a, Result<Arc<ColorSpace>>> {
    Box::pin(async move {
        let resolved = store.fetch_if_ref(obj)?;
        match &resolved {
            Object::Name(name) => parse_name(name, store, resources, functions).await,
            Object::Array(items) => parse_array(items, store, resources, functions).await,
            other => Err(EvalError::Format(format!(
                "unrecognized color space descriptor: {}",
                other.type_name()
            ))),
        }
    })
}

async fn parse_name(
    name: &str,
    store: &dyn ObjectStore,
    resources: &Dict,
    functions: &dyn FunctionFactory,
) -> Result<Arc<ColorSpace>> {
    match name {
        "DeviceGray" | "G" | "CalGray" => Ok(Arc::new(ColorSpace::DeviceGray)),
        "DeviceRGB" | "RGB" | "CalRGB" => Ok(Arc::new(ColorSpace::DeviceRgb)),
        "DeviceCMYK" | "CMYK" => Ok(Arc::new(ColorSpace::DeviceCmyk)),
        "Pattern" => Ok(Arc::new(ColorSpace::Pattern { base: None })),
        "Lab" => {
            warn!("approximating Lab color space with DeviceRGB");
            Ok(Arc::new(ColorSpace::DeviceRgb))
        }
        _ => {
            // Not a device space: look it up in the resource dictionary.
            let table = match resources.get("ColorSpace") {
                Some(obj) => store.fetch_if_ref(obj)?.into_dict()?,
                None => {
                    return Err(EvalError::Format(format!(
                        "unrecognized color space: {name}"
                    )));
                }
            };
            let entry = table
                .get(name)
                .ok_or_else(|| EvalError::Format(format!("undefined color space: {name}")))?;
            // A resource entry naming itself would recurse forever.
            if matches!(entry, Object::Name(n) if n == name) {
                return Err(EvalError::Format(format!(
                    "self-referential color space: {name}"
                )));
            }
            parse(entry, store, resources, functions).await
        }
    }
}

async fn parse_array(
    items: &[Object],
    store: &dyn ObjectStore,
    resources: &Dict,
    functions: &dyn FunctionFactory,
) -> Result<Arc<ColorSpace>> {
    let family = items
        .first()
        .ok_or_else(|| EvalError::Format("empty color space array".into()))?;
    let family = store.fetch_if_ref(family)?;
    let family = family.as_name()?;

    match family {
        "DeviceGray" | "G" | "CalGray" => Ok(Arc::new(ColorSpace::DeviceGray)),
        "DeviceRGB" | "RGB" | "CalRGB" | "Lab" => Ok(Arc::new(ColorSpace::DeviceRgb)),
        "DeviceCMYK" | "CMYK" => Ok(Arc::new(ColorSpace::DeviceCmyk)),
        "ICCBased" => {
            let stream = items
                .get(1)
                .ok_or_else(|| EvalError::Format("ICCBased without stream".into()))?;
            let stream = store.fetch_if_ref(stream)?;
            let n = stream.as_dict()?.get("N").and_then(|n| n.as_int().ok());
            match n {
                Some(1) => Ok(Arc::new(ColorSpace::DeviceGray)),
                Some(3) | None => Ok(Arc::new(ColorSpace::DeviceRgb)),
                Some(4) => Ok(Arc::new(ColorSpace::DeviceCmyk)),
                Some(other) => Err(EvalError::Format(format!(
                    "ICCBased with unsupported component count: {other}"
                ))),
            }
        }
        "Pattern" => {
            let base = match items.get(1) {
                Some(obj) if !obj.is_null() => {
                    Some(parse(obj, store, resources, functions).await?)
                }
                _ => None,
            };
            Ok(Arc::new(ColorSpace::Pattern { base }))
        }
        "Indexed" | "I" => {
            let base_obj = items
                .get(1)
                .ok_or_else(|| EvalError::Format("Indexed without base".into()))?;
            let base = parse(base_obj, store, resources, functions).await?;
            let hi_val = store
                .fetch_if_ref(
                    items
                        .get(2)
                        .ok_or_else(|| EvalError::Format("Indexed without hival".into()))?,
                )?
                .as_int()?;
            let lookup = match store.fetch_if_ref(
                items
                    .get(3)
                    .ok_or_else(|| EvalError::Format("Indexed without lookup".into()))?,
            )? {
                Object::String(bytes) => bytes,
                Object::Stream(stream) => stream.data().to_vec(),
                other => {
                    return Err(EvalError::Format(format!(
                        "Indexed lookup has unexpected type: {}",
                        other.type_name()
                    )));
                }
            };
            Ok(Arc::new(ColorSpace::Indexed {
                base,
                hi_val,
                lookup,
            }))
        }
        "Separation" | "DeviceN" => {
            let num_comps = if family == "Separation" {
                1
            } else {
                match store.fetch_if_ref(
                    items
                        .get(1)
                        .ok_or_else(|| EvalError::Format("DeviceN without names".into()))?,
                )? {
                    Object::Array(names) => names.len(),
                    _ => 1,
                }
            };
            let alt_obj = items
                .get(2)
                .ok_or_else(|| EvalError::Format(format!("{family} without alternate")))?;
            let alt = parse(alt_obj, store, resources, functions).await?;
            let tint_obj = items
                .get(3)
                .ok_or_else(|| EvalError::Format(format!("{family} without tint transform")))?;
            let tint = functions.create(&store.fetch_if_ref(tint_obj)?)?;
            Ok(Arc::new(ColorSpace::Alternate {
                num_comps,
                alt,
                tint,
            }))
        }
        other => Err(EvalError::Format(format!(
            "unrecognized color space family: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gray_to_rgb() {
        assert_eq!(ColorSpace::DeviceGray.get_rgb(&[0.5]), [128, 128, 128]);
    }

    #[test]
    fn test_cmyk_to_rgb() {
        assert_eq!(ColorSpace::DeviceCmyk.get_rgb(&[0.0, 0.0, 0.0, 1.0]), [0, 0, 0]);
        assert_eq!(
            ColorSpace::DeviceCmyk.get_rgb(&[1.0, 0.0, 0.0, 0.0]),
            [0, 255, 255]
        );
    }

    #[test]
    fn test_indexed_lookup() {
        let cs = ColorSpace::Indexed {
            base: Arc::new(ColorSpace::DeviceRgb),
            hi_val: 1,
            lookup: vec![255, 0, 0, 0, 0, 255],
        };
        assert_eq!(cs.get_rgb(&[0.0]), [255, 0, 0]);
        assert_eq!(cs.get_rgb(&[1.0]), [0, 0, 255]);
        // Out-of-range indices clamp.
        assert_eq!(cs.get_rgb(&[9.0]), [0, 0, 255]);
    }
}
