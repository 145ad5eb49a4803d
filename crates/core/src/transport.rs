//! Cross-process message channel interface.
//!
//! Decoded images, translated fonts and degradation notices travel to the
//! renderer through the fire-and-forget side; built-in CMap data and
//! standard font data come back through the request/response side when no
//! direct URL is configured.

use crate::error::{EvalError, Result};
use crate::font::FontExportData;
use crate::image::DecodedImage;
use crate::model::Object;
use async_trait::async_trait;
use std::sync::Arc;

/// Degraded-but-recovered conditions, one tag per feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnsupportedFeature {
    TilingPattern,
    ExtGState,
    Font,
    ColorSpace,
    XObject,
    MarkedContent,
    MissingFont,
    FontTranslate,
    FontBuildPath,
    FontLoadType3,
    MissingFontState,
}

impl UnsupportedFeature {
    /// Stable tag reported to the host.
    pub const fn tag(self) -> &'static str {
        match self {
            Self::TilingPattern => "bad tiling pattern",
            Self::ExtGState => "bad ExtGState",
            Self::Font => "bad font",
            Self::ColorSpace => "bad color space",
            Self::XObject => "bad XObject",
            Self::MarkedContent => "bad marked content",
            Self::MissingFont => "missing font",
            Self::FontTranslate => "font translation failure",
            Self::FontBuildPath => "font path-build failure",
            Self::FontLoadType3 => "Type3 load failure",
            Self::MissingFontState => "missing font state",
        }
    }
}

/// Fire-and-forget payloads.
#[derive(Debug, Clone)]
pub enum Message {
    UnsupportedFeature(UnsupportedFeature),
    /// A decoded image, referenced from operator lists by identifier.
    Image {
        object_id: String,
        image: Arc<DecodedImage>,
    },
    /// A translated font, referenced by its stable output identifier.
    Font {
        loaded_name: String,
        export: Arc<FontExportData>,
    },
}

/// Request/response payloads.
#[derive(Debug, Clone)]
pub enum Request {
    /// Built-in CMap data by encoding name.
    BuiltInCMap { name: String },
    /// Standard font program bytes by file name.
    StandardFontData { filename: String },
}

/// The cross-process channel. `send` must not block; `send_with_promise`
/// suspends the calling evaluation until the host responds.
#[async_trait]
pub trait MessageChannel: Send + Sync {
    fn send(&self, msg: Message);

    async fn send_with_promise(&self, req: Request) -> Result<Object>;
}

/// Channel that drops notifications and has no data to serve.
pub struct NullChannel;

#[async_trait]
impl MessageChannel for NullChannel {
    fn send(&self, _msg: Message) {}

    async fn send_with_promise(&self, req: Request) -> Result<Object> {
        Err(EvalError::MissingResource(match req {
            Request::BuiltInCMap { name } => format!("built-in CMap {name}"),
            Request::StandardFontData { filename } => format!("standard font data {filename}"),
        }))
    }
}
