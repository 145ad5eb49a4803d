//! Font resolution pipeline.
//!
//! `translate` hashes and deduplicates font definitions and drives the
//! asynchronous translation; `cache` holds the per-document single-flight
//! table; `simple` is the built-in metrics-only backend; binary font
//! program parsing stays behind the [`FontBackend`] seam.

pub mod cache;
pub mod cmap;
pub mod simple;
pub mod translate;

use crate::error::Result;
use crate::model::Dict;
use crate::utils::Matrix;
use bytes::Bytes;
use rustc_hash::FxHashMap;
use std::sync::Arc;

pub use cache::{FontCache, FontKey};
pub use cmap::CMap;
pub use simple::SimpleFontBackend;
pub use translate::{TranslatedFont, Type3Glyphs};

/// A glyph produced by mapping character codes through a font.
#[derive(Debug, Clone)]
pub struct Glyph {
    pub unicode: String,
    /// Advance width in 1000-unit text space
    pub width: f64,
    /// Original character code
    pub font_char: u32,
    /// Whether word spacing applies to this glyph
    pub is_space: bool,
}

/// Serialized font data pushed to the renderer.
#[derive(Debug, Clone)]
pub struct FontExportData {
    pub name: String,
    pub subtype: String,
    pub vertical: bool,
    pub program: Option<Bytes>,
    /// Unicode map, exported only under `font_extra_properties`
    pub to_unicode: Option<FxHashMap<u32, String>>,
    /// Set when this is an error font standing in for a failed translation
    pub error: Option<String>,
}

/// Everything the binary font subsystem needs to build a usable handle.
#[derive(Debug, Clone)]
pub struct FontProperties {
    pub name: String,
    pub subtype: String,
    pub composite: bool,
    pub vertical: bool,
    pub first_char: u32,
    pub last_char: u32,
    pub default_width: f64,
    /// Advance widths by character code (by CID for composite fonts)
    pub widths: FxHashMap<u32, f64>,
    /// Character code to glyph name, from encoding differences
    pub encoding: FxHashMap<u32, String>,
    /// Character code to unicode, from the ToUnicode map
    pub to_unicode: FxHashMap<u32, String>,
    pub flags: u32,
    pub program: Option<Bytes>,
    pub font_matrix: Matrix,
    /// Type3 glyph programs
    pub char_procs: Option<Dict>,
    pub cmap: Option<CMap>,
}

/// A font ready for glyph mapping.
///
/// Error fonts satisfy this same interface, so downstream code never
/// branches on translation success.
pub trait FontProgram: Send + Sync {
    fn name(&self) -> &str;

    fn is_error(&self) -> bool {
        false
    }

    fn is_type3(&self) -> bool {
        false
    }

    fn vertical(&self) -> bool {
        false
    }

    /// Map raw string bytes to glyphs.
    fn char_to_glyphs(&self, bytes: &[u8]) -> Vec<Glyph>;

    /// Width of the space glyph in 1000-unit text space.
    fn space_width(&self) -> f64;

    fn ascent(&self) -> f64 {
        0.8
    }

    fn descent(&self) -> f64 {
        -0.2
    }

    fn font_matrix(&self) -> Matrix {
        (0.001, 0.0, 0.0, 0.001, 0.0, 0.0)
    }

    /// Type3 glyph program dictionary.
    fn char_procs(&self) -> Option<&Dict> {
        None
    }

    fn export(&self) -> FontExportData;
}

/// External binary font subsystem.
pub trait FontBackend: Send + Sync {
    fn create_font(&self, props: FontProperties) -> Result<Arc<dyn FontProgram>>;
}

/// Typed substitute for a font that failed to translate.
pub struct ErrorFont {
    reason: String,
}

impl ErrorFont {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl FontProgram for ErrorFont {
    fn name(&self) -> &str {
        "ErrorFont"
    }

    fn is_error(&self) -> bool {
        true
    }

    fn char_to_glyphs(&self, _bytes: &[u8]) -> Vec<Glyph> {
        Vec::new()
    }

    fn space_width(&self) -> f64 {
        250.0
    }

    fn export(&self) -> FontExportData {
        FontExportData {
            name: "ErrorFont".to_string(),
            subtype: String::new(),
            vertical: false,
            program: None,
            to_unicode: None,
            error: Some(self.reason.clone()),
        }
    }
}
