//! Metrics-only font backend.
//!
//! Maps character codes through ToUnicode data, encoding differences and
//! glyph-name heuristics without touching the embedded font program. This
//! backs tests and the CLI tools; a real outline backend plugs in through
//! the same [`FontBackend`] trait.

use super::{FontBackend, FontExportData, FontProperties, FontProgram, Glyph};
use crate::error::Result;
use crate::model::Dict;
use crate::utils::Matrix;
use std::sync::Arc;

/// Backend producing [`SimpleFontProgram`] handles.
pub struct SimpleFontBackend;

impl FontBackend for SimpleFontBackend {
    fn create_font(&self, props: FontProperties) -> Result<Arc<dyn FontProgram>> {
        Ok(Arc::new(SimpleFontProgram::new(props)))
    }
}

/// Glyph mapping built purely from font dictionary metadata.
pub struct SimpleFontProgram {
    props: FontProperties,
    space_width: f64,
}

impl SimpleFontProgram {
    pub fn new(props: FontProperties) -> Self {
        let space_width = props
            .widths
            .get(&32)
            .copied()
            .filter(|w| *w > 0.0)
            .unwrap_or(250.0);
        Self { props, space_width }
    }

    fn width_of(&self, code: u32) -> f64 {
        self.props
            .widths
            .get(&code)
            .copied()
            .unwrap_or(self.props.default_width)
    }

    fn unicode_of(&self, code: u32) -> String {
        if let Some(s) = self.props.to_unicode.get(&code) {
            return s.clone();
        }
        if let Some(name) = self.props.encoding.get(&code)
            && let Some(s) = glyph_name_to_unicode(name)
        {
            return s;
        }
        char::from_u32(code)
            .map(|c| c.to_string())
            .unwrap_or_default()
    }

    fn glyph_for(&self, code: u32, is_space: bool) -> Glyph {
        Glyph {
            unicode: self.unicode_of(code),
            width: self.width_of(code),
            font_char: code,
            is_space,
        }
    }
}

impl FontProgram for SimpleFontProgram {
    fn name(&self) -> &str {
        &self.props.name
    }

    fn is_type3(&self) -> bool {
        self.props.subtype == "Type3"
    }

    fn vertical(&self) -> bool {
        self.props.vertical
    }

    fn char_to_glyphs(&self, bytes: &[u8]) -> Vec<Glyph> {
        if self.props.composite {
            let cmap = self.props.cmap.as_ref();
            bytes
                .chunks(2)
                .map(|pair| {
                    let code = pair
                        .iter()
                        .fold(0u32, |acc, &b| (acc << 8) | b as u32);
                    let cid = cmap.map_or(code, |c| c.lookup(code));
                    // Word spacing never applies to two-byte codes.
                    self.glyph_for(cid, false)
                })
                .collect()
        } else {
            bytes
                .iter()
                .map(|&b| self.glyph_for(b as u32, b == 32))
                .collect()
        }
    }

    fn space_width(&self) -> f64 {
        self.space_width
    }

    fn font_matrix(&self) -> Matrix {
        self.props.font_matrix
    }

    fn char_procs(&self) -> Option<&Dict> {
        self.props.char_procs.as_ref()
    }

    fn export(&self) -> FontExportData {
        FontExportData {
            name: self.props.name.clone(),
            subtype: self.props.subtype.clone(),
            vertical: self.props.vertical,
            program: self.props.program.clone(),
            to_unicode: None,
            error: None,
        }
    }
}

/// Resolve a glyph name to unicode.
///
/// Handles uniXXXX/uXXXXXX forms, single-character names, a small table of
/// common names, and the Cdd/Gdd charcode convention. Some producers write
/// hexadecimal charcodes in a decimal-looking format; when the decimal
/// reading is out of range the name is re-read as hex.
pub fn glyph_name_to_unicode(name: &str) -> Option<String> {
    if let Some(hex) = name.strip_prefix("uni")
        && hex.len() == 4
        && let Ok(code) = u32::from_str_radix(hex, 16)
    {
        return char::from_u32(code).map(|c| c.to_string());
    }
    if let Some(hex) = name.strip_prefix('u')
        && (4..=6).contains(&hex.len())
        && let Ok(code) = u32::from_str_radix(hex, 16)
    {
        return char::from_u32(code).map(|c| c.to_string());
    }

    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return Some(c.to_string());
    }

    if let Some(s) = common_glyph_name(name) {
        return Some(s.to_string());
    }

    // Cdd / Gdd style names carry the charcode directly.
    if let Some(digits) = name
        .strip_prefix('C')
        .or_else(|| name.strip_prefix('G'))
        .or_else(|| name.strip_prefix("cid"))
        .or_else(|| name.strip_prefix('g'))
    {
        if let Ok(code) = digits.parse::<u32>() {
            if code <= 0xffff {
                return char::from_u32(code).map(|c| c.to_string());
            }
            // Out of range as decimal: the digits were hex all along.
            if let Ok(code) = u32::from_str_radix(digits, 16) {
                return char::from_u32(code).map(|c| c.to_string());
            }
        } else if let Ok(code) = u32::from_str_radix(digits, 16) {
            return char::from_u32(code).map(|c| c.to_string());
        }
    }

    None
}

fn common_glyph_name(name: &str) -> Option<&'static str> {
    Some(match name {
        "space" => " ",
        "exclam" => "!",
        "quotedbl" => "\"",
        "numbersign" => "#",
        "dollar" => "$",
        "percent" => "%",
        "ampersand" => "&",
        "quotesingle" => "'",
        "parenleft" => "(",
        "parenright" => ")",
        "asterisk" => "*",
        "plus" => "+",
        "comma" => ",",
        "hyphen" | "minus" => "-",
        "period" => ".",
        "slash" => "/",
        "zero" => "0",
        "one" => "1",
        "two" => "2",
        "three" => "3",
        "four" => "4",
        "five" => "5",
        "six" => "6",
        "seven" => "7",
        "eight" => "8",
        "nine" => "9",
        "colon" => ":",
        "semicolon" => ";",
        "less" => "<",
        "equal" => "=",
        "greater" => ">",
        "question" => "?",
        "at" => "@",
        "bracketleft" => "[",
        "backslash" => "\\",
        "bracketright" => "]",
        "underscore" => "_",
        "braceleft" => "{",
        "bar" => "|",
        "braceright" => "}",
        "quoteleft" => "\u{2018}",
        "quoteright" => "\u{2019}",
        "quotedblleft" => "\u{201c}",
        "quotedblright" => "\u{201d}",
        "endash" => "\u{2013}",
        "emdash" => "\u{2014}",
        "bullet" => "\u{2022}",
        "fi" => "\u{fb01}",
        "fl" => "\u{fb02}",
        _ => return None,
    })
}
