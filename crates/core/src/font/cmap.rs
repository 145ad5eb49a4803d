//! Character code maps.
//!
//! Identity CMaps are handled directly; named built-in CMaps are fetched
//! through the message channel (their compressed binary format is parsed
//! host-side). ToUnicode CMap streams use the textual bfchar/bfrange
//! syntax and are parsed here.

use crate::error::Result;
use crate::model::Object;
use crate::parser::lexer::{ContentLexer, Token};
use crate::transport::{MessageChannel, Request};
use bytes::Bytes;
use rustc_hash::FxHashMap;
use tracing::warn;

/// A character-code-to-CID mapping.
#[derive(Debug, Clone)]
pub struct CMap {
    pub name: String,
    pub vertical: bool,
    /// None means the identity mapping
    map: Option<FxHashMap<u32, u32>>,
}

impl CMap {
    /// The two-byte identity mapping.
    pub fn identity(name: &str, vertical: bool) -> Self {
        Self {
            name: name.to_string(),
            vertical,
            map: None,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.map.is_none()
    }

    pub fn lookup(&self, code: u32) -> u32 {
        match &self.map {
            Some(map) => map.get(&code).copied().unwrap_or(0),
            None => code,
        }
    }
}

fn is_identity_name(name: &str) -> bool {
    matches!(name, "Identity-H" | "Identity-V" | "DLIdent-H" | "DLIdent-V")
}

/// Resolve a composite font encoding to a CMap.
///
/// Identity encodings resolve locally. Anything else asks the host for the
/// built-in table; when none is available the mapping degrades to identity
/// with a warning, keeping the verticality implied by the name.
pub async fn load_cmap(name: &str, channel: &dyn MessageChannel) -> Result<CMap> {
    let vertical = name.ends_with("-V") || name.ends_with("V");
    if is_identity_name(name) {
        return Ok(CMap::identity(name, vertical));
    }

    match channel
        .send_with_promise(Request::BuiltInCMap {
            name: name.to_string(),
        })
        .await
    {
        Ok(Object::Dict(dict)) => {
            let vertical = dict
                .get("Vertical")
                .and_then(|v| v.as_bool().ok())
                .unwrap_or(vertical);
            Ok(CMap::identity(name, vertical))
        }
        Ok(_) | Err(_) => {
            warn!("built-in CMap {name} unavailable, falling back to identity");
            Ok(CMap::identity(name, vertical))
        }
    }
}

fn bytes_to_code(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32)
}

fn bytes_to_unicode(bytes: &[u8]) -> String {
    // UTF-16BE code units.
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| u16::from_be_bytes([c[0], c[1]]))
        .collect();
    if units.is_empty() && bytes.len() == 1 {
        return (bytes[0] as char).to_string();
    }
    String::from_utf16_lossy(&units)
}

/// Parse a ToUnicode CMap stream into a code-to-unicode table.
///
/// Only the bfchar/bfrange sections matter here; codespace declarations
/// and the surrounding PostScript scaffolding are skipped.
pub fn parse_to_unicode(data: &[u8]) -> FxHashMap<u32, String> {
    let mut map = FxHashMap::default();
    let mut lexer = ContentLexer::new(Bytes::from(data.to_vec()));
    let mut pending: Vec<Token> = Vec::new();

    while let Some(token) = lexer.next_token() {
        let token = match token {
            Ok(t) => t,
            Err(_) => continue,
        };
        match &token {
            Token::Keyword(kw) if kw == b"endbfchar" => {
                for pair in pending.chunks_exact(2) {
                    if let (Token::Str(src), Token::Str(dst)) = (&pair[0], &pair[1]) {
                        map.insert(bytes_to_code(src), bytes_to_unicode(dst));
                    }
                }
                pending.clear();
            }
            Token::Keyword(kw) if kw == b"endbfrange" => {
                let mut iter = std::mem::take(&mut pending).into_iter();
                while let (Some(lo), Some(hi), Some(dst)) =
                    (iter.next(), iter.next(), iter.next())
                {
                    let (Token::Str(lo), Token::Str(hi)) = (&lo, &hi) else {
                        continue;
                    };
                    let (lo, hi) = (bytes_to_code(lo), bytes_to_code(hi));
                    if hi < lo || hi - lo > 0xffff {
                        continue;
                    }
                    match dst {
                        Token::Str(base) => {
                            // Consecutive targets increment the last code
                            // unit of the base string.
                            let base_code = bytes_to_code(&base);
                            for (offset, code) in (lo..=hi).enumerate() {
                                let target = base_code + offset as u32;
                                if let Some(ch) = char::from_u32(target) {
                                    map.insert(code, ch.to_string());
                                }
                            }
                        }
                        Token::ArrayOpen => {
                            // Explicit target list: one string per code.
                            let mut code = lo;
                            for item in iter.by_ref() {
                                match item {
                                    Token::Str(dst) => {
                                        if code <= hi {
                                            map.insert(code, bytes_to_unicode(&dst));
                                            code += 1;
                                        }
                                    }
                                    Token::ArrayClose => break,
                                    _ => {}
                                }
                            }
                        }
                        _ => {}
                    }
                }
            }
            Token::Keyword(kw) if kw == b"beginbfchar" || kw == b"beginbfrange" => {
                pending.clear();
            }
            Token::Keyword(_) => pending.clear(),
            _ => pending.push(token),
        }
    }

    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_lookup() {
        let cmap = CMap::identity("Identity-H", false);
        assert_eq!(cmap.lookup(0x1234), 0x1234);
        assert!(!cmap.vertical);
    }

    #[test]
    fn test_parse_bfchar() {
        let data = b"begincmap 2 beginbfchar <01> <0041> <02> <0062> endbfchar endcmap";
        let map = parse_to_unicode(data);
        assert_eq!(map.get(&1).map(String::as_str), Some("A"));
        assert_eq!(map.get(&2).map(String::as_str), Some("b"));
    }

    #[test]
    fn test_parse_bfrange_incrementing() {
        let data = b"1 beginbfrange <10> <12> <0061> endbfrange";
        let map = parse_to_unicode(data);
        assert_eq!(map.get(&0x10).map(String::as_str), Some("a"));
        assert_eq!(map.get(&0x12).map(String::as_str), Some("c"));
    }

    #[test]
    fn test_parse_bfrange_array() {
        let data = b"1 beginbfrange <05> <06> [<0058> <0059>] endbfrange";
        let map = parse_to_unicode(data);
        assert_eq!(map.get(&5).map(String::as_str), Some("X"));
        assert_eq!(map.get(&6).map(String::as_str), Some("Y"));
    }
}
