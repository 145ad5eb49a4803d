//! Operand and keyword assembly over the lexer.
//!
//! Collects primitive tokens into `Object` operands, builds nested arrays
//! and dictionaries, and assembles inline images (BI .. ID <data> EI) into
//! stream objects with their abbreviated dictionary keys expanded.

use super::lexer::{ContentLexer, Token};
use crate::error::Result;
use crate::model::{Dict, Object, StreamObject};
use bytes::Bytes;
use tracing::warn;

/// One parsed content stream item.
#[derive(Debug, Clone)]
pub enum ContentItem {
    Operand(Object),
    /// Raw operator keyword bytes
    Operator(Vec<u8>),
    /// Assembled inline image (dictionary + raw data)
    InlineImage(StreamObject),
}

enum Frame {
    Array(Vec<Object>),
    Dict(Vec<Object>),
}

/// Parser producing operands and operator keywords from content bytes.
pub struct ContentParser {
    lexer: ContentLexer,
    stack: Vec<Frame>,
}

impl ContentParser {
    pub fn new(data: Bytes) -> Self {
        Self {
            lexer: ContentLexer::new(data),
            stack: Vec::new(),
        }
    }

    /// Get the next item, or None at end of stream.
    pub fn next_item(&mut self) -> Result<Option<ContentItem>> {
        loop {
            let token = match self.lexer.next_token() {
                Some(Ok(t)) => t,
                Some(Err(err)) => {
                    warn!("skipping bad token: {err}");
                    continue;
                }
                None => return Ok(None),
            };

            match token {
                Token::ArrayOpen => self.stack.push(Frame::Array(Vec::new())),
                Token::ArrayClose => {
                    let items = match self.stack.pop() {
                        Some(Frame::Array(items)) => items,
                        Some(frame) => {
                            // Mismatched close; put the frame back and drop
                            // the token.
                            self.stack.push(frame);
                            warn!("unbalanced array close in content stream");
                            continue;
                        }
                        None => {
                            warn!("unbalanced array close in content stream");
                            continue;
                        }
                    };
                    if let Some(item) = self.emit(Object::Array(items)) {
                        return Ok(Some(item));
                    }
                }
                Token::DictOpen => self.stack.push(Frame::Dict(Vec::new())),
                Token::DictClose => {
                    let items = match self.stack.pop() {
                        Some(Frame::Dict(items)) => items,
                        Some(frame) => {
                            self.stack.push(frame);
                            warn!("unbalanced dict close in content stream");
                            continue;
                        }
                        None => {
                            warn!("unbalanced dict close in content stream");
                            continue;
                        }
                    };
                    if let Some(item) = self.emit(Object::Dict(build_dict(items))) {
                        return Ok(Some(item));
                    }
                }
                Token::Keyword(kw) => {
                    if kw == b"BI" {
                        return Ok(Some(ContentItem::InlineImage(self.parse_inline_image()?)));
                    }
                    if !self.stack.is_empty() {
                        // Operator keywords have no business inside arrays
                        // or dictionaries; drop them.
                        warn!(
                            "ignoring keyword inside composite operand: {}",
                            String::from_utf8_lossy(&kw)
                        );
                        continue;
                    }
                    return Ok(Some(ContentItem::Operator(kw)));
                }
                other => {
                    if let Some(item) = self.emit(token_to_object(other)) {
                        return Ok(Some(item));
                    }
                }
            }
        }
    }

    /// Push a completed value into the enclosing frame, or surface it as an
    /// operand at top level.
    fn emit(&mut self, value: Object) -> Option<ContentItem> {
        match self.stack.last_mut() {
            Some(Frame::Array(items)) | Some(Frame::Dict(items)) => {
                items.push(value);
                None
            }
            None => Some(ContentItem::Operand(value)),
        }
    }

    /// Assemble an inline image: dictionary entries up to ID, then raw data
    /// up to the end marker.
    fn parse_inline_image(&mut self) -> Result<StreamObject> {
        let mut items: Vec<Object> = Vec::new();
        let mut depth: Vec<Frame> = Vec::new();

        loop {
            let token = match self.lexer.next_token() {
                Some(Ok(t)) => t,
                Some(Err(err)) => {
                    warn!("skipping bad token in inline image dictionary: {err}");
                    continue;
                }
                None => break,
            };

            match token {
                Token::Keyword(kw) if kw == b"ID" && depth.is_empty() => break,
                Token::ArrayOpen => depth.push(Frame::Array(Vec::new())),
                Token::ArrayClose => {
                    if let Some(Frame::Array(arr)) = depth.pop() {
                        push_nested(&mut depth, &mut items, Object::Array(arr));
                    }
                }
                Token::DictOpen => depth.push(Frame::Dict(Vec::new())),
                Token::DictClose => {
                    if let Some(Frame::Dict(entries)) = depth.pop() {
                        push_nested(&mut depth, &mut items, Object::Dict(build_dict(entries)));
                    }
                }
                Token::Keyword(kw) => {
                    warn!(
                        "ignoring keyword in inline image dictionary: {}",
                        String::from_utf8_lossy(&kw)
                    );
                }
                other => push_nested(&mut depth, &mut items, token_to_object(other)),
            }
        }

        let dict = expand_inline_keys(build_dict(items));
        let eos = inline_end_marker(&dict);
        let data = self.lexer.read_inline_data(eos);
        Ok(StreamObject::new(dict, data))
    }
}

fn push_nested(depth: &mut [Frame], items: &mut Vec<Object>, value: Object) {
    match depth.last_mut() {
        Some(Frame::Array(arr)) | Some(Frame::Dict(arr)) => arr.push(value),
        None => items.push(value),
    }
}

fn token_to_object(token: Token) -> Object {
    match token {
        Token::Int(n) => Object::Int(n),
        Token::Real(n) => Object::Real(n),
        Token::Bool(b) => Object::Bool(b),
        Token::Null => Object::Null,
        Token::Name(name) => Object::Name(name),
        Token::Str(s) => Object::String(s),
        // Structure tokens are handled by the caller.
        _ => Object::Null,
    }
}

/// Build a dictionary from an alternating name/value sequence.
fn build_dict(items: Vec<Object>) -> Dict {
    let mut dict = Dict::default();
    let mut iter = items.into_iter();
    while let Some(key) = iter.next() {
        if let Object::Name(name) = key
            && let Some(value) = iter.next()
        {
            dict.insert(name, value);
        }
    }
    dict
}

/// Expand the abbreviated inline image dictionary keys to their full
/// XObject spellings.
fn expand_inline_keys(dict: Dict) -> Dict {
    dict.into_iter()
        .map(|(key, value)| {
            let full = match key.as_str() {
                "BPC" => "BitsPerComponent",
                "CS" => "ColorSpace",
                "D" => "Decode",
                "DP" => "DecodeParms",
                "F" => "Filter",
                "H" => "Height",
                "IM" => "ImageMask",
                "I" => "Interpolate",
                "W" => "Width",
                _ => key.as_str(),
            };
            (full.to_string(), value)
        })
        .collect()
}

/// Determine the end-of-data marker for an inline image. ASCII85 data has
/// its own EOD sequence; everything else ends at EI.
fn inline_end_marker(dict: &Dict) -> &'static [u8] {
    let filter = dict.get("Filter");
    let first = match filter {
        Some(Object::Name(name)) => Some(name.as_str()),
        Some(Object::Array(arr)) => arr.first().and_then(|f| f.as_name().ok()),
        _ => None,
    };
    match first {
        Some("A85") | Some("ASCII85Decode") => b"~>",
        _ => b"EI",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(input: &[u8]) -> Vec<ContentItem> {
        let mut parser = ContentParser::new(Bytes::from(input.to_vec()));
        let mut out = Vec::new();
        while let Some(item) = parser.next_item().unwrap() {
            out.push(item);
        }
        out
    }

    #[test]
    fn test_operands_then_operator() {
        let parsed = items(b"1 0 0 1 10 10 cm");
        assert_eq!(parsed.len(), 7);
        match &parsed[6] {
            ContentItem::Operator(kw) => assert_eq!(kw, b"cm"),
            other => panic!("expected operator, got {other:?}"),
        }
    }

    #[test]
    fn test_nested_array() {
        let parsed = items(b"[(a) -50 (b)] TJ");
        match &parsed[0] {
            ContentItem::Operand(Object::Array(arr)) => {
                assert_eq!(arr.len(), 3);
                assert_eq!(arr[1], Object::Int(-50));
            }
            other => panic!("expected array operand, got {other:?}"),
        }
    }

    #[test]
    fn test_dict_operand() {
        let parsed = items(b"/Span <</ActualText (x)>> BDC");
        match &parsed[1] {
            ContentItem::Operand(Object::Dict(d)) => {
                assert_eq!(d.get("ActualText"), Some(&Object::String(b"x".to_vec())));
            }
            other => panic!("expected dict operand, got {other:?}"),
        }
    }

    #[test]
    fn test_inline_image() {
        let parsed = items(b"BI /W 2 /H 1 /BPC 8 /CS /G ID \x10\x20 EI Q");
        match &parsed[0] {
            ContentItem::InlineImage(stream) => {
                assert_eq!(stream.get("Width"), Some(&Object::Int(2)));
                assert_eq!(stream.get("Height"), Some(&Object::Int(1)));
                assert_eq!(stream.get("BitsPerComponent"), Some(&Object::Int(8)));
                assert_eq!(stream.data().as_ref(), &[0x10, 0x20]);
            }
            other => panic!("expected inline image, got {other:?}"),
        }
        match &parsed[1] {
            ContentItem::Operator(kw) => assert_eq!(kw, b"Q"),
            other => panic!("expected Q, got {other:?}"),
        }
    }
}
