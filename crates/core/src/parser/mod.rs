//! Content stream tokenization.
//!
//! `ContentLexer` turns raw content bytes into primitive tokens;
//! `ContentParser` assembles operands (including nested arrays and
//! dictionaries, and inline images) and hands operator keywords to the
//! preprocessor.

pub mod content;
pub mod lexer;

pub use content::{ContentItem, ContentParser};
pub use lexer::{ContentLexer, Token};

use bytes::{Bytes, BytesMut};

/// One or more content stream segments, evaluated as a single stream.
#[derive(Debug, Clone)]
pub struct ContentStream {
    data: Bytes,
}

impl ContentStream {
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    /// Join multiple content streams. A separator byte keeps tokens from
    /// adjacent segments from running together.
    pub fn from_segments(segments: Vec<Bytes>) -> Self {
        let mut joined = BytesMut::new();
        for seg in segments {
            if !joined.is_empty() {
                joined.extend_from_slice(b"\n");
            }
            joined.extend_from_slice(&seg);
        }
        Self {
            data: joined.freeze(),
        }
    }

    pub fn bytes(&self) -> Bytes {
        self.data.clone()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl From<&[u8]> for ContentStream {
    fn from(data: &[u8]) -> Self {
        Self::from_bytes(data.to_vec())
    }
}

impl From<&str> for ContentStream {
    fn from(data: &str) -> Self {
        Self::from_bytes(data.as_bytes().to_vec())
    }
}
