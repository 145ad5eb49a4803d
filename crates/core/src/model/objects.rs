//! Primitive object types.
//!
//! The evaluator is fed already-decoded values: stream decoding (filters,
//! decryption) happens in the document layer, so `StreamObject` carries
//! plain content bytes next to its dictionary.

use crate::error::{EvalError, Result};
use bytes::Bytes;
use rustc_hash::FxHashMap;

/// Dictionary type: name -> object mapping.
pub type Dict = FxHashMap<String, Object>;

/// The fundamental value type flowing through the evaluator.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    /// Null object
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Real (floating point) value
    Real(f64),
    /// Name object (e.g. /Font, /DeviceRGB)
    Name(String),
    /// String (byte array)
    String(Vec<u8>),
    /// Array of objects
    Array(Vec<Self>),
    /// Dictionary
    Dict(Dict),
    /// Stream (dictionary + decoded data)
    Stream(Box<StreamObject>),
    /// Indirect object reference
    Ref(ObjRef),
}

impl Object {
    /// Check if this is a null object.
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get as boolean.
    pub const fn as_bool(&self) -> Result<bool> {
        match self {
            Self::Bool(b) => Ok(*b),
            _ => Err(self.type_error("bool")),
        }
    }

    /// Get as integer.
    pub const fn as_int(&self) -> Result<i64> {
        match self {
            Self::Int(n) => Ok(*n),
            _ => Err(self.type_error("int")),
        }
    }

    /// Get numeric value (int or real coerced to f64).
    pub const fn as_num(&self) -> Result<f64> {
        match self {
            Self::Int(n) => Ok(*n as f64),
            Self::Real(n) => Ok(*n),
            _ => Err(self.type_error("number")),
        }
    }

    /// Get as name string.
    pub fn as_name(&self) -> Result<&str> {
        match self {
            Self::Name(s) => Ok(s),
            _ => Err(self.type_error("name")),
        }
    }

    /// Get as byte string.
    pub fn as_string(&self) -> Result<&[u8]> {
        match self {
            Self::String(s) => Ok(s),
            _ => Err(self.type_error("string")),
        }
    }

    /// Get as array.
    pub const fn as_array(&self) -> Result<&Vec<Self>> {
        match self {
            Self::Array(arr) => Ok(arr),
            _ => Err(self.type_error("array")),
        }
    }

    /// Get as dictionary. Streams expose their attribute dictionary.
    pub fn as_dict(&self) -> Result<&Dict> {
        match self {
            Self::Dict(d) => Ok(d),
            Self::Stream(s) => Ok(&s.dict),
            _ => Err(self.type_error("dict")),
        }
    }

    /// Get as stream.
    pub fn as_stream(&self) -> Result<&StreamObject> {
        match self {
            Self::Stream(s) => Ok(s),
            _ => Err(self.type_error("stream")),
        }
    }

    /// Get as object reference.
    pub const fn as_obj_ref(&self) -> Result<&ObjRef> {
        match self {
            Self::Ref(r) => Ok(r),
            _ => Err(self.type_error("ref")),
        }
    }

    /// Consume into a dictionary.
    pub fn into_dict(self) -> Result<Dict> {
        match self {
            Self::Dict(d) => Ok(d),
            Self::Stream(s) => Ok(s.dict),
            other => Err(other.type_error("dict")),
        }
    }

    /// The reference identity of this object, if it is one.
    pub const fn ref_identity(&self) -> Option<ObjRef> {
        match self {
            Self::Ref(r) => Some(*r),
            _ => None,
        }
    }

    const fn type_error(&self, expected: &'static str) -> EvalError {
        EvalError::TypeError {
            expected,
            got: self.type_name(),
        }
    }

    /// Type name for error messages.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Real(_) => "real",
            Self::Name(_) => "name",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Dict(_) => "dict",
            Self::Stream(_) => "stream",
            Self::Ref(_) => "ref",
        }
    }
}

/// Indirect object reference, the stable identity used by caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjRef {
    /// Object number
    pub id: u32,
    /// Generation number
    pub r#gen: u16,
}

impl ObjRef {
    /// Create a new object reference.
    pub const fn new(id: u32, r#gen: u16) -> Self {
        Self { id, r#gen }
    }

    /// Stable string form, used for cache and dependency identifiers.
    pub fn key(&self) -> String {
        format!("{}R{}", self.id, self.r#gen)
    }
}

/// Stream object: attribute dictionary plus decoded content data.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamObject {
    /// Stream dictionary attributes
    pub dict: Dict,
    /// Decoded data
    data: Bytes,
    /// Reference identity, when the stream came from the object store
    pub obj_ref: Option<ObjRef>,
}

impl StreamObject {
    /// Create a new stream.
    pub fn new(dict: Dict, data: impl Into<Bytes>) -> Self {
        Self {
            dict,
            data: data.into(),
            obj_ref: None,
        }
    }

    /// Create a new stream carrying its reference identity.
    pub fn with_ref(dict: Dict, data: impl Into<Bytes>, obj_ref: ObjRef) -> Self {
        Self {
            dict,
            data: data.into(),
            obj_ref: Some(obj_ref),
        }
    }

    /// Decoded content bytes.
    pub fn data(&self) -> Bytes {
        self.data.clone()
    }

    /// Get attribute by name.
    pub fn get(&self, name: &str) -> Option<&Object> {
        self.dict.get(name)
    }

    /// Get attribute, trying multiple names (full and abbreviated forms).
    pub fn get_any(&self, names: &[&str]) -> Option<&Object> {
        names.iter().find_map(|name| self.dict.get(*name))
    }
}

/// Build a dictionary from key/value pairs; convenient in tests.
pub fn dict_from<I>(entries: I) -> Dict
where
    I: IntoIterator<Item = (&'static str, Object)>,
{
    entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}
