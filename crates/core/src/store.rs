//! Document object store interface.
//!
//! The evaluator dereferences every resource dictionary entry through this
//! read-only seam. Implementations may be called concurrently by multiple
//! evaluations.

use crate::error::{EvalError, Result};
use crate::model::{ObjRef, Object};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

/// How many reference hops `fetch_if_ref` follows before declaring a cycle.
const MAX_REF_DEPTH: usize = 32;

/// Read-only access to a document's indirect objects.
pub trait ObjectStore: Send + Sync {
    /// Resolve one indirect reference.
    fn fetch(&self, obj_ref: &ObjRef) -> Result<Object>;

    /// Resolve a value that may be a reference, following chains of
    /// references up to a fixed depth.
    fn fetch_if_ref(&self, obj: &Object) -> Result<Object> {
        let mut current = obj.clone();
        for _ in 0..MAX_REF_DEPTH {
            match current {
                Object::Ref(r) => current = self.fetch(&r)?,
                other => return Ok(other),
            }
        }
        match obj {
            Object::Ref(r) => Err(EvalError::CircularReference(r.id)),
            _ => Ok(current),
        }
    }
}

/// In-memory object store backing tests and the CLI tools.
pub struct MemoryStore {
    objects: RwLock<FxHashMap<u32, Object>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(FxHashMap::default()),
        }
    }

    /// Register an object under the given object number.
    pub fn insert(&self, id: u32, obj: Object) {
        self.objects.write().insert(id, obj);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore for MemoryStore {
    fn fetch(&self, obj_ref: &ObjRef) -> Result<Object> {
        self.objects
            .read()
            .get(&obj_ref.id)
            .cloned()
            .ok_or(EvalError::ObjectNotFound(obj_ref.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_if_ref_follows_chain() {
        let store = MemoryStore::new();
        store.insert(1, Object::Ref(ObjRef::new(2, 0)));
        store.insert(2, Object::Int(7));
        let resolved = store
            .fetch_if_ref(&Object::Ref(ObjRef::new(1, 0)))
            .unwrap();
        assert_eq!(resolved, Object::Int(7));
    }

    #[test]
    fn test_cyclic_reference_fails() {
        let store = MemoryStore::new();
        store.insert(1, Object::Ref(ObjRef::new(2, 0)));
        store.insert(2, Object::Ref(ObjRef::new(1, 0)));
        let err = store
            .fetch_if_ref(&Object::Ref(ObjRef::new(1, 0)))
            .unwrap_err();
        assert!(matches!(err, EvalError::CircularReference(_)));
    }

    #[test]
    fn test_plain_value_passes_through() {
        let store = MemoryStore::new();
        assert_eq!(
            store.fetch_if_ref(&Object::Bool(true)).unwrap(),
            Object::Bool(true)
        );
    }
}
