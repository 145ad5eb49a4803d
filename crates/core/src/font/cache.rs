//! Per-document font cache with single-flight resolution.
//!
//! A font is keyed by its indirect reference or, for malformed documents
//! that pass a bare dictionary, by a synthesized per-document key. All
//! concurrent requesters of the same key observe the same in-flight
//! resolution; a second key whose defining attributes hash equal to an
//! earlier font is aliased to the existing entry.

use super::translate::TranslatedFont;
use crate::model::ObjRef;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Lookup key for a font definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FontKey {
    Ref(ObjRef),
    /// Synthesized key for dictionary-typed font objects. Kept as
    /// documented behavior: real-world corpora depend on it.
    Synthetic(String),
}

/// A resolution that all requesters await together. It never fails: a
/// failed translation resolves to an error-font entry.
pub type SharedTranslation = Shared<BoxFuture<'static, Arc<TranslatedFont>>>;

/// Document-scoped font cache.
pub struct FontCache {
    inflight: Mutex<FxHashMap<FontKey, SharedTranslation>>,
    /// Font attribute hash -> the key first seen with that hash
    aliases: Mutex<FxHashMap<String, FontKey>>,
    next_font_id: AtomicUsize,
    next_synthetic_id: AtomicUsize,
}

impl FontCache {
    pub fn new() -> Self {
        Self {
            inflight: Mutex::new(FxHashMap::default()),
            aliases: Mutex::new(FxHashMap::default()),
            next_font_id: AtomicUsize::new(1),
            next_synthetic_id: AtomicUsize::new(1),
        }
    }

    /// A fresh key for a dictionary-typed font object. Uniqueness is the
    /// point: such fonts deduplicate only through the attribute hash.
    pub fn next_synthetic_key(&self) -> String {
        let id = self.next_synthetic_id.fetch_add(1, Ordering::Relaxed);
        format!("font_dict_{id}")
    }

    /// Allocate a stable output identifier (g_font_N).
    pub fn next_loaded_name(&self) -> String {
        let id = self.next_font_id.fetch_add(1, Ordering::Relaxed);
        format!("g_font_{id}")
    }

    pub fn lookup(&self, key: &FontKey) -> Option<SharedTranslation> {
        self.inflight.lock().get(key).cloned()
    }

    /// Register `key` as an alias of the key first seen with `hash`.
    /// Returns the canonical resolution when one already exists.
    pub fn alias_by_hash(&self, hash: &str, key: &FontKey) -> Option<SharedTranslation> {
        let canonical = {
            let mut aliases = self.aliases.lock();
            match aliases.get(hash) {
                Some(existing) => existing.clone(),
                None => {
                    aliases.insert(hash.to_string(), key.clone());
                    return None;
                }
            }
        };
        let mut inflight = self.inflight.lock();
        let translation = inflight.get(&canonical).cloned()?;
        inflight.insert(key.clone(), translation.clone());
        Some(translation)
    }

    /// Fetch the resolution for `key`, creating it with `make` under the
    /// cache lock so concurrent first uses share one translation.
    pub fn get_or_create(
        &self,
        key: FontKey,
        make: impl FnOnce() -> SharedTranslation,
    ) -> SharedTranslation {
        let mut inflight = self.inflight.lock();
        inflight.entry(key).or_insert_with(make).clone()
    }
}

impl Default for FontCache {
    fn default() -> Self {
        Self::new()
    }
}
