//! Resource caches.
//!
//! Local caches are scoped to one evaluation call and never shared, so
//! they need no synchronization. The global image cache is document-scoped
//! and append-mostly: entries are created once, later writes only add page
//! usage records or finalize a provisional byte size. Whichever resolution
//! completes first wins a first-use race; later completions only update
//! bookkeeping.

use crate::model::ObjRef;
use crate::oplist::OpArgs;
use crate::ops::OpCode;
use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

/// Call-scoped memo of resolved resources, keyed by resource name and,
/// where available, by the resource's object identity.
#[derive(Debug)]
pub struct LocalCache<T: Clone> {
    by_name: FxHashMap<String, T>,
    by_ref: FxHashMap<ObjRef, T>,
}

impl<T: Clone> LocalCache<T> {
    pub fn new() -> Self {
        Self {
            by_name: FxHashMap::default(),
            by_ref: FxHashMap::default(),
        }
    }

    pub fn get_by_name(&self, name: &str) -> Option<&T> {
        self.by_name.get(name)
    }

    pub fn get_by_ref(&self, obj_ref: &ObjRef) -> Option<&T> {
        self.by_ref.get(obj_ref)
    }

    pub fn set(&mut self, name: Option<&str>, obj_ref: Option<ObjRef>, value: T) {
        if let Some(obj_ref) = obj_ref {
            self.by_ref.insert(obj_ref, value.clone());
        }
        if let Some(name) = name {
            self.by_name.insert(name.to_string(), value);
        }
    }
}

impl<T: Clone> Default for LocalCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A cached image paint: the operator and arguments to replay.
pub type ImageCacheEntry = (OpCode, OpArgs);

/// An image promoted to cross-page sharing.
#[derive(Debug, Clone)]
pub struct GlobalImageData {
    pub object_id: String,
    pub op: OpCode,
    pub args: OpArgs,
    pub byte_size: u64,
}

#[derive(Debug, Default)]
struct GlobalImageEntry {
    pages: FxHashSet<usize>,
    data: Option<GlobalImageData>,
}

/// Images seen on this many pages become candidates for cross-page
/// caching.
pub const NUM_PAGES_THRESHOLD: usize = 2;
/// Decoded images above this byte size are never cached across pages.
pub const MAX_IMAGE_SIZE_TO_CACHE: u64 = 10_000_000;

/// Document-scoped image cache. Entries are never removed during a
/// rendering session.
pub struct GlobalImageCache {
    entries: RwLock<FxHashMap<ObjRef, GlobalImageEntry>>,
}

impl GlobalImageCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(FxHashMap::default()),
        }
    }

    /// Record that `page_index` uses the image and report whether the
    /// reuse heuristic approves caching its decoded form.
    pub fn should_cache(&self, obj_ref: ObjRef, page_index: usize) -> bool {
        let mut entries = self.entries.write();
        let entry = entries.entry(obj_ref).or_default();
        entry.pages.insert(page_index);
        if entry.pages.len() < NUM_PAGES_THRESHOLD {
            return false;
        }
        match &entry.data {
            Some(data) => data.byte_size <= MAX_IMAGE_SIZE_TO_CACHE,
            None => true,
        }
    }

    /// Store the decoded form. Idempotent: the first completed resolution
    /// wins, later calls only refresh a provisional byte size.
    pub fn set_data(&self, obj_ref: ObjRef, data: GlobalImageData) {
        if data.byte_size > MAX_IMAGE_SIZE_TO_CACHE {
            debug!(
                "image {} too large for the global cache ({} bytes)",
                data.object_id, data.byte_size
            );
            return;
        }
        let mut entries = self.entries.write();
        let entry = entries.entry(obj_ref).or_default();
        match &mut entry.data {
            Some(existing) => {
                if existing.byte_size == 0 {
                    existing.byte_size = data.byte_size;
                }
            }
            slot @ None => *slot = Some(data),
        }
    }

    /// Fetch the cached paint for a page, recording the page usage.
    pub fn get(&self, obj_ref: &ObjRef, page_index: usize) -> Option<GlobalImageData> {
        let mut entries = self.entries.write();
        let entry = entries.get_mut(obj_ref)?;
        let data = entry.data.clone()?;
        entry.pages.insert(page_index);
        Some(data)
    }

    /// Finalize a provisional byte size once decoding has measured it.
    pub fn set_byte_size(&self, obj_ref: &ObjRef, byte_size: u64) {
        let mut entries = self.entries.write();
        if let Some(entry) = entries.get_mut(obj_ref)
            && let Some(data) = &mut entry.data
            && data.byte_size == 0
        {
            data.byte_size = byte_size;
        }
    }
}

impl Default for GlobalImageCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    fn sample_data(id: &str, byte_size: u64) -> GlobalImageData {
        GlobalImageData {
            object_id: id.to_string(),
            op: OpCode::PaintImageXObject,
            args: OpArgs::Numbers(smallvec![]),
            byte_size,
        }
    }

    #[test]
    fn test_promotion_needs_two_pages() {
        let cache = GlobalImageCache::new();
        let r = ObjRef::new(5, 0);
        assert!(!cache.should_cache(r, 0));
        assert!(!cache.should_cache(r, 0));
        assert!(cache.should_cache(r, 1));
    }

    #[test]
    fn test_oversized_images_not_cached() {
        let cache = GlobalImageCache::new();
        let r = ObjRef::new(5, 0);
        cache.set_data(r, sample_data("img_1", MAX_IMAGE_SIZE_TO_CACHE + 1));
        assert!(cache.get(&r, 0).is_none());
    }

    #[test]
    fn test_first_resolution_wins() {
        let cache = GlobalImageCache::new();
        let r = ObjRef::new(5, 0);
        cache.set_data(r, sample_data("img_1", 100));
        cache.set_data(r, sample_data("img_2", 200));
        assert_eq!(cache.get(&r, 0).unwrap().object_id, "img_1");
    }

    #[test]
    fn test_provisional_byte_size_finalized_once() {
        let cache = GlobalImageCache::new();
        let r = ObjRef::new(5, 0);
        cache.set_data(r, sample_data("img_1", 0));
        cache.set_byte_size(&r, 4096);
        cache.set_byte_size(&r, 9999);
        assert_eq!(cache.get(&r, 0).unwrap().byte_size, 4096);
    }
}
