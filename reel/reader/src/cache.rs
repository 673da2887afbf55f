/*!
    Process-wide cache of open sources.

    A host instance that references the same file from several logical
    readers should reuse one open handle instead of re-opening the
    container each time. The cache maps an opaque owner token to the
    sources that owner has opened, keyed by filename. An entry found in
    the permanent invalid state is discarded lazily at the next lookup
    and — for `get_or_create` — transparently replaced with a fresh one.
*/

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use reel_types::{Error, Result};

use crate::source::VideoSource;

/**
    Opaque identity of the caller that owns a set of open sources.

    Typically derived from a plugin-instance pointer or similar unique
    per-instance value; the cache never interprets it.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OwnerId(pub u64);

/**
    The subset of source behavior the cache relies on.
*/
pub trait SourceHandle {
    /// The filename this source was opened from.
    fn filename(&self) -> &str;
    /// True when the source can never produce a frame again.
    fn is_invalid(&self) -> bool;
}

impl SourceHandle for VideoSource {
    fn filename(&self) -> &str {
        VideoSource::filename(self)
    }

    fn is_invalid(&self) -> bool {
        VideoSource::is_invalid(self)
    }
}

/**
    Map from owner token to that owner's open sources.

    All operations serialize on one lock, and the lock is held across
    the whole "look up, discard if invalid, create replacement" sequence
    so no caller can observe a half-invalidated entry.
*/
pub struct SourceCache<S = VideoSource> {
    entries: Mutex<HashMap<OwnerId, Vec<Arc<Mutex<S>>>>>,
}

impl<S: SourceHandle> SourceCache<S> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /**
        Look up an already-open source for `(owner, filename)`.

        A cached source found invalid is dropped here; the caller gets
        `None` and may decide to open a replacement.
    */
    pub fn get(&self, owner: OwnerId, filename: &str) -> Option<Arc<Mutex<S>>> {
        if filename.is_empty() {
            return None;
        }
        let mut entries = self.entries.lock();
        let sources = entries.get_mut(&owner)?;
        let position = sources
            .iter()
            .position(|source| source.lock().filename() == filename)?;
        if sources[position].lock().is_invalid() {
            sources.remove(position);
            return None;
        }
        Some(Arc::clone(&sources[position]))
    }

    /**
        Return the open source for `(owner, filename)`, opening one with
        `open` if none is cached or the cached one has gone invalid.
    */
    pub fn get_or_create_with<F>(
        &self,
        owner: OwnerId,
        filename: &str,
        open: F,
    ) -> Result<Arc<Mutex<S>>>
    where
        F: FnOnce(&str) -> Result<S>,
    {
        if filename.is_empty() {
            return Err(Error::invalid_data("empty filename"));
        }
        let mut entries = self.entries.lock();
        let sources = entries.entry(owner).or_default();
        if let Some(position) = sources
            .iter()
            .position(|source| source.lock().filename() == filename)
        {
            if !sources[position].lock().is_invalid() {
                return Ok(Arc::clone(&sources[position]));
            }
            sources.remove(position);
        }
        let source = Arc::new(Mutex::new(open(filename)?));
        sources.push(Arc::clone(&source));
        Ok(source)
    }

    /**
        Drop every source the owner holds.
    */
    pub fn clear(&self, owner: OwnerId) {
        self.entries.lock().remove(&owner);
    }
}

impl SourceCache<VideoSource> {
    /**
        Return the open source for `(owner, filename)`, opening the file
        if needed.
    */
    pub fn get_or_create(&self, owner: OwnerId, filename: &str) -> Result<Arc<Mutex<VideoSource>>> {
        self.get_or_create_with(owner, filename, |f| VideoSource::open(f))
    }
}

impl<S: SourceHandle> Default for SourceCache<S> {
    fn default() -> Self {
        Self::new()
    }
}

static_assertions::assert_impl_all!(SourceCache<VideoSource>: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;

    struct TestSource {
        name: String,
        invalid: bool,
    }

    impl SourceHandle for TestSource {
        fn filename(&self) -> &str {
            &self.name
        }

        fn is_invalid(&self) -> bool {
            self.invalid
        }
    }

    fn open_test(name: &str) -> Result<TestSource> {
        Ok(TestSource {
            name: name.to_owned(),
            invalid: false,
        })
    }

    #[test]
    fn same_owner_same_file_shares_the_instance() {
        let cache: SourceCache<TestSource> = SourceCache::new();
        let owner = OwnerId(1);
        let a = cache.get_or_create_with(owner, "a.mov", open_test).unwrap();
        let b = cache.get_or_create_with(owner, "a.mov", open_test).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn different_owners_get_distinct_instances() {
        let cache: SourceCache<TestSource> = SourceCache::new();
        let a = cache
            .get_or_create_with(OwnerId(1), "a.mov", open_test)
            .unwrap();
        let b = cache
            .get_or_create_with(OwnerId(2), "a.mov", open_test)
            .unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn invalid_entry_is_replaced_on_next_lookup() {
        let cache: SourceCache<TestSource> = SourceCache::new();
        let owner = OwnerId(1);
        let first = cache.get_or_create_with(owner, "a.mov", open_test).unwrap();
        first.lock().invalid = true;
        let second = cache.get_or_create_with(owner, "a.mov", open_test).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(!second.lock().is_invalid());
    }

    #[test]
    fn get_drops_invalid_entries() {
        let cache: SourceCache<TestSource> = SourceCache::new();
        let owner = OwnerId(1);
        let source = cache.get_or_create_with(owner, "a.mov", open_test).unwrap();
        assert!(cache.get(owner, "a.mov").is_some());
        source.lock().invalid = true;
        assert!(cache.get(owner, "a.mov").is_none());
        // The entry is gone, not merely hidden.
        assert!(cache.get(owner, "a.mov").is_none());
    }

    #[test]
    fn get_misses_unknown_keys() {
        let cache: SourceCache<TestSource> = SourceCache::new();
        assert!(cache.get(OwnerId(9), "a.mov").is_none());
        assert!(cache.get(OwnerId(9), "").is_none());
    }

    #[test]
    fn clear_is_owner_scoped() {
        let cache: SourceCache<TestSource> = SourceCache::new();
        cache
            .get_or_create_with(OwnerId(1), "a.mov", open_test)
            .unwrap();
        cache
            .get_or_create_with(OwnerId(2), "a.mov", open_test)
            .unwrap();
        cache.clear(OwnerId(1));
        assert!(cache.get(OwnerId(1), "a.mov").is_none());
        assert!(cache.get(OwnerId(2), "a.mov").is_some());
    }

    #[test]
    fn empty_filename_is_rejected() {
        let cache: SourceCache<TestSource> = SourceCache::new();
        assert!(
            cache
                .get_or_create_with(OwnerId(1), "", open_test)
                .is_err()
        );
    }

    #[test]
    fn distinct_files_coexist_per_owner() {
        let cache: SourceCache<TestSource> = SourceCache::new();
        let owner = OwnerId(1);
        let a = cache.get_or_create_with(owner, "a.mov", open_test).unwrap();
        let b = cache.get_or_create_with(owner, "b.mov", open_test).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(a.lock().filename(), "a.mov");
        assert_eq!(b.lock().filename(), "b.mov");
    }
}
