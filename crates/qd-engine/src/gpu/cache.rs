use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::kernel::Kernel;

/// (entry point, rendered build options)
pub(crate) type KernelKey = (String, String);

/// Compiled kernels keyed by entry point and build options.
#[derive(Debug, Default)]
pub(crate) struct KernelCache {
    entries: Mutex<HashMap<KernelKey, Arc<Kernel>>>,
}

impl KernelCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns the cached kernel for `key`, building it on a miss. The
    /// boolean is true on a hit. `build` runs outside the lock; if two
    /// callers race, the first insertion wins and both get it.
    pub(crate) fn get_or_try_insert_with<E, F>(
        &self,
        key: KernelKey,
        build: F,
    ) -> Result<(Arc<Kernel>, bool), E>
    where
        F: FnOnce() -> Result<Kernel, E>,
    {
        if let Some(existing) = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned()
        {
            return Ok((existing, true));
        }

        let built = Arc::new(build()?);
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.entry(key) {
            Entry::Occupied(entry) => Ok((Arc::clone(entry.get()), true)),
            Entry::Vacant(entry) => {
                entry.insert(Arc::clone(&built));
                Ok((built, false))
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(options: &str) -> KernelKey {
        ("wei_reorder".to_string(), options.to_string())
    }

    #[test]
    fn test_hit_after_miss() {
        let cache = KernelCache::new();
        let (first, hit) = cache
            .get_or_try_insert_with::<(), _>(key("-DA=1"), || {
                Ok(Kernel::new(1, "wei_reorder", "-DA=1".into()))
            })
            .unwrap();
        assert!(!hit);

        let (second, hit) = cache
            .get_or_try_insert_with::<(), _>(key("-DA=1"), || panic!("must not rebuild"))
            .unwrap();
        assert!(hit);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_failed_build_not_cached() {
        let cache = KernelCache::new();
        let result = cache.get_or_try_insert_with(key("-DA=2"), || Err("no"));
        assert_eq!(result.unwrap_err(), "no");
        assert_eq!(cache.len(), 0);
    }
}
