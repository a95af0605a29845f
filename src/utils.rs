//! Small helpers shared by the lazily realized wrappers.

use std::{hash::Hash, sync::OnceLock};

use dashmap::DashMap;

use crate::Result;

/// Realize a fallible value at most once.
///
/// Concurrent first callers may each run `init`; the first result to be published wins and every
/// caller observes it. A failed `init` publishes nothing, so the next call tries again.
pub(crate) fn get_or_try_init<T, F>(cell: &OnceLock<T>, init: F) -> Result<&T>
where
    F: FnOnce() -> Result<T>,
{
    if let Some(value) = cell.get() {
        return Ok(value);
    }

    let value = init()?;
    Ok(cell.get_or_init(|| value))
}

/// Fetch `key` from `cache`, building and publishing it on a miss.
///
/// `init` runs without any shard lock held, it may recurse into the same cache.
pub(crate) fn cached<K, V, F>(cache: &DashMap<K, V>, key: K, init: F) -> Result<V>
where
    K: Eq + Hash,
    V: Clone,
    F: FnOnce() -> Result<V>,
{
    if let Some(value) = cache.get(&key) {
        return Ok(value.clone());
    }

    let value = init()?;
    Ok(cache.entry(key).or_insert(value).clone())
}
