//! Build-wide cache of top-level name manglings.
//!
//! Every artifact of a build shares one cache, so a top-level name such as
//! `renderChart` receives the same short name in every script, and two
//! different names never receive the same one.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

/// First character of a generated name.
const FIRST: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ$_";

/// Remaining characters of a generated name.
const REST: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ$_0123456789";

/// Short names that can never be bindings.
const RESERVED: &[&str] = &[
    "do", "if", "in", "for", "let", "new", "try", "var", "case", "else", "enum", "eval", "null",
    "this", "true", "void", "with", "NaN",
];

/// Shared name cache. Clones refer to the same underlying cache.
#[derive(Debug, Clone, Default)]
pub struct NameCache {
    inner: Arc<Mutex<CacheState>>,
}

#[derive(Debug, Default)]
struct CacheState {
    /// Original name -> mangled name
    names: HashMap<String, String>,

    /// Every mangled name handed out so far
    assigned: HashSet<String>,

    /// Index of the next candidate name
    next: usize,
}

impl NameCache {
    /// Create a new empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the mangled name for a top-level binding.
    ///
    /// `taken` holds every name already present in the script being minified.
    /// Returns `None` when the cached name would clash with one of them; the
    /// binding then keeps its original name in that script.
    pub fn resolve(&self, original: &str, taken: &HashSet<String>) -> Option<String> {
        let mut state = self.lock();

        if let Some(mangled) = state.names.get(original) {
            if mangled == original || !taken.contains(mangled) {
                return Some(mangled.clone());
            }
            tracing::debug!(
                "Cached name '{}' for '{}' is taken in this script, keeping original",
                mangled,
                original
            );
            return None;
        }

        let mangled = loop {
            let candidate = short_name(state.next);
            state.next += 1;

            if taken.contains(&candidate)
                || state.assigned.contains(&candidate)
                || RESERVED.contains(&candidate.as_str())
            {
                continue;
            }
            break candidate;
        };

        state.assigned.insert(mangled.clone());
        state.names.insert(original.to_string(), mangled.clone());
        Some(mangled)
    }

    /// Look up the mangled name recorded for `original`.
    pub fn get(&self, original: &str) -> Option<String> {
        self.lock().names.get(original).cloned()
    }

    /// Number of cached names.
    pub fn len(&self) -> usize {
        self.lock().names.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    fn same_cache(&self, other: &NameCache) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Generate the `n`th short identifier: `a`, `b`, ..., `_`, `aa`, `ba`, ...
fn short_name(mut n: usize) -> String {
    let mut name = String::new();
    name.push(FIRST[n % FIRST.len()] as char);
    n /= FIRST.len();

    while n > 0 {
        n -= 1;
        name.push(REST[n % REST.len()] as char);
        n /= REST.len();
    }

    name
}
