use std::collections::HashSet;
use std::sync::Arc;

use allocative::Allocative;

/// Session-wide string interner.
///
/// Every distinct string is stored once; columns hold cheap [Arc] handles to the pooled copy,
/// so equal strings across tables share one allocation.
#[derive(Debug, Default, Allocative)]
pub struct StringPool {
    strings: HashSet<Arc<str>>,
}

impl StringPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the pooled copy of `s`, inserting it on first use.
    pub fn intern(&mut self, s: &str) -> Arc<str> {
        if let Some(existing) = self.strings.get(s) {
            return Arc::clone(existing);
        }
        let interned: Arc<str> = Arc::from(s);
        self.strings.insert(Arc::clone(&interned));
        interned
    }

    /// Returns the pooled copy of `s` without inserting it.
    pub fn get(&self, s: &str) -> Option<Arc<str>> {
        self.strings.get(s).cloned()
    }

    /// Number of distinct strings in the pool.
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}
