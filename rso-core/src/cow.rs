//! Copy-on-write collections
//!
//! Readers take an immutable snapshot and iterate it without holding any
//! lock; writers build a new vector and swap it in atomically. A snapshot
//! taken before a write keeps seeing the old contents, which is what lets a
//! broadcast walk the listener set while other threads join or leave.

use arc_swap::ArcSwap;
use std::fmt;
use std::sync::Arc;

/// A copy-on-write vector
pub struct CowVec<T> {
    items: ArcSwap<Vec<T>>,
}

impl<T: Clone> CowVec<T> {
    /// Create an empty vector
    pub fn new() -> Self {
        Self {
            items: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// Current contents; stable for as long as the caller holds it
    pub fn snapshot(&self) -> Arc<Vec<T>> {
        self.items.load_full()
    }

    /// Append an item unless `is_dup` matches an existing one
    ///
    /// Returns true if the item was added.
    pub fn push_unless(&self, item: T, is_dup: impl Fn(&T) -> bool) -> bool {
        let prev = self.items.rcu(|cur| {
            if cur.iter().any(&is_dup) {
                Arc::clone(cur)
            } else {
                let mut next = Vec::with_capacity(cur.len() + 1);
                next.extend(cur.iter().cloned());
                next.push(item.clone());
                Arc::new(next)
            }
        });
        !prev.iter().any(is_dup)
    }

    /// Append an item unconditionally
    pub fn push(&self, item: T) {
        self.push_unless(item, |_| false);
    }

    /// Remove every item matching `pred`; returns true if anything went
    pub fn remove_where(&self, pred: impl Fn(&T) -> bool) -> bool {
        let prev = self.items.rcu(|cur| {
            if cur.iter().any(&pred) {
                Arc::new(cur.iter().filter(|item| !pred(*item)).cloned().collect())
            } else {
                Arc::clone(cur)
            }
        });
        prev.iter().any(pred)
    }

    /// Drop all items
    pub fn clear(&self) {
        self.items.store(Arc::new(Vec::new()));
    }

    pub fn len(&self) -> usize {
        self.items.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.load().is_empty()
    }
}

impl<T: Clone> Default for CowVec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for CowVec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.items.load().iter()).finish()
    }
}
