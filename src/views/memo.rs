//! Version-keyed memoization

use parking_lot::Mutex;

use crate::store::{StateSnapshot, TableSet};

/// Cached value of one derived view
#[derive(Debug)]
pub(super) struct Memo<T> {
    deps: TableSet,
    slot: Mutex<Option<([u64; 4], T)>>,
}

impl<T: Clone> Memo<T> {
    pub(super) const fn new(deps: TableSet) -> Self {
        Self {
            deps,
            slot: Mutex::new(None),
        }
    }

    /// Return the cached value if none of `deps` changed, else recompute
    pub(super) fn get_or_compute(
        &self,
        snapshot: &StateSnapshot,
        compute: impl FnOnce(&StateSnapshot) -> T,
    ) -> T {
        let key = snapshot.versions.key(self.deps);
        let mut slot = self.slot.lock();
        if let Some((cached_key, value)) = slot.as_ref()
            && *cached_key == key
        {
            return value.clone();
        }
        let value = compute(snapshot);
        *slot = Some((key, value.clone()));
        value
    }
}
