//! Named in-process locks, one per driver kind.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Registry handing out one mutex per driver kind.
///
/// Calls for the same kind share a mutex and therefore serialise; calls for
/// different kinds never contend. The registry belongs to a coordinator
/// instance rather than to global state.
#[derive(Debug, Default)]
pub struct LockRegistry {
    locks: Mutex<HashMap<&'static str, Arc<Mutex<()>>>>,
}

impl LockRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the mutex guarding `kind`, creating it on first use.
    #[must_use]
    pub fn lock_for(&self, kind: &'static str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(kind).or_default())
    }

    /// Number of kinds that have been locked at least once.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no kind has been locked yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
