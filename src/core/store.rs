//! Append-only result store shared by the workers of a pool run.

use parking_lot::Mutex;

/// Concurrency-safe collection of processed results.
///
/// Appends and snapshots take the same lock, so a snapshot never observes a partial append.
/// Arrival order across workers is nondeterministic; sort snapshots by a stable key when a
/// deterministic order is needed.
#[derive(Debug)]
pub struct ResultStore<R> {
    results: Mutex<Vec<R>>,
}

impl<R> ResultStore<R> {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            results: Mutex::new(Vec::new()),
        }
    }

    /// Create an empty store with room for `capacity` results.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            results: Mutex::new(Vec::with_capacity(capacity)),
        }
    }

    /// Append one result.
    pub fn record(&self, result: R) {
        self.results.lock().push(result);
    }

    /// Number of results recorded so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.lock().len()
    }

    /// Whether nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.lock().is_empty()
    }
}

impl<R> Default for ResultStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Clone> ResultStore<R> {
    /// Independent copy of every result recorded at the time of the call.
    #[must_use]
    pub fn snapshot(&self) -> Vec<R> {
        self.results.lock().clone()
    }
}
