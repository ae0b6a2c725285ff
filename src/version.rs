use std::sync::atomic::{AtomicI64, Ordering};

/// Process-wide counter bumped once per committed mutation.
///
/// Bumps are only taken while the lock of the domain being changed is held,
/// so increments are totally ordered within a domain.
#[derive(Debug)]
pub struct Version(AtomicI64);

impl Version {
    pub fn new(start: i64) -> Self {
        Self(AtomicI64::new(start))
    }

    pub fn current(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }

    /// Increment and return the new value
    pub(crate) fn bump(&self) -> i64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::new(1)
    }
}
