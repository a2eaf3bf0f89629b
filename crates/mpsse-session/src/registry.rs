use std::sync::Arc;

use once_cell::sync::Lazy;
use portable_atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::error::RegistryError;

static GLOBAL: Lazy<Arc<SessionRegistry>> =
    Lazy::new(|| Arc::new(SessionRegistry::new()));

/// Count of live sessions.
///
/// Incremented once per successful open, decremented once per release. The
/// count never goes below zero; an unmatched decrement is logged and ignored.
#[derive(Debug)]
pub struct SessionRegistry {
    live: AtomicUsize,
    next_id: AtomicU64,
}

impl SessionRegistry {
    pub const fn new() -> Self {
        Self { live: AtomicUsize::new(0), next_id: AtomicU64::new(1) }
    }

    /// The process-wide registry.
    pub fn global() -> Arc<SessionRegistry> {
        GLOBAL.clone()
    }

    /// Record a newly opened session and return its diagnostic id.
    pub(crate) fn opened(&self) -> u64 {
        self.live.fetch_add(1, Ordering::AcqRel);
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Record a released session.
    pub(crate) fn released(&self, id: u64) {
        let prev = self.live.fetch_update(
            Ordering::AcqRel,
            Ordering::Acquire,
            |n| n.checked_sub(1),
        );
        if prev.is_err() {
            tracing::error!(session = id, "release with no live sessions");
        }
    }

    /// Current number of live sessions.
    pub fn live(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    /// Fails if any session is still open.
    pub fn ensure_idle(&self) -> Result<(), RegistryError> {
        match self.live() {
            0 => Ok(()),
            n => Err(RegistryError::LiveSessions(n)),
        }
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
