use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::engine::{Engine, OpenParams};
use crate::registry::SessionRegistry;

/// Exclusive owner of one engine context.
///
/// The context is cleared exactly once, by [`release`](Self::release). Both
/// an explicit close and `Drop` go through it, so whichever runs first does
/// the work and the other observes an empty slot. A released handle is
/// terminal; open a new one instead.
pub struct SessionHandle<E: Engine> {
    id: u64,
    engine: Arc<E>,
    registry: Arc<SessionRegistry>,
    // Engine calls hold the read side; release holds the write side for the
    // whole take/close/decrement sequence.
    context: RwLock<Option<E::Context>>,
}

impl<E: Engine> SessionHandle<E> {
    /// Ask the engine for a context and wrap it.
    ///
    /// The registry is only touched when the engine succeeds.
    pub fn open(
        engine: Arc<E>,
        registry: Arc<SessionRegistry>,
        params: OpenParams,
    ) -> Option<Self> {
        let context = engine.open(params)?;
        let id = registry.opened();
        tracing::debug!(session = id, ?params, "session opened");
        Some(Self { id, engine, registry, context: RwLock::new(Some(context)) })
    }

    /// Diagnostic id, unique within the registry that issued it.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether the context has not been released yet.
    pub fn is_live(&self) -> bool {
        self.context.read().is_some()
    }

    /// Run `f` against the live context.
    ///
    /// Returns `None` without calling `f` once the handle is released.
    pub fn with_context<R>(
        &self,
        f: impl FnOnce(&E, &E::Context) -> R,
    ) -> Option<R> {
        let guard = self.context.read();
        guard.as_ref().map(|context| f(&self.engine, context))
    }

    /// Close the engine context if still held.
    ///
    /// Returns `true` if this call performed the release.
    pub fn release(&self) -> bool {
        let mut slot = self.context.write();
        match slot.take() {
            Some(context) => {
                // Count first so a panicking close cannot leave the registry
                // holding a session whose context is already gone.
                self.registry.released(self.id);
                self.engine.close(context);
                true
            }
            None => false,
        }
    }
}

impl<E: Engine> Drop for SessionHandle<E> {
    fn drop(&mut self) {
        if self.release() {
            tracing::debug!(session = self.id, "session reclaimed");
        }
    }
}

impl<E: Engine> fmt::Debug for SessionHandle<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id)
            .field("live", &self.is_live())
            .finish()
    }
}
