//! Entry points for session operations.
//!
//! Each call validates its arguments on the caller's side, then runs the
//! engine work on the blocking worker pool and maps the outcome to a
//! [`CallResult`]. Nothing here serializes calls on one session: concurrent
//! calls on the same handle reach the engine concurrently.

use std::sync::Arc;
use std::time::Instant;

use mpsse_session::{
    CallError, CallResult, Engine, Failure, OpenParams, SessionHandle,
    SessionRegistry, Status,
};
use tokio::runtime::Handle;

use crate::iodata::IoData;

/// Caller-held token for an open session.
///
/// The session is reclaimed when the last clone is dropped.
pub type Session<E> = Arc<SessionHandle<E>>;

pub struct Dispatcher<E: Engine> {
    engine: Arc<E>,
    registry: Arc<SessionRegistry>,
    pool: Handle,
}

impl<E: Engine> Clone for Dispatcher<E> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            registry: self.registry.clone(),
            pool: self.pool.clone(),
        }
    }
}

impl<E: Engine> Dispatcher<E> {
    /// Dispatcher reporting to the process-wide registry.
    pub fn new(engine: E, pool: Handle) -> Self {
        Self::with_registry(engine, pool, SessionRegistry::global())
    }

    pub fn with_registry(
        engine: E,
        pool: Handle,
        registry: Arc<SessionRegistry>,
    ) -> Self {
        Self { engine: Arc::new(engine), registry, pool }
    }

    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Open a session on the device.
    ///
    /// Arguments must fit the engine's native integer width. Their meaning is
    /// checked by the engine.
    pub async fn open(
        &self,
        mode: i64,
        frequency: i64,
        endianness: i64,
    ) -> CallResult<Session<E>> {
        let params = OpenParams {
            mode: decode_int(mode)?,
            frequency: decode_int(frequency)?,
            endianness: decode_int(endianness)?,
        };
        let engine = self.engine.clone();
        let registry = self.registry.clone();
        self.run("open", None, move || {
            SessionHandle::open(engine, registry, params)
                .map(Arc::new)
                .ok_or(CallError::Failed(Failure::Generic))
        })
        .await
    }

    /// Release the session's engine context. Closing twice is a no-op.
    pub async fn close(&self, session: &Session<E>) -> CallResult<()> {
        let session = session.clone();
        self.run("close", Some(session.id()), move || {
            if session.release() {
                tracing::debug!(session = session.id(), "session closed");
            }
            Ok(())
        })
        .await
    }

    /// Release `session` on the pool without waiting for it.
    ///
    /// For owners that must not block, such as a garbage collector dropping
    /// the last reference. The engine close runs in the spawned job; any
    /// later reclaim of the handle finds an empty slot.
    pub fn release_detached(&self, session: Session<E>) {
        let id = session.id();
        self.pool.spawn_blocking(move || {
            if session.release() {
                tracing::debug!(session = id, "session reclaimed");
            }
        });
    }

    /// Begin a clocked transaction.
    pub async fn start(&self, session: &Session<E>) -> CallResult<()> {
        self.status_call("start", session, |engine, ctx| engine.start(ctx))
            .await
    }

    /// End a clocked transaction. The session stays open for another start.
    pub async fn stop(&self, session: &Session<E>) -> CallResult<()> {
        self.status_call("stop", session, |engine, ctx| engine.stop(ctx)).await
    }

    /// Send `data` in one engine call.
    pub async fn write(
        &self,
        session: &Session<E>,
        data: impl Into<IoData>,
    ) -> CallResult<()> {
        let bytes = data.into().into_bytes()?;
        self.status_call("write", session, move |engine, ctx| {
            engine.write(ctx, &bytes)
        })
        .await
    }

    /// Receive exactly `length` bytes.
    ///
    /// The result buffer is reserved before the engine is asked for data, so
    /// an allocation failure never reaches the device.
    pub async fn read(
        &self,
        session: &Session<E>,
        length: u64,
    ) -> CallResult<Vec<u8>> {
        let length = usize::try_from(length)
            .ok()
            .filter(|&n| i32::try_from(n).is_ok())
            .ok_or(CallError::BadArgument)?;
        let session = session.clone();
        self.run("read", Some(session.id()), move || {
            let mut out = read_buffer(length)?;

            let filled = session.with_context(|engine, ctx| {
                if length == 0 {
                    return true;
                }
                match engine.read(ctx, length) {
                    // Shorter than asked is treated as a failed read.
                    Some(buf) if buf.as_ref().len() >= length => {
                        out.extend_from_slice(&buf.as_ref()[..length]);
                        true
                    }
                    _ => false,
                }
            });
            match filled {
                Some(true) => Ok(out),
                _ => Err(CallError::Failed(Failure::Generic)),
            }
        })
        .await
    }

    /// Current acknowledgment bit.
    pub async fn get_ack(&self, session: &Session<E>) -> CallResult<i32> {
        let session = session.clone();
        self.run("get_ack", Some(session.id()), move || {
            session
                .with_context(|engine, ctx| engine.get_ack(ctx))
                .ok_or(CallError::Failed(Failure::Generic))
        })
        .await
    }

    async fn status_call<F>(
        &self,
        op: &'static str,
        session: &Session<E>,
        call: F,
    ) -> CallResult<()>
    where
        F: FnOnce(&E, &E::Context) -> Status + Send + 'static,
    {
        let session = session.clone();
        self.run(op, Some(session.id()), move || {
            match session.with_context(call) {
                Some(status) if status.is_ok() => Ok(()),
                _ => Err(CallError::Failed(Failure::Generic)),
            }
        })
        .await
    }

    /// Run `job` on the blocking pool and log the outcome.
    async fn run<T, F>(
        &self,
        op: &'static str,
        session: Option<u64>,
        job: F,
    ) -> CallResult<T>
    where
        F: FnOnce() -> CallResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let started = Instant::now();
        let result = match self.pool.spawn_blocking(job).await {
            Ok(result) => result,
            Err(err) => {
                tracing::error!(op, ?session, %err, "engine call aborted");
                Err(CallError::Failed(Failure::Generic))
            }
        };
        let elapsed_us = started.elapsed().as_micros() as u64;
        match &result {
            Ok(_) => tracing::debug!(op, ?session, elapsed_us, "ok"),
            Err(err) => {
                tracing::warn!(op, ?session, elapsed_us, %err, "call failed")
            }
        }
        result
    }
}

fn decode_int(value: i64) -> CallResult<i32> {
    i32::try_from(value).map_err(|_| CallError::BadArgument)
}

/// Empty buffer with room for `length` bytes.
fn read_buffer(length: usize) -> CallResult<Vec<u8>> {
    let mut out = Vec::new();
    out.try_reserve_exact(length)
        .map_err(|_| CallError::Failed(Failure::AllocFailed))?;
    Ok(out)
}
