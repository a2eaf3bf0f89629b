use std::future::Future;

use tokio::runtime::{Builder, Handle, Runtime};

use crate::error::{HostError, Result};

/// Dedicated runtime for blocking engine calls.
///
/// Engine calls run on its blocking threads, capped at the configured bound.
/// Excess calls queue until a thread frees up.
pub struct WorkerPool {
    runtime: Runtime,
}

impl WorkerPool {
    pub fn new(blocking_threads: usize) -> Result<Self> {
        if blocking_threads == 0 {
            return Err(HostError::InvalidSetting {
                field: "blocking_threads",
                value: blocking_threads.to_string(),
            });
        }
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(blocking_threads)
            .thread_name("mpsse-io")
            .enable_time()
            .build()
            .map_err(|source| HostError::Pool { source })?;
        tracing::debug!(blocking_threads, "worker pool started");
        Ok(Self { runtime })
    }

    pub fn handle(&self) -> Handle {
        self.runtime.handle().clone()
    }

    /// Drive `future` to completion from a non-async thread.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}
