pub mod config;
pub mod dispatcher;
pub mod engines;
mod error;
pub mod iodata;
pub mod logging;
pub mod pool;

pub use config::Config;
pub use dispatcher::{Dispatcher, Session};
pub use engines::{LibMpsse, Loopback};
pub use error::{HostError, Result};
pub use iodata::IoData;
pub use pool::WorkerPool;

// Re-export the lifecycle crate for callers that only depend on this one
pub use mpsse_session as session;
