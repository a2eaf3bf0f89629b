//! Lifecycle layer for MPSSE engine sessions.
//!
//! A [`SessionHandle`] exclusively owns one native engine context. The context
//! is released exactly once, either by an explicit close or by the handle's
//! `Drop` (the reclaimer) when the owning runtime lets go of it. A process-wide
//! [`SessionRegistry`] keeps count of live sessions for diagnostics.

pub mod engine;
mod error;
mod handle;
mod registry;

pub use engine::{Endianness, Engine, Mode, OpenParams, Status};
pub use error::{CallError, CallResult, Failure, RegistryError};
pub use handle::SessionHandle;
pub use registry::SessionRegistry;
