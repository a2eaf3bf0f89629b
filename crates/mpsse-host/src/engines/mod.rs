mod libmpsse;
mod loopback;

pub use libmpsse::{LibMpsse, MallocBuffer, RawContext};
pub use loopback::{Loopback, LoopbackContext};
