//! In-process engine that echoes writes back to reads.
//!
//! Useful for exercising the session layer without an FTDI chip attached.

use std::collections::VecDeque;

use mpsse_session::engine::freq;
use mpsse_session::{Endianness, Engine, Mode, OpenParams, Status};
use parking_lot::Mutex;
use portable_atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct Loopback {
    opened: AtomicUsize,
    closed: AtomicUsize,
    fail_next_open: AtomicBool,
    ack: AtomicI32,
}

#[derive(Debug)]
pub struct LoopbackContext {
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    started: bool,
    fifo: VecDeque<u8>,
}

impl Loopback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `open` fail as if no device was found.
    pub fn fail_next_open(&self) {
        self.fail_next_open.store(true, Ordering::SeqCst);
    }

    /// Set the ack bit reported by `get_ack`.
    pub fn set_ack(&self, ack: i32) {
        self.ack.store(ack, Ordering::SeqCst);
    }

    /// Number of contexts created so far.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Number of contexts destroyed so far.
    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Engine for Loopback {
    type Context = LoopbackContext;
    type Buffer = Vec<u8>;

    fn open(&self, params: OpenParams) -> Option<Self::Context> {
        if self.fail_next_open.swap(false, Ordering::SeqCst) {
            return None;
        }
        Mode::try_from(params.mode).ok()?;
        Endianness::try_from(params.endianness).ok()?;
        if !(1..=freq::SIXTY_MHZ).contains(&params.frequency) {
            return None;
        }

        self.opened.fetch_add(1, Ordering::SeqCst);
        Some(LoopbackContext { state: Mutex::new(State::default()) })
    }

    fn close(&self, _context: Self::Context) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }

    fn start(&self, context: &Self::Context) -> Status {
        // A second start is a repeated start condition, not an error.
        context.state.lock().started = true;
        Status::Ok
    }

    fn stop(&self, context: &Self::Context) -> Status {
        context.state.lock().started = false;
        Status::Ok
    }

    fn write(&self, context: &Self::Context, data: &[u8]) -> Status {
        let mut state = context.state.lock();
        if !state.started {
            return Status::Fail;
        }
        state.fifo.extend(data);
        Status::Ok
    }

    fn read(
        &self,
        context: &Self::Context,
        length: usize,
    ) -> Option<Self::Buffer> {
        let mut state = context.state.lock();
        if !state.started || state.fifo.len() < length {
            return None;
        }
        Some(state.fifo.drain(..length).collect())
    }

    fn get_ack(&self, _context: &Self::Context) -> i32 {
        self.ack.load(Ordering::SeqCst)
    }
}
