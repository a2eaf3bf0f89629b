/// Abstracts the native MPSSE engine.
///
/// Implementors own the USB transport and the bit-level protocol. This crate
/// only decides *when* a context is created and destroyed; the engine decides
/// what the operations mean.
pub trait Engine: Send + Sync + 'static {
    /// Opaque per-session context. Ownership moves into [`close`](Self::close).
    type Context: Send + Sync;
    /// Receive buffer handed out by [`read`](Self::read). Dropping it
    /// releases the engine's allocation.
    type Buffer: AsRef<[u8]>;

    /// Create a context for the given bus parameters.
    ///
    /// Returns `None` on any failure (bad parameters, no device, claim
    /// failure); the engine exposes no finer cause.
    fn open(&self, params: OpenParams) -> Option<Self::Context>;

    /// Destroy a context. Never fails observably.
    fn close(&self, context: Self::Context);

    /// Begin a clocked transaction.
    fn start(&self, context: &Self::Context) -> Status;

    /// End a clocked transaction. The device stays open.
    fn stop(&self, context: &Self::Context) -> Status;

    /// Send all of `data`, or fail.
    fn write(&self, context: &Self::Context, data: &[u8]) -> Status;

    /// Receive `length` bytes, or `None` on failure.
    fn read(&self, context: &Self::Context, length: usize)
        -> Option<Self::Buffer>;

    /// Last acknowledgment bit observed by the engine.
    fn get_ack(&self, context: &Self::Context) -> i32;
}

/// Raw bus parameters as decoded from the caller.
///
/// Values are passed through untouched; the engine validates them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenParams {
    pub mode: i32,
    pub frequency: i32,
    pub endianness: i32,
}

impl OpenParams {
    pub fn new(mode: Mode, frequency: i32, endianness: Endianness) -> Self {
        Self { mode: mode as i32, frequency, endianness: endianness as i32 }
    }
}

/// Engine status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Fail,
}

impl Status {
    pub const OK_CODE: i32 = 0;

    /// Interpret a native status code. Only `0` is success.
    pub fn from_code(code: i32) -> Self {
        if code == Self::OK_CODE {
            Status::Ok
        } else {
            Status::Fail
        }
    }

    pub fn is_ok(self) -> bool {
        self == Status::Ok
    }
}

/// Bus modes understood by libmpsse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Mode {
    Spi0 = 1,
    Spi1 = 2,
    Spi2 = 3,
    Spi3 = 4,
    I2c = 5,
    Gpio = 6,
    Bitbang = 7,
}

impl TryFrom<i32> for Mode {
    type Error = i32;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Mode::Spi0),
            2 => Ok(Mode::Spi1),
            3 => Ok(Mode::Spi2),
            4 => Ok(Mode::Spi3),
            5 => Ok(Mode::I2c),
            6 => Ok(Mode::Gpio),
            7 => Ok(Mode::Bitbang),
            other => Err(other),
        }
    }
}

/// Bit order on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Endianness {
    Msb = 0x00,
    Lsb = 0x08,
}

impl TryFrom<i32> for Endianness {
    type Error = i32;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Endianness::Msb),
            0x08 => Ok(Endianness::Lsb),
            other => Err(other),
        }
    }
}

/// Common clock rates in Hz.
pub mod freq {
    pub const ONE_HUNDRED_KHZ: i32 = 100_000;
    pub const FOUR_HUNDRED_KHZ: i32 = 400_000;
    pub const ONE_MHZ: i32 = 1_000_000;
    pub const TWO_MHZ: i32 = 2_000_000;
    pub const FIVE_MHZ: i32 = 5_000_000;
    pub const SIX_MHZ: i32 = 6_000_000;
    pub const TEN_MHZ: i32 = 10_000_000;
    pub const TWELVE_MHZ: i32 = 12_000_000;
    pub const FIFTEEN_MHZ: i32 = 15_000_000;
    pub const THIRTY_MHZ: i32 = 30_000_000;
    pub const SIXTY_MHZ: i32 = 60_000_000;
}
