use mpsse_session::{CallError, CallResult};

/// Byte-producing write argument.
///
/// Callers may hand over a flat buffer, a single byte value, or arbitrarily
/// nested lists of either. Everything is flattened into one contiguous buffer
/// before it reaches the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IoData {
    Bytes(Vec<u8>),
    /// A single byte given as an integer; must be in `0..=255`.
    Byte(i64),
    List(Vec<IoData>),
}

impl IoData {
    /// Flatten into a contiguous buffer.
    ///
    /// Fails with [`CallError::BadArgument`] on an out-of-range byte value.
    pub fn into_bytes(self) -> CallResult<Vec<u8>> {
        let mut out = Vec::new();
        // Explicit stack so deeply nested input cannot blow the call stack.
        let mut pending = vec![self];
        while let Some(item) = pending.pop() {
            match item {
                IoData::Bytes(bytes) => out.extend_from_slice(&bytes),
                IoData::Byte(value) => {
                    let byte = u8::try_from(value)
                        .map_err(|_| CallError::BadArgument)?;
                    out.push(byte);
                }
                IoData::List(items) => pending.extend(items.into_iter().rev()),
            }
        }
        Ok(out)
    }
}

impl From<Vec<u8>> for IoData {
    fn from(bytes: Vec<u8>) -> Self {
        IoData::Bytes(bytes)
    }
}

impl From<&[u8]> for IoData {
    fn from(bytes: &[u8]) -> Self {
        IoData::Bytes(bytes.to_vec())
    }
}

impl<const N: usize> From<[u8; N]> for IoData {
    fn from(bytes: [u8; N]) -> Self {
        IoData::Bytes(bytes.to_vec())
    }
}

impl From<u8> for IoData {
    fn from(byte: u8) -> Self {
        IoData::Byte(byte.into())
    }
}

impl From<Vec<IoData>> for IoData {
    fn from(items: Vec<IoData>) -> Self {
        IoData::List(items)
    }
}
