//! Runtime binding to the native `libmpsse` shared library.

use std::ffi::{c_char, c_int, c_void};
use std::path::Path;
use std::ptr::NonNull;

use libloading::Library;
use mpsse_session::{Engine, OpenParams, Status};

use crate::error::{HostError, Result};

type OpenFn = unsafe extern "C" fn(c_int, c_int, c_int) -> *mut c_void;
type CloseFn = unsafe extern "C" fn(*mut c_void);
type StatusFn = unsafe extern "C" fn(*mut c_void) -> c_int;
type WriteFn = unsafe extern "C" fn(*mut c_void, *const c_char, c_int) -> c_int;
type ReadFn = unsafe extern "C" fn(*mut c_void, c_int) -> *mut c_char;

/// Pointer to a native `mpsse_context`.
#[derive(Debug)]
pub struct RawContext(NonNull<c_void>);

// SAFETY: The context is a heap object owned by the library and is not tied
// to the creating thread. Concurrent use of one context is left to the
// library, same as for any other caller of it.
unsafe impl Send for RawContext {}
unsafe impl Sync for RawContext {}

/// Buffer returned by the native `Read`, freed with `libc::free` on drop.
#[derive(Debug)]
pub struct MallocBuffer {
    ptr: NonNull<u8>,
    len: usize,
}

impl AsRef<[u8]> for MallocBuffer {
    fn as_ref(&self) -> &[u8] {
        // SAFETY: `Read` hands back a `malloc`ed block of exactly the
        // requested size, which is what `len` records.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for MallocBuffer {
    fn drop(&mut self) {
        // SAFETY: The block came from the C allocator and is freed only here.
        unsafe { libc::free(self.ptr.as_ptr().cast()) }
    }
}

/// The native engine, loaded at runtime.
pub struct LibMpsse {
    open: OpenFn,
    close: CloseFn,
    start: StatusFn,
    stop: StatusFn,
    write: WriteFn,
    read: ReadFn,
    get_ack: StatusFn,
    // Keeps the function pointers above valid.
    _library: Library,
}

impl LibMpsse {
    /// Load from the platform's default library name (`libmpsse.so` etc).
    pub fn load_default() -> Result<Self> {
        Self::load(libloading::library_filename("mpsse"))
    }

    /// Load from an explicit path or library name.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        // SAFETY: Loading runs the library's initialisers. We trust the
        // configured library to be libmpsse.
        let library = unsafe { Library::new(&path) }
            .map_err(|source| HostError::Load { path: path.clone(), source })?;

        // SAFETY: The signatures below match mpsse.h.
        let engine = unsafe {
            Self {
                open: symbol(&library, "MPSSE")?,
                close: symbol(&library, "Close")?,
                start: symbol(&library, "Start")?,
                stop: symbol(&library, "Stop")?,
                write: symbol(&library, "Write")?,
                read: symbol(&library, "Read")?,
                get_ack: symbol(&library, "GetAck")?,
                _library: library,
            }
        };
        tracing::info!(path = %path.display(), "loaded libmpsse");
        Ok(engine)
    }
}

/// Copy a function pointer out of `library`.
///
/// # Safety
///
/// `T` must be the exact function pointer type of the exported symbol.
unsafe fn symbol<T: Copy>(library: &Library, name: &'static str) -> Result<T> {
    let mut raw = Vec::with_capacity(name.len() + 1);
    raw.extend_from_slice(name.as_bytes());
    raw.push(0);
    library
        .get::<T>(&raw)
        .map(|sym| *sym)
        .map_err(|source| HostError::Symbol { name, source })
}

impl Engine for LibMpsse {
    type Context = RawContext;
    type Buffer = MallocBuffer;

    fn open(&self, params: OpenParams) -> Option<Self::Context> {
        // SAFETY: Plain integers in, owned pointer or NULL out.
        let ptr = unsafe {
            (self.open)(params.mode, params.frequency, params.endianness)
        };
        NonNull::new(ptr).map(RawContext)
    }

    fn close(&self, context: Self::Context) {
        // SAFETY: `context` is consumed, so this is the only close.
        unsafe { (self.close)(context.0.as_ptr()) }
    }

    fn start(&self, context: &Self::Context) -> Status {
        // SAFETY: `context` is live for the duration of the borrow.
        Status::from_code(unsafe { (self.start)(context.0.as_ptr()) })
    }

    fn stop(&self, context: &Self::Context) -> Status {
        // SAFETY: As for `start`.
        Status::from_code(unsafe { (self.stop)(context.0.as_ptr()) })
    }

    fn write(&self, context: &Self::Context, data: &[u8]) -> Status {
        let Ok(len) = c_int::try_from(data.len()) else {
            return Status::Fail;
        };
        // SAFETY: The library only reads `len` bytes from `data`.
        let code = unsafe {
            (self.write)(context.0.as_ptr(), data.as_ptr().cast(), len)
        };
        Status::from_code(code)
    }

    fn read(
        &self,
        context: &Self::Context,
        length: usize,
    ) -> Option<Self::Buffer> {
        let size = c_int::try_from(length).ok()?;
        // SAFETY: Returns a `malloc`ed block of `size` bytes, or NULL.
        let ptr = unsafe { (self.read)(context.0.as_ptr(), size) };
        NonNull::new(ptr.cast::<u8>())
            .map(|ptr| MallocBuffer { ptr, len: length })
    }

    fn get_ack(&self, context: &Self::Context) -> i32 {
        // SAFETY: As for `start`.
        unsafe { (self.get_ack)(context.0.as_ptr()) }
    }
}
