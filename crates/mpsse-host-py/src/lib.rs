use mpsse_host::session::{CallError, CallResult};
use mpsse_host::{logging, Config, Dispatcher, IoData, LibMpsse, Session};
use mpsse_host::{HostError, WorkerPool};
use once_cell::sync::OnceCell;
use pyo3::create_exception;
use pyo3::exceptions::{PyImportError, PyTypeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyByteArray, PyBytes, PyInt, PyList, PyString, PyTuple};

// Raised from module import when the engine or worker pool cannot be set up
create_exception!(mpsse_nif, EngineLoadError, PyImportError);

static HOST: OnceCell<Host> = OnceCell::new();

struct Host {
    pool: WorkerPool,
    dispatcher: Dispatcher<LibMpsse>,
}

impl Host {
    fn start() -> Result<Self, HostError> {
        let config = Config::from_env()?;
        logging::init(&config.log_filter);

        let engine = match &config.library {
            Some(path) => LibMpsse::load(path)?,
            None => LibMpsse::load_default()?,
        };
        let pool = WorkerPool::new(config.blocking_threads)?;
        let dispatcher = Dispatcher::new(engine, pool.handle());
        Ok(Self { pool, dispatcher })
    }
}

fn host() -> PyResult<&'static Host> {
    HOST.get()
        .ok_or_else(|| EngineLoadError::new_err("mpsse_nif is not initialised"))
}

/// Open session handle.
///
/// Dropping the last Python reference closes the device if `close` was never
/// called. The close runs on the worker pool, not on the collecting thread.
#[pyclass(frozen, name = "Session", module = "mpsse_nif")]
struct PySession {
    inner: Session<LibMpsse>,
}

impl Drop for PySession {
    fn drop(&mut self) {
        if !self.inner.is_live() {
            return;
        }
        let Some(host) = HOST.get() else {
            return;
        };
        host.dispatcher.release_detached(self.inner.clone());
    }
}

#[pymethods]
impl PySession {
    fn __repr__(&self) -> String {
        format!(
            "<Session {} {}>",
            self.inner.id(),
            if self.inner.is_live() { "open" } else { "closed" }
        )
    }
}

fn ok(py: Python<'_>) -> PyObject {
    PyString::new(py, "ok").into_any().unbind()
}

fn error_tuple(py: Python<'_>, err: CallError) -> PyResult<PyObject> {
    match err {
        // Usage errors are raised, never returned.
        CallError::BadArgument => Err(PyValueError::new_err("bad argument")),
        err => {
            let tuple = PyTuple::new(py, ["error", err.reason()])?;
            Ok(tuple.into_any().unbind())
        }
    }
}

fn status(py: Python<'_>, result: CallResult<()>) -> PyResult<PyObject> {
    match result {
        Ok(()) => Ok(ok(py)),
        Err(err) => error_tuple(py, err),
    }
}

fn ok_value<'py>(
    py: Python<'py>,
    value: Bound<'py, PyAny>,
) -> PyResult<PyObject> {
    let tag = PyString::new(py, "ok").into_any();
    Ok(PyTuple::new(py, [tag, value])?.into_any().unbind())
}

/// Accept bytes, bytearray, byte-valued ints and nested lists of them.
fn to_iodata(obj: &Bound<'_, PyAny>) -> PyResult<IoData> {
    if let Ok(bytes) = obj.downcast::<PyBytes>() {
        return Ok(IoData::Bytes(bytes.as_bytes().to_vec()));
    }
    if let Ok(array) = obj.downcast::<PyByteArray>() {
        return Ok(IoData::Bytes(array.to_vec()));
    }
    if let Ok(value) = obj.downcast::<PyInt>() {
        return Ok(IoData::Byte(value.extract()?));
    }
    if let Ok(list) = obj.downcast::<PyList>() {
        let items = list
            .iter()
            .map(|item| to_iodata(&item))
            .collect::<PyResult<Vec<_>>>()?;
        return Ok(IoData::List(items));
    }
    Err(PyTypeError::new_err(format!(
        "expected bytes, bytearray, int or list, got {}",
        obj.get_type().name()?
    )))
}

#[pyfunction]
fn open(
    py: Python<'_>,
    mode: i64,
    frequency: i64,
    endianness: i64,
) -> PyResult<PyObject> {
    let host = host()?;
    let result = py.allow_threads(|| {
        host.pool.block_on(host.dispatcher.open(mode, frequency, endianness))
    });
    match result {
        Ok(inner) => {
            let session = Bound::new(py, PySession { inner })?;
            ok_value(py, session.into_any())
        }
        Err(err) => error_tuple(py, err),
    }
}

#[pyfunction]
fn close(py: Python<'_>, session: &Bound<'_, PySession>) -> PyResult<PyObject> {
    let host = host()?;
    let inner = session.get().inner.clone();
    let result =
        py.allow_threads(|| host.pool.block_on(host.dispatcher.close(&inner)));
    status(py, result)
}

#[pyfunction]
fn start(py: Python<'_>, session: &Bound<'_, PySession>) -> PyResult<PyObject> {
    let host = host()?;
    let inner = session.get().inner.clone();
    let result =
        py.allow_threads(|| host.pool.block_on(host.dispatcher.start(&inner)));
    status(py, result)
}

#[pyfunction]
fn stop(py: Python<'_>, session: &Bound<'_, PySession>) -> PyResult<PyObject> {
    let host = host()?;
    let inner = session.get().inner.clone();
    let result =
        py.allow_threads(|| host.pool.block_on(host.dispatcher.stop(&inner)));
    status(py, result)
}

#[pyfunction]
fn write(
    py: Python<'_>,
    session: &Bound<'_, PySession>,
    data: &Bound<'_, PyAny>,
) -> PyResult<PyObject> {
    let host = host()?;
    let inner = session.get().inner.clone();
    let data = to_iodata(data)?;
    let result = py.allow_threads(|| {
        host.pool.block_on(host.dispatcher.write(&inner, data))
    });
    status(py, result)
}

#[pyfunction]
fn read(
    py: Python<'_>,
    session: &Bound<'_, PySession>,
    length: u64,
) -> PyResult<PyObject> {
    let host = host()?;
    let inner = session.get().inner.clone();
    let result = py.allow_threads(|| {
        host.pool.block_on(host.dispatcher.read(&inner, length))
    });
    match result {
        Ok(bytes) => ok_value(py, PyBytes::new(py, &bytes).into_any()),
        Err(err) => error_tuple(py, err),
    }
}

#[pyfunction]
fn get_ack(
    py: Python<'_>,
    session: &Bound<'_, PySession>,
) -> PyResult<PyObject> {
    let host = host()?;
    let inner = session.get().inner.clone();
    let result = py.allow_threads(|| {
        host.pool.block_on(host.dispatcher.get_ack(&inner))
    });
    match result {
        Ok(ack) => ok_value(py, ack.into_pyobject(py)?.into_any()),
        Err(err) => error_tuple(py, err),
    }
}

#[pymodule]
fn mpsse_nif(m: &Bound<'_, PyModule>) -> PyResult<()> {
    HOST.get_or_try_init(Host::start).map_err(|err| {
        tracing::error!(%err, "mpsse_nif initialisation failed");
        EngineLoadError::new_err(err.to_string())
    })?;

    m.add("EngineLoadError", m.py().get_type::<EngineLoadError>())?;
    m.add_class::<PySession>()?;
    m.add_function(wrap_pyfunction!(open, m)?)?;
    m.add_function(wrap_pyfunction!(close, m)?)?;
    m.add_function(wrap_pyfunction!(start, m)?)?;
    m.add_function(wrap_pyfunction!(stop, m)?)?;
    m.add_function(wrap_pyfunction!(write, m)?)?;
    m.add_function(wrap_pyfunction!(read, m)?)?;
    m.add_function(wrap_pyfunction!(get_ack, m)?)?;
    Ok(())
}
