use derive_more::{Display, Error, From};
use mpsse_session::RegistryError;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, HostError>;

/// Setup failures. Any of these aborts initialisation; there is no degraded
/// mode.
#[derive(Debug, Display, Error, From)]
pub enum HostError {
    #[display("failed to load {}: {source}", path.display())]
    #[from(skip)]
    Load { path: PathBuf, source: libloading::Error },
    #[display("symbol {name} missing from engine library: {source}")]
    #[from(skip)]
    Symbol { name: &'static str, source: libloading::Error },
    #[display("failed to build worker pool: {source}")]
    #[from(skip)]
    Pool { source: std::io::Error },
    #[display("failed to read {}: {source}", path.display())]
    #[from(skip)]
    ConfigIo { path: PathBuf, source: std::io::Error },
    #[display("invalid config: {_0}")]
    ConfigParse(serde_json::Error),
    #[display("invalid {field}: {value:?}")]
    #[from(skip)]
    InvalidSetting { field: &'static str, value: String },
    #[display("{_0}")]
    Registry(RegistryError),
}
