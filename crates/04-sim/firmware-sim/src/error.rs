use mes_transport::TransportError;
use thiserror::Error;

pub type SimResult<T> = Result<T, SimError>;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("log buffer of {len} bytes cannot hold {entries} entries")]
    LogTooSmall { len: usize, entries: u32 },

    #[error("failed to spawn simulator thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("simulator thread panicked")]
    Panicked,
}
