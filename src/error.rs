use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid elector config: {reason}")]
    InvalidConfig { reason: String },

    #[error("Elector already started")]
    AlreadyStarted,

    #[error("Lease store timeout: {0}")]
    StoreTimeout(String),

    #[error("Lease store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Lease store error: {0}")]
    Store(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
