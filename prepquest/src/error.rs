use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("internal error: {0:#?}")]
    Internal(#[from] anyhow::Error),

    #[error("configuration error: {0:#?}")]
    Config(anyhow::Error),

    #[error("database error: {0:#?}")]
    Database(anyhow::Error),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("too many results: {0}")]
    TooManyResults(String),
}

pub type Result<T> = std::result::Result<T, Error>;
