use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlavpError {
    #[error("Workbook error: {0}")]
    Workbook(String),

    #[error("Unknown purchase: {0}")]
    UnknownPurchase(String),

    #[error("No purchase is being edited")]
    NoActiveEdit,

    #[error("Storage error: {0}")]
    Store(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<calamine::Error> for FlavpError {
    fn from(err: calamine::Error) -> Self {
        FlavpError::Workbook(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FlavpError>;
