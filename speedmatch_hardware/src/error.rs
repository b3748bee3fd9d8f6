use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("command station error: {0}")]
    Station(String),
    #[error("detector bus error: {0}")]
    Bus(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
