use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("no such device: {0}")]
    NoSuchDevice(String),
    #[error("no such variable: {device}/{name}")]
    NoSuchVariable { device: String, name: String },
    #[error("no such command: {device}/{name}")]
    NoSuchCommand { device: String, name: String },
    #[error("variable {0} has a different value type")]
    TypeMismatch(String),
    #[error("variable {0} is read-only")]
    ReadOnly(String),
    #[error("value {0} outside 0.0..=1.0")]
    OutOfRange(f64),
    #[error("device offline: {0}")]
    Offline(String),
    #[error("register bank lock poisoned")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, SimError>;
