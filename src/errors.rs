//! All errors that can occur in the coevolve library.

use std::fmt;

#[derive(Clone, Debug)]
pub enum CoevolutionError {
    InitializationError(String),
    IntegrationError(String),
    NumericalError(String),
    ReadError(String),
    WriteError(String),
}

pub type Result<T> = std::result::Result<T, CoevolutionError>;

impl fmt::Display for CoevolutionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CoevolutionError::InitializationError(message) => {
                write!(f, "InitializationError: {}", message)
            }
            CoevolutionError::IntegrationError(message) => {
                write!(f, "IntegrationError: {}", message)
            }
            CoevolutionError::NumericalError(message) => {
                write!(f, "NumericalError: {}", message)
            }
            CoevolutionError::ReadError(message) => write!(f, "ReadError: {}", message),
            CoevolutionError::WriteError(message) => write!(f, "WriteError: {}", message),
        }
    }
}

impl std::error::Error for CoevolutionError {}
