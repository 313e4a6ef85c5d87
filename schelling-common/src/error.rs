use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchellingError {
    /// Malformed, missing or inconsistent configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Race ratios and empty ratio do not sum to 1.
    #[error("Validation error: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, SchellingError>;
