//! Error types for schedule generation.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchedulerError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid input: reference sigma at index {index} is not representable as f64")]
    ElementConversion { index: usize },
}

impl SchedulerError {
    pub(crate) fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Whether the request itself was rejected.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_) | Self::ElementConversion { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
