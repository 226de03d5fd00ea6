use crate::{actuator::ActuatorError, trigger::TriggerError};

/// Result alias that carries the custom [`DrumLightError`] type.
pub type Result<T> = std::result::Result<T, DrumLightError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum DrumLightError {
    /// Free-form failure raised while wiring collaborators together.
    #[error("{0}")]
    Message(String),
    /// A configuration value was rejected during validation.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// The configuration file could not be parsed.
    #[error("malformed configuration file: {0}")]
    Json(#[from] serde_json::Error),
    /// The trigger source could not be opened or was lost.
    #[error(transparent)]
    Trigger(#[from] TriggerError),
    /// The actuator could not be found or driven.
    #[error(transparent)]
    Actuator(#[from] ActuatorError),
}

impl DrumLightError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub(crate) fn config<T: Into<String>>(msg: T) -> Self {
        Self::Config(msg.into())
    }
}

impl From<&str> for DrumLightError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for DrumLightError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
