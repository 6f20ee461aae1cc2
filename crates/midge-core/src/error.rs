use thiserror::Error;

/// Canonical error type for the Midge engine.
#[derive(Debug, Error)]
pub enum MidgeError {
    /// A swarm, task or action was configured with an out-of-range value.
    #[error("invalid {field}: {message}")]
    InvalidConfig {
        /// Name of the offending setting (e.g. `"population"`).
        field: &'static str,
        /// Human-readable explanation including the rejected value.
        message: String,
    },

    /// Analysis was requested over a log collection with no entries.
    #[error("cannot analyze an empty log collection")]
    EmptyLogs,

    /// Two reports handed to the comparison engine have different shapes.
    #[error("report shape mismatch: {message}")]
    ShapeMismatch {
        /// Names the mismatched keys or report kinds.
        message: String,
    },

    /// Operation violates the swarm lifecycle (e.g. `run` before `setup`).
    #[error("invalid state: {message}")]
    InvalidState {
        /// Human-readable explanation of the invalid state.
        message: String,
    },

    /// A lifecycle hook of an action set reported a failure.
    #[error("{phase} hook of {midge} failed: {message}")]
    Hook {
        /// Worker whose hook failed.
        midge: String,
        /// `"setup"` or `"teardown"`.
        phase: &'static str,
        /// Message of the underlying error.
        message: String,
    },

    /// I/O error while reading or writing logs and reports.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Serialization error occurred.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Deserialization error occurred.
    #[error("deserialization error: {0}")]
    DeserializationError(String),

    /// Layered configuration could not be loaded or failed validation.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl MidgeError {
    /// Creates an `InvalidConfig` variant.
    #[must_use]
    pub fn invalid_config(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field,
            message: message.into(),
        }
    }

    /// Creates a `ShapeMismatch` variant.
    #[must_use]
    pub fn shape_mismatch(message: impl Into<String>) -> Self {
        Self::ShapeMismatch {
            message: message.into(),
        }
    }

    /// Creates an `InvalidState` variant.
    #[must_use]
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Returns true for errors raised while validating configuration.
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::InvalidConfig { .. } | Self::Config(_))
    }
}

impl From<serde_json::Error> for MidgeError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_eof() || err.is_syntax() || err.is_data() {
            Self::DeserializationError(err.to_string())
        } else {
            Self::SerializationError(err.to_string())
        }
    }
}

/// Convenient result alias for engine operations.
pub type MidgeResult<T> = Result<T, MidgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_message_names_field() {
        let err = MidgeError::invalid_config("population", "must be >= 1, got 0");
        assert_eq!(err.to_string(), "invalid population: must be >= 1, got 0");
        assert!(err.is_config_error());
    }

    #[test]
    fn test_json_syntax_error_maps_to_deserialization() {
        let err: MidgeError = serde_json::from_str::<u32>("{").unwrap_err().into();
        assert!(matches!(err, MidgeError::DeserializationError(_)));
    }
}
