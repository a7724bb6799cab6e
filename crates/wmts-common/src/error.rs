//! Error types for the WMTS tile cache.

use thiserror::Error;

/// Result type alias using WmtsError.
pub type WmtsResult<T> = Result<T, WmtsError>;

/// Primary error type for tile cache operations.
#[derive(Debug, Error)]
pub enum WmtsError {
    // === Request / Configuration Errors ===
    #[error("Invalid value for '{field}': {message}")]
    Validation { field: String, message: String },

    #[error("{kind} not found: {identifier}")]
    NotFound {
        kind: &'static str,
        identifier: String,
    },

    #[error("Out of range: {0}")]
    OutOfRange(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    // === Seeding Errors ===
    #[error("Upstream request failed: {0}")]
    Transport(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl WmtsError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        WmtsError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(kind: &'static str, identifier: impl Into<String>) -> Self {
        WmtsError::NotFound {
            kind,
            identifier: identifier.into(),
        }
    }

    /// Get the HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            WmtsError::Validation { .. } | WmtsError::OutOfRange(_) => 400,
            WmtsError::NotFound { .. } => 404,
            WmtsError::NotImplemented(_) => 501,
            WmtsError::Transport(_) => 502,
            WmtsError::Io(_) | WmtsError::Serialization(_) => 500,
        }
    }
}

impl From<std::io::Error> for WmtsError {
    fn from(err: std::io::Error) -> Self {
        WmtsError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for WmtsError {
    fn from(err: serde_json::Error) -> Self {
        WmtsError::Serialization(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(WmtsError::validation("identifier", "empty").http_status_code(), 400);
        assert_eq!(WmtsError::not_found("Layer", "osm").http_status_code(), 404);
        assert_eq!(WmtsError::NotImplemented("bing".into()).http_status_code(), 501);
        assert_eq!(WmtsError::Transport("refused".into()).http_status_code(), 502);
    }

    #[test]
    fn test_not_found_message() {
        let err = WmtsError::not_found("Layer", "osm");
        assert_eq!(err.to_string(), "Layer not found: osm");
    }
}
