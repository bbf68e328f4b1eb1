use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Source unavailable: {source_name}: {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    #[error("Timed out waiting for selector: {selector}")]
    SelectorTimeout { selector: String },

    #[error("Element interaction failed for {selector}: {reason}")]
    ElementInteraction { selector: String, reason: String },

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Image error: {0}")]
    Image(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let app_err: AppError = io_err.into();
        assert!(matches!(app_err, AppError::Io(_)));
    }

    #[test]
    fn test_selector_timeout_message() {
        let err = AppError::SelectorTimeout {
            selector: "[data-variant]".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Timed out waiting for selector: [data-variant]"
        );
    }

    #[test]
    fn test_source_unavailable_message() {
        let err = AppError::SourceUnavailable {
            source_name: "serpapi".to_string(),
            reason: "connection refused".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Source unavailable: serpapi: connection refused"
        );
    }
}
