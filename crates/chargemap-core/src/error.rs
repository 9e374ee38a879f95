use thiserror::Error;

/// Top-level error type for the Chargemap service.
///
/// Storage and API crates map their failures into one of these variants so
/// that `?` works across crate boundaries. The API layer decides which HTTP
/// status each variant becomes.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ChargemapError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for ChargemapError {
    fn from(err: toml::de::Error) -> Self {
        ChargemapError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for ChargemapError {
    fn from(err: toml::ser::Error) -> Self {
        ChargemapError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for ChargemapError {
    fn from(err: serde_json::Error) -> Self {
        ChargemapError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Chargemap operations.
pub type Result<T> = std::result::Result<T, ChargemapError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ChargemapError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");
    }

    #[test]
    fn test_error_display_all_variants() {
        let cases: Vec<(ChargemapError, &str)> = vec![
            (
                ChargemapError::Storage("disk full".to_string()),
                "Storage error: disk full",
            ),
            (
                ChargemapError::Validation("lat out of range".to_string()),
                "Validation error: lat out of range",
            ),
            (
                ChargemapError::NotFound("charge point".to_string()),
                "Not found: charge point",
            ),
            (
                ChargemapError::Conflict("email taken".to_string()),
                "Conflict: email taken",
            ),
            (
                ChargemapError::Api("bind failed".to_string()),
                "API error: bind failed",
            ),
            (
                ChargemapError::Serialization("invalid json".to_string()),
                "Serialization error: invalid json",
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ChargemapError = io_err.into();
        assert!(matches!(err, ChargemapError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_from_toml_de() {
        let err: std::result::Result<toml::Value, _> = toml::from_str("invalid = [[[");
        let converted: ChargemapError = err.unwrap_err().into();
        assert!(matches!(converted, ChargemapError::Config(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let err: std::result::Result<serde_json::Value, _> = serde_json::from_str("{ nope }");
        let converted: ChargemapError = err.unwrap_err().into();
        assert!(matches!(converted, ChargemapError::Serialization(_)));
    }

    #[test]
    fn test_result_type_with_question_mark() {
        fn inner() -> Result<String> {
            let io_result: std::result::Result<i32, std::io::Error> = Ok(42);
            let value = io_result?;
            Ok(value.to_string())
        }

        assert_eq!(inner().unwrap(), "42");
    }
}
