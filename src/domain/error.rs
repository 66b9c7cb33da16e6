use thiserror::Error;

/// Errors raised by the cache layer
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Store error: {message}")]
    Store { message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Operation cancelled")]
    Cancelled,
}

impl CacheError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Returns true when the error came from the context being cancelled
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error() {
        let error = CacheError::configuration("A store is required");
        assert_eq!(error.to_string(), "Configuration error: A store is required");
    }

    #[test]
    fn test_store_error() {
        let error = CacheError::store("connection refused");
        assert_eq!(error.to_string(), "Store error: connection refused");
    }

    #[test]
    fn test_cancelled_error() {
        assert!(CacheError::Cancelled.is_cancelled());
        assert!(!CacheError::serialization("bad payload").is_cancelled());
    }
}
