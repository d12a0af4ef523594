//! Error types for dynapage
//!
//! This module defines the error hierarchy for the whole crate.
//! All public APIs return `Result<T, Error>` where Error is defined here.

use thiserror::Error;

/// The main error type for dynapage
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Token Errors
    // ============================================================================
    /// Any token decode/verify failure: bad signature, wrong context,
    /// truncated or malformed bytes, wrong key. Deliberately carries no
    /// detail so callers (and attackers) cannot distinguish causes.
    #[error("Token is invalid")]
    Token,

    // ============================================================================
    // Key Encoding Errors
    // ============================================================================
    #[error("Encoding error: {message}")]
    Encoding { message: String },

    #[error("Decoding error: {message}")]
    Decoding { message: String },

    // ============================================================================
    // Local State Errors
    // ============================================================================
    #[error("State error: {message}")]
    State { message: String },

    // ============================================================================
    // Store Errors
    // ============================================================================
    /// Errors raised by the underlying store handle. Propagated verbatim;
    /// this crate never retries them.
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl Error {
    /// Create an encoding error
    pub fn encoding(message: impl Into<String>) -> Self {
        Self::Encoding {
            message: message.into(),
        }
    }

    /// Create a decoding error
    pub fn decoding(message: impl Into<String>) -> Self {
        Self::Decoding {
            message: message.into(),
        }
    }

    /// Create a state error
    pub fn state(message: impl Into<String>) -> Self {
        Self::State {
            message: message.into(),
        }
    }

    /// Create a store error from a message
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store(anyhow::anyhow!(message.into()))
    }

    /// Check if this error is a token validation failure
    pub fn is_token(&self) -> bool {
        matches!(self, Self::Token)
    }
}

/// Result type alias for dynapage
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(Error::Token.to_string(), "Token is invalid");

        let err = Error::encoding("value too long");
        assert_eq!(err.to_string(), "Encoding error: value too long");

        let err = Error::state("sub-keys not resolved");
        assert_eq!(err.to_string(), "State error: sub-keys not resolved");
    }

    #[test]
    fn test_is_token() {
        assert!(Error::Token.is_token());
        assert!(!Error::encoding("x").is_token());
        assert!(!Error::store("unavailable").is_token());
    }

    #[test]
    fn test_store_error_propagates_source_message() {
        let err = Error::store("ProvisionedThroughputExceededException");
        assert!(err
            .to_string()
            .contains("ProvisionedThroughputExceededException"));
    }
}
