//! # Error Types
//!
//! Foundational error enums shared by every crate in the workspace. All
//! errors use `thiserror` for derive-based `Display` and `Error`
//! implementations; higher crates wrap them with `#[from]`.

use thiserror::Error;

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// Error raised when a domain primitive fails validation at construction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The string is not a `did:<method>:<id>` identifier.
    #[error("invalid DID: {0:?}")]
    InvalidDid(String),

    /// The timestamp is not RFC 3339 or is not UTC.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// A hex-encoded digest had the wrong length or alphabet.
    #[error("invalid digest: {0}")]
    InvalidDigest(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_did_display_quotes_input() {
        let err = ValidationError::InvalidDid("not-a-did".to_string());
        assert_eq!(err.to_string(), r#"invalid DID: "not-a-did""#);
    }
}
