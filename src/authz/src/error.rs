//! Error types for the portal authorization layer

use thiserror::Error;

/// Authorization layer errors
///
/// The access resolver itself never fails; these cover configuration
/// loading, validation schema compilation and account-control flag manipulation.
#[derive(Debug, Error)]
pub enum AuthzError {
    /// Settings could not be loaded or deserialized
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Role restrictions mapping is malformed
    #[error("Invalid role restrictions: {0}")]
    InvalidRestrictions(String),

    /// Two mutually exclusive account-control flags are both set
    #[error("Conflicting account flags: {first} and {second} cannot both be set")]
    AccountControlConflict {
        first: &'static str,
        second: &'static str,
    },

    /// Account-control flag name or value not in the flag table
    #[error("Unknown account flag: {0}")]
    UnknownAccountFlag(String),

    /// Settings file exists but could not be read
    #[error("Failed to read settings file {path}: {source}")]
    ReadSettings {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Settings file is not valid TOML
    #[error("Invalid settings file: {0}")]
    ParseSettings(#[from] toml::de::Error),

    /// Field descriptor carries a validator argument that cannot be used
    #[error("Invalid validation for field {attribute}: {reason}")]
    InvalidSchema { attribute: String, reason: String },
}

/// Result type for authorization layer operations
pub type Result<T> = std::result::Result<T, AuthzError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AuthzError::InvalidRestrictions("empty role name".to_string());
        assert!(err.to_string().contains("Invalid role restrictions"));
        assert!(err.to_string().contains("empty role name"));
    }

    #[test]
    fn test_conflict_display() {
        let err = AuthzError::AccountControlConflict {
            first: "PASSWORD_EXPIRED",
            second: "DONT_EXPIRE_PASSWORD",
        };
        assert_eq!(
            err.to_string(),
            "Conflicting account flags: PASSWORD_EXPIRED and DONT_EXPIRE_PASSWORD cannot both be set"
        );
    }

    #[test]
    fn test_invalid_schema_display() {
        let err = AuthzError::InvalidSchema {
            attribute: "uid".to_string(),
            reason: "`min` needs a numeric argument".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid validation for field uid: `min` needs a numeric argument"
        );
    }
}
