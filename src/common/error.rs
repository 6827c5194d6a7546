//! Error types for rr_local_planner
//!
//! Only start-up (configuration) failures are errors. Conditions met while
//! planning are resolved where they are detected.

use thiserror::Error;

/// Main error type for the local planner
#[derive(Debug, Error)]
pub enum PlannerError {
    /// A tuning parameter is present but out of range
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    /// A required parameter or section is absent
    #[error("Missing parameter: {0}")]
    MissingParameter(String),
    /// The planner type is not one of the recognized names
    #[error("Unknown planner type \"{0}\"")]
    UnknownStrategy(String),
    /// Configuration file could not be read
    #[error("I/O error: {0}")]
    ConfigIo(#[from] std::io::Error),
    /// Configuration file could not be parsed
    #[error("Config parse error: {0}")]
    ConfigParse(String),
}

impl From<serde_yaml::Error> for PlannerError {
    fn from(e: serde_yaml::Error) -> Self {
        PlannerError::ConfigParse(e.to_string())
    }
}

/// Result type alias for planner set-up
pub type PlannerResult<T> = Result<T, PlannerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PlannerError::UnknownStrategy("rrt".to_string());
        assert_eq!(format!("{}", err), "Unknown planner type \"rrt\"");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: PlannerError = io_err.into();
        assert!(matches!(err, PlannerError::ConfigIo(_)));
    }
}
