use thiserror::Error;

/// Errors raised by the plan engine and its store.
#[derive(Debug, Error)]
pub enum PlanError {
    /// Malformed or out-of-range input, such as a non-positive height or an unknown goal key.
    #[error("invalid input: {0}")]
    Validation(String),

    /// A required record or template is missing.
    #[error("not found: {0}")]
    NotFound(String),

    /// A uniqueness constraint was hit, e.g. a second plan for the same user and date.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PlanError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, PlanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            PlanError::validation("height must be positive").to_string(),
            "invalid input: height must be positive"
        );
        assert_eq!(
            PlanError::not_found("plan for 2024-01-01").to_string(),
            "not found: plan for 2024-01-01"
        );
    }

    #[test]
    fn test_from_serde_error() {
        let err = serde_json::from_str::<u32>("nope").unwrap_err();
        let plan_err: PlanError = err.into();
        assert!(matches!(plan_err, PlanError::Serialization(_)));
    }
}
