use thiserror::Error;

/// Machine-readable reason codes for attempt-policy rejections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyCode {
    AttemptLimitReached,
    CooldownActive,
    DeadlinePassed,
    NotAvailable,
}

impl PolicyCode {
    pub fn as_str(self) -> &'static str {
        match self {
            PolicyCode::AttemptLimitReached => "attempt_limit_reached",
            PolicyCode::CooldownActive => "cooldown_active",
            PolicyCode::DeadlinePassed => "deadline_passed",
            PolicyCode::NotAvailable => "not_available",
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("policy violation ({}): {message}", .code.as_str())]
    PolicyViolation { code: PolicyCode, message: String },
    #[error("validation failed: {0}")]
    Validation(String),
    /// Lost race on a constraint or a terminal-state transition; retryable.
    #[error("concurrency conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl EngineError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { entity, id: id.into() }
    }

    pub fn policy(code: PolicyCode, message: impl Into<String>) -> Self {
        Self::PolicyViolation { code, message: message.into() }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Maps a unique-constraint violation onto `Conflict`; everything else
/// stays a fatal store error.
pub fn map_unique_violation(err: sqlx::Error, message: &str) -> EngineError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            return EngineError::Conflict(message.to_string());
        }
    }
    EngineError::Database(err)
}

impl From<validator::ValidationErrors> for EngineError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let fields = errors
            .field_errors()
            .into_iter()
            .map(|(field, issues)| {
                let detail = issues
                    .iter()
                    .filter_map(|issue| issue.message.as_ref().map(ToString::to_string))
                    .collect::<Vec<_>>()
                    .join(", ");
                if detail.is_empty() {
                    field.to_string()
                } else {
                    format!("{field}: {detail}")
                }
            })
            .collect::<Vec<_>>()
            .join("; ");
        EngineError::Validation(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_codes_render_snake_case() {
        assert_eq!(PolicyCode::AttemptLimitReached.as_str(), "attempt_limit_reached");
        assert_eq!(PolicyCode::CooldownActive.as_str(), "cooldown_active");
    }

    #[test]
    fn only_conflicts_are_retryable() {
        assert!(EngineError::Conflict("race".to_string()).is_retryable());
        assert!(!EngineError::not_found("question", "q1").is_retryable());
        assert!(!EngineError::InvalidState("already checked".to_string()).is_retryable());
    }
}
