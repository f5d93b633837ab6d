use launderly_types::Role;

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("cannot {event} {entity} while it is {from}")]
    InvalidTransition {
        entity: &'static str,
        event: &'static str,
        from: String,
    },

    #[error("{0}")]
    InvalidState(String),

    /// Another request changed the row between our read and our write.
    #[error("{entity} {id} was changed by a concurrent request")]
    Conflict { entity: &'static str, id: String },

    #[error("invalid request: {0}")]
    Validation(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl LifecycleError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn conflict(entity: &'static str, id: impl ToString) -> Self {
        Self::Conflict {
            entity,
            id: id.to_string(),
        }
    }

    pub fn wrong_role(required: Role, event: &str) -> Self {
        Self::Forbidden(format!("only {} accounts may {}", required.as_str().to_lowercase(), event))
    }

    /// Stable machine-readable code for API clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::InvalidState(_) => "INVALID_STATE",
            Self::Conflict { .. } => "CONFLICT",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Storage(_) => "INTERNAL_ERROR",
        }
    }
}
