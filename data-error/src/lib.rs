use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProfileError>;

#[derive(Error, Debug)]
pub enum ProfileError {
    /// A payload field is missing, malformed or not allowed.
    #[error("{message}")]
    Validation { field: String, message: String },
    #[error("{0}")]
    AgeRestriction(String),
    #[error("User not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    Upload(String),
    #[error("Storage error: {0} {1}")]
    Storage(String, String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parsing error: {0}")]
    Parse(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ProfileError {
    pub fn validation(
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Name of the offending field, for validation failures only.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Validation { field, .. } => Some(field),
            _ => None,
        }
    }

    /// Whether the failure was caused by the caller rather than the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. }
                | Self::AgeRestriction(_)
                | Self::NotFound(_)
                | Self::Upload(_)
        )
    }
}

impl From<serde_json::Error> for ProfileError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e.to_string())
    }
}
