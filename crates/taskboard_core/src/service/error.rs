//! Service-layer error type.

use crate::repo::{EntityKind, RepoError};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors from service use-cases.
#[derive(Debug)]
pub enum ServiceError {
    /// Name is blank after whitespace normalization.
    BlankName(EntityKind),
    /// Name exceeds the character limit.
    NameTooLong { kind: EntityKind, max_chars: usize },
    /// Default list configuration repeats a name.
    DuplicateDefaultList(String),
    /// Recipient handle is blank.
    BlankRecipient,
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl ServiceError {
    /// Underlying repository error, when the failure came from storage.
    pub fn repo(&self) -> Option<&RepoError> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }

    /// Whether the caller may retry the whole operation unchanged.
    pub fn is_transient(&self) -> bool {
        self.repo().is_some_and(RepoError::is_transient)
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankName(kind) => write!(f, "{kind} name must not be blank"),
            Self::NameTooLong { kind, max_chars } => {
                write!(f, "{kind} name must be at most {max_chars} characters")
            }
            Self::DuplicateDefaultList(name) => {
                write!(f, "default list `{name}` is configured more than once")
            }
            Self::BlankRecipient => write!(f, "recipient must not be blank"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}
