//! Service-level error shared by every board command.
//!
//! # Invariants
//! - `code()` is stable and is what outer layers map to response codes.
//! - Repository not-found and validation failures are lifted into the
//!   matching service variants; anything else stays a server error.

use crate::model::board::{ActorId, BoardId, ValidationError};
use crate::model::template::TemplateId;
use crate::ordering::KeySpaceError;
use crate::repo::{EntityKind, RepoError};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug)]
pub enum ServiceError {
    /// Referenced entity does not exist.
    NotFound { kind: EntityKind, id: Uuid },
    /// Actor lacks the required role on the board.
    PermissionDenied { actor: ActorId, board: BoardId },
    /// Input failed field validation.
    Validation(ValidationError),
    /// Template expansion failed and was rolled back.
    Materialization {
        template: Option<TemplateId>,
        source: Box<ServiceError>,
    },
    /// Key assignment failed even after renumbering.
    Ordering(KeySpaceError),
    /// Storage failure.
    Repo(RepoError),
}

impl ServiceError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::PermissionDenied { .. } => "permission_denied",
            Self::Validation(_) => "validation_error",
            Self::Materialization { .. } | Self::Ordering(_) | Self::Repo(_) => "server_error",
        }
    }

    pub(crate) fn not_found(kind: EntityKind, id: Uuid) -> Self {
        Self::NotFound { kind, id }
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { kind, id } => write!(f, "{kind} not found: {id}"),
            Self::PermissionDenied { actor, board } => {
                write!(f, "actor {actor} is not allowed to modify board {board}")
            }
            Self::Validation(err) => write!(f, "{err}"),
            Self::Materialization {
                template: Some(template),
                source,
            } => write!(f, "failed to materialize template {template}: {source}"),
            Self::Materialization {
                template: None,
                source,
            } => write!(f, "failed to materialize snapshot: {source}"),
            Self::Ordering(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Materialization { source, .. } => Some(source.as_ref()),
            Self::Ordering(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::NotFound { .. } | Self::PermissionDenied { .. } => None,
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { kind, id } => Self::NotFound { kind, id },
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

impl From<ValidationError> for ServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<KeySpaceError> for ServiceError {
    fn from(value: KeySpaceError) -> Self {
        Self::Ordering(value)
    }
}

impl From<rusqlite::Error> for ServiceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(RepoError::from(value))
    }
}

#[cfg(test)]
mod tests {
    use super::ServiceError;
    use crate::model::board::ValidationError;
    use crate::repo::{EntityKind, RepoError};
    use uuid::Uuid;

    #[test]
    fn repo_errors_are_lifted_to_service_codes() {
        let id = Uuid::new_v4();
        let missing = ServiceError::from(RepoError::NotFound {
            kind: EntityKind::Card,
            id,
        });
        assert_eq!(missing.code(), "not_found");

        let invalid = ServiceError::from(RepoError::Validation(ValidationError::new(
            "title",
            "must not be blank",
        )));
        assert_eq!(invalid.code(), "validation_error");

        let corrupt = ServiceError::from(RepoError::InvalidData("bad".to_string()));
        assert_eq!(corrupt.code(), "server_error");
    }

    #[test]
    fn materialization_wraps_cause_as_server_error() {
        let err = ServiceError::Materialization {
            template: None,
            source: Box::new(ServiceError::Validation(ValidationError::new(
                "title",
                "must not be blank",
            ))),
        };
        assert_eq!(err.code(), "server_error");
        assert!(err.to_string().contains("must not be blank"));
    }
}
