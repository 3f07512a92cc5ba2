//! Core domain logic for Trellis boards.
//! This crate is the single source of truth for ordering and board-graph
//! invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod ordering;
pub mod repo;
pub mod service;

pub use config::{ConfigError, CoreConfig, OrderingConfig};
pub use db::{open_db, open_db_in_memory, DbError};
pub use logging::{
    default_log_level, init_from_config, init_logging, logging_status, LoggingError,
    LoggingStatus,
};
pub use model::board::{
    ActorId, BackgroundColor, Board, BoardId, BoardList, BoardRole, Card, CardId, Label,
    LabelId, ListId, NewBoard, ValidationError, Visibility,
};
pub use model::template::{
    BoardTemplate, BuiltinTemplate, CardDescriptor, LabelDescriptor, ListDescriptor, NewTemplate,
    TemplateId, TemplateSnapshot, BUILTIN_TEMPLATES,
};
pub use ordering::{KeySpace, KeySpaceError, OrderKey};
pub use repo::container_repo::{
    BatchOutcome, ContainerRef, EntityRef, OrderedContainerRepository, OrderedEntry,
    SqliteContainerRepository,
};
pub use repo::member_repo::{BoardAuthorizer, BoardMember};
pub use repo::{EntityKind, RepoError, RepoResult};
pub use service::board_service::BoardService;
pub use service::move_service::{MoveCardRequest, MoveCoordinator};
pub use service::reorder_service::{
    BulkReorderApplier, CardSortOrder, ReorderEntry, ReorderReceipt,
};
pub use service::template_service::TemplateMaterializer;
pub use service::{ServiceError, ServiceResult};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
