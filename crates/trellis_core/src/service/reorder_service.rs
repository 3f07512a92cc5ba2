//! Bulk reordering of one container.
//!
//! # Responsibility
//! - Apply a client-supplied `(id, key)` ordering in one pass.
//! - Sort a list's cards by a named criterion.
//! - Expose renumbering as an authorized maintenance command.
//!
//! # Invariants
//! - Entries whose id is not a member of the container are skipped, never
//!   written and never reported as errors.
//! - Supplied keys are written as-is: duplicates are kept and rendering falls
//!   back to the creation-time tie-break.
//! - Reapplying the same entries leaves the same ordering.

use crate::db::with_immediate_tx;
use crate::model::board::{ActorId, BoardId, BoardRole, ListId, ValidationError};
use crate::ordering::{KeySpace, OrderKey};
use crate::repo::board_repo::{BoardRepository, SqliteBoardRepository};
use crate::repo::container_repo::{
    ContainerRef, OrderedContainerRepository, SqliteContainerRepository,
};
use crate::repo::member_repo::{BoardAuthorizer, SqliteMembershipRepository};
use crate::repo::EntityKind;
use crate::service::{require_role, ServiceError, ServiceResult};
use log::{error, info};
use rusqlite::Connection;
use std::time::Instant;
use uuid::Uuid;

/// One requested `(id, key)` pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReorderEntry {
    pub id: Uuid,
    pub position: OrderKey,
}

impl ReorderEntry {
    pub fn new(id: Uuid, position: OrderKey) -> Self {
        Self { id, position }
    }
}

/// What a bulk reorder did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReorderReceipt {
    pub applied: usize,
    pub skipped: usize,
}

/// Sort criteria for a list's cards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardSortOrder {
    /// Oldest first.
    CreatedAsc,
    /// Newest first.
    CreatedDesc,
    /// Case-insensitive title, then creation time.
    TitleAsc,
}

impl CardSortOrder {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "created_asc" => Some(Self::CreatedAsc),
            "created_desc" => Some(Self::CreatedDesc),
            "title_asc" => Some(Self::TitleAsc),
            _ => None,
        }
    }
}

/// Applies orderings to one container at a time.
pub struct BulkReorderApplier<'conn, A = SqliteMembershipRepository<'conn>> {
    conn: &'conn Connection,
    boards: SqliteBoardRepository<'conn>,
    containers: SqliteContainerRepository<'conn>,
    authorizer: A,
    key_space: KeySpace,
}

impl<'conn> BulkReorderApplier<'conn> {
    /// Creates an applier that authorizes against stored memberships.
    pub fn try_new(conn: &'conn Connection) -> ServiceResult<Self> {
        Self::with_authorizer(conn, SqliteMembershipRepository::attach(conn))
    }
}

impl<'conn, A: BoardAuthorizer> BulkReorderApplier<'conn, A> {
    /// Creates an applier with a custom authorization source.
    pub fn with_authorizer(conn: &'conn Connection, authorizer: A) -> ServiceResult<Self> {
        Ok(Self {
            conn,
            boards: SqliteBoardRepository::try_new(conn)?,
            containers: SqliteContainerRepository::attach(conn),
            authorizer,
            key_space: KeySpace::default(),
        })
    }

    pub fn with_key_space(mut self, key_space: KeySpace) -> Self {
        self.key_space = key_space;
        self
    }

    /// Overwrites the keys of the container's listed members.
    ///
    /// # Errors
    /// Checked in this order, before any write:
    /// - `NotFound` when the container does not exist.
    /// - `PermissionDenied` when the actor is not a member of its board.
    /// - `Validation` when `entries` is empty or a position is not finite
    ///   (field `entries[i].position`).
    pub fn bulk_reorder(
        &self,
        container: ContainerRef,
        entries: &[ReorderEntry],
        actor: ActorId,
    ) -> ServiceResult<ReorderReceipt> {
        let started_at = Instant::now();
        let result = with_immediate_tx(self.conn, |_| -> ServiceResult<ReorderReceipt> {
            let board_uuid = self.container_board(container)?;
            require_role(&self.authorizer, actor, board_uuid, BoardRole::Member)?;
            validate_entries(entries)?;
            let updates: Vec<(Uuid, OrderKey)> = entries
                .iter()
                .map(|entry| (entry.id, entry.position))
                .collect();
            let outcome = self.containers.write_positions_batch(container, &updates)?;
            Ok(ReorderReceipt {
                applied: outcome.applied,
                skipped: outcome.skipped,
            })
        });
        match &result {
            Ok(receipt) => info!(
                "event=bulk_reorder module=service status=ok container_kind={} applied={} skipped={} duration_ms={}",
                container.kind(),
                receipt.applied,
                receipt.skipped,
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=bulk_reorder module=service status=error container_kind={} error_code={} duration_ms={}",
                container.kind(),
                err.code(),
                started_at.elapsed().as_millis()
            ),
        }
        result
    }

    /// Rewrites the list's card keys so they render in `order`. Archived
    /// cards take part so they keep a consistent slot when restored.
    pub fn sort_cards(
        &self,
        list_uuid: ListId,
        order: CardSortOrder,
        actor: ActorId,
    ) -> ServiceResult<usize> {
        let container = ContainerRef::List(list_uuid);
        with_immediate_tx(self.conn, |_| -> ServiceResult<usize> {
            let board_uuid = self.container_board(container)?;
            require_role(&self.authorizer, actor, board_uuid, BoardRole::Member)?;

            let mut cards = Vec::new();
            for entry in self.containers.list_ordered(container, true)? {
                let card = self
                    .boards
                    .get_card(entry.id)?
                    .ok_or(ServiceError::not_found(EntityKind::Card, entry.id))?;
                cards.push(card);
            }
            match order {
                CardSortOrder::CreatedAsc => cards.sort_by_key(|card| card.created_at),
                CardSortOrder::CreatedDesc => {
                    cards.sort_by_key(|card| std::cmp::Reverse(card.created_at))
                }
                CardSortOrder::TitleAsc => cards.sort_by_cached_key(|card| {
                    (card.title.to_lowercase(), card.created_at)
                }),
            }

            let updates: Vec<(Uuid, OrderKey)> = cards
                .iter()
                .zip(self.key_space.renumber(cards.len()))
                .map(|(card, key)| (card.card_uuid, key))
                .collect();
            let outcome = self.containers.write_positions_batch(container, &updates)?;
            info!(
                "event=cards_sort module=service status=ok list={} count={}",
                list_uuid, outcome.applied
            );
            Ok(outcome.applied)
        })
    }

    /// Renumbers every member of the container with evenly spaced keys in
    /// current order. Requires `admin`.
    pub fn renumber_container(
        &self,
        container: ContainerRef,
        actor: ActorId,
    ) -> ServiceResult<usize> {
        with_immediate_tx(self.conn, |_| -> ServiceResult<usize> {
            let board_uuid = self.container_board(container)?;
            require_role(&self.authorizer, actor, board_uuid, BoardRole::Admin)?;
            Ok(self.containers.renumber(container, &self.key_space)?)
        })
    }

    fn container_board(&self, container: ContainerRef) -> ServiceResult<BoardId> {
        self.containers
            .container_board(container)?
            .ok_or(ServiceError::not_found(container.kind(), container.id()))
    }
}

fn validate_entries(entries: &[ReorderEntry]) -> ServiceResult<()> {
    if entries.is_empty() {
        return Err(ValidationError::new("entries", "must not be empty").into());
    }
    for (index, entry) in entries.iter().enumerate() {
        if !entry.position.is_finite() {
            return Err(ValidationError::new(
                format!("entries[{index}].position"),
                "must be a finite number",
            )
            .into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{validate_entries, CardSortOrder, ReorderEntry};
    use crate::service::ServiceError;
    use uuid::Uuid;

    #[test]
    fn validate_entries_names_the_offending_index() {
        let entries = [
            ReorderEntry::new(Uuid::new_v4(), 1.0),
            ReorderEntry::new(Uuid::new_v4(), f64::INFINITY),
        ];
        match validate_entries(&entries) {
            Err(ServiceError::Validation(err)) => assert_eq!(err.field, "entries[1].position"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn validate_entries_rejects_empty_batch() {
        assert!(matches!(
            validate_entries(&[]),
            Err(ServiceError::Validation(_))
        ));
    }

    #[test]
    fn sort_order_parses_cli_names() {
        assert_eq!(
            CardSortOrder::parse("title_asc"),
            Some(CardSortOrder::TitleAsc)
        );
        assert_eq!(CardSortOrder::parse("random"), None);
    }
}
