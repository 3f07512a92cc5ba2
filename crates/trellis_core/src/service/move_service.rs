//! Card moves between and within lists.
//!
//! # Responsibility
//! - Move one card to a target list at a requested key or slot.
//! - Move every active card of one list to the end of another.
//!
//! # Invariants
//! - A card belongs to exactly one list at every observable instant: list
//!   and key change in one statement inside one immediate transaction.
//! - The actor must hold `member` on the card's current board and on the
//!   target list's board; a failed check mutates nothing.
//! - A move within the same list is a pure reorder.
//! - A card moved to another board loses the labels of its old board.

use crate::db::with_immediate_tx;
use crate::model::board::{ActorId, BoardId, BoardRole, CardId, ListId, ValidationError};
use crate::ordering::{KeySpace, OrderKey};
use crate::repo::board_repo::{BoardRepository, SqliteBoardRepository};
use crate::repo::container_repo::{
    ContainerRef, EntityRef, OrderedContainerRepository, SqliteContainerRepository,
};
use crate::repo::member_repo::{BoardAuthorizer, SqliteMembershipRepository};
use crate::repo::EntityKind;
use crate::service::{
    append_key_with_recovery, renumber_for_recovery, require_role, ServiceError, ServiceResult,
};
use log::{error, info};
use rusqlite::Connection;
use std::time::Instant;

/// Request to move one card to `position` inside `target_list_id`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveCardRequest {
    pub card_id: CardId,
    pub target_list_id: ListId,
    pub position: OrderKey,
}

/// Coordinates card moves across containers.
pub struct MoveCoordinator<'conn, A = SqliteMembershipRepository<'conn>> {
    conn: &'conn Connection,
    boards: SqliteBoardRepository<'conn>,
    containers: SqliteContainerRepository<'conn>,
    authorizer: A,
    key_space: KeySpace,
}

impl<'conn> MoveCoordinator<'conn> {
    /// Creates a coordinator that authorizes against stored memberships.
    pub fn try_new(conn: &'conn Connection) -> ServiceResult<Self> {
        Self::with_authorizer(conn, SqliteMembershipRepository::attach(conn))
    }
}

impl<'conn, A: BoardAuthorizer> MoveCoordinator<'conn, A> {
    /// Creates a coordinator with a custom authorization source.
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

    /// Moves a card to the target list with the caller's key.
    ///
    /// # Errors
    /// - `Validation` (field `position`) for NaN or infinite keys.
    /// - `NotFound` for a missing card, then for a missing target list.
    /// - `PermissionDenied` when the actor is not a member of either board.
    pub fn move_card(&self, request: &MoveCardRequest, actor: ActorId) -> ServiceResult<()> {
        if !request.position.is_finite() {
            return Err(ValidationError::new("position", "must be a finite number").into());
        }

        let started_at = Instant::now();
        let result = with_immediate_tx(self.conn, |_| -> ServiceResult<()> {
            let boards = self.authorize_move(request.card_id, request.target_list_id, actor)?;
            self.containers.place_card(
                request.card_id,
                request.target_list_id,
                request.position,
            )?;
            self.drop_foreign_labels(request.card_id, boards)
        });
        log_move("card_move", request.card_id, started_at, &result);
        result
    }

    /// Moves a card so it renders at `index` among the target list's active
    /// cards (the moved card excluded). Returns the key it received.
    ///
    /// When the slot has no representable key left the target list is
    /// renumbered inside the same transaction and the slot recomputed.
    pub fn move_card_to_index(
        &self,
        card_uuid: CardId,
        target_list_uuid: ListId,
        index: usize,
        actor: ActorId,
    ) -> ServiceResult<OrderKey> {
        let started_at = Instant::now();
        let result = with_immediate_tx(self.conn, |_| -> ServiceResult<OrderKey> {
            let boards = self.authorize_move(card_uuid, target_list_uuid, actor)?;
            let target = ContainerRef::List(target_list_uuid);
            let key = match self
                .key_space
                .key_for_slot(&self.sibling_keys(target, card_uuid)?, index)
            {
                Ok(key) => key,
                Err(err) if err.is_exhausted() => {
                    renumber_for_recovery(&self.containers, target, &self.key_space)?;
                    self.key_space
                        .key_for_slot(&self.sibling_keys(target, card_uuid)?, index)?
                }
                Err(err) => return Err(err.into()),
            };
            self.containers
                .place_card(card_uuid, target_list_uuid, key)?;
            self.drop_foreign_labels(card_uuid, boards)?;
            Ok(key)
        });
        log_move("card_move_to_index", card_uuid, started_at, &result);
        result
    }

    /// Moves every active card of `source_list_uuid` to the end of
    /// `target_list_uuid`, keeping their relative order. Returns the number
    /// of cards moved.
    pub fn move_all_cards(
        &self,
        source_list_uuid: ListId,
        target_list_uuid: ListId,
        actor: ActorId,
    ) -> ServiceResult<usize> {
        let started_at = Instant::now();
        let result = with_immediate_tx(self.conn, |_| -> ServiceResult<usize> {
            let source_board = self.list_board(source_list_uuid)?;
            let target_board = self.list_board(target_list_uuid)?;
            self.require_member_of(actor, source_board, target_board)?;
            if source_list_uuid == target_list_uuid {
                return Ok(0);
            }

            let source = ContainerRef::List(source_list_uuid);
            let target = ContainerRef::List(target_list_uuid);
            let cards = self.containers.list_ordered(source, false)?;
            for card in &cards {
                let key = append_key_with_recovery(&self.containers, target, &self.key_space)?;
                self.containers
                    .place_card(card.id, target_list_uuid, key)?;
                self.drop_foreign_labels(card.id, (source_board, target_board))?;
            }
            Ok(cards.len())
        });
        match &result {
            Ok(count) => info!(
                "event=cards_move_all module=service status=ok source={} target={} count={} duration_ms={}",
                source_list_uuid,
                target_list_uuid,
                count,
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=cards_move_all module=service status=error source={} target={} error_code={} duration_ms={}",
                source_list_uuid,
                target_list_uuid,
                err.code(),
                started_at.elapsed().as_millis()
            ),
        }
        result
    }

    fn authorize_move(
        &self,
        card_uuid: CardId,
        target_list_uuid: ListId,
        actor: ActorId,
    ) -> ServiceResult<(BoardId, BoardId)> {
        let source_board = self
            .containers
            .owning_board(EntityRef::Card(card_uuid))?
            .ok_or(ServiceError::not_found(EntityKind::Card, card_uuid))?;
        let target_board = self.list_board(target_list_uuid)?;
        self.require_member_of(actor, source_board, target_board)?;
        Ok((source_board, target_board))
    }

    /// Labels are board-scoped; a card leaving its board leaves its labels.
    fn drop_foreign_labels(
        &self,
        card_uuid: CardId,
        (source_board, target_board): (BoardId, BoardId),
    ) -> ServiceResult<()> {
        if source_board != target_board {
            self.boards.detach_labels_outside(card_uuid, target_board)?;
        }
        Ok(())
    }

    fn require_member_of(
        &self,
        actor: ActorId,
        source_board: BoardId,
        target_board: BoardId,
    ) -> ServiceResult<()> {
        require_role(&self.authorizer, actor, source_board, BoardRole::Member)?;
        if target_board != source_board {
            require_role(&self.authorizer, actor, target_board, BoardRole::Member)?;
        }
        Ok(())
    }

    fn list_board(&self, list_uuid: ListId) -> ServiceResult<BoardId> {
        self.containers
            .container_board(ContainerRef::List(list_uuid))?
            .ok_or(ServiceError::not_found(EntityKind::List, list_uuid))
    }

    fn sibling_keys(&self, target: ContainerRef, moving: CardId) -> ServiceResult<Vec<OrderKey>> {
        Ok(self
            .containers
            .list_ordered(target, false)?
            .into_iter()
            .filter(|entry| entry.id != moving)
            .map(|entry| entry.position)
            .collect())
    }
}

fn log_move<T>(event: &str, card_uuid: CardId, started_at: Instant, result: &ServiceResult<T>) {
    match result {
        Ok(_) => info!(
            "event={} module=service status=ok card={} duration_ms={}",
            event,
            card_uuid,
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event={} module=service status=error card={} error_code={} duration_ms={}",
            event,
            card_uuid,
            err.code(),
            started_at.elapsed().as_millis()
        ),
    }
}
