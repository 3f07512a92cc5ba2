//! Ordered sibling access for lists within a board and cards within a list.
//!
//! # Responsibility
//! - Read one container's members in rendering order.
//! - Write single and batched order keys, and card placement (list + key).
//! - Resolve the owning board of every ordered entity explicitly, per
//!   variant.
//!
//! # Invariants
//! - Ordering is `position ASC, created_at ASC, rowid ASC`; `rowid` breaks
//!   ties between rows created in the same millisecond.
//! - A batch only touches rows whose parent is the stated container; other
//!   ids are skipped and counted.
//! - Batches are applied in a single transaction: the caller's, if one is
//!   open, otherwise an immediate transaction owned by the batch.

use crate::db::with_immediate_tx;
use crate::model::board::{BoardId, CardId, ListId};
use crate::ordering::{KeySpace, OrderKey};
use crate::repo::{ensure_connection_ready, parse_uuid, EntityKind, RepoError, RepoResult};
use log::debug;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

/// A parent whose children carry order keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerRef {
    /// Lists of one board.
    Board(BoardId),
    /// Cards of one list.
    List(ListId),
}

/// One ordered entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityRef {
    List(ListId),
    Card(CardId),
}

/// Table layout of one sibling family.
struct SiblingTable {
    table: &'static str,
    id_column: &'static str,
    parent_column: &'static str,
    column_prefix: &'static str,
}

const LIST_SIBLINGS: SiblingTable = SiblingTable {
    table: "lists",
    id_column: "list_uuid",
    parent_column: "board_uuid",
    column_prefix: "lists",
};

const CARD_SIBLINGS: SiblingTable = SiblingTable {
    table: "cards",
    id_column: "card_uuid",
    parent_column: "list_uuid",
    column_prefix: "cards",
};

impl ContainerRef {
    pub fn id(self) -> Uuid {
        match self {
            Self::Board(id) | Self::List(id) => id,
        }
    }

    pub fn kind(self) -> EntityKind {
        match self {
            Self::Board(_) => EntityKind::Board,
            Self::List(_) => EntityKind::List,
        }
    }

    /// Kind of the ordered children.
    pub fn member_kind(self) -> EntityKind {
        match self {
            Self::Board(_) => EntityKind::List,
            Self::List(_) => EntityKind::Card,
        }
    }

    fn siblings(self) -> &'static SiblingTable {
        match self {
            Self::Board(_) => &LIST_SIBLINGS,
            Self::List(_) => &CARD_SIBLINGS,
        }
    }
}

impl EntityRef {
    pub fn id(self) -> Uuid {
        match self {
            Self::List(id) | Self::Card(id) => id,
        }
    }

    pub fn kind(self) -> EntityKind {
        match self {
            Self::List(_) => EntityKind::List,
            Self::Card(_) => EntityKind::Card,
        }
    }

    fn siblings(self) -> &'static SiblingTable {
        match self {
            Self::List(_) => &LIST_SIBLINGS,
            Self::Card(_) => &CARD_SIBLINGS,
        }
    }
}

/// One sibling in rendering order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderedEntry {
    pub id: Uuid,
    pub position: OrderKey,
    /// Epoch ms creation timestamp (secondary sort key).
    pub created_at: i64,
}

/// Result of a batched position write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchOutcome {
    /// Rows whose key was overwritten.
    pub applied: usize,
    /// Pairs ignored because the id is not a member of the container.
    pub skipped: usize,
}

/// Ordered access to one container's members.
pub trait OrderedContainerRepository {
    fn container_exists(&self, container: ContainerRef) -> RepoResult<bool>;
    /// Board that owns the container (the board itself for `Board`).
    fn container_board(&self, container: ContainerRef) -> RepoResult<Option<BoardId>>;
    /// Board that owns the entity: a list's board, or a card's list's board.
    fn owning_board(&self, entity: EntityRef) -> RepoResult<Option<BoardId>>;
    /// Container the entity currently belongs to.
    fn parent_of(&self, entity: EntityRef) -> RepoResult<Option<ContainerRef>>;
    /// Members in rendering order. Archived rows only when requested.
    fn list_ordered(
        &self,
        container: ContainerRef,
        include_archived: bool,
    ) -> RepoResult<Vec<OrderedEntry>>;
    /// Overwrites one entity's key.
    fn write_position(&self, entity: EntityRef, key: OrderKey) -> RepoResult<()>;
    /// Overwrites many keys of one container in a single transaction.
    fn write_positions_batch(
        &self,
        container: ContainerRef,
        updates: &[(Uuid, OrderKey)],
    ) -> RepoResult<BatchOutcome>;
    /// Reassigns a card's list and key in one statement.
    fn place_card(&self, card_uuid: CardId, list_uuid: ListId, key: OrderKey) -> RepoResult<()>;
    /// Rewrites every member (archived included) with evenly spaced keys in
    /// current order. Returns the number of rows renumbered.
    fn renumber(&self, container: ContainerRef, key_space: &KeySpace) -> RepoResult<usize>;
}

/// SQLite-backed ordered container repository.
pub struct SqliteContainerRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteContainerRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }

    pub(crate) fn attach(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl OrderedContainerRepository for SqliteContainerRepository<'_> {
    fn container_exists(&self, container: ContainerRef) -> RepoResult<bool> {
        Ok(self.container_board(container)?.is_some())
    }

    fn container_board(&self, container: ContainerRef) -> RepoResult<Option<BoardId>> {
        match container {
            ContainerRef::Board(board_uuid) => {
                let found: Option<String> = self
                    .conn
                    .query_row(
                        "SELECT board_uuid FROM boards WHERE board_uuid = ?1;",
                        [board_uuid.to_string()],
                        |row| row.get(0),
                    )
                    .optional()?;
                found
                    .map(|value| parse_uuid(&value, "boards.board_uuid"))
                    .transpose()
            }
            ContainerRef::List(list_uuid) => self.owning_board(EntityRef::List(list_uuid)),
        }
    }

    fn owning_board(&self, entity: EntityRef) -> RepoResult<Option<BoardId>> {
        let (sql, column) = match entity {
            EntityRef::List(_) => (
                "SELECT board_uuid FROM lists WHERE list_uuid = ?1;",
                "lists.board_uuid",
            ),
            EntityRef::Card(_) => (
                "SELECT l.board_uuid
                 FROM cards c
                 INNER JOIN lists l ON l.list_uuid = c.list_uuid
                 WHERE c.card_uuid = ?1;",
                "lists.board_uuid",
            ),
        };
        let found: Option<String> = self
            .conn
            .query_row(sql, [entity.id().to_string()], |row| row.get(0))
            .optional()?;
        found.map(|value| parse_uuid(&value, column)).transpose()
    }

    fn parent_of(&self, entity: EntityRef) -> RepoResult<Option<ContainerRef>> {
        let siblings = entity.siblings();
        let found: Option<String> = self
            .conn
            .query_row(
                &format!(
                    "SELECT {parent} FROM {table} WHERE {id} = ?1;",
                    parent = siblings.parent_column,
                    table = siblings.table,
                    id = siblings.id_column,
                ),
                [entity.id().to_string()],
                |row| row.get(0),
            )
            .optional()?;
        let Some(value) = found else {
            return Ok(None);
        };
        let parent = parse_uuid(&value, siblings.column_prefix)?;
        Ok(Some(match entity {
            EntityRef::List(_) => ContainerRef::Board(parent),
            EntityRef::Card(_) => ContainerRef::List(parent),
        }))
    }

    fn list_ordered(
        &self,
        container: ContainerRef,
        include_archived: bool,
    ) -> RepoResult<Vec<OrderedEntry>> {
        let siblings = container.siblings();
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {id}, position, created_at
             FROM {table}
             WHERE {parent} = ?1
               AND (?2 = 1 OR archived = 0)
             ORDER BY position ASC, created_at ASC, rowid ASC;",
            id = siblings.id_column,
            table = siblings.table,
            parent = siblings.parent_column,
        ))?;
        let mut rows = stmt.query(params![
            container.id().to_string(),
            i64::from(include_archived)
        ])?;

        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            let id_text: String = row.get(0)?;
            entries.push(OrderedEntry {
                id: parse_uuid(&id_text, siblings.column_prefix)?,
                position: row.get(1)?,
                created_at: row.get(2)?,
            });
        }
        Ok(entries)
    }

    fn write_position(&self, entity: EntityRef, key: OrderKey) -> RepoResult<()> {
        let siblings = entity.siblings();
        let changed = self.conn.execute(
            &format!(
                "UPDATE {table}
                 SET position = ?2,
                     updated_at = (CAST((julianday('now') - 2440587.5) * 86400000.0 AS INTEGER))
                 WHERE {id} = ?1;",
                table = siblings.table,
                id = siblings.id_column,
            ),
            params![entity.id().to_string(), key],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                kind: entity.kind(),
                id: entity.id(),
            });
        }
        Ok(())
    }

    fn write_positions_batch(
        &self,
        container: ContainerRef,
        updates: &[(Uuid, OrderKey)],
    ) -> RepoResult<BatchOutcome> {
        let siblings = container.siblings();
        let sql = format!(
            "UPDATE {table}
             SET position = ?3,
                 updated_at = (CAST((julianday('now') - 2440587.5) * 86400000.0 AS INTEGER))
             WHERE {id} = ?1
               AND {parent} = ?2;",
            table = siblings.table,
            id = siblings.id_column,
            parent = siblings.parent_column,
        );
        let container_id = container.id().to_string();

        let outcome = with_immediate_tx(self.conn, |conn| -> RepoResult<BatchOutcome> {
            let mut stmt = conn.prepare(&sql)?;
            let mut outcome = BatchOutcome::default();
            for (id, key) in updates {
                let changed = stmt.execute(params![id.to_string(), container_id, key])?;
                if changed == 0 {
                    outcome.skipped += 1;
                } else {
                    outcome.applied += 1;
                }
            }
            Ok(outcome)
        })?;

        debug!(
            "event=positions_batch module=repo status=ok container_kind={} applied={} skipped={}",
            container.kind(),
            outcome.applied,
            outcome.skipped
        );
        Ok(outcome)
    }

    fn place_card(&self, card_uuid: CardId, list_uuid: ListId, key: OrderKey) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE cards
             SET list_uuid = ?2,
                 position = ?3,
                 updated_at = (CAST((julianday('now') - 2440587.5) * 86400000.0 AS INTEGER))
             WHERE card_uuid = ?1;",
            params![card_uuid.to_string(), list_uuid.to_string(), key],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                kind: EntityKind::Card,
                id: card_uuid,
            });
        }
        Ok(())
    }

    fn renumber(&self, container: ContainerRef, key_space: &KeySpace) -> RepoResult<usize> {
        with_immediate_tx(self.conn, |_| -> RepoResult<usize> {
            let entries = self.list_ordered(container, true)?;
            let keys = key_space.renumber(entries.len());
            let updates: Vec<(Uuid, OrderKey)> = entries
                .iter()
                .zip(keys)
                .map(|(entry, key)| (entry.id, key))
                .collect();
            let outcome = self.write_positions_batch(container, &updates)?;
            debug!(
                "event=container_renumber module=repo status=ok container_kind={} count={}",
                container.kind(),
                outcome.applied
            );
            Ok(outcome.applied)
        })
    }
}
