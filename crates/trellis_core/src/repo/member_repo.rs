//! Board membership lookups and the authorization seam.
//!
//! # Responsibility
//! - Answer "does actor X hold at least role R on board B".
//! - List the members of one board.
//!
//! # Invariants
//! - Roles are hierarchical; holding `Owner` satisfies an `Admin` check.
//! - A missing membership row means no access, never an error.

use crate::model::board::{ActorId, BoardId, BoardRole};
use crate::repo::{ensure_connection_ready, parse_uuid, RepoError, RepoResult};
use rusqlite::{Connection, OptionalExtension};

/// Answers role checks for commands that mutate a board.
pub trait BoardAuthorizer {
    /// Whether `actor_uuid` holds `required` (or a higher role) on the board.
    fn has_role(
        &self,
        actor_uuid: ActorId,
        board_uuid: BoardId,
        required: BoardRole,
    ) -> RepoResult<bool>;
}

impl<A: BoardAuthorizer + ?Sized> BoardAuthorizer for &A {
    fn has_role(
        &self,
        actor_uuid: ActorId,
        board_uuid: BoardId,
        required: BoardRole,
    ) -> RepoResult<bool> {
        (**self).has_role(actor_uuid, board_uuid, required)
    }
}

/// One membership row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardMember {
    pub board_uuid: BoardId,
    pub actor_uuid: ActorId,
    pub role: BoardRole,
    pub joined_at: i64,
}

pub trait MembershipRepository {
    fn role_of(&self, actor_uuid: ActorId, board_uuid: BoardId) -> RepoResult<Option<BoardRole>>;
    /// Members ordered by join time.
    fn list_members(&self, board_uuid: BoardId) -> RepoResult<Vec<BoardMember>>;
}

/// SQLite-backed membership repository.
pub struct SqliteMembershipRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteMembershipRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }

    pub(crate) fn attach(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl MembershipRepository for SqliteMembershipRepository<'_> {
    fn role_of(&self, actor_uuid: ActorId, board_uuid: BoardId) -> RepoResult<Option<BoardRole>> {
        let stored: Option<String> = self
            .conn
            .query_row(
                "SELECT role FROM board_members WHERE board_uuid = ?1 AND actor_uuid = ?2;",
                [board_uuid.to_string(), actor_uuid.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        stored.map(|value| parse_role(&value)).transpose()
    }

    fn list_members(&self, board_uuid: BoardId) -> RepoResult<Vec<BoardMember>> {
        let mut stmt = self.conn.prepare(
            "SELECT actor_uuid, role, joined_at
             FROM board_members
             WHERE board_uuid = ?1
             ORDER BY joined_at ASC, rowid ASC;",
        )?;
        let mut rows = stmt.query([board_uuid.to_string()])?;

        let mut members = Vec::new();
        while let Some(row) = rows.next()? {
            let actor: String = row.get(0)?;
            let role: String = row.get(1)?;
            members.push(BoardMember {
                board_uuid,
                actor_uuid: parse_uuid(&actor, "board_members.actor_uuid")?,
                role: parse_role(&role)?,
                joined_at: row.get(2)?,
            });
        }
        Ok(members)
    }
}

impl BoardAuthorizer for SqliteMembershipRepository<'_> {
    fn has_role(
        &self,
        actor_uuid: ActorId,
        board_uuid: BoardId,
        required: BoardRole,
    ) -> RepoResult<bool> {
        Ok(self
            .role_of(actor_uuid, board_uuid)?
            .is_some_and(|role| role.satisfies(required)))
    }
}

fn parse_role(value: &str) -> RepoResult<BoardRole> {
    BoardRole::parse(value).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid role `{value}` in board_members.role"))
    })
}
