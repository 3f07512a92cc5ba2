//! Board graph entity construction and reads.
//!
//! # Responsibility
//! - Create boards, memberships, lists, cards and labels from validated
//!   drafts.
//! - Load single entities and board-scoped collections.
//!
//! # Invariants
//! - Drafts are normalized (`New*::normalized`) before any SQL runs.
//! - A label can only be attached to cards of the board that owns it.
//! - Deleting a row never renumbers its former siblings.

use crate::model::board::{
    ActorId, BackgroundColor, Board, BoardId, BoardList, BoardRole, Card, CardId, Label, LabelId,
    ListId, NewBoard, NewCard, NewLabel, NewList, ValidationError, Visibility,
};
use crate::repo::{
    ensure_connection_ready, flag_to_int, parse_flag, parse_uuid, EntityKind, RepoError,
    RepoResult,
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

const BOARD_SELECT_SQL: &str = "SELECT
    board_uuid,
    title,
    description,
    owner_uuid,
    visibility,
    background_color,
    created_at,
    updated_at
FROM boards";

const LIST_SELECT_SQL: &str = "SELECT
    list_uuid,
    board_uuid,
    title,
    position,
    archived,
    created_at,
    updated_at
FROM lists";

const CARD_SELECT_SQL: &str = "SELECT
    card_uuid,
    list_uuid,
    title,
    description,
    position,
    archived,
    created_by,
    created_at,
    updated_at
FROM cards";

const LABEL_SELECT_SQL: &str = "SELECT
    label_uuid,
    board_uuid,
    name,
    color,
    created_at
FROM labels";

/// Entity construction and lookup contract for the board graph.
pub trait BoardRepository {
    /// Creates one board row. Membership is registered separately.
    fn create_board(&self, board: &NewBoard) -> RepoResult<Board>;
    /// Inserts or replaces one membership row.
    fn add_member(&self, board_uuid: BoardId, actor_uuid: ActorId, role: BoardRole)
        -> RepoResult<()>;
    fn get_board(&self, board_uuid: BoardId) -> RepoResult<Option<Board>>;
    fn delete_board(&self, board_uuid: BoardId) -> RepoResult<()>;

    fn create_list(&self, list: &NewList) -> RepoResult<BoardList>;
    fn get_list(&self, list_uuid: ListId) -> RepoResult<Option<BoardList>>;
    fn set_list_archived(&self, list_uuid: ListId, archived: bool) -> RepoResult<()>;
    fn delete_list(&self, list_uuid: ListId) -> RepoResult<()>;

    fn create_card(&self, card: &NewCard) -> RepoResult<Card>;
    fn get_card(&self, card_uuid: CardId) -> RepoResult<Option<Card>>;
    fn set_card_archived(&self, card_uuid: CardId, archived: bool) -> RepoResult<()>;
    /// Archives every active card of one list and returns how many changed.
    fn archive_all_cards(&self, list_uuid: ListId) -> RepoResult<usize>;
    fn delete_card(&self, card_uuid: CardId) -> RepoResult<()>;

    fn create_label(&self, label: &NewLabel) -> RepoResult<Label>;
    /// Lists labels of one board sorted by name.
    fn list_labels(&self, board_uuid: BoardId) -> RepoResult<Vec<Label>>;
    fn attach_label(&self, card_uuid: CardId, label_uuid: LabelId) -> RepoResult<()>;
    fn card_label_ids(&self, card_uuid: CardId) -> RepoResult<Vec<LabelId>>;
    /// Drops the card's label links whose label is not on `board_uuid`.
    fn detach_labels_outside(&self, card_uuid: CardId, board_uuid: BoardId) -> RepoResult<usize>;
}

/// SQLite-backed board graph repository.
pub struct SqliteBoardRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteBoardRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl BoardRepository for SqliteBoardRepository<'_> {
    fn create_board(&self, board: &NewBoard) -> RepoResult<Board> {
        let board = board.clone().normalized()?;
        let board_uuid = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO boards (
                board_uuid,
                title,
                description,
                owner_uuid,
                visibility,
                background_color
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                board_uuid.to_string(),
                board.title,
                board.description,
                board.owner_uuid.to_string(),
                board.visibility.as_str(),
                board.background_color.as_str(),
            ],
        )?;
        self.get_board(board_uuid)?.ok_or(RepoError::NotFound {
            kind: EntityKind::Board,
            id: board_uuid,
        })
    }

    fn add_member(
        &self,
        board_uuid: BoardId,
        actor_uuid: ActorId,
        role: BoardRole,
    ) -> RepoResult<()> {
        if self.get_board(board_uuid)?.is_none() {
            return Err(RepoError::NotFound {
                kind: EntityKind::Board,
                id: board_uuid,
            });
        }
        self.conn.execute(
            "INSERT INTO board_members (board_uuid, actor_uuid, role)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (board_uuid, actor_uuid) DO UPDATE SET role = excluded.role;",
            params![
                board_uuid.to_string(),
                actor_uuid.to_string(),
                role.as_str()
            ],
        )?;
        Ok(())
    }

    fn get_board(&self, board_uuid: BoardId) -> RepoResult<Option<Board>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{BOARD_SELECT_SQL} WHERE board_uuid = ?1;"))?;
        let mut rows = stmt.query([board_uuid.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_board_row(row)?));
        }
        Ok(None)
    }

    fn delete_board(&self, board_uuid: BoardId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM boards WHERE board_uuid = ?1;",
            [board_uuid.to_string()],
        )?;
        ensure_changed(changed, EntityKind::Board, board_uuid)
    }

    fn create_list(&self, list: &NewList) -> RepoResult<BoardList> {
        let list = list.clone().normalized()?;
        if self.get_board(list.board_uuid)?.is_none() {
            return Err(RepoError::NotFound {
                kind: EntityKind::Board,
                id: list.board_uuid,
            });
        }
        let list_uuid = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO lists (list_uuid, board_uuid, title, position, archived)
             VALUES (?1, ?2, ?3, ?4, 0);",
            params![
                list_uuid.to_string(),
                list.board_uuid.to_string(),
                list.title,
                list.position,
            ],
        )?;
        self.get_list(list_uuid)?.ok_or(RepoError::NotFound {
            kind: EntityKind::List,
            id: list_uuid,
        })
    }

    fn get_list(&self, list_uuid: ListId) -> RepoResult<Option<BoardList>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{LIST_SELECT_SQL} WHERE list_uuid = ?1;"))?;
        let mut rows = stmt.query([list_uuid.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_list_row(row)?));
        }
        Ok(None)
    }

    fn set_list_archived(&self, list_uuid: ListId, archived: bool) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE lists
             SET archived = ?2,
                 updated_at = (CAST((julianday('now') - 2440587.5) * 86400000.0 AS INTEGER))
             WHERE list_uuid = ?1;",
            params![list_uuid.to_string(), flag_to_int(archived)],
        )?;
        ensure_changed(changed, EntityKind::List, list_uuid)
    }

    fn delete_list(&self, list_uuid: ListId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM lists WHERE list_uuid = ?1;",
            [list_uuid.to_string()],
        )?;
        ensure_changed(changed, EntityKind::List, list_uuid)
    }

    fn create_card(&self, card: &NewCard) -> RepoResult<Card> {
        let card = card.clone().normalized()?;
        if self.get_list(card.list_uuid)?.is_none() {
            return Err(RepoError::NotFound {
                kind: EntityKind::List,
                id: card.list_uuid,
            });
        }
        let card_uuid = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO cards (
                card_uuid,
                list_uuid,
                title,
                description,
                position,
                archived,
                created_by
            ) VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6);",
            params![
                card_uuid.to_string(),
                card.list_uuid.to_string(),
                card.title,
                card.description,
                card.position,
                card.created_by.to_string(),
            ],
        )?;
        self.get_card(card_uuid)?.ok_or(RepoError::NotFound {
            kind: EntityKind::Card,
            id: card_uuid,
        })
    }

    fn get_card(&self, card_uuid: CardId) -> RepoResult<Option<Card>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{CARD_SELECT_SQL} WHERE card_uuid = ?1;"))?;
        let mut rows = stmt.query([card_uuid.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_card_row(row)?));
        }
        Ok(None)
    }

    fn set_card_archived(&self, card_uuid: CardId, archived: bool) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE cards
             SET archived = ?2,
                 updated_at = (CAST((julianday('now') - 2440587.5) * 86400000.0 AS INTEGER))
             WHERE card_uuid = ?1;",
            params![card_uuid.to_string(), flag_to_int(archived)],
        )?;
        ensure_changed(changed, EntityKind::Card, card_uuid)
    }

    fn archive_all_cards(&self, list_uuid: ListId) -> RepoResult<usize> {
        if self.get_list(list_uuid)?.is_none() {
            return Err(RepoError::NotFound {
                kind: EntityKind::List,
                id: list_uuid,
            });
        }
        let changed = self.conn.execute(
            "UPDATE cards
             SET archived = 1,
                 updated_at = (CAST((julianday('now') - 2440587.5) * 86400000.0 AS INTEGER))
             WHERE list_uuid = ?1
               AND archived = 0;",
            [list_uuid.to_string()],
        )?;
        Ok(changed)
    }

    fn delete_card(&self, card_uuid: CardId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM cards WHERE card_uuid = ?1;",
            [card_uuid.to_string()],
        )?;
        ensure_changed(changed, EntityKind::Card, card_uuid)
    }

    fn create_label(&self, label: &NewLabel) -> RepoResult<Label> {
        let label = label.clone().normalized()?;
        if self.get_board(label.board_uuid)?.is_none() {
            return Err(RepoError::NotFound {
                kind: EntityKind::Board,
                id: label.board_uuid,
            });
        }
        let duplicate: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM labels WHERE board_uuid = ?1 AND name = ?2
            );",
            params![label.board_uuid.to_string(), label.name],
            |row| row.get(0),
        )?;
        if duplicate == 1 {
            return Err(ValidationError::new("name", "label name already used on this board").into());
        }

        let label_uuid = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO labels (label_uuid, board_uuid, name, color)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                label_uuid.to_string(),
                label.board_uuid.to_string(),
                label.name,
                label.color,
            ],
        )?;

        let mut stmt = self
            .conn
            .prepare(&format!("{LABEL_SELECT_SQL} WHERE label_uuid = ?1;"))?;
        let mut rows = stmt.query([label_uuid.to_string()])?;
        match rows.next()? {
            Some(row) => parse_label_row(row),
            None => Err(RepoError::NotFound {
                kind: EntityKind::Label,
                id: label_uuid,
            }),
        }
    }

    fn list_labels(&self, board_uuid: BoardId) -> RepoResult<Vec<Label>> {
        let mut stmt = self.conn.prepare(&format!(
            "{LABEL_SELECT_SQL}
             WHERE board_uuid = ?1
             ORDER BY name ASC, label_uuid ASC;"
        ))?;
        let mut rows = stmt.query([board_uuid.to_string()])?;
        let mut labels = Vec::new();
        while let Some(row) = rows.next()? {
            labels.push(parse_label_row(row)?);
        }
        Ok(labels)
    }

    fn attach_label(&self, card_uuid: CardId, label_uuid: LabelId) -> RepoResult<()> {
        let card_board: Option<String> = self
            .conn
            .query_row(
                "SELECT l.board_uuid
                 FROM cards c
                 INNER JOIN lists l ON l.list_uuid = c.list_uuid
                 WHERE c.card_uuid = ?1;",
                [card_uuid.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        let card_board = card_board.ok_or(RepoError::NotFound {
            kind: EntityKind::Card,
            id: card_uuid,
        })?;

        let label_board: Option<String> = self
            .conn
            .query_row(
                "SELECT board_uuid FROM labels WHERE label_uuid = ?1;",
                [label_uuid.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        let label_board = label_board.ok_or(RepoError::NotFound {
            kind: EntityKind::Label,
            id: label_uuid,
        })?;

        if card_board != label_board {
            return Err(ValidationError::new("label", "label belongs to a different board").into());
        }

        self.conn.execute(
            "INSERT OR IGNORE INTO card_labels (card_uuid, label_uuid) VALUES (?1, ?2);",
            params![card_uuid.to_string(), label_uuid.to_string()],
        )?;
        Ok(())
    }

    fn card_label_ids(&self, card_uuid: CardId) -> RepoResult<Vec<LabelId>> {
        let mut stmt = self.conn.prepare(
            "SELECT cl.label_uuid
             FROM card_labels cl
             INNER JOIN labels lb ON lb.label_uuid = cl.label_uuid
             WHERE cl.card_uuid = ?1
             ORDER BY lb.name ASC;",
        )?;
        let mut rows = stmt.query([card_uuid.to_string()])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            let value: String = row.get(0)?;
            ids.push(parse_uuid(&value, "card_labels.label_uuid")?);
        }
        Ok(ids)
    }

    fn detach_labels_outside(&self, card_uuid: CardId, board_uuid: BoardId) -> RepoResult<usize> {
        let removed = self.conn.execute(
            "DELETE FROM card_labels
             WHERE card_uuid = ?1
               AND label_uuid IN (
                   SELECT label_uuid FROM labels WHERE board_uuid <> ?2
               );",
            params![card_uuid.to_string(), board_uuid.to_string()],
        )?;
        Ok(removed)
    }
}

fn ensure_changed(changed: usize, kind: EntityKind, id: Uuid) -> RepoResult<()> {
    if changed == 0 {
        return Err(RepoError::NotFound { kind, id });
    }
    Ok(())
}

fn parse_board_row(row: &Row<'_>) -> RepoResult<Board> {
    let board_uuid: String = row.get("board_uuid")?;
    let owner_uuid: String = row.get("owner_uuid")?;
    let visibility_text: String = row.get("visibility")?;
    let visibility = Visibility::parse(&visibility_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid visibility `{visibility_text}` in boards.visibility"
        ))
    })?;
    let color_text: String = row.get("background_color")?;
    let background_color = BackgroundColor::parse(&color_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid background color `{color_text}` in boards.background_color"
        ))
    })?;

    Ok(Board {
        board_uuid: parse_uuid(&board_uuid, "boards.board_uuid")?,
        title: row.get("title")?,
        description: row.get("description")?,
        owner_uuid: parse_uuid(&owner_uuid, "boards.owner_uuid")?,
        visibility,
        background_color,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_list_row(row: &Row<'_>) -> RepoResult<BoardList> {
    let list_uuid: String = row.get("list_uuid")?;
    let board_uuid: String = row.get("board_uuid")?;
    Ok(BoardList {
        list_uuid: parse_uuid(&list_uuid, "lists.list_uuid")?,
        board_uuid: parse_uuid(&board_uuid, "lists.board_uuid")?,
        title: row.get("title")?,
        position: row.get("position")?,
        archived: parse_flag(row.get("archived")?, "lists.archived")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_card_row(row: &Row<'_>) -> RepoResult<Card> {
    let card_uuid: String = row.get("card_uuid")?;
    let list_uuid: String = row.get("list_uuid")?;
    let created_by: String = row.get("created_by")?;
    Ok(Card {
        card_uuid: parse_uuid(&card_uuid, "cards.card_uuid")?,
        list_uuid: parse_uuid(&list_uuid, "cards.list_uuid")?,
        title: row.get("title")?,
        description: row.get("description")?,
        position: row.get("position")?,
        archived: parse_flag(row.get("archived")?, "cards.archived")?,
        created_by: parse_uuid(&created_by, "cards.created_by")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_label_row(row: &Row<'_>) -> RepoResult<Label> {
    let label_uuid: String = row.get("label_uuid")?;
    let board_uuid: String = row.get("board_uuid")?;
    Ok(Label {
        label_uuid: parse_uuid(&label_uuid, "labels.label_uuid")?,
        board_uuid: parse_uuid(&board_uuid, "labels.board_uuid")?,
        name: row.get("name")?,
        color: row.get("color")?,
        created_at: row.get("created_at")?,
    })
}
