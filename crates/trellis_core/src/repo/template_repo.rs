//! Board template persistence.
//!
//! # Responsibility
//! - Store authored templates with their snapshot as a JSON document.
//! - Return templates visible to an actor.
//!
//! # Invariants
//! - Snapshots are validated before insert; a stored snapshot has passed
//!   `TemplateSnapshot::validate` at least once.
//! - Visibility listing returns public templates plus the actor's own,
//!   newest first.

use crate::model::board::{normalize_title, ActorId, ValidationError, TITLE_MAX_CHARS};
use crate::model::template::{BoardTemplate, NewTemplate, TemplateId, TemplateSnapshot};
use crate::repo::{
    ensure_connection_ready, flag_to_int, parse_flag, parse_uuid, EntityKind, RepoError,
    RepoResult,
};
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

const TEMPLATE_SELECT_SQL: &str = "SELECT
    template_uuid,
    name,
    description,
    board_data,
    is_public,
    created_by,
    created_at,
    updated_at
FROM board_templates";

pub trait TemplateRepository {
    fn create_template(&self, template: &NewTemplate) -> RepoResult<BoardTemplate>;
    fn get_template(&self, template_uuid: TemplateId) -> RepoResult<Option<BoardTemplate>>;
    /// Public templates plus those created by `actor_uuid`, newest first.
    fn list_visible_templates(&self, actor_uuid: ActorId) -> RepoResult<Vec<BoardTemplate>>;
    /// Whether any template, public or private, already uses `name`.
    fn template_name_exists(&self, name: &str) -> RepoResult<bool>;
}

/// SQLite-backed template repository.
pub struct SqliteTemplateRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTemplateRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }

    pub(crate) fn attach(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl TemplateRepository for SqliteTemplateRepository<'_> {
    fn create_template(&self, template: &NewTemplate) -> RepoResult<BoardTemplate> {
        let name = normalize_title("name", &template.name, TITLE_MAX_CHARS)?;
        template.snapshot.validate()?;
        let board_data = template
            .snapshot
            .to_json()
            .map_err(|err| ValidationError::new("board_data", err.to_string()))?;

        let template_uuid = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO board_templates (
                template_uuid,
                name,
                description,
                board_data,
                is_public,
                created_by
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                template_uuid.to_string(),
                name,
                template.description.trim(),
                board_data,
                flag_to_int(template.is_public),
                template.created_by.to_string(),
            ],
        )?;

        self.get_template(template_uuid)?
            .ok_or(RepoError::NotFound {
                kind: EntityKind::Template,
                id: template_uuid,
            })
    }

    fn get_template(&self, template_uuid: TemplateId) -> RepoResult<Option<BoardTemplate>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TEMPLATE_SELECT_SQL} WHERE template_uuid = ?1;"))?;
        let mut rows = stmt.query([template_uuid.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_template_row(row)?));
        }
        Ok(None)
    }

    fn list_visible_templates(&self, actor_uuid: ActorId) -> RepoResult<Vec<BoardTemplate>> {
        let mut stmt = self.conn.prepare(&format!(
            "{TEMPLATE_SELECT_SQL}
             WHERE is_public = 1 OR created_by = ?1
             ORDER BY created_at DESC, rowid DESC;"
        ))?;
        let mut rows = stmt.query([actor_uuid.to_string()])?;

        let mut templates = Vec::new();
        while let Some(row) = rows.next()? {
            templates.push(parse_template_row(row)?);
        }
        Ok(templates)
    }

    fn template_name_exists(&self, name: &str) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM board_templates WHERE name = ?1);",
            [name.trim()],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }
}

fn parse_template_row(row: &Row<'_>) -> RepoResult<BoardTemplate> {
    let template_uuid: String = row.get("template_uuid")?;
    let created_by: String = row.get("created_by")?;
    let board_data: String = row.get("board_data")?;
    let snapshot = TemplateSnapshot::from_json(&board_data).map_err(|err| {
        RepoError::InvalidData(format!(
            "template {template_uuid} has unreadable board_data: {}",
            err.message
        ))
    })?;

    Ok(BoardTemplate {
        template_uuid: parse_uuid(&template_uuid, "board_templates.template_uuid")?,
        name: row.get("name")?,
        description: row.get("description")?,
        snapshot,
        is_public: parse_flag(row.get("is_public")?, "board_templates.is_public")?,
        created_by: parse_uuid(&created_by, "board_templates.created_by")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
