//! Template authoring and materialization.
//!
//! # Responsibility
//! - Validate and store templates, including the built-in public set.
//! - Expand a template snapshot into a new live board owned by the actor.
//!
//! # Invariants
//! - Materialization is all-or-nothing: it runs in one immediate
//!   transaction and any failure leaves no row behind.
//! - Lists and cards get fresh keys from `append_key` in snapshot order;
//!   descriptor positions are never copied.
//! - Snapshots are validated when authored, not when materialized. Entity
//!   construction still validates each row it writes.

use crate::db::with_immediate_tx;
use crate::model::board::{ActorId, BoardId, BoardRole, NewBoard, NewCard, NewLabel, NewList};
use crate::model::template::{
    BoardTemplate, NewTemplate, TemplateId, TemplateSnapshot, BUILTIN_TEMPLATES,
};
use crate::ordering::{KeySpace, OrderKey};
use crate::repo::board_repo::{BoardRepository, SqliteBoardRepository};
use crate::repo::template_repo::{SqliteTemplateRepository, TemplateRepository};
use crate::repo::EntityKind;
use crate::service::{ServiceError, ServiceResult};
use log::{error, info};
use rusqlite::Connection;
use std::time::Instant;

/// Row counts of one materialized board.
#[derive(Debug, Default)]
struct ExpansionStats {
    lists: usize,
    cards: usize,
    labels: usize,
}

/// Template service facade: authoring, lookup and materialization.
pub struct TemplateMaterializer<'conn> {
    conn: &'conn Connection,
    boards: SqliteBoardRepository<'conn>,
    templates: SqliteTemplateRepository<'conn>,
    key_space: KeySpace,
}

impl<'conn> TemplateMaterializer<'conn> {
    pub fn try_new(conn: &'conn Connection) -> ServiceResult<Self> {
        Ok(Self {
            conn,
            boards: SqliteBoardRepository::try_new(conn)?,
            templates: SqliteTemplateRepository::attach(conn),
            key_space: KeySpace::default(),
        })
    }

    pub fn with_key_space(mut self, key_space: KeySpace) -> Self {
        self.key_space = key_space;
        self
    }

    /// Validates the snapshot once and stores the template.
    pub fn create_template(&self, template: &NewTemplate) -> ServiceResult<BoardTemplate> {
        let created = with_immediate_tx(self.conn, |_| -> ServiceResult<BoardTemplate> {
            Ok(self.templates.create_template(template)?)
        })?;
        info!(
            "event=template_create module=service status=ok template={} lists={} cards={} labels={} public={}",
            created.template_uuid,
            created.snapshot.lists.len(),
            created.snapshot.card_count(),
            created.snapshot.labels.len(),
            created.is_public
        );
        Ok(created)
    }

    /// Stores the built-in public templates authored by `actor`, skipping
    /// names that already exist. Returns the templates created by this call.
    pub fn seed_builtin_templates(&self, actor: ActorId) -> ServiceResult<Vec<BoardTemplate>> {
        let seeded = with_immediate_tx(self.conn, |_| -> ServiceResult<Vec<BoardTemplate>> {
            let mut seeded = Vec::new();
            for builtin in BUILTIN_TEMPLATES {
                if self.templates.template_name_exists(builtin.name)? {
                    continue;
                }
                seeded.push(self.templates.create_template(&NewTemplate {
                    name: builtin.name.to_string(),
                    description: builtin.description.to_string(),
                    snapshot: builtin.snapshot()?,
                    is_public: true,
                    created_by: actor,
                })?);
            }
            Ok(seeded)
        })?;
        info!(
            "event=template_seed module=service status=ok created={} skipped={}",
            seeded.len(),
            BUILTIN_TEMPLATES.len() - seeded.len()
        );
        Ok(seeded)
    }

    pub fn get_template(&self, template_uuid: TemplateId) -> ServiceResult<BoardTemplate> {
        self.templates
            .get_template(template_uuid)?
            .ok_or(ServiceError::not_found(EntityKind::Template, template_uuid))
    }

    /// Public templates plus the actor's own, newest first.
    pub fn list_templates(&self, actor: ActorId) -> ServiceResult<Vec<BoardTemplate>> {
        Ok(self.templates.list_visible_templates(actor)?)
    }

    /// Creates a new board from a stored template. Returns the board id.
    ///
    /// # Errors
    /// - `NotFound` when the template does not exist.
    /// - `Materialization` when any row fails to be created; nothing of the
    ///   new board remains.
    pub fn materialize(&self, template_uuid: TemplateId, actor: ActorId) -> ServiceResult<BoardId> {
        let started_at = Instant::now();
        let result = with_immediate_tx(self.conn, |_| -> ServiceResult<(BoardId, ExpansionStats)> {
            let template = self.get_template(template_uuid)?;
            self.expand(&template.name, &template.snapshot, actor)
                .map_err(|source| ServiceError::Materialization {
                    template: Some(template_uuid),
                    source: Box::new(source),
                })
        });
        log_materialize(Some(template_uuid), started_at, result)
    }

    /// Creates a new board from an in-memory snapshot under `template_name`.
    pub fn materialize_snapshot(
        &self,
        template_name: &str,
        snapshot: &TemplateSnapshot,
        actor: ActorId,
    ) -> ServiceResult<BoardId> {
        let started_at = Instant::now();
        let result = with_immediate_tx(self.conn, |_| -> ServiceResult<(BoardId, ExpansionStats)> {
            self.expand(template_name, snapshot, actor)
                .map_err(|source| ServiceError::Materialization {
                    template: None,
                    source: Box::new(source),
                })
        });
        log_materialize(None, started_at, result)
    }

    fn expand(
        &self,
        template_name: &str,
        snapshot: &TemplateSnapshot,
        actor: ActorId,
    ) -> ServiceResult<(BoardId, ExpansionStats)> {
        let board = self.boards.create_board(&NewBoard {
            title: snapshot.board_title(template_name),
            description: snapshot.description_or_default().to_string(),
            owner_uuid: actor,
            visibility: snapshot.visibility_or_default(),
            background_color: snapshot.background_color_or_default(),
        })?;
        self.boards
            .add_member(board.board_uuid, actor, BoardRole::Owner)?;

        let mut stats = ExpansionStats::default();
        let mut list_keys: Vec<OrderKey> = Vec::with_capacity(snapshot.lists.len());
        for list in &snapshot.lists {
            let position = self.key_space.append_key(&list_keys)?;
            list_keys.push(position);
            let created = self.boards.create_list(&NewList {
                board_uuid: board.board_uuid,
                title: list.title.clone(),
                position,
            })?;
            stats.lists += 1;

            let mut card_keys: Vec<OrderKey> = Vec::with_capacity(list.cards.len());
            for card in &list.cards {
                let position = self.key_space.append_key(&card_keys)?;
                card_keys.push(position);
                self.boards.create_card(&NewCard {
                    list_uuid: created.list_uuid,
                    title: card.title.clone(),
                    description: card.description_or_default().to_string(),
                    position,
                    created_by: actor,
                })?;
                stats.cards += 1;
            }
        }

        for label in &snapshot.labels {
            self.boards.create_label(&NewLabel {
                board_uuid: board.board_uuid,
                name: label.name.clone(),
                color: label.color_or_default().to_string(),
            })?;
            stats.labels += 1;
        }

        Ok((board.board_uuid, stats))
    }
}

fn log_materialize(
    template_uuid: Option<TemplateId>,
    started_at: Instant,
    result: ServiceResult<(BoardId, ExpansionStats)>,
) -> ServiceResult<BoardId> {
    let template = template_uuid.map_or_else(|| "inline".to_string(), |id| id.to_string());
    match result {
        Ok((board_uuid, stats)) => {
            info!(
                "event=template_materialize module=service status=ok template={} board={} lists={} cards={} labels={} duration_ms={}",
                template,
                board_uuid,
                stats.lists,
                stats.cards,
                stats.labels,
                started_at.elapsed().as_millis()
            );
            Ok(board_uuid)
        }
        Err(err) => {
            error!(
                "event=template_materialize module=service status=error template={} error_code={} duration_ms={} error={}",
                template,
                err.code(),
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}
