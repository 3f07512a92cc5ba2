//! Board, list, card and label construction and lifecycle commands.
//!
//! # Responsibility
//! - Create boards with their owner membership.
//! - Place new lists and cards at the end of their container.
//! - Archive and delete entities without touching sibling order keys.
//!
//! # Invariants
//! - Every mutating command runs in one immediate transaction.
//! - Mutations of an existing board require `member`; membership changes
//!   require `admin`; granting or deleting ownership requires `owner`.

use crate::db::with_immediate_tx;
use crate::model::board::{
    ActorId, Board, BoardId, BoardList, BoardRole, Card, CardId, Label, LabelId, ListId,
    NewBoard, NewCard, NewLabel, NewList, DEFAULT_LABEL_COLOR,
};
use crate::ordering::KeySpace;
use crate::repo::board_repo::{BoardRepository, SqliteBoardRepository};
use crate::repo::container_repo::{
    ContainerRef, EntityRef, OrderedContainerRepository, SqliteContainerRepository,
};
use crate::repo::member_repo::{
    BoardAuthorizer, BoardMember, MembershipRepository, SqliteMembershipRepository,
};
use crate::repo::EntityKind;
use crate::service::{append_key_with_recovery, require_role, ServiceError, ServiceResult};
use log::info;
use rusqlite::Connection;

/// Board graph command facade.
pub struct BoardService<'conn, A = SqliteMembershipRepository<'conn>> {
    conn: &'conn Connection,
    boards: SqliteBoardRepository<'conn>,
    containers: SqliteContainerRepository<'conn>,
    members: SqliteMembershipRepository<'conn>,
    authorizer: A,
    key_space: KeySpace,
}

impl<'conn> BoardService<'conn> {
    /// Creates a service that authorizes against stored memberships.
    pub fn try_new(conn: &'conn Connection) -> ServiceResult<Self> {
        Self::with_authorizer(conn, SqliteMembershipRepository::attach(conn))
    }
}

impl<'conn, A: BoardAuthorizer> BoardService<'conn, A> {
    /// Creates a service with a custom authorization source.
    pub fn with_authorizer(conn: &'conn Connection, authorizer: A) -> ServiceResult<Self> {
        Ok(Self {
            conn,
            boards: SqliteBoardRepository::try_new(conn)?,
            containers: SqliteContainerRepository::attach(conn),
            members: SqliteMembershipRepository::attach(conn),
            authorizer,
            key_space: KeySpace::default(),
        })
    }

    pub fn with_key_space(mut self, key_space: KeySpace) -> Self {
        self.key_space = key_space;
        self
    }

    /// Creates a board and registers its owner as `owner` member.
    pub fn create_board(&self, board: &NewBoard) -> ServiceResult<Board> {
        let created = with_immediate_tx(self.conn, |_| -> ServiceResult<Board> {
            let created = self.boards.create_board(board)?;
            self.boards
                .add_member(created.board_uuid, created.owner_uuid, BoardRole::Owner)?;
            Ok(created)
        })?;
        info!(
            "event=board_create module=service status=ok board={}",
            created.board_uuid
        );
        Ok(created)
    }

    /// Grants `role` on the board to `member`, replacing any previous role.
    pub fn add_member(
        &self,
        board_uuid: BoardId,
        member_uuid: ActorId,
        role: BoardRole,
        actor: ActorId,
    ) -> ServiceResult<()> {
        with_immediate_tx(self.conn, |_| -> ServiceResult<()> {
            self.ensure_board(board_uuid)?;
            let required = if role == BoardRole::Owner {
                BoardRole::Owner
            } else {
                BoardRole::Admin
            };
            require_role(&self.authorizer, actor, board_uuid, required)?;
            self.boards.add_member(board_uuid, member_uuid, role)?;
            Ok(())
        })
    }

    pub fn members(&self, board_uuid: BoardId) -> ServiceResult<Vec<BoardMember>> {
        self.ensure_board(board_uuid)?;
        Ok(self.members.list_members(board_uuid)?)
    }

    /// Deletes the board and, by cascade, its lists, cards and labels.
    pub fn delete_board(&self, board_uuid: BoardId, actor: ActorId) -> ServiceResult<()> {
        with_immediate_tx(self.conn, |_| -> ServiceResult<()> {
            self.ensure_board(board_uuid)?;
            require_role(&self.authorizer, actor, board_uuid, BoardRole::Owner)?;
            self.boards.delete_board(board_uuid)?;
            Ok(())
        })?;
        info!("event=board_delete module=service status=ok board={board_uuid}");
        Ok(())
    }

    /// Creates a list after every existing list of the board.
    pub fn create_list(
        &self,
        board_uuid: BoardId,
        title: impl Into<String>,
        actor: ActorId,
    ) -> ServiceResult<BoardList> {
        let title = title.into();
        with_immediate_tx(self.conn, |_| -> ServiceResult<BoardList> {
            self.ensure_board(board_uuid)?;
            require_role(&self.authorizer, actor, board_uuid, BoardRole::Member)?;
            let position = append_key_with_recovery(
                &self.containers,
                ContainerRef::Board(board_uuid),
                &self.key_space,
            )?;
            Ok(self.boards.create_list(&NewList {
                board_uuid,
                title,
                position,
            })?)
        })
    }

    /// Creates a card after every existing card of the list.
    pub fn create_card(
        &self,
        list_uuid: ListId,
        title: impl Into<String>,
        description: impl Into<String>,
        actor: ActorId,
    ) -> ServiceResult<Card> {
        let title = title.into();
        let description = description.into();
        with_immediate_tx(self.conn, |_| -> ServiceResult<Card> {
            let board_uuid = self.board_of(EntityRef::List(list_uuid))?;
            require_role(&self.authorizer, actor, board_uuid, BoardRole::Member)?;
            let position = append_key_with_recovery(
                &self.containers,
                ContainerRef::List(list_uuid),
                &self.key_space,
            )?;
            Ok(self.boards.create_card(&NewCard {
                list_uuid,
                title,
                description,
                position,
                created_by: actor,
            })?)
        })
    }

    pub fn create_label(
        &self,
        board_uuid: BoardId,
        name: impl Into<String>,
        color: Option<&str>,
        actor: ActorId,
    ) -> ServiceResult<Label> {
        let label = NewLabel {
            board_uuid,
            name: name.into(),
            color: color.unwrap_or(DEFAULT_LABEL_COLOR).to_string(),
        };
        with_immediate_tx(self.conn, |_| -> ServiceResult<Label> {
            self.ensure_board(board_uuid)?;
            require_role(&self.authorizer, actor, board_uuid, BoardRole::Member)?;
            Ok(self.boards.create_label(&label)?)
        })
    }

    pub fn labels(&self, board_uuid: BoardId) -> ServiceResult<Vec<Label>> {
        self.ensure_board(board_uuid)?;
        Ok(self.boards.list_labels(board_uuid)?)
    }

    /// Attaches a label of the card's own board.
    pub fn attach_label(
        &self,
        card_uuid: CardId,
        label_uuid: LabelId,
        actor: ActorId,
    ) -> ServiceResult<()> {
        with_immediate_tx(self.conn, |_| -> ServiceResult<()> {
            let board_uuid = self.board_of(EntityRef::Card(card_uuid))?;
            require_role(&self.authorizer, actor, board_uuid, BoardRole::Member)?;
            self.boards.attach_label(card_uuid, label_uuid)?;
            Ok(())
        })
    }

    pub fn card_labels(&self, card_uuid: CardId) -> ServiceResult<Vec<LabelId>> {
        Ok(self.boards.card_label_ids(card_uuid)?)
    }

    /// Sets the archived flag; parent and order key are left as they are.
    pub fn set_list_archived(
        &self,
        list_uuid: ListId,
        archived: bool,
        actor: ActorId,
    ) -> ServiceResult<()> {
        with_immediate_tx(self.conn, |_| -> ServiceResult<()> {
            let board_uuid = self.board_of(EntityRef::List(list_uuid))?;
            require_role(&self.authorizer, actor, board_uuid, BoardRole::Member)?;
            self.boards.set_list_archived(list_uuid, archived)?;
            Ok(())
        })
    }

    pub fn set_card_archived(
        &self,
        card_uuid: CardId,
        archived: bool,
        actor: ActorId,
    ) -> ServiceResult<()> {
        with_immediate_tx(self.conn, |_| -> ServiceResult<()> {
            let board_uuid = self.board_of(EntityRef::Card(card_uuid))?;
            require_role(&self.authorizer, actor, board_uuid, BoardRole::Member)?;
            self.boards.set_card_archived(card_uuid, archived)?;
            Ok(())
        })
    }

    /// Archives every active card of the list. Returns how many changed.
    pub fn archive_all_cards(&self, list_uuid: ListId, actor: ActorId) -> ServiceResult<usize> {
        let archived = with_immediate_tx(self.conn, |_| -> ServiceResult<usize> {
            let board_uuid = self.board_of(EntityRef::List(list_uuid))?;
            require_role(&self.authorizer, actor, board_uuid, BoardRole::Member)?;
            Ok(self.boards.archive_all_cards(list_uuid)?)
        })?;
        info!(
            "event=cards_archive_all module=service status=ok list={} count={}",
            list_uuid, archived
        );
        Ok(archived)
    }

    /// Deletes a list and its cards. Sibling keys are not renumbered.
    pub fn delete_list(&self, list_uuid: ListId, actor: ActorId) -> ServiceResult<()> {
        with_immediate_tx(self.conn, |_| -> ServiceResult<()> {
            let board_uuid = self.board_of(EntityRef::List(list_uuid))?;
            require_role(&self.authorizer, actor, board_uuid, BoardRole::Member)?;
            self.boards.delete_list(list_uuid)?;
            Ok(())
        })
    }

    /// Deletes a card. Sibling keys are not renumbered.
    pub fn delete_card(&self, card_uuid: CardId, actor: ActorId) -> ServiceResult<()> {
        with_immediate_tx(self.conn, |_| -> ServiceResult<()> {
            let board_uuid = self.board_of(EntityRef::Card(card_uuid))?;
            require_role(&self.authorizer, actor, board_uuid, BoardRole::Member)?;
            self.boards.delete_card(card_uuid)?;
            Ok(())
        })
    }

    pub fn get_board(&self, board_uuid: BoardId) -> ServiceResult<Board> {
        self.boards
            .get_board(board_uuid)?
            .ok_or(ServiceError::not_found(EntityKind::Board, board_uuid))
    }

    pub fn get_card(&self, card_uuid: CardId) -> ServiceResult<Card> {
        self.boards
            .get_card(card_uuid)?
            .ok_or(ServiceError::not_found(EntityKind::Card, card_uuid))
    }

    /// Lists of the board in rendering order.
    pub fn lists(
        &self,
        board_uuid: BoardId,
        include_archived: bool,
    ) -> ServiceResult<Vec<BoardList>> {
        self.ensure_board(board_uuid)?;
        let entries = self
            .containers
            .list_ordered(ContainerRef::Board(board_uuid), include_archived)?;
        entries
            .into_iter()
            .map(|entry| {
                self.boards
                    .get_list(entry.id)?
                    .ok_or(ServiceError::not_found(EntityKind::List, entry.id))
            })
            .collect()
    }

    /// Cards of the list in rendering order.
    pub fn cards(&self, list_uuid: ListId, include_archived: bool) -> ServiceResult<Vec<Card>> {
        if !self.containers.container_exists(ContainerRef::List(list_uuid))? {
            return Err(ServiceError::not_found(EntityKind::List, list_uuid));
        }
        let entries = self
            .containers
            .list_ordered(ContainerRef::List(list_uuid), include_archived)?;
        entries
            .into_iter()
            .map(|entry| {
                self.boards
                    .get_card(entry.id)?
                    .ok_or(ServiceError::not_found(EntityKind::Card, entry.id))
            })
            .collect()
    }

    fn ensure_board(&self, board_uuid: BoardId) -> ServiceResult<()> {
        if self
            .containers
            .container_exists(ContainerRef::Board(board_uuid))?
        {
            return Ok(());
        }
        Err(ServiceError::not_found(EntityKind::Board, board_uuid))
    }

    fn board_of(&self, entity: EntityRef) -> ServiceResult<BoardId> {
        self.containers
            .owning_board(entity)?
            .ok_or(ServiceError::not_found(entity.kind(), entity.id()))
    }
}
