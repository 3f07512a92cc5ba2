//! Board graph domain model.
//!
//! # Responsibility
//! - Define boards, lists, cards, labels and membership roles.
//! - Provide construction drafts that validate field values before any
//!   repository writes them.
//!
//! # Invariants
//! - Every entity is identified by a stable UUID that is never reused.
//! - A list belongs to exactly one board, a card to exactly one list.
//! - `archived` never changes ownership or order key.

use crate::ordering::OrderKey;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type BoardId = Uuid;
pub type ListId = Uuid;
pub type CardId = Uuid;
pub type LabelId = Uuid;
/// Identity of a user, owned by the external identity system.
pub type ActorId = Uuid;

pub const TITLE_MAX_CHARS: usize = 200;
pub const LABEL_NAME_MAX_CHARS: usize = 50;
pub const LABEL_COLOR_MAX_CHARS: usize = 32;
pub const DEFAULT_LABEL_COLOR: &str = "blue";

/// Field-level validation failure for construction input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted/indexed path of the offending field, e.g. `lists[2].title`.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid `{}`: {}", self.field, self.message)
    }
}

impl Error for ValidationError {}

/// Board visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Private,
    Team,
    Public,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Team => "team",
            Self::Public => "public",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "private" => Some(Self::Private),
            "team" => Some(Self::Team),
            "public" => Some(Self::Public),
            _ => None,
        }
    }
}

/// Board background palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundColor {
    #[default]
    Blue,
    Green,
    Red,
    Orange,
    Purple,
    Pink,
    Lime,
    Sky,
    Grey,
}

impl BackgroundColor {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Blue => "blue",
            Self::Green => "green",
            Self::Red => "red",
            Self::Orange => "orange",
            Self::Purple => "purple",
            Self::Pink => "pink",
            Self::Lime => "lime",
            Self::Sky => "sky",
            Self::Grey => "grey",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "blue" => Some(Self::Blue),
            "green" => Some(Self::Green),
            "red" => Some(Self::Red),
            "orange" => Some(Self::Orange),
            "purple" => Some(Self::Purple),
            "pink" => Some(Self::Pink),
            "lime" => Some(Self::Lime),
            "sky" => Some(Self::Sky),
            "grey" => Some(Self::Grey),
            _ => None,
        }
    }
}

/// Membership role on one board.
///
/// Declaration order is privilege order: `Member < Admin < Owner`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoardRole {
    Member,
    Admin,
    Owner,
}

impl BoardRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Member => "member",
            Self::Admin => "admin",
            Self::Owner => "owner",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "member" => Some(Self::Member),
            "admin" => Some(Self::Admin),
            "owner" => Some(Self::Owner),
            _ => None,
        }
    }

    /// Whether holding `self` is enough for an operation requiring `required`.
    pub fn satisfies(self, required: BoardRole) -> bool {
        self >= required
    }
}

/// Board read model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    pub board_uuid: BoardId,
    pub title: String,
    pub description: String,
    pub owner_uuid: ActorId,
    pub visibility: Visibility,
    pub background_color: BackgroundColor,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
    /// Epoch ms update timestamp.
    pub updated_at: i64,
}

/// List read model. Named `BoardList` to keep `List` free for std usage.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardList {
    pub list_uuid: ListId,
    pub board_uuid: BoardId,
    pub title: String,
    pub position: OrderKey,
    pub archived: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Card read model.
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    pub card_uuid: CardId,
    pub list_uuid: ListId,
    pub title: String,
    pub description: String,
    pub position: OrderKey,
    pub archived: bool,
    pub created_by: ActorId,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Label read model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub label_uuid: LabelId,
    pub board_uuid: BoardId,
    pub name: String,
    pub color: String,
    pub created_at: i64,
}

/// Validated input for creating a board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBoard {
    pub title: String,
    pub description: String,
    pub owner_uuid: ActorId,
    pub visibility: Visibility,
    pub background_color: BackgroundColor,
}

impl NewBoard {
    /// Board with default description, visibility and color.
    pub fn new(title: impl Into<String>, owner_uuid: ActorId) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            owner_uuid,
            visibility: Visibility::default(),
            background_color: BackgroundColor::default(),
        }
    }

    /// Trims text fields and checks length limits.
    pub fn normalized(mut self) -> Result<Self, ValidationError> {
        self.title = normalize_title("title", &self.title, TITLE_MAX_CHARS)?;
        self.description = self.description.trim().to_string();
        Ok(self)
    }
}

/// Validated input for creating a list at a known order key.
#[derive(Debug, Clone, PartialEq)]
pub struct NewList {
    pub board_uuid: BoardId,
    pub title: String,
    pub position: OrderKey,
}

impl NewList {
    pub fn normalized(mut self) -> Result<Self, ValidationError> {
        self.title = normalize_title("title", &self.title, TITLE_MAX_CHARS)?;
        ensure_finite_position("position", self.position)?;
        Ok(self)
    }
}

/// Validated input for creating a card at a known order key.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCard {
    pub list_uuid: ListId,
    pub title: String,
    pub description: String,
    pub position: OrderKey,
    pub created_by: ActorId,
}

impl NewCard {
    pub fn normalized(mut self) -> Result<Self, ValidationError> {
        self.title = normalize_title("title", &self.title, TITLE_MAX_CHARS)?;
        self.description = self.description.trim().to_string();
        ensure_finite_position("position", self.position)?;
        Ok(self)
    }
}

/// Validated input for creating a label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLabel {
    pub board_uuid: BoardId,
    pub name: String,
    pub color: String,
}

impl NewLabel {
    pub fn normalized(mut self) -> Result<Self, ValidationError> {
        self.name = normalize_title("name", &self.name, LABEL_NAME_MAX_CHARS)?;
        self.color = normalize_label_color("color", &self.color)?;
        Ok(self)
    }
}

/// Trims `value` and rejects blank or overlong text.
pub(crate) fn normalize_title(
    field: &str,
    value: &str,
    max_chars: usize,
) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(field, "must not be blank"));
    }
    if trimmed.chars().count() > max_chars {
        return Err(ValidationError::new(
            field,
            format!("must be at most {max_chars} characters"),
        ));
    }
    Ok(trimmed.to_string())
}

/// Trims a label color; blank falls back to `DEFAULT_LABEL_COLOR`.
pub(crate) fn normalize_label_color(field: &str, value: &str) -> Result<String, ValidationError> {
    let color = value.trim();
    if color.is_empty() {
        return Ok(DEFAULT_LABEL_COLOR.to_string());
    }
    if color.chars().count() > LABEL_COLOR_MAX_CHARS {
        return Err(ValidationError::new(
            field,
            format!("must be at most {LABEL_COLOR_MAX_CHARS} characters"),
        ));
    }
    Ok(color.to_string())
}

pub(crate) fn ensure_finite_position(field: &str, value: OrderKey) -> Result<(), ValidationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::new(field, "must be a finite number"))
    }
}

#[cfg(test)]
mod tests {
    use super::{BoardRole, NewLabel, NewList, DEFAULT_LABEL_COLOR};
    use uuid::Uuid;

    #[test]
    fn roles_are_hierarchical() {
        assert!(BoardRole::Owner.satisfies(BoardRole::Member));
        assert!(BoardRole::Admin.satisfies(BoardRole::Admin));
        assert!(!BoardRole::Member.satisfies(BoardRole::Admin));
    }

    #[test]
    fn list_draft_rejects_blank_title_and_nan_position() {
        let blank = NewList {
            board_uuid: Uuid::new_v4(),
            title: "   ".to_string(),
            position: 1.0,
        };
        assert_eq!(blank.normalized().unwrap_err().field, "title");

        let nan = NewList {
            board_uuid: Uuid::new_v4(),
            title: "Backlog".to_string(),
            position: f64::NAN,
        };
        assert_eq!(nan.normalized().unwrap_err().field, "position");
    }

    #[test]
    fn label_draft_defaults_blank_color() {
        let label = NewLabel {
            board_uuid: Uuid::new_v4(),
            name: " Bug ".to_string(),
            color: String::new(),
        }
        .normalized()
        .unwrap();
        assert_eq!(label.name, "Bug");
        assert_eq!(label.color, DEFAULT_LABEL_COLOR);
    }
}
