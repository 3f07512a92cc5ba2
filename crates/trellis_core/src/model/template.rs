//! Board template snapshots.
//!
//! # Responsibility
//! - Describe a board graph as immutable data (no live foreign keys).
//! - Validate a snapshot once, when the template is authored.
//!
//! # Invariants
//! - Descriptor order is the order entities are materialized in.
//! - Descriptor `position` values are informational only; materialization
//!   assigns fresh keys.
//! - Unknown JSON fields are ignored; missing optional fields take defaults.

use crate::model::board::{
    normalize_label_color, normalize_title, ActorId, BackgroundColor, ValidationError,
    Visibility, DEFAULT_LABEL_COLOR, LABEL_NAME_MAX_CHARS, TITLE_MAX_CHARS,
};
use crate::ordering::OrderKey;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

pub type TemplateId = Uuid;

/// Snapshot title used when the template does not name its board.
pub const DEFAULT_SNAPSHOT_TITLE: &str = "New Board";

/// Denormalized board tree stored with a template.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TemplateSnapshot {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub visibility: Option<Visibility>,
    #[serde(default)]
    pub background_color: Option<BackgroundColor>,
    #[serde(default)]
    pub lists: Vec<ListDescriptor>,
    #[serde(default)]
    pub labels: Vec<LabelDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListDescriptor {
    pub title: String,
    #[serde(default)]
    pub position: Option<OrderKey>,
    #[serde(default)]
    pub cards: Vec<CardDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardDescriptor {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub position: Option<OrderKey>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelDescriptor {
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

impl ListDescriptor {
    pub fn new(title: impl Into<String>, cards: Vec<CardDescriptor>) -> Self {
        Self {
            title: title.into(),
            position: None,
            cards,
        }
    }
}

impl CardDescriptor {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            position: None,
        }
    }

    pub fn description_or_default(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }
}

impl LabelDescriptor {
    pub fn new(name: impl Into<String>, color: Option<&str>) -> Self {
        Self {
            name: name.into(),
            color: color.map(str::to_string),
        }
    }

    pub fn color_or_default(&self) -> &str {
        self.color.as_deref().unwrap_or(DEFAULT_LABEL_COLOR)
    }
}

impl TemplateSnapshot {
    /// Parses a stored/authored JSON document.
    ///
    /// Type mismatches (e.g. a non-numeric `position`) surface as a
    /// validation error on the `board_data` field.
    pub fn from_json(value: &str) -> Result<Self, ValidationError> {
        serde_json::from_str(value).map_err(|err| ValidationError::new("board_data", err.to_string()))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Title of the board materialized from this snapshot, capped at the
    /// board title limit.
    pub fn board_title(&self, template_name: &str) -> String {
        let title = self
            .title
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_SNAPSHOT_TITLE);
        format!("{template_name} - {title}")
            .chars()
            .take(TITLE_MAX_CHARS)
            .collect()
    }

    pub fn description_or_default(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }

    pub fn visibility_or_default(&self) -> Visibility {
        self.visibility.unwrap_or_default()
    }

    pub fn background_color_or_default(&self) -> BackgroundColor {
        self.background_color.unwrap_or_default()
    }

    pub fn card_count(&self) -> usize {
        self.lists.iter().map(|list| list.cards.len()).sum()
    }

    /// Checks every descriptor against the same rules entity construction
    /// applies, reporting the first failure with its path.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (list_index, list) in self.lists.iter().enumerate() {
            normalize_title(
                &format!("lists[{list_index}].title"),
                &list.title,
                TITLE_MAX_CHARS,
            )?;
            check_descriptor_position(&format!("lists[{list_index}].position"), list.position)?;

            for (card_index, card) in list.cards.iter().enumerate() {
                normalize_title(
                    &format!("lists[{list_index}].cards[{card_index}].title"),
                    &card.title,
                    TITLE_MAX_CHARS,
                )?;
                check_descriptor_position(
                    &format!("lists[{list_index}].cards[{card_index}].position"),
                    card.position,
                )?;
            }
        }

        let mut seen_labels = HashSet::new();
        for (label_index, label) in self.labels.iter().enumerate() {
            let field = format!("labels[{label_index}].name");
            let name = normalize_title(&field, &label.name, LABEL_NAME_MAX_CHARS)?;
            if !seen_labels.insert(name) {
                return Err(ValidationError::new(field, "duplicate label name"));
            }
            if let Some(color) = &label.color {
                normalize_label_color(&format!("labels[{label_index}].color"), color)?;
            }
        }

        Ok(())
    }
}

fn check_descriptor_position(field: &str, value: Option<OrderKey>) -> Result<(), ValidationError> {
    match value {
        Some(value) if !value.is_finite() => {
            Err(ValidationError::new(field, "must be a finite number"))
        }
        _ => Ok(()),
    }
}

/// Template shipped with the crate and stored on demand.
#[derive(Debug, Clone, Copy)]
pub struct BuiltinTemplate {
    pub name: &'static str,
    pub description: &'static str,
    pub board_data: &'static str,
}

impl BuiltinTemplate {
    pub fn snapshot(&self) -> Result<TemplateSnapshot, ValidationError> {
        TemplateSnapshot::from_json(self.board_data)
    }
}

pub const BUILTIN_TEMPLATES: &[BuiltinTemplate] = &[
    BuiltinTemplate {
        name: "Kanban Básico",
        description: "Um quadro kanban simples com listas A Fazer, Em Progresso e Concluído",
        board_data: include_str!("builtin_templates/kanban_basic.json"),
    },
    BuiltinTemplate {
        name: "Calendário de Conteúdo",
        description: "Planeje e organize seu fluxo de criação de conteúdo",
        board_data: include_str!("builtin_templates/content_calendar.json"),
    },
    BuiltinTemplate {
        name: "Gerenciamento de Projetos",
        description: "Fluxo completo de gerenciamento de projetos do backlog à implantação",
        board_data: include_str!("builtin_templates/project_management.json"),
    },
];

/// Stored template record.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardTemplate {
    pub template_uuid: TemplateId,
    pub name: String,
    pub description: String,
    pub snapshot: TemplateSnapshot,
    pub is_public: bool,
    pub created_by: ActorId,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Authoring input for a new template.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTemplate {
    pub name: String,
    pub description: String,
    pub snapshot: TemplateSnapshot,
    pub is_public: bool,
    pub created_by: ActorId,
}

#[cfg(test)]
mod tests {
    use super::{CardDescriptor, ListDescriptor, TemplateSnapshot};

    const BASIC: &str = r#"{
        "title": "Basic Kanban",
        "visibility": "team",
        "lists": [
            {"title": "To Do", "position": 0, "cards": [
                {"title": "Task 1", "description": "first", "position": 0}
            ]},
            {"title": "Done", "position": 1}
        ],
        "labels": [{"name": "Bug", "color": "red"}, {"name": "Feature"}],
        "unused": true
    }"#;

    #[test]
    fn from_json_applies_defaults_and_ignores_unknown_fields() {
        let snapshot = TemplateSnapshot::from_json(BASIC).unwrap();
        assert_eq!(snapshot.lists.len(), 2);
        assert!(snapshot.lists[1].cards.is_empty());
        assert_eq!(snapshot.labels[1].color_or_default(), "blue");
        assert_eq!(snapshot.description_or_default(), "");
        assert_eq!(snapshot.background_color_or_default().as_str(), "blue");
        assert_eq!(snapshot.visibility_or_default().as_str(), "team");
        assert_eq!(snapshot.card_count(), 1);
    }

    #[test]
    fn from_json_rejects_non_numeric_position() {
        let err = TemplateSnapshot::from_json(
            r#"{"lists": [{"title": "A", "position": "first"}]}"#,
        )
        .unwrap_err();
        assert_eq!(err.field, "board_data");
    }

    #[test]
    fn board_title_falls_back_to_default() {
        let snapshot = TemplateSnapshot::default();
        assert_eq!(snapshot.board_title("Sprint"), "Sprint - New Board");
    }

    #[test]
    fn board_title_is_capped() {
        let snapshot = TemplateSnapshot {
            title: Some("x".repeat(150)),
            ..TemplateSnapshot::default()
        };
        let title = snapshot.board_title(&"n".repeat(150));
        assert_eq!(title.chars().count(), super::TITLE_MAX_CHARS);
    }

    #[test]
    fn builtin_templates_parse_and_validate() {
        for builtin in super::BUILTIN_TEMPLATES {
            let snapshot = builtin.snapshot().unwrap();
            snapshot.validate().unwrap();
            assert!(!snapshot.lists.is_empty(), "{} has no lists", builtin.name);
        }
    }

    #[test]
    fn validate_rejects_overlong_label_color() {
        let snapshot = TemplateSnapshot {
            labels: vec![super::LabelDescriptor::new("Bug", Some(&"x".repeat(40)))],
            ..TemplateSnapshot::default()
        };
        assert_eq!(snapshot.validate().unwrap_err().field, "labels[0].color");
    }

    #[test]
    fn validate_reports_nested_field_path() {
        let snapshot = TemplateSnapshot {
            lists: vec![
                ListDescriptor::new("Backlog", vec![]),
                ListDescriptor::new("Doing", vec![CardDescriptor::new(" ")]),
            ],
            ..TemplateSnapshot::default()
        };
        let err = snapshot.validate().unwrap_err();
        assert_eq!(err.field, "lists[1].cards[0].title");
    }
}
