// Card domain model and per-run migration decisions
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// A saved question as returned by the card endpoints. The query and
/// visualization settings are passed through verbatim.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Card {
    #[serde(deserialize_with = "null_as_default")]
    pub id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    pub description: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub display: String,
    pub dataset_query: Value,
    pub visualization_settings: Value,
    pub collection_id: Option<i64>,
    #[serde(rename = "type")]
    pub card_type: Option<String>,
}

/// Virtual cards of text blocks send explicit nulls for fields that are
/// always present on saved questions.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Card {
    /// Placements of text blocks carry an empty card object with id 0.
    pub fn is_migratable(&self) -> bool {
        self.id > 0
    }

    pub fn type_label(&self) -> &str {
        self.card_type.as_deref().unwrap_or("question")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MigrationAction {
    Undecided,
    New,
    Skip,
    Override,
}

impl fmt::Display for MigrationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MigrationAction::Undecided => "None",
            MigrationAction::New => "New",
            MigrationAction::Skip => "Skip",
            MigrationAction::Override => "Override",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardDecision {
    pub action: MigrationAction,
    pub existing_target_id: Option<i64>,
}

impl CardDecision {
    pub fn new_card() -> Self {
        Self {
            action: MigrationAction::New,
            existing_target_id: None,
        }
    }

    pub fn skip(existing_target_id: i64) -> Self {
        Self {
            action: MigrationAction::Skip,
            existing_target_id: Some(existing_target_id),
        }
    }

    pub fn overwrite(existing_target_id: i64) -> Self {
        Self {
            action: MigrationAction::Override,
            existing_target_id: Some(existing_target_id),
        }
    }
}

/// Decisions keyed by source card id. Held by the orchestrator for one
/// run so the fetched dashboard snapshot is never mutated.
#[derive(Debug, Clone, Default)]
pub struct CardDecisions {
    decisions: HashMap<i64, CardDecision>,
    skip_all: bool,
}

impl CardDecisions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, source_card_id: i64) -> Option<&CardDecision> {
        self.decisions.get(&source_card_id)
    }

    pub fn action_for(&self, source_card_id: i64) -> MigrationAction {
        self.get(source_card_id)
            .map(|d| d.action)
            .unwrap_or(MigrationAction::Undecided)
    }

    pub fn record(&mut self, source_card_id: i64, decision: CardDecision) {
        self.decisions.insert(source_card_id, decision);
    }

    pub fn skip_all(&self) -> bool {
        self.skip_all
    }

    pub fn enable_skip_all(&mut self) {
        self.skip_all = true;
    }

    pub fn len(&self) -> usize {
        self.decisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }
}
