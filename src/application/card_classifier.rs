// Card conflict classifier - Decides reuse / overwrite / create per referenced card
use crate::application::metabase_gateway::MetabaseGateway;
use crate::domain::card::{Card, CardDecision, CardDecisions, MigrationAction};
use crate::domain::dashboard::Dashboard;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;

/// Directive for a card whose name already exists on the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictChoice {
    /// Use the existing target card as-is.
    Skip,
    /// Use the existing target card and update it from the source.
    Override,
    /// Skip this and every later collision in the run.
    SkipAll,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid choice '{0}', expected S (skip), O (override) or SA (skip all)")]
pub struct InvalidChoice(pub String);

impl FromStr for ConflictChoice {
    type Err = InvalidChoice;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "S" | "SKIP" => Ok(ConflictChoice::Skip),
            "O" | "OVERRIDE" => Ok(ConflictChoice::Override),
            "SA" | "SKIP ALL" | "SKIPALL" => Ok(ConflictChoice::SkipAll),
            _ => Err(InvalidChoice(s.trim().to_string())),
        }
    }
}

/// A source card whose name collides with an existing target card.
#[derive(Debug, Clone, Copy)]
pub struct CardConflict<'a> {
    pub card: &'a Card,
    pub existing_target_id: i64,
}

/// Source of conflict decisions: the console, a fixed policy, or a script.
pub trait ConflictDecider {
    fn decide(&mut self, conflict: &CardConflict<'_>) -> ConflictChoice;
}

impl<T: ConflictDecider + ?Sized> ConflictDecider for &mut T {
    fn decide(&mut self, conflict: &CardConflict<'_>) -> ConflictChoice {
        (**self).decide(conflict)
    }
}

/// Non-interactive policy from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    #[default]
    Prompt,
    Skip,
    Override,
}

/// Answers every conflict with the same choice.
#[derive(Debug, Clone, Copy)]
pub struct FixedDecider(pub ConflictChoice);

impl ConflictDecider for FixedDecider {
    fn decide(&mut self, _conflict: &CardConflict<'_>) -> ConflictChoice {
        self.0
    }
}

/// Existing target cards by case-insensitive name. First card wins when
/// the target holds several cards with the same name.
#[derive(Debug, Clone, Default)]
pub struct TargetCardIndex {
    by_name: HashMap<String, i64>,
}

impl TargetCardIndex {
    pub fn from_cards(cards: &[Card]) -> Self {
        let mut by_name = HashMap::new();
        for card in cards {
            let name = card.name.trim();
            if name.is_empty() {
                continue;
            }
            by_name.entry(name.to_lowercase()).or_insert(card.id);
        }
        Self { by_name }
    }

    /// Lists the target's cards once. A failed listing yields an empty
    /// index, so every card is classified as new.
    pub async fn load(target: &dyn MetabaseGateway) -> Self {
        match target.list_cards().await {
            Ok(cards) => {
                tracing::debug!(count = cards.len(), "Loaded target cards");
                Self::from_cards(&cards)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to load target cards");
                Self::default()
            }
        }
    }

    pub fn lookup(&self, name: &str) -> Option<i64> {
        self.by_name.get(&name.trim().to_lowercase()).copied()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Assigns a migration action to every card the dashboard references.
///
/// A Skip or Override decided earlier in the run is final. A card that
/// was classified New but now collides is decided again, so a colliding
/// card is never created twice.
pub fn classify(
    dashboard: &Dashboard,
    index: &TargetCardIndex,
    decisions: &mut CardDecisions,
    decider: &mut dyn ConflictDecider,
) {
    for card in dashboard.referenced_cards() {
        let Some(existing_target_id) = index.lookup(&card.name) else {
            decisions.record(card.id, CardDecision::new_card());
            continue;
        };

        match decisions.action_for(card.id) {
            MigrationAction::Skip | MigrationAction::Override => continue,
            MigrationAction::New | MigrationAction::Undecided => {}
        }

        if decisions.skip_all() {
            decisions.record(card.id, CardDecision::skip(existing_target_id));
            continue;
        }

        let conflict = CardConflict {
            card,
            existing_target_id,
        };
        let decision = match decider.decide(&conflict) {
            ConflictChoice::Skip => CardDecision::skip(existing_target_id),
            ConflictChoice::Override => CardDecision::overwrite(existing_target_id),
            ConflictChoice::SkipAll => {
                decisions.enable_skip_all();
                CardDecision::skip(existing_target_id)
            }
        };
        tracing::debug!(
            card_id = card.id,
            existing_target_id,
            action = %decision.action,
            "Resolved card conflict"
        );
        decisions.record(card.id, decision);
    }
}
