// Migration service - Use case orchestrating one dashboard migration run
use crate::application::card_classifier::{classify, ConflictDecider, TargetCardIndex};
use crate::application::collection_resolver::{CollectionMatchPolicy, CollectionResolver};
use crate::application::error::{GatewayResult, MigrationError};
use crate::application::metabase_gateway::{CardPayload, MetabaseGateway, NewDashboard};
use crate::application::payload_assembler::assemble;
use crate::application::tab_resolver::resolve_tabs;
use crate::domain::card::{Card, CardDecision, CardDecisions, MigrationAction};
use crate::domain::dashboard::{Dashboard, DashboardSummary};
use crate::domain::identifier_map::{EntityKind, IdentifierMap};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default)]
pub struct MigrationOptions {
    pub collection_match: CollectionMatchPolicy,
}

/// One referenced card and the action decided for it.
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyRow {
    pub kind: String,
    pub id: i64,
    pub name: String,
    pub action: MigrationAction,
    pub existing_target_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreviewReport {
    pub dashboard_id: i64,
    pub dashboard_name: String,
    pub collection_id: Option<i64>,
    pub tab_count: usize,
    pub dependencies: Vec<DependencyRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MigrationOutcome {
    pub target_dashboard_id: i64,
    pub dashboard_created: bool,
    pub target_collection_id: Option<i64>,
    pub identifiers: IdentifierMap,
    pub cards_created: usize,
    pub cards_updated: usize,
    pub cards_reused: usize,
    pub dropped_placements: usize,
}

#[derive(Debug, Clone, Copy, Default)]
struct CardCounts {
    created: usize,
    updated: usize,
    reused: usize,
}

/// Source dashboard kept warm between a preview and the migrate that
/// follows it, together with the decisions already made for its cards.
struct PreviewState {
    dashboard: Dashboard,
    decisions: CardDecisions,
}

pub struct ConnectionCheck {
    pub role: &'static str,
    pub url: String,
    pub result: GatewayResult<()>,
}

pub struct MigrationService {
    source: Arc<dyn MetabaseGateway>,
    target: Arc<dyn MetabaseGateway>,
    options: MigrationOptions,
    last_preview: Option<PreviewState>,
}

impl MigrationService {
    pub fn new(
        source: Arc<dyn MetabaseGateway>,
        target: Arc<dyn MetabaseGateway>,
        options: MigrationOptions,
    ) -> Self {
        Self {
            source,
            target,
            options,
            last_preview: None,
        }
    }

    pub fn source_url(&self) -> &str {
        self.source.base_url()
    }

    pub fn target_url(&self) -> &str {
        self.target.base_url()
    }

    pub async fn test_connections(&self) -> Vec<ConnectionCheck> {
        let mut checks = Vec::with_capacity(2);
        for (role, gateway) in [("source", &self.source), ("target", &self.target)] {
            checks.push(ConnectionCheck {
                role,
                url: gateway.base_url().to_string(),
                result: gateway.test_connection().await,
            });
        }
        checks
    }

    pub async fn list_source_dashboards(&self) -> GatewayResult<Vec<DashboardSummary>> {
        list_sorted(self.source.as_ref()).await
    }

    pub async fn list_target_dashboards(&self) -> GatewayResult<Vec<DashboardSummary>> {
        list_sorted(self.target.as_ref()).await
    }

    /// Fetches and classifies a dashboard without writing anything.
    pub async fn preview(
        &mut self,
        dashboard_id: i64,
        decider: &mut dyn ConflictDecider,
    ) -> Result<PreviewReport, MigrationError> {
        let state = prepare(
            self.source.as_ref(),
            self.target.as_ref(),
            &mut self.last_preview,
            dashboard_id,
            decider,
        )
        .await?;
        Ok(report(state))
    }

    /// Migrates a dashboard and everything it depends on to the target.
    ///
    /// Collections and cards degrade gracefully: an unreachable dependency
    /// is logged and left out. Only failures at the dashboard level abort
    /// the run, and nothing already written is rolled back.
    pub async fn migrate(
        &mut self,
        dashboard_id: i64,
        decider: &mut dyn ConflictDecider,
    ) -> Result<MigrationOutcome, MigrationError> {
        let state = prepare(
            self.source.as_ref(),
            self.target.as_ref(),
            &mut self.last_preview,
            dashboard_id,
            decider,
        )
        .await?;
        let dashboard = &state.dashboard;
        let source = self.source.as_ref();
        let target = self.target.as_ref();

        tracing::info!(dashboard_id, name = %dashboard.name, "Starting dashboard migration");

        let mut map = IdentifierMap::new();
        let mut resolver = CollectionResolver::new(source, target, self.options.collection_match);
        let target_collection_id = resolver.resolve_optional(dashboard.collection_id, &mut map).await;

        let counts = apply_card_decisions(source, target, &mut resolver, dashboard, &state.decisions, &mut map).await;

        let (target_dashboard_id, dashboard_created) = ensure_dashboard(target, dashboard, target_collection_id).await?;

        let tabs = resolve_tabs(target, target_dashboard_id, &dashboard.tabs, &mut map)
            .await
            .map_err(|source| MigrationError::TabResolution {
                dashboard_id: target_dashboard_id,
                source,
            })?;

        let payload = assemble(dashboard, target_collection_id, &map, &tabs);
        target
            .update_dashboard(target_dashboard_id, &payload.update)
            .await
            .map_err(|source| MigrationError::DashboardUpdate {
                dashboard_id: target_dashboard_id,
                source,
            })?;

        tracing::info!(
            source_id = dashboard_id,
            target_id = target_dashboard_id,
            created = counts.created,
            updated = counts.updated,
            reused = counts.reused,
            dropped = payload.dropped_placements,
            "Dashboard migration completed"
        );

        let outcome = MigrationOutcome {
            target_dashboard_id,
            dashboard_created,
            target_collection_id,
            identifiers: map,
            cards_created: counts.created,
            cards_updated: counts.updated,
            cards_reused: counts.reused,
            dropped_placements: payload.dropped_placements,
        };
        self.last_preview = None;
        Ok(outcome)
    }
}

async fn list_sorted(gateway: &dyn MetabaseGateway) -> GatewayResult<Vec<DashboardSummary>> {
    let mut dashboards = gateway.list_dashboards().await?;
    dashboards.sort_by_key(|d| d.name.to_lowercase());
    Ok(dashboards)
}

/// Loads the dashboard (reusing the cached preview for the same id) and
/// classifies its cards. Decisions made by an earlier preview are kept.
async fn prepare<'c>(
    source: &dyn MetabaseGateway,
    target: &dyn MetabaseGateway,
    cache: &'c mut Option<PreviewState>,
    dashboard_id: i64,
    decider: &mut dyn ConflictDecider,
) -> Result<&'c PreviewState, MigrationError> {
    let mut state = match cache.take() {
        Some(state) if state.dashboard.id == dashboard_id => {
            tracing::debug!(dashboard_id, "Reusing previewed dashboard");
            state
        }
        _ => {
            let dashboard = source
                .get_dashboard(dashboard_id)
                .await
                .map_err(|source| MigrationError::SourceDashboard {
                    id: dashboard_id,
                    source,
                })?;
            PreviewState {
                dashboard,
                decisions: CardDecisions::new(),
            }
        }
    };

    let index = TargetCardIndex::load(target).await;
    classify(&state.dashboard, &index, &mut state.decisions, decider);
    Ok(cache.insert(state))
}

fn report(state: &PreviewState) -> PreviewReport {
    let dependencies = state
        .dashboard
        .referenced_cards()
        .into_iter()
        .map(|card| {
            let decision = state.decisions.get(card.id);
            DependencyRow {
                kind: card.type_label().to_string(),
                id: card.id,
                name: card.name.clone(),
                action: decision.map_or(MigrationAction::Undecided, |d| d.action),
                existing_target_id: decision.and_then(|d| d.existing_target_id),
            }
        })
        .collect();
    PreviewReport {
        dashboard_id: state.dashboard.id,
        dashboard_name: state.dashboard.name.clone(),
        collection_id: state.dashboard.collection_id,
        tab_count: state.dashboard.tabs.len(),
        dependencies,
    }
}

/// Placements may embed a trimmed-down card; fetch the full record when
/// the query is missing.
async fn full_card(source: &dyn MetabaseGateway, card: &Card) -> Card {
    if !card.dataset_query.is_null() {
        return card.clone();
    }
    match source.get_card(card.id).await {
        Ok(full) => full,
        Err(e) => {
            tracing::warn!(card_id = card.id, error = %e, "Failed to fetch source card, using embedded copy");
            card.clone()
        }
    }
}

async fn apply_card_decisions(
    source: &dyn MetabaseGateway,
    target: &dyn MetabaseGateway,
    resolver: &mut CollectionResolver<'_>,
    dashboard: &Dashboard,
    decisions: &CardDecisions,
    map: &mut IdentifierMap,
) -> CardCounts {
    let mut counts = CardCounts::default();

    for card in dashboard.referenced_cards() {
        let decision = decisions.get(card.id).copied().unwrap_or_else(CardDecision::new_card);
        match (decision.action, decision.existing_target_id) {
            (MigrationAction::Skip, Some(existing)) => {
                tracing::debug!(source_id = card.id, target_id = existing, "Reusing existing card");
                map.insert(EntityKind::Card, card.id, existing);
                counts.reused += 1;
            }
            (MigrationAction::Override, Some(existing)) => {
                let card = full_card(source, card).await;
                let collection_id = resolver.resolve_optional(card.collection_id, map).await;
                match target.update_card(existing, &CardPayload::from_card(&card, collection_id)).await {
                    Ok(_) => {
                        tracing::info!(source_id = card.id, target_id = existing, "Updated card '{}'", card.name);
                        counts.updated += 1;
                    }
                    Err(e) => {
                        tracing::warn!(source_id = card.id, target_id = existing, error = %e, "Failed to update card, keeping existing version");
                        counts.reused += 1;
                    }
                }
                map.insert(EntityKind::Card, card.id, existing);
            }
            _ => {
                let card = full_card(source, card).await;
                let collection_id = resolver.resolve_optional(card.collection_id, map).await;
                match target.create_card(&CardPayload::from_card(&card, collection_id)).await {
                    Ok(target_id) => {
                        tracing::info!(source_id = card.id, target_id, "Created card '{}'", card.name);
                        map.insert(EntityKind::Card, card.id, target_id);
                        counts.created += 1;
                    }
                    Err(e) => {
                        tracing::error!(source_id = card.id, error = %e, "Failed to create card '{}'", card.name);
                        map.mark_unresolved(EntityKind::Card, card.id);
                    }
                }
            }
        }
    }

    counts
}

/// Reuses a target dashboard with the same name (case-insensitive) or
/// creates one. A failed lookup is treated as "not found".
async fn ensure_dashboard(
    target: &dyn MetabaseGateway,
    dashboard: &Dashboard,
    collection_id: Option<i64>,
) -> Result<(i64, bool), MigrationError> {
    let wanted = dashboard.name.trim().to_lowercase();
    let existing = match target.list_dashboards().await {
        Ok(dashboards) => dashboards
            .into_iter()
            .find(|d| d.name.trim().to_lowercase() == wanted)
            .map(|d| d.id),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to list target dashboards, creating a new one");
            None
        }
    };

    if let Some(id) = existing {
        tracing::info!(target_id = id, "Reusing existing target dashboard '{}'", dashboard.name);
        return Ok((id, false));
    }

    let payload = NewDashboard {
        name: dashboard.name.clone(),
        description: dashboard.description.clone().filter(|d| !d.trim().is_empty()),
        collection_id,
    };
    let id = target
        .create_dashboard(&payload)
        .await
        .map_err(|source| MigrationError::TargetDashboardCreate {
            name: dashboard.name.clone(),
            source,
        })?;
    tracing::info!(target_id = id, "Created target dashboard '{}'", dashboard.name);
    Ok((id, true))
}
