// Payload assembler - Builds the single dashboard update sent to the target
use crate::application::metabase_gateway::{
    DashCardUpdate, DashboardUpdate, ParameterMappingUpdate, ParameterUpdate, TabUpdate,
};
use crate::application::tab_resolver::TabResolution;
use crate::domain::dashboard::{DashCard, Dashboard, Parameter, ParameterMapping};
use crate::domain::identifier_map::{EntityKind, IdentifierMap};
use serde_json::Value;

const DEFAULT_PARAMETER_TYPE: &str = "category";

#[derive(Debug, Clone, PartialEq)]
pub struct AssembledPayload {
    pub update: DashboardUpdate,
    /// Card placements left out because their card has no target mapping.
    pub dropped_placements: usize,
}

/// Rewrites the source dashboard into target identifiers.
///
/// Placements whose card is unmapped are dropped. Text blocks have no card
/// and are always kept. Every retained placement gets a fresh negative id so
/// the target replaces the dashboard's placements as a unit.
pub fn assemble(
    dashboard: &Dashboard,
    target_collection_id: Option<i64>,
    map: &IdentifierMap,
    tabs: &TabResolution,
) -> AssembledPayload {
    let mut dashcards = Vec::new();
    let mut dropped_placements = 0;

    for dashcard in &dashboard.dashcards {
        let target_card_id = match dashcard.source_card_id() {
            Some(source_card_id) => match map.get(EntityKind::Card, source_card_id) {
                Some(target_id) => Some(target_id),
                None => {
                    tracing::warn!(source_card_id, "Dropping placement of unresolved card");
                    dropped_placements += 1;
                    continue;
                }
            },
            None => None,
        };
        let placeholder_id = -(dashcards.len() as i64 + 1);
        dashcards.push(rewrite_dashcard(dashcard, placeholder_id, target_card_id, map, tabs));
    }

    let parameters: Vec<ParameterUpdate> = dashboard
        .parameters
        .iter()
        .enumerate()
        .map(|(index, parameter)| rewrite_parameter(parameter, index + 1, map))
        .collect();

    let tab_updates: Option<Vec<TabUpdate>> = (!tabs.assignments.is_empty()).then(|| {
        tabs.assignments
            .iter()
            .map(|assignment| TabUpdate {
                id: assignment.target_id,
                name: assignment.name.clone(),
                position: assignment.position,
            })
            .collect()
    });

    AssembledPayload {
        update: DashboardUpdate {
            name: Some(dashboard.name.clone()),
            description: dashboard.description.clone().filter(|d| !d.trim().is_empty()),
            collection_id: target_collection_id,
            tabs: tab_updates,
            dashcards: Some(dashcards),
            parameters: Some(parameters),
        },
        dropped_placements,
    }
}

fn rewrite_dashcard(
    dashcard: &DashCard,
    placeholder_id: i64,
    target_card_id: Option<i64>,
    map: &IdentifierMap,
    tabs: &TabResolution,
) -> DashCardUpdate {
    DashCardUpdate {
        id: placeholder_id,
        card_id: target_card_id,
        dashboard_tab_id: dashcard.dashboard_tab_id.and_then(|tab| tabs.target_for(tab)),
        row: dashcard.row,
        col: dashcard.col,
        size_x: dashcard.size_x,
        size_y: dashcard.size_y,
        parameter_mappings: dashcard
            .parameter_mappings
            .iter()
            .filter_map(|mapping| rewrite_mapping(mapping, target_card_id, map))
            .collect(),
        visualization_settings: dashcard
            .visualization_settings
            .clone()
            .filter(|v| !v.is_null())
            .unwrap_or_else(|| Value::Object(Default::default())),
    }
}

fn rewrite_mapping(
    mapping: &ParameterMapping,
    placement_card_id: Option<i64>,
    map: &IdentifierMap,
) -> Option<ParameterMappingUpdate> {
    let parameter_id = mapping.parameter_id.as_deref().map(str::trim).filter(|id| !id.is_empty())?;
    let target = mapping.target.clone().filter(|t| !t.is_null())?;
    let card_id = mapping
        .card_id
        .and_then(|source| map.get(EntityKind::Card, source))
        .or(placement_card_id);
    Some(ParameterMappingUpdate {
        parameter_id: parameter_id.to_string(),
        card_id,
        target,
    })
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn slugify(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}

/// Carries a parameter over, synthesizing any blank identity field from its
/// 1-based position.
fn rewrite_parameter(parameter: &Parameter, position: usize, map: &IdentifierMap) -> ParameterUpdate {
    let id = non_blank(&parameter.id).unwrap_or_else(|| format!("param_{position}"));
    let name = non_blank(&parameter.name).unwrap_or_else(|| format!("Filter {position}"));
    let slug = non_blank(&parameter.slug).unwrap_or_else(|| slugify(&name));

    ParameterUpdate {
        parameter_type: non_blank(&parameter.parameter_type).unwrap_or_else(|| DEFAULT_PARAMETER_TYPE.to_string()),
        section_id: non_blank(&parameter.section_id),
        is_multi_select: parameter.is_multi_select,
        values_source_type: non_blank(&parameter.values_source_type),
        values_source_config: parameter
            .values_source_config
            .as_ref()
            .map(|config| rewrite_values_source(config, &id, map)),
        temporal_units: parameter.temporal_units.clone(),
        id,
        name,
        slug,
    }
}

fn rewrite_values_source(config: &Value, parameter_id: &str, map: &IdentifierMap) -> Value {
    let mut config = config.clone();
    let Some(source_card_id) = config.get("card_id").and_then(Value::as_i64) else {
        return config;
    };
    match map.get(EntityKind::Card, source_card_id) {
        Some(target_id) => config["card_id"] = Value::from(target_id),
        None => tracing::warn!(
            parameter_id,
            source_card_id,
            "Values source card has no target mapping, keeping source id"
        ),
    }
    config
}
