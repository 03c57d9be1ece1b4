// Tab resolver - Two-phase mapping of source tabs onto target tab ids
use crate::application::error::GatewayResult;
use crate::application::metabase_gateway::{DashboardUpdate, MetabaseGateway, TabUpdate};
use crate::domain::dashboard::Tab;
use crate::domain::identifier_map::{EntityKind, IdentifierMap};

/// Name given to source tabs with a blank or missing name.
pub const UNTITLED_TAB: &str = "Untitled Tab";

/// Reference to a target tab. Ids of new tabs are minted by the target on
/// write, so a tab stays `Pending` until the write has been read back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabRef {
    Resolved(i64),
    Pending(u32),
}

impl TabRef {
    /// Id sent on the wire. Pending tabs use negative ids, which the
    /// target reads as "create this tab".
    pub fn wire_id(&self) -> i64 {
        match self {
            TabRef::Resolved(id) => *id,
            TabRef::Pending(token) => -i64::from(*token),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabAssignment {
    pub source_id: i64,
    pub name: String,
    pub position: i32,
    pub target_id: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TabResolution {
    pub assignments: Vec<TabAssignment>,
    /// Number of write-then-refetch cycles performed.
    pub round_trips: usize,
}

impl TabResolution {
    pub fn target_for(&self, source_tab_id: i64) -> Option<i64> {
        self.assignments
            .iter()
            .find(|a| a.source_id == source_tab_id)
            .and_then(|a| a.target_id)
    }
}

pub fn tab_name(tab: &Tab) -> String {
    match tab.name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => UNTITLED_TAB.to_string(),
    }
}

/// Target tabs handed out so far. Each target tab backs at most one
/// source tab, so namesakes are paired in order.
struct TabClaims<'t> {
    tabs: &'t [Tab],
    claimed: Vec<bool>,
}

impl<'t> TabClaims<'t> {
    fn new(tabs: &'t [Tab]) -> Self {
        Self {
            tabs,
            claimed: vec![false; tabs.len()],
        }
    }

    fn claim_id(&mut self, id: i64) -> Option<i64> {
        let index = self.tabs.iter().position(|t| t.id == id)?;
        if self.claimed[index] {
            return None;
        }
        self.claimed[index] = true;
        Some(id)
    }

    fn claim_name(&mut self, name: &str) -> Option<i64> {
        let index = self
            .tabs
            .iter()
            .enumerate()
            .position(|(i, t)| !self.claimed[i] && tab_name(t) == name)?;
        self.claimed[index] = true;
        Some(self.tabs[index].id)
    }
}

/// Maps every source tab to a target tab of the same name on the given
/// target dashboard, creating the missing ones in a single write.
///
/// When every source tab already has a namesake on the target nothing is
/// written. Source tabs sharing a name take the target namesakes in order,
/// one each.
pub async fn resolve_tabs(
    target: &dyn MetabaseGateway,
    dashboard_id: i64,
    source_tabs: &[Tab],
    map: &mut IdentifierMap,
) -> GatewayResult<TabResolution> {
    if source_tabs.is_empty() {
        return Ok(TabResolution::default());
    }

    let existing = target.get_dashboard(dashboard_id).await?.tabs;

    let mut next_token = 0;
    let mut existing_claims = TabClaims::new(&existing);
    let planned: Vec<(&Tab, String, TabRef)> = source_tabs
        .iter()
        .map(|tab| {
            let name = tab_name(tab);
            let tab_ref = match existing_claims.claim_name(&name) {
                Some(id) => TabRef::Resolved(id),
                None => {
                    next_token += 1;
                    TabRef::Pending(next_token)
                }
            };
            (tab, name, tab_ref)
        })
        .collect();

    let pending = planned
        .iter()
        .filter(|(_, _, r)| matches!(r, TabRef::Pending(_)))
        .count();

    let mut round_trips = 0;
    let final_tabs = if pending == 0 {
        tracing::debug!(dashboard_id, "All source tabs already exist on target");
        existing
    } else {
        let update = DashboardUpdate {
            tabs: Some(
                planned
                    .iter()
                    .map(|(tab, name, tab_ref)| TabUpdate {
                        id: Some(tab_ref.wire_id()),
                        name: name.clone(),
                        position: tab.position,
                    })
                    .collect(),
            ),
            ..Default::default()
        };
        tracing::info!(dashboard_id, pending, "Creating missing tabs on target dashboard");
        target.update_dashboard(dashboard_id, &update).await?;
        round_trips += 1;
        target.get_dashboard(dashboard_id).await?.tabs
    };

    // Reused tabs keep their ids; created tabs then take the remaining
    // namesakes in source order.
    let mut final_claims = TabClaims::new(&final_tabs);
    let mut target_ids: Vec<Option<i64>> = planned
        .iter()
        .map(|(_, _, tab_ref)| match tab_ref {
            TabRef::Resolved(id) => final_claims.claim_id(*id),
            TabRef::Pending(_) => None,
        })
        .collect();
    for ((_, name, _), target_id) in planned.iter().zip(target_ids.iter_mut()) {
        if target_id.is_none() {
            *target_id = final_claims.claim_name(name);
        }
    }

    let assignments = planned
        .into_iter()
        .zip(target_ids)
        .map(|((tab, name, _), target_id)| {
            match target_id {
                Some(id) => map.insert(EntityKind::Tab, tab.id, id),
                None => {
                    tracing::warn!(source_tab_id = tab.id, "Tab '{}' was not created on target", name);
                    map.mark_unresolved(EntityKind::Tab, tab.id);
                }
            }
            TabAssignment {
                source_id: tab.id,
                name,
                position: tab.position,
                target_id,
            }
        })
        .collect();

    Ok(TabResolution {
        assignments,
        round_trips,
    })
}
