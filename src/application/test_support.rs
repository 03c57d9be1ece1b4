// In-memory gateway used by the engine tests
use crate::application::card_classifier::{CardConflict, ConflictChoice, ConflictDecider};
use crate::application::error::{GatewayError, GatewayResult};
use crate::application::metabase_gateway::{
    CardPayload, DashboardUpdate, MetabaseGateway, NewCollection, NewDashboard,
};
use crate::domain::card::Card;
use crate::domain::collection::Collection;
use crate::domain::dashboard::{DashCard, Dashboard, DashboardSummary, Parameter, ParameterMapping, Tab};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    GetCollection(i64),
    ListCollections,
    CreateCollection(NewCollection),
    GetCard(i64),
    ListCards,
    CreateCard(CardPayload),
    UpdateCard(i64, CardPayload),
    ListDashboards,
    GetDashboard(i64),
    CreateDashboard(NewDashboard),
    UpdateDashboard(i64, DashboardUpdate),
}

#[derive(Default)]
struct State {
    dashboards: BTreeMap<i64, Dashboard>,
    collections: Vec<Collection>,
    cards: Vec<Card>,
    next_id: i64,
    calls: Vec<Call>,
    failing: HashSet<&'static str>,
}

pub struct InMemoryGateway {
    url: String,
    state: Mutex<State>,
}

impl InMemoryGateway {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            state: Mutex::new(State {
                next_id: 1000,
                ..Default::default()
            }),
        }
    }

    pub fn with_dashboard(self, dashboard: Dashboard) -> Self {
        self.state.lock().unwrap().dashboards.insert(dashboard.id, dashboard);
        self
    }

    pub fn with_collection(self, collection: Collection) -> Self {
        self.state.lock().unwrap().collections.push(collection);
        self
    }

    pub fn with_card(self, card: Card) -> Self {
        self.state.lock().unwrap().cards.push(card);
        self
    }

    /// Makes every call of the named operation fail with a 500.
    pub fn failing(self, operation: &'static str) -> Self {
        self.state.lock().unwrap().failing.insert(operation);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn dashboard(&self, id: i64) -> Option<Dashboard> {
        self.state.lock().unwrap().dashboards.get(&id).cloned()
    }

    pub fn created_collections(&self) -> Vec<NewCollection> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::CreateCollection(payload) => Some(payload),
                _ => None,
            })
            .collect()
    }

    pub fn created_cards(&self) -> Vec<CardPayload> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::CreateCard(payload) => Some(payload),
                _ => None,
            })
            .collect()
    }

    pub fn dashboard_updates(&self) -> Vec<(i64, DashboardUpdate)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::UpdateDashboard(id, payload) => Some((id, payload)),
                _ => None,
            })
            .collect()
    }

    fn begin(&self, operation: &'static str, call: Call) -> GatewayResult<std::sync::MutexGuard<'_, State>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        if state.failing.contains(operation) {
            return Err(GatewayError::Status {
                status: 500,
                url: format!("{}/{}", self.url, operation),
                body: "injected failure".to_string(),
            });
        }
        Ok(state)
    }

    fn not_found(&self, path: &str) -> GatewayError {
        GatewayError::NotFound {
            url: format!("{}{}", self.url, path),
        }
    }
}

impl State {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[async_trait]
impl MetabaseGateway for InMemoryGateway {
    fn base_url(&self) -> &str {
        &self.url
    }

    async fn test_connection(&self) -> GatewayResult<()> {
        Ok(())
    }

    async fn list_dashboards(&self) -> GatewayResult<Vec<DashboardSummary>> {
        let state = self.begin("list_dashboards", Call::ListDashboards)?;
        Ok(state
            .dashboards
            .values()
            .map(|d| DashboardSummary {
                id: d.id,
                name: d.name.clone(),
            })
            .collect())
    }

    async fn get_dashboard(&self, id: i64) -> GatewayResult<Dashboard> {
        let state = self.begin("get_dashboard", Call::GetDashboard(id))?;
        state
            .dashboards
            .get(&id)
            .cloned()
            .ok_or_else(|| self.not_found(&format!("/api/dashboard/{id}")))
    }

    async fn create_dashboard(&self, payload: &NewDashboard) -> GatewayResult<i64> {
        let mut state = self.begin("create_dashboard", Call::CreateDashboard(payload.clone()))?;
        let id = state.allocate_id();
        state.dashboards.insert(
            id,
            Dashboard {
                id,
                name: payload.name.clone(),
                description: payload.description.clone(),
                collection_id: payload.collection_id,
                ..Default::default()
            },
        );
        Ok(id)
    }

    async fn update_dashboard(&self, id: i64, payload: &DashboardUpdate) -> GatewayResult<Dashboard> {
        let mut state = self.begin("update_dashboard", Call::UpdateDashboard(id, payload.clone()))?;
        if !state.dashboards.contains_key(&id) {
            return Err(self.not_found(&format!("/api/dashboard/{id}")));
        }

        let tabs = payload.tabs.as_ref().map(|tabs| {
            tabs.iter()
                .map(|tab| Tab {
                    id: match tab.id {
                        Some(real) if real > 0 => real,
                        _ => state.allocate_id(),
                    },
                    dashboard_id: Some(id),
                    name: Some(tab.name.clone()),
                    position: tab.position,
                })
                .collect::<Vec<_>>()
        });
        let dashcards = payload.dashcards.as_ref().map(|dashcards| {
            dashcards
                .iter()
                .map(|dc| DashCard {
                    id: Some(state.allocate_id()),
                    card_id: dc.card_id,
                    card: dc.card_id.map(|card_id| Card {
                        id: card_id,
                        ..Default::default()
                    }),
                    dashboard_tab_id: dc.dashboard_tab_id,
                    row: dc.row,
                    col: dc.col,
                    size_x: dc.size_x,
                    size_y: dc.size_y,
                    parameter_mappings: dc
                        .parameter_mappings
                        .iter()
                        .map(|pm| ParameterMapping {
                            parameter_id: Some(pm.parameter_id.clone()),
                            card_id: pm.card_id,
                            target: Some(pm.target.clone()),
                        })
                        .collect(),
                    visualization_settings: Some(dc.visualization_settings.clone()),
                })
                .collect::<Vec<_>>()
        });

        let dashboard = state.dashboards.get_mut(&id).expect("checked above");
        if let Some(name) = &payload.name {
            dashboard.name = name.clone();
        }
        if let Some(collection_id) = payload.collection_id {
            dashboard.collection_id = Some(collection_id);
        }
        if let Some(tabs) = tabs {
            dashboard.tabs = tabs;
        }
        if let Some(dashcards) = dashcards {
            dashboard.dashcards = dashcards;
        }
        if let Some(parameters) = &payload.parameters {
            dashboard.parameters = parameters
                .iter()
                .map(|p| Parameter {
                    id: Some(p.id.clone()),
                    parameter_type: Some(p.parameter_type.clone()),
                    name: Some(p.name.clone()),
                    slug: Some(p.slug.clone()),
                    ..Default::default()
                })
                .collect();
        }
        Ok(dashboard.clone())
    }

    async fn get_collection(&self, id: i64) -> GatewayResult<Collection> {
        let state = self.begin("get_collection", Call::GetCollection(id))?;
        state
            .collections
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| self.not_found(&format!("/api/collection/{id}")))
    }

    async fn list_collections(&self) -> GatewayResult<Vec<Collection>> {
        let state = self.begin("list_collections", Call::ListCollections)?;
        Ok(state.collections.clone())
    }

    async fn create_collection(&self, payload: &NewCollection) -> GatewayResult<i64> {
        let mut state = self.begin("create_collection", Call::CreateCollection(payload.clone()))?;
        let id = state.allocate_id();
        state.collections.push(Collection {
            id,
            name: Some(payload.name.clone()),
            description: payload.description.clone(),
            authority_level: payload.authority_level.clone(),
            namespace: payload.namespace.clone(),
            parent_id: payload.parent_id,
            ..Default::default()
        });
        Ok(id)
    }

    async fn get_card(&self, id: i64) -> GatewayResult<Card> {
        let state = self.begin("get_card", Call::GetCard(id))?;
        state
            .cards
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| self.not_found(&format!("/api/card/{id}")))
    }

    async fn list_cards(&self) -> GatewayResult<Vec<Card>> {
        let state = self.begin("list_cards", Call::ListCards)?;
        Ok(state.cards.clone())
    }

    async fn create_card(&self, payload: &CardPayload) -> GatewayResult<i64> {
        let mut state = self.begin("create_card", Call::CreateCard(payload.clone()))?;
        let id = state.allocate_id();
        state.cards.push(card_from_payload(id, payload));
        Ok(id)
    }

    async fn update_card(&self, id: i64, payload: &CardPayload) -> GatewayResult<Card> {
        let mut state = self.begin("update_card", Call::UpdateCard(id, payload.clone()))?;
        let card = state
            .cards
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| self.not_found(&format!("/api/card/{id}")))?;
        *card = card_from_payload(id, payload);
        Ok(card.clone())
    }
}

fn card_from_payload(id: i64, payload: &CardPayload) -> Card {
    Card {
        id,
        name: payload.name.clone(),
        description: payload.description.clone(),
        display: payload.display.clone(),
        dataset_query: payload.dataset_query.clone(),
        visualization_settings: payload.visualization_settings.clone(),
        collection_id: payload.collection_id,
        card_type: payload.card_type.clone(),
    }
}

pub fn collection(id: i64, name: &str, parent_id: Option<i64>) -> Collection {
    Collection {
        id,
        name: Some(name.to_string()),
        parent_id,
        ..Default::default()
    }
}

pub fn card(id: i64, name: &str) -> Card {
    Card {
        id,
        name: name.to_string(),
        display: "table".to_string(),
        dataset_query: serde_json::json!({ "database": 1, "type": "native", "native": { "query": "select 1" } }),
        card_type: Some("question".to_string()),
        ..Default::default()
    }
}

pub fn placement(card: Card, tab_id: Option<i64>) -> DashCard {
    DashCard {
        id: Some(card.id * 10),
        card_id: Some(card.id),
        card: Some(card),
        dashboard_tab_id: tab_id,
        size_x: 6,
        size_y: 4,
        ..Default::default()
    }
}

pub fn tab(id: i64, name: &str, position: i32) -> Tab {
    Tab {
        id,
        dashboard_id: None,
        name: Some(name.to_string()),
        position,
    }
}

/// Replays a fixed list of answers and records which cards were asked about.
pub struct ScriptedDecider {
    choices: std::collections::VecDeque<ConflictChoice>,
    asked: Vec<String>,
}

impl ScriptedDecider {
    pub fn new(choices: Vec<ConflictChoice>) -> Self {
        Self {
            choices: choices.into(),
            asked: Vec::new(),
        }
    }

    pub fn asked(&self) -> &[String] {
        &self.asked
    }
}

impl ConflictDecider for ScriptedDecider {
    fn decide(&mut self, conflict: &CardConflict<'_>) -> ConflictChoice {
        self.asked.push(conflict.card.name.clone());
        self.choices
            .pop_front()
            .unwrap_or_else(|| panic!("no scripted answer for '{}'", conflict.card.name))
    }
}
