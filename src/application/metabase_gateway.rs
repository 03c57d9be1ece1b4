// Gateway trait for reading and writing entities on one Metabase instance
use crate::application::error::GatewayResult;
use crate::domain::card::Card;
use crate::domain::collection::Collection;
use crate::domain::dashboard::{Dashboard, DashboardSummary};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

#[async_trait]
pub trait MetabaseGateway: Send + Sync {
    /// Base URL of the instance, used for labels and log fields
    fn base_url(&self) -> &str;

    /// Cheap authenticated call used to verify connectivity
    async fn test_connection(&self) -> GatewayResult<()>;

    async fn list_dashboards(&self) -> GatewayResult<Vec<DashboardSummary>>;

    async fn get_dashboard(&self, id: i64) -> GatewayResult<Dashboard>;

    async fn create_dashboard(&self, payload: &NewDashboard) -> GatewayResult<i64>;

    /// Replaces the parts of the dashboard present in the payload
    async fn update_dashboard(&self, id: i64, payload: &DashboardUpdate) -> GatewayResult<Dashboard>;

    async fn get_collection(&self, id: i64) -> GatewayResult<Collection>;

    async fn list_collections(&self) -> GatewayResult<Vec<Collection>>;

    async fn create_collection(&self, payload: &NewCollection) -> GatewayResult<i64>;

    async fn get_card(&self, id: i64) -> GatewayResult<Card>;

    async fn list_cards(&self) -> GatewayResult<Vec<Card>>;

    async fn create_card(&self, payload: &CardPayload) -> GatewayResult<i64>;

    async fn update_card(&self, id: i64, payload: &CardPayload) -> GatewayResult<Card>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewCollection {
    pub name: String,
    pub description: Option<String>,
    pub authority_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub parent_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardPayload {
    pub name: String,
    pub description: Option<String>,
    pub dataset_query: Value,
    pub display: String,
    pub visualization_settings: Value,
    pub collection_id: Option<i64>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub card_type: Option<String>,
}

impl CardPayload {
    pub fn from_card(card: &Card, collection_id: Option<i64>) -> Self {
        let visualization_settings = if card.visualization_settings.is_null() {
            Value::Object(Default::default())
        } else {
            card.visualization_settings.clone()
        };
        Self {
            name: card.name.clone(),
            description: card.description.clone().filter(|d| !d.trim().is_empty()),
            dataset_query: card.dataset_query.clone(),
            display: card.display.clone(),
            visualization_settings,
            collection_id,
            card_type: card.card_type.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewDashboard {
    pub name: String,
    pub description: Option<String>,
    pub collection_id: Option<i64>,
}

/// Body of `PUT /api/dashboard/:id`. Absent sections are left untouched
/// by the target; present sections replace the existing ones as a unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tabs: Option<Vec<TabUpdate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dashcards: Option<Vec<DashCardUpdate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<ParameterUpdate>>,
}

/// A tab in an update request. `id` is either a real target id, a negative
/// placeholder the target replaces on write, or null.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TabUpdate {
    pub id: Option<i64>,
    pub name: String,
    pub position: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashCardUpdate {
    pub id: i64,
    pub card_id: Option<i64>,
    pub dashboard_tab_id: Option<i64>,
    pub row: i32,
    pub col: i32,
    pub size_x: i32,
    pub size_y: i32,
    pub parameter_mappings: Vec<ParameterMappingUpdate>,
    pub visualization_settings: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterMappingUpdate {
    pub parameter_id: String,
    pub card_id: Option<i64>,
    pub target: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterUpdate {
    pub id: String,
    #[serde(rename = "type")]
    pub parameter_type: String,
    pub name: String,
    pub slug: String,
    #[serde(rename = "sectionId", skip_serializing_if = "Option::is_none")]
    pub section_id: Option<String>,
    #[serde(rename = "isMultiSelect", skip_serializing_if = "Option::is_none")]
    pub is_multi_select: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values_source_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values_source_config: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temporal_units: Option<Vec<String>>,
}
