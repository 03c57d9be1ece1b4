// Dashboard domain model
use super::card::Card;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DashboardSummary {
    pub id: i64,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Dashboard {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub collection_id: Option<i64>,
    #[serde(default)]
    pub tabs: Vec<Tab>,
    #[serde(default)]
    pub dashcards: Vec<DashCard>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

impl Dashboard {
    /// Distinct migratable cards in order of first placement.
    pub fn referenced_cards(&self) -> Vec<&Card> {
        let mut seen = std::collections::HashSet::new();
        self.dashcards
            .iter()
            .filter_map(DashCard::referenced_card)
            .filter(|card| seen.insert(card.id))
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DashCard {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub card_id: Option<i64>,
    #[serde(default)]
    pub card: Option<Card>,
    #[serde(default)]
    pub dashboard_tab_id: Option<i64>,
    #[serde(default)]
    pub row: i32,
    #[serde(default)]
    pub col: i32,
    #[serde(default = "default_size")]
    pub size_x: i32,
    #[serde(default = "default_size")]
    pub size_y: i32,
    #[serde(default)]
    pub parameter_mappings: Vec<ParameterMapping>,
    #[serde(default)]
    pub visualization_settings: Option<Value>,
}

fn default_size() -> i32 {
    4
}

impl DashCard {
    pub fn referenced_card(&self) -> Option<&Card> {
        self.card.as_ref().filter(|card| card.is_migratable())
    }

    /// Source card id of the placement, `None` for text and heading blocks.
    pub fn source_card_id(&self) -> Option<i64> {
        self.referenced_card()
            .map(|card| card.id)
            .or(self.card_id.filter(|id| *id > 0))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Tab {
    pub id: i64,
    #[serde(default)]
    pub dashboard_id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub position: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Parameter {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, rename = "type")]
    pub parameter_type: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default, rename = "sectionId")]
    pub section_id: Option<String>,
    #[serde(default, rename = "isMultiSelect")]
    pub is_multi_select: Option<bool>,
    #[serde(default)]
    pub values_source_type: Option<String>,
    #[serde(default)]
    pub values_source_config: Option<Value>,
    #[serde(default)]
    pub temporal_units: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ParameterMapping {
    #[serde(default)]
    pub parameter_id: Option<String>,
    #[serde(default)]
    pub card_id: Option<i64>,
    #[serde(default)]
    pub target: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_source_dashboard() {
        let dashboard: Dashboard = serde_json::from_value(json!({
            "id": 7,
            "name": "Sales",
            "collection_id": null,
            "tabs": [{ "id": 3, "dashboard_id": 7, "name": "Overview", "position": 0 }],
            "dashcards": [
                {
                    "id": 100,
                    "card_id": 11,
                    "card": { "id": 11, "name": "Revenue", "display": "line" },
                    "dashboard_tab_id": 3,
                    "row": 0, "col": 0, "size_x": 6, "size_y": 4,
                    "parameter_mappings": [
                        { "parameter_id": "abc", "card_id": 11, "target": ["dimension", ["field", 5, null]] }
                    ]
                },
                {
                    "id": 101,
                    "card_id": null,
                    "card": {},
                    "visualization_settings": { "text": "hello" }
                }
            ],
            "parameters": [{ "id": "abc", "type": "category", "name": "Region", "slug": "region", "sectionId": "string" }],
            "archived": false
        }))
        .unwrap();

        assert_eq!(dashboard.tabs[0].name.as_deref(), Some("Overview"));
        assert_eq!(dashboard.dashcards[0].source_card_id(), Some(11));
        assert_eq!(dashboard.dashcards[1].source_card_id(), None);
        assert_eq!(dashboard.dashcards[1].size_x, 4);
        assert_eq!(dashboard.parameters[0].section_id.as_deref(), Some("string"));
    }

    #[test]
    fn test_referenced_cards_are_distinct() {
        let card = Card {
            id: 5,
            name: "Churn".to_string(),
            ..Default::default()
        };
        let placement = DashCard {
            card: Some(card),
            ..Default::default()
        };
        let dashboard = Dashboard {
            id: 1,
            dashcards: vec![placement.clone(), placement, DashCard::default()],
            ..Default::default()
        };

        let cards = dashboard.referenced_cards();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].name, "Churn");
    }
}
