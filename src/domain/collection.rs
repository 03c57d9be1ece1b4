// Collection domain model
use serde::Deserialize;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Collection {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub authority_level: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub parent_id: Option<i64>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub personal_owner_id: Option<i64>,
}

impl Collection {
    /// Name used on the target, synthesized when the source name is blank.
    pub fn display_name(&self) -> String {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("Collection_{}", self.id),
        }
    }

    /// Parent from `parent_id`, or the last segment of the `location`
    /// path (`/1/7/` -> 7) when the record only carries its location.
    pub fn parent(&self) -> Option<i64> {
        self.parent_id.or_else(|| {
            self.location
                .as_deref()?
                .split('/')
                .filter(|segment| !segment.is_empty())
                .last()?
                .parse()
                .ok()
        })
    }

    pub fn description_or_none(&self) -> Option<String> {
        self.description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string)
    }

    pub fn namespace_or_none(&self) -> Option<String> {
        self.namespace
            .as_deref()
            .filter(|ns| !ns.trim().is_empty())
            .map(str::to_string)
    }

    pub fn has_name(&self, name: &str) -> bool {
        self.name
            .as_deref()
            .is_some_and(|n| n.to_lowercase() == name.to_lowercase())
    }
}
