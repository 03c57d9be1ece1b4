// Typed failures surfaced by the gateway port and the migration engine
use thiserror::Error;

pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("authentication rejected by {url}")]
    Unauthorized { url: String },

    #[error("{url} not found")]
    NotFound { url: String },

    #[error("request to {url} failed with status {status}: {body}")]
    Status { status: u16, url: String, body: String },

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("failed to parse {context}: {source}; raw payload: {raw}")]
    Deserialize {
        context: String,
        raw: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{context} response did not contain an id")]
    MissingId { context: String },
}

impl GatewayError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, GatewayError::NotFound { .. })
    }
}

/// Failures that abort a migration run. Everything below the dashboard
/// level degrades to a fallback instead of surfacing here.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("could not load source dashboard {id}")]
    SourceDashboard {
        id: i64,
        #[source]
        source: GatewayError,
    },

    #[error("could not create target dashboard '{name}'")]
    TargetDashboardCreate {
        name: String,
        #[source]
        source: GatewayError,
    },

    #[error("could not resolve tabs of target dashboard {dashboard_id}")]
    TabResolution {
        dashboard_id: i64,
        #[source]
        source: GatewayError,
    },

    #[error("could not update target dashboard {dashboard_id}")]
    DashboardUpdate {
        dashboard_id: i64,
        #[source]
        source: GatewayError,
    },
}
