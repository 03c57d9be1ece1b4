// Metabase client - reqwest implementation of the gateway port
use crate::application::error::{GatewayError, GatewayResult};
use crate::application::metabase_gateway::{
    CardPayload, DashboardUpdate, MetabaseGateway, NewCollection, NewDashboard,
};
use crate::domain::card::Card;
use crate::domain::collection::Collection;
use crate::domain::dashboard::{Dashboard, DashboardSummary};
use crate::infrastructure::config::{InstanceSettings, MigrationConfig};
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const API_KEY_HEADER: &str = "x-api-key";
const USER_AGENT: &str = concat!("dashboard-migrator/", env!("CARGO_PKG_VERSION"));

/// List endpoints answer either with a bare array or wrapped in `data`.
#[derive(Deserialize)]
#[serde(untagged)]
enum Listing {
    Flat(Vec<Value>),
    Wrapped { data: Vec<Value> },
}

impl Listing {
    fn into_items(self) -> Vec<Value> {
        match self {
            Listing::Flat(items) | Listing::Wrapped { data: items } => items,
        }
    }
}

pub struct MetabaseClient {
    base_url: String,
    api_key: String,
    client: Client,
    retry_attempts: u32,
    retry_delay: Duration,
}

impl MetabaseClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> GatewayResult<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| GatewayError::Transport {
                url: base_url.clone(),
                source: Box::new(e),
            })?;

        Ok(Self {
            base_url,
            api_key: api_key.trim().to_string(),
            client,
            retry_attempts: 0,
            retry_delay: Duration::ZERO,
        })
    }

    pub fn from_config(instance: &InstanceSettings, config: &MigrationConfig) -> GatewayResult<Self> {
        Ok(Self::new(&instance.url, &instance.api_key, config.timeout())?
            .with_retry(config.retry_attempts, config.retry_delay()))
    }

    /// Retries transport failures, 5xx and 429 responses of idempotent
    /// requests up to `attempts` extra times. POSTs are sent once.
    pub fn with_retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.retry_attempts = attempts;
        self.retry_delay = delay;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<B>(&self, method: Method, path: &str, body: Option<&B>) -> GatewayResult<String>
    where
        B: Serialize + ?Sized,
    {
        let url = self.url(path);
        // A POST may have created the entity before the failure surfaced.
        let retries = if method.is_idempotent() { self.retry_attempts } else { 0 };
        let mut attempt = 0;

        loop {
            attempt += 1;
            let mut request = self
                .client
                .request(method.clone(), &url)
                .header(API_KEY_HEADER, &self.api_key);
            if let Some(body) = body {
                request = request.json(body);
            }

            tracing::debug!(url = %url, method = %method, attempt, "Sending Metabase request");

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if is_transient(status) && attempt <= retries {
                        tracing::warn!(url = %url, status = %status, attempt, "Transient error, retrying");
                        tokio::time::sleep(self.retry_delay).await;
                        continue;
                    }

                    let text = response.text().await.map_err(|e| GatewayError::Transport {
                        url: url.clone(),
                        source: Box::new(e),
                    })?;

                    if status.is_success() {
                        return Ok(text);
                    }
                    tracing::error!(url = %url, status = %status, body = %text, "Metabase request failed");
                    return Err(status_error(status, url, text));
                }
                Err(e) => {
                    if attempt <= retries {
                        tracing::warn!(url = %url, error = %e, attempt, "Request failed, retrying");
                        tokio::time::sleep(self.retry_delay).await;
                        continue;
                    }
                    return Err(GatewayError::Transport {
                        url,
                        source: Box::new(e),
                    });
                }
            }
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> GatewayResult<T> {
        let raw = self.send::<()>(Method::GET, path, None).await?;
        parse(path, raw)
    }

    async fn get_list<T: DeserializeOwned>(&self, path: &str, keep: fn(&Value) -> bool) -> GatewayResult<Vec<T>> {
        let raw = self.send::<()>(Method::GET, path, None).await?;
        let listing: Listing = parse(path, raw)?;
        listing
            .into_items()
            .into_iter()
            .filter(|item| keep(item))
            .map(|item| {
                serde_json::from_value(item.clone()).map_err(|source| GatewayError::Deserialize {
                    context: path.to_string(),
                    raw: item.to_string(),
                    source,
                })
            })
            .collect()
    }

    async fn post_for_id<B: Serialize>(&self, path: &str, body: &B) -> GatewayResult<i64> {
        let raw = self.send(Method::POST, path, Some(body)).await?;
        let created: Value = parse(path, raw)?;
        created
            .get("id")
            .and_then(Value::as_i64)
            .ok_or_else(|| GatewayError::MissingId {
                context: format!("POST {path}"),
            })
    }

    async fn put<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> GatewayResult<T> {
        let raw = self.send(Method::PUT, path, Some(body)).await?;
        parse(path, raw)
    }
}

fn is_transient(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

fn status_error(status: StatusCode, url: String, body: String) -> GatewayError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GatewayError::Unauthorized { url },
        StatusCode::NOT_FOUND => GatewayError::NotFound { url },
        _ => GatewayError::Status {
            status: status.as_u16(),
            url,
            body,
        },
    }
}

fn parse<T: DeserializeOwned>(context: &str, raw: String) -> GatewayResult<T> {
    serde_json::from_str(&raw).map_err(|source| GatewayError::Deserialize {
        context: context.to_string(),
        raw,
        source,
    })
}

fn any_item(_: &Value) -> bool {
    true
}

/// The collection listing includes a synthetic root entry whose id is the
/// string `"root"`.
fn has_numeric_id(item: &Value) -> bool {
    item.get("id").is_some_and(Value::is_i64)
}

#[async_trait]
impl MetabaseGateway for MetabaseClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn test_connection(&self) -> GatewayResult<()> {
        self.send::<()>(Method::GET, "/api/health", None).await?;
        Ok(())
    }

    async fn list_dashboards(&self) -> GatewayResult<Vec<DashboardSummary>> {
        self.get_list("/api/dashboard", has_numeric_id).await
    }

    async fn get_dashboard(&self, id: i64) -> GatewayResult<Dashboard> {
        self.get(&format!("/api/dashboard/{id}")).await
    }

    async fn create_dashboard(&self, payload: &NewDashboard) -> GatewayResult<i64> {
        self.post_for_id("/api/dashboard", payload).await
    }

    async fn update_dashboard(&self, id: i64, payload: &DashboardUpdate) -> GatewayResult<Dashboard> {
        self.put(&format!("/api/dashboard/{id}"), payload).await
    }

    async fn get_collection(&self, id: i64) -> GatewayResult<Collection> {
        self.get(&format!("/api/collection/{id}")).await
    }

    async fn list_collections(&self) -> GatewayResult<Vec<Collection>> {
        self.get_list("/api/collection", has_numeric_id).await
    }

    async fn create_collection(&self, payload: &NewCollection) -> GatewayResult<i64> {
        self.post_for_id("/api/collection", payload).await
    }

    async fn get_card(&self, id: i64) -> GatewayResult<Card> {
        self.get(&format!("/api/card/{id}")).await
    }

    async fn list_cards(&self) -> GatewayResult<Vec<Card>> {
        self.get_list("/api/card", any_item).await
    }

    async fn create_card(&self, payload: &CardPayload) -> GatewayResult<i64> {
        self.post_for_id("/api/card", payload).await
    }

    async fn update_card(&self, id: i64, payload: &CardPayload) -> GatewayResult<Card> {
        self.put(&format!("/api/card/{id}"), payload).await
    }
}
