use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, AUTHORIZATION, CONTENT_TYPE},
    Client, StatusCode,
};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::errors::{ErrorContext, SniperError};
use crate::product::ProductPayload;
use crate::types::{AuthorizedUser, Credential};

pub const AUTH_PATH: &str = "/api/authentication/user";
pub const PRODUCTS_PATH: &str = "/api/products";
pub const RESERVATIONS_PATH: &str = "/api/reservations";

const JSON_UTF8: &str = "application/json;charset=utf-8";

/// Platform surface used by the engine. Allows injecting fakes for tests.
#[async_trait]
pub trait TicketApi: Send + Sync + std::fmt::Debug {
    /// Authenticated probe; `Some` iff the platform answered 200.
    async fn check_authorization(
        &self,
        credential: &Credential,
    ) -> Result<Option<AuthorizedUser>, SniperError>;

    /// Product record for an event, including the current ticket variants.
    async fn fetch_product(&self, product_id: &str) -> Result<ProductPayload, SniperError>;

    /// Create one reservation; returns the HTTP status the platform answered with.
    async fn create_reservation(
        &self,
        credential: &Credential,
        inventory_id: &str,
        quantity: u32,
    ) -> Result<u16, SniperError>;

    /// Release the underlying connection pool. Later calls fail with a network error.
    fn shutdown(&self);
}

#[derive(Debug, Default, Deserialize)]
struct UserPayload {
    #[serde(default)]
    model: Option<UserModel>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserModel {
    #[serde(default)]
    full_name: Option<String>,
}

/// Name from the authentication probe body; an unreadable body just means no name.
fn parse_user(body: &str) -> AuthorizedUser {
    let full_name = serde_json::from_str::<UserPayload>(body)
        .ok()
        .and_then(|p| p.model)
        .and_then(|m| m.full_name)
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());
    AuthorizedUser { full_name }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReservationRequest<'a> {
    to_create: [ReservationItem<'a>; 1],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReservationItem<'a> {
    inventory_id: &'a str,
    quantity: u32,
}

/// Production client: one pooled `reqwest::Client` shared by every request
/// of the engine's lifetime. At most `max_connections` requests are in flight
/// at once; the rest queue for a permit.
pub struct HttpTicketApi {
    base_url: String,
    client: RwLock<Option<Client>>,
    permits: Semaphore,
    max_connections: usize,
}

impl std::fmt::Debug for HttpTicketApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTicketApi")
            .field("base_url", &self.base_url)
            .field("open", &self.client.read().is_some())
            .field("max_connections", &self.max_connections)
            .field("available_permits", &self.permits.available_permits())
            .finish()
    }
}

impl HttpTicketApi {
    pub fn new(config: &Config) -> Result<Self, SniperError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("*"));

        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .pool_max_idle_per_host(config.max_idle_per_host)
            .build()
            .network_context("failed to build HTTP client")?;

        info!(
            base_url = %config.api_base_url,
            max_connections = config.max_connections,
            "HTTP client ready"
        );
        Ok(Self {
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            client: RwLock::new(Some(client)),
            permits: Semaphore::new(config.max_connections),
            max_connections: config.max_connections,
        })
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    /// Slot for one request; held until its response body has been read.
    async fn permit(&self) -> Result<SemaphorePermit<'_>, SniperError> {
        self.permits
            .acquire()
            .await
            .map_err(|_| SniperError::network("HTTP client has been shut down"))
    }

    fn client(&self) -> Result<Client, SniperError> {
        self.client
            .read()
            .as_ref()
            .cloned()
            .ok_or_else(|| SniperError::network("HTTP client has been shut down"))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl TicketApi for HttpTicketApi {
    async fn check_authorization(
        &self,
        credential: &Credential,
    ) -> Result<Option<AuthorizedUser>, SniperError> {
        let _permit = self.permit().await?;
        let client = self.client()?;
        let res = client
            .get(self.url(AUTH_PATH))
            .header(CONTENT_TYPE, JSON_UTF8)
            .header(AUTHORIZATION, credential.as_str())
            .send()
            .await
            .network_context("authentication probe failed")?;

        let status = res.status();
        debug!(status = status.as_u16(), "Authentication probe answered");
        if status != StatusCode::OK {
            return Ok(None);
        }

        let user = match res.text().await {
            Ok(body) => parse_user(&body),
            Err(e) => {
                debug!(error = %e, "Authentication body could not be read");
                AuthorizedUser::default()
            }
        };
        Ok(Some(user))
    }

    async fn fetch_product(&self, product_id: &str) -> Result<ProductPayload, SniperError> {
        let _permit = self.permit().await?;
        let client = self.client()?;
        let res = client
            .get(self.url(&format!("{}/{}", PRODUCTS_PATH, product_id)))
            .send()
            .await
            .network_context("product fetch failed")?;

        let status = res.status();
        if !status.is_success() {
            return Err(SniperError::network(format!(
                "product fetch returned status {}",
                status.as_u16()
            )));
        }

        let body = res
            .text()
            .await
            .network_context("product body could not be read")?;
        ProductPayload::from_json(&body)
    }

    async fn create_reservation(
        &self,
        credential: &Credential,
        inventory_id: &str,
        quantity: u32,
    ) -> Result<u16, SniperError> {
        let _permit = self.permit().await?;
        let client = self.client()?;
        let body = ReservationRequest {
            to_create: [ReservationItem {
                inventory_id,
                quantity,
            }],
        };

        let start = Instant::now();
        let res = client
            .post(self.url(RESERVATIONS_PATH))
            .header(CONTENT_TYPE, JSON_UTF8)
            .header(AUTHORIZATION, credential.as_str())
            .json(&body)
            .send()
            .await
            .network_context("reservation request failed")?;

        let status = res.status().as_u16();
        debug!(
            inventory_id,
            quantity,
            status,
            latency_ms = start.elapsed().as_millis() as u64,
            "Reservation answered"
        );
        Ok(status)
    }

    fn shutdown(&self) {
        // Requests still queued for a permit fail instead of waiting.
        self.permits.close();
        if self.client.write().take().is_some() {
            info!("HTTP client released");
        } else {
            warn!("HTTP client already released");
        }
    }
}
