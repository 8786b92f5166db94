#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use ticket_sniper::api::TicketApi;
use ticket_sniper::errors::SniperError;
use ticket_sniper::product::ProductPayload;
use ticket_sniper::types::{AuthorizedUser, Credential, TicketVariant};

pub const OPEN_BODY: &str = r#"{"model":{"product":{"id":"E1","name":"Concert","dateSalesFrom":"2024-01-01T10:00:00+02:00"},"variants":[
    {"inventoryId":"A","name":"VIP","productVariantMaximumReservableQuantity":2},
    {"inventoryId":"B","name":"general","productVariantMaximumReservableQuantity":5}
]}}"#;

pub const CLOSED_BODY: &str = r#"{"model":{"product":{"id":"E1","name":"Concert","dateSalesFrom":"2024-01-01T10:00:00+02:00"},"variants":[]}}"#;

pub fn variant(id: &str, name: &str, max: u32) -> TicketVariant {
    TicketVariant {
        inventory_id: id.to_string(),
        name: name.to_string(),
        max_reservable_quantity: max,
    }
}

/// Reservation answer for one inventory id.
#[derive(Debug, Clone)]
pub enum Answer {
    Status(u16),
    TransportError,
}

/// Scriptable platform double. Inventory is empty for the first
/// `opens_after` fetches; fetch number `slow_fetch` (if set) sleeps before
/// answering with `slow_body`.
#[derive(Debug)]
pub struct ScriptedApi {
    pub authorized: bool,
    pub opens_after: usize,
    pub slow_fetch: Option<(usize, Duration, &'static str)>,
    pub answers: HashMap<String, Answer>,
    pub default_answer: Answer,
    pub fetch_calls: AtomicUsize,
    pub fetches_completed: AtomicUsize,
    pub reservations: Mutex<Vec<(String, u32)>>,
    pub shutdowns: AtomicUsize,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self {
            authorized: true,
            opens_after: 0,
            slow_fetch: None,
            answers: HashMap::new(),
            default_answer: Answer::Status(200),
            fetch_calls: AtomicUsize::new(0),
            fetches_completed: AtomicUsize::new(0),
            reservations: Mutex::new(Vec::new()),
            shutdowns: AtomicUsize::new(0),
        }
    }

    pub fn never_opens() -> Self {
        Self {
            opens_after: usize::MAX,
            ..Self::new()
        }
    }

    pub fn opens_after(n: usize) -> Self {
        Self {
            opens_after: n,
            ..Self::new()
        }
    }

    pub fn answering(mut self, inventory_id: &str, answer: Answer) -> Self {
        self.answers.insert(inventory_id.to_string(), answer);
        self
    }

    pub fn by_default(mut self, answer: Answer) -> Self {
        self.default_answer = answer;
        self
    }

    pub fn fetches(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn reservation_calls(&self) -> Vec<(String, u32)> {
        self.reservations.lock().clone()
    }
}

#[async_trait]
impl TicketApi for ScriptedApi {
    async fn check_authorization(
        &self,
        _credential: &Credential,
    ) -> Result<Option<AuthorizedUser>, SniperError> {
        Ok(self.authorized.then(|| AuthorizedUser {
            full_name: Some("Test User".to_string()),
        }))
    }

    async fn fetch_product(&self, _product_id: &str) -> Result<ProductPayload, SniperError> {
        let n = self.fetch_calls.fetch_add(1, Ordering::SeqCst);

        let body = match self.slow_fetch {
            Some((slow, delay, body)) if slow == n => {
                tokio::time::sleep(delay).await;
                body
            }
            _ if n < self.opens_after => CLOSED_BODY,
            _ => OPEN_BODY,
        };

        self.fetches_completed.fetch_add(1, Ordering::SeqCst);
        ProductPayload::from_json(body)
    }

    async fn create_reservation(
        &self,
        _credential: &Credential,
        inventory_id: &str,
        quantity: u32,
    ) -> Result<u16, SniperError> {
        self.reservations
            .lock()
            .push((inventory_id.to_string(), quantity));

        match self.answers.get(inventory_id).unwrap_or(&self.default_answer) {
            Answer::Status(code) => Ok(*code),
            Answer::TransportError => Err(SniperError::network("connection reset")),
        }
    }

    fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}
