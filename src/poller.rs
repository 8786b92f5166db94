//! Availability poller.
//!
//! Launches one inventory fetch per tick without waiting for earlier ones to
//! complete, stops at the first non-empty variant list or at the deadline,
//! then aborts and drains every fetch still in flight.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::api::TicketApi;
use crate::metrics::{
    metrics, POLL_FETCHES_TOTAL, POLL_FETCH_ERRORS_TOTAL, POLL_FOUND_TOTAL, POLL_TIMEOUTS_TOTAL,
    TIME_TO_VARIANTS_MS,
};
use crate::session::PollingSession;
use crate::structured_logging::RunContext;
use crate::types::TicketVariant;

const IN_FLIGHT_GAUGE: &str = "poll_in_flight_fetches";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Polling,
    Found,
    TimedOut,
}

pub struct AvailabilityPoller {
    api: Arc<dyn TicketApi>,
    session: Arc<PollingSession>,
    ctx: RunContext,
}

impl AvailabilityPoller {
    pub fn new(api: Arc<dyn TicketApi>, session: Arc<PollingSession>, ctx: RunContext) -> Self {
        Self { api, session, ctx }
    }

    /// Poll until variants appear or `overall_timeout` elapses.
    pub async fn poll_for_variants(
        &self,
        event_id: &str,
        poll_interval: Duration,
        overall_timeout: Duration,
    ) -> Option<Vec<TicketVariant>> {
        let started_at = Instant::now();
        let deadline = started_at + overall_timeout;
        self.session
            .begin_window(started_at.into_std(), deadline.into_std());

        let event_id: Arc<str> = Arc::from(event_id);
        let mut fetches: JoinSet<()> = JoinSet::new();
        let mut launched: u64 = 0;
        let mut state = PollState::Idle;

        let mut ticker = time::interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let expiry = time::sleep_until(deadline);
        tokio::pin!(expiry);

        self.ctx
            .logger
            .log_poll_started(&event_id, poll_interval.as_millis() as u64);

        while matches!(state, PollState::Idle | PollState::Polling) {
            tokio::select! {
                biased;
                _ = self.session.wait_found() => {
                    if self.session.is_available() {
                        state = PollState::Found;
                    }
                }
                _ = &mut expiry => {
                    state = PollState::TimedOut;
                }
                _ = ticker.tick() => {
                    if self.session.is_available() {
                        state = PollState::Found;
                    } else {
                        self.spawn_fetch(&mut fetches, event_id.clone());
                        launched += 1;
                        state = PollState::Polling;
                        metrics().set_gauge(IN_FLIGHT_GAUGE, fetches.len() as u64);
                    }
                }
                Some(res) = fetches.join_next(), if !fetches.is_empty() => {
                    if let Err(e) = res {
                        if e.is_panic() {
                            warn!(error = %e, "Inventory fetch task panicked");
                        }
                    }
                }
            }
        }

        // No fetch may touch the session once this returns.
        self.ctx.logger.log_fetches_cancelled(fetches.len());
        fetches.shutdown().await;
        metrics().set_gauge(IN_FLIGHT_GAUGE, 0);

        let elapsed = started_at.elapsed();
        let found = if self.session.is_available() {
            self.session.discovered_variants()
        } else {
            None
        };

        match &found {
            Some(variants) => {
                metrics().increment_counter(POLL_FOUND_TOTAL);
                metrics().record_histogram(TIME_TO_VARIANTS_MS, elapsed);
                self.ctx
                    .logger
                    .log_variants_found(variants.len(), launched, elapsed.as_millis() as u64);
            }
            None => {
                metrics().increment_counter(POLL_TIMEOUTS_TOTAL);
                self.ctx
                    .logger
                    .log_poll_timed_out(launched, elapsed.as_millis() as u64);
            }
        }

        found
    }

    fn spawn_fetch(&self, fetches: &mut JoinSet<()>, event_id: Arc<str>) {
        let api = self.api.clone();
        let session = self.session.clone();
        let correlation_id = self.ctx.correlation_id;

        fetches.spawn(async move {
            metrics().increment_counter(POLL_FETCHES_TOTAL);
            match api.fetch_product(&event_id).await {
                Ok(payload) => {
                    let variants = payload.variants();
                    if variants.is_empty() {
                        return;
                    }
                    let count = variants.len();
                    if session.publish_variants(variants) {
                        debug!(correlation_id, count, "Fetch observed ticket variants");
                    }
                }
                Err(e) => {
                    metrics().increment_counter(POLL_FETCH_ERRORS_TOTAL);
                    debug!(correlation_id, error = %e, "Inventory fetch failed");
                }
            }
        });
    }
}
