//! Acquisition orchestrator.
//!
//! Responsibilities:
//! - Own the single `PollingSession` of this engine and reset it around every run.
//! - Sequence poller and dispatcher under one overall timeout.
//! - Reject overlapping runs on the same instance.
//! - Expose the caller-facing API: credential check, event resolution,
//!   acquisition, scheduled acquisition and shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::api::{HttpTicketApi, TicketApi};
use crate::config::Config;
use crate::errors::SniperError;
use crate::metrics::{
    metrics, Timer, ACQUISITION_LATENCY_MS, ACQUISITION_RUNS_TOTAL, ACQUISITION_SUCCESS_TOTAL,
};
use crate::poller::AvailabilityPoller;
use crate::reservation::ReservationDispatcher;
use crate::resolver;
use crate::scheduler::{await_start, start_delay_from_now, StartOutcome};
use crate::session::PollingSession;
use crate::structured_logging::RunContext;
use crate::types::{
    AuthorizedUser, Credential, EventReference, ReservationOutcome, SearchTag, TicketVariant,
};

#[derive(Debug, Clone)]
pub struct AcquisitionReport {
    pub correlation_id: u64,
    /// Snapshot the dispatcher worked from; `None` when polling timed out.
    pub variants: Option<Vec<TicketVariant>>,
    pub outcome: ReservationOutcome,
    pub elapsed: Duration,
}

impl AcquisitionReport {
    pub fn reserved(&self) -> bool {
        self.outcome.reserved
    }
}

#[derive(Debug, Clone)]
pub enum ScheduledRun {
    /// The start wait was cancelled; nothing was sent.
    Cancelled,
    Finished(AcquisitionReport),
}

pub struct AcquisitionEngine {
    api: Arc<dyn TicketApi>,
    config: Config,
    session: Arc<PollingSession>,
    running: AtomicBool,
}

impl std::fmt::Debug for AcquisitionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcquisitionEngine")
            .field("api", &self.api)
            .field("running", &self.running.load(Ordering::SeqCst))
            .finish()
    }
}

impl AcquisitionEngine {
    /// Engine backed by the real HTTP client.
    pub fn new(config: Config) -> Result<Self, SniperError> {
        config.validate()?;
        let api: Arc<dyn TicketApi> = Arc::new(HttpTicketApi::new(&config)?);
        Ok(Self::with_api(api, config))
    }

    pub fn with_api(api: Arc<dyn TicketApi>, config: Config) -> Self {
        Self {
            api,
            config,
            session: Arc::new(PollingSession::new()),
            running: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &PollingSession {
        &self.session
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub async fn validate_credential(&self, credential: &Credential) -> bool {
        resolver::validate_credential(self.api.as_ref(), credential).await
    }

    pub async fn authorize(&self, credential: &Credential) -> Option<AuthorizedUser> {
        resolver::authorize(self.api.as_ref(), credential).await
    }

    pub async fn resolve_event(&self, url: &str) -> Option<EventReference> {
        resolver::resolve_event(self.api.as_ref(), url, &self.config.event_url_prefix).await
    }

    /// Poll then reserve; true iff at least one reservation succeeded.
    pub async fn run_acquisition(
        &self,
        credential: &Credential,
        event_id: &str,
        search_tag: Option<&SearchTag>,
        overall_timeout: Duration,
    ) -> bool {
        match self
            .run_acquisition_report(credential, event_id, search_tag, overall_timeout)
            .await
        {
            Ok(report) => report.reserved(),
            Err(e) => {
                warn!(error = %e, "Acquisition not started");
                false
            }
        }
    }

    pub async fn run_acquisition_report(
        &self,
        credential: &Credential,
        event_id: &str,
        search_tag: Option<&SearchTag>,
        overall_timeout: Duration,
    ) -> Result<AcquisitionReport, SniperError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SniperError::system("acquisition already in progress"));
        }

        // Leave the engine reusable however this run ends.
        let _guard = scopeguard::guard((), |_| {
            self.session.reset();
            self.running.store(false, Ordering::SeqCst);
        });

        self.session.reset();
        let ctx = RunContext::new("engine");
        let timer = Timer::new(ACQUISITION_LATENCY_MS);
        metrics().increment_counter(ACQUISITION_RUNS_TOTAL);
        ctx.logger.log_run_started(
            event_id,
            search_tag.map(SearchTag::as_str),
            overall_timeout.as_millis() as u64,
        );

        let poller =
            AvailabilityPoller::new(self.api.clone(), self.session.clone(), ctx.child("poller"));
        let variants = poller
            .poll_for_variants(event_id, self.config.poll_interval(), overall_timeout)
            .await;

        let outcome = match &variants {
            Some(found) => {
                let dispatcher = ReservationDispatcher::new(
                    self.api.clone(),
                    self.session.clone(),
                    ctx.child("dispatcher"),
                );
                dispatcher.reserve(credential, found, search_tag).await
            }
            None => {
                info!(event_id, "No ticket variants before the deadline");
                ReservationOutcome::default()
            }
        };

        let elapsed = timer.finish();
        if outcome.reserved {
            metrics().increment_counter(ACQUISITION_SUCCESS_TOTAL);
        }
        ctx.logger
            .log_run_finished(outcome.reserved, elapsed.as_millis() as u64);

        Ok(AcquisitionReport {
            correlation_id: ctx.correlation_id,
            variants,
            outcome,
            elapsed,
        })
    }

    /// Wait until just before the sale opens, then run with the configured
    /// overall timeout.
    pub async fn run_scheduled(
        &self,
        credential: &Credential,
        event: &EventReference,
        search_tag: Option<&SearchTag>,
        cancel: &CancellationToken,
    ) -> Result<ScheduledRun, SniperError> {
        let delay = start_delay_from_now(event.sale_start_at, self.config.start_buffer());
        info!(
            event_id = %event.id,
            delay_ms = delay.as_millis() as u64,
            "Scheduled acquisition"
        );

        if await_start(delay, cancel).await == StartOutcome::Cancelled {
            return Ok(ScheduledRun::Cancelled);
        }

        let report = self
            .run_acquisition_report(
                credential,
                &event.id,
                search_tag,
                self.config.overall_timeout(),
            )
            .await?;
        Ok(ScheduledRun::Finished(report))
    }

    /// Release the network client. Later calls fail like any network error.
    pub fn shutdown(&self) {
        self.api.shutdown();
    }
}
