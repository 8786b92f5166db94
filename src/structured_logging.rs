use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error, info, warn};

use crate::types::{AttemptStatus, TierKind};

/// Global correlation ID counter
static CORRELATION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

pub fn new_correlation_id() -> u64 {
    CORRELATION_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// JSON-shaped run events routed through `tracing` under the "structured" target
#[derive(Clone, Debug)]
pub struct StructuredLogger {
    correlation_id: u64,
    component: String,
}

impl StructuredLogger {
    pub fn new(component: &str) -> Self {
        Self {
            correlation_id: new_correlation_id(),
            component: component.to_string(),
        }
    }

    pub fn with_correlation_id(component: &str, correlation_id: u64) -> Self {
        Self {
            correlation_id,
            component: component.to_string(),
        }
    }

    pub fn correlation_id(&self) -> u64 {
        self.correlation_id
    }

    fn log_structured(&self, level: &str, message: &str, extra_fields: serde_json::Value) {
        let log_entry = json!({
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "level": level,
            "component": self.component,
            "correlation_id": self.correlation_id,
            "message": message,
            "fields": extra_fields
        });

        let log_string = log_entry.to_string();

        match level {
            "DEBUG" => debug!(target: "structured", "{}", log_string),
            "WARN" => warn!(target: "structured", "{}", log_string),
            "ERROR" => error!(target: "structured", "{}", log_string),
            _ => info!(target: "structured", "{}", log_string),
        }
    }

    pub fn info(&self, message: &str, fields: serde_json::Value) {
        self.log_structured("INFO", message, fields);
    }

    pub fn warn(&self, message: &str, fields: serde_json::Value) {
        self.log_structured("WARN", message, fields);
    }

    pub fn error(&self, message: &str, fields: serde_json::Value) {
        self.log_structured("ERROR", message, fields);
    }

    pub fn debug(&self, message: &str, fields: serde_json::Value) {
        self.log_structured("DEBUG", message, fields);
    }

    pub fn log_run_started(&self, event_id: &str, search_tag: Option<&str>, timeout_ms: u64) {
        self.info("acquisition_started", json!({
            "event_id": event_id,
            "search_tag": search_tag,
            "timeout_ms": timeout_ms,
            "action": "run_start"
        }));
    }

    pub fn log_poll_started(&self, event_id: &str, interval_ms: u64) {
        self.debug("poll_started", json!({
            "event_id": event_id,
            "interval_ms": interval_ms,
            "action": "poll_start"
        }));
    }

    pub fn log_variants_found(&self, variant_count: usize, fetches: u64, elapsed_ms: u64) {
        self.info("variants_found", json!({
            "variant_count": variant_count,
            "fetches": fetches,
            "elapsed_ms": elapsed_ms,
            "action": "poll_found"
        }));
    }

    pub fn log_poll_timed_out(&self, fetches: u64, elapsed_ms: u64) {
        self.warn("poll_timed_out", json!({
            "fetches": fetches,
            "elapsed_ms": elapsed_ms,
            "action": "poll_timeout"
        }));
    }

    pub fn log_fetches_cancelled(&self, outstanding: usize) {
        self.debug("fetches_cancelled", json!({
            "outstanding": outstanding,
            "action": "abort_all"
        }));
    }

    pub fn log_tier_dispatched(&self, tier: TierKind, request_count: usize) {
        self.info("tier_dispatched", json!({
            "tier": tier.label(),
            "request_count": request_count,
            "action": "tier_start"
        }));
    }

    pub fn log_reservation_result(
        &self,
        tier: TierKind,
        inventory_id: &str,
        quantity: u32,
        status: &AttemptStatus,
        latency_ms: u64,
    ) {
        let (level, outcome) = match status {
            AttemptStatus::Reserved => ("INFO", json!("reserved")),
            AttemptStatus::Rejected(code) => ("WARN", json!({ "rejected": code })),
            AttemptStatus::Failed(err) => ("WARN", json!({ "failed": err })),
        };
        self.log_structured(level, "reservation_result", json!({
            "tier": tier.label(),
            "inventory_id": inventory_id,
            "quantity": quantity,
            "outcome": outcome,
            "latency_ms": latency_ms,
            "action": "reserve"
        }));
    }

    pub fn log_run_finished(&self, reserved: bool, elapsed_ms: u64) {
        let level = if reserved { "INFO" } else { "WARN" };
        self.log_structured(level, "acquisition_finished", json!({
            "reserved": reserved,
            "elapsed_ms": elapsed_ms,
            "action": "run_end"
        }));
    }
}

/// Context that carries one correlation ID through poller and dispatcher
#[derive(Clone, Debug)]
pub struct RunContext {
    pub correlation_id: u64,
    pub logger: StructuredLogger,
}

impl RunContext {
    pub fn new(component: &str) -> Self {
        let logger = StructuredLogger::new(component);
        let correlation_id = logger.correlation_id();
        Self {
            correlation_id,
            logger,
        }
    }

    pub fn with_correlation_id(component: &str, correlation_id: u64) -> Self {
        let logger = StructuredLogger::with_correlation_id(component, correlation_id);
        Self {
            correlation_id,
            logger,
        }
    }

    pub fn child(&self, component: &str) -> Self {
        Self::with_correlation_id(component, self.correlation_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correlation_id_generation() {
        let id1 = new_correlation_id();
        let id2 = new_correlation_id();
        assert!(id2 > id1);
    }

    #[test]
    fn test_structured_logger() {
        let logger = StructuredLogger::new("test_component");
        logger.info("test message", json!({"key": "value"}));
        logger.log_reservation_result(
            TierKind::BroadMinimum,
            "inv-1",
            1,
            &AttemptStatus::Rejected(409),
            12,
        );
        assert!(logger.correlation_id() > 0);
    }

    #[test]
    fn child_context_shares_correlation_id() {
        let ctx = RunContext::new("engine");
        let child_ctx = ctx.child("poller");
        assert_eq!(ctx.correlation_id, child_ctx.correlation_id);
    }
}
