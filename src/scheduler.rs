use chrono::{DateTime, FixedOffset, Utc};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Elapsed,
    Cancelled,
}

/// Delay until `safety_buffer` before the sale starts; never negative.
/// Both instants are compared as absolute UTC milliseconds.
pub fn compute_start_delay(
    sale_start_at: DateTime<FixedOffset>,
    safety_buffer: Duration,
    now: DateTime<Utc>,
) -> Duration {
    let until_start_ms = sale_start_at.timestamp_millis() - now.timestamp_millis();
    let buffer_ms = i64::try_from(safety_buffer.as_millis()).unwrap_or(i64::MAX);
    let delay_ms = until_start_ms.saturating_sub(buffer_ms).max(0);
    Duration::from_millis(delay_ms as u64)
}

pub fn start_delay_from_now(sale_start_at: DateTime<FixedOffset>, safety_buffer: Duration) -> Duration {
    compute_start_delay(sale_start_at, safety_buffer, Utc::now())
}

/// Sleep for `delay` unless `cancel` fires first.
pub async fn await_start(delay: Duration, cancel: &CancellationToken) -> StartOutcome {
    if delay.is_zero() {
        debug!("Sale already open; starting immediately");
        return if cancel.is_cancelled() {
            StartOutcome::Cancelled
        } else {
            StartOutcome::Elapsed
        };
    }

    info!(delay_ms = delay.as_millis() as u64, "Waiting for sale start");
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            info!("Start wait cancelled");
            StartOutcome::Cancelled
        }
        _ = tokio::time::sleep(delay) => StartOutcome::Elapsed,
    }
}
