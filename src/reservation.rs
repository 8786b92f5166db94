//! Reservation dispatcher and its tiered fallback policy.
//!
//! The policy is plain data: an ordered list of tiers, each a variant filter
//! plus a quantity rule. Every tier is fanned out concurrently and joined in
//! full before the next one starts.

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tracing::debug;

use crate::api::TicketApi;
use crate::metrics::{
    metrics, RESERVATION_FAILURE_TOTAL, RESERVATION_LATENCY_MS, RESERVATION_REQUESTS_TOTAL,
    RESERVATION_SUCCESS_TOTAL,
};
use crate::session::PollingSession;
use crate::structured_logging::RunContext;
use crate::types::{
    AttemptStatus, Credential, ReservationAttempt, ReservationOutcome, SearchTag, TicketVariant,
    TierKind,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariantFilter {
    Tagged(SearchTag),
    All,
}

impl VariantFilter {
    pub fn selects(&self, variant: &TicketVariant) -> bool {
        match self {
            VariantFilter::Tagged(tag) => tag.matches(&variant.name),
            VariantFilter::All => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityRule {
    One,
    Maximum,
}

impl QuantityRule {
    pub fn quantity_for(&self, variant: &TicketVariant) -> u32 {
        match self {
            QuantityRule::One => 1,
            QuantityRule::Maximum => variant.max_reservable_quantity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationTier {
    pub kind: TierKind,
    pub filter: VariantFilter,
    pub quantity: QuantityRule,
}

impl ReservationTier {
    /// (variant, quantity) pairs this tier sends, in variant order.
    ///
    /// Unlike a plain "request the maximum of every selected variant", a
    /// variant whose maximum is 0 gets no max-quantity request at all. The
    /// one-each tier still asks for 1 of it.
    pub fn requests<'a>(&self, variants: &'a [TicketVariant]) -> Vec<(&'a TicketVariant, u32)> {
        variants
            .iter()
            .filter(|v| self.filter.selects(v))
            .map(|v| (v, self.quantity.quantity_for(v)))
            .filter(|(_, qty)| *qty > 0)
            .collect()
    }
}

/// Escalating policy: tagged at max (only with a tag), then everything at
/// one each, then everything at max.
pub fn reservation_tiers(search_tag: Option<&SearchTag>) -> Vec<ReservationTier> {
    let mut tiers = Vec::with_capacity(3);
    if let Some(tag) = search_tag {
        tiers.push(ReservationTier {
            kind: TierKind::TaggedMax,
            filter: VariantFilter::Tagged(tag.clone()),
            quantity: QuantityRule::Maximum,
        });
    }
    tiers.push(ReservationTier {
        kind: TierKind::BroadMinimum,
        filter: VariantFilter::All,
        quantity: QuantityRule::One,
    });
    tiers.push(ReservationTier {
        kind: TierKind::BroadMax,
        filter: VariantFilter::All,
        quantity: QuantityRule::Maximum,
    });
    tiers
}

pub struct ReservationDispatcher {
    api: Arc<dyn TicketApi>,
    session: Arc<PollingSession>,
    ctx: RunContext,
}

impl ReservationDispatcher {
    pub fn new(api: Arc<dyn TicketApi>, session: Arc<PollingSession>, ctx: RunContext) -> Self {
        Self { api, session, ctx }
    }

    pub async fn reserve(
        &self,
        credential: &Credential,
        variants: &[TicketVariant],
        search_tag: Option<&SearchTag>,
    ) -> ReservationOutcome {
        let mut attempts = Vec::new();

        for tier in reservation_tiers(search_tag) {
            let requests = tier.requests(variants);
            if requests.is_empty() {
                debug!(tier = tier.kind.label(), "No variants selected; skipping tier");
                continue;
            }

            self.ctx.logger.log_tier_dispatched(tier.kind, requests.len());
            let results = join_all(
                requests
                    .into_iter()
                    .map(|(variant, qty)| self.send_one(credential, tier.kind, variant, qty)),
            )
            .await;
            attempts.extend(results);
        }

        let reserved = attempts.iter().any(ReservationAttempt::succeeded);
        ReservationOutcome { attempts, reserved }
    }

    async fn send_one(
        &self,
        credential: &Credential,
        tier: TierKind,
        variant: &TicketVariant,
        quantity: u32,
    ) -> ReservationAttempt {
        metrics().increment_counter(RESERVATION_REQUESTS_TOTAL);
        let start = Instant::now();

        let status = match self
            .api
            .create_reservation(credential, &variant.inventory_id, quantity)
            .await
        {
            Ok(200) => {
                self.session.mark_reserved();
                AttemptStatus::Reserved
            }
            Ok(code) => AttemptStatus::Rejected(code),
            Err(e) => AttemptStatus::Failed(e.to_string()),
        };

        let latency = start.elapsed();
        metrics().record_histogram(RESERVATION_LATENCY_MS, latency);
        if status == AttemptStatus::Reserved {
            metrics().increment_counter(RESERVATION_SUCCESS_TOTAL);
        } else {
            metrics().increment_counter(RESERVATION_FAILURE_TOTAL);
        }
        self.ctx.logger.log_reservation_result(
            tier,
            &variant.inventory_id,
            quantity,
            &status,
            latency.as_millis() as u64,
        );

        ReservationAttempt {
            tier,
            inventory_id: variant.inventory_id.clone(),
            quantity,
            status,
        }
    }
}
