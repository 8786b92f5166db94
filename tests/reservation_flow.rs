mod common;

use std::sync::Arc;

use common::{variant, Answer, ScriptedApi};
use ticket_sniper::reservation::ReservationDispatcher;
use ticket_sniper::session::PollingSession;
use ticket_sniper::structured_logging::RunContext;
use ticket_sniper::types::{AttemptStatus, Credential, SearchTag, TicketVariant, TierKind};

fn vip_and_general() -> Vec<TicketVariant> {
    vec![variant("A", "VIP", 2), variant("B", "general", 5)]
}

fn dispatcher(api: Arc<ScriptedApi>) -> (ReservationDispatcher, Arc<PollingSession>) {
    let session = Arc::new(PollingSession::new());
    let dispatcher = ReservationDispatcher::new(api, session.clone(), RunContext::new("test"));
    (dispatcher, session)
}

fn sent(outcome: &ticket_sniper::types::ReservationOutcome, tier: TierKind) -> Vec<(String, u32)> {
    outcome
        .attempts_in(tier)
        .map(|a| (a.inventory_id.clone(), a.quantity))
        .collect()
}

#[tokio::test]
async fn tagged_run_walks_all_three_tiers() {
    let api = Arc::new(ScriptedApi::new());
    let (dispatcher, session) = dispatcher(api.clone());
    let tag = SearchTag::new("vip").unwrap();

    let outcome = dispatcher
        .reserve(&Credential::new("Bearer t"), &vip_and_general(), Some(&tag))
        .await;

    assert!(outcome.reserved);
    assert!(session.is_reserved());
    assert_eq!(outcome.attempts.len(), 5);
    assert_eq!(sent(&outcome, TierKind::TaggedMax), vec![("A".to_string(), 2)]);
    assert_eq!(
        sent(&outcome, TierKind::BroadMinimum),
        vec![("A".to_string(), 1), ("B".to_string(), 1)]
    );
    assert_eq!(
        sent(&outcome, TierKind::BroadMax),
        vec![("A".to_string(), 2), ("B".to_string(), 5)]
    );
    assert_eq!(api.reservation_calls().len(), 5);
}

#[tokio::test]
async fn tiers_run_in_order() {
    let api = Arc::new(ScriptedApi::new());
    let (dispatcher, _) = dispatcher(api.clone());
    let tag = SearchTag::new("VIP").unwrap();

    let outcome = dispatcher
        .reserve(&Credential::new("Bearer t"), &vip_and_general(), Some(&tag))
        .await;

    let tiers: Vec<_> = outcome.attempts.iter().map(|a| a.tier).collect();
    assert_eq!(
        tiers,
        vec![
            TierKind::TaggedMax,
            TierKind::BroadMinimum,
            TierKind::BroadMinimum,
            TierKind::BroadMax,
            TierKind::BroadMax,
        ]
    );
}

#[tokio::test]
async fn every_rejection_means_not_reserved() {
    let api = Arc::new(ScriptedApi::new().by_default(Answer::Status(409)));
    let (dispatcher, session) = dispatcher(api.clone());
    let tag = SearchTag::new("vip").unwrap();

    let outcome = dispatcher
        .reserve(&Credential::new("Bearer t"), &vip_and_general(), Some(&tag))
        .await;

    assert!(!outcome.reserved);
    assert!(!session.is_reserved());
    assert_eq!(outcome.attempts.len(), 5);
    assert!(outcome
        .attempts
        .iter()
        .all(|a| a.status == AttemptStatus::Rejected(409)));
}

#[tokio::test]
async fn one_success_anywhere_is_enough() {
    // Only "B" succeeds, and only in the broad tiers since it is not tagged.
    let api = Arc::new(
        ScriptedApi::new()
            .by_default(Answer::Status(409))
            .answering("B", Answer::Status(200)),
    );
    let (dispatcher, session) = dispatcher(api);
    let tag = SearchTag::new("vip").unwrap();

    let outcome = dispatcher
        .reserve(&Credential::new("Bearer t"), &vip_and_general(), Some(&tag))
        .await;

    assert!(outcome.reserved);
    assert!(session.is_reserved());
    let ok: Vec<_> = outcome
        .successful()
        .map(|a| (a.tier, a.quantity))
        .collect();
    assert_eq!(ok, vec![(TierKind::BroadMinimum, 1), (TierKind::BroadMax, 5)]);
}

#[tokio::test]
async fn transport_errors_do_not_stop_later_tiers() {
    let api = Arc::new(ScriptedApi::new().answering("A", Answer::TransportError));
    let (dispatcher, _) = dispatcher(api.clone());

    let outcome = dispatcher
        .reserve(&Credential::new("Bearer t"), &vip_and_general(), None)
        .await;

    assert!(outcome.reserved);
    assert_eq!(outcome.attempts.len(), 4);
    let failed = outcome
        .attempts
        .iter()
        .filter(|a| matches!(a.status, AttemptStatus::Failed(_)))
        .count();
    assert_eq!(failed, 2);
}

#[tokio::test]
async fn no_tag_skips_tagged_tier() {
    let api = Arc::new(ScriptedApi::new());
    let (dispatcher, _) = dispatcher(api.clone());

    let outcome = dispatcher
        .reserve(&Credential::new("Bearer t"), &vip_and_general(), None)
        .await;

    assert_eq!(outcome.attempts_in(TierKind::TaggedMax).count(), 0);
    assert_eq!(outcome.attempts.len(), 4);
}

#[tokio::test]
async fn tag_without_matches_still_escalates() {
    let api = Arc::new(ScriptedApi::new());
    let (dispatcher, _) = dispatcher(api.clone());
    let tag = SearchTag::new("balcony").unwrap();

    let outcome = dispatcher
        .reserve(&Credential::new("Bearer t"), &vip_and_general(), Some(&tag))
        .await;

    assert_eq!(outcome.attempts_in(TierKind::TaggedMax).count(), 0);
    assert_eq!(outcome.attempts_in(TierKind::BroadMinimum).count(), 2);
    assert_eq!(outcome.attempts_in(TierKind::BroadMax).count(), 2);
}

#[tokio::test]
async fn zero_maximum_is_never_sent_at_max() {
    let api = Arc::new(ScriptedApi::new());
    let (dispatcher, _) = dispatcher(api.clone());
    let variants = vec![variant("C", "Sold out", 0)];

    let outcome = dispatcher
        .reserve(&Credential::new("Bearer t"), &variants, None)
        .await;

    assert_eq!(api.reservation_calls(), vec![("C".to_string(), 1)]);
    assert_eq!(outcome.attempts_in(TierKind::BroadMax).count(), 0);
}
