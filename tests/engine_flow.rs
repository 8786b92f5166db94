mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::{FixedOffset, Utc};
use tokio_util::sync::CancellationToken;

use common::{Answer, ScriptedApi};
use ticket_sniper::config::Config;
use ticket_sniper::engine::{AcquisitionEngine, ScheduledRun};
use ticket_sniper::types::{Credential, EventReference, SearchTag};

fn engine(api: Arc<ScriptedApi>) -> AcquisitionEngine {
    AcquisitionEngine::with_api(api, Config::default())
}

fn event_starting_in(offset: chrono::Duration) -> EventReference {
    let utc = FixedOffset::east_opt(0).unwrap();
    EventReference {
        id: "E1".to_string(),
        name: "Concert".to_string(),
        sale_start_at: (Utc::now() + offset).with_timezone(&utc),
    }
}

#[tokio::test(start_paused = true)]
async fn acquisition_reserves_once_inventory_opens() {
    let api = Arc::new(ScriptedApi::opens_after(2));
    let engine = engine(api.clone());
    let tag = SearchTag::new("vip");

    let ok = engine
        .run_acquisition(
            &Credential::new("Bearer t"),
            "E1",
            tag.as_ref(),
            Duration::from_secs(5),
        )
        .await;

    assert!(ok);
    assert_eq!(api.fetches(), 3);
    assert_eq!(api.reservation_calls().len(), 5);
    assert!(engine.session().is_pristine());
    assert!(!engine.is_running());
}

#[tokio::test(start_paused = true)]
async fn timeout_sends_no_reservations() {
    let api = Arc::new(ScriptedApi::never_opens());
    let engine = engine(api.clone());

    let report = engine
        .run_acquisition_report(
            &Credential::new("Bearer t"),
            "E1",
            None,
            Duration::from_millis(500),
        )
        .await
        .unwrap();

    assert!(!report.reserved());
    assert!(report.variants.is_none());
    assert!(report.outcome.attempts.is_empty());
    assert!(api.reservation_calls().is_empty());
    assert!(engine.session().is_pristine());
}

#[tokio::test(start_paused = true)]
async fn consecutive_runs_start_from_a_clean_session() {
    let api = Arc::new(ScriptedApi::new().by_default(Answer::Status(409)));
    let engine = engine(api.clone());
    let credential = Credential::new("Bearer t");

    let first = engine
        .run_acquisition_report(&credential, "E1", None, Duration::from_secs(1))
        .await
        .unwrap();
    let second = engine
        .run_acquisition_report(&credential, "E1", None, Duration::from_secs(1))
        .await
        .unwrap();

    assert!(!first.reserved());
    assert!(!second.reserved());
    assert_eq!(first.outcome.attempts.len(), second.outcome.attempts.len());
    assert_ne!(first.correlation_id, second.correlation_id);
    assert!(engine.session().is_pristine());
}

#[tokio::test(start_paused = true)]
async fn overlapping_run_is_rejected() {
    let api = Arc::new(ScriptedApi::never_opens());
    let engine = Arc::new(engine(api));

    let background = {
        let engine = engine.clone();
        tokio::spawn(async move {
            engine
                .run_acquisition(
                    &Credential::new("Bearer t"),
                    "E1",
                    None,
                    Duration::from_secs(1),
                )
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(engine.is_running());

    let err = engine
        .run_acquisition_report(&Credential::new("Bearer t"), "E1", None, Duration::from_secs(1))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("already in progress"));

    assert!(!background.await.unwrap());
    assert!(!engine.is_running());
}

#[tokio::test(start_paused = true)]
async fn scheduled_run_can_be_cancelled_before_start() {
    let api = Arc::new(ScriptedApi::new());
    let engine = engine(api.clone());
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        trigger.cancel();
    });

    let run = engine
        .run_scheduled(
            &Credential::new("Bearer t"),
            &event_starting_in(chrono::Duration::hours(1)),
            None,
            &cancel,
        )
        .await
        .unwrap();

    assert!(matches!(run, ScheduledRun::Cancelled));
    assert_eq!(api.fetches(), 0);
    assert!(api.reservation_calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn scheduled_run_for_open_sale_starts_immediately() {
    let api = Arc::new(ScriptedApi::new());
    let engine = engine(api.clone());

    let run = engine
        .run_scheduled(
            &Credential::new("Bearer t"),
            &event_starting_in(chrono::Duration::minutes(-5)),
            None,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    match run {
        ScheduledRun::Finished(report) => assert!(report.reserved()),
        ScheduledRun::Cancelled => panic!("run should not be cancelled"),
    }
}

#[tokio::test]
async fn credential_checks_go_through_the_api() {
    let mut api = ScriptedApi::new();
    api.authorized = false;
    let engine = engine(Arc::new(api));

    assert!(!engine.validate_credential(&Credential::new("Bearer t")).await);
    assert!(!engine.validate_credential(&Credential::new("   ")).await);
}

#[tokio::test]
async fn authorized_credential_reports_the_user() {
    let engine = engine(Arc::new(ScriptedApi::new()));

    let user = engine.authorize(&Credential::new("Bearer t")).await.unwrap();
    assert_eq!(user.full_name.as_deref(), Some("Test User"));
    assert!(engine.validate_credential(&Credential::new("Bearer t")).await);
}

#[tokio::test]
async fn shutdown_releases_the_api() {
    let api = Arc::new(ScriptedApi::new());
    let engine = engine(api.clone());

    engine.shutdown();
    assert_eq!(api.shutdowns.load(std::sync::atomic::Ordering::SeqCst), 1);
}
