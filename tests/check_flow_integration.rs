//! Integration tests for the session and check pipeline core.
//!
//! These tests run the real application components end to end:
//! 1. SessionManager drives the engine handshake and state machine
//! 2. CheckPipeline runs a paced batch against the engine
//! 3. SubscriberRegistry fans progress out to observers
//! 4. History and session status land in the repositories
//!
//! Uses the scriptable engine double and in-memory repositories, so the only
//! real time spent is the pipeline's fixed pacing between jobs.

use std::sync::Arc;
use std::time::Duration;

use wa_checker::adapters::engine::MockEngineFactory;
use wa_checker::adapters::memory::{
    InMemoryCheckHistoryRepository, InMemorySessionStatusRepository,
};
use wa_checker::application::{CheckPipeline, ObserverId, SessionManager, SubscriberRegistry};
use wa_checker::domain::check::CheckStatus;
use wa_checker::domain::foundation::{ErrorCode, UserId};
use wa_checker::domain::session::{SessionEvent, SessionState};
use wa_checker::ports::{CheckHistoryRepository, SessionStatusRepository};

struct Harness {
    factory: Arc<MockEngineFactory>,
    subscribers: Arc<SubscriberRegistry>,
    status: Arc<InMemorySessionStatusRepository>,
    history: Arc<InMemoryCheckHistoryRepository>,
    manager: Arc<SessionManager>,
    pipeline: Arc<CheckPipeline>,
}

async fn harness(registered: &[&str]) -> Harness {
    let factory = Arc::new(MockEngineFactory::new().with_registered(registered).await);
    let subscribers = Arc::new(SubscriberRegistry::with_default_capacity());
    let status = Arc::new(InMemorySessionStatusRepository::new());
    let history = Arc::new(InMemoryCheckHistoryRepository::new());
    let manager = Arc::new(SessionManager::new(
        factory.clone(),
        subscribers.clone(),
        status.clone() as Arc<dyn SessionStatusRepository>,
    ));
    let pipeline = Arc::new(CheckPipeline::new(
        manager.clone(),
        history.clone() as Arc<dyn CheckHistoryRepository>,
        subscribers.clone(),
    ));
    Harness {
        factory,
        subscribers,
        status,
        history,
        manager,
        pipeline,
    }
}

async fn wait_for_state(manager: &SessionManager, user: &UserId, want: SessionState) {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if manager.state(user).await == Some(want) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("session never reached {:?}", want));
}

/// Drives a session to `Ready` through the engine handshake.
async fn connect_ready(h: &Harness, user: UserId) {
    let state = h.manager.init(user).await.expect("init failed");
    assert_eq!(state, SessionState::AwaitingScan);

    let engine = h.factory.last_engine().await.expect("no engine created");
    engine.emit_qr("qr-payload").await;
    engine.emit_ready("Alice", "628555000111").await;
    wait_for_state(&h.manager, &user, SessionState::Ready).await;
}

#[tokio::test]
async fn full_check_flow_streams_events_and_persists_history() {
    let h = harness(&["6288980818668"]).await;
    let user = UserId::new();
    connect_ready(&h, user).await;

    // Subscribe after the handshake; the observer sees only run events.
    let mut room_rx = h.subscribers.subscribe(&user, ObserverId::new()).await;

    let numbers = vec![
        "088980818668".to_string(), // leading 0 -> 6288980818668, registered
        "abc".to_string(),          // normalizes to empty, skipped
        "628123456789".to_string(), // not registered
    ];
    let stats = h.pipeline.run(user, numbers).await.expect("run failed");

    assert_eq!(stats.total, 2);
    assert_eq!(stats.checked, 2);
    assert_eq!(stats.active, 1);
    assert_eq!(stats.non_registered, 1);
    assert_eq!(stats.errors, 0);

    // Event order: start/result per job, then the completion marker.
    match room_rx.recv().await.unwrap() {
        SessionEvent::CheckStart { number } => assert_eq!(number, "6288980818668"),
        other => panic!("expected CheckStart, got {:?}", other),
    }
    match room_rx.recv().await.unwrap() {
        SessionEvent::CheckResult { result } => {
            assert_eq!(result.phone_number, "6288980818668");
            assert_eq!(result.status, CheckStatus::Active);
        }
        other => panic!("expected CheckResult, got {:?}", other),
    }
    match room_rx.recv().await.unwrap() {
        SessionEvent::CheckStart { number } => assert_eq!(number, "628123456789"),
        other => panic!("expected CheckStart, got {:?}", other),
    }
    match room_rx.recv().await.unwrap() {
        SessionEvent::CheckResult { result } => {
            assert_eq!(result.status, CheckStatus::NonWa);
        }
        other => panic!("expected CheckResult, got {:?}", other),
    }
    assert_eq!(room_rx.recv().await.unwrap(), SessionEvent::CheckComplete);

    // Both results are durable; the skipped entry never was a job.
    let entries = h.history.all().await;
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].phone_number, "6288980818668");
    assert_eq!(entries[1].phone_number, "628123456789");

    // The engine only ever saw normalized addresses.
    let engine = h.factory.last_engine().await.unwrap();
    assert_eq!(
        engine.queried_numbers().await,
        vec!["6288980818668", "628123456789"]
    );

    let row = h.status.find(&user).await.unwrap().unwrap();
    assert!(row.is_authenticated);
    assert_eq!(row.account_name.as_deref(), Some("Alice"));
}

#[tokio::test]
async fn engine_disconnect_cancels_the_active_run() {
    let h = harness(&[]).await;
    let user = UserId::new();
    connect_ready(&h, user).await;

    let pipeline = h.pipeline.clone();
    let run = tokio::spawn(async move {
        pipeline
            .run(user, vec!["628111".into(), "628222".into(), "628333".into()])
            .await
    });

    // Let the first job finish, then drop the session mid-pacing.
    tokio::time::sleep(Duration::from_millis(300)).await;
    let engine = h.factory.last_engine().await.unwrap();
    engine.emit_disconnected().await;

    let stats = run.await.unwrap().expect("cancelled run still completes");
    assert_eq!(stats.checked, 1);
    assert_eq!(h.history.all().await.len(), 1);

    wait_for_state(&h.manager, &user, SessionState::Disconnected).await;
}

#[tokio::test]
async fn second_run_is_rejected_while_one_is_active() {
    let h = harness(&[]).await;
    let user = UserId::new();
    connect_ready(&h, user).await;

    let pipeline = h.pipeline.clone();
    let run = tokio::spawn(async move {
        pipeline
            .run(user, vec!["628111".into(), "628222".into()])
            .await
    });

    tokio::time::sleep(Duration::from_millis(300)).await;
    let err = h
        .pipeline
        .run(user, vec!["628999".into()])
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::RunInProgress);

    // Stop the first run; the claim is released and a new run is accepted.
    assert!(h.manager.cancel_run(&user).await);
    run.await.unwrap().expect("first run");

    let stats = h.pipeline.run(user, vec!["628999".into()]).await.unwrap();
    assert_eq!(stats.checked, 1);
}

#[tokio::test]
async fn run_against_unscanned_session_is_rejected() {
    let h = harness(&[]).await;
    let user = UserId::new();
    h.manager.init(user).await.unwrap();

    let err = h
        .pipeline
        .run(user, vec!["628111".into()])
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::SessionNotReady);
}

#[tokio::test]
async fn teardown_shuts_the_engine_and_clears_persisted_status() {
    let h = harness(&[]).await;
    let user = UserId::new();
    connect_ready(&h, user).await;
    assert!(h.status.find(&user).await.unwrap().is_some());

    h.manager.teardown(&user).await.unwrap();

    let engine = h.factory.last_engine().await.unwrap();
    assert!(engine.was_shut_down());
    assert!(h.manager.state(&user).await.is_none());
    assert!(h.status.find(&user).await.unwrap().is_none());

    // A fresh init builds a brand new engine.
    h.manager.init(user).await.unwrap();
    assert_eq!(h.factory.created_count(), 2);
}
