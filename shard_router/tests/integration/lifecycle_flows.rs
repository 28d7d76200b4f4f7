use std::sync::Arc;
use std::time::Duration;

use crate::common::{TENANT, TWO_REGION_CONFIG, TestPlatform};
use shard_router::{ConsumeOutcome, CoordinationError, FamilyState, RoutingSettings, ThrottleConfig};

const CLIENT_IP: &str = "203.0.113.7";

/// Concurrent consumers of one challenge: exactly one wins
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_challenge_single_consumption_under_contention() {
    let platform = Arc::new(TestPlatform::start().await);
    platform.publish_config(TENANT, TWO_REGION_CONFIG).await;
    let issued = platform
        .coordinator
        .issue_challenge(TENANT, "user-1", "payload")
        .await
        .unwrap();

    let mut tasks = Vec::new();
    for _ in 0..32 {
        let platform = platform.clone();
        let id = issued.id.clone();
        tasks.push(tokio::spawn(async move {
            platform.coordinator.consume_challenge(TENANT, &id).await
        }));
    }

    let mut consumed = 0;
    let mut replays = 0;
    for task in tasks {
        match task.await.unwrap().unwrap() {
            ConsumeOutcome::Consumed(payload) => {
                assert_eq!(payload, "payload");
                consumed += 1;
            }
            ConsumeOutcome::AlreadyConsumed => replays += 1,
            other => panic!("unexpected outcome {other:?}"),
        }
    }
    assert_eq!(consumed, 1);
    assert_eq!(replays, 31);
}

/// OAuth authorization code: issue, redeem once, refuse the replay
#[tokio::test]
async fn test_authorization_code_flow() {
    let platform = TestPlatform::start().await;
    let coordinator = &platform.coordinator;

    let code = coordinator
        .issue_authorization_code(TENANT, "client-1", r#"{"sub":"user-1"}"#)
        .await
        .unwrap();
    assert_eq!(
        coordinator
            .redeem_authorization_code(TENANT, &code.id)
            .await
            .unwrap(),
        r#"{"sub":"user-1"}"#
    );

    let replay = coordinator
        .redeem_authorization_code(TENANT, &code.id)
        .await
        .unwrap_err();
    assert_eq!(replay.protocol_error(), "invalid_grant");

    // An expired code looks the same to the client
    let late = coordinator
        .issue_authorization_code(TENANT, "client-1", "grant")
        .await
        .unwrap();
    platform.clock.advance_secs(61);
    let expired = coordinator
        .redeem_authorization_code(TENANT, &late.id)
        .await
        .unwrap_err();
    assert_eq!(expired.protocol_error(), "invalid_grant");
}

/// Replaying a rotated refresh token revokes the whole family for good
#[tokio::test]
async fn test_refresh_token_reuse_revokes_family() {
    // Given a family rotated once
    let platform = TestPlatform::start().await;
    platform.publish_config(TENANT, TWO_REGION_CONFIG).await;
    let coordinator = &platform.coordinator;

    let original = coordinator
        .start_refresh_family(TENANT, "user-1")
        .await
        .unwrap();
    let current = coordinator
        .rotate_refresh_token(TENANT, &original)
        .await
        .unwrap();

    // When the superseded token is presented
    let err = coordinator
        .rotate_refresh_token(TENANT, &original)
        .await
        .unwrap_err();

    // Then reuse is reported and the current token no longer works
    assert_eq!(err, CoordinationError::ReuseDetected);
    let err = coordinator
        .rotate_refresh_token(TENANT, &current)
        .await
        .unwrap_err();
    assert_eq!(err.protocol_error(), "invalid_grant");

    let status = coordinator
        .refresh_family_status(TENANT, &current)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(status.state, FamilyState::Revoked);
    assert!(status.reuse_detected);
}

/// Five failures block the IP; the block lifts after its duration
#[tokio::test]
async fn test_login_throttle_blocks_and_recovers() {
    let platform = TestPlatform::with_settings(RoutingSettings {
        rate_limit: ThrottleConfig {
            max_attempts: 5,
            window: Duration::from_secs(900),
            block_duration: Duration::from_secs(900),
        },
        ..RoutingSettings::default()
    })
    .await;
    let coordinator = &platform.coordinator;

    for _ in 0..5 {
        coordinator
            .record_login_failure(TENANT, CLIENT_IP)
            .await
            .unwrap();
    }

    match coordinator.check_login_allowed(TENANT, CLIENT_IP).await {
        Err(CoordinationError::RateLimited {
            retry_after_seconds,
        }) => assert!(retry_after_seconds > 0),
        other => panic!("expected a block, got {other:?}"),
    }

    platform.clock.advance_secs(900);

    let status = coordinator
        .check_login_allowed(TENANT, CLIENT_IP)
        .await
        .unwrap();
    assert!(!status.blocked);
}

#[tokio::test]
async fn test_successful_login_clears_failures() {
    let platform = TestPlatform::start().await;
    let coordinator = &platform.coordinator;

    for _ in 0..4 {
        coordinator
            .record_login_failure(TENANT, CLIENT_IP)
            .await
            .unwrap();
    }
    assert!(coordinator.clear_login_failures(TENANT, CLIENT_IP).await.unwrap());

    // The count starts over, so a fifth failure does not block
    let status = coordinator
        .record_login_failure(TENANT, CLIENT_IP)
        .await
        .unwrap();
    assert!(!status.blocked);
    assert_eq!(status.attempts, 1);
}

#[tokio::test]
async fn test_shutdown_drops_actor_state() {
    let platform = TestPlatform::start().await;
    let coordinator = &platform.coordinator;
    let issued = coordinator
        .issue_challenge(TENANT, "user-1", "payload")
        .await
        .unwrap();

    coordinator.shutdown().await;

    // Instances are respawned empty on the next call
    assert_eq!(
        coordinator.consume_challenge(TENANT, &issued.id).await.unwrap(),
        ConsumeOutcome::NotFound
    );
}
