use crate::common::{OTHER_TENANT, TENANT, THREE_REGION_CONFIG, TWO_REGION_CONFIG, TestPlatform};
use shard_router::{ActorKind, CompositeId, ConsumeOutcome, RegionKey, shard_index};

/// Records land on the shard their key hashes to, in the region owning that shard
#[tokio::test]
async fn test_new_records_follow_tenant_partition() {
    let platform = TestPlatform::start().await;
    platform.publish_config(TENANT, TWO_REGION_CONFIG).await;

    for i in 0..64 {
        let shard_key = format!("user-{i}");
        let issued = platform
            .coordinator
            .issue_challenge(TENANT, &shard_key, "payload")
            .await
            .unwrap();
        let id = CompositeId::decode(&issued.id).unwrap();

        assert_eq!(id.generation, 1);
        assert_eq!(id.type_prefix, "chl");
        assert_eq!(id.shard_index, shard_index(&shard_key, 8));
        let expected_region = if id.shard_index < 4 {
            RegionKey::Apac
        } else {
            RegionKey::Weur
        };
        assert_eq!(id.region, expected_region, "shard {}", id.shard_index);
    }
}

#[tokio::test]
async fn test_tenant_without_config_uses_static_default() {
    let platform = TestPlatform::start().await;
    platform.publish_config(TENANT, TWO_REGION_CONFIG).await;

    let issued = platform
        .coordinator
        .issue_challenge(OTHER_TENANT, "user-1", "payload")
        .await
        .unwrap();
    let id = CompositeId::decode(&issued.id).unwrap();

    assert_eq!(id.region, RegionKey::Weur);
    assert!(id.shard_index < 4);
}

/// Existing ids keep resolving to their original instance after a reshard
#[tokio::test]
async fn test_records_survive_reshard() {
    // Given records created under generation 1
    let platform = TestPlatform::start().await;
    platform.publish_config(TENANT, TWO_REGION_CONFIG).await;
    let coordinator = &platform.coordinator;

    let challenge = coordinator
        .issue_challenge(TENANT, "user-1", "challenge-payload")
        .await
        .unwrap();
    let refresh = coordinator
        .start_refresh_family(TENANT, "user-1")
        .await
        .unwrap();
    let session = coordinator
        .put_session(TENANT, "user-1", "session-payload")
        .await
        .unwrap();

    // When the tenant is resharded
    platform.publish_config(TENANT, THREE_REGION_CONFIG).await;

    // Then new records use generation 2
    let fresh = coordinator
        .issue_challenge(TENANT, "user-1", "other")
        .await
        .unwrap();
    assert_eq!(CompositeId::decode(&fresh.id).unwrap().generation, 2);

    // And the old records are still found
    assert_eq!(
        coordinator.consume_challenge(TENANT, &challenge.id).await.unwrap(),
        ConsumeOutcome::Consumed("challenge-payload".to_string())
    );
    assert!(coordinator.rotate_refresh_token(TENANT, &refresh).await.is_ok());
    assert_eq!(
        coordinator.get_session(TENANT, &session).await.unwrap().as_deref(),
        Some("session-payload")
    );
}

#[tokio::test]
async fn test_non_capable_region_is_hosted_nearby() {
    let platform = TestPlatform::start().await;
    platform
        .publish_config(
            TENANT,
            r#"{"generation": 5, "regions": [{"region": "afr", "shards": 2}]}"#,
        )
        .await;

    let issued = platform
        .coordinator
        .issue_challenge(TENANT, "user-1", "payload")
        .await
        .unwrap();
    let id = CompositeId::decode(&issued.id).unwrap();
    assert_eq!(id.region, RegionKey::Afr);

    let (handle, _) = platform
        .coordinator
        .router()
        .route_existing(TENANT, ActorKind::Challenge, &issued.id)
        .unwrap();
    assert_eq!(handle.instance_name, format!("{TENANT}:afr:{}", id.shard_index));
    assert_eq!(handle.location_hint, Some(RegionKey::Weur));

    assert!(
        platform
            .coordinator
            .consume_challenge(TENANT, &issued.id)
            .await
            .unwrap()
            .is_consumed()
    );
}

#[tokio::test]
async fn test_legacy_ids_route_to_default_instance() {
    let platform = TestPlatform::start().await;
    let legacy = uuid::Uuid::new_v4().to_string();

    let (handle, _) = platform
        .coordinator
        .router()
        .route_existing(TENANT, ActorKind::Challenge, &legacy)
        .unwrap();
    assert_eq!(handle.instance_name, format!("{TENANT}:default"));
    assert_eq!(handle.location_hint, None);

    assert_eq!(
        platform
            .coordinator
            .consume_challenge(TENANT, &legacy)
            .await
            .unwrap(),
        ConsumeOutcome::NotFound
    );
}

#[tokio::test]
async fn test_malformed_ids_are_rejected() {
    let platform = TestPlatform::start().await;
    let uuid = uuid::Uuid::new_v4();

    for bad in [
        format!("g1:mars:0:chl_{uuid}"),
        format!("g1:weur:x:chl_{uuid}"),
        "g1:weur:0".to_string(),
        "not-an-id".to_string(),
    ] {
        let err = platform
            .coordinator
            .consume_challenge(TENANT, &bad)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "invalid_key_format", "{bad}");
    }
}

#[test]
fn test_shard_index_is_stable() {
    let first = shard_index("user-42", 16);
    for _ in 0..100 {
        assert_eq!(shard_index("user-42", 16), first);
    }

    // Published FNV-1a test vectors
    assert_eq!(shard_router::fnv1a_32(b""), 0x811c_9dc5);
    assert_eq!(shard_router::fnv1a_32(b"a"), 0xe40c_292c);
    assert_eq!(shard_index("a", 8), 0xe40c_292c % 8);
}
