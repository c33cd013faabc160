use std::{sync::Arc, time::Duration};

use passbolt_resource::{ApiError, ResourceTypeCache};
use uuid::Uuid;

mod common;
use common::{resource_type, StubResourceTypes};

#[tokio::test]
async fn test_second_lookup_is_a_hit() {
    let ty = resource_type("v5-default");
    let api = Arc::new(StubResourceTypes::new([&ty]));
    let cache = ResourceTypeCache::new(api.clone());

    let first = cache.get_or_fetch(ty.id).await.unwrap();
    let second = cache.get_or_fetch(ty.id).await.unwrap();

    assert_eq!(*first, ty);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(api.calls(), 1);
    assert_eq!(cache.len().await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_lookups_share_one_fetch() {
    let ty = resource_type("password-string");
    let api = Arc::new(StubResourceTypes::new([&ty]).with_latency(Duration::from_millis(20)));
    let cache = Arc::new(ResourceTypeCache::new(api.clone()));

    let lookups: Vec<_> = (0..16)
        .map(|_| {
            let cache = cache.clone();
            let id = ty.id;
            tokio::spawn(async move { cache.get_or_fetch(id).await })
        })
        .collect();
    for lookup in lookups {
        assert_eq!(lookup.await.unwrap().unwrap().slug, "password-string");
    }

    assert_eq!(api.calls(), 1);
}

#[tokio::test]
async fn test_failures_are_not_cached() {
    let ty = resource_type("totp");
    let api = Arc::new(StubResourceTypes::new([&ty]).failing(1));
    let cache = ResourceTypeCache::new(api.clone());

    assert!(matches!(
        cache.get_or_fetch(ty.id).await,
        Err(ApiError::Transport(_))
    ));
    assert!(cache.is_empty().await);

    assert_eq!(cache.get_or_fetch(ty.id).await.unwrap().id, ty.id);
    assert_eq!(api.calls(), 2);
}

#[tokio::test]
async fn test_unknown_type() {
    let api = Arc::new(StubResourceTypes::default());
    let cache = ResourceTypeCache::new(api);

    assert!(matches!(
        cache.get_or_fetch(Uuid::new_v4()).await,
        Err(ApiError::ResponseContent { status: 404, .. })
    ));
}
