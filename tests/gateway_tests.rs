//! Gateway behaviour tests
//!
//! Exercise the entity gateway end to end against the in-memory backend:
//! memoization, coalescing, expiry and write invalidation.

mod common;

use std::time::Duration;

use futures::future::join_all;
use rental_cache::backend::{FileUpload, Method};
use rental_cache::{EntityGateway, EntityId, GatewayError, Params};
use serde::Deserialize;
use serde_json::{json, Value};

use common::{seeded, MemoryBackend};

#[derive(Debug, Deserialize, PartialEq)]
struct Apartment {
    id: i64,
    name: String,
}

#[derive(Debug, Deserialize, PartialEq)]
struct Tenant {
    id: i64,
    name: String,
}

fn gateway(backend: &std::sync::Arc<MemoryBackend>) -> EntityGateway {
    EntityGateway::new(backend.clone())
}

fn active() -> Params {
    Params::new().with("status", "active")
}

// == Reads ==

#[tokio::test(start_paused = true)]
async fn test_concurrent_reads_share_one_call() {
    let backend = seeded();
    backend.set_delay(Duration::from_millis(50));
    let gateway = gateway(&backend);

    let reads = (0..10).map(|_| gateway.get_all::<Apartment>("apartments", None, false));
    let results = join_all(reads).await;

    assert_eq!(backend.reads_of("apartments"), 1);
    for result in results {
        assert_eq!(result.unwrap().len(), 2);
    }
}

#[tokio::test]
async fn test_repeated_read_is_served_from_cache() {
    let backend = seeded();
    let gateway = gateway(&backend);

    let first: Vec<Apartment> = gateway.get_all("apartments", None, false).await.unwrap();
    let second: Vec<Apartment> = gateway.get_all("apartments", None, false).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(backend.reads_of("apartments"), 1);

    let stats = gateway.cache_stats().await;
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.keys, vec!["apartments".to_string()]);
}

#[tokio::test]
async fn test_params_partition_the_cache() {
    let backend = seeded();
    let gateway = gateway(&backend);

    gateway.get_json("leases", None, false).await.unwrap();
    gateway.get_json("leases", Some(&active()), false).await.unwrap();
    gateway
        .get_json("leases", Some(&Params::new()), false)
        .await
        .unwrap();

    // Empty params share the unfiltered key.
    assert_eq!(backend.reads_of("leases"), 2);
    assert_eq!(gateway.cache_stats().await.size, 2);
}

#[tokio::test]
async fn test_forced_refresh_overwrites_entry() {
    let backend = seeded();
    let gateway = gateway(&backend);

    gateway.get_all::<Tenant>("tenants", None, false).await.unwrap();
    backend.seed("tenants", json!([{ "id": 7, "name": "Ada" }, { "id": 8, "name": "Lin" }]));

    let refreshed: Vec<Tenant> = gateway.get_all("tenants", None, true).await.unwrap();
    assert_eq!(refreshed.len(), 2);

    let cached: Vec<Tenant> = gateway.get_all("tenants", None, false).await.unwrap();
    assert_eq!(cached.len(), 2);
    assert_eq!(backend.reads_of("tenants"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_entry_expires_after_ttl() {
    let backend = seeded();
    let gateway = gateway(&backend).with_ttl(Duration::from_secs(1));

    gateway.get_json("apartments", None, false).await.unwrap();
    tokio::time::advance(Duration::from_millis(500)).await;
    gateway.get_json("apartments", None, false).await.unwrap();
    assert_eq!(backend.reads_of("apartments"), 1);

    tokio::time::advance(Duration::from_millis(600)).await;
    gateway.get_json("apartments", None, false).await.unwrap();
    assert_eq!(backend.reads_of("apartments"), 2);
    assert_eq!(gateway.cache_stats().await.expirations, 1);
}

#[tokio::test]
async fn test_oversized_ttl_still_caches() {
    let backend = seeded();
    let gateway = gateway(&backend).with_ttl(Duration::from_secs(u64::MAX));

    gateway.get_json("apartments", None, false).await.unwrap();
    gateway.get_json("apartments", None, false).await.unwrap();

    assert_eq!(backend.reads_of("apartments"), 1);
    assert_eq!(gateway.cache_stats().await.hits, 1);
}

#[tokio::test]
async fn test_failed_read_is_not_cached() {
    let backend = seeded();
    let gateway = gateway(&backend);

    let first = gateway.get_by_id::<Tenant>("tenants", 99, None, false).await;
    let second = gateway.get_by_id::<Tenant>("tenants", 99, None, false).await;

    assert!(matches!(first, Err(GatewayError::NotFound(_))));
    assert!(matches!(second, Err(GatewayError::NotFound(_))));
    assert_eq!(backend.reads_of("tenants/99"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_coalesced_failure_reaches_every_caller() {
    let backend = seeded();
    backend.set_delay(Duration::from_millis(20));
    let gateway = gateway(&backend);

    let (a, b) = tokio::join!(
        gateway.get_json("invoices", None, false),
        gateway.get_json("invoices", None, false)
    );

    assert!(matches!(a, Err(GatewayError::NotFound(_))));
    assert_eq!(a, b);
    assert_eq!(backend.reads_of("invoices"), 1);
    assert_eq!(gateway.cache_stats().await.pending_requests, 0);
}

#[tokio::test]
async fn test_related_read_and_record_read() {
    let backend = seeded();
    let gateway = gateway(&backend);

    let readings: Vec<Value> = gateway
        .get_related("apartments", 1, "meter-readings", None, false)
        .await
        .unwrap();
    let apartment: Apartment = gateway.get_by_id("apartments", 1, None, false).await.unwrap();

    assert_eq!(readings, vec![json!({ "value": 120 })]);
    assert_eq!(apartment.name, "Flat 1");
}

#[tokio::test]
async fn test_download_bypasses_cache() {
    let backend = seeded();
    let gateway = gateway(&backend);

    let first = gateway.download("invoices/4/pdf").await.unwrap();
    let second = gateway.download("invoices/4/pdf").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(gateway.cache_stats().await.size, 0);
}

// == Writes ==

#[tokio::test]
async fn test_update_then_read_returns_fresh_record() {
    let backend = seeded();
    let gateway = gateway(&backend);

    let before: Tenant = gateway.get_by_id("tenants", 7, None, false).await.unwrap();
    assert_eq!(before.name, "Ada");

    let _: Tenant = gateway
        .update("tenants", 7, &json!({ "id": 7, "name": "Grace" }), Vec::new())
        .await
        .unwrap();

    let after: Tenant = gateway.get_by_id("tenants", 7, None, false).await.unwrap();
    assert_eq!(after.name, "Grace");
    assert_eq!(backend.reads_of("tenants/7"), 2);
}

#[tokio::test]
async fn test_create_discards_cached_list() {
    let backend = seeded();
    let gateway = gateway(&backend);

    let before: Vec<Apartment> = gateway.get_all("apartments", None, false).await.unwrap();
    let _: Apartment = gateway
        .create("apartments", &json!({ "id": 3, "name": "Flat 3" }), Vec::new())
        .await
        .unwrap();
    let after: Vec<Apartment> = gateway.get_all("apartments", None, false).await.unwrap();

    assert_eq!(before.len(), 2);
    assert_eq!(after.len(), 3);
    assert_eq!(backend.reads_of("apartments"), 2);
}

#[tokio::test]
async fn test_patch_and_delete_invalidate_record() {
    let backend = seeded();
    let gateway = gateway(&backend);

    gateway.get_json("apartments/1", None, false).await.unwrap();
    let patched: Apartment = gateway
        .patch("apartments", 1, &json!({ "name": "Flat 1b" }))
        .await
        .unwrap();
    assert_eq!(patched.name, "Flat 1b");

    let reread: Apartment = gateway.get_by_id("apartments", 1, None, false).await.unwrap();
    assert_eq!(reread.name, "Flat 1b");

    gateway.delete("apartments", 1).await.unwrap();
    let gone = gateway.get_json("apartments/1", None, false).await;
    assert!(matches!(gone, Err(GatewayError::NotFound(_))));
}

#[tokio::test]
async fn test_failed_write_leaves_cache_untouched() {
    let backend = seeded();
    let gateway = gateway(&backend);

    gateway.get_json("tenants", None, false).await.unwrap();
    gateway.get_json("tenants/7", None, false).await.unwrap();
    backend.fail_writes(true);

    let result = gateway.delete("tenants", 7).await;
    assert!(matches!(result, Err(GatewayError::Server { status: 500, .. })));

    gateway.get_json("tenants", None, false).await.unwrap();
    gateway.get_json("tenants/7", None, false).await.unwrap();
    assert_eq!(backend.reads_of("tenants"), 1);
    assert_eq!(backend.reads_of("tenants/7"), 1);
    assert_eq!(gateway.cache_stats().await.invalidations, 0);
}

#[tokio::test(start_paused = true)]
async fn test_write_during_pending_read_prevents_caching() {
    let backend = seeded();
    backend.set_delay(Duration::from_millis(100));
    let gateway = gateway(&backend);

    let reader = {
        let gateway = gateway.clone();
        tokio::spawn(async move { gateway.get_json("tenants/7", None, false).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(gateway.cache_stats().await.pending_requests, 1);

    let _: Value = gateway
        .patch("tenants", 7, &json!({ "name": "Grace" }))
        .await
        .unwrap();
    assert_eq!(gateway.cache_stats().await.pending_requests, 0);

    reader.await.unwrap().unwrap();
    assert!(gateway.cache_stats().await.keys.is_empty());

    let fresh: Tenant = gateway.get_by_id("tenants", 7, None, false).await.unwrap();
    assert_eq!(fresh.name, "Grace");
    assert_eq!(backend.reads_of("tenants/7"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_write_during_forced_read_prevents_caching() {
    let backend = seeded();
    backend.set_delay(Duration::from_millis(100));
    let gateway = gateway(&backend);

    let refresher = {
        let gateway = gateway.clone();
        tokio::spawn(async move { gateway.get_json("tenants/7", None, true).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    let _: Tenant = gateway
        .update("tenants", 7, &json!({ "id": 7, "name": "Grace" }), Vec::new())
        .await
        .unwrap();

    // The refresh started before the update and still answers with the old record.
    let stale = refresher.await.unwrap().unwrap();
    assert_eq!(stale["name"], "Ada");
    assert!(gateway.cache_stats().await.keys.is_empty());

    let fresh: Tenant = gateway.get_by_id("tenants", 7, None, false).await.unwrap();
    assert_eq!(fresh.name, "Grace");
    assert_eq!(backend.reads_of("tenants/7"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_clear_during_forced_read_prevents_caching() {
    let backend = seeded();
    backend.set_delay(Duration::from_millis(100));
    let gateway = gateway(&backend);

    let refresher = {
        let gateway = gateway.clone();
        tokio::spawn(async move { gateway.get_json("apartments", None, true).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    gateway.clear_cache().await;

    refresher.await.unwrap().unwrap();
    assert_eq!(gateway.cache_stats().await.size, 0);
}

#[tokio::test(start_paused = true)]
async fn test_forced_read_without_writes_is_cached() {
    let backend = seeded();
    backend.set_delay(Duration::from_millis(100));
    let gateway = gateway(&backend);

    gateway.get_json("tenants/7", None, true).await.unwrap();
    gateway.get_json("tenants/7", None, false).await.unwrap();

    assert_eq!(backend.reads_of("tenants/7"), 1);
    assert_eq!(gateway.cache_stats().await.pending_requests, 0);
}

#[tokio::test]
async fn test_tenant_write_cascades_to_active_leases() {
    let backend = seeded();
    let gateway = gateway(&backend);

    gateway.get_json("leases", None, false).await.unwrap();
    gateway.get_json("leases", Some(&active()), false).await.unwrap();
    gateway.get_json("leases/active", None, false).await.unwrap();
    assert_eq!(backend.reads_of("leases"), 2);

    let _: Value = gateway
        .patch("tenants", 7, &json!({ "name": "Grace" }))
        .await
        .unwrap();

    gateway.get_json("leases", None, false).await.unwrap();
    gateway.get_json("leases", Some(&active()), false).await.unwrap();
    gateway.get_json("leases/active", None, false).await.unwrap();

    // Only the active views were dropped; the unfiltered list stayed cached.
    assert_eq!(backend.reads_of("leases"), 3);
    assert_eq!(backend.reads_of("leases/active"), 2);
}

#[tokio::test]
async fn test_tenant_write_clears_narrowed_active_lease_reads() {
    let backend = seeded();
    let gateway = gateway(&backend);
    let for_tenant = active().with("tenantId", 7);
    let ended = Params::new().with("status", "ended");

    gateway.get_json("leases", Some(&for_tenant), false).await.unwrap();
    gateway.get_json("leases", Some(&ended), false).await.unwrap();

    let _: Value = gateway
        .patch("tenants", 7, &json!({ "name": "Grace" }))
        .await
        .unwrap();

    let keys = gateway.cache_stats().await.keys;
    assert_eq!(keys.len(), 1);
    assert!(keys[0].contains("ended"));
}

#[tokio::test]
async fn test_files_route_writes_to_multipart_endpoint() {
    let backend = seeded();
    let gateway = gateway(&backend);
    let photo = FileUpload::new("front.jpg", vec![0xFF, 0xD8]).with_content_type("image/jpeg");

    gateway.get_json("apartments", None, false).await.unwrap();
    let _: Value = gateway
        .create("apartments", &json!({ "name": "Flat 3" }), vec![photo.clone()])
        .await
        .unwrap();
    let _: Value = gateway
        .update("apartments", 1, &json!({ "id": 1, "name": "Flat 1" }), vec![photo])
        .await
        .unwrap();

    let writes: Vec<_> = backend
        .requests()
        .into_iter()
        .filter(|r| r.method != Method::Get)
        .collect();
    assert_eq!(writes[0].path, "apartments/with-images");
    assert!(writes[0].payload.is_multipart());
    assert_eq!(writes[1].path, "apartments/1/with-images");
    assert!(gateway.cache_stats().await.keys.is_empty());
}

#[tokio::test]
async fn test_create_related_clears_parent_and_child() {
    let backend = seeded();
    backend.seed("meter-readings", json!([]));
    let gateway = gateway(&backend);

    gateway.get_json("apartments", None, false).await.unwrap();
    gateway.get_json("apartments/1", None, false).await.unwrap();
    gateway.get_json("apartments/1/meter-readings", None, false).await.unwrap();
    gateway.get_json("meter-readings", None, false).await.unwrap();

    let _: Value = gateway
        .create_related("apartments", 1, "meter-readings", &json!({ "value": 140 }))
        .await
        .unwrap();

    let readings: Vec<Value> = gateway
        .get_related("apartments", 1, "meter-readings", None, false)
        .await
        .unwrap();
    assert_eq!(readings.len(), 2);
    assert_eq!(gateway.cache_stats().await.keys, vec!["apartments/1/meter-readings".to_string()]);
    assert_eq!(backend.reads_of("apartments/1/meter-readings"), 2);
}

// == Manual Invalidation ==

#[tokio::test]
async fn test_invalidate_record_keeps_entity_list() {
    let backend = seeded();
    let gateway = gateway(&backend);

    gateway.get_json("apartments", None, false).await.unwrap();
    gateway.get_json("apartments/1", None, false).await.unwrap();
    gateway.get_json("apartments/1/meter-readings", None, false).await.unwrap();

    let removed = gateway
        .invalidate_cache("apartments", Some(EntityId::from(1)))
        .await;

    assert_eq!(removed, 2);
    assert_eq!(gateway.cache_stats().await.keys, vec!["apartments".to_string()]);
}

#[tokio::test]
async fn test_invalidate_entity_spares_similar_names() {
    let backend = seeded();
    backend.seed("leases-archive", json!([]));
    let gateway = gateway(&backend);

    gateway.get_json("leases", None, false).await.unwrap();
    gateway.get_json("leases", Some(&active()), false).await.unwrap();
    gateway.get_json("leases-archive", None, false).await.unwrap();

    let removed = gateway.invalidate_cache("leases", None).await;

    assert_eq!(removed, 2);
    assert_eq!(gateway.cache_stats().await.keys, vec!["leases-archive".to_string()]);
}

#[tokio::test]
async fn test_invalidate_with_params_is_exact() {
    let backend = seeded();
    let gateway = gateway(&backend);

    gateway.get_json("leases", None, false).await.unwrap();
    gateway.get_json("leases", Some(&active()), false).await.unwrap();

    assert_eq!(gateway.invalidate_cache_with_params("leases", &active()).await, 1);
    assert_eq!(
        gateway
            .invalidate_cache_with_params("leases", &Params::new().with("status", "ended"))
            .await,
        0
    );
    assert_eq!(gateway.cache_stats().await.keys, vec!["leases".to_string()]);
}

#[tokio::test]
async fn test_clear_cache_empties_everything() {
    let backend = seeded();
    let gateway = gateway(&backend);

    gateway.get_json("apartments", None, false).await.unwrap();
    gateway.get_json("tenants", None, false).await.unwrap();

    assert_eq!(gateway.clear_cache().await, 2);

    let stats = gateway.cache_stats().await;
    assert_eq!(stats.size, 0);
    assert_eq!(stats.pending_requests, 0);

    gateway.get_json("apartments", None, false).await.unwrap();
    assert_eq!(backend.reads_of("apartments"), 2);
}
