//! Store contract properties, exercised against every backend through the
//! trait object: the in-memory oracle and the SeaORM store over sqlite with
//! the real migrations applied.

use std::path::Path;
use std::sync::Arc;

use chrono::{Duration, Utc};
use sea_orm::Database;

use conduit::domain::{ProductDisposition, RunStatus, TenantId};
use conduit::ingest::ProductProcessResult;
use conduit::store::{
    IdempotencyRecord, MemoryStore, RunChannelItemRecord, RunChannelResultRecord, RunRecord,
    SqlStore, Store, hash_idempotency_key,
};

/// One fresh store per backend. sqlite ignores the claim query's row locks,
/// so everything except lock contention itself is covered here.
async fn backends() -> Vec<(&'static str, Arc<dyn Store>)> {
    let sqlite = Database::connect("sqlite::memory:")
        .await
        .expect("connect sqlite");
    conduit::migrate::apply_dir(&sqlite, Path::new("migrations"))
        .await
        .expect("apply migrations");

    vec![
        ("memory", Arc::new(MemoryStore::new()) as Arc<dyn Store>),
        ("sql", Arc::new(SqlStore::new(sqlite)) as Arc<dyn Store>),
    ]
}

fn run(run_id: &str, tenant: u64, status: RunStatus, push: bool, age_mins: i64) -> RunRecord {
    RunRecord {
        run_id: run_id.to_string(),
        tenant_id: TenantId(tenant),
        feed_id: None,
        status,
        push_triggered: push,
        received: 1,
        valid: 1,
        rejected: 0,
        unchanged: 0,
        enqueued: 1,
        warnings: Default::default(),
        created_at: Utc::now() - Duration::minutes(age_mins),
    }
}

fn result(key: &str, disposition: ProductDisposition) -> ProductProcessResult {
    ProductProcessResult {
        product_key: key.to_string(),
        hash: "a".repeat(64),
        disposition,
        reason: "new_product".to_string(),
        issues: vec![],
    }
}

#[tokio::test]
async fn state_round_trip_then_identical_resubmission_reads_same_hash() {
    for (backend, store) in backends().await {
        let tenant = TenantId(3);

        store
            .upsert_product_hash(tenant, "sku1", &"a".repeat(64))
            .await
            .unwrap();

        let first = store.get_product_hash(tenant, "sku1").await.unwrap();
        assert_eq!(
            first.as_deref(),
            Some("a".repeat(64).as_str()),
            "{backend}: first read"
        );

        // Idempotent overwrite with the same hash.
        store
            .upsert_product_hash(tenant, "sku1", &"a".repeat(64))
            .await
            .unwrap();
        let second = store.get_product_hash(tenant, "sku1").await.unwrap();
        assert_eq!(first, second, "{backend}: overwrite");
    }
}

#[tokio::test]
async fn writes_to_one_tenant_never_leak_to_another() {
    for (backend, store) in backends().await {
        store
            .upsert_product_hash(TenantId(1), "sku1", "hash-one")
            .await
            .unwrap();
        store
            .upsert_product_hash(TenantId(2), "sku1", "hash-two")
            .await
            .unwrap();

        assert_eq!(
            store
                .get_product_hash(TenantId(1), "sku1")
                .await
                .unwrap()
                .as_deref(),
            Some("hash-one"),
            "{backend}: tenant 1"
        );
        assert_eq!(
            store
                .get_product_hash(TenantId(2), "sku1")
                .await
                .unwrap()
                .as_deref(),
            Some("hash-two"),
            "{backend}: tenant 2"
        );
        assert!(
            store
                .get_product_hash(TenantId(3), "sku1")
                .await
                .unwrap()
                .is_none(),
            "{backend}: tenant 3"
        );
    }
}

#[tokio::test]
async fn claims_are_exclusive_until_new_claimable_runs_arrive() {
    for (backend, store) in backends().await {
        store
            .insert_run(run("run_a", 1, RunStatus::HasChanges, true, 10))
            .await
            .unwrap();

        let first = store.claim_runs(10).await.unwrap();
        assert_eq!(first.len(), 1, "{backend}: first claim");
        assert_eq!(first[0].run_id, "run_a");

        // Claimed once; gone from every later claim regardless of caller.
        assert!(store.claim_runs(10).await.unwrap().is_empty(), "{backend}");
        assert!(store.claim_runs(1).await.unwrap().is_empty(), "{backend}");

        // A freshly inserted claimable run is picked up.
        store
            .insert_run(run("run_b", 1, RunStatus::HasChanges, true, 0))
            .await
            .unwrap();
        let second = store.claim_runs(10).await.unwrap();
        assert_eq!(second.len(), 1, "{backend}: second claim");
        assert_eq!(second[0].run_id, "run_b");
    }
}

#[tokio::test]
async fn claims_span_tenants_oldest_first() {
    for (backend, store) in backends().await {
        store
            .insert_run(run("run_t2", 2, RunStatus::HasChanges, true, 5))
            .await
            .unwrap();
        store
            .insert_run(run("run_t1", 1, RunStatus::HasChanges, true, 9))
            .await
            .unwrap();

        let claims = store.claim_runs(10).await.unwrap();
        assert_eq!(claims.len(), 2, "{backend}");
        assert_eq!(claims[0].run_id, "run_t1", "{backend}: oldest first");
        assert_eq!(claims[0].tenant_id, TenantId(1));
        assert_eq!(claims[1].run_id, "run_t2");
        assert_eq!(claims[1].tenant_id, TenantId(2));
    }
}

#[tokio::test]
async fn non_push_runs_are_never_claimable() {
    for (backend, store) in backends().await {
        for (id, status, push) in [
            ("run_completed", RunStatus::Completed, false),
            ("run_no_change", RunStatus::NoChangeDetected, false),
            ("run_processing", RunStatus::Processing, true),
            ("run_failed", RunStatus::Failed, true),
        ] {
            store.insert_run(run(id, 1, status, push, 1)).await.unwrap();
        }

        assert!(store.claim_runs(10).await.unwrap().is_empty(), "{backend}");
    }
}

#[tokio::test]
async fn run_products_and_channel_rows_round_trip() {
    for (backend, store) in backends().await {
        store
            .insert_run(run("run_a", 1, RunStatus::HasChanges, true, 1))
            .await
            .unwrap();
        store
            .insert_run_products(
                "run_a",
                &[
                    result("sku2", ProductDisposition::Enqueued),
                    result("sku1", ProductDisposition::Unchanged),
                ],
            )
            .await
            .unwrap();

        let products = store.list_run_products("run_a", 0).await.unwrap();
        assert_eq!(products.len(), 2, "{backend}");
        assert_eq!(products[0].product_key, "sku1", "{backend}: sorted");

        store
            .insert_run_channel_result(RunChannelResultRecord {
                run_id: "run_a".to_string(),
                tenant_id: TenantId(1),
                channel: "google".to_string(),
                attempt: 1,
                ok_count: 1,
                err_count: 0,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        store
            .insert_run_channel_items(
                "run_a",
                "google",
                &[RunChannelItemRecord {
                    run_id: "run_a".to_string(),
                    channel: "google".to_string(),
                    product_key: "sku2".to_string(),
                    status: "ok".to_string(),
                    message: "google_item_built".to_string(),
                }],
            )
            .await
            .unwrap();

        let results = store
            .list_run_channel_results(TenantId(1), "run_a")
            .await
            .unwrap();
        assert_eq!(results.len(), 1, "{backend}");

        let items = store
            .list_run_channel_items("run_a", "google", 0)
            .await
            .unwrap();
        assert_eq!(items[0].product_key, "sku2", "{backend}");
    }
}

#[tokio::test]
async fn duplicate_product_keys_in_one_batch_do_not_fail() {
    for (backend, store) in backends().await {
        store
            .insert_run(run("run_a", 1, RunStatus::Completed, false, 0))
            .await
            .unwrap();

        // Two malformed bulk lines in one request are both recorded under
        // the empty product key; persisting the batch must still succeed.
        let bad_line = ProductProcessResult {
            product_key: String::new(),
            hash: String::new(),
            disposition: ProductDisposition::Rejected,
            reason: "invalid_json_line".to_string(),
            issues: vec![],
        };

        store
            .insert_run_products("run_a", &[bad_line.clone(), bad_line])
            .await
            .unwrap_or_else(|err| panic!("{backend}: duplicate keys rejected: {err}"));

        let products = store.list_run_products("run_a", 0).await.unwrap();
        assert!(!products.is_empty(), "{backend}");
        assert!(
            products.iter().all(|p| p.reason == "invalid_json_line"),
            "{backend}"
        );
    }
}

#[tokio::test]
async fn idempotency_hit_returns_exact_stored_response() {
    for (backend, store) in backends().await {
        let now = Utc::now();
        let key_hash = hash_idempotency_key("client-key");

        let record = IdempotencyRecord {
            status_code: 200,
            body: br#"{"run_id":"run_x","status":"has_changes"}"#.to_vec(),
            created_at: now,
            expires_at: now + Duration::hours(24),
        };

        store
            .put_idempotency(
                TenantId(1),
                "/v1/debug/products:upsert",
                &key_hash,
                record.clone(),
            )
            .await
            .unwrap();

        let hit = store
            .get_idempotency(TenantId(1), "/v1/debug/products:upsert", &key_hash)
            .await
            .unwrap()
            .unwrap_or_else(|| panic!("{backend}: expected cache hit"));

        assert_eq!(hit.status_code, record.status_code, "{backend}");
        assert_eq!(hit.body, record.body, "{backend}");
    }
}

#[tokio::test]
async fn idempotency_last_write_wins_and_expiry_hides_records() {
    for (backend, store) in backends().await {
        let now = Utc::now();
        let key_hash = hash_idempotency_key("client-key");

        store
            .put_idempotency(
                TenantId(1),
                "/v1/debug/products:upsert",
                &key_hash,
                IdempotencyRecord {
                    status_code: 200,
                    body: b"first".to_vec(),
                    created_at: now,
                    expires_at: now + Duration::hours(24),
                },
            )
            .await
            .unwrap();

        store
            .put_idempotency(
                TenantId(1),
                "/v1/debug/products:upsert",
                &key_hash,
                IdempotencyRecord {
                    status_code: 200,
                    body: b"second".to_vec(),
                    created_at: now,
                    expires_at: now + Duration::hours(24),
                },
            )
            .await
            .unwrap();

        let hit = store
            .get_idempotency(TenantId(1), "/v1/debug/products:upsert", &key_hash)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.body, b"second", "{backend}");

        // Expired entries behave as absent.
        store
            .put_idempotency(
                TenantId(1),
                "/v1/debug/products:upsert",
                "expired-key-hash",
                IdempotencyRecord {
                    status_code: 200,
                    body: b"old".to_vec(),
                    created_at: now - Duration::hours(25),
                    expires_at: now - Duration::hours(1),
                },
            )
            .await
            .unwrap();

        assert!(
            store
                .get_idempotency(TenantId(1), "/v1/debug/products:upsert", "expired-key-hash")
                .await
                .unwrap()
                .is_none(),
            "{backend}"
        );
    }
}

#[tokio::test]
async fn endpoint_scopes_idempotency_entries() {
    for (backend, store) in backends().await {
        let now = Utc::now();
        let key_hash = hash_idempotency_key("client-key");

        store
            .put_idempotency(
                TenantId(1),
                "/v1/debug/products:upsert",
                &key_hash,
                IdempotencyRecord {
                    status_code: 200,
                    body: b"single".to_vec(),
                    created_at: now,
                    expires_at: now + Duration::hours(24),
                },
            )
            .await
            .unwrap();

        assert!(
            store
                .get_idempotency(TenantId(1), "/v1/debug/products:upsert-bulk", &key_hash)
                .await
                .unwrap()
                .is_none(),
            "{backend}"
        );
    }
}
