//! Contract Test: Reconciliation
//!
//! Constraints verified:
//! - After a run the zone holds exactly one record per wanted address and strategy
//! - Running twice on the same addresses leaves the zone unchanged
//! - Record identity depends on the address only
//! - An empty address set, or enumeration without a `.`, never reaches the provider
//! - Provider rejections propagate and are not fatal
//! - Records outside the managed names are never touched

mod common;

use common::*;
use dnsync_core::config::RecordStrategy;
use dnsync_core::engine::Reconciler;
use dnsync_core::error::{Error, RejectionReason};
use dnsync_core::traits::{RecordSet, RecordType};
use std::collections::BTreeSet;

fn desired(addresses: &[&str]) -> BTreeSet<String> {
    addresses.iter().map(|a| a.to_string()).collect()
}

fn reconciler(zone: &InMemoryZone, strategies: &[RecordStrategy]) -> Reconciler {
    let config = reconcile_config().with_strategies(strategies.iter().copied());
    Reconciler::new(Box::new(InMemoryZone::sharing_counters_with(zone)), config)
        .expect("reconciler construction succeeds")
}

fn weighted_entry(address: &str) -> (String, Option<String>, String) {
    (
        "svc.example.com.".to_string(),
        Some(address.to_string()),
        address.to_string(),
    )
}

#[tokio::test]
async fn converges_onto_new_address_set() {
    let zone = InMemoryZone::new();
    let reconciler = reconciler(&zone, &[RecordStrategy::Weighted]);

    reconciler
        .reconcile(&desired(&["10.0.0.1", "10.0.0.2"]))
        .await
        .unwrap();
    let report = reconciler
        .reconcile(&desired(&["10.0.0.2", "10.0.0.3"]))
        .await
        .unwrap();

    assert_eq!(report.deletes, 1);
    assert_eq!(report.upserts, 2);
    assert!(report.completed);
    assert_eq!(
        zone.entries(),
        vec![weighted_entry("10.0.0.2"), weighted_entry("10.0.0.3")]
    );
}

#[tokio::test]
async fn repeated_run_changes_nothing() {
    let zone = InMemoryZone::new();
    let reconciler = reconciler(
        &zone,
        &[RecordStrategy::Weighted, RecordStrategy::Enumerated],
    );
    let addresses = desired(&["10.0.0.1", "10.0.0.2", "10.0.0.3"]);

    reconciler.reconcile(&addresses).await.unwrap();
    let after_first = zone.entries();
    let report = reconciler.reconcile(&addresses).await.unwrap();

    assert_eq!(report.deletes, 0);
    assert_eq!(zone.entries(), after_first);

    // Same upserts both times, so the provider sees the same records
    let batches = zone.batches();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].changes, batches[1].changes);
}

#[tokio::test]
async fn weighted_identity_is_the_address() {
    let zone = InMemoryZone::new();
    let reconciler = reconciler(&zone, &[RecordStrategy::Weighted]);

    reconciler
        .reconcile(&desired(&["10.0.0.7"]))
        .await
        .unwrap();

    let records = zone.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].set_identifier.as_deref(), Some("10.0.0.7"));
    assert_eq!(records[0].weight, Some(10));
    assert_eq!(records[0].ttl, Some(60));
    assert_eq!(records[0].record_type, RecordType::A);
}

#[tokio::test]
async fn enumerated_names_follow_sorted_addresses() {
    let zone = InMemoryZone::new();
    let reconciler = reconciler(&zone, &[RecordStrategy::Enumerated]);

    reconciler
        .reconcile(&desired(&["10.0.0.9", "10.0.0.10", "10.0.0.1"]))
        .await
        .unwrap();

    // Lexicographic order: "10.0.0.1" < "10.0.0.10" < "10.0.0.9"
    assert_eq!(
        zone.entries(),
        vec![
            ("svc-1.example.com.".to_string(), None, "10.0.0.1".to_string()),
            ("svc-2.example.com.".to_string(), None, "10.0.0.10".to_string()),
            ("svc-3.example.com.".to_string(), None, "10.0.0.9".to_string()),
        ]
    );
}

#[tokio::test]
async fn enumerated_slot_is_reassigned_in_one_batch() {
    let zone = InMemoryZone::new();
    let reconciler = reconciler(&zone, &[RecordStrategy::Enumerated]);

    reconciler
        .reconcile(&desired(&["10.0.0.1", "10.0.0.2"]))
        .await
        .unwrap();
    let report = reconciler
        .reconcile(&desired(&["10.0.0.2"]))
        .await
        .unwrap();

    assert_eq!(report.deletes, 1);
    assert_eq!(report.upserts, 1);
    assert_eq!(zone.apply_call_count(), 2);

    let entries = zone.entries();
    assert!(entries.contains(&("svc-1.example.com.".to_string(), None, "10.0.0.2".to_string())));
    assert!(!entries.iter().any(|(_, _, value)| value == "10.0.0.1"));
}

#[tokio::test]
async fn empty_address_set_never_reaches_provider() {
    let zone = InMemoryZone::new();
    let reconciler = reconciler(&zone, &[RecordStrategy::Weighted]);

    let err = reconciler.reconcile(&BTreeSet::new()).await.unwrap_err();

    assert!(matches!(err, Error::NoInstances));
    assert!(err.is_fatal());
    assert_eq!(zone.list_call_count(), 0);
    assert_eq!(zone.apply_call_count(), 0);
}

#[tokio::test]
async fn enumeration_without_separator_never_reaches_provider() {
    let zone = InMemoryZone::new();
    let config = dnsync_core::config::ReconcileConfig::new(ZONE, "marathon-lb")
        .with_strategies([RecordStrategy::Enumerated]);
    let reconciler =
        Reconciler::new(Box::new(InMemoryZone::sharing_counters_with(&zone)), config).unwrap();

    let err = reconciler
        .reconcile(&desired(&["10.0.0.1"]))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Config(_)));
    assert!(err.is_fatal());
    assert_eq!(zone.list_call_count(), 0);
}

#[tokio::test]
async fn rejection_propagates_and_is_retryable() {
    let zone = InMemoryZone::new();
    zone.reject_with(Some(RejectionReason::PriorRequestNotComplete));
    let reconciler = reconciler(&zone, &[RecordStrategy::Weighted]);

    let err = reconciler
        .reconcile(&desired(&["10.0.0.1"]))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::ChangeRejected {
            reason: RejectionReason::PriorRequestNotComplete,
            ..
        }
    ));
    assert!(!err.is_fatal());
    assert!(zone.records().is_empty());
    assert_eq!(zone.await_call_count(), 0);

    // Next cycle goes through once the zone accepts again
    zone.reject_with(None);
    reconciler
        .reconcile(&desired(&["10.0.0.1"]))
        .await
        .unwrap();
    assert_eq!(zone.entries(), vec![weighted_entry("10.0.0.1")]);
}

#[tokio::test]
async fn unpropagated_change_is_reported_not_failed() {
    let zone = InMemoryZone::new().failing_await();
    let reconciler = reconciler(&zone, &[RecordStrategy::Weighted]);

    let report = reconciler
        .reconcile(&desired(&["10.0.0.1"]))
        .await
        .unwrap();

    assert!(!report.completed);
    assert_eq!(report.change_id.0, "/change/C1");
    assert_eq!(zone.await_call_count(), 1);
}

#[tokio::test]
async fn unmanaged_records_survive() {
    let mut txt = RecordSet::simple("svc.example.com.", "\"v=spf1 -all\"");
    txt.record_type = RecordType::Other("TXT".to_string());
    let zone = InMemoryZone::with_records(vec![
        txt.clone(),
        RecordSet::simple("www.example.com.", "192.0.2.10"),
        RecordSet::simple("svc-extra.example.com.", "192.0.2.11"),
        RecordSet::weighted("svc.example.com.", "192.0.2.12"),
    ]);
    let reconciler = reconciler(&zone, &[RecordStrategy::Weighted]);

    let report = reconciler
        .reconcile(&desired(&["10.0.0.1"]))
        .await
        .unwrap();

    // Only the stale weighted record belongs to us
    assert_eq!(report.deletes, 1);
    let records = zone.records();
    assert!(records.contains(&txt));
    assert!(records.iter().any(|r| r.name == "www.example.com."));
    assert!(records.iter().any(|r| r.name == "svc-extra.example.com."));
    assert!(!records.iter().any(|r| r.first_value() == Some("192.0.2.12")));
}
