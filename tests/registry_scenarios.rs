//! Registry scenarios through the public API only.
//!
//! Run with: cargo test --test registry_scenarios

use std::sync::Arc;

use carbon_registry::config::RegistryConfig;
use carbon_registry::registry::{
    BatchStatus, LedgerEntryType, MemoryStore, OpenDirectory, ProjectRegistration,
    RegistryCoordinator, RegistryError,
};
use rust_decimal::Decimal;

fn coordinator() -> Arc<RegistryCoordinator> {
    Arc::new(RegistryCoordinator::new(
        Arc::new(MemoryStore::new()),
        Arc::new(OpenDirectory),
        RegistryConfig::default(),
    ))
}

fn registration(project_id: u64, total: u64, price: i64) -> ProjectRegistration {
    ProjectRegistration {
        project_id,
        developer_id: 500,
        vintage: 2022,
        total_credits: total,
        price_per_credit: Decimal::from(price),
        integrity_score: None,
    }
}

/// total = available + Σ holdings + retired, checked from the outside
async fn assert_conserved(c: &RegistryCoordinator, project_id: u64, buyers: &[u64]) {
    let inv = c.get_inventory(project_id).await.unwrap();
    let mut held = 0;
    for buyer in buyers {
        if let Ok(h) = c.get_holding(*buyer, project_id).await {
            held += h.quantity;
        }
    }
    assert_eq!(
        inv.total_credits,
        inv.available_credits + held + inv.retired_credits
    );
}

#[tokio::test]
async fn full_lifecycle_conserves_credits() {
    let c = coordinator();
    c.register_project(registration(1, 3_000, 20)).await.unwrap();

    let receipt = c.issue_credits(1, 3_000).await.unwrap();
    assert_eq!(receipt.batch_serials.len(), 3);

    c.purchase_credits(1, 10, 1_000).await.unwrap();
    c.purchase_credits(1, 11, 1_500).await.unwrap();
    c.retire_credits(1, 10, 1_000, Some("annual report".into()))
        .await
        .unwrap();
    c.retire_credits(1, 11, 500, None).await.unwrap();

    assert_conserved(&c, 1, &[10, 11]).await;

    let batches = c.list_batches(1).await.unwrap();
    let statuses: Vec<_> = batches.iter().map(|b| b.status).collect();
    assert_eq!(
        statuses,
        vec![BatchStatus::Retired, BatchStatus::Traded, BatchStatus::Issued]
    );

    let page = c.list_ledger(1, 100).await.unwrap();
    assert_eq!(page.total, 5);
    let kinds: Vec<_> = page.entries.iter().map(|e| e.entry_type).collect();
    assert_eq!(
        kinds,
        vec![
            LedgerEntryType::Retirement,
            LedgerEntryType::Retirement,
            LedgerEntryType::Purchase,
            LedgerEntryType::Purchase,
            LedgerEntryType::Issuance,
        ]
    );
    assert!(page.entries.iter().all(|e| !e.chain_hash.is_empty()));

    c.verify_project(1).await.unwrap();
    assert!(c.audit_all().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_buyers_and_retirements_stay_consistent() {
    let c = coordinator();
    c.register_project(registration(3, 5_000, 4)).await.unwrap();

    let mut handles = Vec::new();
    for buyer in 1..=10u64 {
        let c = c.clone();
        handles.push(tokio::spawn(async move {
            c.purchase_credits(3, buyer, 400).await?;
            c.retire_credits(3, buyer, 150, None).await?;
            Ok::<_, RegistryError>(())
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let inv = c.get_inventory(3).await.unwrap();
    assert_eq!(inv.available_credits, 1_000);
    assert_eq!(inv.retired_credits, 1_500);
    assert_conserved(&c, 3, &(1..=10).collect::<Vec<_>>()).await;
    c.verify_project(3).await.unwrap();
}

#[tokio::test]
async fn projects_are_isolated() {
    let c = coordinator();
    c.register_project(registration(1, 100, 1)).await.unwrap();
    c.register_project(registration(2, 100, 1)).await.unwrap();

    c.purchase_credits(1, 7, 100).await.unwrap();
    assert!(matches!(
        c.purchase_credits(1, 7, 1).await,
        Err(RegistryError::InsufficientSupply { .. })
    ));
    assert_eq!(c.get_inventory(2).await.unwrap().available_credits, 100);
    assert!(matches!(
        c.retire_credits(2, 7, 1, None).await,
        Err(RegistryError::HoldingNotFound { .. })
    ));
}
