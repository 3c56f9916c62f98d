//! Integration tests for the SQLite-backed registry

mod common;

use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::mpsc;

use common::{sub, tid, ScriptedProber};
use pulsewatch::reconciler::Reconciler;
use pulsewatch::registry::Registry;
use pulsewatch::storage::{SqliteWatchRepository, WatchRepository};

fn open(dir: &TempDir, prober: Arc<ScriptedProber>) -> (Arc<Registry>, Arc<SqliteWatchRepository>) {
    let repo = Arc::new(SqliteWatchRepository::open(dir.path().join("nested/watch.db")).unwrap());
    (Arc::new(Registry::new(repo.clone(), prober)), repo)
}

#[tokio::test]
async fn test_state_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let prober = Arc::new(ScriptedProber::new(true));

    {
        let (registry, _) = open(&dir, prober.clone());
        registry
            .register(&sub("x"), "a.example.com", Some("Alpha"))
            .await
            .unwrap();
        registry.register(&sub("y"), "a.example.com", None).await.unwrap();

        let (tx, _rx) = mpsc::channel(8);
        prober.set("a.example.com", false);
        Reconciler::new(registry, tx, 2).sweep().await.unwrap();
    }

    let (registry, repo) = open(&dir, prober.clone());
    let target = repo.get_target(&tid("a.example.com")).unwrap().unwrap();
    assert!(!target.is_online);
    assert!(target.last_transition_at.is_some());
    assert_eq!(target.subscribers.len(), 2);

    let watches = registry.list_watches(&sub("x")).await.unwrap();
    assert_eq!(watches.len(), 1);
    assert_eq!(watches[0].display_name, "Alpha");
    assert!(!watches[0].is_online);

    // The stored flag is the baseline: no repeat transition after reopening
    let (tx, mut rx) = mpsc::channel(8);
    let report = Reconciler::new(registry, tx, 2).sweep().await.unwrap();
    assert_eq!(report.transitions, 0);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_deregistration_persists() {
    let dir = TempDir::new().unwrap();
    let prober = Arc::new(ScriptedProber::new(true));

    {
        let (registry, _) = open(&dir, prober.clone());
        registry.register(&sub("x"), "a.example.com", None).await.unwrap();
        registry.deregister(&sub("x"), "a.example.com").await.unwrap();
    }

    let (registry, repo) = open(&dir, prober);
    assert!(repo.target_ids().unwrap().is_empty());
    assert_eq!(repo.subscriber_ids().unwrap(), vec![sub("x")]);
    assert!(registry.snapshot().await.unwrap().is_consistent());
}

#[tokio::test]
async fn test_sweep_covers_target_with_url_in_query() {
    let dir = TempDir::new().unwrap();
    let prober = Arc::new(ScriptedProber::new(true));
    let raw = "https://hooks.example.com/cb?next=https://x.example.com";

    {
        let (registry, _) = open(&dir, prober.clone());
        registry.register(&sub("x"), raw, Some("Hook")).await.unwrap();
        registry.register(&sub("x"), "b.example.com", None).await.unwrap();
    }

    let (registry, repo) = open(&dir, prober.clone());
    prober.set(raw, false);

    let (tx, mut rx) = mpsc::channel(8);
    let report = Reconciler::new(Arc::clone(&registry), tx, 2)
        .sweep()
        .await
        .unwrap();

    assert_eq!(report.probed, 2);
    assert_eq!(report.transitions, 1);
    assert_eq!(rx.try_recv().unwrap().display_name, "Hook");
    assert!(!repo.get_target(&tid(raw)).unwrap().unwrap().is_online);
    assert!(registry.snapshot().await.unwrap().is_consistent());
}
