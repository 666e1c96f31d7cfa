//! Concurrency guarantees of the config manager.

use std::collections::HashSet;
use std::sync::Arc;

use redirector::manager::{ActorError, ActorState};

mod common;

const FIRST: &str = r#"
port: 8001
redirects:
  - { from: a.com, to: "https://one.com" }
  - { from: b.com, to: "https://one.com" }
"#;

const SECOND: &str = r#"
port: 8002
redirects:
  - { from: a.com, to: "https://two.com" }
  - { from: b.com, to: "https://two.com" }
"#;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_lookups_never_observe_a_partial_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = common::write_config(dir.path(), "redirects.yaml", FIRST);
    let manager = common::file_manager(&path);
    manager.load_now().await.unwrap();

    let writer = {
        let manager = manager.clone();
        let path = path.clone();
        tokio::spawn(async move {
            for round in 0..20 {
                let contents = if round % 2 == 0 { SECOND } else { FIRST };
                tokio::fs::write(&path, contents).await.unwrap();
                manager.load_now().await.unwrap();
            }
        })
    };

    let mut readers = Vec::new();
    for _ in 0..8 {
        let manager = manager.clone();
        readers.push(tokio::spawn(async move {
            let mut seen = HashSet::new();
            for _ in 0..100 {
                let snapshot = manager.snapshot().await.unwrap();
                // Port and every target come from the same document
                let expected = if snapshot.port == 8001 { "https://one.com" } else { "https://two.com" };
                assert!(snapshot.rules.iter().all(|rule| rule.to == expected));

                let rule = manager.get_redirect("a.com").await.unwrap().unwrap();
                seen.insert(rule.to.clone());
            }
            seen
        }));
    }

    writer.await.unwrap();
    for reader in readers {
        let seen = reader.await.unwrap();
        assert!(seen.iter().all(|to| to == "https://one.com" || to == "https://two.com"));
    }

    manager.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_snapshots_outlive_reloads() {
    let dir = tempfile::tempdir().unwrap();
    let path = common::write_config(dir.path(), "redirects.yaml", FIRST);
    let manager = common::file_manager(&path);
    manager.load_now().await.unwrap();

    let held = manager.snapshot().await.unwrap();
    std::fs::write(&path, SECOND).unwrap();
    manager.load_now().await.unwrap();

    let current = manager.snapshot().await.unwrap();
    assert!(!Arc::ptr_eq(&held, &current));
    assert_eq!(held.port, 8001);
    assert_eq!(current.port, 8002);

    manager.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_close_under_load_rejects_late_callers() {
    let dir = tempfile::tempdir().unwrap();
    let path = common::write_config(dir.path(), "redirects.yaml", FIRST);
    let manager = common::file_manager(&path);
    manager.load_now().await.unwrap();

    let mut callers = Vec::new();
    for _ in 0..50 {
        let manager = manager.clone();
        callers.push(tokio::spawn(async move { manager.get_redirect("a.com").await }));
    }
    manager.close().await;

    for caller in callers {
        match caller.await.unwrap() {
            // Accepted before close: answered in full
            Ok(rule) => assert_eq!(rule.unwrap().to, "https://one.com"),
            // Arrived after close began
            Err(ActorError::NotRunning(_)) => {}
            Err(other) => panic!("unexpected error {other:?}"),
        }
    }

    assert_eq!(manager.state(), ActorState::Closed);
    assert!(matches!(manager.port().await, Err(ActorError::NotRunning(ActorState::Closed))));
}
