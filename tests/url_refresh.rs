//! Refresh behavior of URL-sourced configuration.

use std::time::Duration;

use redirector::config::ConfigError;
use redirector::manager::LoadError;

mod common;

const OLD: &str = r#"
url-config-refresh:
  cache-ttl: 1s
redirects:
  - { from: a.com, to: "https://old-target.com" }
"#;

const NEW: &str = r#"
url-config-refresh:
  cache-ttl: 1s
redirects:
  - { from: a.com, to: "https://new-target.com" }
  - { from: b.com, to: "https://b-target.com" }
"#;

#[tokio::test]
async fn test_stale_snapshot_reloads_before_match() {
    let server = common::start_config_server(OLD).await;
    let manager = common::url_manager(&server.url);
    manager.load_now().await.unwrap();
    assert_eq!(server.fetches(), 1);

    // Fresh: no refetch
    let rule = manager.get_redirect("a.com").await.unwrap().unwrap();
    assert_eq!(rule.to, "https://old-target.com");
    assert_eq!(server.fetches(), 1);

    server.set_body(NEW);
    tokio::time::sleep(Duration::from_millis(1100)).await;

    let rule = manager.get_redirect("a.com").await.unwrap().unwrap();
    assert_eq!(rule.to, "https://new-target.com");
    assert_eq!(server.fetches(), 2);

    manager.close().await;
}

#[tokio::test]
async fn test_failed_stale_reload_retries_on_next_lookup() {
    let server = common::start_config_server(OLD).await;
    let manager = common::url_manager(&server.url);
    manager.load_now().await.unwrap();
    let loaded_at = manager.snapshot().await.unwrap().loaded_at;

    server.set_status(500);
    tokio::time::sleep(Duration::from_millis(1100)).await;

    // Reload fails, previous rules keep answering
    let rule = manager.get_redirect("a.com").await.unwrap().unwrap();
    assert_eq!(rule.to, "https://old-target.com");
    assert_eq!(server.fetches(), 2);
    assert_eq!(manager.snapshot().await.unwrap().loaded_at, loaded_at);

    // Still stale, so the next lookup tries again
    manager.get_redirect("a.com").await.unwrap();
    assert_eq!(server.fetches(), 3);

    manager.close().await;
}

#[tokio::test]
async fn test_refresh_on_miss_with_remap_answers_from_new_rules() {
    let config = r#"
url-config-refresh:
  refresh-on-miss: true
  remap-after-refresh: true
redirects:
  - { from: a.com, to: "https://a-target.com" }
"#;
    let server = common::start_config_server(config).await;
    let manager = common::url_manager(&server.url);
    manager.load_now().await.unwrap();

    server.set_body(NEW);
    let rule = manager.get_redirect("b.com").await.unwrap();
    assert_eq!(rule.unwrap().to, "https://b-target.com");
    assert_eq!(server.fetches(), 2);

    manager.close().await;
}

#[tokio::test]
async fn test_refresh_on_hit_reloads_in_background() {
    let config = r#"
url-config-refresh:
  refresh-on-hit: true
redirects:
  - { from: a.com, to: "https://old-target.com" }
"#;
    let server = common::start_config_server(config).await;
    let manager = common::url_manager(&server.url);
    manager.load_now().await.unwrap();

    server.set_body(NEW);

    // The caller keeps the pre-reload answer
    let rule = manager.get_redirect("a.com").await.unwrap().unwrap();
    assert_eq!(rule.to, "https://old-target.com");

    server.wait_for_fetches(2).await;
    let snapshot = manager.snapshot().await.unwrap();
    assert_eq!(snapshot.rules[0].to, "https://new-target.com");

    manager.close().await;
}

#[tokio::test]
async fn test_refresh_domain_triggers_only_on_configured_outcome() {
    let config = r#"
url-config-refresh:
  refresh-domains:
    - { domain: "*.fresh.com", refresh-on: miss }
redirects:
  - { from: a.com, to: "https://a-target.com" }
"#;
    let server = common::start_config_server(config).await;
    let manager = common::url_manager(&server.url);
    manager.load_now().await.unwrap();

    // Hit on a domain outside the refresh list: nothing
    manager.get_redirect("a.com").await.unwrap();
    // Miss outside the refresh list: nothing
    manager.get_redirect("other.com").await.unwrap();
    manager.snapshot().await.unwrap();
    assert_eq!(server.fetches(), 1);

    // Miss inside the refresh list: background reload
    assert!(manager.get_redirect("x.fresh.com").await.unwrap().is_none());
    server.wait_for_fetches(2).await;

    manager.close().await;
}

#[tokio::test]
async fn test_unreachable_source_keeps_previous_rules() {
    let server = common::start_config_server(OLD).await;
    let manager = common::url_manager(&server.url);
    manager.load_now().await.unwrap();

    server.set_status(503);
    let err = manager.load_now().await.unwrap_err();
    assert!(matches!(err, LoadError::Config(ConfigError::Http(_))));

    server.set_status(200);
    server.set_body("redirects: [");
    let err = manager.load_now().await.unwrap_err();
    assert!(matches!(err, LoadError::Config(ConfigError::Parse(_))));

    let rule = manager.get_redirect("a.com").await.unwrap().unwrap();
    assert_eq!(rule.to, "https://old-target.com");

    manager.close().await;
}

#[tokio::test]
async fn test_close_waits_for_queued_background_reload() {
    let config = r#"
url-config-refresh:
  refresh-on-miss: true
redirects: []
"#;
    let server = common::start_config_server(config).await;
    let manager = common::url_manager(&server.url);
    manager.load_now().await.unwrap();

    assert!(manager.get_redirect("nothing.com").await.unwrap().is_none());
    manager.close().await;

    // The queued reload ran before close returned
    assert_eq!(server.fetches(), 2);
}
