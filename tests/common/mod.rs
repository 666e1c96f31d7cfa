//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU16, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use redirector::config::ConfigLoader;
use redirector::config::ConfigSource;
use redirector::manager::{ConfigManager, DEFAULT_QUEUE_CAPACITY};

/// A mock HTTP endpoint serving a YAML config document.
///
/// Body, status and response delay can be changed while it runs; every
/// fetch is counted as soon as its request arrives.
#[derive(Clone)]
pub struct ConfigServer {
    pub url: String,
    fetches: Arc<AtomicUsize>,
    status: Arc<AtomicU16>,
    delay_ms: Arc<AtomicU64>,
    body: Arc<Mutex<String>>,
}

impl ConfigServer {
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn set_body(&self, body: &str) {
        *self.body.lock().unwrap() = body.to_string();
    }

    pub fn set_status(&self, status: u16) {
        self.status.store(status, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Wait until at least `count` fetches were served.
    pub async fn wait_for_fetches(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.fetches() < count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("config server was not fetched in time");
    }
}

/// Start a config server on an ephemeral port.
pub async fn start_config_server(initial: &str) -> ConfigServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = ConfigServer {
        url: format!("http://{addr}/redirects.yaml"),
        fetches: Arc::new(AtomicUsize::new(0)),
        status: Arc::new(AtomicU16::new(200)),
        delay_ms: Arc::new(AtomicU64::new(0)),
        body: Arc::new(Mutex::new(initial.to_string())),
    };

    let state = server.clone();
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let state = state.clone();
                    tokio::spawn(async move {
                        read_request_head(&mut socket).await;
                        state.fetches.fetch_add(1, Ordering::SeqCst);

                        let delay = state.delay_ms.load(Ordering::SeqCst);
                        if delay > 0 {
                            tokio::time::sleep(Duration::from_millis(delay)).await;
                        }

                        let status = state.status.load(Ordering::SeqCst);
                        let body = state.body.lock().unwrap().clone();
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/yaml\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    server
}

async fn read_request_head(socket: &mut tokio::net::TcpStream) {
    let mut head = Vec::new();
    let mut chunk = [0u8; 1024];
    while !head.windows(4).any(|window| window == b"\r\n\r\n") {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => head.extend_from_slice(&chunk[..n]),
        }
    }
}

/// Manager reading from `url`, not yet loaded.
pub fn url_manager(url: &str) -> ConfigManager {
    ConfigManager::spawn(
        ConfigLoader::new(ConfigSource::Url(url.to_string())),
        DEFAULT_QUEUE_CAPACITY,
    )
}

/// Manager reading from the file at `path`, not yet loaded.
pub fn file_manager(path: &Path) -> ConfigManager {
    ConfigManager::spawn(
        ConfigLoader::new(ConfigSource::File(path.to_path_buf())),
        DEFAULT_QUEUE_CAPACITY,
    )
}

/// Write `contents` to `name` inside `dir` and return the path.
pub fn write_config(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

/// A port that was free a moment ago.
pub async fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// HTTP client that never follows redirects.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// GET `addr` with an explicit Host header.
pub async fn get_with_host(client: &reqwest::Client, addr: SocketAddr, host: &str, path: &str) -> reqwest::Response {
    client
        .get(format!("http://{addr}{path}"))
        .header(reqwest::header::HOST, host)
        .send()
        .await
        .expect("redirect server unreachable")
}
