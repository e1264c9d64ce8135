//! In-process HTTP backends for the integration tests. Real sockets, no mocks.

#![allow(dead_code)]

use axum::Router;
use mediassist_client::{ChatSession, QueryOptions, Settings};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Request bodies seen by a test backend, in arrival order.
pub type Seen = Arc<Mutex<Vec<serde_json::Value>>>;

pub fn seen() -> Seen {
    Arc::new(Mutex::new(Vec::new()))
}

/// Serve `router` on an ephemeral port inside the current runtime.
/// Returns the base URL.
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Serve `router` from a background thread with its own runtime, for tests
/// that are not async themselves (binary tests). Returns the base URL.
pub fn serve_in_thread(router: Router) -> String {
    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async move {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            tx.send(listener.local_addr().unwrap()).unwrap();
            axum::serve(listener, router).await.unwrap();
        });
    });
    let addr = rx.recv().unwrap();
    format!("http://{}", addr)
}

/// A base URL nothing is listening on.
pub fn dead_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}", port)
}

pub fn settings(base_url: &str, timeout: Duration) -> Settings {
    Settings {
        base_url: base_url.to_string(),
        timeout,
        ..Settings::default()
    }
}

pub fn session(base_url: &str) -> ChatSession {
    ChatSession::new(&settings(base_url, Duration::from_secs(5))).expect("valid settings")
}

pub fn session_with(base_url: &str, timeout: Duration, options: QueryOptions) -> ChatSession {
    let mut s = settings(base_url, timeout);
    s.query = options;
    ChatSession::new(&s).expect("valid settings")
}

/// Poll `cond` for up to two seconds.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}
