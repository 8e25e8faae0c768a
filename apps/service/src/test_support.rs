//! Shared fixtures for unit tests

use chrono::{TimeZone, Utc};
use probe::CheckResult;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use uuid::Uuid;

use crate::broker::LogBroker;
use crate::pool::{LibsqlPool, connect_pool};

/// Migrated result database in a throwaway directory
pub async fn test_pool() -> (TempDir, LibsqlPool) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("results.db");
    let pool = connect_pool(path.to_str().unwrap(), None, 2).await.unwrap();

    let conn = pool.get().await.unwrap();
    crate::database::initialize_database(&conn).await.unwrap();
    drop(conn);

    (dir, pool)
}

pub async fn test_broker() -> (TempDir, LogBroker) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broker.db");
    let broker = LogBroker::connect(path.to_str().unwrap(), None).await.unwrap();
    (dir, broker)
}

/// Minimal result with only the mandatory fields set
pub fn result(check_name: &str, health: bool) -> CheckResult {
    CheckResult {
        id: Uuid::new_v4(),
        check_name: check_name.to_string(),
        dt: Utc.with_ymd_and_hms(2023, 1, 1, 10, 0, 0).unwrap(),
        health,
        status: None,
        duration: None,
        length: None,
        sample: None,
    }
}

/// HTTP server answering every request with `status` and `body`; returns its url
pub async fn spawn_responder(status: u16, body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = stream.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {status} Test\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });

    format!("http://{addr}/")
}
