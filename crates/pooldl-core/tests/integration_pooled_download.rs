//! Integration test: curl connections from the pool against a local HTTP server.
//!
//! Downloads a batch through `pooled_download` with the curl connector and the
//! directory sink, then checks file contents and that the server saw no more
//! TCP connections than the pool's capacity.

mod common;

use pooldl_core::config::TransportConfig;
use pooldl_core::storage::DirectorySink;
use pooldl_core::transport::{CurlConnector, Downloaded};
use pooldl_core::{pooled_download, PoolError, Save};
use std::sync::Arc;
use tempfile::tempdir;

/// Shares one sink between the batch and the test's assertions.
fn shared_sink(dir: &std::path::Path) -> Arc<DirectorySink> {
    Arc::new(DirectorySink::create(dir, false).unwrap())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn batch_downloads_every_url_over_reused_connections() {
    let server = common::http_server::start();
    let dir = tempdir().unwrap();
    let sink = shared_sink(dir.path());
    let urls: Vec<_> = (0..8).map(|i| server.url(&format!("file-{}.txt", i))).collect();

    let save = {
        let sink = Arc::clone(&sink);
        move |content: Downloaded| {
            let sink = Arc::clone(&sink);
            async move { sink.save(content).await }
        }
    };
    let report = pooled_download(CurlConnector::new(TransportConfig::default()), save, urls, 2)
        .await
        .expect("batch");

    assert_eq!(report.saved, 8);
    assert_eq!(report.connections, 2);
    assert_eq!(sink.saved().len(), 8);
    for i in 0..8 {
        let content = std::fs::read_to_string(dir.path().join(format!("file-{}.txt", i))).unwrap();
        assert_eq!(content, format!("body of /file-{}.txt", i));
    }
    assert_eq!(server.requests(), 8);
    assert!(
        server.accepted() <= 2,
        "expected at most 2 TCP connections, server saw {}",
        server.accepted()
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn http_error_fails_the_batch() {
    let server = common::http_server::start();
    let dir = tempdir().unwrap();
    let sink = DirectorySink::create(dir.path(), false).unwrap();
    let urls = vec![server.url("missing")];

    let err = pooled_download(CurlConnector::default(), sink, urls, 1)
        .await
        .unwrap_err();

    match err {
        PoolError::Download { index, source } => {
            assert_eq!(index, 0);
            assert!(source.to_string().contains("HTTP 404"), "{:#}", source);
        }
        other => panic!("expected Download error, got {:?}", other),
    }
    assert!(!dir.path().join("missing").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn content_disposition_names_saved_file() {
    let server = common::http_server::start();
    let dir = tempdir().unwrap();
    let sink = DirectorySink::create(dir.path(), false).unwrap();

    pooled_download(CurlConnector::default(), sink, vec![server.url("named")], 1)
        .await
        .expect("batch");

    let content = std::fs::read_to_string(dir.path().join("server-name.txt")).unwrap();
    assert_eq!(content, "named body");
}
