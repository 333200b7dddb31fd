//! Integration tests for the MediaMTX exporter.
//!
//! These tests run a fake MediaMTX upstream and the real exporter server on
//! loopback ports, and scrape the exporter over HTTP.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use tokio::sync::watch;

use mediamtx_exporter::config::{AuthMode, RefreshConfig, UpstreamConfig};
use mediamtx_exporter::exposition::DOWN_STANZA;
use mediamtx_exporter::{
    Fetcher, HttpServer, MetricFilter, RefreshScheduler, Refresher, SharedRefresher,
    SnapshotStore,
};

/// Body served by the fake upstream, shaped like MediaMTX output.
const MEDIAMTX_BODY: &str = "\
# HELP paths Number of paths
# TYPE paths gauge
paths{name=\"cam1\",state=\"ready\"} 1
paths{name=\"cam2\",state=\"notReady\"} 1
paths_bytes_received{name=\"cam1\",state=\"ready\"} 123456
rtsp_conns 4
rtmp-conns.total 2
server_state running
bad{line 7
";

/// Start a fake upstream and return its metrics URL.
async fn spawn_upstream(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}/metrics", addr)
}

fn make_refresher(url: String, auth: AuthMode) -> SharedRefresher {
    let config = UpstreamConfig {
        auth,
        url: Some(url),
        timeout_ms: 1000,
        retry_backoff_ms: 10,
        ..Default::default()
    };
    Arc::new(Refresher::new(
        Fetcher::new(&config).unwrap(),
        MetricFilter::default(),
        Arc::new(SnapshotStore::new()),
    ))
}

/// Start the exporter server and return its address and shutdown handle.
async fn spawn_exporter(refresher: SharedRefresher) -> (SocketAddr, watch::Sender<bool>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let server = HttpServer::new(refresher, addr, "/metrics".to_string(), "/health".to_string());
    tokio::spawn(async move {
        let _ = server.serve(listener, shutdown_rx).await;
    });

    (addr, shutdown_tx)
}

#[tokio::test]
async fn test_full_flow_scrape() {
    let url =
        spawn_upstream(Router::new().route("/metrics", get(|| async { MEDIAMTX_BODY }))).await;
    let refresher = make_refresher(url, AuthMode::Probe);
    let (addr, shutdown) = spawn_exporter(refresher.clone()).await;

    let response = reqwest::get(format!("http://{}/metrics", addr)).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert!(
        response
            .headers()
            .get("content-type")
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("text/plain")
    );
    let body = response.text().await.unwrap();

    assert!(body.starts_with("# MediaMTX metrics exported by mediamtx-exporter\n"));
    assert!(body.contains("mediamtx_exporter_up 1\n"));

    // Labeled lines come back verbatim
    assert!(body.contains("paths{name=\"cam1\",state=\"ready\"} 1\n"));
    assert!(body.contains("paths{name=\"cam2\",state=\"notReady\"} 1\n"));
    assert!(body.contains("paths_bytes_received{name=\"cam1\",state=\"ready\"} 123456\n"));

    // Unlabeled samples get a HELP/TYPE/value triple
    assert!(body.contains("# HELP rtsp_conns MediaMTX metric: rtsp_conns\n"));
    assert!(body.contains("# TYPE rtsp_conns gauge\n"));
    assert!(body.contains("rtsp_conns 4.0\n"));
    assert!(body.contains("# HELP rtmp_conns_total MediaMTX metric: rtmp-conns.total\n"));
    assert!(body.contains("rtmp_conns_total 2.0\n"));
    assert!(body.contains("server_state running\n"));

    // Upstream comments and malformed lines are not re-served
    assert!(!body.contains("Number of paths"));
    assert!(!body.contains("bad{line"));

    let stats = refresher.stats();
    assert_eq!(stats.successes, 1);
    assert_eq!(stats.lines_skipped, 1);

    let _ = shutdown.send(true);
}

#[tokio::test]
async fn test_concrete_scenario() {
    let url = spawn_upstream(Router::new().route(
        "/metrics",
        get(|| async { "foo_total 42\nbar{label=\"x\"} 3.5\n# a comment\n" }),
    ))
    .await;
    let refresher = make_refresher(url, AuthMode::External);
    let (addr, shutdown) = spawn_exporter(refresher.clone()).await;

    let body = reqwest::get(format!("http://{}/metrics", addr))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    let snapshot = refresher.store().read();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot.get("foo_total").and_then(|v| v.as_f64()), Some(42.0));
    assert_eq!(
        snapshot.get("bar{label=\"x\"} 3.5").and_then(|v| v.as_f64()),
        Some(3.5)
    );

    assert!(body.contains("mediamtx_exporter_up 1\n"));
    assert!(body.contains(
        "# HELP foo_total MediaMTX metric: foo_total\n# TYPE foo_total gauge\nfoo_total 42.0\n"
    ));
    assert!(body.lines().any(|l| l == "bar{label=\"x\"} 3.5"));

    let _ = shutdown.send(true);
}

#[tokio::test]
async fn test_always_unauthorized_serves_down_stanza() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let url = spawn_upstream(Router::new().route(
        "/metrics",
        get(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { StatusCode::UNAUTHORIZED }
        }),
    ))
    .await;
    let refresher = make_refresher(url, AuthMode::Probe);
    let (addr, shutdown) = spawn_exporter(refresher.clone()).await;

    let response = reqwest::get(format!("http://{}/metrics", addr)).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), DOWN_STANZA);

    // Every default candidate was tried exactly once
    assert_eq!(hits.load(Ordering::SeqCst), 6);
    assert!(refresher.store().read().is_empty());
    assert_eq!(refresher.stats().failures, 1);

    let _ = shutdown.send(true);
}

#[tokio::test]
async fn test_probe_finds_working_credentials() {
    // "mediamtx:mediamtx"
    const EXPECTED: &str = "Basic bWVkaWFtdHg6bWVkaWFtdHg=";

    let url = spawn_upstream(Router::new().route(
        "/metrics",
        get(|headers: HeaderMap| async move {
            match headers.get("authorization").and_then(|v| v.to_str().ok()) {
                Some(EXPECTED) => (StatusCode::OK, "webrtc_sessions 3\n"),
                _ => (StatusCode::UNAUTHORIZED, ""),
            }
        }),
    ))
    .await;
    let refresher = make_refresher(url, AuthMode::Probe);
    let (addr, shutdown) = spawn_exporter(refresher).await;

    let body = reqwest::get(format!("http://{}/metrics", addr))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(body.contains("mediamtx_exporter_up 1\n"));
    assert!(body.contains("webrtc_sessions 3.0\n"));

    let _ = shutdown.send(true);
}

#[tokio::test]
async fn test_upstream_down_then_recovers() {
    let up = Arc::new(AtomicUsize::new(0));
    let flag = up.clone();
    let url = spawn_upstream(Router::new().route(
        "/metrics",
        get(move || {
            let healthy = flag.load(Ordering::SeqCst) == 1;
            async move {
                if healthy {
                    (StatusCode::OK, "hls_muxers 2\n")
                } else {
                    (StatusCode::NOT_FOUND, "")
                }
            }
        }),
    ))
    .await;
    let refresher = make_refresher(url, AuthMode::External);
    let (addr, shutdown) = spawn_exporter(refresher).await;
    let client = reqwest::Client::new();
    let metrics_url = format!("http://{}/metrics", addr);

    let body = client.get(&metrics_url).send().await.unwrap().text().await.unwrap();
    assert_eq!(body, DOWN_STANZA);

    up.store(1, Ordering::SeqCst);
    let body = client.get(&metrics_url).send().await.unwrap().text().await.unwrap();
    assert!(body.contains("hls_muxers 2.0\n"));

    up.store(0, Ordering::SeqCst);
    let body = client.get(&metrics_url).send().await.unwrap().text().await.unwrap();
    assert_eq!(body, DOWN_STANZA, "stale data must not survive a failed cycle");

    let _ = shutdown.send(true);
}

#[tokio::test]
async fn test_health_and_unknown_paths() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let url = spawn_upstream(Router::new().route(
        "/metrics",
        get(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { "paths 1\n" }
        }),
    ))
    .await;
    let refresher = make_refresher(url, AuthMode::Probe);
    let (addr, shutdown) = spawn_exporter(refresher).await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("http://{}/health", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "OK");

    let response = client
        .get(format!("http://{}/nope", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);

    assert_eq!(hits.load(Ordering::SeqCst), 0);

    let _ = shutdown.send(true);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_scrapes_during_background_refresh() {
    let url = spawn_upstream(Router::new().route(
        "/metrics",
        get(|| async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            MEDIAMTX_BODY
        }),
    ))
    .await;
    let refresher = make_refresher(url, AuthMode::Probe);
    let (addr, shutdown) = spawn_exporter(refresher.clone()).await;

    let scheduler = RefreshScheduler::new(
        refresher.clone(),
        &RefreshConfig {
            interval_secs: 1,
            error_backoff_secs: 1,
            on_scrape: true,
        },
    );
    let scheduler_task = tokio::spawn(scheduler.run(shutdown.subscribe()));

    let client = reqwest::Client::new();
    let metrics_url = format!("http://{}/metrics", addr);
    let requests: Vec<_> = (0..50)
        .map(|_| {
            let client = client.clone();
            let url = metrics_url.clone();
            tokio::spawn(async move {
                let response = client.get(&url).send().await.unwrap();
                assert_eq!(response.status(), reqwest::StatusCode::OK);
                response.text().await.unwrap()
            })
        })
        .collect();

    let reference = {
        let report = mediamtx_exporter::parser::parse(MEDIAMTX_BODY);
        mediamtx_exporter::exposition::render(&report.snapshot).unwrap()
    };

    for request in requests {
        let body = tokio::time::timeout(Duration::from_secs(10), request)
            .await
            .expect("scrape deadlocked")
            .unwrap();
        assert_eq!(body, reference, "every scrape sees one complete snapshot");
    }

    let _ = shutdown.send(true);
    tokio::time::timeout(Duration::from_secs(2), scheduler_task)
        .await
        .expect("scheduler did not stop")
        .unwrap();
}
