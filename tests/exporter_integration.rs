//! Exporter Integration Tests
//!
//! Runs the full service against a scripted engine on a Unix socket and
//! scrapes it over real HTTP.

#![cfg(unix)]

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use liquidsoap_exporter::service;
use liquidsoap_exporter::{
    AppConfig, Endpoint, Lifecycle, LifecycleState, LiquidsoapClient, Transport,
};
use serde_json::Value;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, UnixListener};
use tokio::task::JoinHandle;

// =============================================================================
// Test Helpers
// =============================================================================

const LISTING: &str =
    "| help [<command>]\r\n| stream_a_rms.rms\r\n| stream_b_rms.rms\r\n| uptime\r\n| version";

type CommandLog = Arc<Mutex<Vec<String>>>;

/// Answers the engine gives to each command line.
type Script = fn(&str) -> String;

fn reply(body: &str) -> String {
    format!("{body}\r\nEND\r\n")
}

fn answer(command: &str) -> String {
    match command {
        "help" => reply(LISTING),
        "uptime" => reply("0d 00h 00m 10s"),
        "version" => reply("Liquidsoap 1.4.2"),
        "stream_a_rms.rms" => reply("-23.5"),
        "stream_b_rms.rms" => reply("-41.0"),
        "exit" => "Bye!\r\n".to_string(),
        _ => reply("ERROR: unknown command"),
    }
}

/// Engine that turns level queries into a goodbye, desynchronizing the client.
fn desync_answer(command: &str) -> String {
    if command.ends_with(".rms") {
        "Bye!\r\n".to_string()
    } else {
        answer(command)
    }
}

/// Serve one control connection on `path`, logging every command.
///
/// Level queries are answered after `level_delay`.
fn spawn_engine(path: &Path, script: Script, level_delay: Duration) -> CommandLog {
    let listener = UnixListener::bind(path).expect("Failed to bind engine socket");
    let log: CommandLog = Arc::new(Mutex::new(Vec::new()));
    let commands = log.clone();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read, mut write) = stream.into_split();
        let mut lines = BufReader::new(read).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            commands.lock().unwrap().push(line.clone());
            // Keep concurrent scrapes in flight long enough to overlap.
            tokio::time::sleep(Duration::from_millis(2)).await;
            if line.ends_with(".rms") {
                tokio::time::sleep(level_delay).await;
            }
            if write.write_all(script(&line).as_bytes()).await.is_err() || line == "exit" {
                break;
            }
        }
    });

    log
}

struct TestExporter {
    base_url: String,
    lifecycle: Arc<Lifecycle>,
    commands: CommandLog,
    handle: JoinHandle<Result<(), service::ServiceError>>,
    _dir: TempDir,
}

/// Start engine and exporter; returns once the exporter is serving.
async fn start_exporter() -> TestExporter {
    start_exporter_with(answer, Duration::ZERO).await
}

async fn start_exporter_with(script: Script, level_delay: Duration) -> TestExporter {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("liquidsoap.sock");
    let commands = spawn_engine(&socket, script, level_delay);

    let mut config = AppConfig::default();
    config.liquidsoap.endpoint = Endpoint::Unix(socket.clone());

    let transport = Transport::connect(&config.liquidsoap.endpoint, Duration::from_secs(1))
        .await
        .expect("Failed to connect to engine");
    let client = Arc::new(LiquidsoapClient::new(transport, Duration::from_secs(2)));
    let collector = service::start_collector(&config, client.clone())
        .await
        .expect("Startup failed");

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let addr = listener.local_addr().expect("Failed to get local addr");

    let lifecycle = Arc::new(Lifecycle::new());
    let handle = tokio::spawn(service::serve(
        client,
        Arc::new(collector),
        listener,
        "/metrics",
        lifecycle.clone(),
    ));

    // Give server time to start
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(lifecycle.state(), LifecycleState::Running);

    TestExporter {
        base_url: format!("http://{}", addr),
        lifecycle,
        commands,
        handle,
        _dir: dir,
    }
}

// =============================================================================
// Scrape Tests
// =============================================================================

#[tokio::test]
async fn test_scrape_exports_engine_metrics() {
    let exporter = start_exporter().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{}/metrics", exporter.base_url))
        .send()
        .await
        .expect("Failed to send scrape request");
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers()["content-type"].to_str().unwrap(),
        prometheus::TEXT_FORMAT
    );

    let body = resp.text().await.unwrap();
    assert!(body.contains(r#"liquidsoap_rms{source="stream_a"} -23.5"#));
    assert!(body.contains(r#"liquidsoap_rms{source="stream_b"} -41"#));
    assert!(body.contains("liquidsoap_start_time_seconds "));
    assert!(body.contains(r#"liquidsoap_info{major="1",minor="4",patch="2",version="1.4.2"} 1"#));

    exporter.lifecycle.stop();
    exporter.handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_healthz_reports_state() {
    let exporter = start_exporter().await;

    let resp = reqwest::get(format!("{}/healthz", exporter.base_url))
        .await
        .expect("Failed to send healthz request");
    assert_eq!(resp.status(), 200);
    let text = resp.text().await.expect("Failed to read healthz response");
    let body: Value = serde_json::from_str(&text).expect("Failed to parse healthz response");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["state"], "running");

    exporter.lifecycle.stop();
    exporter.handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_concurrent_scrapes_are_serialized() {
    let exporter = start_exporter().await;
    let client = reqwest::Client::new();

    let mut scrapes = tokio::task::JoinSet::new();
    for _ in 0..6 {
        let client = client.clone();
        let url = format!("{}/metrics", exporter.base_url);
        scrapes.spawn(async move { client.get(url).send().await.unwrap().text().await.unwrap() });
    }
    while let Some(body) = scrapes.join_next().await {
        let body = body.unwrap();
        assert!(body.contains(r#"liquidsoap_rms{source="stream_a"} -23.5"#));
        assert!(body.contains(r#"liquidsoap_rms{source="stream_b"} -41"#));
    }

    let log = exporter.commands.lock().unwrap().clone();
    let levels: Vec<&String> = log.iter().filter(|c| c.ends_with(".rms")).collect();
    assert_eq!(levels.len(), 12);
    for pair in levels.chunks(2) {
        assert_eq!(pair[0], "stream_a_rms.rms");
        assert_eq!(pair[1], "stream_b_rms.rms");
    }

    exporter.lifecycle.stop();
    exporter.handle.await.unwrap().unwrap();
}

// =============================================================================
// Shutdown Tests
// =============================================================================

#[tokio::test]
async fn test_repeated_stop_shuts_down_once() {
    let exporter = start_exporter().await;

    assert!(exporter.lifecycle.stop());
    assert!(!exporter.lifecycle.stop());

    tokio::time::timeout(Duration::from_secs(5), exporter.handle)
        .await
        .expect("Shutdown timed out")
        .unwrap()
        .unwrap();
    assert!(!exporter.lifecycle.stop());
    assert_eq!(exporter.lifecycle.state(), LifecycleState::Stopped);

    let log = exporter.commands.lock().unwrap().clone();
    assert_eq!(log, ["help", "uptime", "version", "exit"]);
}

#[tokio::test]
async fn test_stop_drains_in_flight_scrape() {
    let exporter = start_exporter_with(answer, Duration::from_millis(200)).await;

    let url = format!("{}/metrics", exporter.base_url);
    let scrape = tokio::spawn(async move {
        let resp = reqwest::get(url).await.expect("Failed to send scrape request");
        (resp.status(), resp.text().await.unwrap())
    });

    // Stop while the first level query is still unanswered.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(exporter.lifecycle.stop());

    let (status, body) = scrape.await.unwrap();
    assert_eq!(status, 200);
    assert!(body.contains(r#"liquidsoap_rms{source="stream_a"} -23.5"#));
    assert!(body.contains(r#"liquidsoap_rms{source="stream_b"} -41"#));

    tokio::time::timeout(Duration::from_secs(5), exporter.handle)
        .await
        .expect("Shutdown timed out")
        .unwrap()
        .unwrap();

    let log = exporter.commands.lock().unwrap().clone();
    assert_eq!(
        log,
        ["help", "uptime", "version", "stream_a_rms.rms", "stream_b_rms.rms", "exit"]
    );
}

#[tokio::test]
async fn test_desync_stops_with_error() {
    let exporter = start_exporter_with(desync_answer, Duration::ZERO).await;

    let resp = reqwest::get(format!("{}/metrics", exporter.base_url))
        .await
        .expect("Failed to send scrape request");
    assert_eq!(resp.status(), 500);

    let result = tokio::time::timeout(Duration::from_secs(5), exporter.handle)
        .await
        .expect("Shutdown timed out")
        .unwrap();
    assert!(matches!(result, Err(service::ServiceError::Fault(_))));
    assert_eq!(exporter.lifecycle.state(), LifecycleState::Stopped);

    // The poisoned connection is never asked to quit.
    let log = exporter.commands.lock().unwrap().clone();
    assert!(!log.iter().any(|c| c == "exit"));
}

#[tokio::test]
async fn test_no_scrape_after_shutdown() {
    let exporter = start_exporter().await;
    let base_url = exporter.base_url.clone();

    exporter.lifecycle.stop();
    exporter.handle.await.unwrap().unwrap();

    let result = reqwest::get(format!("{}/metrics", base_url)).await;
    assert!(result.is_err(), "listener should be closed after shutdown");

    let log = exporter.commands.lock().unwrap().clone();
    assert!(log.iter().all(|c| !c.ends_with(".rms")));
}

#[tokio::test]
async fn test_run_fails_without_engine() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = AppConfig::default();
    config.liquidsoap.endpoint = Endpoint::Unix(dir.path().join("absent.sock"));
    config.liquidsoap.connect_timeout = Duration::from_millis(200);

    let lifecycle = Arc::new(Lifecycle::new());
    let err = service::run(&config, lifecycle.clone()).await.unwrap_err();

    assert!(matches!(err, service::ServiceError::Connection(_)));
    assert_ne!(lifecycle.state(), LifecycleState::Running);
}
