//! End-to-end cycles against mock token and monitoring endpoints

use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::Client;
use spendwatch::auth::JwtExchangeProvider;
use spendwatch::config::CloudConfig;
use spendwatch::db::SpendReader;
use spendwatch::exporter::{CycleOutcome, Exporter, MetricPublisher, Scheduler};
use spendwatch::Result;
use tempfile::NamedTempFile;
use tracing::subscriber::DefaultGuard;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN_PATH: &str = "/iam/v1/tokens";
const WRITE_PATH: &str = "/monitoring/v2/data/write";

/// Spend table held in memory
struct InMemoryReader {
    rows: HashMap<String, f64>,
    reads: Arc<AtomicUsize>,
}

#[async_trait]
impl SpendReader for InMemoryReader {
    async fn read(&self, key_name: &str) -> Result<Option<f64>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.rows.get(key_name).copied())
    }
}

#[derive(Default)]
struct CountingScheduler {
    waits: usize,
}

#[async_trait]
impl Scheduler for CountingScheduler {
    async fn wait(&mut self) {
        self.waits += 1;
    }
}

/// Formatted log output shared with the subscriber
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl LogBuffer {
    fn lines(&self) -> Vec<String> {
        String::from_utf8(self.0.lock().unwrap().clone())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn has_line(&self, level: &str, needles: &[&str]) -> bool {
        self.lines()
            .iter()
            .any(|line| line.contains(level) && needles.iter().all(|n| line.contains(n)))
    }
}

/// Route this thread's events into a buffer until the guard drops
fn capture_logs() -> (LogBuffer, DefaultGuard) {
    let logs = LogBuffer::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (logs, guard)
}

fn key_file() -> NamedTempFile {
    let record = serde_json::json!({
        "id": "ajekeyid",
        "service_account_id": "ajesaid",
        "private_key": include_str!("fixtures/sa_private_key.pem"),
    });
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(record.to_string().as_bytes()).unwrap();
    file
}

struct Harness {
    server: MockServer,
    reads: Arc<AtomicUsize>,
    exporter: Exporter,
    _key_file: NamedTempFile,
}

async fn harness(rows: &[(&str, f64)], key_name: &str) -> Harness {
    let server = MockServer::start().await;
    let key_file = key_file();
    let client = Client::new();
    let reads = Arc::new(AtomicUsize::new(0));

    let reader = InMemoryReader {
        rows: rows.iter().map(|(k, v)| ((*k).to_string(), *v)).collect(),
        reads: reads.clone(),
    };
    let provider = JwtExchangeProvider::new(
        client.clone(),
        key_file.path(),
        format!("{}{TOKEN_PATH}", server.uri()),
    );
    let cloud = CloudConfig {
        folder_id: "b1gfolder".to_string(),
        monitoring_url: format!("{}{WRITE_PATH}", server.uri()),
        service: "custom".to_string(),
    };
    let publisher = MetricPublisher::new(client, &cloud, "litellm_key_spend");

    Harness {
        exporter: Exporter::new(key_name, Box::new(reader), Box::new(provider), publisher),
        server,
        reads,
        _key_file: key_file,
    }
}

fn token_ok() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "iamToken": "t1.issued",
        "expiresAt": "2030-01-01T00:00:00Z"
    }))
}

#[tokio::test]
async fn test_existing_row_is_published_once() {
    let h = harness(&[("sk-team", 12.5)], "sk-team").await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(token_ok())
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path(WRITE_PATH))
        .and(query_param("folderId", "b1gfolder"))
        .and(query_param("service", "custom"))
        .and(header("authorization", "Bearer t1.issued"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&h.server)
        .await;

    let (logs, _guard) = capture_logs();

    let outcome = h.exporter.run_cycle().await;

    assert_eq!(outcome, CycleOutcome::Published(12.5));
    assert!(logs.has_line("INFO", &["Metric published", "sk-team"]));

    let requests = h.server.received_requests().await.unwrap();
    let write = requests
        .iter()
        .find(|r| r.url.path() == WRITE_PATH)
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&write.body).unwrap();
    assert_eq!(body["metrics"].as_array().unwrap().len(), 1);
    assert_eq!(body["metrics"][0]["value"], 12.5);
    assert_eq!(
        body["metrics"][0]["labels"],
        serde_json::json!({"token": "sk-team"})
    );
}

#[tokio::test]
async fn test_absent_row_makes_no_calls() {
    let h = harness(&[("someone-else", 3.0)], "sk-team").await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&h.server)
        .await;

    let (logs, _guard) = capture_logs();

    let outcome = h.exporter.run_cycle().await;

    assert_eq!(outcome, CycleOutcome::Absent);
    assert_eq!(h.reads.load(Ordering::SeqCst), 1);
    assert!(logs.has_line("WARN", &["No record found for key", "sk-team"]));
}

#[tokio::test]
async fn test_credential_failure_skips_publish_and_next_cycle_reads_again() {
    let h = harness(&[("sk-team", 7.0)], "sk-team").await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("iam down"))
        .expect(2)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path(WRITE_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&h.server)
        .await;
    let mut scheduler = CountingScheduler::default();
    let (logs, _guard) = capture_logs();

    let outcomes = h.exporter.run_for(&mut scheduler, 2).await;

    assert_eq!(
        outcomes,
        vec![CycleOutcome::CredentialFailed, CycleOutcome::CredentialFailed]
    );
    assert_eq!(h.reads.load(Ordering::SeqCst), 2);
    assert_eq!(scheduler.waits, 2);
    assert!(logs.has_line("ERROR", &["Failed to acquire credential", "500", "iam down"]));
    assert!(!logs.has_line("INFO", &["Metric published"]));
}

#[tokio::test]
async fn test_rejected_write_logs_status_and_body_and_loop_continues() {
    let h = harness(&[("sk-team", 1.75)], "sk-team").await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(token_ok())
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path(WRITE_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .expect(2)
        .mount(&h.server)
        .await;
    let (logs, _guard) = capture_logs();

    let outcomes = h
        .exporter
        .run_for(&mut CountingScheduler::default(), 2)
        .await;

    assert_eq!(
        outcomes,
        vec![CycleOutcome::PublishFailed, CycleOutcome::PublishFailed]
    );
    let rejections = logs
        .lines()
        .into_iter()
        .filter(|line| {
            line.contains("ERROR") && line.contains("500") && line.contains("internal error")
        })
        .count();
    assert_eq!(rejections, 2);
}
