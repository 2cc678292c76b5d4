//! Dataset file -> sampler -> invoker -> statistics, with stub clients.

use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mme_load_tester::{
    BackendConfig, InferenceClient, InvocationRequest, InvocationResponse, InvokeError, Invoker,
    LoadTestConfig, RecordingSink, ReferenceDataset, Runner, Sampler, WaitTime,
};
use tempfile::NamedTempFile;

fn write_dataset(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp file");
    file.write_all(contents.as_bytes()).expect("write dataset");
    file
}

fn three_row_dataset() -> (NamedTempFile, Arc<ReferenceDataset>) {
    let file = write_dataset("Id,Churn,State,F1,F2\n0,0,CA,1,2\n1,1,NY,3,4\n2,0,CA,5,6\n");
    let dataset = ReferenceDataset::from_path(file.path()).expect("dataset loads");
    (file, Arc::new(dataset))
}

#[derive(Default)]
struct CapturingClient {
    seen: Mutex<Vec<InvocationRequest>>,
}

#[async_trait]
impl InferenceClient for CapturingClient {
    async fn invoke(&self, request: &InvocationRequest) -> Result<InvocationResponse, InvokeError> {
        self.seen.lock().unwrap().push(request.clone());
        Ok(InvocationResponse::default())
    }
}

struct CountingClient {
    calls: AtomicUsize,
    fail: bool,
}

#[async_trait]
impl InferenceClient for CountingClient {
    async fn invoke(&self, _request: &InvocationRequest) -> Result<InvocationResponse, InvokeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(2)).await;
        if self.fail {
            Err(InvokeError::SageMaker("ModelError: churn-xgb model failed".to_string()))
        } else {
            Ok(InvocationResponse::default())
        }
    }
}

fn config(users: usize) -> LoadTestConfig {
    LoadTestConfig {
        endpoint_name: "churn-mme".to_string(),
        dataset: PathBuf::from("unused.csv"),
        users,
        spawn_rate: 100.0,
        run_time: None,
        wait_time: WaitTime::between(Duration::from_millis(1), Duration::from_millis(5)),
        backend: BackendConfig::Sagemaker,
        metrics_addr: None,
        summary_json: None,
        seed: Some(11),
    }
}

#[test]
fn ny_row_produces_ny_model_and_its_features() {
    let (_file, dataset) = three_row_dataset();
    let mut sampler = Sampler::with_seed(dataset, 3);

    let ny = (0..1_000)
        .map(|_| sampler.sample())
        .find(|request| request.target_model == "churn-xgb-NY.tar.gz")
        .expect("the NY row is drawn at least once");

    assert_eq!(ny.data, "3,4");
}

#[test]
fn every_row_is_reachable_and_labels_match_features() {
    let (_file, dataset) = three_row_dataset();
    let mut sampler = Sampler::with_seed(dataset, 5);

    let mut seen = std::collections::HashSet::new();
    for _ in 0..300 {
        let request = sampler.sample();
        match request.data.as_str() {
            "1,2" | "5,6" => assert_eq!(request.target_model, "churn-xgb-CA.tar.gz"),
            "3,4" => assert_eq!(request.target_model, "churn-xgb-NY.tar.gz"),
            other => panic!("unexpected body {other}"),
        }
        seen.insert(request.data);
    }
    assert_eq!(seen.len(), 3);
}

#[tokio::test]
async fn sampled_rows_reach_the_client_unchanged() {
    let (_file, dataset) = three_row_dataset();
    let client = Arc::new(CapturingClient::default());
    let sink = Arc::new(RecordingSink::new());
    let invoker = Invoker::new("churn-mme", client.clone(), sink.clone());
    let mut sampler = Sampler::with_seed(dataset, 9);

    for _ in 0..50 {
        invoker.invoke(sampler.sample()).await;
    }

    assert_eq!(sink.successes(), 50);
    for request in client.seen.lock().unwrap().iter() {
        assert_eq!(request.endpoint_name, "churn-mme");
        assert_eq!(request.content_type, "text/csv");
        assert_eq!(request.body.matches(',').count(), 1);
        assert!(!request.body.contains('['));
    }
}

#[tokio::test]
async fn runner_reports_every_completed_call() {
    let (_file, dataset) = three_row_dataset();
    let client = Arc::new(CountingClient {
        calls: AtomicUsize::new(0),
        fail: false,
    });

    let runner = Runner::new(config(4), dataset, client.clone());
    let summary = runner
        .run_until(tokio::time::sleep(Duration::from_millis(300)))
        .await;

    let calls = client.calls.load(Ordering::SeqCst) as u64;
    assert!(calls >= 4, "every user acts at least once");
    assert_eq!(summary.total.num_requests, calls);
    assert_eq!(summary.total.num_failures, 0);
    assert_eq!(summary.entries.len(), 1);
    assert_eq!(summary.entries[0].request_type, "sagemaker-mme");
    assert_eq!(summary.entries[0].name, "churn-mme");
}

#[tokio::test]
async fn runner_survives_a_failing_endpoint() {
    let (_file, dataset) = three_row_dataset();
    let client = Arc::new(CountingClient {
        calls: AtomicUsize::new(0),
        fail: true,
    });

    let runner = Runner::new(config(2), dataset, client.clone());
    let summary = runner
        .run_until(tokio::time::sleep(Duration::from_millis(200)))
        .await;

    let calls = client.calls.load(Ordering::SeqCst) as u64;
    assert!(calls > 2, "users keep going after failures");
    assert_eq!(summary.total.num_failures, calls);
    assert_eq!(summary.total.errors.len(), 1);
    assert_eq!(summary.total.errors[0].count, calls);
    assert_eq!(summary.total.failure_ratio, 1.0);
}

#[tokio::test]
async fn runner_tolerates_a_spawn_rate_too_slow_to_schedule() {
    let (_file, dataset) = three_row_dataset();
    let client = Arc::new(CountingClient {
        calls: AtomicUsize::new(0),
        fail: false,
    });
    let config = LoadTestConfig {
        spawn_rate: 1e-20,
        ..config(2)
    };

    let summary = Runner::new(config, dataset, client.clone())
        .run_until(tokio::time::sleep(Duration::from_millis(100)))
        .await;

    // Only the first user starts before the run ends.
    assert!(client.calls.load(Ordering::SeqCst) >= 1);
    assert_eq!(
        summary.total.num_requests,
        client.calls.load(Ordering::SeqCst) as u64
    );
}

#[test]
fn malformed_dataset_files_fail_at_load() {
    let missing_state = write_dataset("Id,Churn,Region,F1\n0,0,CA,1\n");
    assert!(ReferenceDataset::from_path(missing_state.path()).is_err());

    let header_only = write_dataset("Id,Churn,State,F1\n");
    assert!(ReferenceDataset::from_path(header_only.path()).is_err());
}
