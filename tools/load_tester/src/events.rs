use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use platform::{record_labeled_counter, record_labeled_histogram};
use tracing::debug;
use uuid::Uuid;

use crate::client::InvokeError;
use crate::stats::StatsCollector;

/// Request type tag attached to every event.
pub const REQUEST_TYPE: &str = "sagemaker-mme";

/// Response bodies are not measured.
pub const RESPONSE_LENGTH: u64 = 0;

pub const REQUESTS_TOTAL: &str = "mme_load_tester_requests_total";
pub const RESPONSE_TIME_MS: &str = "mme_load_tester_response_time_ms";

#[derive(Debug, Clone)]
pub enum Outcome {
    Success,
    Failure(Arc<InvokeError>),
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure(_) => "failure",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }

    pub fn error(&self) -> Option<&InvokeError> {
        match self {
            Outcome::Success => None,
            Outcome::Failure(err) => Some(&**err),
        }
    }
}

/// One reported invocation.
#[derive(Debug, Clone)]
pub struct RequestEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub request_type: String,
    pub name: String,
    pub response_time_ms: u64,
    pub response_length: u64,
    pub outcome: Outcome,
}

impl RequestEvent {
    pub fn new(
        request_type: &str,
        name: &str,
        response_time_ms: u64,
        response_length: u64,
        outcome: Outcome,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            request_type: request_type.to_string(),
            name: name.to_string(),
            response_time_ms,
            response_length,
            outcome,
        }
    }
}

/// Receiver of request outcomes. Reporting never fails from the caller's view.
pub trait EventSink: Send + Sync {
    fn report_success(
        &self,
        request_type: &str,
        name: &str,
        response_time_ms: u64,
        response_length: u64,
    );

    fn report_failure(
        &self,
        request_type: &str,
        name: &str,
        response_time_ms: u64,
        response_length: u64,
        error: InvokeError,
    );
}

/// Production sink: aggregates statistics for the final report and mirrors
/// every event into the Prometheus recorder.
#[derive(Clone)]
pub struct MetricsBus {
    stats: Arc<StatsCollector>,
}

impl MetricsBus {
    pub fn new(stats: Arc<StatsCollector>) -> Self {
        Self { stats }
    }

    pub fn stats(&self) -> &Arc<StatsCollector> {
        &self.stats
    }

    fn publish(&self, event: RequestEvent) {
        debug!(
            event_id = %event.id,
            request_type = %event.request_type,
            name = %event.name,
            response_time_ms = event.response_time_ms,
            outcome = event.outcome.as_str(),
            error = ?event.outcome.error().map(ToString::to_string),
            "request completed"
        );

        record_labeled_counter(
            REQUESTS_TOTAL,
            &[
                ("request_type", event.request_type.clone()),
                ("name", event.name.clone()),
                ("outcome", event.outcome.as_str().to_string()),
            ],
            1,
        );
        record_labeled_histogram(
            RESPONSE_TIME_MS,
            &[
                ("request_type", event.request_type.clone()),
                ("name", event.name.clone()),
            ],
            event.response_time_ms as f64,
        );

        self.stats.record(&event);
    }
}

impl EventSink for MetricsBus {
    fn report_success(
        &self,
        request_type: &str,
        name: &str,
        response_time_ms: u64,
        response_length: u64,
    ) {
        self.publish(RequestEvent::new(
            request_type,
            name,
            response_time_ms,
            response_length,
            Outcome::Success,
        ));
    }

    fn report_failure(
        &self,
        request_type: &str,
        name: &str,
        response_time_ms: u64,
        response_length: u64,
        error: InvokeError,
    ) {
        self.publish(RequestEvent::new(
            request_type,
            name,
            response_time_ms,
            response_length,
            Outcome::Failure(Arc::new(error)),
        ));
    }
}

/// Keeps every event in memory.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<RequestEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RequestEvent> {
        self.lock().clone()
    }

    pub fn successes(&self) -> usize {
        self.lock().iter().filter(|e| e.outcome.is_success()).count()
    }

    pub fn failures(&self) -> usize {
        self.lock().iter().filter(|e| !e.outcome.is_success()).count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<RequestEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EventSink for RecordingSink {
    fn report_success(
        &self,
        request_type: &str,
        name: &str,
        response_time_ms: u64,
        response_length: u64,
    ) {
        self.lock().push(RequestEvent::new(
            request_type,
            name,
            response_time_ms,
            response_length,
            Outcome::Success,
        ));
    }

    fn report_failure(
        &self,
        request_type: &str,
        name: &str,
        response_time_ms: u64,
        response_length: u64,
        error: InvokeError,
    ) {
        self.lock().push(RequestEvent::new(
            request_type,
            name,
            response_time_ms,
            response_length,
            Outcome::Failure(Arc::new(error)),
        ));
    }
}
