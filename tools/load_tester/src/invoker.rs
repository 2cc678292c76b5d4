use std::sync::Arc;
use std::time::Instant;

use crate::client::{InferenceClient, InvocationRequest};
use crate::events::{EventSink, REQUEST_TYPE, RESPONSE_LENGTH};
use crate::sampler::SampledRequest;

pub const CONTENT_TYPE_CSV: &str = "text/csv";

/// Sends sampled requests to one endpoint and reports each outcome.
#[derive(Clone)]
pub struct Invoker {
    endpoint_name: String,
    client: Arc<dyn InferenceClient>,
    sink: Arc<dyn EventSink>,
}

impl Invoker {
    pub fn new(
        endpoint_name: impl Into<String>,
        client: Arc<dyn InferenceClient>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            endpoint_name: endpoint_name.into(),
            client,
            sink,
        }
    }

    pub fn endpoint_name(&self) -> &str {
        &self.endpoint_name
    }

    /// Make one call and emit exactly one success or failure event.
    ///
    /// Errors from the client of any kind end up in the failure event and
    /// are never returned, so one bad call cannot stop a simulated user.
    pub async fn invoke(&self, sampled: SampledRequest) {
        let request = InvocationRequest {
            endpoint_name: self.endpoint_name.clone(),
            content_type: CONTENT_TYPE_CSV.to_string(),
            target_model: sampled.target_model,
            body: sampled.data,
        };

        let start = Instant::now();
        let result = self.client.invoke(&request).await;
        let total_time = start.elapsed().as_millis() as u64;

        match result {
            Ok(_) => self.sink.report_success(
                REQUEST_TYPE,
                &self.endpoint_name,
                total_time,
                RESPONSE_LENGTH,
            ),
            Err(err) => self.sink.report_failure(
                REQUEST_TYPE,
                &self.endpoint_name,
                total_time,
                RESPONSE_LENGTH,
                err,
            ),
        }
    }
}
