//! Load generator for multi-model inference endpoints.
//!
//! Every simulated user repeatedly draws a random row from a reference CSV,
//! turns it into a `text/csv` request for the model named after the row's
//! `State`, invokes the endpoint and reports the outcome with its latency.

pub mod client;
pub mod config;
pub mod dataset;
pub mod events;
pub mod invoker;
pub mod runner;
pub mod sampler;
pub mod stats;
pub mod user;

pub use client::{
    HttpInferenceClient, InferenceClient, InvocationRequest, InvocationResponse, InvokeError,
    SageMakerClient,
};
pub use config::{Args, BackendConfig, ConfigError, LoadTestConfig};
pub use dataset::{DatasetError, ReferenceDataset};
pub use events::{EventSink, MetricsBus, Outcome, RecordingSink, RequestEvent, REQUEST_TYPE};
pub use invoker::Invoker;
pub use runner::Runner;
pub use sampler::{SampledRequest, Sampler};
pub use stats::{StatsCollector, StatsSummary};
pub use user::{SimulatedUser, WaitTime};
