use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use thiserror::Error;

use crate::user::WaitTime;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("--users must be at least 1")]
    NoUsers,

    #[error("--spawn-rate must be a positive number of users per second, got {0}")]
    InvalidSpawnRate(f64),

    #[error("--spawn-rate {0} is too low, the pause between two spawns does not fit a duration")]
    SpawnRateTooLow(f64),

    #[error("--wait-min-ms ({min}) must not exceed --wait-max-ms ({max})")]
    InvalidWaitTime { min: u64, max: u64 },

    #[error("--http-base-url is required when --backend=http")]
    MissingBaseUrl,
}

/// Which client carries the invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// AWS SageMaker runtime `InvokeEndpoint`, credentials from the environment.
    Sagemaker,
    /// Plain HTTP POST to a SageMaker-compatible invocations route.
    Http,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "mme_load_tester",
    version,
    about = "Load generator for multi-model inference endpoints"
)]
pub struct Args {
    /// Endpoint receiving the invocations
    #[arg(long, env = "ENDPOINT_NAME")]
    pub endpoint_name: String,

    /// CSV file with a header row, a `State` column and feature columns from the fourth on
    #[arg(long, env = "DATASET_PATH", default_value = "churn_test.csv")]
    pub dataset: PathBuf,

    /// Number of concurrent simulated users
    #[arg(long, default_value_t = 10)]
    pub users: usize,

    /// Users started per second until `--users` are running
    #[arg(long, default_value_t = 1.0)]
    pub spawn_rate: f64,

    /// Run time in seconds, 0 runs until Ctrl-C
    #[arg(long, default_value_t = 60)]
    pub run_time_secs: u64,

    /// Lower bound of the pause between two actions of one user
    #[arg(long, default_value_t = 0)]
    pub wait_min_ms: u64,

    /// Upper bound of the pause between two actions of one user
    #[arg(long, default_value_t = 2000)]
    pub wait_max_ms: u64,

    #[arg(long, value_enum, default_value_t = Backend::Sagemaker)]
    pub backend: Backend,

    /// Base URL for `--backend=http` (e.g. http://127.0.0.1:8080)
    #[arg(long)]
    pub http_base_url: Option<String>,

    /// Per-request timeout for `--backend=http`; the SDK keeps its own defaults
    #[arg(long)]
    pub request_timeout_secs: Option<u64>,

    /// Serve Prometheus metrics on this address (e.g. 0.0.0.0:9000)
    #[arg(long)]
    pub metrics_addr: Option<SocketAddr>,

    /// Write the final statistics as JSON to this file
    #[arg(long)]
    pub summary_json: Option<PathBuf>,

    /// Seed for reproducible sampling; user `i` samples with `seed + i`
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BackendConfig {
    Sagemaker,
    Http {
        base_url: String,
        timeout: Option<Duration>,
    },
}

/// Validated process-wide configuration, built once in `main`.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadTestConfig {
    pub endpoint_name: String,
    pub dataset: PathBuf,
    pub users: usize,
    pub spawn_rate: f64,
    /// `None` runs until interrupted.
    pub run_time: Option<Duration>,
    pub wait_time: WaitTime,
    pub backend: BackendConfig,
    pub metrics_addr: Option<SocketAddr>,
    pub summary_json: Option<PathBuf>,
    pub seed: Option<u64>,
}

impl LoadTestConfig {
    pub fn from_args(args: Args) -> Result<Self, ConfigError> {
        if args.users == 0 {
            return Err(ConfigError::NoUsers);
        }
        if !(args.spawn_rate.is_finite() && args.spawn_rate > 0.0) {
            return Err(ConfigError::InvalidSpawnRate(args.spawn_rate));
        }
        if Duration::try_from_secs_f64(1.0 / args.spawn_rate).is_err() {
            return Err(ConfigError::SpawnRateTooLow(args.spawn_rate));
        }
        if args.wait_min_ms > args.wait_max_ms {
            return Err(ConfigError::InvalidWaitTime {
                min: args.wait_min_ms,
                max: args.wait_max_ms,
            });
        }

        let backend = match args.backend {
            Backend::Sagemaker => BackendConfig::Sagemaker,
            Backend::Http => BackendConfig::Http {
                base_url: args.http_base_url.ok_or(ConfigError::MissingBaseUrl)?,
                timeout: args.request_timeout_secs.map(Duration::from_secs),
            },
        };

        Ok(Self {
            endpoint_name: args.endpoint_name,
            dataset: args.dataset,
            users: args.users,
            spawn_rate: args.spawn_rate,
            run_time: (args.run_time_secs > 0).then(|| Duration::from_secs(args.run_time_secs)),
            wait_time: WaitTime::between(
                Duration::from_millis(args.wait_min_ms),
                Duration::from_millis(args.wait_max_ms),
            ),
            backend,
            metrics_addr: args.metrics_addr,
            summary_json: args.summary_json,
            seed: args.seed,
        })
    }
}
