use std::future::{self, Future};
use std::sync::Arc;
use std::time::Duration;

use platform::record_counter;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{sleep, timeout, Instant};
use tracing::{info, warn};

use crate::client::InferenceClient;
use crate::config::LoadTestConfig;
use crate::dataset::ReferenceDataset;
use crate::events::MetricsBus;
use crate::invoker::Invoker;
use crate::sampler::Sampler;
use crate::stats::{StatsCollector, StatsSummary};
use crate::user::SimulatedUser;

/// How long stopped users get to finish their current action.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

pub const USERS_SPAWNED_TOTAL: &str = "mme_load_tester_users_spawned_total";

/// Starts simulated users, stops them at the end of the run and collects
/// the statistics.
pub struct Runner {
    config: LoadTestConfig,
    dataset: Arc<ReferenceDataset>,
    client: Arc<dyn InferenceClient>,
    stats: Arc<StatsCollector>,
}

impl Runner {
    pub fn new(
        config: LoadTestConfig,
        dataset: Arc<ReferenceDataset>,
        client: Arc<dyn InferenceClient>,
    ) -> Self {
        Self {
            config,
            dataset,
            client,
            stats: Arc::new(StatsCollector::new()),
        }
    }

    /// Run until the configured run time elapses or Ctrl-C is pressed.
    pub async fn run(self) -> StatsSummary {
        let deadline = self.config.run_time.map(|d| Instant::now() + d);
        self.run_until(stop_signal(deadline)).await
    }

    /// Run until `stop` resolves.
    pub async fn run_until<F>(self, stop: F) -> StatsSummary
    where
        F: Future<Output = ()>,
    {
        let bus = Arc::new(MetricsBus::new(self.stats.clone()));
        let invoker = Invoker::new(self.config.endpoint_name.clone(), self.client.clone(), bus);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        // `from_args` bounds the rate; configs built by hand fall back to "never".
        let spawn_interval =
            Duration::try_from_secs_f64(1.0 / self.config.spawn_rate).unwrap_or(Duration::MAX);

        tokio::pin!(stop);
        let mut users = JoinSet::new();
        let mut stopped = false;

        info!(
            endpoint = %self.config.endpoint_name,
            users = self.config.users,
            spawn_rate = self.config.spawn_rate,
            rows = self.dataset.len(),
            "starting load test"
        );

        for index in 0..self.config.users {
            let sampler = match self.config.seed {
                Some(seed) => Sampler::with_seed(self.dataset.clone(), seed.wrapping_add(index as u64)),
                None => Sampler::new(self.dataset.clone()),
            };
            let user = SimulatedUser::new(sampler, invoker.clone(), self.config.wait_time);
            users.spawn(user.run(shutdown_rx.clone()));
            record_counter(USERS_SPAWNED_TOTAL, 1);

            if index + 1 == self.config.users {
                info!(users = self.config.users, "all users spawned");
                break;
            }
            tokio::select! {
                _ = &mut stop => {
                    stopped = true;
                    break;
                }
                _ = sleep(spawn_interval) => {}
            }
        }

        if !stopped {
            stop.await;
        }

        info!("stopping users");
        // Receivers are still held by the users, so this cannot fail.
        let _ = shutdown_tx.send(true);

        let mut actions = 0;
        let drained = timeout(SHUTDOWN_GRACE, async {
            while let Some(joined) = users.join_next().await {
                match joined {
                    Ok(completed) => actions += completed,
                    Err(e) => warn!(error = %e, "simulated user task failed"),
                }
            }
        })
        .await;
        if drained.is_err() {
            warn!(
                remaining = users.len(),
                "users still busy after grace period, aborting in-flight requests"
            );
            users.abort_all();
        }

        let summary = self.stats.summary();
        info!(
            actions,
            requests = summary.total.num_requests,
            failures = summary.total.num_failures,
            "load test complete"
        );
        summary
    }
}

/// Resolves at `deadline` (if any) or on Ctrl-C, whichever comes first.
async fn stop_signal(deadline: Option<Instant>) {
    let run_time = async {
        match deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => future::pending().await,
        }
    };

    let interrupted = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for Ctrl-C, relying on the run time");
            future::pending::<()>().await;
        }
        info!("interrupted");
    };

    tokio::select! {
        _ = run_time => {}
        _ = interrupted => {}
    }
}
