use std::time::Duration;

use rand::Rng;
use tokio::sync::watch;
use tracing::{trace, Instrument};
use uuid::Uuid;

use crate::invoker::Invoker;
use crate::sampler::Sampler;

/// Pause between two actions of the same user, uniform in `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitTime {
    min: Duration,
    max: Duration,
}

impl WaitTime {
    /// Bounds given in the wrong order are swapped.
    pub fn between(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    pub fn constant(wait: Duration) -> Self {
        Self::between(wait, wait)
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    pub fn next<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.min == self.max {
            self.min
        } else {
            rng.gen_range(self.min..=self.max)
        }
    }
}

/// One simulated client. Each action samples a row and invokes the endpoint;
/// actions of one user never overlap.
pub struct SimulatedUser {
    id: Uuid,
    sampler: Sampler,
    invoker: Invoker,
    wait_time: WaitTime,
}

impl SimulatedUser {
    pub fn new(sampler: Sampler, invoker: Invoker, wait_time: WaitTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            sampler,
            invoker,
            wait_time,
        }
    }

    pub async fn run_task(&mut self) {
        let request = self.sampler.sample();
        self.invoker.invoke(request).await;
    }

    /// Run actions until `shutdown` turns `true` (or its sender goes away).
    /// Returns how many actions completed.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> u64 {
        let span = platform::user_span(self.id, self.invoker.endpoint_name());

        async move {
            let mut completed = 0;
            loop {
                if *shutdown.borrow() {
                    break;
                }

                self.run_task().await;
                completed += 1;

                let pause = self.wait_time.next(self.sampler.rng());
                trace!(?pause, completed, "action finished");
                tokio::select! {
                    _ = tokio::time::sleep(pause) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
            completed
        }
        .instrument(span)
        .await
    }
}
