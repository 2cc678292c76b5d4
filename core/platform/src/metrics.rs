use std::net::SocketAddr;
use std::sync::Once;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::errors::{PlatformError, PlatformResult};

/// Label set attached to a metric sample.
pub type Labels<'a> = &'a [(&'static str, String)];

static INIT: Once = Once::new();

/// Install the Prometheus recorder and serve `/metrics` on `bind_addr`.
///
/// Only the first call installs anything; later calls return `Ok(())`.
/// Without a recorder every `record_*` function below is a no-op, so
/// callers never need to check whether metrics are enabled.
pub fn init_metrics(bind_addr: SocketAddr) -> PlatformResult<()> {
    let mut init_result: PlatformResult<()> = Ok(());

    INIT.call_once(|| {
        let builder = PrometheusBuilder::new().with_http_listener(bind_addr);

        if let Err(err) = builder.install() {
            init_result = Err(PlatformError::Metrics(format!(
                "failed to install prometheus exporter on {bind_addr}: {err}"
            )));
        }
    });

    init_result
}

pub fn record_counter(name: &'static str, value: u64) {
    counter!(name).increment(value);
}

pub fn record_histogram(name: &'static str, value: f64) {
    histogram!(name).record(value);
}

/// Counter with labels, e.g. `outcome="failure"`.
pub fn record_labeled_counter(name: &'static str, labels: Labels<'_>, value: u64) {
    counter!(name, to_labels(labels)).increment(value);
}

pub fn record_labeled_histogram(name: &'static str, labels: Labels<'_>, value: f64) {
    histogram!(name, to_labels(labels)).record(value);
}

fn to_labels(labels: Labels<'_>) -> Vec<metrics::Label> {
    labels
        .iter()
        .map(|(key, value)| metrics::Label::new(*key, value.clone()))
        .collect()
}
