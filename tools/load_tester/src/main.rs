use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use mme_load_tester::{
    Args, BackendConfig, HttpInferenceClient, InferenceClient, LoadTestConfig, ReferenceDataset,
    Runner, SageMakerClient,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if let Err(e) = platform::init_tracing("mme_load_tester") {
        eprintln!("failed to init tracing: {e}");
    }

    let config = LoadTestConfig::from_args(args)?;
    if let Some(addr) = config.metrics_addr {
        platform::init_metrics(addr)?;
        info!(%addr, "prometheus exporter listening");
    }

    let dataset = ReferenceDataset::from_path(&config.dataset)
        .with_context(|| format!("loading reference dataset {}", config.dataset.display()))?;
    info!(
        path = %config.dataset.display(),
        rows = dataset.len(),
        features = dataset.feature_count(),
        "reference dataset loaded"
    );

    let client: Arc<dyn InferenceClient> = match &config.backend {
        BackendConfig::Sagemaker => Arc::new(SageMakerClient::from_env().await),
        BackendConfig::Http { base_url, timeout } => {
            Arc::new(HttpInferenceClient::new(base_url.clone(), *timeout)?)
        }
    };

    let summary_path = config.summary_json.clone();
    let summary = Runner::new(config, Arc::new(dataset), client).run().await;

    println!("{summary}");
    if let Some(path) = summary_path {
        std::fs::write(&path, summary.to_json()?)
            .with_context(|| format!("writing summary to {}", path.display()))?;
        info!(path = %path.display(), "summary written");
    }

    Ok(())
}
