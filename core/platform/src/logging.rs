use std::env;

use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Layer};

use crate::errors::{PlatformError, PlatformResult};

/// Environment variable selecting the deployment environment.
pub const ENVIRONMENT_VAR: &str = "APP_ENV";

/// Output format for the global subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human readable, used on developer machines.
    Text,
    /// One JSON object per line, used when shipping logs from test rigs.
    Json,
}

impl LogFormat {
    /// `prod` and `staging` log JSON, anything else logs text.
    pub fn for_environment(environment: &str) -> Self {
        match environment {
            "prod" | "staging" => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

/// Install the global tracing subscriber.
///
/// The filter comes from `RUST_LOG` and defaults to `info`. Installing a
/// second subscriber in the same process returns an error instead of
/// panicking, which keeps test binaries that share a process happy.
pub fn init_logging(service_name: &str) -> PlatformResult<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let environment = env::var(ENVIRONMENT_VAR).unwrap_or_else(|_| "dev".to_string());
    let format = LogFormat::for_environment(&environment);

    let installed = match format {
        LogFormat::Json => {
            let json_layer = fmt::layer()
                .json()
                .with_timer(fmt::time::UtcTime::rfc_3339())
                .with_target(true)
                .with_current_span(true)
                .with_span_list(true)
                .with_filter(env_filter);

            tracing_subscriber::registry().with(json_layer).try_init()
        }
        LogFormat::Text => fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .finish()
            .try_init(),
    };

    installed.map_err(|e| PlatformError::Logging(e.to_string()))?;

    tracing::info!(
        service = %service_name,
        environment = %environment,
        format = ?format,
        "logging initialized"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_only_for_deployed_environments() {
        assert_eq!(LogFormat::for_environment("prod"), LogFormat::Json);
        assert_eq!(LogFormat::for_environment("staging"), LogFormat::Json);
        assert_eq!(LogFormat::for_environment("dev"), LogFormat::Text);
        assert_eq!(LogFormat::for_environment(""), LogFormat::Text);
    }

    #[test]
    fn second_init_is_an_error_not_a_panic() {
        let _ = init_logging("platform-test");
        assert!(init_logging("platform-test").is_err());
    }
}
