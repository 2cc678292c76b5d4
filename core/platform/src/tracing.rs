use crate::errors::PlatformResult;
use tracing::{span, Level, Span};
use uuid::Uuid;

pub fn init_tracing(service_name: &str) -> PlatformResult<()> {
    crate::logging::init_logging(service_name)
}

/// Span wrapping every action a simulated user performs.
pub fn user_span(user_id: Uuid, endpoint: &str) -> Span {
    span!(
        Level::INFO,
        "simulated_user",
        user_id = %user_id,
        %endpoint,
    )
}
