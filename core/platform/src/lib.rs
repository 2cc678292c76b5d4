pub mod errors;
pub mod logging;
pub mod metrics;
pub mod tracing;

pub use self::errors::{PlatformError, PlatformResult};
pub use self::logging::{init_logging, LogFormat};
pub use self::metrics::{
    init_metrics, record_counter, record_histogram, record_labeled_counter,
    record_labeled_histogram, Labels,
};
pub use self::tracing::{init_tracing, user_span};
