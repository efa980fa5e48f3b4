pub mod app;
pub mod config;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod model;
pub mod pricing_query;
pub mod store;

pub use app::{build_router, cors_layer, AppState, SERVICE_NAME};
pub use common_http_errors::ApiError;
pub use config::{ConfigError, ServiceConfig, StoreBackend};
pub use error::{BackofficeError, BackofficeResult};
pub use jobs::{JobDispatcher, JobSnapshot, JobState};
