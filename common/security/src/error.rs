use common_http_errors::ApiError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SecurityError {
    #[error("missing tenant identifier")]    MissingTenant,
    #[error("malformed tenant identifier")]  InvalidTenant,
}

impl SecurityError {
    pub fn into_api_error(self, trace_id: Option<Uuid>) -> ApiError {
        let message = Some(match self {
            SecurityError::MissingTenant => "Missing X-Tenant-ID header".to_string(),
            SecurityError::InvalidTenant => "X-Tenant-ID must be a UUID".to_string(),
        });
        ApiError::BadRequest { code: "missing_tenant_id", trace_id, message }
    }
}
