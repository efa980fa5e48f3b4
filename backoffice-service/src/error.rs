use common_http_errors::ApiError;
use common_pricing::PricingError;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::store::StoreError;

/// Failure of a back-office operation, whether raised synchronously by a
/// handler or recorded as the outcome of a job.
#[derive(Debug, Error)]
pub enum BackofficeError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Pricing(#[from] PricingError),
    #[error("{message}")]
    Invalid { code: &'static str, message: String },
}

pub type BackofficeResult<T> = Result<T, BackofficeError>;

impl BackofficeError {
    pub fn invalid(code: &'static str, message: impl Into<String>) -> Self {
        BackofficeError::Invalid { code, message: message.into() }
    }

    pub fn code(&self) -> &'static str {
        match self {
            BackofficeError::Store(StoreError::NotFound(entity)) => entity.not_found_code(),
            BackofficeError::Store(StoreError::Duplicate { .. }) => "duplicate_name",
            BackofficeError::Store(StoreError::InUse(entity)) => entity.in_use_code(),
            BackofficeError::Store(StoreError::Database(_)) => "internal_error",
            BackofficeError::Pricing(err) => err.code(),
            BackofficeError::Invalid { code, .. } => code,
        }
    }

    pub fn into_api_error(self, trace_id: Option<Uuid>) -> ApiError {
        let code = self.code();
        match self {
            BackofficeError::Store(StoreError::NotFound(_)) => ApiError::not_found(code, trace_id),
            BackofficeError::Store(err @ (StoreError::Duplicate { .. } | StoreError::InUse(_))) => {
                ApiError::Conflict { code, trace_id, message: Some(err.to_string()) }
            }
            BackofficeError::Store(err @ StoreError::Database(_)) => ApiError::internal(err, trace_id),
            BackofficeError::Pricing(err @ PricingError::InvalidGroup(_)) => {
                ApiError::Unprocessable { code, trace_id, message: Some(err.to_string()) }
            }
            BackofficeError::Pricing(err) => ApiError::BadRequest { code, trace_id, message: Some(err.to_string()) },
            BackofficeError::Invalid { message, .. } => ApiError::BadRequest { code, trace_id, message: Some(message) },
        }
    }

    /// Error body stored in a failed job's snapshot. Database details stay in the logs.
    pub fn job_error(&self) -> JobError {
        let message = match self {
            BackofficeError::Store(StoreError::Database(_)) => "internal error".to_string(),
            other => other.to_string(),
        };
        JobError { code: self.code().to_string(), message }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobError {
    pub code: String,
    pub message: String,
}
