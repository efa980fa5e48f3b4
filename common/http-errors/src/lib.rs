use axum::{
    extract::{Request, State},
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use prometheus::IntCounterVec;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub const ERROR_CODE_HEADER: &str = "X-Error-Code";

#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")] pub trace_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")] pub message: Option<String>,
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest { code: &'static str, trace_id: Option<Uuid>, message: Option<String> },
    NotFound { code: &'static str, trace_id: Option<Uuid> },
    Conflict { code: &'static str, trace_id: Option<Uuid>, message: Option<String> },
    Unprocessable { code: &'static str, trace_id: Option<Uuid>, message: Option<String> },
    Internal { trace_id: Option<Uuid>, message: Option<String> },
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(e: E, trace_id: Option<Uuid>) -> Self { Self::Internal { trace_id, message: Some(e.to_string()) } }
    pub fn bad_request(code: &'static str, trace_id: Option<Uuid>) -> Self { Self::BadRequest { code, trace_id, message: None } }
    pub fn not_found(code: &'static str, trace_id: Option<Uuid>) -> Self { Self::NotFound { code, trace_id } }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::Unprocessable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest { code, .. }
            | ApiError::NotFound { code, .. }
            | ApiError::Conflict { code, .. }
            | ApiError::Unprocessable { code, .. } => code,
            ApiError::Internal { .. } => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_code = self.code();
        let body = match self {
            ApiError::NotFound { code, trace_id } => ErrorBody { code: code.into(), trace_id, message: None },
            ApiError::BadRequest { code, trace_id, message }
            | ApiError::Conflict { code, trace_id, message }
            | ApiError::Unprocessable { code, trace_id, message } => ErrorBody { code: code.into(), trace_id, message },
            ApiError::Internal { trace_id, message } => {
                tracing::error!(trace_id = ?trace_id, message = message.as_deref().unwrap_or(""), "internal error");
                ErrorBody { code: "internal_error".into(), trace_id, message }
            }
        };
        let mut resp = (status, Json(body)).into_response();
        if let Ok(val) = HeaderValue::from_str(error_code) {
            resp.headers_mut().insert(ERROR_CODE_HEADER, val);
        }
        resp
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Distinct error codes tracked per service before falling back to [`OVERFLOW_CODE`].
pub const MAX_ERROR_CODES: usize = 40;
pub const OVERFLOW_CODE: &str = "other";

/// Counts error responses (status >= 400) by the `X-Error-Code` they carry.
#[derive(Clone)]
pub struct HttpErrorMetrics {
    service: &'static str,
    errors: IntCounterVec,
    seen: Arc<Mutex<HashSet<String>>>,
}

impl HttpErrorMetrics {
    /// `errors` must carry the labels `service`, `code`, `status`.
    pub fn new(service: &'static str, errors: IntCounterVec) -> Self {
        Self { service, errors, seen: Arc::new(Mutex::new(HashSet::new())) }
    }

    fn label_for(&self, code: &str) -> String {
        let Ok(mut seen) = self.seen.lock() else { return OVERFLOW_CODE.to_string() };
        if seen.contains(code) {
            return code.to_string();
        }
        if seen.len() >= MAX_ERROR_CODES {
            return OVERFLOW_CODE.to_string();
        }
        seen.insert(code.to_string());
        code.to_string()
    }

    pub fn record(&self, code: &str, status: StatusCode) {
        let label = self.label_for(code);
        self.errors.with_label_values(&[self.service, label.as_str(), status.as_str()]).inc();
    }

    pub fn count(&self, code: &str, status: StatusCode) -> u64 {
        self.errors.with_label_values(&[self.service, code, status.as_str()]).get()
    }
}

/// Middleware for `axum::middleware::from_fn_with_state`.
pub async fn http_error_metrics(State(metrics): State<HttpErrorMetrics>, req: Request, next: Next) -> Response {
    let resp = next.run(req).await;
    let status = resp.status();
    if status.as_u16() >= 400 {
        let code = resp
            .headers()
            .get(ERROR_CODE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown");
        metrics.record(code, status);
    }
    resp
}
