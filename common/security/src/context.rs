use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{request::Parts, HeaderMap};
use tracing::Span;
use uuid::Uuid;
use serde::{Serialize, Deserialize};
use common_http_errors::ApiError;
use crate::SecurityError;

/// Who made the request, as forwarded by the gateway. Informational only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Option<Uuid>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantContext {
    pub tenant_id: Uuid,
    pub actor: Actor,
    pub trace_id: Uuid,
}

pub struct TenantCtxExtractor(pub TenantContext);

fn uuid_header(headers: &HeaderMap, name: &str) -> Option<Uuid> {
    headers.get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s.trim()).ok())
}

fn tenant_from_headers(headers: &HeaderMap) -> Result<Uuid, SecurityError> {
    match headers.get("X-Tenant-ID") {
        None => Err(SecurityError::MissingTenant),
        Some(_) => uuid_header(headers, "X-Tenant-ID").ok_or(SecurityError::InvalidTenant),
    }
}

fn actor_from_headers(headers: &HeaderMap) -> Actor {
    Actor {
        id: uuid_header(headers, "X-User-ID"),
        name: headers
            .get("X-User-Name")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for TenantCtxExtractor where S: Send + Sync {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let headers = &parts.headers;
        let trace_id = uuid_header(headers, "X-Trace-ID").unwrap_or_else(Uuid::new_v4);
        let tenant_id = tenant_from_headers(headers).map_err(|e| {
            tracing::debug!(error = %e, %trace_id, "rejecting request without tenant");
            e.into_api_error(Some(trace_id))
        })?;
        let actor = actor_from_headers(headers);

        Span::current().record("tenant_id", tracing::field::display(tenant_id));
        Span::current().record("trace_id", tracing::field::display(trace_id));

        Ok(TenantCtxExtractor(TenantContext { tenant_id, actor, trace_id }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};
    use axum::response::IntoResponse;

    async fn extract(req: Request<()>) -> Result<TenantContext, ApiError> {
        let (mut parts, _) = req.into_parts();
        TenantCtxExtractor::from_request_parts(&mut parts, &()).await.map(|TenantCtxExtractor(ctx)| ctx)
    }

    #[tokio::test]
    async fn reads_tenant_actor_and_trace() {
        let tenant = Uuid::new_v4();
        let user = Uuid::new_v4();
        let trace = Uuid::new_v4();
        let req = Request::builder()
            .header("X-Tenant-ID", tenant.to_string())
            .header("X-User-ID", user.to_string())
            .header("X-User-Name", "ana")
            .header("X-Trace-ID", trace.to_string())
            .body(())
            .unwrap();
        let ctx = extract(req).await.unwrap();
        assert_eq!(ctx.tenant_id, tenant);
        assert_eq!(ctx.actor, Actor { id: Some(user), name: Some("ana".into()) });
        assert_eq!(ctx.trace_id, trace);
    }

    #[tokio::test]
    async fn missing_tenant_is_bad_request() {
        let err = extract(Request::builder().body(()).unwrap()).await.unwrap_err();
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "missing_tenant_id");
    }

    #[tokio::test]
    async fn malformed_tenant_is_bad_request() {
        let req = Request::builder().header("X-Tenant-ID", "acme").body(()).unwrap();
        let err = extract(req).await.unwrap_err();
        assert_eq!(err.code(), "missing_tenant_id");
    }
}
