#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use backoffice_service::store::MemoryStore;
use backoffice_service::{build_router, AppState, ServiceConfig};
use common_observability::BackofficeMetrics;
use common_security::test_request_headers;
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

pub struct Reply {
    pub status: StatusCode,
    pub error_code: Option<String>,
    pub body: Value,
}

pub fn test_app() -> TestApp {
    let config = ServiceConfig { task_poll_interval: Duration::from_millis(20), ..ServiceConfig::default() };
    let metrics = Arc::new(BackofficeMetrics::new().expect("metrics"));
    let state = AppState::new(Arc::new(MemoryStore::new()), &config, metrics).expect("state");
    TestApp { router: build_router(state.clone()), state }
}

impl TestApp {
    pub async fn send(&self, method: Method, uri: &str, tenant: Option<Uuid>, body: Option<Value>) -> Reply {
        let mut req = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(json) => Body::from(json.to_string()),
                None => Body::empty(),
            })
            .expect("request");
        if let Some(tenant) = tenant {
            test_request_headers!(req, tenant = &tenant.to_string());
        }
        let resp = self.router.clone().oneshot(req).await.expect("router is infallible");
        let status = resp.status();
        let error_code = resp
            .headers()
            .get("x-error-code")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = resp.into_body().collect().await.expect("body").to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        Reply { status, error_code, body }
    }

    /// Submit a job through the API and return its finished task snapshot as
    /// read back from `GET /tasks/:task_id`.
    pub async fn run(&self, method: Method, uri: &str, tenant: Uuid, body: Option<Value>) -> Value {
        let accepted = self.send(method, uri, Some(tenant), body).await;
        assert_eq!(accepted.status, StatusCode::ACCEPTED, "submit {uri}: {}", accepted.body);
        let task_id: Uuid = accepted.body["task_id"].as_str().and_then(|s| s.parse().ok()).expect("task_id");
        self.state.jobs.wait(tenant, task_id).await.expect("task visible to its tenant");
        let polled = self.send(Method::GET, &format!("/tasks/{task_id}"), Some(tenant), None).await;
        assert_eq!(polled.status, StatusCode::OK);
        polled.body
    }

    /// Like [`TestApp::run`] but insists the job succeeded and returns its result.
    pub async fn ok(&self, method: Method, uri: &str, tenant: Uuid, body: Option<Value>) -> Value {
        let task = self.run(method, uri, tenant, body).await;
        assert_eq!(task["state"], "succeeded", "task for {uri} failed: {task}");
        task["result"].clone()
    }

    /// Like [`TestApp::run`] but insists the job failed and returns its error code.
    pub async fn failed(&self, method: Method, uri: &str, tenant: Uuid, body: Option<Value>) -> String {
        let task = self.run(method, uri, tenant, body).await;
        assert_eq!(task["state"], "failed", "task for {uri} unexpectedly succeeded: {task}");
        task["error"]["code"].as_str().expect("error code").to_string()
    }
}

pub struct Fixture {
    pub tenant: Uuid,
    pub shipper_id: String,
    pub shipping_status_id: String,
    pub group_id: String,
}

/// A tenant with one shipper, one shipping status, a location named
/// `Warehouse`, a product status named `Available` and shipping group `G1`
/// (freight 100.00, rate 20.00, tax 16%).
pub async fn seed_group(app: &TestApp) -> Fixture {
    let tenant = Uuid::new_v4();
    let shipper = app.ok(Method::POST, "/shippers", tenant, Some(serde_json::json!({"name": "DHL"}))).await;
    let status = app
        .ok(
            Method::POST,
            "/shipping-statuses",
            tenant,
            Some(serde_json::json!({"name": "In transit", "description": "left the origin warehouse"})),
        )
        .await;
    app.ok(Method::POST, "/locations", tenant, Some(serde_json::json!({"name": "Warehouse"}))).await;
    app.ok(Method::POST, "/product-statuses", tenant, Some(serde_json::json!({"name": "Available"}))).await;
    let group = app
        .ok(
            Method::POST,
            "/shipping-groups",
            tenant,
            Some(serde_json::json!({
                "name": "G1",
                "shipper_id": shipper["id"],
                "status_id": status["id"],
                "shipping_cost": "100.00",
                "dollar_price": "20.00",
                "tax_rate": "16"
            })),
        )
        .await;
    Fixture {
        tenant,
        shipper_id: shipper["id"].as_str().expect("id").to_string(),
        shipping_status_id: status["id"].as_str().expect("id").to_string(),
        group_id: group["id"].as_str().expect("id").to_string(),
    }
}

pub async fn add_product(app: &TestApp, tenant: Uuid, label: &str, purchase_price: &str, sale_price: Option<&str>) -> Value {
    app.ok(
        Method::POST,
        "/products",
        tenant,
        Some(serde_json::json!({
            "description": format!("item {label}"),
            "shipping_label": label,
            "purchase_price": purchase_price,
            "sale_price": sale_price,
            "location": "Warehouse",
            "status": "Available",
            "shipping_group": "G1"
        })),
    )
    .await
}
