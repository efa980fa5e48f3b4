use axum::{
    extract::State,
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, StatusCode,
    },
    middleware,
    routing::{get, post, put},
    Router,
};
use common_http_errors::{http_error_metrics, HttpErrorMetrics};
use common_observability::BackofficeMetrics;
use common_pricing::{PricingEngine, PricingError};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::ServiceConfig;
use crate::handlers::{invoices, named, pricing, products, shipping, tasks};
use crate::jobs::JobDispatcher;
use crate::model::Catalog;
use crate::pricing_query::PricingComposer;
use crate::store::Store;

pub const SERVICE_NAME: &str = "backoffice-service";

const CATALOG_ROUTES: [(&str, Catalog); 4] = [
    ("/sellers", Catalog::Seller),
    ("/shippers", Catalog::Shipper),
    ("/locations", Catalog::Location),
    ("/product-statuses", Catalog::ProductStatus),
];

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub jobs: JobDispatcher,
    pub pricing: PricingComposer,
    pub metrics: Arc<BackofficeMetrics>,
    pub task_poll_interval: Duration,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        config: &ServiceConfig,
        metrics: Arc<BackofficeMetrics>,
    ) -> Result<Self, PricingError> {
        let engine = PricingEngine::new(config.pricing.clone())?;
        Ok(Self {
            jobs: JobDispatcher::new(metrics.clone(), config.job_result_ttl),
            pricing: PricingComposer::new(store.clone(), engine, metrics.clone()),
            store,
            metrics,
            task_poll_interval: config.task_poll_interval,
        })
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn metrics_endpoint(State(state): State<AppState>) -> (StatusCode, String) {
    match state.metrics.render() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, format!("metrics encode error: {e}")),
    }
}

pub fn build_router(state: AppState) -> Router {
    let error_metrics = HttpErrorMetrics::new(SERVICE_NAME, state.metrics.http_errors_total.clone());

    let mut router = Router::new()
        .route("/healthz", get(health))
        .route("/metrics", get(metrics_endpoint));
    for (base, catalog) in CATALOG_ROUTES {
        router = named::routes(router, base, catalog);
    }

    router
        .route(
            "/shipping-statuses",
            get(shipping::list_shipping_statuses).post(shipping::create_shipping_status),
        )
        .route("/shipping-statuses/by-name/:name", get(shipping::find_shipping_status))
        .route(
            "/shipping-statuses/:id",
            get(shipping::get_shipping_status)
                .patch(shipping::update_shipping_status)
                .delete(shipping::delete_shipping_status),
        )
        .route(
            "/shipping-groups",
            get(shipping::list_shipping_groups).post(shipping::create_shipping_group),
        )
        .route("/shipping-groups/by-name/:name", get(shipping::find_shipping_group))
        .route(
            "/shipping-groups/:id",
            get(shipping::get_shipping_group)
                .patch(shipping::update_shipping_group)
                .delete(shipping::delete_shipping_group),
        )
        .route("/shipping-groups/:id/pricing", get(shipping::shipping_group_pricing))
        .route("/products", get(products::list_products).post(products::create_product))
        .route("/products/lookup", get(products::lookup_product))
        .route("/products/sale-price", put(products::set_sale_price))
        .route(
            "/products/:id",
            get(products::get_product)
                .patch(products::update_product)
                .delete(products::delete_product),
        )
        .route("/invoices", get(invoices::list_invoices).post(invoices::create_invoice))
        .route("/invoices/:id", get(invoices::get_invoice))
        .route(
            "/invoices/:id/payments",
            get(invoices::list_payments).post(invoices::add_payment),
        )
        .route("/invoices/:id/products", get(invoices::list_products))
        .route("/pricing/quote", post(pricing::quote))
        .route("/tasks/:task_id", get(tasks::get_task))
        .route("/ws/task/:task_id", get(tasks::task_socket))
        .with_state(state)
        .layer(middleware::from_fn_with_state(error_metrics, http_error_metrics))
}

pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(
            allowed_origins
                .iter()
                .filter_map(|origin| origin.parse::<HeaderValue>().ok())
                .collect::<Vec<_>>(),
        ))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            ACCEPT,
            CONTENT_TYPE,
            HeaderName::from_static("x-tenant-id"),
            HeaderName::from_static("x-user-id"),
            HeaderName::from_static("x-user-name"),
            HeaderName::from_static("x-trace-id"),
        ])
}
