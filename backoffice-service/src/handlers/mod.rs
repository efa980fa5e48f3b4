use axum::{http::StatusCode, Json};
use bigdecimal::{BigDecimal, Zero};
use common_http_errors::{ApiError, ApiResult};
use common_money::{within_precision, Money};
use common_security::TenantContext;
use serde::{Deserialize, Deserializer, Serialize};
use std::future::Future;
use uuid::Uuid;

use crate::app::AppState;
use crate::error::{BackofficeError, BackofficeResult};

pub mod invoices;
pub mod named;
pub mod pricing;
pub mod products;
pub mod shipping;
pub mod tasks;

#[derive(Debug, Serialize, Deserialize)]
pub struct TaskAccepted {
    pub task_id: Uuid,
}

pub type Accepted = (StatusCode, Json<TaskAccepted>);

/// Hand `fut` to the dispatcher and answer `202 {task_id}`.
pub(crate) async fn accept<T, F>(state: &AppState, ctx: &TenantContext, job: &'static str, fut: F) -> Accepted
where
    T: Serialize + Send + 'static,
    F: Future<Output = BackofficeResult<T>> + Send + 'static,
{
    let task_id = state.jobs.submit(ctx.tenant_id, job, fut).await;
    (StatusCode::ACCEPTED, Json(TaskAccepted { task_id }))
}

pub(crate) fn bad_request(ctx: &TenantContext, code: &'static str, message: impl Into<String>) -> ApiError {
    BackofficeError::invalid(code, message).into_api_error(Some(ctx.trace_id))
}

pub(crate) fn require_name(ctx: &TenantContext, field: &str, raw: &str) -> ApiResult<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(bad_request(ctx, "invalid_name", format!("{field} must not be empty")));
    }
    Ok(name.to_string())
}

// Column limits: NUMERIC(12,2) amounts, NUMERIC(12,4) exchange rates and
// NUMERIC(6,2) percentages. Amounts may carry extra decimals; they round to cents.
const AMOUNT_DIGITS: u32 = 10;
const AMOUNT_INPUT_SCALE: i64 = 6;
const RATE_DIGITS: u32 = 8;
const RATE_SCALE: i64 = 4;
const PERCENT_DIGITS: u32 = 4;
const PERCENT_SCALE: i64 = 2;

fn bounded(ctx: &TenantContext, field: &str, value: &BigDecimal, digits: u32, scale: i64) -> ApiResult<BigDecimal> {
    within_precision(value, digits, scale).ok_or_else(|| {
        bad_request(
            ctx,
            "invalid_price",
            format!("{field} must be below 10^{digits} with at most {scale} decimal places"),
        )
    })
}

/// A monetary amount of any sign, before rounding.
pub(crate) fn amount(ctx: &TenantContext, field: &str, value: &BigDecimal) -> ApiResult<BigDecimal> {
    bounded(ctx, field, value, AMOUNT_DIGITS, AMOUNT_INPUT_SCALE)
}

pub(crate) fn rate(ctx: &TenantContext, field: &str, value: &BigDecimal) -> ApiResult<BigDecimal> {
    bounded(ctx, field, value, RATE_DIGITS, RATE_SCALE)
}

pub(crate) fn percent(ctx: &TenantContext, field: &str, value: &BigDecimal) -> ApiResult<BigDecimal> {
    bounded(ctx, field, value, PERCENT_DIGITS, PERCENT_SCALE)
}

/// A non-negative amount rounded to cents.
pub(crate) fn price(ctx: &TenantContext, field: &str, value: BigDecimal) -> ApiResult<Money> {
    let value = amount(ctx, field, &value)?;
    if value < BigDecimal::zero() {
        return Err(bad_request(ctx, "invalid_price", format!("{field} must not be negative")));
    }
    let money = Money::new(value);
    // Rounding can carry 9999999999.995 past the column limit.
    bounded(ctx, field, money.inner(), AMOUNT_DIGITS, 2)?;
    Ok(money)
}

pub(crate) fn no_fields(ctx: &TenantContext) -> ApiError {
    bad_request(ctx, "no_fields_to_update", "request contains no fields to update")
}

/// Distinguish an absent field (`None`) from an explicit `null` (`Some(None)`).
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
