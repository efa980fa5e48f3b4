use axum::{
    extract::{Path, State},
    Json,
};
use bigdecimal::BigDecimal;
use chrono::{NaiveDate, Utc};
use common_http_errors::ApiResult;
use common_security::{TenantContext, TenantCtxExtractor};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{accept, bad_request, price, Accepted};
use crate::app::AppState;
use crate::model::{InvoicePayment, InvoiceSummary, NewInvoice, NewPayment, Product};

#[derive(Debug, Deserialize)]
pub struct PaymentBody {
    pub amount: BigDecimal,
    /// Defaults to today (UTC).
    #[serde(default)]
    pub payment_date: Option<NaiveDate>,
    #[serde(default)]
    pub payment_comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct InvoiceBody {
    pub seller_id: Uuid,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub product_ids: Vec<Uuid>,
    #[serde(default)]
    pub payment: Option<PaymentBody>,
}

#[derive(Debug, Serialize)]
pub struct InvoiceList {
    pub invoices: Vec<InvoiceSummary>,
    pub num_invoices: usize,
}

#[derive(Debug, Serialize)]
pub struct PaymentList {
    pub payments: Vec<InvoicePayment>,
    pub num_payments: usize,
}

#[derive(Debug, Serialize)]
pub struct InvoiceProducts {
    pub products: Vec<Product>,
    pub num_products: usize,
}

fn payment(ctx: &TenantContext, body: PaymentBody) -> ApiResult<NewPayment> {
    let amount = price(ctx, "amount", body.amount)
        .map_err(|_| bad_request(ctx, "invalid_payment_amount", "amount must be a positive amount below 10^10"))?;
    // Zero, or below one cent once rounded.
    if amount.is_zero() {
        return Err(bad_request(ctx, "invalid_payment_amount", "amount must be at least 0.01"));
    }
    Ok(NewPayment {
        amount,
        payment_date: body.payment_date.unwrap_or_else(|| Utc::now().date_naive()),
        payment_comment: body.payment_comment,
    })
}

pub async fn list_invoices(State(state): State<AppState>, TenantCtxExtractor(ctx): TenantCtxExtractor) -> Accepted {
    let store = state.store.clone();
    let tenant_id = ctx.tenant_id;
    accept(&state, &ctx, "list_invoices", async move {
        let invoices = store.list_invoices(tenant_id).await?;
        Ok(InvoiceList { num_invoices: invoices.len(), invoices })
    })
    .await
}

pub async fn get_invoice(
    State(state): State<AppState>,
    TenantCtxExtractor(ctx): TenantCtxExtractor,
    Path(id): Path<Uuid>,
) -> Accepted {
    let store = state.store.clone();
    let tenant_id = ctx.tenant_id;
    accept(&state, &ctx, "get_invoice", async move { Ok(store.get_invoice(tenant_id, id).await?) }).await
}

pub async fn create_invoice(
    State(state): State<AppState>,
    TenantCtxExtractor(ctx): TenantCtxExtractor,
    Json(body): Json<InvoiceBody>,
) -> ApiResult<Accepted> {
    let new = NewInvoice {
        seller_id: body.seller_id,
        notes: body.notes,
        product_ids: body.product_ids,
        payment: body.payment.map(|p| payment(&ctx, p)).transpose()?,
    };
    let store = state.store.clone();
    let tenant_id = ctx.tenant_id;
    Ok(accept(&state, &ctx, "create_invoice", async move { Ok(store.create_invoice(tenant_id, new).await?) }).await)
}

pub async fn add_payment(
    State(state): State<AppState>,
    TenantCtxExtractor(ctx): TenantCtxExtractor,
    Path(id): Path<Uuid>,
    Json(body): Json<PaymentBody>,
) -> ApiResult<Accepted> {
    let new = payment(&ctx, body)?;
    let store = state.store.clone();
    let tenant_id = ctx.tenant_id;
    Ok(accept(&state, &ctx, "add_invoice_payment", async move { Ok(store.add_payment(tenant_id, id, new).await?) })
        .await)
}

pub async fn list_payments(
    State(state): State<AppState>,
    TenantCtxExtractor(ctx): TenantCtxExtractor,
    Path(id): Path<Uuid>,
) -> Accepted {
    let store = state.store.clone();
    let tenant_id = ctx.tenant_id;
    accept(&state, &ctx, "list_invoice_payments", async move {
        let payments = store.list_payments(tenant_id, id).await?;
        Ok(PaymentList { num_payments: payments.len(), payments })
    })
    .await
}

pub async fn list_products(
    State(state): State<AppState>,
    TenantCtxExtractor(ctx): TenantCtxExtractor,
    Path(id): Path<Uuid>,
) -> Accepted {
    let store = state.store.clone();
    let tenant_id = ctx.tenant_id;
    accept(&state, &ctx, "list_invoice_products", async move {
        let products = store.list_invoice_products(tenant_id, id).await?;
        Ok(InvoiceProducts { num_products: products.len(), products })
    })
    .await
}
