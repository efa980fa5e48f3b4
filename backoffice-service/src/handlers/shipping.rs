use axum::{
    extract::{Path, State},
    Json,
};
use bigdecimal::{BigDecimal, Zero};
use common_http_errors::ApiResult;
use common_pricing::{GroupDefect, PricingError, ShippingTerms};
use common_security::{TenantContext, TenantCtxExtractor};
use serde::Deserialize;
use uuid::Uuid;

use super::{accept, amount, no_fields, percent, price, rate, require_name, Accepted};
use crate::app::AppState;
use crate::error::BackofficeError;
use crate::model::{NewShippingGroup, NewShippingStatus, ShippingGroupPatch, ShippingStatusPatch};

#[derive(Debug, Deserialize)]
pub struct ShippingStatusBody {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ShippingStatusPatchBody {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ShippingGroupBody {
    pub name: String,
    pub shipper_id: Uuid,
    pub status_id: Uuid,
    pub shipping_cost: BigDecimal,
    pub dollar_price: BigDecimal,
    pub tax_rate: BigDecimal,
}

#[derive(Debug, Default, Deserialize)]
pub struct ShippingGroupPatchBody {
    pub name: Option<String>,
    pub shipper_id: Option<Uuid>,
    pub status_id: Option<Uuid>,
    pub shipping_cost: Option<BigDecimal>,
    pub dollar_price: Option<BigDecimal>,
    pub tax_rate: Option<BigDecimal>,
}

fn group_defect(ctx: &TenantContext, defect: GroupDefect) -> common_http_errors::ApiError {
    BackofficeError::from(PricingError::InvalidGroup(defect)).into_api_error(Some(ctx.trace_id))
}

pub async fn list_shipping_statuses(
    State(state): State<AppState>,
    TenantCtxExtractor(ctx): TenantCtxExtractor,
) -> Accepted {
    let store = state.store.clone();
    let tenant_id = ctx.tenant_id;
    accept(&state, &ctx, "list_shipping_statuses", async move { Ok(store.list_shipping_statuses(tenant_id).await?) })
        .await
}

pub async fn get_shipping_status(
    State(state): State<AppState>,
    TenantCtxExtractor(ctx): TenantCtxExtractor,
    Path(id): Path<Uuid>,
) -> Accepted {
    let store = state.store.clone();
    let tenant_id = ctx.tenant_id;
    accept(&state, &ctx, "get_shipping_status", async move { Ok(store.get_shipping_status(tenant_id, id).await?) })
        .await
}

pub async fn find_shipping_status(
    State(state): State<AppState>,
    TenantCtxExtractor(ctx): TenantCtxExtractor,
    Path(name): Path<String>,
) -> Accepted {
    let store = state.store.clone();
    let tenant_id = ctx.tenant_id;
    accept(&state, &ctx, "get_shipping_status", async move {
        Ok(store.find_shipping_status(tenant_id, &name).await?)
    })
    .await
}

pub async fn create_shipping_status(
    State(state): State<AppState>,
    TenantCtxExtractor(ctx): TenantCtxExtractor,
    Json(body): Json<ShippingStatusBody>,
) -> ApiResult<Accepted> {
    let new = NewShippingStatus {
        name: require_name(&ctx, "name", &body.name)?,
        description: body.description.unwrap_or_default(),
    };
    let store = state.store.clone();
    let tenant_id = ctx.tenant_id;
    Ok(accept(&state, &ctx, "create_shipping_status", async move {
        Ok(store.create_shipping_status(tenant_id, new).await?)
    })
    .await)
}

pub async fn update_shipping_status(
    State(state): State<AppState>,
    TenantCtxExtractor(ctx): TenantCtxExtractor,
    Path(id): Path<Uuid>,
    Json(body): Json<ShippingStatusPatchBody>,
) -> ApiResult<Accepted> {
    let patch = ShippingStatusPatch {
        name: body.name.as_deref().map(|n| require_name(&ctx, "name", n)).transpose()?,
        description: body.description,
    };
    if patch.is_empty() {
        return Err(no_fields(&ctx));
    }
    let store = state.store.clone();
    let tenant_id = ctx.tenant_id;
    Ok(accept(&state, &ctx, "update_shipping_status", async move {
        Ok(store.update_shipping_status(tenant_id, id, patch).await?)
    })
    .await)
}

pub async fn delete_shipping_status(
    State(state): State<AppState>,
    TenantCtxExtractor(ctx): TenantCtxExtractor,
    Path(id): Path<Uuid>,
) -> Accepted {
    let store = state.store.clone();
    let tenant_id = ctx.tenant_id;
    accept(&state, &ctx, "delete_shipping_status", async move {
        store.delete_shipping_status(tenant_id, id).await?;
        Ok(serde_json::json!({ "id": id, "deleted": true }))
    })
    .await
}

pub async fn list_shipping_groups(
    State(state): State<AppState>,
    TenantCtxExtractor(ctx): TenantCtxExtractor,
) -> Accepted {
    let store = state.store.clone();
    let tenant_id = ctx.tenant_id;
    accept(&state, &ctx, "list_shipping_groups", async move { Ok(store.list_shipping_groups(tenant_id).await?) }).await
}

pub async fn get_shipping_group(
    State(state): State<AppState>,
    TenantCtxExtractor(ctx): TenantCtxExtractor,
    Path(id): Path<Uuid>,
) -> Accepted {
    let store = state.store.clone();
    let tenant_id = ctx.tenant_id;
    accept(&state, &ctx, "get_shipping_group", async move { Ok(store.get_shipping_group(tenant_id, id).await?) }).await
}

pub async fn find_shipping_group(
    State(state): State<AppState>,
    TenantCtxExtractor(ctx): TenantCtxExtractor,
    Path(name): Path<String>,
) -> Accepted {
    let store = state.store.clone();
    let tenant_id = ctx.tenant_id;
    accept(&state, &ctx, "get_shipping_group", async move {
        Ok(store.find_shipping_group(tenant_id, &name).await?)
    })
    .await
}

pub async fn create_shipping_group(
    State(state): State<AppState>,
    TenantCtxExtractor(ctx): TenantCtxExtractor,
    Json(body): Json<ShippingGroupBody>,
) -> ApiResult<Accepted> {
    let terms = ShippingTerms::new(
        amount(&ctx, "shipping_cost", &body.shipping_cost)?,
        rate(&ctx, "dollar_price", &body.dollar_price)?,
        percent(&ctx, "tax_rate", &body.tax_rate)?,
    );
    terms.validate().map_err(|e| BackofficeError::from(e).into_api_error(Some(ctx.trace_id)))?;
    let new = NewShippingGroup {
        name: require_name(&ctx, "name", &body.name)?,
        shipper_id: body.shipper_id,
        status_id: body.status_id,
        shipping_cost: price(&ctx, "shipping_cost", terms.shipping_cost)?,
        dollar_price: terms.dollar_price,
        tax_rate: terms.tax_rate,
    };
    let store = state.store.clone();
    let tenant_id = ctx.tenant_id;
    Ok(accept(&state, &ctx, "create_shipping_group", async move {
        Ok(store.create_shipping_group(tenant_id, new).await?)
    })
    .await)
}

pub async fn update_shipping_group(
    State(state): State<AppState>,
    TenantCtxExtractor(ctx): TenantCtxExtractor,
    Path(id): Path<Uuid>,
    Json(body): Json<ShippingGroupPatchBody>,
) -> ApiResult<Accepted> {
    if matches!(&body.dollar_price, Some(rate) if *rate <= BigDecimal::zero()) {
        return Err(group_defect(&ctx, GroupDefect::NonPositiveDollarPrice));
    }
    if matches!(&body.shipping_cost, Some(cost) if *cost < BigDecimal::zero()) {
        return Err(group_defect(&ctx, GroupDefect::NegativeShippingCost));
    }
    if matches!(&body.tax_rate, Some(tax) if *tax < BigDecimal::zero()) {
        return Err(group_defect(&ctx, GroupDefect::NegativeTaxRate));
    }
    let patch = ShippingGroupPatch {
        name: body.name.as_deref().map(|n| require_name(&ctx, "name", n)).transpose()?,
        shipper_id: body.shipper_id,
        status_id: body.status_id,
        shipping_cost: body.shipping_cost.map(|c| price(&ctx, "shipping_cost", c)).transpose()?,
        dollar_price: body.dollar_price.as_ref().map(|r| rate(&ctx, "dollar_price", r)).transpose()?,
        tax_rate: body.tax_rate.as_ref().map(|t| percent(&ctx, "tax_rate", t)).transpose()?,
    };
    if patch.is_empty() {
        return Err(no_fields(&ctx));
    }
    let store = state.store.clone();
    let tenant_id = ctx.tenant_id;
    Ok(accept(&state, &ctx, "update_shipping_group", async move {
        Ok(store.update_shipping_group(tenant_id, id, patch).await?)
    })
    .await)
}

pub async fn delete_shipping_group(
    State(state): State<AppState>,
    TenantCtxExtractor(ctx): TenantCtxExtractor,
    Path(id): Path<Uuid>,
) -> Accepted {
    let store = state.store.clone();
    let tenant_id = ctx.tenant_id;
    accept(&state, &ctx, "delete_shipping_group", async move {
        store.delete_shipping_group(tenant_id, id).await?;
        Ok(serde_json::json!({ "id": id, "deleted": true }))
    })
    .await
}

pub async fn shipping_group_pricing(
    State(state): State<AppState>,
    TenantCtxExtractor(ctx): TenantCtxExtractor,
    Path(id): Path<Uuid>,
) -> Accepted {
    let pricing = state.pricing.clone();
    let tenant_id = ctx.tenant_id;
    accept(&state, &ctx, "price_shipping_group", async move { pricing.group_pricing(tenant_id, id).await }).await
}
