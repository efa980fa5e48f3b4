use axum::{
    extract::{Path, Query, State},
    Json,
};
use bigdecimal::BigDecimal;
use common_http_errors::ApiResult;
use common_security::TenantCtxExtractor;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{accept, bad_request, no_fields, nullable, price, require_name, Accepted};
use crate::app::AppState;
use crate::model::{Catalog, NewProduct, ProductDetail, ProductFilter, ProductPatch};

#[derive(Debug, Serialize)]
pub struct ProductList {
    pub products: Vec<ProductDetail>,
    pub num_products: usize,
}

/// References are given by name and resolved inside the job.
#[derive(Debug, Deserialize)]
pub struct ProductBody {
    pub description: String,
    pub shipping_label: String,
    pub purchase_price: BigDecimal,
    #[serde(default)]
    pub sale_price: Option<BigDecimal>,
    pub location: String,
    pub status: String,
    #[serde(default)]
    pub shipping_group: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductPatchBody {
    pub description: Option<String>,
    pub shipping_label: Option<String>,
    pub purchase_price: Option<BigDecimal>,
    #[serde(default, deserialize_with = "nullable")]
    pub sale_price: Option<Option<BigDecimal>>,
    pub location: Option<String>,
    pub status: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub shipping_group: Option<Option<String>>,
}

#[derive(Debug, Deserialize)]
pub struct SalePriceBody {
    pub shipping_group: String,
    pub shipping_label: String,
    pub sale_price: BigDecimal,
}

#[derive(Debug, Default, Deserialize)]
pub struct LookupQuery {
    pub shipping_group: Option<String>,
    pub shipping_label: Option<String>,
}

pub async fn list_products(
    State(state): State<AppState>,
    TenantCtxExtractor(ctx): TenantCtxExtractor,
    Query(filter): Query<ProductFilter>,
) -> Accepted {
    let pricing = state.pricing.clone();
    let tenant_id = ctx.tenant_id;
    accept(&state, &ctx, "list_products", async move {
        let products = pricing.product_details(tenant_id, &filter).await?;
        Ok(ProductList { num_products: products.len(), products })
    })
    .await
}

pub async fn get_product(
    State(state): State<AppState>,
    TenantCtxExtractor(ctx): TenantCtxExtractor,
    Path(id): Path<Uuid>,
) -> Accepted {
    let pricing = state.pricing.clone();
    let tenant_id = ctx.tenant_id;
    accept(&state, &ctx, "get_product", async move { pricing.product_detail(tenant_id, id).await }).await
}

pub async fn lookup_product(
    State(state): State<AppState>,
    TenantCtxExtractor(ctx): TenantCtxExtractor,
    Query(query): Query<LookupQuery>,
) -> ApiResult<Accepted> {
    let (Some(group), Some(label)) = (query.shipping_group, query.shipping_label) else {
        return Err(bad_request(&ctx, "invalid_lookup", "shipping_group and shipping_label are both required"));
    };
    let pricing = state.pricing.clone();
    let tenant_id = ctx.tenant_id;
    Ok(accept(&state, &ctx, "get_product", async move { pricing.product_by_label(tenant_id, &group, &label).await })
        .await)
}

pub async fn create_product(
    State(state): State<AppState>,
    TenantCtxExtractor(ctx): TenantCtxExtractor,
    Json(body): Json<ProductBody>,
) -> ApiResult<Accepted> {
    let ProductBody { description, shipping_label, purchase_price, sale_price, location, status, shipping_group } = body;
    let description = require_name(&ctx, "description", &description)?;
    let shipping_label = require_name(&ctx, "shipping_label", &shipping_label)?;
    let purchase_price = price(&ctx, "purchase_price", purchase_price)?;
    let sale_price = sale_price.map(|s| price(&ctx, "sale_price", s)).transpose()?;

    let store = state.store.clone();
    let pricing = state.pricing.clone();
    let tenant_id = ctx.tenant_id;
    Ok(accept(&state, &ctx, "create_product", async move {
        let location = store.find_named(tenant_id, Catalog::Location, &location).await?;
        let status = store.find_named(tenant_id, Catalog::ProductStatus, &status).await?;
        let shipping_group_id = match &shipping_group {
            Some(name) => Some(store.find_shipping_group(tenant_id, name).await?.id),
            None => None,
        };
        let product = store
            .create_product(
                tenant_id,
                NewProduct {
                    description,
                    shipping_label,
                    purchase_price,
                    sale_price,
                    location_id: location.id,
                    status_id: status.id,
                    shipping_group_id,
                },
            )
            .await?;
        pricing.product_detail(tenant_id, product.id).await
    })
    .await)
}

pub async fn update_product(
    State(state): State<AppState>,
    TenantCtxExtractor(ctx): TenantCtxExtractor,
    Path(id): Path<Uuid>,
    Json(body): Json<ProductPatchBody>,
) -> ApiResult<Accepted> {
    let ProductPatchBody { description, shipping_label, purchase_price, sale_price, location, status, shipping_group } =
        body;
    let description = description.as_deref().map(|d| require_name(&ctx, "description", d)).transpose()?;
    let shipping_label = shipping_label.as_deref().map(|l| require_name(&ctx, "shipping_label", l)).transpose()?;
    let purchase_price = purchase_price.map(|p| price(&ctx, "purchase_price", p)).transpose()?;
    let sale_price = match sale_price {
        Some(Some(s)) => Some(Some(price(&ctx, "sale_price", s)?)),
        Some(None) => Some(None),
        None => None,
    };
    let nothing_to_do = description.is_none()
        && shipping_label.is_none()
        && purchase_price.is_none()
        && sale_price.is_none()
        && location.is_none()
        && status.is_none()
        && shipping_group.is_none();
    if nothing_to_do {
        return Err(no_fields(&ctx));
    }

    let store = state.store.clone();
    let pricing = state.pricing.clone();
    let tenant_id = ctx.tenant_id;
    Ok(accept(&state, &ctx, "update_product", async move {
        let mut patch = ProductPatch { description, shipping_label, purchase_price, sale_price, ..ProductPatch::default() };
        if let Some(name) = &location {
            patch.location_id = Some(store.find_named(tenant_id, Catalog::Location, name).await?.id);
        }
        if let Some(name) = &status {
            patch.status_id = Some(store.find_named(tenant_id, Catalog::ProductStatus, name).await?.id);
        }
        patch.shipping_group_id = match &shipping_group {
            Some(Some(name)) => Some(Some(store.find_shipping_group(tenant_id, name).await?.id)),
            Some(None) => Some(None),
            None => None,
        };
        store.update_product(tenant_id, id, patch).await?;
        pricing.product_detail(tenant_id, id).await
    })
    .await)
}

pub async fn set_sale_price(
    State(state): State<AppState>,
    TenantCtxExtractor(ctx): TenantCtxExtractor,
    Json(body): Json<SalePriceBody>,
) -> ApiResult<Accepted> {
    let SalePriceBody { shipping_group, shipping_label, sale_price } = body;
    let sale_price = price(&ctx, "sale_price", sale_price)?;
    let store = state.store.clone();
    let pricing = state.pricing.clone();
    let tenant_id = ctx.tenant_id;
    Ok(accept(&state, &ctx, "set_sale_price", async move {
        let group = store.find_shipping_group(tenant_id, &shipping_group).await?;
        let product = store.set_sale_price(tenant_id, group.id, &shipping_label, sale_price).await?;
        pricing.product_detail(tenant_id, product.id).await
    })
    .await)
}

pub async fn delete_product(
    State(state): State<AppState>,
    TenantCtxExtractor(ctx): TenantCtxExtractor,
    Path(id): Path<Uuid>,
) -> Accepted {
    let store = state.store.clone();
    let tenant_id = ctx.tenant_id;
    accept(&state, &ctx, "delete_product", async move {
        store.delete_product(tenant_id, id).await?;
        Ok(serde_json::json!({ "id": id, "deleted": true }))
    })
    .await
}
