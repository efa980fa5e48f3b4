use axum::{extract::State, Json};
use bigdecimal::BigDecimal;
use common_http_errors::ApiResult;
use common_pricing::{GroupPricing, ItemPrices, ShippingTerms};
use common_security::TenantCtxExtractor;
use serde::Deserialize;

use super::{amount, percent, rate};
use crate::app::AppState;
use crate::error::BackofficeError;

#[derive(Debug, Deserialize)]
pub struct QuoteItem {
    pub purchase_price: BigDecimal,
    #[serde(default)]
    pub sale_price: Option<BigDecimal>,
}

#[derive(Debug, Deserialize)]
pub struct QuoteRequest {
    pub shipping_cost: BigDecimal,
    pub dollar_price: BigDecimal,
    pub tax_rate: BigDecimal,
    pub items: Vec<QuoteItem>,
}

/// Runs the engine inline on caller-supplied inputs. The whole request is
/// treated as one group.
pub async fn quote(
    State(state): State<AppState>,
    TenantCtxExtractor(ctx): TenantCtxExtractor,
    Json(body): Json<QuoteRequest>,
) -> ApiResult<Json<GroupPricing>> {
    let terms = ShippingTerms::new(
        amount(&ctx, "shipping_cost", &body.shipping_cost)?,
        rate(&ctx, "dollar_price", &body.dollar_price)?,
        percent(&ctx, "tax_rate", &body.tax_rate)?,
    );
    let items = body
        .items
        .iter()
        .map(|item| {
            Ok(ItemPrices::new(
                amount(&ctx, "purchase_price", &item.purchase_price)?,
                item.sale_price.as_ref().map(|p| amount(&ctx, "sale_price", p)).transpose()?,
            ))
        })
        .collect::<ApiResult<Vec<ItemPrices>>>()?;
    state
        .pricing
        .quote(&terms, &items)
        .map(Json)
        .map_err(|e| BackofficeError::from(e).into_api_error(Some(ctx.trace_id)))
}
