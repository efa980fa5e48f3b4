//! Feeds store reads into the pricing engine.
//!
//! Aggregates are always taken from the same read as the rows being priced
//! and are never kept between calls.

use common_observability::BackofficeMetrics;
use common_pricing::{GroupPricing, ItemPrices, PricingEngine, PricingError, ShippingTerms};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::BackofficeResult;
use crate::model::{Entity, GroupPricingView, PricedRow, ProductDetail, ProductFilter};
use crate::store::{Store, StoreError};

#[derive(Clone)]
pub struct PricingComposer {
    store: Arc<dyn Store>,
    engine: PricingEngine,
    metrics: Arc<BackofficeMetrics>,
}

impl PricingComposer {
    pub fn new(store: Arc<dyn Store>, engine: PricingEngine, metrics: Arc<BackofficeMetrics>) -> Self {
        Self { store, engine, metrics }
    }

    pub fn engine(&self) -> &PricingEngine {
        &self.engine
    }

    fn observe<T>(&self, priced: usize, outcome: Result<T, PricingError>) -> Result<T, PricingError> {
        match &outcome {
            Ok(_) => self.metrics.items_priced_total.inc_by(priced as u64),
            Err(PricingError::InvalidGroup(defect)) => {
                self.metrics.invalid_group_total.inc();
                tracing::warn!(%defect, "refusing to price against an invalid shipping group");
            }
            Err(_) => {}
        }
        outcome
    }

    fn detail(&self, row: PricedRow) -> Result<ProductDetail, PricingError> {
        let pricing = match &row.group {
            Some((terms, aggregate)) => Some(self.engine.price_item(terms, aggregate, &row.product.prices())?),
            None => None,
        };
        Ok(ProductDetail { product: row.product, pricing })
    }

    /// Products matching `filter` with their breakdowns. Products outside any
    /// group carry no pricing.
    #[tracing::instrument(skip(self))]
    pub async fn product_details(&self, tenant_id: Uuid, filter: &ProductFilter) -> BackofficeResult<Vec<ProductDetail>> {
        let rows = self.store.priced_products(tenant_id, filter).await?;
        let priced = rows.iter().filter(|row| row.group.is_some()).count();
        let details = rows.into_iter().map(|row| self.detail(row)).collect::<Result<Vec<_>, _>>();
        Ok(self.observe(priced, details)?)
    }

    pub async fn product_detail(&self, tenant_id: Uuid, product_id: Uuid) -> BackofficeResult<ProductDetail> {
        let filter = ProductFilter { id: Some(product_id), ..ProductFilter::default() };
        self.first_match(tenant_id, &filter).await
    }

    pub async fn product_by_label(
        &self,
        tenant_id: Uuid,
        shipping_group: &str,
        shipping_label: &str,
    ) -> BackofficeResult<ProductDetail> {
        let filter = ProductFilter {
            id: None,
            shipping_group: Some(shipping_group.to_string()),
            shipping_label: Some(shipping_label.to_string()),
        };
        self.first_match(tenant_id, &filter).await
    }

    async fn first_match(&self, tenant_id: Uuid, filter: &ProductFilter) -> BackofficeResult<ProductDetail> {
        self.product_details(tenant_id, filter)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(Entity::Product).into())
    }

    /// Every member of one group priced from a single snapshot.
    #[tracing::instrument(skip(self))]
    pub async fn group_pricing(&self, tenant_id: Uuid, shipping_group_id: Uuid) -> BackofficeResult<GroupPricingView> {
        let snapshot = self.store.pricing_snapshot(tenant_id, shipping_group_id).await?;
        let prices: Vec<ItemPrices> = snapshot.items.iter().map(|p| p.prices()).collect();
        let priced = self.observe(prices.len(), self.engine.price_group(&snapshot.group.terms(), &prices))?;

        let items = snapshot
            .items
            .into_iter()
            .zip(priced.items)
            .map(|(product, breakdown)| ProductDetail { product, pricing: Some(breakdown) })
            .collect();
        Ok(GroupPricingView {
            group: snapshot.group,
            item_count: priced.aggregate.item_count,
            total_purchase_price: priced.aggregate.total_purchase_price,
            items,
        })
    }

    /// Price caller-supplied inputs without touching the store.
    pub fn quote(&self, terms: &ShippingTerms, items: &[ItemPrices]) -> Result<GroupPricing, PricingError> {
        self.observe(items.len(), self.engine.price_group(terms, items))
    }
}
