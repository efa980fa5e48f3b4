use bigdecimal::{BigDecimal, Zero};
use serde::{Deserialize, Serialize};

use crate::error::{GroupDefect, ItemDefect, PricingError};

/// The pricing-relevant part of a shipping group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingTerms {
    /// Total shared freight, in source currency.
    pub shipping_cost: BigDecimal,
    /// Local currency per unit of source currency.
    pub dollar_price: BigDecimal,
    /// Import tax percentage (16 means 16%).
    pub tax_rate: BigDecimal,
}

impl ShippingTerms {
    pub fn new(shipping_cost: BigDecimal, dollar_price: BigDecimal, tax_rate: BigDecimal) -> Self {
        Self { shipping_cost, dollar_price, tax_rate }
    }

    pub fn validate(&self) -> Result<(), PricingError> {
        if self.dollar_price <= BigDecimal::zero() {
            return Err(PricingError::InvalidGroup(GroupDefect::NonPositiveDollarPrice));
        }
        if self.shipping_cost < BigDecimal::zero() {
            return Err(PricingError::InvalidGroup(GroupDefect::NegativeShippingCost));
        }
        if self.tax_rate < BigDecimal::zero() {
            return Err(PricingError::InvalidGroup(GroupDefect::NegativeTaxRate));
        }
        Ok(())
    }
}

/// Prices of one group member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPrices {
    /// Cost in source currency.
    pub purchase_price: BigDecimal,
    /// Asking price in local currency, absent until one is set.
    #[serde(default)]
    pub sale_price: Option<BigDecimal>,
}

impl ItemPrices {
    pub fn new(purchase_price: BigDecimal, sale_price: Option<BigDecimal>) -> Self {
        Self { purchase_price, sale_price }
    }

    pub fn validate(&self) -> Result<(), PricingError> {
        if self.purchase_price < BigDecimal::zero() {
            return Err(PricingError::InvalidItem(ItemDefect::NegativePurchasePrice));
        }
        if matches!(&self.sale_price, Some(sale) if *sale < BigDecimal::zero()) {
            return Err(PricingError::InvalidItem(ItemDefect::NegativeSalePrice));
        }
        Ok(())
    }
}

/// Live membership figures of a shipping group.
///
/// Always derived from the rows being priced; there is no way to update one
/// incrementally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupAggregate {
    pub item_count: u64,
    pub total_purchase_price: BigDecimal,
}

impl GroupAggregate {
    /// Aggregate reported by a store that computed it in the same read as the items.
    pub fn new(item_count: u64, total_purchase_price: Option<BigDecimal>) -> Self {
        Self { item_count, total_purchase_price: total_purchase_price.unwrap_or_else(BigDecimal::zero) }
    }

    pub fn from_purchase_prices<'a, I>(prices: I) -> Self
    where
        I: IntoIterator<Item = &'a BigDecimal>,
    {
        prices.into_iter().fold(
            Self { item_count: 0, total_purchase_price: BigDecimal::zero() },
            |mut acc, price| {
                acc.item_count += 1;
                acc.total_purchase_price += price;
                acc
            },
        )
    }

    pub fn from_items(items: &[ItemPrices]) -> Self {
        Self::from_purchase_prices(items.iter().map(|item| &item.purchase_price))
    }

    pub fn is_empty(&self) -> bool {
        self.item_count == 0
    }
}
