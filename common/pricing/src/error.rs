use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GroupDefect {
    #[error("dollar_price must be greater than zero")]
    NonPositiveDollarPrice,
    #[error("shipping_cost must not be negative")]
    NegativeShippingCost,
    #[error("tax_rate must not be negative")]
    NegativeTaxRate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ItemDefect {
    #[error("purchase_price must not be negative")]
    NegativePurchasePrice,
    #[error("sale_price must not be negative")]
    NegativeSalePrice,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown proration policy '{0}' (expected value-weighted or even)")]
pub struct UnknownProrationPolicy(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown profit mode '{0}' (expected net or gross)")]
pub struct UnknownProfitMode(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PricingError {
    #[error("invalid shipping group: {0}")]
    InvalidGroup(GroupDefect),
    #[error("invalid item: {0}")]
    InvalidItem(ItemDefect),
    #[error("invalid pricing configuration: {0}")]
    InvalidConfig(&'static str),
}

impl PricingError {
    /// Stable machine-readable code used in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            PricingError::InvalidGroup(_) => "invalid_shipping_group",
            PricingError::InvalidItem(_) => "invalid_item",
            PricingError::InvalidConfig(_) => "invalid_pricing_config",
        }
    }
}
