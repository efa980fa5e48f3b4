//! Landed-cost pricing for shipping groups.
//!
//! A shipping group shares one freight invoice, one exchange rate and one
//! import tax rate between all of its items. This crate splits the freight
//! across the members ([`allocator`]), turns each item's purchase price into
//! a landed local-currency cost and derives sales tax, profit and profit
//! percentage ([`formulas`], [`engine`]).
//!
//! Everything here is pure: callers hand in a snapshot of the group and its
//! items and get values back. Nothing is cached between calls.

pub mod allocator;
pub mod engine;
pub mod error;
pub mod formulas;
pub mod model;

pub use allocator::{allocate_shipping_share, ProrationPolicy};
pub use engine::{GroupPricing, PricingBreakdown, PricingConfig, PricingEngine, DEFAULT_IVA_RATE};
pub use error::{GroupDefect, ItemDefect, PricingError, UnknownProfitMode, UnknownProrationPolicy};
pub use formulas::{
    compute_profit, compute_profit_percentage, compute_purchase_price_local, compute_sales_tax, ProfitMode,
};
pub use model::{GroupAggregate, ItemPrices, ShippingTerms};
