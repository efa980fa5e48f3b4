use bigdecimal::{BigDecimal, Zero};
use common_money::{round_with, RoundingMode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{GroupDefect, PricingError, UnknownProfitMode};

/// Whether sales tax is taken out of profit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProfitMode {
    /// `sale_price - purchase_price_local`
    Gross,
    /// `sale_price - (purchase_price_local + sales_tax_local)`
    #[default]
    NetOfSalesTax,
}

impl ProfitMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfitMode::Gross => "gross",
            ProfitMode::NetOfSalesTax => "net",
        }
    }
}

impl fmt::Display for ProfitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProfitMode {
    type Err = UnknownProfitMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gross" => Ok(ProfitMode::Gross),
            "net" | "net-of-sales-tax" | "net_of_sales_tax" => Ok(ProfitMode::NetOfSalesTax),
            _ => Err(UnknownProfitMode(s.to_string())),
        }
    }
}

fn percent_of(value: &BigDecimal, rate: &BigDecimal) -> BigDecimal {
    value * rate / BigDecimal::from(100)
}

/// Landed cost in local currency:
/// `(purchase_price * (1 + tax_rate/100) + shipping_share) * dollar_price`.
pub fn compute_purchase_price_local(
    purchase_price: &BigDecimal,
    tax_rate: &BigDecimal,
    shipping_share: &BigDecimal,
    dollar_price: &BigDecimal,
    rounding: RoundingMode,
) -> Result<BigDecimal, PricingError> {
    if *dollar_price <= BigDecimal::zero() {
        return Err(PricingError::InvalidGroup(GroupDefect::NonPositiveDollarPrice));
    }
    let taxed = percent_of(purchase_price, tax_rate) + purchase_price;
    Ok(round_with(&((taxed + shipping_share) * dollar_price), rounding))
}

pub fn compute_sales_tax(
    sale_price: Option<&BigDecimal>,
    iva_rate: &BigDecimal,
    rounding: RoundingMode,
) -> Option<BigDecimal> {
    sale_price.map(|sale| round_with(&percent_of(sale, iva_rate), rounding))
}

/// Absent when there is no sale price. A missing sales tax counts as zero,
/// which is how [`ProfitMode::Gross`] callers get gross profit.
pub fn compute_profit(
    sale_price: Option<&BigDecimal>,
    purchase_price_local: &BigDecimal,
    sales_tax_local: Option<&BigDecimal>,
    rounding: RoundingMode,
) -> Option<BigDecimal> {
    let sale = sale_price?;
    let cost = match sales_tax_local {
        Some(tax) => purchase_price_local + tax,
        None => purchase_price_local.clone(),
    };
    Some(round_with(&(sale - &cost), rounding))
}

/// Profit as a percentage of landed cost. Absent when profit is absent or
/// the landed cost is zero.
pub fn compute_profit_percentage(
    profit: Option<&BigDecimal>,
    purchase_price_local: &BigDecimal,
    rounding: RoundingMode,
) -> Option<BigDecimal> {
    let profit = profit?;
    if purchase_price_local.is_zero() {
        return None;
    }
    Some(round_with(&(profit / purchase_price_local * BigDecimal::from(100)), rounding))
}
