use bigdecimal::{BigDecimal, Zero};
use common_money::{round_with, RoundingMode};
use serde::{Deserialize, Serialize};

use crate::allocator::{allocate_shipping_share, ProrationPolicy};
use crate::error::PricingError;
use crate::formulas::{
    compute_profit, compute_profit_percentage, compute_purchase_price_local, compute_sales_tax, ProfitMode,
};
use crate::model::{GroupAggregate, ItemPrices, ShippingTerms};

pub const DEFAULT_IVA_RATE: u32 = 16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingConfig {
    pub proration: ProrationPolicy,
    pub profit_mode: ProfitMode,
    /// Sales tax percentage applied to sale prices.
    pub iva_rate: BigDecimal,
    pub rounding: RoundingMode,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            proration: ProrationPolicy::default(),
            profit_mode: ProfitMode::default(),
            iva_rate: BigDecimal::from(DEFAULT_IVA_RATE),
            rounding: RoundingMode::default(),
        }
    }
}

/// Derived values for one item. Every amount carries 2 decimal places.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingBreakdown {
    pub shipping_cost_share: BigDecimal,
    pub shipping_cost_share_local: BigDecimal,
    pub purchase_price_local: BigDecimal,
    pub sales_tax_local: Option<BigDecimal>,
    pub profit: Option<BigDecimal>,
    pub profit_percentage: Option<BigDecimal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupPricing {
    pub aggregate: GroupAggregate,
    pub items: Vec<PricingBreakdown>,
}

#[derive(Debug, Clone)]
pub struct PricingEngine {
    config: PricingConfig,
}

impl PricingEngine {
    pub fn new(config: PricingConfig) -> Result<Self, PricingError> {
        if config.iva_rate < BigDecimal::zero() {
            return Err(PricingError::InvalidConfig("iva_rate must not be negative"));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &PricingConfig {
        &self.config
    }

    /// Price one item against an aggregate that was read together with it.
    pub fn price_item(
        &self,
        terms: &ShippingTerms,
        aggregate: &GroupAggregate,
        item: &ItemPrices,
    ) -> Result<PricingBreakdown, PricingError> {
        terms.validate()?;
        item.validate()?;
        let rounding = self.config.rounding;

        let share = allocate_shipping_share(
            self.config.proration,
            &terms.shipping_cost,
            aggregate,
            &item.purchase_price,
            rounding,
        );
        let share_local = round_with(&(&share * &terms.dollar_price), rounding);
        let purchase_price_local = compute_purchase_price_local(
            &item.purchase_price,
            &terms.tax_rate,
            &share,
            &terms.dollar_price,
            rounding,
        )?;
        let sales_tax_local = compute_sales_tax(item.sale_price.as_ref(), &self.config.iva_rate, rounding);
        let deducted_tax = match self.config.profit_mode {
            ProfitMode::NetOfSalesTax => sales_tax_local.as_ref(),
            ProfitMode::Gross => None,
        };
        let profit = compute_profit(item.sale_price.as_ref(), &purchase_price_local, deducted_tax, rounding);
        let profit_percentage = compute_profit_percentage(profit.as_ref(), &purchase_price_local, rounding);

        Ok(PricingBreakdown {
            shipping_cost_share: share,
            shipping_cost_share_local: share_local,
            purchase_price_local,
            sales_tax_local,
            profit,
            profit_percentage,
        })
    }

    /// Price every member of a group from one snapshot of it.
    pub fn price_group(&self, terms: &ShippingTerms, items: &[ItemPrices]) -> Result<GroupPricing, PricingError> {
        terms.validate()?;
        let aggregate = GroupAggregate::from_items(items);
        let items = items
            .iter()
            .map(|item| self.price_item(terms, &aggregate, item))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(GroupPricing { aggregate, items })
    }
}

impl Default for PricingEngine {
    fn default() -> Self {
        Self { config: PricingConfig::default() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GroupDefect;
    use std::str::FromStr;

    fn bd(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn terms() -> ShippingTerms {
        ShippingTerms::new(bd("100.00"), bd("20.00"), bd("16"))
    }

    fn aggregate() -> GroupAggregate {
        GroupAggregate::new(3, Some(bd("50.00")))
    }

    #[test]
    fn prices_reference_item() {
        let engine = PricingEngine::default();
        let out = engine
            .price_item(&terms(), &aggregate(), &ItemPrices::new(bd("10.00"), Some(bd("300.00"))))
            .unwrap();
        assert_eq!(out.shipping_cost_share.to_string(), "20.00");
        assert_eq!(out.shipping_cost_share_local.to_string(), "400.00");
        assert_eq!(out.purchase_price_local.to_string(), "632.00");
        assert_eq!(out.sales_tax_local.unwrap().to_string(), "48.00");
        assert_eq!(out.profit.unwrap().to_string(), "-380.00");
        assert_eq!(out.profit_percentage.unwrap().to_string(), "-60.13");
    }

    #[test]
    fn missing_sale_price_leaves_derived_fields_absent() {
        let engine = PricingEngine::default();
        let out = engine.price_item(&terms(), &aggregate(), &ItemPrices::new(bd("10.00"), None)).unwrap();
        assert_eq!(out.purchase_price_local, bd("632.00"));
        assert!(out.sales_tax_local.is_none());
        assert!(out.profit.is_none());
        assert!(out.profit_percentage.is_none());
    }

    #[test]
    fn gross_mode_keeps_sales_tax_out_of_profit() {
        let engine = PricingEngine::new(PricingConfig { profit_mode: ProfitMode::Gross, ..Default::default() }).unwrap();
        let out = engine
            .price_item(&terms(), &aggregate(), &ItemPrices::new(bd("10.00"), Some(bd("300.00"))))
            .unwrap();
        assert_eq!(out.sales_tax_local, Some(bd("48.00")));
        assert_eq!(out.profit, Some(bd("-332.00")));
        assert_eq!(out.profit_percentage, Some(bd("-52.53")));
    }

    #[test]
    fn even_split_prices_reference_item() {
        let engine = PricingEngine::new(PricingConfig { proration: ProrationPolicy::EvenSplit, ..Default::default() })
            .unwrap();
        let out = engine.price_item(&terms(), &aggregate(), &ItemPrices::new(bd("10.00"), None)).unwrap();
        assert_eq!(out.shipping_cost_share, bd("33.33"));
        // (11.6 + 33.33) * 20
        assert_eq!(out.purchase_price_local, bd("898.60"));
    }

    #[test]
    fn zero_dollar_price_is_invalid_group() {
        let engine = PricingEngine::default();
        let bad = ShippingTerms::new(bd("100"), bd("0"), bd("16"));
        let err = engine.price_item(&bad, &aggregate(), &ItemPrices::new(bd("10"), None)).unwrap_err();
        assert_eq!(err, PricingError::InvalidGroup(GroupDefect::NonPositiveDollarPrice));
    }

    #[test]
    fn free_item_has_no_profit_percentage() {
        let engine = PricingEngine::default();
        let terms = ShippingTerms::new(bd("0"), bd("20"), bd("16"));
        let out = engine
            .price_item(&terms, &GroupAggregate::new(1, Some(bd("0"))), &ItemPrices::new(bd("0"), Some(bd("50"))))
            .unwrap();
        assert!(out.purchase_price_local.is_zero());
        assert_eq!(out.profit, Some(bd("42.00")));
        assert!(out.profit_percentage.is_none());
    }

    #[test]
    fn group_pricing_uses_one_aggregate() {
        let engine = PricingEngine::default();
        let items = vec![
            ItemPrices::new(bd("10.00"), Some(bd("300.00"))),
            ItemPrices::new(bd("15.00"), None),
            ItemPrices::new(bd("25.00"), Some(bd("1200.00"))),
        ];
        let priced = engine.price_group(&terms(), &items).unwrap();
        assert_eq!(priced.aggregate, aggregate());
        let shares: Vec<String> = priced.items.iter().map(|p| p.shipping_cost_share.to_string()).collect();
        assert_eq!(shares, vec!["20.00", "30.00", "50.00"]);
    }

    #[test]
    fn empty_group_still_checks_terms() {
        let engine = PricingEngine::default();
        let bad = ShippingTerms::new(bd("100"), bd("0"), bd("16"));
        assert!(matches!(engine.price_group(&bad, &[]), Err(PricingError::InvalidGroup(_))));
    }

    #[test]
    fn pricing_is_idempotent() {
        let engine = PricingEngine::default();
        let item = ItemPrices::new(bd("13.37"), Some(bd("999.99")));
        let first = engine.price_item(&terms(), &aggregate(), &item).unwrap();
        let second = engine.price_item(&terms(), &aggregate(), &item).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn negative_iva_is_rejected() {
        let err = PricingEngine::new(PricingConfig { iva_rate: bd("-1"), ..Default::default() }).unwrap_err();
        assert_eq!(err.code(), "invalid_pricing_config");
    }

    #[test]
    fn breakdown_serializes_amounts_as_strings() {
        let engine = PricingEngine::default();
        let out = engine.price_item(&terms(), &aggregate(), &ItemPrices::new(bd("10.00"), None)).unwrap();
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["purchase_price_local"], "632.00");
        assert!(json["profit"].is_null());
    }
}
