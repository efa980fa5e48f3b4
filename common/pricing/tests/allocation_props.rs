use bigdecimal::{BigDecimal, Zero};
use common_money::RoundingMode;
use common_pricing::{
    allocate_shipping_share, GroupAggregate, ItemPrices, PricingConfig, PricingEngine, ProrationPolicy,
    ShippingTerms,
};
use proptest::prelude::*;

fn cents(v: i64) -> BigDecimal {
    BigDecimal::new(v.into(), 2)
}

proptest! {
    // Rounding each share can drift the total by at most one cent per item.
    #[test]
    fn value_weighted_shares_cover_shipping_cost(
        cost in 0i64..5_000_000,
        prices in prop::collection::vec(1i64..1_000_000, 1..40),
    ) {
        let shipping_cost = cents(cost);
        let purchase: Vec<BigDecimal> = prices.iter().copied().map(cents).collect();
        let aggregate = GroupAggregate::from_purchase_prices(&purchase);
        let total = purchase.iter().fold(BigDecimal::zero(), |acc, pp| {
            acc + allocate_shipping_share(ProrationPolicy::ValueWeighted, &shipping_cost, &aggregate, pp, RoundingMode::HalfUp)
        });
        let tolerance = cents(purchase.len() as i64);
        prop_assert!((total.clone() - &shipping_cost).abs() <= tolerance, "total={total} cost={shipping_cost}");
    }

    #[test]
    fn even_split_shares_cover_shipping_cost(cost in 0i64..5_000_000, count in 1u64..60) {
        let shipping_cost = cents(cost);
        let aggregate = GroupAggregate::new(count, Some(cents(100)));
        let share = allocate_shipping_share(ProrationPolicy::EvenSplit, &shipping_cost, &aggregate, &cents(1), RoundingMode::HalfUp);
        let total = share * BigDecimal::from(count);
        prop_assert!((total - &shipping_cost).abs() <= cents(count as i64));
    }

    #[test]
    fn single_member_even_split_takes_whole_cost(cost in 0i64..5_000_000, pp in 0i64..1_000_000) {
        let aggregate = GroupAggregate::new(1, Some(cents(pp)));
        let share = allocate_shipping_share(ProrationPolicy::EvenSplit, &cents(cost), &aggregate, &cents(pp), RoundingMode::HalfUp);
        prop_assert_eq!(share, cents(cost));
    }

    // A zero total never faults and prices every item.
    #[test]
    fn zero_total_group_prices_without_error(cost in 0i64..1_000_000, count in 0usize..10, dollar in 1i64..5_000) {
        let engine = PricingEngine::default();
        let terms = ShippingTerms::new(cents(cost), cents(dollar), BigDecimal::from(16));
        let items: Vec<ItemPrices> = (0..count).map(|_| ItemPrices::new(BigDecimal::zero(), None)).collect();
        let priced = engine.price_group(&terms, &items).unwrap();
        prop_assert_eq!(priced.items.len(), count);
        for item in &priced.items {
            prop_assert!(item.shipping_cost_share.is_zero());
        }
    }

    #[test]
    fn pricing_twice_gives_same_breakdown(
        pp in 0i64..1_000_000,
        sale in prop::option::of(0i64..10_000_000),
        gross in any::<bool>(),
    ) {
        let config = PricingConfig {
            profit_mode: if gross { common_pricing::ProfitMode::Gross } else { common_pricing::ProfitMode::NetOfSalesTax },
            ..Default::default()
        };
        let engine = PricingEngine::new(config).unwrap();
        let terms = ShippingTerms::new(cents(12_500), cents(1_850), BigDecimal::from(16));
        let aggregate = GroupAggregate::new(4, Some(cents(pp + 50_000)));
        let item = ItemPrices::new(cents(pp), sale.map(cents));
        let first = engine.price_item(&terms, &aggregate, &item).unwrap();
        let second = engine.price_item(&terms, &aggregate, &item).unwrap();
        prop_assert_eq!(first.profit.is_some(), sale.is_some());
        prop_assert_eq!(first, second);
    }
}
