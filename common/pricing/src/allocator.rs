use bigdecimal::{BigDecimal, Zero};
use common_money::{round_with, RoundingMode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::UnknownProrationPolicy;
use crate::model::GroupAggregate;

/// How shared freight is split between the members of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProrationPolicy {
    /// `shipping_cost / item_count`; every member pays the same.
    EvenSplit,
    /// `shipping_cost / total_purchase_price * purchase_price`; members pay
    /// in proportion to their own cost.
    #[default]
    ValueWeighted,
}

impl ProrationPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProrationPolicy::EvenSplit => "even",
            ProrationPolicy::ValueWeighted => "value-weighted",
        }
    }
}

impl fmt::Display for ProrationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProrationPolicy {
    type Err = UnknownProrationPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "even" | "even-split" | "even_split" => Ok(ProrationPolicy::EvenSplit),
            "value-weighted" | "value_weighted" | "weighted" => Ok(ProrationPolicy::ValueWeighted),
            _ => Err(UnknownProrationPolicy(s.to_string())),
        }
    }
}

// A zero (or absent) aggregate divides by one so the formula never faults.
fn divisor(policy: ProrationPolicy, aggregate: &GroupAggregate) -> BigDecimal {
    let raw = match policy {
        ProrationPolicy::EvenSplit => BigDecimal::from(aggregate.item_count),
        ProrationPolicy::ValueWeighted => aggregate.total_purchase_price.clone(),
    };
    if raw.is_zero() {
        BigDecimal::from(1)
    } else {
        raw
    }
}

/// Share of the group's freight carried by one item, in source currency,
/// rounded to 2 decimal places.
pub fn allocate_shipping_share(
    policy: ProrationPolicy,
    shipping_cost: &BigDecimal,
    aggregate: &GroupAggregate,
    item_purchase_price: &BigDecimal,
    rounding: RoundingMode,
) -> BigDecimal {
    let divisor = divisor(policy, aggregate);
    let share = match policy {
        ProrationPolicy::EvenSplit => shipping_cost / &divisor,
        ProrationPolicy::ValueWeighted => (shipping_cost / &divisor) * item_purchase_price,
    };
    round_with(&share, rounding)
}
