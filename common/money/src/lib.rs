use bigdecimal::{BigDecimal, ToPrimitive, Zero};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::Add;
use std::str::FromStr;
use std::sync::{Once, OnceLock};

/// Number of decimal places every monetary value is carried at.
pub const MONEY_SCALE: i64 = 2;

/// How a value is reduced to [`MONEY_SCALE`] decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoundingMode {
    /// Ties move away from zero (1.005 -> 1.01, -1.005 -> -1.01).
    #[default]
    HalfUp,
    /// Ties move to the even cent (1.005 -> 1.00, 1.015 -> 1.02).
    Bankers,
    /// Extra digits are dropped toward zero.
    Truncate,
}

impl RoundingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoundingMode::HalfUp => "half-up",
            RoundingMode::Bankers => "bankers",
            RoundingMode::Truncate => "truncate",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown rounding mode '{0}' (expected half-up, bankers or truncate)")]
pub struct UnknownRoundingMode(pub String);

impl FromStr for RoundingMode {
    type Err = UnknownRoundingMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "half-up" | "half_up" | "halfup" => Ok(RoundingMode::HalfUp),
            "bankers" | "half-even" | "half_even" => Ok(RoundingMode::Bankers),
            "truncate" | "down" => Ok(RoundingMode::Truncate),
            _ => Err(UnknownRoundingMode(s.to_string())),
        }
    }
}

impl fmt::Display for RoundingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static ROUNDING_MODE: OnceLock<RoundingMode> = OnceLock::new();

/// Resolve the process-wide rounding mode from `MONEY_ROUNDING`.
///
/// The first call wins; later changes to the environment are ignored so that
/// every value produced by one process is rounded the same way.
pub fn init_rounding_mode_from_env() -> RoundingMode {
    *ROUNDING_MODE.get_or_init(|| match std::env::var("MONEY_ROUNDING") {
        Ok(raw) => raw.parse().unwrap_or_else(|err: UnknownRoundingMode| {
            tracing::warn!(error = %err, "falling back to half-up rounding");
            RoundingMode::HalfUp
        }),
        Err(_) => RoundingMode::HalfUp,
    })
}

/// Pin the process-wide rounding mode explicitly. Returns `false` when a mode
/// was already resolved.
pub fn set_rounding_mode(mode: RoundingMode) -> bool {
    ROUNDING_MODE.set(mode).is_ok()
}

pub fn rounding_mode() -> RoundingMode {
    init_rounding_mode_from_env()
}

pub fn log_rounding_mode_once() {
    static LOGGED: Once = Once::new();
    LOGGED.call_once(|| {
        tracing::info!(mode = rounding_mode().as_str(), scale = MONEY_SCALE, "money rounding configured");
    });
}

fn is_odd_unit(truncated: &BigDecimal, unit: &BigDecimal) -> bool {
    let units = truncated / unit;
    let halves = units / BigDecimal::from(2);
    halves.with_scale(0) != halves
}

/// Round `value` to `scale` decimal places with an explicit mode.
pub fn round_to_scale(value: &BigDecimal, scale: i64, mode: RoundingMode) -> BigDecimal {
    // with_scale drops digits toward zero
    let truncated = value.with_scale(scale);
    let remainder = value - &truncated;
    if remainder.is_zero() || mode == RoundingMode::Truncate {
        return truncated;
    }
    let unit = BigDecimal::new(1.into(), scale);
    let half = BigDecimal::new(5.into(), scale + 1);
    let magnitude = remainder.abs();
    let away_from_zero = match mode {
        RoundingMode::HalfUp => magnitude >= half,
        RoundingMode::Bankers => magnitude > half || (magnitude == half && is_odd_unit(&truncated, &unit)),
        RoundingMode::Truncate => false,
    };
    if !away_from_zero {
        truncated
    } else if *value < BigDecimal::zero() {
        truncated - unit
    } else {
        truncated + unit
    }
}

/// Round to 2 decimal places with an explicit mode.
pub fn round_with(value: &BigDecimal, mode: RoundingMode) -> BigDecimal {
    round_to_scale(value, MONEY_SCALE, mode)
}

/// Normalize a monetary value to 2 decimal places using the process rounding mode.
pub fn normalize_scale(value: &BigDecimal) -> BigDecimal {
    round_with(value, rounding_mode())
}

/// Check that `value` fits a fixed-point column with `integer_digits` digits
/// before the point and at most `max_scale` after it, and return it with
/// trailing zeros stripped.
///
/// Only the mantissa and exponent are inspected, so inputs such as `1e20000000`
/// are refused without being expanded.
pub fn within_precision(value: &BigDecimal, integer_digits: u32, max_scale: i64) -> Option<BigDecimal> {
    let (mantissa, exponent) = value.as_bigint_and_exponent();
    let mut digits = mantissa.to_i128()?;
    if digits == 0 {
        return Some(BigDecimal::zero());
    }
    let mut scale = exponent;
    while digits % 10 == 0 {
        digits /= 10;
        scale -= 1;
    }
    if scale > max_scale {
        return None;
    }
    // |digits| * 10^-scale < 10^integer_digits
    let headroom = i64::from(integer_digits).checked_add(scale)?;
    if headroom <= 0 || headroom > 38 {
        return None;
    }
    if digits.unsigned_abs() >= 10u128.pow(headroom as u32) {
        return None;
    }
    Some(BigDecimal::new(digits.into(), scale))
}

/// A value always carried at 2 decimal places.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(from = "BigDecimal", into = "BigDecimal")]
#[sqlx(transparent)]
pub struct Money(BigDecimal);

impl Money {
    pub fn new(raw: BigDecimal) -> Self {
        Self(normalize_scale(&raw))
    }

    pub fn zero() -> Self {
        Self(BigDecimal::zero().with_scale(MONEY_SCALE))
    }

    pub fn from_cents(cents: i64) -> Self {
        Self(BigDecimal::new(cents.into(), MONEY_SCALE))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn inner(&self) -> &BigDecimal {
        &self.0
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<BigDecimal> for Money {
    fn from(value: BigDecimal) -> Self {
        Self::new(value)
    }
}

impl From<Money> for BigDecimal {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl Add for Money {
    type Output = Money;
    fn add(self, rhs: Money) -> Money {
        Money::new(self.0 + rhs.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bd(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn half_up_moves_ties_away_from_zero() {
        assert_eq!(round_with(&bd("12.345"), RoundingMode::HalfUp).to_string(), "12.35");
        assert_eq!(round_with(&bd("-12.345"), RoundingMode::HalfUp).to_string(), "-12.35");
        assert_eq!(round_with(&bd("12.3449"), RoundingMode::HalfUp).to_string(), "12.34");
        assert_eq!(round_with(&bd("-60.126582"), RoundingMode::HalfUp).to_string(), "-60.13");
    }

    #[test]
    fn bankers_moves_ties_to_even_cent() {
        assert_eq!(round_with(&bd("1.005"), RoundingMode::Bankers).to_string(), "1.00");
        assert_eq!(round_with(&bd("1.015"), RoundingMode::Bankers).to_string(), "1.02");
        assert_eq!(round_with(&bd("1.0051"), RoundingMode::Bankers).to_string(), "1.01");
        assert_eq!(round_with(&bd("-2.675"), RoundingMode::Bankers).to_string(), "-2.68");
    }

    #[test]
    fn truncate_drops_digits() {
        assert_eq!(round_with(&bd("19.999"), RoundingMode::Truncate).to_string(), "19.99");
        assert_eq!(round_with(&bd("-19.999"), RoundingMode::Truncate).to_string(), "-19.99");
    }

    #[test]
    fn short_values_are_extended() {
        assert_eq!(round_with(&bd("632"), RoundingMode::HalfUp).to_string(), "632.00");
        assert_eq!(round_with(&bd("11.6"), RoundingMode::HalfUp).to_string(), "11.60");
    }

    #[test]
    fn precision_bounds_are_checked_without_expanding() {
        assert_eq!(within_precision(&bd("9999999999.99"), 10, 2), Some(bd("9999999999.99")));
        assert_eq!(within_precision(&bd("10.500"), 10, 2).map(|v| v.to_string()), Some("10.5".to_string()));
        assert_eq!(within_precision(&bd("0"), 10, 2), Some(BigDecimal::zero()));
        assert_eq!(within_precision(&bd("-42"), 10, 2), Some(bd("-42")));
        assert!(within_precision(&bd("10000000000"), 10, 2).is_none());
        assert!(within_precision(&bd("20.12345"), 8, 4).is_none());
        assert!(within_precision(&bd("0.00001"), 8, 4).is_none());
        assert!(within_precision(&bd("1e20000000"), 10, 2).is_none());
        assert!(within_precision(&bd("1e-20000000"), 10, 2).is_none());
        assert!(within_precision(&bd("123456789012345678901234567890123456789012"), 10, 2).is_none());
    }

    #[test]
    fn parse_modes() {
        assert_eq!("half-up".parse::<RoundingMode>().unwrap(), RoundingMode::HalfUp);
        assert_eq!(" Bankers ".parse::<RoundingMode>().unwrap(), RoundingMode::Bankers);
        assert_eq!("truncate".parse::<RoundingMode>().unwrap(), RoundingMode::Truncate);
        assert!("ceiling".parse::<RoundingMode>().is_err());
    }

    #[test]
    fn money_from_cents_keeps_scale() {
        let m = Money::from_cents(-38000);
        assert_eq!(m.to_string(), "-380.00");
    }

    #[test]
    fn money_serializes_as_decimal_string() {
        let m = Money::from_cents(4800);
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(json, "\"48.00\"");
        let back: Money = serde_json::from_str("\"47.999\"").unwrap();
        assert_eq!(back, Money::from_cents(4800));
    }

    #[test]
    fn sum_rounds_each_term() {
        let values = [Money::new(bd("0.005")), Money::new(bd("0.005"))];
        let total: Money = values.iter().sum();
        assert_eq!(total, Money::from_cents(2));
        assert!(Money::zero().is_zero());
    }
}
