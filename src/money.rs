//! Shared rounding for every monetary amount the engine produces.

use rust_decimal::{Decimal, RoundingStrategy};

/// Round to cents, half-up. All amounts here are non-negative, where
/// "away from zero" and "half-up" coincide.
pub fn round2(amount: Decimal) -> Decimal {
    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

/// `round2(base + late_fee)`; the only way a rental total is formed.
pub fn total(base: Decimal, late_fee: Decimal) -> Decimal {
    round2(base + late_fee)
}

/// `percent / 100`, e.g. 10 → 0.10.
pub fn percent_factor(percent: Decimal) -> Decimal {
    percent / Decimal::ONE_HUNDRED
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_half_up() {
        assert_eq!(round2(Decimal::new(12345, 3)), Decimal::new(1235, 2));
        assert_eq!(round2(Decimal::new(12344, 3)), Decimal::new(1234, 2));
        assert_eq!(round2(Decimal::new(5, 3)), Decimal::new(1, 2));
    }

    #[test]
    fn keeps_two_places() {
        let r = round2(Decimal::new(180, 0));
        assert_eq!(r, Decimal::new(18000, 2));
        assert_eq!(r.to_string(), "180.00");
        assert_eq!(round2(Decimal::new(1, 1)).to_string(), "0.10");
    }

    #[test]
    fn total_is_rounded_sum() {
        let base = Decimal::new(18000, 2);
        let fee = Decimal::new(1500, 2);
        assert_eq!(total(base, fee), Decimal::new(19500, 2));
        assert_eq!(total(Decimal::new(1005, 3), Decimal::ZERO), Decimal::new(101, 2));
    }

    #[test]
    fn percent_factor_scales() {
        assert_eq!(percent_factor(Decimal::from(50)), Decimal::new(5, 1));
        assert_eq!(percent_factor(Decimal::ZERO), Decimal::ZERO);
    }
}
