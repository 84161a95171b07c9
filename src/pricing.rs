//! Base price of a rental under a rate plan.
//!
//! Each plan bills the ceiling of the elapsed time in its own unit (a 1h20m
//! hourly rental is two hours) times the car's rate for that unit. Daily and
//! weekly plans then take the category's discount off; hourly never does.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::model::*;
use crate::money::{percent_factor, round2};

/// Result of pricing one interval under one plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Quote {
    pub rate_type: RateType,
    pub units: i64,
    pub unit_rate: Decimal,
    pub discount_percent: Decimal,
    pub base_price: Decimal,
}

/// Whole plan units covering `duration_ms`, partial units rounded up.
/// The late-fee calculator bills overdue hours with the same rule.
pub fn billing_units(duration_ms: Ms, unit_ms: Ms) -> i64 {
    debug_assert!(unit_ms > 0);
    if duration_ms <= 0 {
        return 0;
    }
    (duration_ms + unit_ms - 1) / unit_ms
}

/// Price `span` for `car` under `rate_type`. `span` is non-empty by construction.
pub fn calculate(car: &Car, category: &Category, rate_type: RateType, span: &Span) -> Quote {
    match rate_type {
        RateType::Hourly => hourly(car, span),
        RateType::Daily => discounted(car, span, RateType::Daily, DAY_MS, category.daily_discount_percent),
        RateType::Weekly => discounted(car, span, RateType::Weekly, WEEK_MS, category.weekly_discount_percent),
    }
}

fn hourly(car: &Car, span: &Span) -> Quote {
    let units = billing_units(span.duration_ms(), HOUR_MS);
    let unit_rate = car.rate_for(RateType::Hourly);
    Quote {
        rate_type: RateType::Hourly,
        units,
        unit_rate,
        discount_percent: Decimal::ZERO,
        base_price: round2(Decimal::from(units) * unit_rate),
    }
}

fn discounted(car: &Car, span: &Span, rate_type: RateType, unit_ms: Ms, discount_percent: Decimal) -> Quote {
    let units = billing_units(span.duration_ms(), unit_ms);
    let unit_rate = car.rate_for(rate_type);
    let gross = Decimal::from(units) * unit_rate;
    let net = gross * (Decimal::ONE - percent_factor(discount_percent));
    Quote {
        rate_type,
        units,
        unit_rate,
        discount_percent,
        base_price: round2(net),
    }
}
