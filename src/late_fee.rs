use rust_decimal::Decimal;

use crate::model::{HOUR_MS, Ms};
use crate::money::{percent_factor, round2};
use crate::pricing::billing_units;

/// Share of the hourly rate charged per started hour of lateness.
pub const LATE_FEE_PERCENT: u32 = 50;

/// Overage fee for returning at `actual_return_at` instead of `planned_end_at`.
///
/// Zero when on time or early. Otherwise every started hour counts (at least
/// one), charged at `LATE_FEE_PERCENT` of the hourly rate.
pub fn late_fee(hourly_rate: Decimal, planned_end_at: Ms, actual_return_at: Ms) -> Decimal {
    if actual_return_at <= planned_end_at {
        return round2(Decimal::ZERO);
    }
    let hours_late = billing_units(actual_return_at - planned_end_at, HOUR_MS).max(1);
    let fee = Decimal::from(hours_late) * hourly_rate * percent_factor(Decimal::from(LATE_FEE_PERCENT));
    round2(fee)
}
