use crate::model::Ms;

pub const MAX_CARS: usize = 100_000;
pub const MAX_RENTALS_PER_CAR: usize = 50_000;
pub const MAX_NAME_LEN: usize = 128;
pub const MAX_NOTES_LEN: usize = 2_000;

pub const MIN_PRODUCTION_YEAR: i32 = 1900;
pub const MAX_PRODUCTION_YEAR: i32 = 2100;

/// 2000-01-01T00:00:00Z
pub const MIN_VALID_TIMESTAMP_MS: Ms = 946_684_800_000;
/// 2100-01-01T00:00:00Z
pub const MAX_VALID_TIMESTAMP_MS: Ms = 4_102_444_800_000;

/// A single rental may not exceed two years.
pub const MAX_RENTAL_DURATION_MS: Ms = 2 * 366 * 24 * 3_600_000;
/// Availability queries are capped at five years.
pub const MAX_QUERY_WINDOW_MS: Ms = 5 * 366 * 24 * 3_600_000;
