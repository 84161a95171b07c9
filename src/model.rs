use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::engine::EngineError;
use crate::limits::*;
use crate::money::round2;

/// Unix milliseconds, UTC. The only time type inside the engine.
pub type Ms = i64;

pub const MINUTE_MS: Ms = 60_000;
pub const HOUR_MS: Ms = 60 * MINUTE_MS;
pub const DAY_MS: Ms = 24 * HOUR_MS;
pub const WEEK_MS: Ms = 7 * DAY_MS;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    /// Checked constructor for caller-supplied bounds.
    pub fn try_new(start: Ms, end: Ms) -> Result<Self, EngineError> {
        if end <= start {
            return Err(EngineError::InvalidInterval { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    /// Endpoint touching is not an overlap.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Floor to the start of the minute.
pub fn truncate_to_minute(ms: Ms) -> Ms {
    ms.div_euclid(MINUTE_MS) * MINUTE_MS
}

/// Parse an RFC 3339 timestamp, or a zone-less `YYYY-MM-DDTHH:MM[:SS]` taken as UTC.
pub fn parse_ts(s: &str) -> Result<Ms, EngineError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.timestamp_millis());
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc().timestamp_millis())
        .ok_or(EngineError::Validation("unparsable timestamp"))
}

pub fn format_ts(ms: Ms) -> String {
    match DateTime::<Utc>::from_timestamp_millis(ms) {
        Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Secs, true),
        None => format!("{ms}ms"),
    }
}

// ── Enumerations ─────────────────────────────────────────────────

/// Billing plan of a rental.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RateType {
    Hourly,
    Daily,
    Weekly,
}

impl RateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateType::Hourly => "HOURLY",
            RateType::Daily => "DAILY",
            RateType::Weekly => "WEEKLY",
        }
    }
}

impl std::str::FromStr for RateType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "HOURLY" => Ok(RateType::Hourly),
            "DAILY" => Ok(RateType::Daily),
            "WEEKLY" => Ok(RateType::Weekly),
            _ => Err(EngineError::Validation("unknown rate type")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CarStatus {
    Available,
    Rented,
    Maintenance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RentalStatus {
    Active,
    Returned,
    Canceled,
}

impl std::fmt::Display for RentalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RentalStatus::Active => "ACTIVE",
            RentalStatus::Returned => "RETURNED",
            RentalStatus::Canceled => "CANCELED",
        };
        f.write_str(s)
    }
}

// ── Catalog records ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: Ulid,
    pub name: String,
    pub daily_discount_percent: Decimal,
    pub weekly_discount_percent: Decimal,
}

impl Category {
    /// Absent discounts default to 0; present ones must lie in `[0, 100]`.
    pub fn new(
        id: Ulid,
        name: String,
        daily_discount_percent: Option<Decimal>,
        weekly_discount_percent: Option<Decimal>,
    ) -> Result<Self, EngineError> {
        validate_name(&name, "category name must not be empty")?;
        let daily = daily_discount_percent.unwrap_or(Decimal::ZERO);
        let weekly = weekly_discount_percent.unwrap_or(Decimal::ZERO);
        for pct in [daily, weekly] {
            if pct < Decimal::ZERO || pct > Decimal::ONE_HUNDRED {
                return Err(EngineError::Validation("discount percent must be within 0..=100"));
            }
        }
        Ok(Self {
            id,
            name,
            daily_discount_percent: daily,
            weekly_discount_percent: weekly,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: Ulid,
    pub full_name: String,
    pub email: Option<String>,
}

impl Customer {
    pub fn new(id: Ulid, full_name: String, email: Option<String>) -> Result<Self, EngineError> {
        validate_name(&full_name, "customer name must not be empty")?;
        if let Some(ref e) = email
            && (e.len() > MAX_NAME_LEN || !e.contains('@'))
        {
            return Err(EngineError::Validation("invalid customer email"));
        }
        Ok(Self { id, full_name, email })
    }
}

/// Registration input for a car.
#[derive(Debug, Clone)]
pub struct NewCar {
    pub vin: String,
    pub license_plate: String,
    pub brand: String,
    pub model: String,
    pub production_year: i32,
    pub color: Option<String>,
    pub category_id: Ulid,
    pub hourly_rate: Decimal,
    pub daily_rate: Decimal,
    pub weekly_rate: Decimal,
    pub mileage: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Car {
    pub id: Ulid,
    pub vin: String,
    pub license_plate: String,
    pub brand: String,
    pub model: String,
    pub production_year: i32,
    pub color: Option<String>,
    pub category_id: Ulid,
    pub hourly_rate: Decimal,
    pub daily_rate: Decimal,
    pub weekly_rate: Decimal,
    pub mileage: u64,
    pub status: CarStatus,
}

impl Car {
    pub fn new(id: Ulid, spec: NewCar) -> Result<Self, EngineError> {
        validate_name(&spec.vin, "VIN must not be empty")?;
        validate_name(&spec.license_plate, "license plate must not be empty")?;
        validate_name(&spec.brand, "brand must not be empty")?;
        validate_name(&spec.model, "model must not be empty")?;
        if !(MIN_PRODUCTION_YEAR..=MAX_PRODUCTION_YEAR).contains(&spec.production_year) {
            return Err(EngineError::Validation("production year out of range"));
        }
        let (hourly_rate, daily_rate, weekly_rate) =
            (round2(spec.hourly_rate), round2(spec.daily_rate), round2(spec.weekly_rate));
        // Checked after rounding: 0.004 would be stored as 0.00.
        for rate in [hourly_rate, daily_rate, weekly_rate] {
            if rate <= Decimal::ZERO {
                return Err(EngineError::Validation("rates must be positive"));
            }
        }
        Ok(Self {
            id,
            vin: spec.vin,
            license_plate: spec.license_plate,
            brand: spec.brand,
            model: spec.model,
            production_year: spec.production_year,
            color: spec.color,
            category_id: spec.category_id,
            hourly_rate,
            daily_rate,
            weekly_rate,
            mileage: spec.mileage,
            status: CarStatus::Available,
        })
    }

    /// Unit rate for the given plan.
    pub fn rate_for(&self, rate_type: RateType) -> Decimal {
        match rate_type {
            RateType::Hourly => self.hourly_rate,
            RateType::Daily => self.daily_rate,
            RateType::Weekly => self.weekly_rate,
        }
    }

    /// Odometer readings never go backwards; a lower reading is ignored.
    pub fn record_mileage(&mut self, reading: u64) -> bool {
        if reading >= self.mileage {
            self.mileage = reading;
            true
        } else {
            false
        }
    }
}

fn validate_name(value: &str, empty: &'static str) -> Result<(), EngineError> {
    if value.trim().is_empty() {
        return Err(EngineError::Validation(empty));
    }
    if value.len() > MAX_NAME_LEN {
        return Err(EngineError::LimitExceeded("name too long"));
    }
    Ok(())
}

// ── Rentals ──────────────────────────────────────────────────────

/// Where a rental is in its lifecycle. Terminal states carry the moment
/// the car came back, so a finished rental always has a return time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RentalState {
    Active,
    Returned { at: Ms },
    Canceled { at: Ms },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rental {
    id: Ulid,
    customer_id: Ulid,
    car_id: Ulid,
    /// `[start_at, planned_end_at)`
    span: Span,
    rate_type: RateType,
    state: RentalState,
    base_price: Decimal,
    late_fee: Decimal,
    total_price: Decimal,
    notes: Option<String>,
    created_at: Ms,
}

impl Rental {
    /// A fresh ACTIVE rental priced at `base_price` with no late fee.
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        id: Ulid,
        customer_id: Ulid,
        car_id: Ulid,
        span: Span,
        rate_type: RateType,
        base_price: Decimal,
        notes: Option<String>,
        created_at: Ms,
    ) -> Self {
        let base_price = round2(base_price);
        Self {
            id,
            customer_id,
            car_id,
            span,
            rate_type,
            state: RentalState::Active,
            base_price,
            late_fee: round2(Decimal::ZERO),
            total_price: base_price,
            notes,
            created_at,
        }
    }

    pub fn id(&self) -> Ulid {
        self.id
    }

    pub fn customer_id(&self) -> Ulid {
        self.customer_id
    }

    pub fn car_id(&self) -> Ulid {
        self.car_id
    }

    pub fn span(&self) -> Span {
        self.span
    }

    pub fn start_at(&self) -> Ms {
        self.span.start
    }

    pub fn planned_end_at(&self) -> Ms {
        self.span.end
    }

    pub fn rate_type(&self) -> RateType {
        self.rate_type
    }

    pub fn state(&self) -> RentalState {
        self.state
    }

    pub fn status(&self) -> RentalStatus {
        match self.state {
            RentalState::Active => RentalStatus::Active,
            RentalState::Returned { .. } => RentalStatus::Returned,
            RentalState::Canceled { .. } => RentalStatus::Canceled,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == RentalState::Active
    }

    pub fn actual_return_at(&self) -> Option<Ms> {
        match self.state {
            RentalState::Active => None,
            RentalState::Returned { at } | RentalState::Canceled { at } => Some(at),
        }
    }

    pub fn base_price(&self) -> Decimal {
        self.base_price
    }

    pub fn late_fee(&self) -> Decimal {
        self.late_fee
    }

    pub fn total_price(&self) -> Decimal {
        self.total_price
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn created_at(&self) -> Ms {
        self.created_at
    }

    pub fn is_overdue(&self, now: Ms) -> bool {
        self.is_active() && self.span.end < now
    }

    pub fn ensure_active(&self) -> Result<(), EngineError> {
        if self.is_active() {
            Ok(())
        } else {
            Err(EngineError::InvalidState {
                rental: self.id,
                status: self.status(),
            })
        }
    }

    /// New plan and/or planned end; the late fee already on record is kept.
    pub fn reprice(
        &mut self,
        planned_end_at: Ms,
        rate_type: RateType,
        base_price: Decimal,
        notes: Option<String>,
    ) -> Result<(), EngineError> {
        self.ensure_active()?;
        self.span = Span::try_new(self.span.start, planned_end_at)?;
        self.rate_type = rate_type;
        self.base_price = round2(base_price);
        self.total_price = crate::money::total(self.base_price, self.late_fee);
        if notes.is_some() {
            self.notes = notes;
        }
        Ok(())
    }

    /// ACTIVE → CANCELED. Any late fee is dropped and the total falls back to base.
    pub fn cancel(&mut self, at: Ms) -> Result<(), EngineError> {
        self.ensure_active()?;
        self.state = RentalState::Canceled { at };
        self.late_fee = round2(Decimal::ZERO);
        self.total_price = self.base_price;
        Ok(())
    }

    /// ACTIVE → RETURNED.
    pub fn complete(&mut self, at: Ms, late_fee: Decimal) -> Result<(), EngineError> {
        self.ensure_active()?;
        if at < self.span.start {
            return Err(EngineError::ReturnBeforeStart);
        }
        self.state = RentalState::Returned { at };
        self.late_fee = round2(late_fee);
        self.total_price = crate::money::total(self.base_price, self.late_fee);
        Ok(())
    }
}

/// A car together with every rental that references it, sorted by start.
#[derive(Debug, Clone)]
pub struct CarState {
    pub car: Car,
    pub rentals: Vec<Rental>,
}

impl CarState {
    pub fn new(car: Car) -> Self {
        Self {
            car,
            rentals: Vec::new(),
        }
    }

    /// Insert rental maintaining sort order by start.
    pub fn insert_rental(&mut self, rental: Rental) {
        let pos = self
            .rentals
            .binary_search_by_key(&rental.start_at(), |r| r.start_at())
            .unwrap_or_else(|e| e);
        self.rentals.insert(pos, rental);
    }

    pub fn remove_rental(&mut self, id: Ulid) -> Option<Rental> {
        let pos = self.rentals.iter().position(|r| r.id == id)?;
        Some(self.rentals.remove(pos))
    }

    pub fn rental(&self, id: Ulid) -> Option<&Rental> {
        self.rentals.iter().find(|r| r.id == id)
    }

    pub fn rental_mut(&mut self, id: Ulid) -> Option<&mut Rental> {
        self.rentals.iter_mut().find(|r| r.id == id)
    }

    /// Rentals whose planned span overlaps the query window, any status.
    /// Uses binary search to skip rentals starting at or after `query.end`.
    pub fn overlapping(&self, query: &Span) -> impl Iterator<Item = &Rental> {
        let right_bound = self.rentals.partition_point(|r| r.span.start < query.end);
        self.rentals[..right_bound]
            .iter()
            .filter(move |r| r.span.end > query.start)
    }

    pub fn active_rentals(&self) -> impl Iterator<Item = &Rental> {
        self.rentals.iter().filter(|r| r.is_active())
    }

    pub fn has_active_rental(&self) -> bool {
        self.rentals.iter().any(Rental::is_active)
    }

    /// Bring `car.status` in line with the rentals: RENTED iff an ACTIVE
    /// rental exists. A car leaving RENTED becomes AVAILABLE.
    pub fn sync_status(&mut self) {
        if self.has_active_rental() {
            self.car.status = CarStatus::Rented;
        } else if self.car.status == CarStatus::Rented {
            self.car.status = CarStatus::Available;
        }
    }
}

/// The event types. This is the WAL record format; each one is the
/// complete, already-validated outcome of a single operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    CategoryCreated {
        category: Category,
    },
    CustomerCreated {
        customer: Customer,
    },
    CarRegistered {
        car: Car,
    },
    CarMaintenanceSet {
        car_id: Ulid,
        on: bool,
    },
    RentalCreated {
        rental: Rental,
    },
    RentalRepriced {
        id: Ulid,
        car_id: Ulid,
        planned_end_at: Ms,
        rate_type: RateType,
        base_price: Decimal,
        notes: Option<String>,
    },
    RentalCanceled {
        id: Ulid,
        car_id: Ulid,
        at: Ms,
    },
    RentalReturned {
        id: Ulid,
        car_id: Ulid,
        at: Ms,
        late_fee: Decimal,
        mileage: Option<u64>,
    },
    RentalDeleted {
        id: Ulid,
        car_id: Ulid,
    },
    /// Compaction output: a rental in whatever state it was in.
    RentalRestored {
        rental: Rental,
    },
}

impl Event {
    /// The car whose state the event touches, if any.
    pub fn car_id(&self) -> Option<Ulid> {
        match self {
            Event::CarRegistered { car } => Some(car.id),
            Event::CarMaintenanceSet { car_id, .. }
            | Event::RentalRepriced { car_id, .. }
            | Event::RentalCanceled { car_id, .. }
            | Event::RentalReturned { car_id, .. }
            | Event::RentalDeleted { car_id, .. } => Some(*car_id),
            Event::RentalCreated { rental } | Event::RentalRestored { rental } => Some(rental.car_id),
            Event::CategoryCreated { .. } | Event::CustomerCreated { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_car() -> Car {
        Car::new(
            Ulid::new(),
            NewCar {
                vin: "WVWZZZ1JZXW000001".into(),
                license_plate: "AB-123-CD".into(),
                brand: "Volkswagen".into(),
                model: "Golf".into(),
                production_year: 2022,
                color: Some("blue".into()),
                category_id: Ulid::new(),
                hourly_rate: Decimal::new(1000, 2),
                daily_rate: Decimal::new(5000, 2),
                weekly_rate: Decimal::new(30000, 2),
                mileage: 12_000,
            },
        )
        .unwrap()
    }

    fn rental_at(car: &Car, start: Ms, end: Ms) -> Rental {
        Rental::open(
            Ulid::new(),
            Ulid::new(),
            car.id,
            Span::new(start, end),
            RateType::Daily,
            Decimal::new(5000, 2),
            None,
            0,
        )
    }

    #[test]
    fn span_overlap() {
        let a = Span::new(100, 200);
        let b = Span::new(150, 250);
        let c = Span::new(200, 300);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c)); // adjacent, not overlapping
    }

    #[test]
    fn span_try_new_rejects_empty() {
        assert!(Span::try_new(100, 100).is_err());
        assert!(Span::try_new(200, 100).is_err());
        assert_eq!(Span::try_new(100, 101).unwrap().duration_ms(), 1);
    }

    #[test]
    fn parse_and_format_timestamps() {
        let a = parse_ts("2026-01-01T10:00").unwrap();
        let b = parse_ts("2026-01-01T10:00:00Z").unwrap();
        let c = parse_ts("2026-01-01T11:00:00+01:00").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(format_ts(a), "2026-01-01T10:00:00Z");
        assert!(parse_ts("yesterday").is_err());
    }

    #[test]
    fn minute_truncation() {
        let t = parse_ts("2026-01-01T10:00:59Z").unwrap();
        assert_eq!(truncate_to_minute(t), parse_ts("2026-01-01T10:00").unwrap());
    }

    #[test]
    fn rate_type_from_str() {
        assert_eq!("daily".parse::<RateType>().unwrap(), RateType::Daily);
        assert_eq!("WEEKLY".parse::<RateType>().unwrap(), RateType::Weekly);
        assert!("monthly".parse::<RateType>().is_err());
    }

    #[test]
    fn category_defaults_and_bounds() {
        let c = Category::new(Ulid::new(), "Economy".into(), None, Some(Decimal::from(15))).unwrap();
        assert_eq!(c.daily_discount_percent, Decimal::ZERO);
        assert_eq!(c.weekly_discount_percent, Decimal::from(15));
        assert!(Category::new(Ulid::new(), "Bad".into(), Some(Decimal::from(101)), None).is_err());
        assert!(Category::new(Ulid::new(), "Bad".into(), Some(Decimal::from(-1)), None).is_err());
    }

    #[test]
    fn car_rejects_non_positive_rates() {
        let mut spec = NewCar {
            vin: "VIN1".into(),
            license_plate: "P1".into(),
            brand: "Fiat".into(),
            model: "Panda".into(),
            production_year: 2020,
            color: None,
            category_id: Ulid::new(),
            hourly_rate: Decimal::ZERO,
            daily_rate: Decimal::ONE,
            weekly_rate: Decimal::ONE,
            mileage: 0,
        };
        assert!(Car::new(Ulid::new(), spec.clone()).is_err());
        spec.hourly_rate = Decimal::new(4, 3);
        assert!(matches!(
            Car::new(Ulid::new(), spec.clone()),
            Err(EngineError::Validation(_))
        ));
        spec.hourly_rate = Decimal::new(5, 3);
        assert_eq!(Car::new(Ulid::new(), spec.clone()).unwrap().hourly_rate, Decimal::new(1, 2));
        spec.hourly_rate = Decimal::ONE;
        spec.production_year = 1850;
        assert!(Car::new(Ulid::new(), spec).is_err());
    }

    #[test]
    fn mileage_never_decreases() {
        let mut car = sample_car();
        assert!(!car.record_mileage(11_000));
        assert_eq!(car.mileage, 12_000);
        assert!(car.record_mileage(12_500));
        assert_eq!(car.mileage, 12_500);
    }

    #[test]
    fn cancel_resets_fee_and_total() {
        let car = sample_car();
        let mut r = rental_at(&car, 1_000, 2_000);
        r.cancel(1_500).unwrap();
        assert_eq!(r.status(), RentalStatus::Canceled);
        assert_eq!(r.actual_return_at(), Some(1_500));
        assert_eq!(r.late_fee(), Decimal::ZERO);
        assert_eq!(r.total_price(), r.base_price());
    }

    #[test]
    fn terminal_states_are_final() {
        let car = sample_car();
        let mut r = rental_at(&car, 1_000, 2_000);
        r.complete(2_000, Decimal::ZERO).unwrap();
        assert!(matches!(r.cancel(2_100), Err(EngineError::InvalidState { .. })));
        assert!(matches!(
            r.reprice(3_000, RateType::Hourly, Decimal::ONE, None),
            Err(EngineError::InvalidState { .. })
        ));
        assert_eq!(r.status(), RentalStatus::Returned);
    }

    #[test]
    fn complete_before_start_rejected() {
        let car = sample_car();
        let mut r = rental_at(&car, 1_000, 2_000);
        assert!(matches!(r.complete(999, Decimal::ZERO), Err(EngineError::ReturnBeforeStart)));
        assert!(r.is_active());
    }

    #[test]
    fn reprice_keeps_late_fee_in_total() {
        let car = sample_car();
        let mut r = rental_at(&car, 1_000, 2_000);
        r.reprice(3_000, RateType::Hourly, Decimal::new(12345, 3), Some("longer".into()))
            .unwrap();
        assert_eq!(r.base_price(), Decimal::new(1235, 2));
        assert_eq!(r.total_price(), Decimal::new(1235, 2));
        assert_eq!(r.planned_end_at(), 3_000);
        assert_eq!(r.rate_type(), RateType::Hourly);
        assert_eq!(r.notes(), Some("longer"));
    }

    #[test]
    fn car_state_keeps_rentals_sorted() {
        let car = sample_car();
        let mut cs = CarState::new(car.clone());
        cs.insert_rental(rental_at(&car, 300, 400));
        cs.insert_rental(rental_at(&car, 100, 200));
        cs.insert_rental(rental_at(&car, 200, 300));
        let starts: Vec<Ms> = cs.rentals.iter().map(Rental::start_at).collect();
        assert_eq!(starts, vec![100, 200, 300]);
    }

    #[test]
    fn overlapping_adjacent_not_included() {
        let car = sample_car();
        let mut cs = CarState::new(car.clone());
        cs.insert_rental(rental_at(&car, 100, 200));
        assert_eq!(cs.overlapping(&Span::new(200, 300)).count(), 0);
        assert_eq!(cs.overlapping(&Span::new(199, 300)).count(), 1);
    }

    #[test]
    fn sync_status_follows_active_rentals() {
        let car = sample_car();
        let mut cs = CarState::new(car.clone());
        let r = rental_at(&car, 100, 200);
        let id = r.id();
        cs.insert_rental(r);
        cs.sync_status();
        assert_eq!(cs.car.status, CarStatus::Rented);
        cs.rental_mut(id).unwrap().cancel(150).unwrap();
        cs.sync_status();
        assert_eq!(cs.car.status, CarStatus::Available);
    }

    #[test]
    fn event_serialization_roundtrip() {
        let car = sample_car();
        let event = Event::RentalCreated {
            rental: rental_at(&car, 1_000, 2_000),
        };
        let bytes = bincode::serialize(&event).unwrap();
        let decoded: Event = bincode::deserialize(&bytes).unwrap();
        assert_eq!(event, decoded);
    }
}
