use dashmap::mapref::entry::Entry;
use rust_decimal::Decimal;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::late_fee::late_fee;
use crate::limits::*;
use crate::model::*;
use crate::observability::{RENTAL_REJECTIONS_TOTAL, RENTAL_TRANSITIONS_TOTAL, QUOTED_PRICE};
use crate::pricing;

use super::availability::{check_available, validate_span, validate_timestamp};
use super::{Engine, EngineError, WalCommand, unique_key};

/// Input of `create_rental`.
#[derive(Debug, Clone)]
pub struct NewRental {
    pub customer_id: Ulid,
    pub car_id: Ulid,
    pub start_at: Ms,
    pub planned_end_at: Ms,
    pub rate_type: RateType,
    pub notes: Option<String>,
}

/// Input of `update_rental`: a new planned end and optionally a new plan.
#[derive(Debug, Clone)]
pub struct RentalChange {
    pub planned_end_at: Ms,
    pub rate_type: Option<RateType>,
    pub notes: Option<String>,
}

/// Input of `return_rental`. A missing return time means now.
#[derive(Debug, Clone, Default)]
pub struct ReturnRequest {
    pub actual_return_at: Option<Ms>,
    pub mileage: Option<u64>,
}

fn record<T>(op: &'static str, result: Result<T, EngineError>) -> Result<T, EngineError> {
    match &result {
        Ok(_) => metrics::counter!(RENTAL_TRANSITIONS_TOTAL, "op" => op).increment(1),
        Err(e) => {
            debug!("{op} rejected: {e}");
            metrics::counter!(RENTAL_REJECTIONS_TOTAL, "op" => op).increment(1);
        }
    }
    result
}

fn validate_notes(notes: &Option<String>) -> Result<(), EngineError> {
    if let Some(n) = notes
        && n.len() > MAX_NOTES_LEN
    {
        return Err(EngineError::LimitExceeded("notes too long"));
    }
    Ok(())
}

impl Engine {
    // ── Catalog ──────────────────────────────────────────────

    pub async fn create_category(
        &self,
        id: Ulid,
        name: String,
        daily_discount_percent: Option<Decimal>,
        weekly_discount_percent: Option<Decimal>,
    ) -> Result<Category, EngineError> {
        let category = Category::new(id, name, daily_discount_percent, weekly_discount_percent)?;
        let _catalog = self.catalog_lock.lock().await;
        if self.categories.contains_key(&id) {
            return Err(EngineError::AlreadyExists { entity: "category", field: "id" });
        }
        let event = Event::CategoryCreated { category: category.clone() };
        self.wal_append(&event).await?;
        self.apply_catalog(&event);
        Ok(category)
    }

    pub async fn create_customer(&self, id: Ulid, full_name: String, email: Option<String>) -> Result<Customer, EngineError> {
        let customer = Customer::new(id, full_name, email)?;
        let _catalog = self.catalog_lock.lock().await;
        if self.customers.contains_key(&id) {
            return Err(EngineError::AlreadyExists { entity: "customer", field: "id" });
        }
        let event = Event::CustomerCreated { customer: customer.clone() };
        self.wal_append(&event).await?;
        self.apply_catalog(&event);
        Ok(customer)
    }

    pub async fn register_car(&self, id: Ulid, spec: NewCar) -> Result<Car, EngineError> {
        let car = Car::new(id, spec)?;
        let _catalog = self.catalog_lock.lock().await;
        if self.cars.len() >= MAX_CARS {
            return Err(EngineError::LimitExceeded("too many cars"));
        }
        if !self.categories.contains_key(&car.category_id) {
            return Err(EngineError::NotFound { entity: "category", id: car.category_id });
        }
        if self.cars.contains_key(&id) {
            return Err(EngineError::AlreadyExists { entity: "car", field: "id" });
        }
        if self.vins.contains_key(&unique_key(&car.vin)) {
            return Err(EngineError::AlreadyExists { entity: "car", field: "VIN" });
        }
        if self.plates.contains_key(&unique_key(&car.license_plate)) {
            return Err(EngineError::AlreadyExists { entity: "car", field: "license plate" });
        }

        let event = Event::CarRegistered { car: car.clone() };
        self.wal_append(&event).await?;
        self.apply_catalog(&event);
        self.notify.send(id, &event);
        info!("registered car {id} ({})", car.license_plate);
        Ok(car)
    }

    /// Take a car out of (or back into) service. Refused while it is rented.
    pub async fn set_car_maintenance(&self, car_id: Ulid, on: bool) -> Result<Car, EngineError> {
        let cs = self
            .get_car_state(&car_id)
            .ok_or(EngineError::NotFound { entity: "car", id: car_id })?;
        let mut guard = cs.write().await;
        if guard.has_active_rental() {
            return Err(EngineError::CarUnavailable(car_id));
        }
        let already = (guard.car.status == CarStatus::Maintenance) == on;
        if already {
            return Ok(guard.car.clone());
        }
        let event = Event::CarMaintenanceSet { car_id, on };
        self.persist_and_apply(car_id, &mut guard, &event).await?;
        info!("car {car_id} maintenance={on}");
        Ok(guard.car.clone())
    }

    // ── Rental lifecycle ─────────────────────────────────────

    /// Check availability, price, and reserve in one step under the car's
    /// write lock: two creates on the same car can't both pass the check.
    pub async fn create_rental(&self, id: Ulid, req: NewRental) -> Result<Rental, EngineError> {
        record("create", self.create_rental_inner(id, req).await)
    }

    async fn create_rental_inner(&self, id: Ulid, req: NewRental) -> Result<Rental, EngineError> {
        validate_notes(&req.notes)?;
        let span = Span::try_new(req.start_at, req.planned_end_at)?;
        validate_span(&span)?;
        let now = self.now();
        if truncate_to_minute(span.start) < truncate_to_minute(now) {
            return Err(EngineError::StartInPast { start: span.start, now });
        }
        if !self.customers.contains_key(&req.customer_id) {
            return Err(EngineError::NotFound { entity: "customer", id: req.customer_id });
        }
        let cs = self
            .get_car_state(&req.car_id)
            .ok_or(EngineError::NotFound { entity: "car", id: req.car_id })?;

        let mut guard = cs.write().await;
        if guard.rentals.len() >= MAX_RENTALS_PER_CAR {
            return Err(EngineError::LimitExceeded("too many rentals on car"));
        }
        check_available(&guard, &span)?;

        // The id index spans all cars, so the id is claimed there; the car
        // lock alone can't stop the same id landing on two cars.
        match self.rental_to_car.entry(id) {
            Entry::Occupied(_) => {
                return Err(EngineError::AlreadyExists { entity: "rental", field: "id" });
            }
            Entry::Vacant(slot) => {
                slot.insert(req.car_id);
            }
        }
        let result = self.reserve(id, req, span, now, &mut guard).await;
        if result.is_err() {
            self.rental_to_car.remove(&id);
        }
        result
    }

    /// Price and commit a rental whose id is already claimed. Caller holds
    /// the car's write lock.
    async fn reserve(
        &self,
        id: Ulid,
        req: NewRental,
        span: Span,
        now: Ms,
        guard: &mut CarState,
    ) -> Result<Rental, EngineError> {
        let category = self.category(&guard.car.category_id)?;
        let quote = pricing::calculate(&guard.car, &category, req.rate_type, &span);
        metrics::histogram!(QUOTED_PRICE, "rate_type" => req.rate_type.as_str())
            .record(decimal_to_f64(quote.base_price));

        let rental = Rental::open(
            id,
            req.customer_id,
            req.car_id,
            span,
            req.rate_type,
            quote.base_price,
            req.notes,
            now,
        );
        let event = Event::RentalCreated { rental: rental.clone() };
        self.persist_and_apply(req.car_id, guard, &event).await?;
        info!(
            "rental {id} created: car {} {} {}..{} base {}",
            req.car_id,
            req.rate_type.as_str(),
            format_ts(span.start),
            format_ts(span.end),
            rental.base_price()
        );
        Ok(rental)
    }

    /// Change the planned end and/or the plan; recomputes base and total.
    pub async fn update_rental(&self, id: Ulid, change: RentalChange) -> Result<Rental, EngineError> {
        let result = async move {
            validate_notes(&change.notes)?;
            self.reprice(id, change.planned_end_at, change.rate_type, change.notes, false)
                .await
        }
        .await;
        record("update", result)
    }

    /// Push the planned end strictly later under the current plan.
    pub async fn extend_rental(&self, id: Ulid, new_planned_end_at: Ms) -> Result<Rental, EngineError> {
        record("extend", self.reprice(id, new_planned_end_at, None, None, true).await)
    }

    async fn reprice(
        &self,
        id: Ulid,
        planned_end_at: Ms,
        rate_type: Option<RateType>,
        notes: Option<String>,
        must_extend: bool,
    ) -> Result<Rental, EngineError> {
        let (car_id, mut guard) = self.resolve_rental_write(&id).await?;
        let rental = guard
            .rental(id)
            .ok_or(EngineError::NotFound { entity: "rental", id })?;
        rental.ensure_active()?;
        if must_extend && planned_end_at <= rental.planned_end_at() {
            return Err(EngineError::NotExtending {
                current: rental.planned_end_at(),
                requested: planned_end_at,
            });
        }
        let span = Span::try_new(rental.start_at(), planned_end_at)?;
        validate_span(&span)?;
        let rate_type = rate_type.unwrap_or(rental.rate_type());

        let category = self.category(&guard.car.category_id)?;
        let quote = pricing::calculate(&guard.car, &category, rate_type, &span);

        let event = Event::RentalRepriced {
            id,
            car_id,
            planned_end_at,
            rate_type,
            base_price: quote.base_price,
            notes,
        };
        self.persist_and_apply(car_id, &mut guard, &event).await?;
        let updated = guard
            .rental(id)
            .cloned()
            .ok_or(EngineError::NotFound { entity: "rental", id })?;
        info!(
            "rental {id} repriced: {} until {} base {} total {}",
            rate_type.as_str(),
            format_ts(planned_end_at),
            updated.base_price(),
            updated.total_price()
        );
        Ok(updated)
    }

    /// ACTIVE → CANCELED now; frees the car.
    pub async fn cancel_rental(&self, id: Ulid) -> Result<Rental, EngineError> {
        let result = async move {
            let (car_id, mut guard) = self.resolve_rental_write(&id).await?;
            let rental = guard
                .rental(id)
                .ok_or(EngineError::NotFound { entity: "rental", id })?;
            rental.ensure_active()?;

            let event = Event::RentalCanceled { id, car_id, at: self.now() };
            self.persist_and_apply(car_id, &mut guard, &event).await?;
            info!("rental {id} canceled, car {car_id} released");
            guard
                .rental(id)
                .cloned()
                .ok_or(EngineError::NotFound { entity: "rental", id })
        }
        .await;
        record("cancel", result)
    }

    /// ACTIVE → RETURNED with the late fee settled; frees the car.
    pub async fn return_rental(&self, id: Ulid, req: ReturnRequest) -> Result<Rental, EngineError> {
        let result = async move {
            let (car_id, mut guard) = self.resolve_rental_write(&id).await?;
            let rental = guard
                .rental(id)
                .ok_or(EngineError::NotFound { entity: "rental", id })?;
            rental.ensure_active()?;
            let at = req.actual_return_at.unwrap_or_else(|| self.now());
            validate_timestamp(at)?;
            if at < rental.start_at() {
                return Err(EngineError::ReturnBeforeStart);
            }
            let fee = late_fee(guard.car.hourly_rate, rental.planned_end_at(), at);

            let mileage = match req.mileage {
                Some(reading) if reading < guard.car.mileage => {
                    warn!(
                        "ignoring mileage {reading} for car {car_id}: below current {}",
                        guard.car.mileage
                    );
                    None
                }
                other => other,
            };

            let event = Event::RentalReturned {
                id,
                car_id,
                at,
                late_fee: fee,
                mileage,
            };
            self.persist_and_apply(car_id, &mut guard, &event).await?;
            let returned = guard
                .rental(id)
                .cloned()
                .ok_or(EngineError::NotFound { entity: "rental", id })?;
            info!(
                "rental {id} returned at {}: late fee {} total {}",
                format_ts(at),
                returned.late_fee(),
                returned.total_price()
            );
            Ok(returned)
        }
        .await;
        record("return", result)
    }

    /// Remove a rental in any state. Deleting an ACTIVE one frees the car.
    pub async fn delete_rental(&self, id: Ulid) -> Result<(), EngineError> {
        let result = async move {
            let (car_id, mut guard) = self.resolve_rental_write(&id).await?;
            let event = Event::RentalDeleted { id, car_id };
            self.persist_and_apply(car_id, &mut guard, &event).await?;
            info!("rental {id} deleted");
            Ok(())
        }
        .await;
        record("delete", result)
    }

    // ── WAL maintenance ──────────────────────────────────────

    /// Rewrite the WAL with only the events needed to recreate the current state.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let _catalog = self.catalog_lock.lock().await;
        let mut events = Vec::new();
        for entry in self.categories.iter() {
            events.push(Event::CategoryCreated { category: entry.value().clone() });
        }
        for entry in self.customers.iter() {
            events.push(Event::CustomerCreated { customer: entry.value().clone() });
        }

        // Read locks stay held until the swap: a car mutated after its snapshot
        // would otherwise lose that event to the rewritten log.
        let cars: Vec<_> = self.cars.iter().map(|e| e.value().clone()).collect();
        let mut guards = Vec::with_capacity(cars.len());
        for cs in cars {
            let guard = cs.read_owned().await;
            events.push(Event::CarRegistered { car: guard.car.clone() });
            for rental in &guard.rentals {
                events.push(Event::RentalRestored { rental: rental.clone() });
            }
            guards.push(guard);
        }

        let count = events.len();
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        let result = rx
            .await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()));
        drop(guards);
        if result.is_ok() {
            info!("WAL compacted to {count} events");
        }
        result
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

pub(super) fn decimal_to_f64(d: Decimal) -> f64 {
    use rust_decimal::prelude::ToPrimitive;
    d.to_f64().unwrap_or(0.0)
}
