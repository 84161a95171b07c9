use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;
use ulid::Ulid;

use crate::model::*;
use crate::money::round2;
use crate::observability::STATUS_DRIFT_TOTAL;
use crate::pricing::{self, Quote};

use super::availability::{is_available, validate_query_window, validate_span};
use super::{Engine, EngineError, SharedCarState};

/// Result of cross-checking stored car status against the rentals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    pub cars: usize,
    pub active_rentals: usize,
    pub overdue_rentals: usize,
    /// Cars whose status disagrees with "RENTED iff an ACTIVE rental exists".
    pub status_drift: Vec<Ulid>,
    /// Pairs of ACTIVE rentals on the same car with overlapping planned spans.
    pub overlapping: Vec<(Ulid, Ulid)>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.status_drift.is_empty() && self.overlapping.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FleetSummary {
    pub available: usize,
    pub rented: usize,
    pub maintenance: usize,
    pub rentals_by_status: BTreeMap<String, usize>,
    pub returned_revenue: Decimal,
}

impl Engine {
    fn car_states(&self) -> Vec<SharedCarState> {
        self.cars.iter().map(|e| e.value().clone()).collect()
    }

    pub async fn get_car(&self, id: Ulid) -> Result<Car, EngineError> {
        let cs = self
            .get_car_state(&id)
            .ok_or(EngineError::NotFound { entity: "car", id })?;
        let guard = cs.read().await;
        Ok(guard.car.clone())
    }

    pub fn get_category(&self, id: Ulid) -> Result<Category, EngineError> {
        self.category(&id)
    }

    pub fn get_customer(&self, id: Ulid) -> Result<Customer, EngineError> {
        self.customers
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or(EngineError::NotFound { entity: "customer", id })
    }

    pub async fn get_rental(&self, id: Ulid) -> Result<Rental, EngineError> {
        let not_found = || EngineError::NotFound { entity: "rental", id };
        let car_id = self.car_for_rental(&id).ok_or_else(not_found)?;
        let cs = self.get_car_state(&car_id).ok_or_else(not_found)?;
        let guard = cs.read().await;
        guard.rental(id).cloned().ok_or_else(not_found)
    }

    /// Quote a rental without reserving anything.
    pub async fn preview_price(&self, car_id: Ulid, rate_type: RateType, start: Ms, end: Ms) -> Result<Quote, EngineError> {
        let span = Span::try_new(start, end)?;
        validate_span(&span)?;
        let cs = self
            .get_car_state(&car_id)
            .ok_or(EngineError::NotFound { entity: "car", id: car_id })?;
        let guard = cs.read().await;
        let category = self.category(&guard.car.category_id)?;
        Ok(pricing::calculate(&guard.car, &category, rate_type, &span))
    }

    pub async fn is_car_available(&self, car_id: Ulid, from: Ms, to: Ms) -> Result<bool, EngineError> {
        let span = Span::try_new(from, to)?;
        let cs = self
            .get_car_state(&car_id)
            .ok_or(EngineError::NotFound { entity: "car", id: car_id })?;
        let guard = cs.read().await;
        Ok(is_available(&guard, &span))
    }

    /// Cars free for the whole of `[from, to)`, sorted by id. Advisory: the
    /// answer can be stale by the time a create runs, which re-checks.
    pub async fn available_cars(&self, from: Ms, to: Ms) -> Result<Vec<Car>, EngineError> {
        let span = Span::try_new(from, to)?;
        validate_query_window(&span)?;
        let mut cars = Vec::new();
        for cs in self.car_states() {
            let guard = cs.read().await;
            if is_available(&guard, &span) {
                cars.push(guard.car.clone());
            }
        }
        cars.sort_by_key(|c| c.id);
        Ok(cars)
    }

    /// Rentals across the fleet, optionally filtered by status, sorted by start.
    pub async fn list_rentals(&self, status: Option<RentalStatus>) -> Vec<Rental> {
        let mut rentals = Vec::new();
        for cs in self.car_states() {
            let guard = cs.read().await;
            rentals.extend(
                guard
                    .rentals
                    .iter()
                    .filter(|r| status.is_none_or(|s| r.status() == s))
                    .cloned(),
            );
        }
        rentals.sort_by_key(|r| (r.start_at(), r.id()));
        rentals
    }

    pub async fn list_active_rentals(&self) -> Vec<Rental> {
        self.list_rentals(Some(RentalStatus::Active)).await
    }

    /// ACTIVE rentals whose planned end has passed.
    pub async fn list_overdue_rentals(&self) -> Vec<Rental> {
        let now = self.now();
        let mut overdue = self.list_active_rentals().await;
        overdue.retain(|r| r.is_overdue(now));
        overdue
    }

    pub async fn rentals_for_customer(&self, customer_id: Ulid) -> Result<Vec<Rental>, EngineError> {
        if !self.customers.contains_key(&customer_id) {
            return Err(EngineError::NotFound { entity: "customer", id: customer_id });
        }
        let mut rentals = self.list_rentals(None).await;
        rentals.retain(|r| r.customer_id() == customer_id);
        Ok(rentals)
    }

    /// Verify car status and the no-overlap rule on every car.
    pub async fn audit(&self) -> AuditReport {
        let now = self.now();
        let mut report = AuditReport::default();
        for cs in self.car_states() {
            let guard = cs.read().await;
            report.cars += 1;
            let active: Vec<&Rental> = guard.active_rentals().collect();
            report.active_rentals += active.len();
            report.overdue_rentals += active.iter().filter(|r| r.is_overdue(now)).count();

            let rented = guard.car.status == CarStatus::Rented;
            if rented != !active.is_empty() {
                report.status_drift.push(guard.car.id);
            }
            for (i, a) in active.iter().enumerate() {
                for b in &active[i + 1..] {
                    if a.span().overlaps(&b.span()) {
                        report.overlapping.push((a.id(), b.id()));
                    }
                }
            }
        }
        report.status_drift.sort();
        report.overlapping.sort();
        if !report.status_drift.is_empty() {
            metrics::counter!(STATUS_DRIFT_TOTAL).increment(report.status_drift.len() as u64);
        }
        report
    }

    /// Simple counts and the revenue of finished rentals.
    pub async fn fleet_summary(&self) -> FleetSummary {
        let mut summary = FleetSummary::default();
        let mut revenue = Decimal::ZERO;
        for cs in self.car_states() {
            let guard = cs.read().await;
            match guard.car.status {
                CarStatus::Available => summary.available += 1,
                CarStatus::Rented => summary.rented += 1,
                CarStatus::Maintenance => summary.maintenance += 1,
            }
            for r in &guard.rentals {
                *summary.rentals_by_status.entry(r.status().to_string()).or_insert(0) += 1;
                if r.status() == RentalStatus::Returned {
                    revenue += r.total_price();
                }
            }
        }
        summary.returned_revenue = round2(revenue);
        summary
    }
}
