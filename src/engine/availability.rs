use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::EngineError;

/// First ACTIVE rental whose planned span overlaps `span`.
/// Returned and canceled rentals never block, whatever their dates.
pub fn find_conflict(cs: &CarState, span: &Span) -> Option<Ulid> {
    cs.overlapping(span)
        .find(|r| r.is_active())
        .map(Rental::id)
}

/// A car is available for `[from, to)` iff it is AVAILABLE and no ACTIVE
/// rental on it overlaps the window.
pub fn is_available(cs: &CarState, span: &Span) -> bool {
    cs.car.status == CarStatus::Available && find_conflict(cs, span).is_none()
}

/// `is_available` with the reason attached. Run under the car's write lock
/// so the answer still holds when the reservation is written.
pub(crate) fn check_available(cs: &CarState, span: &Span) -> Result<(), EngineError> {
    if let Some(existing) = find_conflict(cs, span) {
        return Err(EngineError::Conflict(existing));
    }
    if cs.car.status != CarStatus::Available {
        return Err(EngineError::CarUnavailable(cs.car.id));
    }
    Ok(())
}

pub(crate) fn validate_timestamp(at: Ms) -> Result<(), EngineError> {
    if !(MIN_VALID_TIMESTAMP_MS..=MAX_VALID_TIMESTAMP_MS).contains(&at) {
        return Err(EngineError::LimitExceeded("timestamp out of range"));
    }
    Ok(())
}

pub(crate) fn validate_span(span: &Span) -> Result<(), EngineError> {
    validate_timestamp(span.start)?;
    validate_timestamp(span.end)?;
    if span.duration_ms() > MAX_RENTAL_DURATION_MS {
        return Err(EngineError::LimitExceeded("rental too long"));
    }
    Ok(())
}

pub(crate) fn validate_query_window(span: &Span) -> Result<(), EngineError> {
    if span.duration_ms() > MAX_QUERY_WINDOW_MS {
        return Err(EngineError::LimitExceeded("query window too wide"));
    }
    Ok(())
}
