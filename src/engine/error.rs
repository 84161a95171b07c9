use ulid::Ulid;

use crate::model::{Ms, RentalStatus, format_ts};

/// How a caller should treat an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A referenced customer, car, category or rental does not exist.
    NotFound,
    /// Validation or business-rule violation. Nothing was written.
    BadRequest,
    /// Storage failure.
    Internal,
}

#[derive(Debug)]
pub enum EngineError {
    NotFound {
        entity: &'static str,
        id: Ulid,
    },
    AlreadyExists {
        entity: &'static str,
        field: &'static str,
    },
    Validation(&'static str),
    InvalidInterval {
        start: Ms,
        end: Ms,
    },
    StartInPast {
        start: Ms,
        now: Ms,
    },
    CarUnavailable(Ulid),
    Conflict(Ulid),
    InvalidState {
        rental: Ulid,
        status: RentalStatus,
    },
    ReturnBeforeStart,
    NotExtending {
        current: Ms,
        requested: Ms,
    },
    LimitExceeded(&'static str),
    WalError(String),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::NotFound { .. } => ErrorKind::NotFound,
            EngineError::WalError(_) => ErrorKind::Internal,
            _ => ErrorKind::BadRequest,
        }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            EngineError::AlreadyExists { entity, field } => {
                write!(f, "{entity} with this {field} already exists")
            }
            EngineError::Validation(msg) => write!(f, "invalid input: {msg}"),
            EngineError::InvalidInterval { start, end } => write!(
                f,
                "end {} must be after start {}",
                format_ts(*end),
                format_ts(*start)
            ),
            EngineError::StartInPast { start, now } => write!(
                f,
                "start {} is in the past (now {})",
                format_ts(*start),
                format_ts(*now)
            ),
            EngineError::CarUnavailable(id) => write!(f, "car {id} is not available"),
            EngineError::Conflict(id) => write!(f, "overlaps active rental: {id}"),
            EngineError::InvalidState { rental, status } => {
                write!(f, "rental {rental} is {status}, expected ACTIVE")
            }
            EngineError::ReturnBeforeStart => {
                write!(f, "actual return time cannot be before the rental start")
            }
            EngineError::NotExtending { current, requested } => write!(
                f,
                "new planned end {} must be after current planned end {}",
                format_ts(*requested),
                format_ts(*current)
            ),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
