mod availability;
mod error;
mod mutations;
mod queries;

pub use availability::{find_conflict, is_available};
pub use error::{EngineError, ErrorKind};
pub use mutations::{NewRental, RentalChange, ReturnRequest};
pub use queries::{AuditReport, FleetSummary};

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock, mpsc, oneshot};
use tracing::warn;
use ulid::Ulid;

use crate::clock::{Clock, SystemClock};
use crate::model::*;
use crate::notify::NotifyHub;
use crate::wal::Wal;

/// A car and its rentals behind one lock: every lifecycle operation on a car
/// holds the write half from its availability check until its event is applied.
pub(super) type SharedCarState = Arc<RwLock<CarState>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Owns the WAL. Each wake-up takes the first queued append plus whatever
/// else is already waiting, writes them all, and fsyncs once for the batch.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        let WalCommand::Append { event, response } = cmd else {
            handle_non_append(&mut wal, cmd);
            continue;
        };
        let mut batch = vec![(event, response)];
        let mut deferred = None;
        while let Ok(next) = rx.try_recv() {
            match next {
                WalCommand::Append { event, response } => batch.push((event, response)),
                other => {
                    deferred = Some(other);
                    break;
                }
            }
        }

        metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
        let flush_start = std::time::Instant::now();
        let result = flush_batch(&mut wal, &batch);
        metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
            .record(flush_start.elapsed().as_secs_f64());
        for (_, tx) in batch {
            let r = match &result {
                Ok(()) => Ok(()),
                Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
            };
            let _ = tx.send(r);
        }

        if let Some(cmd) = deferred {
            handle_non_append(&mut wal, cmd);
        }
    }
}

fn flush_batch(wal: &mut Wal, batch: &[(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    let appended = batch
        .iter()
        .try_for_each(|(event, _)| wal.append_buffered(event));
    // Flush even after a failed append so half-written bytes don't ride
    // along with the next batch.
    let flushed = wal.flush_sync();
    appended.and(flushed)
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events).and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { event, response } => {
            let result = wal.append_buffered(&event).and_then(|()| wal.flush_sync());
            let _ = response.send(result);
        }
    }
}

/// The rental core. Car status and rentals change only through the lifecycle
/// operations; the per-car state is not reachable from outside the engine.
///
/// ```compile_fail
/// fn force_status(engine: &rentcore::engine::Engine, car_id: ulid::Ulid) {
///     let _ = engine.get_car_state(&car_id);
/// }
/// ```
pub struct Engine {
    pub(super) cars: DashMap<Ulid, SharedCarState>,
    pub(super) categories: DashMap<Ulid, Category>,
    pub(super) customers: DashMap<Ulid, Customer>,
    /// Reverse lookup: rental id → car id
    pub(super) rental_to_car: DashMap<Ulid, Ulid>,
    /// Unique keys of the catalog, normalised to upper case.
    pub(super) vins: DashMap<String, Ulid>,
    pub(super) plates: DashMap<String, Ulid>,
    /// Serialises catalog registrations so uniqueness checks can't interleave.
    pub(super) catalog_lock: Mutex<()>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    pub notify: Arc<NotifyHub>,
    pub(super) clock: Arc<dyn Clock>,
    /// Events found in the WAL at startup.
    replayed: u64,
}

pub(super) fn unique_key(s: &str) -> String {
    s.trim().to_ascii_uppercase()
}

/// Apply a car-scoped event to a CarState (caller holds the lock).
/// Car status is re-derived from the rentals afterwards.
fn apply_to_car(cs: &mut CarState, event: &Event, rental_index: &DashMap<Ulid, Ulid>) {
    match event {
        Event::CarMaintenanceSet { on, .. } => {
            cs.car.status = if *on {
                CarStatus::Maintenance
            } else {
                CarStatus::Available
            };
        }
        Event::RentalCreated { rental } | Event::RentalRestored { rental } => {
            rental_index.insert(rental.id(), rental.car_id());
            cs.insert_rental(rental.clone());
        }
        Event::RentalRepriced {
            id,
            planned_end_at,
            rate_type,
            base_price,
            notes,
            ..
        } => {
            if let Some(r) = cs.rental_mut(*id)
                && let Err(e) = r.reprice(*planned_end_at, *rate_type, *base_price, notes.clone())
            {
                warn!("skipping reprice of rental {id}: {e}");
            }
        }
        Event::RentalCanceled { id, at, .. } => {
            if let Some(r) = cs.rental_mut(*id)
                && let Err(e) = r.cancel(*at)
            {
                warn!("skipping cancel of rental {id}: {e}");
            }
        }
        Event::RentalReturned {
            id,
            at,
            late_fee,
            mileage,
            ..
        } => {
            if let Some(r) = cs.rental_mut(*id) {
                match r.complete(*at, *late_fee) {
                    Ok(()) => {
                        if let Some(reading) = mileage {
                            cs.car.record_mileage(*reading);
                        }
                    }
                    Err(e) => warn!("skipping return of rental {id}: {e}"),
                }
            }
        }
        Event::RentalDeleted { id, .. } => {
            cs.remove_rental(*id);
            rental_index.remove(id);
        }
        // Catalog records are handled at the DashMap level, not here
        Event::CategoryCreated { .. } | Event::CustomerCreated { .. } | Event::CarRegistered { .. } => {}
    }
    cs.sync_status();
}

impl Engine {
    pub fn new(wal_path: PathBuf, notify: Arc<NotifyHub>) -> io::Result<Self> {
        Self::with_clock(wal_path, notify, Arc::new(SystemClock))
    }

    pub fn with_clock(wal_path: PathBuf, notify: Arc<NotifyHub>, clock: Arc<dyn Clock>) -> io::Result<Self> {
        let events = Wal::recover(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            cars: DashMap::new(),
            categories: DashMap::new(),
            customers: DashMap::new(),
            rental_to_car: DashMap::new(),
            vins: DashMap::new(),
            plates: DashMap::new(),
            catalog_lock: Mutex::new(()),
            wal_tx,
            notify,
            clock,
            replayed: events.len() as u64,
        };

        // We're the sole owner of these Arcs, so try_write always succeeds.
        // Never block here: this may run inside an async context.
        for event in &events {
            engine.apply_catalog(event);
            if let Some(car_id) = car_scoped(event)
                && let Some(entry) = engine.cars.get(&car_id)
            {
                let cs = entry.value().clone();
                drop(entry);
                match cs.try_write() {
                    Ok(mut guard) => apply_to_car(&mut guard, event, &engine.rental_to_car),
                    Err(_) => warn!("replay: car {car_id} locked, event skipped"),
                }
            }
        }
        if !events.is_empty() {
            tracing::info!(
                "replayed {} events: {} cars, {} rentals",
                events.len(),
                engine.cars.len(),
                engine.rental_to_car.len()
            );
        }

        Ok(engine)
    }

    /// Catalog-level half of event application.
    fn apply_catalog(&self, event: &Event) {
        match event {
            Event::CategoryCreated { category } => {
                self.categories.insert(category.id, category.clone());
            }
            Event::CustomerCreated { customer } => {
                self.customers.insert(customer.id, customer.clone());
            }
            Event::CarRegistered { car } => {
                self.vins.insert(unique_key(&car.vin), car.id);
                self.plates.insert(unique_key(&car.license_plate), car.id);
                self.cars.insert(car.id, Arc::new(RwLock::new(CarState::new(car.clone()))));
            }
            _ => {}
        }
    }

    pub fn replayed_events(&self) -> u64 {
        self.replayed
    }

    pub fn now(&self) -> Ms {
        self.clock.now_ms()
    }

    /// Write event to WAL via the background group-commit writer.
    pub(super) async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub(super) fn get_car_state(&self, id: &Ulid) -> Option<SharedCarState> {
        self.cars.get(id).map(|e| e.value().clone())
    }

    pub(super) fn car_for_rental(&self, rental_id: &Ulid) -> Option<Ulid> {
        self.rental_to_car.get(rental_id).map(|e| *e.value())
    }

    pub(super) fn category(&self, id: &Ulid) -> Result<Category, EngineError> {
        self.categories
            .get(id)
            .map(|e| e.value().clone())
            .ok_or(EngineError::NotFound { entity: "category", id: *id })
    }

    /// Commit point of every car-scoped operation: WAL-append, then apply,
    /// then notify. Nothing is applied if the append fails.
    pub(super) async fn persist_and_apply(&self, car_id: Ulid, cs: &mut CarState, event: &Event) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        apply_to_car(cs, event, &self.rental_to_car);
        self.notify.send(car_id, event);
        Ok(())
    }

    /// Lookup rental → car, acquire the car's write lock.
    pub(super) async fn resolve_rental_write(
        &self,
        rental_id: &Ulid,
    ) -> Result<(Ulid, tokio::sync::OwnedRwLockWriteGuard<CarState>), EngineError> {
        let not_found = EngineError::NotFound {
            entity: "rental",
            id: *rental_id,
        };
        let car_id = self.car_for_rental(rental_id).ok_or(not_found)?;
        let cs = self.get_car_state(&car_id).ok_or(EngineError::NotFound {
            entity: "car",
            id: car_id,
        })?;
        let guard = cs.write_owned().await;
        // Deleted while we waited for the lock.
        if guard.rental(*rental_id).is_none() {
            return Err(EngineError::NotFound {
                entity: "rental",
                id: *rental_id,
            });
        }
        Ok((car_id, guard))
    }
}

/// Car id for events applied under a car lock; `CarRegistered` is catalog-level.
fn car_scoped(event: &Event) -> Option<Ulid> {
    match event {
        Event::CarRegistered { .. } => None,
        other => other.car_id(),
    }
}
