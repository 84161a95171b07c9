use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use rust_decimal::Decimal;
use ulid::Ulid;

use rentcore::clock::ManualClock;
use rentcore::engine::{Engine, EngineError, NewRental, ReturnRequest};
use rentcore::model::{CarStatus, NewCar, RateType, RentalStatus, parse_ts};
use rentcore::notify::NotifyHub;

// ── Test infrastructure ──────────────────────────────────────

fn ts(s: &str) -> i64 {
    parse_ts(s).unwrap()
}

fn money(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

fn wal_path() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("rentcore_int_test_{}", Ulid::new()));
    std::fs::create_dir_all(&dir).unwrap();
    dir.join("rentals.wal")
}

fn start(path: &PathBuf, clock: &Arc<ManualClock>) -> Engine {
    Engine::with_clock(path.clone(), Arc::new(NotifyHub::new()), clock.clone()).unwrap()
}

struct Desk {
    customer: Ulid,
    car: Ulid,
}

/// A Compact car at 10.00/h, 50.00/day, 300.00/week with a 10% daily discount.
async fn open_desk(engine: &Engine) -> Desk {
    let category = Ulid::new();
    engine
        .create_category(category, "Compact".into(), Some(Decimal::from(10)), None)
        .await
        .unwrap();
    let customer = Ulid::new();
    engine
        .create_customer(customer, "Grace Hopper".into(), None)
        .await
        .unwrap();
    let car = Ulid::new();
    engine
        .register_car(
            car,
            NewCar {
                vin: "VF3ABCDEF12345678".into(),
                license_plate: "AB-123-CD".into(),
                brand: "Renault".into(),
                model: "Clio".into(),
                production_year: 2022,
                color: None,
                category_id: category,
                hourly_rate: money(1000),
                daily_rate: money(5000),
                weekly_rate: money(30000),
                mileage: 42_000,
            },
        )
        .await
        .unwrap();
    Desk { customer, car }
}

fn booking(desk: &Desk, from: &str, to: &str) -> NewRental {
    NewRental {
        customer_id: desk.customer,
        car_id: desk.car,
        start_at: ts(from),
        planned_end_at: ts(to),
        rate_type: RateType::Daily,
        notes: Some("airport pickup".into()),
    }
}

// ── Scenarios ────────────────────────────────────────────────

#[tokio::test]
async fn book_then_return_late() {
    let path = wal_path();
    let clock = Arc::new(ManualClock::new(ts("2026-01-01T08:00")));
    let engine = start(&path, &clock);
    let desk = open_desk(&engine).await;

    let rental = engine
        .create_rental(Ulid::new(), booking(&desk, "2026-01-01T10:00", "2026-01-05T10:00"))
        .await
        .unwrap();
    assert_eq!(rental.base_price(), money(18000));
    assert_eq!(engine.get_car(desk.car).await.unwrap().status, CarStatus::Rented);

    clock.set(ts("2026-01-05T13:00"));
    let returned = engine
        .return_rental(rental.id(), ReturnRequest::default())
        .await
        .unwrap();
    assert_eq!(returned.status(), RentalStatus::Returned);
    assert_eq!(returned.late_fee(), money(1500));
    assert_eq!(returned.total_price(), money(19500));
    assert_eq!(engine.get_car(desk.car).await.unwrap().status, CarStatus::Available);
}

#[tokio::test]
async fn overlapping_booking_refused() {
    let path = wal_path();
    let clock = Arc::new(ManualClock::new(ts("2026-01-01T08:00")));
    let engine = start(&path, &clock);
    let desk = open_desk(&engine).await;

    engine
        .create_rental(Ulid::new(), booking(&desk, "2026-01-01T10:00", "2026-01-05T10:00"))
        .await
        .unwrap();
    let err = engine
        .create_rental(Ulid::new(), booking(&desk, "2026-01-04T10:00", "2026-01-06T10:00"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));
    assert_eq!(engine.list_active_rentals().await.len(), 1);
}

#[tokio::test]
async fn cancel_releases_car_for_next_customer() {
    let path = wal_path();
    let clock = Arc::new(ManualClock::new(ts("2026-01-01T08:00")));
    let engine = start(&path, &clock);
    let desk = open_desk(&engine).await;

    let first = engine
        .create_rental(Ulid::new(), booking(&desk, "2026-01-01T10:00", "2026-01-05T10:00"))
        .await
        .unwrap();
    let canceled = engine.cancel_rental(first.id()).await.unwrap();
    assert_eq!(canceled.status(), RentalStatus::Canceled);
    assert_eq!(canceled.total_price(), canceled.base_price());

    let second = engine
        .create_rental(Ulid::new(), booking(&desk, "2026-01-02T10:00", "2026-01-03T10:00"))
        .await;
    assert!(second.is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_bookings_reserve_once() {
    let path = wal_path();
    let clock = Arc::new(ManualClock::new(ts("2026-01-01T08:00")));
    let engine = Arc::new(start(&path, &clock));
    let desk = open_desk(&engine).await;

    let mut handles = Vec::new();
    for day in 0..16 {
        let engine = engine.clone();
        // Disjoint windows still race for the one car.
        let from = ts("2026-02-01T10:00") + day * 86_400_000;
        let req = NewRental {
            start_at: from,
            planned_end_at: from + 3_600_000,
            ..booking(&desk, "2026-02-01T10:00", "2026-02-01T11:00")
        };
        handles.push(tokio::spawn(async move { engine.create_rental(Ulid::new(), req).await }));
    }

    let mut ok = 0;
    for h in handles {
        match h.await.unwrap() {
            Ok(_) => ok += 1,
            Err(e) => assert!(matches!(e, EngineError::CarUnavailable(_) | EngineError::Conflict(_))),
        }
    }
    assert_eq!(ok, 1);
    let report = engine.audit().await;
    assert!(report.is_clean(), "{report:?}");
    assert_eq!(report.active_rentals, 1);
}

// ── Durability ───────────────────────────────────────────────

#[tokio::test]
async fn restart_keeps_committed_rentals() {
    let path = wal_path();
    let clock = Arc::new(ManualClock::new(ts("2026-01-01T08:00")));
    let (desk, rental) = {
        let engine = start(&path, &clock);
        let desk = open_desk(&engine).await;
        let rental = engine
            .create_rental(Ulid::new(), booking(&desk, "2026-01-01T10:00", "2026-01-05T10:00"))
            .await
            .unwrap();
        (desk, rental)
    };

    let engine = start(&path, &clock);
    assert!(engine.replayed_events() >= 4);
    assert_eq!(engine.get_rental(rental.id()).await.unwrap(), rental);
    assert_eq!(engine.get_car(desk.car).await.unwrap().status, CarStatus::Rented);
    assert_eq!(engine.rentals_for_customer(desk.customer).await.unwrap().len(), 1);
}

#[tokio::test]
async fn restart_after_torn_write() {
    let path = wal_path();
    let clock = Arc::new(ManualClock::new(ts("2026-01-01T08:00")));
    let desk = {
        let engine = start(&path, &clock);
        open_desk(&engine).await
    };
    {
        let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(&[0xff, 0x00, 0x12]).unwrap();
    }

    let rental_id = Ulid::new();
    {
        let engine = start(&path, &clock);
        engine
            .create_rental(rental_id, booking(&desk, "2026-01-01T10:00", "2026-01-02T10:00"))
            .await
            .unwrap();
    }

    let engine = start(&path, &clock);
    assert_eq!(engine.get_rental(rental_id).await.unwrap().status(), RentalStatus::Active);
}
