//! PostgreSQL-backed store.
//!
//! Opt-in: set `QUARTERMASTER_TEST_DATABASE_URL` to a scratch database. The
//! embedded migrations are applied first; records use unique names so the
//! test can be rerun against the same database.

use quartermaster::config::DatabaseConfig;
use quartermaster::migration::startup_migrations;
use quartermaster::model::{Location, NewProperty, PropertyType, Role, User};
use quartermaster::store::PoolError;
use quartermaster::workflow::{AuditEngine, PropertyRegistry, TransferWorkflow};
use quartermaster::{
    connect, Actor, PgExecutor, PgPool, PgStore, Store, StoreProvider, WorkflowError,
};
use std::sync::Barrier;
use uuid::Uuid;

fn open_store() -> Option<PgStore<PgExecutor>> {
    let url = std::env::var("QUARTERMASTER_TEST_DATABASE_URL").ok()?;
    let executor = PgExecutor::new(connect(&url).expect("Failed to connect"));
    startup_migrations(&executor, Some(30)).expect("Failed to migrate");
    Some(PgStore::new(executor))
}

fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", &Uuid::new_v4().simple().to_string()[..12])
}

#[test]
fn test_audit_and_transfer_against_postgres() {
    let Some(store) = open_store() else {
        eprintln!("QUARTERMASTER_TEST_DATABASE_URL not set; skipping");
        return;
    };

    let location = Location::new(unique("loc"));
    let kind = PropertyType::new(unique("type"));
    store.insert_location(&location).unwrap();
    store.insert_property_type(&kind).unwrap();
    let admin = User::new(unique("admin"), "Admin", Role::Admin).at_location(location.id);
    store.insert_user(&admin).unwrap();
    let admin = Actor::new(admin);

    let number = unique("INV");
    let property = PropertyRegistry::new(&store)
        .create(
            &admin,
            NewProperty {
                name: "Scanner".into(),
                inventory_number: number.clone(),
                property_type_id: kind.id,
                location_id: location.id,
                ..NewProperty::default()
            },
        )
        .expect("Failed to create property");

    let audits = AuditEngine::new(&store);
    let audit = audits
        .create_for_location(&admin, "PG audit", location.id)
        .expect("Failed to create audit");
    let outcome = audits.check_item(&admin, audit.id, &number).unwrap();
    assert!(outcome.is_completed);
    assert!(store.inventory(audit.id).unwrap().unwrap().is_completed);

    let transfers = TransferWorkflow::new(&store);
    let transfer = transfers.transfer_to_user(&admin, property.id).unwrap();
    let err = transfers.transfer_to_user(&admin, property.id).unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)));

    let stored = store.property(property.id).unwrap().unwrap();
    assert_eq!(stored.assigned_user_id, Some(transfer.to_user_id));
    assert_eq!(store.transfers_for_property(property.id).unwrap().len(), 1);
}

#[test]
fn test_racing_last_checks_still_complete_the_audit() {
    let Some(store) = open_store() else {
        return;
    };
    let location = Location::new(unique("loc"));
    let kind = PropertyType::new(unique("type"));
    store.insert_location(&location).unwrap();
    store.insert_property_type(&kind).unwrap();
    let admin = User::new(unique("admin"), "Admin", Role::Admin).at_location(location.id);
    store.insert_user(&admin).unwrap();
    let admin = Actor::new(admin);

    let registry = PropertyRegistry::new(&store);
    let numbers: Vec<String> = (0..3).map(|_| unique("INV")).collect();
    for number in &numbers {
        registry
            .create(
                &admin,
                NewProperty {
                    name: "Monitor".into(),
                    inventory_number: number.clone(),
                    property_type_id: kind.id,
                    location_id: location.id,
                    ..NewProperty::default()
                },
            )
            .unwrap();
    }
    let audits = AuditEngine::new(&store);
    let audit = audits
        .create_for_location(&admin, "Race", location.id)
        .unwrap();
    audits.check_item(&admin, audit.id, &numbers[0]).unwrap();

    // each thread holds its own connection
    let barrier = Barrier::new(2);
    std::thread::scope(|scope| {
        for number in &numbers[1..] {
            let (barrier, admin) = (&barrier, admin.clone());
            scope.spawn(move || {
                let own = open_store().expect("database vanished");
                barrier.wait();
                AuditEngine::new(&own)
                    .check_item(&admin, audit.id, number)
                    .expect("Failed to check item");
            });
        }
    });

    let stored = store.inventory(audit.id).unwrap().unwrap();
    assert_eq!(stored.checked_items, 3);
    assert!(stored.is_completed);
}

#[test]
fn test_racing_creates_report_the_duplicate() {
    let Some(store) = open_store() else {
        return;
    };
    let location = Location::new(unique("loc"));
    let kind = PropertyType::new(unique("type"));
    store.insert_location(&location).unwrap();
    store.insert_property_type(&kind).unwrap();
    let admin = User::new(unique("admin"), "Admin", Role::Admin);
    store.insert_user(&admin).unwrap();
    let admin = Actor::new(admin);
    let number = unique("INV");

    let barrier = Barrier::new(2);
    let results: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let (barrier, admin, number) = (&barrier, admin.clone(), number.clone());
                scope.spawn(move || {
                    let own = open_store().expect("database vanished");
                    barrier.wait();
                    PropertyRegistry::new(&own).create(
                        &admin,
                        NewProperty {
                            name: "Printer".into(),
                            inventory_number: number,
                            property_type_id: kind.id,
                            location_id: location.id,
                            ..NewProperty::default()
                        },
                    )
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("create thread panicked"))
            .collect()
    });

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    let err = results.into_iter().find_map(Result::err).unwrap();
    assert!(matches!(err, WorkflowError::Validation(m) if m.contains("already in use")));
}

#[test]
fn test_failed_unit_of_work_is_rolled_back() {
    let Some(store) = open_store() else {
        return;
    };
    let location = Location::new(unique("loc"));

    let result: Result<(), WorkflowError> = store.atomically(|s| {
        s.insert_location(&location)?;
        Err(WorkflowError::validation("abort"))
    });

    assert!(result.is_err());
    assert!(store.location(location.id).unwrap().is_none());
}

#[test]
fn test_pool_hands_out_healthy_connections_and_times_out() {
    // migrates the schema
    if open_store().is_none() {
        return;
    }
    let url = std::env::var("QUARTERMASTER_TEST_DATABASE_URL").unwrap();
    let pool = PgPool::open(&DatabaseConfig {
        url,
        max_connections: 1,
        pool_timeout_seconds: 1,
    })
    .expect("Failed to open pool");

    {
        let store = pool.acquire().expect("Failed to acquire");
        assert!(store.locations().is_ok());
        assert!(matches!(pool.acquire_connection(), Err(PoolError::Timeout(_))));
    }
    let store = pool.acquire().expect("Connection was not returned");
    assert!(store.locations().is_ok());
}
