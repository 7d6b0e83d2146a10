//! Inventory audits end to end over the in-memory store.

mod common;

use common::World;
use quartermaster::store::FailPoint;
use quartermaster::workflow::AuditEngine;
use quartermaster::{Store, WorkflowError};
use rand::seq::SliceRandom;
use rand::Rng;

#[test]
fn test_three_item_audit_completes_on_third_check() {
    let world = World::new();
    let items: Vec<_> = ["INV-1", "INV-2", "INV-3"]
        .iter()
        .map(|n| world.register(n, &world.warehouse))
        .collect();
    let audits = AuditEngine::new(&world.store);
    let audit = audits
        .create_for_location(&world.manager, "Year end", world.warehouse.id)
        .expect("Failed to create audit");
    assert_eq!(audit.total_items, 3);

    for (n, property) in items.iter().enumerate() {
        let outcome = audits
            .check_item(&world.manager, audit.id, &property.qr_code)
            .expect("Failed to check item");
        assert_eq!(outcome.checked_items, n as i32 + 1);
        assert!(outcome.checked_items <= outcome.total_items);
        assert_eq!(outcome.is_completed, n == 2, "after check {}", n + 1);
    }

    let stored = world.store.inventory(audit.id).unwrap().unwrap();
    assert!(stored.is_completed);
    assert!(stored.end_date.is_some());
    assert_eq!(stored.checked_items, 3);
}

#[test]
fn test_new_audit_resets_marks_from_previous_round() {
    let world = World::new();
    let property = world.register("INV-1", &world.warehouse);
    let audits = AuditEngine::new(&world.store);

    let first = audits
        .create_for_location(&world.admin, "Round 1", world.warehouse.id)
        .unwrap();
    audits.check_item(&world.admin, first.id, "INV-1").unwrap();
    assert!(world.reload(&property).is_checked_in_last_inventory);

    audits
        .create_for_location(&world.admin, "Round 2", world.warehouse.id)
        .unwrap();
    let reloaded = world.reload(&property);
    assert!(!reloaded.is_checked_in_last_inventory);
    assert!(reloaded.last_inventory_check_date.is_none());
}

#[test]
fn test_user_scoped_audit_follows_assignments() {
    let world = World::new();
    let mut held = world.register("INV-1", &world.office);
    world.register("INV-2", &world.office);
    held.assigned_user_id = Some(world.user.id());
    world.store.update_property(&held).unwrap();

    let audit = AuditEngine::new(&world.store)
        .create_for_user(&world.manager, "Desk check", world.user.id())
        .unwrap();
    assert_eq!(audit.total_items, 1);
    assert_eq!(audit.location_id, world.office.id);
}

#[test]
fn test_rejected_checks_leave_counts_untouched() {
    let world = World::new();
    world.register("INV-1", &world.warehouse);
    world.register("INV-2", &world.warehouse);
    let outside = world.register("INV-3", &world.office);
    let audits = AuditEngine::new(&world.store);
    let audit = audits
        .create_for_location(&world.admin, "Q", world.warehouse.id)
        .unwrap();
    audits.check_item(&world.admin, audit.id, "INV-1").unwrap();

    for code in ["INV-1", outside.qr_code.as_str()] {
        let err = audits.check_item(&world.admin, audit.id, code).unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
    }
    world.store.fail_next(FailPoint::CheckInventoryItem);
    assert!(audits.check_item(&world.admin, audit.id, "INV-2").is_err());

    let stored = world.store.inventory(audit.id).unwrap().unwrap();
    assert_eq!(stored.checked_items, 1);
    assert!(!stored.is_completed);
}

#[test]
fn test_check_order_does_not_matter() {
    let world = World::new();
    let mut rng = rand::thread_rng();
    let count = rng.gen_range(2..=8);
    let mut numbers: Vec<String> = (1..=count).map(|n| format!("INV-{n}")).collect();
    for number in &numbers {
        world.register(number, &world.warehouse);
    }
    let audits = AuditEngine::new(&world.store);
    let audit = audits
        .create_for_location(&world.admin, "Shuffled", world.warehouse.id)
        .unwrap();

    numbers.shuffle(&mut rng);
    for (n, number) in numbers.iter().enumerate() {
        let outcome = audits.check_item(&world.admin, audit.id, number).unwrap();
        assert_eq!(outcome.is_completed, n + 1 == count, "{numbers:?} at {number}");
    }
}

#[test]
fn test_concurrent_checks_complete_the_audit_once() {
    let world = World::new();
    let numbers: Vec<String> = (1..=6).map(|n| format!("INV-{n}")).collect();
    for number in &numbers {
        world.register(number, &world.warehouse);
    }
    let audits = AuditEngine::new(&world.store);
    let audit = audits
        .create_for_location(&world.admin, "Parallel", world.warehouse.id)
        .unwrap();

    let outcomes: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = numbers
            .iter()
            .map(|number| {
                let (store, admin) = (&world.store, &world.admin);
                scope.spawn(move || AuditEngine::new(store).check_item(admin, audit.id, number))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("check thread panicked").expect("Failed to check item"))
            .collect()
    });

    assert_eq!(outcomes.iter().filter(|o| o.is_completed).count(), 1);
    let stored = world.store.inventory(audit.id).unwrap().unwrap();
    assert_eq!(stored.checked_items, 6);
    assert!(stored.is_completed);
}
