//! Property transfers and their history.

mod common;

use common::World;
use quartermaster::model::Role;
use quartermaster::store::FailPoint;
use quartermaster::workflow::TransferWorkflow;
use quartermaster::WorkflowError;

#[test]
fn test_second_transfer_to_same_user_is_rejected() {
    let world = World::new();
    let property = world.register("INV-1", &world.warehouse);
    let transfers = TransferWorkflow::new(&world.store);

    transfers
        .transfer_to_user(&world.user, property.id)
        .expect("First transfer failed");
    let err = transfers
        .transfer_to_user(&world.user, property.id)
        .unwrap_err();

    assert!(matches!(err, WorkflowError::Validation(m) if m.contains("already assigned to you")));
    assert_eq!(world.store.transfer_count(), 1);
}

#[test]
fn test_each_transfer_writes_one_row() {
    let world = World::new();
    let property = world.register("INV-1", &world.warehouse);
    let transfers = TransferWorkflow::new(&world.store);
    let colleague = world.another(Role::User, None);

    for (n, actor) in [&world.user, &colleague, &world.manager].into_iter().enumerate() {
        let transfer = transfers.transfer_to_user(actor, property.id).unwrap();
        assert_eq!(world.store.transfer_count(), n + 1);
        assert_eq!(world.reload(&property).assigned_user_id, Some(transfer.to_user_id));
    }

    let history = transfers.history(&world.admin, property.id).unwrap();
    let holders: Vec<_> = history.iter().map(|t| t.to_user_id).collect();
    assert_eq!(holders, [world.user.id(), colleague.id(), world.manager.id()]);
    assert_eq!(history[1].from_user_id, world.user.id());
}

#[test]
fn test_return_to_warehouse_rejects_non_admins() {
    let world = World::new();
    let property = world.register("INV-1", &world.warehouse);
    let transfers = TransferWorkflow::new(&world.store);
    transfers.transfer_to_user(&world.user, property.id).unwrap();
    let before = world.reload(&property);

    for actor in [&world.user, &world.manager] {
        let err = transfers.return_to_warehouse(actor, property.id).unwrap_err();
        assert!(matches!(err, WorkflowError::Forbidden(_)));
    }
    assert_eq!(world.reload(&property), before);
    assert_eq!(world.store.transfer_count(), 1);
}

#[test]
fn test_failed_transfer_rolls_back() {
    let world = World::new();
    let property = world.register("INV-1", &world.warehouse);
    world.store.fail_next(FailPoint::InsertTransfer);

    let err = TransferWorkflow::new(&world.store)
        .transfer_to_user(&world.user, property.id)
        .unwrap_err();

    assert!(matches!(err, WorkflowError::Persistence(_)));
    assert_eq!(world.reload(&property), property);
    assert_eq!(world.store.transfer_count(), 0);
}
