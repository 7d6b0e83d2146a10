//! The quartermaster schema, one module per migration.

mod m20250301000001_create_reference_tables;
mod m20250301000002_create_properties;
mod m20250301000003_create_inventories;
mod m20250301000004_create_transfers_and_maintenance;

use super::Migration;

/// Every migration, in version order.
pub fn all() -> Vec<Box<dyn Migration>> {
    vec![
        Box::new(m20250301000001_create_reference_tables::CreateReferenceTables),
        Box::new(m20250301000002_create_properties::CreateProperties),
        Box::new(m20250301000003_create_inventories::CreateInventories),
        Box::new(m20250301000004_create_transfers_and_maintenance::CreateTransfersAndMaintenance),
    ]
}
