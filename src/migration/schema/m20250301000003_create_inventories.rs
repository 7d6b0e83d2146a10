use crate::executor::DbError;
use crate::migration::{Migration, SchemaManager};
use sea_query::{ColumnDef, ForeignKey, ForeignKeyAction, Index, Table};

pub struct CreateInventories;

impl Migration for CreateInventories {
    fn name(&self) -> &str {
        "create_inventories"
    }

    fn version(&self) -> i64 {
        20250301000003
    }

    fn up(&self, manager: &SchemaManager<'_>) -> Result<(), DbError> {
        manager.create_table(
            Table::create()
                .table("inventories")
                .if_not_exists()
                .col(ColumnDef::new("id").uuid().not_null().primary_key())
                .col(ColumnDef::new("name").string_len(255).not_null())
                .col(ColumnDef::new("scope_kind").string_len(16).not_null())
                .col(ColumnDef::new("scope_user_id").uuid().null())
                .col(ColumnDef::new("location_id").uuid().not_null())
                .col(ColumnDef::new("start_date").timestamp_with_time_zone().not_null())
                .col(ColumnDef::new("end_date").timestamp_with_time_zone().null())
                .col(ColumnDef::new("is_completed").boolean().not_null().default(false))
                .col(ColumnDef::new("total_items").integer().not_null())
                .col(ColumnDef::new("checked_items").integer().not_null().default(0))
                .foreign_key(
                    ForeignKey::create()
                        .name("fk_inventories_location")
                        .from("inventories", "location_id")
                        .to("locations", "id")
                        .on_delete(ForeignKeyAction::Restrict),
                )
                .to_owned(),
        )?;

        manager.create_table(
            Table::create()
                .table("inventory_items")
                .if_not_exists()
                .col(ColumnDef::new("id").uuid().not_null().primary_key())
                .col(ColumnDef::new("inventory_id").uuid().not_null())
                .col(ColumnDef::new("property_id").uuid().not_null())
                .col(ColumnDef::new("is_checked").boolean().not_null().default(false))
                .col(ColumnDef::new("check_date").timestamp_with_time_zone().null())
                .col(ColumnDef::new("checked_by_id").uuid().null())
                .foreign_key(
                    ForeignKey::create()
                        .name("fk_inventory_items_inventory")
                        .from("inventory_items", "inventory_id")
                        .to("inventories", "id")
                        .on_delete(ForeignKeyAction::Cascade),
                )
                .foreign_key(
                    ForeignKey::create()
                        .name("fk_inventory_items_property")
                        .from("inventory_items", "property_id")
                        .to("properties", "id")
                        .on_delete(ForeignKeyAction::Cascade),
                )
                .to_owned(),
        )?;

        manager.create_index(
            Index::create()
                .name("idx_inventory_items_inventory_property")
                .table("inventory_items")
                .col("inventory_id")
                .col("property_id")
                .unique()
                .if_not_exists()
                .to_owned(),
        )
    }

    fn down(&self, manager: &SchemaManager<'_>) -> Result<(), DbError> {
        manager.drop_table(Table::drop().table("inventory_items").if_exists().to_owned())?;
        manager.drop_table(Table::drop().table("inventories").if_exists().to_owned())
    }
}
