use crate::executor::DbError;
use crate::migration::{Migration, SchemaManager};
use sea_query::{ColumnDef, ForeignKey, ForeignKeyAction, Index, Table};

pub struct CreateTransfersAndMaintenance;

impl Migration for CreateTransfersAndMaintenance {
    fn name(&self) -> &str {
        "create_transfers_and_maintenance"
    }

    fn version(&self) -> i64 {
        20250301000004
    }

    fn up(&self, manager: &SchemaManager<'_>) -> Result<(), DbError> {
        // Transfer history outlives the property it describes: no FK on property_id.
        manager.create_table(
            Table::create()
                .table("property_transfers")
                .if_not_exists()
                .col(ColumnDef::new("id").uuid().not_null().primary_key())
                .col(ColumnDef::new("property_id").uuid().not_null())
                .col(ColumnDef::new("from_user_id").uuid().not_null())
                .col(ColumnDef::new("to_user_id").uuid().not_null())
                .col(ColumnDef::new("transfer_date").timestamp_with_time_zone().not_null())
                .col(ColumnDef::new("notes").text().not_null())
                .to_owned(),
        )?;
        manager.create_index(
            Index::create()
                .name("idx_property_transfers_property")
                .table("property_transfers")
                .col("property_id")
                .if_not_exists()
                .to_owned(),
        )?;

        manager.create_table(
            Table::create()
                .table("maintenance_requests")
                .if_not_exists()
                .col(ColumnDef::new("id").uuid().not_null().primary_key())
                .col(ColumnDef::new("property_id").uuid().not_null())
                .col(ColumnDef::new("requested_by_id").uuid().not_null())
                .col(ColumnDef::new("assigned_to_user_id").uuid().null())
                .col(ColumnDef::new("status").string_len(16).not_null())
                .col(ColumnDef::new("description").text().not_null())
                .col(ColumnDef::new("request_date").timestamp_with_time_zone().not_null())
                .col(ColumnDef::new("assigned_date").timestamp_with_time_zone().null())
                .col(ColumnDef::new("completion_date").timestamp_with_time_zone().null())
                .col(ColumnDef::new("resolution_notes").text().null())
                .foreign_key(
                    ForeignKey::create()
                        .name("fk_maintenance_requests_property")
                        .from("maintenance_requests", "property_id")
                        .to("properties", "id")
                        .on_delete(ForeignKeyAction::Cascade),
                )
                .to_owned(),
        )
    }

    fn down(&self, manager: &SchemaManager<'_>) -> Result<(), DbError> {
        manager.drop_table(Table::drop().table("maintenance_requests").if_exists().to_owned())?;
        manager.drop_table(Table::drop().table("property_transfers").if_exists().to_owned())
    }
}
