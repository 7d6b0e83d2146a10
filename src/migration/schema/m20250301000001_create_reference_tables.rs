use crate::executor::DbError;
use crate::migration::{Migration, SchemaManager};
use sea_query::{ColumnDef, ForeignKey, ForeignKeyAction, Table};

pub struct CreateReferenceTables;

impl Migration for CreateReferenceTables {
    fn name(&self) -> &str {
        "create_reference_tables"
    }

    fn version(&self) -> i64 {
        20250301000001
    }

    fn up(&self, manager: &SchemaManager<'_>) -> Result<(), DbError> {
        manager.create_table(
            Table::create()
                .table("locations")
                .if_not_exists()
                .col(ColumnDef::new("id").uuid().not_null().primary_key())
                .col(ColumnDef::new("name").string_len(255).not_null().unique_key())
                .col(ColumnDef::new("description").text().null())
                .to_owned(),
        )?;

        manager.create_table(
            Table::create()
                .table("property_types")
                .if_not_exists()
                .col(ColumnDef::new("id").uuid().not_null().primary_key())
                .col(ColumnDef::new("name").string_len(255).not_null().unique_key())
                .col(ColumnDef::new("description").text().null())
                .to_owned(),
        )?;

        manager.create_table(
            Table::create()
                .table("users")
                .if_not_exists()
                .col(ColumnDef::new("id").uuid().not_null().primary_key())
                .col(ColumnDef::new("username").string_len(255).not_null().unique_key())
                .col(ColumnDef::new("full_name").string_len(255).not_null())
                .col(ColumnDef::new("role").string_len(16).not_null())
                .col(ColumnDef::new("location_id").uuid().null())
                .foreign_key(
                    ForeignKey::create()
                        .name("fk_users_location")
                        .from("users", "location_id")
                        .to("locations", "id")
                        .on_delete(ForeignKeyAction::SetNull),
                )
                .to_owned(),
        )
    }

    fn down(&self, manager: &SchemaManager<'_>) -> Result<(), DbError> {
        manager.drop_table(Table::drop().table("users").if_exists().to_owned())?;
        manager.drop_table(Table::drop().table("property_types").if_exists().to_owned())?;
        manager.drop_table(Table::drop().table("locations").if_exists().to_owned())
    }
}
