use crate::executor::DbError;
use crate::migration::{Migration, SchemaManager};
use sea_query::{ColumnDef, ForeignKey, ForeignKeyAction, Index, Table};

pub struct CreateProperties;

impl Migration for CreateProperties {
    fn name(&self) -> &str {
        "create_properties"
    }

    fn version(&self) -> i64 {
        20250301000002
    }

    fn up(&self, manager: &SchemaManager<'_>) -> Result<(), DbError> {
        manager.create_table(
            Table::create()
                .table("properties")
                .if_not_exists()
                .col(ColumnDef::new("id").uuid().not_null().primary_key())
                .col(ColumnDef::new("name").string_len(255).not_null())
                .col(ColumnDef::new("description").text().null())
                .col(ColumnDef::new("property_type_id").uuid().not_null())
                .col(ColumnDef::new("location_id").uuid().not_null())
                .col(ColumnDef::new("assigned_user_id").uuid().null())
                .col(ColumnDef::new("inventory_number").string_len(64).not_null().unique_key())
                .col(ColumnDef::new("qr_code").string_len(128).not_null())
                .col(ColumnDef::new("barcode").string_len(13).not_null())
                .col(ColumnDef::new("cost").decimal_len(19, 4).null())
                .col(ColumnDef::new("balance_date").date().null())
                .col(ColumnDef::new("usage_period_months").integer().null())
                .col(ColumnDef::new("last_maintenance_date").date().null())
                .col(ColumnDef::new("expiry_date").date().null())
                .col(
                    ColumnDef::new("is_checked_in_last_inventory")
                        .boolean()
                        .not_null()
                        .default(false),
                )
                .col(ColumnDef::new("last_inventory_check_date").timestamp_with_time_zone().null())
                .col(ColumnDef::new("created_at").timestamp_with_time_zone().not_null())
                .foreign_key(
                    ForeignKey::create()
                        .name("fk_properties_type")
                        .from("properties", "property_type_id")
                        .to("property_types", "id")
                        .on_delete(ForeignKeyAction::Restrict),
                )
                .foreign_key(
                    ForeignKey::create()
                        .name("fk_properties_location")
                        .from("properties", "location_id")
                        .to("locations", "id")
                        .on_delete(ForeignKeyAction::Restrict),
                )
                .foreign_key(
                    ForeignKey::create()
                        .name("fk_properties_assigned_user")
                        .from("properties", "assigned_user_id")
                        .to("users", "id")
                        .on_delete(ForeignKeyAction::SetNull),
                )
                .to_owned(),
        )?;

        manager.create_index(
            Index::create()
                .name("idx_properties_location")
                .table("properties")
                .col("location_id")
                .if_not_exists()
                .to_owned(),
        )?;
        manager.create_index(
            Index::create()
                .name("idx_properties_assigned_user")
                .table("properties")
                .col("assigned_user_id")
                .if_not_exists()
                .to_owned(),
        )
    }

    fn down(&self, manager: &SchemaManager<'_>) -> Result<(), DbError> {
        manager.drop_table(Table::drop().table("properties").if_exists().to_owned())
    }
}
