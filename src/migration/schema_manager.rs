//! SchemaManager - schema operations available to migrations

use crate::executor::{DbError, DbExecutor};
use sea_query::{
    IndexCreateStatement, IndexDropStatement, PostgresQueryBuilder, TableAlterStatement,
    TableCreateStatement, TableDropStatement,
};

/// Renders sea-query DDL for PostgreSQL and runs it through the executor.
pub struct SchemaManager<'a> {
    executor: &'a dyn DbExecutor,
}

impl<'a> SchemaManager<'a> {
    pub fn new(executor: &'a dyn DbExecutor) -> Self {
        Self { executor }
    }

    /// Create a table
    ///
    /// # Example
    /// ```rust,no_run
    /// # use quartermaster::migration::SchemaManager;
    /// # fn run(manager: &SchemaManager<'_>) -> Result<(), quartermaster::DbError> {
    /// use sea_query::{ColumnDef, Table};
    ///
    /// let table = Table::create()
    ///     .table("suppliers")
    ///     .col(ColumnDef::new("id").uuid().not_null().primary_key())
    ///     .to_owned();
    /// manager.create_table(table)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn create_table(&self, table: TableCreateStatement) -> Result<(), DbError> {
        self.run(&table.build(PostgresQueryBuilder))
    }

    pub fn drop_table(&self, table: TableDropStatement) -> Result<(), DbError> {
        self.run(&table.build(PostgresQueryBuilder))
    }

    pub fn alter_table(&self, alter: TableAlterStatement) -> Result<(), DbError> {
        self.run(&alter.build(PostgresQueryBuilder))
    }

    pub fn create_index(&self, index: IndexCreateStatement) -> Result<(), DbError> {
        self.run(&index.build(PostgresQueryBuilder))
    }

    pub fn drop_index(&self, index: IndexDropStatement) -> Result<(), DbError> {
        self.run(&index.build(PostgresQueryBuilder))
    }

    /// Execute raw SQL
    pub fn execute(&self, sql: &str) -> Result<(), DbError> {
        self.run(sql)
    }

    pub fn executor(&self) -> &dyn DbExecutor {
        self.executor
    }

    fn run(&self, sql: &str) -> Result<(), DbError> {
        log::debug!("migration ddl: {sql}");
        self.executor.execute(sql, &[]).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::RecordingExecutor;
    use sea_query::{ColumnDef, Index, Table};

    #[test]
    fn test_create_table_renders_postgres_ddl() {
        let recorder = RecordingExecutor::default();
        let manager = SchemaManager::new(&recorder);
        manager
            .create_table(
                Table::create()
                    .table("suppliers")
                    .if_not_exists()
                    .col(ColumnDef::new("id").uuid().not_null().primary_key())
                    .to_owned(),
            )
            .unwrap();

        let statements = recorder.statements();
        assert_eq!(statements.len(), 1);
        assert!(statements[0].starts_with(r#"CREATE TABLE IF NOT EXISTS "suppliers""#));
        assert!(statements[0].contains(r#""id" uuid NOT NULL PRIMARY KEY"#));
    }

    #[test]
    fn test_index_and_drop_are_forwarded() {
        let recorder = RecordingExecutor::default();
        let manager = SchemaManager::new(&recorder);
        manager
            .create_index(
                Index::create()
                    .name("idx_suppliers_name")
                    .table("suppliers")
                    .col("name")
                    .to_owned(),
            )
            .unwrap();
        manager
            .drop_table(Table::drop().table("suppliers").to_owned())
            .unwrap();

        let statements = recorder.statements();
        assert!(statements[0].starts_with(r#"CREATE INDEX "idx_suppliers_name""#));
        assert_eq!(statements[1], r#"DROP TABLE "suppliers""#);
    }
}
