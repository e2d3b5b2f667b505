use crate::SqliteConnection;
use keel_core::{Configuration, DataTable, Driver, Result};

#[derive(Default, Debug, Clone, Copy)]
pub struct SQLiteDriver {}

impl SQLiteDriver {
    pub const fn new() -> Self {
        Self {}
    }
}

impl Driver for SQLiteDriver {
    type Connection = SqliteConnection;
    type DataAdapter = DataTable;

    const NAME: &'static str = "sqlite";

    fn new_connection(&self, configuration: &Configuration) -> Result<SqliteConnection> {
        configuration.expect_driver(Self::NAME)?;
        Ok(SqliteConnection::new())
    }

    fn data_adapter(&self) -> DataTable {
        Default::default()
    }
}
