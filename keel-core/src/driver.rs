use crate::{Configuration, ConnectionHandle, DataAdapter, Result};

/// A provider of physical connections and data adapters for one database backend.
///
/// The session layer never talks to a database directly: it asks the driver for a
/// [`ConnectionHandle`] once per session and drives everything through it.
pub trait Driver {
    type Connection: ConnectionHandle;
    type DataAdapter: DataAdapter;

    /// Identifier matched against [`Configuration::driver`] and the connection URL scheme.
    const NAME: &'static str;

    /// Create a connection handle for the configuration. The handle starts closed.
    fn new_connection(&self, configuration: &Configuration) -> Result<Self::Connection>;

    /// Create an empty data adapter, not bound to any connection.
    fn data_adapter(&self) -> Self::DataAdapter;
}

/// Transaction handle produced by the connections of driver `D`.
pub type TransactionOf<D> = <<D as Driver>::Connection as ConnectionHandle>::Transaction;
