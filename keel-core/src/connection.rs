use crate::{IsolationLevel, Result, RowLabeled, RowsAffected, Statement, TransactionHandle};
use std::fmt::{self, Display, Formatter};

/// State reported by a physical connection handle.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Closed,
    Open,
    /// The link to the server was lost, the handle must be closed before reopening.
    Broken,
}

impl Display for ConnectionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectionState::Closed => "closed",
            ConnectionState::Open => "open",
            ConnectionState::Broken => "broken",
        })
    }
}

/// A physical connection produced by a [`Driver`](crate::Driver).
///
/// The handle object outlives open/close cycles: closing releases the server side
/// resources but the same handle can be given a connection string and opened again.
///
/// # Transactions
/// `begin_transaction` returns a handle that the caller must hand back to exactly one
/// of `commit` or `rollback` on the same connection. Commands run in a transaction by
/// receiving a reference to that handle.
pub trait ConnectionHandle: Send {
    type Transaction: TransactionHandle;

    fn set_connection_string(&mut self, connection_string: &str);

    fn connection_string(&self) -> &str;

    fn open(&mut self) -> Result<()>;

    /// Release the server side connection. Closing a closed handle is a no-op.
    fn close(&mut self) -> Result<()>;

    fn state(&self) -> ConnectionState;

    fn begin_transaction(&mut self, isolation_level: IsolationLevel) -> Result<Self::Transaction>;

    fn commit(&mut self, transaction: Self::Transaction) -> Result<()>;

    fn rollback(&mut self, transaction: Self::Transaction) -> Result<()>;

    /// Execute the statement and return the total number of rows affected.
    fn execute(
        &mut self,
        statement: &Statement,
        transaction: Option<&Self::Transaction>,
    ) -> Result<RowsAffected>;

    /// Execute the statement and return the rows.
    fn fetch(
        &mut self,
        statement: &Statement,
        transaction: Option<&Self::Transaction>,
    ) -> Result<Vec<RowLabeled>>;

    fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }
}
