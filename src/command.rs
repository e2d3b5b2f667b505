use crate::SessionError;
use keel_core::{
    ConnectionHandle, Context, DataAdapter, Driver, RowLabeled, RowsAffected, Statement,
    TransactionOf, Value, truncate_long,
};

/// Statement bound to a session's connection and, optionally, to its transaction.
///
/// Created by [`ConnectionSession::create_command`](crate::ConnectionSession::create_command)
/// or [`TransactionScope::create_command`](crate::TransactionScope::create_command). The
/// binding is decided at creation: a command created outside of a transaction never joins
/// one begun afterwards, the borrow on the session makes that impossible anyway.
pub struct Command<'s, D: Driver> {
    connection: &'s mut D::Connection,
    transaction: Option<&'s TransactionOf<D>>,
    statement: Statement,
}

impl<'s, D: Driver> Command<'s, D> {
    pub(crate) fn new(
        connection: &'s mut D::Connection,
        transaction: Option<&'s TransactionOf<D>>,
    ) -> Self {
        Self {
            connection,
            transaction,
            statement: Default::default(),
        }
    }

    /// Replace the SQL text, keeping the bound parameters.
    pub fn sql(mut self, sql: impl Into<String>) -> Self {
        self.statement.sql = sql.into();
        self
    }

    /// Append a positional parameter.
    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.statement.bind(value);
        self
    }

    pub fn statement(&self) -> &Statement {
        &self.statement
    }

    pub fn statement_mut(&mut self) -> &mut Statement {
        &mut self.statement
    }

    /// Whether the command runs inside the session's transaction.
    pub fn is_transactional(&self) -> bool {
        self.transaction.is_some()
    }

    pub fn transaction(&self) -> Option<&TransactionOf<D>> {
        self.transaction
    }

    fn wrap<T>(&self, result: keel_core::Result<T>) -> Result<T, SessionError> {
        result
            .with_context(|| {
                format!(
                    "While executing the query:\n{}",
                    truncate_long!(self.statement.sql)
                )
            })
            .map_err(|e| {
                log::error!("{:#}", e);
                SessionError::command(e)
            })
    }

    /// Run the statement, returning the rows it modified.
    pub fn execute(&mut self) -> Result<RowsAffected, SessionError> {
        let result = self.connection.execute(&self.statement, self.transaction);
        self.wrap(result)
    }

    /// Run the statement and collect every row it returns.
    pub fn fetch(&mut self) -> Result<Vec<RowLabeled>, SessionError> {
        let result = self.connection.fetch(&self.statement, self.transaction);
        self.wrap(result)
    }

    /// First column of the first row, `None` when nothing is returned.
    pub fn scalar(&mut self) -> Result<Option<Value>, SessionError> {
        Ok(self
            .fetch()?
            .into_iter()
            .next()
            .and_then(|row| row.values.into_vec().into_iter().next()))
    }

    /// Run the statement and hand the rows to `adapter`, returning how many were added.
    pub fn fill(&mut self, adapter: &mut impl DataAdapter) -> Result<usize, SessionError> {
        let rows = self.fetch()?;
        let result = adapter.fill(rows);
        self.wrap(result)
    }
}
