use crate::{Command, SessionError, TransactionKind, TransactionScope, ambient};
use keel_core::{
    Configuration, ConfigurationRegistry, ConnectionHandle, ConnectionState, Driver, Error,
    IsolationLevel, TransactionHandle, TransactionOf, redact_connection_string,
};
use std::fmt::{self, Debug, Display, Formatter};

/// Lifecycle of a session as seen from the outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// The physical connection was never opened.
    Unopened,
    Open,
    Closed,
}

impl Display for SessionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionState::Unopened => "unopened",
            SessionState::Open => "open",
            SessionState::Closed => "closed",
        })
    }
}

/// One logical session owning exactly one physical connection and its transaction.
///
/// The connection handle is created lazily on first use and reused for the lifetime of
/// the session, even across [`close`](Self::close) and reopen.
///
/// # Transactions
/// The session counts how many [`begin_transaction`](Self::begin_transaction) calls are not
/// yet matched by a commit or rollback, but holds a single physical transaction. Nested
/// levels join the outermost one:
/// - only the outermost commit or rollback reaches the driver;
/// - a nested commit or rollback only lowers the counter.
///
/// # Teardown
/// Closing a session with unfinished levels performs exactly one rollback before the
/// connection is closed, so a forgotten transaction never keeps locks alive. [`Drop`] runs
/// [`dispose`](Self::dispose), which makes this hold on every exit path.
///
/// # Blocking
/// Opening, committing, rolling back and executing commands block on the driver. From an
/// async runtime go through [`run_blocking`](crate::blocking::run_blocking).
pub struct ConnectionSession<D: Driver> {
    driver: D,
    configuration: Configuration,
    connection: Option<D::Connection>,
    transaction: Option<TransactionOf<D>>,
    transaction_depth: usize,
    opened: bool,
    disposed: bool,
}

impl<D: Driver> ConnectionSession<D> {
    /// Session for the configuration. Nothing is opened yet.
    pub fn new(driver: D, configuration: Configuration) -> Result<Self, SessionError> {
        configuration.expect_driver(D::NAME)?;
        Ok(Self {
            driver,
            configuration,
            connection: None,
            transaction: None,
            transaction_depth: 0,
            opened: false,
            disposed: false,
        })
    }

    pub fn from_url(driver: D, url: &str) -> Result<Self, SessionError> {
        Self::new(driver, Configuration::from_url(url)?)
    }

    /// Session for the configuration registered under `name`.
    pub fn from_registry(
        driver: D,
        registry: &ConfigurationRegistry,
        name: &str,
    ) -> Result<Self, SessionError> {
        let configuration = registry.resolve(name).inspect_err(|e| log::error!("{}", e))?;
        Self::new(driver, configuration.clone())
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    pub fn state(&self) -> SessionState {
        match &self.connection {
            Some(connection) if connection.is_open() => SessionState::Open,
            _ if self.opened => SessionState::Closed,
            _ => SessionState::Unopened,
        }
    }

    /// State of the physical handle, `None` until it is created.
    pub fn connection_state(&self) -> Option<ConnectionState> {
        self.connection.as_ref().map(ConnectionHandle::state)
    }

    /// Number of begun transaction levels not yet committed or rolled back.
    pub fn transaction_depth(&self) -> usize {
        self.transaction_depth
    }

    pub fn in_transaction(&self) -> bool {
        self.transaction_depth > 0
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    fn check_disposed(&self) -> Result<(), SessionError> {
        if self.disposed {
            log::error!("Cannot use a disposed `{}` session", D::NAME);
            return Err(SessionError::Disposed);
        }
        Ok(())
    }

    fn connection_error(&self, error: Error) -> SessionError {
        log::error!("{:#}", error);
        SessionError::connection(self.configuration.locale(), error)
    }

    fn handle(&mut self) -> Result<&mut D::Connection, SessionError> {
        let locale = self.configuration.locale();
        self.connection.as_mut().ok_or_else(|| {
            let error = Error::msg("The connection handle was not created");
            log::error!("{:#}", error);
            SessionError::connection(locale, error)
        })
    }

    /// Make sure the physical connection exists and is open.
    ///
    /// Creates the handle on first use, then opens it when closed. An already open
    /// connection is left untouched, including its transaction. While an
    /// [ambient transaction](crate::ambient) is active the handle is prepared but opening
    /// is left to the coordinator. Every fresh open starts with no transaction.
    pub fn ensure_open(&mut self) -> Result<(), SessionError> {
        self.check_disposed()?;
        if self.connection.is_none() {
            let connection = self
                .driver
                .new_connection(&self.configuration)
                .map_err(|e| self.connection_error(e))?;
            log::debug!("Created a `{}` connection handle", D::NAME);
            self.connection = Some(connection);
        }
        let state = self.handle()?.state();
        match state {
            ConnectionState::Open => return Ok(()),
            ConnectionState::Broken => {
                log::warn!("The `{}` connection is broken, reopening it", D::NAME);
                if let Err(e) = self.handle()?.close() {
                    log::error!("{:#}", e);
                }
            }
            ConnectionState::Closed => {}
        }
        let connection_string = self.configuration.connection_string().to_owned();
        let connection = self.handle()?;
        connection.set_connection_string(&connection_string);
        if ambient::is_active() {
            log::debug!(
                "Ambient transaction active, leaving the `{}` connection to its coordinator",
                D::NAME
            );
        } else {
            if let Err(e) = connection.open() {
                return Err(self.connection_error(e));
            }
            self.opened = true;
            log::debug!(
                "Opened the `{}` connection to `{}`",
                D::NAME,
                redact_connection_string(&connection_string)
            );
        }
        self.reset_transaction();
        Ok(())
    }

    /// Close the physical connection, rolling back an unfinished transaction first.
    ///
    /// A no-op when the connection was never created or is already closed. The handle is
    /// kept and a later [`ensure_open`](Self::ensure_open) reopens it. A failed rollback
    /// does not prevent closing: every step runs and the first error is returned.
    pub fn close(&mut self) -> Result<(), SessionError> {
        let locale = self.configuration.locale();
        let depth = self.transaction_depth;
        let transaction = self.transaction.take();
        let Some(connection) = self.connection.as_mut() else {
            self.reset_transaction();
            return Ok(());
        };
        let mut result = Ok(());
        if connection.state() != ConnectionState::Closed {
            if let Some(transaction) = transaction.filter(|_| depth > 0) {
                log::warn!(
                    "Closing the `{}` connection with {} unfinished transaction level(s), rolling back",
                    D::NAME,
                    depth
                );
                if let Err(e) = connection.rollback(transaction) {
                    log::error!("{:#}", e);
                    result = Err(SessionError::transaction(TransactionKind::Rollback, e));
                }
            }
            match connection.close() {
                Ok(()) => log::debug!("Closed the `{}` connection", D::NAME),
                Err(e) => {
                    log::error!("{:#}", e);
                    if result.is_ok() {
                        result = Err(SessionError::connection(locale, e));
                    }
                }
            }
        }
        self.reset_transaction();
        result
    }

    /// Close the session for good and release the connection handle.
    ///
    /// Idempotent, called by [`Drop`]. Every later operation fails with
    /// [`SessionError::Disposed`].
    pub fn dispose(&mut self) -> Result<(), SessionError> {
        if self.disposed {
            return Ok(());
        }
        let result = self.close();
        self.reset_transaction();
        self.connection = None;
        self.disposed = true;
        log::debug!("Disposed the `{}` session", D::NAME);
        result
    }

    fn reset_transaction(&mut self) {
        if self.transaction.take().is_some() {
            log::warn!("Released a stale `{}` transaction handle", D::NAME);
        }
        self.transaction_depth = 0;
    }

    /// Begin a transaction level, opening the connection if needed.
    ///
    /// At level 0 the driver starts a physical transaction with `isolation_level`. Deeper
    /// levels join it, a different isolation level is ignored with a warning.
    pub fn begin_transaction(
        &mut self,
        isolation_level: IsolationLevel,
    ) -> Result<TransactionScope<'_, D>, SessionError> {
        self.handle_transaction(TransactionKind::Begin, isolation_level)?;
        Ok(TransactionScope::new(self, isolation_level))
    }

    /// [`begin_transaction`](Self::begin_transaction) with the configured isolation level.
    pub fn begin_transaction_default(&mut self) -> Result<TransactionScope<'_, D>, SessionError> {
        let isolation_level = self.configuration.isolation_level();
        self.begin_transaction(isolation_level)
    }

    /// Commit the innermost level. Prefer [`TransactionScope::commit`].
    pub fn commit_transaction(&mut self) -> Result<(), SessionError> {
        self.handle_transaction(TransactionKind::Commit, IsolationLevel::Unspecified)
    }

    /// Roll back the innermost level. Prefer [`TransactionScope::rollback`].
    pub fn rollback_transaction(&mut self) -> Result<(), SessionError> {
        self.handle_transaction(TransactionKind::Rollback, IsolationLevel::Unspecified)
    }

    /// Single entry point for transaction demarcation. `isolation_level` only matters
    /// when beginning.
    pub fn handle_transaction(
        &mut self,
        kind: TransactionKind,
        isolation_level: IsolationLevel,
    ) -> Result<(), SessionError> {
        match kind {
            TransactionKind::Begin => self.begin(isolation_level),
            TransactionKind::Commit | TransactionKind::Rollback => self.finish(kind),
        }
    }

    fn begin(&mut self, isolation_level: IsolationLevel) -> Result<(), SessionError> {
        self.ensure_open()?;
        match &self.transaction {
            Some(active) => {
                if active.isolation_level() != isolation_level {
                    log::warn!(
                        "Nested transaction asked for {} but joins the active {} transaction",
                        isolation_level,
                        active.isolation_level()
                    );
                }
            }
            None => {
                let transaction = self
                    .handle()?
                    .begin_transaction(isolation_level)
                    .map_err(|e| {
                        log::error!("{:#}", e);
                        SessionError::transaction(TransactionKind::Begin, e)
                    })?;
                self.transaction = Some(transaction);
            }
        }
        self.transaction_depth += 1;
        log::debug!(
            "Began transaction level {} ({})",
            self.transaction_depth,
            isolation_level
        );
        Ok(())
    }

    fn finish(&mut self, kind: TransactionKind) -> Result<(), SessionError> {
        self.check_disposed()?;
        if self.transaction_depth == 0 || self.transaction.is_none() {
            if self.transaction_depth != 0 || self.transaction.is_some() {
                log::error!(
                    "Transaction state is inconsistent: level {} with{} a transaction handle",
                    self.transaction_depth,
                    if self.transaction.is_some() { "" } else { "out" }
                );
            }
            log::error!("Cannot {} without an active transaction", kind);
            return Err(SessionError::NoActiveTransaction);
        }
        if self.transaction_depth > 1 {
            log::debug!(
                "Finished nested transaction level {} ({})",
                self.transaction_depth,
                kind
            );
            self.transaction_depth -= 1;
            return Ok(());
        }
        let transaction = self.transaction.take();
        self.transaction_depth = 0;
        let (Some(transaction), Some(connection)) = (transaction, self.connection.as_mut()) else {
            return Err(SessionError::NoActiveTransaction);
        };
        let result = if kind == TransactionKind::Commit {
            connection.commit(transaction)
        } else {
            connection.rollback(transaction)
        };
        result.map_err(|e| {
            log::error!("{:#}", e);
            SessionError::transaction(kind, e)
        })?;
        log::debug!("Transaction {} done", kind);
        Ok(())
    }

    /// Drop the levels above `level` that were abandoned without commit or rollback.
    pub(crate) fn abandon_levels_above(&mut self, level: usize) {
        if self.transaction_depth > level {
            log::warn!(
                "Abandoning {} unfinished transaction level(s) above level {}",
                self.transaction_depth - level,
                level
            );
            self.transaction_depth = level;
        }
    }

    /// Command bound to the connection and, when a transaction is active, to it.
    ///
    /// Opens the connection when it is closed, so creating a command may hit the
    /// network. A command created outside of a transaction never joins one.
    pub fn create_command(&mut self) -> Result<Command<'_, D>, SessionError> {
        self.check_disposed()?;
        match self.connection_state() {
            None | Some(ConnectionState::Broken) => self.ensure_open()?,
            Some(ConnectionState::Closed) => {
                if let Err(e) = self.handle()?.open() {
                    return Err(self.connection_error(e));
                }
                self.opened = true;
                log::debug!("Opened the `{}` connection to create a command", D::NAME);
            }
            Some(ConnectionState::Open) => {}
        }
        let transaction = if self.transaction_depth > 0 {
            self.transaction.as_ref()
        } else {
            None
        };
        let Some(connection) = self.connection.as_mut() else {
            return Err(SessionError::connection(
                self.configuration.locale(),
                Error::msg("The connection handle was not created"),
            ));
        };
        Ok(Command::new(connection, transaction))
    }

    /// Empty data adapter from the driver.
    pub fn create_data_adapter(&self) -> D::DataAdapter {
        self.driver.data_adapter()
    }
}

impl<D: Driver> Drop for ConnectionSession<D> {
    fn drop(&mut self) {
        if let Err(e) = self.dispose() {
            log::error!("Error while disposing the `{}` session: {}", D::NAME, e);
        }
    }
}

impl<D: Driver> Debug for ConnectionSession<D> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSession")
            .field("driver", &D::NAME)
            .field("state", &self.state())
            .field("transaction_depth", &self.transaction_depth)
            .field("disposed", &self.disposed)
            .finish()
    }
}
