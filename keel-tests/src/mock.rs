use keel::{
    Configuration, ConnectionHandle, ConnectionState, DataTable, Driver, DriverError, Error,
    IsolationLevel, Result, RowLabeled, RowsAffected, Statement, TransactionHandle,
};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

/// Driver operation that a [`MockDriver`] can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Open,
    Close,
    Begin,
    Commit,
    Rollback,
    Execute,
}

/// Flavor of an injected failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Reported as a [`DriverError`], like a database refusing the request.
    Driver,
    /// A plain error, like a broken environment.
    Unexpected,
}

/// Everything the driver was asked to do, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Created { connection_string: String },
    Open { connection_string: String },
    Close,
    Begin { id: u64, isolation_level: IsolationLevel },
    Commit { id: u64 },
    Rollback { id: u64 },
    Execute { sql: String, transaction: Option<u64> },
    Fetch { sql: String, transaction: Option<u64> },
}

#[derive(Default, Debug)]
struct Shared {
    events: Vec<Event>,
    faults: HashMap<Operation, Fault>,
    broken: bool,
    next_transaction: u64,
    rows: Vec<RowLabeled>,
}

impl Shared {
    fn check(&self, operation: Operation) -> Result<()> {
        match self.faults.get(&operation) {
            None => Ok(()),
            Some(Fault::Driver) => Err(Error::new(
                DriverError::new(format!("Mock {:?} failure", operation)).with_code("HY000"),
            )),
            Some(Fault::Unexpected) => Err(Error::msg(format!(
                "Mock {:?} unexpected failure",
                operation
            ))),
        }
    }
}

/// Recording driver with fault injection.
///
/// Clones share the same journal, keep one to inspect what a session did with the other.
#[derive(Default, Debug, Clone)]
pub struct MockDriver {
    shared: Arc<Mutex<Shared>>,
}

impl MockDriver {
    pub fn new() -> Self {
        Default::default()
    }

    fn shared(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn configuration() -> Configuration {
        Configuration::new(Self::NAME, "Server=mock;Database=keel;Pwd=secret")
    }

    pub fn events(&self) -> Vec<Event> {
        self.shared().events.clone()
    }

    pub fn clear_events(&self) {
        self.shared().events.clear();
    }

    /// Number of recorded events matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&Event) -> bool) -> usize {
        self.shared().events.iter().filter(|e| predicate(e)).count()
    }

    pub fn fail(&self, operation: Operation, fault: Fault) -> &Self {
        self.shared().faults.insert(operation, fault);
        self
    }

    pub fn heal(&self, operation: Operation) -> &Self {
        self.shared().faults.remove(&operation);
        self
    }

    /// Make every open connection report [`ConnectionState::Broken`] until it is closed.
    pub fn break_connections(&self) {
        self.shared().broken = true;
    }

    /// Rows returned by every fetch.
    pub fn set_rows(&self, rows: Vec<RowLabeled>) {
        self.shared().rows = rows;
    }
}

impl Driver for MockDriver {
    type Connection = MockConnection;
    type DataAdapter = DataTable;

    const NAME: &'static str = "mock";

    fn new_connection(&self, configuration: &Configuration) -> Result<MockConnection> {
        let mut shared = self.shared();
        shared.check(Operation::Create)?;
        shared.events.push(Event::Created {
            connection_string: configuration.connection_string().into(),
        });
        Ok(MockConnection {
            shared: self.shared.clone(),
            connection_string: String::new(),
            open: false,
        })
    }

    fn data_adapter(&self) -> DataTable {
        Default::default()
    }
}

#[derive(Debug)]
pub struct MockConnection {
    shared: Arc<Mutex<Shared>>,
    connection_string: String,
    open: bool,
}

impl MockConnection {
    fn shared(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_open(&self) -> Result<()> {
        if !self.open {
            return Err(Error::msg("The mock connection is not open"));
        }
        Ok(())
    }
}

impl ConnectionHandle for MockConnection {
    type Transaction = MockTransaction;

    fn set_connection_string(&mut self, connection_string: &str) {
        self.connection_string = connection_string.into();
    }

    fn connection_string(&self) -> &str {
        &self.connection_string
    }

    fn open(&mut self) -> Result<()> {
        let connection_string = self.connection_string.clone();
        let mut shared = self.shared();
        shared.check(Operation::Open)?;
        shared.events.push(Event::Open { connection_string });
        drop(shared);
        self.open = true;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let mut shared = self.shared();
        shared.check(Operation::Close)?;
        shared.events.push(Event::Close);
        shared.broken = false;
        drop(shared);
        self.open = false;
        Ok(())
    }

    fn state(&self) -> ConnectionState {
        match self.open {
            false => ConnectionState::Closed,
            true if self.shared().broken => ConnectionState::Broken,
            true => ConnectionState::Open,
        }
    }

    fn begin_transaction(&mut self, isolation_level: IsolationLevel) -> Result<MockTransaction> {
        self.check_open()?;
        let mut shared = self.shared();
        shared.check(Operation::Begin)?;
        shared.next_transaction += 1;
        let id = shared.next_transaction;
        shared.events.push(Event::Begin {
            id,
            isolation_level,
        });
        Ok(MockTransaction {
            id,
            isolation_level,
        })
    }

    fn commit(&mut self, transaction: MockTransaction) -> Result<()> {
        let mut shared = self.shared();
        shared.check(Operation::Commit)?;
        shared.events.push(Event::Commit { id: transaction.id });
        Ok(())
    }

    fn rollback(&mut self, transaction: MockTransaction) -> Result<()> {
        let mut shared = self.shared();
        shared.check(Operation::Rollback)?;
        shared.events.push(Event::Rollback { id: transaction.id });
        Ok(())
    }

    fn execute(
        &mut self,
        statement: &Statement,
        transaction: Option<&MockTransaction>,
    ) -> Result<RowsAffected> {
        self.check_open()?;
        let mut shared = self.shared();
        shared.check(Operation::Execute)?;
        shared.events.push(Event::Execute {
            sql: statement.sql.clone(),
            transaction: transaction.map(MockTransaction::id),
        });
        Ok(RowsAffected {
            rows_affected: 1,
            last_affected_id: None,
        })
    }

    fn fetch(
        &mut self,
        statement: &Statement,
        transaction: Option<&MockTransaction>,
    ) -> Result<Vec<RowLabeled>> {
        self.check_open()?;
        let mut shared = self.shared();
        shared.check(Operation::Execute)?;
        shared.events.push(Event::Fetch {
            sql: statement.sql.clone(),
            transaction: transaction.map(MockTransaction::id),
        });
        Ok(shared.rows.clone())
    }
}

#[derive(Debug)]
pub struct MockTransaction {
    id: u64,
    isolation_level: IsolationLevel,
}

impl MockTransaction {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl TransactionHandle for MockTransaction {
    fn isolation_level(&self) -> IsolationLevel {
        self.isolation_level
    }
}
