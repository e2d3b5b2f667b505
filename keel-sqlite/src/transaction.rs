use keel_core::{IsolationLevel, TransactionHandle};

/// SQLite transaction, active on its connection until committed or rolled back.
#[derive(Debug)]
pub struct SqliteTransaction {
    pub(crate) isolation_level: IsolationLevel,
}

impl SqliteTransaction {
    /// Statement opening a transaction with the isolation level.
    ///
    /// SQLite is serializable across connections. Levels asking for stability take the
    /// write lock upfront so the transaction cannot fail later on lock upgrade.
    pub fn begin_statement(isolation_level: IsolationLevel) -> &'static str {
        match isolation_level {
            IsolationLevel::RepeatableRead
            | IsolationLevel::Serializable
            | IsolationLevel::Snapshot => "BEGIN IMMEDIATE",
            IsolationLevel::Unspecified
            | IsolationLevel::ReadUncommitted
            | IsolationLevel::ReadCommitted => "BEGIN DEFERRED",
        }
    }
}

impl TransactionHandle for SqliteTransaction {
    fn isolation_level(&self) -> IsolationLevel {
        self.isolation_level
    }
}
