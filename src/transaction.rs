use crate::{Command, ConnectionSession, SessionError};
use keel_core::{Driver, IsolationLevel};
use std::fmt::{self, Display, Formatter};

/// Operation requested from the session's transaction handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum TransactionKind {
    Begin = 1,
    Commit = 2,
    Rollback = 3,
}

impl TryFrom<i32> for TransactionKind {
    type Error = SessionError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(TransactionKind::Begin),
            2 => Ok(TransactionKind::Commit),
            3 => Ok(TransactionKind::Rollback),
            v => Err(SessionError::InvalidTransactionKind(v)),
        }
    }
}

impl Display for TransactionKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransactionKind::Begin => "begin",
            TransactionKind::Commit => "commit",
            TransactionKind::Rollback => "roll back",
        })
    }
}

/// One level of transaction nesting, returned by [`ConnectionSession::begin_transaction`].
///
/// The scope borrows the session for as long as it lives, commands meant to run in
/// the transaction are created through it. It does not own the transaction: the session
/// does. Dropping a scope that was never finalized leaves the nesting counter raised and
/// the session rolls the transaction back when it is closed.
///
/// A scope commits only when every level it opened was finished. With an abandoned nested
/// level still counted, [`commit`](Self::commit) fails with
/// [`SessionError::UnfinishedNestedTransaction`] and leaves the scope open, while
/// [`rollback`](Self::rollback) discards the abandoned levels together with its own.
pub struct TransactionScope<'s, D: Driver> {
    session: &'s mut ConnectionSession<D>,
    isolation_level: IsolationLevel,
    depth: usize,
    finalized: bool,
}

impl<'s, D: Driver> TransactionScope<'s, D> {
    pub(crate) fn new(session: &'s mut ConnectionSession<D>, isolation_level: IsolationLevel) -> Self {
        let depth = session.transaction_depth();
        Self {
            session,
            isolation_level,
            depth,
            finalized: false,
        }
    }

    pub fn commit(&mut self) -> Result<(), SessionError> {
        self.finalize(TransactionKind::Commit)
    }

    pub fn rollback(&mut self) -> Result<(), SessionError> {
        self.finalize(TransactionKind::Rollback)
    }

    fn finalize(&mut self, kind: TransactionKind) -> Result<(), SessionError> {
        self.check_finalized()?;
        let depth = self.session.transaction_depth();
        if depth > self.depth {
            if kind == TransactionKind::Commit {
                log::error!(
                    "Cannot commit transaction level {}, level {} was dropped without commit or rollback",
                    self.depth,
                    depth
                );
                return Err(SessionError::UnfinishedNestedTransaction {
                    level: self.depth,
                    depth,
                });
            }
            self.session.abandon_levels_above(self.depth);
        }
        self.finalized = true;
        self.session.handle_transaction(kind, self.isolation_level)
    }

    fn check_finalized(&self) -> Result<(), SessionError> {
        if self.finalized {
            log::error!(
                "Transaction scope at level {} was already finalized",
                self.depth
            );
            return Err(SessionError::TransactionAlreadyFinalized);
        }
        Ok(())
    }

    /// Command bound to the session's connection and to this transaction.
    pub fn create_command(&mut self) -> Result<Command<'_, D>, SessionError> {
        self.check_finalized()?;
        self.session.create_command()
    }

    /// Open a nested level. See [`ConnectionSession::begin_transaction`] for the semantics.
    pub fn begin_transaction(
        &mut self,
        isolation_level: IsolationLevel,
    ) -> Result<TransactionScope<'_, D>, SessionError> {
        self.check_finalized()?;
        self.session.begin_transaction(isolation_level)
    }

    /// Nested level with the session's configured isolation level.
    pub fn begin_transaction_default(&mut self) -> Result<TransactionScope<'_, D>, SessionError> {
        self.check_finalized()?;
        self.session.begin_transaction_default()
    }

    pub fn isolation_level(&self) -> IsolationLevel {
        self.isolation_level
    }

    /// Nesting level this scope opened, starting from 1.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn session(&self) -> &ConnectionSession<D> {
        self.session
    }
}

impl<D: Driver> Drop for TransactionScope<'_, D> {
    fn drop(&mut self) {
        if !self.finalized {
            log::warn!(
                "Transaction scope at level {} dropped without commit or rollback, it will be rolled back when the session closes",
                self.depth
            );
        }
    }
}
