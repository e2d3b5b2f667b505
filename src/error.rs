use crate::TransactionKind;
use keel_core::{ConfigurationError, Error, Locale, is_driver_error};
use std::fmt::{self, Display, Formatter};
use thiserror::Error;

/// What went wrong underneath a [`SessionError::Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionFailure {
    /// The database reported the failure.
    Driver,
    /// Anything else: environment, driver bug, invalid handle state.
    Unexpected,
}

impl Display for ConnectionFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectionFailure::Driver => "driver reported failure",
            ConnectionFailure::Unexpected => "unexpected failure",
        })
    }
}

/// Stable error kinds surfaced by the session layer. Nothing is retried.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("{message} ({cause})")]
    Connection {
        /// Localized, user facing message.
        message: &'static str,
        cause: ConnectionFailure,
        #[source]
        source: Error,
    },
    #[error("Could not {kind} the transaction")]
    Transaction {
        kind: TransactionKind,
        #[source]
        source: Error,
    },
    #[error("Could not execute the command")]
    Command {
        #[source]
        source: Error,
    },
    #[error("There is no active transaction")]
    NoActiveTransaction,
    #[error("The transaction was already committed or rolled back")]
    TransactionAlreadyFinalized,
    #[error("Unknown transaction operation {0}")]
    InvalidTransactionKind(i32),
    #[error("Cannot commit transaction level {level} while level {depth} is unfinished")]
    UnfinishedNestedTransaction { level: usize, depth: usize },
    #[error("The session was disposed")]
    Disposed,
    #[error("The blocking worker running the session crashed")]
    WorkerCrashed,
}

impl SessionError {
    pub(crate) fn connection(locale: Locale, source: Error) -> Self {
        let cause = if is_driver_error(&source) {
            ConnectionFailure::Driver
        } else {
            ConnectionFailure::Unexpected
        };
        SessionError::Connection {
            message: locale.connection_failed(),
            cause,
            source,
        }
    }

    pub(crate) fn transaction(kind: TransactionKind, source: Error) -> Self {
        SessionError::Transaction { kind, source }
    }

    pub(crate) fn command(source: Error) -> Self {
        SessionError::Command { source }
    }

    /// Whether the error comes from misuse of the API rather than from the database.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            SessionError::NoActiveTransaction
                | SessionError::TransactionAlreadyFinalized
                | SessionError::InvalidTransactionKind(..)
                | SessionError::UnfinishedNestedTransaction { .. }
                | SessionError::Disposed
        )
    }
}
