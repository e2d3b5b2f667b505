use crate::IsolationLevel;

/// A physical transaction started on a [`ConnectionHandle`](crate::ConnectionHandle).
///
/// The handle itself carries no behavior: commit and rollback go through the connection
/// that created it, which consumes the handle.
pub trait TransactionHandle: Send {
    fn isolation_level(&self) -> IsolationLevel;
}
