//! Bridge for using a session from async code.
//!
//! Sessions block the calling thread on the driver. [`run_blocking`] moves a session onto
//! the tokio blocking pool, runs a unit of work on it and hands it back.

use crate::{ConnectionSession, SessionError};
use keel_core::Driver;
use tokio::task::spawn_blocking;

/// Run `work` against `session` on a blocking thread, returning the session with the result.
///
/// When `work` fails the session is dropped on the worker: an unfinished transaction is
/// rolled back and the connection closed before the error is returned. A panic inside
/// `work` unwinds through the session the same way and surfaces as
/// [`SessionError::WorkerCrashed`].
pub async fn run_blocking<D, F, R>(
    mut session: ConnectionSession<D>,
    work: F,
) -> Result<(ConnectionSession<D>, R), SessionError>
where
    D: Driver + Send + 'static,
    F: FnOnce(&mut ConnectionSession<D>) -> Result<R, SessionError> + Send + 'static,
    R: Send + 'static,
{
    spawn_blocking(move || {
        let result = work(&mut session)?;
        Ok((session, result))
    })
    .await
    .map_err(|e| {
        log::error!("The blocking worker failed: {}", e);
        SessionError::WorkerCrashed
    })?
}
