use thiserror::Error;

/// A failure reported by the database itself, as opposed to a bug or an environment
/// problem inside the driver.
///
/// Drivers wrap it in [`Error`](crate::Error) so the session layer can tell the two
/// apart with `downcast_ref::<DriverError>()`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct DriverError {
    pub message: String,
    /// Backend status code (SQLSTATE, SQLite result code, ...) when available.
    pub code: Option<String>,
}

impl DriverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: impl ToString) -> Self {
        self.code = Some(code.to_string());
        self
    }
}

/// Whether the error chain contains a [`DriverError`].
pub fn is_driver_error(error: &crate::Error) -> bool {
    error.chain().any(|cause| cause.is::<DriverError>())
}

#[cfg(test)]
mod tests {
    use crate::{Context, DriverError, Error, is_driver_error};

    #[test]
    fn driver_error_is_found_through_context() {
        let error = Error::new(DriverError::new("no such table: t").with_code(1))
            .context("While executing SELECT * FROM t");
        assert!(is_driver_error(&error));
        let source = error.downcast_ref::<DriverError>().unwrap();
        assert_eq!(source.code.as_deref(), Some("1"));

        let error: Error = Err::<(), _>(std::fmt::Error)
            .context("formatting")
            .unwrap_err();
        assert!(!is_driver_error(&error));
    }
}
