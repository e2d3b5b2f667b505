use crate::{CBox, SQLitePrepared, SqliteTransaction, sqlite_error};
use keel_core::{
    ConnectionHandle, ConnectionState, Context, DriverError, Error, IsolationLevel, Result,
    RowLabeled, RowsAffected, Statement, truncate_long,
};
use libsqlite3_sys::{
    SQLITE_CANTOPEN, SQLITE_CORRUPT, SQLITE_IOERR, SQLITE_NOTADB, SQLITE_OK, SQLITE_OPEN_CREATE,
    SQLITE_OPEN_MEMORY, SQLITE_OPEN_READONLY, SQLITE_OPEN_READWRITE, sqlite3, sqlite3_busy_timeout,
    sqlite3_changes64, sqlite3_close, sqlite3_exec, sqlite3_get_autocommit,
    sqlite3_last_insert_rowid, sqlite3_open_v2,
};
use std::{
    ffi::{CString, c_int},
    ptr,
};

/// Milliseconds to wait on a database locked by another connection.
const BUSY_TIMEOUT: c_int = 5_000;

/// Physical SQLite connection, closed until [`open`](ConnectionHandle::open) is called.
///
/// The connection string is a path, or `:memory:`, optionally followed by
/// `?mode=ro|rw|rwc|memory` (`rwc` when omitted).
pub struct SqliteConnection {
    connection: Option<CBox<*mut sqlite3>>,
    connection_string: String,
    broken: bool,
}

impl SqliteConnection {
    pub(crate) fn new() -> Self {
        Self {
            connection: None,
            connection_string: String::new(),
            broken: false,
        }
    }

    fn db(&self) -> Result<*mut sqlite3> {
        match &self.connection {
            Some(connection) => Ok(**connection),
            None => Err(Error::msg("The sqlite connection is not open")),
        }
    }

    /// Remember failures that leave the database unusable.
    fn track<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(error) = &result {
            let fatal = error
                .chain()
                .filter_map(|e| e.downcast_ref::<DriverError>())
                .filter_map(|e| e.code.as_deref()?.parse::<c_int>().ok())
                .any(|code| {
                    matches!(
                        code & 0xff,
                        SQLITE_IOERR | SQLITE_CORRUPT | SQLITE_NOTADB | SQLITE_CANTOPEN
                    )
                });
            if fatal {
                log::warn!("The sqlite connection is broken: {:#}", error);
                self.broken = true;
            }
        }
        result
    }

    fn exec(&mut self, sql: &str) -> Result<()> {
        let db = self.db()?;
        let c_sql = CString::new(sql)?;
        let rc = unsafe {
            sqlite3_exec(db, c_sql.as_ptr(), None, ptr::null_mut(), ptr::null_mut())
        };
        let result = if rc == SQLITE_OK {
            Ok(())
        } else {
            Err(sqlite_error(db, rc).context(format!("While executing `{}`", sql)))
        };
        self.track(result)
    }

    fn in_transaction(&self) -> bool {
        self.db()
            .map(|db| unsafe { sqlite3_get_autocommit(db) } == 0)
            .unwrap_or(false)
    }

    fn check_transaction(&self, transaction: Option<&SqliteTransaction>) -> Result<()> {
        if transaction.is_some() && !self.in_transaction() {
            return Err(Error::msg(
                "The transaction is no longer active, sqlite rolled it back after an error",
            ));
        }
        Ok(())
    }

    fn prepare(&mut self, statement: &Statement) -> Result<SQLitePrepared> {
        let db = self.db()?;
        let result = SQLitePrepared::new(db, statement);
        self.track(result)
    }
}

/// Split `path[?mode=…]` into the file name and the open flags.
fn parse_connection_string(connection_string: &str) -> Result<(CString, c_int)> {
    let (path, query) = connection_string
        .split_once('?')
        .unwrap_or((connection_string, ""));
    if path.is_empty() {
        return Err(Error::msg("The sqlite connection string has no path"));
    }
    let mut flags = SQLITE_OPEN_READWRITE | SQLITE_OPEN_CREATE;
    for (key, value) in query
        .split('&')
        .filter(|v| !v.is_empty())
        .map(|v| v.split_once('=').unwrap_or((v, "")))
    {
        match (key, value) {
            ("mode", "ro") => flags = SQLITE_OPEN_READONLY,
            ("mode", "rw") => flags = SQLITE_OPEN_READWRITE,
            ("mode", "rwc") => flags = SQLITE_OPEN_READWRITE | SQLITE_OPEN_CREATE,
            ("mode", "memory") => flags = SQLITE_OPEN_READWRITE | SQLITE_OPEN_MEMORY,
            ("mode", other) => {
                return Err(Error::msg(format!(
                    "Unknown sqlite open mode `{}`, expected one of ro, rw, rwc, memory",
                    other
                )));
            }
            _ => log::warn!("Ignoring the sqlite connection parameter `{}`", key),
        }
    }
    Ok((CString::new(path)?, flags))
}

impl ConnectionHandle for SqliteConnection {
    type Transaction = SqliteTransaction;

    fn set_connection_string(&mut self, connection_string: &str) {
        self.connection_string = connection_string.into();
    }

    fn connection_string(&self) -> &str {
        &self.connection_string
    }

    fn open(&mut self) -> Result<()> {
        if self.connection.is_some() {
            return Ok(());
        }
        let context = || {
            format!(
                "While opening the sqlite database `{}`",
                truncate_long!(self.connection_string)
            )
        };
        let (path, flags) = parse_connection_string(&self.connection_string).with_context(context)?;
        let mut connection = CBox::new(ptr::null_mut(), |p| unsafe {
            sqlite3_close(p);
        });
        unsafe {
            let rc = sqlite3_open_v2(path.as_ptr(), &mut *connection, flags, ptr::null());
            if rc != SQLITE_OK {
                return Err(sqlite_error(*connection, rc).context(context()));
            }
            sqlite3_busy_timeout(*connection, BUSY_TIMEOUT);
        }
        self.connection = Some(connection);
        self.broken = false;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let Some(mut connection) = self.connection.take() else {
            return Ok(());
        };
        let rc = unsafe { sqlite3_close(*connection) };
        if rc != SQLITE_OK {
            let error = sqlite_error(*connection, rc).context("While closing the sqlite database");
            self.connection = Some(connection);
            return Err(error);
        }
        *connection = ptr::null_mut();
        self.broken = false;
        Ok(())
    }

    fn state(&self) -> ConnectionState {
        match (&self.connection, self.broken) {
            (None, _) => ConnectionState::Closed,
            (Some(..), true) => ConnectionState::Broken,
            (Some(..), false) => ConnectionState::Open,
        }
    }

    fn begin_transaction(&mut self, isolation_level: IsolationLevel) -> Result<SqliteTransaction> {
        let read_uncommitted = isolation_level == IsolationLevel::ReadUncommitted;
        self.exec(&format!(
            "PRAGMA read_uncommitted = {}",
            read_uncommitted as u8
        ))?;
        self.exec(SqliteTransaction::begin_statement(isolation_level))?;
        Ok(SqliteTransaction { isolation_level })
    }

    fn commit(&mut self, transaction: SqliteTransaction) -> Result<()> {
        let result = self.exec("COMMIT");
        if result.is_err() && self.in_transaction() {
            log::warn!(
                "Commit of the {} transaction failed, rolling it back",
                transaction.isolation_level
            );
            if let Err(e) = self.exec("ROLLBACK") {
                log::error!("{:#}", e);
            }
        }
        result
    }

    fn rollback(&mut self, _transaction: SqliteTransaction) -> Result<()> {
        if !self.in_transaction() {
            log::warn!("The sqlite transaction was already rolled back");
            return Ok(());
        }
        self.exec("ROLLBACK")
    }

    fn execute(
        &mut self,
        statement: &Statement,
        transaction: Option<&SqliteTransaction>,
    ) -> Result<RowsAffected> {
        self.check_transaction(transaction)?;
        let mut prepared = self.prepare(statement)?;
        let result = prepared.run();
        self.track(result)?;
        let db = self.db()?;
        let rows_affected = unsafe { sqlite3_changes64(db) }.max(0) as u64;
        Ok(RowsAffected {
            rows_affected,
            last_affected_id: (rows_affected > 0)
                .then(|| unsafe { sqlite3_last_insert_rowid(db) }),
        })
    }

    fn fetch(
        &mut self,
        statement: &Statement,
        transaction: Option<&SqliteTransaction>,
    ) -> Result<Vec<RowLabeled>> {
        self.check_transaction(transaction)?;
        let mut prepared = self.prepare(statement)?;
        let result = prepared.collect();
        self.track(result)
    }
}

#[cfg(test)]
mod tests {
    use super::SqliteConnection;
    use keel_core::{ConnectionHandle, ConnectionState};
    use libsqlite3_sys::{SQLITE_OK, sqlite3_finalize, sqlite3_prepare_v2, sqlite3_stmt};
    use std::{ffi::CString, ptr};

    #[test]
    fn failed_close_keeps_the_broken_state() {
        let mut connection = SqliteConnection::new();
        connection.set_connection_string(":memory:");
        connection.open().expect("Could not open the database");
        let db = connection.db().expect("The connection should be open");
        let sql = CString::new("SELECT 1").unwrap();
        let mut statement: *mut sqlite3_stmt = ptr::null_mut();
        let rc = unsafe {
            sqlite3_prepare_v2(db, sql.as_ptr(), -1, &mut statement, ptr::null_mut())
        };
        assert_eq!(rc, SQLITE_OK);

        // A pending statement keeps sqlite3_close from succeeding
        connection.broken = true;
        assert!(connection.close().is_err());
        assert_eq!(connection.state(), ConnectionState::Broken);

        unsafe { sqlite3_finalize(statement) };
        connection.close().expect("Could not close the database");
        assert_eq!(connection.state(), ConnectionState::Closed);
    }
}
