use crate::{
    CBox, error_message_from_ptr,
    extract::{extract_name, extract_value},
    sqlite_error,
};
use keel_core::{Context, Error, Result, RowLabeled, RowNames, Statement, Value, truncate_long};
use libsqlite3_sys::*;
use std::{
    ffi::{CStr, CString, c_int},
    os::raw::{c_char, c_void},
    ptr,
};

/// Compiled statement with its parameters bound.
pub(crate) struct SQLitePrepared {
    pub(crate) statement: CBox<*mut sqlite3_stmt>,
}

impl SQLitePrepared {
    /// Compile a single statement and bind its positional parameters.
    pub(crate) fn new(connection: *mut sqlite3, statement: &Statement) -> Result<Self> {
        let context = || format!("While preparing the query:\n{}", truncate_long!(statement.sql));
        let sql = CString::new(statement.sql.as_bytes())
            .context("Could not create a CString from the query String")
            .with_context(context)?;
        let mut prepared = Self {
            statement: CBox::new(ptr::null_mut(), |p| unsafe {
                sqlite3_finalize(p);
            }),
        };
        unsafe {
            let mut tail = ptr::null();
            let rc = sqlite3_prepare_v2(
                connection,
                sql.as_ptr(),
                -1,
                &mut *prepared.statement,
                &mut tail,
            );
            if rc != SQLITE_OK {
                return Err(sqlite_error(connection, rc).context(context()));
            }
            if prepared.statement.is_null() {
                return Err(Error::msg("The query contains no statement").context(context()));
            }
            if !tail.is_null()
                && !CStr::from_ptr(tail)
                    .to_string_lossy()
                    .trim_start_matches(|c: char| c.is_whitespace() || c == ';')
                    .is_empty()
            {
                return Err(
                    Error::msg("Cannot prepare more than one statement at a time")
                        .context(context()),
                );
            }
        }
        for (i, value) in statement.parameters.iter().enumerate() {
            prepared.bind_index(value, i as c_int + 1)?;
        }
        Ok(prepared)
    }

    fn bind_index(&mut self, value: &Value, index: c_int) -> Result<()> {
        unsafe {
            let rc = match value {
                Value::Null
                | Value::Boolean(None)
                | Value::Int64(None)
                | Value::Float64(None)
                | Value::Varchar(None)
                | Value::Blob(None) => sqlite3_bind_null(*self.statement, index),
                Value::Boolean(Some(v)) => sqlite3_bind_int(*self.statement, index, *v as c_int),
                Value::Int64(Some(v)) => sqlite3_bind_int64(*self.statement, index, *v),
                Value::Float64(Some(v)) => sqlite3_bind_double(*self.statement, index, *v),
                Value::Varchar(Some(v)) => sqlite3_bind_text(
                    *self.statement,
                    index,
                    v.as_ptr() as *const c_char,
                    v.len() as c_int,
                    SQLITE_TRANSIENT(),
                ),
                Value::Blob(Some(v)) => sqlite3_bind_blob(
                    *self.statement,
                    index,
                    v.as_ptr() as *const c_void,
                    v.len() as c_int,
                    SQLITE_TRANSIENT(),
                ),
            };
            if rc != SQLITE_OK {
                let db = sqlite3_db_handle(*self.statement);
                let query = sqlite3_sql(*self.statement);
                let error = Error::msg(error_message_from_ptr(&sqlite3_errmsg(db)).to_string())
                    .context(format!(
                        "Cannot bind parameter {} to query:\n{}",
                        index,
                        truncate_long!(CStr::from_ptr(query).to_string_lossy())
                    ));
                log::error!("{:#}", error);
                return Err(error);
            }
        }
        Ok(())
    }

    /// Step until the statement is done, discarding any row.
    pub(crate) fn run(&mut self) -> Result<()> {
        while self.step()? {}
        Ok(())
    }

    /// Step until the statement is done, collecting every row.
    pub(crate) fn collect(&mut self) -> Result<Vec<RowLabeled>> {
        let count = unsafe { sqlite3_column_count(*self.statement) };
        let labels = (0..count)
            .map(|i| extract_name(*self.statement, i))
            .collect::<Result<RowNames>>()?;
        let mut rows = Vec::new();
        while self.step()? {
            rows.push(RowLabeled {
                labels: labels.clone(),
                values: (0..count)
                    .map(|i| extract_value(*self.statement, i))
                    .collect::<Result<_>>()?,
            });
        }
        Ok(rows)
    }

    /// Whether a row is available.
    fn step(&mut self) -> Result<bool> {
        unsafe {
            match sqlite3_step(*self.statement) {
                SQLITE_ROW => Ok(true),
                SQLITE_DONE => Ok(false),
                rc => Err(sqlite_error(sqlite3_db_handle(*self.statement), rc)),
            }
        }
    }
}
