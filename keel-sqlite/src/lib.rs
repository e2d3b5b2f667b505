mod cbox;
mod connection;
mod driver;
mod extract;
mod prepared;
mod transaction;

use keel_core::{DriverError, Error};
use libsqlite3_sys::{sqlite3, sqlite3_errmsg, sqlite3_errstr, sqlite3_extended_errcode};
use std::{
    ffi::{CStr, c_char, c_int},
    ptr,
};

pub(crate) use cbox::*;
pub use connection::*;
pub use driver::*;
pub(crate) use prepared::*;
pub use transaction::*;

pub(crate) fn error_message_from_ptr(ptr: &'_ *const c_char) -> &'_ str {
    unsafe {
        if *ptr != ptr::null() {
            CStr::from_ptr(*ptr)
                .to_str()
                .unwrap_or("Unknown error (the error message was not a valid C string)")
        } else {
            "Unknown error (could not extract the error message)"
        }
    }
}

/// Error reported by SQLite, carrying the extended result code.
pub(crate) fn sqlite_error(db: *mut sqlite3, rc: c_int) -> Error {
    unsafe {
        let (message, code) = if db.is_null() {
            (sqlite3_errstr(rc), rc)
        } else {
            (sqlite3_errmsg(db), sqlite3_extended_errcode(db))
        };
        Error::new(DriverError::new(error_message_from_ptr(&message)).with_code(code))
    }
}
