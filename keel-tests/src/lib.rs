mod adapter;
pub mod mock;
mod nested;
mod simple;
mod teardown;
mod transaction1;

use crate::{
    adapter::adapter, nested::nested, simple::simple, teardown::teardown,
    transaction1::transaction1,
};
use keel::{ConnectionSession, Driver};
use log::LevelFilter;
use std::env;

pub fn init_logs() {
    let mut logger = env_logger::builder();
    logger
        .is_test(true)
        .format_file(true)
        .format_line_number(true);
    if env::var("RUST_LOG").is_err() {
        logger.filter_level(LevelFilter::Warn);
    }
    let _ = logger.try_init();
}

/// Run the conformance suite against a driver. `url` must point to a database that
/// survives closing the connection (a file, not `:memory:`).
pub fn execute_tests<D: Driver + Clone>(driver: D, url: &str) {
    simple(&driver, url);
    transaction1(&driver, url);
    nested(&driver, url);
    teardown(&driver, url);
    adapter(&driver, url);
}

pub(crate) fn session<D: Driver + Clone>(driver: &D, url: &str) -> ConnectionSession<D> {
    ConnectionSession::from_url(driver.clone(), url)
        .expect(format!("Could not create a `{}` session for {}", D::NAME, url).as_str())
}

/// Number of rows in `table`, read through a fresh session.
pub(crate) fn count_rows<D: Driver + Clone>(driver: &D, url: &str, table: &str) -> i64 {
    let mut session = session(driver, url);
    let value = session
        .create_command()
        .expect("Could not create a command")
        .sql(format!("SELECT COUNT(*) FROM {}", table))
        .scalar()
        .expect("Could not count the rows")
        .expect("The count returned no row");
    i64::try_from(value).expect("The count is not an integer")
}

/// Run the code with logging turned off, evaluating to its value.
#[macro_export]
macro_rules! silent_logs {
    ($($code:tt)+) => {{
        let level = log::max_level();
        log::set_max_level(log::LevelFilter::Off);
        let result = { $($code)+ };
        log::set_max_level(level);
        result
    }};
}
