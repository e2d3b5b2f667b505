mod configuration;
mod connection;
mod data_adapter;
mod driver;
mod error;
mod isolation;
mod query;
mod transaction;
mod util;
mod value;

pub use ::anyhow::Context;
pub use configuration::*;
pub use connection::*;
pub use data_adapter::*;
pub use driver::*;
pub use error::*;
pub use isolation::*;
pub use query::*;
pub use transaction::*;
pub use util::*;
pub use value::*;

pub type Result<T> = anyhow::Result<T>;
pub type Error = anyhow::Error;
