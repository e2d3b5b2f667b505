pub mod ambient;
pub mod blocking;
mod command;
mod error;
mod session;
mod transaction;

pub use command::*;
pub use error::*;
pub use keel_core::*;
pub use session::*;
pub use transaction::*;
