//! The `utils` module holds pieces shared by every other module: the crate
//! error type and logging setup.

pub mod error;
pub mod logging;

pub use error::{Error, Result};
