pub mod config;
pub mod db;
pub mod error;
pub mod utils;

pub use config::Config;
pub use db::{DbModule, Registry};
pub use error::{BootstrapError, DriverError};
