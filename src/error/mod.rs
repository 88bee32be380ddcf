mod bootstrap;
mod driver;

pub use bootstrap::{BootstrapError, INVALID_URL_MESSAGE};
pub use driver::DriverError;

pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}
