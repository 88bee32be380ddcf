//! Database connection bootstrap with primary-host discovery and self-healing reconnect.
//!
//! Layout:
//! - `endpoint.rs`: validated candidate URLs
//! - `tls.rs`: TLS material resolution
//! - `probe.rs`: management-port health probe and host selection
//! - `driver.rs`: client abstraction (connection, observers)
//! - `postgres.rs`: sqlx PostgreSQL driver
//! - `registry.rs`: shared connection + model registry
//! - `hooks.rs`: restart guard and health hooks
//! - `actor.rs`: bootstrap state machine and public handle

pub mod actor;
pub mod driver;
pub mod endpoint;
pub mod hooks;
pub mod postgres;
pub mod probe;
pub mod registry;
pub mod timer;
pub mod tls;

pub use actor::{BootstrapStatus, ConnectionState, DbModule, DbModuleBuilder};
pub use driver::{Connection, ConnectionObserver, DisconnectEvent, Driver, QueryContext, QueryTag};
pub use endpoint::{Endpoint, Endpoints};
pub use hooks::{RestartGuard, RestartReason};
pub use postgres::{PgDatabase, PgDriver};
pub use probe::{HostProbe, HttpProbe, select_endpoint};
pub use registry::{Model, ModelEntry, ModelFactory, Registry};
pub use timer::{Timer, TokioTimer};
pub use tls::{ResolvedOptions, TlsMaterial};
