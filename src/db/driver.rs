//! Client abstraction the bootstrapper drives.
//!
//! A [`Driver`] opens a [`Connection`] lazily; the bootstrapper then registers a
//! [`ConnectionObserver`] on it to learn about disconnects and to run the
//! write-primary check ahead of application queries.

use async_trait::async_trait;
use std::sync::Arc;

use super::{Endpoint, ResolvedOptions};
use crate::error::DriverError;

/// Marks queries the bootstrapper issues itself so the pre-query hook skips them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryTag {
    #[default]
    Application,
    RecoveryCheck,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueryContext {
    pub tag: QueryTag,
}

impl QueryContext {
    pub fn application() -> Self {
        Self {
            tag: QueryTag::Application,
        }
    }

    pub fn recovery_check() -> Self {
        Self {
            tag: QueryTag::RecoveryCheck,
        }
    }

    pub fn is_recovery_check(&self) -> bool {
        self.tag == QueryTag::RecoveryCheck
    }
}

/// Emitted after the link to the server went away. `unexpected` is false when
/// the close was requested through [`Connection::close`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisconnectEvent {
    pub unexpected: bool,
}

#[async_trait]
pub trait ConnectionObserver: Send + Sync + 'static {
    fn after_disconnect(&self, event: &DisconnectEvent);

    async fn before_query(&self, query: &QueryContext);
}

#[async_trait]
pub trait Connection: Send + Sync + 'static {
    /// Round-trips to the server once.
    async fn authenticate(&self) -> Result<(), DriverError>;

    /// True when the server is a standby. Issued with [`QueryTag::RecoveryCheck`].
    async fn is_in_recovery(&self) -> Result<bool, DriverError>;

    /// Deliberate close; observers receive `DisconnectEvent { unexpected: false }`.
    async fn close(&self);

    fn add_observer(&self, observer: Arc<dyn ConnectionObserver>);
}

pub trait Driver: Send + Sync + 'static {
    type Conn: Connection;

    /// Builds a connection handle without touching the network.
    fn open(
        &self,
        endpoint: &Endpoint,
        options: &ResolvedOptions,
    ) -> Result<Arc<Self::Conn>, DriverError>;
}
