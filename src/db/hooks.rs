use async_trait::async_trait;
use ractor::ActorRef;
use std::{
    fmt,
    sync::{
        Arc, Weak,
        atomic::{AtomicBool, Ordering},
    },
};
use tracing::{debug, warn};

use super::actor::BootstrapMessage;
use super::driver::{Connection, ConnectionObserver, DisconnectEvent, QueryContext};
use crate::error::DriverError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartReason {
    UnexpectedDisconnect,
    InRecovery,
    AuthenticationFailed,
}

impl fmt::Display for RestartReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            RestartReason::UnexpectedDisconnect => "Unexpected disconnection occurred.",
            RestartReason::InRecovery => "DB is in recovery.",
            RestartReason::AuthenticationFailed => "Unable to connect to the database.",
        };
        f.write_str(msg)
    }
}

/// One-shot latch per connect cycle. Only the first trigger wins.
#[derive(Debug, Default)]
pub struct RestartGuard(AtomicBool);

impl RestartGuard {
    /// Returns true for the first caller only.
    pub fn try_acquire(&self) -> bool {
        !self.0.swap(true, Ordering::SeqCst)
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Asks the bootstrap actor to restart the cycle it was created for.
#[derive(Clone)]
pub(crate) struct RestartTrigger {
    generation: u64,
    guard: Arc<RestartGuard>,
    actor: ActorRef<BootstrapMessage>,
}

impl RestartTrigger {
    pub(crate) fn new(
        generation: u64,
        guard: Arc<RestartGuard>,
        actor: ActorRef<BootstrapMessage>,
    ) -> Self {
        Self {
            generation,
            guard,
            actor,
        }
    }

    pub(crate) fn fire(&self, reason: RestartReason) -> bool {
        if !self.guard.try_acquire() {
            debug!(generation = self.generation, %reason, "Restart already requested for this cycle");
            return false;
        }

        if let Err(e) = ractor::cast!(
            self.actor,
            BootstrapMessage::Restart {
                generation: self.generation,
                reason,
            }
        ) {
            warn!(generation = self.generation, error = %e, "Restart cast failed");
        }
        true
    }
}

/// Disconnect and pre-query hooks installed on every new connection.
pub(crate) struct HealthObserver<C> {
    connection: Weak<C>,
    trigger: RestartTrigger,
}

impl<C: Connection> HealthObserver<C> {
    pub(crate) fn new(connection: &Arc<C>, trigger: RestartTrigger) -> Self {
        Self {
            connection: Arc::downgrade(connection),
            trigger,
        }
    }
}

#[async_trait]
impl<C: Connection> ConnectionObserver for HealthObserver<C> {
    fn after_disconnect(&self, event: &DisconnectEvent) {
        if event.unexpected {
            self.trigger.fire(RestartReason::UnexpectedDisconnect);
        }
    }

    async fn before_query(&self, query: &QueryContext) {
        if query.is_recovery_check() {
            return;
        }
        let Some(connection) = self.connection.upgrade() else {
            return;
        };

        match connection.is_in_recovery().await {
            Ok(true) => {
                self.trigger.fire(RestartReason::InRecovery);
            }
            Ok(false) => {}
            Err(e) if e.is_connection_loss() && !matches!(e, DriverError::Closed) => {
                warn!(error = %e, "Write-primary check lost the connection");
                self.trigger.fire(RestartReason::UnexpectedDisconnect);
            }
            Err(e) => {
                warn!(error = %e, "Write-primary check failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_admits_only_first_caller() {
        let guard = RestartGuard::default();
        assert!(!guard.is_set());
        assert!(guard.try_acquire());
        assert!(!guard.try_acquire());
        assert!(!guard.try_acquire());
        assert!(guard.is_set());
    }

    #[test]
    fn reasons_render_as_log_lines() {
        assert_eq!(
            RestartReason::UnexpectedDisconnect.to_string(),
            "Unexpected disconnection occurred."
        );
        assert_eq!(RestartReason::InRecovery.to_string(), "DB is in recovery.");
    }
}
