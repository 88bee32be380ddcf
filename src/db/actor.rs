use chrono::{DateTime, Utc};
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use serde::Serialize;
use std::{marker::PhantomData, sync::Arc};
use tracing::{debug, error, info};

use super::driver::{Connection, Driver};
use super::hooks::{HealthObserver, RestartGuard, RestartReason, RestartTrigger};
use super::probe::{HostProbe, HttpProbe, select_endpoint};
use super::registry::{ModelEntry, ModelFactory, Registry};
use super::timer::{Timer, TokioTimer};
use crate::config::DbConfig;
use crate::error::{BootstrapError, IsRetryable};
use crate::utils::logging::with_pretty_json_debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Connected,
    Restarting,
}

/// Snapshot of the bootstrapper, for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct BootstrapStatus {
    pub state: ConnectionState,
    /// Connect cycles started so far.
    pub generation: u64,
    pub host: Option<String>,
    pub connected_at: Option<DateTime<Utc>>,
    pub restarts: u64,
}

#[derive(Debug)]
pub enum BootstrapMessage {
    /// Run a connect cycle and reply once it has settled. Configuration errors are
    /// returned; an authentication failure is not (it schedules a restart instead).
    Init(RpcReplyPort<Result<(), BootstrapError>>),

    /// Run a connect cycle with nobody waiting on the result.
    Reconnect,

    /// Tear down the connection of cycle `generation` and schedule a reconnect.
    Restart {
        generation: u64,
        reason: RestartReason,
    },

    Status(RpcReplyPort<BootstrapStatus>),
}

struct BootstrapArgs<D: Driver> {
    config: DbConfig,
    driver: D,
    probe: Arc<dyn HostProbe>,
    timer: Arc<dyn Timer>,
    factories: Vec<ModelFactory<D::Conn>>,
    registry: Registry<D::Conn>,
}

struct BootstrapState<D: Driver> {
    config: DbConfig,
    driver: D,
    probe: Arc<dyn HostProbe>,
    timer: Arc<dyn Timer>,
    factories: Vec<ModelFactory<D::Conn>>,
    registry: Registry<D::Conn>,
    phase: ConnectionState,
    generation: u64,
    host: Option<String>,
    connected_at: Option<DateTime<Utc>>,
    restarts: u64,
}

impl<D: Driver> BootstrapState<D> {
    fn status(&self) -> BootstrapStatus {
        BootstrapStatus {
            state: self.phase,
            generation: self.generation,
            host: self.host.clone(),
            connected_at: self.connected_at,
            restarts: self.restarts,
        }
    }
}

struct BootstrapActor<D>(PhantomData<fn() -> D>);

#[ractor::async_trait]
impl<D: Driver> Actor for BootstrapActor<D> {
    type Msg = BootstrapMessage;
    type State = BootstrapState<D>;
    type Arguments = BootstrapArgs<D>;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        debug!(
            backoff_ms = args.config.backoff_ms,
            probe_port = args.config.probe.port,
            models = args.factories.len(),
            "DB bootstrap actor started"
        );
        Ok(BootstrapState {
            config: args.config,
            driver: args.driver,
            probe: args.probe,
            timer: args.timer,
            factories: args.factories,
            registry: args.registry,
            phase: ConnectionState::Idle,
            generation: 0,
            host: None,
            connected_at: None,
            restarts: 0,
        })
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            BootstrapMessage::Init(reply) => {
                let res = self.run_cycle(&myself, state).await;
                let _ = reply.send(res);
            }
            BootstrapMessage::Reconnect => {
                self.handle_reconnect(&myself, state).await;
            }
            BootstrapMessage::Restart { generation, reason } => {
                self.handle_restart(&myself, state, generation, reason)
                    .await;
            }
            BootstrapMessage::Status(reply) => {
                let _ = reply.send(state.status());
            }
        }
        Ok(())
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        if let Some(connection) = state.registry.take_connection() {
            info!("Closing all DB connections...");
            connection.close().await;
        }
        state.phase = ConnectionState::Idle;
        Ok(())
    }
}

impl<D: Driver> BootstrapActor<D> {
    async fn run_cycle(
        &self,
        myself: &ActorRef<BootstrapMessage>,
        state: &mut BootstrapState<D>,
    ) -> Result<(), BootstrapError> {
        state.generation += 1;
        state.phase = ConnectionState::Connecting;
        state.connected_at = None;

        // A repeated init replaces the connection of an earlier cycle.
        if let Some(previous) = state.registry.take_connection() {
            previous.close().await;
        }

        let res = self.connect(myself, state).await;
        if res.is_err() {
            state.phase = ConnectionState::Idle;
        }
        res
    }

    async fn connect(
        &self,
        myself: &ActorRef<BootstrapMessage>,
        state: &mut BootstrapState<D>,
    ) -> Result<(), BootstrapError> {
        let generation = state.generation;
        let endpoints = state.config.url.endpoints()?;
        let options = state.config.options.resolve()?;

        let endpoint = select_endpoint(
            &endpoints,
            &*state.probe,
            options.tls.as_ref(),
            state.timer.clone(),
            state.config.backoff(),
        )
        .await?;

        let connection = state.driver.open(&endpoint, &options)?;
        let trigger = RestartTrigger::new(
            generation,
            Arc::new(RestartGuard::default()),
            myself.clone(),
        );
        connection.add_observer(Arc::new(HealthObserver::new(&connection, trigger.clone())));
        state.registry.install(connection.clone(), &state.factories);
        state.host = Some(endpoint.host().to_string());

        match connection.authenticate().await {
            Ok(()) => {
                info!(
                    host = %endpoint.host(),
                    generation,
                    "DB connection has been established successfully."
                );
                state.phase = ConnectionState::Connected;
                state.connected_at = Some(Utc::now());
                with_pretty_json_debug(&state.status(), |json| {
                    debug!("DB bootstrap status:\n{json}");
                });
            }
            Err(e) => {
                error!(host = %endpoint.host(), generation, error = %e, "DB authentication failed");
                trigger.fire(RestartReason::AuthenticationFailed);
            }
        }
        Ok(())
    }

    async fn handle_restart(
        &self,
        myself: &ActorRef<BootstrapMessage>,
        state: &mut BootstrapState<D>,
        generation: u64,
        reason: RestartReason,
    ) {
        if generation != state.generation {
            debug!(
                generation,
                current = state.generation,
                %reason,
                "Ignoring restart for a finished cycle"
            );
            return;
        }

        state.phase = ConnectionState::Restarting;
        state.restarts += 1;
        info!(generation, "{reason}");

        info!("Closing all DB connections...");
        if let Some(connection) = state.registry.take_connection() {
            connection.close().await;
        }
        state.connected_at = None;

        info!("Re-initializing DB...");
        state.timer.sleep(state.config.backoff()).await;
        if let Err(e) = ractor::cast!(myself, BootstrapMessage::Reconnect) {
            error!(error = %e, "Reconnect cast failed");
        }
    }

    async fn handle_reconnect(
        &self,
        myself: &ActorRef<BootstrapMessage>,
        state: &mut BootstrapState<D>,
    ) {
        let Err(e) = self.run_cycle(myself, state).await else {
            return;
        };

        if e.is_retryable() {
            error!(error = %e, "DB re-initialization failed, retrying");
            state.timer.sleep(state.config.backoff()).await;
            if let Err(e) = ractor::cast!(myself, BootstrapMessage::Reconnect) {
                error!(error = %e, "Reconnect cast failed");
            }
        } else {
            error!(error = %e, "DB re-initialization failed");
        }
    }
}

/// Handle to a running bootstrapper and the registry it maintains.
pub struct DbModule<D: Driver> {
    actor: ActorRef<BootstrapMessage>,
    registry: Registry<D::Conn>,
}

impl<D: Driver> Clone for DbModule<D> {
    fn clone(&self) -> Self {
        Self {
            actor: self.actor.clone(),
            registry: self.registry.clone(),
        }
    }
}

impl<D: Driver> DbModule<D> {
    pub fn builder(config: DbConfig, driver: D) -> DbModuleBuilder<D> {
        DbModuleBuilder {
            config,
            driver,
            probe: None,
            timer: Arc::new(TokioTimer),
            factories: Vec::new(),
        }
    }

    /// Selects a host, connects and installs the health hooks.
    ///
    /// Resolves once the first connect cycle has settled. Only configuration errors
    /// are returned; connectivity problems are handled by the restart loop.
    pub async fn init(&self) -> Result<(), BootstrapError> {
        ractor::call!(self.actor, BootstrapMessage::Init)
            .map_err(|e| BootstrapError::RactorError(format!("Init RPC failed: {e}")))?
    }

    pub fn registry(&self) -> &Registry<D::Conn> {
        &self.registry
    }

    pub fn connection(&self) -> Option<Arc<D::Conn>> {
        self.registry.connection()
    }

    pub async fn status(&self) -> Result<BootstrapStatus, BootstrapError> {
        ractor::call!(self.actor, BootstrapMessage::Status)
            .map_err(|e| BootstrapError::RactorError(format!("Status RPC failed: {e}")))
    }

    /// Stops the actor and closes the current connection.
    pub async fn shutdown(&self) {
        if let Err(e) = self.actor.stop_and_wait(None, None).await {
            error!(error = %e, "DB bootstrap actor did not stop cleanly");
        }
    }
}

pub struct DbModuleBuilder<D: Driver> {
    config: DbConfig,
    driver: D,
    probe: Option<Arc<dyn HostProbe>>,
    timer: Arc<dyn Timer>,
    factories: Vec<ModelFactory<D::Conn>>,
}

impl<D: Driver> DbModuleBuilder<D> {
    /// Registers a model factory. Factories run again after every reconnect.
    pub fn model<F>(mut self, factory: F) -> Self
    where
        F: Fn(&Arc<D::Conn>) -> ModelEntry + Send + Sync + 'static,
    {
        self.factories.push(Arc::new(factory));
        self
    }

    /// Replaces the default [`HttpProbe`].
    pub fn probe(mut self, probe: Arc<dyn HostProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn timer(mut self, timer: Arc<dyn Timer>) -> Self {
        self.timer = timer;
        self
    }

    pub async fn spawn(self) -> Result<DbModule<D>, BootstrapError> {
        let registry = Registry::new();
        let probe = self
            .probe
            .unwrap_or_else(|| Arc::new(HttpProbe::new(&self.config.probe)));
        let args = BootstrapArgs {
            config: self.config,
            driver: self.driver,
            probe,
            timer: self.timer,
            factories: self.factories,
            registry: registry.clone(),
        };

        let (actor, _jh) = Actor::spawn(None, BootstrapActor::<D>(PhantomData), args)
            .await
            .map_err(|e| BootstrapError::RactorError(format!("DB bootstrap spawn failed: {e}")))?;

        Ok(DbModule { actor, registry })
    }
}
