use async_trait::async_trait;
use parking_lot::RwLock;
use sqlx::Connection as _;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgSslMode};
use std::{
    future::Future,
    str::FromStr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};
use tracing::debug;

use super::driver::{Connection, ConnectionObserver, DisconnectEvent, Driver, QueryContext};
use super::{Endpoint, ResolvedOptions};
use crate::error::DriverError;

/// Opens lazily connected PostgreSQL pools.
#[derive(Debug, Clone, Copy, Default)]
pub struct PgDriver;

impl Driver for PgDriver {
    type Conn = PgDatabase;

    fn open(
        &self,
        endpoint: &Endpoint,
        options: &ResolvedOptions,
    ) -> Result<Arc<PgDatabase>, DriverError> {
        let mut connect_opts = PgConnectOptions::from_str(endpoint.url())?;

        if let Some(tls) = &options.tls {
            connect_opts = connect_opts
                .ssl_mode(PgSslMode::VerifyFull)
                .ssl_root_cert_from_pem(tls.ca.clone().into_bytes());
            if let (Some(cert), Some(key)) = (&tls.cert, &tls.key) {
                connect_opts = connect_opts
                    .ssl_client_cert_from_pem(cert.as_bytes())
                    .ssl_client_key_from_pem(key.as_bytes());
            }
        }
        if let Some(name) = &options.application_name {
            connect_opts = connect_opts.application_name(name);
        }

        let pool = PgPoolOptions::new()
            .max_connections(options.max_connections)
            .acquire_timeout(options.acquire_timeout)
            .connect_lazy_with(connect_opts);

        debug!(host = %endpoint.host(), "PostgreSQL pool created (lazy)");
        Ok(Arc::new(PgDatabase::new(pool)))
    }
}

/// A PostgreSQL pool that reports query and disconnect activity to observers.
///
/// The pool is only reachable through [`PgDatabase::run`], so every application
/// query passes the health hooks.
pub struct PgDatabase {
    pool: PgPool,
    observers: RwLock<Vec<Arc<dyn ConnectionObserver>>>,
    closing: AtomicBool,
}

impl PgDatabase {
    fn new(pool: PgPool) -> Self {
        Self {
            pool,
            observers: RwLock::new(Vec::new()),
            closing: AtomicBool::new(false),
        }
    }

    /// Runs an application query against the pool.
    ///
    /// Observers see the query first. Connection-level failures are reported as an
    /// unexpected disconnect before the error is returned.
    pub async fn run<T, F, Fut>(&self, query: F) -> Result<T, DriverError>
    where
        F: FnOnce(PgPool) -> Fut + Send,
        Fut: Future<Output = Result<T, sqlx::Error>> + Send,
        T: Send,
    {
        self.run_with(QueryContext::application(), query).await
    }

    async fn run_with<T, F, Fut>(&self, ctx: QueryContext, query: F) -> Result<T, DriverError>
    where
        F: FnOnce(PgPool) -> Fut + Send,
        Fut: Future<Output = Result<T, sqlx::Error>> + Send,
        T: Send,
    {
        if self.closing.load(Ordering::SeqCst) {
            return Err(DriverError::Closed);
        }

        for observer in self.snapshot_observers() {
            observer.before_query(&ctx).await;
        }

        match query(self.pool.clone()).await {
            Ok(value) => Ok(value),
            Err(e) => {
                let err = DriverError::from(e);
                if err.is_connection_loss() {
                    self.notify_disconnect(DisconnectEvent {
                        unexpected: !self.closing.load(Ordering::SeqCst),
                    });
                }
                Err(err)
            }
        }
    }

    fn snapshot_observers(&self) -> Vec<Arc<dyn ConnectionObserver>> {
        self.observers.read().clone()
    }

    fn notify_disconnect(&self, event: DisconnectEvent) {
        for observer in self.snapshot_observers() {
            observer.after_disconnect(&event);
        }
    }
}

#[async_trait]
impl Connection for PgDatabase {
    async fn authenticate(&self) -> Result<(), DriverError> {
        let mut conn = self.pool.acquire().await?;
        conn.ping().await?;
        Ok(())
    }

    async fn is_in_recovery(&self) -> Result<bool, DriverError> {
        self.run_with(QueryContext::recovery_check(), |pool| async move {
            sqlx::query_scalar::<_, bool>("SELECT pg_is_in_recovery()")
                .fetch_one(&pool)
                .await
        })
        .await
    }

    async fn close(&self) {
        if self.closing.swap(true, Ordering::SeqCst) {
            return;
        }
        self.pool.close().await;
        self.notify_disconnect(DisconnectEvent { unexpected: false });
    }

    fn add_observer(&self, observer: Arc<dyn ConnectionObserver>) {
        self.observers.write().push(observer);
    }
}
