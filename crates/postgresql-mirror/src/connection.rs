//! Connection manager for the mirror database.
//!
//! One connection per process, established lazily on first use and kept
//! until [`ConnectionManager::reset`] (or until the driver reports it closed).
//! The connection lives behind a `tokio::sync::Mutex`; a [`MirrorSession`]
//! holds the lock, so concurrently running jobs execute one at a time.

use crate::config::{MirrorConfigSource, MirrorTarget, TlsMode};
use crate::error::{MirrorError, Result};
use crate::statement::Statement;
use crate::tls;
use crate::value::SqlValue;
use async_trait::async_trait;
use mirror_core::MirrorSwitch;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tokio_postgres::tls::{MakeTlsConnect, TlsConnect};
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls, Socket};
use tracing::{debug, error, info, warn};

/// Default upper bound on connection establishment.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// A live connection to the mirror database.
#[async_trait]
pub trait MirrorConnection: Send + Sync {
    /// Execute `statement`, returning the number of affected rows.
    async fn execute(&self, statement: &Statement) -> Result<u64>;

    /// Whether the underlying link is known to be gone.
    fn is_closed(&self) -> bool;
}

/// Opens connections to a [`MirrorTarget`].
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, target: &MirrorTarget) -> Result<Box<dyn MirrorConnection>>;
}

/// [`Connector`] backed by `tokio-postgres`, over rustls unless the target
/// disables TLS.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresConnector;

#[async_trait]
impl Connector for PostgresConnector {
    async fn connect(&self, target: &MirrorTarget) -> Result<Box<dyn MirrorConnection>> {
        let config = target.to_pg_config()?;
        match target.tls_mode()? {
            TlsMode::Disable => open(&config, NoTls).await,
            mode => open(&config, tls::make_connector(mode)?).await,
        }
    }
}

async fn open<T>(config: &tokio_postgres::Config, tls: T) -> Result<Box<dyn MirrorConnection>>
where
    T: MakeTlsConnect<Socket> + Send,
    T::Stream: Send + 'static,
    T::TlsConnect: Send,
    <T::TlsConnect as TlsConnect<Socket>>::Future: Send,
{
    let (client, connection) = config.connect(tls).await?;

    // Spawn connection handler
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            error!("[DatabaseMirror] PostgreSQL connection error: {e}");
        }
    });

    Ok(Box::new(PostgresConnection { client }))
}

/// Mirror connection over a `tokio_postgres::Client`. Dropping it closes the
/// connection.
pub struct PostgresConnection {
    client: Client,
}

#[async_trait]
impl MirrorConnection for PostgresConnection {
    async fn execute(&self, statement: &Statement) -> Result<u64> {
        let params: Vec<SqlValue<'_>> = statement.args.iter().map(SqlValue).collect();
        let param_refs: Vec<&(dyn ToSql + Sync)> = params
            .iter()
            .map(|p| p as &(dyn ToSql + Sync))
            .collect();

        Ok(self.client.execute(statement.sql.as_str(), &param_refs).await?)
    }

    fn is_closed(&self) -> bool {
        self.client.is_closed()
    }
}

type Slot = Option<Box<dyn MirrorConnection>>;

/// Owns the lazily created, resettable mirror connection.
pub struct ConnectionManager {
    config: Arc<dyn MirrorConfigSource>,
    connector: Arc<dyn Connector>,
    connect_timeout: Duration,
    slot: Mutex<Slot>,
}

impl ConnectionManager {
    pub fn new(config: Arc<dyn MirrorConfigSource>, connector: Arc<dyn Connector>) -> Self {
        Self {
            config,
            connector,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            slot: Mutex::new(None),
        }
    }

    /// Manager that connects with `tokio-postgres`.
    pub fn postgres(config: Arc<dyn MirrorConfigSource>) -> Self {
        Self::new(config, Arc::new(PostgresConnector))
    }

    /// Fallback connect timeout, used when the target does not set one.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Whether a mirror target is configured. Not cached.
    pub fn enabled(&self) -> bool {
        self.config.target().is_some()
    }

    pub fn target(&self) -> Option<MirrorTarget> {
        self.config.target()
    }

    /// Acquire the mirror connection, establishing it if needed.
    ///
    /// Returns `None` when mirroring is disabled or the connection cannot be
    /// established right now. Establishment failures are logged, never
    /// returned.
    pub async fn connection(&self) -> Option<MirrorSession<'_>> {
        let target = self.config.target()?;
        let mut slot = self.slot.lock().await;

        if slot.as_ref().is_some_and(|conn| conn.is_closed()) {
            warn!("[DatabaseMirror] Cached connection is closed, reconnecting");
            *slot = None;
        }

        if slot.is_none() {
            let timeout = target.connect_timeout().unwrap_or(self.connect_timeout);
            match tokio::time::timeout(timeout, self.connector.connect(&target)).await {
                Ok(Ok(conn)) => {
                    info!("[DatabaseMirror] Connected to {}", target.describe());
                    *slot = Some(conn);
                }
                Ok(Err(e)) => {
                    error!("[DatabaseMirror] Failed to connect: {e}");
                    return None;
                }
                Err(_) => {
                    error!(
                        "[DatabaseMirror] Failed to connect: timed out after {timeout:?} ({})",
                        target.describe()
                    );
                    return None;
                }
            }
        }

        Some(MirrorSession { slot })
    }

    /// Close the cached connection; the next [`connection`](Self::connection)
    /// reconnects.
    pub async fn reset(&self) {
        let mut slot = self.slot.lock().await;
        if slot.take().is_some() {
            info!("[DatabaseMirror] Connection closed");
        }
    }

    /// Whether a connection is currently cached.
    pub async fn is_connected(&self) -> bool {
        self.slot.lock().await.is_some()
    }
}

impl MirrorSwitch for ConnectionManager {
    fn enabled(&self) -> bool {
        ConnectionManager::enabled(self)
    }
}

/// Exclusive access to the mirror connection.
pub struct MirrorSession<'a> {
    slot: MutexGuard<'a, Slot>,
}

impl MirrorSession<'_> {
    pub async fn execute(&self, statement: &Statement) -> Result<u64> {
        debug!("[DatabaseMirror] Executing: {}", statement.sql);
        match self.slot.as_ref() {
            Some(conn) => conn.execute(statement).await,
            None => Err(MirrorError::Connection(
                "mirror connection was reset".to_string(),
            )),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.slot.as_ref().map_or(true, |conn| conn.is_closed())
    }

    /// Drop the connection while still holding the lock.
    pub fn reset(&mut self) {
        if self.slot.take().is_some() {
            info!("[DatabaseMirror] Connection reset");
        }
    }
}
