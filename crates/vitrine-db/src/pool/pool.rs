//! Connection pool implementation

use std::collections::VecDeque;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use vitrine_core::{Connection, Result, VitrineError};

use super::config::PoolConfig;
use super::stats::PoolStats;

/// Factory trait for creating new connections
#[async_trait]
pub trait ConnectionFactory: Send + Sync + 'static {
    /// Create a new connection
    async fn create(&self) -> Result<Arc<dyn Connection>>;

    /// Validate that a connection is still usable
    ///
    /// Default implementation always returns true for open connections.
    async fn validate(&self, conn: &dyn Connection) -> bool {
        !conn.is_closed()
    }
}

#[async_trait]
impl<T: ConnectionFactory> ConnectionFactory for Arc<T> {
    async fn create(&self) -> Result<Arc<dyn Connection>> {
        (**self).create().await
    }

    async fn validate(&self, conn: &dyn Connection) -> bool {
        (**self).validate(conn).await
    }
}

/// Internal wrapper for pooled connections with metadata
struct PooledConnectionInner {
    connection: Arc<dyn Connection>,
    last_used_at: Instant,
}

impl PooledConnectionInner {
    fn new(connection: Arc<dyn Connection>) -> Self {
        Self {
            connection,
            last_used_at: Instant::now(),
        }
    }

    fn touch(&mut self) {
        self.last_used_at = Instant::now();
    }
}

/// A connection pool that manages a set of database connections
///
/// The pool lends connections to callers on demand, bounded by the
/// configured maximum. Connections are returned automatically when the
/// `PooledConnection` wrapper is dropped, success or failure. A query
/// error never changes the pool's state; only a connection-level fault
/// evicts that one connection.
pub struct ConnectionPool {
    /// Pool configuration
    config: PoolConfig,
    /// Connection factory
    factory: Arc<dyn ConnectionFactory>,
    /// Available idle connections
    idle: Mutex<VecDeque<PooledConnectionInner>>,
    /// Semaphore to limit total connections
    semaphore: Arc<Semaphore>,
    /// Number of active connections (borrowed from pool)
    active_count: AtomicUsize,
    /// Number of requests waiting for a connection
    waiting_count: AtomicUsize,
    /// Monotonic close flag; never resets once set
    closed: AtomicBool,
}

impl ConnectionPool {
    /// Create a new connection pool with the given configuration and factory
    pub fn new<F: ConnectionFactory>(config: PoolConfig, factory: F) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_size()));
        Self {
            config,
            factory: Arc::new(factory),
            idle: Mutex::new(VecDeque::new()),
            semaphore,
            active_count: AtomicUsize::new(0),
            waiting_count: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Get a connection from the pool
    ///
    /// This will:
    /// 1. Try to get an idle connection from the pool
    /// 2. If none available and under max_size, create a new connection
    /// 3. If at max_size, wait for a connection to be returned (with timeout)
    ///
    /// Returns an error if the pool is closed or the acquire timeout is
    /// exceeded; a timed-out acquire leaves the pool state untouched.
    pub async fn get(&self) -> Result<PooledConnection<'_>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(VitrineError::Shutdown);
        }

        self.waiting_count.fetch_add(1, Ordering::SeqCst);
        let result = tokio::time::timeout(self.config.acquire_timeout(), self.acquire()).await;
        self.waiting_count.fetch_sub(1, Ordering::SeqCst);

        match result {
            Ok(conn) => conn,
            Err(_) => {
                self.emit("error");
                Err(VitrineError::Timeout(format!(
                    "timed out waiting for a connection after {:?}",
                    self.config.acquire_timeout()
                )))
            }
        }
    }

    async fn acquire(&self) -> Result<PooledConnection<'_>> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| VitrineError::Shutdown)?;

        // A close may have started while we waited; the dropped permit
        // goes straight to the drain.
        if self.closed.load(Ordering::SeqCst) {
            return Err(VitrineError::Shutdown);
        }

        let connection = match self.take_idle().await {
            Some(conn) => conn,
            None => {
                let conn = self.factory.create().await?;
                self.emit("connect");
                conn
            }
        };

        self.active_count.fetch_add(1, Ordering::SeqCst);
        self.emit("acquire");

        Ok(PooledConnection {
            connection: Some(connection),
            pool: self,
            _permit: permit,
        })
    }

    /// Try to get an idle connection, evicting stale or invalid ones
    async fn take_idle(&self) -> Option<Arc<dyn Connection>> {
        loop {
            let pooled = { self.idle.lock().pop_front() };

            match pooled {
                Some(mut inner) => {
                    if inner.last_used_at.elapsed() > self.config.idle_timeout() {
                        let _ = inner.connection.close().await;
                        self.emit("remove");
                        continue;
                    }

                    if !self.factory.validate(&*inner.connection).await {
                        let _ = inner.connection.close().await;
                        self.emit("remove");
                        continue;
                    }

                    inner.touch();
                    return Some(inner.connection);
                }
                None => return None,
            }
        }
    }

    /// Return a connection to the pool
    fn return_connection(&self, connection: Arc<dyn Connection>) {
        self.active_count.fetch_sub(1, Ordering::SeqCst);

        // A connection that died while leased is evicted; a replacement
        // is created lazily on next demand.
        if connection.is_closed() {
            self.emit("remove");
            return;
        }

        self.idle
            .lock()
            .push_back(PooledConnectionInner::new(connection));
        self.emit("release");
    }

    /// Get current pool statistics
    pub fn stats(&self) -> PoolStats {
        let idle = self.idle.lock().len();
        let active = self.active_count.load(Ordering::SeqCst);
        let waiting = self.waiting_count.load(Ordering::SeqCst);
        PoolStats::new(
            idle + active,
            idle,
            active,
            waiting,
            self.config.max_size(),
            self.config.min_size(),
            self.closed.load(Ordering::SeqCst),
        )
    }

    /// Get the pool configuration
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Whether the pool has been closed
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Close the pool, draining gracefully
    ///
    /// The first call flips the close flag, waits for every leased
    /// connection to be returned (in-flight queries run to completion),
    /// then closes all idle connections. Later calls observe the flag
    /// and return immediately.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            tracing::debug!("pool already closed");
            return;
        }

        let stats = self.stats();
        tracing::info!(
            total = stats.total(),
            idle = stats.idle(),
            waiting = stats.waiting(),
            "draining connection pool"
        );

        // Holding the full capacity means every lease has come home and
        // nothing new can be created.
        if let Ok(permits) = self
            .semaphore
            .clone()
            .acquire_many_owned(self.config.max_size() as u32)
            .await
        {
            permits.forget();
        }
        self.semaphore.close();

        let drained: Vec<PooledConnectionInner> = { self.idle.lock().drain(..).collect() };
        for inner in drained {
            let _ = inner.connection.close().await;
            self.emit("remove");
        }

        tracing::info!("connection pool closed");
    }

    fn emit(&self, event: &'static str) {
        let stats = self.stats();
        tracing::debug!(
            event,
            total = stats.total(),
            idle = stats.idle(),
            waiting = stats.waiting(),
            "pool lifecycle event"
        );
    }
}

/// A connection borrowed from the pool
///
/// When dropped, the connection is automatically returned to the pool.
pub struct PooledConnection<'a> {
    connection: Option<Arc<dyn Connection>>,
    pool: &'a ConnectionPool,
    _permit: OwnedSemaphorePermit,
}

impl<'a> Deref for PooledConnection<'a> {
    type Target = dyn Connection;

    fn deref(&self) -> &Self::Target {
        self.connection.as_ref().expect("connection taken").as_ref()
    }
}

impl<'a> Drop for PooledConnection<'a> {
    fn drop(&mut self) {
        if let Some(conn) = self.connection.take() {
            self.pool.return_connection(conn);
        }
    }
}
