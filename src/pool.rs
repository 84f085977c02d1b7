//! Connection pool: lease/release, idle reaping, and epoch-tagged
//! invalidation so that [`crate::address::AddressController::set_address`]
//! can atomically retire every connection dialed against the old server.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, error, info};
use parking_lot::{Condvar, Mutex};

use crate::config::ClientConfig;
use crate::error::{AdapterError, AdapterResult};
use crate::transport::FtpTransport;

/// Builds a fresh, unauthenticated transport. Boxed so the pool stays
/// agnostic to whether it's dialing `suppaftp` or a test mock.
pub type TransportFactory = dyn Fn() -> Box<dyn FtpTransport> + Send + Sync;

struct PooledConnection {
    transport: Box<dyn FtpTransport>,
    epoch: u64,
    idle_since: Instant,
}

struct PoolState {
    idle: Vec<PooledConnection>,
    leased_count: usize,
}

struct ConfigState {
    addr: std::net::SocketAddr,
    username: String,
    password: String,
    remote_root: String,
    op_timeout: Duration,
}

impl From<&ClientConfig> for ConfigState {
    fn from(cfg: &ClientConfig) -> Self {
        Self {
            addr: cfg.addr,
            username: cfg.username.clone(),
            password: cfg.password.clone(),
            remote_root: cfg.remote_root.clone(),
            op_timeout: cfg.op_timeout,
        }
    }
}

/// Pool of leased FTP connections, bounded at `cap` concurrent leases.
pub struct Pool {
    state: Mutex<PoolState>,
    slot_freed: Condvar,
    config: Mutex<ConfigState>,
    factory: Box<TransportFactory>,
    epoch: AtomicU64,
    cap: usize,
    idle_ttl: Duration,
    shutdown: AtomicBool,
}

impl Pool {
    /// Construct the pool and start its idle-reaper thread. The reaper
    /// holds only a `Weak` reference, so the thread exits on its own once
    /// the last `Arc<Pool>` is dropped.
    pub fn new(config: &ClientConfig, factory: Box<TransportFactory>) -> Arc<Self> {
        let pool = Arc::new(Self {
            state: Mutex::new(PoolState { idle: Vec::new(), leased_count: 0 }),
            slot_freed: Condvar::new(),
            config: Mutex::new(ConfigState::from(config)),
            factory,
            epoch: AtomicU64::new(0),
            cap: config.pool_cap,
            idle_ttl: config.idle_ttl,
            shutdown: AtomicBool::new(false),
        });
        spawn_reaper(Arc::downgrade(&pool), pool.idle_ttl);
        pool
    }

    fn current_epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Current address epoch, for handles deciding whether their lease has
    /// gone stale under a concurrent `set_address`.
    pub fn epoch(&self) -> u64 {
        self.current_epoch()
    }

    /// Lease a connection: reuse an idle one from the current epoch if
    /// available, otherwise dial and log in a new one. If the pool is at
    /// cap, blocks the calling thread on a condition variable until a slot
    /// frees up or `op_timeout` elapses, per §4.1/§5 ("Blocks until one is
    /// available or the deadline passes. No busy-waiting.").
    pub fn lease(self: &Arc<Self>) -> AdapterResult<Lease> {
        let epoch = self.current_epoch();
        let deadline = Instant::now() + self.config.lock().op_timeout;
        let mut stale = Vec::new();

        // Either a ready-to-use idle connection, or `()` meaning "our slot
        // is reserved, go dial". `None` only while the loop keeps spinning.
        enum Outcome {
            Reused(PooledConnection),
            DialNew,
        }

        let mut state = self.state.lock();
        let outcome = loop {
            if self.shutdown.load(Ordering::Acquire) {
                break Err(AdapterError::cancelled("pool shut down"));
            }
            let mut matched = None;
            while let Some(conn) = state.idle.pop() {
                if conn.epoch == epoch {
                    matched = Some(conn);
                    break;
                }
                debug!("dropping stale-epoch connection during lease");
                stale.push(conn);
            }
            if let Some(conn) = matched {
                state.leased_count += 1;
                break Ok(Outcome::Reused(conn));
            }
            if state.leased_count < self.cap {
                state.leased_count += 1;
                break Ok(Outcome::DialNew);
            }
            let now = Instant::now();
            if now >= deadline || self.slot_freed.wait_for(&mut state, deadline - now).timed_out() {
                error!("pool exhausted: no connection freed within the operation deadline");
                break Err(AdapterError::unavailable("connection pool exhausted"));
            }
        };
        drop(state);
        for conn in stale {
            let _ = conn.transport.quit();
        }

        match outcome? {
            Outcome::Reused(conn) => Ok(Lease { pool: Arc::clone(self), connection: Some(conn), returned: false }),
            Outcome::DialNew => match self.dial(epoch) {
                Ok(conn) => Ok(Lease { pool: Arc::clone(self), connection: Some(conn), returned: false }),
                Err(err) => {
                    let mut state = self.state.lock();
                    state.leased_count -= 1;
                    drop(state);
                    self.slot_freed.notify_one();
                    Err(err)
                }
            },
        }
    }

    fn dial(&self, epoch: u64) -> AdapterResult<PooledConnection> {
        let cfg = {
            let guard = self.config.lock();
            (guard.addr, guard.username.clone(), guard.password.clone(), guard.remote_root.clone(), guard.op_timeout)
        };
        let mut transport = (self.factory)();
        transport.login(cfg.0, &cfg.1, &cfg.2, cfg.4)?;
        transport.cwd(&cfg.3)?;
        Ok(PooledConnection { transport, epoch, idle_since: Instant::now() })
    }

    fn release(&self, mut conn: PooledConnection, keep: bool) {
        let mut state = self.state.lock();
        state.leased_count -= 1;
        if keep && conn.epoch == self.current_epoch() {
            conn.idle_since = Instant::now();
            state.idle.push(conn);
            drop(state);
            self.slot_freed.notify_one();
        } else {
            drop(state);
            self.slot_freed.notify_one();
            let _ = conn.transport.quit();
        }
    }

    /// Bump the epoch and redirect future dials at a new server, per
    /// `SPEC_FULL.md` §4.4. Idle connections from the old epoch are closed
    /// immediately; leased ones are closed when their holder releases them.
    pub fn set_address(&self, addr: std::net::SocketAddr, username: String, password: String) {
        {
            let mut cfg = self.config.lock();
            cfg.addr = addr;
            cfg.username = username;
            cfg.password = password;
        }
        self.epoch.fetch_add(1, Ordering::AcqRel);
        let stale: Vec<PooledConnection> = {
            let mut state = self.state.lock();
            let epoch = self.current_epoch();
            let (keep, stale): (Vec<_>, Vec<_>) = state.idle.drain(..).partition(|c| c.epoch == epoch);
            state.idle = keep;
            stale
        };
        if !stale.is_empty() {
            info!("address changed: closing {} idle connection(s) from the previous epoch", stale.len());
        }
        for conn in stale {
            let _ = conn.transport.quit();
        }
    }

    /// Number of connections currently idle plus leased — exposed for the
    /// debug endpoint and for tests.
    pub fn len(&self) -> usize {
        let state = self.state.lock();
        state.idle.len() + state.leased_count
    }

    pub fn idle_len(&self) -> usize {
        self.state.lock().idle.len()
    }

    pub fn leased_len(&self) -> usize {
        self.state.lock().leased_count
    }

    /// Propagate mount cancellation into the pool: wakes any thread blocked
    /// in [`Pool::lease`] so it observes `Cancelled` instead of waiting out
    /// the full deadline, and stops the idle reaper. Per §5, "Blocking
    /// network waits observe cancellation... and return `Cancelled`".
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.slot_freed.notify_all();
    }

    fn reap_idle(&self) {
        let cutoff = Instant::now().checked_sub(self.idle_ttl).unwrap_or_else(Instant::now);
        let mut state = self.state.lock();
        let before = state.idle.len();
        let (keep, expired): (Vec<_>, Vec<_>) =
            state.idle.drain(..).partition(|c| c.idle_since > cutoff);
        state.idle = keep;
        drop(state);
        if !expired.is_empty() {
            debug!("reaped {} idle connection(s), {} remained", expired.len(), before - expired.len());
        }
        for conn in expired {
            let _ = conn.transport.quit();
        }
    }
}

fn spawn_reaper(pool: Weak<Pool>, idle_ttl: Duration) {
    let tick = (idle_ttl / 4).max(Duration::from_millis(500));
    thread::Builder::new()
        .name("fuseftp-pool-reaper".into())
        .spawn(move || loop {
            thread::sleep(tick);
            match pool.upgrade() {
                Some(pool) if !pool.shutdown.load(Ordering::Acquire) => pool.reap_idle(),
                _ => return,
            }
        })
        .expect("failed to spawn pool reaper thread");
}

/// An owned, leased connection. Dropping it without calling
/// [`Lease::discard`] returns the connection to the pool for reuse.
pub struct Lease {
    pool: Arc<Pool>,
    connection: Option<PooledConnection>,
    returned: bool,
}

impl Lease {
    pub fn transport_mut(&mut self) -> &mut dyn FtpTransport {
        &mut *self.connection.as_mut().expect("lease connection present while held").transport
    }

    /// Release the connection back to the pool, or close it immediately if
    /// the caller observed an error that marks the connection broken.
    pub fn finish(mut self, broken: bool) {
        if let Some(conn) = self.connection.take() {
            self.pool.release(conn, !broken);
        }
        self.returned = true;
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if !self.returned {
            if let Some(conn) = self.connection.take() {
                self.pool.release(conn, true);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::{MockBackend, MockTransport};
    use std::net::SocketAddr;

    fn test_config() -> ClientConfig {
        ClientConfig::new("127.0.0.1:21".parse::<SocketAddr>().unwrap(), "anon", "anon").pool_cap(2)
    }

    #[test]
    fn leases_and_returns() {
        let backend = MockBackend::new();
        let pool = Pool::new(&test_config(), Box::new(move || Box::new(MockTransport::new(backend.clone()))));
        assert_eq!(pool.len(), 0);
        let lease = pool.lease().unwrap();
        assert_eq!(pool.leased_len(), 1);
        lease.finish(false);
        assert_eq!(pool.idle_len(), 1);
        assert_eq!(pool.leased_len(), 0);
    }

    #[test]
    fn enforces_cap() {
        let backend = MockBackend::new();
        let cfg = test_config().op_timeout(Duration::from_millis(50));
        let pool = Pool::new(&cfg, Box::new(move || Box::new(MockTransport::new(backend.clone()))));
        let _a = pool.lease().unwrap();
        let _b = pool.lease().unwrap();
        assert!(pool.lease().is_err());
    }

    #[test]
    fn lease_unblocks_once_a_slot_frees_up() {
        let backend = MockBackend::new();
        let cfg = test_config().op_timeout(Duration::from_secs(5));
        let pool = Pool::new(&cfg, Box::new(move || Box::new(MockTransport::new(backend.clone()))));
        let a = pool.lease().unwrap();
        let _b = pool.lease().unwrap();

        let pool2 = Arc::clone(&pool);
        let waiter = thread::spawn(move || pool2.lease());
        thread::sleep(Duration::from_millis(50));
        a.finish(false);
        assert!(waiter.join().unwrap().is_ok());
    }

    #[test]
    fn shutdown_wakes_a_blocked_lease_with_cancelled() {
        let backend = MockBackend::new();
        let cfg = test_config().op_timeout(Duration::from_secs(5));
        let pool = Pool::new(&cfg, Box::new(move || Box::new(MockTransport::new(backend.clone()))));
        let _a = pool.lease().unwrap();
        let _b = pool.lease().unwrap();

        let pool2 = Arc::clone(&pool);
        let waiter = thread::spawn(move || pool2.lease());
        thread::sleep(Duration::from_millis(50));
        pool.shutdown();
        let err = waiter.join().unwrap().unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Cancelled);
    }

    #[test]
    fn broken_connection_is_not_reused() {
        let backend = MockBackend::new();
        let pool = Pool::new(&test_config(), Box::new(move || Box::new(MockTransport::new(backend.clone()))));
        let lease = pool.lease().unwrap();
        lease.finish(true);
        assert_eq!(pool.idle_len(), 0);
    }

    #[test]
    fn set_address_invalidates_idle_connections() {
        let backend = MockBackend::new();
        let pool = Pool::new(&test_config(), Box::new(move || Box::new(MockTransport::new(backend.clone()))));
        let lease = pool.lease().unwrap();
        lease.finish(false);
        assert_eq!(pool.idle_len(), 1);
        pool.set_address("127.0.0.1:2121".parse().unwrap(), "anon".into(), "anon".into());
        assert_eq!(pool.idle_len(), 0);
    }
}
