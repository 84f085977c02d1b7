//! Typed construction inputs for the adapter, with spec-mandated defaults.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(60);
const DEFAULT_POOL_CAP: usize = 8;
const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_MOUNT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_SEEK_FORWARD_THRESHOLD: u64 = 64 * 1024;

/// How a write-time truncation to a shorter length is carried out when the
/// remote server's `REST`+`STOR` sequence does not itself truncate the tail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TruncateStrategy {
    /// Assume `REST 0` followed by `STOR` truncates the remote file, as
    /// vsftpd and proftpd both do. Cheapest, and the default.
    #[default]
    RestStor,
    /// Fall back for servers that append instead of truncating: read the
    /// surviving prefix into memory, then `STOR` it back in full.
    ReadPrefixRewrite,
}

/// Construction inputs for an [`crate::adapter::Adapter`] and the [`crate::pool::Pool`]
/// it owns.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub addr: SocketAddr,
    pub username: String,
    pub password: String,
    pub remote_root: String,
    /// How long a leased-but-idle connection may sit in the pool before the
    /// reaper closes it.
    pub idle_ttl: Duration,
    /// Maximum number of concurrent connections the pool will open.
    pub pool_cap: usize,
    /// Per-command timeout applied to the underlying transport.
    pub op_timeout: Duration,
    /// Deadline for the initial mount handshake.
    pub mount_timeout: Duration,
    /// Below this distance, a read seek re-issues `REST` on the existing
    /// stream instead of restarting the transfer from offset 0.
    pub seek_forward_threshold: u64,
    pub truncate_strategy: TruncateStrategy,
}

impl ClientConfig {
    pub fn new(addr: SocketAddr, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            addr,
            username: username.into(),
            password: password.into(),
            remote_root: String::from("/"),
            idle_ttl: DEFAULT_IDLE_TTL,
            pool_cap: DEFAULT_POOL_CAP,
            op_timeout: DEFAULT_OP_TIMEOUT,
            mount_timeout: DEFAULT_MOUNT_TIMEOUT,
            seek_forward_threshold: DEFAULT_SEEK_FORWARD_THRESHOLD,
            truncate_strategy: TruncateStrategy::default(),
        }
    }

    pub fn remote_root(mut self, root: impl Into<String>) -> Self {
        self.remote_root = root.into();
        self
    }

    pub fn idle_ttl(mut self, ttl: Duration) -> Self {
        self.idle_ttl = ttl;
        self
    }

    pub fn pool_cap(mut self, cap: usize) -> Self {
        self.pool_cap = cap;
        self
    }

    pub fn op_timeout(mut self, timeout: Duration) -> Self {
        self.op_timeout = timeout;
        self
    }

    pub fn mount_timeout(mut self, timeout: Duration) -> Self {
        self.mount_timeout = timeout;
        self
    }

    pub fn seek_forward_threshold(mut self, bytes: u64) -> Self {
        self.seek_forward_threshold = bytes;
        self
    }

    pub fn truncate_strategy(mut self, strategy: TruncateStrategy) -> Self {
        self.truncate_strategy = strategy;
        self
    }

    /// Reject configurations that could never produce a working mount.
    pub fn validate(&self) -> io::Result<()> {
        if self.pool_cap == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "pool_cap must be at least 1",
            ));
        }
        if self.remote_root.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "remote_root must not be empty",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = ClientConfig::new("127.0.0.1:21".parse().unwrap(), "anon", "anon");
        assert_eq!(cfg.idle_ttl, Duration::from_secs(60));
        assert_eq!(cfg.pool_cap, 8);
        assert_eq!(cfg.mount_timeout, Duration::from_secs(5));
        assert_eq!(cfg.seek_forward_threshold, 64 * 1024);
        assert_eq!(cfg.truncate_strategy, TruncateStrategy::RestStor);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_zero_pool_cap() {
        let cfg = ClientConfig::new("127.0.0.1:21".parse().unwrap(), "a", "b").pool_cap(0);
        assert!(cfg.validate().is_err());
    }
}
