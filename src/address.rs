//! `SetAddress` orchestration: atomically redirects the pool at a new
//! server and serializes concurrent callers so only the last one to start
//! wins, per `SPEC_FULL.md` §4.4.

use std::net::SocketAddr;
use std::sync::Arc;

use log::info;
use parking_lot::Mutex;

use crate::pool::Pool;

/// Thin wrapper around [`Pool::set_address`] that adds the serialization
/// step. The epoch bump and idle-connection invalidation happen inside the
/// pool itself; live [`crate::handle::Handle`]s detect the new epoch lazily
/// on their next operation rather than being touched here.
pub struct AddressController {
    pool: Arc<Pool>,
    serialize: Mutex<()>,
}

impl AddressController {
    pub fn new(pool: Arc<Pool>) -> Self {
        Self { pool, serialize: Mutex::new(()) }
    }

    /// Redirect all future pool activity at `addr`. Blocks until any
    /// in-flight `set_address` call finishes, so two overlapping calls
    /// apply strictly in sequence and the caller that returns last leaves
    /// its address in effect.
    pub fn set_address(&self, addr: SocketAddr, username: String, password: String) {
        let _guard = self.serialize.lock();
        info!("redirecting connection pool to {addr}");
        self.pool.set_address(addr, username, password);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::transport::mock::{MockBackend, MockTransport};

    #[test]
    fn set_address_bumps_pool_epoch() {
        let backend = MockBackend::new();
        let cfg = ClientConfig::new("127.0.0.1:21".parse().unwrap(), "a", "b");
        let pool = Pool::new(&cfg, Box::new(move || Box::new(MockTransport::new(backend.clone()))));
        let controller = AddressController::new(Arc::clone(&pool));
        let before = pool.epoch();
        controller.set_address("127.0.0.1:2121".parse().unwrap(), "a".into(), "b".into());
        assert_eq!(pool.epoch(), before + 1);
    }
}
