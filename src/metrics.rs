//! Optional, process-wide debug endpoint (§6A / §9 "Global state"): a
//! loopback `TcpListener` that serves a plain-text snapshot of pool and
//! handle counters. Deliberately minimal — see `DESIGN.md` for why this
//! doesn't pull in a metrics crate.

use std::io::Write;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::thread;

use log::{info, warn};

use crate::pool::Pool;

/// Callback invoked per request to report the adapter's current open-handle
/// count, since the endpoint has no direct reference to the adapter.
pub type OpenHandleCounter = dyn Fn() -> usize + Send + Sync;

/// Serves `/`-style plain text on a loopback socket. One instance per
/// mounted filesystem; never bound unless the embedder asks for it.
pub struct DebugEndpoint {
    local_addr: SocketAddr,
}

impl DebugEndpoint {
    /// Bind and start serving in a background thread. Returns the bound
    /// address, useful when `addr`'s port is 0.
    pub fn bind(addr: SocketAddr, pool: Arc<Pool>, open_handles: Box<OpenHandleCounter>) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        let local_addr = listener.local_addr()?;
        thread::Builder::new()
            .name("fuseftp-debug-endpoint".into())
            .spawn(move || serve(listener, pool, open_handles))
            .expect("failed to spawn debug endpoint thread");
        info!("debug endpoint listening on {local_addr}");
        Ok(Self { local_addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

fn serve(listener: TcpListener, pool: Arc<Pool>, open_handles: Box<OpenHandleCounter>) {
    for stream in listener.incoming() {
        let mut stream = match stream {
            Ok(s) => s,
            Err(err) => {
                warn!("debug endpoint accept failed: {err}");
                continue;
            }
        };
        let body = format!(
            "pool_size {}\npool_idle {}\npool_leased {}\npool_epoch {}\nopen_handles {}\n",
            pool.len(),
            pool.idle_len(),
            pool.leased_len(),
            pool.epoch(),
            open_handles()
        );
        if let Err(err) = stream.write_all(body.as_bytes()) {
            warn!("debug endpoint write failed: {err}");
        }
    }
}
