//! Mounts a remote FTP directory as a local, read/write FUSE filesystem.
//!
//! The entry points are [`Adapter`] (a `fuser::Filesystem` implementation
//! backed by a pool of FTP connections) and [`MountSupervisor`] (binds an
//! `Adapter` to a mount point with a bounded startup deadline). [`connect`]
//! builds an `Adapter` using the real `suppaftp`-backed transport; embedders
//! that want a different wire implementation can call [`Adapter::new`]
//! directly with their own [`TransportFactory`].
//!
//! See `SPEC_FULL.md` for the full design and `DESIGN.md` for how each
//! module is grounded.

mod adapter;
mod address;
mod config;
mod direntry;
mod error;
mod handle;
mod inode;
mod metrics;
mod pool;
mod supervisor;
mod transport;

pub use adapter::Adapter;
pub use address::AddressController;
pub use config::{ClientConfig, TruncateStrategy};
pub use error::{AdapterError, AdapterResult, ErrorKind};
pub use metrics::{DebugEndpoint, OpenHandleCounter};
pub use pool::{Pool, TransportFactory};
pub use supervisor::MountSupervisor;
pub use transport::{FtpTransport, RetrStream, StorStream, SuppaftpTransport};

#[cfg(any(test, feature = "test-support"))]
pub use transport::mock;
#[cfg(any(test, feature = "test-support"))]
pub use handle::Handle;
#[cfg(any(test, feature = "test-support"))]
pub use inode::InodeTable;

/// Build an [`Adapter`] backed by real `suppaftp` connections, per
/// `config`. No connection is made until the first lease.
pub fn connect(config: ClientConfig) -> Adapter {
    let factory: Box<TransportFactory> = Box::new(|| Box::new(SuppaftpTransport::new()) as Box<dyn FtpTransport>);
    Adapter::new(config, factory)
}
