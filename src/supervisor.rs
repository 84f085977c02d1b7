//! Binds an [`Adapter`] to a mount point with a bounded startup deadline.
//! `fuser::spawn_mount2` has no timeout of its own, so the actual mount
//! call runs on a worker thread and the caller waits on a channel with a
//! deadline, per `SPEC_FULL.md` §4.5.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use fuser::{spawn_mount2, BackgroundSession, MountOption};
use log::{error, info};

use crate::adapter::Adapter;

/// Owns the live `fuser` mount. Dropping it unmounts and tears down the
/// adapter's connection pool.
pub struct MountSupervisor {
    session: BackgroundSession,
}

impl MountSupervisor {
    /// Mount `adapter` at `mountpoint`, failing with `TimedOut` if the
    /// kernel handshake doesn't complete within `deadline`.
    pub fn mount(
        adapter: Adapter,
        mountpoint: impl AsRef<Path>,
        options: &[MountOption],
        deadline: Duration,
    ) -> io::Result<Self> {
        let mountpoint: PathBuf = mountpoint.as_ref().to_path_buf();
        let options = options.to_vec();
        let (tx, rx) = mpsc::channel();
        let mp = mountpoint.clone();
        thread::Builder::new()
            .name("fuseftp-mount".into())
            .spawn(move || {
                let result = spawn_mount2(adapter, &mp, &options);
                let _ = tx.send(result);
            })
            .expect("failed to spawn mount worker thread");

        match rx.recv_timeout(deadline) {
            Ok(Ok(session)) => {
                info!("mounted at {:?}", session.mountpoint);
                Ok(Self { session })
            }
            Ok(Err(err)) => {
                error!("mount of {mountpoint:?} failed: {err}");
                Err(err)
            }
            Err(_) => {
                error!("mount of {mountpoint:?} did not complete within {deadline:?}");
                Err(io::Error::new(io::ErrorKind::TimedOut, "mount did not complete before the deadline"))
            }
        }
    }

    pub fn mountpoint(&self) -> &Path {
        &self.session.mountpoint
    }

    /// Unmount and release the adapter. Equivalent to dropping the
    /// supervisor, spelled out for callers that want the point at which it
    /// happens to be explicit.
    pub fn unmount(self) {
        drop(self.session);
    }
}
