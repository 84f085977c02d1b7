//! Implements `fuser::Filesystem` against the FTP command vocabulary,
//! translating inode-numbered kernel callbacks into pool leases and
//! [`Handle`] operations. Grounded almost entirely on `simple.rs`'s
//! trait-method shapes and reply call conventions.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use std::time::Duration;

use fuser::{
    BsdFileFlags, Errno, FileAttr, FileHandle, FileType, Filesystem, FopenFlags, Generation,
    INodeNo, KernelConfig, LockOwner, OpenFlags, ReadFlags, ReplyAttr, ReplyCreate, ReplyData,
    ReplyDirectory, ReplyEmpty, ReplyEntry, ReplyOpen, ReplyStatfs, ReplyWrite, RenameFlags,
    Request, TimeOrNow, WriteFlags,
};
use log::{debug, info, warn};
use parking_lot::Mutex;

use crate::address::AddressController;
use crate::config::{ClientConfig, TruncateStrategy};
use crate::direntry::{DirEntry, EntryKind};
use crate::error::{AdapterError, AdapterResult};
use crate::handle::Handle;
use crate::inode::InodeTable;
use crate::pool::{Pool, TransportFactory};

/// Attribute cache lifetime handed back to the kernel. Short, since the
/// adapter has no attribute cache of its own to keep coherent with it.
const ATTR_TTL: Duration = Duration::from_secs(1);

struct OpenFile {
    ino: INodeNo,
    handle: Arc<Handle>,
}

/// Translates `fuser`'s inode-numbered callback surface into leases on a
/// pool of FTP connections. See `SPEC_FULL.md` §4.3.
pub struct Adapter {
    pool: Arc<Pool>,
    address: AddressController,
    inodes: InodeTable,
    files: Mutex<HashMap<u64, OpenFile>>,
    next_fh: AtomicU64,
    seek_forward_threshold: u64,
    truncate_strategy: TruncateStrategy,
}

impl Adapter {
    /// Build an adapter whose pool dials connections via `factory`. The
    /// pool itself doesn't connect until the first lease.
    pub fn new(config: ClientConfig, factory: Box<TransportFactory>) -> Self {
        let pool = Pool::new(&config, factory);
        let address = AddressController::new(Arc::clone(&pool));
        Self {
            pool,
            address,
            inodes: InodeTable::new(config.remote_root.clone()),
            files: Mutex::new(HashMap::new()),
            next_fh: AtomicU64::new(1),
            seek_forward_threshold: config.seek_forward_threshold,
            truncate_strategy: config.truncate_strategy,
        }
    }

    /// Number of connections the pool currently holds, idle plus leased.
    pub fn pool_len(&self) -> usize {
        self.pool.len()
    }

    pub fn pool(&self) -> Arc<Pool> {
        Arc::clone(&self.pool)
    }

    /// Count of file handles the adapter currently has open, for the debug
    /// endpoint.
    pub fn open_handle_count(&self) -> usize {
        self.files.lock().len()
    }

    /// Redirect the pool at a new server, per §4.4. Live handles detect the
    /// epoch bump lazily on their next operation.
    pub fn set_address(&self, addr: std::net::SocketAddr, username: String, password: String) {
        self.address.set_address(addr, username, password);
    }

    fn path_of(&self, ino: INodeNo) -> Result<PathBuf, Errno> {
        self.inodes.path_of(ino).ok_or(Errno::ENOENT)
    }

    fn list_dir(&self, path: &Path) -> AdapterResult<Vec<DirEntry>> {
        let mut lease = self.pool.lease()?;
        let result = lease.transport_mut().list(&self.path_str(path));
        lease.finish(result.as_ref().err().is_some_and(AdapterError::marks_connection_broken));
        result
    }

    fn find_child(&self, parent: &Path, name: &OsStr) -> AdapterResult<DirEntry> {
        let name = name.to_string_lossy();
        let entries = self.list_dir(parent)?;
        entries
            .into_iter()
            .find(|e| e.name == name)
            .ok_or_else(|| AdapterError::not_found(format!("{name}: no such file or directory")))
    }

    /// Confirms `path`'s parent directory still exists, independent of
    /// whatever stale inode the kernel is holding for it.
    fn ensure_parent_exists(&self, path: &Path) -> AdapterResult<()> {
        if path == Path::new("/") {
            return Ok(());
        }
        let parent = path.parent().unwrap_or_else(|| Path::new("/"));
        if parent == Path::new("/") {
            return Ok(());
        }
        let grandparent = parent.parent().unwrap_or_else(|| Path::new("/"));
        let name = parent.file_name().unwrap_or_default();
        let entry = self.find_child(grandparent, name)?;
        if entry.kind != EntryKind::Directory {
            return Err(AdapterError::not_directory(format!("{}: not a directory", parent.display())));
        }
        Ok(())
    }

    /// `MKD`'s failure text varies by server and rarely distinguishes
    /// "a file is already there" from "a directory is already there" from
    /// any other cause. Re-`LIST` the parent to tell them apart, per
    /// `SPEC_FULL.md` §4.3's "the Adapter additionally LISTs on failure to
    /// distinguish file-exists from dir-exists".
    fn disambiguate_mkdir_failure(&self, parent: &Path, name: &OsStr, original: AdapterError) -> AdapterError {
        match self.find_child(parent, name) {
            Ok(_) => AdapterError::already_exists(format!("{}: already exists", name.to_string_lossy())),
            Err(_) => original,
        }
    }

    fn ensure_not_directory(&self, path: &Path) -> AdapterResult<()> {
        if path == Path::new("/") {
            return Err(AdapterError::is_directory("/: is a directory"));
        }
        let parent = path.parent().unwrap_or_else(|| Path::new("/"));
        let name = path.file_name().unwrap_or_default();
        let entry = self.find_child(parent, name)?;
        if entry.kind == EntryKind::Directory {
            return Err(AdapterError::is_directory(format!("{}: is a directory", path.display())));
        }
        Ok(())
    }

    /// `readdir` on a non-directory must surface `NotDirectory`, per §8's
    /// "ReadDir on a file handle → `NotDirectory`".
    fn ensure_is_directory(&self, path: &Path) -> AdapterResult<()> {
        if path == Path::new("/") {
            return Ok(());
        }
        let parent = path.parent().unwrap_or_else(|| Path::new("/"));
        let name = path.file_name().unwrap_or_default();
        let entry = self.find_child(parent, name)?;
        if entry.kind != EntryKind::Directory {
            return Err(AdapterError::not_directory(format!("{}: not a directory", path.display())));
        }
        Ok(())
    }

    fn attr_for(&self, ino: INodeNo, entry: &DirEntry, req: &Request) -> FileAttr {
        let kind = if entry.kind == EntryKind::Directory { FileType::Directory } else { FileType::RegularFile };
        let mtime = entry.modified.map(SystemTime::from).unwrap_or_else(SystemTime::now);
        build_attr(ino, entry.size, kind, mtime, req.uid(), req.gid())
    }

    fn root_attr(&self, req: &Request) -> FileAttr {
        build_attr(INodeNo::ROOT, 0, FileType::Directory, SystemTime::now(), req.uid(), req.gid())
    }

    /// Resolve `ino`'s current attributes by re-listing its parent. There is
    /// no attribute cache here, so every `getattr`/`setattr` reply costs one
    /// `LIST` round trip.
    fn current_attr(&self, ino: INodeNo, req: &Request) -> AdapterResult<FileAttr> {
        if ino == INodeNo::ROOT {
            return Ok(self.root_attr(req));
        }
        let path = self.inodes.path_of(ino).ok_or_else(|| AdapterError::not_found("stale inode"))?;
        let parent = path.parent().unwrap_or_else(|| Path::new("/"));
        let name = path.file_name().unwrap_or_default();
        let entry = self.find_child(parent, name)?;
        Ok(self.attr_for(ino, &entry, req))
    }

    fn alloc_fh(&self, ino: INodeNo, handle: Handle) -> FileHandle {
        let fh = self.next_fh.fetch_add(1, Ordering::Relaxed);
        self.files.lock().insert(fh, OpenFile { ino, handle: Arc::new(handle) });
        FileHandle(fh)
    }

    fn handle_for(&self, fh: FileHandle) -> Option<Arc<Handle>> {
        self.files.lock().get(&fh.0).map(|f| Arc::clone(&f.handle))
    }

    fn handle_for_ino(&self, ino: INodeNo) -> Option<Arc<Handle>> {
        self.files.lock().values().find(|f| f.ino == ino).map(|f| Arc::clone(&f.handle))
    }

    fn open_path(&self, path: &Path) -> AdapterResult<Handle> {
        Handle::open(Arc::clone(&self.pool), self.path_str(path), self.seek_forward_threshold, self.truncate_strategy)
    }

    /// Render an internal, root-seeded path as the root-relative,
    /// leading-slash-free string the FTP client vocabulary expects, per
    /// `SPEC_FULL.md` §3. The pool's `Pool::dial` already `CWD`s every
    /// connection into the remote root, so everything past that point is
    /// relative to it.
    fn path_str(&self, path: &Path) -> String {
        let root = self.inodes.root_path();
        let relative = path.strip_prefix(&root).unwrap_or(path);
        let relative = relative.to_string_lossy();
        let relative = relative.trim_start_matches('/');
        if relative.is_empty() { ".".to_string() } else { relative.to_string() }
    }
}

fn build_attr(ino: INodeNo, size: u64, kind: FileType, mtime: SystemTime, uid: u32, gid: u32) -> FileAttr {
    let perm = if kind == FileType::Directory { 0o755 } else { 0o644 };
    FileAttr {
        ino,
        size,
        blocks: size.div_ceil(512),
        atime: mtime,
        mtime,
        ctime: mtime,
        crtime: mtime,
        kind,
        perm,
        nlink: if kind == FileType::Directory { 2 } else { 1 },
        uid,
        gid,
        rdev: 0,
        blksize: 512,
        flags: 0,
    }
}

impl Filesystem for Adapter {
    fn init(&mut self, _req: &Request, _config: &mut KernelConfig) -> std::io::Result<()> {
        info!("adapter initialized, root={:?}", self.inodes.root_path());
        Ok(())
    }

    fn destroy(&mut self) {
        let open = self.files.lock().len();
        if open > 0 {
            warn!("destroy() releasing {open} still-open handle(s)");
        }
        for (_, of) in self.files.lock().drain() {
            let _ = of.handle.release();
        }
        // Wake any thread blocked in `Pool::lease` with `Cancelled` rather
        // than let it wait out the full deadline against a pool nobody will
        // service again, per §5's cancellation guarantee.
        self.pool.shutdown();
    }

    fn lookup(&self, req: &Request, parent: INodeNo, name: &OsStr, reply: ReplyEntry) {
        let parent_path = match self.path_of(parent) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };
        match self.find_child(&parent_path, name) {
            Ok(entry) => {
                let child_path = parent_path.join(&entry.name);
                let ino = self.inodes.observe(&child_path);
                reply.entry(&ATTR_TTL, &self.attr_for(ino, &entry, req), Generation(0));
            }
            Err(err) => reply.error(err.into_errno()),
        }
    }

    fn forget(&self, _req: &Request, ino: INodeNo, nlookup: u64) {
        self.inodes.forget(ino, nlookup);
    }

    fn getattr(&self, req: &Request, ino: INodeNo, _fh: Option<FileHandle>, reply: ReplyAttr) {
        match self.current_attr(ino, req) {
            Ok(attr) => reply.attr(&ATTR_TTL, &attr),
            Err(err) => reply.error(err.into_errno()),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn setattr(
        &self,
        req: &Request,
        ino: INodeNo,
        _mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        size: Option<u64>,
        _atime: Option<TimeOrNow>,
        _mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        fh: Option<FileHandle>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<BsdFileFlags>,
        reply: ReplyAttr,
    ) {
        if let Some(size) = size {
            if let Err(err) = self.truncate(ino, fh, size) {
                return reply.error(err.into_errno());
            }
        }
        match self.current_attr(ino, req) {
            Ok(attr) => reply.attr(&ATTR_TTL, &attr),
            Err(err) => reply.error(err.into_errno()),
        }
    }

    fn mkdir(&self, req: &Request, parent: INodeNo, name: &OsStr, _mode: u32, _umask: u32, reply: ReplyEntry) {
        let parent_path = match self.path_of(parent) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };
        let child_path = parent_path.join(name);
        let result = (|| {
            let mut lease = self.pool.lease()?;
            let r = lease.transport_mut().mkdir(&self.path_str(&child_path));
            lease.finish(r.as_ref().err().is_some_and(AdapterError::marks_connection_broken));
            r
        })();
        match result {
            Ok(()) => {
                let ino = self.inodes.observe(&child_path);
                let attr = build_attr(ino, 0, FileType::Directory, SystemTime::now(), req.uid(), req.gid());
                reply.entry(&ATTR_TTL, &attr, Generation(0));
            }
            Err(err) => reply.error(self.disambiguate_mkdir_failure(&parent_path, name, err).into_errno()),
        }
    }

    fn unlink(&self, _req: &Request, parent: INodeNo, name: &OsStr, reply: ReplyEmpty) {
        let parent_path = match self.path_of(parent) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };
        let child_path = parent_path.join(name);
        let result = (|| {
            let mut lease = self.pool.lease()?;
            let r = lease.transport_mut().delete(&self.path_str(&child_path));
            lease.finish(r.as_ref().err().is_some_and(AdapterError::marks_connection_broken));
            r
        })();
        match result {
            Ok(()) => {
                self.inodes.evict_subtree(&child_path);
                reply.ok();
            }
            Err(err) => reply.error(err.into_errno()),
        }
    }

    fn rmdir(&self, _req: &Request, parent: INodeNo, name: &OsStr, reply: ReplyEmpty) {
        let parent_path = match self.path_of(parent) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };
        let child_path = parent_path.join(name);
        let result = (|| {
            let mut lease = self.pool.lease()?;
            let r = lease.transport_mut().rmdir(&self.path_str(&child_path));
            lease.finish(r.as_ref().err().is_some_and(AdapterError::marks_connection_broken));
            r
        })();
        match result {
            Ok(()) => {
                self.inodes.evict_subtree(&child_path);
                reply.ok();
            }
            Err(err) => reply.error(err.into_errno()),
        }
    }

    fn rename(
        &self,
        _req: &Request,
        parent: INodeNo,
        name: &OsStr,
        newparent: INodeNo,
        newname: &OsStr,
        _flags: RenameFlags,
        reply: ReplyEmpty,
    ) {
        let from_parent = match self.path_of(parent) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };
        let to_parent = match self.path_of(newparent) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };
        let from = from_parent.join(name);
        let to = to_parent.join(newname);
        let result = (|| {
            let mut lease = self.pool.lease()?;
            let r = lease.transport_mut().rename(&self.path_str(&from), &self.path_str(&to));
            lease.finish(r.as_ref().err().is_some_and(AdapterError::marks_connection_broken));
            r
        })();
        match result {
            Ok(()) => {
                self.inodes.observe(&from);
                self.inodes.evict_subtree(&to);
                self.inodes.reparent_subtree(&from, &to);
                reply.ok();
            }
            Err(err) => reply.error(err.into_errno()),
        }
    }

    fn open(&self, _req: &Request, ino: INodeNo, _flags: OpenFlags, reply: ReplyOpen) {
        let path = match self.path_of(ino) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };
        if let Err(err) = self.ensure_not_directory(&path) {
            return reply.error(err.into_errno());
        }
        match self.open_path(&path) {
            Ok(handle) => {
                let fh = self.alloc_fh(ino, handle);
                reply.opened(fh, FopenFlags::empty());
            }
            Err(err) => reply.error(err.into_errno()),
        }
    }

    fn create(
        &self,
        req: &Request,
        parent: INodeNo,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        let parent_path = match self.path_of(parent) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };
        if let Ok(existing) = self.find_child(&parent_path, name) {
            if existing.kind == EntryKind::Directory {
                return reply.error(Errno::EISDIR);
            }
        }
        let child_path = parent_path.join(name);
        if let Err(err) = self.ensure_parent_exists(&child_path) {
            return reply.error(err.into_errno());
        }
        let handle = Handle::create(
            Arc::clone(&self.pool),
            self.path_str(&child_path),
            self.seek_forward_threshold,
            self.truncate_strategy,
        );
        match handle {
            Ok(handle) => {
                let ino = self.inodes.observe(&child_path);
                let attr = build_attr(ino, 0, FileType::RegularFile, SystemTime::now(), req.uid(), req.gid());
                let fh = self.alloc_fh(ino, handle);
                reply.created(&ATTR_TTL, &attr, Generation(0), fh, 0);
            }
            Err(err) => reply.error(err.into_errno()),
        }
    }

    fn read(
        &self,
        _req: &Request,
        _ino: INodeNo,
        fh: FileHandle,
        offset: u64,
        size: u32,
        _read_flags: ReadFlags,
        _flags: u32,
        _lock_owner: Option<LockOwner>,
        reply: ReplyData,
    ) {
        let handle = match self.handle_for(fh) {
            Some(h) => h,
            None => return reply.error(Errno::EIO),
        };
        match handle.read(offset, size) {
            Ok(data) => reply.data(&data),
            Err(err) => reply.error(err.into_errno()),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn write(
        &self,
        _req: &Request,
        _ino: INodeNo,
        fh: FileHandle,
        offset: i64,
        data: &[u8],
        _write_flags: WriteFlags,
        _flags: OpenFlags,
        _lock_owner: Option<LockOwner>,
        reply: ReplyWrite,
    ) {
        let handle = match self.handle_for(fh) {
            Some(h) => h,
            None => return reply.error(Errno::EIO),
        };
        match handle.write(offset.max(0) as u64, data) {
            Ok(n) => reply.written(n),
            Err(err) => reply.error(err.into_errno()),
        }
    }

    fn flush(&self, _req: &Request, _ino: INodeNo, fh: FileHandle, _lock_owner: LockOwner, reply: ReplyEmpty) {
        match self.handle_for(fh) {
            Some(handle) => match handle.flush() {
                Ok(()) => reply.ok(),
                Err(err) => reply.error(err.into_errno()),
            },
            None => reply.ok(),
        }
    }

    fn release(
        &self,
        _req: &Request,
        _ino: INodeNo,
        fh: FileHandle,
        _flags: OpenFlags,
        _lock_owner: Option<LockOwner>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        let removed = self.files.lock().remove(&fh.0);
        if let Some(of) = removed {
            if let Err(err) = of.handle.release() {
                debug!("release() handle={} reported {err}", of.handle.id);
            }
        }
        reply.ok();
    }

    fn readdir(&self, _req: &Request, ino: INodeNo, _fh: FileHandle, offset: u64, mut reply: ReplyDirectory) {
        let path = match self.path_of(ino) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };
        if let Err(err) = self.ensure_is_directory(&path) {
            return reply.error(err.into_errno());
        }
        let entries = match self.list_dir(&path) {
            Ok(e) => e,
            Err(err) => return reply.error(err.into_errno()),
        };

        let parent_path = path.parent().unwrap_or_else(|| Path::new("/")).to_path_buf();
        let parent_ino = self.inodes.observe(&parent_path);

        let mut rows: Vec<(INodeNo, FileType, String)> = Vec::with_capacity(entries.len() + 2);
        rows.push((ino, FileType::Directory, ".".to_string()));
        rows.push((parent_ino, FileType::Directory, "..".to_string()));
        for entry in &entries {
            let child_ino = self.inodes.observe(&path.join(&entry.name));
            let kind = if entry.kind == EntryKind::Directory { FileType::Directory } else { FileType::RegularFile };
            rows.push((child_ino, kind, entry.name.clone()));
        }

        for (idx, (ino, kind, name)) in rows.into_iter().enumerate().skip(offset as usize) {
            let full = reply.add(ino, (idx + 1) as u64, kind, OsStr::new(&name));
            if full {
                break;
            }
        }
        reply.ok();
    }

    fn statfs(&self, _req: &Request, _ino: INodeNo, reply: ReplyStatfs) {
        // No `STAT`-equivalent FTP command reports free space; report a
        // fixed, generous statfs per §4.3's Non-goals.
        reply.statfs(u64::MAX / 512, u64::MAX / 512, u64::MAX / 512, 0, u64::MAX, 512, 255, 512);
    }
}

impl Adapter {
    fn truncate(&self, ino: INodeNo, fh: Option<FileHandle>, size: u64) -> AdapterResult<()> {
        if let Some(fh) = fh {
            if let Some(handle) = self.handle_for(fh) {
                return handle.truncate(size);
            }
        }
        if let Some(handle) = self.handle_for_ino(ino) {
            return handle.truncate(size);
        }
        let path = self.inodes.path_of(ino).ok_or_else(|| AdapterError::not_found("stale inode"))?;
        self.ensure_parent_exists(&path)?;
        let handle = self.open_path(&path)?;
        let result = handle.truncate(size);
        let _ = handle.release();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::{MockBackend, MockTransport};
    use crate::transport::FtpTransport;
    use std::net::SocketAddr;

    fn adapter() -> (Adapter, MockBackend) {
        let backend = MockBackend::new();
        let b2 = backend.clone();
        let cfg = ClientConfig::new("127.0.0.1:21".parse::<SocketAddr>().unwrap(), "anon", "anon");
        let factory: Box<TransportFactory> = Box::new(move || Box::new(MockTransport::new(b2.clone())) as Box<dyn FtpTransport>);
        (Adapter::new(cfg, factory), backend)
    }

    #[test]
    fn ensure_not_directory_flags_directories() {
        let (adapter, backend) = adapter();
        backend.make_dir("/sub");
        let err = adapter.ensure_not_directory(Path::new("/sub")).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::IsDirectory);
    }

    #[test]
    fn ensure_not_directory_allows_files() {
        let (adapter, backend) = adapter();
        backend.put_file("/a.txt", b"hi");
        assert!(adapter.ensure_not_directory(Path::new("/a.txt")).is_ok());
    }

    #[test]
    fn observe_then_path_of_round_trips() {
        let (adapter, backend) = adapter();
        backend.put_file("/a.txt", b"hi");
        let ino = adapter.inodes.observe(Path::new("/a.txt"));
        assert_eq!(adapter.path_of(ino).unwrap(), PathBuf::from("/a.txt"));
    }

    #[test]
    fn disambiguate_mkdir_failure_reports_already_exists_for_a_file() {
        let (adapter, backend) = adapter();
        backend.put_file("/a.txt", b"hi");
        let original = AdapterError::io("create directory operation failed");
        let err = adapter.disambiguate_mkdir_failure(Path::new("/"), OsStr::new("a.txt"), original);
        assert_eq!(err.kind, crate::error::ErrorKind::AlreadyExists);
    }

    #[test]
    fn disambiguate_mkdir_failure_preserves_original_for_unrelated_errors() {
        let (adapter, _backend) = adapter();
        let original = AdapterError::broken_connection("connection reset");
        let err = adapter.disambiguate_mkdir_failure(Path::new("/"), OsStr::new("missing"), original);
        assert_eq!(err.kind, crate::error::ErrorKind::BrokenConnection);
    }

    #[test]
    fn ensure_is_directory_allows_directories() {
        let (adapter, backend) = adapter();
        backend.make_dir("/sub");
        assert!(adapter.ensure_is_directory(Path::new("/sub")).is_ok());
    }

    #[test]
    fn ensure_is_directory_flags_files() {
        let (adapter, backend) = adapter();
        backend.put_file("/a.txt", b"hi");
        let err = adapter.ensure_is_directory(Path::new("/a.txt")).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::NotDirectory);
    }
}
