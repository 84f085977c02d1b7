//! The anti-corruption boundary between the adapter's command vocabulary and
//! whatever FTP client crate actually speaks the wire protocol.
//!
//! [`Pool`](crate::pool::Pool) and [`Handle`](crate::handle::Handle) only ever
//! see [`FtpTransport`]; the real network traffic happens in
//! [`SuppaftpTransport`]. Tests substitute [`MockTransport`] so the rest of
//! the crate can be exercised without a live server.

use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::time::Duration;

use suppaftp::FtpStream;

use crate::direntry::DirEntry;
use crate::error::{AdapterError, AdapterResult};

/// A readable stream positioned at the start of a `RETR` (or `REST`-resumed
/// `RETR`) transfer.
pub trait RetrStream: Read + Send {
    /// Tell the server the transfer is done and consume the final reply.
    fn finish(self: Box<Self>) -> AdapterResult<()>;
    /// Abort mid-transfer, e.g. because the caller seeked elsewhere.
    fn abort(self: Box<Self>) -> AdapterResult<()>;
}

/// A writable stream for a `STOR` (or `APPE`/`REST`-resumed `STOR`) transfer.
pub trait StorStream: Write + Send {
    fn finish(self: Box<Self>) -> AdapterResult<()>;
    fn abort(self: Box<Self>) -> AdapterResult<()>;
}

/// The FTP command vocabulary the rest of this crate depends on. Kept
/// deliberately narrow: every method here corresponds to exactly one
/// operation the adapter needs, not to the full FTP command set.
pub trait FtpTransport: Send {
    fn login(&mut self, addr: SocketAddr, user: &str, pass: &str, timeout: Duration) -> AdapterResult<()>;
    fn cwd(&mut self, path: &str) -> AdapterResult<()>;
    fn list(&mut self, path: &str) -> AdapterResult<Vec<DirEntry>>;
    fn size(&mut self, path: &str) -> AdapterResult<u64>;
    fn retr_at(&mut self, path: &str, offset: u64) -> AdapterResult<Box<dyn RetrStream>>;
    fn stor_at(&mut self, path: &str, offset: u64) -> AdapterResult<Box<dyn StorStream>>;
    fn mkdir(&mut self, path: &str) -> AdapterResult<()>;
    fn rmdir(&mut self, path: &str) -> AdapterResult<()>;
    fn delete(&mut self, path: &str) -> AdapterResult<()>;
    fn rename(&mut self, from: &str, to: &str) -> AdapterResult<()>;
    fn noop(&mut self) -> AdapterResult<()>;
    fn quit(&mut self) -> AdapterResult<()>;
}

/// Real transport backed by the `suppaftp` crate's blocking client.
pub struct SuppaftpTransport {
    stream: Option<FtpStream>,
}

impl SuppaftpTransport {
    pub fn new() -> Self {
        Self { stream: None }
    }

    fn stream_mut(&mut self) -> AdapterResult<&mut FtpStream> {
        self.stream
            .as_mut()
            .ok_or_else(|| AdapterError::broken_connection("not connected"))
    }

    fn classify(err: suppaftp::FtpError) -> AdapterError {
        match err {
            suppaftp::FtpError::UnexpectedResponse(resp) => {
                AdapterError::from_reply(resp.status as u16, &resp.body)
            }
            suppaftp::FtpError::ConnectionError(io_err) => AdapterError::from_io(io_err),
            other => AdapterError::broken_connection(other.to_string()),
        }
    }
}

impl Default for SuppaftpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl FtpTransport for SuppaftpTransport {
    fn login(&mut self, addr: SocketAddr, user: &str, pass: &str, timeout: Duration) -> AdapterResult<()> {
        let mut stream = FtpStream::connect_timeout(addr, timeout).map_err(Self::classify)?;
        stream.login(user, pass).map_err(Self::classify)?;
        stream.transfer_type(suppaftp::types::FileType::Binary).map_err(Self::classify)?;
        self.stream = Some(stream);
        Ok(())
    }

    fn cwd(&mut self, path: &str) -> AdapterResult<()> {
        self.stream_mut()?.cwd(path).map_err(Self::classify)
    }

    fn list(&mut self, path: &str) -> AdapterResult<Vec<DirEntry>> {
        let lines = self
            .stream_mut()?
            .list(Some(path))
            .map_err(Self::classify)?;
        Ok(lines.iter().filter_map(|line| DirEntry::parse(line)).collect())
    }

    fn size(&mut self, path: &str) -> AdapterResult<u64> {
        self.stream_mut()?
            .size(path)
            .map(|n| n as u64)
            .map_err(Self::classify)
    }

    fn retr_at(&mut self, path: &str, offset: u64) -> AdapterResult<Box<dyn RetrStream>> {
        let stream = self.stream.take().ok_or_else(|| AdapterError::broken_connection("not connected"))?;
        let mut stream = stream;
        if offset > 0 {
            stream.resume_transfer(offset as usize).map_err(Self::classify)?;
        }
        let reader = stream.retr_as_stream(path).map_err(Self::classify)?;
        Ok(Box::new(SuppaftpRetr {
            reader: Some(reader),
            stream: Some(stream),
        }))
    }

    fn stor_at(&mut self, path: &str, offset: u64) -> AdapterResult<Box<dyn StorStream>> {
        let stream = self.stream.take().ok_or_else(|| AdapterError::broken_connection("not connected"))?;
        let mut stream = stream;
        if offset > 0 {
            stream.resume_transfer(offset as usize).map_err(Self::classify)?;
        }
        let writer = stream.put_with_stream(path).map_err(Self::classify)?;
        Ok(Box::new(SuppaftpStor {
            writer: Some(writer),
            stream: Some(stream),
        }))
    }

    fn mkdir(&mut self, path: &str) -> AdapterResult<()> {
        self.stream_mut()?.mkdir(path).map_err(Self::classify)
    }

    fn rmdir(&mut self, path: &str) -> AdapterResult<()> {
        self.stream_mut()?.rmdir(path).map_err(Self::classify)
    }

    fn delete(&mut self, path: &str) -> AdapterResult<()> {
        self.stream_mut()?.rm(path).map_err(Self::classify)
    }

    fn rename(&mut self, from: &str, to: &str) -> AdapterResult<()> {
        self.stream_mut()?.rename(from, to).map_err(Self::classify)
    }

    fn noop(&mut self) -> AdapterResult<()> {
        self.stream_mut()?.noop().map_err(Self::classify)
    }

    fn quit(&mut self) -> AdapterResult<()> {
        if let Some(mut stream) = self.stream.take() {
            stream.quit().map_err(Self::classify)?;
        }
        Ok(())
    }
}

struct SuppaftpRetr {
    reader: Option<suppaftp::DataStream>,
    stream: Option<FtpStream>,
}

impl Read for SuppaftpRetr {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.reader.as_mut() {
            Some(r) => r.read(buf),
            None => Ok(0),
        }
    }
}

impl RetrStream for SuppaftpRetr {
    fn finish(mut self: Box<Self>) -> AdapterResult<()> {
        let reader = self.reader.take().expect("reader present while open");
        let mut stream = self.stream.take().expect("stream present while reader alive");
        stream.finalize_retr_stream(reader).map_err(SuppaftpTransport::classify)
    }

    fn abort(mut self: Box<Self>) -> AdapterResult<()> {
        let reader = self.reader.take().expect("reader present while open");
        let mut stream = self.stream.take().expect("stream present while reader alive");
        stream.abort(reader).map_err(SuppaftpTransport::classify)
    }
}

struct SuppaftpStor {
    writer: Option<suppaftp::DataStream>,
    stream: Option<FtpStream>,
}

impl Write for SuppaftpStor {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.writer.as_mut() {
            Some(w) => w.write(buf),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.writer.as_mut() {
            Some(w) => w.flush(),
            None => Ok(()),
        }
    }
}

impl StorStream for SuppaftpStor {
    fn finish(mut self: Box<Self>) -> AdapterResult<()> {
        let writer = self.writer.take().expect("writer present while open");
        let mut stream = self.stream.take().expect("stream present while writer alive");
        stream.finalize_put_stream(writer).map_err(SuppaftpTransport::classify)
    }

    fn abort(mut self: Box<Self>) -> AdapterResult<()> {
        let writer = self.writer.take().expect("writer present while open");
        let mut stream = self.stream.take().expect("stream present while writer alive");
        stream.abort(writer).map_err(SuppaftpTransport::classify)
    }
}

/// In-memory transport for unit and integration tests. Models a flat
/// filesystem of `path -> bytes` plus a set of directories, enough to
/// exercise every adapter code path without a live server.
#[cfg(any(test, feature = "test-support"))]
pub mod mock {
    use super::*;
    use std::collections::BTreeMap;
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct State {
        files: BTreeMap<String, Vec<u8>>,
        dirs: std::collections::BTreeSet<String>,
        connected: bool,
    }

    /// Shared handle so a test can inspect or mutate the backing store
    /// while the adapter under test holds its own `MockTransport`.
    #[derive(Clone, Default)]
    pub struct MockBackend(Arc<Mutex<State>>);

    impl MockBackend {
        pub fn new() -> Self {
            let mut state = State::default();
            state.dirs.insert(String::from("/"));
            Self(Arc::new(Mutex::new(state)))
        }

        pub fn put_file(&self, path: &str, contents: &[u8]) {
            self.0.lock().unwrap().files.insert(path.to_string(), contents.to_vec());
        }

        pub fn make_dir(&self, path: &str) {
            self.0.lock().unwrap().dirs.insert(path.to_string());
        }

        pub fn file_contents(&self, path: &str) -> Option<Vec<u8>> {
            self.0.lock().unwrap().files.get(path).cloned()
        }
    }

    pub struct MockTransport {
        backend: MockBackend,
    }

    impl MockTransport {
        pub fn new(backend: MockBackend) -> Self {
            Self { backend }
        }
    }

    /// The backing store is keyed by absolute path; `Adapter::path_str`
    /// hands the transport root-relative, leading-slash-free paths once
    /// `cwd` has run, so reconstitute the absolute form here the way a real
    /// session-relative FTP server would resolve it against its cwd.
    fn normalize(path: &str) -> String {
        match path {
            "." | "" => "/".to_string(),
            p if p.starts_with('/') => p.to_string(),
            p => format!("/{p}"),
        }
    }

    struct MockRetr {
        cursor: Cursor<Vec<u8>>,
    }

    impl Read for MockRetr {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.cursor.read(buf)
        }
    }

    impl RetrStream for MockRetr {
        fn finish(self: Box<Self>) -> AdapterResult<()> {
            Ok(())
        }
        fn abort(self: Box<Self>) -> AdapterResult<()> {
            Ok(())
        }
    }

    struct MockStor {
        backend: MockBackend,
        path: String,
        buf: Vec<u8>,
    }

    impl Write for MockStor {
        fn write(&mut self, data: &[u8]) -> io::Result<usize> {
            self.buf.extend_from_slice(data);
            Ok(data.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl StorStream for MockStor {
        fn finish(self: Box<Self>) -> AdapterResult<()> {
            self.backend.0.lock().unwrap().files.insert(self.path, self.buf);
            Ok(())
        }
        fn abort(self: Box<Self>) -> AdapterResult<()> {
            Ok(())
        }
    }

    impl FtpTransport for MockTransport {
        fn login(&mut self, _addr: SocketAddr, _user: &str, _pass: &str, _timeout: Duration) -> AdapterResult<()> {
            self.backend.0.lock().unwrap().connected = true;
            Ok(())
        }

        fn cwd(&mut self, path: &str) -> AdapterResult<()> {
            let path = normalize(path);
            if self.backend.0.lock().unwrap().dirs.contains(&path) {
                Ok(())
            } else {
                Err(AdapterError::not_found(format!("{path}: no such directory")))
            }
        }

        fn list(&mut self, path: &str) -> AdapterResult<Vec<DirEntry>> {
            let path = normalize(path);
            let prefix = if path.ends_with('/') { path.clone() } else { format!("{path}/") };
            let state = self.backend.0.lock().unwrap();
            let mut out = Vec::new();
            for (file_path, bytes) in state.files.iter() {
                if let Some(rest) = file_path.strip_prefix(&prefix) {
                    if !rest.contains('/') && !rest.is_empty() {
                        out.push(DirEntry::file(rest, bytes.len() as u64));
                    }
                }
            }
            for dir in state.dirs.iter() {
                if let Some(rest) = dir.strip_prefix(&prefix) {
                    if !rest.is_empty() && !rest.contains('/') {
                        out.push(DirEntry::dir(rest));
                    }
                }
            }
            Ok(out)
        }

        fn size(&mut self, path: &str) -> AdapterResult<u64> {
            let path = normalize(path);
            self.backend
                .0
                .lock()
                .unwrap()
                .files
                .get(&path)
                .map(|b| b.len() as u64)
                .ok_or_else(|| AdapterError::not_found(format!("{path}: no such file")))
        }

        fn retr_at(&mut self, path: &str, offset: u64) -> AdapterResult<Box<dyn RetrStream>> {
            let path = normalize(path);
            let bytes = self
                .backend
                .0
                .lock()
                .unwrap()
                .files
                .get(&path)
                .cloned()
                .ok_or_else(|| AdapterError::not_found(format!("{path}: no such file")))?;
            let tail = bytes.into_iter().skip(offset as usize).collect();
            Ok(Box::new(MockRetr { cursor: Cursor::new(tail) }))
        }

        fn stor_at(&mut self, path: &str, offset: u64) -> AdapterResult<Box<dyn StorStream>> {
            let path = normalize(path);
            let prefix = if offset > 0 {
                self.backend
                    .0
                    .lock()
                    .unwrap()
                    .files
                    .get(&path)
                    .map(|b| b.iter().take(offset as usize).copied().collect())
                    .unwrap_or_default()
            } else {
                Vec::new()
            };
            Ok(Box::new(MockStor {
                backend: self.backend.clone(),
                path,
                buf: prefix,
            }))
        }

        fn mkdir(&mut self, path: &str) -> AdapterResult<()> {
            let path = normalize(path);
            let mut state = self.backend.0.lock().unwrap();
            if state.dirs.contains(&path) {
                return Err(AdapterError::already_exists(format!("{path}: already exists")));
            }
            // Real servers answer `MKD` over an existing file with a generic
            // "Create directory operation failed" 550, not one that names the
            // file specifically — mirror that ambiguity here so callers must
            // fall back to a `LIST` to tell the two apart.
            if state.files.contains_key(&path) {
                return Err(AdapterError::io(format!("{path}: create directory operation failed")));
            }
            state.dirs.insert(path);
            Ok(())
        }

        fn rmdir(&mut self, path: &str) -> AdapterResult<()> {
            let path = normalize(path);
            let mut state = self.backend.0.lock().unwrap();
            let has_children = state
                .files
                .keys()
                .chain(state.dirs.iter())
                .any(|p| *p != path && p.starts_with(&format!("{path}/")));
            if has_children {
                return Err(AdapterError::dir_not_empty(format!("{path}: not empty")));
            }
            if !state.dirs.remove(&path) {
                return Err(AdapterError::not_found(format!("{path}: no such directory")));
            }
            Ok(())
        }

        fn delete(&mut self, path: &str) -> AdapterResult<()> {
            let path = normalize(path);
            let mut state = self.backend.0.lock().unwrap();
            if state.files.remove(&path).is_none() {
                return Err(AdapterError::not_found(format!("{path}: no such file")));
            }
            Ok(())
        }

        fn rename(&mut self, from: &str, to: &str) -> AdapterResult<()> {
            let from = normalize(from);
            let to = normalize(to);
            let mut state = self.backend.0.lock().unwrap();
            if let Some(bytes) = state.files.remove(&from) {
                state.files.insert(to, bytes);
                return Ok(());
            }
            if state.dirs.remove(&from) {
                state.dirs.insert(to);
                return Ok(());
            }
            Err(AdapterError::not_found(format!("{from}: no such file or directory")))
        }

        fn noop(&mut self) -> AdapterResult<()> {
            Ok(())
        }

        fn quit(&mut self) -> AdapterResult<()> {
            self.backend.0.lock().unwrap().connected = false;
            Ok(())
        }
    }
}
