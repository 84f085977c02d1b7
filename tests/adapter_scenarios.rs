//! End-to-end scenarios against the public pool/handle/inode machinery.
//!
//! `fuser::Request` can only be constructed from a raw kernel message, so
//! these scenarios drive the adapter's moving parts directly (pool, handle,
//! inode table, address controller) rather than through the `Filesystem`
//! trait methods themselves. `src/adapter.rs`'s own `#[cfg(test)]` module
//! covers the path-translation logic that sits in front of them.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use fuseftp::mock::{MockBackend, MockTransport};
use fuseftp::{ClientConfig, FtpTransport, Handle, Pool, TransportFactory};

fn config() -> ClientConfig {
    ClientConfig::new("127.0.0.1:21".parse::<SocketAddr>().unwrap(), "anon", "anon").pool_cap(8)
}

fn pool_over(backend: MockBackend) -> Arc<Pool> {
    let factory: Box<TransportFactory> = Box::new(move || Box::new(MockTransport::new(backend.clone())) as Box<dyn FtpTransport>);
    Pool::new(&config(), factory)
}

#[test]
fn small_write_then_read_round_trip() {
    let backend = MockBackend::new();
    let pool = pool_over(backend.clone());
    backend.put_file("/greeting.txt", b"");

    let handle =
        Handle::create(Arc::clone(&pool), "/greeting.txt".into(), 64 * 1024, Default::default())
            .unwrap();
    handle.write(0, b"hello, ").unwrap();
    handle.write(7, b"world").unwrap();
    handle.flush().unwrap();

    let handle = Handle::open(pool, "/greeting.txt".into(), 64 * 1024, Default::default()).unwrap();
    let data = handle.read(0, 32).unwrap();
    assert_eq!(&data, b"hello, world");
}

#[test]
fn many_files_written_concurrently() {
    let backend = MockBackend::new();
    let pool = pool_over(backend.clone());

    let workers: Vec<_> = (0..8)
        .map(|i| {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                let path = format!("/file-{i}.txt");
                let handle = Handle::create(pool, path, 64 * 1024, Default::default()).unwrap();
                handle.write(0, format!("payload-{i}").as_bytes()).unwrap();
                handle.flush().unwrap();
            })
        })
        .collect();
    for w in workers {
        w.join().unwrap();
    }

    for i in 0..8 {
        let expected = format!("payload-{i}");
        assert_eq!(backend.file_contents(&format!("/file-{i}.txt")).unwrap(), expected.into_bytes());
    }
}

#[test]
fn truncate_then_extend_preserves_prefix_and_appends_tail() {
    let backend = MockBackend::new();
    backend.put_file("/log.bin", b"0123456789");
    let pool = pool_over(backend.clone());

    let handle = Handle::open(pool, "/log.bin".into(), 64 * 1024, Default::default()).unwrap();
    handle.truncate(4).unwrap();
    handle.write(4, b"tail").unwrap();
    handle.flush().unwrap();

    assert_eq!(backend.file_contents("/log.bin").unwrap(), b"0123tail");
}

#[test]
fn set_address_invalidates_in_flight_handle() {
    let backend = MockBackend::new();
    backend.put_file("/a.txt", b"before");
    let pool = pool_over(backend.clone());

    let handle = Handle::open(Arc::clone(&pool), "/a.txt".into(), 64 * 1024, Default::default()).unwrap();
    assert_eq!(&handle.read(0, 6).unwrap(), b"before");

    pool.set_address("127.0.0.1:2121".parse().unwrap(), "anon".into(), "anon".into());

    // The handle's lease predates the new epoch; the next operation must
    // transparently reconnect rather than serve stale data or error out.
    backend.put_file("/a.txt", b"after!");
    let data = handle.read(0, 6).unwrap();
    assert_eq!(&data, b"after!");
}

#[test]
fn rename_moves_file_across_directories() {
    let backend = MockBackend::new();
    backend.make_dir("/src");
    backend.make_dir("/dst");
    backend.put_file("/src/report.csv", b"a,b,c");
    let pool = pool_over(backend.clone());

    let mut lease = pool.lease().unwrap();
    lease.transport_mut().rename("/src/report.csv", "/dst/report.csv").unwrap();
    lease.finish(false);

    assert!(backend.file_contents("/src/report.csv").is_none());
    assert_eq!(backend.file_contents("/dst/report.csv").unwrap(), b"a,b,c");
}

#[test]
fn directory_listing_reports_files_and_subdirectories() {
    let backend = MockBackend::new();
    backend.make_dir("/docs");
    backend.put_file("/docs/a.txt", b"1");
    backend.put_file("/docs/b.txt", b"22");
    backend.make_dir("/docs/sub");
    let pool = pool_over(backend);

    let mut lease = pool.lease().unwrap();
    let mut entries = lease.transport_mut().list("/docs").unwrap();
    lease.finish(false);
    entries.sort_by(|a, b| a.name.cmp(&b.name));

    let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["a.txt", "b.txt", "sub"]);
}

#[test]
fn delete_of_missing_file_is_not_found() {
    let backend = MockBackend::new();
    let pool = pool_over(backend);
    let mut lease = pool.lease().unwrap();
    let err = lease.transport_mut().delete("/missing.txt").unwrap_err();
    lease.finish(false);
    assert_eq!(err.kind, fuseftp::ErrorKind::NotFound);
}

#[test]
fn rmdir_of_nonempty_directory_fails() {
    let backend = MockBackend::new();
    backend.make_dir("/full");
    backend.put_file("/full/keepme.txt", b"x");
    let pool = pool_over(backend);
    let mut lease = pool.lease().unwrap();
    let err = lease.transport_mut().rmdir("/full").unwrap_err();
    lease.finish(false);
    assert_eq!(err.kind, fuseftp::ErrorKind::DirNotEmpty);
}

#[test]
fn inode_table_allocates_stable_ids_across_a_rename() {
    let table = fuseftp::InodeTable::new("/");
    let ino = table.observe(Path::new("/a.txt"));
    table.reparent(ino, "/b.txt".into());
    assert_eq!(table.path_of(ino).as_deref(), Some(Path::new("/b.txt")));
    assert_eq!(table.observe(Path::new("/b.txt")), ino);
}
