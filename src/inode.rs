//! Bridges `fuser`'s inode-numbered API to the FTP protocol's path-addressed
//! one. Unlike the teacher's own inode store, there is no on-disk attribute
//! cache to keep in sync: an inode here is nothing but a handle onto a
//! remote path, allocated the first time that path is observed and retired
//! only via `forget`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use fuser::INodeNo;
use parking_lot::Mutex;

struct State {
    ino_to_path: HashMap<u64, PathBuf>,
    path_to_ino: HashMap<PathBuf, u64>,
    lookup_counts: HashMap<u64, u64>,
    next_ino: u64,
}

/// Bidirectional `ino <-> path` map, guarded by a single lock. Inode 1 is
/// reserved for the mount root and is seeded at construction.
pub struct InodeTable {
    state: Mutex<State>,
}

impl InodeTable {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let mut ino_to_path = HashMap::new();
        let mut path_to_ino = HashMap::new();
        let root = root.into();
        ino_to_path.insert(INodeNo::ROOT.0, root.clone());
        path_to_ino.insert(root, INodeNo::ROOT.0);
        Self {
            state: Mutex::new(State {
                ino_to_path,
                path_to_ino,
                lookup_counts: HashMap::new(),
                next_ino: INodeNo::ROOT.0 + 1,
            }),
        }
    }

    pub fn root_path(&self) -> PathBuf {
        self.state.lock().ino_to_path[&INodeNo::ROOT.0].clone()
    }

    /// Resolve an inode to its remote path, if it is still known.
    pub fn path_of(&self, ino: INodeNo) -> Option<PathBuf> {
        self.state.lock().ino_to_path.get(&ino.0).cloned()
    }

    /// Look up the inode for a path, allocating a fresh one on first sight
    /// and bumping its FUSE lookup refcount. Call this from `lookup` and
    /// from `readdir`'s entry enumeration.
    pub fn observe(&self, path: &Path) -> INodeNo {
        let mut state = self.state.lock();
        if let Some(&ino) = state.path_to_ino.get(path) {
            *state.lookup_counts.entry(ino).or_insert(0) += 1;
            return INodeNo(ino);
        }
        let ino = state.next_ino;
        state.next_ino += 1;
        state.ino_to_path.insert(ino, path.to_path_buf());
        state.path_to_ino.insert(path.to_path_buf(), ino);
        state.lookup_counts.insert(ino, 1);
        INodeNo(ino)
    }

    /// Rewrite the path an inode refers to, e.g. after a `rename`. No-op if
    /// the inode has already been forgotten.
    pub fn reparent(&self, ino: INodeNo, new_path: PathBuf) {
        let mut state = self.state.lock();
        if let Some(old_path) = state.ino_to_path.insert(ino.0, new_path.clone()) {
            state.path_to_ino.remove(&old_path);
            state.path_to_ino.insert(new_path, ino.0);
        }
    }

    /// Rewrite every inode whose path falls under `from` (inclusive) to the
    /// corresponding path under `to`, e.g. after a directory rename. Unlike
    /// [`InodeTable::reparent`], this catches descendants the kernel
    /// allocated inodes for before the rename (via an earlier `lookup` or
    /// `readdir`) that would otherwise keep pointing at a now-nonexistent
    /// path.
    pub fn reparent_subtree(&self, from: &Path, to: &Path) {
        let mut state = self.state.lock();
        let affected: Vec<(u64, PathBuf)> = state
            .path_to_ino
            .iter()
            .filter(|(p, _)| *p == from || p.starts_with(from))
            .map(|(p, &ino)| (ino, p.clone()))
            .collect();
        for (ino, old_path) in affected {
            let new_path = match old_path.strip_prefix(from) {
                Ok(rest) => to.join(rest),
                Err(_) => continue,
            };
            state.path_to_ino.remove(&old_path);
            state.ino_to_path.insert(ino, new_path.clone());
            state.path_to_ino.insert(new_path, ino);
        }
    }

    /// Remove every inode whose path falls under `path` after a delete or
    /// an overwriting rename, without waiting for the kernel's `forget`.
    pub fn evict_subtree(&self, path: &Path) {
        let mut state = self.state.lock();
        let doomed: Vec<u64> = state
            .path_to_ino
            .iter()
            .filter(|(p, _)| *p == path || p.starts_with(path))
            .map(|(_, &ino)| ino)
            .collect();
        for ino in doomed {
            if let Some(p) = state.ino_to_path.remove(&ino) {
                state.path_to_ino.remove(&p);
            }
            state.lookup_counts.remove(&ino);
        }
    }

    /// Apply the kernel's `forget(ino, nlookup)` refcount decrement,
    /// retiring the inode once it reaches zero. The root inode is never
    /// retired.
    pub fn forget(&self, ino: INodeNo, nlookup: u64) {
        if ino == INodeNo::ROOT {
            return;
        }
        let mut state = self.state.lock();
        let remaining = match state.lookup_counts.get_mut(&ino.0) {
            Some(count) => {
                *count = count.saturating_sub(nlookup);
                *count
            }
            None => return,
        };
        if remaining == 0 {
            state.lookup_counts.remove(&ino.0);
            if let Some(path) = state.ino_to_path.remove(&ino.0) {
                state.path_to_ino.remove(&path);
            }
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.state.lock().ino_to_path.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_is_preseeded() {
        let table = InodeTable::new("/");
        assert_eq!(table.path_of(INodeNo::ROOT).as_deref(), Some(Path::new("/")));
    }

    #[test]
    fn observe_allocates_once_per_path() {
        let table = InodeTable::new("/");
        let a = table.observe(Path::new("/a.txt"));
        let b = table.observe(Path::new("/a.txt"));
        assert_eq!(a, b);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn forget_retires_after_refcount_drains() {
        let table = InodeTable::new("/");
        let ino = table.observe(Path::new("/a.txt"));
        table.observe(Path::new("/a.txt"));
        table.forget(ino, 1);
        assert!(table.path_of(ino).is_some());
        table.forget(ino, 1);
        assert!(table.path_of(ino).is_none());
    }

    #[test]
    fn reparent_updates_both_directions() {
        let table = InodeTable::new("/");
        let ino = table.observe(Path::new("/a.txt"));
        table.reparent(ino, PathBuf::from("/b.txt"));
        assert_eq!(table.path_of(ino).as_deref(), Some(Path::new("/b.txt")));
        assert_eq!(table.observe(Path::new("/b.txt")), ino);
    }

    #[test]
    fn reparent_subtree_rewrites_descendants() {
        let table = InodeTable::new("/");
        let dir = table.observe(Path::new("/a"));
        let child = table.observe(Path::new("/a/b.txt"));
        table.reparent_subtree(Path::new("/a"), Path::new("/c"));
        assert_eq!(table.path_of(dir).as_deref(), Some(Path::new("/c")));
        assert_eq!(table.path_of(child).as_deref(), Some(Path::new("/c/b.txt")));
        assert_eq!(table.observe(Path::new("/c/b.txt")), child);
    }
}
