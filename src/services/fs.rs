//! Filesystem service: descriptor table, directory iteration and watchers.
//!
//! Open descriptors live in a `Mutex<HashMap<id, OpenFile>>`, matching the
//! other per-window/per-socket tables in this crate. `fs.watch` wraps a
//! `notify::RecommendedWatcher`, polling its channel non-blockingly and
//! forwarding filesystem events across the IPC boundary. `chown`/`lchown`
//! and the caller-supplied-signal path in `process.rs` are the two places
//! in this crate that reach past `std` into `libc`, since POSIX ownership
//! has no safe standard-library equivalent.

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::ffi::CString;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, channel};

use crate::error::RouteError;
use crate::result::IdGenerator;

/// Directory listing page size when a caller doesn't request one.
const DEFAULT_DIR_PAGE: usize = 256;

struct OpenFile {
    handle: File,
    path: PathBuf,
    /// Set by `retainOpenDescriptor`: survives a
    /// `closeOpenDescriptors(preserveRetained=true)` sweep (spec §3).
    retained: bool,
    /// Spec §3 mentions a `stale` descriptor state; nothing in this crate
    /// currently marks a descriptor stale (no cross-process fd sharing),
    /// so it is always `false` here but present for wire-shape parity.
    stale: bool,
}

struct DirHandle {
    entries: Vec<Value>,
    cursor: usize,
}

struct WatchHandle {
    _watcher: RecommendedWatcher,
    events: Receiver<notify::Result<Event>>,
}

#[derive(Default)]
pub struct FsService {
    ids: IdGenerator,
    descriptors: Mutex<HashMap<u64, OpenFile>>,
    dirs: Mutex<HashMap<u64, DirHandle>>,
    watchers: Mutex<HashMap<u64, WatchHandle>>,
}

fn stat_json(metadata: &fs::Metadata) -> Value {
    json!({
        "size": metadata.len(),
        "isDirectory": metadata.is_dir(),
        "isFile": metadata.is_file(),
        "isSymlink": metadata.file_type().is_symlink(),
        "mode": metadata.mode(),
        "mtimeMillis": metadata.mtime() * 1000 + metadata.mtime_nsec() / 1_000_000,
    })
}

fn cstring(path: &str) -> Result<CString, RouteError> {
    CString::new(path).map_err(|_| RouteError::invalid_parameter("path"))
}

impl FsService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self, path: &str, flags: i32, _mode: u32) -> Result<u64, RouteError> {
        let mut options = OpenOptions::new();
        options.read(true);
        if flags & 0o1 != 0 || flags & 0o2 != 0 {
            options.write(true);
        }
        if flags & 0o100 != 0 {
            options.create(true);
        }
        if flags & 0o1000 != 0 {
            options.truncate(true);
        }
        if flags & 0o2000 != 0 {
            options.append(true);
        }

        let handle = options.open(path)?;
        let id = self.ids.next();
        self.descriptors.lock().insert(
            id,
            OpenFile {
                handle,
                path: PathBuf::from(path),
                retained: false,
                stale: false,
            },
        );
        Ok(id)
    }

    pub fn close(&self, id: u64) -> Result<(), RouteError> {
        self.descriptors
            .lock()
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| RouteError::not_found(format!("no open descriptor {id}")))
    }

    pub fn read(&self, id: u64, size: usize, offset: Option<u64>) -> Result<Vec<u8>, RouteError> {
        let mut table = self.descriptors.lock();
        let entry = table
            .get_mut(&id)
            .ok_or_else(|| RouteError::not_found(format!("no open descriptor {id}")))?;
        if let Some(offset) = offset {
            entry.handle.seek(SeekFrom::Start(offset))?;
        }
        let mut buf = vec![0u8; size];
        let read = entry.handle.read(&mut buf)?;
        buf.truncate(read);
        Ok(buf)
    }

    pub fn write(&self, id: u64, data: &[u8], offset: Option<u64>) -> Result<usize, RouteError> {
        let mut table = self.descriptors.lock();
        let entry = table
            .get_mut(&id)
            .ok_or_else(|| RouteError::not_found(format!("no open descriptor {id}")))?;
        if let Some(offset) = offset {
            entry.handle.seek(SeekFrom::Start(offset))?;
        }
        let written = entry.handle.write(data)?;
        Ok(written)
    }

    pub fn stat(&self, path: &str) -> Result<Value, RouteError> {
        Ok(stat_json(&fs::metadata(path)?))
    }

    pub fn lstat(&self, path: &str) -> Result<Value, RouteError> {
        Ok(stat_json(&fs::symlink_metadata(path)?))
    }

    pub fn fstat(&self, id: u64) -> Result<Value, RouteError> {
        let table = self.descriptors.lock();
        let entry = table
            .get(&id)
            .ok_or_else(|| RouteError::not_found(format!("no open descriptor {id}")))?;
        Ok(stat_json(&entry.handle.metadata()?))
    }

    pub fn fsync(&self, id: u64) -> Result<(), RouteError> {
        let table = self.descriptors.lock();
        let entry = table
            .get(&id)
            .ok_or_else(|| RouteError::not_found(format!("no open descriptor {id}")))?;
        entry.handle.sync_all()?;
        Ok(())
    }

    pub fn ftruncate(&self, id: u64, len: u64) -> Result<(), RouteError> {
        let table = self.descriptors.lock();
        let entry = table
            .get(&id)
            .ok_or_else(|| RouteError::not_found(format!("no open descriptor {id}")))?;
        entry.handle.set_len(len)?;
        Ok(())
    }

    pub fn mkdir(&self, path: &str, recursive: bool) -> Result<(), RouteError> {
        if recursive {
            fs::create_dir_all(path)?;
        } else {
            fs::create_dir(path)?;
        }
        Ok(())
    }

    pub fn rmdir(&self, path: &str) -> Result<(), RouteError> {
        fs::remove_dir(path)?;
        Ok(())
    }

    pub fn unlink(&self, path: &str) -> Result<(), RouteError> {
        fs::remove_file(path)?;
        Ok(())
    }

    pub fn rename(&self, from: &str, to: &str) -> Result<(), RouteError> {
        fs::rename(from, to)?;
        Ok(())
    }

    pub fn copy_file(&self, from: &str, to: &str) -> Result<u64, RouteError> {
        Ok(fs::copy(from, to)?)
    }

    pub fn link(&self, existing: &str, new: &str) -> Result<(), RouteError> {
        fs::hard_link(existing, new)?;
        Ok(())
    }

    pub fn symlink(&self, target: &str, linkpath: &str) -> Result<(), RouteError> {
        std::os::unix::fs::symlink(target, linkpath)?;
        Ok(())
    }

    pub fn readlink(&self, path: &str) -> Result<String, RouteError> {
        Ok(fs::read_link(path)?.to_string_lossy().into_owned())
    }

    pub fn realpath(&self, path: &str) -> Result<String, RouteError> {
        Ok(fs::canonicalize(path)?.to_string_lossy().into_owned())
    }

    /// `access(2)`: `mode` is the caller's `F_OK`/`R_OK`/`W_OK`/`X_OK` bitmask.
    pub fn access(&self, path: &str, mode: i32) -> Result<(), RouteError> {
        let c_path = cstring(path)?;
        let result = unsafe { libc::access(c_path.as_ptr(), mode) };
        if result == 0 {
            Ok(())
        } else {
            Err(std::io::Error::last_os_error().into())
        }
    }

    pub fn chmod(&self, path: &str, mode: u32) -> Result<(), RouteError> {
        fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
        Ok(())
    }

    pub fn chown(&self, path: &str, uid: u32, gid: u32) -> Result<(), RouteError> {
        let c_path = cstring(path)?;
        let result = unsafe { libc::chown(c_path.as_ptr(), uid, gid) };
        if result == 0 {
            Ok(())
        } else {
            Err(std::io::Error::last_os_error().into())
        }
    }

    pub fn lchown(&self, path: &str, uid: u32, gid: u32) -> Result<(), RouteError> {
        let c_path = cstring(path)?;
        let result = unsafe { libc::lchown(c_path.as_ptr(), uid, gid) };
        if result == 0 {
            Ok(())
        } else {
            Err(std::io::Error::last_os_error().into())
        }
    }

    /// Full, path-based directory listing — kept alongside
    /// `opendir`/`readdir(id)`/`closedir` for callers that want one shot
    /// rather than a paginated descriptor.
    pub fn readdir(&self, path: &str) -> Result<Vec<Value>, RouteError> {
        let mut out = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            out.push(json!({
                "name": entry.file_name().to_string_lossy(),
                "isDirectory": file_type.is_dir(),
            }));
        }
        Ok(out)
    }

    /// Opens a paginated directory stream, the POSIX `opendir` counterpart
    /// to `readdir(id, entries)`/`closedir`.
    pub fn opendir(&self, path: &str) -> Result<u64, RouteError> {
        let entries = self.readdir(path)?;
        let id = self.ids.next();
        self.dirs.lock().insert(id, DirHandle { entries, cursor: 0 });
        Ok(id)
    }

    /// Returns up to `count` (default 256) entries from where the last call
    /// for `id` left off.
    pub fn readdir_page(&self, id: u64, count: Option<usize>) -> Result<Vec<Value>, RouteError> {
        let mut table = self.dirs.lock();
        let handle = table
            .get_mut(&id)
            .ok_or_else(|| RouteError::not_found(format!("no open directory {id}")))?;
        let count = count.unwrap_or(DEFAULT_DIR_PAGE);
        let end = (handle.cursor + count).min(handle.entries.len());
        let page = handle.entries[handle.cursor..end].to_vec();
        handle.cursor = end;
        Ok(page)
    }

    pub fn closedir(&self, id: u64) -> Result<(), RouteError> {
        self.dirs
            .lock()
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| RouteError::not_found(format!("no open directory {id}")))
    }

    /// Starts watching `path`, returning the id new filesystem events are
    /// filed under. The watcher's channel is polled from `poll_events`,
    /// matching the event loop's cooperative-polling model rather than
    /// spawning an unmanaged OS thread per watch.
    pub fn watch(&self, path: &str) -> Result<u64, RouteError> {
        let (tx, rx) = channel();
        let mut watcher = notify::recommended_watcher(tx)
            .map_err(|e| RouteError::internal(e.to_string()))?;
        watcher
            .watch(std::path::Path::new(path), RecursiveMode::Recursive)
            .map_err(|e| RouteError::internal(e.to_string()))?;

        let id = self.ids.next();
        self.watchers.lock().insert(
            id,
            WatchHandle {
                _watcher: watcher,
                events: rx,
            },
        );
        Ok(id)
    }

    pub fn unwatch(&self, id: u64) -> Result<(), RouteError> {
        self.watchers
            .lock()
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| RouteError::not_found(format!("no active watcher {id}")))
    }

    /// Drains pending change events for `id` without blocking; called from
    /// the event loop's idle tick.
    pub fn poll_events(&self, id: u64) -> Vec<Value> {
        let table = self.watchers.lock();
        let mut out = Vec::new();
        if let Some(handle) = table.get(&id) {
            while let Ok(Ok(event)) = handle.events.try_recv() {
                out.push(json!({
                    "kind": format!("{:?}", event.kind),
                    "paths": event.paths.iter().map(|p| p.to_string_lossy().to_string()).collect::<Vec<_>>(),
                }));
            }
        }
        out
    }

    pub fn path_of(&self, id: u64) -> Option<PathBuf> {
        self.descriptors.lock().get(&id).map(|e| e.path.clone())
    }

    pub fn open_descriptor_count(&self) -> usize {
        self.descriptors.lock().len()
    }

    /// Protects `id` from a `closeOpenDescriptors(preserveRetained=true)`
    /// sweep (spec §3).
    pub fn retain_open_descriptor(&self, id: u64) -> Result<(), RouteError> {
        let mut table = self.descriptors.lock();
        let entry = table
            .get_mut(&id)
            .ok_or_else(|| RouteError::not_found(format!("no open descriptor {id}")))?;
        entry.retained = true;
        Ok(())
    }

    /// Testable invariant 3 (§8): every live descriptor's id, path, and
    /// retained/stale flags — not just a count.
    pub fn get_open_descriptors(&self) -> Vec<Value> {
        self.descriptors
            .lock()
            .iter()
            .map(|(id, entry)| {
                json!({
                    "id": id,
                    "path": entry.path.to_string_lossy(),
                    "retained": entry.retained,
                    "stale": entry.stale,
                })
            })
            .collect()
    }

    /// Closes every open descriptor; when `preserve_retained` is set, skips
    /// descriptors a prior `retainOpenDescriptor` call protected. Returns
    /// the number actually closed.
    pub fn close_open_descriptors(&self, preserve_retained: bool) -> usize {
        let mut table = self.descriptors.lock();
        if preserve_retained {
            let to_close: Vec<u64> = table
                .iter()
                .filter(|(_, entry)| !entry.retained)
                .map(|(id, _)| *id)
                .collect();
            for id in &to_close {
                table.remove(id);
            }
            to_close.len()
        } else {
            let count = table.len();
            table.clear();
            count
        }
    }

    /// The `O_*`/`S_*`/`*_OK` numeric constants callers need to build
    /// `fs.open` flags, interpret `fs.stat` modes, and call `fs.access`.
    pub fn constants(&self) -> Value {
        json!({
            "O_RDONLY": libc::O_RDONLY,
            "O_WRONLY": libc::O_WRONLY,
            "O_RDWR": libc::O_RDWR,
            "O_CREAT": libc::O_CREAT,
            "O_TRUNC": libc::O_TRUNC,
            "O_APPEND": libc::O_APPEND,
            "S_IFMT": libc::S_IFMT,
            "S_IFDIR": libc::S_IFDIR,
            "S_IFREG": libc::S_IFREG,
            "S_IFLNK": libc::S_IFLNK,
            "F_OK": libc::F_OK,
            "R_OK": libc::R_OK,
            "W_OK": libc::W_OK,
            "X_OK": libc::X_OK,
        })
    }
}

pub type SharedFsService = Arc<FsService>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_write_read_close_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.txt");
        let fs = FsService::new();

        let id = fs.open(path.to_str().unwrap(), 0o101, 0o644).unwrap();
        fs.write(id, b"hello", None).unwrap();
        let read = fs.read(id, 5, Some(0)).unwrap();
        assert_eq!(read, b"hello");
        fs.close(id).unwrap();
        assert!(fs.close(id).is_err());
    }

    #[test]
    fn stat_reports_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.txt");
        fs::write(&path, b"1234").unwrap();
        let svc = FsService::new();
        let stat = svc.stat(path.to_str().unwrap()).unwrap();
        assert_eq!(stat["size"], json!(4));
    }

    #[test]
    fn lstat_reports_symlink_without_following_it() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("target.txt");
        let link = dir.path().join("link.txt");
        fs::write(&target, b"hi").unwrap();
        let svc = FsService::new();
        svc.symlink(target.to_str().unwrap(), link.to_str().unwrap()).unwrap();
        let stat = svc.lstat(link.to_str().unwrap()).unwrap();
        assert_eq!(stat["isSymlink"], json!(true));
    }

    #[test]
    fn copy_link_and_readlink_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.txt");
        let copy = dir.path().join("copy.txt");
        let symlink = dir.path().join("sym.txt");
        fs::write(&source, b"payload").unwrap();

        let svc = FsService::new();
        svc.copy_file(source.to_str().unwrap(), copy.to_str().unwrap()).unwrap();
        assert_eq!(fs::read(&copy).unwrap(), b"payload");

        svc.symlink(source.to_str().unwrap(), symlink.to_str().unwrap()).unwrap();
        assert_eq!(svc.readlink(symlink.to_str().unwrap()).unwrap(), source.to_str().unwrap());
    }

    #[test]
    fn opendir_readdir_closedir_paginate() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"").unwrap();
        fs::write(dir.path().join("b.txt"), b"").unwrap();

        let svc = FsService::new();
        let id = svc.opendir(dir.path().to_str().unwrap()).unwrap();
        let first_page = svc.readdir_page(id, Some(1)).unwrap();
        assert_eq!(first_page.len(), 1);
        let second_page = svc.readdir_page(id, Some(10)).unwrap();
        assert_eq!(second_page.len(), 1);
        svc.closedir(id).unwrap();
        assert!(svc.readdir_page(id, None).is_err());
    }

    #[test]
    fn retained_descriptor_survives_close_open_descriptors() {
        let dir = tempfile::tempdir().unwrap();
        let keep = dir.path().join("keep.txt");
        let drop_path = dir.path().join("drop.txt");
        let svc = FsService::new();
        let keep_id = svc.open(keep.to_str().unwrap(), 0o101, 0o644).unwrap();
        let drop_id = svc.open(drop_path.to_str().unwrap(), 0o101, 0o644).unwrap();
        svc.retain_open_descriptor(keep_id).unwrap();

        let closed = svc.close_open_descriptors(true);
        assert_eq!(closed, 1);
        assert!(svc.fstat(keep_id).is_ok());
        assert!(svc.fstat(drop_id).is_err());
    }

    #[test]
    fn get_open_descriptors_includes_every_live_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.txt");
        let svc = FsService::new();
        let id = svc.open(path.to_str().unwrap(), 0o101, 0o644).unwrap();
        let descriptors = svc.get_open_descriptors();
        assert!(descriptors.iter().any(|d| d["id"] == json!(id)));
    }
}
