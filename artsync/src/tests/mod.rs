use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use artsync_core::memory::{MemoryServer, MemorySession};
use artsync_core::user::UserId;
use testdir::testdir;
use uuid::Uuid;
use walkdir::WalkDir;

use crate::context::SyncContext;

pub fn tmpdir() -> PathBuf {
    let path = testdir!().join(PathBuf::from(Uuid::new_v4().to_string()));
    fs::create_dir_all(&path).unwrap();
    path
}

pub fn memory_server(files: &[(&str, &[u8])]) -> MemoryServer {
    let server = MemoryServer::new();
    for (path, content) in files {
        server.put(path, content);
    }
    server
}

pub fn session(server: &MemoryServer, user: &str) -> MemorySession {
    server.session(UserId::from(user))
}

pub fn context(server: &MemoryServer, user: &str, local_root: &Path) -> SyncContext {
    SyncContext::new(
        Arc::new(session(server, user)),
        local_root.to_path_buf(),
    )
    .with_poll_interval(Duration::from_millis(5))
}

pub fn ensure_local(local_root: &Path, files: &[(&str, &[u8])]) {
    for (path, content) in files {
        let absolute_path = local_root.join(path);
        if let Some(parent) = absolute_path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&absolute_path, content).unwrap();
    }
}

/// Project relative paths of all (not hidden) files on disk, sorted
pub fn disk_files(local_root: &Path) -> Vec<String> {
    let mut files = WalkDir::new(local_root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            !entry
                .file_name()
                .to_str()
                .map_or(true, |name| name.starts_with('.'))
        })
        .filter_map(|entry| {
            entry
                .path()
                .strip_prefix(local_root)
                .ok()
                .and_then(|path| path.to_str())
                .map(|path| path.replace('\\', "/"))
        })
        .collect::<Vec<String>>();
    files.sort();
    files
}

pub fn sorted_names(paths: &[PathBuf]) -> Vec<String> {
    let mut names = paths
        .iter()
        .filter_map(|path| path.file_name())
        .filter_map(|name| name.to_str())
        .map(|name| name.to_string())
        .collect::<Vec<String>>();
    names.sort();
    names
}
