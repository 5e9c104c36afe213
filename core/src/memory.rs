use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard,
    },
};

use crate::{
    client::{ArtellaClient, ClientError, RemoteNode},
    project::RemotePath,
    user::UserId,
};

#[derive(Debug, Clone)]
struct MemoryFile {
    content: Vec<u8>,
    maximum_version: u32,
    locked_by: Option<UserId>,
    deleted: bool,
}

#[derive(Debug, Default)]
struct MemoryTree {
    files: BTreeMap<RemotePath, MemoryFile>,
    folders: BTreeSet<RemotePath>,
}

impl MemoryTree {
    fn is_folder(&self, path: &RemotePath) -> bool {
        path.is_root()
            || self.folders.contains(path)
            || self
                .files
                .keys()
                .any(|file_path| file_path != path && file_path.starts_with(path))
    }

    fn file_node(&self, path: &RemotePath, file: &MemoryFile) -> RemoteNode {
        let mut node = RemoteNode::absent(path.clone());
        node.exists = true;
        node.locked = file.locked_by.is_some();
        node.locked_by = file.locked_by.clone();
        node.locked_by_display = file.locked_by.as_ref().map(|user| user.to_string());
        node.size = file.content.len() as i64;
        node.deleted = file.deleted;
        node.maximum_version = Some(file.maximum_version);
        node
    }

    fn folder_node(&self, path: &RemotePath) -> RemoteNode {
        let mut node = RemoteNode::absent(path.clone());
        node.exists = true;
        node.is_directory = true;

        let children = self
            .files
            .keys()
            .chain(self.folders.iter())
            .filter(|child| *child != path && child.starts_with(path))
            .filter_map(|child| {
                let relative = if path.is_root() {
                    child.as_str()
                } else {
                    &child.as_str()[path.as_str().len() + 1..]
                };
                relative.split('/').next().map(|name| name.to_string())
            })
            .collect::<BTreeSet<String>>();

        for name in children {
            let child_path = path.join(&name);
            let child = match self.files.get(&child_path) {
                Some(file) => self.file_node(&child_path, file),
                None => {
                    let mut folder = RemoteNode::absent(child_path);
                    folder.exists = true;
                    folder.is_directory = true;
                    folder
                }
            };
            node.references.insert(name, child);
        }

        node
    }
}

/// In-process asset server: a shared file tree and lock table. Each user
/// talks to it through its own [`MemorySession`].
#[derive(Debug, Clone, Default)]
pub struct MemoryServer {
    tree: Arc<Mutex<MemoryTree>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryServer {
    pub fn new() -> Self {
        Self::default()
    }

    fn tree(&self) -> MutexGuard<'_, MemoryTree> {
        // A panicking holder cannot leave the tree half written, so a poisoned
        // lock is still usable
        self.tree.lock().unwrap_or_else(|error| error.into_inner())
    }

    pub fn session(&self, user: UserId) -> MemorySession {
        MemorySession {
            server: self.clone(),
            user,
        }
    }

    pub fn set_unavailable(&self, value: bool) {
        self.unavailable.store(value, Ordering::Relaxed)
    }

    pub fn put(&self, path: &str, content: &[u8]) {
        let path = RemotePath::new(path);
        let mut tree = self.tree();
        let maximum_version = tree
            .files
            .get(&path)
            .map(|file| file.maximum_version + 1)
            .unwrap_or(1);
        tree.files.insert(
            path,
            MemoryFile {
                content: content.to_vec(),
                maximum_version,
                locked_by: None,
                deleted: false,
            },
        );
    }

    pub fn mark_deleted(&self, path: &str) {
        if let Some(file) = self.tree().files.get_mut(&RemotePath::new(path)) {
            file.deleted = true;
        }
    }

    pub fn mkdir(&self, path: &str) {
        self.tree().folders.insert(RemotePath::new(path));
    }

    pub fn content(&self, path: &str) -> Option<Vec<u8>> {
        self.tree()
            .files
            .get(&RemotePath::new(path))
            .map(|file| file.content.clone())
    }

    pub fn holder(&self, path: &str) -> Option<UserId> {
        self.tree()
            .files
            .get(&RemotePath::new(path))
            .and_then(|file| file.locked_by.clone())
    }

    pub fn maximum_version(&self, path: &str) -> Option<u32> {
        self.tree()
            .files
            .get(&RemotePath::new(path))
            .map(|file| file.maximum_version)
    }

    fn ensure_available(&self) -> Result<(), ClientError> {
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(ClientError::ServerUnavailable);
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct MemorySession {
    server: MemoryServer,
    user: UserId,
}

impl ArtellaClient for MemorySession {
    fn user(&self) -> UserId {
        self.user.clone()
    }

    fn status(&self, path: &RemotePath) -> Result<RemoteNode, ClientError> {
        self.server.ensure_available()?;
        let tree = self.server.tree();
        if let Some(file) = tree.files.get(path) {
            return Ok(tree.file_node(path, file));
        }
        if tree.is_folder(path) {
            return Ok(tree.folder_node(path));
        }
        Ok(RemoteNode::absent(path.clone()))
    }

    fn lock(&self, path: &RemotePath) -> Result<(), ClientError> {
        self.server.ensure_available()?;
        let mut tree = self.server.tree();
        let file = tree
            .files
            .get_mut(path)
            .ok_or_else(|| ClientError::NotFound(path.clone()))?;
        file.locked_by = Some(self.user.clone());
        Ok(())
    }

    fn unlock(&self, path: &RemotePath) -> Result<(), ClientError> {
        self.server.ensure_available()?;
        let mut tree = self.server.tree();
        let file = tree
            .files
            .get_mut(path)
            .ok_or_else(|| ClientError::NotFound(path.clone()))?;
        match &file.locked_by {
            Some(holder) if holder != &self.user => Err(ClientError::Unknown(format!(
                "{} is locked by {}",
                path, holder
            ))),
            _ => {
                file.locked_by = None;
                Ok(())
            }
        }
    }

    fn download(&self, path: &RemotePath, destination: &Path) -> Result<u64, ClientError> {
        self.server.ensure_available()?;
        let content = {
            let tree = self.server.tree();
            tree.files
                .get(path)
                .filter(|file| !file.deleted)
                .map(|file| file.content.clone())
                .ok_or_else(|| ClientError::NotFound(path.clone()))?
        };
        fs::write(destination, &content)
            .map_err(|error| ClientError::Io(destination.to_path_buf(), error.to_string()))?;
        Ok(content.len() as u64)
    }

    fn upload(
        &self,
        source: &Path,
        path: &RemotePath,
        _comment: &str,
    ) -> Result<u32, ClientError> {
        self.server.ensure_available()?;
        let content = fs::read(source)
            .map_err(|error| ClientError::Io(source.to_path_buf(), error.to_string()))?;
        let mut tree = self.server.tree();
        let file = tree.files.entry(path.clone()).or_insert(MemoryFile {
            content: vec![],
            maximum_version: 0,
            locked_by: None,
            deleted: false,
        });
        file.content = content;
        file.maximum_version += 1;
        file.deleted = false;
        Ok(file.maximum_version)
    }
}
