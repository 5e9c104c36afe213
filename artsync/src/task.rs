use std::path::PathBuf;

use artsync_core::{
    job::SyncKind,
    project::RemotePath,
    sync::SyncCandidate,
    types::{AssetCategory, FileStatus, StatusFilter, SyncType},
};

use crate::executor::{
    scan::ScanExecutor,
    transfer::{AssetSyncExecutor, FileSyncExecutor, PathSyncExecutor},
    upload::UploadExecutor,
    Executor,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Work {
    /// Download the latest version of each given remote file
    Files(Vec<RemotePath>),
    /// Download every live file below a remote folder
    Path { path: RemotePath, full_sync: bool },
    /// Download the selected categories of one asset
    Asset {
        asset: RemotePath,
        selection: Vec<(FileStatus, AssetCategory)>,
        full_sync: bool,
    },
    /// Compare every asset of a remote category folder with local disk
    Scan {
        root: RemotePath,
        sync_type: SyncType,
        status: StatusFilter,
    },
    /// Upload local files as new working versions. `force_lock` takes the
    /// locks over from their holders.
    Upload {
        files: Vec<PathBuf>,
        comment: String,
        force_lock: bool,
    },
}

/// A unit of background work, executed by a [`crate::worker::Worker`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncTask {
    work: Work,
}

impl SyncTask {
    pub fn new(work: Work) -> Self {
        Self { work }
    }

    pub fn files(files: Vec<RemotePath>) -> Self {
        Self::new(Work::Files(files))
    }

    pub fn path(path: RemotePath, full_sync: bool) -> Self {
        Self::new(Work::Path { path, full_sync })
    }

    pub fn asset(
        asset: RemotePath,
        selection: Vec<(FileStatus, AssetCategory)>,
        full_sync: bool,
    ) -> Self {
        Self::new(Work::Asset {
            asset,
            selection,
            full_sync,
        })
    }

    pub fn scan(root: RemotePath, sync_type: SyncType, status: StatusFilter) -> Self {
        Self::new(Work::Scan {
            root,
            sync_type,
            status,
        })
    }

    pub fn upload(files: Vec<PathBuf>, comment: &str, force_lock: bool) -> Self {
        Self::new(Work::Upload {
            files,
            comment: comment.to_string(),
            force_lock,
        })
    }

    pub fn work(&self) -> &Work {
        &self.work
    }

    pub fn kind(&self) -> SyncKind {
        match &self.work {
            Work::Files(_) => SyncKind::FileSync,
            Work::Path { .. } => SyncKind::PathSync,
            Work::Asset { .. } => SyncKind::CategorySync,
            Work::Scan { .. } => SyncKind::Scan,
            Work::Upload { .. } => SyncKind::Upload,
        }
    }

    pub fn targets(&self) -> Vec<PathBuf> {
        match &self.work {
            Work::Files(files) => files
                .iter()
                .map(|file| PathBuf::from(file.as_str()))
                .collect(),
            Work::Path { path, .. } => vec![PathBuf::from(path.as_str())],
            Work::Asset { asset, .. } => vec![PathBuf::from(asset.as_str())],
            Work::Scan { root, .. } => vec![PathBuf::from(root.as_str())],
            Work::Upload { files, .. } => files.clone(),
        }
    }

    pub fn executor(&self) -> Box<dyn Executor> {
        match &self.work {
            Work::Files(files) => Box::new(FileSyncExecutor::new(files.clone())),
            Work::Path { path, full_sync } => {
                Box::new(PathSyncExecutor::new(path.clone(), *full_sync))
            }
            Work::Asset {
                asset,
                selection,
                full_sync,
            } => Box::new(AssetSyncExecutor::new(
                asset.clone(),
                selection.clone(),
                *full_sync,
            )),
            Work::Scan {
                root,
                sync_type,
                status,
            } => Box::new(ScanExecutor::new(root.clone(), *sync_type, *status)),
            Work::Upload {
                files,
                comment,
                force_lock,
            } => Box::new(UploadExecutor::new(
                files.clone(),
                comment.clone(),
                *force_lock,
            )),
        }
    }
}

/// What a finished task produced, in addition to its job state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TaskOutput {
    #[default]
    Nothing,
    Downloaded(Vec<PathBuf>),
    Candidates(Vec<SyncCandidate>),
    Uploaded(Vec<(RemotePath, u32)>),
}
