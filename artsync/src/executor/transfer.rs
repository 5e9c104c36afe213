use std::{
    fs,
    path::{Path, PathBuf},
};

use artsync_core::{
    client::RemoteNode,
    error::SyncError,
    job::SyncFailure,
    project::RemotePath,
    types::{AssetCategory, CompareResult, FileStatus, WORKING_FOLDER},
    version::{parse_version, texture_key, CategoryComparison, VersionSet},
};
use tempfile::NamedTempFile;
use walkdir::WalkDir;

use crate::{context::SyncContext, executor::Executor, task::TaskOutput};

use super::JobRun;

/// One remote file to bring on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub remote: RemotePath,
    /// Remove lower local versions of the same file once downloaded. Only
    /// meaningful inside a category folder, where names carry versions.
    pub replace_older: bool,
}

impl Transfer {
    pub fn mirror(remote: RemotePath) -> Self {
        Self {
            remote,
            replace_older: false,
        }
    }

    pub fn new_version(remote: RemotePath) -> Self {
        Self {
            remote,
            replace_older: true,
        }
    }
}

/// Bring a remote file on local disk through a temporary file of the
/// destination folder
pub fn download(context: &SyncContext, transfer: &Transfer) -> Result<PathBuf, SyncError> {
    let remote = &transfer.remote;
    let destination = context.paths().local(remote);
    let file_name = remote
        .file_name()
        .ok_or_else(|| SyncError::OutsideProject(destination.clone()))?;
    let folder = destination
        .parent()
        .ok_or_else(|| SyncError::OutsideProject(destination.clone()))?;
    fs::create_dir_all(folder).map_err(|error| SyncError::Io(folder.to_path_buf(), error))?;

    let temporary =
        NamedTempFile::new_in(folder).map_err(|error| SyncError::Io(folder.to_path_buf(), error))?;
    let size = context.client().download(remote, temporary.path())?;

    if transfer.replace_older {
        for older in older_versions(folder, file_name) {
            log::info!("Remove outdated {}", older.display());
            fs::remove_file(&older).map_err(|error| SyncError::Io(older.clone(), error))?;
        }
    }
    temporary
        .persist(&destination)
        .map_err(|error| SyncError::Io(destination.clone(), error.error))?;

    log::info!("Downloaded {} ({} bytes)", destination.display(), size);
    Ok(destination)
}

/// Local files of `folder` which are lower versions of `file_name`
fn older_versions(folder: &Path, file_name: &str) -> Vec<PathBuf> {
    let Some(version) = parse_version(file_name) else {
        return vec![];
    };
    let key = texture_key(file_name);

    WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            let Some(name) = entry.file_name().to_str() else {
                return false;
            };
            !name.starts_with('.')
                && name != file_name
                && texture_key(name) == key
                && parse_version(name).map_or(false, |other| other < version)
        })
        .map(|entry| entry.path().to_path_buf())
        .collect()
}

/// Download files one by one. Item errors are recorded and the batch goes on,
/// a fatal error stops it.
fn download_all(
    context: &SyncContext,
    run: &mut JobRun,
    transfers: &[Transfer],
) -> Result<TaskOutput, SyncError> {
    let total = transfers.len();
    let mut downloaded = vec![];
    run.progress(0, total);

    for (index, transfer) in transfers.iter().enumerate() {
        if run.cancelled() {
            log::info!(
                "[{}] Cancelled after {} of {} files",
                run.job(),
                index,
                total
            );
            break;
        }

        match download(context, transfer) {
            Ok(path) => downloaded.push(path),
            Err(error) if error.is_fatal() => {
                return Err(error.partial(downloaded.len(), total));
            }
            Err(error) => run.failure(SyncFailure::new(transfer.remote.as_str(), error)),
        }
        run.progress(index + 1, total);
    }

    Ok(TaskOutput::Downloaded(downloaded))
}

/// Every live file below `path` (or `path` itself when it is a live file)
fn live_files_below(
    context: &SyncContext,
    run: &mut JobRun,
    path: &RemotePath,
    files: &mut Vec<RemoteNode>,
) -> Result<(), SyncError> {
    if run.cancelled() {
        return Ok(());
    }

    let node = context.lock_client().status(path)?;
    if !node.exists {
        log::info!("[{}] {} does not exist on server", run.job(), path);
        return Ok(());
    }
    if !node.is_directory {
        if node.is_live_file() {
            files.push(node);
        }
        return Ok(());
    }

    files.extend(node.live_files().cloned());
    for directory in node.directories() {
        live_files_below(context, run, &directory.path, files)?;
    }

    Ok(())
}

pub struct FileSyncExecutor {
    files: Vec<RemotePath>,
}

impl FileSyncExecutor {
    pub fn new(files: Vec<RemotePath>) -> Self {
        Self { files }
    }
}

impl Executor for FileSyncExecutor {
    fn execute(&self, context: &SyncContext, run: &mut JobRun) -> Result<TaskOutput, SyncError> {
        let transfers = self
            .files
            .iter()
            .cloned()
            .map(Transfer::mirror)
            .collect::<Vec<Transfer>>();
        download_all(context, run, &transfers)
    }
}

/// Mirror every live file below a remote folder. Local files are never
/// removed: names of a sequence folder are distinct files, not versions.
pub struct PathSyncExecutor {
    path: RemotePath,
    full_sync: bool,
}

impl PathSyncExecutor {
    pub fn new(path: RemotePath, full_sync: bool) -> Self {
        Self { path, full_sync }
    }

    fn is_missing(&self, context: &SyncContext, file: &RemoteNode) -> bool {
        if self.full_sync {
            return true;
        }
        match fs::metadata(context.paths().local(&file.path)) {
            Ok(metadata) => metadata.len() as i64 != file.size,
            Err(_) => true,
        }
    }
}

impl Executor for PathSyncExecutor {
    fn execute(&self, context: &SyncContext, run: &mut JobRun) -> Result<TaskOutput, SyncError> {
        let mut files = vec![];
        live_files_below(context, run, &self.path, &mut files)?;
        if run.interrupted() {
            return Ok(TaskOutput::Downloaded(vec![]));
        }

        let transfers = files
            .into_iter()
            .filter(|file| self.is_missing(context, file))
            .map(|file| Transfer::mirror(file.path))
            .collect::<Vec<Transfer>>();
        log::info!("[{}] {} files to download", run.job(), transfers.len());
        download_all(context, run, &transfers)
    }
}

pub struct AssetSyncExecutor {
    asset: RemotePath,
    selection: Vec<(FileStatus, AssetCategory)>,
    full_sync: bool,
}

impl AssetSyncExecutor {
    pub fn new(
        asset: RemotePath,
        selection: Vec<(FileStatus, AssetCategory)>,
        full_sync: bool,
    ) -> Self {
        Self {
            asset,
            selection,
            full_sync,
        }
    }

    fn wanted(&self, result: CompareResult) -> bool {
        self.full_sync || result.needs_download()
    }

    /// Latest working files of one category which must be downloaded
    fn plan_working(
        &self,
        context: &SyncContext,
        category: AssetCategory,
    ) -> Result<Vec<Transfer>, SyncError> {
        let remote_folder = self.asset.join(WORKING_FOLDER).join(&category.to_string());
        let registry = context.registry();
        let server = registry.max_server_version(&remote_folder, category)?;
        let local = registry.max_local_version(&context.paths().local(&remote_folder), category);

        let Some(comparison) = registry.compare(&local, &server) else {
            return Ok(vec![]);
        };

        let files = match (&comparison, &server) {
            (CategoryComparison::Textures { textures, .. }, VersionSet::Textures(server)) => server
                .iter()
                .filter(|(key, _)| {
                    textures
                        .get(*key)
                        .map_or(false, |result| self.wanted(*result))
                })
                .map(|(_, file)| file)
                .collect(),
            _ if self.wanted(comparison.result()) => server.files(),
            _ => vec![],
        };

        Ok(files
            .into_iter()
            .map(|file| Transfer::new_version(RemotePath::new(&file.path.to_string_lossy())))
            .collect())
    }

    /// Content of the latest published folder of one category, when it must
    /// be downloaded
    fn plan_published(
        &self,
        context: &SyncContext,
        run: &mut JobRun,
        category: AssetCategory,
    ) -> Result<Vec<Transfer>, SyncError> {
        let registry = context.registry();
        let server = registry.max_server_published_version(&self.asset, category)?;
        let local =
            registry.max_local_published_version(&context.paths().local(&self.asset), category);

        let Some(comparison) = registry.compare(&local, &server) else {
            return Ok(vec![]);
        };
        let Some(folder) = server.files().into_iter().next() else {
            return Ok(vec![]);
        };
        if !self.wanted(comparison.result()) {
            return Ok(vec![]);
        }

        let mut files = vec![];
        live_files_below(
            context,
            run,
            &RemotePath::new(&folder.path.to_string_lossy()),
            &mut files,
        )?;
        Ok(files
            .into_iter()
            .map(|file| Transfer::mirror(file.path))
            .collect())
    }
}

impl Executor for AssetSyncExecutor {
    fn execute(&self, context: &SyncContext, run: &mut JobRun) -> Result<TaskOutput, SyncError> {
        let mut transfers = vec![];
        for (status, category) in &self.selection {
            if run.cancelled() {
                return Ok(TaskOutput::Downloaded(vec![]));
            }
            let planned = match status {
                FileStatus::Working => self.plan_working(context, *category),
                FileStatus::Published => self.plan_published(context, run, *category),
            };
            match planned {
                Ok(category_transfers) => transfers.extend(category_transfers),
                Err(error) if error.is_fatal() => return Err(error),
                Err(error) => run.failure(SyncFailure::new(
                    format!("{}/{} ({})", self.asset, category, status),
                    error,
                )),
            }
        }

        log::info!(
            "[{}] {} files to download for {}",
            run.job(),
            transfers.len(),
            self.asset
        );
        download_all(context, run, &transfers)
    }
}
