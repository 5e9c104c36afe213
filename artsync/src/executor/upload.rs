use std::path::{Path, PathBuf};

use artsync_core::{
    error::SyncError,
    job::SyncFailure,
    lock::{LockError, UnlockOutcome},
    project::RemotePath,
};

use crate::{context::SyncContext, executor::Executor, task::TaskOutput};

use super::JobRun;

/// Lock, upload as next working version, unlock. File by file, a file which
/// can't be locked is skipped. With `force_lock`, locks held by other users
/// are taken over (see [`artsync_core::lock::LockClient::lock`]).
pub struct UploadExecutor {
    files: Vec<PathBuf>,
    comment: String,
    force_lock: bool,
}

impl UploadExecutor {
    pub fn new(files: Vec<PathBuf>, comment: String, force_lock: bool) -> Self {
        Self {
            files,
            comment,
            force_lock,
        }
    }

    fn upload(&self, context: &SyncContext, file: &Path) -> Result<(RemotePath, u32), SyncError> {
        let remote = context.paths().remote(file)?;
        let lock_client = context.lock_client();

        let locked = match lock_client.lock(&remote, self.force_lock) {
            Ok(_) => true,
            // First version of a new file, nothing to lock yet
            Err(LockError::NotFound(_)) => false,
            Err(error) => return Err(error.into()),
        };

        let result = self.upload_locked(context, file, &remote);

        if locked {
            if let UnlockOutcome::Failed(error) = lock_client.unlock(&remote, true) {
                log::warn!("{} stays locked after its upload: {}", remote, error);
            }
        }

        result.map(|version| (remote, version))
    }

    fn upload_locked(
        &self,
        context: &SyncContext,
        file: &Path,
        remote: &RemotePath,
    ) -> Result<u32, SyncError> {
        let node = context.lock_client().status(remote)?;
        let expected = if node.exists {
            node.maximum_version.map_or(1, |version| version + 1)
        } else {
            1
        };

        let version = context.client().upload(file, remote, &self.comment)?;
        if version != expected {
            log::warn!(
                "{} uploaded as version {} but version {} was expected",
                remote,
                version,
                expected
            );
        }
        log::info!("Uploaded {} as version {}", remote, version);
        Ok(version)
    }
}

impl Executor for UploadExecutor {
    fn execute(&self, context: &SyncContext, run: &mut JobRun) -> Result<TaskOutput, SyncError> {
        let total = self.files.len();
        let mut uploaded = vec![];
        run.progress(0, total);

        for (index, file) in self.files.iter().enumerate() {
            if run.cancelled() {
                break;
            }
            match self.upload(context, file) {
                Ok(done) => uploaded.push(done),
                Err(error) if error.is_fatal() => {
                    return Err(error.partial(uploaded.len(), total));
                }
                Err(error) => run.failure(SyncFailure::new(file, error)),
            }
            run.progress(index + 1, total);
        }

        Ok(TaskOutput::Uploaded(uploaded))
    }
}
