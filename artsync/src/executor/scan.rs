use artsync_core::{
    error::SyncError,
    job::SyncFailure,
    project::RemotePath,
    sync::SyncCandidate,
    types::{FileStatus, StatusFilter, SyncType, WORKING_FOLDER},
    version::{VersionRegistry, VersionSet},
};

use crate::{context::SyncContext, executor::Executor, task::TaskOutput};

use super::JobRun;

/// Compare every asset of a remote category folder with its local mirror:
/// working files of `<asset>/__working__/<category>` and the latest
/// `<asset>/__<category>_vNNN__` published folders
pub struct ScanExecutor {
    root: RemotePath,
    sync_type: SyncType,
    status: StatusFilter,
}

impl ScanExecutor {
    pub fn new(root: RemotePath, sync_type: SyncType, status: StatusFilter) -> Self {
        Self {
            root,
            sync_type,
            status,
        }
    }

    fn scan_asset(
        &self,
        context: &SyncContext,
        asset: &RemotePath,
    ) -> Result<Vec<SyncCandidate>, SyncError> {
        let registry = context.registry();
        let asset_node = context.lock_client().status(asset)?;
        let local_asset = context.paths().local(asset);
        let working_folder = asset.join(WORKING_FOLDER);
        let working_on_server = asset_node
            .references
            .get(WORKING_FOLDER)
            .map_or(false, |node| node.is_directory);
        let working_on_disk = context.paths().local(&working_folder).is_dir();
        let mut candidates = vec![];

        for status in self.status.statuses() {
            if status == FileStatus::Working && !working_on_server && !working_on_disk {
                continue;
            }

            for category in self.sync_type.categories() {
                let (local, server) = match status {
                    FileStatus::Working => {
                        let category_folder = working_folder.join(&category.to_string());
                        let server = if working_on_server {
                            registry.max_server_version(&category_folder, category)?
                        } else {
                            VersionSet::empty(category)
                        };
                        let local = registry
                            .max_local_version(&context.paths().local(&category_folder), category);
                        (local, server)
                    }
                    FileStatus::Published => (
                        registry.max_local_published_version(&local_asset, category),
                        VersionRegistry::published_versions(&asset_node, category),
                    ),
                };

                if let Some(comparison) = registry.compare(&local, &server) {
                    log::debug!(
                        "{} ({}/{}): {}",
                        asset,
                        status,
                        category,
                        comparison.result()
                    );
                    candidates.push(SyncCandidate {
                        asset: asset.clone(),
                        status,
                        category,
                        comparison,
                    });
                }
            }
        }

        Ok(candidates)
    }
}

impl Executor for ScanExecutor {
    fn execute(&self, context: &SyncContext, run: &mut JobRun) -> Result<TaskOutput, SyncError> {
        let root = context.lock_client().status(&self.root)?;
        if !root.exists {
            log::info!("[{}] {} does not exist on server", run.job(), self.root);
            return Ok(TaskOutput::Candidates(vec![]));
        }

        let assets = root
            .directories()
            .map(|node| node.path.clone())
            .collect::<Vec<RemotePath>>();
        let total = assets.len();
        let mut candidates = vec![];
        run.progress(0, total);

        for (index, asset) in assets.iter().enumerate() {
            if run.cancelled() {
                break;
            }
            match self.scan_asset(context, asset) {
                Ok(asset_candidates) => candidates.extend(asset_candidates),
                Err(error) if error.is_fatal() => return Err(error),
                Err(error) => run.failure(SyncFailure::new(asset.as_str(), error)),
            }
            run.progress(index + 1, total);
        }

        Ok(TaskOutput::Candidates(candidates))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{tests::*, worker::CancelToken};
    use artsync_core::{
        job::{SyncJob, SyncKind},
        types::{AssetCategory, CompareResult},
    };
    use crossbeam_channel::unbounded;
    use pretty_assertions::assert_eq;

    fn scan(context: &SyncContext, status: StatusFilter) -> Vec<SyncCandidate> {
        let (events, _receiver) = unbounded();
        let cancel = CancelToken::new();
        let mut job = SyncJob::new(SyncKind::Scan, vec![]);
        let mut run = JobRun::new(context, &mut job, &events, &cancel);

        match ScanExecutor::new(RemotePath::new("Props"), SyncType::All, status)
            .execute(context, &mut run)
            .unwrap()
        {
            TaskOutput::Candidates(candidates) => candidates,
            other => panic!("Unexpected output {:?}", other),
        }
    }

    fn summary(
        candidates: &[SyncCandidate],
    ) -> Vec<(String, FileStatus, AssetCategory, CompareResult)> {
        candidates
            .iter()
            .map(|candidate| {
                (
                    candidate.asset.to_string(),
                    candidate.status,
                    candidate.category,
                    candidate.result(),
                )
            })
            .collect()
    }

    #[test]
    fn test_scan_published_folders() {
        // Given
        let tmpdir = tmpdir();
        let server = memory_server(&[
            ("Props/box/__model_v001__/model/box.ma", b"m1"),
            ("Props/box/__model_v004__/model/box.ma", b"m4"),
            ("Props/box/__textures_v002__/textures/box_diffuse.png", b"t2"),
            ("Props/lamp/__rig_v001__/rig/lamp_rig.ma", b"r1"),
        ]);
        ensure_local(
            &tmpdir,
            &[
                ("Props/box/__model_v004__/model/box.ma", b"m4"),
                ("Props/box/__textures_v001__/textures/box_diffuse.png", b"t1"),
            ],
        );
        let context = context(&server, "jane", &tmpdir);

        // When
        let candidates = scan(&context, StatusFilter::Published);

        // Then
        assert_eq!(
            summary(&candidates),
            vec![
                (
                    "Props/box".to_string(),
                    FileStatus::Published,
                    AssetCategory::Model,
                    CompareResult::UpToDate
                ),
                (
                    "Props/box".to_string(),
                    FileStatus::Published,
                    AssetCategory::Textures,
                    CompareResult::Outdated
                ),
                (
                    "Props/lamp".to_string(),
                    FileStatus::Published,
                    AssetCategory::Rig,
                    CompareResult::ServerOnly
                ),
            ]
        );
    }

    #[test]
    fn test_scan_working_ignores_published_folders() {
        let tmpdir = tmpdir();
        let server = memory_server(&[
            ("Props/box/__working__/model/box_model_v002.ma", b"w2"),
            ("Props/box/__model_v001__/model/box.ma", b"m1"),
        ]);
        let context = context(&server, "jane", &tmpdir);

        let candidates = scan(&context, StatusFilter::Working);

        assert_eq!(
            summary(&candidates),
            vec![(
                "Props/box".to_string(),
                FileStatus::Working,
                AssetCategory::Model,
                CompareResult::ServerOnly
            )]
        );
    }
}
