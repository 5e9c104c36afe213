use std::{
    collections::BTreeMap,
    io,
    path::{Path, PathBuf},
    sync::Arc,
};

use artsync_core::{
    error::SyncError,
    job::{JobStatus, SyncFailure, SyncJob},
    lock::{LockState, UnlockOutcome},
    project::RemotePath,
    sync::SyncCandidate,
    types::{AssetCategory, FileStatus, StatusFilter, SyncType},
};

use strum_macros::Display as StrumDisplay;

use crate::{
    context::SyncContext,
    task::{SyncTask, TaskOutput},
    worker::{CancelToken, EventPump, JobOutcome, NoPump, Worker},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncOptions {
    /// Synchronize every asset, not only outdated ones
    pub full_sync: bool,
    /// Ask the sync politic before downloading anything
    pub ask_confirmation: bool,
    pub sync_type: SyncType,
    pub status: StatusFilter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UploadOptions {
    /// Don't ask the scene saver to save files before their upload
    pub skip_saving: bool,
    /// Take over locks held by other users instead of skipping their files
    pub force_lock: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, StrumDisplay)]
pub enum Outcome {
    NothingToSync,
    Declined,
    Completed,
    CompletedWithFailures,
    Cancelled,
    Failed,
}

#[derive(Debug)]
pub struct SyncReport {
    pub outcome: Outcome,
    pub jobs: Vec<SyncJob>,
    pub failures: Vec<SyncFailure>,
    pub candidates: Vec<SyncCandidate>,
    pub output: Vec<TaskOutput>,
    pub error: Option<SyncError>,
}

impl SyncReport {
    fn new(outcome: Outcome) -> Self {
        Self {
            outcome,
            jobs: vec![],
            failures: vec![],
            candidates: vec![],
            output: vec![],
            error: None,
        }
    }

    fn push(&mut self, outcome: JobOutcome) {
        self.failures.extend(outcome.job.failures().iter().cloned());
        self.jobs.push(outcome.job);
        self.output.push(outcome.output);
        if self.error.is_none() {
            self.error = outcome.error;
        }
    }

    /// Fold job states into the report outcome
    fn conclude(mut self) -> Self {
        let statuses = self
            .jobs
            .iter()
            .map(|job| job.status())
            .collect::<Vec<JobStatus>>();
        self.outcome = if statuses.contains(&JobStatus::Failed) {
            Outcome::Failed
        } else if statuses.contains(&JobStatus::Cancelled) {
            Outcome::Cancelled
        } else if !self.failures.is_empty() {
            Outcome::CompletedWithFailures
        } else {
            Outcome::Completed
        };
        log::info!(
            "{} ({} jobs, {} failures)",
            self.outcome,
            self.jobs.len(),
            self.failures.len()
        );
        self
    }

    /// Files written on disk by the jobs of this report
    pub fn downloaded(&self) -> Vec<PathBuf> {
        self.output
            .iter()
            .filter_map(|output| match output {
                TaskOutput::Downloaded(files) => Some(files.clone()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    /// Files uploaded by the jobs of this report, with their new version
    pub fn uploaded(&self) -> Vec<(RemotePath, u32)> {
        self.output
            .iter()
            .filter_map(|output| match output {
                TaskOutput::Uploaded(files) => Some(files.clone()),
                _ => None,
            })
            .flatten()
            .collect()
    }
}

/// Entry point of tools: decide what is stale, run the transfers on a worker
/// and wait for them while keeping the caller responsive
pub struct SyncOrchestrator {
    context: Arc<SyncContext>,
    cancel: CancelToken,
    pump: Box<dyn EventPump>,
}

impl SyncOrchestrator {
    pub fn new(context: Arc<SyncContext>) -> Self {
        Self {
            context,
            cancel: CancelToken::new(),
            pump: Box::new(NoPump),
        }
    }

    pub fn with_pump(mut self, pump: Box<dyn EventPump>) -> Self {
        self.pump = pump;
        self
    }

    pub fn context(&self) -> &Arc<SyncContext> {
        &self.context
    }

    /// Token cancelling the running operation. It is reset when a new
    /// operation starts.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    fn worker(&self, name: &str) -> Worker {
        Worker::new(name, self.context.clone())
    }

    fn run(&mut self, worker: &Worker, task: SyncTask) -> Result<JobOutcome, SyncError> {
        let handle = worker.enqueue_with(task, self.cancel.clone())?;
        Ok(handle.wait(self.pump.as_mut()))
    }

    /// Synchronize the assets of a category folder (`Characters`, `Props`...)
    pub fn sync_category(
        &mut self,
        category: &str,
        options: &SyncOptions,
    ) -> Result<SyncReport, SyncError> {
        self.cancel.reset();
        self.run_category(category, options)
    }

    fn run_category(
        &mut self,
        category: &str,
        options: &SyncOptions,
    ) -> Result<SyncReport, SyncError> {
        let root = RemotePath::new(category);
        let mut worker = self.worker(&format!("sync::{}", root));
        log::info!(
            "Synchronize category {} ({}, {}, full sync: {})",
            root,
            options.sync_type,
            options.status,
            options.full_sync
        );

        let scan = self.run(
            &worker,
            SyncTask::scan(root.clone(), options.sync_type, options.status),
        )?;
        let candidates = match &scan.output {
            TaskOutput::Candidates(candidates) => candidates.clone(),
            _ => vec![],
        };
        let scan_status = scan.status();
        let mut report = SyncReport::new(Outcome::Completed);
        report.push(scan);
        if scan_status != JobStatus::Completed {
            worker.stop(true);
            return Ok(report.conclude());
        }

        let selected = candidates
            .iter()
            .filter(|candidate| options.full_sync || candidate.result().needs_download())
            .cloned()
            .collect::<Vec<SyncCandidate>>();
        report.candidates = selected.clone();
        if selected.is_empty() {
            log::info!("Category {} is up to date", root);
            worker.stop(true);
            report.outcome = Outcome::NothingToSync;
            return Ok(report);
        }

        if options.ask_confirmation && !self.context.politic().deal(&selected)? {
            log::info!("Synchronization of {} declined", root);
            worker.stop(true);
            report.outcome = Outcome::Declined;
            return Ok(report);
        }

        let mut assets: BTreeMap<RemotePath, Vec<(FileStatus, AssetCategory)>> = BTreeMap::new();
        for candidate in &selected {
            assets
                .entry(candidate.asset.clone())
                .or_default()
                .push((candidate.status, candidate.category));
        }

        let mut handles = vec![];
        for (asset, selection) in assets {
            handles.push(worker.enqueue_with(
                SyncTask::asset(asset, selection, options.full_sync),
                self.cancel.clone(),
            )?);
        }
        for handle in handles {
            report.push(handle.wait(self.pump.as_mut()));
        }

        worker.stop(true);
        Ok(report.conclude())
    }

    /// Download every live file below each given local folder
    pub fn sync_path(&mut self, paths: &[PathBuf]) -> Result<SyncReport, SyncError> {
        self.cancel.reset();
        let remotes = paths
            .iter()
            .map(|path| self.context.paths().remote(path))
            .collect::<Result<Vec<RemotePath>, _>>()?;
        self.sync_remote_paths(remotes, false)
    }

    fn sync_remote_paths(
        &mut self,
        paths: Vec<RemotePath>,
        full_sync: bool,
    ) -> Result<SyncReport, SyncError> {
        if paths.is_empty() {
            return Ok(SyncReport::new(Outcome::NothingToSync));
        }

        let mut worker = self.worker("sync::paths");
        let mut report = SyncReport::new(Outcome::Completed);

        let mut handles = vec![];
        for path in paths {
            handles.push(
                worker.enqueue_with(SyncTask::path(path, full_sync), self.cancel.clone())?,
            );
        }
        for handle in handles {
            report.push(handle.wait(self.pump.as_mut()));
        }

        worker.stop(true);
        Ok(report.conclude())
    }

    /// Download the given files, as local paths of the project
    pub fn sync_files(&mut self, paths: &[PathBuf]) -> Result<SyncReport, SyncError> {
        self.cancel.reset();
        let remotes = paths
            .iter()
            .map(|path| self.context.paths().remote(path))
            .collect::<Result<Vec<RemotePath>, _>>()?;
        let mut worker = self.worker("sync::files");

        let mut report = SyncReport::new(Outcome::Completed);
        report.push(self.run(&worker, SyncTask::files(remotes))?);

        worker.stop(true);
        Ok(report.conclude())
    }

    fn existing_remote(&self, path: &Path) -> Result<RemotePath, SyncError> {
        if !path.exists() {
            return Err(SyncError::Io(
                path.to_path_buf(),
                io::Error::new(io::ErrorKind::NotFound, "File does not exist"),
            ));
        }
        Ok(self.context.paths().remote(path)?)
    }

    /// Lock a local file on server. See [`artsync_core::lock::LockClient::lock`]
    /// about `force`.
    pub fn lock_file(&self, path: &Path, force: bool) -> Result<LockState, SyncError> {
        let remote = self.existing_remote(path)?;
        Ok(self.context.lock_client().lock(&remote, force)?)
    }

    pub fn unlock_file(&self, path: &Path, warn_on_failure: bool) -> Result<UnlockOutcome, SyncError> {
        let remote = self.existing_remote(path)?;
        Ok(self.context.lock_client().unlock(&remote, warn_on_failure))
    }

    /// Upload local files as their next working version. A file which can't
    /// be saved or locked is reported in failures, others are uploaded.
    pub fn upload_working_version(
        &mut self,
        paths: &[PathBuf],
        comment: &str,
        options: &UploadOptions,
    ) -> Result<SyncReport, SyncError> {
        self.cancel.reset();
        let mut failures = vec![];
        let mut files = vec![];
        for path in paths {
            if !options.skip_saving {
                if let Err(error) = self.context.saver().save(path) {
                    log::warn!("Unable to save {}: {:#}", path.display(), error);
                    failures.push(SyncFailure::new(path, error));
                    continue;
                }
            }
            files.push(path.clone());
        }

        let mut worker = self.worker("upload");
        let mut report = SyncReport::new(Outcome::Completed);
        report.failures = failures;
        if !files.is_empty() {
            report.push(self.run(&worker, SyncTask::upload(files, comment, options.force_lock))?);
        }

        worker.stop(true);
        Ok(report.conclude())
    }

    /// Synchronize each configured category, in order. Stop after a
    /// cancelled one.
    pub fn sync_all(&mut self, options: &SyncOptions) -> Result<Vec<SyncReport>, SyncError> {
        self.cancel.reset();
        let mut reports = vec![];
        for category in self.context.categories().to_vec() {
            let report = self.run_category(&category, options)?;
            let cancelled = report.outcome == Outcome::Cancelled;
            reports.push(report);
            if cancelled || self.cancel.is_cancelled() {
                log::info!("Synchronization of all categories cancelled");
                break;
            }
        }
        Ok(reports)
    }

    /// Synchronize every sequence folder found on server, in order
    pub fn sync_sequences(&mut self, options: &SyncOptions) -> Result<SyncReport, SyncError> {
        self.cancel.reset();
        let root = RemotePath::new(self.context.sequences());
        let node = self.context.lock_client().status(&root)?;
        let sequences = node
            .directories()
            .map(|sequence| sequence.path.clone())
            .collect::<Vec<RemotePath>>();
        log::info!("{} sequences found in {}", sequences.len(), root);

        self.sync_remote_paths(sequences, options.full_sync)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{context::MockSceneSaver, tests::*};
    use std::time::Duration;

    use artsync_core::{
        client::{ArtellaClient, ClientError, RemoteNode},
        job::SyncKind,
        memory::{MemoryServer, MemorySession},
        sync::{SyncPolitic, SyncPoliticError},
        types::CompareResult,
        user::UserId,
    };
    use pretty_assertions::assert_eq;
    use rstest::*;

    const BOX_V1: &str = "Props/box/__working__/model/box_model_v001.ma";
    const BOX_V2: &str = "Props/box/__working__/model/box_model_v002.ma";
    const LAMP_V1: &str = "Props/lamp/__working__/model/lamp_model_v001.ma";
    const CHAIR_V1: &str = "Props/chair/__working__/model/chair_model_v001.ma";

    struct DeclineAllSyncPolitic;

    impl SyncPolitic for DeclineAllSyncPolitic {
        fn deal(&self, _candidates: &[SyncCandidate]) -> Result<bool, SyncPoliticError> {
            Ok(false)
        }
    }

    /// Session of a user whose unlock of one path always fails
    struct FailingUnlock {
        session: MemorySession,
        failing: RemotePath,
    }

    impl ArtellaClient for FailingUnlock {
        fn user(&self) -> UserId {
            self.session.user()
        }

        fn status(&self, path: &RemotePath) -> Result<RemoteNode, ClientError> {
            self.session.status(path)
        }

        fn lock(&self, path: &RemotePath) -> Result<(), ClientError> {
            self.session.lock(path)
        }

        fn unlock(&self, path: &RemotePath) -> Result<(), ClientError> {
            if path == &self.failing {
                return Err(ClientError::ConnectionError);
            }
            self.session.unlock(path)
        }

        fn download(&self, path: &RemotePath, destination: &Path) -> Result<u64, ClientError> {
            self.session.download(path, destination)
        }

        fn upload(&self, source: &Path, path: &RemotePath, comment: &str) -> Result<u32, ClientError> {
            self.session.upload(source, path, comment)
        }
    }

    fn orchestrator(context: SyncContext) -> SyncOrchestrator {
        SyncOrchestrator::new(Arc::new(context))
    }

    fn props_server() -> MemoryServer {
        memory_server(&[
            (BOX_V1, b"box 1"),
            (BOX_V2, b"box 2"),
            (LAMP_V1, b"lamp 1"),
            (CHAIR_V1, b"chair 1"),
        ])
    }

    fn asset_jobs(report: &SyncReport) -> Vec<String> {
        report
            .jobs
            .iter()
            .filter(|job| job.kind() == SyncKind::CategorySync)
            .flat_map(|job| job.targets().to_vec())
            .map(|target| target.display().to_string())
            .collect()
    }

    #[rstest]
    #[case(false, vec!["Props/box", "Props/lamp"])]
    #[case(true, vec!["Props/box", "Props/chair", "Props/lamp"])]
    fn test_sync_category_selection(#[case] full_sync: bool, #[case] expected: Vec<&str>) {
        // Given
        let tmpdir = tmpdir();
        let server = props_server();
        ensure_local(&tmpdir, &[(BOX_V1, b"box 1"), (CHAIR_V1, b"chair 1")]);
        let mut orchestrator = orchestrator(context(&server, "jane", &tmpdir));
        let options = SyncOptions {
            full_sync,
            ..Default::default()
        };

        // When
        let report = orchestrator.sync_category("Props", &options).unwrap();

        // Then
        assert_eq!(report.outcome, Outcome::Completed);
        assert_eq!(asset_jobs(&report), expected);
        assert_eq!(
            disk_files(&tmpdir),
            vec![
                BOX_V2.to_string(),
                CHAIR_V1.to_string(),
                LAMP_V1.to_string()
            ]
        );
    }

    #[test]
    fn test_outdated_version_replaced() {
        // Given
        let tmpdir = tmpdir();
        let server = memory_server(&[
            ("Characters/foo/__working__/model/foo_model_v004.ma", b"v4"),
            ("Characters/foo/__working__/model/foo_model_v005.ma", b"v5"),
        ]);
        ensure_local(
            &tmpdir,
            &[("Characters/foo/__working__/model/foo_model_v003.ma", b"v3")],
        );
        let mut orchestrator = orchestrator(context(&server, "jane", &tmpdir));

        // When
        let report = orchestrator
            .sync_category("Characters", &SyncOptions::default())
            .unwrap();

        // Then
        assert_eq!(report.outcome, Outcome::Completed);
        assert_eq!(report.candidates.len(), 1);
        assert_eq!(report.candidates[0].result(), CompareResult::Outdated);
        assert_eq!(
            disk_files(&tmpdir),
            vec!["Characters/foo/__working__/model/foo_model_v005.ma".to_string()]
        );
        assert_eq!(
            std::fs::read(tmpdir.join("Characters/foo/__working__/model/foo_model_v005.ma"))
                .unwrap(),
            b"v5".to_vec()
        );
        assert_eq!(report.downloaded().len(), 1);
    }

    #[test]
    fn test_nothing_to_sync() {
        let tmpdir = tmpdir();
        let server = memory_server(&[(CHAIR_V1, b"chair 1")]);
        ensure_local(&tmpdir, &[(CHAIR_V1, b"chair 1")]);
        let mut orchestrator = orchestrator(context(&server, "jane", &tmpdir));

        let report = orchestrator
            .sync_category("Props", &SyncOptions::default())
            .unwrap();

        assert_eq!(report.outcome, Outcome::NothingToSync);
        assert!(asset_jobs(&report).is_empty());
    }

    #[test]
    fn test_declined_synchronization() {
        // Given
        let tmpdir = tmpdir();
        let server = props_server();
        let context = context(&server, "jane", &tmpdir)
            .with_politic(Box::new(DeclineAllSyncPolitic));
        let mut orchestrator = orchestrator(context);
        let options = SyncOptions {
            ask_confirmation: true,
            ..Default::default()
        };

        // When
        let report = orchestrator.sync_category("Props", &options).unwrap();

        // Then
        assert_eq!(report.outcome, Outcome::Declined);
        assert_eq!(report.candidates.len(), 3);
        assert_eq!(disk_files(&tmpdir), Vec::<String>::new());
    }

    #[test]
    fn test_sync_type_and_status_filter() {
        // Given
        let tmpdir = tmpdir();
        let server = memory_server(&[
            (BOX_V1, b"box 1"),
            ("Props/box/__working__/textures/box_diffuse_v002.png", b"d2"),
            ("Props/box/__textures_v001__/textures/box_diffuse.png", b"d1"),
        ]);
        let mut orchestrator = orchestrator(context(&server, "jane", &tmpdir));
        let options = SyncOptions {
            sync_type: SyncType::Textures,
            status: StatusFilter::Working,
            ..Default::default()
        };

        // When
        let report = orchestrator.sync_category("Props", &options).unwrap();

        // Then
        assert_eq!(report.outcome, Outcome::Completed);
        assert_eq!(
            disk_files(&tmpdir),
            vec!["Props/box/__working__/textures/box_diffuse_v002.png".to_string()]
        );
    }

    #[test]
    fn test_unavailable_server_fails_category() {
        let tmpdir = tmpdir();
        let server = props_server();
        server.set_unavailable(true);
        let mut orchestrator = orchestrator(context(&server, "jane", &tmpdir));

        let report = orchestrator
            .sync_category("Props", &SyncOptions::default())
            .unwrap();

        assert_eq!(report.outcome, Outcome::Failed);
        assert!(matches!(report.error, Some(SyncError::ServerUnavailable)));
    }

    #[test]
    fn test_upload_continues_after_lock_failure() {
        // Given
        let tmpdir = tmpdir();
        let files = [
            "Props/box/__working__/model/box_model.ma",
            "Props/lamp/__working__/model/lamp_model.ma",
            "Props/chair/__working__/model/chair_model.ma",
        ];
        let server = memory_server(&files.map(|file| (file, b"old".as_slice())));
        ensure_local(&tmpdir, &files.map(|file| (file, b"new".as_slice())));
        session(&server, "john")
            .lock(&RemotePath::new(files[1]))
            .unwrap();
        let mut orchestrator = orchestrator(context(&server, "jane", &tmpdir));
        let paths = files
            .iter()
            .map(|file| tmpdir.join(file))
            .collect::<Vec<PathBuf>>();

        // When
        let report = orchestrator
            .upload_working_version(
                &paths,
                "Fix normals",
                &UploadOptions {
                    skip_saving: true,
                    ..Default::default()
                },
            )
            .unwrap();

        // Then
        assert_eq!(report.outcome, Outcome::CompletedWithFailures);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].target, paths[1]);
        assert_eq!(
            report.uploaded(),
            vec![
                (RemotePath::new(files[0]), 2),
                (RemotePath::new(files[2]), 2)
            ]
        );
        assert_eq!(server.content(files[0]), Some(b"new".to_vec()));
        assert_eq!(server.content(files[1]), Some(b"old".to_vec()));
        assert_eq!(server.holder(files[0]), None);
        assert_eq!(server.holder(files[1]), Some(UserId::from("john")));
        assert_eq!(server.holder(files[2]), None);
    }

    #[test]
    fn test_upload_saves_scene_first() {
        // Given
        let tmpdir = tmpdir();
        let file = "Props/box/__working__/model/box_model.ma";
        let server = MemoryServer::new();
        ensure_local(&tmpdir, &[(file, b"scene")]);
        let mut saver = MockSceneSaver::new();
        saver.expect_save().times(1).returning(|_| Ok(()));
        let context = context(&server, "jane", &tmpdir).with_saver(Box::new(saver));
        let mut orchestrator = orchestrator(context);

        // When
        let report = orchestrator
            .upload_working_version(
                &[tmpdir.join(file)],
                "First version",
                &UploadOptions::default(),
            )
            .unwrap();

        // Then
        assert_eq!(report.outcome, Outcome::Completed);
        assert_eq!(report.uploaded(), vec![(RemotePath::new(file), 1)]);
    }

    #[test]
    fn test_sync_sequences() {
        // Given
        let tmpdir = tmpdir();
        let server = memory_server(&[
            ("Scenes/seq01/shot_v001.ma", b"s1"),
            ("Scenes/seq01/shot_v002.ma", b"s2"),
            ("Scenes/seq02/cam/cam_v001.abc", b"c1"),
        ]);
        let mut orchestrator = orchestrator(context(&server, "jane", &tmpdir));

        // When
        let report = orchestrator
            .sync_sequences(&SyncOptions::default())
            .unwrap();

        // Then
        assert_eq!(report.outcome, Outcome::Completed);
        assert_eq!(report.jobs.len(), 2);
        assert_eq!(
            disk_files(&tmpdir),
            vec![
                "Scenes/seq01/shot_v001.ma".to_string(),
                "Scenes/seq01/shot_v002.ma".to_string(),
                "Scenes/seq02/cam/cam_v001.abc".to_string()
            ]
        );
    }

    #[test]
    fn test_sync_all_categories() {
        let tmpdir = tmpdir();
        let server = memory_server(&[
            (LAMP_V1, b"lamp 1"),
            ("Characters/foo/__working__/rig/foo_rig_v001.ma", b"r1"),
        ]);
        let context = context(&server, "jane", &tmpdir)
            .with_categories(vec!["Characters".to_string(), "Props".to_string()]);
        let mut orchestrator = orchestrator(context);

        let reports = orchestrator.sync_all(&SyncOptions::default()).unwrap();

        assert_eq!(reports.len(), 2);
        assert!(reports
            .iter()
            .all(|report| report.outcome == Outcome::Completed));
        assert_eq!(
            disk_files(&tmpdir),
            vec![
                "Characters/foo/__working__/rig/foo_rig_v001.ma".to_string(),
                LAMP_V1.to_string()
            ]
        );
    }

    #[test]
    fn test_sync_files_and_path() {
        let tmpdir = tmpdir();
        let server = props_server();
        let mut orchestrator = orchestrator(context(&server, "jane", &tmpdir));

        let files = orchestrator.sync_files(&[tmpdir.join(LAMP_V1)]).unwrap();
        let path = orchestrator
            .sync_path(&[tmpdir.join("Props/box")])
            .unwrap();

        assert_eq!(files.outcome, Outcome::Completed);
        assert_eq!(path.outcome, Outcome::Completed);
        assert_eq!(
            disk_files(&tmpdir),
            vec![BOX_V1.to_string(), BOX_V2.to_string(), LAMP_V1.to_string()]
        );
    }

    #[test]
    fn test_lock_and_unlock_file() {
        // Given
        let tmpdir = tmpdir();
        let server = props_server();
        ensure_local(&tmpdir, &[(LAMP_V1, b"lamp 1")]);
        let orchestrator = orchestrator(context(&server, "jane", &tmpdir));

        // When
        let state = orchestrator.lock_file(&tmpdir.join(LAMP_V1), false).unwrap();

        // Then
        assert_eq!(state.locked_by, Some(UserId::from("jane")));
        assert!(matches!(
            orchestrator.unlock_file(&tmpdir.join(LAMP_V1), true).unwrap(),
            UnlockOutcome::Unlocked
        ));
        assert_eq!(server.holder(LAMP_V1), None);
    }

    #[test]
    fn test_lock_file_rejections() {
        let tmpdir = tmpdir();
        let server = props_server();
        let orchestrator = orchestrator(context(&server, "jane", &tmpdir.join("project")));
        let outside = tmpdir.join("elsewhere.ma");
        std::fs::write(&outside, b"").unwrap();

        assert!(matches!(
            orchestrator.lock_file(&outside, false),
            Err(SyncError::OutsideProject(_))
        ));
        assert!(matches!(
            orchestrator.lock_file(&tmpdir.join("project").join(LAMP_V1), false),
            Err(SyncError::Io(_, _))
        ));
    }

    #[test]
    fn test_sync_path_keeps_distinct_numbered_files() {
        // Given
        let tmpdir = tmpdir();
        let server = memory_server(&[
            ("Scenes/seq01/shot_010.ma", b"shot 10"),
            ("Scenes/seq01/shot_020.ma", b"shot 20"),
        ]);
        ensure_local(&tmpdir, &[("Scenes/seq01/shot_010.ma", b"shot 10 edited")]);
        let mut orchestrator = orchestrator(context(&server, "jane", &tmpdir));

        // When
        let report = orchestrator
            .sync_path(&[tmpdir.join("Scenes/seq01")])
            .unwrap();

        // Then
        assert_eq!(report.outcome, Outcome::Completed);
        assert_eq!(
            disk_files(&tmpdir),
            vec![
                "Scenes/seq01/shot_010.ma".to_string(),
                "Scenes/seq01/shot_020.ma".to_string()
            ]
        );
        assert_eq!(
            std::fs::read(tmpdir.join("Scenes/seq01/shot_010.ma")).unwrap(),
            b"shot 10".to_vec()
        );
    }

    #[test]
    fn test_sync_published_versions() {
        // Given
        let tmpdir = tmpdir();
        let server = memory_server(&[
            (BOX_V1, b"box 1"),
            ("Props/box/__model_v001__/model/box.ma", b"published 1"),
            ("Props/box/__model_v002__/model/box.ma", b"published 2"),
            ("Props/box/__model_v002__/model/box.abc", b"cache 2"),
            ("Props/box/__rig_v001__/rig/box_rig.ma", b"rig 1"),
        ]);
        ensure_local(
            &tmpdir,
            &[
                (BOX_V1, b"box 1"),
                ("Props/box/__model_v001__/model/box.ma", b"published 1"),
            ],
        );
        let mut orchestrator = orchestrator(context(&server, "jane", &tmpdir));
        let options = SyncOptions {
            sync_type: SyncType::Model,
            status: StatusFilter::Published,
            ..Default::default()
        };

        // When
        let report = orchestrator.sync_category("Props", &options).unwrap();

        // Then
        assert_eq!(report.outcome, Outcome::Completed);
        assert_eq!(report.candidates.len(), 1);
        assert_eq!(report.candidates[0].status, FileStatus::Published);
        assert_eq!(report.candidates[0].category, AssetCategory::Model);
        assert_eq!(report.candidates[0].result(), CompareResult::Outdated);
        assert_eq!(
            disk_files(&tmpdir),
            vec![
                "Props/box/__model_v001__/model/box.ma".to_string(),
                "Props/box/__model_v002__/model/box.abc".to_string(),
                "Props/box/__model_v002__/model/box.ma".to_string(),
                BOX_V1.to_string(),
            ]
        );
    }

    #[test]
    fn test_upload_continues_after_unlock_failure() {
        // Given
        let tmpdir = tmpdir();
        let files = [
            "Props/box/__working__/model/box_model.ma",
            "Props/lamp/__working__/model/lamp_model.ma",
            "Props/chair/__working__/model/chair_model.ma",
        ];
        let server = memory_server(&files.map(|file| (file, b"old".as_slice())));
        ensure_local(&tmpdir, &files.map(|file| (file, b"new".as_slice())));
        let client = FailingUnlock {
            session: session(&server, "jane"),
            failing: RemotePath::new(files[1]),
        };
        let context = SyncContext::new(Arc::new(client), tmpdir.clone())
            .with_poll_interval(Duration::from_millis(5));
        let mut orchestrator = orchestrator(context);
        let paths = files
            .iter()
            .map(|file| tmpdir.join(file))
            .collect::<Vec<PathBuf>>();

        // When
        let report = orchestrator
            .upload_working_version(
                &paths,
                "Fix normals",
                &UploadOptions {
                    skip_saving: true,
                    ..Default::default()
                },
            )
            .unwrap();

        // Then
        assert_eq!(report.outcome, Outcome::Completed);
        assert!(report.failures.is_empty());
        assert_eq!(
            report.uploaded(),
            files
                .iter()
                .map(|file| (RemotePath::new(file), 2))
                .collect::<Vec<(RemotePath, u32)>>()
        );
        for file in files {
            assert_eq!(server.content(file), Some(b"new".to_vec()));
        }
        assert_eq!(server.holder(files[0]), None);
        assert_eq!(server.holder(files[1]), Some(UserId::from("jane")));
        assert_eq!(server.holder(files[2]), None);
    }

    #[test]
    fn test_upload_with_forced_lock() {
        // Given
        let tmpdir = tmpdir();
        let file = "Props/lamp/__working__/model/lamp_model.ma";
        let server = memory_server(&[(file, b"old")]);
        ensure_local(&tmpdir, &[(file, b"new")]);
        session(&server, "john")
            .lock(&RemotePath::new(file))
            .unwrap();
        let mut orchestrator = orchestrator(context(&server, "jane", &tmpdir));

        // When
        let report = orchestrator
            .upload_working_version(
                &[tmpdir.join(file)],
                "Take over",
                &UploadOptions {
                    skip_saving: true,
                    force_lock: true,
                },
            )
            .unwrap();

        // Then
        assert_eq!(report.outcome, Outcome::Completed);
        assert_eq!(report.uploaded(), vec![(RemotePath::new(file), 2)]);
        assert_eq!(server.content(file), Some(b"new".to_vec()));
        assert_eq!(server.holder(file), None);
    }
}
