use std::{fmt::Display, path::PathBuf};

use chrono::{DateTime, Utc};
use strum_macros::Display as StrumDisplay;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.simple().to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, StrumDisplay)]
pub enum SyncKind {
    FileSync,
    PathSync,
    CategorySync,
    Scan,
    Upload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, StrumDisplay)]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Allowed moves of the job state machine. No state is ever re-entered.
    pub fn can_become(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Running)
                | (JobStatus::Queued, JobStatus::Cancelled)
                | (JobStatus::Running, JobStatus::Completed)
                | (JobStatus::Running, JobStatus::Failed)
                | (JobStatus::Running, JobStatus::Cancelled)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    pub current: usize,
    pub total: usize,
}

impl Progress {
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        ((self.current.min(self.total) * 100) / self.total) as u8
    }
}

/// A batch item which could not be processed. The batch went on without it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncFailure {
    pub target: PathBuf,
    pub error: String,
}

impl SyncFailure {
    pub fn new<E: Display>(target: impl Into<PathBuf>, error: E) -> Self {
        Self {
            target: target.into(),
            error: format!("{:#}", error),
        }
    }
}

impl Display for SyncFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&format!("{}: {}", self.target.display(), self.error))
    }
}

#[derive(Debug, Error)]
#[error("Job {id} can't go from {from} to {to}")]
pub struct JobTransitionError {
    pub id: JobId,
    pub from: JobStatus,
    pub to: JobStatus,
}

#[derive(Debug, Clone)]
pub struct SyncJob {
    id: JobId,
    kind: SyncKind,
    targets: Vec<PathBuf>,
    status: JobStatus,
    progress: Progress,
    failures: Vec<SyncFailure>,
    created: DateTime<Utc>,
    finished: Option<DateTime<Utc>>,
}

impl SyncJob {
    pub fn new(kind: SyncKind, targets: Vec<PathBuf>) -> Self {
        Self {
            id: JobId::new(),
            kind,
            targets,
            status: JobStatus::Queued,
            progress: Progress::default(),
            failures: vec![],
            created: Utc::now(),
            finished: None,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn kind(&self) -> SyncKind {
        self.kind
    }

    pub fn targets(&self) -> &[PathBuf] {
        &self.targets
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn progress(&self) -> Progress {
        self.progress
    }

    pub fn failures(&self) -> &[SyncFailure] {
        &self.failures
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    pub fn finished(&self) -> Option<DateTime<Utc>> {
        self.finished
    }

    pub fn set_status(&mut self, status: JobStatus) -> Result<(), JobTransitionError> {
        if !self.status.can_become(status) {
            return Err(JobTransitionError {
                id: self.id,
                from: self.status,
                to: status,
            });
        }
        self.status = status;
        if status.is_terminal() {
            self.finished = Some(Utc::now());
        }
        Ok(())
    }

    pub fn set_progress(&mut self, progress: Progress) {
        self.progress = progress;
    }

    pub fn push_failure(&mut self, failure: SyncFailure) {
        self.failures.push(failure);
    }
}

impl Display for SyncJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&format!("{}#{}", self.kind, self.id))
    }
}
