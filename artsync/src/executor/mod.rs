use artsync_core::{
    activity::Activity,
    error::SyncError,
    job::{Progress, SyncFailure, SyncJob},
};
use crossbeam_channel::Sender;

use crate::{
    context::SyncContext,
    task::TaskOutput,
    worker::{CancelToken, JobEvent},
};

pub mod scan;
pub mod transfer;
pub mod upload;

pub trait Executor: Send {
    fn execute(&self, context: &SyncContext, run: &mut JobRun) -> Result<TaskOutput, SyncError>;
}

/// Running job as seen by its executor: progress and failures reporting,
/// cancellation checks
pub struct JobRun<'a> {
    context: &'a SyncContext,
    job: &'a mut SyncJob,
    events: &'a Sender<JobEvent>,
    cancel: &'a CancelToken,
    interrupted: bool,
}

impl<'a> JobRun<'a> {
    pub fn new(
        context: &'a SyncContext,
        job: &'a mut SyncJob,
        events: &'a Sender<JobEvent>,
        cancel: &'a CancelToken,
    ) -> Self {
        Self {
            context,
            job,
            events,
            cancel,
            interrupted: false,
        }
    }

    pub fn job(&self) -> &SyncJob {
        self.job
    }

    /// Must be called between two files. Once it returned true, the executor
    /// stops and returns what it did so far.
    pub fn cancelled(&mut self) -> bool {
        if self.cancel.is_cancelled() {
            self.interrupted = true;
        }
        self.interrupted
    }

    pub fn interrupted(&self) -> bool {
        self.interrupted
    }

    pub fn progress(&mut self, current: usize, total: usize) {
        let progress = Progress { current, total };
        self.job.set_progress(progress);
        self.context.notify(Activity::Progress(self.job.id(), progress));
        self.send_snapshot();
    }

    pub fn failure(&mut self, failure: SyncFailure) {
        log::warn!("[{}] {}", self.job, failure);
        self.job.push_failure(failure);
        self.send_snapshot();
    }

    pub fn send_snapshot(&self) {
        // Error means the handle was dropped, nobody is listening anymore
        let _ = self.events.send(JobEvent::Snapshot(self.job.clone()));
    }
}
