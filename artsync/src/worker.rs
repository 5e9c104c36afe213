use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::JoinHandle,
    time::Duration,
};

use artsync_core::{
    activity::Activity,
    error::SyncError,
    job::{JobId, JobStatus, SyncJob},
};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};

use crate::{
    context::SyncContext,
    executor::JobRun,
    task::{SyncTask, TaskOutput},
};

/// Cooperative cancellation flag, checked by executors between two files
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed)
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::Relaxed)
    }
}

#[derive(Debug)]
pub enum JobEvent {
    Snapshot(SyncJob),
    Finished(JobOutcome),
}

#[derive(Debug)]
pub struct JobOutcome {
    pub job: SyncJob,
    pub output: TaskOutput,
    pub error: Option<SyncError>,
}

impl JobOutcome {
    pub fn status(&self) -> JobStatus {
        self.job.status()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitControl {
    Continue,
    Cancel,
}

/// Called by [`JobHandle::wait`] while waiting, typically to keep a user
/// interface responsive and to let its user cancel
pub trait EventPump {
    fn pump(&mut self, job: &SyncJob) -> WaitControl;
}

impl<F> EventPump for F
where
    F: FnMut(&SyncJob) -> WaitControl,
{
    fn pump(&mut self, job: &SyncJob) -> WaitControl {
        self(job)
    }
}

#[derive(Debug, Clone)]
pub struct NoPump;

impl EventPump for NoPump {
    fn pump(&mut self, _job: &SyncJob) -> WaitControl {
        WaitControl::Continue
    }
}

/// Caller side of a queued job
pub struct JobHandle {
    job: SyncJob,
    receiver: Receiver<JobEvent>,
    cancel: CancelToken,
    poll_interval: Duration,
    outcome: Option<JobOutcome>,
}

impl JobHandle {
    pub fn id(&self) -> JobId {
        self.job.id()
    }

    /// Latest known state of the job
    pub fn job(&self) -> &SyncJob {
        &self.job
    }

    pub fn cancel(&self) {
        self.cancel.cancel()
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    /// Apply received events without blocking
    pub fn poll(&mut self) -> &SyncJob {
        while self.outcome.is_none() {
            match self.receiver.try_recv() {
                Ok(event) => self.apply(event),
                Err(_) => break,
            }
        }
        &self.job
    }

    /// Wait for the job end. `pump` is called between two receive timeouts
    /// and can cancel the job.
    pub fn wait(mut self, pump: &mut dyn EventPump) -> JobOutcome {
        loop {
            if let Some(outcome) = self.outcome.take() {
                return outcome;
            }

            match self.receiver.recv_timeout(self.poll_interval) {
                Ok(event) => self.apply(event),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return self.abandoned(),
            }

            if self.outcome.is_none()
                && !self.cancel.is_cancelled()
                && pump.pump(&self.job) == WaitControl::Cancel
            {
                log::info!("[{}] Cancellation requested", self.job);
                self.cancel.cancel();
            }
        }
    }

    fn apply(&mut self, event: JobEvent) {
        match event {
            JobEvent::Snapshot(job) => self.job = job,
            JobEvent::Finished(outcome) => {
                self.job = outcome.job.clone();
                self.outcome = Some(outcome);
            }
        }
    }

    // Worker went away without finishing the job
    fn abandoned(self) -> JobOutcome {
        let mut job = self.job;
        let status = if job.status() == JobStatus::Queued {
            JobStatus::Cancelled
        } else {
            JobStatus::Failed
        };
        if let Err(error) = job.set_status(status) {
            log::error!("{}", error);
        }
        JobOutcome {
            job,
            output: TaskOutput::Nothing,
            error: Some(SyncError::WorkerStopped),
        }
    }
}

struct QueuedJob {
    job: SyncJob,
    task: SyncTask,
    cancel: CancelToken,
    events: Sender<JobEvent>,
}

impl QueuedJob {
    fn cancel_before_start(self) {
        let QueuedJob {
            mut job, events, ..
        } = self;
        if let Err(error) = job.set_status(JobStatus::Cancelled) {
            log::error!("{}", error);
        }
        log::info!("{} cancelled before start", job);
        let _ = events.send(JobEvent::Finished(JobOutcome {
            job,
            output: TaskOutput::Nothing,
            error: None,
        }));
    }
}

/// Background thread executing queued tasks one at a time, in queue order.
///
/// Two workers never coordinate: jobs of distinct workers may run at the same
/// time on the same files.
pub struct Worker {
    name: String,
    poll_interval: Duration,
    sender: Option<Sender<QueuedJob>>,
    receiver: Receiver<QueuedJob>,
    stop_signal: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    pub fn new(name: &str, context: Arc<SyncContext>) -> Self {
        let (sender, receiver) = unbounded();
        let stop_signal = Arc::new(AtomicBool::new(false));
        let poll_interval = context.poll_interval();
        let runner = WorkerRunner {
            name: name.to_string(),
            context,
            receiver: receiver.clone(),
            stop_signal: stop_signal.clone(),
        };
        let thread = std::thread::spawn(move || runner.run());

        Self {
            name: name.to_string(),
            poll_interval,
            sender: Some(sender),
            receiver,
            stop_signal,
            thread: Some(thread),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn enqueue(&self, task: SyncTask) -> Result<JobHandle, SyncError> {
        self.enqueue_with(task, CancelToken::new())
    }

    /// Queue `task` with a cancel token shared with other jobs
    pub fn enqueue_with(&self, task: SyncTask, cancel: CancelToken) -> Result<JobHandle, SyncError> {
        let sender = self.sender.as_ref().ok_or(SyncError::WorkerStopped)?;
        let job = SyncJob::new(task.kind(), task.targets());
        let (events, receiver) = unbounded();
        let handle = JobHandle {
            job: job.clone(),
            receiver,
            cancel: cancel.clone(),
            poll_interval: self.poll_interval,
            outcome: None,
        };

        log::debug!("[{}] Queue {}", self.name, job);
        sender
            .send(QueuedJob {
                job,
                task,
                cancel,
                events,
            })
            .map_err(|_| SyncError::WorkerStopped)?;

        Ok(handle)
    }

    /// Cancel every queued job which is not started yet, return their count
    pub fn clear(&self) -> usize {
        let mut count = 0;
        while let Ok(queued) = self.receiver.try_recv() {
            queued.cancel_before_start();
            count += 1;
        }
        if count > 0 {
            log::info!("[{}] {} queued jobs cancelled", self.name, count);
        }
        count
    }

    /// Stop accepting work and cancel queued jobs. The running job, if any,
    /// finishes unless its own token is cancelled.
    pub fn stop(&mut self, wait_for_completion: bool) {
        self.sender = None;
        self.stop_signal.store(true, Ordering::Relaxed);
        self.clear();

        if wait_for_completion {
            if let Some(thread) = self.thread.take() {
                if thread.join().is_err() {
                    log::error!("[{}] Worker thread panicked", self.name);
                }
            }
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop(false);
    }
}

struct WorkerRunner {
    name: String,
    context: Arc<SyncContext>,
    receiver: Receiver<QueuedJob>,
    stop_signal: Arc<AtomicBool>,
}

impl WorkerRunner {
    fn run(&self) {
        log::debug!("[{}] Worker started", self.name);
        loop {
            match self.receiver.recv_timeout(Duration::from_millis(250)) {
                Ok(queued) => {
                    if self.stop_signal.load(Ordering::Relaxed) {
                        queued.cancel_before_start();
                        continue;
                    }
                    self.process(queued);
                }
                Err(RecvTimeoutError::Timeout) => {
                    if self.stop_signal.load(Ordering::Relaxed) {
                        log::debug!("[{}] Worker finished (on stop signal)", self.name);
                        break;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    log::debug!("[{}] Worker finished (on channel closed)", self.name);
                    break;
                }
            }
        }
    }

    fn process(&self, queued: QueuedJob) {
        if queued.cancel.is_cancelled() {
            queued.cancel_before_start();
            return;
        }

        let QueuedJob {
            mut job,
            task,
            cancel,
            events,
        } = queued;
        if let Err(error) = job.set_status(JobStatus::Running) {
            log::error!("[{}] {}", self.name, error);
            return;
        }
        log::info!("[{}::{}] Start", self.name, job);
        self.context.notify(Activity::Begin(job.id(), job.kind()));
        let _ = events.send(JobEvent::Snapshot(job.clone()));

        let executor = task.executor();
        let (result, interrupted) = {
            let mut run = JobRun::new(&self.context, &mut job, &events, &cancel);
            let result = executor.execute(&self.context, &mut run);
            (result, run.interrupted())
        };

        let (status, output, error) = match result {
            Ok(output) if interrupted => (JobStatus::Cancelled, output, None),
            Ok(output) => (JobStatus::Completed, output, None),
            Err(error) => {
                log::error!("[{}::{}] {}", self.name, job, error);
                (JobStatus::Failed, TaskOutput::Nothing, Some(error))
            }
        };
        if let Err(error) = job.set_status(status) {
            log::error!("[{}] {}", self.name, error);
        }
        log::info!(
            "[{}::{}] {} ({} failures, {})",
            self.name,
            job,
            status,
            job.failures().len(),
            job.finished()
                .map(|finished| format!(
                    "{} ms",
                    (finished - job.created()).num_milliseconds()
                ))
                .unwrap_or_default()
        );

        self.context.notify(Activity::End(job.id()));
        // Error means the handle was dropped, nobody is waiting for the result
        let _ = events.send(JobEvent::Finished(JobOutcome { job, output, error }));
    }
}
