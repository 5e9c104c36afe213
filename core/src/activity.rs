use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use crate::job::{JobId, Progress, SyncKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Working,
}

#[derive(Debug, Clone)]
pub enum Activity {
    Begin(JobId, SyncKind),
    Progress(JobId, Progress),
    End(JobId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunningJob {
    pub kind: SyncKind,
    pub progress: Progress,
}

/// Jobs currently running on any worker of the process
#[derive(Debug, Default)]
pub struct ActivityState {
    jobs: HashMap<JobId, RunningJob>,
}

impl ActivityState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn activity(&self) -> State {
        if self.jobs.is_empty() {
            State::Idle
        } else {
            State::Working
        }
    }

    pub fn apply(&mut self, message: Activity) {
        match message {
            Activity::Begin(job_id, kind) => {
                self.jobs.insert(
                    job_id,
                    RunningJob {
                        kind,
                        progress: Progress::default(),
                    },
                );
            }
            Activity::Progress(job_id, progress) => {
                if let Some(job) = self.jobs.get_mut(&job_id) {
                    job.progress = progress;
                }
            }
            Activity::End(job_id) => {
                self.jobs.remove(&job_id);
            }
        }
    }

    pub fn jobs(&self) -> &HashMap<JobId, RunningJob> {
        &self.jobs
    }
}

pub struct ActivityMonitor {
    receiver: Receiver<Activity>,
    state: Arc<Mutex<ActivityState>>,
    stop_signal: Arc<AtomicBool>,
}

impl ActivityMonitor {
    pub fn new(
        receiver: Receiver<Activity>,
        state: Arc<Mutex<ActivityState>>,
        stop_signal: Arc<AtomicBool>,
    ) -> Self {
        Self {
            receiver,
            state,
            stop_signal,
        }
    }

    pub fn run(&self) {
        loop {
            match self.receiver.recv_timeout(Duration::from_millis(250)) {
                Ok(message) => {
                    log::trace!("Receive activity {:?}", message);
                    self.state
                        .lock()
                        .unwrap_or_else(|error| error.into_inner())
                        .apply(message);
                }
                Err(RecvTimeoutError::Timeout) => {
                    if self.stop_signal.load(Ordering::Relaxed) {
                        log::debug!("Finished ActivityMonitor (on stop signal)");
                        break;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    log::debug!("Finished ActivityMonitor (on channel closed)");
                    break;
                }
            }
        }
    }

    pub fn start(self) {
        std::thread::spawn(move || {
            self.run();
        });
    }
}
