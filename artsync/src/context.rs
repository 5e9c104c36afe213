use std::{
    fmt,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use anyhow::{Context as AnyhowContext, Result};
use artsync_core::{
    activity::{Activity, ActivityMonitor, ActivityState, State},
    client::{Artella, ArtellaClient},
    config::{Config, DEFAULT_CATEGORIES, DEFAULT_POLL_INTERVAL, DEFAULT_SEQUENCES},
    lock::LockClient,
    project::ProjectPaths,
    sync::{AcceptAllSyncPolitic, SyncPolitic},
    version::VersionRegistry,
};
use crossbeam_channel::{unbounded, Sender};
use mockall::automock;

/// Host application hook used to save the opened scene before its upload
#[automock]
pub trait SceneSaver: Send + Sync {
    fn save(&self, path: &Path) -> anyhow::Result<()>;
}

/// Saver for embedders without any opened scene
#[derive(Debug, Clone)]
pub struct NoSceneSaver;

impl SceneSaver for NoSceneSaver {
    fn save(&self, _path: &Path) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Everything a synchronization needs, shared between the foreground and
/// the workers
pub struct SyncContext {
    lock_client: LockClient,
    registry: VersionRegistry,
    paths: ProjectPaths,
    politic: Box<dyn SyncPolitic>,
    saver: Box<dyn SceneSaver>,
    poll_interval: Duration,
    categories: Vec<String>,
    sequences: String,
    activity_sender: Sender<Activity>,
    activity: Arc<Mutex<ActivityState>>,
    activity_stop_signal: Arc<AtomicBool>,
}

impl SyncContext {
    pub fn new(client: Arc<dyn ArtellaClient>, local_root: PathBuf) -> Self {
        let lock_client = LockClient::new(client);
        let registry = VersionRegistry::new(lock_client.clone());

        let (activity_sender, activity_receiver) = unbounded();
        let activity = Arc::new(Mutex::new(ActivityState::new()));
        let activity_stop_signal = Arc::new(AtomicBool::new(false));
        ActivityMonitor::new(
            activity_receiver,
            activity.clone(),
            activity_stop_signal.clone(),
        )
        .start();

        Self {
            lock_client,
            registry,
            paths: ProjectPaths::new(local_root),
            politic: Box::new(AcceptAllSyncPolitic),
            saver: Box::new(NoSceneSaver),
            poll_interval: DEFAULT_POLL_INTERVAL,
            categories: DEFAULT_CATEGORIES
                .split(',')
                .map(|category| category.to_string())
                .collect(),
            sequences: DEFAULT_SEQUENCES.to_string(),
            activity_sender,
            activity,
            activity_stop_signal,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let client = Artella::new(&config.instance, config.timeout).context(format!(
            "Build asset server client for {}",
            config.instance.address
        ))?;
        Ok(Self::new(Arc::new(client), config.local_root.clone())
            .with_poll_interval(config.poll_interval)
            .with_categories(config.categories.clone())
            .with_sequences(config.sequences.clone()))
    }

    pub fn with_politic(mut self, politic: Box<dyn SyncPolitic>) -> Self {
        self.politic = politic;
        self
    }

    pub fn with_saver(mut self, saver: Box<dyn SceneSaver>) -> Self {
        self.saver = saver;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_categories(mut self, categories: Vec<String>) -> Self {
        self.categories = categories;
        self
    }

    pub fn with_sequences(mut self, sequences: String) -> Self {
        self.sequences = sequences;
        self
    }

    pub fn client(&self) -> &Arc<dyn ArtellaClient> {
        self.lock_client.client()
    }

    pub fn lock_client(&self) -> &LockClient {
        &self.lock_client
    }

    pub fn registry(&self) -> &VersionRegistry {
        &self.registry
    }

    pub fn paths(&self) -> &ProjectPaths {
        &self.paths
    }

    pub fn politic(&self) -> &dyn SyncPolitic {
        self.politic.as_ref()
    }

    pub fn saver(&self) -> &dyn SceneSaver {
        self.saver.as_ref()
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn sequences(&self) -> &str {
        &self.sequences
    }

    pub fn notify(&self, activity: Activity) {
        if self.activity_sender.send(activity).is_err() {
            log::debug!("Activity monitor is gone, activity message ignored");
        }
    }

    pub fn activity(&self) -> State {
        self.activity
            .lock()
            .unwrap_or_else(|error| error.into_inner())
            .activity()
    }
}

impl Drop for SyncContext {
    fn drop(&mut self) {
        self.activity_stop_signal.store(true, Ordering::Relaxed);
    }
}

impl fmt::Debug for SyncContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncContext")
            .field("user", &self.lock_client.user())
            .field("local_root", &self.paths.local_root())
            .field("poll_interval", &self.poll_interval)
            .field("categories", &self.categories)
            .field("sequences", &self.sequences)
            .finish()
    }
}
