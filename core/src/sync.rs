use std::fmt::Display;

use crossbeam_channel::{unbounded, Receiver, Sender};
use thiserror::Error;

use crate::{
    project::RemotePath,
    types::{AssetCategory, CompareResult, FileStatus},
    version::CategoryComparison,
};

/// One asset category which differs between local disk and server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncCandidate {
    pub asset: RemotePath,
    pub status: FileStatus,
    pub category: AssetCategory,
    pub comparison: CategoryComparison,
}

impl SyncCandidate {
    pub fn result(&self) -> CompareResult {
        self.comparison.result()
    }
}

impl Display for SyncCandidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&format!(
            "{} ({}/{}): {:?}",
            self.asset,
            self.status,
            self.category,
            self.result()
        ))
    }
}

pub trait SyncPolitic: Send + Sync {
    fn deal(&self, candidates: &[SyncCandidate]) -> Result<bool, SyncPoliticError>;
}

#[derive(Debug, Clone, Error)]
pub enum SyncPoliticError {
    #[error("Unable to send candidates")]
    UnableToSendCandidates,
    #[error("Unable to receive confirmation")]
    UnableToReceiveConfirmation,
}

/// A sync politic which accept all candidates without any human intervention
#[derive(Debug, Clone)]
pub struct AcceptAllSyncPolitic;

impl SyncPolitic for AcceptAllSyncPolitic {
    fn deal(&self, _candidates: &[SyncCandidate]) -> Result<bool, SyncPoliticError> {
        Ok(true)
    }
}

/// Hand candidates to a user interface and wait for its decision
#[derive(Debug, Clone)]
pub struct ConfirmationSyncPolitic {
    sync_channels: SyncChannels,
}

impl ConfirmationSyncPolitic {
    pub fn new(sync_channels: SyncChannels) -> Self {
        Self { sync_channels }
    }
}

impl SyncPolitic for ConfirmationSyncPolitic {
    fn deal(&self, candidates: &[SyncCandidate]) -> Result<bool, SyncPoliticError> {
        self.sync_channels
            .candidates_sender
            .send(candidates.to_vec())
            // Error means channel is closed
            .map_err(|_| SyncPoliticError::UnableToSendCandidates)?;

        self.sync_channels
            .confirm_sync_receiver
            .recv()
            .map_err(|_| SyncPoliticError::UnableToReceiveConfirmation)
    }
}

#[derive(Debug, Clone)]
pub struct SyncChannels {
    candidates_sender: Sender<Vec<SyncCandidate>>,
    candidates_receiver: Receiver<Vec<SyncCandidate>>,
    confirm_sync_sender: Sender<bool>,
    confirm_sync_receiver: Receiver<bool>,
}

impl SyncChannels {
    pub fn new() -> Self {
        let (candidates_sender, candidates_receiver) = unbounded();
        let (confirm_sync_sender, confirm_sync_receiver) = unbounded();
        Self {
            candidates_sender,
            candidates_receiver,
            confirm_sync_sender,
            confirm_sync_receiver,
        }
    }

    pub fn candidates_receiver(&self) -> &Receiver<Vec<SyncCandidate>> {
        &self.candidates_receiver
    }

    pub fn confirm_sync_sender(&self) -> &Sender<bool> {
        &self.confirm_sync_sender
    }
}

impl Default for SyncChannels {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn candidate() -> SyncCandidate {
        SyncCandidate {
            asset: RemotePath::new("Props/box"),
            status: FileStatus::Working,
            category: AssetCategory::Model,
            comparison: CategoryComparison::Single(CompareResult::Outdated),
        }
    }

    #[test]
    fn test_confirmation_politic_waits_for_decision() {
        // Given
        let channels = SyncChannels::new();
        let politic = ConfirmationSyncPolitic::new(channels.clone());
        let ui = std::thread::spawn(move || {
            let candidates = channels.candidates_receiver().recv().unwrap();
            channels.confirm_sync_sender().send(false).unwrap();
            candidates
        });

        // When
        let decision = politic.deal(&[candidate()]).unwrap();

        // Then
        assert!(!decision);
        assert_eq!(ui.join().unwrap(), vec![candidate()]);
    }

    #[test]
    fn test_candidate_display() {
        assert_eq!(
            candidate().to_string(),
            "Props/box (working/model): Outdated"
        );
    }
}
