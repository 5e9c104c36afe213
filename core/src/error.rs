use std::{io, path::PathBuf};

use thiserror::Error;

use crate::{
    client::ClientError,
    lock::LockError,
    project::{OutsideProjectError, RemotePath},
    sync::SyncPoliticError,
    version::VersionParseError,
};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Network error: {0}")]
    Network(ClientError),
    #[error("{path} is already locked by {holder}")]
    AlreadyLockedByOther { path: RemotePath, holder: String },
    #[error("No version found in name '{0}'")]
    VersionParse(String),
    #[error("Synchronization interrupted after {copied} of {total} files: {source}")]
    PartialSync {
        copied: usize,
        total: usize,
        source: Box<SyncError>,
    },
    #[error("Asset server is unavailable")]
    ServerUnavailable,
    #[error("Local file {0} error: {1}")]
    Io(PathBuf, io::Error),
    #[error("Path {0} is not located in project folder")]
    OutsideProject(PathBuf),
    #[error("Sync politic error: {0}")]
    Politic(#[from] SyncPoliticError),
    #[error("Worker is stopped")]
    WorkerStopped,
}

impl SyncError {
    /// Errors which make the rest of a batch pointless
    pub fn is_fatal(&self) -> bool {
        match self {
            SyncError::ServerUnavailable | SyncError::WorkerStopped => true,
            SyncError::Network(error) => error.is_network(),
            SyncError::PartialSync { .. } => true,
            _ => false,
        }
    }

    /// Wrap a fatal error happening after some files were already copied
    pub fn partial(self, copied: usize, total: usize) -> Self {
        if copied == 0 {
            return self;
        }
        Self::PartialSync {
            copied,
            total,
            source: Box::new(self),
        }
    }
}

impl From<ClientError> for SyncError {
    fn from(error: ClientError) -> Self {
        match error {
            ClientError::ServerUnavailable => Self::ServerUnavailable,
            ClientError::Io(path, message) => {
                Self::Io(path, io::Error::new(io::ErrorKind::Other, message))
            }
            error => Self::Network(error),
        }
    }
}

impl From<LockError> for SyncError {
    fn from(error: LockError) -> Self {
        match error {
            LockError::AlreadyLockedByOther { path, holder } => {
                Self::AlreadyLockedByOther { path, holder }
            }
            LockError::NotFound(path) => Self::Network(ClientError::NotFound(path)),
            LockError::Client(error) => error.into(),
        }
    }
}

impl From<OutsideProjectError> for SyncError {
    fn from(error: OutsideProjectError) -> Self {
        Self::OutsideProject(error.0)
    }
}

impl From<VersionParseError> for SyncError {
    fn from(error: VersionParseError) -> Self {
        Self::VersionParse(error.0)
    }
}
