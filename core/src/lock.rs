use std::sync::Arc;

use thiserror::Error;

use crate::{
    client::{ArtellaClient, ClientError, RemoteNode},
    project::RemotePath,
    user::UserId,
};

#[derive(Debug, Clone, Error)]
pub enum LockError {
    #[error("{path} is already locked by {holder}")]
    AlreadyLockedByOther { path: RemotePath, holder: String },
    #[error("{0} does not exist on server")]
    NotFound(RemotePath),
    #[error("Client error: {0}")]
    Client(#[from] ClientError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockState {
    pub path: RemotePath,
    pub is_locked: bool,
    pub locked_by: Option<UserId>,
    pub current_user_can_lock: bool,
}

/// Result of a best-effort unlock. Failures are reported, never raised.
#[derive(Debug, Clone)]
pub enum UnlockOutcome {
    Unlocked,
    NotLocked,
    Failed(LockError),
}

impl UnlockOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, UnlockOutcome::Failed(_))
    }
}

/// Lock protocol over the asset server. Every decision re-queries the server
/// status: lock ownership is never cached on client side.
#[derive(Clone)]
pub struct LockClient {
    client: Arc<dyn ArtellaClient>,
}

impl LockClient {
    pub fn new(client: Arc<dyn ArtellaClient>) -> Self {
        Self { client }
    }

    pub fn user(&self) -> UserId {
        self.client.user()
    }

    pub fn client(&self) -> &Arc<dyn ArtellaClient> {
        &self.client
    }

    pub fn status(&self, path: &RemotePath) -> Result<RemoteNode, ClientError> {
        self.client.status(path)
    }

    fn state_from_node(&self, node: &RemoteNode) -> LockState {
        let user = self.client.user();
        let locked_by = if node.locked {
            node.locked_by.clone()
        } else {
            None
        };
        LockState {
            path: node.path.clone(),
            is_locked: node.locked,
            current_user_can_lock: match &locked_by {
                Some(holder) => holder == &user,
                None => true,
            },
            locked_by,
        }
    }

    pub fn lock_state(&self, path: &RemotePath) -> Result<LockState, LockError> {
        let node = self.client.status(path)?;
        if !node.exists {
            return Err(LockError::NotFound(path.clone()));
        }
        Ok(self.state_from_node(&node))
    }

    /// Take the lock on `path` for the current user.
    ///
    /// When another user holds the lock, `force = false` fails with
    /// [`LockError::AlreadyLockedByOther`] and leaves the holder untouched.
    ///
    /// **`force = true` silently takes the lock over from the other user.**
    /// The other user is not notified; only a warning is logged. Tools relying
    /// on this must be aware their lock may be stolen the same way.
    pub fn lock(&self, path: &RemotePath, force: bool) -> Result<LockState, LockError> {
        let state = self.lock_state(path)?;
        let user = self.client.user();

        if state.is_locked && state.current_user_can_lock {
            log::debug!("{} already locked by current user {}", path, user);
            return Ok(state);
        }

        if !state.current_user_can_lock {
            let holder = state
                .locked_by
                .as_ref()
                .map(|holder| holder.to_string())
                .unwrap_or_else(|| "unknown user".to_string());
            if !force {
                log::info!("Unable to lock {}: locked by {}", path, holder);
                return Err(LockError::AlreadyLockedByOther {
                    path: path.clone(),
                    holder,
                });
            }
            log::warn!(
                "Force lock of {} by {}: override lock held by {}",
                path,
                user,
                holder
            );
        }

        self.client.lock(path)?;
        log::info!("{} locked by {}", path, user);
        self.lock_state(path)
    }

    /// Release the lock on `path`. Best-effort: any failure is logged and
    /// returned as [`UnlockOutcome::Failed`].
    pub fn unlock(&self, path: &RemotePath, warn_on_failure: bool) -> UnlockOutcome {
        let outcome = match self.lock_state(path) {
            Ok(state) if !state.is_locked => UnlockOutcome::NotLocked,
            Ok(_) => match self.client.unlock(path) {
                Ok(()) => UnlockOutcome::Unlocked,
                Err(error) => UnlockOutcome::Failed(error.into()),
            },
            Err(error) => UnlockOutcome::Failed(error),
        };

        if let UnlockOutcome::Failed(error) = &outcome {
            if warn_on_failure {
                log::warn!("Unable to unlock {}: {}", path, error);
            } else {
                log::debug!("Unable to unlock {}: {}", path, error);
            }
        }

        outcome
    }
}
