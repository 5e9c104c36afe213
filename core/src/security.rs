use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeyringError {
    #[error("No password stored for '{user}' on '{service}'")]
    Missing { service: String, user: String },
    #[error("Keyring unavailable for '{user}' on '{service}': {message}")]
    Unavailable {
        service: String,
        user: String,
        message: String,
    },
}

/// Passwords of asset server accounts, stored in the system keyring under one
/// service per server address
pub struct Keyring {
    service: String,
}

impl Keyring {
    pub fn new(server_address: &str) -> Self {
        Self {
            service: format!("artsync::{}", server_address),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    fn entry(&self, user: &str) -> keyring::Entry {
        keyring::Entry::new(&self.service, user)
    }

    fn error(&self, user: &str, error: keyring::Error) -> KeyringError {
        match error {
            keyring::Error::NoEntry => KeyringError::Missing {
                service: self.service.clone(),
                user: user.to_string(),
            },
            error => KeyringError::Unavailable {
                service: self.service.clone(),
                user: user.to_string(),
                message: error.to_string(),
            },
        }
    }

    pub fn password(&self, user: &str) -> Result<String, KeyringError> {
        log::debug!("Read password of '{}' from '{}'", user, self.service);
        self.entry(user)
            .get_password()
            .map_err(|error| self.error(user, error))
    }

    pub fn store(&self, user: &str, password: &str) -> Result<(), KeyringError> {
        log::info!("Store password of '{}' into '{}'", user, self.service);
        self.entry(user)
            .set_password(password)
            .map_err(|error| self.error(user, error))
    }
}
