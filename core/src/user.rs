use std::fmt::Display;

use serde_derive::{Deserialize, Serialize};

/// Identity of an asset server user, as the server reports it in `locked_by`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    /// User of the current OS session, used when config does not name one
    pub fn from_os() -> Self {
        Self(whoami::username())
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}
