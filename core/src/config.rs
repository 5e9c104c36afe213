use std::{path::PathBuf, time::Duration};

use anyhow::{bail, Context, Result};

use ini::Ini;

use crate::{project::Instance, security::Keyring, utils::strbool};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);
pub const DEFAULT_CATEGORIES: &str = "Characters,Props,BackgroundElements";
pub const DEFAULT_SEQUENCES: &str = "Scenes";

#[derive(Debug, Clone)]
pub struct Config {
    pub instance: Instance,
    /// Optional network timeout, transport default when absent
    pub timeout: Option<Duration>,
    pub local_root: PathBuf,
    /// Asset groups walked by a full synchronization, in order
    pub categories: Vec<String>,
    /// Remote folder containing one folder per sequence
    pub sequences: String,
    pub poll_interval: Duration,
    pub allow_raw_passwords: bool,
}

impl Config {
    pub fn config_file_path() -> Result<PathBuf> {
        let user_home_folder_path = dirs::home_dir().context("Unable to determine home folder")?;
        Ok(if cfg!(target_os = "windows") {
            user_home_folder_path
                .join("AppData")
                .join("Local")
                .join("artsync.conf")
        } else {
            user_home_folder_path.join(".artsync.conf")
        })
    }

    pub fn from_env(allow_raw_passwords: bool) -> Result<Self> {
        let config_file_path = Self::config_file_path()?;
        let config_ini = Ini::load_from_file(&config_file_path).context(format!(
            "Error when loading config file at '{}'",
            config_file_path.display()
        ))?;
        Self::from_ini(config_ini, allow_raw_passwords)
    }

    pub fn from_ini(config_ini: Ini, allow_raw_passwords: bool) -> Result<Self> {
        let server = config_ini
            .section(Some("server"))
            .context("Missing \"server\" section in config")?;
        let address = server
            .get("address")
            .context("Unable to read address config from server section")?
            .to_string();
        let unsecure = strbool(server.get("unsecure").unwrap_or("0"));
        let username = server
            .get("username")
            .map(|value| value.to_string())
            .unwrap_or_else(whoami::username);
        let timeout = match server.get("timeout") {
            Some(raw) => Some(Duration::from_secs(
                raw.parse::<u64>()
                    .context("Unable to read timeout config from server section")?,
            )),
            None => None,
        };

        let password = match Keyring::new(&address).password(&username) {
            Ok(password) => password,
            Err(error) if !allow_raw_passwords => {
                bail!("{} (raw passwords are not allowed)", error)
            }
            Err(error) => server
                .get("password")
                .context(format!(
                    "No password in config for server '{}' and user '{}' ({})",
                    &address, &username, error
                ))?
                .to_string(),
        };

        let project = config_ini
            .section(Some("project"))
            .context("Missing \"project\" section in config")?;
        let local_root = PathBuf::from(
            project
                .get("local_root")
                .context("Unable to read local_root config from project section")?,
        );
        let categories = project
            .get("categories")
            .unwrap_or(DEFAULT_CATEGORIES)
            .split(',')
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
            .map(|value| value.to_string())
            .collect();
        let sequences = project
            .get("sequences")
            .unwrap_or(DEFAULT_SEQUENCES)
            .to_string();

        let poll_interval = match config_ini.get_from(Some("sync"), "poll_interval_ms") {
            Some(raw) => Duration::from_millis(
                raw.parse::<u64>()
                    .context("Unable to read poll_interval_ms config from sync section")?,
            ),
            None => DEFAULT_POLL_INTERVAL,
        };

        Ok(Self {
            instance: Instance {
                address,
                unsecure,
                username,
                password,
            },
            timeout,
            local_root,
            categories,
            sequences,
            poll_interval,
            allow_raw_passwords,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    const RAW: &str = "
[server]
address = localhost:8800
unsecure = 1
username = jane
password = secret
timeout = 120

[project]
local_root = /mnt/project
categories = Characters, Props

[sync]
poll_interval_ms = 20
";

    #[test]
    fn test_from_ini() {
        let config = Config::from_ini(Ini::load_from_str(RAW).unwrap(), true).unwrap();

        assert_eq!(config.instance.address, "localhost:8800");
        assert!(config.instance.unsecure);
        assert_eq!(config.instance.username, "jane");
        assert_eq!(config.timeout, Some(Duration::from_secs(120)));
        assert_eq!(config.local_root, PathBuf::from("/mnt/project"));
        assert_eq!(
            config.categories,
            vec!["Characters".to_string(), "Props".to_string()]
        );
        assert_eq!(config.sequences, DEFAULT_SEQUENCES);
        assert_eq!(config.poll_interval, Duration::from_millis(20));
        assert_eq!(config.instance.url(Some("do/status")), "http://localhost:8800/api/do/status");
    }

    #[test]
    fn test_from_ini_missing_project() {
        let raw = "[server]\naddress = localhost\npassword = secret\n";

        let result = Config::from_ini(Ini::load_from_str(raw).unwrap(), true);

        assert!(result.is_err());
    }
}
