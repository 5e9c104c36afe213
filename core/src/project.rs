use serde_derive::{Deserialize, Serialize};
use std::{
    fmt::Display,
    path::{Component, Path, PathBuf},
};
use thiserror::Error;

/// Connection parameters of the asset server (local application endpoint)
#[derive(Debug, Clone)]
pub struct Instance {
    pub address: String,
    pub unsecure: bool,
    pub username: String,
    pub password: String,
}

impl Instance {
    pub fn url(&self, suffix: Option<&str>) -> String {
        let suffix = suffix.unwrap_or("");
        let scheme = if self.unsecure { "http" } else { "https" };
        format!("{}://{}/api/{}", scheme, self.address, suffix)
    }
}

/// Project relative, `/` separated path of a remote file or folder
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RemotePath(String);

impl RemotePath {
    pub fn new(value: &str) -> Self {
        let parts = value
            .split(['/', '\\'])
            .filter(|part| !part.is_empty())
            .collect::<Vec<&str>>();
        Self(parts.join("/"))
    }

    pub fn root() -> Self {
        Self(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn join(&self, name: &str) -> Self {
        if self.is_root() {
            Self::new(name)
        } else {
            Self::new(&format!("{}/{}", self.0, name))
        }
    }

    pub fn file_name(&self) -> Option<&str> {
        self.0.rsplit('/').next().filter(|name| !name.is_empty())
    }

    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        match self.0.rsplit_once('/') {
            Some((parent, _)) => Some(Self(parent.to_string())),
            None => Some(Self::root()),
        }
    }

    /// Value sent to the server to address this path
    pub fn cms_uri(&self) -> String {
        format!("/{}", self.0)
    }

    pub fn starts_with(&self, other: &RemotePath) -> bool {
        other.is_root() || self.0 == other.0 || self.0.starts_with(&format!("{}/", other.0))
    }
}

impl Display for RemotePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error)]
#[error("Path {0} is not located in project folder")]
pub struct OutsideProjectError(pub PathBuf);

/// Mapping between the local project mirror and remote paths
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    local_root: PathBuf,
}

impl ProjectPaths {
    pub fn new(local_root: PathBuf) -> Self {
        Self { local_root }
    }

    pub fn local_root(&self) -> &Path {
        &self.local_root
    }

    pub fn local(&self, remote: &RemotePath) -> PathBuf {
        let mut path = self.local_root.clone();
        path.extend(remote.as_str().split('/').filter(|part| !part.is_empty()));
        path
    }

    pub fn remote(&self, local: &Path) -> Result<RemotePath, OutsideProjectError> {
        let relative = local
            .strip_prefix(&self.local_root)
            .map_err(|_| OutsideProjectError(local.to_path_buf()))?;
        let mut parts = vec![];
        for component in relative.components() {
            match component {
                Component::Normal(part) => parts.push(
                    part.to_str()
                        .ok_or_else(|| OutsideProjectError(local.to_path_buf()))?
                        .to_string(),
                ),
                Component::CurDir => {}
                _ => return Err(OutsideProjectError(local.to_path_buf())),
            }
        }
        Ok(RemotePath::new(&parts.join("/")))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rstest::*;

    #[rstest]
    #[case("Assets/Props/", "Assets/Props")]
    #[case("/Assets//Props/box", "Assets/Props/box")]
    #[case("Assets\\Props", "Assets/Props")]
    fn test_remote_path_normalization(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(RemotePath::new(raw).as_str(), expected);
    }

    #[test]
    fn test_remote_path_navigation() {
        let path = RemotePath::new("Props/box/__working__/model/box_model_v001.ma");
        assert_eq!(path.file_name(), Some("box_model_v001.ma"));
        assert_eq!(
            path.parent(),
            Some(RemotePath::new("Props/box/__working__/model"))
        );
        assert_eq!(RemotePath::new("Props").parent(), Some(RemotePath::root()));
        assert!(path.starts_with(&RemotePath::new("Props/box")));
        assert!(!path.starts_with(&RemotePath::new("Props/bo")));
        assert_eq!(path.cms_uri(), "/Props/box/__working__/model/box_model_v001.ma");
    }

    #[test]
    fn test_project_paths_mapping() {
        let paths = ProjectPaths::new(PathBuf::from("/mnt/project"));
        let remote = RemotePath::new("Props/box/__working__/model/box_model_v001.ma");

        let local = paths.local(&remote);

        assert_eq!(
            local,
            PathBuf::from("/mnt/project/Props/box/__working__/model/box_model_v001.ma")
        );
        assert_eq!(paths.remote(&local).unwrap(), remote);
        assert!(paths.remote(Path::new("/tmp/box.ma")).is_err());
    }
}
