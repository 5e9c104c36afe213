use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
    str::FromStr,
};

use itertools::Itertools;
use serde_derive::{Deserialize, Serialize};
use thiserror::Error;
use walkdir::WalkDir;

use crate::{
    client::{ClientError, RemoteNode},
    lock::LockClient,
    project::RemotePath,
    types::{AssetCategory, CompareResult, Side},
    utils::last_digit_run,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("No version found in name '{0}'")]
pub struct VersionParseError(pub String);

/// Version of a file name: the last maximal run of digits found in it
pub fn parse_version(name: &str) -> Option<u32> {
    try_parse_version(name).ok()
}

pub fn try_parse_version(name: &str) -> Result<u32, VersionParseError> {
    let (start, end) = last_digit_run(name).ok_or_else(|| VersionParseError(name.to_string()))?;
    name[start..end]
        .parse::<u32>()
        .map_err(|_| VersionParseError(name.to_string()))
}

/// Identity of a texture across its versions: the name without its version
/// (and without the `v` / `_v` marker written in front of it)
pub fn texture_key(name: &str) -> String {
    let Some((start, end)) = last_digit_run(name) else {
        return name.to_string();
    };
    let mut prefix = &name[..start];
    if prefix.ends_with('v') || prefix.ends_with('V') {
        prefix = &prefix[..prefix.len() - 1];
    }
    if prefix.ends_with('_') || prefix.ends_with('.') || prefix.ends_with('-') {
        prefix = &prefix[..prefix.len() - 1];
    }
    format!("{}{}", prefix, &name[end..])
}

/// Folder of an asset holding one published version of a category:
/// `__model_v003__`
pub fn published_folder_name(category: AssetCategory, version: u32) -> String {
    format!("__{}_v{:03}__", category, version)
}

/// Category and version of a published folder name
pub fn parse_published_folder(name: &str) -> Option<(AssetCategory, u32)> {
    let inner = name.strip_prefix("__")?.strip_suffix("__")?;
    let (category, version) = inner.rsplit_once("_v")?;
    if version.is_empty() || !version.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some((AssetCategory::from_str(category).ok()?, version.parse().ok()?))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedFile {
    pub name: String,
    pub version: u32,
    pub size: i64,
    pub side: Side,
    /// Local absolute path, or project relative remote path
    pub path: PathBuf,
}

/// Latest versions found for one category of an asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSet {
    Single(Option<VersionedFile>),
    Textures(BTreeMap<String, VersionedFile>),
}

impl VersionSet {
    pub fn empty(category: AssetCategory) -> Self {
        if category.multi_file() {
            Self::Textures(BTreeMap::new())
        } else {
            Self::Single(None)
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            VersionSet::Single(file) => file.is_none(),
            VersionSet::Textures(files) => files.is_empty(),
        }
    }

    pub fn files(&self) -> Vec<&VersionedFile> {
        match self {
            VersionSet::Single(file) => file.iter().collect(),
            VersionSet::Textures(files) => files.values().collect(),
        }
    }

    fn from_files(category: AssetCategory, files: Vec<VersionedFile>) -> Self {
        if category.multi_file() {
            let latest = files
                .into_iter()
                .into_group_map_by(|file| texture_key(&file.name))
                .into_iter()
                .filter_map(|(key, versions)| {
                    versions
                        .into_iter()
                        .max_by_key(|file| file.version)
                        .map(|file| (key, file))
                })
                .collect();
            Self::Textures(latest)
        } else {
            Self::Single(files.into_iter().max_by_key(|file| file.version))
        }
    }
}

pub fn compare(local: Option<u32>, server: Option<u32>) -> CompareResult {
    match (local, server) {
        (_, None) => CompareResult::LocalOnly,
        (None, Some(_)) => CompareResult::ServerOnly,
        (Some(local), Some(server)) if local > server => CompareResult::LocalAhead,
        (Some(local), Some(server)) if local < server => CompareResult::Outdated,
        _ => CompareResult::UpToDate,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureMismatch {
    pub name: String,
    pub local: Option<u32>,
    pub server: Option<u32>,
    pub result: CompareResult,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryComparison {
    Single(CompareResult),
    Textures {
        result: CompareResult,
        textures: BTreeMap<String, CompareResult>,
        mismatches: Vec<TextureMismatch>,
    },
}

impl CategoryComparison {
    pub fn result(&self) -> CompareResult {
        match self {
            CategoryComparison::Single(result) => *result,
            CategoryComparison::Textures { result, .. } => *result,
        }
    }
}

/// Compare local and server versions of one category. Return `None` when the
/// category exists on neither side.
pub fn compare_sets(local: &VersionSet, server: &VersionSet) -> Option<CategoryComparison> {
    match (local, server) {
        (VersionSet::Textures(local), VersionSet::Textures(server)) => {
            let names = local
                .keys()
                .chain(server.keys())
                .cloned()
                .collect::<BTreeSet<String>>();
            if names.is_empty() {
                return None;
            }

            let mut textures = BTreeMap::new();
            let mut mismatches = vec![];
            for name in names {
                let local_version = local.get(&name).map(|file| file.version);
                let server_version = server.get(&name).map(|file| file.version);
                let result = compare(local_version, server_version);
                if result != CompareResult::UpToDate {
                    mismatches.push(TextureMismatch {
                        name: name.clone(),
                        local: local_version,
                        server: server_version,
                        result,
                    });
                }
                textures.insert(name, result);
            }
            let result = CompareResult::most_urgent(textures.values().copied())?;

            Some(CategoryComparison::Textures {
                result,
                textures,
                mismatches,
            })
        }
        _ => {
            let local_version = local.files().first().map(|file| file.version);
            let server_version = server.files().first().map(|file| file.version);
            if local_version.is_none() && server_version.is_none() {
                return None;
            }
            Some(CategoryComparison::Single(compare(
                local_version,
                server_version,
            )))
        }
    }
}

/// Compute latest local and server versions of asset categories
pub struct VersionRegistry {
    lock_client: LockClient,
}

impl VersionRegistry {
    pub fn new(lock_client: LockClient) -> Self {
        Self { lock_client }
    }

    pub fn max_local_version(&self, dir: &Path, category: AssetCategory) -> VersionSet {
        let files = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| {
                let name = entry.file_name().to_str()?.to_string();
                if name.starts_with('.') {
                    return None;
                }
                let version = match try_parse_version(&name) {
                    Ok(version) => version,
                    Err(error) => {
                        log::debug!("Ignore local file {}: {}", entry.path().display(), error);
                        return None;
                    }
                };
                let size = entry.metadata().map(|m| m.len() as i64).unwrap_or(0);
                Some(VersionedFile {
                    name,
                    version,
                    size,
                    side: Side::Local,
                    path: entry.path().to_path_buf(),
                })
            })
            .collect::<Vec<VersionedFile>>();

        VersionSet::from_files(category, files)
    }

    pub fn max_server_version(
        &self,
        remote_dir: &RemotePath,
        category: AssetCategory,
    ) -> Result<VersionSet, ClientError> {
        let node = self.lock_client.status(remote_dir)?;
        Ok(Self::server_versions(&node, category))
    }

    /// Latest versions from an already fetched status node. Logically deleted
    /// files (`size <= 0`) are excluded.
    pub fn server_versions(node: &RemoteNode, category: AssetCategory) -> VersionSet {
        if !node.exists {
            return VersionSet::empty(category);
        }

        let files = node
            .live_files()
            .filter_map(|file| {
                let name = file.path.file_name()?.to_string();
                let version = parse_version(&name)?;
                Some(VersionedFile {
                    name,
                    version,
                    size: file.size,
                    side: Side::Server,
                    path: PathBuf::from(file.path.as_str()),
                })
            })
            .sorted_by(|a, b| a.name.cmp(&b.name))
            .collect::<Vec<VersionedFile>>();

        VersionSet::from_files(category, files)
    }

    /// Latest published version of `category` among the local published
    /// folders of an asset. Published versions are whole folders, the set is
    /// always [`VersionSet::Single`].
    pub fn max_local_published_version(
        &self,
        asset_dir: &Path,
        category: AssetCategory,
    ) -> VersionSet {
        let latest = WalkDir::new(asset_dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_dir())
            .filter_map(|entry| {
                let name = entry.file_name().to_str()?.to_string();
                let (found, version) = parse_published_folder(&name)?;
                (found == category).then(|| VersionedFile {
                    name,
                    version,
                    size: 0,
                    side: Side::Local,
                    path: entry.path().to_path_buf(),
                })
            })
            .max_by_key(|folder| folder.version);

        VersionSet::Single(latest)
    }

    pub fn max_server_published_version(
        &self,
        asset: &RemotePath,
        category: AssetCategory,
    ) -> Result<VersionSet, ClientError> {
        let node = self.lock_client.status(asset)?;
        Ok(Self::published_versions(&node, category))
    }

    /// Latest published version of `category` from an already fetched asset
    /// status node
    pub fn published_versions(asset: &RemoteNode, category: AssetCategory) -> VersionSet {
        let latest = asset
            .directories()
            .filter_map(|folder| {
                let name = folder.path.file_name()?.to_string();
                let (found, version) = parse_published_folder(&name)?;
                (found == category).then(|| VersionedFile {
                    name,
                    version,
                    size: folder.size,
                    side: Side::Server,
                    path: PathBuf::from(folder.path.as_str()),
                })
            })
            .max_by_key(|folder| folder.version);

        VersionSet::Single(latest)
    }

    pub fn compare(&self, local: &VersionSet, server: &VersionSet) -> Option<CategoryComparison> {
        compare_sets(local, server)
    }
}
