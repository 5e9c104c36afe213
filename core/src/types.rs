use std::fmt::Display;

use serde_derive::{Deserialize, Serialize};
use strum_macros::{Display as StrumDisplay, EnumString};

/// File-type classification of the files of an asset
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    StrumDisplay,
    EnumString,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum AssetCategory {
    Model,
    Shading,
    Textures,
    Groom,
    Rig,
}

impl AssetCategory {
    /// Textures are the only category where several files coexist, each one
    /// independently versioned
    pub fn multi_file(&self) -> bool {
        matches!(self, AssetCategory::Textures)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, StrumDisplay)]
#[strum(serialize_all = "lowercase")]
pub enum FileStatus {
    Working,
    Published,
}

/// Folder of an asset holding its working files, one sub folder per category.
/// Published versions live in their own folders, see
/// [`crate::version::published_folder_name`].
pub const WORKING_FOLDER: &str = "__working__";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Local,
    Server,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, StrumDisplay)]
pub enum CompareResult {
    UpToDate,
    LocalAhead,
    Outdated,
    ServerOnly,
    LocalOnly,
}

impl CompareResult {
    /// Results which require a download to bring local side up to date
    pub fn needs_download(&self) -> bool {
        matches!(self, CompareResult::Outdated | CompareResult::ServerOnly)
    }

    // Higher means more urgent when several results are folded into one
    fn weight(&self) -> u8 {
        match self {
            CompareResult::Outdated => 4,
            CompareResult::ServerOnly => 3,
            CompareResult::LocalAhead => 2,
            CompareResult::LocalOnly => 1,
            CompareResult::UpToDate => 0,
        }
    }

    pub fn most_urgent<I: IntoIterator<Item = CompareResult>>(results: I) -> Option<Self> {
        results.into_iter().max_by_key(|result| result.weight())
    }
}

/// Which categories of an asset a synchronization covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, StrumDisplay, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SyncType {
    #[default]
    All,
    Model,
    Shading,
    Textures,
}

impl SyncType {
    pub fn categories(&self) -> Vec<AssetCategory> {
        match self {
            SyncType::All => vec![
                AssetCategory::Model,
                AssetCategory::Shading,
                AssetCategory::Textures,
                AssetCategory::Groom,
                AssetCategory::Rig,
            ],
            SyncType::Model => vec![AssetCategory::Model],
            SyncType::Shading => vec![AssetCategory::Shading],
            SyncType::Textures => vec![AssetCategory::Textures],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Working,
    Published,
}

impl StatusFilter {
    pub fn statuses(&self) -> Vec<FileStatus> {
        match self {
            StatusFilter::All => vec![FileStatus::Working, FileStatus::Published],
            StatusFilter::Working => vec![FileStatus::Working],
            StatusFilter::Published => vec![FileStatus::Published],
        }
    }
}

impl Display for StatusFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatusFilter::All => f.write_str("all"),
            StatusFilter::Working => f.write_str("working"),
            StatusFilter::Published => f.write_str("published"),
        }
    }
}

#[cfg(test)]
mod test {
    use std::str::FromStr;

    use super::*;
    use rstest::*;

    #[rstest]
    #[case("model", AssetCategory::Model)]
    #[case("Textures", AssetCategory::Textures)]
    #[case("groom", AssetCategory::Groom)]
    fn test_category_from_str(#[case] raw: &str, #[case] expected: AssetCategory) {
        assert_eq!(AssetCategory::from_str(raw).unwrap(), expected);
    }

    #[test]
    fn test_category_display() {
        assert_eq!(AssetCategory::Shading.to_string(), "shading");
    }

    #[rstest]
    #[case(vec![], None)]
    #[case(vec![CompareResult::UpToDate, CompareResult::LocalAhead], Some(CompareResult::LocalAhead))]
    #[case(vec![CompareResult::ServerOnly, CompareResult::Outdated], Some(CompareResult::Outdated))]
    #[case(vec![CompareResult::LocalOnly, CompareResult::ServerOnly], Some(CompareResult::ServerOnly))]
    fn test_most_urgent(#[case] results: Vec<CompareResult>, #[case] expected: Option<CompareResult>) {
        assert_eq!(CompareResult::most_urgent(results), expected);
    }
}
