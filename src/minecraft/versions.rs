use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Version descriptor of an instance, or one patch folded into it.
///
/// The top level descriptor carries the instance id and the ordered `patches`;
/// every patch is itself a `Version` with its own id, priority and launch data.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Version {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Arguments>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub libraries: Vec<Library>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patches: Vec<Version>,
}

impl Version {
    pub fn new(id: impl Into<String>) -> Self {
        Version {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn patch(
        id: impl Into<String>,
        version: Option<String>,
        priority: i32,
        arguments: Arguments,
        main_class: Option<String>,
        libraries: Vec<Library>,
    ) -> Self {
        Version {
            id: id.into(),
            version,
            priority: Some(priority),
            main_class,
            arguments: Some(arguments),
            libraries,
            patches: Vec::new(),
        }
    }

    /// Folds `patch` into the descriptor.
    ///
    /// A patch with the same id is replaced rather than duplicated, and the new
    /// patch always lands at the end of the list.
    pub fn add_patch(mut self, patch: Version) -> Self {
        self.patches.retain(|existing| existing.id != patch.id);
        self.patches.push(patch);
        self
    }

    pub fn patch_ids(&self) -> Vec<&str> {
        self.patches.iter().map(|p| p.id.as_str()).collect()
    }

    pub fn find_patch(&self, id: &str) -> Option<&Version> {
        self.patches.iter().find(|p| p.id == id)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct Arguments {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game: Option<Vec<serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jvm: Option<Vec<serde_json::Value>>,
}

impl Arguments {
    pub fn with_game_arguments(mut self, arguments: Vec<String>) -> Self {
        self.game
            .get_or_insert_with(Vec::new)
            .extend(arguments.into_iter().map(serde_json::Value::String));
        self
    }

    /// Plain string game arguments, skipping rule-guarded entries.
    pub fn game_arguments(&self) -> Vec<&str> {
        self.game
            .iter()
            .flatten()
            .filter_map(|arg| arg.as_str())
            .collect()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Library {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloads: Option<LibraryDownloads>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<Rule>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub natives: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extract: Option<ExtractInfo>,
    /// MultiMC marks jars it ships inside the pack (`local`) this way.
    #[serde(rename = "MMC-hint", default, skip_serializing_if = "Option::is_none")]
    pub mmc_hint: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LibraryDownloads {
    pub artifact: Option<Artifact>,
    pub classifiers: Option<HashMap<String, Artifact>>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Artifact {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub size: Option<i64>,
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Rule {
    pub action: String,
    pub os: Option<OsRule>,
    pub features: Option<HashMap<String, bool>>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct OsRule {
    pub name: Option<String>,
    pub version: Option<String>,
    pub arch: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ExtractInfo {
    pub exclude: Option<Vec<String>>,
}
