use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::minecraft::error::InstallError;
use crate::minecraft::task::Task;
use crate::minecraft::versions::Version;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModLoader {
    Vanilla,
    Forge,
    NeoForge,
    LiteLoader,
    Fabric,
    Quilt,
}

impl ModLoader {
    /// Canonical short name used as the patch id and in version requests.
    pub fn short_name(&self) -> &'static str {
        match self {
            ModLoader::Vanilla => "game",
            ModLoader::Forge => "forge",
            ModLoader::NeoForge => "neoforge",
            ModLoader::LiteLoader => "liteloader",
            ModLoader::Fabric => "fabric",
            ModLoader::Quilt => "quilt",
        }
    }
}

impl std::fmt::Display for ModLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModLoader::Vanilla => write!(f, "Vanilla"),
            ModLoader::Forge => write!(f, "Forge"),
            ModLoader::NeoForge => write!(f, "NeoForge"),
            ModLoader::LiteLoader => write!(f, "LiteLoader"),
            ModLoader::Fabric => write!(f, "Fabric"),
            ModLoader::Quilt => write!(f, "Quilt"),
        }
    }
}

impl Default for ModLoader {
    fn default() -> Self {
        ModLoader::Vanilla
    }
}

/// On-disk layout of installed instances.
///
/// ```text
/// <base>/versions/<name>/<name>.json   version descriptor
/// <base>/versions/<name>/modpack.json  modpack configuration
/// <base>/versions/<name>/minecraft/    game directory
/// ```
#[derive(Debug, Clone)]
pub struct GameRepository {
    base_dir: PathBuf,
}

impl GameRepository {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        GameRepository {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn versions_dir(&self) -> PathBuf {
        self.base_dir.join("versions")
    }

    pub fn version_root(&self, name: &str) -> PathBuf {
        self.versions_dir().join(name)
    }

    pub fn version_json(&self, name: &str) -> PathBuf {
        self.version_root(name).join(format!("{}.json", name))
    }

    pub fn modpack_configuration(&self, name: &str) -> PathBuf {
        self.version_root(name).join("modpack.json")
    }

    pub fn run_directory(&self, name: &str) -> PathBuf {
        self.version_root(name).join("minecraft")
    }

    /// Rejects names that are not exactly one plain directory name under `versions/`.
    pub fn validate_name(name: &str) -> Result<(), InstallError> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) if !name.contains(['/', '\\']) => Ok(()),
            _ => Err(InstallError::InvalidModpack(format!("{:?} is not a valid instance name", name))),
        }
    }

    pub fn has_version(&self, name: &str) -> bool {
        self.version_root(name).is_dir()
    }

    /// Names of every instance directory, sorted.
    pub fn list_versions(&self) -> Result<Vec<String>, InstallError> {
        let dir = self.versions_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Load the version descriptor; `None` when the instance has none yet.
    pub fn read_version_json(&self, name: &str) -> Result<Option<Version>, InstallError> {
        let path = self.version_json(name);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    pub fn save_version(&self, version: &Version) -> Result<(), InstallError> {
        let path = self.version_json(&version.id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(version)?;
        fs::write(&path, content)?;
        log::info!("Saved version {} with {} patches", version.id, version.patches.len());
        Ok(())
    }

    /// Unit persisting `version`, for callers that schedule it.
    pub fn save_version_task(&self, version: Version) -> Box<dyn Task> {
        Box::new(SaveVersionTask {
            repository: self.clone(),
            version,
        })
    }

    /// Delete the whole instance directory. Returns whether anything was removed.
    pub fn remove_version_from_disk(&self, name: &str) -> Result<bool, InstallError> {
        let root = self.version_root(name);
        if !root.exists() {
            return Ok(false);
        }

        fs::remove_dir_all(&root)?;
        log::info!("Removed instance directory {}", root.display());
        Ok(true)
    }
}

struct SaveVersionTask {
    repository: GameRepository,
    version: Version,
}

impl Task for SaveVersionTask {
    fn name(&self) -> String {
        format!("save version {}", self.version.id)
    }

    fn execute(&mut self) -> Result<(), InstallError> {
        self.repository.save_version(&self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_rooted_in_versions() {
        let repo = GameRepository::new("/games");
        assert_eq!(repo.version_root("Pack"), PathBuf::from("/games/versions/Pack"));
        assert_eq!(repo.version_json("Pack"), PathBuf::from("/games/versions/Pack/Pack.json"));
        assert_eq!(repo.modpack_configuration("Pack"), PathBuf::from("/games/versions/Pack/modpack.json"));
        assert_eq!(repo.run_directory("Pack"), PathBuf::from("/games/versions/Pack/minecraft"));
    }

    #[test]
    fn missing_version_json_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let repo = GameRepository::new(dir.path());
        assert!(repo.read_version_json("Pack").unwrap().is_none());
        assert!(!repo.has_version("Pack"));
    }

    #[test]
    fn save_then_remove() {
        let dir = tempfile::tempdir().unwrap();
        let repo = GameRepository::new(dir.path());

        repo.save_version(&Version::new("Pack")).unwrap();
        assert!(repo.has_version("Pack"));
        assert_eq!(repo.list_versions().unwrap(), vec!["Pack".to_string()]);
        assert_eq!(repo.read_version_json("Pack").unwrap(), Some(Version::new("Pack")));

        assert!(repo.remove_version_from_disk("Pack").unwrap());
        assert!(!repo.has_version("Pack"));
        assert!(!repo.remove_version_from_disk("Pack").unwrap());
    }

    #[test]
    fn instance_names_stay_inside_versions() {
        assert!(GameRepository::validate_name("Pack").is_ok());
        assert!(GameRepository::validate_name("My Pack 1.2").is_ok());
        for name in ["", ".", "..", "../escaped", "a/b", "a\\b", "/etc"] {
            assert!(
                matches!(GameRepository::validate_name(name), Err(InstallError::InvalidModpack(_))),
                "{:?} accepted",
                name
            );
        }
    }

    #[test]
    fn loader_names() {
        assert_eq!(ModLoader::NeoForge.short_name(), "neoforge");
        assert_eq!(ModLoader::Quilt.to_string(), "Quilt");
        assert_eq!(ModLoader::default(), ModLoader::Vanilla);
    }
}
