use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Component, Path, PathBuf};

use crate::minecraft::archive::{self, ArchiveEncoding, ArchiveView};
use crate::minecraft::error::InstallError;
use crate::minecraft::task::Task;

/// Summary of a modpack archive, independent of its format.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Modpack {
    pub name: String,
    pub version: Option<String>,
    pub game_version: String,
    pub description: Option<String>,
    pub encoding: ArchiveEncoding,
}

/// A file the pack placed in the game directory, with the SHA-1 it had.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct FileInformation {
    pub path: String,
    pub hash: String,
}

/// Record of how an instance was installed, stored next to its descriptor.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ModpackConfiguration<M> {
    pub manifest: M,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub overrides: Vec<FileInformation>,
}

pub fn read_modpack_configuration<M: DeserializeOwned>(
    path: &Path,
) -> Result<Option<ModpackConfiguration<M>>, InstallError> {
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&content)?))
}

pub fn sha1_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

pub fn sha1_file(path: &Path) -> Result<String, InstallError> {
    let mut file = File::open(path)?;
    let mut hasher = Sha1::new();
    let mut buffer = [0u8; 8192];

    loop {
        match file.read(&mut buffer)? {
            0 => break,
            n => hasher.update(&buffer[..n]),
        }
    }

    Ok(format!("{:x}", hasher.finalize()))
}

fn is_safe_relative(path: &str) -> bool {
    Path::new(path)
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
}

/// Extracts pack content into the game directory without clobbering user edits.
///
/// A file recorded by the previous install is left alone when the player changed
/// it and the pack did not. Files the previous install placed but the new pack no
/// longer ships are removed, unless the player changed them.
pub struct ModpackInstallTask {
    zip_file: PathBuf,
    destination: PathBuf,
    encoding: ArchiveEncoding,
    sub_directories: Vec<String>,
    filter: Box<dyn Fn(&str) -> bool + Send>,
    previous: Vec<FileInformation>,
}

impl ModpackInstallTask {
    pub fn new(
        zip_file: PathBuf,
        destination: PathBuf,
        encoding: ArchiveEncoding,
        sub_directories: Vec<String>,
        filter: impl Fn(&str) -> bool + Send + 'static,
        previous: Option<Vec<FileInformation>>,
    ) -> Self {
        ModpackInstallTask {
            zip_file,
            destination,
            encoding,
            sub_directories,
            filter: Box::new(filter),
            previous: previous.unwrap_or_default(),
        }
    }
}

impl Task for ModpackInstallTask {
    fn name(&self) -> String {
        format!("extract modpack into {}", self.destination.display())
    }

    fn execute(&mut self) -> Result<(), InstallError> {
        fs::create_dir_all(&self.destination)?;

        let recorded: HashMap<&str, &str> = self
            .previous
            .iter()
            .map(|f| (f.path.as_str(), f.hash.as_str()))
            .collect();
        let mut shipped = HashSet::new();
        let mut written = 0usize;

        let mut view = ArchiveView::open(&self.zip_file, &self.encoding)?;
        for sub_directory in &self.sub_directories {
            if !view.is_dir(sub_directory) {
                log::warn!("{} has no {} directory, nothing to extract", self.zip_file.display(), sub_directory);
                continue;
            }

            for rel in view.files_under(sub_directory) {
                if !(self.filter)(&rel) {
                    continue;
                }
                shipped.insert(rel.clone());

                let bytes = view.read(&archive::join(sub_directory, &rel))?;
                let dest = self.destination.join(&rel);

                if let Some(old_hash) = recorded.get(rel.as_str()) {
                    if dest.is_file() {
                        let current = sha1_file(&dest)?;
                        if current != *old_hash && sha1_bytes(&bytes) == *old_hash {
                            log::debug!("Keeping user-modified {}", rel);
                            continue;
                        }
                    }
                }

                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&dest, &bytes)?;
                written += 1;
            }
        }

        for old in &self.previous {
            if shipped.contains(&old.path) || !is_safe_relative(&old.path) {
                continue;
            }
            let stale = self.destination.join(&old.path);
            if stale.is_file() && sha1_file(&stale)? == old.hash {
                fs::remove_file(&stale)?;
                log::debug!("Removed {} (no longer part of the pack)", old.path);
            }
        }

        log::info!("Extracted {} files into {}", written, self.destination.display());
        Ok(())
    }
}

/// Hashes the pack content and writes the modpack configuration for an instance.
pub struct MinecraftInstanceTask<M> {
    zip_file: PathBuf,
    encoding: ArchiveEncoding,
    sub_directories: Vec<String>,
    manifest: M,
    kind: String,
    name: String,
    version: Option<String>,
    json_file: PathBuf,
}

impl<M> MinecraftInstanceTask<M> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        zip_file: PathBuf,
        encoding: ArchiveEncoding,
        sub_directories: Vec<String>,
        manifest: M,
        kind: &str,
        name: &str,
        version: Option<String>,
        json_file: PathBuf,
    ) -> Self {
        MinecraftInstanceTask {
            zip_file,
            encoding,
            sub_directories,
            manifest,
            kind: kind.to_string(),
            name: name.to_string(),
            version,
            json_file,
        }
    }
}

impl<M: Serialize + Clone + Send> Task for MinecraftInstanceTask<M> {
    fn name(&self) -> String {
        format!("write modpack configuration {}", self.json_file.display())
    }

    fn execute(&mut self) -> Result<(), InstallError> {
        let mut overrides = Vec::new();
        let mut view = ArchiveView::open(&self.zip_file, &self.encoding)?;

        for sub_directory in &self.sub_directories {
            for rel in view.files_under(sub_directory) {
                let bytes = view.read(&archive::join(sub_directory, &rel))?;
                overrides.push(FileInformation {
                    path: rel,
                    hash: sha1_bytes(&bytes),
                });
            }
        }

        let configuration = ModpackConfiguration {
            manifest: self.manifest.clone(),
            kind: self.kind.clone(),
            name: self.name.clone(),
            version: self.version.clone(),
            overrides,
        };

        if let Some(parent) = self.json_file.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.json_file, serde_json::to_string_pretty(&configuration)?)?;
        log::info!(
            "Recorded {} pack files in {}",
            configuration.overrides.len(),
            self.json_file.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha1_of_known_input() {
        assert_eq!(sha1_bytes(b"abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }

    #[test]
    fn file_and_bytes_hash_agree() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("options.txt");
        fs::write(&path, b"fov:90").unwrap();
        assert_eq!(sha1_file(&path).unwrap(), sha1_bytes(b"fov:90"));
    }

    #[test]
    fn unsafe_override_paths_are_rejected() {
        assert!(is_safe_relative("config/forge.cfg"));
        assert!(!is_safe_relative("../outside.txt"));
        assert!(!is_safe_relative("/etc/passwd"));
    }

    #[test]
    fn configuration_type_field_is_renamed() {
        let configuration = ModpackConfiguration {
            manifest: serde_json::json!({}),
            kind: "MultiMC".to_string(),
            name: "Pack".to_string(),
            version: None,
            overrides: Vec::new(),
        };
        let json = serde_json::to_value(&configuration).unwrap();
        assert_eq!(json["type"], "MultiMC");
    }
}
