use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::minecraft::archive::{self, ArchiveEncoding, ArchiveView};
use crate::minecraft::error::InstallError;
use crate::minecraft::instances::ModLoader;
use crate::minecraft::modpack::Modpack;
use crate::minecraft::versions::Library;

/// Fixed names of the MultiMC instance layout.
pub struct MultiMcLayout;

impl MultiMcLayout {
    pub const INSTANCE_CFG: &'static str = "instance.cfg";
    pub const MMC_PACK: &'static str = "mmc-pack.json";
    pub const PATCHES: &'static str = "patches";
    pub const LIBRARIES: &'static str = "libraries";
    pub const JARMODS: &'static str = "jarmods";
    pub const PATCH_EXTENSION: &'static str = ".json";
    /// Game directory names, most preferred first.
    pub const GAME_DIRS: [&'static str; 2] = [".minecraft", "minecraft"];
    pub const AGENT_KEY: &'static str = "JvmArgs";
}

pub const MINECRAFT_UID: &str = "net.minecraft";

/// Loader components recognised in `mmc-pack.json`, in resolution order.
pub const LOADER_COMPONENTS: [(&str, ModLoader); 5] = [
    ("net.minecraftforge", ModLoader::Forge),
    ("net.neoforged", ModLoader::NeoForge),
    ("com.mumfrey.liteloader", ModLoader::LiteLoader),
    ("net.fabricmc.fabric-loader", ModLoader::Fabric),
    ("org.quiltmc.quilt-loader", ModLoader::Quilt),
];

/// `mmc-pack.json`
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct MultiMcManifest {
    #[serde(default)]
    pub format_version: i32,
    #[serde(default)]
    pub components: Vec<MultiMcManifestComponent>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MultiMcManifestComponent {
    pub uid: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub cached_name: Option<String>,
    #[serde(default)]
    pub important: bool,
    #[serde(default)]
    pub dependency_only: bool,
}

impl MultiMcManifest {
    pub fn component(&self, uid: &str) -> Option<&MultiMcManifestComponent> {
        self.components.iter().find(|c| c.uid == uid)
    }
}

/// Instance settings read from `instance.cfg` (plus the parsed `mmc-pack.json`).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct MultiMcInstanceConfiguration {
    pub instance_type: Option<String>,
    pub name: String,
    pub game_version: String,
    pub notes: Option<String>,
    pub jvm_args: Option<String>,
    pub java_path: Option<String>,
    pub override_java_args: bool,
    pub override_memory: bool,
    pub min_memory: Option<u32>,
    pub max_memory: Option<u32>,
    pub permgen: Option<u32>,
    pub override_commands: bool,
    pub wrapper_command: Option<String>,
    pub pre_launch_command: Option<String>,
    pub post_exit_command: Option<String>,
    pub override_window: bool,
    pub fullscreen: bool,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub mmc_pack: Option<MultiMcManifest>,
}

impl MultiMcInstanceConfiguration {
    /// Builds the configuration from `instance.cfg` text.
    ///
    /// `default_name` wins over the `name` key; it is the folder the instance was
    /// exported in, which is also what the archive layout is keyed on.
    pub fn from_cfg(
        default_name: Option<&str>,
        cfg: &str,
        mmc_pack: Option<MultiMcManifest>,
    ) -> Result<Self, InstallError> {
        let values = parse_cfg(cfg);
        let get = |key: &str| values.get(key).filter(|v| !v.is_empty()).cloned();
        let flag = |key: &str| values.get(key).map(|v| v.eq_ignore_ascii_case("true")).unwrap_or(false);
        let number = |key: &str| values.get(key).and_then(|v| v.parse::<u32>().ok());

        let name = default_name
            .map(str::to_string)
            .or_else(|| get("name"))
            .ok_or_else(|| InstallError::InvalidModpack("instance has no name".to_string()))?;

        let game_version = mmc_pack
            .as_ref()
            .and_then(|pack| pack.component(MINECRAFT_UID))
            .and_then(|c| c.version.clone())
            .or_else(|| get("IntendedVersion"))
            .ok_or_else(|| InstallError::InvalidModpack(format!("{} declares no Minecraft version", name)))?;

        Ok(MultiMcInstanceConfiguration {
            instance_type: get("InstanceType"),
            name,
            game_version,
            notes: get("notes"),
            jvm_args: get(MultiMcLayout::AGENT_KEY),
            java_path: get("JavaPath"),
            override_java_args: flag("OverrideJavaArgs"),
            override_memory: flag("OverrideMemory"),
            min_memory: number("MinMemAlloc"),
            max_memory: number("MaxMemAlloc"),
            permgen: number("PermGen"),
            override_commands: flag("OverrideCommands"),
            wrapper_command: get("WrapperCommand"),
            pre_launch_command: get("PreLaunchCommand"),
            post_exit_command: get("PostExitCommand"),
            override_window: flag("OverrideWindow"),
            fullscreen: flag("LaunchMaximized"),
            width: number("MinecraftWinWidth"),
            height: number("MinecraftWinHeight"),
            mmc_pack,
        })
    }
}

/// One file of the `patches` directory.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MultiMcInstancePatch {
    #[serde(default)]
    pub format_version: i32,
    #[serde(default)]
    pub uid: Option<String>,
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub order: i32,
    #[serde(default)]
    pub main_class: Option<String>,
    #[serde(rename = "+tweakers", alias = "tweakers", default)]
    pub tweakers: Vec<String>,
    #[serde(default)]
    pub libraries: Vec<Library>,
    #[serde(rename = "+libraries", default)]
    pub extra_libraries: Vec<Library>,
}

impl MultiMcInstancePatch {
    pub fn all_libraries(&self) -> Vec<Library> {
        self.libraries
            .iter()
            .chain(self.extra_libraries.iter())
            .cloned()
            .collect()
    }
}

/// `key=value` lines; `#`/`!` comments and `[section]` headers are skipped.
pub fn parse_cfg(text: &str) -> HashMap<String, String> {
    let mut values = HashMap::new();
    for raw in text.lines() {
        let line = raw.trim_start();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') || line.starts_with('[') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            values.insert(key.trim().to_string(), value.trim_end().to_string());
        }
    }
    values
}

/// The directory inside the archive that holds `instance.cfg`.
///
/// That is the archive root, else the first top-level directory carrying one,
/// else the first top-level directory at all.
pub fn get_root_path(view: &ArchiveView) -> Result<String, InstallError> {
    if view.exists(&archive::join("/", MultiMcLayout::INSTANCE_CFG)) {
        return Ok("/".to_string());
    }

    let dirs: Vec<String> = view.list("/").into_iter().filter(|p| view.is_dir(p)).collect();
    dirs.iter()
        .find(|dir| view.exists(&archive::join(dir, MultiMcLayout::INSTANCE_CFG)))
        .or_else(|| dirs.first())
        .cloned()
        .ok_or_else(|| InstallError::InvalidModpack("archive has no instance directory".to_string()))
}

/// Reads the modpack summary and instance configuration out of `zip_file`.
pub fn read_manifest(
    zip_file: &Path,
    encoding: &ArchiveEncoding,
) -> Result<(Modpack, MultiMcInstanceConfiguration), InstallError> {
    let mut view = ArchiveView::open(zip_file, encoding)?;
    let root = get_root_path(&view)?;

    let cfg_path = archive::join(&root, MultiMcLayout::INSTANCE_CFG);
    if !view.exists(&cfg_path) {
        return Err(InstallError::InvalidModpack(format!("{} is missing", cfg_path)));
    }
    let cfg = view.read_to_string(&cfg_path)?;

    let pack_path = archive::join(&root, MultiMcLayout::MMC_PACK);
    let mmc_pack = if view.exists(&pack_path) {
        Some(serde_json::from_str::<MultiMcManifest>(&view.read_to_string(&pack_path)?)?)
    } else {
        None
    };

    let default_name = if root == "/" {
        None
    } else {
        Some(archive::file_name(&root).to_string())
    };
    let default_name = default_name.or_else(|| {
        if parse_cfg(&cfg).contains_key("name") {
            None
        } else {
            zip_file.file_stem().map(|s| s.to_string_lossy().to_string())
        }
    });

    let configuration = MultiMcInstanceConfiguration::from_cfg(default_name.as_deref(), &cfg, mmc_pack)?;
    let modpack = Modpack {
        name: configuration.name.clone(),
        version: None,
        game_version: configuration.game_version.clone(),
        description: configuration.notes.clone(),
        encoding: encoding.clone(),
    };

    log::info!(
        "Read MultiMC instance {} (Minecraft {}) from {}",
        modpack.name,
        modpack.game_version,
        zip_file.display()
    );
    Ok((modpack, configuration))
}
