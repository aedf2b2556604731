use std::path::{Path, PathBuf};

use crate::minecraft::agent::AgentConfig;
use crate::minecraft::archive::{self, ArchiveEncoding, ArchiveView};
use crate::minecraft::builder::GameBuilder;
use crate::minecraft::error::InstallError;
use crate::minecraft::instances::GameRepository;
use crate::minecraft::modpack::{
    read_modpack_configuration, MinecraftInstanceTask, Modpack, ModpackConfiguration, ModpackInstallTask,
};
use crate::minecraft::multimc_manifest::{
    self, MultiMcInstanceConfiguration, MultiMcInstancePatch, MultiMcLayout, MultiMcManifest, LOADER_COMPONENTS,
};
use crate::minecraft::task::{with_stage, Task, TaskExecutor};
use crate::minecraft::versions::{Arguments, Version};

/// Installer type recorded in the modpack configuration.
pub const MODPACK_TYPE: &str = "MultiMC";
pub const MODPACK_STAGE: &str = "modpack";

const PATCH_PRIORITY: i32 = 1;
const TWEAK_CLASS_FLAG: &str = "--tweakClass";

/// Requests every recognised loader component that names a version.
pub fn resolve_loaders(pack: Option<&MultiMcManifest>, builder: &mut GameBuilder) {
    let Some(pack) = pack else {
        return;
    };

    for (uid, loader) in LOADER_COMPONENTS {
        let version = pack
            .component(uid)
            .and_then(|c| c.version.as_deref())
            .filter(|v| !v.is_empty());
        if let Some(version) = version {
            builder.version(loader, version);
        }
    }
}

/// Where the game directory sits inside the archive.
///
/// Probes `/.minecraft`, `/minecraft`, `/<name>/.minecraft`, `/<name>/minecraft`
/// in that order and falls back to `/<name>/.minecraft` when none exists.
pub fn detect_layout(view: &ArchiveView, name: &str) -> String {
    let nested = archive::join("/", name);
    let candidates = MultiMcLayout::GAME_DIRS
        .iter()
        .map(|dir| archive::join("/", dir))
        .chain(MultiMcLayout::GAME_DIRS.iter().map(|dir| archive::join(&nested, dir)));

    for candidate in candidates {
        if view.exists(&candidate) {
            return candidate;
        }
    }
    archive::join(&nested, MultiMcLayout::GAME_DIRS[0])
}

/// Turns one MultiMC patch into a version patch carrying the agent argument.
pub fn build_patch(patch: &MultiMcInstancePatch, agent_argument: &str) -> Version {
    let mut arguments = Vec::with_capacity(patch.tweakers.len() * 2 + 1);
    for tweaker in &patch.tweakers {
        arguments.push(TWEAK_CLASS_FLAG.to_string());
        arguments.push(tweaker.clone());
    }
    arguments.push(agent_argument.to_string());

    Version::patch(
        patch.name.clone(),
        patch.version.clone(),
        PATCH_PRIORITY,
        Arguments::default().with_game_arguments(arguments),
        patch.main_class.clone(),
        patch.all_libraries(),
    )
}

/// Folds every `patches/*.json` under `root` into `version`, in archive order.
///
/// A patch that does not parse aborts the merge.
pub fn merge_patches(
    view: &mut ArchiveView,
    root: &str,
    mut version: Version,
    agent_argument: &str,
) -> Result<Version, InstallError> {
    let patches = archive::join(root, MultiMcLayout::PATCHES);
    if !view.is_dir(&patches) {
        return Ok(version);
    }

    for patch_json in view.list(&patches) {
        if view.is_dir(&patch_json) || !patch_json.ends_with(MultiMcLayout::PATCH_EXTENSION) {
            continue;
        }

        let content = view.read_to_string(&patch_json)?;
        let patch: MultiMcInstancePatch =
            serde_json::from_str(&content).map_err(|source| InstallError::MalformedPatch {
                path: patch_json.clone(),
                source,
            })?;

        log::info!(
            "Applying patch {} {}",
            patch.name,
            patch.version.as_deref().unwrap_or("")
        );
        version = version.add_patch(build_patch(&patch, agent_argument));
    }

    Ok(version)
}

/// Copies the pack's `libraries` and `jarmods` trees into the instance directory.
pub fn copy_resources(view: &mut ArchiveView, root: &str, version_root: &Path) -> Result<(), InstallError> {
    for dir in [MultiMcLayout::LIBRARIES, MultiMcLayout::JARMODS] {
        let source = archive::join(root, dir);
        if !view.is_dir(&source) {
            continue;
        }
        let copied = view.copy_dir(&source, &version_root.join(dir))?;
        log::info!("Copied {} files from {}", copied, source);
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallPhase {
    Constructed,
    PreExecuted,
    Executed,
    Completed { failed: bool },
}

/// Installs a MultiMC instance archive as the instance `name`.
///
/// Construction requests the loader install. `pre_execute` schedules content
/// extraction and the configuration record. `execute` folds the archive's
/// patches into the descriptor, copies libraries and jar mods and schedules the
/// descriptor save. A failure anywhere removes the instance directory.
pub struct MultiMcModpackInstallTask {
    zip_file: PathBuf,
    modpack: Modpack,
    manifest: MultiMcInstanceConfiguration,
    name: String,
    repository: GameRepository,
    phase: InstallPhase,
    dependents: Vec<Box<dyn Task>>,
    dependencies: Vec<Box<dyn Task>>,
}

impl MultiMcModpackInstallTask {
    pub fn new(
        repository: GameRepository,
        zip_file: PathBuf,
        modpack: Modpack,
        manifest: MultiMcInstanceConfiguration,
        name: &str,
    ) -> Result<Self, InstallError> {
        GameRepository::validate_name(name)?;
        let json = repository.modpack_configuration(name);
        if repository.has_version(name) && !json.exists() {
            return Err(InstallError::ConflictingInstance(name.to_string()));
        }

        let mut builder = GameBuilder::new(name, manifest.game_version.clone());
        resolve_loaders(manifest.mmc_pack.as_ref(), &mut builder);
        let dependents = vec![builder.build(repository.clone())];

        Ok(MultiMcModpackInstallTask {
            zip_file,
            modpack,
            manifest,
            name: name.to_string(),
            repository,
            phase: InstallPhase::Constructed,
            dependents,
            dependencies: Vec::new(),
        })
    }

    pub fn phase(&self) -> InstallPhase {
        self.phase
    }

    fn advance(&mut self, phase: InstallPhase) {
        log::debug!("{}: {:?} -> {:?}", self.name, self.phase, phase);
        self.phase = phase;
    }

    fn previous_configuration(&self) -> Result<Option<ModpackConfiguration<serde_json::Value>>, InstallError> {
        let json = self.repository.modpack_configuration(&self.name);
        let configuration = match read_modpack_configuration::<serde_json::Value>(&json) {
            Ok(configuration) => configuration,
            Err(e) => {
                log::warn!("Ignoring unreadable {}: {}", json.display(), e);
                None
            }
        };

        if let Some(configuration) = &configuration {
            if configuration.kind != MODPACK_TYPE {
                return Err(InstallError::WrongInstallerType {
                    name: self.name.clone(),
                    expected: MODPACK_TYPE.to_string(),
                    found: configuration.kind.clone(),
                });
            }
        }
        Ok(configuration)
    }
}

impl Task for MultiMcModpackInstallTask {
    fn name(&self) -> String {
        format!("install MultiMC modpack {}", self.name)
    }

    fn stage(&self) -> Option<&str> {
        Some(MODPACK_STAGE)
    }

    fn pre_execute(&mut self) -> Result<(), InstallError> {
        let configuration = self.previous_configuration()?;
        let run = self.repository.run_directory(&self.name);

        let sub_directory = {
            let view = ArchiveView::open(&self.zip_file, &self.modpack.encoding)?;
            detect_layout(&view, &self.manifest.name)
        };
        log::info!("Using {} as the game directory of {}", sub_directory, self.name);

        self.dependents.push(with_stage(
            Box::new(ModpackInstallTask::new(
                self.zip_file.clone(),
                run,
                self.modpack.encoding.clone(),
                vec![sub_directory.clone()],
                |_| true,
                configuration.map(|c| c.overrides),
            )),
            MODPACK_STAGE,
        ));
        self.dependents.push(with_stage(
            Box::new(MinecraftInstanceTask::new(
                self.zip_file.clone(),
                self.modpack.encoding.clone(),
                vec![sub_directory],
                self.manifest.clone(),
                MODPACK_TYPE,
                &self.manifest.name,
                None,
                self.repository.modpack_configuration(&self.name),
            )),
            MODPACK_STAGE,
        ));
        log::debug!("Scheduled extraction and configuration record for {}", self.name);

        self.advance(InstallPhase::PreExecuted);
        Ok(())
    }

    fn execute(&mut self) -> Result<(), InstallError> {
        let version = self
            .repository
            .read_version_json(&self.name)?
            .unwrap_or_else(|| Version::new(&self.name));
        let game_directory = self.repository.run_directory(&self.name);

        let version = {
            let mut view = ArchiveView::open(&self.zip_file, &ArchiveEncoding::Auto)?;
            let root = multimc_manifest::get_root_path(&view)?;

            let packed_cfg_path = archive::join(&root, MultiMcLayout::INSTANCE_CFG);
            let packed_cfg = if view.exists(&packed_cfg_path) {
                Some(view.read_to_string(&packed_cfg_path)?)
            } else {
                None
            };
            let agent = AgentConfig::load(&game_directory, packed_cfg.as_deref())?;
            let agent_argument = agent.java_agent_argument();

            let version = merge_patches(&mut view, &root, version, &agent_argument)?;
            copy_resources(&mut view, &root, &self.repository.version_root(&self.name))?;
            version
        };

        self.dependencies.push(self.repository.save_version_task(version));
        self.advance(InstallPhase::Executed);
        Ok(())
    }

    fn take_dependents(&mut self) -> Vec<Box<dyn Task>> {
        std::mem::take(&mut self.dependents)
    }

    fn take_dependencies(&mut self) -> Vec<Box<dyn Task>> {
        std::mem::take(&mut self.dependencies)
    }

    fn on_done(&mut self, failed: bool) {
        if matches!(self.phase, InstallPhase::Completed { .. }) {
            return;
        }
        self.advance(InstallPhase::Completed { failed });

        if failed {
            log::warn!("Installing {} failed, removing it", self.name);
            if let Err(e) = self.repository.remove_version_from_disk(&self.name) {
                log::warn!("Could not remove {}: {}", self.name, e);
            }
        } else {
            log::info!("Installed MultiMC modpack {}", self.name);
        }
    }
}

/// Reads `zip_file` and installs it into `repository`.
///
/// The instance is named after the pack unless `name` is given.
pub async fn install_modpack(
    repository: &GameRepository,
    zip_file: &Path,
    name: Option<&str>,
    encoding: &ArchiveEncoding,
) -> Result<String, InstallError> {
    let (modpack, manifest) = multimc_manifest::read_manifest(zip_file, encoding)?;
    let name = name.map(str::to_string).unwrap_or_else(|| modpack.name.clone());

    let task = MultiMcModpackInstallTask::new(
        repository.clone(),
        zip_file.to_path_buf(),
        modpack,
        manifest,
        &name,
    )?;
    TaskExecutor::run(Box::new(task)).await?;
    Ok(name)
}
