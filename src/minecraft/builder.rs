use crate::minecraft::error::InstallError;
use crate::minecraft::instances::{GameRepository, ModLoader};
use crate::minecraft::task::Task;
use crate::minecraft::versions::{Arguments, Version};

const GAME_PRIORITY: i32 = 0;
const LOADER_PRIORITY: i32 = 30000;

/// Collects what a new instance should be built from: the game version plus
/// the loader versions requested for it.
#[derive(Debug, Clone)]
pub struct GameBuilder {
    name: String,
    game_version: String,
    loaders: Vec<(ModLoader, String)>,
}

impl GameBuilder {
    pub fn new(name: impl Into<String>, game_version: impl Into<String>) -> Self {
        GameBuilder {
            name: name.into(),
            game_version: game_version.into(),
            loaders: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn game_version(&self) -> &str {
        &self.game_version
    }

    /// Request `loader` at `version`. Asking again replaces the earlier version.
    pub fn version(&mut self, loader: ModLoader, version: impl Into<String>) -> &mut Self {
        let version = version.into();
        match self.loaders.iter_mut().find(|(l, _)| *l == loader) {
            Some(entry) => entry.1 = version,
            None => self.loaders.push((loader, version)),
        }
        self
    }

    pub fn requested_versions(&self) -> &[(ModLoader, String)] {
        &self.loaders
    }

    pub fn is_vanilla(&self) -> bool {
        self.loaders.is_empty()
    }

    /// Base descriptor the instance starts from.
    pub fn base_version(&self) -> Version {
        let mut version = Version::new(&self.name).add_patch(Version::patch(
            ModLoader::Vanilla.short_name(),
            Some(self.game_version.clone()),
            GAME_PRIORITY,
            Arguments::default(),
            None,
            Vec::new(),
        ));

        for (loader, loader_version) in &self.loaders {
            version = version.add_patch(Version::patch(
                loader.short_name(),
                Some(loader_version.clone()),
                LOADER_PRIORITY,
                Arguments::default(),
                None,
                Vec::new(),
            ));
        }
        version
    }

    /// The unit that writes the base descriptor for the instance.
    pub fn build(&self, repository: GameRepository) -> Box<dyn Task> {
        Box::new(GameInstallTask {
            builder: self.clone(),
            repository,
        })
    }
}

struct GameInstallTask {
    builder: GameBuilder,
    repository: GameRepository,
}

impl Task for GameInstallTask {
    fn name(&self) -> String {
        format!("install game {}", self.builder.name)
    }

    fn execute(&mut self) -> Result<(), InstallError> {
        let version = self.builder.base_version();
        for (loader, loader_version) in self.builder.requested_versions() {
            log::info!("Requesting {} {} for {}", loader, loader_version, self.builder.name);
        }
        self.repository.save_version(&version)
    }
}
