use std::fs;
use std::path::{Path, PathBuf};

use crate::minecraft::error::InstallError;
use crate::minecraft::multimc_manifest::MultiMcLayout;

/// Java agent the instance is launched with, recovered from `instance.cfg`.
///
/// The `JvmArgs` value packs both parts into one string,
/// `-javaagent:<jar>=<pack url>`; the jar is relative to the game directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub jar_path: PathBuf,
    pub pack_url: String,
}

impl AgentConfig {
    pub fn parse(cfg: &str, game_directory: &Path, source: &Path) -> Result<Self, InstallError> {
        let prefix = format!("{}=", MultiMcLayout::AGENT_KEY);
        let missing = |what: &str| InstallError::MissingConfigurationKey {
            key: format!("{} ({})", MultiMcLayout::AGENT_KEY, what),
            file: source.to_path_buf(),
        };

        let value = cfg
            .lines()
            .find(|line| line.starts_with(&prefix))
            .map(|line| line[prefix.len()..].trim_end())
            .ok_or_else(|| missing("java agent path"))?;

        let mut parts = value.split('=');
        let agent = parts.next().unwrap_or_default();
        let pack_url = parts
            .next()
            .filter(|url| !url.is_empty())
            .ok_or_else(|| missing("pack URL"))?;
        let jar = agent
            .split(':')
            .nth(1)
            .filter(|jar| !jar.is_empty())
            .ok_or_else(|| missing("java agent path"))?;

        Ok(AgentConfig {
            jar_path: game_directory.join(jar.trim_start_matches('/')),
            pack_url: pack_url.to_string(),
        })
    }

    /// Reads `<game_directory>/instance.cfg`, or `fallback` when that file is absent.
    ///
    /// The jar path is made absolute against the current directory.
    pub fn load(game_directory: &Path, fallback: Option<&str>) -> Result<Self, InstallError> {
        let game_directory = std::path::absolute(game_directory)?;
        let cfg_path = game_directory.join(MultiMcLayout::INSTANCE_CFG);
        if cfg_path.is_file() {
            let cfg = fs::read_to_string(&cfg_path)?;
            return Self::parse(&cfg, &game_directory, &cfg_path);
        }

        match fallback {
            Some(cfg) => {
                log::debug!("{} not found, using the archive's copy", cfg_path.display());
                Self::parse(cfg, &game_directory, &cfg_path)
            }
            None => Err(InstallError::MissingConfigurationKey {
                key: MultiMcLayout::AGENT_KEY.to_string(),
                file: cfg_path,
            }),
        }
    }

    pub fn java_agent_argument(&self) -> String {
        format!("-javaagent:{}={}", self.jar_path.display(), self.pack_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg_path() -> PathBuf {
        PathBuf::from("/games/Pack/instance.cfg")
    }

    #[test]
    fn splits_jar_and_url() {
        let cfg = "name=Pack\nJvmArgs=-javaagent:packwiz-installer-bootstrap.jar=https://example.com/pack.toml\r\n";
        let agent = AgentConfig::parse(cfg, Path::new("/games/Pack"), &cfg_path()).unwrap();

        assert_eq!(agent.jar_path, PathBuf::from("/games/Pack/packwiz-installer-bootstrap.jar"));
        assert_eq!(agent.pack_url, "https://example.com/pack.toml");
        assert_eq!(
            agent.java_agent_argument(),
            "-javaagent:/games/Pack/packwiz-installer-bootstrap.jar=https://example.com/pack.toml"
        );
    }

    #[test]
    fn first_matching_line_wins() {
        let cfg = "JvmArgs=-javaagent:first.jar=https://a/pack.toml\nJvmArgs=-javaagent:second.jar=https://b/pack.toml\n";
        let agent = AgentConfig::parse(cfg, Path::new("/g"), &cfg_path()).unwrap();
        assert_eq!(agent.jar_path, PathBuf::from("/g/first.jar"));
    }

    #[test]
    fn missing_line_is_a_configuration_error() {
        let err = AgentConfig::parse("name=Pack\n", Path::new("/g"), &cfg_path()).unwrap_err();
        assert!(matches!(err, InstallError::MissingConfigurationKey { .. }));
    }

    #[test]
    fn value_without_url_is_a_configuration_error() {
        let err = AgentConfig::parse("JvmArgs=-Xmx4G\n", Path::new("/g"), &cfg_path()).unwrap_err();
        assert!(matches!(err, InstallError::MissingConfigurationKey { .. }));
    }

    #[test]
    fn value_without_jar_is_a_configuration_error() {
        let err = AgentConfig::parse("JvmArgs=-javaagent=https://a/pack.toml\n", Path::new("/g"), &cfg_path()).unwrap_err();
        assert!(matches!(err, InstallError::MissingConfigurationKey { .. }));
    }

    #[test]
    fn run_directory_copy_is_preferred() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("instance.cfg"),
            "JvmArgs=-javaagent:disk.jar=https://disk/pack.toml\n",
        )
        .unwrap();

        let agent = AgentConfig::load(dir.path(), Some("JvmArgs=-javaagent:zip.jar=https://zip/pack.toml\n")).unwrap();
        assert_eq!(agent.pack_url, "https://disk/pack.toml");

        let empty = tempfile::tempdir().unwrap();
        let agent = AgentConfig::load(empty.path(), Some("JvmArgs=-javaagent:zip.jar=https://zip/pack.toml\n")).unwrap();
        assert_eq!(agent.pack_url, "https://zip/pack.toml");
        assert!(AgentConfig::load(empty.path(), None).is_err());
    }

    #[test]
    fn relative_game_directory_gives_absolute_jar() {
        let agent = AgentConfig::load(
            Path::new("games/versions/Pack/minecraft"),
            Some("JvmArgs=-javaagent:bootstrap.jar=https://x/pack.toml\n"),
        )
        .unwrap();

        assert!(agent.jar_path.is_absolute());
        assert!(agent.jar_path.ends_with("games/versions/Pack/minecraft/bootstrap.jar"));
        let argument = agent.java_agent_argument();
        let jar = argument.trim_start_matches("-javaagent:").split('=').next().unwrap();
        assert!(Path::new(jar).is_absolute());
    }
}
