pub mod minecraft;

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use minecraft::archive::{ArchiveEncoding, ArchiveView};
use minecraft::builder::GameBuilder;
use minecraft::multimc_manifest::{self, MultiMcInstanceConfiguration, MultiMcLayout};
use minecraft::settings::InstallerSettings;
use minecraft::{logger, multimc, settings, GameRepository, InstallError};

#[derive(Parser)]
#[command(name = "mmc-pack-installer")]
#[command(version)]
#[command(about = "Installs MultiMC instance archives as game instances")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Print debug output on the terminal
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Install a MultiMC instance archive
    Install {
        /// Path to the exported instance (.zip)
        zip: PathBuf,

        /// Name of the new instance (defaults to the pack name)
        #[arg(short, long)]
        name: Option<String>,

        /// Game directory holding versions/ (defaults to the configured one)
        #[arg(short, long, env = "MMC_PACK_GAME_DIR")]
        dir: Option<PathBuf>,

        /// Encoding of entry names: auto, utf-8 or any WHATWG label such as gbk
        #[arg(short, long)]
        encoding: Option<ArchiveEncoding>,
    },

    /// Show what an instance archive contains without installing it
    Inspect {
        /// Path to the exported instance (.zip)
        zip: PathBuf,

        /// Encoding of entry names
        #[arg(short, long)]
        encoding: Option<ArchiveEncoding>,
    },

    /// List the instances in the game directory
    List {
        /// Game directory holding versions/ (defaults to the configured one)
        #[arg(short, long, env = "MMC_PACK_GAME_DIR")]
        dir: Option<PathBuf>,
    },

    /// Show or change the saved defaults
    Config {
        /// Default game directory
        #[arg(long)]
        game_dir: Option<PathBuf>,

        /// Default encoding of entry names
        #[arg(long)]
        encoding: Option<ArchiveEncoding>,

        /// Always print debug output on the terminal
        #[arg(long)]
        verbose_logging: Option<bool>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let data_dir = settings::get_data_dir();
    let config = settings::load_settings(&data_dir);

    if let Err(e) = logger::init_logger(&data_dir, cli.verbose || config.verbose_logging) {
        eprintln!("{}", e);
    }

    let result = match cli.command {
        Commands::Install { zip, name, dir, encoding } => {
            let game_dir = dir.unwrap_or_else(|| config.game_directory(&data_dir));
            let encoding = encoding.unwrap_or_else(|| config.archive_encoding.clone());
            install(&zip, name.as_deref(), &game_dir, &encoding)
        }
        Commands::Inspect { zip, encoding } => {
            let encoding = encoding.unwrap_or_else(|| config.archive_encoding.clone());
            inspect(&zip, &encoding)
        }
        Commands::List { dir } => {
            let game_dir = dir.unwrap_or_else(|| config.game_directory(&data_dir));
            list(&game_dir)
        }
        Commands::Config {
            game_dir,
            encoding,
            verbose_logging,
        } => configure(&data_dir, config, game_dir, encoding, verbose_logging),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            if matches!(e, InstallError::TaskFailed { .. }) {
                log::error!("Caused by: {}", e.root_cause());
            }
            ExitCode::FAILURE
        }
    }
}

fn install(zip: &Path, name: Option<&str>, game_dir: &Path, encoding: &ArchiveEncoding) -> Result<(), InstallError> {
    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    let repository = GameRepository::new(game_dir);

    let name = runtime.block_on(multimc::install_modpack(&repository, zip, name, encoding))?;
    log::info!("Installed {} into {}", name, repository.version_root(&name).display());
    Ok(())
}

fn inspect(zip: &Path, encoding: &ArchiveEncoding) -> Result<(), InstallError> {
    let (modpack, manifest) = multimc_manifest::read_manifest(zip, encoding)?;
    let view = ArchiveView::open(zip, encoding)?;
    let root = multimc_manifest::get_root_path(&view)?;

    println!("Name:         {}", modpack.name);
    println!("Game version: {}", modpack.game_version);
    if let Some(version) = &modpack.version {
        println!("Version:      {}", version);
    }
    println!("Encoding:     {}", view.encoding().name());
    println!("Game files:   {}", multimc::detect_layout(&view, &manifest.name));

    for line in loader_lines(&manifest) {
        println!("Loader:       {}", line);
    }

    let patches = minecraft::archive::join(&root, MultiMcLayout::PATCHES);
    for patch in view.list(&patches) {
        println!("Patch:        {}", minecraft::archive::file_name(&patch));
    }
    if let Some(notes) = manifest.notes.as_deref().filter(|n| !n.is_empty()) {
        println!();
        println!("{}", notes);
    }
    Ok(())
}

/// The loaders an install of `manifest` would request.
fn loader_lines(manifest: &MultiMcInstanceConfiguration) -> Vec<String> {
    let mut builder = GameBuilder::new(&manifest.name, &manifest.game_version);
    multimc::resolve_loaders(manifest.mmc_pack.as_ref(), &mut builder);
    builder
        .requested_versions()
        .iter()
        .map(|(loader, version)| format!("{} {}", loader, version))
        .collect()
}

fn list(game_dir: &Path) -> Result<(), InstallError> {
    let repository = GameRepository::new(game_dir);
    for name in repository.list_versions()? {
        let managed = if repository.modpack_configuration(&name).exists() {
            " (modpack)"
        } else {
            ""
        };
        println!("{}{}", name, managed);
    }
    Ok(())
}

fn configure(
    data_dir: &Path,
    mut config: InstallerSettings,
    game_dir: Option<PathBuf>,
    encoding: Option<ArchiveEncoding>,
    verbose_logging: Option<bool>,
) -> Result<(), InstallError> {
    let changed = game_dir.is_some() || encoding.is_some() || verbose_logging.is_some();
    if let Some(game_dir) = game_dir {
        config.game_directory = Some(std::path::absolute(game_dir)?.to_string_lossy().to_string());
    }
    if let Some(encoding) = encoding {
        config.archive_encoding = encoding;
    }
    if let Some(verbose_logging) = verbose_logging {
        config.verbose_logging = verbose_logging;
    }
    if changed {
        settings::save_settings(data_dir, &config)?;
        log::info!("Saved settings to {}", data_dir.display());
    }

    println!("Game directory: {}", config.game_directory(data_dir).display());
    println!("Encoding:       {}", config.archive_encoding);
    println!("Verbose:        {}", config.verbose_logging);
    Ok(())
}
