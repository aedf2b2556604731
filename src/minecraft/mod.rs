pub mod agent;
pub mod archive;
pub mod builder;
pub mod error;
pub mod instances;
pub mod logger;
pub mod modpack;
pub mod multimc;
pub mod multimc_manifest;
pub mod settings;
pub mod task;
pub mod versions;

pub use error::InstallError;
pub use instances::GameRepository;
pub use multimc::{install_modpack, MultiMcModpackInstallTask};
