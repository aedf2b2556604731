use std::path::PathBuf;

/// Every failure an installation can end with.
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    #[error("Version {0} already exists and was not installed from a modpack")]
    ConflictingInstance(String),

    #[error("Version {name} is not a {expected} modpack (found {found}). Cannot update this version.")]
    WrongInstallerType {
        name: String,
        expected: String,
        found: String,
    },

    #[error("Malformed patch {}: {source}", path)]
    MalformedPatch {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{key} not found in {}", file.display())]
    MissingConfigurationKey { key: String, file: PathBuf },

    #[error("Not a valid MultiMC modpack: {0}")]
    InvalidModpack(String),

    #[error("Archive entry not found: {0}")]
    EntryNotFound(String),

    #[error("Unknown archive encoding: {0}")]
    UnknownEncoding(String),

    #[error("Task {task} failed: {source}")]
    TaskFailed {
        task: String,
        #[source]
        source: Box<InstallError>,
    },

    #[error("Worker thread failed: {0}")]
    Join(String),

    #[error("Could not set up logging: {0}")]
    Logger(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl InstallError {
    /// Walks through `TaskFailed` wrappers down to the error that started it.
    pub fn root_cause(&self) -> &InstallError {
        match self {
            InstallError::TaskFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
