use simplelog::{
    ColorChoice, CombinedLogger, Config as LogConfig, ConfigBuilder, LevelFilter, SharedLogger, TermLogger,
    TerminalMode, WriteLogger,
};
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use crate::minecraft::error::InstallError;

const LOG_FILE: &str = "installer.log";

pub fn log_path(data_dir: &Path) -> PathBuf {
    data_dir.join(LOG_FILE)
}

fn terminal_level(verbose: bool) -> LevelFilter {
    if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

/// Logs to the terminal and to `installer.log` in the data directory.
///
/// The log file always records debug output. When the file cannot be created
/// only the terminal logger is installed.
pub fn init_logger(data_dir: &Path, verbose: bool) -> Result<(), InstallError> {
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        terminal_level(verbose),
        ConfigBuilder::new().add_filter_ignore_str("zip").build(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];

    let path = log_path(data_dir);
    let file = fs::create_dir_all(data_dir).and_then(|_| File::create(&path));
    let file_error = match file {
        Ok(file) => {
            loggers.push(WriteLogger::new(LevelFilter::Debug, LogConfig::default(), file));
            None
        }
        Err(e) => Some(e),
    };

    CombinedLogger::init(loggers).map_err(|e| InstallError::Logger(e.to_string()))?;

    if let Some(e) = file_error {
        log::warn!("Could not open {}: {}", path.display(), e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_raises_terminal_level() {
        assert_eq!(terminal_level(false), LevelFilter::Info);
        assert_eq!(terminal_level(true), LevelFilter::Debug);
    }

    #[test]
    fn log_lives_in_data_dir() {
        assert_eq!(log_path(Path::new("/data")), PathBuf::from("/data/installer.log"));
    }
}
