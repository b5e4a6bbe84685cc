//! Everything the binary does before a subscriber can write to the run log.

use std::path::Path;

use outreach_common::{Config, logging};
use tracing::error;
use tracing_appender::non_blocking::WorkerGuard;

use crate::CommandError;

/// Loads the configuration and creates the log directory it names.
///
/// # Errors
///
/// Returns an error if the dotenv file is malformed, a setting is invalid,
/// or the log directory cannot be created.
pub fn prepare(env_file: Option<&Path>) -> Result<Config, CommandError> {
    let config = Config::from_env(env_file)?;
    ensure_logs_dir(&config)?;
    Ok(config)
}

/// Creates `config.paths.logs_dir` and any missing parents.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn ensure_logs_dir(config: &Config) -> Result<(), CommandError> {
    let dir = &config.paths.logs_dir;
    std::fs::create_dir_all(dir).map_err(|source| CommandError::LogDir {
        path: dir.clone(),
        source,
    })
}

/// Runs [`prepare`] and installs logging.
///
/// On success the console and `{logs_dir}/{log_file}` layers are installed.
/// On failure only the console layer is, so the error is still reported
/// through the subscriber before it is returned.
///
/// # Errors
///
/// Returns whatever [`prepare`] returns.
pub fn start(
    env_file: Option<&Path>,
    log_file: &str,
) -> Result<(Config, Option<WorkerGuard>), CommandError> {
    match prepare(env_file) {
        Ok(config) => {
            let guard = logging::init(&config.log_level, Some(&config.paths.logs_dir), log_file);
            Ok((config, guard))
        }
        Err(err) => {
            let _ = logging::init("info", None, log_file);
            error!("Startup failed: {err}");
            Err(err)
        }
    }
}
