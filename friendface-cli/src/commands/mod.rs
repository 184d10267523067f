//! CLI command implementations

pub mod config;
pub mod doctor;
pub mod logs;
pub mod show;
pub mod status;
pub mod sync;
pub mod users;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use friendface_core::config::DATA_DIR_ENV;
use friendface_core::services::{EntryPoint, LogEvent, LoggingService};
use friendface_core::FriendFaceContext;

/// Get the logging service for CLI operations
///
/// Returns None if logging fails to initialize (shouldn't block operations)
pub fn get_logger() -> Option<Arc<LoggingService>> {
    let data_dir = get_data_dir().ok()?;
    std::fs::create_dir_all(&data_dir).ok()?;
    match LoggingService::new(&data_dir, EntryPoint::Cli, env!("CARGO_PKG_VERSION")) {
        Ok(service) => Some(Arc::new(service)),
        Err(e) => {
            tracing::debug!(error = %e, "event log unavailable");
            None
        }
    }
}

/// Log an event, ignoring any errors (logging should never break the app)
pub fn log_event(logger: Option<&LoggingService>, event: LogEvent) {
    if let Some(l) = logger {
        let _ = l.log(event);
    }
}

/// Data directory from `FRIENDFACE_DIR` or `~/.friendface`
pub fn get_data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        if !dir.is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    let home = dirs::home_dir().context("Could not find home directory")?;
    Ok(home.join(".friendface"))
}

/// Open the cache and build the pipeline
pub fn get_context() -> Result<FriendFaceContext> {
    let data_dir = get_data_dir()?;

    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory: {:?}", data_dir))?;

    FriendFaceContext::new(&data_dir).context("Failed to initialize friendface context")
}
