//! Process-wide registry handle
//!
//! For programs that prefer `global::logger("db")` over passing a
//! [`LoggerRegistry`] around. The registry starts with the default
//! [`Config`] (info level, text to stdout) until configured.

use crate::core::{Config, Configs, Logger, LoggerRegistry, Result};
use once_cell::sync::Lazy;
use std::path::Path;

static REGISTRY: Lazy<LoggerRegistry> = Lazy::new(|| LoggerRegistry::new(Config::default()));

pub fn registry() -> &'static LoggerRegistry {
    &REGISTRY
}

/// Replace the global configuration
pub fn configure(configs: Configs) {
    registry().configure(configs);
}

/// Replace the global configuration from a `.json`, `.yaml` or `.yml` file
pub fn configure_from_file(path: impl AsRef<Path>) -> Result<()> {
    configure(Configs::load(path)?);
    Ok(())
}

/// A logger for `module` from the global registry
///
/// If the module's configuration cannot be applied, the failure is
/// reported on stderr and a stdout text logger is returned instead.
pub fn logger(module: &str) -> Logger {
    match registry().logger(module) {
        Ok(logger) => logger,
        Err(e) => {
            eprintln!(
                "[LOGGER ERROR] Failed to configure logger '{}', falling back to stdout: {}",
                module, e
            );
            Logger::builder(module).build()
        }
    }
}
