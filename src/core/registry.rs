//! Per-module logger configuration
//!
//! A [`LoggerRegistry`] holds a default [`Config`] plus per-module
//! overrides and hands out loggers. Each module's writer and encoder are
//! built once, on first use, and shared by every logger for that module
//! until its configuration changes.

use super::config::{Config, Configs};
use super::error::Result;
use super::logger::{Binding, Logger};
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

type BindingCell = Arc<OnceCell<Arc<Binding>>>;

#[derive(Default)]
pub struct LoggerRegistry {
    default: RwLock<Config>,
    modules: RwLock<HashMap<String, Config>>,
    bindings: DashMap<String, BindingCell>,
}

impl std::fmt::Debug for LoggerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggerRegistry")
            .field("default", &*self.default.read())
            .field("modules", &self.modules.read().keys().collect::<Vec<_>>())
            .field("bound", &self.bindings.len())
            .finish()
    }
}

impl LoggerRegistry {
    pub fn new(default: Config) -> Self {
        Self {
            default: RwLock::new(default),
            modules: RwLock::new(HashMap::new()),
            bindings: DashMap::new(),
        }
    }

    pub fn from_configs(configs: Configs) -> Self {
        Self {
            default: RwLock::new(configs.default),
            modules: RwLock::new(configs.modules),
            bindings: DashMap::new(),
        }
    }

    /// Read configs from a `.json`, `.yaml` or `.yml` file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::from_configs(Configs::load(path)?))
    }

    /// Replace every config at once
    ///
    /// Loggers already handed out keep the writer they were built with.
    pub fn configure(&self, configs: Configs) {
        *self.default.write() = configs.default;
        *self.modules.write() = configs.modules;
        self.bindings.clear();
    }

    pub fn set_default(&self, config: Config) {
        *self.default.write() = config;
        self.bindings.clear();
    }

    pub fn set_module_config(&self, module: &str, config: Config) {
        self.modules.write().insert(module.to_string(), config);
        self.bindings.remove(module);
    }

    /// The effective config for `module`
    pub fn module_config(&self, module: &str) -> Config {
        match self.modules.read().get(module) {
            Some(config) => config.clone(),
            None => self.default.read().clone(),
        }
    }

    /// A logger for `module`
    ///
    /// The first call for a module opens its writer; a failure is returned
    /// and the next call tries again.
    pub fn logger(&self, module: &str) -> Result<Logger> {
        let cell = self
            .bindings
            .entry(module.to_string())
            .or_default()
            .value()
            .clone();
        let binding = cell.get_or_try_init(|| {
            Binding::from_config(&self.module_config(module)).map(Arc::new)
        })?;
        Ok(Logger::from_binding(module, Arc::clone(binding)))
    }
}
