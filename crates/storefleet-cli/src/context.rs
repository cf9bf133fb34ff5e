use anyhow::Context;
use std::path::PathBuf;
use std::sync::Arc;
use storefleet_core::backend::CliBackend;
use storefleet_core::config::Config;
use storefleet_core::registry::Registry;
use storefleet_core::{paths, readiness, Orchestrator};

/// Command-line values layered over the config file.
pub struct Overrides {
    pub config: Option<PathBuf>,
    pub db: Option<PathBuf>,
    pub values: Option<PathBuf>,
}

impl Overrides {
    pub fn config_path(&self) -> PathBuf {
        match &self.config {
            Some(p) => p.clone(),
            None => paths::config_path(&std::env::current_dir().unwrap_or_else(|_| ".".into())),
        }
    }

    /// Load the config file (defaults when absent) and apply flag overrides.
    pub fn load_config(&self) -> anyhow::Result<Config> {
        let path = self.config_path();
        let mut config = Config::load(&path)
            .with_context(|| format!("failed to load config from {}", path.display()))?;
        if let Some(db) = &self.db {
            config.registry_path = db.clone();
        }
        if let Some(values) = &self.values {
            config.values_file = Some(values.clone());
        }
        Ok(config)
    }
}

/// Wire the orchestrator to the real cluster tools.
///
/// `handle` must outlive the orchestrator when the API readiness strategy is
/// configured.
pub fn orchestrator(config: Config, handle: tokio::runtime::Handle) -> anyhow::Result<Orchestrator> {
    let registry = Registry::open(&config.registry_path).with_context(|| {
        format!(
            "failed to open registry at {}",
            config.registry_path.display()
        )
    })?;
    let checker = readiness::checker_for(&config.readiness, handle);
    Ok(Orchestrator::new(
        registry,
        Arc::new(CliBackend::default()),
        checker,
        config,
    ))
}
