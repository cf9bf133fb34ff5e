//! Installs a store's workload chart as an atomic helm release.

use std::path::PathBuf;

use crate::backend::{ClusterBackend, InstallRequest};
use crate::config::Config;
use crate::error::{Result, StoreError};
use crate::paths;
use crate::types::store_hostname;

/// Resolve the values file: explicit override first, then the conventional
/// local default. Neither present is an error.
pub fn resolve_values(config: &Config) -> Result<PathBuf> {
    if let Some(explicit) = &config.values_file {
        if explicit.is_file() {
            return Ok(explicit.clone());
        }
        return Err(StoreError::ValuesMissing {
            tried: explicit.display().to_string(),
        });
    }

    let local = paths::default_values_path(&config.base_dir);
    if local.is_file() {
        return Ok(local);
    }
    Err(StoreError::ValuesMissing {
        tried: local.display().to_string(),
    })
}

pub fn build_request(store_id: &str, config: &Config, values_file: PathBuf) -> InstallRequest {
    InstallRequest {
        release: store_id.to_string(),
        namespace: store_id.to_string(),
        chart: config.chart.clone(),
        values_file,
        params: vec![
            (
                "ingress.hostname".to_string(),
                store_hostname(store_id, &config.domain),
            ),
            (
                "ingress.ingressClassName".to_string(),
                config.ingress_class.clone(),
            ),
            ("service.type".to_string(), config.service_type.clone()),
        ],
        atomic: true,
        wait: true,
        timeout: config.install_timeout.clone(),
    }
}

/// Resolve values and run the install. Blocks until helm reports the release
/// healthy or has rolled it back.
pub fn install(backend: &dyn ClusterBackend, store_id: &str, config: &Config) -> Result<()> {
    let values = resolve_values(config)?;
    let request = build_request(store_id, config, values);
    tracing::info!(
        store = store_id,
        chart = %request.chart,
        timeout = %request.timeout,
        "installing release"
    );
    backend.install_release(&request)
}
