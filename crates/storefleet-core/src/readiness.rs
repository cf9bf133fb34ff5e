//! Readiness probing for a store's workload pod.
//!
//! Two interchangeable strategies sit behind [`ReadinessChecker`]: the
//! Kubernetes API via `kube`, and `kubectl get pods -o json` parsed as a pod
//! list. Both funnel into [`pod_readiness`], so the mapping from pods to
//! readiness is identical whichever one is configured.

use std::sync::Arc;

use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, ListParams};
use serde::Deserialize;
use tokio::runtime::Handle;

use crate::backend::run_tool;
use crate::config::{ReadinessConfig, ReadinessStrategy};
use crate::error::{Result, StoreError};
use crate::types::Readiness;

pub trait ReadinessChecker: Send + Sync {
    /// Inspect the first pod matching the store's component label.
    fn check(&self, store_id: &str) -> Result<Readiness>;
}

/// Ready iff the first pod has a `Ready` condition with status `"True"`.
pub fn pod_readiness(pods: &[Pod]) -> Readiness {
    let Some(pod) = pods.first() else {
        return Readiness::Absent;
    };
    let ready = pod
        .status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .map(|conds| {
            conds
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
        .unwrap_or(false);
    if ready {
        Readiness::Ready
    } else {
        Readiness::NotReady
    }
}

/// Build the checker named by `config.strategy`.
///
/// `handle` drives the API strategy's futures; it is unused by `kubectl`.
pub fn checker_for(config: &ReadinessConfig, handle: Handle) -> Arc<dyn ReadinessChecker> {
    match config.strategy {
        ReadinessStrategy::Api => Arc::new(ApiReadinessChecker::new(
            config.label_selector.clone(),
            handle,
        )),
        ReadinessStrategy::Kubectl => Arc::new(KubectlReadinessChecker::new(
            "kubectl",
            config.label_selector.clone(),
        )),
    }
}

// ---------------------------------------------------------------------------
// ApiReadinessChecker
// ---------------------------------------------------------------------------

/// Lists pods through the Kubernetes API.
///
/// Credentials come from the in-cluster service account when present and
/// from the local kubeconfig otherwise. `check` blocks on `handle`, so it must
/// not be called from an async worker thread (use `spawn_blocking`).
pub struct ApiReadinessChecker {
    label_selector: String,
    handle: Handle,
}

impl ApiReadinessChecker {
    pub fn new(label_selector: impl Into<String>, handle: Handle) -> Self {
        Self {
            label_selector: label_selector.into(),
            handle,
        }
    }

    async fn client() -> Result<kube::Client> {
        let config = match kube::Config::incluster() {
            Ok(c) => c,
            Err(in_cluster) => {
                tracing::debug!(error = %in_cluster, "no in-cluster config, using kubeconfig");
                kube::Config::from_kubeconfig(&kube::config::KubeConfigOptions::default())
                    .await
                    .map_err(|e| StoreError::Probe(format!("no usable kube config: {e}")))?
            }
        };
        kube::Client::try_from(config).map_err(|e| StoreError::Probe(e.to_string()))
    }

    async fn probe(&self, store_id: &str) -> Result<Readiness> {
        let client = Self::client().await?;
        let pods: Api<Pod> = Api::namespaced(client, store_id);
        let list = pods
            .list(&ListParams::default().labels(&self.label_selector))
            .await
            .map_err(|e| StoreError::Probe(e.to_string()))?;
        Ok(pod_readiness(&list.items))
    }
}

impl ReadinessChecker for ApiReadinessChecker {
    fn check(&self, store_id: &str) -> Result<Readiness> {
        self.handle.block_on(self.probe(store_id))
    }
}

// ---------------------------------------------------------------------------
// KubectlReadinessChecker
// ---------------------------------------------------------------------------

/// Shells out to `kubectl get pods` and parses its JSON output.
pub struct KubectlReadinessChecker {
    kubectl: String,
    label_selector: String,
}

#[derive(Deserialize)]
struct PodList {
    #[serde(default)]
    items: Vec<Pod>,
}

impl KubectlReadinessChecker {
    pub fn new(kubectl: impl Into<String>, label_selector: impl Into<String>) -> Self {
        Self {
            kubectl: kubectl.into(),
            label_selector: label_selector.into(),
        }
    }

    fn args(&self, store_id: &str) -> Vec<String> {
        vec![
            "get".into(),
            "pods".into(),
            "-n".into(),
            store_id.into(),
            "-l".into(),
            self.label_selector.clone(),
            "-o".into(),
            "json".into(),
        ]
    }
}

/// Parse `kubectl get pods -o json` output.
pub fn parse_pod_list(output: &str) -> Result<Readiness> {
    let list: PodList = serde_json::from_str(output)
        .map_err(|e| StoreError::Probe(format!("unreadable kubectl output: {e}")))?;
    Ok(pod_readiness(&list.items))
}

impl ReadinessChecker for KubectlReadinessChecker {
    fn check(&self, store_id: &str) -> Result<Readiness> {
        let out = run_tool(&self.kubectl, &self.args(store_id), None)
            .map_err(|e| StoreError::Probe(e.to_string()))?;
        parse_pod_list(&out)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
