use crate::error::Result;
use crate::paths;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// ReadinessConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessStrategy {
    /// Kubernetes API client (in-cluster credentials, then kubeconfig).
    #[default]
    Api,
    /// `kubectl get pods -o json`.
    Kubectl,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessConfig {
    #[serde(default)]
    pub strategy: ReadinessStrategy,
    #[serde(default = "default_label_selector")]
    pub label_selector: String,
}

fn default_label_selector() -> String {
    "app.kubernetes.io/name=wordpress".to_string()
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            strategy: ReadinessStrategy::default(),
            label_selector: default_label_selector(),
        }
    }
}

// ---------------------------------------------------------------------------
// IsolationPolicy
// ---------------------------------------------------------------------------

/// Namespace-wide ceilings, as Kubernetes quantity strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaConfig {
    pub requests_cpu: String,
    pub requests_memory: String,
    pub limits_cpu: String,
    pub limits_memory: String,
    pub pods: String,
    pub services: String,
    pub persistent_volume_claims: String,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            requests_cpu: "2".into(),
            requests_memory: "4Gi".into(),
            limits_cpu: "4".into(),
            limits_memory: "8Gi".into(),
            pods: "20".into(),
            services: "10".into(),
            persistent_volume_claims: "5".into(),
        }
    }
}

/// Per-container defaults injected by the LimitRange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerDefaults {
    pub default_cpu: String,
    pub default_memory: String,
    pub request_cpu: String,
    pub request_memory: String,
}

impl Default for ContainerDefaults {
    fn default() -> Self {
        Self {
            default_cpu: "500m".into(),
            default_memory: "512Mi".into(),
            request_cpu: "100m".into(),
            request_memory: "128Mi".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IsolationPolicy {
    /// Namespace the ingress controller runs in; its pods may reach the store.
    pub ingress_namespace: String,
    pub quota: QuotaConfig,
    pub container_defaults: ContainerDefaults,
}

impl Default for IsolationPolicy {
    fn default() -> Self {
        Self {
            ingress_namespace: "ingress-nginx".into(),
            quota: QuotaConfig::default(),
            container_defaults: ContainerDefaults::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_registry_path")]
    pub registry_path: PathBuf,
    #[serde(default = "default_engine")]
    pub engine: String,
    #[serde(default = "default_domain")]
    pub domain: String,
    #[serde(default = "default_chart")]
    pub chart: String,
    #[serde(default = "default_ingress_class")]
    pub ingress_class: String,
    #[serde(default = "default_service_type")]
    pub service_type: String,
    /// Helm duration string, e.g. `10m` or `90s`.
    #[serde(default = "default_install_timeout")]
    pub install_timeout: String,
    /// Explicit values file. Takes precedence over the local default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values_file: Option<PathBuf>,
    /// Root that the conventional `infra/local/...` values path hangs off.
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,
    #[serde(default)]
    pub readiness: ReadinessConfig,
    #[serde(default)]
    pub isolation: IsolationPolicy,
}

fn default_registry_path() -> PathBuf {
    PathBuf::from(paths::DEFAULT_REGISTRY_PATH)
}

fn default_engine() -> String {
    "woocommerce".to_string()
}

fn default_domain() -> String {
    "localtest.me".to_string()
}

fn default_chart() -> String {
    "bitnami/wordpress".to_string()
}

fn default_ingress_class() -> String {
    "nginx".to_string()
}

fn default_service_type() -> String {
    "ClusterIP".to_string()
}

fn default_install_timeout() -> String {
    "10m".to_string()
}

fn default_base_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            registry_path: default_registry_path(),
            engine: default_engine(),
            domain: default_domain(),
            chart: default_chart(),
            ingress_class: default_ingress_class(),
            service_type: default_service_type(),
            install_timeout: default_install_timeout(),
            values_file: None,
            base_dir: default_base_dir(),
            readiness: ReadinessConfig::default(),
            isolation: IsolationPolicy::default(),
        }
    }
}

impl Config {
    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(path, data.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        let required = [
            ("engine", &self.engine),
            ("domain", &self.domain),
            ("chart", &self.chart),
            ("ingress_class", &self.ingress_class),
            ("service_type", &self.service_type),
            ("readiness.label_selector", &self.readiness.label_selector),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("'{field}' must not be empty"),
                });
            }
        }

        if !is_helm_duration(&self.install_timeout) {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!(
                    "install_timeout '{}' is not a duration like '10m' or '90s'",
                    self.install_timeout
                ),
            });
        }

        if let Some(values) = &self.values_file {
            if !values.exists() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("values_file '{}' does not exist", values.display()),
                });
            }
        }

        if self.isolation.ingress_namespace.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "isolation.ingress_namespace is empty; ingress traffic will be blocked"
                    .to_string(),
            });
        }

        warnings
    }
}

fn is_helm_duration(s: &str) -> bool {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+h)?(\d+m)?(\d+s)?$").expect("static regex"))
        .is_match(s)
        && !s.is_empty()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
