use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::StoreError;

// ---------------------------------------------------------------------------
// StoreStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoreStatus {
    Provisioning,
    Ready,
    Failed,
}

impl StoreStatus {
    pub fn all() -> &'static [StoreStatus] {
        &[
            StoreStatus::Provisioning,
            StoreStatus::Ready,
            StoreStatus::Failed,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StoreStatus::Provisioning => "Provisioning",
            StoreStatus::Ready => "Ready",
            StoreStatus::Failed => "Failed",
        }
    }
}

impl fmt::Display for StoreStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StoreStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Provisioning" => Ok(StoreStatus::Provisioning),
            "Ready" => Ok(StoreStatus::Ready),
            "Failed" => Ok(StoreStatus::Failed),
            _ => Err(StoreError::Registry(format!("unknown store status '{s}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// StoreRecord
// ---------------------------------------------------------------------------

/// One row of the `stores` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreRecord {
    pub id: String,
    pub status: StoreStatus,
    pub engine: String,
    pub url: String,
    /// Unix seconds. Written once at insertion.
    pub created_at: i64,
    pub last_error: Option<String>,
}

impl StoreRecord {
    /// A fresh `Provisioning` record stamped with the current time.
    pub fn provisioning(id: &str, engine: &str, domain: &str) -> Self {
        Self {
            id: id.to_string(),
            status: StoreStatus::Provisioning,
            engine: engine.to_string(),
            url: store_url(id, domain),
            created_at: chrono::Utc::now().timestamp(),
            last_error: None,
        }
    }
}

pub fn store_hostname(id: &str, domain: &str) -> String {
    format!("{id}.{domain}")
}

pub fn store_url(id: &str, domain: &str) -> String {
    format!("http://{}", store_hostname(id, domain))
}

// ---------------------------------------------------------------------------
// Readiness
// ---------------------------------------------------------------------------

/// What the prober saw for a store's workload pod.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    Ready,
    NotReady,
    /// No pod matched the selector.
    Absent,
}

impl Readiness {
    pub fn status(self) -> StoreStatus {
        match self {
            Readiness::Ready => StoreStatus::Ready,
            Readiness::NotReady | Readiness::Absent => StoreStatus::Provisioning,
        }
    }
}

// ---------------------------------------------------------------------------
// Operation results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshOutcome {
    pub id: String,
    pub status: StoreStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Failures swallowed during teardown. Empty when both steps succeeded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeardownReport {
    pub uninstall_error: Option<String>,
    pub namespace_error: Option<String>,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.uninstall_error.is_none() && self.namespace_error.is_none()
    }

    pub fn warnings(&self) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(e) = &self.uninstall_error {
            out.push(format!("uninstall release: {e}"));
        }
        if let Some(e) = &self.namespace_error {
            out.push(format!("delete namespace: {e}"));
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOutcome {
    /// Always `"deleted"`.
    pub status: String,
    pub store_name: String,
    pub teardown_warnings: Vec<String>,
}

impl DeleteOutcome {
    pub fn new(store_name: &str, report: &TeardownReport) -> Self {
        Self {
            status: "deleted".to_string(),
            store_name: store_name.to_string(),
            teardown_warnings: report.warnings(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
