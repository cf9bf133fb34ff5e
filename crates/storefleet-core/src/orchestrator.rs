//! Store lifecycle orchestration.
//!
//! ```text
//!   create ──► Provisioning ──refresh(ready)──► Ready
//!                  │    ▲                         │
//!   install/isolation   └──refresh(not ready)─────┘
//!       failure │
//!               ▼
//!             Failed ──create (reclaim)──► Provisioning
//!
//!   delete: any state ──► removed
//! ```
//!
//! The registry row is written before any cluster call, so an interrupted
//! create still leaves a discoverable `Provisioning` record. Failures after
//! that point are recorded on the row as well as returned.

use std::sync::Arc;

use crate::backend::ClusterBackend;
use crate::config::Config;
use crate::error::{Result, StoreError};
use crate::installer;
use crate::isolation;
use crate::paths::normalize_store_name;
use crate::readiness::ReadinessChecker;
use crate::registry::{Insertion, Registry};
use crate::types::{
    DeleteOutcome, RefreshOutcome, StoreRecord, StoreStatus, TeardownReport,
};

pub struct Orchestrator {
    registry: Registry,
    backend: Arc<dyn ClusterBackend>,
    readiness: Arc<dyn ReadinessChecker>,
    config: Config,
}

impl Orchestrator {
    pub fn new(
        registry: Registry,
        backend: Arc<dyn ClusterBackend>,
        readiness: Arc<dyn ReadinessChecker>,
        config: Config,
    ) -> Self {
        Self {
            registry,
            backend,
            readiness,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // -----------------------------------------------------------------------
    // create
    // -----------------------------------------------------------------------

    /// Register the store and provision it.
    ///
    /// Idempotent: an existing `Provisioning` or `Ready` record is returned
    /// unchanged without touching the cluster. A `Failed` record is reclaimed
    /// and provisioned again.
    pub fn create(&self, name: &str) -> Result<StoreRecord> {
        let id = normalize_store_name(name)?;

        let fresh = StoreRecord::provisioning(id, &self.config.engine, &self.config.domain);
        match self.registry.create_if_absent(&fresh)? {
            Insertion::Created(_) => {
                tracing::info!(store = id, "store registered");
            }
            Insertion::Existing(existing) if existing.status != StoreStatus::Failed => {
                tracing::debug!(store = id, status = %existing.status, "store already exists");
                return Ok(existing);
            }
            Insertion::Existing(_) => {
                if !self.registry.reclaim_failed(id)? {
                    // Another caller reclaimed it first, or it changed under us.
                    return self.registry.get(id);
                }
                tracing::info!(store = id, "retrying provisioning of failed store");
            }
        }

        if let Err(e) = self.provision(id) {
            let detail = e.to_string();
            tracing::warn!(store = id, error = %detail, "provisioning failed");
            if let Err(reg) = self
                .registry
                .update_status(id, StoreStatus::Failed, Some(&detail))
            {
                tracing::warn!(store = id, error = %reg, "could not record provisioning failure");
            }
            return Err(e);
        }

        tracing::info!(store = id, "install triggered");
        self.registry.get(id)
    }

    fn provision(&self, id: &str) -> Result<()> {
        isolation::apply(self.backend.as_ref(), id, &self.config.isolation)?;
        installer::install(self.backend.as_ref(), id, &self.config)
    }

    // -----------------------------------------------------------------------
    // refresh
    // -----------------------------------------------------------------------

    /// Probe the workload and fold the result into the registry.
    ///
    /// Probe failures never surface as errors; they come back as a warning
    /// with the status left as it was.
    pub fn refresh(&self, name: &str) -> Result<RefreshOutcome> {
        let current = self.registry.get(known_id(name)?)?;

        match self.readiness.check(&current.id) {
            Ok(readiness) => {
                let status = readiness.status();
                self.registry.update_status(&current.id, status, None)?;
                if status != current.status {
                    tracing::info!(store = %current.id, from = %current.status, to = %status, "status changed");
                }
                Ok(RefreshOutcome {
                    id: current.id,
                    status,
                    warning: None,
                })
            }
            Err(e) => {
                let warning = e.to_string();
                tracing::warn!(store = %current.id, warning = %warning, "readiness probe failed");
                self.registry.record_error(&current.id, &warning)?;
                Ok(RefreshOutcome {
                    id: current.id,
                    status: current.status,
                    warning: Some(warning),
                })
            }
        }
    }

    // -----------------------------------------------------------------------
    // delete
    // -----------------------------------------------------------------------

    /// Tear the store down and forget it.
    ///
    /// Cluster cleanup is best-effort: each failure lands in the returned
    /// outcome's warnings and the row is removed regardless.
    ///
    /// A name that could never have been created is not handed to the
    /// cluster tools at all.
    pub fn delete(&self, name: &str) -> Result<DeleteOutcome> {
        let (id, report) = match normalize_store_name(name) {
            Ok(id) => (id, self.teardown(id)),
            Err(e) => {
                tracing::warn!(error = %e, "skipping cluster teardown");
                (name.trim(), TeardownReport::default())
            }
        };
        if !report.is_clean() {
            tracing::warn!(store = id, warnings = ?report.warnings(), "teardown incomplete");
        }
        let existed = self.registry.delete(id)?;
        tracing::info!(store = id, existed, "store deleted");
        Ok(DeleteOutcome::new(id, &report))
    }

    fn teardown(&self, id: &str) -> TeardownReport {
        TeardownReport {
            uninstall_error: self
                .backend
                .uninstall_release(id, id)
                .err()
                .map(|e| e.to_string()),
            namespace_error: self
                .backend
                .delete_namespace(id)
                .err()
                .map(|e| e.to_string()),
        }
    }

    // -----------------------------------------------------------------------
    // reads
    // -----------------------------------------------------------------------

    pub fn get(&self, name: &str) -> Result<StoreRecord> {
        self.registry.get(known_id(name)?)
    }

    pub fn list(&self) -> Result<Vec<StoreRecord>> {
        self.registry.list()
    }
}

/// Normalize a lookup key. Invalid names cannot have been registered, so
/// they are reported as not found.
fn known_id(name: &str) -> Result<&str> {
    normalize_store_name(name).map_err(|_| StoreError::StoreNotFound(name.trim().to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeBackend, ScriptedReadiness};
    use crate::types::Readiness;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        backend: Arc<FakeBackend>,
        readiness: Arc<ScriptedReadiness>,
        orch: Orchestrator,
    }

    fn fixture() -> Fixture {
        fixture_with(FakeBackend::default())
    }

    fn fixture_with(backend: FakeBackend) -> Fixture {
        let dir = TempDir::new().unwrap();
        let values = crate::paths::default_values_path(dir.path());
        std::fs::create_dir_all(values.parent().unwrap()).unwrap();
        std::fs::write(&values, "wordpressUsername: admin\n").unwrap();

        let config = Config {
            base_dir: dir.path().to_path_buf(),
            ..Config::default()
        };
        let registry = Registry::open(&dir.path().join("stores.db")).unwrap();
        let backend = Arc::new(backend);
        let readiness = Arc::new(ScriptedReadiness::default());
        let orch = Orchestrator::new(registry, backend.clone(), readiness.clone(), config);
        Fixture {
            _dir: dir,
            backend,
            readiness,
            orch,
        }
    }

    #[test]
    fn create_registers_provisioning_store() {
        let f = fixture();
        let rec = f.orch.create("store-demo-2").unwrap();
        assert_eq!(rec.id, "store-demo-2");
        assert_eq!(rec.status, StoreStatus::Provisioning);
        assert_eq!(rec.engine, "woocommerce");
        assert_eq!(rec.url, "http://store-demo-2.localtest.me");
        assert!(rec.last_error.is_none());
        assert_eq!(f.backend.installs(), 1);
        assert_eq!(
            f.backend.calls(),
            vec![
                "create-namespace store-demo-2",
                "apply-manifests store-demo-2",
                "install store-demo-2",
            ]
        );
    }

    #[test]
    fn create_twice_returns_identical_record_without_reinstall() {
        let f = fixture();
        let first = f.orch.create("store-demo-2").unwrap();
        let second = f.orch.create("store-demo-2").unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
        assert_eq!(f.backend.installs(), 1);
    }

    #[test]
    fn create_trims_surrounding_whitespace() {
        let f = fixture();
        let rec = f.orch.create("  shop-1 ").unwrap();
        assert_eq!(rec.id, "shop-1");
    }

    #[test]
    fn blank_names_are_rejected_before_any_effect() {
        let f = fixture();
        for name in ["", "   ", "\t\n"] {
            let err = f.orch.create(name).unwrap_err();
            assert!(matches!(err, StoreError::InvalidName(_)), "{name:?}: {err:?}");
        }
        assert!(f.orch.list().unwrap().is_empty());
        assert!(f.backend.calls().is_empty());
    }

    #[test]
    fn invalid_names_are_rejected() {
        let f = fixture();
        assert!(f.orch.create("Bad_Name").is_err());
        assert!(f.orch.list().unwrap().is_empty());
        assert!(f.backend.calls().is_empty());
    }

    #[test]
    fn install_failure_marks_record_failed_with_diagnostic() {
        let f = fixture_with(FakeBackend::failing_install("timeout waiting for pods"));
        let err = f.orch.create("store-demo-2").unwrap_err();
        assert_eq!(err.to_string(), "timeout waiting for pods");

        let rec = f.orch.get("store-demo-2").unwrap();
        assert_eq!(rec.status, StoreStatus::Failed);
        assert_eq!(rec.last_error.as_deref(), Some("timeout waiting for pods"));
    }

    #[test]
    fn isolation_failure_skips_install_and_marks_failed() {
        let f = fixture_with(FakeBackend::failing_apply("quota rejected"));
        assert!(f.orch.create("s1").is_err());
        assert_eq!(f.backend.installs(), 0);
        let rec = f.orch.get("s1").unwrap();
        assert_eq!(rec.status, StoreStatus::Failed);
        assert_eq!(rec.last_error.as_deref(), Some("quota rejected"));
    }

    #[test]
    fn missing_values_file_marks_failed() {
        let f = fixture();
        let values = crate::paths::default_values_path(&f.orch.config().base_dir);
        std::fs::remove_file(values).unwrap();

        let err = f.orch.create("s1").unwrap_err();
        assert!(matches!(err, StoreError::ValuesMissing { .. }));
        assert_eq!(f.backend.installs(), 0);
        let rec = f.orch.get("s1").unwrap();
        assert_eq!(rec.status, StoreStatus::Failed);
        assert!(rec.last_error.unwrap().contains("values file not found"));
    }

    #[test]
    fn create_on_failed_store_retries_and_keeps_created_at() {
        let f = fixture_with(FakeBackend::failing_install("boom"));
        f.orch.create("s1").unwrap_err();
        let failed = f.orch.get("s1").unwrap();

        f.backend.heal();
        let retried = f.orch.create("s1").unwrap();
        assert_eq!(retried.status, StoreStatus::Provisioning);
        assert!(retried.last_error.is_none());
        assert_eq!(retried.created_at, failed.created_at);
        assert_eq!(f.backend.installs(), 2);
    }

    #[test]
    fn refresh_ready_sets_ready_and_clears_error() {
        let f = fixture();
        f.orch.create("store-demo-2").unwrap();
        f.readiness.push(Err(StoreError::Probe("connection refused".into())));
        f.orch.refresh("store-demo-2").unwrap();
        assert!(f.orch.get("store-demo-2").unwrap().last_error.is_some());

        f.readiness.push(Ok(Readiness::Ready));
        let out = f.orch.refresh("store-demo-2").unwrap();
        assert_eq!(out.status, StoreStatus::Ready);
        assert!(out.warning.is_none());

        let rec = f.orch.get("store-demo-2").unwrap();
        assert_eq!(rec.status, StoreStatus::Ready);
        assert!(rec.last_error.is_none());
    }

    #[test]
    fn refresh_not_ready_or_absent_is_provisioning() {
        let f = fixture();
        f.orch.create("s1").unwrap();

        f.readiness.push(Ok(Readiness::Ready));
        f.orch.refresh("s1").unwrap();

        f.readiness.push(Ok(Readiness::NotReady));
        assert_eq!(f.orch.refresh("s1").unwrap().status, StoreStatus::Provisioning);

        f.readiness.push(Ok(Readiness::Absent));
        assert_eq!(f.orch.refresh("s1").unwrap().status, StoreStatus::Provisioning);
    }

    #[test]
    fn refresh_recovers_failed_store() {
        let f = fixture_with(FakeBackend::failing_install("boom"));
        f.orch.create("s1").unwrap_err();
        f.readiness.push(Ok(Readiness::Ready));
        assert_eq!(f.orch.refresh("s1").unwrap().status, StoreStatus::Ready);
    }

    #[test]
    fn probe_failure_is_a_warning_and_keeps_status() {
        let f = fixture();
        f.orch.create("s1").unwrap();
        f.readiness.push(Ok(Readiness::Ready));
        f.orch.refresh("s1").unwrap();

        f.readiness.push(Err(StoreError::Probe("api unreachable".into())));
        let out = f.orch.refresh("s1").unwrap();
        assert_eq!(out.status, StoreStatus::Ready);
        assert!(out.warning.unwrap().contains("api unreachable"));
        assert_eq!(f.orch.get("s1").unwrap().status, StoreStatus::Ready);
    }

    #[test]
    fn refresh_unknown_store_is_not_found_and_creates_nothing() {
        let f = fixture();
        let err = f.orch.refresh("nonexistent").unwrap_err();
        assert!(matches!(err, StoreError::StoreNotFound(_)));
        assert!(f.orch.list().unwrap().is_empty());
        assert_eq!(f.readiness.calls(), 0);
    }

    #[test]
    fn delete_removes_row_even_when_teardown_fails() {
        let f = fixture_with(FakeBackend::failing_teardown());
        f.orch.create("store-demo-2").unwrap();

        let out = f.orch.delete("store-demo-2").unwrap();
        assert_eq!(out.status, "deleted");
        assert_eq!(out.store_name, "store-demo-2");
        assert_eq!(out.teardown_warnings.len(), 2);
        assert!(matches!(
            f.orch.get("store-demo-2"),
            Err(StoreError::StoreNotFound(_))
        ));
    }

    #[test]
    fn delete_clean_teardown_has_no_warnings() {
        let f = fixture();
        f.orch.create("s1").unwrap();
        let out = f.orch.delete("s1").unwrap();
        assert!(out.teardown_warnings.is_empty());
        assert!(f
            .backend
            .calls()
            .ends_with(&["uninstall s1".to_string(), "delete-namespace s1".to_string()]));
    }

    #[test]
    fn delete_unknown_store_still_succeeds() {
        let f = fixture();
        let out = f.orch.delete("ghost").unwrap();
        assert_eq!(out.status, "deleted");
    }

    #[test]
    fn delete_never_passes_invalid_names_to_the_cluster() {
        let f = fixture();
        for name in ["--all", "-A", "a b", "", "kube-system --force"] {
            let out = f.orch.delete(name).unwrap();
            assert_eq!(out.status, "deleted");
            assert!(out.teardown_warnings.is_empty());
        }
        assert!(f.backend.calls().is_empty(), "{:?}", f.backend.calls());
    }

    #[test]
    fn lookups_trim_names_like_create() {
        let f = fixture();
        f.orch.create(" s1 ").unwrap();
        assert_eq!(f.orch.get(" s1\t").unwrap().id, "s1");

        f.readiness.push(Ok(Readiness::Ready));
        assert_eq!(f.orch.refresh(" s1 ").unwrap().status, StoreStatus::Ready);

        let out = f.orch.delete(" s1 ").unwrap();
        assert_eq!(out.store_name, "s1");
        assert!(f.backend.calls().contains(&"delete-namespace s1".to_string()));
        assert!(matches!(f.orch.get("s1"), Err(StoreError::StoreNotFound(_))));
    }

    #[test]
    fn invalid_lookup_names_are_not_found() {
        let f = fixture();
        assert!(matches!(f.orch.get("--all"), Err(StoreError::StoreNotFound(_))));
        assert!(matches!(
            f.orch.refresh("Bad_Name"),
            Err(StoreError::StoreNotFound(_))
        ));
        assert_eq!(f.readiness.calls(), 0);
    }

    #[test]
    fn install_failure_is_returned_even_if_row_vanished() {
        let f = fixture_with(FakeBackend::failing_install("timeout waiting for pods"));
        let db = f._dir.path().join("stores.db");
        f.backend.on_install(move || {
            Registry::open(&db).unwrap().delete("s1").unwrap();
        });

        let err = f.orch.create("s1").unwrap_err();
        assert_eq!(err.to_string(), "timeout waiting for pods");
        assert!(matches!(f.orch.get("s1"), Err(StoreError::StoreNotFound(_))));
    }

    #[test]
    fn list_is_newest_first() {
        let f = fixture();
        for id in ["a", "b", "c"] {
            f.orch.create(id).unwrap();
        }
        let list = f.orch.list().unwrap();
        assert_eq!(list.len(), 3);
        for pair in list.windows(2) {
            assert!(pair[0].created_at >= pair[1].created_at);
        }
    }

    #[test]
    fn concurrent_creates_install_once() {
        let f = fixture();
        let orch = Arc::new(f.orch);
        let handles: Vec<_> = (0..6)
            .map(|_| {
                let orch = Arc::clone(&orch);
                std::thread::spawn(move || orch.create("race").unwrap())
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap().id, "race");
        }
        assert_eq!(f.backend.installs(), 1);
    }
}
