//! In-memory stand-ins for the cluster seams, shared by unit and downstream
//! integration tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::backend::{ClusterBackend, InstallRequest};
use crate::error::{Result, StoreError};
use crate::readiness::ReadinessChecker;
use crate::types::Readiness;

type Hook = Box<dyn Fn() + Send + Sync>;

/// Records every call and fails the ones it was told to.
#[derive(Default)]
pub struct FakeBackend {
    install_hook: Mutex<Option<Hook>>,
    calls: Mutex<Vec<String>>,
    installs: AtomicUsize,
    install_error: Mutex<Option<String>>,
    apply_error: Option<String>,
    teardown_fails: AtomicBool,
}

impl FakeBackend {
    pub fn failing_install(message: &str) -> Self {
        Self {
            install_error: Mutex::new(Some(message.to_string())),
            ..Self::default()
        }
    }

    pub fn failing_apply(message: &str) -> Self {
        Self {
            apply_error: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn failing_teardown() -> Self {
        Self {
            teardown_fails: AtomicBool::new(true),
            ..Self::default()
        }
    }

    /// Let subsequent installs succeed.
    pub fn heal(&self) {
        *self.install_error.lock().unwrap() = None;
    }

    /// Run `hook` inside every subsequent install, before it returns.
    pub fn on_install(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.install_hook.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn installs(&self) -> usize {
        self.installs.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn teardown_result(&self, what: &str) -> Result<()> {
        if self.teardown_fails.load(Ordering::SeqCst) {
            Err(StoreError::Backend(format!("{what}: cluster unreachable")))
        } else {
            Ok(())
        }
    }
}

impl ClusterBackend for FakeBackend {
    fn create_namespace(&self, namespace: &str) -> Result<()> {
        self.record(format!("create-namespace {namespace}"));
        Ok(())
    }

    fn apply_manifests(&self, namespace: &str, _manifests: &str) -> Result<()> {
        self.record(format!("apply-manifests {namespace}"));
        match &self.apply_error {
            Some(msg) => Err(StoreError::Backend(msg.clone())),
            None => Ok(()),
        }
    }

    fn install_release(&self, request: &InstallRequest) -> Result<()> {
        self.record(format!("install {}", request.release));
        self.installs.fetch_add(1, Ordering::SeqCst);
        if let Some(hook) = self.install_hook.lock().unwrap().as_ref() {
            hook();
        }
        match self.install_error.lock().unwrap().as_ref() {
            Some(msg) => Err(StoreError::Backend(msg.clone())),
            None => Ok(()),
        }
    }

    fn uninstall_release(&self, release: &str, _namespace: &str) -> Result<()> {
        self.record(format!("uninstall {release}"));
        self.teardown_result("release")
    }

    fn delete_namespace(&self, namespace: &str) -> Result<()> {
        self.record(format!("delete-namespace {namespace}"));
        self.teardown_result("namespace")
    }
}

/// Replays queued results; reports `NotReady` once the queue is empty.
#[derive(Default)]
pub struct ScriptedReadiness {
    script: Mutex<VecDeque<Result<Readiness>>>,
    calls: AtomicUsize,
}

impl ScriptedReadiness {
    pub fn push(&self, result: Result<Readiness>) {
        self.script.lock().unwrap().push_back(result);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ReadinessChecker for ScriptedReadiness {
    fn check(&self, _store_id: &str) -> Result<Readiness> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(Readiness::NotReady))
    }
}
