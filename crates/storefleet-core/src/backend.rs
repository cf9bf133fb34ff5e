//! The imperative command set the orchestrator drives, and its `kubectl` +
//! `helm` implementation.
//!
//! Every call blocks until the child process exits. Failures carry the tool's
//! own diagnostic text (stderr, falling back to stdout) so it can be stored
//! verbatim as a record's `last_error`.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

use crate::error::{Result, StoreError};

// ---------------------------------------------------------------------------
// InstallRequest
// ---------------------------------------------------------------------------

/// Everything `helm install` needs for one store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRequest {
    pub release: String,
    pub namespace: String,
    pub chart: String,
    pub values_file: PathBuf,
    /// `--set` pairs, in order.
    pub params: Vec<(String, String)>,
    pub atomic: bool,
    pub wait: bool,
    pub timeout: String,
}

// ---------------------------------------------------------------------------
// ClusterBackend
// ---------------------------------------------------------------------------

pub trait ClusterBackend: Send + Sync {
    /// Create the namespace. An existing namespace is success.
    fn create_namespace(&self, namespace: &str) -> Result<()>;

    /// Create-or-update the given YAML documents inside `namespace`.
    fn apply_manifests(&self, namespace: &str, manifests: &str) -> Result<()>;

    fn install_release(&self, request: &InstallRequest) -> Result<()>;

    fn uninstall_release(&self, release: &str, namespace: &str) -> Result<()>;

    fn delete_namespace(&self, namespace: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// CliBackend
// ---------------------------------------------------------------------------

/// Drives the cluster through the `kubectl` and `helm` binaries on `PATH`.
#[derive(Debug, Clone)]
pub struct CliBackend {
    kubectl: String,
    helm: String,
}

impl Default for CliBackend {
    fn default() -> Self {
        Self::new("kubectl", "helm")
    }
}

impl CliBackend {
    pub fn new(kubectl: impl Into<String>, helm: impl Into<String>) -> Self {
        Self {
            kubectl: kubectl.into(),
            helm: helm.into(),
        }
    }
}

impl ClusterBackend for CliBackend {
    fn create_namespace(&self, namespace: &str) -> Result<()> {
        match run_tool(&self.kubectl, &create_namespace_args(namespace), None) {
            Ok(_) => Ok(()),
            Err(StoreError::Backend(msg)) if is_already_exists(&msg) => {
                tracing::debug!(namespace, "namespace already exists");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn apply_manifests(&self, namespace: &str, manifests: &str) -> Result<()> {
        run_tool(&self.kubectl, &apply_args(namespace), Some(manifests)).map(|_| ())
    }

    fn install_release(&self, request: &InstallRequest) -> Result<()> {
        run_tool(&self.helm, &install_args(request), None).map(|_| ())
    }

    fn uninstall_release(&self, release: &str, namespace: &str) -> Result<()> {
        run_tool(&self.helm, &uninstall_args(release, namespace), None).map(|_| ())
    }

    fn delete_namespace(&self, namespace: &str) -> Result<()> {
        run_tool(&self.kubectl, &delete_namespace_args(namespace), None).map(|_| ())
    }
}

// ---------------------------------------------------------------------------
// Argument builders
// ---------------------------------------------------------------------------

// Positional names always follow `--` so they can never be parsed as flags.

pub fn create_namespace_args(namespace: &str) -> Vec<String> {
    vec![
        "create".into(),
        "namespace".into(),
        "--".into(),
        namespace.into(),
    ]
}

pub fn apply_args(namespace: &str) -> Vec<String> {
    vec![
        "apply".into(),
        "-n".into(),
        namespace.into(),
        "-f".into(),
        "-".into(),
    ]
}

pub fn install_args(req: &InstallRequest) -> Vec<String> {
    let mut args = vec![
        "install".to_string(),
        "-n".to_string(),
        req.namespace.clone(),
        "-f".to_string(),
        req.values_file.display().to_string(),
    ];
    for (key, value) in &req.params {
        args.push("--set".to_string());
        args.push(format!("{key}={value}"));
    }
    if req.atomic {
        args.push("--atomic".to_string());
    }
    if req.wait {
        args.push("--wait".to_string());
    }
    args.push("--timeout".to_string());
    args.push(req.timeout.clone());
    args.push("--".to_string());
    args.push(req.release.clone());
    args.push(req.chart.clone());
    args
}

pub fn uninstall_args(release: &str, namespace: &str) -> Vec<String> {
    vec![
        "uninstall".into(),
        "-n".into(),
        namespace.into(),
        "--".into(),
        release.into(),
    ]
}

pub fn delete_namespace_args(namespace: &str) -> Vec<String> {
    vec![
        "delete".into(),
        "namespace".into(),
        "--".into(),
        namespace.into(),
    ]
}

pub fn is_already_exists(message: &str) -> bool {
    message.contains("AlreadyExists") || message.contains("already exists")
}

// ---------------------------------------------------------------------------
// Process invocation
// ---------------------------------------------------------------------------

/// Run `tool` with `args`, optionally feeding `stdin`, and return stdout.
///
/// A non-zero exit becomes `StoreError::Backend` with the diagnostic text.
pub(crate) fn run_tool(tool: &str, args: &[String], stdin: Option<&str>) -> Result<String> {
    let bin = which::which(tool).map_err(|_| StoreError::ToolNotFound(tool.to_string()))?;

    tracing::debug!(tool, args = %args.join(" "), "running cluster command");

    let mut cmd = Command::new(bin);
    cmd.args(args);
    cmd.stdin(if stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    });
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let mut child = cmd
        .spawn()
        .map_err(|e| StoreError::Backend(format!("failed to spawn '{tool}': {e}")))?;

    if let Some(input) = stdin {
        if let Some(mut pipe) = child.stdin.take() {
            pipe.write_all(input.as_bytes()).map_err(|e| {
                StoreError::Backend(format!("failed to write stdin of '{tool}': {e}"))
            })?;
        }
    }

    let output = child
        .wait_with_output()
        .map_err(|e| StoreError::Backend(format!("'{tool}' did not complete: {e}")))?;

    if !output.status.success() {
        return Err(StoreError::Backend(diagnostic(&output)));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn diagnostic(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        return stderr.to_string();
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stdout = stdout.trim();
    if !stdout.is_empty() {
        return stdout.to_string();
    }
    match output.status.code() {
        Some(code) => format!("exit status {code}"),
        None => "terminated by signal".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> InstallRequest {
        InstallRequest {
            release: "store-demo-2".into(),
            namespace: "store-demo-2".into(),
            chart: "bitnami/wordpress".into(),
            values_file: PathBuf::from("/srv/values.yaml"),
            params: vec![
                ("ingress.hostname".into(), "store-demo-2.localtest.me".into()),
                ("ingress.ingressClassName".into(), "nginx".into()),
                ("service.type".into(), "ClusterIP".into()),
            ],
            atomic: true,
            wait: true,
            timeout: "10m".into(),
        }
    }

    #[test]
    fn install_args_carry_release_params_and_atomic_flags() {
        let args = install_args(&request());
        assert_eq!(
            args,
            vec![
                "install",
                "-n",
                "store-demo-2",
                "-f",
                "/srv/values.yaml",
                "--set",
                "ingress.hostname=store-demo-2.localtest.me",
                "--set",
                "ingress.ingressClassName=nginx",
                "--set",
                "service.type=ClusterIP",
                "--atomic",
                "--wait",
                "--timeout",
                "10m",
                "--",
                "store-demo-2",
                "bitnami/wordpress",
            ]
        );
    }

    #[test]
    fn install_args_omit_disabled_flags() {
        let req = InstallRequest {
            atomic: false,
            wait: false,
            params: vec![],
            ..request()
        };
        let args = install_args(&req);
        assert!(!args.iter().any(|a| a == "--atomic" || a == "--wait"));
        assert_eq!(args.last().map(String::as_str), Some("bitnami/wordpress"));
    }

    #[test]
    fn teardown_args_target_the_store_namespace() {
        assert_eq!(
            uninstall_args("s1", "s1"),
            vec!["uninstall", "-n", "s1", "--", "s1"]
        );
        assert_eq!(
            delete_namespace_args("s1"),
            vec!["delete", "namespace", "--", "s1"]
        );
        assert_eq!(
            create_namespace_args("s1"),
            vec!["create", "namespace", "--", "s1"]
        );
        assert_eq!(apply_args("s1"), vec!["apply", "-n", "s1", "-f", "-"]);
    }

    #[test]
    fn flag_like_names_stay_positional() {
        let args = delete_namespace_args("--all");
        let sep = args.iter().position(|a| a == "--").unwrap();
        assert_eq!(&args[sep + 1..], ["--all"]);

        let args = uninstall_args("--all", "--all");
        assert_eq!(args.last().map(String::as_str), Some("--all"));
        assert_eq!(args[args.len() - 2], "--");
    }

    #[test]
    fn already_exists_detection() {
        assert!(is_already_exists(
            "Error from server (AlreadyExists): namespaces \"s1\" already exists"
        ));
        assert!(!is_already_exists("Error from server (Forbidden): nope"));
    }

    #[test]
    fn missing_tool_is_reported_by_name() {
        let err = run_tool("__storefleet_missing_tool__", &[], None).unwrap_err();
        assert!(matches!(err, StoreError::ToolNotFound(ref t) if t == "__storefleet_missing_tool__"));
    }

    #[test]
    fn failing_command_returns_stderr_text() {
        let args = vec!["-c".to_string(), "echo 'timeout waiting for pods' >&2; exit 1".to_string()];
        match run_tool("sh", &args, None) {
            Err(StoreError::Backend(msg)) => assert_eq!(msg, "timeout waiting for pods"),
            other => panic!("expected Backend error, got {other:?}"),
        }
    }

    #[test]
    fn stdin_is_fed_to_the_child() {
        let out = run_tool("cat", &[], Some("kind: Namespace\n")).unwrap();
        assert_eq!(out, "kind: Namespace\n");
    }

    #[test]
    fn silent_failure_reports_exit_code() {
        let args = vec!["-c".to_string(), "exit 3".to_string()];
        match run_tool("sh", &args, None) {
            Err(StoreError::Backend(msg)) => assert_eq!(msg, "exit status 3"),
            other => panic!("expected Backend error, got {other:?}"),
        }
    }
}
