use crate::error::{Result, StoreError};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Path constants
// ---------------------------------------------------------------------------

pub const CONFIG_FILE: &str = "storefleet.yaml";
pub const DEFAULT_REGISTRY_PATH: &str = "/tmp/stores.db";
pub const DEFAULT_VALUES_FILE: &str = "infra/local/values-store-demo.yaml";

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn default_values_path(base_dir: &Path) -> PathBuf {
    base_dir.join(DEFAULT_VALUES_FILE)
}

// ---------------------------------------------------------------------------
// Store name validation
// ---------------------------------------------------------------------------

static NAME_RE: OnceLock<Regex> = OnceLock::new();

fn name_re() -> &'static Regex {
    NAME_RE.get_or_init(|| {
        Regex::new(r"^[a-z0-9][a-z0-9\-]*[a-z0-9]$|^[a-z0-9]$").expect("static regex")
    })
}

/// Store names double as namespace and release names, so they must be
/// RFC 1123 labels.
pub fn validate_store_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > 63 || !name_re().is_match(name) {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Trim surrounding whitespace and validate. Every operation keyed by a store
/// name goes through this, so lookups agree with what `create` stored.
pub fn normalize_store_name(name: &str) -> Result<&str> {
    let id = name.trim();
    validate_store_name(id)?;
    Ok(id)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
