//! Per-store tenant boundary: a namespace plus quota, default container
//! limits and a default-deny network policy.
//!
//! Manifests are built as typed `k8s-openapi` objects and serialized with
//! `serde_yaml`; nothing here is assembled by string interpolation.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{
    LimitRange, LimitRangeItem, LimitRangeSpec, ResourceQuota, ResourceQuotaSpec,
};
use k8s_openapi::api::networking::v1::{
    NetworkPolicy, NetworkPolicyEgressRule, NetworkPolicyIngressRule, NetworkPolicyPeer,
    NetworkPolicyPort, NetworkPolicySpec,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use crate::backend::ClusterBackend;
use crate::config::IsolationPolicy;
use crate::error::Result;

pub const QUOTA_NAME: &str = "store-quota";
pub const LIMITS_NAME: &str = "store-limits";
pub const NETWORK_POLICY_NAME: &str = "store-isolation";

const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
const STORE_LABEL: &str = "storefleet.io/store";
const NAMESPACE_NAME_LABEL: &str = "kubernetes.io/metadata.name";

/// Create the store's namespace (if needed) and (re)apply its isolation rules.
pub fn apply(backend: &dyn ClusterBackend, store_id: &str, policy: &IsolationPolicy) -> Result<()> {
    backend.create_namespace(store_id)?;
    let manifests = render_manifests(store_id, policy)?;
    backend.apply_manifests(store_id, &manifests)?;
    tracing::info!(store = store_id, "isolation rules applied");
    Ok(())
}

/// The three policy objects as one multi-document YAML stream.
pub fn render_manifests(store_id: &str, policy: &IsolationPolicy) -> Result<String> {
    let docs = [
        serde_yaml::to_string(&resource_quota(store_id, policy))?,
        serde_yaml::to_string(&limit_range(store_id, policy))?,
        serde_yaml::to_string(&network_policy(store_id, policy))?,
    ];
    Ok(docs.join("---\n"))
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

fn metadata(name: &str, store_id: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(store_id.to_string()),
        labels: Some(BTreeMap::from([
            (MANAGED_BY_LABEL.to_string(), "storefleet".to_string()),
            (STORE_LABEL.to_string(), store_id.to_string()),
        ])),
        ..ObjectMeta::default()
    }
}

fn quantities(pairs: &[(&str, &str)]) -> BTreeMap<String, Quantity> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), Quantity(v.to_string())))
        .collect()
}

pub fn resource_quota(store_id: &str, policy: &IsolationPolicy) -> ResourceQuota {
    let q = &policy.quota;
    ResourceQuota {
        metadata: metadata(QUOTA_NAME, store_id),
        spec: Some(ResourceQuotaSpec {
            hard: Some(quantities(&[
                ("requests.cpu", q.requests_cpu.as_str()),
                ("requests.memory", q.requests_memory.as_str()),
                ("limits.cpu", q.limits_cpu.as_str()),
                ("limits.memory", q.limits_memory.as_str()),
                ("pods", q.pods.as_str()),
                ("services", q.services.as_str()),
                ("persistentvolumeclaims", q.persistent_volume_claims.as_str()),
            ])),
            ..ResourceQuotaSpec::default()
        }),
        ..ResourceQuota::default()
    }
}

pub fn limit_range(store_id: &str, policy: &IsolationPolicy) -> LimitRange {
    let d = &policy.container_defaults;
    LimitRange {
        metadata: metadata(LIMITS_NAME, store_id),
        spec: Some(LimitRangeSpec {
            limits: vec![LimitRangeItem {
                type_: "Container".to_string(),
                default: Some(quantities(&[
                    ("cpu", d.default_cpu.as_str()),
                    ("memory", d.default_memory.as_str()),
                ])),
                default_request: Some(quantities(&[
                    ("cpu", d.request_cpu.as_str()),
                    ("memory", d.request_memory.as_str()),
                ])),
                ..LimitRangeItem::default()
            }],
        }),
        ..LimitRange::default()
    }
}

fn namespace_peer(namespace: &str) -> NetworkPolicyPeer {
    NetworkPolicyPeer {
        namespace_selector: Some(LabelSelector {
            match_labels: Some(BTreeMap::from([(
                NAMESPACE_NAME_LABEL.to_string(),
                namespace.to_string(),
            )])),
            ..LabelSelector::default()
        }),
        ..NetworkPolicyPeer::default()
    }
}

/// Any pod in the policy's own namespace.
fn same_namespace_peer() -> NetworkPolicyPeer {
    NetworkPolicyPeer {
        pod_selector: Some(LabelSelector::default()),
        ..NetworkPolicyPeer::default()
    }
}

fn port(protocol: &str, number: i32) -> NetworkPolicyPort {
    NetworkPolicyPort {
        protocol: Some(protocol.to_string()),
        port: Some(IntOrString::Int(number)),
        ..NetworkPolicyPort::default()
    }
}

/// Default-deny for every pod in the namespace, with four openings: traffic
/// within the namespace, ingress from the ingress controller, DNS to
/// kube-system and HTTPS to anywhere.
pub fn network_policy(store_id: &str, policy: &IsolationPolicy) -> NetworkPolicy {
    NetworkPolicy {
        metadata: metadata(NETWORK_POLICY_NAME, store_id),
        spec: Some(NetworkPolicySpec {
            pod_selector: LabelSelector::default().into(),
            policy_types: Some(vec!["Ingress".to_string(), "Egress".to_string()]),
            ingress: Some(vec![NetworkPolicyIngressRule {
                from: Some(vec![
                    same_namespace_peer(),
                    namespace_peer(&policy.ingress_namespace),
                ]),
                ..NetworkPolicyIngressRule::default()
            }]),
            egress: Some(vec![
                NetworkPolicyEgressRule {
                    to: Some(vec![same_namespace_peer()]),
                    ..NetworkPolicyEgressRule::default()
                },
                NetworkPolicyEgressRule {
                    to: Some(vec![namespace_peer("kube-system")]),
                    ports: Some(vec![port("UDP", 53), port("TCP", 53)]),
                },
                NetworkPolicyEgressRule {
                    ports: Some(vec![port("TCP", 443)]),
                    ..NetworkPolicyEgressRule::default()
                },
            ]),
            ..NetworkPolicySpec::default()
        }),
        ..NetworkPolicy::default()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
