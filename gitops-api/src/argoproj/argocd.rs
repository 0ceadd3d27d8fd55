use std::collections::BTreeMap;

use k8s_openapi::api::core::v1 as corev1;
use kube::CustomResource;
use serde::{
    Deserialize,
    Serialize,
};
use serde_json::Value;

pub const SSO_PROVIDER_DEX: &str = "dex";
pub const SSO_PROVIDER_KEYCLOAK: &str = "keycloak";

type Extra = BTreeMap<String, Value>;

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArgoCDRouteTls {
    pub termination: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insecure_edge_termination_policy: Option<String>,

    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArgoCDRouteSpec {
    #[serde(default)]
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<ArgoCDRouteTls>,

    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArgoCDServerSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<ArgoCDRouteSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<corev1::ResourceRequirements>,

    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArgoCDProcessorsSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<i32>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArgoCDApplicationControllerSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processors: Option<ArgoCDProcessorsSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<corev1::ResourceRequirements>,

    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArgoCDRepoSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<corev1::ResourceRequirements>,

    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArgoCDHASpec {
    #[serde(default)]
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<corev1::ResourceRequirements>,

    #[serde(flatten)]
    pub extra: Extra,
}

// Shared shape for the components whose only operator-managed field is `resources`
// (redis, grafana)
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArgoCDComponentSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<corev1::ResourceRequirements>,

    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArgoCDDexSpec {
    #[serde(default, rename = "openShiftOAuth")]
    pub openshift_oauth: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<corev1::ResourceRequirements>,

    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArgoCDKeycloakSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<corev1::ResourceRequirements>,

    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArgoCDSSOSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dex: Option<ArgoCDDexSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keycloak: Option<ArgoCDKeycloakSpec>,

    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArgoCDMonitoringSpec {
    #[serde(default)]
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disable_metrics: Option<bool>,

    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArgoCDRBACSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_policy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scopes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_matcher_mode: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArgoCDApplicationSetSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_namespaces: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scm_providers: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<corev1::ResourceRequirements>,

    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArgoCDNodePlacementSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_selector: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tolerations: Option<Vec<corev1::Toleration>>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedNamespace {
    pub name: String,
    #[serde(default)]
    pub allow_managed_by: bool,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArgoCDSSHHostsSpec {
    #[serde(default)]
    pub excludedefaulthosts: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keys: Option<String>,
}

#[derive(Clone, CustomResource, Debug, Default, Deserialize, PartialEq, Serialize)]
#[kube(group = "argoproj.io", version = "v1beta1", kind = "ArgoCD", namespaced)]
#[kube(status = "ArgoCDStatus", schema = "disabled")]
#[serde(rename_all = "camelCase")]
pub struct ArgoCDSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_set: Option<ArgoCDApplicationSetSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub controller: Option<ArgoCDApplicationControllerSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_cluster_scoped_role_disabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grafana: Option<ArgoCDComponentSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ha: Option<ArgoCDHASpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_pull_policy: Option<String>,
    #[serde(rename = "initialSSHKnownHosts")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_ssh_known_hosts: Option<ArgoCDSSHHostsSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monitoring: Option<ArgoCDMonitoringSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace_management: Option<Vec<ManagedNamespace>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_placement: Option<ArgoCDNodePlacementSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rbac: Option<ArgoCDRBACSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redis: Option<ArgoCDComponentSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo: Option<ArgoCDRepoSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_exclusions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<ArgoCDServerSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_namespaces: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sso: Option<ArgoCDSSOSpec>,

    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArgoCDStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_set_controller: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sso: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl ArgoCD {
    pub fn metrics_disabled(&self) -> bool {
        self.spec.monitoring.as_ref().and_then(|m| m.disable_metrics).unwrap_or(false)
    }

    pub fn cluster_scoped_role_disabled(&self) -> bool {
        self.spec.default_cluster_scoped_role_disabled.unwrap_or(false)
    }

    pub fn source_namespaces(&self) -> &[String] {
        self.spec.source_namespaces.as_deref().unwrap_or_default()
    }

    pub fn appset_source_namespaces(&self) -> &[String] {
        self.spec
            .application_set
            .as_ref()
            .and_then(|a| a.source_namespaces.as_deref())
            .unwrap_or_default()
    }
}
