use std::collections::BTreeMap;

use k8s_openapi::api::core::v1 as corev1;
use kube::CustomResource;
use serde::{
    Deserialize,
    Serialize,
};
use serde_json::Value;

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RolloutsNodePlacementSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_selector: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tolerations: Option<Vec<corev1::Toleration>>,
}

#[derive(Clone, CustomResource, Debug, Default, Deserialize, PartialEq, Serialize)]
#[kube(group = "argoproj.io", version = "v1alpha1", kind = "RolloutManager", namespaced)]
#[kube(status = "RolloutManagerStatus", schema = "disabled")]
#[serde(rename_all = "camelCase")]
pub struct RolloutManagerSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<Vec<corev1::EnvVar>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_command_args: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_placement: Option<RolloutsNodePlacementSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_pull_policy: Option<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RolloutManagerStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollouts_controller: Option<String>,
}
