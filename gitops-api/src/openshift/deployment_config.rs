use std::collections::BTreeMap;

use k8s_openapi::api::core::v1 as corev1;
use kube::CustomResource;
use serde::{
    Deserialize,
    Serialize,
};
use serde_json::Value;

#[derive(Clone, CustomResource, Debug, Default, Deserialize, PartialEq, Serialize)]
#[kube(group = "apps.openshift.io", version = "v1", kind = "DeploymentConfig", namespaced)]
#[kube(schema = "disabled")]
#[serde(rename_all = "camelCase")]
pub struct DeploymentConfigSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<corev1::PodTemplateSpec>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}
