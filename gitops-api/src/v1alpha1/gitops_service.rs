use std::collections::BTreeMap;

use k8s_openapi::api::core::v1 as corev1;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{
    Deserialize,
    Serialize,
};

pub const GITOPS_SERVICE_SINGLETON_NAME: &str = "cluster";

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentResources {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<corev1::ResourceRequirements>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolePluginSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<ComponentResources>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gitops_plugin: Option<ComponentResources>,
}

#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(group = "pipelines.openshift.io", version = "v1alpha1", kind = "GitopsService")]
#[kube(status = "GitopsServiceStatus")]
#[serde(rename_all = "camelCase")]
pub struct GitopsServiceSpec {
    // Schedule the operator-owned workloads on infrastructure nodes
    #[serde(default)]
    pub run_on_infra: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tolerations: Option<Vec<corev1::Toleration>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_selector: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub console_plugin: Option<ConsolePluginSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_pull_policy: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GitopsServiceStatus {}

impl GitopsService {
    pub fn backend_resources(&self) -> Option<&corev1::ResourceRequirements> {
        self.spec.console_plugin.as_ref()?.backend.as_ref()?.resources.as_ref()
    }

    pub fn plugin_resources(&self) -> Option<&corev1::ResourceRequirements> {
        self.spec.console_plugin.as_ref()?.gitops_plugin.as_ref()?.resources.as_ref()
    }
}
