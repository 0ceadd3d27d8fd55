use k8s_openapi::api::core::v1 as corev1;
use kube::api::NotUsed;
use kube::discovery::ApiResource;
use serde::{
    Deserialize,
    Serialize,
};

// Only the bits of the OLM Subscription that carry operator configuration

pub const OLM_GROUP: &str = "operators.coreos.com";
pub const OLM_VERSION: &str = "v1alpha1";
pub const SUBSCRIPTION_KIND: &str = "Subscription";
pub const SUBSCRIPTION_PLURAL: &str = "subscriptions";

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<Vec<corev1::EnvVar>>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialSubscriptionSpec {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<SubscriptionConfig>,
}

pub type PartialSubscription = kube::api::Object<PartialSubscriptionSpec, NotUsed>;

pub fn subscription_api_resource() -> ApiResource {
    ApiResource {
        group: OLM_GROUP.into(),
        version: OLM_VERSION.into(),
        api_version: format!("{OLM_GROUP}/{OLM_VERSION}"),
        kind: SUBSCRIPTION_KIND.into(),
        plural: SUBSCRIPTION_PLURAL.into(),
    }
}
