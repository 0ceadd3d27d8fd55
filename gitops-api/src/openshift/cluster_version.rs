use kube::api::NotUsed;
use kube::discovery::ApiResource;
use serde::{
    Deserialize,
    Serialize,
};

pub const CLUSTER_VERSION_NAME: &str = "version";
pub const CONFIG_OPENSHIFT_GROUP: &str = "config.openshift.io";
pub const CONFIG_OPENSHIFT_VERSION: &str = "v1";
pub const CLUSTER_VERSION_KIND: &str = "ClusterVersion";
pub const CLUSTER_VERSION_PLURAL: &str = "clusterversions";

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterVersionRelease {
    #[serde(default)]
    pub version: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialClusterVersionStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desired: Option<ClusterVersionRelease>,
}

pub type PartialClusterVersion = kube::api::Object<NotUsed, PartialClusterVersionStatus>;

pub fn cluster_version_api_resource() -> ApiResource {
    ApiResource {
        group: CONFIG_OPENSHIFT_GROUP.into(),
        version: CONFIG_OPENSHIFT_VERSION.into(),
        api_version: format!("{CONFIG_OPENSHIFT_GROUP}/{CONFIG_OPENSHIFT_VERSION}"),
        kind: CLUSTER_VERSION_KIND.into(),
        plural: CLUSTER_VERSION_PLURAL.into(),
    }
}
