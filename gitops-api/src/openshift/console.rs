use kube::CustomResource;
use serde::{
    Deserialize,
    Serialize,
};

pub const CONSOLE_LINK_LOCATION_APPLICATION_MENU: &str = "ApplicationMenu";
pub const CONSOLE_PLUGIN_BACKEND_SERVICE: &str = "Service";
pub const CONSOLE_PLUGIN_I18N_PRELOAD: &str = "Preload";

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationMenuSpec {
    pub section: String,
    #[serde(rename = "imageURL")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[derive(Clone, CustomResource, Debug, Default, Deserialize, PartialEq, Serialize)]
#[kube(group = "console.openshift.io", version = "v1", kind = "ConsoleLink", schema = "disabled")]
#[serde(rename_all = "camelCase")]
pub struct ConsoleLinkSpec {
    pub href: String,
    pub location: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_menu: Option<ApplicationMenuSpec>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolePluginService {
    pub name: String,
    pub namespace: String,
    pub port: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_path: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolePluginBackend {
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<ConsolePluginService>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolePluginI18n {
    pub load_type: String,
}

#[derive(Clone, CustomResource, Debug, Default, Deserialize, PartialEq, Serialize)]
#[kube(group = "console.openshift.io", version = "v1", kind = "ConsolePlugin", schema = "disabled")]
#[serde(rename_all = "camelCase")]
pub struct ConsolePluginSpec {
    pub display_name: String,
    pub backend: ConsolePluginBackend,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub i18n: Option<ConsolePluginI18n>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CliDownloadLink {
    pub href: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Clone, CustomResource, Debug, Default, Deserialize, PartialEq, Serialize)]
#[kube(
    group = "console.openshift.io",
    version = "v1",
    kind = "ConsoleCLIDownload",
    root = "ConsoleCliDownload",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleCliDownloadSpec {
    pub description: String,
    pub display_name: String,
    pub links: Vec<CliDownloadLink>,
}
