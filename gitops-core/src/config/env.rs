use std::collections::BTreeMap;
use std::env;

use gitops_api::olm::{
    PartialSubscription,
    subscription_api_resource,
};
use tracing::*;

use crate::prelude::*;

// Every key the operator reads from its own environment; in the remote install modes the
// Deployment/Subscription is authoritative for these
pub const RECOGNIZED_ENV_VARS: [&str; 18] = [
    DISABLE_DEFAULT_ARGOCD_INSTANCE_ENV_VAR,
    DISABLE_DEFAULT_ARGOCD_CONSOLELINK_ENV_VAR,
    ARGOCD_CLUSTER_CONFIG_NAMESPACES_ENV_VAR,
    CONTROLLER_CLUSTER_ROLE_ENV_VAR,
    SERVER_CLUSTER_ROLE_ENV_VAR,
    ARGOCD_LABEL_SELECTOR_ENV_VAR,
    ALLOW_NAMESPACE_MANAGEMENT_ENV_VAR,
    IMAGE_PULL_POLICY_ENV_VAR,
    REMOVE_MANAGED_BY_LABEL_ENV_VAR,
    DYNAMIC_PLUGIN_START_OCP_VERSION_ENV_VAR,
    BACKEND_IMAGE_ENV_VAR,
    PLUGIN_IMAGE_ENV_VAR,
    ROLLOUTS_IMAGE_ENV_VAR,
    KAM_IMAGE_ENV_VAR,
    DISABLE_KAM_ENV_VAR,
    "HTTP_PROXY",
    "HTTPS_PROXY",
    "NO_PROXY",
];

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InstallMode {
    Local,
    NonOlm,
    Ci,
    Olm,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct OperatorEnv(BTreeMap<String, String>);

impl OperatorEnv {
    pub fn from_process() -> OperatorEnv {
        OperatorEnv(env::vars().collect())
    }

    pub fn from_pairs<K: ToString, V: ToString>(pairs: impl IntoIterator<Item = (K, V)>) -> OperatorEnv {
        OperatorEnv(pairs.into_iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    // Only the literal string "true" turns a flag on
    pub fn flag(&self, key: &str) -> bool {
        self.get(key) == Some("true")
    }

    // Case-insensitive lookup, for variables like the proxy settings that are conventionally
    // set in either case
    pub fn get_any_case(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn install_mode(&self) -> InstallMode {
        if self.0.contains_key(LOCAL_RUN_ENV_VAR) {
            InstallMode::Local
        } else if self.0.contains_key(NON_OLM_ENV_VAR) {
            InstallMode::NonOlm
        } else if self.0.contains_key(CI_ENV_VAR) {
            InstallMode::Ci
        } else {
            InstallMode::Olm
        }
    }

    // Replace the recognized keys with the ones from `vars`; anything else in the process
    // environment is kept as-is.  Vars populated with `valueFrom` are ignored.
    pub fn overlay_authoritative(&mut self, vars: &[corev1::EnvVar]) {
        self.0.retain(|k, _| !RECOGNIZED_ENV_VARS.iter().any(|r| r.eq_ignore_ascii_case(k)));
        for var in vars {
            if let Some(value) = &var.value {
                self.0.insert(var.name.clone(), value.clone());
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct EnvSource {
    pub operator_namespace: String,
    pub operator_deployment: String,
    pub subscription_name: String,
}

impl EnvSource {
    pub async fn load(&self, client: &kube::Client) -> anyhow::Result<OperatorEnv> {
        self.load_with(client, OperatorEnv::from_process()).await
    }

    pub async fn load_with(&self, client: &kube::Client, mut base: OperatorEnv) -> anyhow::Result<OperatorEnv> {
        let mode = base.install_mode();
        let live = match mode {
            InstallMode::Local => None,
            InstallMode::NonOlm => self.deployment_env(client).await?,
            InstallMode::Ci => self.ci_subscription_env(client).await?,
            InstallMode::Olm => self.subscription_env(client).await?,
        };

        match live {
            Some(vars) => base.overlay_authoritative(&vars),
            None if mode != InstallMode::Local => {
                debug!("no live configuration source found for {mode:?}; using process environment");
            },
            None => (),
        }
        Ok(base)
    }

    async fn deployment_env(&self, client: &kube::Client) -> anyhow::Result<Option<Vec<corev1::EnvVar>>> {
        let depl_api = kube::Api::<appsv1::Deployment>::namespaced(client.clone(), &self.operator_namespace);
        let Some(depl) = depl_api.get_opt(&self.operator_deployment).await? else {
            return Ok(None);
        };

        Ok(depl
            .spec
            .and_then(|s| s.template.spec)
            .and_then(|s| s.containers.into_iter().next())
            .map(|c| c.env.unwrap_or_default()))
    }

    async fn ci_subscription_env(&self, client: &kube::Client) -> anyhow::Result<Option<Vec<corev1::EnvVar>>> {
        let sub_api = kube::Api::<PartialSubscription>::namespaced_with(
            client.clone(),
            &self.operator_namespace,
            &subscription_api_resource(),
        );
        let subs = sub_api.list(&Default::default()).await?;
        Ok(subs
            .items
            .into_iter()
            .filter(|s| s.name_any().starts_with(CI_SUBSCRIPTION_PREFIX))
            .next_back()
            .map(subscription_vars))
    }

    async fn subscription_env(&self, client: &kube::Client) -> anyhow::Result<Option<Vec<corev1::EnvVar>>> {
        let sub_api = kube::Api::<PartialSubscription>::namespaced_with(
            client.clone(),
            &self.operator_namespace,
            &subscription_api_resource(),
        );
        Ok(sub_api.get_opt(&self.subscription_name).await?.map(subscription_vars))
    }
}

fn subscription_vars(sub: PartialSubscription) -> Vec<corev1::EnvVar> {
    sub.spec.config.and_then(|c| c.env).unwrap_or_default()
}
