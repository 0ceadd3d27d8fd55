use std::collections::BTreeMap;

use super::*;
use crate::prelude::*;
use crate::version::OcpVersion;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum PullPolicy {
    Always,
    #[default]
    IfNotPresent,
    Never,
}

impl PullPolicy {
    // Anything other than the three exact policy names (including "") means "not set"
    pub fn parse(s: &str) -> Option<PullPolicy> {
        match s {
            "Always" => Some(PullPolicy::Always),
            "IfNotPresent" => Some(PullPolicy::IfNotPresent),
            "Never" => Some(PullPolicy::Never),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PullPolicy::Always => "Always",
            PullPolicy::IfNotPresent => "IfNotPresent",
            PullPolicy::Never => "Never",
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ClusterConfigNamespaces {
    All,
    Listed(Vec<String>),
}

impl ClusterConfigNamespaces {
    pub fn parse(value: Option<&str>) -> ClusterConfigNamespaces {
        let namespaces: Vec<String> = value
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|ns| !ns.is_empty())
            .map(String::from)
            .collect();

        if namespaces.iter().any(|ns| ns == "*") {
            ClusterConfigNamespaces::All
        } else {
            ClusterConfigNamespaces::Listed(namespaces)
        }
    }

    pub fn contains(&self, namespace: &str) -> bool {
        match self {
            ClusterConfigNamespaces::All => true,
            ClusterConfigNamespaces::Listed(namespaces) => namespaces.iter().any(|ns| ns == namespace),
        }
    }
}

impl Default for ClusterConfigNamespaces {
    fn default() -> Self {
        ClusterConfigNamespaces::Listed(vec![])
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum InstanceSelector {
    #[default]
    All,
    Matching(String, String),

    // Holds the raw value; only the ArgoCD reconcile turns this into an error, everything else
    // treats it as selecting nothing
    Invalid(String),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct EffectiveConfig {
    pub image_pull_policy: PullPolicy,
    pub run_on_infra: bool,
    pub node_selector: BTreeMap<String, String>,
    pub tolerations: Option<Vec<corev1::Toleration>>,

    pub disable_default_instance: bool,
    pub disable_console_link: bool,
    pub disable_kam: bool,
    pub cluster_config_namespaces: ClusterConfigNamespaces,
    pub controller_cluster_role: Option<String>,
    pub server_cluster_role: Option<String>,
    pub label_selector: InstanceSelector,
    pub allow_namespace_management: bool,
    pub remove_managed_by_label: bool,
    pub plugin_start_version: Option<OcpVersion>,

    pub backend_image: String,
    pub plugin_image: String,
    pub rollouts_image: String,
    pub kam_image: String,
    pub proxy_env: Vec<corev1::EnvVar>,
}

impl EffectiveConfig {
    pub fn selects(&self, instance: &ArgoCD) -> bool {
        match &self.label_selector {
            InstanceSelector::All => true,
            InstanceSelector::Matching(k, v) => instance.labels().get(k) == Some(v),
            InstanceSelector::Invalid(_) => false,
        }
    }
}

// Accepts "" (no selector) or exactly one `key=value` term
pub fn parse_label_selector(value: Option<&str>) -> anyhow::Result<Option<(String, String)>> {
    let value = value.unwrap_or_default().trim();
    if value.is_empty() {
        return Ok(None);
    }

    match value.split_once('=') {
        Some((k, v))
            if !k.trim().is_empty()
                && !v.trim().is_empty()
                && !value.contains(',')
                && !value.contains("!=")
                && !value.contains("==")
                && !v.contains('=') =>
        {
            Ok(Some((k.trim().into(), v.trim().into())))
        },
        _ => Err(ConfigError::invalid_label_selector(value)),
    }
}

// Pure: everything here is a function of the inputs; higher tiers win
//
//   1. the CR being reconciled (ArgoCD first, then GitopsService)
//   2. the operator environment
//   3. compiled defaults
pub fn resolve(
    env: &OperatorEnv,
    gitops_service: Option<&GitopsService>,
    argocd: Option<&ArgoCD>,
) -> anyhow::Result<EffectiveConfig> {
    let cr_pull_policy = argocd
        .and_then(|a| a.spec.image_pull_policy.as_deref())
        .and_then(PullPolicy::parse)
        .or_else(|| {
            gitops_service
                .and_then(|g| g.spec.image_pull_policy.as_deref())
                .and_then(PullPolicy::parse)
        });
    let image_pull_policy = cr_pull_policy
        .or_else(|| env.get(IMAGE_PULL_POLICY_ENV_VAR).and_then(PullPolicy::parse))
        .unwrap_or_default();

    let plugin_start_version = match env.get(DYNAMIC_PLUGIN_START_OCP_VERSION_ENV_VAR) {
        Some(v) if !v.is_empty() => OcpVersion::parse(v).ok(),
        _ => OcpVersion::parse(DEFAULT_PLUGIN_START_OCP_VERSION).ok(),
    };

    let raw_selector = env.get(ARGOCD_LABEL_SELECTOR_ENV_VAR);
    let label_selector = match parse_label_selector(raw_selector) {
        Ok(Some((k, v))) => InstanceSelector::Matching(k, v),
        Ok(None) => InstanceSelector::All,
        Err(err) if argocd.is_some() => return Err(err),
        Err(_) => InstanceSelector::Invalid(raw_selector.unwrap_or_default().trim().into()),
    };

    let proxy_env = PROXY_ENV_VARS
        .iter()
        .filter_map(|name| {
            env.get_any_case(name).map(|value| corev1::EnvVar {
                name: (*name).into(),
                value: Some(value.into()),
                ..Default::default()
            })
        })
        .collect();

    Ok(EffectiveConfig {
        image_pull_policy,
        run_on_infra: gitops_service.is_some_and(|g| g.spec.run_on_infra),
        node_selector: gitops_service.and_then(|g| g.spec.node_selector.clone()).unwrap_or_default(),
        tolerations: gitops_service
            .and_then(|g| g.spec.tolerations.clone())
            .filter(|t| !t.is_empty()),

        disable_default_instance: env.flag(DISABLE_DEFAULT_ARGOCD_INSTANCE_ENV_VAR),
        disable_console_link: env.flag(DISABLE_DEFAULT_ARGOCD_CONSOLELINK_ENV_VAR),
        disable_kam: env.flag(DISABLE_KAM_ENV_VAR),
        cluster_config_namespaces: ClusterConfigNamespaces::parse(env.get(ARGOCD_CLUSTER_CONFIG_NAMESPACES_ENV_VAR)),
        controller_cluster_role: non_empty(env.get(CONTROLLER_CLUSTER_ROLE_ENV_VAR)),
        server_cluster_role: non_empty(env.get(SERVER_CLUSTER_ROLE_ENV_VAR)),
        label_selector,
        allow_namespace_management: env.flag(ALLOW_NAMESPACE_MANAGEMENT_ENV_VAR),
        remove_managed_by_label: env.flag(REMOVE_MANAGED_BY_LABEL_ENV_VAR),
        plugin_start_version,

        backend_image: non_empty(env.get(BACKEND_IMAGE_ENV_VAR)).unwrap_or(DEFAULT_BACKEND_IMAGE.into()),
        plugin_image: non_empty(env.get(PLUGIN_IMAGE_ENV_VAR)).unwrap_or(DEFAULT_PLUGIN_IMAGE.into()),
        rollouts_image: non_empty(env.get(ROLLOUTS_IMAGE_ENV_VAR)).unwrap_or(DEFAULT_ROLLOUTS_IMAGE.into()),
        kam_image: non_empty(env.get(KAM_IMAGE_ENV_VAR)).unwrap_or(DEFAULT_KAM_IMAGE.into()),
        proxy_env,
    })
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(String::from)
}
