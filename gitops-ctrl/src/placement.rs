use gitops_api::argoproj::ArgoCDNodePlacementSpec;
use gitops_core::config::EffectiveConfig;
use gitops_core::macros::*;
use gitops_core::prelude::*;

pub const LINUX_OS: &str = "linux";

pub fn default_node_selector() -> BTreeMap<String, String> {
    kmap!(KUBERNETES_IO_OS_KEY => LINUX_OS)
}

// Workload defaults first, then the infra label, then explicit selectors on top
pub fn node_selector(config: &EffectiveConfig, mut base: BTreeMap<String, String>) -> BTreeMap<String, String> {
    if config.run_on_infra {
        base.insert(INFRA_NODE_LABEL_KEY.into(), "".into());
    }
    base.extend(config.node_selector.clone());
    base
}

// Explicit tolerations replace whatever the workload would otherwise carry
pub fn tolerations(config: &EffectiveConfig, base: Option<Vec<corev1::Toleration>>) -> Option<Vec<corev1::Toleration>> {
    config.tolerations.clone().or(base)
}

pub fn apply_to_pod(config: &EffectiveConfig, pod: &mut corev1::PodSpec) {
    let base = pod.node_selector.take().unwrap_or_else(default_node_selector);
    pod.node_selector = Some(node_selector(config, base));
    pod.tolerations = tolerations(config, pod.tolerations.take());
}

pub fn apply_pull_policy(config: &EffectiveConfig, pod: &mut corev1::PodSpec) {
    let policy = config.image_pull_policy.as_str();
    for c in pod.containers.iter_mut().chain(pod.init_containers.iter_mut().flatten()) {
        c.image_pull_policy = Some(policy.into());
    }
}

// The default ArgoCD doesn't get the linux selector; it only gets a node placement when the
// GitopsService asks for one
pub fn argocd_node_placement(config: &EffectiveConfig) -> Option<ArgoCDNodePlacementSpec> {
    let selector = node_selector(config, BTreeMap::new());
    if selector.is_empty() && config.tolerations.is_none() {
        return None;
    }

    Some(ArgoCDNodePlacementSpec {
        node_selector: (!selector.is_empty()).then_some(selector),
        tolerations: config.tolerations.clone(),
    })
}
