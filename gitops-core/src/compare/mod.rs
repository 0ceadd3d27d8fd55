mod owned;
mod quantity;

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1 as appsv1;
use k8s_openapi::api::core::v1 as corev1;
use k8s_openapi::api::rbac::v1 as rbacv1;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1 as metav1;
pub use owned::*;
pub use quantity::*;

use crate::constants::VOLUME_DEFAULT_MODE;

const DEFAULT_TERMINATION_MESSAGE_PATH: &str = "/dev/termination-log";
const DEFAULT_TERMINATION_MESSAGE_POLICY: &str = "File";
const DEFAULT_PROTOCOL: &str = "TCP";

// A field the desired object leaves unset is one the operator doesn't care about; otherwise the
// observed value has to match exactly.
pub fn dont_care_eq<T: PartialEq>(desired: &Option<T>, observed: &Option<T>) -> bool {
    desired.is_none() || desired == observed
}

// Same as dont_care_eq, for lists, with an unset observed list treated as empty
pub fn opt_list_eq<T>(desired: &Option<Vec<T>>, observed: &Option<Vec<T>>, eq: impl Fn(&[T], &[T]) -> bool) -> bool {
    match desired {
        None => true,
        Some(d) => eq(d, observed.as_deref().unwrap_or_default()),
    }
}

// Order-insensitive list equality.  Both sides are sorted by `key` (stably, so elements with
// equal keys stay in their original relative order) and then compared pairwise with `eq`.
pub fn unordered_eq<T, K: Ord>(
    desired: &[T],
    observed: &[T],
    key: impl Fn(&T) -> K,
    eq: impl Fn(&T, &T) -> bool,
) -> bool {
    if desired.len() != observed.len() {
        return false;
    }

    let mut d: Vec<&T> = desired.iter().collect();
    let mut o: Vec<&T> = observed.iter().collect();
    d.sort_by_key(|x| key(*x));
    o.sort_by_key(|x| key(*x));
    d.iter().zip(o.iter()).all(|(x, y)| eq(*x, *y))
}

// Every desired entry must be present in observed; observed may carry extra entries that
// belong to someone else (other controllers, admission webhooks, users)
pub fn map_subset_eq(desired: &Option<BTreeMap<String, String>>, observed: &Option<BTreeMap<String, String>>) -> bool {
    let Some(d) = desired else { return true };
    let empty = BTreeMap::new();
    let o = observed.as_ref().unwrap_or(&empty);
    d.iter().all(|(k, v)| o.get(k) == Some(v))
}

pub fn merge_map(desired: &Option<BTreeMap<String, String>>, observed: &mut Option<BTreeMap<String, String>>) {
    if let Some(d) = desired {
        let o = observed.get_or_insert_default();
        o.extend(d.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
}

pub fn resource_list_eq(
    desired: &Option<BTreeMap<String, Quantity>>,
    observed: &Option<BTreeMap<String, Quantity>>,
) -> bool {
    let empty = BTreeMap::new();
    let d = desired.as_ref().unwrap_or(&empty);
    let o = observed.as_ref().unwrap_or(&empty);
    d.len() == o.len() && d.iter().all(|(k, q)| o.get(k).is_some_and(|oq| quantity_eq(q, oq)))
}

pub fn resources_eq(
    desired: &Option<corev1::ResourceRequirements>,
    observed: &Option<corev1::ResourceRequirements>,
) -> bool {
    let Some(d) = desired else { return true };
    let default = corev1::ResourceRequirements::default();
    let o = observed.as_ref().unwrap_or(&default);
    resource_list_eq(&d.limits, &o.limits) && resource_list_eq(&d.requests, &o.requests)
}

pub fn env_eq(desired: &[corev1::EnvVar], observed: &[corev1::EnvVar]) -> bool {
    unordered_eq(desired, observed, |e| e.name.clone(), |d, o| d == o)
}

pub fn volume_mounts_eq(desired: &[corev1::VolumeMount], observed: &[corev1::VolumeMount]) -> bool {
    unordered_eq(
        desired,
        observed,
        |m| (m.mount_path.clone(), m.name.clone()),
        |d, o| {
            d.name == o.name
                && d.mount_path == o.mount_path
                && d.read_only.unwrap_or(false) == o.read_only.unwrap_or(false)
                && d.sub_path.as_deref().unwrap_or_default() == o.sub_path.as_deref().unwrap_or_default()
        },
    )
}

// Fills in the modes the API server defaults, so a desired volume that leaves them unset still
// matches what comes back from the cluster
fn defaulted_volume(volume: &corev1::Volume) -> corev1::Volume {
    let mut volume = volume.clone();
    if let Some(secret) = volume.secret.as_mut() {
        secret.default_mode.get_or_insert(VOLUME_DEFAULT_MODE);
    }
    if let Some(cm) = volume.config_map.as_mut() {
        cm.default_mode.get_or_insert(VOLUME_DEFAULT_MODE);
    }
    if let Some(projected) = volume.projected.as_mut() {
        projected.default_mode.get_or_insert(VOLUME_DEFAULT_MODE);
    }
    volume
}

pub fn volumes_eq(desired: &[corev1::Volume], observed: &[corev1::Volume]) -> bool {
    unordered_eq(desired, observed, |v| v.name.clone(), |d, o| defaulted_volume(d) == defaulted_volume(o))
}

fn toleration_key(t: &corev1::Toleration) -> (String, String, String, String) {
    (
        t.key.clone().unwrap_or_default(),
        t.operator.clone().unwrap_or_default(),
        t.effect.clone().unwrap_or_default(),
        t.value.clone().unwrap_or_default(),
    )
}

pub fn tolerations_eq(desired: &[corev1::Toleration], observed: &[corev1::Toleration]) -> bool {
    unordered_eq(desired, observed, toleration_key, |d, o| d == o)
}

fn container_port_key(p: &corev1::ContainerPort) -> (i32, String) {
    (p.container_port, p.protocol.clone().unwrap_or(DEFAULT_PROTOCOL.into()))
}

pub fn container_ports_eq(desired: &[corev1::ContainerPort], observed: &[corev1::ContainerPort]) -> bool {
    unordered_eq(desired, observed, container_port_key, |d, o| {
        container_port_key(d) == container_port_key(o) && dont_care_eq(&d.name, &o.name)
    })
}

fn service_port_key(p: &corev1::ServicePort) -> (i32, String) {
    (p.port, p.protocol.clone().unwrap_or(DEFAULT_PROTOCOL.into()))
}

pub fn service_ports_eq(desired: &[corev1::ServicePort], observed: &[corev1::ServicePort]) -> bool {
    unordered_eq(desired, observed, service_port_key, |d, o| {
        service_port_key(d) == service_port_key(o)
            && dont_care_eq(&d.name, &o.name)
            && dont_care_eq(&d.target_port, &o.target_port)
    })
}

// Within a rule the order of groups, resources, verbs, etc. carries no meaning
fn normalized_rule(rule: &rbacv1::PolicyRule) -> rbacv1::PolicyRule {
    let sorted = |list: &Option<Vec<String>>| {
        list.as_ref().filter(|l| !l.is_empty()).map(|l| {
            let mut l = l.clone();
            l.sort();
            l
        })
    };

    rbacv1::PolicyRule {
        api_groups: sorted(&rule.api_groups),
        non_resource_urls: sorted(&rule.non_resource_urls),
        resource_names: sorted(&rule.resource_names),
        resources: sorted(&rule.resources),
        verbs: {
            let mut v = rule.verbs.clone();
            v.sort();
            v
        },
    }
}

fn rule_key(rule: &rbacv1::PolicyRule) -> Vec<Vec<String>> {
    [&rule.api_groups, &rule.resources, &rule.resource_names, &rule.non_resource_urls]
        .into_iter()
        .map(|l| l.clone().unwrap_or_default())
        .chain([rule.verbs.clone()])
        .collect()
}

pub fn policy_rules_eq(desired: &[rbacv1::PolicyRule], observed: &[rbacv1::PolicyRule]) -> bool {
    let d: Vec<_> = desired.iter().map(normalized_rule).collect();
    let o: Vec<_> = observed.iter().map(normalized_rule).collect();
    unordered_eq(&d, &o, rule_key, |x, y| x == y)
}

fn subject_key(s: &rbacv1::Subject) -> (String, String, String) {
    (s.kind.clone(), s.namespace.clone().unwrap_or_default(), s.name.clone())
}

pub fn subjects_eq(desired: &[rbacv1::Subject], observed: &[rbacv1::Subject]) -> bool {
    unordered_eq(desired, observed, subject_key, |d, o| subject_key(d) == subject_key(o))
}

pub fn container_eq(desired: &corev1::Container, observed: &corev1::Container) -> bool {
    let termination_path_eq = desired.termination_message_path.as_deref().unwrap_or(DEFAULT_TERMINATION_MESSAGE_PATH)
        == observed.termination_message_path.as_deref().unwrap_or(DEFAULT_TERMINATION_MESSAGE_PATH);
    let termination_policy_eq = desired
        .termination_message_policy
        .as_deref()
        .unwrap_or(DEFAULT_TERMINATION_MESSAGE_POLICY)
        == observed
            .termination_message_policy
            .as_deref()
            .unwrap_or(DEFAULT_TERMINATION_MESSAGE_POLICY);

    desired.name == observed.name
        && dont_care_eq(&desired.image, &observed.image)
        && dont_care_eq(&desired.image_pull_policy, &observed.image_pull_policy)
        && dont_care_eq(&desired.command, &observed.command)
        && dont_care_eq(&desired.args, &observed.args)
        && dont_care_eq(&desired.working_dir, &observed.working_dir)
        && opt_list_eq(&desired.env, &observed.env, env_eq)
        && opt_list_eq(&desired.ports, &observed.ports, container_ports_eq)
        && opt_list_eq(&desired.volume_mounts, &observed.volume_mounts, volume_mounts_eq)
        && resources_eq(&desired.resources, &observed.resources)
        && dont_care_eq(&desired.security_context, &observed.security_context)
        && dont_care_eq(&desired.liveness_probe, &observed.liveness_probe)
        && dont_care_eq(&desired.readiness_probe, &observed.readiness_probe)
        && termination_path_eq
        && termination_policy_eq
}

// Containers are identified by position and name, so reordering them is a real change
pub fn containers_eq(desired: &[corev1::Container], observed: &[corev1::Container]) -> bool {
    desired.len() == observed.len() && desired.iter().zip(observed).all(|(d, o)| container_eq(d, o))
}

pub fn pod_spec_eq(desired: &corev1::PodSpec, observed: &corev1::PodSpec) -> bool {
    containers_eq(&desired.containers, &observed.containers)
        && opt_list_eq(&desired.init_containers, &observed.init_containers, containers_eq)
        && opt_list_eq(&desired.volumes, &observed.volumes, volumes_eq)
        && opt_list_eq(&desired.tolerations, &observed.tolerations, tolerations_eq)
        && dont_care_eq(&desired.node_selector, &observed.node_selector)
        && dont_care_eq(&desired.service_account_name, &observed.service_account_name)
        && dont_care_eq(&desired.security_context, &observed.security_context)
        && dont_care_eq(&desired.restart_policy, &observed.restart_policy)
}

pub fn pod_template_eq(desired: &corev1::PodTemplateSpec, observed: &corev1::PodTemplateSpec) -> bool {
    let d_meta = desired.metadata.clone().unwrap_or_default();
    let o_meta = observed.metadata.clone().unwrap_or_default();
    let pod_spec_matches = match (&desired.spec, &observed.spec) {
        (None, _) => true,
        (Some(d), Some(o)) => pod_spec_eq(d, o),
        (Some(_), None) => false,
    };

    map_subset_eq(&d_meta.labels, &o_meta.labels)
        && map_subset_eq(&d_meta.annotations, &o_meta.annotations)
        && pod_spec_matches
}

pub fn deployment_spec_eq(desired: &appsv1::DeploymentSpec, observed: &appsv1::DeploymentSpec) -> bool {
    dont_care_eq(&desired.replicas, &observed.replicas)
        && desired.selector == observed.selector
        && pod_template_eq(&desired.template, &observed.template)
}

// Copy the owned pod template fields onto the observed one; labels and annotations are merged
// so anything the cluster added (e.g. restartedAt annotations) survives
pub fn merge_pod_template(desired: &corev1::PodTemplateSpec, observed: &mut corev1::PodTemplateSpec) {
    let d_meta = desired.metadata.clone().unwrap_or_default();
    let o_meta = observed.metadata.get_or_insert_default();
    merge_map(&d_meta.labels, &mut o_meta.labels);
    merge_map(&d_meta.annotations, &mut o_meta.annotations);

    if let Some(d) = &desired.spec {
        let o = observed.spec.get_or_insert_default();
        o.containers.clone_from(&d.containers);
        if d.init_containers.is_some() {
            o.init_containers.clone_from(&d.init_containers);
        }
        if d.volumes.is_some() {
            o.volumes.clone_from(&d.volumes);
        }
        if d.tolerations.is_some() {
            o.tolerations.clone_from(&d.tolerations);
        }
        if d.node_selector.is_some() {
            o.node_selector.clone_from(&d.node_selector);
        }
        if d.service_account_name.is_some() {
            o.service_account_name.clone_from(&d.service_account_name);
        }
        if d.security_context.is_some() {
            o.security_context.clone_from(&d.security_context);
        }
        if d.restart_policy.is_some() {
            o.restart_policy.clone_from(&d.restart_policy);
        }
    }
}

// Owner references are only ever added, never removed: another controller may legitimately
// co-own the object
pub fn owner_refs_eq(desired: &metav1::ObjectMeta, observed: &metav1::ObjectMeta) -> bool {
    let observed_refs = observed.owner_references.as_deref().unwrap_or_default();
    desired
        .owner_references
        .as_deref()
        .unwrap_or_default()
        .iter()
        .all(|d| observed_refs.iter().any(|o| o.uid == d.uid))
}

pub fn meta_eq(desired: &metav1::ObjectMeta, observed: &metav1::ObjectMeta) -> bool {
    map_subset_eq(&desired.labels, &observed.labels)
        && map_subset_eq(&desired.annotations, &observed.annotations)
        && owner_refs_eq(desired, observed)
}

pub fn merge_meta(desired: &metav1::ObjectMeta, observed: &mut metav1::ObjectMeta) {
    merge_map(&desired.labels, &mut observed.labels);
    merge_map(&desired.annotations, &mut observed.annotations);

    for d in desired.owner_references.as_deref().unwrap_or_default() {
        let refs = observed.owner_references.get_or_insert_default();
        if !refs.iter().any(|o| o.uid == d.uid) {
            refs.push(d.clone());
        }
    }
}

#[cfg(test)]
mod tests;
