use gitops_api::monitoring::{
    PrometheusRule,
    ServiceMonitor,
};
use gitops_api::openshift::{
    ConsoleCliDownload,
    ConsoleLink,
    ConsolePlugin,
    DeploymentConfig,
    Route,
};

use super::*;

// The slice of an object's body that the operator owns.  Metadata (labels, annotations, owner
// references) is compared and merged separately by the writer, so implementations only need to
// look at spec/data.
pub trait OwnedFields {
    // True when every field the operator owns already has the desired value in `observed`
    fn owned_eq(desired: &Self, observed: &Self) -> bool;

    // Overwrite the owned fields of `observed` with the desired values, leaving everything else
    // (status, server-defaulted fields, foreign annotations) alone
    fn merge_owned(desired: &Self, observed: &mut Self);

    // Some fields are immutable once set; changing them means deleting and recreating the object
    fn requires_recreate(_desired: &Self, _observed: &Self) -> bool {
        false
    }
}

impl OwnedFields for appsv1::Deployment {
    fn owned_eq(desired: &Self, observed: &Self) -> bool {
        match (&desired.spec, &observed.spec) {
            (None, _) => true,
            (Some(d), Some(o)) => deployment_spec_eq(d, o),
            (Some(_), None) => false,
        }
    }

    fn merge_owned(desired: &Self, observed: &mut Self) {
        let Some(d) = &desired.spec else { return };
        let o = observed.spec.get_or_insert_default();
        if d.replicas.is_some() {
            o.replicas = d.replicas;
        }
        o.selector.clone_from(&d.selector);
        merge_pod_template(&d.template, &mut o.template);
    }

    fn requires_recreate(desired: &Self, observed: &Self) -> bool {
        let selector = |d: &appsv1::Deployment| d.spec.as_ref().map(|s| s.selector.clone());
        observed.spec.is_some() && desired.spec.is_some() && selector(desired) != selector(observed)
    }
}

impl OwnedFields for DeploymentConfig {
    fn owned_eq(desired: &Self, observed: &Self) -> bool {
        let (d, o) = (&desired.spec, &observed.spec);
        let template_eq = match (&d.template, &o.template) {
            (None, _) => true,
            (Some(dt), Some(ot)) => pod_template_eq(dt, ot),
            (Some(_), None) => false,
        };
        dont_care_eq(&d.replicas, &o.replicas) && dont_care_eq(&d.selector, &o.selector) && template_eq
    }

    fn merge_owned(desired: &Self, observed: &mut Self) {
        let (d, o) = (&desired.spec, &mut observed.spec);
        if d.replicas.is_some() {
            o.replicas = d.replicas;
        }
        if d.selector.is_some() {
            o.selector.clone_from(&d.selector);
        }
        if let Some(dt) = &d.template {
            merge_pod_template(dt, o.template.get_or_insert_default());
        }
    }
}

impl OwnedFields for corev1::Service {
    fn owned_eq(desired: &Self, observed: &Self) -> bool {
        let default = corev1::ServiceSpec::default();
        let Some(d) = &desired.spec else { return true };
        let o = observed.spec.as_ref().unwrap_or(&default);

        opt_list_eq(&d.ports, &o.ports, service_ports_eq)
            && dont_care_eq(&d.selector, &o.selector)
            && dont_care_eq(&d.type_, &o.type_)
    }

    fn merge_owned(desired: &Self, observed: &mut Self) {
        let Some(d) = &desired.spec else { return };
        let o = observed.spec.get_or_insert_default();
        if d.ports.is_some() {
            o.ports.clone_from(&d.ports);
        }
        if d.selector.is_some() {
            o.selector.clone_from(&d.selector);
        }
        if d.type_.is_some() {
            o.type_.clone_from(&d.type_);
        }
    }
}

impl OwnedFields for corev1::ServiceAccount {
    fn owned_eq(_desired: &Self, _observed: &Self) -> bool {
        true
    }

    fn merge_owned(_desired: &Self, _observed: &mut Self) {}
}

impl OwnedFields for corev1::Namespace {
    fn owned_eq(_desired: &Self, _observed: &Self) -> bool {
        true
    }

    fn merge_owned(_desired: &Self, _observed: &mut Self) {}
}

// Only the keys the operator writes are owned; anything else in the ConfigMap is left alone
impl OwnedFields for corev1::ConfigMap {
    fn owned_eq(desired: &Self, observed: &Self) -> bool {
        map_subset_eq(&desired.data, &observed.data)
    }

    fn merge_owned(desired: &Self, observed: &mut Self) {
        merge_map(&desired.data, &mut observed.data);
    }
}

// Secrets hold generated or externally-minted values, so the operator only guarantees that its
// keys are present and non-empty; an existing value is never replaced
impl OwnedFields for corev1::Secret {
    fn owned_eq(desired: &Self, observed: &Self) -> bool {
        let observed_data = observed.data.clone().unwrap_or_default();
        desired
            .data
            .iter()
            .flatten()
            .all(|(k, _)| observed_data.get(k).is_some_and(|v| !v.0.is_empty()))
    }

    fn merge_owned(desired: &Self, observed: &mut Self) {
        let o = observed.data.get_or_insert_default();
        for (k, v) in desired.data.iter().flatten() {
            if o.get(k).is_none_or(|ov| ov.0.is_empty()) {
                o.insert(k.clone(), v.clone());
            }
        }
        if observed.type_.is_none() {
            observed.type_.clone_from(&desired.type_);
        }
    }
}

impl OwnedFields for rbacv1::ClusterRole {
    fn owned_eq(desired: &Self, observed: &Self) -> bool {
        opt_list_eq(&desired.rules, &observed.rules, policy_rules_eq)
    }

    fn merge_owned(desired: &Self, observed: &mut Self) {
        if desired.rules.is_some() {
            observed.rules.clone_from(&desired.rules);
        }
    }
}

impl OwnedFields for rbacv1::Role {
    fn owned_eq(desired: &Self, observed: &Self) -> bool {
        opt_list_eq(&desired.rules, &observed.rules, policy_rules_eq)
    }

    fn merge_owned(desired: &Self, observed: &mut Self) {
        if desired.rules.is_some() {
            observed.rules.clone_from(&desired.rules);
        }
    }
}

impl OwnedFields for rbacv1::ClusterRoleBinding {
    fn owned_eq(desired: &Self, observed: &Self) -> bool {
        desired.role_ref == observed.role_ref && opt_list_eq(&desired.subjects, &observed.subjects, subjects_eq)
    }

    fn merge_owned(desired: &Self, observed: &mut Self) {
        if desired.subjects.is_some() {
            observed.subjects.clone_from(&desired.subjects);
        }
    }

    // roleRef is immutable
    fn requires_recreate(desired: &Self, observed: &Self) -> bool {
        desired.role_ref != observed.role_ref
    }
}

impl OwnedFields for rbacv1::RoleBinding {
    fn owned_eq(desired: &Self, observed: &Self) -> bool {
        desired.role_ref == observed.role_ref && opt_list_eq(&desired.subjects, &observed.subjects, subjects_eq)
    }

    fn merge_owned(desired: &Self, observed: &mut Self) {
        if desired.subjects.is_some() {
            observed.subjects.clone_from(&desired.subjects);
        }
    }

    fn requires_recreate(desired: &Self, observed: &Self) -> bool {
        desired.role_ref != observed.role_ref
    }
}

// The remaining kinds have small specs that the operator owns completely

impl OwnedFields for ConsoleLink {
    fn owned_eq(desired: &Self, observed: &Self) -> bool {
        desired.spec == observed.spec
    }

    fn merge_owned(desired: &Self, observed: &mut Self) {
        observed.spec.clone_from(&desired.spec);
    }
}

impl OwnedFields for ConsolePlugin {
    fn owned_eq(desired: &Self, observed: &Self) -> bool {
        desired.spec == observed.spec
    }

    fn merge_owned(desired: &Self, observed: &mut Self) {
        observed.spec.clone_from(&desired.spec);
    }
}

impl OwnedFields for ConsoleCliDownload {
    fn owned_eq(desired: &Self, observed: &Self) -> bool {
        desired.spec == observed.spec
    }

    fn merge_owned(desired: &Self, observed: &mut Self) {
        observed.spec.clone_from(&desired.spec);
    }
}

// The router fills in the host when the desired Route leaves it empty
impl OwnedFields for Route {
    fn owned_eq(desired: &Self, observed: &Self) -> bool {
        let (d, o) = (&desired.spec, &observed.spec);
        d.to == o.to
            && d.port == o.port
            && d.tls == o.tls
            && dont_care_eq(&d.host, &o.host)
            && dont_care_eq(&d.path, &o.path)
    }

    fn merge_owned(desired: &Self, observed: &mut Self) {
        let (d, o) = (&desired.spec, &mut observed.spec);
        o.to.clone_from(&d.to);
        o.port.clone_from(&d.port);
        o.tls.clone_from(&d.tls);
        if d.host.is_some() {
            o.host.clone_from(&d.host);
        }
        if d.path.is_some() {
            o.path.clone_from(&d.path);
        }
    }
}

impl OwnedFields for ServiceMonitor {
    fn owned_eq(desired: &Self, observed: &Self) -> bool {
        desired.spec == observed.spec
    }

    fn merge_owned(desired: &Self, observed: &mut Self) {
        observed.spec.clone_from(&desired.spec);
    }
}

impl OwnedFields for PrometheusRule {
    fn owned_eq(desired: &Self, observed: &Self) -> bool {
        desired.spec == observed.spec
    }

    fn merge_owned(desired: &Self, observed: &mut Self) {
        observed.spec.clone_from(&desired.spec);
    }
}
