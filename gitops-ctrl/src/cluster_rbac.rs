use std::collections::BTreeSet;

use gitops_core::config::EffectiveConfig;
use gitops_core::prelude::*;
use gitops_core::writer;
use tracing::*;

use crate::rbac::*;

#[derive(Clone, Debug, PartialEq)]
pub struct ClusterRbac {
    pub roles: Vec<rbacv1::ClusterRole>,
    pub bindings: Vec<rbacv1::ClusterRoleBinding>,
}

pub fn cluster_role_name(instance: &ArgoCD, namespace: &str, component: &str) -> String {
    format!("{}-{namespace}-{component}", instance.name_any())
}

pub fn is_promoted(config: &EffectiveConfig, instance: &ArgoCD) -> bool {
    let instance_ns = instance.namespace().unwrap_or_default();
    config.cluster_config_namespaces.contains(&instance_ns) && !instance.cluster_scoped_role_disabled()
}

// The namespaces that get cluster-scoped roles for this instance: its own namespace, plus every
// source namespace that is itself listed as a cluster-config namespace
pub fn promoted_namespaces(config: &EffectiveConfig, instance: &ArgoCD) -> BTreeSet<String> {
    let instance_ns = instance.namespace().unwrap_or_default();
    let mut namespaces = BTreeSet::from([instance_ns]);
    namespaces.extend(
        instance
            .source_namespaces()
            .iter()
            .filter(|ns| config.cluster_config_namespaces.contains(ns))
            .cloned(),
    );
    namespaces
}

pub fn build_cluster_rbac(config: &EffectiveConfig, instance: &ArgoCD) -> ClusterRbac {
    let mut components = vec![
        (APPLICATION_CONTROLLER_COMPONENT, application_controller_sa(instance), controller_cluster_rules()),
        (SERVER_COMPONENT, server_sa(instance), server_cluster_rules()),
    ];
    if !instance.appset_source_namespaces().is_empty() {
        components.push((
            APPLICATIONSET_CONTROLLER_COMPONENT,
            applicationset_controller_sa(instance),
            applicationset_cluster_rules(),
        ));
    }

    let (mut roles, mut bindings) = (vec![], vec![]);
    for ns in promoted_namespaces(config, instance) {
        for (component, sa, rules) in &components {
            let name = cluster_role_name(instance, &ns, component);
            let meta = scoped_meta(None, &name, instance, RBAC_SCOPE_CLUSTER);
            roles.push(build_cluster_role(meta.clone(), rules.clone()));
            bindings.push(build_cluster_role_binding(meta, &name, vec![service_account_subject(&ns, sa)]));
        }
    }
    ClusterRbac { roles, bindings }
}

// Writes the cluster-scoped RBAC for a promoted instance and removes anything left over from a
// previous promotion; for an instance that isn't promoted, everything labeled for it is removed.
// Roles created by someone else never carry the scope labels, so they're never touched.
pub async fn reconcile(client: &kube::Client, config: &EffectiveConfig, instance: &ArgoCD) -> EmptyResult {
    let role_api = kube::Api::<rbacv1::ClusterRole>::all(client.clone());
    let binding_api = kube::Api::<rbacv1::ClusterRoleBinding>::all(client.clone());

    let (mut keep_roles, mut keep_bindings) = (BTreeSet::new(), BTreeSet::new());
    if is_promoted(config, instance) {
        let rbac = build_cluster_rbac(config, instance);
        for role in &rbac.roles {
            writer::apply(&role_api, role).await?;
            keep_roles.insert(role.name_any());
        }
        for binding in &rbac.bindings {
            writer::apply(&binding_api, binding).await?;
            keep_bindings.insert(binding.name_any());
        }
    } else {
        debug!("{} is not a cluster-config instance", instance.namespaced_name());
    }

    let selector = scope_selector(instance, RBAC_SCOPE_CLUSTER);
    writer::prune(&role_api, &selector, &keep_roles).await?;
    writer::prune(&binding_api, &selector, &keep_bindings).await?;
    Ok(())
}

pub async fn cleanup(client: &kube::Client, instance: &ArgoCD) -> EmptyResult {
    let selector = scope_selector(instance, RBAC_SCOPE_CLUSTER);
    writer::prune(&kube::Api::<rbacv1::ClusterRole>::all(client.clone()), &selector, &BTreeSet::new()).await?;
    writer::prune(&kube::Api::<rbacv1::ClusterRoleBinding>::all(client.clone()), &selector, &BTreeSet::new())
        .await?;
    Ok(())
}
