use std::collections::BTreeSet;
use std::ops::Deref;
use std::sync::Arc;

use gitops_core::config::{
    EffectiveConfig,
    InstanceSelector,
};
use gitops_core::errors::*;
use gitops_core::k8s::is_terminating;
use gitops_core::prelude::*;
use gitops_core::writer;
use kube::Resource;
use kube::api::ListParams;
use kube::runtime::controller::Action;
use kube::runtime::reflector::ObjectRef;
use tracing::*;

use crate::context::GitopsContext;
use crate::dispatch::DispatchKey;
use crate::errors::*;
use crate::rbac::*;

// One Role/RoleBinding pair per component; a custom ClusterRole from the operator environment
// replaces the Role and is referenced directly from the binding
pub fn build_projected_rbac(
    instance: &ArgoCD,
    namespace: &str,
    config: &EffectiveConfig,
    admin: Option<&rbacv1::ClusterRole>,
) -> (Vec<rbacv1::Role>, Vec<rbacv1::RoleBinding>) {
    let instance_ns = instance.namespace().unwrap_or_default();
    let components = [
        (application_controller_sa(instance), &config.controller_cluster_role, controller_namespace_rules(admin)),
        (server_sa(instance), &config.server_cluster_role, server_namespace_rules()),
    ];

    let (mut roles, mut bindings) = (vec![], vec![]);
    for (name, custom_role, rules) in components {
        let meta = scoped_meta(Some(namespace), &name, instance, RBAC_SCOPE_MANAGED_NAMESPACE);
        let role_ref = match custom_role {
            Some(cluster_role) => role_ref(CLUSTER_ROLE_KIND, cluster_role),
            None => {
                roles.push(build_role(meta.clone(), rules));
                role_ref(ROLE_KIND, &name)
            },
        };
        bindings.push(build_role_binding(meta, role_ref, vec![service_account_subject(&instance_ns, &name)]));
    }
    (roles, bindings)
}

// Projected Roles and RoleBindings are tied to their instance only by labels, so a change to one
// of them is routed back to the namespace it lives in
pub fn projected_rbac_namespace<K: Resource>(obj: K) -> Option<ObjectRef<corev1::Namespace>> {
    let scope = obj.labels().get(ARGOCD_RBAC_SCOPE_LABEL_KEY)?;
    if scope != RBAC_SCOPE_MANAGED_NAMESPACE {
        return None;
    }
    obj.namespace().map(|ns| ObjectRef::new(&ns))
}

// The instances whose RBAC belongs in `ns`: the ones in the namespace named by its managed-by
// label, plus any that live in `ns` itself
async fn bound_instances(client: &kube::Client, ns: &corev1::Namespace) -> anyhow::Result<Vec<ArgoCD>> {
    let ns_name = ns.name_any();
    let mut namespaces = vec![ns_name.clone()];
    if let Some(owner_ns) = ns.labels().get(MANAGED_BY_LABEL_KEY)
        && *owner_ns != ns_name
    {
        namespaces.push(owner_ns.clone());
    }

    let mut instances = vec![];
    for owner_ns in namespaces {
        let argocd_api = kube::Api::<ArgoCD>::namespaced(client.clone(), &owner_ns);
        instances.extend(argocd_api.list(&Default::default()).await?.items);
    }
    Ok(instances)
}

pub async fn project_namespace(client: &kube::Client, config: &EffectiveConfig, ns: &corev1::Namespace) -> EmptyResult {
    let ns_name = ns.name_any();
    if is_terminating(ns) {
        debug!("namespace {ns_name} is terminating, not writing RBAC");
        return Ok(());
    }

    if let InstanceSelector::Invalid(raw) = &config.label_selector {
        warn!("not writing RBAC into {ns_name}: ArgoCD label selector {raw:?} is invalid");
        return Ok(());
    }

    let instances = bound_instances(client, ns).await?;
    let (selected, deselected): (Vec<_>, Vec<_>) =
        instances.iter().filter(|i| !i.is_deleting()).partition(|i| config.selects(i));
    if !instances.is_empty() && selected.is_empty() {
        debug!("no selected ArgoCD instances bound to {ns_name}, leaving RBAC alone");
        return Ok(());
    }

    let role_api = kube::Api::<rbacv1::Role>::namespaced(client.clone(), &ns_name);
    let binding_api = kube::Api::<rbacv1::RoleBinding>::namespaced(client.clone(), &ns_name);
    let (mut keep_roles, mut keep_bindings) = (BTreeSet::new(), BTreeSet::new());

    if !selected.is_empty() {
        let admin = kube::Api::<rbacv1::ClusterRole>::all(client.clone())
            .get_opt(ADMIN_CLUSTER_ROLE)
            .await?;
        for instance in selected {
            let (roles, bindings) = build_projected_rbac(instance, &ns_name, config, admin.as_ref());
            for role in roles {
                writer::apply(&role_api, &role).await?;
                keep_roles.insert(role.name_any());
            }
            for binding in bindings {
                writer::apply(&binding_api, &binding).await?;
                keep_bindings.insert(binding.name_any());
            }
        }
    }

    // Instances outside the selector belong to some other operator; what they have here stays
    for instance in deselected {
        let (_, bindings) = build_projected_rbac(instance, &ns_name, config, None);
        for name in bindings.iter().map(|b| b.name_any()) {
            keep_roles.insert(name.clone());
            keep_bindings.insert(name);
        }
    }

    // New RBAC is in place before anything from a previous binding goes away
    let selector = rbac_scope_selector(RBAC_SCOPE_MANAGED_NAMESPACE);
    let removed_roles = writer::prune(&role_api, &selector, &keep_roles).await?;
    let removed_bindings = writer::prune(&binding_api, &selector, &keep_bindings).await?;

    // Stale RBAC is the evidence that an instance used to manage this namespace; without it an
    // unbound label could just mean the instance hasn't been created yet
    if instances.is_empty() && (removed_roles || removed_bindings) && config.remove_managed_by_label {
        strip_managed_by_label(client, &ns_name).await?;
    }
    Ok(())
}

pub async fn strip_managed_by_label(client: &kube::Client, ns_name: &str) -> EmptyResult {
    let ns_api = kube::Api::<corev1::Namespace>::all(client.clone());
    writer::mutate(&ns_api, ns_name, |ns: &mut corev1::Namespace| {
        ns.labels_mut().remove(MANAGED_BY_LABEL_KEY).is_some()
    })
    .await?;
    Ok(())
}

pub async fn managed_namespaces(client: &kube::Client, owner_ns: &str) -> anyhow::Result<Vec<corev1::Namespace>> {
    let ns_api = kube::Api::<corev1::Namespace>::all(client.clone());
    let lp = ListParams::default().labels(&format!("{MANAGED_BY_LABEL_KEY}={owner_ns}"));
    Ok(ns_api.list(&lp).await?.items)
}

// Removes this instance's projected RBAC from its own namespace and every namespace bound to it.
// A failure in one namespace doesn't stop the others; the first error is returned at the end.
pub async fn cleanup_instance(client: &kube::Client, instance: &ArgoCD) -> EmptyResult {
    let instance_ns = instance.namespace().unwrap_or_default();
    let mut namespaces: Vec<String> = managed_namespaces(client, &instance_ns)
        .await?
        .iter()
        .map(|ns| ns.name_any())
        .collect();
    if !namespaces.contains(&instance_ns) {
        namespaces.push(instance_ns);
    }

    let selector = scope_selector(instance, RBAC_SCOPE_MANAGED_NAMESPACE);
    let mut first_err = None;
    for ns_name in namespaces {
        let role_api = kube::Api::<rbacv1::Role>::namespaced(client.clone(), &ns_name);
        let binding_api = kube::Api::<rbacv1::RoleBinding>::namespaced(client.clone(), &ns_name);
        let res = async {
            writer::prune(&role_api, &selector, &BTreeSet::new()).await?;
            writer::prune(&binding_api, &selector, &BTreeSet::new()).await
        }
        .await;

        if let Err(err) = res {
            warn!("could not clean up RBAC in {ns_name}: {err}");
            first_err.get_or_insert(err);
        }
    }

    match first_err {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[instrument(parent=None, skip_all, fields(namespace=ns.name_any()))]
pub async fn reconcile(ns: Arc<corev1::Namespace>, ctx: Arc<GitopsContext>) -> Result<Action, AnyhowError> {
    let ns = ns.deref();
    let key = DispatchKey::of(ns);
    ctx.dispatcher
        .guard(&key, async {
            let config = ctx.config_for(None).await?;
            project_namespace(&ctx.client, &config, ns).await?;
            Ok(Action::await_change())
        })
        .await
}

pub fn error_policy(ns: Arc<corev1::Namespace>, err: &AnyhowError, ctx: Arc<GitopsContext>) -> Action {
    gserr!(err, "reconcile failed on namespace {}", ns.name_any());
    ctx.dispatcher.error_action(&DispatchKey::of(ns.deref()), err)
}
