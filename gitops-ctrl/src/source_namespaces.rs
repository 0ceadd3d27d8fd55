use std::collections::BTreeSet;

use gitops_core::k8s::is_terminating;
use gitops_core::prelude::*;
use gitops_core::writer;
use kube::api::ListParams;
use tracing::*;

use crate::rbac::*;

pub fn source_rbac_name(instance: &ArgoCD, source_ns: &str) -> String {
    format!("{}_{source_ns}", instance.namespace().unwrap_or_default())
}

pub fn build_source_namespace_rbac(instance: &ArgoCD, source_ns: &str) -> (rbacv1::Role, rbacv1::RoleBinding) {
    let name = source_rbac_name(instance, source_ns);
    let instance_ns = instance.namespace().unwrap_or_default();
    let meta = scoped_meta(Some(source_ns), &name, instance, RBAC_SCOPE_SOURCE_NAMESPACE);

    let role = build_role(meta.clone(), source_namespace_rules());
    let binding = build_role_binding(
        meta,
        role_ref(ROLE_KIND, &name),
        vec![
            service_account_subject(&instance_ns, &server_sa(instance)),
            service_account_subject(&instance_ns, &application_controller_sa(instance)),
        ],
    );
    (role, binding)
}

// Namespaces already bound to this instance by the managed-by label get the full projected RBAC,
// so they don't need the narrower source-namespace grant
fn needs_source_rbac(ns: &corev1::Namespace, instance_ns: &str) -> bool {
    !is_terminating(ns) && ns.labels().get(MANAGED_BY_LABEL_KEY).map(String::as_str) != Some(instance_ns)
}

pub async fn reconcile(client: &kube::Client, instance: &ArgoCD) -> EmptyResult {
    let instance_ns = instance.namespace().unwrap_or_default();
    let ns_api = kube::Api::<corev1::Namespace>::all(client.clone());

    let mut active = BTreeSet::new();
    for source_ns in instance.source_namespaces() {
        let Some(ns) = ns_api.get_opt(source_ns).await? else {
            debug!("source namespace {source_ns} does not exist yet");
            continue;
        };
        if !needs_source_rbac(&ns, &instance_ns) {
            continue;
        }

        let (role, binding) = build_source_namespace_rbac(instance, source_ns);
        writer::apply(&kube::Api::namespaced(client.clone(), source_ns), &role).await?;
        writer::apply(&kube::Api::namespaced(client.clone(), source_ns), &binding).await?;
        writer::mutate(&ns_api, source_ns, |ns: &mut corev1::Namespace| {
            let labels = ns.labels_mut();
            if labels.get(MANAGED_BY_CLUSTER_ARGOCD_LABEL_KEY) == Some(&instance_ns) {
                return false;
            }
            labels.insert(MANAGED_BY_CLUSTER_ARGOCD_LABEL_KEY.into(), instance_ns.clone());
            true
        })
        .await?;
        active.insert(source_ns.clone());
    }

    cleanup(client, instance, &active).await
}

// Drops the source-namespace RBAC and label from every namespace labeled for this instance's
// namespace that isn't in `keep`
pub async fn cleanup(client: &kube::Client, instance: &ArgoCD, keep: &BTreeSet<String>) -> EmptyResult {
    let instance_ns = instance.namespace().unwrap_or_default();
    let ns_api = kube::Api::<corev1::Namespace>::all(client.clone());
    let lp = ListParams::default().labels(&format!("{MANAGED_BY_CLUSTER_ARGOCD_LABEL_KEY}={instance_ns}"));
    let selector = scope_selector(instance, RBAC_SCOPE_SOURCE_NAMESPACE);

    for ns in ns_api.list(&lp).await?.items {
        let ns_name = ns.name_any();
        if keep.contains(&ns_name) {
            continue;
        }

        info!("namespace {ns_name} is no longer a source namespace for {}", instance.namespaced_name());
        writer::prune(&kube::Api::<rbacv1::Role>::namespaced(client.clone(), &ns_name), &selector, &BTreeSet::new())
            .await?;
        writer::prune(
            &kube::Api::<rbacv1::RoleBinding>::namespaced(client.clone(), &ns_name),
            &selector,
            &BTreeSet::new(),
        )
        .await?;
        writer::mutate(&ns_api, &ns_name, |ns: &mut corev1::Namespace| {
            ns.labels_mut().remove(MANAGED_BY_CLUSTER_ARGOCD_LABEL_KEY).is_some()
        })
        .await?;
    }
    Ok(())
}
