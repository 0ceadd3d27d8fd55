mod argocd;
mod backend;
mod cluster_rbac;
mod console_plugin;
mod context;
mod default_instance;
mod dispatch;
mod errors;
mod gitops_service;
mod instance_config;
mod kam;
mod monitoring;
mod namespace;
mod placement;
mod rbac;
mod rollouts;
mod source_namespaces;
mod sso;
mod status;
mod workload;

use std::iter;
use std::sync::Arc;

use clap::Parser;
use futures::{
    StreamExt,
    future,
};
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
use gitops_api::v1alpha1::GITOPS_SERVICE_SINGLETON_NAME;
use gitops_core::k8s::labeled_instance;
use gitops_core::logging;
use gitops_core::prelude::*;
use kube::runtime::controller::{
    self,
    Controller,
};
use kube::runtime::reflector::ObjectRef;
use kube::runtime::watcher;
use tracing::*;

use crate::context::GitopsContext;
use crate::gitops_service::owning_gitops_service;
use crate::namespace::projected_rbac_namespace;
use crate::rbac::{
    RBAC_SCOPE_CLUSTER,
    RBAC_SCOPE_MANAGED_NAMESPACE,
    RBAC_SCOPE_SOURCE_NAMESPACE,
    rbac_scope_selector,
};

#[derive(Clone, Debug, Parser)]
struct Options {
    #[arg(long, env = "OPERATOR_NAMESPACE", default_value = DEFAULT_OPERATOR_NAMESPACE)]
    operator_namespace: String,

    #[arg(long, default_value = DEFAULT_OPERATOR_DEPLOYMENT)]
    operator_deployment: String,

    #[arg(long, default_value = DEFAULT_SUBSCRIPTION_NAME)]
    subscription_name: String,

    // Workers per controller; a single key is never worked on by more than one
    #[arg(long, default_value_t = 4)]
    concurrency: u16,

    #[arg(short, long, default_value = "info")]
    verbosity: String,
}

// Only objects this operator wrote are worth waking a reconcile for
fn owned() -> watcher::Config {
    watcher::Config::default().labels(&format!("{APP_KUBERNETES_IO_MANAGED_BY_KEY}={OPERATOR_MANAGER_NAME}"))
}

fn owned_rbac(scope: &str) -> watcher::Config {
    watcher::Config::default().labels(&format!(
        "{APP_KUBERNETES_IO_MANAGED_BY_KEY}={OPERATOR_MANAGER_NAME},{}",
        rbac_scope_selector(scope)
    ))
}

#[instrument(ret, err)]
async fn run(opts: Options) -> EmptyResult {
    let client = kube::Client::try_default().await?;
    gitops_service::bootstrap(&client).await?;

    let ctrl_config = controller::Config::default().concurrency(opts.concurrency);
    let ctx = Arc::new(GitopsContext::new(client.clone(), opts));

    let gs_ctrl = Controller::new(kube::Api::<GitopsService>::all(client.clone()), Default::default())
        .watches(kube::Api::<ArgoCD>::namespaced(client.clone(), DEFAULT_ARGOCD_NAMESPACE), owned(), |obj| owning_gitops_service(&obj))
        .watches(kube::Api::<appsv1::Deployment>::all(client.clone()), owned(), |obj| owning_gitops_service(&obj))
        .watches(kube::Api::<corev1::Service>::all(client.clone()), owned(), |obj| owning_gitops_service(&obj))
        .watches(kube::Api::<corev1::ServiceAccount>::all(client.clone()), owned(), |obj| owning_gitops_service(&obj))
        .watches(kube::Api::<corev1::ConfigMap>::all(client.clone()), owned(), |obj| owning_gitops_service(&obj))
        .watches(kube::Api::<rbacv1::ClusterRole>::all(client.clone()), owned(), |obj| owning_gitops_service(&obj))
        .watches(kube::Api::<rbacv1::ClusterRoleBinding>::all(client.clone()), owned(), |obj| owning_gitops_service(&obj))
        .watches(kube::Api::<ConsoleLink>::all(client.clone()), owned(), |obj| owning_gitops_service(&obj))
        .watches(kube::Api::<ConsolePlugin>::all(client.clone()), owned(), |obj| owning_gitops_service(&obj))
        .watches(kube::Api::<ConsoleCliDownload>::all(client.clone()), owned(), |obj| owning_gitops_service(&obj))
        .watches(
            kube::Api::<Route>::namespaced(client.clone(), DEFAULT_ARGOCD_NAMESPACE),
            Default::default(),
            |route| {
                owning_gitops_service(&route).or_else(|| {
                    (route.name_any() == gitops_service::default_server_route_name())
                        .then(|| ObjectRef::new(GITOPS_SERVICE_SINGLETON_NAME))
                })
            },
        )
        .with_config(ctrl_config.clone())
        .run(gitops_service::reconcile, gitops_service::error_policy, ctx.clone())
        .for_each(|_| future::ready(()));

    // RBAC outside the instance's namespace can't carry an owner reference, so it is traced back
    // to the instance through its labels
    let cluster_rbac = || owned_rbac(RBAC_SCOPE_CLUSTER);
    let source_rbac = || owned_rbac(RBAC_SCOPE_SOURCE_NAMESPACE);
    let argocd_ctrl = Controller::new(kube::Api::<ArgoCD>::all(client.clone()), Default::default())
        .owns(kube::Api::<appsv1::Deployment>::all(client.clone()), owned())
        .owns(kube::Api::<corev1::ConfigMap>::all(client.clone()), owned())
        .owns(kube::Api::<corev1::Secret>::all(client.clone()), owned())
        .owns(kube::Api::<corev1::Service>::all(client.clone()), owned())
        .owns(kube::Api::<corev1::ServiceAccount>::all(client.clone()), owned())
        .owns(kube::Api::<rbacv1::Role>::all(client.clone()), owned())
        .owns(kube::Api::<rbacv1::RoleBinding>::all(client.clone()), owned())
        .owns(kube::Api::<ServiceMonitor>::all(client.clone()), owned())
        .owns(kube::Api::<PrometheusRule>::all(client.clone()), owned())
        .owns(kube::Api::<DeploymentConfig>::all(client.clone()), owned())
        .watches(kube::Api::<rbacv1::ClusterRole>::all(client.clone()), cluster_rbac(), |cr| labeled_instance(&cr))
        .watches(kube::Api::<rbacv1::ClusterRoleBinding>::all(client.clone()), cluster_rbac(), |crb| {
            labeled_instance(&crb)
        })
        .watches(kube::Api::<rbacv1::Role>::all(client.clone()), source_rbac(), |role| labeled_instance(&role))
        .watches(kube::Api::<rbacv1::RoleBinding>::all(client.clone()), source_rbac(), |rb| labeled_instance(&rb))
        .with_config(ctrl_config.clone())
        .run(argocd::reconcile, argocd::error_policy, ctx.clone())
        .for_each(|_| future::ready(()));

    // Every namespace is its own work item, so a stuck namespace only ever holds up itself.  An
    // ArgoCD change fans out to its own namespace and to every namespace it manages; a change to
    // projected RBAC goes back to the namespace it lives in.
    let projected_rbac = || owned_rbac(RBAC_SCOPE_MANAGED_NAMESPACE);
    let ns_ctrl = Controller::new(kube::Api::<corev1::Namespace>::all(client.clone()), Default::default());
    let ns_store = ns_ctrl.store();
    let ns_ctrl = ns_ctrl
        .watches(kube::Api::<ArgoCD>::all(client.clone()), Default::default(), move |instance| {
            let owner_ns = instance.namespace().unwrap_or_default();
            let managed: Vec<_> = ns_store
                .state()
                .iter()
                .filter(|ns| ns.labels().get(MANAGED_BY_LABEL_KEY) == Some(&owner_ns))
                .map(|ns| ObjectRef::from_obj(ns.as_ref()))
                .collect();
            managed.into_iter().chain(iter::once(ObjectRef::new(&owner_ns)))
        })
        .watches(kube::Api::<rbacv1::Role>::all(client.clone()), projected_rbac(), projected_rbac_namespace)
        .watches(kube::Api::<rbacv1::RoleBinding>::all(client.clone()), projected_rbac(), projected_rbac_namespace)
        .with_config(ctrl_config.clone())
        .run(namespace::reconcile, namespace::error_policy, ctx.clone())
        .for_each(|_| future::ready(()));

    let rollouts_ctrl = Controller::new(kube::Api::<RolloutManager>::all(client.clone()), Default::default())
        .owns(kube::Api::<appsv1::Deployment>::all(client.clone()), owned())
        .owns(kube::Api::<corev1::Service>::all(client.clone()), owned())
        .owns(kube::Api::<corev1::ServiceAccount>::all(client.clone()), owned())
        .owns(kube::Api::<corev1::Secret>::all(client.clone()), owned())
        .owns(kube::Api::<rbacv1::Role>::all(client.clone()), owned())
        .owns(kube::Api::<rbacv1::RoleBinding>::all(client.clone()), owned())
        .with_config(ctrl_config)
        .run(rollouts::reconcile, rollouts::error_policy, ctx)
        .for_each(|_| future::ready(()));

    info!("starting controllers");
    tokio::join!(gs_ctrl, argocd_ctrl, ns_ctrl, rollouts_ctrl);
    Ok(())
}

#[tokio::main]
async fn main() -> EmptyResult {
    let args = Options::parse();
    logging::setup(&args.verbosity);
    run(args).await
}

#[cfg(test)]
mod tests;
