use std::collections::BTreeSet;
use std::ops::Deref;
use std::sync::Arc;

use gitops_core::config::EffectiveConfig;
use gitops_core::errors::*;
use gitops_core::prelude::*;
use kube::api::{
    Patch,
    PatchParams,
};
use kube::runtime::controller::Action;
use serde_json::json;
use tokio::runtime::Handle;
use tokio::task::block_in_place;
use tracing::*;

use crate::context::GitopsContext;
use crate::dispatch::{
    DispatchKey,
    REQUEUE_DURATION,
};
use crate::errors::*;
use crate::sso::SsoState;
use crate::status::PHASE_FAILED;
use crate::{
    cluster_rbac,
    instance_config,
    monitoring,
    namespace,
    source_namespaces,
    sso,
    status,
};

async fn set_finalizers(client: &kube::Client, instance: &ArgoCD, finalizers: Vec<String>) -> EmptyResult {
    let api = kube::Api::<ArgoCD>::namespaced(client.clone(), &instance.namespace().unwrap_or_default());
    let patch = json!({"metadata": {"finalizers": finalizers}});
    api.patch(&instance.name_any(), &PatchParams::default(), &Patch::Merge(patch)).await?;
    Ok(())
}

async fn add_finalizer(client: &kube::Client, instance: &ArgoCD) -> EmptyResult {
    if instance.has_finalizer(ARGOCD_FINALIZER) {
        return Ok(());
    }

    info!("adding finalizer to {}", instance.namespaced_name());
    let mut finalizers = instance.finalizers().to_vec();
    finalizers.push(ARGOCD_FINALIZER.into());
    set_finalizers(client, instance, finalizers).await
}

async fn remove_finalizer(client: &kube::Client, instance: &ArgoCD) -> EmptyResult {
    info!("removing finalizer from {}", instance.namespaced_name());
    let finalizers = instance.finalizers().iter().filter(|f| *f != ARGOCD_FINALIZER).cloned().collect();
    set_finalizers(client, instance, finalizers).await
}

// Namespaces are only unlabeled when no other instance in the owning namespace could still
// be using them
async fn release_managed_namespaces(client: &kube::Client, instance: &ArgoCD) -> EmptyResult {
    let instance_ns = instance.namespace().unwrap_or_default();
    let argocd_api = kube::Api::<ArgoCD>::namespaced(client.clone(), &instance_ns);
    let others = argocd_api
        .list(&Default::default())
        .await?
        .items
        .into_iter()
        .filter(|other| other.uid() != instance.uid() && !other.is_deleting())
        .count();
    if others > 0 {
        debug!("{others} other instance(s) in {instance_ns}, keeping managed-by labels");
        return Ok(());
    }

    for ns in namespace::managed_namespaces(client, &instance_ns).await? {
        namespace::strip_managed_by_label(client, &ns.name_any()).await?;
    }
    Ok(())
}

// Everything the operator wrote outside the instance's owner-reference tree has to go before
// the finalizer is released; owned children are left to the garbage collector
pub async fn finalize(client: &kube::Client, config: &EffectiveConfig, instance: &ArgoCD) -> anyhow::Result<Action> {
    if !instance.has_finalizer(ARGOCD_FINALIZER) {
        return Ok(Action::await_change());
    }

    info!("cleaning up after {}", instance.namespaced_name());
    namespace::cleanup_instance(client, instance).await?;
    source_namespaces::cleanup(client, instance, &BTreeSet::new()).await?;
    cluster_rbac::cleanup(client, instance).await?;
    if config.remove_managed_by_label {
        release_managed_namespaces(client, instance).await?;
    }
    remove_finalizer(client, instance).await?;
    Ok(Action::await_change())
}

pub async fn reconcile_instance(ctx: &GitopsContext, instance: &ArgoCD) -> anyhow::Result<Action> {
    let client = &ctx.client;
    let config = ctx.config_for(Some(instance)).await?;

    if instance.is_deleting() {
        return finalize(client, &config, instance).await;
    }
    if !config.selects(instance) {
        debug!("{} doesn't match the label selector, skipping", instance.namespaced_name());
        return Ok(Action::await_change());
    }

    add_finalizer(client, instance).await?;

    // An invalid SSO config blocks everything else, but the user still needs to see why
    let sso_state = sso::reconcile(client, &config, instance).await?;
    if let SsoState::Failed(reason) = &sso_state {
        let observed = status::observe(client, instance).await?;
        status::patch_status(client, instance, &status::compute(&observed, &sso_state)).await?;
        return Err(GitopsControllerError::invalid_sso_config(&format!("{}: {reason}", instance.namespaced_name())));
    }

    instance_config::reconcile(client, &config, instance).await?;
    cluster_rbac::reconcile(client, &config, instance).await?;
    source_namespaces::reconcile(client, instance).await?;
    monitoring::reconcile(client, instance).await?;

    let observed = status::observe(client, instance).await?;
    let new_status = status::compute(&observed, &sso_state);
    status::patch_status(client, instance, &new_status).await?;

    if new_status.phase.as_deref() == Some(status::PHASE_AVAILABLE) {
        Ok(Action::await_change())
    } else {
        debug!("{} is not available yet, requeueing", instance.namespaced_name());
        Ok(Action::requeue(REQUEUE_DURATION))
    }
}

#[instrument(parent=None, skip_all, fields(argocd=instance.namespaced_name()))]
pub async fn reconcile(instance: Arc<ArgoCD>, ctx: Arc<GitopsContext>) -> Result<Action, AnyhowError> {
    let instance = instance.deref();
    let key = DispatchKey::of(instance);
    ctx.dispatcher.guard(&key, reconcile_instance(&ctx, instance)).await
}

fn is_missing_api(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<GitopsControllerError>(), Some(GitopsControllerError::MissingApi(_)))
}

pub fn error_policy(instance: Arc<ArgoCD>, err: &AnyhowError, ctx: Arc<GitopsContext>) -> Action {
    gserr!(err, "reconcile failed on argocd {}", instance.namespaced_name());

    if is_missing_api(err) {
        // The error policy can't be async, so this blocks on the status write
        if let Err(e) =
            block_in_place(|| Handle::current().block_on(status::patch_phase(&ctx.client, &instance, PHASE_FAILED)))
        {
            error!("could not mark {} as failed: {e}", instance.namespaced_name());
        }
    }
    ctx.dispatcher.error_action(&DispatchKey::of(instance.deref()), err)
}
