use gitops_api::argoproj::ArgoCDStatus;
use gitops_api::openshift::Route;
use gitops_core::prelude::*;
use kube::api::{
    Patch,
    PatchParams,
};
use serde_json::json;
use tracing::*;

use crate::sso::{
    SsoState,
    dex_server_name,
};

pub const PHASE_AVAILABLE: &str = "Available";
pub const PHASE_PENDING: &str = "Pending";
pub const PHASE_FAILED: &str = "Failed";
pub const COMPONENT_RUNNING: &str = "Running";
pub const COMPONENT_PENDING: &str = "Pending";
pub const COMPONENT_FAILED: &str = "Failed";
pub const COMPONENT_UNKNOWN: &str = "Unknown";

pub fn deployment_status(depl: Option<&appsv1::Deployment>) -> &'static str {
    let Some(depl) = depl else { return COMPONENT_UNKNOWN };
    let desired = depl.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1);
    let ready = depl.status.as_ref().and_then(|s| s.ready_replicas).unwrap_or(0);
    if ready >= desired { COMPONENT_RUNNING } else { COMPONENT_PENDING }
}

pub fn redis_deployment_name(instance: &ArgoCD) -> String {
    let ha = instance.spec.ha.as_ref().is_some_and(|ha| ha.enabled);
    if ha {
        format!("{}-redis-ha-haproxy", instance.name_any())
    } else {
        format!("{}-redis", instance.name_any())
    }
}

#[derive(Clone, Debug, Default)]
pub struct ObservedComponents {
    pub server: Option<appsv1::Deployment>,
    pub repo: Option<appsv1::Deployment>,
    pub redis: Option<appsv1::Deployment>,
    pub application_set_controller: Option<appsv1::Deployment>,
    pub dex: Option<appsv1::Deployment>,
    pub route: Option<Route>,
}

pub async fn observe(client: &kube::Client, instance: &ArgoCD) -> anyhow::Result<ObservedComponents> {
    let ns = instance.namespace().unwrap_or_default();
    let name = instance.name_any();
    let depl_api = kube::Api::<appsv1::Deployment>::namespaced(client.clone(), &ns);
    let route_api = kube::Api::<Route>::namespaced(client.clone(), &ns);

    Ok(ObservedComponents {
        server: depl_api.get_opt(&format!("{name}-server")).await?,
        repo: depl_api.get_opt(&format!("{name}-repo-server")).await?,
        redis: depl_api.get_opt(&redis_deployment_name(instance)).await?,
        application_set_controller: depl_api.get_opt(&format!("{name}-applicationset-controller")).await?,
        dex: depl_api.get_opt(&dex_server_name(instance)).await?,
        route: route_api.get_opt(&format!("{name}-server")).await?,
    })
}

pub fn compute(observed: &ObservedComponents, sso: &SsoState) -> ArgoCDStatus {
    let components = [
        deployment_status(observed.server.as_ref()),
        deployment_status(observed.repo.as_ref()),
        deployment_status(observed.redis.as_ref()),
        deployment_status(observed.application_set_controller.as_ref()),
    ];

    let sso_status = match sso {
        SsoState::None => None,
        SsoState::Failed(_) => Some(COMPONENT_FAILED),
        SsoState::DexRunning => Some(deployment_status(observed.dex.as_ref())),
        SsoState::KeycloakRunning => Some(COMPONENT_RUNNING),
    };

    let present: Vec<_> = components.iter().filter(|c| **c != COMPONENT_UNKNOWN).collect();
    let phase = if sso.is_failed() || present.is_empty() {
        PHASE_PENDING
    } else if present.iter().all(|c| **c == COMPONENT_RUNNING) {
        PHASE_AVAILABLE
    } else {
        PHASE_PENDING
    };

    ArgoCDStatus {
        phase: Some(phase.into()),
        server: Some(components[0].into()),
        repo: Some(components[1].into()),
        redis: Some(components[2].into()),
        application_set_controller: Some(components[3].into()),
        sso: sso_status.map(String::from),
        host: observed.route.as_ref().and_then(|r| r.host()).map(String::from),
    }
}

// Status is only written when it changed, so a quiet instance doesn't generate watch events
pub async fn patch_status(client: &kube::Client, instance: &ArgoCD, status: &ArgoCDStatus) -> EmptyResult {
    if instance.status.as_ref() == Some(status) {
        debug!("status of {} is unchanged", instance.namespaced_name());
        return Ok(());
    }

    // Spelled out so that a component that went away is nulled rather than left behind by the merge
    let patch = json!({
    "status": {
        "phase": status.phase,
        "server": status.server,
        "repo": status.repo,
        "redis": status.redis,
        "applicationSetController": status.application_set_controller,
        "sso": status.sso,
        "host": status.host,
    }});

    let api = kube::Api::<ArgoCD>::namespaced(client.clone(), &instance.namespace().unwrap_or_default());
    api.patch_status(&instance.name_any(), &PatchParams::default(), &Patch::Merge(patch)).await?;
    info!("updated status of {} to phase {:?}", instance.namespaced_name(), status.phase);
    Ok(())
}

pub async fn patch_phase(client: &kube::Client, instance: &ArgoCD, phase: &str) -> EmptyResult {
    let mut status = instance.status.clone().unwrap_or_default();
    status.phase = Some(phase.into());
    patch_status(client, instance, &status).await
}
