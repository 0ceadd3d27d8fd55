use std::ops::Deref;
use std::sync::Arc;

use gitops_api::argoproj::{
    RolloutManagerStatus,
    RolloutsNodePlacementSpec,
};
use gitops_core::config::{
    EffectiveConfig,
    PullPolicy,
};
use gitops_core::errors::*;
use gitops_core::k8s::build_object_meta;
use gitops_core::macros::*;
use gitops_core::prelude::*;
use gitops_core::writer;
use kube::api::{
    Patch,
    PatchParams,
};
use kube::runtime::controller::Action;
use serde_json::json;
use tracing::*;

use crate::context::GitopsContext;
use crate::dispatch::{
    DispatchKey,
    REQUEUE_DURATION,
};
use crate::errors::*;
use crate::placement;
use crate::rbac::*;
use crate::status::{
    COMPONENT_RUNNING,
    PHASE_AVAILABLE,
    PHASE_PENDING,
    deployment_status,
};
use crate::workload::*;

pub const ROLLOUTS_NAME: &str = "argo-rollouts";
pub const ROLLOUTS_METRICS_SERVICE_NAME: &str = "argo-rollouts-metrics";
pub const ROLLOUTS_NOTIFICATION_SECRET_NAME: &str = "argo-rollouts-notification-secret";
pub const ROLLOUTS_METRICS_PORT: i32 = 8090;
pub const ROLLOUTS_HEALTHZ_PORT: i32 = 8080;
pub const NAMESPACED_FLAG: &str = "--namespaced";

pub fn rollouts_labels() -> BTreeMap<String, String> {
    kmap!(
        APP_KUBERNETES_IO_COMPONENT_KEY => ROLLOUTS_NAME,
        APP_KUBERNETES_IO_NAME_KEY => ROLLOUTS_NAME,
        APP_KUBERNETES_IO_PART_OF_KEY => ROLLOUTS_NAME,
    )
}

pub fn rollouts_rules() -> Vec<rbacv1::PolicyRule> {
    let crud = &["create", "get", "list", "watch", "update", "patch", "delete"];
    vec![
        rule(
            &["argoproj.io"],
            &["rollouts", "rollouts/status", "rollouts/finalizers"],
            &["get", "list", "watch", "update", "patch"],
        ),
        rule(
            &["argoproj.io"],
            &["analysisruns", "analysisruns/finalizers", "experiments", "experiments/finalizers"],
            crud,
        ),
        rule(&["argoproj.io"], &["analysistemplates", "clusteranalysistemplates"], &["get", "list", "watch"]),
        rule(&["apps"], &["replicasets"], crud),
        rule(&["", "apps"], &["deployments", "podtemplates"], &["get", "list", "watch", "update", "patch"]),
        rule(&[""], &["services"], &["get", "list", "watch", "patch", "create", "delete"]),
        rule(&["coordination.k8s.io"], &["leases"], &["create", "get", "update"]),
        rule(&[""], &["secrets", "configmaps"], &["get", "list", "watch"]),
        rule(&[""], &["pods"], &["list", "update", "watch"]),
        rule(&[""], &["pods/eviction"], &["create"]),
        rule(&[""], &["events"], &["create", "update", "patch"]),
        rule(&["networking.k8s.io", "extensions"], &["ingresses"], &["create", "get", "list", "watch", "patch"]),
        rule(&["batch"], &["jobs"], crud),
        rule(
            &["networking.istio.io"],
            &["virtualservices", "destinationrules"],
            &["watch", "get", "update", "patch", "list"],
        ),
        rule(&["split.smi-spec.io"], &["trafficsplits"], &["create", "watch", "get", "update", "patch"]),
        rule(
            &["getambassador.io", "x.getambassador.io"],
            &["mappings", "ambassadormappings"],
            &["create", "watch", "get", "update", "list", "delete"],
        ),
        rule(&[""], &["endpoints"], &["get"]),
        rule(&["elbv2.k8s.aws"], &["targetgroupbindings"], &["list", "get"]),
        rule(&["appmesh.k8s.aws"], &["virtualservices"], &["watch", "get", "list"]),
        rule(&["appmesh.k8s.aws"], &["virtualnodes", "virtualrouters"], &["watch", "get", "list", "update", "patch"]),
        rule(&["traefik.containo.us", "traefik.io"], &["traefikservices"], &["watch", "get", "update"]),
        rule(&["apisix.apache.org"], &["apisixroutes"], &["watch", "get", "update"]),
        rule(&["route.openshift.io"], &["routes"], &["create", "watch", "get", "update", "patch", "list"]),
    ]
}

// A custom image on the CR wins over the operator-wide one; the version is only appended when
// one was given
pub fn rollouts_image(config: &EffectiveConfig, rm: &RolloutManager) -> String {
    match (rm.spec.image.as_deref(), rm.spec.version.as_deref()) {
        (Some(image), Some(version)) if !image.is_empty() && !version.is_empty() => format!("{image}:{version}"),
        (Some(image), _) if !image.is_empty() => image.into(),
        _ => config.rollouts_image.clone(),
    }
}

fn overlay_node_placement(pod: &mut corev1::PodSpec, node_placement: Option<&RolloutsNodePlacementSpec>) {
    let Some(np) = node_placement else { return };
    if let Some(selector) = &np.node_selector {
        pod.node_selector.get_or_insert_default().extend(selector.clone());
    }
    if np.tolerations.is_some() {
        pod.tolerations.clone_from(&np.tolerations);
    }
}

pub struct RolloutsObjects {
    pub service_account: corev1::ServiceAccount,
    pub role: rbacv1::Role,
    pub role_binding: rbacv1::RoleBinding,
    pub deployment: appsv1::Deployment,
    pub metrics_service: corev1::Service,
    pub notification_secret: corev1::Secret,
}

fn labeled_meta(ns: &str, name: &str, rm: &RolloutManager) -> anyhow::Result<metav1::ObjectMeta> {
    let mut meta = build_object_meta(ns, name, rm)?;
    meta.labels.get_or_insert_default().extend(rollouts_labels());
    Ok(meta)
}

pub fn build_rollouts(config: &EffectiveConfig, rm: &RolloutManager) -> anyhow::Result<RolloutsObjects> {
    let ns = rm.namespace().unwrap_or_default();
    let selector = kmap!(APP_KUBERNETES_IO_NAME_KEY => ROLLOUTS_NAME);

    let service_account =
        corev1::ServiceAccount { metadata: labeled_meta(&ns, ROLLOUTS_NAME, rm)?, ..Default::default() };
    let role = build_role(labeled_meta(&ns, ROLLOUTS_NAME, rm)?, rollouts_rules());
    let role_binding = build_role_binding(
        labeled_meta(&ns, ROLLOUTS_NAME, rm)?,
        role_ref(ROLE_KIND, ROLLOUTS_NAME),
        vec![service_account_subject(&ns, ROLLOUTS_NAME)],
    );

    let mut args = vec![NAMESPACED_FLAG.to_string()];
    args.extend(rm.spec.extra_command_args.iter().flatten().cloned());

    let mut pod_spec = corev1::PodSpec {
        service_account_name: Some(ROLLOUTS_NAME.into()),
        containers: vec![corev1::Container {
            name: ROLLOUTS_NAME.into(),
            image: Some(rollouts_image(config, rm)),
            args: Some(args),
            env: rm.spec.env.clone().filter(|e| !e.is_empty()),
            ports: Some(vec![
                container_port("metrics", ROLLOUTS_METRICS_PORT),
                container_port("healthz", ROLLOUTS_HEALTHZ_PORT),
            ]),
            security_context: Some(restricted_security_context()),
            ..Default::default()
        }],
        ..Default::default()
    };
    placement::apply_to_pod(config, &mut pod_spec);
    overlay_node_placement(&mut pod_spec, rm.spec.node_placement.as_ref());

    let mut pull_config = config.clone();
    if let Some(policy) = rm.spec.image_pull_policy.as_deref().and_then(PullPolicy::parse) {
        pull_config.image_pull_policy = policy;
    }
    placement::apply_pull_policy(&pull_config, &mut pod_spec);

    let deployment = build_deployment(labeled_meta(&ns, ROLLOUTS_NAME, rm)?, selector.clone(), pod_spec);

    let metrics_service = corev1::Service {
        metadata: labeled_meta(&ns, ROLLOUTS_METRICS_SERVICE_NAME, rm)?,
        spec: Some(corev1::ServiceSpec {
            selector: Some(selector),
            ports: Some(vec![service_port(Some("metrics"), ROLLOUTS_METRICS_PORT)]),
            ..Default::default()
        }),
        ..Default::default()
    };

    let notification_secret = corev1::Secret {
        metadata: labeled_meta(&ns, ROLLOUTS_NOTIFICATION_SECRET_NAME, rm)?,
        type_: Some("Opaque".into()),
        ..Default::default()
    };

    Ok(RolloutsObjects { service_account, role, role_binding, deployment, metrics_service, notification_secret })
}

pub fn compute_status(depl: Option<&appsv1::Deployment>) -> RolloutManagerStatus {
    let controller = deployment_status(depl);
    let phase = if controller == COMPONENT_RUNNING { PHASE_AVAILABLE } else { PHASE_PENDING };
    RolloutManagerStatus {
        phase: Some(phase.into()),
        rollouts_controller: Some(controller.into()),
    }
}

async fn patch_status(client: &kube::Client, rm: &RolloutManager, status: &RolloutManagerStatus) -> EmptyResult {
    if rm.status.as_ref() == Some(status) {
        return Ok(());
    }

    let api = kube::Api::<RolloutManager>::namespaced(client.clone(), &rm.namespace().unwrap_or_default());
    let patch = json!({"status": {"phase": status.phase, "rolloutsController": status.rollouts_controller}});
    api.patch_status(&rm.name_any(), &PatchParams::default(), &Patch::Merge(patch)).await?;
    info!("updated status of {} to phase {:?}", rm.namespaced_name(), status.phase);
    Ok(())
}

pub async fn reconcile_rollout_manager(ctx: &GitopsContext, rm: &RolloutManager) -> anyhow::Result<Action> {
    if rm.is_deleting() {
        debug!("{} is being deleted, leaving its children to the garbage collector", rm.namespaced_name());
        return Ok(Action::await_change());
    }

    let client = &ctx.client;
    let config = ctx.config_for(None).await?;
    let ns = rm.namespace().unwrap_or_default();
    let objs = build_rollouts(&config, rm)?;

    writer::apply(&kube::Api::namespaced(client.clone(), &ns), &objs.service_account).await?;
    writer::apply(&kube::Api::namespaced(client.clone(), &ns), &objs.role).await?;
    writer::apply(&kube::Api::namespaced(client.clone(), &ns), &objs.role_binding).await?;
    writer::ensure_exists(&kube::Api::namespaced(client.clone(), &ns), &objs.notification_secret).await?;
    writer::apply(&kube::Api::namespaced(client.clone(), &ns), &objs.deployment).await?;
    writer::apply(&kube::Api::namespaced(client.clone(), &ns), &objs.metrics_service).await?;

    let depl_api = kube::Api::<appsv1::Deployment>::namespaced(client.clone(), &ns);
    let status = compute_status(depl_api.get_opt(ROLLOUTS_NAME).await?.as_ref());
    patch_status(client, rm, &status).await?;

    if status.phase.as_deref() == Some(PHASE_AVAILABLE) {
        Ok(Action::await_change())
    } else {
        Ok(Action::requeue(REQUEUE_DURATION))
    }
}

#[instrument(parent=None, skip_all, fields(rollout_manager=rm.namespaced_name()))]
pub async fn reconcile(rm: Arc<RolloutManager>, ctx: Arc<GitopsContext>) -> Result<Action, AnyhowError> {
    let rm = rm.deref();
    let key = DispatchKey::of(rm);
    ctx.dispatcher.guard(&key, reconcile_rollout_manager(&ctx, rm)).await
}

pub fn error_policy(rm: Arc<RolloutManager>, err: &AnyhowError, ctx: Arc<GitopsContext>) -> Action {
    gserr!(err, "reconcile failed on rollout manager {}", rm.namespaced_name());
    ctx.dispatcher.error_action(&DispatchKey::of(rm.deref()), err)
}
