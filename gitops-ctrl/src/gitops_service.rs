use std::ops::Deref;
use std::sync::Arc;

use gitops_api::openshift::*;
use gitops_api::v1alpha1::GITOPS_SERVICE_SINGLETON_NAME;
use gitops_core::config::{
    EffectiveConfig,
    resolve,
};
use gitops_core::errors::*;
use gitops_core::k8s::build_global_object_meta;
use gitops_core::macros::*;
use gitops_core::prelude::*;
use gitops_core::version::OcpVersion;
use gitops_core::writer::{
    self,
    ApplyOutcome,
};
use kube::Resource;
use kube::runtime::controller::Action;
use kube::runtime::reflector::ObjectRef;
use tracing::*;

use crate::context::GitopsContext;
use crate::dispatch::{
    DispatchKey,
    REQUEUE_DURATION,
};
use crate::errors::*;
use crate::{
    backend,
    console_plugin,
    default_instance,
    kam,
};

pub const CONSOLE_LINK_NAME: &str = "argocd";
pub const CONSOLE_LINK_TEXT: &str = "Cluster Argo CD";
pub const CONSOLE_LINK_SECTION: &str = "OpenShift GitOps";

// Everything the GitopsService writes carries an owner reference to the singleton.  Several of
// those objects are cluster-scoped or live in other namespaces, so the owner is looked up by name
// instead of through the child's namespace.
pub fn owning_gitops_service<K: Resource>(obj: &K) -> Option<ObjectRef<GitopsService>> {
    obj.owner_references()
        .iter()
        .find(|o| o.kind == GitopsService::kind(&()) && o.name == GITOPS_SERVICE_SINGLETON_NAME)
        .map(|o| ObjectRef::new(&o.name))
}

pub fn default_server_route_name() -> String {
    format!("{DEFAULT_ARGOCD_INSTANCE_NAME}-server")
}

// A cluster without the ClusterVersion API (or with an unparseable version) is treated as
// "unknown", which keeps the version-gated pieces switched off
pub async fn cluster_version(client: &kube::Client) -> anyhow::Result<Option<OcpVersion>> {
    let cv_api = kube::Api::<PartialClusterVersion>::all_with(client.clone(), &cluster_version_api_resource());
    let Some(cv) = cv_api.get_opt(CLUSTER_VERSION_NAME).await? else {
        debug!("no cluster version found");
        return Ok(None);
    };

    let Some(raw) = cv.status.and_then(|s| s.desired).map(|d| d.version) else {
        return Ok(None);
    };
    match OcpVersion::parse(&raw) {
        Ok(v) => Ok(Some(v)),
        Err(err) => {
            warn!("could not parse cluster version {raw:?}: {err}");
            Ok(None)
        },
    }
}

// 4.6 clusters still run the backend in its old home; everything newer shares the Argo CD
// namespace
pub fn backend_namespace(version: Option<&OcpVersion>) -> &'static str {
    if version.is_some_and(|v| v.is_minor(4, 6)) {
        DEPRECATED_BACKEND_NAMESPACE
    } else {
        DEFAULT_ARGOCD_NAMESPACE
    }
}

pub fn build_namespace(name: &str) -> corev1::Namespace {
    corev1::Namespace {
        metadata: metav1::ObjectMeta {
            name: Some(name.into()),
            labels: klabel!(CLUSTER_MONITORING_LABEL_KEY => "true"),
            ..Default::default()
        },
        ..Default::default()
    }
}

async fn ensure_namespace(client: &kube::Client, name: &str) -> EmptyResult {
    let ns_api = kube::Api::<corev1::Namespace>::all(client.clone());
    if writer::ensure_exists(&ns_api, &build_namespace(name)).await? == ApplyOutcome::Created {
        info!("created namespace {name}");
    }
    Ok(())
}

pub fn build_console_link(owner: &GitopsService, host: &str) -> anyhow::Result<ConsoleLink> {
    let mut link = ConsoleLink::new(
        CONSOLE_LINK_NAME,
        ConsoleLinkSpec {
            href: format!("https://{host}"),
            location: CONSOLE_LINK_LOCATION_APPLICATION_MENU.into(),
            text: CONSOLE_LINK_TEXT.into(),
            application_menu: Some(ApplicationMenuSpec { section: CONSOLE_LINK_SECTION.into(), image_url: None }),
        },
    );
    link.metadata = build_global_object_meta(CONSOLE_LINK_NAME, owner)?;
    Ok(link)
}

// Returns false when the server route exists but hasn't been given a host yet
pub async fn reconcile_console_link(
    client: &kube::Client,
    config: &EffectiveConfig,
    owner: &GitopsService,
) -> anyhow::Result<bool> {
    let link_api = kube::Api::<ConsoleLink>::all(client.clone());
    if config.disable_console_link {
        writer::delete(&link_api, CONSOLE_LINK_NAME).await?;
        return Ok(true);
    }

    let route_api = kube::Api::<Route>::namespaced(client.clone(), DEFAULT_ARGOCD_NAMESPACE);
    let Some(route) = route_api.get_opt(&default_server_route_name()).await? else {
        debug!("no server route in {DEFAULT_ARGOCD_NAMESPACE}, removing console link");
        writer::delete(&link_api, CONSOLE_LINK_NAME).await?;
        return Ok(true);
    };

    let Some(host) = route.host() else {
        debug!("server route {} has no host yet", route.namespaced_name());
        return Ok(false);
    };

    match writer::apply(&link_api, &build_console_link(owner, host)?).await {
        Ok(_) => Ok(true),
        Err(err) if writer::is_not_found(&err) => {
            warn!("console API not available, skipping console link");
            Ok(true)
        },
        Err(err) => Err(err),
    }
}

pub async fn reconcile_gitops_service(ctx: &GitopsContext, gs: &GitopsService) -> anyhow::Result<Action> {
    if gs.name_any() != GITOPS_SERVICE_SINGLETON_NAME {
        debug!("ignoring GitopsService {}, only {GITOPS_SERVICE_SINGLETON_NAME} is reconciled", gs.name_any());
        return Ok(Action::await_change());
    }

    let client = &ctx.client;
    let env = ctx.operator_env().await?;
    let config = resolve(&env, Some(gs), None)?;

    let version = cluster_version(client).await?;
    let backend_ns = backend_namespace(version.as_ref());
    ensure_namespace(client, backend_ns).await?;
    let needs_argocd_ns = !config.disable_default_instance || !config.disable_kam;
    if needs_argocd_ns && backend_ns != DEFAULT_ARGOCD_NAMESPACE {
        ensure_namespace(client, DEFAULT_ARGOCD_NAMESPACE).await?;
    }

    default_instance::reconcile(client, &config, gs).await?;
    backend::reconcile(client, &config, gs, backend_ns).await?;

    let mut settled = kam::reconcile(client, &config, gs, DEFAULT_ARGOCD_NAMESPACE).await?;
    if console_plugin::plugin_supported(&config, version.as_ref()) {
        settled &= console_plugin::reconcile(client, &config, gs, backend_ns).await?;
    } else {
        debug!("cluster version {version:?} does not support the console plugin");
    }
    settled &= reconcile_console_link(client, &config, gs).await?;

    if settled { Ok(Action::await_change()) } else { Ok(Action::requeue(REQUEUE_DURATION)) }
}

#[instrument(parent=None, skip_all, fields(gitops_service=gs.name_any()))]
pub async fn reconcile(gs: Arc<GitopsService>, ctx: Arc<GitopsContext>) -> Result<Action, AnyhowError> {
    let gs = gs.deref();
    let key = DispatchKey::of(gs);
    ctx.dispatcher.guard(&key, reconcile_gitops_service(&ctx, gs)).await
}

pub fn error_policy(gs: Arc<GitopsService>, err: &AnyhowError, ctx: Arc<GitopsContext>) -> Action {
    gserr!(err, "reconcile failed on GitopsService {}", gs.name_any());
    ctx.dispatcher.error_action(&DispatchKey::of(gs.deref()), err)
}

// The singleton drives the backend and the default instance, so it has to exist before any
// of the controllers start
pub async fn bootstrap(client: &kube::Client) -> EmptyResult {
    let gs_api = kube::Api::<GitopsService>::all(client.clone());
    let gs = GitopsService::new(GITOPS_SERVICE_SINGLETON_NAME, Default::default());
    if writer::ensure_exists(&gs_api, &gs).await? == ApplyOutcome::Created {
        info!("created GitopsService {GITOPS_SERVICE_SINGLETON_NAME}");
    }
    Ok(())
}
