use gitops_api::openshift::*;
use gitops_core::config::EffectiveConfig;
use gitops_core::k8s::{
    build_global_object_meta,
    build_object_meta,
};
use gitops_core::macros::*;
use gitops_core::prelude::*;
use gitops_core::writer;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use tracing::*;

use crate::gitops_service::owning_gitops_service;
use crate::placement;
use crate::workload::*;

// The kam CLI is served for download from a small in-cluster web server, and advertised in the
// console's command line tools page
pub const KAM_NAME: &str = "kam";
pub const KAM_DISPLAY_NAME: &str = "GitOps Application Manager";
pub const KAM_PORT: i32 = 8080;
pub const KAM_TLS_PORT: i32 = 8443;

pub struct KamObjects {
    pub deployment: appsv1::Deployment,
    pub service: corev1::Service,
    pub route: Route,
}

fn kam_pod_spec(config: &EffectiveConfig) -> corev1::PodSpec {
    let mut pod_spec = corev1::PodSpec {
        containers: vec![corev1::Container {
            name: KAM_NAME.into(),
            image: Some(config.kam_image.clone()),
            ports: Some(vec![container_port("http", KAM_PORT)]),
            resources: Some(resources("250m", "128Mi", "500m", "256Mi")),
            security_context: Some(restricted_security_context()),
            ..Default::default()
        }],
        security_context: Some(runtime_default_pod_security_context()),
        ..Default::default()
    };
    placement::apply_to_pod(config, &mut pod_spec);
    placement::apply_pull_policy(config, &mut pod_spec);
    pod_spec
}

pub fn build_kam(config: &EffectiveConfig, owner: &GitopsService, ns: &str) -> anyhow::Result<KamObjects> {
    let selector = kmap!(APP_KUBERNETES_IO_NAME_KEY => KAM_NAME);
    let deployment = build_deployment(build_object_meta(ns, KAM_NAME, owner)?, selector.clone(), kam_pod_spec(config));

    let service = corev1::Service {
        metadata: build_object_meta(ns, KAM_NAME, owner)?,
        spec: Some(corev1::ServiceSpec {
            selector: Some(selector),
            ports: Some(vec![
                service_port(Some(&format!("tcp-{KAM_PORT}")), KAM_PORT),
                service_port(Some(&format!("tcp-{KAM_TLS_PORT}")), KAM_TLS_PORT),
            ]),
            ..Default::default()
        }),
        ..Default::default()
    };

    // The server terminates its own TLS, so the router just passes the connection through
    let mut route = Route::new(
        KAM_NAME,
        RouteSpec {
            to: RouteTargetReference { kind: "Service".into(), name: KAM_NAME.into(), weight: None },
            port: Some(RoutePort { target_port: IntOrString::Int(KAM_TLS_PORT) }),
            tls: Some(RouteTlsConfig {
                termination: ROUTE_TLS_TERMINATION_PASSTHROUGH.into(),
                insecure_edge_termination_policy: Some(ROUTE_INSECURE_EDGE_POLICY_NONE.into()),
            }),
            ..Default::default()
        },
    );
    route.metadata = build_object_meta(ns, KAM_NAME, owner)?;

    Ok(KamObjects { deployment, service, route })
}

pub fn build_cli_download(owner: &GitopsService, host: &str) -> anyhow::Result<ConsoleCliDownload> {
    let mut download = ConsoleCliDownload::new(
        KAM_NAME,
        ConsoleCliDownloadSpec {
            description: KAM_DISPLAY_NAME.into(),
            display_name: KAM_DISPLAY_NAME.into(),
            links: vec![CliDownloadLink {
                href: format!("https://{host}/{KAM_NAME}/"),
                text: Some(KAM_DISPLAY_NAME.into()),
            }],
        },
    );
    download.metadata = build_global_object_meta(KAM_NAME, owner)?;
    Ok(download)
}

pub async fn remove(client: &kube::Client, ns: &str) -> EmptyResult {
    info!("kam download server disabled, removing it from {ns}");
    writer::delete_owned(&kube::Api::<ConsoleCliDownload>::all(client.clone()), KAM_NAME, |obj| {
        owning_gitops_service(obj).is_some()
    })
    .await?;
    writer::delete_owned(&kube::Api::<Route>::namespaced(client.clone(), ns), KAM_NAME, |obj| {
        owning_gitops_service(obj).is_some()
    })
    .await?;
    writer::delete_owned(&kube::Api::<corev1::Service>::namespaced(client.clone(), ns), KAM_NAME, |obj| {
        owning_gitops_service(obj).is_some()
    })
    .await?;
    writer::delete_owned(&kube::Api::<appsv1::Deployment>::namespaced(client.clone(), ns), KAM_NAME, |obj| {
        owning_gitops_service(obj).is_some()
    })
    .await?;
    Ok(())
}

// Returns false while the route is waiting for the router to assign it a host
pub async fn reconcile(
    client: &kube::Client,
    config: &EffectiveConfig,
    owner: &GitopsService,
    ns: &str,
) -> anyhow::Result<bool> {
    if config.disable_kam {
        remove(client, ns).await?;
        return Ok(true);
    }

    debug!("reconciling kam download server in {ns}");
    let objs = build_kam(config, owner, ns)?;
    let route_api = kube::Api::<Route>::namespaced(client.clone(), ns);
    writer::apply(&kube::Api::namespaced(client.clone(), ns), &objs.deployment).await?;
    writer::apply(&kube::Api::namespaced(client.clone(), ns), &objs.service).await?;
    writer::apply(&route_api, &objs.route).await?;

    let Some(host) = route_api.get_opt(KAM_NAME).await?.and_then(|r| r.host().map(String::from)) else {
        debug!("route {ns}/{KAM_NAME} has no host yet");
        return Ok(false);
    };

    publish_cli_download(client, owner, &host).await?;
    Ok(true)
}

pub async fn publish_cli_download(client: &kube::Client, owner: &GitopsService, host: &str) -> EmptyResult {
    let download_api = kube::Api::<ConsoleCliDownload>::all(client.clone());
    match writer::apply(&download_api, &build_cli_download(owner, host)?).await {
        Ok(_) => Ok(()),
        Err(err) if writer::is_not_found(&err) => {
            warn!("console API not available, skipping kam CLI download");
            Ok(())
        },
        Err(err) => Err(err),
    }
}
