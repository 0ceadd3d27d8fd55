use gitops_api::argoproj::*;
use gitops_api::openshift::{
    ROUTE_INSECURE_EDGE_POLICY_REDIRECT,
    ROUTE_TLS_TERMINATION_REENCRYPT,
};
use gitops_core::config::EffectiveConfig;
use gitops_core::k8s::build_object_meta;
use gitops_core::prelude::*;
use gitops_core::writer;
use serde::Serialize;
use tracing::*;

use crate::placement;
use crate::workload::resources;

pub const DEFAULT_ADMIN_POLICY: &str = "g, system:cluster-admins, role:admin\ng, cluster-admins, role:admin\n";
pub const DEFAULT_SCOPES: &str = "[groups]";

pub fn resource_quota_name(ns: &str) -> String {
    format!("{ns}-compute-resources")
}

fn small_component_resources() -> Option<corev1::ResourceRequirements> {
    Some(resources("250m", "128Mi", "500m", "256Mi"))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResourceExclusion {
    api_groups: &'static [&'static str],
    kinds: &'static [&'static str],
    clusters: &'static [&'static str],
}

const ALL_CLUSTERS: &[&str] = &["*"];

const RESOURCE_EXCLUSIONS: &[ResourceExclusion] = &[
    ResourceExclusion {
        api_groups: &["", "discovery.k8s.io"],
        kinds: &["Endpoints", "EndpointSlice"],
        clusters: ALL_CLUSTERS,
    },
    ResourceExclusion {
        api_groups: &["apiregistration.k8s.io"],
        kinds: &["APIService"],
        clusters: ALL_CLUSTERS,
    },
    ResourceExclusion {
        api_groups: &["coordination.k8s.io"],
        kinds: &["Lease"],
        clusters: ALL_CLUSTERS,
    },
    ResourceExclusion {
        api_groups: &["authentication.k8s.io", "authorization.k8s.io"],
        kinds: &[
            "SelfSubjectReview",
            "TokenReview",
            "LocalSubjectAccessReview",
            "SelfSubjectAccessReview",
            "SelfSubjectRulesReview",
            "SubjectAccessReview",
        ],
        clusters: ALL_CLUSTERS,
    },
    ResourceExclusion {
        api_groups: &["certificates.k8s.io"],
        kinds: &["CertificateSigningRequest"],
        clusters: ALL_CLUSTERS,
    },
    ResourceExclusion {
        api_groups: &["cert-manager.io"],
        kinds: &["CertificateRequest"],
        clusters: ALL_CLUSTERS,
    },
    ResourceExclusion {
        api_groups: &["cilium.io"],
        kinds: &["CiliumIdentity", "CiliumEndpoint", "CiliumEndpointSlice"],
        clusters: ALL_CLUSTERS,
    },
    ResourceExclusion {
        api_groups: &["kyverno.io", "reports.kyverno.io", "wgpolicyk8s.io"],
        kinds: &[
            "PolicyReport",
            "ClusterPolicyReport",
            "EphemeralReport",
            "ClusterEphemeralReport",
            "AdmissionReport",
            "ClusterAdmissionReport",
            "BackgroundScanReport",
            "ClusterBackgroundScanReport",
            "UpdateRequest",
        ],
        clusters: ALL_CLUSTERS,
    },
    ResourceExclusion {
        api_groups: &["tekton.dev"],
        kinds: &["TaskRun", "PipelineRun"],
        clusters: ALL_CLUSTERS,
    },
];

pub fn resource_exclusions() -> anyhow::Result<String> {
    Ok(serde_yaml::to_string(RESOURCE_EXCLUSIONS)?)
}

pub fn build_default_argocd(config: &EffectiveConfig, owner: &GitopsService) -> anyhow::Result<ArgoCD> {
    let spec = ArgoCDSpec {
        application_set: Some(ArgoCDApplicationSetSpec {
            enabled: Some(true),
            resources: Some(resources("250m", "512Mi", "2000m", "1024Mi")),
            ..Default::default()
        }),
        controller: Some(ArgoCDApplicationControllerSpec {
            resources: Some(resources("250m", "1024Mi", "2000m", "2048Mi")),
            ..Default::default()
        }),
        sso: Some(ArgoCDSSOSpec {
            provider: Some(SSO_PROVIDER_DEX.into()),
            dex: Some(ArgoCDDexSpec {
                openshift_oauth: true,
                resources: small_component_resources(),
                ..Default::default()
            }),
            ..Default::default()
        }),
        grafana: Some(ArgoCDComponentSpec { resources: small_component_resources(), ..Default::default() }),
        ha: Some(ArgoCDHASpec { enabled: false, resources: small_component_resources(), ..Default::default() }),
        redis: Some(ArgoCDComponentSpec { resources: small_component_resources(), ..Default::default() }),
        repo: Some(ArgoCDRepoSpec {
            resources: Some(resources("250m", "256Mi", "1000m", "1024Mi")),
            ..Default::default()
        }),
        server: Some(ArgoCDServerSpec {
            route: Some(ArgoCDRouteSpec {
                enabled: true,
                tls: Some(ArgoCDRouteTls {
                    termination: ROUTE_TLS_TERMINATION_REENCRYPT.into(),
                    insecure_edge_termination_policy: Some(ROUTE_INSECURE_EDGE_POLICY_REDIRECT.into()),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            resources: Some(resources("125m", "128Mi", "500m", "256Mi")),
            ..Default::default()
        }),
        rbac: Some(ArgoCDRBACSpec {
            policy: Some(DEFAULT_ADMIN_POLICY.into()),
            scopes: Some(DEFAULT_SCOPES.into()),
            default_policy: Some("".into()),
            ..Default::default()
        }),
        monitoring: Some(ArgoCDMonitoringSpec { enabled: true, ..Default::default() }),
        resource_exclusions: Some(resource_exclusions()?),
        node_placement: placement::argocd_node_placement(config),
        ..Default::default()
    };

    let mut argocd = ArgoCD::new(DEFAULT_ARGOCD_INSTANCE_NAME, spec);
    argocd.metadata = build_object_meta(DEFAULT_ARGOCD_NAMESPACE, DEFAULT_ARGOCD_INSTANCE_NAME, owner)?;
    Ok(argocd)
}

fn fill<T: Clone>(slot: &mut Option<T>, default: Option<&T>) -> bool {
    match (slot.is_none(), default) {
        (true, Some(d)) => {
            *slot = Some(d.clone());
            true
        },
        _ => false,
    }
}

// Users own the default instance once it exists; only missing component resources and the
// GitopsService-driven node placement are put back
pub fn fill_defaults(existing: &mut ArgoCD, desired: &ArgoCD) -> bool {
    let (spec, want) = (&mut existing.spec, &desired.spec);
    let mut changed = false;

    if let Some(appset) = spec.application_set.as_mut() {
        changed |= fill(&mut appset.resources, want.application_set.as_ref().and_then(|a| a.resources.as_ref()));
    }
    changed |= fill(
        &mut spec.controller.get_or_insert_default().resources,
        want.controller.as_ref().and_then(|c| c.resources.as_ref()),
    );
    if let Some(dex) = spec
        .sso
        .as_mut()
        .filter(|s| s.provider.as_deref() == Some(SSO_PROVIDER_DEX))
        .and_then(|s| s.dex.as_mut())
    {
        let default = want.sso.as_ref().and_then(|s| s.dex.as_ref()).and_then(|d| d.resources.as_ref());
        changed |= fill(&mut dex.resources, default);
    }
    changed |= fill(
        &mut spec.grafana.get_or_insert_default().resources,
        want.grafana.as_ref().and_then(|g| g.resources.as_ref()),
    );
    changed |= fill(&mut spec.ha.get_or_insert_default().resources, want.ha.as_ref().and_then(|h| h.resources.as_ref()));
    changed |= fill(
        &mut spec.redis.get_or_insert_default().resources,
        want.redis.as_ref().and_then(|r| r.resources.as_ref()),
    );
    changed |= fill(&mut spec.repo.get_or_insert_default().resources, want.repo.as_ref().and_then(|r| r.resources.as_ref()));
    changed |= fill(
        &mut spec.server.get_or_insert_default().resources,
        want.server.as_ref().and_then(|s| s.resources.as_ref()),
    );

    if spec.node_placement != want.node_placement {
        spec.node_placement.clone_from(&want.node_placement);
        changed = true;
    }
    changed
}

pub async fn reconcile(client: &kube::Client, config: &EffectiveConfig, owner: &GitopsService) -> EmptyResult {
    let argocd_api = kube::Api::<ArgoCD>::namespaced(client.clone(), DEFAULT_ARGOCD_NAMESPACE);

    if config.disable_default_instance {
        if writer::delete(&argocd_api, DEFAULT_ARGOCD_INSTANCE_NAME).await? {
            info!("default ArgoCD instance is disabled, deleted {DEFAULT_ARGOCD_NAMESPACE}/{DEFAULT_ARGOCD_INSTANCE_NAME}");
        }
        return Ok(());
    }

    let desired = build_default_argocd(config, owner)?;
    if argocd_api.get_opt(DEFAULT_ARGOCD_INSTANCE_NAME).await?.is_some() {
        writer::mutate(&argocd_api, DEFAULT_ARGOCD_INSTANCE_NAME, |existing: &mut ArgoCD| {
            fill_defaults(existing, &desired)
        })
        .await?;
        return Ok(());
    }

    // A quota left over from an older install would keep the default instance from scheduling
    let quota_api = kube::Api::<corev1::ResourceQuota>::namespaced(client.clone(), DEFAULT_ARGOCD_NAMESPACE);
    writer::delete(&quota_api, &resource_quota_name(DEFAULT_ARGOCD_NAMESPACE)).await?;
    writer::ensure_exists(&argocd_api, &desired).await?;
    Ok(())
}
