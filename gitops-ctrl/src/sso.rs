use gitops_api::argoproj::*;
use gitops_api::openshift::{
    DeploymentConfig,
    DeploymentConfigSpec,
};
use gitops_core::config::EffectiveConfig;
use gitops_core::k8s::{
    build_object_meta,
    is_owned_by,
};
use gitops_core::macros::*;
use gitops_core::prelude::*;
use gitops_core::writer;
use kube::Resource;
use serde::de::DeserializeOwned;
use tracing::*;

use crate::placement;
use crate::rbac::*;
use crate::workload::{
    build_deployment,
    container_port,
    service_port,
};

pub const DEFAULT_DEX_IMAGE: &str = "ghcr.io/dexidp/dex:v2.41.1";
pub const DEFAULT_KEYCLOAK_IMAGE: &str = "registry.redhat.io/rh-sso-7/sso76-openshift-rhel8";
pub const DEFAULT_KEYCLOAK_VERSION: &str = "7.6";
pub const DEX_HTTP_PORT: i32 = 5556;
pub const DEX_GRPC_PORT: i32 = 5557;
pub const KEYCLOAK_HTTPS_PORT: i32 = 8443;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SsoState {
    None,
    DexRunning,
    KeycloakRunning,
    Failed(String),
}

impl SsoState {
    pub fn is_failed(&self) -> bool {
        matches!(self, SsoState::Failed(_))
    }
}

pub fn evaluate(instance: &ArgoCD) -> SsoState {
    let Some(sso) = &instance.spec.sso else {
        return SsoState::None;
    };

    match sso.provider.as_deref() {
        Some(SSO_PROVIDER_DEX) => match &sso.dex {
            Some(dex) if dex.openshift_oauth || dex.config.as_deref().is_some_and(|c| !c.is_empty()) => {
                SsoState::DexRunning
            },
            _ => SsoState::Failed("dex provider requires openShiftOAuth or a dex config".into()),
        },
        Some(SSO_PROVIDER_KEYCLOAK) if sso.dex.is_some() => {
            SsoState::Failed("keycloak provider can't be combined with a dex config".into())
        },
        Some(SSO_PROVIDER_KEYCLOAK) => SsoState::KeycloakRunning,
        Some(other) => SsoState::Failed(format!("unsupported SSO provider {other:?}")),
        None => SsoState::Failed("sso is configured without a provider".into()),
    }
}

pub fn dex_server_name(instance: &ArgoCD) -> String {
    format!("{}-dex-server", instance.name_any())
}

pub fn dex_service_account_name(instance: &ArgoCD) -> String {
    format!("{}-argocd-dex-server", instance.name_any())
}

pub fn keycloak_name(instance: &ArgoCD) -> String {
    format!("{}-keycloak", instance.name_any())
}

pub struct DexObjects {
    pub service_account: corev1::ServiceAccount,
    pub role: rbacv1::Role,
    pub role_binding: rbacv1::RoleBinding,
    pub service: corev1::Service,
    pub deployment: appsv1::Deployment,
}

pub fn build_dex(config: &EffectiveConfig, instance: &ArgoCD) -> anyhow::Result<DexObjects> {
    let ns = instance.namespace().unwrap_or_default();
    let sa_name = dex_service_account_name(instance);
    let server_name = dex_server_name(instance);
    let dex = instance.spec.sso.as_ref().and_then(|s| s.dex.as_ref());
    let selector = kmap!(APP_KUBERNETES_IO_NAME_KEY => &server_name);

    let service_account =
        corev1::ServiceAccount { metadata: build_object_meta(&ns, &sa_name, instance)?, ..Default::default() };
    let role = build_role(
        build_object_meta(&ns, &sa_name, instance)?,
        vec![rule(&[""], &["secrets", "configmaps"], &["get", "list", "watch"])],
    );
    let role_binding = build_role_binding(
        build_object_meta(&ns, &sa_name, instance)?,
        role_ref(ROLE_KIND, &sa_name),
        vec![service_account_subject(&ns, &sa_name)],
    );

    let service = corev1::Service {
        metadata: build_object_meta(&ns, &server_name, instance)?,
        spec: Some(corev1::ServiceSpec {
            selector: Some(selector.clone()),
            ports: Some(vec![
                service_port(Some("http"), DEX_HTTP_PORT),
                service_port(Some("grpc"), DEX_GRPC_PORT),
            ]),
            ..Default::default()
        }),
        ..Default::default()
    };

    let mut pod_spec = corev1::PodSpec {
        service_account_name: Some(sa_name),
        containers: vec![corev1::Container {
            name: "dex".into(),
            image: Some(DEFAULT_DEX_IMAGE.into()),
            command: Some(vec!["/shared/argocd-dex".into(), "rundex".into()]),
            ports: Some(vec![
                container_port("http", DEX_HTTP_PORT),
                container_port("grpc", DEX_GRPC_PORT),
            ]),
            resources: dex.and_then(|d| d.resources.clone()),
            ..Default::default()
        }],
        ..Default::default()
    };
    placement::apply_pull_policy(config, &mut pod_spec);

    let deployment = build_deployment(build_object_meta(&ns, &server_name, instance)?, selector, pod_spec);

    Ok(DexObjects { service_account, role, role_binding, service, deployment })
}

pub fn build_keycloak(config: &EffectiveConfig, instance: &ArgoCD) -> anyhow::Result<DeploymentConfig> {
    let ns = instance.namespace().unwrap_or_default();
    let name = keycloak_name(instance);
    let keycloak = instance.spec.sso.as_ref().and_then(|s| s.keycloak.as_ref());
    let image = format!(
        "{}:{}",
        keycloak.and_then(|k| k.image.as_deref()).unwrap_or(DEFAULT_KEYCLOAK_IMAGE),
        keycloak.and_then(|k| k.version.as_deref()).unwrap_or(DEFAULT_KEYCLOAK_VERSION),
    );
    let selector = kmap!("deploymentConfig" => &name);

    let mut pod_spec = corev1::PodSpec {
        containers: vec![corev1::Container {
            name: name.clone(),
            image: Some(image),
            ports: Some(vec![container_port("https", KEYCLOAK_HTTPS_PORT)]),
            resources: keycloak.and_then(|k| k.resources.clone()),
            ..Default::default()
        }],
        ..Default::default()
    };
    placement::apply_pull_policy(config, &mut pod_spec);

    let mut dc = DeploymentConfig::new(
        &name,
        DeploymentConfigSpec {
            replicas: Some(1),
            selector: Some(selector.clone()),
            template: Some(corev1::PodTemplateSpec {
                metadata: Some(metav1::ObjectMeta { labels: Some(selector), ..Default::default() }),
                spec: Some(pod_spec),
            }),
            ..Default::default()
        },
    );
    dc.metadata = build_object_meta(&ns, &name, instance)?;
    Ok(dc)
}

async fn delete_if_owned<K>(client: &kube::Client, instance: &ArgoCD, name: &str) -> EmptyResult
where
    K: Resource<DynamicType = (), Scope = k8s_openapi::NamespaceResourceScope>
        + Clone
        + std::fmt::Debug
        + DeserializeOwned,
{
    let ns = instance.namespace().unwrap_or_default();
    let api = kube::Api::<K>::namespaced(client.clone(), &ns);
    writer::delete_owned(&api, name, |obj: &K| is_owned_by(obj, instance)).await?;
    Ok(())
}

async fn teardown_dex(client: &kube::Client, instance: &ArgoCD) -> EmptyResult {
    let sa_name = dex_service_account_name(instance);
    let server_name = dex_server_name(instance);
    delete_if_owned::<appsv1::Deployment>(client, instance, &server_name).await?;
    delete_if_owned::<corev1::Service>(client, instance, &server_name).await?;
    delete_if_owned::<rbacv1::RoleBinding>(client, instance, &sa_name).await?;
    delete_if_owned::<rbacv1::Role>(client, instance, &sa_name).await?;
    delete_if_owned::<corev1::ServiceAccount>(client, instance, &sa_name).await
}

async fn teardown_keycloak(client: &kube::Client, instance: &ArgoCD) -> EmptyResult {
    delete_if_owned::<DeploymentConfig>(client, instance, &keycloak_name(instance)).await
}

// Drives the children toward the state `.spec.sso` asks for.  A Failed state tears down anything a
// previous keycloak configuration left behind, and leaves dex alone.
pub async fn reconcile(client: &kube::Client, config: &EffectiveConfig, instance: &ArgoCD) -> anyhow::Result<SsoState> {
    let state = evaluate(instance);
    let ns = instance.namespace().unwrap_or_default();
    debug!("SSO state for {} is {state:?}", instance.namespaced_name());

    match &state {
        SsoState::None => {
            teardown_dex(client, instance).await?;
            teardown_keycloak(client, instance).await?;
        },
        SsoState::DexRunning => {
            teardown_keycloak(client, instance).await?;
            let dex = build_dex(config, instance)?;
            writer::apply(&kube::Api::namespaced(client.clone(), &ns), &dex.service_account).await?;
            writer::apply(&kube::Api::namespaced(client.clone(), &ns), &dex.role).await?;
            writer::apply(&kube::Api::namespaced(client.clone(), &ns), &dex.role_binding).await?;
            writer::apply(&kube::Api::namespaced(client.clone(), &ns), &dex.service).await?;
            writer::apply(&kube::Api::namespaced(client.clone(), &ns), &dex.deployment).await?;
        },
        SsoState::KeycloakRunning => {
            teardown_dex(client, instance).await?;
            let dc = build_keycloak(config, instance)?;
            writer::apply(&kube::Api::namespaced(client.clone(), &ns), &dc).await?;
        },
        SsoState::Failed(reason) => {
            warn!("invalid SSO configuration on {}: {reason}", instance.namespaced_name());
            teardown_keycloak(client, instance).await?;
        },
    }
    Ok(state)
}
