use gitops_core::config::EffectiveConfig;
use gitops_core::k8s::{
    build_global_object_meta,
    build_object_meta,
};
use gitops_core::macros::*;
use gitops_core::prelude::*;
use gitops_core::writer;
use tracing::*;

use crate::placement;
use crate::rbac::*;
use crate::workload::*;

pub const BACKEND_NAME: &str = "cluster";
pub const BACKEND_SERVICE_ACCOUNT_NAME: &str = "gitops-service-cluster";
pub const BACKEND_PORT: i32 = 8080;
pub const BACKEND_TLS_VOLUME_NAME: &str = "backend-ssl";
pub const BACKEND_TLS_MOUNT_PATH: &str = "/etc/gitops/ssl";
pub const BACKEND_INSECURE_ENV_VAR: &str = "INSECURE";

pub struct BackendObjects {
    pub service_account: corev1::ServiceAccount,
    pub cluster_role: rbacv1::ClusterRole,
    pub cluster_role_binding: rbacv1::ClusterRoleBinding,
    pub service: corev1::Service,
    pub deployment: appsv1::Deployment,
}

pub fn backend_rules() -> Vec<rbacv1::PolicyRule> {
    let read = &["get", "list", "watch"];
    vec![rule(&["argoproj.io"], &["applications"], read), rule(&[""], &["secrets"], read)]
}

fn backend_pod_spec(config: &EffectiveConfig, owner: &GitopsService) -> corev1::PodSpec {
    let mut pod_spec = corev1::PodSpec {
        service_account_name: Some(BACKEND_SERVICE_ACCOUNT_NAME.into()),
        containers: vec![corev1::Container {
            name: BACKEND_NAME.into(),
            image: Some(config.backend_image.clone()),
            env: Some(vec![corev1::EnvVar {
                name: BACKEND_INSECURE_ENV_VAR.into(),
                value: Some("true".into()),
                ..Default::default()
            }]),
            ports: Some(vec![container_port("http", BACKEND_PORT)]),
            resources: Some(
                owner
                    .backend_resources()
                    .cloned()
                    .unwrap_or_else(|| resources("250m", "128Mi", "500m", "256Mi")),
            ),
            security_context: Some(restricted_security_context()),
            volume_mounts: Some(vec![corev1::VolumeMount {
                name: BACKEND_TLS_VOLUME_NAME.into(),
                mount_path: BACKEND_TLS_MOUNT_PATH.into(),
                read_only: Some(true),
                ..Default::default()
            }]),
            ..Default::default()
        }],
        volumes: Some(vec![corev1::Volume {
            name: BACKEND_TLS_VOLUME_NAME.into(),
            secret: Some(corev1::SecretVolumeSource {
                secret_name: Some(BACKEND_NAME.into()),
                default_mode: Some(VOLUME_DEFAULT_MODE),
                ..Default::default()
            }),
            ..Default::default()
        }]),
        ..Default::default()
    };
    placement::apply_to_pod(config, &mut pod_spec);
    placement::apply_pull_policy(config, &mut pod_spec);
    pod_spec
}

pub fn build_backend(config: &EffectiveConfig, owner: &GitopsService, ns: &str) -> anyhow::Result<BackendObjects> {
    let selector = kmap!(APP_KUBERNETES_IO_NAME_KEY => BACKEND_NAME);

    let service_account = corev1::ServiceAccount {
        metadata: build_object_meta(ns, BACKEND_SERVICE_ACCOUNT_NAME, owner)?,
        ..Default::default()
    };
    let cluster_role = build_cluster_role(build_global_object_meta(BACKEND_SERVICE_ACCOUNT_NAME, owner)?, backend_rules());
    let cluster_role_binding = build_cluster_role_binding(
        build_global_object_meta(BACKEND_SERVICE_ACCOUNT_NAME, owner)?,
        BACKEND_SERVICE_ACCOUNT_NAME,
        vec![service_account_subject(ns, BACKEND_SERVICE_ACCOUNT_NAME)],
    );

    let mut service_meta = build_object_meta(ns, BACKEND_NAME, owner)?;
    service_meta.annotations = klabel!(SERVING_CERT_ANNOTATION_KEY => BACKEND_NAME);
    let service = corev1::Service {
        metadata: service_meta,
        spec: Some(corev1::ServiceSpec {
            selector: Some(selector.clone()),
            ports: Some(vec![service_port(Some("http"), BACKEND_PORT)]),
            ..Default::default()
        }),
        ..Default::default()
    };

    let deployment =
        build_deployment(build_object_meta(ns, BACKEND_NAME, owner)?, selector, backend_pod_spec(config, owner));

    Ok(BackendObjects { service_account, cluster_role, cluster_role_binding, service, deployment })
}

pub async fn reconcile(client: &kube::Client, config: &EffectiveConfig, owner: &GitopsService, ns: &str) -> EmptyResult {
    debug!("reconciling backend in {ns}");
    let objs = build_backend(config, owner, ns)?;

    writer::apply(&kube::Api::namespaced(client.clone(), ns), &objs.service_account).await?;
    writer::apply(&kube::Api::all(client.clone()), &objs.cluster_role).await?;
    writer::apply(&kube::Api::all(client.clone()), &objs.cluster_role_binding).await?;
    writer::apply(&kube::Api::namespaced(client.clone(), ns), &objs.deployment).await?;
    writer::apply(&kube::Api::namespaced(client.clone(), ns), &objs.service).await?;
    Ok(())
}
