use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1 as appsv1;
use k8s_openapi::api::core::v1 as corev1;
use k8s_openapi::apimachinery::pkg::apis::meta::v1 as metav1;
use rstest::*;

use crate::constants::*;

#[fixture]
pub fn test_namespace(#[default(TEST_MANAGED_NAMESPACE)] name: &str) -> corev1::Namespace {
    corev1::Namespace {
        metadata: metav1::ObjectMeta {
            name: Some(name.into()),
            labels: Some(BTreeMap::from([("foo".into(), "bar".into())])),
            ..Default::default()
        },
        ..Default::default()
    }
}

#[fixture]
pub fn test_managed_namespace(#[default(TEST_MANAGED_NAMESPACE)] name: &str) -> corev1::Namespace {
    corev1::Namespace {
        metadata: metav1::ObjectMeta {
            name: Some(name.into()),
            labels: Some(BTreeMap::from([("argocd.argoproj.io/managed-by".into(), TEST_NAMESPACE.into())])),
            ..Default::default()
        },
        status: Some(corev1::NamespaceStatus { phase: Some("Active".into()), ..Default::default() }),
        ..Default::default()
    }
}

#[fixture]
pub fn test_deployment(#[default(TEST_DEPLOYMENT)] name: &str) -> appsv1::Deployment {
    let labels = BTreeMap::from([("app".to_string(), name.to_string())]);
    appsv1::Deployment {
        metadata: metav1::ObjectMeta {
            namespace: Some(TEST_NAMESPACE.into()),
            name: Some(name.into()),
            ..Default::default()
        },
        spec: Some(appsv1::DeploymentSpec {
            replicas: Some(1),
            selector: metav1::LabelSelector { match_labels: Some(labels.clone()), ..Default::default() },
            template: corev1::PodTemplateSpec {
                metadata: Some(metav1::ObjectMeta { labels: Some(labels), ..Default::default() }),
                spec: Some(corev1::PodSpec {
                    containers: vec![
                        corev1::Container {
                            name: "main".into(),
                            image: Some("quay.io/example/main:v1".into()),
                            env: Some(vec![
                                corev1::EnvVar { name: "FOO".into(), value: Some("1".into()), ..Default::default() },
                                corev1::EnvVar { name: "BAR".into(), value: Some("2".into()), ..Default::default() },
                            ]),
                            volume_mounts: Some(vec![
                                corev1::VolumeMount {
                                    name: "certs".into(),
                                    mount_path: "/etc/certs".into(),
                                    ..Default::default()
                                },
                                corev1::VolumeMount {
                                    name: "config".into(),
                                    mount_path: "/etc/config".into(),
                                    ..Default::default()
                                },
                            ]),
                            ..Default::default()
                        },
                        corev1::Container {
                            name: "sidecar".into(),
                            image: Some("quay.io/example/sidecar:v1".into()),
                            ..Default::default()
                        },
                    ],
                    volumes: Some(vec![
                        corev1::Volume {
                            name: "certs".into(),
                            secret: Some(corev1::SecretVolumeSource {
                                secret_name: Some("certs".into()),
                                ..Default::default()
                            }),
                            ..Default::default()
                        },
                        corev1::Volume {
                            name: "config".into(),
                            config_map: Some(corev1::ConfigMapVolumeSource {
                                name: "config".into(),
                                ..Default::default()
                            }),
                            ..Default::default()
                        },
                    ]),
                    tolerations: Some(vec![
                        corev1::Toleration {
                            key: Some("node-role.kubernetes.io/infra".into()),
                            operator: Some("Exists".into()),
                            effect: Some("NoSchedule".into()),
                            ..Default::default()
                        },
                        corev1::Toleration {
                            key: Some("node-role.kubernetes.io/infra".into()),
                            operator: Some("Exists".into()),
                            effect: Some("NoExecute".into()),
                            ..Default::default()
                        },
                    ]),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}
