use std::collections::BTreeMap;

use gitops_core::prelude::*;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

pub const PROTOCOL_TCP: &str = "TCP";
pub const SECCOMP_RUNTIME_DEFAULT: &str = "RuntimeDefault";

pub fn container_port(name: &str, port: i32) -> corev1::ContainerPort {
    corev1::ContainerPort {
        name: Some(name.into()),
        container_port: port,
        protocol: Some(PROTOCOL_TCP.into()),
        ..Default::default()
    }
}

pub fn service_port(name: Option<&str>, port: i32) -> corev1::ServicePort {
    corev1::ServicePort {
        name: name.map(String::from),
        port,
        protocol: Some(PROTOCOL_TCP.into()),
        target_port: Some(IntOrString::Int(port)),
        ..Default::default()
    }
}

pub fn resources(req_cpu: &str, req_mem: &str, lim_cpu: &str, lim_mem: &str) -> corev1::ResourceRequirements {
    corev1::ResourceRequirements {
        requests: Some(BTreeMap::from([
            ("cpu".into(), Quantity(req_cpu.into())),
            ("memory".into(), Quantity(req_mem.into())),
        ])),
        limits: Some(BTreeMap::from([
            ("cpu".into(), Quantity(lim_cpu.into())),
            ("memory".into(), Quantity(lim_mem.into())),
        ])),
        ..Default::default()
    }
}

pub fn restricted_security_context() -> corev1::SecurityContext {
    corev1::SecurityContext {
        allow_privilege_escalation: Some(false),
        run_as_non_root: Some(true),
        capabilities: Some(corev1::Capabilities { drop: Some(vec!["ALL".into()]), ..Default::default() }),
        seccomp_profile: Some(corev1::SeccompProfile {
            type_: SECCOMP_RUNTIME_DEFAULT.into(),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn runtime_default_pod_security_context() -> corev1::PodSecurityContext {
    corev1::PodSecurityContext {
        seccomp_profile: Some(corev1::SeccompProfile {
            type_: SECCOMP_RUNTIME_DEFAULT.into(),
            ..Default::default()
        }),
        ..Default::default()
    }
}

// Single-replica Deployment whose pods are selected by exactly `selector`
pub fn build_deployment(
    meta: metav1::ObjectMeta,
    selector: BTreeMap<String, String>,
    pod_spec: corev1::PodSpec,
) -> appsv1::Deployment {
    appsv1::Deployment {
        metadata: meta,
        spec: Some(appsv1::DeploymentSpec {
            replicas: Some(1),
            selector: metav1::LabelSelector { match_labels: Some(selector.clone()), ..Default::default() },
            template: corev1::PodTemplateSpec {
                metadata: Some(metav1::ObjectMeta { labels: Some(selector), ..Default::default() }),
                spec: Some(pod_spec),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}
