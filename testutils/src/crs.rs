use gitops_api::argoproj::*;
use gitops_api::openshift::*;
use gitops_api::v1alpha1::*;
use k8s_openapi::apimachinery::pkg::apis::meta::v1 as metav1;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use rstest::*;

use crate::constants::*;

#[fixture]
pub fn test_gitops_service() -> GitopsService {
    GitopsService {
        metadata: metav1::ObjectMeta {
            name: Some(GITOPS_SERVICE_SINGLETON_NAME.into()),
            uid: Some(TEST_GITOPS_SERVICE_UID.into()),
            ..Default::default()
        },
        spec: Default::default(),
        status: None,
    }
}

#[fixture]
pub fn test_argocd(#[default(TEST_ARGOCD_NAME)] name: &str) -> ArgoCD {
    ArgoCD {
        metadata: metav1::ObjectMeta {
            namespace: Some(TEST_NAMESPACE.into()),
            name: Some(name.into()),
            uid: Some(TEST_ARGOCD_UID.into()),
            ..Default::default()
        },
        spec: ArgoCDSpec {
            server: Some(ArgoCDServerSpec {
                route: Some(ArgoCDRouteSpec { enabled: true, ..Default::default() }),
                ..Default::default()
            }),
            ..Default::default()
        },
        status: None,
    }
}

#[fixture]
pub fn test_rollout_manager() -> RolloutManager {
    RolloutManager {
        metadata: metav1::ObjectMeta {
            namespace: Some(TEST_NAMESPACE.into()),
            name: Some(TEST_ROLLOUT_MANAGER_NAME.into()),
            uid: Some("rollouts-9012".into()),
            ..Default::default()
        },
        spec: Default::default(),
        status: None,
    }
}

#[fixture]
pub fn test_server_route(#[default(Some(TEST_ROUTE_HOST))] host: Option<&str>) -> Route {
    Route {
        metadata: metav1::ObjectMeta {
            namespace: Some("openshift-gitops".into()),
            name: Some("openshift-gitops-server".into()),
            ..Default::default()
        },
        spec: RouteSpec {
            port: Some(RoutePort { target_port: IntOrString::String("https".into()) }),
            to: RouteTargetReference {
                kind: "Service".into(),
                name: "openshift-gitops-server".into(),
                weight: Some(100),
            },
            ..Default::default()
        },
        status: host.map(|h| RouteStatus {
            ingress: Some(vec![RouteIngress { host: Some(h.into()), router_name: Some("default".into()) }]),
        }),
    }
}
