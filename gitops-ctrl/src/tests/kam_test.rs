use gitops_api::openshift::*;
use gitops_core::k8s::build_object_meta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use super::*;
use crate::kam::*;
use crate::workload::resources;

const CLI_DOWNLOADS_PATH: &str = "/apis/console.openshift.io/v1/consoleclidownloads";

fn kam_path(resource: &str) -> String {
    let prefix = match resource {
        "deployments" => "/apis/apps/v1",
        "routes" => "/apis/route.openshift.io/v1",
        _ => "/api/v1",
    };
    format!("{prefix}/namespaces/{DEFAULT_ARGOCD_NAMESPACE}/{resource}/{KAM_NAME}")
}

#[rstest]
fn test_build_kam(mut config: EffectiveConfig, test_gitops_service: GitopsService) {
    config.kam_image = "example.com/kam:latest".into();
    config.run_on_infra = true;

    let objs = build_kam(&config, &test_gitops_service, DEFAULT_ARGOCD_NAMESPACE).unwrap();
    assert_eq!(objs.deployment.owner_references()[0].uid, TEST_GITOPS_SERVICE_UID);

    let pod = pod_spec(&objs.deployment);
    assert_eq!(pod.node_selector, klabel!(KUBERNETES_IO_OS_KEY => "linux", INFRA_NODE_LABEL_KEY => ""));
    let c = container(pod);
    assert_eq!(c.image.as_deref(), Some("example.com/kam:latest"));
    assert_eq!(c.resources, Some(resources("250m", "128Mi", "500m", "256Mi")));

    let ports: Vec<_> = objs.service.spec.as_ref().unwrap().ports.iter().flatten().map(|p| p.port).collect();
    assert_eq!(ports, vec![KAM_PORT, KAM_TLS_PORT]);

    assert_eq!(objs.route.spec.to.name, KAM_NAME);
    assert_eq!(objs.route.spec.port.as_ref().unwrap().target_port, IntOrString::Int(KAM_TLS_PORT));
    let tls = objs.route.spec.tls.as_ref().unwrap();
    assert_eq!(tls.termination, ROUTE_TLS_TERMINATION_PASSTHROUGH);
    assert_eq!(tls.insecure_edge_termination_policy.as_deref(), Some(ROUTE_INSECURE_EDGE_POLICY_NONE));
}

#[rstest]
fn test_build_cli_download(test_gitops_service: GitopsService) {
    let download = build_cli_download(&test_gitops_service, "kam-openshift-gitops.apps.example.com").unwrap();

    assert_none!(download.namespace());
    assert_eq!(download.spec.display_name, KAM_DISPLAY_NAME);
    assert_eq!(download.spec.links[0].href, "https://kam-openshift-gitops.apps.example.com/kam/");
    assert_eq!(download.owner_references()[0].uid, TEST_GITOPS_SERVICE_UID);
}

#[rstest]
#[tokio::test]
#[traced_test]
async fn test_publish_cli_download(test_gitops_service: GitopsService) {
    let download = build_cli_download(&test_gitops_service, TEST_ROUTE_HOST).unwrap();

    let (mut fake_apiserver, client) = make_fake_apiserver();
    fake_apiserver.handle_not_found(format!("{CLI_DOWNLOADS_PATH}/{KAM_NAME}"));
    fake_apiserver.handle(move |when, then| {
        when.method(POST).path(CLI_DOWNLOADS_PATH);
        then.status(201).json_body_obj(&download);
    });
    fake_apiserver.build();

    publish_cli_download(&client, &test_gitops_service, TEST_ROUTE_HOST).await.unwrap();
    assert!(logs_contain("created ConsoleCLIDownload"));
    fake_apiserver.assert();
}

#[rstest]
#[tokio::test]
#[traced_test]
async fn test_publish_cli_download_no_console(test_gitops_service: GitopsService) {
    let (mut fake_apiserver, client) = make_fake_apiserver();
    fake_apiserver.handle_not_found(format!("{CLI_DOWNLOADS_PATH}/{KAM_NAME}"));
    fake_apiserver.handle(|when, then| {
        when.method(POST).path(CLI_DOWNLOADS_PATH);
        then.status(404).json_body(status_not_found());
    });
    fake_apiserver.build();

    publish_cli_download(&client, &test_gitops_service, TEST_ROUTE_HOST).await.unwrap();
    assert!(logs_contain("console API not available"));
    fake_apiserver.assert();
}

#[rstest]
#[tokio::test]
#[traced_test]
async fn test_reconcile_kam_disabled(mut config: EffectiveConfig, test_gitops_service: GitopsService) {
    config.disable_kam = true;
    let owned = build_kam(&config, &test_gitops_service, DEFAULT_ARGOCD_NAMESPACE).unwrap();

    // Someone else's Service that happens to be called kam stays put
    let mut foreign_service = owned.service.clone();
    foreign_service.metadata = build_object_meta(DEFAULT_ARGOCD_NAMESPACE, KAM_NAME, &test_argocd(TEST_ARGOCD_NAME)).unwrap();

    let (mut fake_apiserver, client) = make_fake_apiserver();
    fake_apiserver.handle_not_found(format!("{CLI_DOWNLOADS_PATH}/{KAM_NAME}"));
    fake_apiserver.handle_get(kam_path("routes"), owned.route);
    fake_apiserver.handle_get(kam_path("services"), foreign_service);
    fake_apiserver.handle_get(kam_path("deployments"), owned.deployment);
    for resource in ["routes", "deployments"] {
        fake_apiserver.handle(move |when, then| {
            when.method(DELETE).path(kam_path(resource));
            then.json_body(status_ok());
        });
    }
    fake_apiserver.build();

    assert!(reconcile(&client, &config, &test_gitops_service, DEFAULT_ARGOCD_NAMESPACE).await.unwrap());
    assert!(logs_contain("deleted Route"));
    assert!(logs_contain("not owned by the operator"));
    fake_apiserver.assert();
}
