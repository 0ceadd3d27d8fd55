use super::*;
use crate::sso::SsoState;
use crate::status::*;

fn all_components(ready: i32) -> ObservedComponents {
    ObservedComponents {
        server: Some(ready_deployment("server", 1, ready)),
        repo: Some(ready_deployment("repo", 1, 1)),
        redis: Some(ready_deployment("redis", 1, 1)),
        application_set_controller: Some(ready_deployment("appset", 1, 1)),
        dex: None,
        route: None,
    }
}

#[rstest]
#[case::missing(None, COMPONENT_UNKNOWN)]
#[case::ready(Some(ready_deployment("foo", 2, 2)), COMPONENT_RUNNING)]
#[case::not_ready(Some(ready_deployment("foo", 2, 1)), COMPONENT_PENDING)]
fn test_deployment_status(#[case] depl: Option<appsv1::Deployment>, #[case] expected: &str) {
    assert_eq!(deployment_status(depl.as_ref()), expected);
}

#[rstest]
fn test_redis_deployment_name(mut test_argocd: ArgoCD) {
    assert_eq!(redis_deployment_name(&test_argocd), format!("{TEST_ARGOCD_NAME}-redis"));

    test_argocd.spec.ha = Some(ArgoCDHASpec { enabled: true, ..Default::default() });
    assert_eq!(redis_deployment_name(&test_argocd), format!("{TEST_ARGOCD_NAME}-redis-ha-haproxy"));
}

#[rstest]
fn test_compute_available() {
    let status = compute(&all_components(1), &SsoState::None);
    assert_eq!(status.phase.as_deref(), Some(PHASE_AVAILABLE));
    assert_eq!(status.server.as_deref(), Some(COMPONENT_RUNNING));
    assert_none!(status.sso);
    assert_none!(status.host);
}

#[rstest]
fn test_compute_pending_component() {
    let status = compute(&all_components(0), &SsoState::None);
    assert_eq!(status.phase.as_deref(), Some(PHASE_PENDING));
    assert_eq!(status.server.as_deref(), Some(COMPONENT_PENDING));
}

#[rstest]
fn test_compute_nothing_observed() {
    let status = compute(&ObservedComponents::default(), &SsoState::None);
    assert_eq!(status.phase.as_deref(), Some(PHASE_PENDING));
    assert_eq!(status.repo.as_deref(), Some(COMPONENT_UNKNOWN));
}

#[rstest]
fn test_compute_failed_sso_holds_phase() {
    let status = compute(&all_components(1), &SsoState::Failed("bad".into()));
    assert_eq!(status.phase.as_deref(), Some(PHASE_PENDING));
    assert_eq!(status.sso.as_deref(), Some(COMPONENT_FAILED));
}

#[rstest]
fn test_compute_dex_and_host(test_server_route: gitops_api::openshift::Route) {
    let mut observed = all_components(1);
    observed.dex = Some(ready_deployment("dex", 1, 0));
    observed.route = Some(test_server_route);

    let status = compute(&observed, &SsoState::DexRunning);
    assert_eq!(status.sso.as_deref(), Some(COMPONENT_PENDING));
    assert_eq!(status.host.as_deref(), Some(TEST_ROUTE_HOST));
    assert_eq!(status.phase.as_deref(), Some(PHASE_AVAILABLE));
}

#[rstest]
#[tokio::test]
async fn test_patch_status_unchanged_is_noop(mut test_argocd: ArgoCD) {
    let status = compute(&all_components(1), &SsoState::None);
    test_argocd.status = Some(status.clone());

    let (mut fake_apiserver, client) = make_fake_apiserver();
    fake_apiserver.build();

    patch_status(&client, &test_argocd, &status).await.unwrap();
    fake_apiserver.assert();
}

#[rstest]
#[tokio::test]
#[traced_test]
async fn test_patch_phase(test_argocd: ArgoCD) {
    let (mut fake_apiserver, client) = make_fake_apiserver();
    let mut patched = test_argocd.clone();
    patched.status = Some(ArgoCDStatus { phase: Some(PHASE_FAILED.into()), ..Default::default() });
    fake_apiserver.handle(move |when, then| {
        when.method(PATCH)
            .path(format!("/apis/argoproj.io/v1beta1/namespaces/{TEST_NAMESPACE}/argocds/{TEST_ARGOCD_NAME}/status"));
        then.json_body_obj(&patched);
    });
    fake_apiserver.build();

    patch_phase(&client, &test_argocd, PHASE_FAILED).await.unwrap();
    assert!(logs_contain("updated status"));
    fake_apiserver.assert();
}
