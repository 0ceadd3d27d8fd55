use super::*;
use crate::sso::*;

fn sso(provider: Option<&str>, dex: Option<ArgoCDDexSpec>) -> ArgoCDSSOSpec {
    ArgoCDSSOSpec {
        provider: provider.map(String::from),
        dex,
        ..Default::default()
    }
}

fn oauth_dex() -> Option<ArgoCDDexSpec> {
    Some(ArgoCDDexSpec { openshift_oauth: true, ..Default::default() })
}

#[rstest]
#[case::unset(None, true)]
#[case::dex_oauth(Some(sso(Some(SSO_PROVIDER_DEX), oauth_dex())), true)]
#[case::dex_config(
    Some(sso(Some(SSO_PROVIDER_DEX), Some(ArgoCDDexSpec { config: Some("connectors: []".into()), ..Default::default() }))),
    true
)]
#[case::dex_empty(Some(sso(Some(SSO_PROVIDER_DEX), Some(ArgoCDDexSpec::default()))), false)]
#[case::dex_missing(Some(sso(Some(SSO_PROVIDER_DEX), None)), false)]
#[case::keycloak(Some(sso(Some(SSO_PROVIDER_KEYCLOAK), None)), true)]
#[case::keycloak_with_dex(Some(sso(Some(SSO_PROVIDER_KEYCLOAK), oauth_dex())), false)]
#[case::unknown_provider(Some(sso(Some("okta"), None)), false)]
#[case::no_provider(Some(sso(None, oauth_dex())), false)]
fn test_evaluate(mut test_argocd: ArgoCD, #[case] spec: Option<ArgoCDSSOSpec>, #[case] valid: bool) {
    test_argocd.spec.sso = spec;
    assert_eq!(!evaluate(&test_argocd).is_failed(), valid);
}

#[rstest]
fn test_evaluate_states(mut test_argocd: ArgoCD) {
    assert_eq!(evaluate(&test_argocd), SsoState::None);

    test_argocd.spec.sso = Some(sso(Some(SSO_PROVIDER_DEX), oauth_dex()));
    assert_eq!(evaluate(&test_argocd), SsoState::DexRunning);

    test_argocd.spec.sso = Some(sso(Some(SSO_PROVIDER_KEYCLOAK), None));
    assert_eq!(evaluate(&test_argocd), SsoState::KeycloakRunning);
}

#[rstest]
fn test_build_dex(mut config: EffectiveConfig, mut test_argocd: ArgoCD) {
    config.image_pull_policy = PullPolicy::Always;
    test_argocd.spec.sso = Some(sso(Some(SSO_PROVIDER_DEX), oauth_dex()));
    let dex = build_dex(&config, &test_argocd).unwrap();

    let server_name = format!("{TEST_ARGOCD_NAME}-dex-server");
    assert_eq!(dex.deployment.name_any(), server_name);
    assert_eq!(dex.service.name_any(), server_name);
    assert_eq!(dex.service_account.name_any(), format!("{TEST_ARGOCD_NAME}-argocd-dex-server"));
    assert_eq!(dex.deployment.owner_references()[0].uid, TEST_ARGOCD_UID);

    let pod = pod_spec(&dex.deployment);
    assert_eq!(pod.service_account_name.as_deref(), Some(dex.service_account.name_any().as_str()));
    assert_eq!(container(pod).image.as_deref(), Some(DEFAULT_DEX_IMAGE));
    assert_eq!(container(pod).image_pull_policy.as_deref(), Some("Always"));

    let ports: Vec<_> = dex.service.spec.unwrap().ports.unwrap().iter().map(|p| p.port).collect();
    assert_eq!(ports, vec![DEX_HTTP_PORT, DEX_GRPC_PORT]);
}

#[rstest]
#[case::defaults(None, None, format!("{DEFAULT_KEYCLOAK_IMAGE}:{DEFAULT_KEYCLOAK_VERSION}"))]
#[case::custom(Some("quay.io/me/keycloak"), Some("24"), "quay.io/me/keycloak:24".to_string())]
fn test_build_keycloak_image(
    config: EffectiveConfig,
    mut test_argocd: ArgoCD,
    #[case] image: Option<&str>,
    #[case] version: Option<&str>,
    #[case] expected: String,
) {
    test_argocd.spec.sso = Some(ArgoCDSSOSpec {
        provider: Some(SSO_PROVIDER_KEYCLOAK.into()),
        keycloak: Some(ArgoCDKeycloakSpec {
            image: image.map(String::from),
            version: version.map(String::from),
            ..Default::default()
        }),
        ..Default::default()
    });
    let dc = build_keycloak(&config, &test_argocd).unwrap();

    let pod = dc.spec.template.as_ref().and_then(|t| t.spec.as_ref()).unwrap();
    assert_eq!(dc.name_any(), format!("{TEST_ARGOCD_NAME}-keycloak"));
    assert_eq!(container(pod).image, Some(expected));
}

#[rstest]
#[tokio::test]
#[traced_test]
async fn test_reconcile_failed_tears_down_keycloak(config: EffectiveConfig, mut test_argocd: ArgoCD) {
    test_argocd.spec.sso = Some(sso(Some("okta"), None));

    let (mut fake_apiserver, client) = make_fake_apiserver();
    fake_apiserver.handle_not_found(format!(
        "/apis/apps.openshift.io/v1/namespaces/{TEST_NAMESPACE}/deploymentconfigs/{TEST_ARGOCD_NAME}-keycloak"
    ));
    fake_apiserver.build();

    let state = reconcile(&client, &config, &test_argocd).await.unwrap();
    assert!(state.is_failed());
    assert!(logs_contain("invalid SSO configuration"));
    fake_apiserver.assert();
}

#[rstest]
#[tokio::test]
async fn test_reconcile_keycloak_leaves_foreign_dex(config: EffectiveConfig, mut test_argocd: ArgoCD) {
    test_argocd.spec.sso = Some(sso(Some(SSO_PROVIDER_KEYCLOAK), None));
    let server_name = format!("{TEST_ARGOCD_NAME}-dex-server");
    let sa_name = format!("{TEST_ARGOCD_NAME}-argocd-dex-server");
    let keycloak = build_keycloak(&config, &test_argocd).unwrap();

    let (mut fake_apiserver, client) = make_fake_apiserver();

    // A dex deployment with no owner reference belongs to someone else and is never deleted
    let mut foreign = test_deployment(&server_name);
    foreign.metadata.owner_references = None;
    fake_apiserver.handle_get(format!("/apis/apps/v1/namespaces/{TEST_NAMESPACE}/deployments/{server_name}"), foreign);
    fake_apiserver.handle_not_found(format!("/api/v1/namespaces/{TEST_NAMESPACE}/services/{server_name}"));
    fake_apiserver.handle_not_found(format!(
        "/apis/rbac.authorization.k8s.io/v1/namespaces/{TEST_NAMESPACE}/rolebindings/{sa_name}"
    ));
    fake_apiserver
        .handle_not_found(format!("/apis/rbac.authorization.k8s.io/v1/namespaces/{TEST_NAMESPACE}/roles/{sa_name}"));
    fake_apiserver.handle_not_found(format!("/api/v1/namespaces/{TEST_NAMESPACE}/serviceaccounts/{sa_name}"));
    fake_apiserver.handle_get(
        format!("/apis/apps.openshift.io/v1/namespaces/{TEST_NAMESPACE}/deploymentconfigs/{TEST_ARGOCD_NAME}-keycloak"),
        keycloak,
    );
    fake_apiserver.build();

    let state = reconcile(&client, &config, &test_argocd).await.unwrap();
    assert_eq!(state, SsoState::KeycloakRunning);
    fake_apiserver.assert();
}
