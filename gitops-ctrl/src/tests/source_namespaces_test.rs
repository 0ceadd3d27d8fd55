use serde_json::json;

use super::*;
use crate::rbac::*;
use crate::source_namespaces::*;

#[rstest]
fn test_build_source_namespace_rbac(test_argocd: ArgoCD) {
    let (role, binding) = build_source_namespace_rbac(&test_argocd, TEST_SOURCE_NAMESPACE);

    let name = format!("{TEST_NAMESPACE}_{TEST_SOURCE_NAMESPACE}");
    assert_eq!(role.name_any(), name);
    assert_eq!(role.namespace().as_deref(), Some(TEST_SOURCE_NAMESPACE));
    assert_eq!(role.rules, Some(source_namespace_rules()));
    assert_eq!(
        role.labels().get(ARGOCD_RBAC_SCOPE_LABEL_KEY).map(String::as_str),
        Some(RBAC_SCOPE_SOURCE_NAMESPACE)
    );

    assert_eq!(binding.role_ref, role_ref(ROLE_KIND, &name));
    assert_eq!(
        binding.subjects.unwrap(),
        vec![
            service_account_subject(TEST_NAMESPACE, &server_sa(&test_argocd)),
            service_account_subject(TEST_NAMESPACE, &application_controller_sa(&test_argocd)),
        ]
    );
}

#[rstest]
#[tokio::test]
#[traced_test]
async fn test_reconcile_skips_missing_source_namespace(mut test_argocd: ArgoCD) {
    test_argocd.spec.source_namespaces = Some(vec![TEST_SOURCE_NAMESPACE.into()]);

    let (mut fake_apiserver, client) = make_fake_apiserver();
    fake_apiserver.handle_not_found(format!("/api/v1/namespaces/{TEST_SOURCE_NAMESPACE}"));
    fake_apiserver.handle(|when, then| {
        when.method(GET).path("/api/v1/namespaces");
        then.json_body(json!({"apiVersion": "v1", "kind": "NamespaceList", "metadata": {}, "items": []}));
    });
    fake_apiserver.build();

    reconcile(&client, &test_argocd).await.unwrap();
    assert!(logs_contain("does not exist yet"));
    fake_apiserver.assert();
}

#[rstest]
#[tokio::test]
async fn test_reconcile_skips_managed_namespace(mut test_argocd: ArgoCD, test_managed_namespace: corev1::Namespace) {
    // The namespace is already bound to the instance through the managed-by label, so only the
    // cleanup listing happens
    test_argocd.spec.source_namespaces = Some(vec![TEST_MANAGED_NAMESPACE.into()]);

    let (mut fake_apiserver, client) = make_fake_apiserver();
    fake_apiserver.handle_get(format!("/api/v1/namespaces/{TEST_MANAGED_NAMESPACE}"), test_managed_namespace);
    fake_apiserver.handle(|when, then| {
        when.method(GET).path("/api/v1/namespaces");
        then.json_body(json!({"apiVersion": "v1", "kind": "NamespaceList", "metadata": {}, "items": []}));
    });
    fake_apiserver.build();

    reconcile(&client, &test_argocd).await.unwrap();
    fake_apiserver.assert();
}
