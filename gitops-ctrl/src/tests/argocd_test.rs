use kube::runtime::controller::Action;
use serde_json::json;

use super::*;
use crate::argocd::*;
use crate::rbac::*;

const RBAC_API: &str = "/apis/rbac.authorization.k8s.io/v1";

fn list(items: serde_json::Value) -> serde_json::Value {
    json!({"apiVersion": "v1", "kind": "List", "metadata": {}, "items": items})
}

#[fixture]
fn deleting_argocd(mut test_argocd: ArgoCD) -> ArgoCD {
    test_argocd.metadata.deletion_timestamp = Some(metav1::Time(Default::default()));
    test_argocd.metadata.finalizers = Some(vec![ARGOCD_FINALIZER.into()]);
    test_argocd
}

#[rstest]
#[tokio::test]
async fn test_finalize_without_finalizer(config: EffectiveConfig, mut deleting_argocd: ArgoCD) {
    deleting_argocd.metadata.finalizers = None;

    let (mut fake_apiserver, client) = make_fake_apiserver();
    fake_apiserver.build();

    assert_eq!(finalize(&client, &config, &deleting_argocd).await.unwrap(), Action::await_change());
    fake_apiserver.assert();
}

#[rstest]
#[tokio::test]
#[traced_test]
async fn test_finalize_cleans_up_before_releasing(
    config: EffectiveConfig,
    deleting_argocd: ArgoCD,
    test_managed_namespace: corev1::Namespace,
) {
    let projected = rbacv1::Role {
        metadata: scoped_meta(
            Some(TEST_MANAGED_NAMESPACE),
            &server_sa(&deleting_argocd),
            &deleting_argocd,
            RBAC_SCOPE_MANAGED_NAMESPACE,
        ),
        ..Default::default()
    };
    let cluster_role = rbacv1::ClusterRole {
        metadata: scoped_meta(None, "test-argocd-cluster-role", &deleting_argocd, RBAC_SCOPE_CLUSTER),
        ..Default::default()
    };
    let released = deleting_argocd.clone();

    let (mut fake_apiserver, client) = make_fake_apiserver();
    let managed = list(json!([test_managed_namespace]));
    fake_apiserver.handle(move |when, then| {
        when.method(GET)
            .path("/api/v1/namespaces")
            .query_param("labelSelector", format!("{MANAGED_BY_LABEL_KEY}={TEST_NAMESPACE}"));
        then.json_body(managed.clone());
    });
    fake_apiserver.handle(|when, then| {
        when.method(GET)
            .path("/api/v1/namespaces")
            .query_param("labelSelector", format!("{MANAGED_BY_CLUSTER_ARGOCD_LABEL_KEY}={TEST_NAMESPACE}"));
        then.json_body(list(json!([])));
    });

    let roles = list(json!([projected]));
    fake_apiserver.handle(move |when, then| {
        when.method(GET).path(format!("{RBAC_API}/namespaces/{TEST_MANAGED_NAMESPACE}/roles"));
        then.json_body(roles.clone());
    });
    let projected_name = projected.name_any();
    fake_apiserver.handle(move |when, then| {
        when.method(DELETE)
            .path(format!("{RBAC_API}/namespaces/{TEST_MANAGED_NAMESPACE}/roles/{projected_name}"));
        then.json_body(status_ok());
    });
    for path in [
        format!("{RBAC_API}/namespaces/{TEST_MANAGED_NAMESPACE}/rolebindings"),
        format!("{RBAC_API}/namespaces/{TEST_NAMESPACE}/roles"),
        format!("{RBAC_API}/namespaces/{TEST_NAMESPACE}/rolebindings"),
        format!("{RBAC_API}/clusterrolebindings"),
    ] {
        fake_apiserver.handle(move |when, then| {
            when.method(GET).path(&path);
            then.json_body(list(json!([])));
        });
    }

    let cluster_roles = list(json!([cluster_role]));
    fake_apiserver.handle(move |when, then| {
        when.method(GET).path(format!("{RBAC_API}/clusterroles"));
        then.json_body(cluster_roles.clone());
    });
    fake_apiserver.handle(|when, then| {
        when.method(DELETE).path(format!("{RBAC_API}/clusterroles/test-argocd-cluster-role"));
        then.json_body(status_ok());
    });

    fake_apiserver.handle(move |when, then| {
        when.method(PATCH)
            .path(format!("/apis/argoproj.io/v1beta1/namespaces/{TEST_NAMESPACE}/argocds/{TEST_ARGOCD_NAME}"))
            .json_body(json!({"metadata": {"finalizers": []}}));
        then.json_body_obj(&released);
    });
    fake_apiserver.build();

    assert_eq!(finalize(&client, &config, &deleting_argocd).await.unwrap(), Action::await_change());
    logs_assert(|lines: &[&str]| {
        let released_at = lines
            .iter()
            .position(|l| l.contains("removing finalizer"))
            .ok_or("finalizer was never removed")?;
        let deletes: Vec<_> = lines.iter().enumerate().filter(|(_, l)| l.contains("deleted ")).collect();
        match deletes.last() {
            Some((i, _)) if deletes.len() == 2 && *i < released_at => Ok(()),
            _ => Err(format!("expected two deletes before line {released_at}, got {deletes:?}")),
        }
    });
    fake_apiserver.assert();
}
