use kube::runtime::reflector::ObjectRef;
use serde_json::json;

use super::*;
use crate::namespace::*;
use crate::rbac::*;

fn empty_list() -> serde_json::Value {
    json!({"apiVersion": "v1", "kind": "List", "metadata": {}, "items": []})
}

#[rstest]
fn test_build_projected_rbac(test_argocd: ArgoCD, config: EffectiveConfig) {
    let (roles, bindings) = build_projected_rbac(&test_argocd, TEST_MANAGED_NAMESPACE, &config, None);

    assert_eq!(roles.len(), 2);
    assert_eq!(bindings.len(), 2);

    let role_names: Vec<_> = roles.iter().map(|r| r.name_any()).collect();
    assert_eq!(role_names, vec![application_controller_sa(&test_argocd), server_sa(&test_argocd)]);
    for role in &roles {
        assert_eq!(role.namespace().as_deref(), Some(TEST_MANAGED_NAMESPACE));
        assert_eq!(role.labels().get(ARGOCD_RBAC_SCOPE_LABEL_KEY).map(String::as_str), Some(RBAC_SCOPE_MANAGED_NAMESPACE));
    }

    for binding in &bindings {
        assert_eq!(binding.role_ref.kind, ROLE_KIND);
        let subjects = binding.subjects.as_ref().unwrap();
        assert_eq!(subjects[0].namespace.as_deref(), Some(TEST_NAMESPACE));
        assert_eq!(subjects[0].name, binding.name_any());
    }
}

#[rstest]
fn test_build_projected_rbac_custom_cluster_role(test_argocd: ArgoCD, mut config: EffectiveConfig) {
    config.controller_cluster_role = Some("my-controller-role".into());
    let (roles, bindings) = build_projected_rbac(&test_argocd, TEST_MANAGED_NAMESPACE, &config, None);

    assert_eq!(roles.len(), 1);
    assert_eq!(roles[0].name_any(), server_sa(&test_argocd));

    let controller_binding = bindings
        .iter()
        .find(|b| b.name_any() == application_controller_sa(&test_argocd))
        .unwrap();
    assert_eq!(controller_binding.role_ref, role_ref(CLUSTER_ROLE_KIND, "my-controller-role"));
}

#[rstest]
fn test_build_projected_rbac_includes_admin_rules(test_argocd: ArgoCD, config: EffectiveConfig) {
    let admin = rbacv1::ClusterRole {
        rules: Some(vec![rule(&["apps"], &["deployments"], &["*"])]),
        ..Default::default()
    };
    let (roles, _) = build_projected_rbac(&test_argocd, TEST_MANAGED_NAMESPACE, &config, Some(&admin));

    let controller_rules = roles[0].rules.as_ref().unwrap();
    assert_contains!(controller_rules, &rule(&["apps"], &["deployments"], &["*"]));
    assert_not_contains!(roles[1].rules.as_ref().unwrap(), &rule(&["apps"], &["deployments"], &["*"]));
}

#[rstest]
#[tokio::test]
async fn test_project_namespace_terminating(config: EffectiveConfig, mut test_managed_namespace: corev1::Namespace) {
    let (mut fake_apiserver, client) = make_fake_apiserver();
    fake_apiserver.build();

    test_managed_namespace.status.as_mut().unwrap().phase = Some("Terminating".into());
    project_namespace(&client, &config, &test_managed_namespace).await.unwrap();
    fake_apiserver.assert();
}

#[rstest]
#[tokio::test]
async fn test_project_namespace_no_instances_keeps_label(
    mut config: EffectiveConfig,
    test_managed_namespace: corev1::Namespace,
) {
    config.remove_managed_by_label = true;

    let (mut fake_apiserver, client) = make_fake_apiserver();
    for ns in [TEST_MANAGED_NAMESPACE, TEST_NAMESPACE] {
        fake_apiserver.handle(move |when, then| {
            when.method(GET).path(format!("/apis/argoproj.io/v1beta1/namespaces/{ns}/argocds"));
            then.json_body(empty_list());
        });
    }
    fake_apiserver.handle(|when, then| {
        when.method(GET)
            .path(format!("/apis/rbac.authorization.k8s.io/v1/namespaces/{TEST_MANAGED_NAMESPACE}/roles"));
        then.json_body(empty_list());
    });
    fake_apiserver.handle(|when, then| {
        when.method(GET)
            .path(format!("/apis/rbac.authorization.k8s.io/v1/namespaces/{TEST_MANAGED_NAMESPACE}/rolebindings"));
        then.json_body(empty_list());
    });
    fake_apiserver.build();

    // Nothing stale was found, so the label is left alone (no namespace GET/PUT is registered)
    project_namespace(&client, &config, &test_managed_namespace).await.unwrap();
    fake_apiserver.assert();
}

#[rstest]
#[tokio::test]
#[traced_test]
async fn test_project_namespace_deselected_instance(mut config: EffectiveConfig, test_argocd: ArgoCD) {
    config.label_selector = InstanceSelector::Matching("team".into(), "a".into());
    let ns = test_namespace(TEST_NAMESPACE);

    let (mut fake_apiserver, client) = make_fake_apiserver();
    let list = json!({"apiVersion": "v1", "kind": "List", "metadata": {}, "items": [test_argocd]});
    fake_apiserver.handle(move |when, then| {
        when.method(GET).path(format!("/apis/argoproj.io/v1beta1/namespaces/{TEST_NAMESPACE}/argocds"));
        then.json_body(list.clone());
    });
    fake_apiserver.build();

    project_namespace(&client, &config, &ns).await.unwrap();
    assert!(logs_contain("no selected ArgoCD instances"));
    fake_apiserver.assert();
}

fn rbac_path(ns: &str, resource: &str) -> String {
    format!("/apis/rbac.authorization.k8s.io/v1/namespaces/{ns}/{resource}")
}

fn handle_argocd_list(fake_apiserver: &mut MockServerBuilder, ns: &'static str, items: Vec<ArgoCD>) {
    let list = json!({"apiVersion": "v1", "kind": "List", "metadata": {}, "items": items});
    fake_apiserver.handle(move |when, then| {
        when.method(GET).path(format!("/apis/argoproj.io/v1beta1/namespaces/{ns}/argocds"));
        then.json_body(list.clone());
    });
}

fn handle_rbac_list(fake_apiserver: &mut MockServerBuilder, resource: &'static str, items: serde_json::Value) {
    let list = json!({"apiVersion": "v1", "kind": "List", "metadata": {}, "items": items});
    fake_apiserver.handle(move |when, then| {
        when.method(GET)
            .path(rbac_path(TEST_MANAGED_NAMESPACE, resource))
            .query_param("labelSelector", rbac_scope_selector(RBAC_SCOPE_MANAGED_NAMESPACE));
        then.json_body(list.clone());
    });
}

fn handle_rbac_delete(fake_apiserver: &mut MockServerBuilder, resource: &'static str, name: String) {
    fake_apiserver.handle(move |when, then| {
        when.method(DELETE).path(format!("{}/{name}", rbac_path(TEST_MANAGED_NAMESPACE, resource)));
        then.json_body(status_ok());
    });
}

// Every Role and RoleBinding for `instance` is missing and gets created; each binding has to name
// the instance's service account
fn handle_rbac_created(fake_apiserver: &mut MockServerBuilder, instance: &ArgoCD, config: &EffectiveConfig) {
    let instance_ns = instance.namespace().unwrap();
    let (roles, bindings) = build_projected_rbac(instance, TEST_MANAGED_NAMESPACE, config, None);
    fake_apiserver.handle_not_found(format!("/apis/rbac.authorization.k8s.io/v1/clusterroles/{ADMIN_CLUSTER_ROLE}"));

    for role in roles {
        let name = role.name_any();
        fake_apiserver.handle_not_found(format!("{}/{name}", rbac_path(TEST_MANAGED_NAMESPACE, "roles")));
        fake_apiserver.handle(move |when, then| {
            when.method(POST)
                .path(rbac_path(TEST_MANAGED_NAMESPACE, "roles"))
                .json_body_includes(json!({"metadata": {"name": name}}).to_string());
            then.status(201).json_body_obj(&role);
        });
    }

    for binding in bindings {
        let name = binding.name_any();
        let subject = json!({"kind": SERVICE_ACCOUNT_KIND, "name": name, "namespace": instance_ns});
        fake_apiserver.handle_not_found(format!("{}/{name}", rbac_path(TEST_MANAGED_NAMESPACE, "rolebindings")));
        fake_apiserver.handle(move |when, then| {
            when.method(POST)
                .path(rbac_path(TEST_MANAGED_NAMESPACE, "rolebindings"))
                .json_body_includes(json!({"metadata": {"name": name}, "subjects": [subject]}).to_string());
            then.status(201).json_body_obj(&binding);
        });
    }
}

fn first_line_containing(lines: &[&str], needle: &str) -> Option<usize> {
    lines.iter().position(|l| l.contains(needle))
}

fn last_line_containing(lines: &[&str], needle: &str) -> Option<usize> {
    lines.iter().rposition(|l| l.contains(needle))
}

#[rstest]
#[tokio::test]
#[traced_test]
async fn test_project_namespace_creates_rbac(
    config: EffectiveConfig,
    test_managed_namespace: corev1::Namespace,
    test_argocd: ArgoCD,
) {
    let (mut fake_apiserver, client) = make_fake_apiserver();
    handle_argocd_list(&mut fake_apiserver, TEST_MANAGED_NAMESPACE, vec![]);
    handle_argocd_list(&mut fake_apiserver, TEST_NAMESPACE, vec![test_argocd.clone()]);
    handle_rbac_created(&mut fake_apiserver, &test_argocd, &config);
    handle_rbac_list(&mut fake_apiserver, "roles", json!([]));
    handle_rbac_list(&mut fake_apiserver, "rolebindings", json!([]));
    fake_apiserver.build();

    project_namespace(&client, &config, &test_managed_namespace).await.unwrap();
    assert!(logs_contain("created RoleBinding"));
    fake_apiserver.assert();
}

#[rstest]
#[tokio::test]
#[traced_test]
async fn test_project_namespace_rebind_writes_before_pruning(
    config: EffectiveConfig,
    test_managed_namespace: corev1::Namespace,
) {
    // old-argocd is gone and new-argocd has taken over the namespace
    let old_instance = test_argocd("old-argocd");
    let new_instance = test_argocd("new-argocd");
    let (stale_roles, stale_bindings) = build_projected_rbac(&old_instance, TEST_MANAGED_NAMESPACE, &config, None);

    let (mut fake_apiserver, client) = make_fake_apiserver();
    handle_argocd_list(&mut fake_apiserver, TEST_MANAGED_NAMESPACE, vec![]);
    handle_argocd_list(&mut fake_apiserver, TEST_NAMESPACE, vec![new_instance.clone()]);
    handle_rbac_created(&mut fake_apiserver, &new_instance, &config);
    handle_rbac_list(&mut fake_apiserver, "roles", json!(stale_roles));
    handle_rbac_list(&mut fake_apiserver, "rolebindings", json!(stale_bindings));
    for role in &stale_roles {
        handle_rbac_delete(&mut fake_apiserver, "roles", role.name_any());
    }
    for binding in &stale_bindings {
        handle_rbac_delete(&mut fake_apiserver, "rolebindings", binding.name_any());
    }
    fake_apiserver.build();

    project_namespace(&client, &config, &test_managed_namespace).await.unwrap();
    logs_assert(|lines: &[&str]| {
        let last_created = last_line_containing(lines, "created Role").ok_or("nothing was created")?;
        let first_deleted = first_line_containing(lines, "deleted Role").ok_or("nothing was deleted")?;
        if last_created < first_deleted {
            Ok(())
        } else {
            Err(format!("deleted at line {first_deleted} before the last create at line {last_created}"))
        }
    });
    fake_apiserver.assert();
}

#[rstest]
#[tokio::test]
#[traced_test]
async fn test_project_namespace_label_removed_deletes_rbac(config: EffectiveConfig, test_argocd: ArgoCD) {
    let (roles, bindings) = build_projected_rbac(&test_argocd, TEST_MANAGED_NAMESPACE, &config, None);
    assert_eq!(roles.len() + bindings.len(), 4);

    let (mut fake_apiserver, client) = make_fake_apiserver();
    handle_argocd_list(&mut fake_apiserver, TEST_MANAGED_NAMESPACE, vec![]);
    handle_rbac_list(&mut fake_apiserver, "roles", json!(roles));
    handle_rbac_list(&mut fake_apiserver, "rolebindings", json!(bindings));
    for role in &roles {
        handle_rbac_delete(&mut fake_apiserver, "roles", role.name_any());
    }
    for binding in &bindings {
        handle_rbac_delete(&mut fake_apiserver, "rolebindings", binding.name_any());
    }
    fake_apiserver.build();

    // No managed-by label any more, and REMOVE_MANAGED_BY_LABEL is off, so the namespace itself
    // is never read or written
    project_namespace(&client, &config, &test_namespace(TEST_MANAGED_NAMESPACE)).await.unwrap();
    fake_apiserver.assert();
}

#[rstest]
#[tokio::test]
#[traced_test]
async fn test_project_namespace_strips_label_after_instance_gone(
    mut config: EffectiveConfig,
    test_managed_namespace: corev1::Namespace,
    test_argocd: ArgoCD,
) {
    config.remove_managed_by_label = true;
    let (roles, bindings) = build_projected_rbac(&test_argocd, TEST_MANAGED_NAMESPACE, &config, None);

    let mut unlabeled = test_managed_namespace.clone();
    unlabeled.labels_mut().remove(MANAGED_BY_LABEL_KEY);

    let (mut fake_apiserver, client) = make_fake_apiserver();
    handle_argocd_list(&mut fake_apiserver, TEST_MANAGED_NAMESPACE, vec![]);
    handle_argocd_list(&mut fake_apiserver, TEST_NAMESPACE, vec![]);
    handle_rbac_list(&mut fake_apiserver, "roles", json!(roles));
    handle_rbac_list(&mut fake_apiserver, "rolebindings", json!(bindings));
    for role in &roles {
        handle_rbac_delete(&mut fake_apiserver, "roles", role.name_any());
    }
    for binding in &bindings {
        handle_rbac_delete(&mut fake_apiserver, "rolebindings", binding.name_any());
    }
    fake_apiserver.handle_get(format!("/api/v1/namespaces/{TEST_MANAGED_NAMESPACE}"), test_managed_namespace.clone());
    fake_apiserver.handle(move |when, then| {
        when.method(PUT)
            .path(format!("/api/v1/namespaces/{TEST_MANAGED_NAMESPACE}"))
            .json_body_obj(&unlabeled);
        then.json_body_obj(&unlabeled);
    });
    fake_apiserver.build();

    project_namespace(&client, &config, &test_managed_namespace).await.unwrap();
    assert!(logs_contain("updated Namespace"));
    fake_apiserver.assert();
}

#[rstest]
#[tokio::test]
#[traced_test]
async fn test_project_namespace_keeps_deselected_instance_rbac(
    mut config: EffectiveConfig,
    test_managed_namespace: corev1::Namespace,
) {
    config.label_selector = InstanceSelector::Matching("team".into(), "a".into());
    let mut selected = test_argocd("team-a");
    selected.labels_mut().insert("team".into(), "a".into());
    let deselected = test_argocd("team-b");

    let (selected_roles, selected_bindings) = build_projected_rbac(&selected, TEST_MANAGED_NAMESPACE, &config, None);
    let (other_roles, other_bindings) = build_projected_rbac(&deselected, TEST_MANAGED_NAMESPACE, &config, None);

    let (mut fake_apiserver, client) = make_fake_apiserver();
    handle_argocd_list(&mut fake_apiserver, TEST_MANAGED_NAMESPACE, vec![]);
    handle_argocd_list(&mut fake_apiserver, TEST_NAMESPACE, vec![selected.clone(), deselected]);
    handle_rbac_created(&mut fake_apiserver, &selected, &config);
    handle_rbac_list(&mut fake_apiserver, "roles", json!([selected_roles, other_roles].concat()));
    handle_rbac_list(&mut fake_apiserver, "rolebindings", json!([selected_bindings, other_bindings].concat()));
    fake_apiserver.build();

    // No DELETE is registered; deleting team-b's RBAC would hit the catch-all and fail
    project_namespace(&client, &config, &test_managed_namespace).await.unwrap();
    assert!(!logs_contain("deleted Role"));
    fake_apiserver.assert();
}

#[rstest]
#[tokio::test]
#[traced_test]
async fn test_project_namespace_invalid_selector(mut config: EffectiveConfig, test_managed_namespace: corev1::Namespace) {
    config.label_selector = InstanceSelector::Invalid("a=b,c=d".into());

    let (mut fake_apiserver, client) = make_fake_apiserver();
    fake_apiserver.build();

    project_namespace(&client, &config, &test_managed_namespace).await.unwrap();
    assert!(logs_contain("label selector \"a=b,c=d\" is invalid"));
    fake_apiserver.assert();
}

#[rstest]
#[case::projected(RBAC_SCOPE_MANAGED_NAMESPACE, Some(TEST_MANAGED_NAMESPACE))]
#[case::source(RBAC_SCOPE_SOURCE_NAMESPACE, None)]
fn test_projected_rbac_namespace(test_argocd: ArgoCD, #[case] scope: &str, #[case] expected: Option<&str>) {
    let mut role = rbacv1::Role {
        metadata: scoped_meta(Some(TEST_MANAGED_NAMESPACE), "some-role", &test_argocd, scope),
        ..Default::default()
    };
    assert_eq!(projected_rbac_namespace(role.clone()), expected.map(ObjectRef::<corev1::Namespace>::new));

    role.labels_mut().remove(ARGOCD_RBAC_SCOPE_LABEL_KEY);
    assert_none!(projected_rbac_namespace(role));
}
