use gitops_core::k8s::instance_labels;
use gitops_core::prelude::*;

pub const RBAC_API_GROUP: &str = "rbac.authorization.k8s.io";
pub const ROLE_KIND: &str = "Role";
pub const CLUSTER_ROLE_KIND: &str = "ClusterRole";
pub const SERVICE_ACCOUNT_KIND: &str = "ServiceAccount";
pub const ADMIN_CLUSTER_ROLE: &str = "admin";

// Distinguishes the RBAC sets the operator writes for an instance, so that one kind of cleanup
// never touches the other
pub const ARGOCD_RBAC_SCOPE_LABEL_KEY: &str = "argocds.argoproj.io/rbac";
pub const RBAC_SCOPE_MANAGED_NAMESPACE: &str = "managed-namespace";
pub const RBAC_SCOPE_SOURCE_NAMESPACE: &str = "source-namespace";
pub const RBAC_SCOPE_CLUSTER: &str = "cluster";

pub const APPLICATION_CONTROLLER_COMPONENT: &str = "argocd-application-controller";
pub const SERVER_COMPONENT: &str = "argocd-server";
pub const APPLICATIONSET_CONTROLLER_COMPONENT: &str = "argocd-applicationset-controller";

pub fn application_controller_sa(instance: &ArgoCD) -> String {
    format!("{}-{APPLICATION_CONTROLLER_COMPONENT}", instance.name_any())
}

pub fn server_sa(instance: &ArgoCD) -> String {
    format!("{}-{SERVER_COMPONENT}", instance.name_any())
}

pub fn applicationset_controller_sa(instance: &ArgoCD) -> String {
    format!("{}-applicationset-controller", instance.name_any())
}

pub fn rule(groups: &[&str], resources: &[&str], verbs: &[&str]) -> rbacv1::PolicyRule {
    rbacv1::PolicyRule {
        api_groups: Some(groups.iter().map(|s| s.to_string()).collect()),
        resources: Some(resources.iter().map(|s| s.to_string()).collect()),
        verbs: verbs.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    }
}

fn non_resource_rule(urls: &[&str], verbs: &[&str]) -> rbacv1::PolicyRule {
    rbacv1::PolicyRule {
        non_resource_urls: Some(urls.iter().map(|s| s.to_string()).collect()),
        verbs: verbs.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    }
}

const READ: &[&str] = &["get", "list", "watch"];
const ALL: &[&str] = &["*"];

pub fn controller_cluster_rules() -> Vec<rbacv1::PolicyRule> {
    vec![
        rule(&["*"], &["*"], READ),
        non_resource_rule(&["*"], &["get", "list"]),
        rule(&["operators.coreos.com"], &["*"], ALL),
        rule(&["operator.openshift.io"], &["*"], ALL),
        rule(&["user.openshift.io"], &["*"], ALL),
        rule(&["config.openshift.io"], &["*"], ALL),
        rule(&["console.openshift.io"], &["*"], ALL),
        rule(&[""], &["namespaces", "persistentvolumeclaims", "persistentvolumes", "configmaps"], ALL),
        rule(&[RBAC_API_GROUP], &["*"], ALL),
        rule(&["storage.k8s.io"], &["*"], ALL),
        rule(&["machine.openshift.io"], &["*"], ALL),
        rule(&["machineconfiguration.openshift.io"], &["*"], ALL),
        rule(&["compliance.openshift.io"], &["scansettingbindings"], ALL),
        rule(&[""], &["serviceaccounts"], &["impersonate"]),
    ]
}

pub fn server_cluster_rules() -> Vec<rbacv1::PolicyRule> {
    vec![
        rule(&["*"], &["*"], &["get", "delete", "patch"]),
        rule(&["argoproj.io"], &["applications", "applicationsets"], &["list", "watch"]),
        rule(&[""], &["events"], &["list"]),
        rule(&["batch"], &["jobs", "cronjobs", "cronjobs/finalizers"], &["create", "update"]),
    ]
}

pub fn applicationset_cluster_rules() -> Vec<rbacv1::PolicyRule> {
    let write = &["create", "delete", "get", "list", "patch", "update", "watch"];
    vec![
        rule(
            &["argoproj.io"],
            &["applications", "applicationsets", "applicationsets/finalizers", "appprojects"],
            write,
        ),
        rule(&["argoproj.io"], &["applicationsets/status"], &["get", "patch", "update"]),
        rule(&[""], &["events"], write),
        rule(&[""], &["secrets", "configmaps"], READ),
        rule(&["coordination.k8s.io"], &["leases"], write),
    ]
}

// The application controller gets everything the cluster's `admin` role can do in the
// namespace, on top of a fixed base
pub fn controller_namespace_rules(admin: Option<&rbacv1::ClusterRole>) -> Vec<rbacv1::PolicyRule> {
    let mut rules = vec![
        rule(&["*"], &["*"], READ),
        rule(&["monitoring.coreos.com"], &["*"], ALL),
        rule(&["argoproj.io"], &["applications", "applicationsets", "appprojects", "argocds"], ALL),
    ];
    rules.extend(admin.and_then(|cr| cr.rules.clone()).unwrap_or_default());
    rules
}

pub fn server_namespace_rules() -> Vec<rbacv1::PolicyRule> {
    vec![
        rule(&["*"], &["*"], &["get", "delete", "patch"]),
        rule(
            &["argoproj.io"],
            &["applications", "applicationsets"],
            &["create", "get", "list", "watch", "update", "delete", "patch"],
        ),
        rule(&[""], &["events"], &["create", "list"]),
        rule(&["batch"], &["jobs", "cronjobs", "cronjobs/finalizers"], &["create", "update"]),
    ]
}

pub fn source_namespace_rules() -> Vec<rbacv1::PolicyRule> {
    vec![
        rule(
            &["argoproj.io"],
            &["applications"],
            &["create", "get", "list", "patch", "update", "watch", "delete"],
        ),
        rule(&[""], &["events"], &["create", "list"]),
    ]
}

pub fn service_account_subject(namespace: &str, name: &str) -> rbacv1::Subject {
    rbacv1::Subject {
        kind: SERVICE_ACCOUNT_KIND.into(),
        name: name.into(),
        namespace: Some(namespace.into()),
        ..Default::default()
    }
}

pub fn role_ref(kind: &str, name: &str) -> rbacv1::RoleRef {
    rbacv1::RoleRef {
        api_group: RBAC_API_GROUP.into(),
        kind: kind.into(),
        name: name.into(),
    }
}

// Metadata for RBAC that is tied to an instance by labels rather than owner references
pub fn scoped_meta(namespace: Option<&str>, name: &str, instance: &ArgoCD, scope: &str) -> metav1::ObjectMeta {
    let mut labels = instance_labels(instance);
    labels.insert(ARGOCD_RBAC_SCOPE_LABEL_KEY.into(), scope.into());
    labels.insert(APP_KUBERNETES_IO_NAME_KEY.into(), name.into());
    labels.insert(APP_KUBERNETES_IO_PART_OF_KEY.into(), "argocd".into());

    metav1::ObjectMeta {
        namespace: namespace.map(String::from),
        name: Some(name.into()),
        labels: Some(labels),
        ..Default::default()
    }
}

// Selects the RBAC of one scope across every instance
pub fn rbac_scope_selector(scope: &str) -> String {
    format!("{ARGOCD_RBAC_SCOPE_LABEL_KEY}={scope}")
}

pub fn scope_selector(instance: &ArgoCD, scope: &str) -> String {
    let labels = instance_labels(instance);
    let mut terms: Vec<String> = labels
        .iter()
        .filter(|(k, _)| k.as_str() != APP_KUBERNETES_IO_MANAGED_BY_KEY)
        .map(|(k, v)| format!("{k}={v}"))
        .collect();
    terms.push(format!("{ARGOCD_RBAC_SCOPE_LABEL_KEY}={scope}"));
    terms.join(",")
}

pub fn build_role(meta: metav1::ObjectMeta, rules: Vec<rbacv1::PolicyRule>) -> rbacv1::Role {
    rbacv1::Role { metadata: meta, rules: Some(rules) }
}

pub fn build_role_binding(
    meta: metav1::ObjectMeta,
    role_ref: rbacv1::RoleRef,
    subjects: Vec<rbacv1::Subject>,
) -> rbacv1::RoleBinding {
    rbacv1::RoleBinding { metadata: meta, role_ref, subjects: Some(subjects) }
}

pub fn build_cluster_role(meta: metav1::ObjectMeta, rules: Vec<rbacv1::PolicyRule>) -> rbacv1::ClusterRole {
    rbacv1::ClusterRole { metadata: meta, rules: Some(rules), ..Default::default() }
}

pub fn build_cluster_role_binding(
    meta: metav1::ObjectMeta,
    role_name: &str,
    subjects: Vec<rbacv1::Subject>,
) -> rbacv1::ClusterRoleBinding {
    rbacv1::ClusterRoleBinding {
        metadata: meta,
        role_ref: role_ref(CLUSTER_ROLE_KIND, role_name),
        subjects: Some(subjects),
    }
}
