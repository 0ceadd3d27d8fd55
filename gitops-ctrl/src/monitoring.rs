use gitops_api::monitoring::*;
use gitops_core::k8s::{
    build_object_meta,
    is_owned_by,
};
use gitops_core::macros::*;
use gitops_core::prelude::*;
use gitops_core::writer;
use kube::api::PostParams;
use tracing::*;

use crate::errors::*;
use crate::rbac::*;

pub const PROMETHEUS_RULE_NAME: &str = "gitops-operator-argocd-alerts";
pub const ALERT_GROUP_NAME: &str = "GitOpsOperatorArgoCD";
pub const SYNC_ALERT_NAME: &str = "ArgoCDSyncAlert";
pub const METRICS_PORT_NAME: &str = "metrics";
pub const RELEASE_LABEL_KEY: &str = "release";
pub const PROMETHEUS_OPERATOR_RELEASE: &str = "prometheus-operator";
pub const CONSOLE_DASHBOARD_LABEL_KEY: &str = "console.openshift.io/dashboard";

// (file name, Grafana JSON); each becomes a ConfigMap named after the file stem
const DASHBOARDS: [(&str, &str); 2] = [
    ("gitops-overview.json", include_str!("../dashboards/gitops-overview.json")),
    ("gitops-components.json", include_str!("../dashboards/gitops-components.json")),
];

pub struct MonitoringObjects {
    pub service_monitors: Vec<ServiceMonitor>,
    pub prometheus_rule: PrometheusRule,
    pub read_role: rbacv1::Role,
    pub read_binding: rbacv1::RoleBinding,
}

pub fn read_role_name(instance: &ArgoCD) -> String {
    format!("{}-read", instance.name_any())
}

pub fn read_binding_name(instance: &ArgoCD) -> String {
    format!("{}-prometheus-k8s-read-binding", instance.name_any())
}

// (ServiceMonitor name, name of the metrics Service it selects)
pub fn service_monitor_targets(instance: &ArgoCD) -> [(String, String); 3] {
    let name = instance.name_any();
    [
        (name.clone(), format!("{name}-metrics")),
        (format!("{name}-server"), format!("{name}-server-metrics")),
        (format!("{name}-repo-server"), format!("{name}-repo-server")),
    ]
}

pub fn build_monitoring(instance: &ArgoCD) -> anyhow::Result<MonitoringObjects> {
    let ns = instance.namespace().unwrap_or_default();

    let mut service_monitors = vec![];
    for (name, target) in service_monitor_targets(instance) {
        let mut meta = build_object_meta(&ns, &name, instance)?;
        meta.labels.get_or_insert_default().insert(RELEASE_LABEL_KEY.into(), PROMETHEUS_OPERATOR_RELEASE.into());
        service_monitors.push(ServiceMonitor {
            metadata: meta,
            spec: ServiceMonitorSpec {
                selector: metav1::LabelSelector {
                    match_labels: klabel!(APP_KUBERNETES_IO_NAME_KEY => target),
                    ..Default::default()
                },
                endpoints: vec![ServiceMonitorEndpoint {
                    port: Some(METRICS_PORT_NAME.into()),
                    ..Default::default()
                }],
            },
        });
    }

    let prometheus_rule = PrometheusRule {
        metadata: build_object_meta(&ns, PROMETHEUS_RULE_NAME, instance)?,
        spec: PrometheusRuleSpec {
            groups: vec![PrometheusRuleGroup {
                name: ALERT_GROUP_NAME.into(),
                rules: vec![PrometheusRuleRule {
                    alert: Some(SYNC_ALERT_NAME.into()),
                    expr: format!("argocd_app_info{{namespace=\"{ns}\",sync_status=\"OutOfSync\"}} > 0"),
                    for_: Some("5m".into()),
                    labels: klabel!("severity" => "warning"),
                    annotations: klabel!(
                        "message" => "ArgoCD application {{ $labels.name }} is out of sync",
                    ),
                    ..Default::default()
                }],
            }],
        },
    };

    let read_role = build_role(
        build_object_meta(&ns, &read_role_name(instance), instance)?,
        vec![rule(&[""], &["endpoints", "services", "pods"], &["get", "list", "watch"])],
    );
    let read_binding = build_role_binding(
        build_object_meta(&ns, &read_binding_name(instance), instance)?,
        role_ref(ROLE_KIND, &read_role_name(instance)),
        vec![service_account_subject(MONITORING_NAMESPACE, PROMETHEUS_SERVICE_ACCOUNT)],
    );

    Ok(MonitoringObjects { service_monitors, prometheus_rule, read_role, read_binding })
}

pub fn build_dashboards() -> Vec<corev1::ConfigMap> {
    DASHBOARDS
        .iter()
        .map(|(file, content)| corev1::ConfigMap {
            metadata: metav1::ObjectMeta {
                name: Some(file.trim_end_matches(".json").into()),
                namespace: Some(DASHBOARD_NAMESPACE.into()),
                labels: klabel!(
                    CONSOLE_DASHBOARD_LABEL_KEY => "true",
                    APP_KUBERNETES_IO_MANAGED_BY_KEY => OPERATOR_MANAGER_NAME,
                ),
                ..Default::default()
            },
            data: Some(kmap!(*file => *content)),
            ..Default::default()
        })
        .collect()
}

// Only the dashboard JSON is reconciled; users may relabel a dashboard to hide it from the console
pub async fn reconcile_dashboards(client: &kube::Client) -> EmptyResult {
    let ns_api = kube::Api::<corev1::Namespace>::all(client.clone());
    if ns_api.get_opt(DASHBOARD_NAMESPACE).await?.is_none() {
        debug!("namespace {DASHBOARD_NAMESPACE} not found, skipping monitoring dashboards");
        return Ok(());
    }

    let cm_api = kube::Api::<corev1::ConfigMap>::namespaced(client.clone(), DASHBOARD_NAMESPACE);
    for desired in build_dashboards() {
        let name = desired.name_any();
        match cm_api.get_opt(&name).await? {
            None => {
                cm_api.create(&PostParams::default(), &desired).await?;
                info!("created dashboard {DASHBOARD_NAMESPACE}/{name}");
            },
            Some(mut observed) if observed.data != desired.data => {
                observed.data = desired.data;
                cm_api.replace(&name, &PostParams::default(), &observed).await?;
                info!("updated dashboard {DASHBOARD_NAMESPACE}/{name}");
            },
            Some(_) => debug!("dashboard {DASHBOARD_NAMESPACE}/{name} is up to date"),
        }
    }
    Ok(())
}

// The prometheus-operator CRDs are optional on a cluster; a 404 on create means the kind isn't
// served at all
fn missing_api(err: anyhow::Error, kind: &str) -> anyhow::Error {
    if writer::is_not_found(&err) {
        GitopsControllerError::missing_api(kind)
    } else {
        err
    }
}

async fn set_cluster_monitoring_label(client: &kube::Client, ns_name: &str, enabled: bool) -> EmptyResult {
    let ns_api = kube::Api::<corev1::Namespace>::all(client.clone());
    writer::mutate(&ns_api, ns_name, |ns: &mut corev1::Namespace| {
        let labels = ns.labels_mut();
        match (enabled, labels.get(CLUSTER_MONITORING_LABEL_KEY).map(String::as_str)) {
            (true, Some("true")) | (false, None) => false,
            (true, _) => {
                labels.insert(CLUSTER_MONITORING_LABEL_KEY.into(), "true".into());
                true
            },
            (false, Some(_)) => {
                labels.remove(CLUSTER_MONITORING_LABEL_KEY);
                true
            },
        }
    })
    .await?;
    Ok(())
}

pub async fn reconcile(client: &kube::Client, instance: &ArgoCD) -> EmptyResult {
    let ns = instance.namespace().unwrap_or_default();
    let sm_api = kube::Api::<ServiceMonitor>::namespaced(client.clone(), &ns);
    let rule_api = kube::Api::<PrometheusRule>::namespaced(client.clone(), &ns);
    let role_api = kube::Api::<rbacv1::Role>::namespaced(client.clone(), &ns);
    let binding_api = kube::Api::<rbacv1::RoleBinding>::namespaced(client.clone(), &ns);

    if instance.metrics_disabled() {
        info!("metrics disabled for {}, removing monitoring objects", instance.namespaced_name());
        let owned = |obj: &ServiceMonitor| is_owned_by(obj, instance);
        for (name, _) in service_monitor_targets(instance) {
            writer::delete_owned(&sm_api, &name, owned).await?;
        }
        writer::delete_owned(&rule_api, PROMETHEUS_RULE_NAME, |obj: &PrometheusRule| is_owned_by(obj, instance))
            .await?;
        writer::delete_owned(&binding_api, &read_binding_name(instance), |obj: &rbacv1::RoleBinding| {
            is_owned_by(obj, instance)
        })
        .await?;
        writer::delete_owned(&role_api, &read_role_name(instance), |obj: &rbacv1::Role| is_owned_by(obj, instance))
            .await?;
        return set_cluster_monitoring_label(client, &ns, false).await;
    }

    set_cluster_monitoring_label(client, &ns, true).await?;
    let objs = build_monitoring(instance)?;
    writer::apply(&role_api, &objs.read_role).await?;
    writer::apply(&binding_api, &objs.read_binding).await?;
    for sm in &objs.service_monitors {
        writer::apply(&sm_api, sm).await.map_err(|e| missing_api(e, "ServiceMonitor"))?;
    }
    writer::apply(&rule_api, &objs.prometheus_rule).await.map_err(|e| missing_api(e, "PrometheusRule"))?;
    reconcile_dashboards(client).await
}
