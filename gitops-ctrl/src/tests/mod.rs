mod argocd_test;
mod kam_test;
mod namespace_test;
mod rollouts_test;
mod source_namespaces_test;
mod sso_test;
mod status_test;

use std::collections::BTreeSet;

use assertables::*;
use gitops_api::argoproj::*;
use gitops_core::config::*;
use gitops_core::macros::*;
use gitops_core::prelude::*;
use gitops_testutils::*;
use httpmock::prelude::*;
use rstest::*;
use tracing_test::traced_test;

#[fixture]
fn config() -> EffectiveConfig {
    EffectiveConfig {
        backend_image: DEFAULT_BACKEND_IMAGE.into(),
        plugin_image: DEFAULT_PLUGIN_IMAGE.into(),
        rollouts_image: DEFAULT_ROLLOUTS_IMAGE.into(),
        kam_image: DEFAULT_KAM_IMAGE.into(),
        ..Default::default()
    }
}

fn ready_deployment(name: &str, replicas: i32, ready: i32) -> appsv1::Deployment {
    let mut depl = test_deployment(name);
    depl.spec.get_or_insert_default().replicas = Some(replicas);
    depl.status = Some(appsv1::DeploymentStatus { ready_replicas: Some(ready), ..Default::default() });
    depl
}

fn container(pod: &corev1::PodSpec) -> &corev1::Container {
    &pod.containers[0]
}

fn pod_spec(depl: &appsv1::Deployment) -> &corev1::PodSpec {
    depl.spec
        .as_ref()
        .and_then(|s| s.template.spec.as_ref())
        .expect("deployment should have a pod spec")
}
