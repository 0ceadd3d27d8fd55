use super::*;
use crate::rollouts::*;
use crate::status::*;

#[rstest]
#[case::default(None, None, DEFAULT_ROLLOUTS_IMAGE)]
#[case::image_only(Some("quay.io/me/rollouts"), None, "quay.io/me/rollouts")]
#[case::image_and_version(Some("quay.io/me/rollouts"), Some("v1.8.0"), "quay.io/me/rollouts:v1.8.0")]
#[case::version_only(None, Some("v1.8.0"), DEFAULT_ROLLOUTS_IMAGE)]
#[case::empty_image(Some(""), Some("v1.8.0"), DEFAULT_ROLLOUTS_IMAGE)]
fn test_rollouts_image(
    config: EffectiveConfig,
    mut test_rollout_manager: RolloutManager,
    #[case] image: Option<&str>,
    #[case] version: Option<&str>,
    #[case] expected: &str,
) {
    test_rollout_manager.spec.image = image.map(String::from);
    test_rollout_manager.spec.version = version.map(String::from);
    assert_eq!(rollouts_image(&config, &test_rollout_manager), expected);
}

#[rstest]
fn test_build_rollouts(config: EffectiveConfig, mut test_rollout_manager: RolloutManager) {
    test_rollout_manager.spec.extra_command_args = Some(vec!["--loglevel".into(), "debug".into()]);
    test_rollout_manager.spec.env = Some(vec![corev1::EnvVar {
        name: "FOO".into(),
        value: Some("bar".into()),
        ..Default::default()
    }]);
    let objs = build_rollouts(&config, &test_rollout_manager).unwrap();

    assert_eq!(objs.deployment.namespaced_name(), format!("{TEST_NAMESPACE}/{ROLLOUTS_NAME}"));
    assert_eq!(objs.deployment.owner_references()[0].uid, "rollouts-9012");
    for (k, v) in rollouts_labels() {
        assert_eq!(objs.deployment.labels().get(&k), Some(&v));
    }

    let pod = pod_spec(&objs.deployment);
    let c = container(pod);
    assert_eq!(c.args, Some(vec![NAMESPACED_FLAG.into(), "--loglevel".into(), "debug".into()]));
    assert_eq!(c.env.as_ref().unwrap()[0].name, "FOO");
    assert_eq!(c.image_pull_policy.as_deref(), Some("IfNotPresent"));
    assert_eq!(pod.service_account_name.as_deref(), Some(ROLLOUTS_NAME));

    assert_eq!(objs.role.rules, Some(rollouts_rules()));
    assert_eq!(objs.role_binding.subjects.as_ref().unwrap()[0].namespace.as_deref(), Some(TEST_NAMESPACE));
    assert_eq!(objs.metrics_service.name_any(), ROLLOUTS_METRICS_SERVICE_NAME);
    assert_eq!(
        objs.metrics_service.spec.as_ref().unwrap().ports.as_ref().unwrap()[0].port,
        ROLLOUTS_METRICS_PORT
    );
    assert_eq!(objs.notification_secret.name_any(), ROLLOUTS_NOTIFICATION_SECRET_NAME);
}

#[rstest]
#[case::cr_wins(Some("Always"), PullPolicy::Never, "Always")]
#[case::config_fallback(None, PullPolicy::Never, "Never")]
#[case::invalid_cr_value(Some("sometimes"), PullPolicy::Never, "Never")]
fn test_build_rollouts_pull_policy(
    mut config: EffectiveConfig,
    mut test_rollout_manager: RolloutManager,
    #[case] cr_policy: Option<&str>,
    #[case] config_policy: PullPolicy,
    #[case] expected: &str,
) {
    config.image_pull_policy = config_policy;
    test_rollout_manager.spec.image_pull_policy = cr_policy.map(String::from);

    let objs = build_rollouts(&config, &test_rollout_manager).unwrap();
    assert_eq!(container(pod_spec(&objs.deployment)).image_pull_policy.as_deref(), Some(expected));
}

#[rstest]
fn test_build_rollouts_node_placement_overlay(mut config: EffectiveConfig, mut test_rollout_manager: RolloutManager) {
    config.run_on_infra = true;
    test_rollout_manager.spec.node_placement = Some(RolloutsNodePlacementSpec {
        node_selector: Some(kmap!("zone" => "east")),
        tolerations: Some(vec![corev1::Toleration { key: Some("dedicated".into()), ..Default::default() }]),
    });

    let objs = build_rollouts(&config, &test_rollout_manager).unwrap();
    let pod = pod_spec(&objs.deployment);
    assert_eq!(
        pod.node_selector,
        klabel!(KUBERNETES_IO_OS_KEY => "linux", INFRA_NODE_LABEL_KEY => "", "zone" => "east")
    );
    assert_eq!(pod.tolerations.as_ref().unwrap()[0].key.as_deref(), Some("dedicated"));
}

#[rstest]
#[case::missing(None, PHASE_PENDING, COMPONENT_UNKNOWN)]
#[case::pending(Some(ready_deployment(ROLLOUTS_NAME, 1, 0)), PHASE_PENDING, COMPONENT_PENDING)]
#[case::running(Some(ready_deployment(ROLLOUTS_NAME, 1, 1)), PHASE_AVAILABLE, COMPONENT_RUNNING)]
fn test_compute_status(#[case] depl: Option<appsv1::Deployment>, #[case] phase: &str, #[case] controller: &str) {
    let status = compute_status(depl.as_ref());
    assert_eq!(status.phase.as_deref(), Some(phase));
    assert_eq!(status.rollouts_controller.as_deref(), Some(controller));
}

#[rstest]
#[tokio::test]
async fn test_reconcile_rollout_manager_deleting(mut test_rollout_manager: RolloutManager) {
    test_rollout_manager.metadata.deletion_timestamp = Some(metav1::Time(chrono::Utc::now()));

    let (mut fake_apiserver, client) = make_fake_apiserver();
    fake_apiserver.build();
    let opts = crate::Options {
        operator_namespace: TEST_OPERATOR_NAMESPACE.into(),
        operator_deployment: TEST_DEPLOYMENT.into(),
        subscription_name: DEFAULT_SUBSCRIPTION_NAME.into(),
        concurrency: 1,
        verbosity: "info".into(),
    };
    let ctx = crate::context::GitopsContext::new(client, opts);

    let action = reconcile_rollout_manager(&ctx, &test_rollout_manager).await.unwrap();
    assert_eq!(action, kube::runtime::controller::Action::await_change());
    fake_apiserver.assert();
}
