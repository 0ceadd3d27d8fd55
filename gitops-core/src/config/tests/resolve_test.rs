use super::*;

#[fixture]
fn env() -> OperatorEnv {
    OperatorEnv::default()
}

#[rstest]
fn test_resolve_defaults(env: OperatorEnv) {
    let config = resolve(&env, None, None).unwrap();

    assert_eq!(config.image_pull_policy, PullPolicy::IfNotPresent);
    assert!(!config.run_on_infra);
    assert!(!config.disable_default_instance);
    assert!(!config.disable_console_link);
    assert_eq!(config.cluster_config_namespaces, ClusterConfigNamespaces::Listed(vec![]));
    assert_eq!(config.label_selector, InstanceSelector::All);
    assert_eq!(config.plugin_start_version, Some(OcpVersion { major: 4, minor: 15 }));
    assert_eq!(config.backend_image, DEFAULT_BACKEND_IMAGE);
}

#[rstest]
#[case::argocd_wins(Some("Never"), Some("Always"), Some("IfNotPresent"), PullPolicy::Never)]
#[case::gitops_service_over_env(None, Some("Always"), Some("Never"), PullPolicy::Always)]
#[case::env_only(None, None, Some("Always"), PullPolicy::Always)]
#[case::empty_falls_through(Some(""), None, Some("Always"), PullPolicy::Always)]
#[case::garbage_falls_through(Some("always"), Some("sometimes"), None, PullPolicy::IfNotPresent)]
fn test_resolve_pull_policy_precedence(
    mut test_argocd: ArgoCD,
    mut test_gitops_service: GitopsService,
    #[case] argocd_policy: Option<&str>,
    #[case] gitops_service_policy: Option<&str>,
    #[case] env_policy: Option<&str>,
    #[case] expected: PullPolicy,
) {
    test_argocd.spec.image_pull_policy = argocd_policy.map(String::from);
    test_gitops_service.spec.image_pull_policy = gitops_service_policy.map(String::from);
    let env = OperatorEnv::from_pairs(env_policy.map(|p| (IMAGE_PULL_POLICY_ENV_VAR, p)));

    let config = resolve(&env, Some(&test_gitops_service), Some(&test_argocd)).unwrap();
    assert_eq!(config.image_pull_policy, expected);
}

#[rstest]
#[case::literal_true("true", true)]
#[case::capitalized("True", false)]
#[case::false_("false", false)]
#[case::empty("", false)]
#[case::whitespace(" ", false)]
fn test_resolve_console_link_flag(#[case] value: &str, #[case] expected: bool) {
    let env = OperatorEnv::from_pairs([(DISABLE_DEFAULT_ARGOCD_CONSOLELINK_ENV_VAR, value)]);
    let config = resolve(&env, None, None).unwrap();
    assert_eq!(config.disable_console_link, expected);
}

#[rstest]
fn test_cluster_config_namespaces_parse() {
    let namespaces = ClusterConfigNamespaces::parse(Some("openshift-gitops, argocd-e2e-cluster-config,,  "));
    assert_eq!(
        namespaces,
        ClusterConfigNamespaces::Listed(vec!["openshift-gitops".into(), "argocd-e2e-cluster-config".into()])
    );
    assert!(namespaces.contains("argocd-e2e-cluster-config"));
    assert!(!namespaces.contains("default"));

    let all = ClusterConfigNamespaces::parse(Some("foo,*"));
    assert_eq!(all, ClusterConfigNamespaces::All);
    assert!(all.contains("anything"));
}

#[rstest]
#[case::empty(None, None)]
#[case::blank(Some("  "), None)]
#[case::single(Some("foo=bar"), Some(("foo", "bar")))]
#[case::trimmed(Some(" foo = bar "), Some(("foo", "bar")))]
fn test_parse_label_selector(#[case] value: Option<&str>, #[case] expected: Option<(&str, &str)>) {
    let res = parse_label_selector(value).unwrap();
    assert_eq!(res, expected.map(|(k, v)| (k.to_string(), v.to_string())));
}

#[rstest]
#[case::multi_term("foo=bar,baz=qux")]
#[case::not_equal("foo!=bar")]
#[case::double_equal("foo==bar")]
#[case::no_value("foo=")]
#[case::no_key("=bar")]
#[case::set_based("foo in (bar)")]
fn test_parse_label_selector_rejected(#[case] value: &str) {
    let err = parse_label_selector(Some(value)).unwrap_err();
    assert!(matches!(err.downcast_ref::<ConfigError>(), Some(ConfigError::InvalidLabelSelector(_))));
}

#[rstest]
fn test_resolve_bad_label_selector_is_error_for_argocd(test_argocd: ArgoCD) {
    let env = OperatorEnv::from_pairs([(ARGOCD_LABEL_SELECTOR_ENV_VAR, "a=b,c=d")]);
    assert_err!(resolve(&env, None, Some(&test_argocd)));
}

#[rstest]
fn test_resolve_bad_label_selector_elsewhere(test_gitops_service: GitopsService, test_argocd: ArgoCD) {
    let env = OperatorEnv::from_pairs([(ARGOCD_LABEL_SELECTOR_ENV_VAR, " a=b,c=d ")]);
    let config = resolve(&env, Some(&test_gitops_service), None).unwrap();

    assert_eq!(config.label_selector, InstanceSelector::Invalid("a=b,c=d".into()));
    assert!(!config.selects(&test_argocd));
}

#[rstest]
fn test_selects(mut test_argocd: ArgoCD) {
    let env = OperatorEnv::from_pairs([(ARGOCD_LABEL_SELECTOR_ENV_VAR, "foo=bar")]);
    let config = resolve(&env, None, None).unwrap();
    assert!(!config.selects(&test_argocd));

    test_argocd.labels_mut().insert("foo".into(), "bar".into());
    assert!(config.selects(&test_argocd));
}

#[rstest]
fn test_resolve_infra_placement(mut test_gitops_service: GitopsService) {
    test_gitops_service.spec.run_on_infra = true;
    test_gitops_service.spec.node_selector = Some([("zone".to_string(), "a".to_string())].into());
    test_gitops_service.spec.tolerations = Some(vec![]);

    let config = resolve(&OperatorEnv::default(), Some(&test_gitops_service), None).unwrap();
    assert!(config.run_on_infra);
    assert_eq!(config.node_selector.get("zone").map(String::as_str), Some("a"));
    assert_none!(config.tolerations);
}

#[rstest]
fn test_resolve_proxy_env_any_case() {
    let env = OperatorEnv::from_pairs([("https_proxy", "http://proxy:3128"), ("NO_PROXY", ".cluster.local")]);
    let config = resolve(&env, None, None).unwrap();

    let names: Vec<_> = config.proxy_env.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["HTTPS_PROXY", "NO_PROXY"]);
    assert_eq!(config.proxy_env[0].value.as_deref(), Some("http://proxy:3128"));
}

#[rstest]
fn test_resolve_plugin_start_version_override() {
    let env = OperatorEnv::from_pairs([(DYNAMIC_PLUGIN_START_OCP_VERSION_ENV_VAR, "4.12.0")]);
    let config = resolve(&env, None, None).unwrap();
    assert_eq!(config.plugin_start_version, Some(OcpVersion { major: 4, minor: 12 }));
}
