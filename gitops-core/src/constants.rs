// Well-known labels, annotations, and taints
pub const APP_KUBERNETES_IO_NAME_KEY: &str = "app.kubernetes.io/name";
pub const APP_KUBERNETES_IO_COMPONENT_KEY: &str = "app.kubernetes.io/component";
pub const APP_KUBERNETES_IO_INSTANCE_KEY: &str = "app.kubernetes.io/instance";
pub const APP_KUBERNETES_IO_MANAGED_BY_KEY: &str = "app.kubernetes.io/managed-by";
pub const APP_KUBERNETES_IO_PART_OF_KEY: &str = "app.kubernetes.io/part-of";
pub const APP_OPENSHIFT_IO_RUNTIME_NAMESPACE_KEY: &str = "app.openshift.io/runtime-namespace";
pub const KUBERNETES_IO_OS_KEY: &str = "kubernetes.io/os";
pub const INFRA_NODE_LABEL_KEY: &str = "node-role.kubernetes.io/infra";
pub const SERVING_CERT_ANNOTATION_KEY: &str = "service.beta.openshift.io/serving-cert-secret-name";

// Labels owned by the operator
pub const MANAGED_BY_LABEL_KEY: &str = "argocd.argoproj.io/managed-by";
pub const MANAGED_BY_CLUSTER_ARGOCD_LABEL_KEY: &str = "argocd.argoproj.io/managed-by-cluster-argocd";
pub const CLUSTER_MONITORING_LABEL_KEY: &str = "openshift.io/cluster-monitoring";
pub const ARGOCD_FINALIZER: &str = "argoproj.io/finalizer";
pub const OPERATOR_MANAGER_NAME: &str = "gitops-operator";

// Env vars
pub const DISABLE_DEFAULT_ARGOCD_INSTANCE_ENV_VAR: &str = "DISABLE_DEFAULT_ARGOCD_INSTANCE";
pub const DISABLE_DEFAULT_ARGOCD_CONSOLELINK_ENV_VAR: &str = "DISABLE_DEFAULT_ARGOCD_CONSOLELINK";
pub const ARGOCD_CLUSTER_CONFIG_NAMESPACES_ENV_VAR: &str = "ARGOCD_CLUSTER_CONFIG_NAMESPACES";
pub const CONTROLLER_CLUSTER_ROLE_ENV_VAR: &str = "CONTROLLER_CLUSTER_ROLE";
pub const SERVER_CLUSTER_ROLE_ENV_VAR: &str = "SERVER_CLUSTER_ROLE";
pub const ARGOCD_LABEL_SELECTOR_ENV_VAR: &str = "ARGOCD_LABEL_SELECTOR";
pub const ALLOW_NAMESPACE_MANAGEMENT_ENV_VAR: &str = "ALLOW_NAMESPACE_MANAGEMENT_IN_NAMESPACE_SCOPED_INSTANCES";
pub const IMAGE_PULL_POLICY_ENV_VAR: &str = "IMAGE_PULL_POLICY";
pub const REMOVE_MANAGED_BY_LABEL_ENV_VAR: &str = "REMOVE_MANAGED_BY_LABEL_ON_ARGOCD_DELETION";
pub const DYNAMIC_PLUGIN_START_OCP_VERSION_ENV_VAR: &str = "DYNAMIC_PLUGIN_START_OCP_VERSION";
pub const NON_OLM_ENV_VAR: &str = "NON_OLM";
pub const LOCAL_RUN_ENV_VAR: &str = "LOCAL_RUN";
pub const CI_ENV_VAR: &str = "CI";
pub const BACKEND_IMAGE_ENV_VAR: &str = "BACKEND_IMAGE";
pub const PLUGIN_IMAGE_ENV_VAR: &str = "GITOPS_CONSOLE_PLUGIN_IMAGE";
pub const ROLLOUTS_IMAGE_ENV_VAR: &str = "ARGO_ROLLOUTS_IMAGE";
pub const KAM_IMAGE_ENV_VAR: &str = "KAM_IMAGE";
pub const DISABLE_KAM_ENV_VAR: &str = "DISABLE_KAM";
pub const PROXY_ENV_VARS: [&str; 3] = ["HTTP_PROXY", "HTTPS_PROXY", "NO_PROXY"];

// Defaults
pub const DEFAULT_ARGOCD_INSTANCE_NAME: &str = "openshift-gitops";
pub const DEFAULT_ARGOCD_NAMESPACE: &str = "openshift-gitops";
pub const DEPRECATED_BACKEND_NAMESPACE: &str = "openshift-pipelines-app-delivery";
pub const DEFAULT_PLUGIN_START_OCP_VERSION: &str = "4.15.0";
pub const DEFAULT_BACKEND_IMAGE: &str = "quay.io/redhat-developer/gitops-backend:v0.0.1";
pub const DEFAULT_PLUGIN_IMAGE: &str = "quay.io/redhat-developer/gitops-console-plugin:v0.1.0";
pub const DEFAULT_ROLLOUTS_IMAGE: &str = "quay.io/argoproj/argo-rollouts:v1.7.2";
pub const DEFAULT_KAM_IMAGE: &str = "quay.io/redhat-developer/kam:v0.0.19";
pub const DEFAULT_OPERATOR_NAMESPACE: &str = "openshift-gitops-operator";
pub const DEFAULT_OPERATOR_DEPLOYMENT: &str = "openshift-gitops-operator-controller-manager";
pub const DEFAULT_SUBSCRIPTION_NAME: &str = "openshift-gitops-operator";
pub const CI_SUBSCRIPTION_PREFIX: &str = "gitops-operator-";
pub const MONITORING_NAMESPACE: &str = "openshift-monitoring";
pub const PROMETHEUS_SERVICE_ACCOUNT: &str = "prometheus-k8s";
pub const DASHBOARD_NAMESPACE: &str = "openshift-config-managed";

// Timing
pub const RETRY_DELAY_SECONDS: u64 = 5;
pub const ERROR_RETRY_DELAY_SECONDS: u64 = 5;
pub const MAX_ERROR_RETRY_DELAY_SECONDS: u64 = 300;
pub const PERMANENT_ERROR_RETRY_DELAY_SECONDS: u64 = 300;
pub const RECONCILE_TIMEOUT_SECONDS: u64 = 120;
pub const CONFLICT_RETRY_ATTEMPTS: usize = 5;

// What the API server fills in for secret and configmap volumes without an explicit mode
pub const VOLUME_DEFAULT_MODE: i32 = 0o644;
