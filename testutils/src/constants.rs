pub const TEST_NAMESPACE: &str = "test-namespace";
pub const TEST_ARGOCD_NAME: &str = "test-argocd";
pub const TEST_ARGOCD_UID: &str = "1234-asdf";
pub const TEST_GITOPS_SERVICE_UID: &str = "qwerty-5678";
pub const TEST_MANAGED_NAMESPACE: &str = "managed-namespace";
pub const TEST_SOURCE_NAMESPACE: &str = "source-namespace";
pub const TEST_ROLLOUT_MANAGER_NAME: &str = "test-rollouts";
pub const TEST_ROUTE_HOST: &str = "openshift-gitops-server-openshift-gitops.apps.example.com";
pub const TEST_OPERATOR_NAMESPACE: &str = "operator-ns";
pub const TEST_DEPLOYMENT: &str = "the-deployment";
