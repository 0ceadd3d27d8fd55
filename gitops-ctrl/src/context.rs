use std::sync::Arc;

use gitops_api::v1alpha1::GITOPS_SERVICE_SINGLETON_NAME;
use gitops_core::config::{
    EffectiveConfig,
    EnvSource,
    OperatorEnv,
    resolve,
};
use gitops_core::prelude::*;

use crate::Options;
use crate::dispatch::Dispatcher;

#[derive(Clone)]
pub struct GitopsContext {
    pub client: kube::Client,
    pub opts: Options,
    pub env_source: EnvSource,
    pub dispatcher: Arc<Dispatcher>,
}

impl GitopsContext {
    pub fn new(client: kube::Client, opts: Options) -> GitopsContext {
        let env_source = EnvSource {
            operator_namespace: opts.operator_namespace.clone(),
            operator_deployment: opts.operator_deployment.clone(),
            subscription_name: opts.subscription_name.clone(),
        };

        GitopsContext {
            client,
            opts,
            env_source,
            dispatcher: Arc::new(Dispatcher::default()),
        }
    }

    // The operator environment is re-read on every reconcile so that edits to the
    // Subscription/Deployment take effect without restarting the process
    pub async fn operator_env(&self) -> anyhow::Result<OperatorEnv> {
        self.env_source.load(&self.client).await
    }

    pub async fn gitops_service(&self) -> anyhow::Result<Option<GitopsService>> {
        let gs_api = kube::Api::<GitopsService>::all(self.client.clone());
        Ok(gs_api.get_opt(GITOPS_SERVICE_SINGLETON_NAME).await?)
    }

    pub async fn config_for(&self, argocd: Option<&ArgoCD>) -> anyhow::Result<EffectiveConfig> {
        let env = self.operator_env().await?;
        let gitops_service = self.gitops_service().await?;
        resolve(&env, gitops_service.as_ref(), argocd)
    }
}
