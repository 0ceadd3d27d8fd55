use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use gitops_core::config::EffectiveConfig;
use gitops_core::k8s::build_object_meta;
use gitops_core::macros::*;
use gitops_core::prelude::*;
use gitops_core::writer;
use k8s_openapi::ByteString;
use rand::distributions::Alphanumeric;
use rand::{
    Rng,
    RngCore,
};
use tracing::*;

use crate::cluster_rbac::is_promoted;

pub const RBAC_CONFIG_MAP_NAME: &str = "argocd-rbac-cm";
pub const ARGOCD_SECRET_NAME: &str = "argocd-secret";
pub const DEFAULT_RBAC_POLICY: &str = "role:readonly";
pub const DEFAULT_RBAC_SCOPES: &str = "[groups]";

pub const POLICY_CSV_KEY: &str = "policy.csv";
pub const POLICY_DEFAULT_KEY: &str = "policy.default";
pub const POLICY_MATCH_MODE_KEY: &str = "policy.matchMode";
pub const SCOPES_KEY: &str = "scopes";
pub const ADMIN_PASSWORD_KEY: &str = "admin.password";
pub const ADMIN_PASSWORD_MTIME_KEY: &str = "admin.passwordMtime";
pub const SERVER_SECRET_KEY: &str = "server.secretkey";
pub const CLUSTER_SECRET_NAMESPACES_KEY: &str = "namespaces";

const GENERATED_PASSWORD_LENGTH: usize = 32;
const SERVER_SECRET_KEY_BYTES: usize = 32;

pub fn cluster_secret_name(instance: &ArgoCD) -> String {
    format!("{}-cluster", instance.name_any())
}

pub fn default_cluster_config_secret_name(instance: &ArgoCD) -> String {
    format!("{}-default-cluster-config", instance.name_any())
}

pub fn generate_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_PASSWORD_LENGTH)
        .map(char::from)
        .collect()
}

pub fn generate_server_key() -> String {
    let mut bytes = [0u8; SERVER_SECRET_KEY_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    STANDARD.encode(bytes)
}

pub fn build_rbac_config_map(instance: &ArgoCD) -> anyhow::Result<corev1::ConfigMap> {
    let ns = instance.namespace().unwrap_or_default();
    let rbac = instance.spec.rbac.clone().unwrap_or_default();

    let mut data = kmap!(
        POLICY_CSV_KEY => rbac.policy.unwrap_or_default(),
        POLICY_DEFAULT_KEY => rbac.default_policy.unwrap_or(DEFAULT_RBAC_POLICY.into()),
        SCOPES_KEY => rbac.scopes.unwrap_or(DEFAULT_RBAC_SCOPES.into()),
    );
    if let Some(mode) = rbac.policy_matcher_mode {
        data.insert(POLICY_MATCH_MODE_KEY.into(), mode);
    }

    let mut meta = build_object_meta(&ns, RBAC_CONFIG_MAP_NAME, instance)?;
    meta.labels.get_or_insert_default().insert(APP_KUBERNETES_IO_PART_OF_KEY.into(), "argocd".into());
    Ok(corev1::ConfigMap { metadata: meta, data: Some(data), ..Default::default() })
}

fn string_data(pairs: impl IntoIterator<Item = (&'static str, String)>) -> BTreeMap<String, ByteString> {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), ByteString(v.into_bytes())))
        .collect()
}

pub fn build_cluster_secret(instance: &ArgoCD, password: String) -> anyhow::Result<corev1::Secret> {
    let ns = instance.namespace().unwrap_or_default();
    Ok(corev1::Secret {
        metadata: build_object_meta(&ns, &cluster_secret_name(instance), instance)?,
        type_: Some("Opaque".into()),
        data: Some(string_data([(ADMIN_PASSWORD_KEY, password)])),
        ..Default::default()
    })
}

// Values here only land on keys that are missing or empty in the live Secret, so an existing
// password or server key is never rotated
pub fn build_argocd_secret(instance: &ArgoCD, admin_password: String) -> anyhow::Result<corev1::Secret> {
    let ns = instance.namespace().unwrap_or_default();
    Ok(corev1::Secret {
        metadata: build_object_meta(&ns, ARGOCD_SECRET_NAME, instance)?,
        type_: Some("Opaque".into()),
        data: Some(string_data([
            (ADMIN_PASSWORD_KEY, admin_password),
            (ADMIN_PASSWORD_MTIME_KEY, Utc::now().to_rfc3339()),
            (SERVER_SECRET_KEY, generate_server_key()),
        ])),
        ..Default::default()
    })
}

fn secret_value(secret: &corev1::Secret, key: &str) -> Option<String> {
    let value = secret.data.as_ref()?.get(key)?;
    (!value.0.is_empty()).then(|| String::from_utf8_lossy(&value.0).into_owned())
}

async fn reconcile_secrets(client: &kube::Client, instance: &ArgoCD) -> EmptyResult {
    let ns = instance.namespace().unwrap_or_default();
    let secret_api = kube::Api::<corev1::Secret>::namespaced(client.clone(), &ns);

    writer::apply(&secret_api, &build_cluster_secret(instance, generate_password())?).await?;

    // Whatever password is live in the cluster secret is the one argocd-secret gets
    let password = secret_api
        .get_opt(&cluster_secret_name(instance))
        .await?
        .and_then(|s| secret_value(&s, ADMIN_PASSWORD_KEY))
        .unwrap_or_else(generate_password);
    writer::apply(&secret_api, &build_argocd_secret(instance, password)?).await?;
    Ok(())
}

// A cluster-config instance manages the whole cluster, so its default cluster secret must not
// narrow it down to a namespace list
async fn scope_cluster_secret(client: &kube::Client, config: &EffectiveConfig, instance: &ArgoCD) -> EmptyResult {
    if !is_promoted(config, instance) {
        return Ok(());
    }

    let ns = instance.namespace().unwrap_or_default();
    let secret_api = kube::Api::<corev1::Secret>::namespaced(client.clone(), &ns);
    writer::mutate(&secret_api, &default_cluster_config_secret_name(instance), |secret: &mut corev1::Secret| {
        let in_data = secret.data.as_mut().is_some_and(|d| d.remove(CLUSTER_SECRET_NAMESPACES_KEY).is_some());
        let in_string_data = secret
            .string_data
            .as_mut()
            .is_some_and(|d| d.remove(CLUSTER_SECRET_NAMESPACES_KEY).is_some());
        in_data || in_string_data
    })
    .await?;
    Ok(())
}

async fn manage_namespaces(client: &kube::Client, config: &EffectiveConfig, instance: &ArgoCD) -> EmptyResult {
    let entries = instance.spec.namespace_management.as_deref().unwrap_or_default();
    if entries.is_empty() {
        return Ok(());
    }
    if !config.allow_namespace_management {
        debug!("namespace management is disabled, ignoring entries on {}", instance.namespaced_name());
        return Ok(());
    }

    let instance_ns = instance.namespace().unwrap_or_default();
    let ns_api = kube::Api::<corev1::Namespace>::all(client.clone());
    for entry in entries.iter().filter(|e| e.allow_managed_by) {
        writer::mutate(&ns_api, &entry.name, |ns: &mut corev1::Namespace| {
            let labels = ns.labels_mut();
            match labels.get(MANAGED_BY_LABEL_KEY) {
                Some(owner) if *owner == instance_ns => false,
                Some(owner) => {
                    warn!("namespace {} is already managed by {owner}", entry.name);
                    false
                },
                None => {
                    labels.insert(MANAGED_BY_LABEL_KEY.into(), instance_ns.clone());
                    true
                },
            }
        })
        .await?;
    }
    Ok(())
}

pub async fn reconcile(client: &kube::Client, config: &EffectiveConfig, instance: &ArgoCD) -> EmptyResult {
    let ns = instance.namespace().unwrap_or_default();
    let cm_api = kube::Api::<corev1::ConfigMap>::namespaced(client.clone(), &ns);
    writer::apply(&cm_api, &build_rbac_config_map(instance)?).await?;

    reconcile_secrets(client, instance).await?;
    scope_cluster_secret(client, config, instance).await?;
    manage_namespaces(client, config, instance).await
}
