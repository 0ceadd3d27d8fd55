use gitops_api::openshift::*;
use gitops_core::config::EffectiveConfig;
use gitops_core::k8s::{
    build_global_object_meta,
    build_object_meta,
};
use gitops_core::macros::*;
use gitops_core::prelude::*;
use gitops_core::version::OcpVersion;
use gitops_core::writer;
use tracing::*;

use crate::placement;
use crate::workload::*;

pub const PLUGIN_NAME: &str = "gitops-plugin";
pub const PLUGIN_DISPLAY_NAME: &str = "GitOps Plugin";
pub const PLUGIN_PORT: i32 = 9001;
pub const PLUGIN_SERVICE_PORT_NAME: &str = "tcp-9001";
pub const PLUGIN_SERVING_CERT_NAME: &str = "console-serving-cert";
pub const HTTPD_CONFIG_MAP_NAME: &str = "httpd-cfg";
pub const HTTPD_CONFIG_KEY: &str = "httpd.conf";
pub const APP_LABEL_KEY: &str = "app";


pub const HTTPD_CONFIG: &str = r#"LoadModule ssl_module modules/mod_ssl.so
Listen 9001 https
ServerRoot "/etc/httpd"

<VirtualHost *:9001>
	DocumentRoot /var/www/html/plugin
	SSLEngine on
	SSLCertificateFile "/etc/httpd-ssl/certs/tls.crt"
	SSLCertificateKeyFile "/etc/httpd-ssl/private/tls.key"
</VirtualHost>"#;

// The plugin needs the dynamic-plugin console API; clusters older than the start version get
// neither the workload nor the ConsolePlugin
pub fn plugin_supported(config: &EffectiveConfig, cluster_version: Option<&OcpVersion>) -> bool {
    match (cluster_version, &config.plugin_start_version) {
        (Some(actual), Some(start)) => actual.is_at_least(start),
        _ => false,
    }
}

pub struct PluginObjects {
    pub deployment: appsv1::Deployment,
    pub service: corev1::Service,
    pub config_map: corev1::ConfigMap,
    pub console_plugin: ConsolePlugin,
}

fn plugin_labels() -> BTreeMap<String, String> {
    kmap!(
        APP_LABEL_KEY => PLUGIN_NAME,
        APP_KUBERNETES_IO_COMPONENT_KEY => PLUGIN_NAME,
        APP_KUBERNETES_IO_INSTANCE_KEY => PLUGIN_NAME,
        APP_KUBERNETES_IO_NAME_KEY => PLUGIN_NAME,
        APP_KUBERNETES_IO_PART_OF_KEY => PLUGIN_NAME,
    )
}

fn read_only_mount(volume: &str, mount_path: &str, sub_path: &str) -> corev1::VolumeMount {
    corev1::VolumeMount {
        name: volume.into(),
        mount_path: mount_path.into(),
        sub_path: Some(sub_path.into()),
        read_only: Some(true),
        ..Default::default()
    }
}

fn plugin_pod_spec(config: &EffectiveConfig, owner: &GitopsService) -> corev1::PodSpec {
    let mut pod_spec = corev1::PodSpec {
        containers: vec![corev1::Container {
            name: PLUGIN_NAME.into(),
            image: Some(config.plugin_image.clone()),
            env: (!config.proxy_env.is_empty()).then(|| config.proxy_env.clone()),
            ports: Some(vec![container_port("http", PLUGIN_PORT)]),
            volume_mounts: Some(vec![
                read_only_mount(PLUGIN_SERVING_CERT_NAME, "/etc/httpd-ssl/certs/tls.crt", "tls.crt"),
                read_only_mount(PLUGIN_SERVING_CERT_NAME, "/etc/httpd-ssl/private/tls.key", "tls.key"),
                read_only_mount(HTTPD_CONFIG_MAP_NAME, "/etc/httpd-cfg/httpd.conf", HTTPD_CONFIG_KEY),
            ]),
            resources: Some(
                owner
                    .plugin_resources()
                    .cloned()
                    .unwrap_or_else(|| resources("250m", "128Mi", "500m", "256Mi")),
            ),
            security_context: Some(restricted_security_context()),
            ..Default::default()
        }],
        volumes: Some(vec![
            corev1::Volume {
                name: PLUGIN_SERVING_CERT_NAME.into(),
                secret: Some(corev1::SecretVolumeSource {
                    secret_name: Some(PLUGIN_SERVING_CERT_NAME.into()),
                    default_mode: Some(VOLUME_DEFAULT_MODE),
                    ..Default::default()
                }),
                ..Default::default()
            },
            corev1::Volume {
                name: HTTPD_CONFIG_MAP_NAME.into(),
                config_map: Some(corev1::ConfigMapVolumeSource {
                    name: HTTPD_CONFIG_MAP_NAME.into(),
                    default_mode: Some(VOLUME_DEFAULT_MODE),
                    ..Default::default()
                }),
                ..Default::default()
            },
        ]),
        restart_policy: Some("Always".into()),
        dns_policy: Some("ClusterFirst".into()),
        security_context: Some(runtime_default_pod_security_context()),
        ..Default::default()
    };
    placement::apply_to_pod(config, &mut pod_spec);
    placement::apply_pull_policy(config, &mut pod_spec);
    pod_spec
}

pub fn build_plugin(config: &EffectiveConfig, owner: &GitopsService, ns: &str) -> anyhow::Result<PluginObjects> {
    let selector = kmap!(APP_LABEL_KEY => PLUGIN_NAME);

    let mut depl_meta = build_object_meta(ns, PLUGIN_NAME, owner)?;
    let labels = depl_meta.labels.get_or_insert_default();
    labels.extend(plugin_labels());
    labels.insert(APP_OPENSHIFT_IO_RUNTIME_NAMESPACE_KEY.into(), ns.into());
    let deployment = build_deployment(depl_meta, selector.clone(), plugin_pod_spec(config, owner));

    let mut svc_meta = build_object_meta(ns, PLUGIN_NAME, owner)?;
    svc_meta.labels.get_or_insert_default().extend(plugin_labels());
    svc_meta.annotations = klabel!(SERVING_CERT_ANNOTATION_KEY => PLUGIN_SERVING_CERT_NAME);
    let service = corev1::Service {
        metadata: svc_meta,
        spec: Some(corev1::ServiceSpec {
            selector: Some(selector),
            ports: Some(vec![service_port(Some(PLUGIN_SERVICE_PORT_NAME), PLUGIN_PORT)]),
            ..Default::default()
        }),
        ..Default::default()
    };

    let mut cm_meta = build_object_meta(ns, HTTPD_CONFIG_MAP_NAME, owner)?;
    cm_meta.labels.get_or_insert_default().extend(kmap!(
        APP_LABEL_KEY => PLUGIN_NAME,
        APP_KUBERNETES_IO_PART_OF_KEY => PLUGIN_NAME,
    ));
    let config_map = corev1::ConfigMap {
        metadata: cm_meta,
        data: Some(kmap!(HTTPD_CONFIG_KEY => HTTPD_CONFIG)),
        ..Default::default()
    };

    let mut console_plugin = ConsolePlugin::new(
        PLUGIN_NAME,
        ConsolePluginSpec {
            display_name: PLUGIN_DISPLAY_NAME.into(),
            backend: ConsolePluginBackend {
                type_: CONSOLE_PLUGIN_BACKEND_SERVICE.into(),
                service: Some(ConsolePluginService {
                    name: PLUGIN_NAME.into(),
                    namespace: ns.into(),
                    port: PLUGIN_PORT,
                    base_path: Some("/".into()),
                }),
            },
            i18n: Some(ConsolePluginI18n { load_type: CONSOLE_PLUGIN_I18N_PRELOAD.into() }),
        },
    );
    console_plugin.metadata = build_global_object_meta(PLUGIN_NAME, owner)?;

    Ok(PluginObjects { deployment, service, config_map, console_plugin })
}

// Returns false while the service CA hasn't minted the serving cert yet; the pod can't start
// until it has, so the caller should check back later
pub async fn reconcile(
    client: &kube::Client,
    config: &EffectiveConfig,
    owner: &GitopsService,
    ns: &str,
) -> anyhow::Result<bool> {
    debug!("reconciling console plugin in {ns}");
    let objs = build_plugin(config, owner, ns)?;

    writer::apply(&kube::Api::namespaced(client.clone(), ns), &objs.config_map).await?;
    writer::apply(&kube::Api::namespaced(client.clone(), ns), &objs.service).await?;
    writer::apply(&kube::Api::namespaced(client.clone(), ns), &objs.deployment).await?;
    writer::apply(&kube::Api::all(client.clone()), &objs.console_plugin).await?;

    let secret_api = kube::Api::<corev1::Secret>::namespaced(client.clone(), ns);
    let cert_ready = secret_api.get_opt(PLUGIN_SERVING_CERT_NAME).await?.is_some();
    if !cert_ready {
        info!("waiting for {ns}/{PLUGIN_SERVING_CERT_NAME} to be issued");
    }
    Ok(cert_ready)
}
