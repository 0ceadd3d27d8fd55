use std::collections::BTreeMap;

use kube::api::Resource;
use kube::runtime::reflector::ObjectRef;

use super::*;
use crate::prelude::*;

pub fn owner_reference<K>(owner: &K) -> anyhow::Result<metav1::OwnerReference>
where
    K: Resource<DynamicType = ()>,
{
    let uid = owner
        .uid()
        .ok_or_else(|| KubernetesError::missing_uid(&owner.namespaced_name()))?;

    Ok(metav1::OwnerReference {
        api_version: K::api_version(&()).into(),
        kind: K::kind(&()).into(),
        name: owner.name_any(),
        uid,

        // if the delete propagation policy is set to foreground, this will block
        // the owner from being deleted until this object is deleted
        // (note _both_ must be set, otherwise it doesn't work)
        //
        // https://kubernetes.io/docs/concepts/architecture/garbage-collection/#foreground-deletion
        block_owner_deletion: Some(true),
        controller: Some(true),
    })
}

pub fn add_common_metadata<K>(owner: &K, meta: &mut metav1::ObjectMeta) -> EmptyResult
where
    K: Resource<DynamicType = ()>,
{
    let labels = meta.labels.get_or_insert(BTreeMap::new());
    labels.insert(APP_KUBERNETES_IO_MANAGED_BY_KEY.into(), OPERATOR_MANAGER_NAME.into());
    if let Some(name) = meta.name.clone() {
        labels.entry(APP_KUBERNETES_IO_NAME_KEY.into()).or_insert(name);
    }

    meta.owner_references.get_or_insert(vec![]).push(owner_reference(owner)?);
    Ok(())
}

pub fn build_global_object_meta<K>(name: &str, owner: &K) -> anyhow::Result<metav1::ObjectMeta>
where
    K: Resource<DynamicType = ()>,
{
    build_object_meta_helper(None, name, owner)
}

pub fn build_object_meta<K>(namespace: &str, name: &str, owner: &K) -> anyhow::Result<metav1::ObjectMeta>
where
    K: Resource<DynamicType = ()>,
{
    build_object_meta_helper(Some(namespace.into()), name, owner)
}

pub fn instance_labels(instance: &ArgoCD) -> BTreeMap<String, String> {
    BTreeMap::from([
        (APP_KUBERNETES_IO_MANAGED_BY_KEY.into(), OPERATOR_MANAGER_NAME.into()),
        (ARGOCD_OWNER_NAME_LABEL_KEY.into(), instance.name_any()),
        (ARGOCD_OWNER_NAMESPACE_LABEL_KEY.into(), instance.namespace().unwrap_or_default()),
    ])
}

// Reverse of instance_labels: the instance an RBAC object was written for, when it was tied to
// it by labels rather than an owner reference
pub fn labeled_instance<K: Resource>(obj: &K) -> Option<ObjectRef<ArgoCD>> {
    let labels = obj.labels();
    if labels.get(APP_KUBERNETES_IO_MANAGED_BY_KEY).map(String::as_str) != Some(OPERATOR_MANAGER_NAME) {
        return None;
    }

    let name = labels.get(ARGOCD_OWNER_NAME_LABEL_KEY)?;
    let namespace = labels.get(ARGOCD_OWNER_NAMESPACE_LABEL_KEY)?;
    Some(ObjectRef::new(name).within(namespace))
}

pub fn is_owned_by<K, O>(obj: &K, owner: &O) -> bool
where
    K: Resource,
    O: Resource,
{
    let Some(uid) = owner.uid() else { return false };
    obj.owner_references().iter().any(|r| r.uid == uid)
}

pub fn is_terminating(ns: &corev1::Namespace) -> bool {
    ns.metadata.deletion_timestamp.is_some()
        || ns.status.as_ref().and_then(|s| s.phase.as_deref()) == Some("Terminating")
}

impl<T: Resource> KubeResourceExt for T {
    fn namespaced_name(&self) -> String {
        match self.namespace() {
            Some(ns) => format!("{}/{}", ns, self.name_any()),
            None => self.name_any().clone(),
        }
    }

    fn is_deleting(&self) -> bool {
        self.meta().deletion_timestamp.is_some()
    }

    fn has_finalizer(&self, finalizer: &str) -> bool {
        self.finalizers().iter().any(|f| f == finalizer)
    }
}

fn build_object_meta_helper<K>(namespace: Option<String>, name: &str, owner: &K) -> anyhow::Result<metav1::ObjectMeta>
where
    K: Resource<DynamicType = ()>,
{
    let mut meta = metav1::ObjectMeta {
        namespace,
        name: Some(name.into()),
        ..Default::default()
    };

    add_common_metadata(owner, &mut meta)?;
    Ok(meta)
}
