mod util;

pub use util::*;

use crate::errors::*;
use crate::prelude::*;

// Labels used to tie objects to an ArgoCD instance when an owner reference isn't allowed
// (cluster-scoped objects, or objects in a different namespace from the instance)
pub const ARGOCD_OWNER_NAME_LABEL_KEY: &str = "argocds.argoproj.io/name";
pub const ARGOCD_OWNER_NAMESPACE_LABEL_KEY: &str = "argocds.argoproj.io/namespace";

err_impl! {pub KubernetesError,
    #[error("object has no uid: {0}")]
    MissingUid(String),
}

pub trait KubeResourceExt {
    fn namespaced_name(&self) -> String;
    fn is_deleting(&self) -> bool;
    fn has_finalizer(&self, finalizer: &str) -> bool;
}

#[cfg(test)]
pub mod tests;
