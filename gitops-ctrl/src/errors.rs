use std::ops::Deref;

use gitops_core::errors::*;

// anyhow::Error doesn't implement std::error::Error, but the controller runtime needs reconcile
// errors that do; wrap it and deref back to the anyhow error wherever we inspect it.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct AnyhowError(#[from] anyhow::Error);

impl Deref for AnyhowError {
    type Target = anyhow::Error;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// Everything in here is treated as permanent by the dispatcher: retrying quickly won't help
err_impl! {GitopsControllerError,
    #[error("required API not available on this cluster: {0}")]
    MissingApi(String),

    #[error("invalid SSO configuration on {0}")]
    InvalidSsoConfig(String),
}

err_impl! {DispatchError,
    #[error("reconcile of {0} timed out")]
    ReconcileTimeout(String),

    #[error("reconcile of {0} panicked")]
    ReconcilePanicked(String),
}
