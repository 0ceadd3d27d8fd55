use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Mutex;

use futures::FutureExt;
use gitops_core::config::ConfigError;
use gitops_core::prelude::*;
use gitops_core::writer::is_conflict;
use kube::Resource;
use kube::runtime::controller::Action;
use tokio::time::{
    Duration,
    timeout,
};
use tracing::*;

use crate::errors::*;

pub const REQUEUE_DURATION: Duration = Duration::from_secs(RETRY_DELAY_SECONDS);
pub const PERMANENT_ERROR_REQUEUE_DURATION: Duration = Duration::from_secs(PERMANENT_ERROR_RETRY_DELAY_SECONDS);
pub const RECONCILE_TIMEOUT: Duration = Duration::from_secs(RECONCILE_TIMEOUT_SECONDS);

const BASE_BACKOFF: Duration = Duration::from_secs(ERROR_RETRY_DELAY_SECONDS);
const MAX_BACKOFF: Duration = Duration::from_secs(MAX_ERROR_RETRY_DELAY_SECONDS);

// The controller runtime already serializes work per object; this key is only used to track
// back-off state and to label logs
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct DispatchKey {
    pub kind: String,
    pub namespace: Option<String>,
    pub name: String,
}

impl DispatchKey {
    pub fn of<K: Resource<DynamicType = ()>>(obj: &K) -> DispatchKey {
        DispatchKey {
            kind: K::kind(&()).into(),
            namespace: obj.namespace(),
            name: obj.name_any(),
        }
    }
}

impl fmt::Display for DispatchKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{} {}/{}", self.kind, ns, self.name),
            None => write!(f, "{} {}", self.kind, self.name),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    Conflict,
    Permanent,
    Transient,
}

pub fn classify(err: &anyhow::Error) -> ErrorClass {
    if is_conflict(err) {
        ErrorClass::Conflict
    } else if err.is::<GitopsControllerError>() || err.is::<ConfigError>() {
        ErrorClass::Permanent
    } else {
        ErrorClass::Transient
    }
}

#[derive(Debug, Default)]
pub struct Dispatcher {
    failures: Mutex<HashMap<DispatchKey, u32>>,
}

impl Dispatcher {
    // Runs one reconcile with a deadline, turning panics and timeouts into ordinary errors so the
    // error policy can requeue the key.  A success clears the key's back-off.
    pub async fn guard<F>(&self, key: &DispatchKey, fut: F) -> Result<Action, AnyhowError>
    where
        F: Future<Output = anyhow::Result<Action>>,
    {
        let res = match timeout(RECONCILE_TIMEOUT, AssertUnwindSafe(fut).catch_unwind()).await {
            Err(_) => Err(DispatchError::reconcile_timeout(&key.to_string())),
            Ok(Err(panic)) => {
                let msg = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_default();
                error!("recovered from panic in reconcile of {key}: {msg}");
                Err(DispatchError::reconcile_panicked(&key.to_string()))
            },
            Ok(Ok(res)) => res,
        };

        if res.is_ok() {
            self.reset(key);
        }
        res.map_err(AnyhowError::from)
    }

    pub fn error_action(&self, key: &DispatchKey, err: &anyhow::Error) -> Action {
        match classify(err) {
            ErrorClass::Conflict => {
                debug!("conflict reconciling {key}, requeueing immediately");
                Action::requeue(Duration::ZERO)
            },
            ErrorClass::Permanent => Action::requeue(PERMANENT_ERROR_REQUEUE_DURATION),
            ErrorClass::Transient => Action::requeue(self.next_backoff(key)),
        }
    }

    pub fn next_backoff(&self, key: &DispatchKey) -> Duration {
        let mut failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
        let count = failures.entry(key.clone()).or_insert(0);
        let delay = BASE_BACKOFF.saturating_mul(2u32.saturating_pow(*count)).min(MAX_BACKOFF);
        *count = count.saturating_add(1);
        delay
    }

    pub fn reset(&self, key: &DispatchKey) {
        self.failures.lock().unwrap_or_else(|e| e.into_inner()).remove(key);
    }
}
