use std::collections::BTreeSet;
use std::fmt::Debug;

use kube::api::{
    DeleteParams,
    ListParams,
    PostParams,
};
use kube::core::ErrorResponse;
use kube::{
    Api,
    Resource,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::*;

use crate::compare::{
    OwnedFields,
    merge_meta,
    meta_eq,
};
use crate::errors::*;
use crate::prelude::*;

err_impl! {pub WriterError,
    #[error("gave up writing {0} after repeated conflicts")]
    ConflictRetriesExhausted(String),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ApplyOutcome {
    Created,
    Updated(Option<i64>),
    NoOp,
}

pub fn is_api_error(err: &anyhow::Error, code: u16) -> bool {
    matches!(err.downcast_ref::<kube::Error>(), Some(kube::Error::Api(ErrorResponse { code: c, .. })) if *c == code)
}

pub fn is_conflict(err: &anyhow::Error) -> bool {
    is_api_error(err, 409)
}

pub fn is_not_found(err: &anyhow::Error) -> bool {
    is_api_error(err, 404)
}

// Create-or-update.  The observed object is re-read on every attempt, so a 409 (someone else
// wrote in between, or a create raced with an informer that hadn't seen the object yet) just
// causes the merge to be recomputed against the fresh copy.
pub async fn apply<K>(api: &Api<K>, desired: &K) -> anyhow::Result<ApplyOutcome>
where
    K: Resource<DynamicType = ()> + OwnedFields + Clone + Debug + Serialize + DeserializeOwned,
{
    let name = desired.name_any();
    for attempt in 1..=CONFLICT_RETRY_ATTEMPTS {
        let res = match api.get_opt(&name).await? {
            None => create(api, desired).await,
            Some(observed) => update(api, desired, observed).await,
        };

        match res {
            Err(err) if is_conflict(&err) => {
                debug!("conflict writing {} {} (attempt {attempt}), retrying", K::kind(&()), desired.namespaced_name());
            },
            res => return res,
        }
    }

    Err(WriterError::conflict_retries_exhausted(&desired.namespaced_name()))
}

// Create-only; an existing object is never touched.  Used for placeholders whose contents are
// filled in by another controller (e.g., the service CA).
pub async fn ensure_exists<K>(api: &Api<K>, desired: &K) -> anyhow::Result<ApplyOutcome>
where
    K: Resource<DynamicType = ()> + Clone + Debug + Serialize + DeserializeOwned,
{
    if api.get_opt(&desired.name_any()).await?.is_some() {
        debug!("{} {} already exists", K::kind(&()), desired.namespaced_name());
        return Ok(ApplyOutcome::NoOp);
    }

    match create(api, desired).await {
        Err(err) if is_api_error(&err, 409) => Ok(ApplyOutcome::NoOp),
        res => res,
    }
}

// Read-modify-write on an object the operator doesn't fully own.  `mutator` returns false when
// it made no change, in which case nothing is written.  A missing object is a NoOp.
pub async fn mutate<K, F>(api: &Api<K>, name: &str, mutator: F) -> anyhow::Result<ApplyOutcome>
where
    K: Resource<DynamicType = ()> + Clone + Debug + Serialize + DeserializeOwned,
    F: Fn(&mut K) -> bool,
{
    for attempt in 1..=CONFLICT_RETRY_ATTEMPTS {
        let Some(mut obj) = api.get_opt(name).await? else {
            return Ok(ApplyOutcome::NoOp);
        };

        if !mutator(&mut obj) {
            return Ok(ApplyOutcome::NoOp);
        }

        match api.replace(name, &PostParams::default(), &obj).await {
            Ok(updated) => {
                info!("updated {} {}", K::kind(&()), updated.namespaced_name());
                return Ok(ApplyOutcome::Updated(updated.meta().generation));
            },
            Err(kube::Error::Api(ErrorResponse { code: 409, .. })) => {
                debug!("conflict updating {} {name} (attempt {attempt}), retrying", K::kind(&()));
            },
            Err(err) => return Err(err.into()),
        }
    }

    Err(WriterError::conflict_retries_exhausted(name))
}

// Deletes the named object if it exists and `is_ours` says the operator owns it.  Returns true
// if a delete was issued.
pub async fn delete_owned<K, F>(api: &Api<K>, name: &str, is_ours: F) -> anyhow::Result<bool>
where
    K: Resource<DynamicType = ()> + Clone + Debug + DeserializeOwned,
    F: Fn(&K) -> bool,
{
    let Some(obj) = api.get_opt(name).await? else {
        return Ok(false);
    };

    if !is_ours(&obj) {
        debug!("{} {} is not owned by the operator, leaving it alone", K::kind(&()), obj.namespaced_name());
        return Ok(false);
    }

    delete(api, name).await
}

// Deletes every object matching `selector` whose name isn't in `keep`.  Returns true if anything
// was deleted.
pub async fn prune<K>(api: &Api<K>, selector: &str, keep: &BTreeSet<String>) -> anyhow::Result<bool>
where
    K: Resource<DynamicType = ()> + Clone + Debug + DeserializeOwned,
{
    let mut removed = false;
    for obj in api.list(&ListParams::default().labels(selector)).await?.items {
        let name = obj.name_any();
        if !keep.contains(&name) {
            removed |= delete(api, &name).await?;
        }
    }
    Ok(removed)
}

// Unconditional delete; a 404 is not an error
pub async fn delete<K>(api: &Api<K>, name: &str) -> anyhow::Result<bool>
where
    K: Resource<DynamicType = ()> + Clone + Debug + DeserializeOwned,
{
    match api.delete(name, &DeleteParams::default()).await {
        Ok(_) => {
            info!("deleted {} {name}", K::kind(&()));
            Ok(true)
        },
        Err(kube::Error::Api(ErrorResponse { code: 404, .. })) => Ok(false),
        Err(err) => Err(err.into()),
    }
}

async fn create<K>(api: &Api<K>, desired: &K) -> anyhow::Result<ApplyOutcome>
where
    K: Resource<DynamicType = ()> + Clone + Debug + Serialize + DeserializeOwned,
{
    api.create(&PostParams::default(), desired).await?;
    info!("created {} {}", K::kind(&()), desired.namespaced_name());
    Ok(ApplyOutcome::Created)
}

async fn update<K>(api: &Api<K>, desired: &K, mut observed: K) -> anyhow::Result<ApplyOutcome>
where
    K: Resource<DynamicType = ()> + OwnedFields + Clone + Debug + Serialize + DeserializeOwned,
{
    if meta_eq(desired.meta(), observed.meta()) && K::owned_eq(desired, &observed) {
        debug!("{} {} is up to date", K::kind(&()), desired.namespaced_name());
        return Ok(ApplyOutcome::NoOp);
    }

    if K::requires_recreate(desired, &observed) {
        info!("{} {} has an immutable field change, recreating", K::kind(&()), desired.namespaced_name());
        delete(api, &desired.name_any()).await?;
        return create(api, desired).await;
    }

    merge_meta(desired.meta(), observed.meta_mut());
    K::merge_owned(desired, &mut observed);

    let updated = api.replace(&desired.name_any(), &PostParams::default(), &observed).await?;
    info!("updated {} {}", K::kind(&()), desired.namespaced_name());
    Ok(ApplyOutcome::Updated(updated.meta().generation))
}

#[cfg(test)]
mod tests;
