//! Upsert and delete engines.
//!
//! Both engines look a document up before writing so that the caller never
//! has to know whether a key exists or which revision it carries. The
//! revision used for the write is always the one just fetched from the
//! target store.

use crate::document::Document;
use crate::error::CoreResult;
use pulsedb_storage::{DocumentStore, Revision};
use pulsedb_sync::RetryConfig;
use tracing::debug;

/// Creates or updates `doc` in `store`.
///
/// Any revision carried by `doc` is ignored. The current revision is read
/// from the store; if the key is live the document is `put` with that
/// revision, otherwise it is `post`ed.
///
/// # Errors
///
/// Lookup failures other than `NotFound` are returned before anything is
/// written. Write failures (including `Conflict` when another writer won
/// the race) are returned unchanged.
pub async fn upsert(store: &dyn DocumentStore, doc: &Document) -> CoreResult<Revision> {
    let mut doc = doc.clone();
    doc.rev = None;

    match store.get(&doc.id).await {
        Ok(current) => {
            debug!(store = store.name(), id = %doc.id, rev = ?current.rev, "updating document");
            doc.rev = current.rev;
            Ok(store.put(doc.to_stored()?).await?)
        }
        Err(err) if err.is_not_found() => {
            debug!(store = store.name(), id = %doc.id, "creating document");
            Ok(store.post(doc.to_stored()?).await?)
        }
        Err(err) => Err(err.into()),
    }
}

/// Updates an existing document, failing if it is absent.
///
/// # Errors
///
/// Returns a `NotFound` storage error when no live document holds the id.
pub async fn update(store: &dyn DocumentStore, doc: &Document) -> CoreResult<Revision> {
    let current = store.get(&doc.id).await?;
    let mut doc = doc.clone();
    doc.rev = current.rev;
    debug!(store = store.name(), id = %doc.id, rev = ?doc.rev, "updating document");
    Ok(store.put(doc.to_stored()?).await?)
}

/// Deletes the document stored under `id`, if any.
///
/// Deleting an absent document succeeds, as does losing the race against
/// another remover between lookup and removal.
///
/// # Errors
///
/// Returns any storage failure other than `NotFound`.
pub async fn remove(store: &dyn DocumentStore, id: &str) -> CoreResult<()> {
    let current = match store.get(id).await {
        Ok(current) => current,
        Err(err) if err.is_not_found() => {
            debug!(store = store.name(), id, "delete of absent document");
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    match store.remove(&current).await {
        Ok(rev) => {
            debug!(store = store.name(), id, %rev, "deleted document");
            Ok(())
        }
        Err(err) if err.is_not_found() => {
            debug!(store = store.name(), id, "document vanished before delete");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

/// Upserts `doc`, retrying when a concurrent writer causes a conflict.
///
/// Only `Conflict` is retried; each retry re-reads the current revision.
/// Delays follow `retry`.
///
/// # Errors
///
/// Returns the last conflict once `retry.max_attempts` is exhausted, or
/// the first non-conflict error.
pub async fn upsert_with_retry(
    store: &dyn DocumentStore,
    doc: &Document,
    retry: &RetryConfig,
) -> CoreResult<Revision> {
    let max_attempts = retry.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match upsert(store, doc).await {
            Err(err) if err.is_conflict() && attempt + 1 < max_attempts => {
                attempt += 1;
                let delay = retry.delay_for_attempt(attempt);
                debug!(id = %doc.id, attempt, ?delay, "upsert conflict, retrying");
                tokio::time::sleep(delay).await;
            }
            result => return result,
        }
    }
}
