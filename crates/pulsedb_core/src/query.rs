//! Filtered reads over a store.

use crate::document::{Document, DocumentKind};
use crate::error::CoreResult;
use chrono::{DateTime, Utc};
use pulsedb_storage::DocumentStore;
use tracing::debug;

/// Selects documents by time range and identity.
///
/// Empty filters match everything. When `from` is set without `to`, the
/// range ends at the time the query runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryFilter {
    /// Inclusive lower bound on `updated_at`.
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `updated_at`.
    pub to: Option<DateTime<Utc>>,
    /// Uid of data or client documents.
    pub uid: Option<String>,
    /// Serial of the writing host.
    pub serial: Option<String>,
    /// Document kind.
    pub kind: Option<DocumentKind>,
}

impl QueryFilter {
    /// Creates a filter matching every document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the lower time bound.
    #[must_use]
    pub fn from(mut self, from: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self
    }

    /// Sets the upper time bound.
    #[must_use]
    pub fn to(mut self, to: DateTime<Utc>) -> Self {
        self.to = Some(to);
        self
    }

    /// Restricts to one uid.
    #[must_use]
    pub fn uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    /// Restricts to one host serial.
    #[must_use]
    pub fn serial(mut self, serial: impl Into<String>) -> Self {
        self.serial = Some(serial.into());
        self
    }

    /// Restricts to one document kind.
    #[must_use]
    pub fn kind(mut self, kind: DocumentKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Closes an open-ended range at `now`.
    #[must_use]
    pub fn normalized(mut self, now: DateTime<Utc>) -> Self {
        if self.from.is_some() && self.to.is_none() {
            self.to = Some(now);
        }
        self
    }

    /// Returns true if `doc` passes every criterion.
    pub fn matches(&self, doc: &Document) -> bool {
        if self.from.is_some_and(|from| doc.updated_at < from) {
            return false;
        }
        if self.to.is_some_and(|to| doc.updated_at > to) {
            return false;
        }
        if let Some(uid) = &self.uid {
            if doc.uid() != Some(uid.as_str()) {
                return false;
            }
        }
        if let Some(serial) = &self.serial {
            if &doc.serial != serial {
                return false;
            }
        }
        self.kind.map_or(true, |kind| doc.kind() == kind)
    }
}

/// Returns the documents in `store` matching `filter`, oldest first.
///
/// Documents that fail to decode are skipped. Ties on `updated_at` are
/// broken by id.
pub async fn query(store: &dyn DocumentStore, filter: &QueryFilter) -> CoreResult<Vec<Document>> {
    let filter = filter.clone().normalized(Utc::now());
    let mut docs: Vec<Document> = store
        .all_docs()
        .await?
        .into_iter()
        .filter_map(|stored| {
            let id = stored.id.clone();
            match Document::from_stored(stored) {
                Ok(doc) => Some(doc),
                Err(err) => {
                    debug!(store = store.name(), %id, error = %err, "skipping undecodable document");
                    None
                }
            }
        })
        .filter(|doc| filter.matches(doc))
        .collect();

    docs.sort_by(|a, b| a.updated_at.cmp(&b.updated_at).then_with(|| a.id.cmp(&b.id)));
    Ok(docs)
}
