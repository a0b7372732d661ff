//! Resolution of store URLs to store handles.

use crate::error::{StorageError, StorageResult};
use crate::memory::InMemoryStore;
use crate::store::DocumentStore;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Opens document stores by URL.
///
/// The recorder uses a resolver for its configured local and remote
/// stores and for ad-hoc store URLs passed per call.
pub trait StoreResolver: Send + Sync {
    /// Opens (or returns an already open handle to) the store at `url`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidUrl` if the URL cannot be resolved.
    fn open(&self, url: &str) -> StorageResult<Arc<dyn DocumentStore>>;
}

/// A resolver that backs every URL with a shared [`InMemoryStore`].
///
/// Opening the same URL twice returns the same store, so a URL addresses
/// one logical database for the lifetime of the resolver.
///
/// # Example
///
/// ```rust
/// use pulsedb_storage::{MemoryResolver, StoreResolver};
/// use std::sync::Arc;
///
/// let resolver = MemoryResolver::new();
/// let a = resolver.open("memory://status").unwrap();
/// let b = resolver.open("memory://status/").unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
/// ```
#[derive(Default)]
pub struct MemoryResolver {
    stores: Mutex<HashMap<String, Arc<dyn DocumentStore>>>,
}

impl MemoryResolver {
    /// Creates an empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `url` to an existing store.
    ///
    /// Later calls to [`open`](StoreResolver::open) for `url` return it.
    pub fn register(&self, url: &str, store: Arc<dyn DocumentStore>) -> StorageResult<()> {
        let key = normalize(url)?;
        self.stores.lock().insert(key, store);
        Ok(())
    }

    /// Returns the URLs opened or registered so far.
    #[must_use]
    pub fn urls(&self) -> Vec<String> {
        let mut urls: Vec<_> = self.stores.lock().keys().cloned().collect();
        urls.sort();
        urls
    }
}

impl StoreResolver for MemoryResolver {
    fn open(&self, url: &str) -> StorageResult<Arc<dyn DocumentStore>> {
        let key = normalize(url)?;
        let mut stores = self.stores.lock();
        let store = stores
            .entry(key.clone())
            .or_insert_with(|| Arc::new(InMemoryStore::new(key)) as Arc<dyn DocumentStore>);
        Ok(Arc::clone(store))
    }
}

impl std::fmt::Debug for MemoryResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryResolver")
            .field("urls", &self.urls())
            .finish()
    }
}

fn normalize(url: &str) -> StorageResult<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(StorageError::invalid_url(url, "empty store url"));
    }
    if trimmed.chars().any(char::is_whitespace) {
        return Err(StorageError::invalid_url(url, "store url contains whitespace"));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::StoredDocument;

    #[test]
    fn open_same_url_shares_store() {
        let resolver = MemoryResolver::new();
        let a = resolver.open("memory://a").unwrap();
        let b = resolver.open(" memory://a/ ").unwrap();
        let c = resolver.open("memory://c").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(resolver.urls(), vec!["memory://a", "memory://c"]);
    }

    #[test]
    fn rejects_bad_urls() {
        let resolver = MemoryResolver::new();
        assert!(matches!(
            resolver.open("  "),
            Err(StorageError::InvalidUrl { .. })
        ));
        assert!(matches!(
            resolver.open("memory://a b"),
            Err(StorageError::InvalidUrl { .. })
        ));
    }

    #[tokio::test]
    async fn registered_store_is_returned() {
        let resolver = MemoryResolver::new();
        let store = Arc::new(InMemoryStore::new("custom"));
        store.post(StoredDocument::new("x", b"1".to_vec())).await.unwrap();
        resolver.register("memory://custom", store).unwrap();

        let opened = resolver.open("memory://custom").unwrap();
        assert_eq!(opened.name(), "custom");
        assert!(opened.get("x").await.is_ok());
    }
}
