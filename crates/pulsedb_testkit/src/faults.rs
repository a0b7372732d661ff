//! Store wrappers for counting calls and injecting faults.

use async_trait::async_trait;
use parking_lot::Mutex;
use pulsedb_storage::{
    ChangeBatch, DocumentStore, ReplicatedWrite, Revision, StorageError, StorageResult,
    StoredDocument,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;

/// A [`DocumentStore`] operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `get`
    Get,
    /// `put`
    Put,
    /// `post`
    Post,
    /// `remove`
    Remove,
    /// `all_docs`
    AllDocs,
    /// `changes`
    Changes,
    /// `write_replicated`
    WriteReplicated,
}

/// Per-operation call counters.
#[derive(Debug, Default)]
pub struct CallLog {
    calls: Mutex<HashMap<Operation, u64>>,
}

impl CallLog {
    /// Records a call and returns its 1-based number for `op`.
    pub fn record(&self, op: Operation) -> u64 {
        let mut calls = self.calls.lock();
        let count = calls.entry(op).or_insert(0);
        *count += 1;
        *count
    }

    /// Returns how often `op` was called.
    pub fn count(&self, op: Operation) -> u64 {
        self.calls.lock().get(&op).copied().unwrap_or(0)
    }

    /// Returns the number of write calls (`put`, `post`, `remove`).
    pub fn writes(&self) -> u64 {
        self.count(Operation::Put) + self.count(Operation::Post) + self.count(Operation::Remove)
    }

    /// Resets every counter.
    pub fn reset(&self) {
        self.calls.lock().clear();
    }
}

/// Wraps a store and counts calls per operation.
pub struct CountingStore {
    inner: Arc<dyn DocumentStore>,
    log: CallLog,
}

impl CountingStore {
    /// Wraps `inner`.
    pub fn new(inner: Arc<dyn DocumentStore>) -> Self {
        Self {
            inner,
            log: CallLog::default(),
        }
    }

    /// Returns the call counters.
    pub fn calls(&self) -> &CallLog {
        &self.log
    }
}

#[async_trait]
impl DocumentStore for CountingStore {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn get(&self, id: &str) -> StorageResult<StoredDocument> {
        self.log.record(Operation::Get);
        self.inner.get(id).await
    }

    async fn put(&self, doc: StoredDocument) -> StorageResult<Revision> {
        self.log.record(Operation::Put);
        self.inner.put(doc).await
    }

    async fn post(&self, doc: StoredDocument) -> StorageResult<Revision> {
        self.log.record(Operation::Post);
        self.inner.post(doc).await
    }

    async fn remove(&self, doc: &StoredDocument) -> StorageResult<Revision> {
        self.log.record(Operation::Remove);
        self.inner.remove(doc).await
    }

    async fn all_docs(&self) -> StorageResult<Vec<StoredDocument>> {
        self.log.record(Operation::AllDocs);
        self.inner.all_docs().await
    }

    async fn changes(&self, since: u64, limit: usize) -> StorageResult<ChangeBatch> {
        self.log.record(Operation::Changes);
        self.inner.changes(since, limit).await
    }

    async fn write_replicated(&self, doc: StoredDocument) -> StorageResult<ReplicatedWrite> {
        self.log.record(Operation::WriteReplicated);
        self.inner.write_replicated(doc).await
    }

    fn watch_updates(&self) -> Option<watch::Receiver<u64>> {
        self.inner.watch_updates()
    }
}

/// An injected failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// The store is unreachable (retryable).
    Unavailable,
    /// The revision check failed.
    Conflict,
    /// The store refuses the document.
    Forbidden(String),
    /// The document disappeared.
    NotFound,
}

impl Fault {
    fn into_error(self, id: &str) -> StorageError {
        match self {
            Fault::Unavailable => StorageError::unavailable("injected outage"),
            Fault::Conflict => StorageError::conflict(id),
            Fault::Forbidden(reason) => StorageError::forbidden(id, reason),
            Fault::NotFound => StorageError::not_found(id),
        }
    }
}

/// When a rule fires.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Trigger {
    /// On the n-th call (1-based).
    Call(u64),
    /// On every call.
    Always,
    /// On every call touching this id.
    Id(String),
}

#[derive(Debug, Clone)]
struct Rule {
    op: Operation,
    trigger: Trigger,
    fault: Fault,
}

/// Wraps a store and fails chosen calls.
///
/// Calls that no rule matches go to the inner store. Failed calls never
/// reach it.
pub struct FaultyStore {
    inner: Arc<dyn DocumentStore>,
    rules: Mutex<Vec<Rule>>,
    log: CallLog,
}

impl FaultyStore {
    /// Wraps `inner` without any rules.
    pub fn new(inner: Arc<dyn DocumentStore>) -> Self {
        Self {
            inner,
            rules: Mutex::new(Vec::new()),
            log: CallLog::default(),
        }
    }

    /// Fails the `call`-th invocation (1-based) of `op`.
    pub fn fail_on(&self, op: Operation, call: u64, fault: Fault) -> &Self {
        self.push(op, Trigger::Call(call), fault)
    }

    /// Fails every invocation of `op`.
    pub fn fail_always(&self, op: Operation, fault: Fault) -> &Self {
        self.push(op, Trigger::Always, fault)
    }

    /// Refuses replicated writes of `id`.
    pub fn deny(&self, id: &str, reason: &str) -> &Self {
        self.push(
            Operation::WriteReplicated,
            Trigger::Id(id.to_string()),
            Fault::Forbidden(reason.to_string()),
        )
    }

    /// Removes every rule.
    pub fn heal(&self) {
        self.rules.lock().clear();
    }

    /// Returns the call counters, failed calls included.
    pub fn calls(&self) -> &CallLog {
        &self.log
    }

    /// Returns the wrapped store.
    pub fn inner(&self) -> &Arc<dyn DocumentStore> {
        &self.inner
    }

    fn push(&self, op: Operation, trigger: Trigger, fault: Fault) -> &Self {
        self.rules.lock().push(Rule { op, trigger, fault });
        self
    }

    fn check(&self, op: Operation, id: &str) -> StorageResult<()> {
        let call = self.log.record(op);
        let rules = self.rules.lock();
        let hit = rules.iter().find(|rule| {
            rule.op == op
                && match &rule.trigger {
                    Trigger::Call(n) => *n == call,
                    Trigger::Always => true,
                    Trigger::Id(target) => target == id,
                }
        });
        match hit {
            Some(rule) => Err(rule.fault.clone().into_error(id)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DocumentStore for FaultyStore {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn get(&self, id: &str) -> StorageResult<StoredDocument> {
        self.check(Operation::Get, id)?;
        self.inner.get(id).await
    }

    async fn put(&self, doc: StoredDocument) -> StorageResult<Revision> {
        self.check(Operation::Put, &doc.id)?;
        self.inner.put(doc).await
    }

    async fn post(&self, doc: StoredDocument) -> StorageResult<Revision> {
        self.check(Operation::Post, &doc.id)?;
        self.inner.post(doc).await
    }

    async fn remove(&self, doc: &StoredDocument) -> StorageResult<Revision> {
        self.check(Operation::Remove, &doc.id)?;
        self.inner.remove(doc).await
    }

    async fn all_docs(&self) -> StorageResult<Vec<StoredDocument>> {
        self.check(Operation::AllDocs, "")?;
        self.inner.all_docs().await
    }

    async fn changes(&self, since: u64, limit: usize) -> StorageResult<ChangeBatch> {
        self.check(Operation::Changes, "")?;
        self.inner.changes(since, limit).await
    }

    async fn write_replicated(&self, doc: StoredDocument) -> StorageResult<ReplicatedWrite> {
        self.check(Operation::WriteReplicated, &doc.id)?;
        self.inner.write_replicated(doc).await
    }

    fn watch_updates(&self) -> Option<watch::Receiver<u64>> {
        self.inner.watch_updates()
    }
}
