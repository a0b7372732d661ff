//! Client registry through the recorder.

use pulsedb_core::{ClientRecord, Document, DocumentKind, RecorderConfig};
use pulsedb_storage::{InMemoryStore, MemoryResolver};
use pulsedb_testkit::{Fault, FaultyStore, FixedSnapshotProvider, Operation, TestRecorder};
use std::sync::Arc;

#[tokio::test]
async fn add_and_remove_are_idempotent() {
    let fixture = TestRecorder::open(RecorderConfig::new("memory://local")).await;

    assert!(fixture
        .add_client(ClientRecord::new("c1").with_kind("display"))
        .await
        .unwrap());
    assert!(!fixture.add_client(ClientRecord::new("c1")).await.unwrap());
    assert_eq!(fixture.clients().len(), 1);

    let stored = fixture.get("client:c1").await.unwrap();
    assert_eq!(stored.kind(), DocumentKind::Client);
    assert_eq!(stored.serial, "SN-TEST");

    assert!(fixture.remove_client("c1").await.unwrap());
    assert!(!fixture.remove_client("c1").await.unwrap());
    assert!(fixture.clients().is_empty());
    assert!(fixture.get("client:c1").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn concurrent_adds_keep_uids_unique() {
    let fixture = Arc::new(TestRecorder::open(RecorderConfig::new("memory://local")).await);

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let fixture = Arc::clone(&fixture);
            tokio::spawn(async move {
                let uid = format!("c{}", i % 4);
                fixture.add_client(ClientRecord::new(uid)).await.unwrap()
            })
        })
        .collect();

    let mut inserted = 0;
    for task in tasks {
        if task.await.unwrap() {
            inserted += 1;
        }
    }
    assert_eq!(inserted, 4);

    let uids: Vec<_> = fixture.clients().into_iter().map(|c| c.uid).collect();
    assert_eq!(uids, ["c0", "c1", "c2", "c3"]);
    for uid in uids {
        let doc = fixture.get(&format!("client:{uid}")).await.unwrap();
        assert_eq!(doc.rev.unwrap().generation(), 1);
    }
}

#[tokio::test]
async fn failed_persist_leaves_registry_unchanged() {
    let resolver = Arc::new(MemoryResolver::new());
    let local = Arc::new(FaultyStore::new(Arc::new(InMemoryStore::new("local"))));
    local.fail_on(Operation::Post, 1, Fault::Unavailable);
    resolver.register("memory://local", local.clone()).unwrap();

    let fixture = TestRecorder::open_with(
        RecorderConfig::new("memory://local"),
        Arc::new(FixedSnapshotProvider::for_boot("b")),
        resolver,
    )
    .await;

    assert!(fixture.add_client(ClientRecord::new("c1")).await.is_err());
    assert!(fixture.clients().is_empty());

    assert!(fixture.add_client(ClientRecord::new("c1")).await.unwrap());
    let doc = Document::from_stored(local.inner().get("client:c1").await.unwrap()).unwrap();
    assert_eq!(doc.uid(), Some("c1"));
}

#[tokio::test]
async fn registry_is_restored_on_open() {
    let resolver = Arc::new(MemoryResolver::new());
    let provider = Arc::new(FixedSnapshotProvider::for_boot("b"));

    let first = TestRecorder::open_with(
        RecorderConfig::new("memory://local"),
        provider.clone(),
        resolver.clone(),
    )
    .await;
    first.add_client(ClientRecord::new("kept")).await.unwrap();
    first.add_client(ClientRecord::new("dropped")).await.unwrap();
    first.remove_client("dropped").await.unwrap();
    first.close().await.unwrap();

    let second = TestRecorder::open_with(RecorderConfig::new("memory://local"), provider, resolver)
        .await;
    assert_eq!(second.clients(), vec![ClientRecord::new("kept")]);
    assert!(!second.add_client(ClientRecord::new("kept")).await.unwrap());
}
