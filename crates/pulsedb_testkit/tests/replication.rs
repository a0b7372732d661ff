//! Replication between recorders and stores.

use pulsedb_core::{
    data_id, upsert, ClientRecord, DocumentFactory, RecorderConfig, StatusSnapshot,
};
use pulsedb_storage::{DocumentStore, InMemoryStore, MemoryResolver, StoredDocument};
use pulsedb_sync::{ReplicationConfig, ReplicationController, ReplicationEvent, ReplicationState};
use pulsedb_testkit::{eventually, Fault, FaultyStore, FixedSnapshotProvider, Operation, TestRecorder};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

const WAIT: Duration = Duration::from_secs(5);

fn live(config: RecorderConfig) -> RecorderConfig {
    config
        .remote("memory://remote")
        .sync(true)
        .poll_interval(Duration::from_millis(50))
}

async fn wait_for(
    events: &mut broadcast::Receiver<ReplicationEvent>,
    pred: impl Fn(&ReplicationEvent) -> bool,
) -> ReplicationEvent {
    tokio::time::timeout(WAIT, async {
        loop {
            match events.recv().await {
                Ok(event) if pred(&event) => return event,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("event channel closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for replication event")
}

async fn exists(store: &Arc<dyn DocumentStore>, id: &str) -> bool {
    store.get(id).await.is_ok()
}

#[tokio::test]
async fn replication_is_gated_by_remote_and_sync() {
    let local_only = TestRecorder::open(RecorderConfig::new("memory://local").sync(true)).await;
    assert!(!local_only.has_remote());
    assert!(local_only.replication_state().is_none());

    let remote_only =
        TestRecorder::open(RecorderConfig::new("memory://local").remote("memory://remote")).await;
    assert!(remote_only.has_remote());
    assert!(remote_only.replication_state().is_none());
    remote_only.save(json!(1), "u1").await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!exists(&remote_only.open_store("memory://remote"), "data:u1").await);

    let syncing = TestRecorder::open(live(RecorderConfig::new("memory://local"))).await;
    assert!(syncing.replication_state().is_some());
    syncing.close().await.unwrap();
}

#[tokio::test]
async fn stores_converge_on_the_winning_revision() {
    let local = Arc::new(InMemoryStore::new("local"));
    let remote = Arc::new(InMemoryStore::new("remote"));

    // Diverged histories: two writes locally, one remotely.
    let rev = local.post(StoredDocument::new("doc", b"l1".to_vec())).await.unwrap();
    local
        .put(StoredDocument::new("doc", b"l2".to_vec()).with_rev(rev))
        .await
        .unwrap();
    remote.post(StoredDocument::new("doc", b"r1".to_vec())).await.unwrap();

    // Same generation on both sides, different content.
    local.post(StoredDocument::new("tie", b"left".to_vec())).await.unwrap();
    remote.post(StoredDocument::new("tie", b"right".to_vec())).await.unwrap();

    let mut controller =
        ReplicationController::start(local.clone(), remote.clone(), ReplicationConfig::one_shot());
    let mut events = controller.take_events().unwrap();
    wait_for(&mut events, |e| matches!(e, ReplicationEvent::Complete(_))).await;
    assert_eq!(controller.state(), ReplicationState::Stopped);

    for id in ["doc", "tie"] {
        let (local_rev, _) = local.revision_of(id).unwrap();
        let (remote_rev, _) = remote.revision_of(id).unwrap();
        assert_eq!(local_rev, remote_rev, "{id} diverged");
        assert_eq!(
            local.get(id).await.unwrap().body,
            remote.get(id).await.unwrap().body
        );
    }
    assert_eq!(local.revision_of("doc").unwrap().0.generation(), 2);
    assert_eq!(&local.get("doc").await.unwrap().body[..], b"l2");
}

#[tokio::test]
async fn recorders_sharing_a_remote_see_each_other() {
    let resolver = Arc::new(MemoryResolver::new());
    let a = TestRecorder::open_with(
        live(RecorderConfig::new("memory://a")).serial("SN-A"),
        Arc::new(FixedSnapshotProvider::for_boot("a")),
        resolver.clone(),
    )
    .await;
    let b = TestRecorder::open_with(
        live(RecorderConfig::new("memory://b")).serial("SN-B"),
        Arc::new(FixedSnapshotProvider::for_boot("b")),
        resolver.clone(),
    )
    .await;

    a.save(json!({ "from": "a" }), "from-a").await.unwrap();
    b.save(json!({ "from": "b" }), "from-b").await.unwrap();

    let store_a = a.open_store("memory://a");
    let store_b = b.open_store("memory://b");
    let (store_a, store_b) = (&store_a, &store_b);
    assert!(
        eventually(WAIT, || async move {
            exists(store_a, "data:from-b").await && exists(store_b, "data:from-a").await
        })
        .await
    );

    let doc = b.get("data:from-a").await.unwrap();
    assert_eq!(doc.serial, "SN-A");
    a.close().await.unwrap();
    b.close().await.unwrap();
}

#[tokio::test]
async fn replicated_clients_join_the_registry() {
    let resolver = Arc::new(MemoryResolver::new());
    let a = TestRecorder::open_with(
        live(RecorderConfig::new("memory://a")).serial("SN-A"),
        Arc::new(FixedSnapshotProvider::for_boot("a")),
        resolver.clone(),
    )
    .await;
    let b = TestRecorder::open_with(
        live(RecorderConfig::new("memory://b")).serial("SN-B"),
        Arc::new(FixedSnapshotProvider::for_boot("b")),
        resolver.clone(),
    )
    .await;

    assert!(a.add_client(ClientRecord::new("r1").with_kind("kiosk")).await.unwrap());
    let b = &b;
    assert!(eventually(WAIT, || async move { b.clients().len() == 1 }).await);
    assert_eq!(b.clients()[0].uid, "r1");
    assert_eq!(b.clients()[0].kind.as_deref(), Some("kiosk"));
    assert!(!b.add_client(ClientRecord::new("r1")).await.unwrap());

    assert!(a.remove_client("r1").await.unwrap());
    assert!(eventually(WAIT, || async move { b.clients().is_empty() }).await);

    a.close().await.unwrap();
    b.close().await.unwrap();
}

#[tokio::test]
async fn deletions_replicate() {
    let fixture = TestRecorder::open(live(RecorderConfig::new("memory://local"))).await;
    let remote = fixture.open_store("memory://remote");

    fixture.save(json!(1), "gone").await.unwrap();
    assert!(eventually(WAIT, || exists(&remote, "data:gone")).await);

    fixture.delete("data:gone").await.unwrap();
    let remote = &remote;
    assert!(
        eventually(WAIT, || async move {
            remote
                .get("data:gone")
                .await
                .is_err_and(|err| err.is_not_found())
        })
        .await
    );
    fixture.close().await.unwrap();
}

#[tokio::test]
async fn denied_document_does_not_stop_sync() {
    let resolver = Arc::new(MemoryResolver::new());
    let remote = Arc::new(FaultyStore::new(Arc::new(InMemoryStore::new("remote"))));
    remote.deny(&data_id("secret"), "restricted");
    resolver.register("memory://remote", remote.clone()).unwrap();

    let fixture = TestRecorder::open_with(
        live(RecorderConfig::new("memory://local")),
        Arc::new(FixedSnapshotProvider::for_boot("b")),
        resolver,
    )
    .await;
    let mut events = fixture.replication_events().unwrap();

    fixture.save(json!("hidden"), "secret").await.unwrap();
    let denied = wait_for(&mut events, |e| matches!(e, ReplicationEvent::Denied { .. })).await;
    let ReplicationEvent::Denied { id, reason, .. } = denied else {
        unreachable!()
    };
    assert_eq!(id, "data:secret");
    assert_eq!(reason, "restricted");

    fixture.save(json!("visible"), "public").await.unwrap();
    let inner = Arc::clone(remote.inner());
    assert!(eventually(WAIT, || exists(&inner, "data:public")).await);
    assert!(!exists(&inner, "data:secret").await);

    assert_ne!(fixture.replication_state(), Some(ReplicationState::Error));
    assert!(fixture.replication_stats().unwrap().docs_denied >= 1);
    fixture.close().await.unwrap();
}

#[tokio::test]
async fn outage_pauses_and_recovers() {
    let resolver = Arc::new(MemoryResolver::new());
    let remote = Arc::new(FaultyStore::new(Arc::new(InMemoryStore::new("remote"))));
    remote
        .fail_always(Operation::WriteReplicated, Fault::Unavailable)
        .fail_always(Operation::Changes, Fault::Unavailable);
    resolver.register("memory://remote", remote.clone()).unwrap();

    let fixture = TestRecorder::open_with(
        live(RecorderConfig::new("memory://local")),
        Arc::new(FixedSnapshotProvider::for_boot("b")),
        resolver,
    )
    .await;
    let mut events = fixture.replication_events().unwrap();

    fixture.save(json!(1), "u1").await.unwrap();
    wait_for(&mut events, |e| {
        matches!(e, ReplicationEvent::Paused { error: Some(_) })
    })
    .await;

    let inner = Arc::clone(remote.inner());
    assert!(!exists(&inner, "data:u1").await);
    remote.heal();
    assert!(eventually(WAIT, || exists(&inner, "data:u1")).await);
    assert!(fixture.replication_stats().unwrap().retries >= 1);

    fixture.close().await.unwrap();
    wait_for(&mut events, |e| matches!(e, ReplicationEvent::Complete(_))).await;
}

#[tokio::test]
async fn status_documents_replicate() {
    let fixture = TestRecorder::open(live(RecorderConfig::new("memory://local"))).await;
    let remote = fixture.open_store("memory://remote");
    let factory = DocumentFactory::new(
        "SN-TEST",
        "UTC",
        Vec::new(),
        Arc::new(StatusSnapshot::default),
    );

    fixture
        .save_status(pulsedb_core::StoreSelector::Local)
        .await
        .unwrap();
    assert!(eventually(WAIT, || exists(&remote, "status:SN-TEST:boot-test")).await);

    // A write made directly on the remote flows back.
    upsert(remote.as_ref(), &factory.data(json!("from remote"), "r1"))
        .await
        .unwrap();
    let local = fixture.open_store("memory://local");
    assert!(eventually(WAIT, || exists(&local, "data:r1")).await);
    fixture.close().await.unwrap();
}
