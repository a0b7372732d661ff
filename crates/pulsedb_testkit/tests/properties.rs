//! Property tests over generated operation sequences.

use proptest::prelude::*;
use pulsedb_core::{QueryFilter, Recorder, RecorderConfig};
use pulsedb_storage::{MemoryResolver, StoreResolver};
use pulsedb_testkit::{
    client_record_strategy, concurrent_saves, payload_strategy, recorder_ops_strategy,
    FixedSnapshotProvider, RecorderOp, StressConfig, TestRecorder,
};
use std::collections::HashMap;
use std::sync::Arc;

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build runtime")
        .block_on(future)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn store_matches_model(ops in recorder_ops_strategy(24)) {
        block_on(async {
            let fixture = TestRecorder::open(RecorderConfig::new("memory://local")).await;
            let mut model: HashMap<String, serde_json::Value> = HashMap::new();

            for op in ops {
                match op {
                    RecorderOp::Save(uid, payload) => {
                        fixture.save(payload.clone(), &uid).await.unwrap();
                        model.insert(uid, payload);
                    }
                    RecorderOp::Delete(uid) => {
                        fixture.delete(&format!("data:{uid}")).await.unwrap();
                        model.remove(&uid);
                    }
                }
            }

            let docs = fixture.query(&QueryFilter::new()).await.unwrap();
            assert_eq!(docs.len(), model.len());
            for doc in docs {
                let data = doc.into_data().unwrap();
                assert_eq!(Some(&data.payload), model.get(&data.uid));
            }
        });
    }

    #[test]
    fn every_write_advances_generation(payloads in prop::collection::vec(payload_strategy(), 1..10)) {
        block_on(async {
            let fixture = TestRecorder::open(RecorderConfig::new("memory://local")).await;
            let mut last = None;
            for payload in &payloads {
                let rev = fixture.save(payload.clone(), "u").await.unwrap();
                if let Some(prev) = &last {
                    assert!(&rev > prev);
                }
                last = Some(rev);
            }
            assert_eq!(last.unwrap().generation(), payloads.len() as u64);
        });
    }

    #[test]
    fn repeated_adds_register_once(records in prop::collection::vec(client_record_strategy(), 1..12)) {
        block_on(async {
            let fixture = TestRecorder::open(RecorderConfig::new("memory://local")).await;
            let mut unique = std::collections::BTreeSet::new();
            for record in records {
                let uid = record.uid.clone();
                let inserted = fixture.add_client(record).await.unwrap();
                assert_eq!(inserted, unique.insert(uid));
            }
            let uids: Vec<_> = fixture.clients().into_iter().map(|c| c.uid).collect();
            assert_eq!(uids, unique.into_iter().collect::<Vec<_>>());
        });
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_saves_never_conflict() {
    let resolver = Arc::new(MemoryResolver::new());
    let recorder = Recorder::open(
        RecorderConfig::new("memory://local").serial("SN-STRESS"),
        Arc::new(FixedSnapshotProvider::for_boot("b")),
        resolver.clone(),
    )
    .await
    .unwrap();
    let recorder = Arc::new(recorder);

    let config = StressConfig::default();
    let result = concurrent_saves(Arc::clone(&recorder), &config).await;
    assert_eq!(result.failed_ops, 0);
    assert_eq!(result.total_ops, config.writers * config.saves_per_writer);

    let store = resolver.open("memory://local").unwrap();
    let mut total = 0;
    for i in 0..config.uids {
        let doc = store.get(&format!("data:stress-{i}")).await.unwrap();
        total += doc.rev.unwrap().generation();
    }
    assert_eq!(total, result.total_ops as u64);
}
