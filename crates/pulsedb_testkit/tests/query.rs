//! Queries through the recorder.

use chrono::{Duration as ChronoDuration, Utc};
use pulsedb_core::{DocumentKind, QueryFilter, RecorderConfig, StoreSelector};
use pulsedb_testkit::TestRecorder;
use serde_json::json;

#[tokio::test]
async fn open_ended_range_ends_now() {
    let fixture = TestRecorder::open(RecorderConfig::new("memory://local")).await;
    let before = Utc::now() - ChronoDuration::seconds(1);

    fixture.save(json!(1), "a").await.unwrap();
    fixture.save(json!(2), "b").await.unwrap();

    let docs = fixture.query(&QueryFilter::new().from(before)).await.unwrap();
    assert_eq!(docs.len(), 2);

    let future = Utc::now() + ChronoDuration::hours(1);
    let none = fixture.query(&QueryFilter::new().from(future)).await.unwrap();
    assert!(none.is_empty());

    let past = fixture
        .query(&QueryFilter::new().to(before))
        .await
        .unwrap();
    assert!(past.is_empty());
}

#[tokio::test]
async fn filters_by_kind_and_uid() {
    let fixture = TestRecorder::open(RecorderConfig::new("memory://local")).await;
    fixture.save(json!(1), "a").await.unwrap();
    fixture.save(json!(2), "b").await.unwrap();
    fixture.save_status(StoreSelector::Local).await.unwrap();

    let status = fixture
        .query(&QueryFilter::new().kind(DocumentKind::Status))
        .await
        .unwrap();
    assert_eq!(status.len(), 1);
    assert_eq!(status[0].id, "status:SN-TEST:boot-test");

    let b = fixture.query(&QueryFilter::new().uid("b")).await.unwrap();
    assert_eq!(b.len(), 1);
    assert_eq!(b[0].clone().into_data().unwrap().payload, json!(2));

    let other_host = fixture
        .query(&QueryFilter::new().serial("SN-OTHER"))
        .await
        .unwrap();
    assert!(other_host.is_empty());

    let all = fixture.query(&QueryFilter::new()).await.unwrap();
    assert_eq!(all.len(), 3);
    assert!(all.windows(2).all(|w| w[0].updated_at <= w[1].updated_at));
}

#[tokio::test]
async fn deleted_documents_are_not_returned() {
    let fixture = TestRecorder::open(RecorderConfig::new("memory://local")).await;
    fixture.save(json!(1), "a").await.unwrap();
    fixture.delete("data:a").await.unwrap();
    assert!(fixture.query(&QueryFilter::new()).await.unwrap().is_empty());
}
