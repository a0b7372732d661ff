//! Document construction.

use crate::document::{
    client_id, data_id, status_id, ClientRecord, Component, DataRecord, Document, DocumentBody,
    StatusRecord,
};
use crate::snapshot::SnapshotProvider;
use chrono::Utc;
use std::fmt;
use std::sync::Arc;

/// Builds documents stamped with this host's identity.
#[derive(Clone)]
pub struct DocumentFactory {
    components: Vec<Component>,
    serial: String,
    timezone: String,
    provider: Arc<dyn SnapshotProvider>,
}

impl DocumentFactory {
    /// Creates a factory.
    pub fn new(
        serial: impl Into<String>,
        timezone: impl Into<String>,
        components: Vec<Component>,
        provider: Arc<dyn SnapshotProvider>,
    ) -> Self {
        Self {
            components,
            serial: serial.into(),
            timezone: timezone.into(),
            provider,
        }
    }

    /// Returns the host serial.
    pub fn serial(&self) -> &str {
        &self.serial
    }

    /// Captures a snapshot and wraps it in a status document.
    ///
    /// The id is derived from the serial and the snapshot's boot id.
    pub fn status(&self) -> Document {
        let snapshot = self.provider.capture_status();
        let id = status_id(&self.serial, &snapshot.boot_id);
        Document::new(
            id,
            self.serial.clone(),
            Utc::now(),
            DocumentBody::Status(StatusRecord {
                timezone: self.timezone.clone(),
                components: self.components.clone(),
                snapshot,
            }),
        )
    }

    /// Builds a data document for `uid`.
    pub fn data(&self, payload: serde_json::Value, uid: &str) -> Document {
        Document::new(
            data_id(uid),
            self.serial.clone(),
            Utc::now(),
            DocumentBody::Data(DataRecord {
                uid: uid.to_string(),
                payload,
            }),
        )
    }

    /// Builds an empty data document for `uid`.
    pub fn blank(&self, uid: &str) -> Document {
        self.data(serde_json::Value::Object(serde_json::Map::new()), uid)
    }

    /// Builds a client registry document.
    pub fn client(&self, record: ClientRecord) -> Document {
        Document::new(
            client_id(&record.uid),
            self.serial.clone(),
            Utc::now(),
            DocumentBody::Client(record),
        )
    }
}

impl fmt::Debug for DocumentFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentFactory")
            .field("serial", &self.serial)
            .field("timezone", &self.timezone)
            .field("components", &self.components)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentKind;
    use crate::snapshot::StatusSnapshot;

    fn factory() -> DocumentFactory {
        let provider = || StatusSnapshot {
            boot_id: "boot-1".into(),
            ..StatusSnapshot::default()
        };
        DocumentFactory::new(
            "SN1",
            "Europe/Berlin",
            vec![Component {
                kind: "camera".into(),
                uid: "cam-0".into(),
            }],
            Arc::new(provider),
        )
    }

    #[test]
    fn status_documents_are_per_boot() {
        let doc = factory().status();
        assert_eq!(doc.id, "status:SN1:boot-1");
        assert_eq!(doc.kind(), DocumentKind::Status);
        assert!(doc.rev.is_none());
        match doc.body {
            DocumentBody::Status(status) => {
                assert_eq!(status.timezone, "Europe/Berlin");
                assert_eq!(status.components.len(), 1);
                assert_eq!(status.snapshot.boot_id, "boot-1");
            }
            other => panic!("unexpected body {other:?}"),
        }
    }

    #[test]
    fn blank_is_an_empty_object() {
        let doc = factory().blank("u9");
        assert_eq!(doc.id, "data:u9");
        assert_eq!(doc.serial, "SN1");
        assert_eq!(doc.into_data().unwrap().payload, serde_json::json!({}));
    }

    #[test]
    fn client_document_id() {
        let doc = factory().client(ClientRecord::new("c1"));
        assert_eq!(doc.id, "client:c1");
        assert_eq!(doc.uid(), Some("c1"));
    }
}
