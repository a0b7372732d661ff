//! Typed documents.

use crate::error::{CoreError, CoreResult};
use crate::snapshot::StatusSnapshot;
use chrono::{DateTime, Utc};
use pulsedb_storage::{Revision, StoredDocument};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Returns the id of the status document for a host boot.
///
/// One status identity exists per boot; every heartbeat during that boot
/// updates it in place.
pub fn status_id(serial: &str, boot_id: &str) -> String {
    format!("status:{serial}:{boot_id}")
}

/// Returns the id of the data document for `uid`.
pub fn data_id(uid: &str) -> String {
    format!("data:{uid}")
}

/// Returns the id of the client registry document for `uid`.
pub fn client_id(uid: &str) -> String {
    format!("client:{uid}")
}

/// A logical document.
///
/// `id` and `rev` travel in the store envelope; everything else is the
/// encoded body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Unique key (`_id`).
    #[serde(skip)]
    pub id: String,
    /// Revision token (`_rev`) last assigned by a store.
    #[serde(skip)]
    pub rev: Option<Revision>,
    /// When the document was last written by this host.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
    /// Serial of the host that wrote the document.
    pub serial: String,
    /// Type-specific payload.
    pub body: DocumentBody,
}

impl Document {
    /// Creates a document without a revision.
    pub fn new(
        id: impl Into<String>,
        serial: impl Into<String>,
        updated_at: DateTime<Utc>,
        body: DocumentBody,
    ) -> Self {
        Self {
            id: id.into(),
            rev: None,
            updated_at,
            serial: serial.into(),
            body,
        }
    }

    /// Returns the document kind.
    pub fn kind(&self) -> DocumentKind {
        self.body.kind()
    }

    /// Returns the uid of data and client documents.
    pub fn uid(&self) -> Option<&str> {
        match &self.body {
            DocumentBody::Status(_) => None,
            DocumentBody::Data(data) => Some(&data.uid),
            DocumentBody::Client(client) => Some(&client.uid),
        }
    }

    /// Encodes the document into a store envelope.
    pub fn to_stored(&self) -> CoreResult<StoredDocument> {
        let body = pulsedb_codec::encode(self)?;
        Ok(StoredDocument {
            id: self.id.clone(),
            rev: self.rev.clone(),
            deleted: false,
            body,
        })
    }

    /// Decodes a document from a store envelope.
    pub fn from_stored(stored: StoredDocument) -> CoreResult<Self> {
        let mut doc: Document = pulsedb_codec::decode(&stored.body)?;
        doc.id = stored.id;
        doc.rev = stored.rev;
        Ok(doc)
    }

    /// Returns the data payload, or `UnexpectedKind`.
    pub fn into_data(self) -> CoreResult<DataRecord> {
        match self.body {
            DocumentBody::Data(data) => Ok(data),
            other => Err(CoreError::UnexpectedKind {
                id: self.id,
                expected: DocumentKind::Data,
                actual: other.kind(),
            }),
        }
    }
}

/// Type-specific document payload.
///
/// Encoded as `{ "type": <kind>, "payload": <record> }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
pub enum DocumentBody {
    /// Host status.
    Status(StatusRecord),
    /// Caller-supplied data.
    Data(DataRecord),
    /// Client registry entry.
    Client(ClientRecord),
}

impl DocumentBody {
    /// Returns the kind tag.
    pub fn kind(&self) -> DocumentKind {
        match self {
            DocumentBody::Status(_) => DocumentKind::Status,
            DocumentBody::Data(_) => DocumentKind::Data,
            DocumentBody::Client(_) => DocumentKind::Client,
        }
    }
}

/// The kind tag of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// Host status.
    Status,
    /// Caller-supplied data.
    Data,
    /// Client registry entry.
    Client,
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DocumentKind::Status => "status",
            DocumentKind::Data => "data",
            DocumentKind::Client => "client",
        })
    }
}

impl FromStr for DocumentKind {
    type Err = CoreError;

    fn from_str(value: &str) -> CoreResult<Self> {
        match value {
            "status" => Ok(DocumentKind::Status),
            "data" => Ok(DocumentKind::Data),
            "client" => Ok(DocumentKind::Client),
            other => Err(CoreError::config(format!("unknown document type {other:?}"))),
        }
    }
}

/// A host component label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    /// Component type.
    #[serde(rename = "type")]
    pub kind: String,
    /// Component id.
    pub uid: String,
}

/// Payload of a status document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    /// Host timezone label.
    pub timezone: String,
    /// Host component labels.
    pub components: Vec<Component>,
    /// The captured snapshot.
    pub snapshot: StatusSnapshot,
}

/// Payload of a data document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataRecord {
    /// Caller-supplied id.
    pub uid: String,
    /// Caller-supplied payload.
    pub payload: serde_json::Value,
}

/// A registered client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRecord {
    /// Client id; unique within the registry.
    pub uid: String,
    /// Optional client type.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl ClientRecord {
    /// Creates a record without a type.
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            kind: None,
        }
    }

    /// Sets the client type.
    #[must_use]
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }
}
