//! Snapshot command implementation.

use crate::provider::FileSnapshotProvider;
use pulsedb_core::{DocumentFactory, RecorderConfig};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

/// A document as printed by the CLI.
#[derive(Debug, Serialize)]
pub struct PrintedDocument<'a> {
    /// Document id.
    pub id: &'a str,
    /// Revision, once stored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    /// Encoded body.
    pub document: &'a pulsedb_core::Document,
}

impl<'a> PrintedDocument<'a> {
    /// Wraps `doc` for printing.
    pub fn new(doc: &'a pulsedb_core::Document) -> Self {
        Self {
            id: &doc.id,
            rev: doc.rev.as_ref().map(ToString::to_string),
            document: doc,
        }
    }
}

/// Runs the snapshot command.
pub fn run(config: &RecorderConfig, input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let provider = FileSnapshotProvider::open(input)?;
    let factory = DocumentFactory::new(
        config.serial.clone(),
        config.timezone.clone(),
        config.components.clone(),
        Arc::new(provider),
    );

    let doc = factory.status();
    println!("{}", serde_json::to_string_pretty(&PrintedDocument::new(&doc))?);
    Ok(())
}
