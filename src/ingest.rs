//! Upload processing pipeline.
//!
//! This module turns an upload request into stored sequence rows:
//! - Parse the raw content with format detection
//! - Score every record and build one storage row per record
//! - Persist the rows through a [`SequenceStore`]
//! - Build the response returned to the caller
//!
//! Any store failure aborts the whole upload; nothing is retried here.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::formats::{detect_format, parse_sequence_file_as, InputFormat};
use crate::model::{NewSequenceRow, StoredSequence};

pub use crate::store::{MemoryStore, SequenceStore, StoreError};

/// Errors that can occur while processing an upload.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Malformed upload request: {0}")]
    MalformedRequest(#[from] serde_json::Error),

    #[error("Failed to save sequences: {0}")]
    Store(#[from] StoreError),
}

/// Result type for ingestion operations.
pub type IngestResult<T> = Result<T, IngestError>;

/// Body of an upload request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    /// Identifier of the uploaded file record
    pub file_id: String,
    /// Raw file content as text
    pub content: String,
    pub project_id: String,
}

impl UploadRequest {
    pub fn new(
        file_id: impl Into<String>,
        content: impl Into<String>,
        project_id: impl Into<String>,
    ) -> Self {
        Self {
            file_id: file_id.into(),
            content: content.into(),
            project_id: project_id.into(),
        }
    }

    /// Parses a JSON request body (`fileId`, `content`, `projectId`).
    pub fn from_json(body: &str) -> IngestResult<Self> {
        Ok(serde_json::from_str(body)?)
    }
}

/// Successful upload response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub sequences_count: usize,
    pub sequences: Vec<StoredSequence>,
}

/// Failure response carrying a single message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn from_error(err: &dyn std::error::Error) -> Self {
        Self {
            error: err.to_string(),
        }
    }
}

/// Processes one upload: parse, score, persist.
///
/// # Examples
///
/// ```
/// use edna_ingest::ingest::{process_upload, MemoryStore, UploadRequest};
///
/// let mut store = MemoryStore::new();
/// let request = UploadRequest::new("file-1", ">s1\nATCG\n>s2\nGGCC", "project-1");
/// let response = process_upload(&request, &mut store).unwrap();
/// assert_eq!(response.sequences_count, 2);
/// assert_eq!(store.len(), 2);
/// ```
pub fn process_upload<S: SequenceStore + ?Sized>(
    request: &UploadRequest,
    store: &mut S,
) -> IngestResult<UploadResponse> {
    process_upload_with_options(request, None, store)
}

/// Processes one upload, optionally forcing the input format.
pub fn process_upload_with_options<S: SequenceStore + ?Sized>(
    request: &UploadRequest,
    forced_format: Option<InputFormat>,
    store: &mut S,
) -> IngestResult<UploadResponse> {
    info!("Processing file: {}", request.file_id);

    let format = forced_format.unwrap_or_else(|| detect_format(&request.content));
    let records = parse_sequence_file_as(&request.content, format);
    info!("Parsed {} sequences ({})", records.len(), format);

    let rows: Vec<NewSequenceRow> = records
        .iter()
        .map(|record| {
            debug!(
                "{}: length {}, quality {:.1}",
                record.header(),
                record.len(),
                record.quality_score()
            );
            record.to_row(&request.file_id)
        })
        .collect();

    let saved = store.insert_sequences(rows)?;
    info!("Successfully saved {} sequences", saved.len());

    Ok(UploadResponse {
        success: true,
        sequences_count: saved.len(),
        sequences: saved,
    })
}
