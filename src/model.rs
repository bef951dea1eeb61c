//! Data model for sequence ingestion.
//!
//! This module contains the data structures for representing:
//! - Parsed sequence records with their derived length and quality score
//! - Rows handed to the sequence store and the rows it hands back
//!
//! Records are built once by the parsers and never modified afterwards;
//! the derived attributes are computed at construction time so they always
//! agree with the sequence they describe.

use serde::{Deserialize, Serialize};

use crate::quality::calculate_quality_score;

/// A single sequence extracted from an uploaded file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SequenceRecord {
    header: String,
    sequence: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    length: usize,
    quality_score: f64,
}

impl SequenceRecord {
    /// Creates a new record, scoring the sequence.
    ///
    /// The caller is responsible for having stripped whitespace from
    /// `sequence`; the parsers in [`crate::formats`] always do.
    pub fn new(header: impl Into<String>, sequence: impl Into<String>) -> Self {
        let sequence = sequence.into();
        Self {
            header: header.into(),
            length: sequence.chars().count(),
            quality_score: calculate_quality_score(&sequence),
            sequence,
            description: None,
        }
    }

    /// Creates a record carrying a description next to its header.
    pub fn with_description(
        header: impl Into<String>,
        sequence: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            description: Some(description.into()),
            ..Self::new(header, sequence)
        }
    }

    /// The sequence identifier.
    pub fn header(&self) -> &str {
        &self.header
    }

    /// The nucleotide string, without whitespace.
    pub fn sequence(&self) -> &str {
        &self.sequence
    }

    /// Free text following the identifier, when one was recorded.
    ///
    /// The parsers never split it off the header, so records coming from
    /// [`crate::formats`] always return `None`.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Number of characters in the sequence.
    pub fn len(&self) -> usize {
        self.length
    }

    /// Returns true if the sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Composition-based quality score in [0, 100].
    pub fn quality_score(&self) -> f64 {
        self.quality_score
    }

    /// Builds the storage row for this record, attached to an uploaded file.
    pub fn to_row(&self, file_id: &str) -> NewSequenceRow {
        NewSequenceRow {
            file_id: file_id.to_string(),
            sequence_data: self.sequence.clone(),
            quality_score: self.quality_score,
            length: self.length,
            metadata: SequenceMetadata {
                header: self.header.clone(),
                description: self.description.clone(),
            },
        }
    }
}

/// Free-form metadata stored next to each sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceMetadata {
    pub header: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A sequence row ready to be inserted in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSequenceRow {
    /// Identifier of the uploaded file the sequence comes from
    pub file_id: String,
    pub sequence_data: String,
    pub quality_score: f64,
    pub length: usize,
    pub metadata: SequenceMetadata,
}

/// A sequence row as returned by the store after insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSequence {
    /// Store-assigned identifier
    pub id: String,
    /// Analysis this sequence was classified in, once it has been
    #[serde(default)]
    pub analysis_id: Option<String>,
    #[serde(flatten)]
    pub row: NewSequenceRow,
}

impl StoredSequence {
    /// Attaches a store identifier to a freshly inserted row.
    pub fn new(id: impl Into<String>, row: NewSequenceRow) -> Self {
        Self {
            id: id.into(),
            analysis_id: None,
            row,
        }
    }

    /// Returns the length of the stored sequence.
    pub fn len(&self) -> usize {
        self.row.length
    }

    /// Returns true if the stored sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.row.length == 0
    }
}

/// Processing state of a project.
///
/// Projects start as `pending`; an analysis run moves them to `processing`,
/// then to `completed` once its results are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProjectStatus::Pending => write!(f, "pending"),
            ProjectStatus::Processing => write!(f, "processing"),
            ProjectStatus::Completed => write!(f, "completed"),
            ProjectStatus::Failed => write!(f, "failed"),
        }
    }
}
