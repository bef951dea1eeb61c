//! # edna-ingest - eDNA Sequence Ingestion
//!
//! Parsing and scoring of uploaded sequence files for eDNA biodiversity
//! analysis.
//!
//! ## Architecture
//!
//! The crate is split into a pure core and the boundary code around it:
//! - `model`: Sequence records and the rows exchanged with storage
//! - `quality`: Composition-based quality score
//! - `formats`: Format detection and FASTA / FASTQ / plain-line parsing
//! - `store`: Storage traits and the in-memory store
//! - `ingest`: Upload pipeline
//! - `taxonomy`: Classification prompt and validation of the classifier's answer
//! - `analysis`: Classification run with project status tracking
//!
//! Parsing and scoring never fail: any text yields a (possibly empty) list
//! of records.

pub mod analysis;
pub mod formats;
pub mod ingest;
pub mod model;
pub mod quality;
pub mod store;
pub mod taxonomy;

pub use formats::{parse_sequence_file, InputFormat};
pub use model::SequenceRecord;
pub use quality::calculate_quality_score;
