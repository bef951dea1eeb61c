//! Multi-format sequence file parser.
//!
//! Supports automatic format detection for:
//! - FASTA (content starts with `>`)
//! - FASTQ (content starts with `@`)
//! - Plain text, one sequence per line (anything else)
//!
//! Detection looks at the first character of the content only, with the
//! priority FASTA, then FASTQ, then plain lines. Leading blank lines are not
//! skipped: a FASTA body preceded by an empty line is read as plain lines.
//!
//! Parsing never fails. Unknown characters are kept in the sequence and only
//! lower its quality score; empty input yields no records.

pub mod fasta;
pub mod fastq;
pub mod plain;

use std::fs;
use std::path::Path;

use log::debug;
use thiserror::Error;

use crate::model::SequenceRecord;

/// Detected input format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Fasta,
    Fastq,
    Plain,
}

impl std::fmt::Display for InputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputFormat::Fasta => write!(f, "FASTA"),
            InputFormat::Fastq => write!(f, "FASTQ"),
            InputFormat::Plain => write!(f, "plain text"),
        }
    }
}

/// Errors that can occur while reading a sequence file from disk.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("File '{0}' is not valid UTF-8 text")]
    NotText(String),
}

/// Result type for file parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Synthesized header for the `index`-th (1-based) record of a file.
pub(crate) fn default_header(index: usize) -> String {
    format!("Sequence_{}", index)
}

/// Detects the format by examining the first character of the content.
pub fn detect_format(content: &str) -> InputFormat {
    if content.starts_with('>') {
        InputFormat::Fasta
    } else if content.starts_with('@') {
        InputFormat::Fastq
    } else {
        InputFormat::Plain
    }
}

/// Parses uploaded content, detecting its format.
///
/// # Examples
///
/// ```
/// use edna_ingest::formats::parse_sequence_file;
///
/// let records = parse_sequence_file(">s1\nATCG\n>s2\nGGCC");
/// assert_eq!(records.len(), 2);
/// assert_eq!(records[1].header(), "s2");
/// // GC content of GGCC is 1.0, outside [0.4, 0.6]
/// assert_eq!(records[1].quality_score(), 80.0);
/// ```
pub fn parse_sequence_file(content: &str) -> Vec<SequenceRecord> {
    parse_sequence_file_as(content, detect_format(content))
}

/// Parses content with a specific format, bypassing detection.
pub fn parse_sequence_file_as(content: &str, format: InputFormat) -> Vec<SequenceRecord> {
    match format {
        InputFormat::Fasta => fasta::parse_fasta_str(content),
        InputFormat::Fastq => fastq::parse_fastq_str(content),
        InputFormat::Plain => plain::parse_plain_str(content),
    }
}

/// Reads a whole file as UTF-8 text.
pub fn read_text<P: AsRef<Path>>(path: P) -> ParseResult<String> {
    let path = path.as_ref();
    let bytes = fs::read(path)?;
    String::from_utf8(bytes).map_err(|_| ParseError::NotText(path.display().to_string()))
}

/// Reads a sequence file and parses it with optional format specification.
///
/// Returns the records together with the format that was used.
pub fn parse_file_with_options<P: AsRef<Path>>(
    path: P,
    forced_format: Option<InputFormat>,
) -> ParseResult<(Vec<SequenceRecord>, InputFormat)> {
    let path = path.as_ref();
    let content = read_text(path)?;

    let format = forced_format.unwrap_or_else(|| detect_format(&content));
    debug!("Reading {} as {}", path.display(), format);

    let records = parse_sequence_file_as(&content, format);
    Ok((records, format))
}

/// Reads a sequence file, detecting the format from its content.
/// Convenience wrapper around parse_file_with_options.
pub fn parse_file<P: AsRef<Path>>(path: P) -> ParseResult<Vec<SequenceRecord>> {
    parse_file_with_options(path, None).map(|(records, _)| records)
}
