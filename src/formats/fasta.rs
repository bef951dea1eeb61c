//! FASTA parser.
//!
//! Content is split on every `>`; each non-blank fragment is one record.
//! The first line of a fragment is the header, the remaining lines are
//! concatenated into the sequence with all whitespace removed.
//!
//! ## FASTA Format
//!
//! ```text
//! >sequence_identifier optional description
//! ACGTACGTACGT...
//! >another_sequence
//! TGCATGCATGCA...
//! ```
//!
//! The whole header line is kept as the identifier; the description is not
//! split off.

use crate::formats::default_header;
use crate::model::SequenceRecord;

/// Parses FASTA content from a string.
///
/// A fragment whose header line is blank gets a synthesized
/// `Sequence_<n>` header.
pub fn parse_fasta_str(content: &str) -> Vec<SequenceRecord> {
    let mut sequences = Vec::new();

    for fragment in content.split('>') {
        // Skip the empty piece before the first '>' and blank fragments
        if fragment.trim().is_empty() {
            continue;
        }

        let (header_line, body) = fragment.split_once('\n').unwrap_or((fragment, ""));
        let header = header_line.trim();
        let header = if header.is_empty() {
            default_header(sequences.len() + 1)
        } else {
            header.to_string()
        };

        let data: String = body.chars().filter(|c| !c.is_whitespace()).collect();
        sequences.push(SequenceRecord::new(header, data));
    }

    sequences
}
