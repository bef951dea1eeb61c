//! Plain-text fallback: one sequence per non-blank line.
//!
//! Headers are synthesized as `Sequence_1`, `Sequence_2`, ... in the order
//! of the retained lines.

use crate::formats::default_header;
use crate::model::SequenceRecord;

/// Parses plain-line content from a string.
pub fn parse_plain_str(content: &str) -> Vec<SequenceRecord> {
    content
        .split('\n')
        .filter(|line| !line.trim().is_empty())
        .enumerate()
        .map(|(idx, line)| {
            let data: String = line.chars().filter(|c| !c.is_whitespace()).collect();
            SequenceRecord::new(default_header(idx + 1), data)
        })
        .collect()
}
