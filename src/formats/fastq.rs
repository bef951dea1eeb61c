//! FASTQ parser.
//!
//! ## FASTQ Format
//!
//! ```text
//! @read_identifier
//! ACGTACGTACGT
//! +
//! IIIIIIIIIIII
//! ```
//!
//! Lines are read four at a time. The separator and quality lines are only
//! consumed positionally: they are not checked against the sequence and do
//! not contribute to the quality score, which is computed from the sequence
//! composition like for every other format.

use crate::formats::default_header;
use crate::model::SequenceRecord;

/// Number of lines in a FASTQ record.
const LINES_PER_RECORD: usize = 4;

/// Parses FASTQ content from a string.
///
/// A block is emitted only if both its header line and its sequence line are
/// present and non-empty, which drops a truncated trailing block.
pub fn parse_fastq_str(content: &str) -> Vec<SequenceRecord> {
    let lines: Vec<&str> = content.split('\n').collect();
    let mut sequences = Vec::with_capacity(lines.len() / LINES_PER_RECORD + 1);

    for block in lines.chunks(LINES_PER_RECORD) {
        let (header_line, seq_line) = match block {
            [header, seq, ..] if !header.is_empty() && !seq.is_empty() => (*header, *seq),
            _ => continue,
        };

        // Drop the leading marker, whatever it is
        let mut chars = header_line.chars();
        chars.next();
        let header = chars.as_str().trim();
        let header = if header.is_empty() {
            default_header(sequences.len() + 1)
        } else {
            header.to_string()
        };

        let data: String = seq_line.chars().filter(|c| !c.is_whitespace()).collect();
        sequences.push(SequenceRecord::new(header, data));
    }

    sequences
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_fastq() {
        let content = "@read1\nACGT\n+\nIIII\n@read2\nGGCCAT\n+\nIIIIII\n";
        let records = parse_fastq_str(content);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].header(), "read1");
        assert_eq!(records[0].sequence(), "ACGT");
        assert_eq!(records[1].header(), "read2");
        assert_eq!(records[1].sequence(), "GGCCAT");
        assert_eq!(records[1].len(), 6);
    }

    #[test]
    fn test_record_count_is_blocks_of_four() {
        let mut content = String::new();
        for i in 0..5 {
            content.push_str(&format!("@r{}\nACGTAC\n+\nIIIIII\n", i));
        }
        let records = parse_fastq_str(&content);

        assert_eq!(records.len(), 5);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.header(), format!("r{}", i));
        }
    }

    #[test]
    fn test_header_trimmed() {
        let records = parse_fastq_str("@ read1 extra  \r\nACGT\r\n+\r\nIIII\r\n");
        assert_eq!(records[0].header(), "read1 extra");
        assert_eq!(records[0].sequence(), "ACGT");
    }

    #[test]
    fn test_truncated_trailing_block() {
        // Second block has a header but no sequence line
        let records = parse_fastq_str("@read1\nACGT\n+\nIIII\n@read2");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].header(), "read1");
    }

    #[test]
    fn test_separator_and_quality_not_validated() {
        // Missing '+' and a quality string of the wrong length are accepted
        let records = parse_fastq_str("@read1\nACGTAC\nnot-a-separator\nII\n");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].sequence(), "ACGTAC");
    }

    #[test]
    fn test_quality_line_ignored_for_scoring() {
        let good = parse_fastq_str("@r\nATCGATCGAT\n+\nIIIIIIIIII\n");
        let bad = parse_fastq_str("@r\nATCGATCGAT\n+\n!!!!!!!!!!\n");
        assert_eq!(good[0].quality_score(), 100.0);
        assert_eq!(bad[0].quality_score(), 100.0);
    }

    #[test]
    fn test_empty_sequence_line_skips_block() {
        let records = parse_fastq_str("@read1\n\n+\n\n@read2\nAC\n+\nII\n");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].header(), "read2");
    }

    #[test]
    fn test_blank_header_synthesized() {
        let records = parse_fastq_str("@\nACGT\n+\nIIII\n");
        assert_eq!(records[0].header(), "Sequence_1");
    }

    #[test]
    fn test_inner_whitespace_removed() {
        let records = parse_fastq_str("@read1\nAC\tGT\n+\nIIII\n@read2\nGG CC\r\n+\nIIII\n");
        assert_eq!(records[0].sequence(), "ACGT");
        assert_eq!(records[0].len(), 4);
        assert_eq!(records[1].sequence(), "GGCC");
    }
}
