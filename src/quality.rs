//! Composition-based sequence quality scoring.
//!
//! The score combines two partial credits:
//! - up to 50 points for the fraction of recognized bases (`A`, `T`, `C`,
//!   `G`, `U`, `N`, case-insensitive)
//! - 50 points when the GC content lies in [0.4, 0.6], 30 otherwise
//!
//! Characters are counted, not bytes, so a stray multi-byte character in an
//! upload lowers the validity credit by exactly one position.

/// Maximum credit for the fraction of recognized bases.
const VALIDITY_WEIGHT: f64 = 50.0;

/// Credit when GC content is in the typical range.
const GC_BALANCED_SCORE: f64 = 50.0;

/// Credit when GC content is outside the typical range.
const GC_SKEWED_SCORE: f64 = 30.0;

/// Closed interval of GC content rewarded with [`GC_BALANCED_SCORE`].
const GC_BALANCED_RANGE: (f64, f64) = (0.4, 0.6);

/// Upper bound of the quality score.
pub const MAX_QUALITY_SCORE: f64 = 100.0;

fn is_valid_base(c: char) -> bool {
    matches!(c.to_ascii_uppercase(), 'A' | 'T' | 'C' | 'G' | 'U' | 'N')
}

fn is_gc(c: char) -> bool {
    matches!(c.to_ascii_uppercase(), 'G' | 'C')
}

/// Counts characters matching `pred` and returns `(matching, total)`.
fn count_matching(sequence: &str, pred: impl Fn(char) -> bool) -> (usize, usize) {
    sequence.chars().fold((0, 0), |(hits, total), c| {
        (hits + usize::from(pred(c)), total + 1)
    })
}

fn fraction((hits, total): (usize, usize)) -> f64 {
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}

/// Fraction of characters that are G or C (case-insensitive).
///
/// Returns 0.0 for an empty sequence.
///
/// # Example
///
/// ```
/// use edna_ingest::quality::gc_content;
///
/// assert_eq!(gc_content("ATCGATCGAT"), 0.4);
/// ```
pub fn gc_content(sequence: &str) -> f64 {
    fraction(count_matching(sequence, is_gc))
}

/// Fraction of characters that are recognized nucleotide codes.
///
/// Returns 0.0 for an empty sequence.
pub fn valid_base_fraction(sequence: &str) -> f64 {
    fraction(count_matching(sequence, is_valid_base))
}

/// Computes the heuristic quality score of a sequence, in [0, 100].
///
/// An empty sequence scores 0. No character is ever rejected: unknown
/// characters only reduce the validity credit.
///
/// # Examples
///
/// ```
/// use edna_ingest::quality::calculate_quality_score;
///
/// assert_eq!(calculate_quality_score(""), 0.0);
/// assert_eq!(calculate_quality_score("ATCGATCGAT"), 100.0);
/// assert_eq!(calculate_quality_score("XXXXATCG"), 55.0);
/// ```
pub fn calculate_quality_score(sequence: &str) -> f64 {
    if sequence.is_empty() {
        return 0.0;
    }

    let validity_score = valid_base_fraction(sequence) * VALIDITY_WEIGHT;

    let gc = gc_content(sequence);
    let (low, high) = GC_BALANCED_RANGE;
    let gc_score = if (low..=high).contains(&gc) {
        GC_BALANCED_SCORE
    } else {
        GC_SKEWED_SCORE
    };

    // The ceiling is not reachable with the current weights
    (validity_score + gc_score).min(MAX_QUALITY_SCORE)
}
