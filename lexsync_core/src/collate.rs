//! Locale-aware string comparison for registry ordering.
//!
//! Registry entries are sorted so accented forms collate next to their
//! base forms instead of after 'z' the way raw byte order would place
//! them. Comparison happens at primary strength (accent- and
//! case-insensitive) with a byte-wise tiebreak so the order is total
//! and stable across runs.

use std::cmp::Ordering;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Primary-strength collation key: NFD-decompose, strip combining
/// marks, lowercase.
pub fn collation_key(s: &str) -> String {
    s.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Compare two strings under the primary-strength key, falling back to
/// byte order so equal keys still order deterministically.
pub fn compare(a: &str, b: &str) -> Ordering {
    collation_key(a)
        .cmp(&collation_key(b))
        .then_with(|| a.cmp(b))
}
