//! Text normalization for identifier generation.
//!
//! Folds accented letters to their base form (canonical decomposition with
//! combining marks dropped), discards anything outside ASCII, and keeps only
//! ASCII letters and digits. Case is preserved; callers lower-case as needed.
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Normalize free text down to `[A-Za-z0-9]*`. Never fails: input with
/// nothing usable yields an empty string.
pub fn normalize(text: &str) -> String {
    let stripped: String = text.nfd().filter(|c| !is_combining_mark(*c)).collect();
    stripped
        .nfc()
        .filter(|c| c.is_ascii())
        .filter(char::is_ascii_alphanumeric)
        .collect()
}
