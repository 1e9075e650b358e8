//! Base identifier construction from a person's names.
//!
//! The base identifier is the first character of the normalized first name
//! followed by the whole normalized last name, lower-cased. It is not length
//! capped here; [`crate::resolver::resolve`] applies the directory limit.
use crate::normalize::normalize;

/// Maximum length of a login identifier accepted by the directory.
pub const MAX_IDENTIFIER_LEN: usize = 20;

/// Length of the identifier core kept when a `-NN` suffix is appended.
pub const SUFFIX_CORE_LEN: usize = MAX_IDENTIFIER_LEN - 3;

/// Latin letters that do not decompose canonically and would otherwise be
/// dropped entirely by [`normalize`].
fn fold_latin(c: char) -> Option<&'static str> {
    let folded = match c {
        'Ł' => "L",
        'ł' => "l",
        'Ø' => "O",
        'ø' => "o",
        'Đ' | 'Ð' => "D",
        'đ' | 'ð' => "d",
        'Ħ' => "H",
        'ħ' => "h",
        'ı' => "i",
        'Ŧ' => "T",
        'ŧ' => "t",
        'ß' => "ss",
        'ẞ' => "SS",
        'Æ' => "AE",
        'æ' => "ae",
        'Œ' => "OE",
        'œ' => "oe",
        'Þ' => "TH",
        'þ' => "th",
        _ => return None,
    };
    Some(folded)
}

fn fold_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        match fold_latin(c) {
            Some(s) => out.push_str(s),
            None => out.push(c),
        }
    }
    normalize(&out)
}

/// Build the uncapped base identifier. An empty result means the names held
/// nothing usable and the record must be rejected before any lookup.
pub fn build_base_identifier(first_name: &str, last_name: &str) -> String {
    let first = fold_name(first_name);
    let last = fold_name(last_name);
    let mut id = String::with_capacity(1 + last.len());
    if let Some(initial) = first.chars().next() {
        id.push(initial);
    }
    id.push_str(&last);
    id.to_ascii_lowercase()
}

/// Prefix of `s` holding at most `max` characters.
pub fn truncate_identifier(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Display name shown in the directory: trimmed first and last name.
pub fn display_name(first_name: &str, last_name: &str) -> String {
    format!("{} {}", first_name.trim(), last_name.trim())
        .trim()
        .to_string()
}
