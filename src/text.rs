use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Punctuation and symbols removed by the first alias filter.
pub const SPECIAL_CHARS: &str = "~`!@#$%^&*()_-+=[{]}\\|:;\"'<,>.?/";

static SPECIALS_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!("[{}]", regex::escape(SPECIAL_CHARS))).unwrap());

static NOT_LETTER_OR_SPACE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-zA-Z\s]").unwrap());

static NOT_LETTER_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-zA-Z]").unwrap());

/// Decomposes `s` (NFD) and drops every combining mark, so "São Paulo" becomes "Sao Paulo".
///
/// Letters without a decomposition (e.g. `Ł`, `ø`) are kept as-is.
pub fn strip_accents(s: &str) -> String {
    s.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

pub fn remove_specials(s: &str) -> String {
    SPECIALS_REGEX.replace_all(s, "").into_owned()
}

pub fn keep_letters_and_spaces(s: &str) -> String {
    NOT_LETTER_OR_SPACE_REGEX.replace_all(s, "").into_owned()
}

pub fn keep_letters(s: &str) -> String {
    NOT_LETTER_REGEX.replace_all(s, "").into_owned()
}
