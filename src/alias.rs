//! Search alias derivation.
//!
//! Every source name is expanded into up to three "corroded" spellings (punctuation
//! removed, non-letters removed, whitespace removed) for both the original and the
//! accent-stripped form. The result is deduplicated case-insensitively while keeping
//! the first-seen spelling.

use crate::text::{keep_letters, keep_letters_and_spaces, remove_specials, strip_accents};
use rustc_hash::FxHashSet;

/// Filters applied to every name, in order.
const FILTERS: [fn(&str) -> String; 3] = [remove_specials, keep_letters_and_spaces, keep_letters];

/// Derives the ordered, case-insensitively unique alias list for a set of names.
///
/// Accent-stripped copies of all names are appended after the originals before
/// filtering. Every returned alias is non-empty and contains a non-whitespace char.
pub fn derive_aliases<S: AsRef<str>>(names: &[S]) -> Vec<String> {
    let expanded = names
        .iter()
        .map(|n| n.as_ref().to_string())
        .chain(names.iter().map(|n| strip_accents(n.as_ref())));

    let mut seen = FxHashSet::default();
    let mut aliases = Vec::new();

    for name in expanded {
        let name = name.trim();
        for filter in FILTERS {
            let candidate = filter(name);
            if candidate.trim().is_empty() {
                continue;
            }
            if seen.insert(candidate.to_lowercase()) {
                aliases.push(candidate);
            }
        }
    }

    aliases
}

/// Number of whitespace-separated tokens in a name.
pub fn name_token_count(name: &str) -> usize {
    name.split_whitespace().count()
}
