//! Fuzzy name suggestions for "Did you mean ...?" diagnostics.
//!
//! Used whenever a reference resolves against a known name set: service
//! names in the `services:` block, step names in `go to`, field names on a
//! record. The lexer and parser never need this; it is purely a semantic
//! analysis concern.

use strsim::levenshtein;

/// Find the closest match to `name` among `candidates`, if any is close
/// enough to be worth suggesting.
///
/// The threshold scales with the name's length (`max(2, name.len() / 2)`)
/// so a short misspelled name doesn't match something unrelated just
/// because the candidate pool is large, while longer names (e.g. a whole
/// misremembered service name) still get a suggestion across a handful of
/// substituted words.
///
/// # Examples
///
/// ```
/// use flow_util::suggest::suggest;
///
/// let candidates = ["slack", "email", "sms"];
/// assert_eq!(suggest("slak", &candidates), Some("slack"));
/// assert_eq!(suggest("totally_unrelated_name", &candidates), None);
/// ```
pub fn suggest<'a>(name: &str, candidates: &[&'a str]) -> Option<&'a str> {
    let threshold = (name.len() / 2).max(2);

    candidates
        .iter()
        .map(|candidate| (*candidate, levenshtein(name, candidate)))
        .filter(|(_, distance)| *distance <= threshold)
        .min_by_key(|(_, distance)| *distance)
        .map(|(candidate, _)| candidate)
}
