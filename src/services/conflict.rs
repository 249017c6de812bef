// SPDX-License-Identifier: MIT

//! Shortcut-key conflict detection.
//!
//! Shortcuts are expanded by matching a user's keystrokes against known
//! triggers. If one shortcut's text is a prefix of another's, the expansion
//! engine cannot unambiguously decide when to fire, so the registry rejects
//! any candidate key that equals, is a prefix of, or is prefixed by an
//! existing key of the same user (case-insensitive, trimmed).
//!
//! Prefix relationships cannot be expressed as a store index, so every write
//! does a full scan of the user's keys. The scan is O(n) but bounded by one
//! user's snippet count.

/// Normalized form used for all shortcut comparisons: trimmed and lowercased.
pub fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

/// Scan `existing` keys for a conflict with `candidate`.
///
/// Returns the first conflicting key, as stored, in the order the store
/// yielded them (insertion order); callers put it in the error message.
/// Keys that normalize to empty are skipped. When updating a snippet the
/// caller must already have excluded the snippet's own key, otherwise it
/// would always conflict with itself.
pub fn find_conflict<'a, I>(candidate: &str, existing: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let candidate = normalize_key(candidate);
    if candidate.is_empty() {
        return None;
    }

    existing.into_iter().find(|key| {
        let key = normalize_key(key);
        if key.is_empty() {
            return false;
        }
        key == candidate || key.starts_with(candidate.as_str()) || candidate.starts_with(&key)
    })
}
