//! Storage key generation
//!
//! Uploaded names are reduced to an allow-list of characters and prefixed with
//! a millisecond token, so `"my report?.pdf"` is stored as
//! `"1718000000000_my report_.pdf"`. The token source is monotonic within the
//! process, which keeps two uploads of the same name in the same request apart.

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::atomic::{AtomicI64, Ordering};

/// Name fragment marking system assets that are never listed or archived
pub const RESERVED_MARKER: &str = "logo_";

/// Infix used when an archive key is already taken
pub const ARCHIVE_COLLISION_INFIX: &str = "_respaldo_";

/// Longest key in bytes; the common file name limit of Linux, macOS and Windows
pub const MAX_KEY_BYTES: usize = 255;

static DISALLOWED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[^A-Za-z0-9_.\-()\s]").expect("disallowed-character pattern is valid")
});

static STAMP: UniqueStamp = UniqueStamp::new();

/// Monotonic millisecond token source
///
/// Returns the current Unix time in milliseconds, or one more than the last
/// token handed out when the clock has not advanced.
#[derive(Debug)]
pub struct UniqueStamp {
    last: AtomicI64,
}

impl UniqueStamp {
    /// Creates a token source with no history
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last: AtomicI64::new(0),
        }
    }

    /// Returns the next token
    pub fn next_token(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let mut last = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(last + 1);
            match self
                .last
                .compare_exchange_weak(last, candidate, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return candidate,
                Err(actual) => last = actual,
            }
        }
    }
}

impl Default for UniqueStamp {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns the next process-wide uniqueness token
pub fn unique_token() -> i64 {
    STAMP.next_token()
}

/// Replaces every character outside the allow-list with `_`
///
/// The allow-list is ASCII letters and digits, `_`, `.`, `-`, `(`, `)` and
/// whitespace.
#[must_use]
pub fn safe_name(raw: &str) -> String {
    DISALLOWED.replace_all(raw, "_").into_owned()
}

/// Builds the storage key for an uploaded name
///
/// Overlong names lose the end of their stem so the key fits in
/// [`MAX_KEY_BYTES`]; the extension survives.
///
/// # Examples
///
/// ```rust
/// use filekeep::storage::sanitize::storage_key;
///
/// assert_eq!(storage_key("a/b?.pdf", 42), "42_a_b_.pdf");
/// ```
#[must_use]
pub fn storage_key(raw: &str, token: i64) -> String {
    let prefix = format!("{token}_");
    let safe = safe_name(raw);
    let (stem, ext) = split_extension(&safe);
    fit_key(&prefix, stem, ext)
}

/// Recovers the human-readable part of a storage key
///
/// Keys produced by [`storage_key`] lose their token prefix; any other name is
/// returned unchanged.
///
/// # Examples
///
/// ```rust
/// use filekeep::storage::sanitize::display_name;
///
/// assert_eq!(display_name("1700000000000_report.pdf"), "report.pdf");
/// assert_eq!(display_name("logo_header.png"), "logo_header.png");
/// ```
#[must_use]
pub fn display_name(key: &str) -> &str {
    match key.split_once('_') {
        Some((token, rest)) if !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()) => {
            rest
        }
        _ => key,
    }
}

/// Splits a name into stem and extension (extension includes the dot)
///
/// Leading dots do not start an extension, so `.env` has no extension.
#[must_use]
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(0) | None => (name, ""),
        Some(idx) => name.split_at(idx),
    }
}

/// Builds the archive key used when `name` already exists in the archive
///
/// # Examples
///
/// ```rust
/// use filekeep::storage::sanitize::archive_collision_name;
///
/// assert_eq!(archive_collision_name("a.txt", 7), "a_respaldo_7.txt");
/// ```
#[must_use]
pub fn archive_collision_name(name: &str, token: i64) -> String {
    let (stem, ext) = split_extension(name);
    let suffix = format!("{ARCHIVE_COLLISION_INFIX}{token}{ext}");
    let budget = MAX_KEY_BYTES.saturating_sub(suffix.len());
    if budget == 0 {
        return truncate_at_char(&suffix, MAX_KEY_BYTES).to_string();
    }
    format!("{}{suffix}", truncate_at_char(stem, budget))
}

/// Joins `prefix`, `stem` and `ext`, shortening the stem (and only then the
/// extension) to stay within [`MAX_KEY_BYTES`]
fn fit_key(prefix: &str, stem: &str, ext: &str) -> String {
    let budget = MAX_KEY_BYTES.saturating_sub(prefix.len());
    if stem.len() + ext.len() <= budget {
        return format!("{prefix}{stem}{ext}");
    }
    if ext.len() >= budget {
        return format!("{prefix}{}", truncate_at_char(ext, budget));
    }
    format!("{prefix}{}{ext}", truncate_at_char(stem, budget - ext.len()))
}

fn truncate_at_char(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Whether a name belongs to a reserved system asset
#[must_use]
pub fn is_reserved(name: &str) -> bool {
    name.to_lowercase().contains(RESERVED_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_safe_name_replaces_disallowed() {
        assert_eq!(safe_name("informe final (v2).pdf"), "informe final (v2).pdf");
        assert_eq!(safe_name("../../etc/passwd"), ".._.._etc_passwd");
        assert_eq!(safe_name("año*2024.txt"), "a_o_2024.txt");
    }

    #[test]
    fn test_storage_key_is_deterministic() {
        assert_eq!(storage_key("report.pdf", 1_700_000_000_000), "1700000000000_report.pdf");
        assert_eq!(storage_key("report.pdf", 5), storage_key("report.pdf", 5));
        assert_eq!(storage_key("", 5), "5_");
    }

    #[test]
    fn test_unique_stamp_is_strictly_increasing() {
        let stamp = UniqueStamp::new();
        let mut previous = stamp.next_token();
        for _ in 0..1000 {
            let next = stamp.next_token();
            assert!(next > previous);
            previous = next;
        }
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name(&storage_key("a b.txt", 12)), "a b.txt");
        assert_eq!(display_name("12_"), "");
        assert_eq!(display_name("_x"), "_x");
        assert_eq!(display_name("v2_draft.doc"), "v2_draft.doc");
    }

    #[test]
    fn test_split_extension() {
        assert_eq!(split_extension("a.txt"), ("a", ".txt"));
        assert_eq!(split_extension("archive.tar.gz"), ("archive.tar", ".gz"));
        assert_eq!(split_extension("README"), ("README", ""));
        assert_eq!(split_extension(".env"), (".env", ""));
    }

    #[test]
    fn test_archive_collision_name() {
        assert_eq!(
            archive_collision_name("1700_report.pdf", 1800),
            "1700_report_respaldo_1800.pdf"
        );
        assert_eq!(archive_collision_name("notes", 3), "notes_respaldo_3");
    }

    #[test]
    fn test_long_names_are_clamped_keeping_extension() {
        let raw = format!("{}.pdf", "x".repeat(250));
        let key = storage_key(&raw, 1_700_000_000_000);

        assert_eq!(key.len(), MAX_KEY_BYTES);
        assert!(key.starts_with("1700000000000_xxx"));
        assert!(key.ends_with("x.pdf"));

        let archived = archive_collision_name(&key, 1_800_000_000_000);
        assert_eq!(archived.len(), MAX_KEY_BYTES);
        assert!(archived.ends_with("_respaldo_1800000000000.pdf"));
    }

    #[test]
    fn test_clamping_respects_char_boundaries() {
        // U+3000 is whitespace, so it survives sanitizing as three bytes
        let raw = format!("{}.txt", "\u{3000}".repeat(100));
        let key = storage_key(&raw, 1);

        assert!(key.len() <= MAX_KEY_BYTES);
        assert!(key.ends_with(".txt"));
    }

    #[test]
    fn test_is_reserved() {
        assert!(is_reserved("logo_empresa.png"));
        assert!(is_reserved("1700_LOGO_header.png"));
        assert!(!is_reserved("catalogo.pdf"));
        assert!(!is_reserved("report.pdf"));
    }

    proptest! {
        #[test]
        fn storage_key_never_panics_and_keeps_prefix(raw in ".*", token in 0_i64..i64::MAX) {
            let key = storage_key(&raw, token);
            let expected_prefix = format!("{token}_");
            prop_assert!(key.starts_with(&expected_prefix));
            prop_assert!(!key.contains('/'));
            prop_assert!(!key.contains('\\'));
            prop_assert!(key.len() <= MAX_KEY_BYTES);
        }

        #[test]
        fn archive_collision_name_fits(stem in "[a-z]{1,300}", ext in "(\\.[a-z]{1,5})?", token in 0_i64..i64::MAX) {
            let name = format!("{stem}{ext}");
            let archived = archive_collision_name(&name, token);
            prop_assert!(archived.len() <= MAX_KEY_BYTES);
            prop_assert!(archived.ends_with(&ext));
        }

        #[test]
        fn safe_name_keeps_ascii_extension(stem in "[a-z]{1,8}", ext in "[a-z]{1,4}") {
            let name = format!("{stem}?.{ext}");
            let safe = safe_name(&name);
            let expected_suffix = format!(".{ext}");
            prop_assert!(safe.ends_with(&expected_suffix));
        }
    }
}
