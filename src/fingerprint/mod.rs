//! URL fingerprinting: the deterministic archive key for a page
//!
//! A fingerprint is derived from the canonical form of a URL (scheme and host
//! lowercased, default port dropped, fragment removed, path and query kept
//! verbatim), slugged into a filesystem-safe string and given a fixed suffix.
//!
//! The slug transform matches `@sindresorhus/slugify` with default options
//! on ASCII input, which is all a serialized `Url` ever contains: non-ASCII
//! hosts are IDNA-encoded and everything else is percent-encoded.

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use crate::utils::{DEFAULT_ARCHIVE_SUFFIX, MAX_SLUG_LEN};

/// Stable archive key for one canonical URL
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// How archive keys are kept apart when slugging collapses two URLs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyPolicy {
    /// `slugify(url) + suffix`; readable, but `/a?x=1` and `/a/x/1` share a key
    Slug,
    /// Slug (truncated) plus 16 hex digits of the xxh3 hash of the canonical URL
    #[default]
    SlugWithDigest,
}

/// Errors raised while fingerprinting
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FingerprintError {
    #[error("URL {0} is not absolute http(s) with a host")]
    NotArchivable(String),
}

/// Maps URLs onto archive keys under a fixed suffix and key policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprinter {
    suffix: String,
    policy: KeyPolicy,
}

impl Default for Fingerprinter {
    fn default() -> Self {
        Self::new(DEFAULT_ARCHIVE_SUFFIX, KeyPolicy::default())
    }
}

impl Fingerprinter {
    #[must_use]
    pub fn new(suffix: impl Into<String>, policy: KeyPolicy) -> Self {
        Self {
            suffix: suffix.into(),
            policy,
        }
    }

    #[must_use]
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    #[must_use]
    pub fn policy(&self) -> KeyPolicy {
        self.policy
    }

    /// Fingerprint a URL
    ///
    /// Pure: the same URL yields the same key in every process.
    #[must_use]
    pub fn fingerprint(&self, url: &Url) -> Fingerprint {
        let canonical = canonical_form(url);
        let slug = slugify(&canonical);

        let key = match self.policy {
            KeyPolicy::Slug => format!("{slug}{}", self.suffix),
            KeyPolicy::SlugWithDigest => {
                let digest = xxhash_rust::xxh3::xxh3_64(canonical.as_bytes());
                // slugs are ASCII, so any byte index is a char boundary
                let head = &slug[..slug.len().min(MAX_SLUG_LEN)];
                let head = head.trim_end_matches('-');
                format!("{head}-{digest:016x}{}", self.suffix)
            }
        };

        Fingerprint(key)
    }

    /// Fingerprint a URL the crawler is able to archive
    ///
    /// # Errors
    ///
    /// Rejects anything that is not an absolute `http`/`https` URL with a host.
    pub fn fingerprint_checked(&self, url: &Url) -> Result<Fingerprint, FingerprintError> {
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(FingerprintError::NotArchivable(url.to_string()));
        }
        Ok(self.fingerprint(url))
    }
}

/// Fingerprint with the default suffix (`.html`) and key policy
#[must_use]
pub fn fingerprint(url: &Url) -> Fingerprint {
    Fingerprinter::default().fingerprint(url)
}

/// Canonical string form a fingerprint is computed from
///
/// `Url` parsing already lowercases scheme and host and drops default ports;
/// the fragment is client-side only and is removed here.
#[must_use]
pub fn canonical_form(url: &Url) -> String {
    let mut canonical = url.clone();
    canonical.set_fragment(None);
    canonical.into()
}

/// Slug an ASCII string
///
/// Splits camel-case boundaries, spells `&` as `and`, lowercases, and
/// collapses every run of other characters into a single `-`. An input with
/// nothing sluggable becomes `index`.
#[must_use]
pub fn slugify(input: &str) -> String {
    let spaced = decamelize(&input.replace('&', " and "));

    let mut slug = String::with_capacity(spaced.len());
    let mut pending_separator = false;
    for c in spaced.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_separator = true;
        }
    }

    if slug.is_empty() {
        slug.push_str("index");
    }
    slug
}

/// Insert spaces at camel-case boundaries
///
/// `fooBar` → `foo Bar`, `HTMLParser` → `HTML Parser`, `ABC123` → `ABC 123`,
/// `v2Beta` → `v2 Beta`. A single capital followed by digits (`C3` in a
/// percent escape) is left alone.
fn decamelize(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len() + 8);

    for (i, &c) in chars.iter().enumerate() {
        if i > 0 {
            let prev = chars[i - 1];
            let next = chars.get(i + 1).copied();

            let lower_to_upper =
                (prev.is_ascii_lowercase() || prev.is_ascii_digit()) && c.is_ascii_uppercase();
            let acronym_end = prev.is_ascii_uppercase()
                && c.is_ascii_uppercase()
                && next.is_some_and(|n| n.is_ascii_lowercase() && n != 's');
            let acronym_digits = c.is_ascii_digit()
                && prev.is_ascii_uppercase()
                && i >= 2
                && chars[i - 2].is_ascii_uppercase();

            if lower_to_upper || acronym_end || acronym_digits {
                out.push(' ');
            }
        }
        out.push(c);
    }

    out
}
