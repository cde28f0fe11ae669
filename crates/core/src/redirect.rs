//! Tracking-redirect unwrapping for newsletter links.
//!
//! Newsletter links usually point at a click-tracking host that embeds the
//! real destination as a percent-encoded path segment:
//!
//! ```text
//! https://tracking.example.com/CL0/https:%2F%2Fsite.example%2Fpost%2F%3Futm_source=x/1/0100-abc/token=418
//! ```
//!
//! The destination starts at the second scheme token and ends at the next
//! literal `/`. Its query string is dropped.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;
use url::Url;

use crate::{DigestorError, Result};

static SCHEME_TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)https?:(?://|%2F%2F)").unwrap());

/// What to do with a link whose href is not a recognizable redirect wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnwrapPolicy {
    /// Keep the raw href when it is itself an absolute http(s) URL; drop the record otherwise.
    #[default]
    PassThrough,
    /// Drop the record.
    Skip,
    /// Abort extraction with [`DigestorError::UnwrapFailed`].
    Fail,
}

impl FromStr for UnwrapPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pass-through" | "passthrough" | "pass" => Ok(Self::PassThrough),
            "skip" | "drop" => Ok(Self::Skip),
            "fail" | "error" => Ok(Self::Fail),
            _ => Err(format!("Invalid unwrap policy: {}. Valid options: pass-through, skip, fail", s)),
        }
    }
}

/// Recovers the destination URL embedded in a tracking redirect.
///
/// # Errors
///
/// Returns [`DigestorError::UnwrapFailed`] when the href holds no second
/// scheme token or the embedded value does not decode to an absolute
/// http(s) URL.
///
/// # Example
///
/// ```rust
/// use digestor_core::unwrap_redirect;
///
/// let href = "https://tracking.example.com/CL0/https:%2F%2Fnews.example%2Fstory%2F%3Futm_source=nl/1/abc/xyz=418";
/// assert_eq!(unwrap_redirect(href).unwrap(), "https://news.example/story/");
/// ```
pub fn unwrap_redirect(href: &str) -> Result<String> {
    let href = href.trim();
    let failed = || DigestorError::UnwrapFailed { href: href.to_string() };

    let inner = SCHEME_TOKEN
        .find_iter(href)
        .find(|m| m.start() > 0)
        .ok_or_else(failed)?;
    let rest = &href[inner.start()..];

    let embedded = if inner.as_str().ends_with("//") {
        rest
    } else {
        let after_scheme = &rest[inner.len()..];
        let end = after_scheme.find('/').map_or(rest.len(), |i| inner.len() + i);
        &rest[..end]
    };

    let decoded = urlencoding::decode(embedded).map_err(|_| failed())?;
    let destination = decoded.split_once('?').map_or(&*decoded, |(before, _)| before);

    if !is_absolute_http(destination) {
        return Err(failed());
    }

    Ok(destination.to_string())
}

/// Resolves a link's destination under the given policy.
///
/// `Ok(None)` means the record should be dropped.
pub fn resolve_link(href: &str, policy: UnwrapPolicy) -> Result<Option<String>> {
    match unwrap_redirect(href) {
        Ok(url) => Ok(Some(url)),
        Err(err) => match policy {
            UnwrapPolicy::PassThrough if is_absolute_http(href.trim()) => Ok(Some(href.trim().to_string())),
            UnwrapPolicy::PassThrough | UnwrapPolicy::Skip => {
                warn!(href, "dropping link that is not a tracking redirect");
                Ok(None)
            }
            UnwrapPolicy::Fail => Err(err),
        },
    }
}

fn is_absolute_http(candidate: &str) -> bool {
    Url::parse(candidate)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.host_str().is_some())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WRAPPED: &str = "https://tracking.tldrnewsletter.com/CL0/https:%2F%2Fwww.bleepingcomputer.com%2Fnews%2Fsecurity%2Fnetherlands-citrix-netscaler-flaw-cve-2025-6543-exploited-to-breach-orgs%2F%3Futm_source=tldrinfosec/1/01000198a38abf5c-1df751a1-4ff3-45f8-9a34-6ef5f324d7f4-000000/yCsUCrlwhItaPww2IcSKVDOt_jS-GXFAehMaXQmiK1A=418";

    #[test]
    fn test_unwrap_tracking_link() {
        assert_eq!(
            unwrap_redirect(WRAPPED).unwrap(),
            "https://www.bleepingcomputer.com/news/security/netherlands-citrix-netscaler-flaw-cve-2025-6543-exploited-to-breach-orgs/"
        );
    }

    #[test]
    fn test_unwrap_without_inner_query() {
        let href = "https://t.example/CL0/https:%2F%2Fexample.org%2Fa%2Fb/1/abc";
        assert_eq!(unwrap_redirect(href).unwrap(), "https://example.org/a/b");
    }

    #[test]
    fn test_unwrap_unencoded_inner_url() {
        let href = "https://r.example/click?u=https://example.org/post?utm_source=nl";
        assert_eq!(unwrap_redirect(href).unwrap(), "https://example.org/post");
    }

    #[test]
    fn test_unwrap_plain_url_fails() {
        let result = unwrap_redirect("https://example.org/article");
        assert!(matches!(result, Err(DigestorError::UnwrapFailed { .. })));
    }

    #[test]
    fn test_unwrap_garbage_inner_fails() {
        let result = unwrap_redirect("https://t.example/CL0/https:%2F%2F/1/abc");
        assert!(matches!(result, Err(DigestorError::UnwrapFailed { .. })));
    }

    #[test]
    fn test_resolve_pass_through_keeps_absolute_url() {
        let resolved = resolve_link("https://example.org/article", UnwrapPolicy::PassThrough).unwrap();
        assert_eq!(resolved.as_deref(), Some("https://example.org/article"));
    }

    #[test]
    fn test_resolve_pass_through_drops_relative_href() {
        assert_eq!(resolve_link("/sponsor", UnwrapPolicy::PassThrough).unwrap(), None);
        assert_eq!(resolve_link("mailto:hi@example.org", UnwrapPolicy::PassThrough).unwrap(), None);
    }

    #[test]
    fn test_resolve_skip_and_fail() {
        assert_eq!(resolve_link("https://example.org/article", UnwrapPolicy::Skip).unwrap(), None);
        assert!(matches!(
            resolve_link("https://example.org/article", UnwrapPolicy::Fail),
            Err(DigestorError::UnwrapFailed { .. })
        ));
    }

    #[test]
    fn test_resolve_unwraps_under_every_policy() {
        for policy in [UnwrapPolicy::PassThrough, UnwrapPolicy::Skip, UnwrapPolicy::Fail] {
            assert!(resolve_link(WRAPPED, policy).unwrap().unwrap().starts_with("https://www.bleepingcomputer.com/"));
        }
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("skip".parse::<UnwrapPolicy>(), Ok(UnwrapPolicy::Skip));
        assert_eq!("pass-through".parse::<UnwrapPolicy>(), Ok(UnwrapPolicy::PassThrough));
        assert!("maybe".parse::<UnwrapPolicy>().is_err());
    }
}
