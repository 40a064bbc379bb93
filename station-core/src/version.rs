//! Version ordering for mod archives
//!
//! Mod authors publish versions in whatever shape their build produces:
//! strict semver (`1.4.2`, `1.20.1-forge`), loader-style dotted numbers (`1.7.10.2`),
//! date-stamped builds (`25.4.214123.zh`), or free-form labels. The catalog
//! needs a newest-first order over all of them, so comparison falls through
//! three tiers:
//!
//! 1. **Semantic** - both sides parse as semver: standard precedence, build
//!    metadata ignored.
//! 2. **Numeric-like** - both sides match [`is_maybe_version`]: the numeric
//!    tokens are compared position by position *as strings*.
//! 3. **Opaque** - anything else compares equal and keeps its listing order.
//!
//! # Known limitations
//!
//! Tier 2 compares tokens lexicographically, so `"9"` sorts ahead of `"10"`.
//!
//! The relation is not transitive across tiers: `1.0.0 ≈ nightly` and
//! `nightly ≈ 2.0.0`, yet `2.0.0` sorts before `1.0.0`. Use
//! [`sort_descending`] rather than `slice::sort_by`, which may panic when
//! handed a comparator that is not a total order.

use once_cell::sync::Lazy;
use regex::Regex;
use semver::Version;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

/// Dot/dash separated digit groups, optionally followed by a suffix that
/// does not end in a separator.
pub const MAYBE_VERSION_PATTERN: &str = r"^(([0-9]+)[.-])*([0-9]+)([.-].*[^.-])?$";

static MAYBE_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(MAYBE_VERSION_PATTERN).expect("maybe-version pattern compiles"));

// Only the first match is removed, so `rc1x` keeps its trailing `x`.
static ALPHA_AFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(^[^0-9]+)|([^0-9]+$)").expect("affix pattern compiles"));

const TOKEN_SEPARATORS: [char; 2] = ['.', '-'];

/// Which comparison tier a single version string falls into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VersionClass {
    /// Strictly valid semantic version (after dropping a leading `v`)
    Semantic,
    /// Matches the maybe-version pattern but is not semver
    NumericLike,
    /// Neither; ordering against it is undecided
    Opaque,
}

impl std::fmt::Display for VersionClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VersionClass::Semantic => write!(f, "semantic"),
            VersionClass::NumericLike => write!(f, "numeric-like"),
            VersionClass::Opaque => write!(f, "opaque"),
        }
    }
}

/// Drop a single leading `v` or `V`
fn normalize(version: &str) -> &str {
    version.strip_prefix(['v', 'V']).unwrap_or(version)
}

/// Whether `version` matches the maybe-version grammar
///
/// This is also the grammar uploads must satisfy, so callers validate the raw
/// string with it before calling [`crate::catalog::Catalog::put`]. No prefix
/// is stripped here: `v1.2` is rejected.
pub fn is_maybe_version(version: &str) -> bool {
    MAYBE_VERSION.is_match(version)
}

/// Classify a version string the same way [`compare`] does
pub fn classify(version: &str) -> VersionClass {
    let normalized = normalize(version);
    if Version::parse(normalized).is_ok() {
        VersionClass::Semantic
    } else if is_maybe_version(normalized) {
        VersionClass::NumericLike
    } else {
        VersionClass::Opaque
    }
}

/// Split on separators and strip one alphabetic prefix or suffix per token
fn numeric_tokens(version: &str) -> Vec<String> {
    version
        .split(TOKEN_SEPARATORS)
        .map(|token| ALPHA_AFFIX.replace(token, "").into_owned())
        .filter(|token| !token.is_empty())
        .collect()
}

/// Semver precedence: build metadata does not participate
fn precedence(a: &Version, b: &Version) -> Ordering {
    (a.major, a.minor, a.patch)
        .cmp(&(b.major, b.minor, b.patch))
        .then_with(|| a.pre.cmp(&b.pre))
}

/// Compare two versions for a newest-first sort
///
/// Returns [`Ordering::Less`] when `a` is newer than `b`, so
/// `sort_by(|a, b| compare(a, b))` puts the newest version first.
pub fn compare(a: &str, b: &str) -> Ordering {
    let (a, b) = (normalize(a), normalize(b));

    if let (Ok(va), Ok(vb)) = (Version::parse(a), Version::parse(b)) {
        debug!("semver comparison: {} vs {}", a, b);
        return precedence(&vb, &va);
    }

    if is_maybe_version(a) && is_maybe_version(b) {
        let a_tokens = numeric_tokens(a);
        let b_tokens = numeric_tokens(b);
        debug!("numeric token comparison: {:?} vs {:?}", a_tokens, b_tokens);

        for (x, y) in a_tokens.iter().zip(b_tokens.iter()) {
            match y.cmp(x) {
                Ordering::Equal => continue,
                decided => return decided,
            }
        }
        return Ordering::Equal;
    }

    debug!("Unrecognized version difference: {} vs {}", a, b);
    Ordering::Equal
}

/// Sort versions newest-first
///
/// Stable insertion sort: elements only move past neighbours that
/// [`compare`] ranks strictly after them, so undecided pairs keep their
/// original relative order and a second pass is a no-op.
pub fn sort_descending(versions: &mut [String]) {
    for i in 1..versions.len() {
        let mut j = i;
        while j > 0 && compare(&versions[j - 1], &versions[j]) == Ordering::Greater {
            versions.swap(j - 1, j);
            j -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sorted(input: &[&str]) -> Vec<String> {
        let mut versions: Vec<String> = input.iter().map(|v| v.to_string()).collect();
        sort_descending(&mut versions);
        versions
    }

    #[test]
    fn test_semver_orders_by_precedence() {
        assert_eq!(
            sorted(&[
                "1.0.0",
                "2.0.0",
                "1.0.0-alpha",
                "1.5.0",
                "1.0.0-beta",
                "1.0.0-alpha.1",
                "1.10.0",
            ]),
            vec![
                "2.0.0",
                "1.10.0",
                "1.5.0",
                "1.0.0",
                "1.0.0-beta",
                "1.0.0-alpha.1",
                "1.0.0-alpha",
            ]
        );
    }

    #[test]
    fn test_semver_ignores_build_metadata() {
        assert_eq!(compare("1.0.0+build.1", "1.0.0+build.2"), Ordering::Equal);
        assert_eq!(compare("1.0.1+zzz", "1.0.0+aaa"), Ordering::Less);
    }

    #[test]
    fn test_leading_v_is_stripped() {
        assert_eq!(compare("v1.2.0", "1.10.0"), Ordering::Greater);
        assert_eq!(compare("V2.0.0", "v1.0.0"), Ordering::Less);
        assert_eq!(compare("v1.0.0", "1.0.0"), Ordering::Equal);
    }

    #[test]
    fn test_date_stamped_builds() {
        assert_eq!(
            sorted(&["25.4.214123.zh", "25.4.215555.zh"]),
            vec!["25.4.215555.zh", "25.4.214123.zh"]
        );
    }

    #[test]
    fn test_numeric_tokens_compare_as_strings() {
        // "9" > "10" lexicographically, so 9 is ranked newer
        assert_eq!(compare("9", "10"), Ordering::Less);
        assert_eq!(sorted(&["10", "9"]), vec!["9", "10"]);
        assert_eq!(sorted(&["1.9", "1.10"]), vec!["1.9", "1.10"]);
    }

    #[test]
    fn test_extra_trailing_tokens_are_ignored() {
        assert_eq!(compare("1.2", "1.2.5"), Ordering::Equal);
        assert_eq!(compare("1.20", "1.20.1-forge"), Ordering::Equal);
    }

    #[test]
    fn test_alpha_affixes_are_stripped() {
        assert_eq!(numeric_tokens("1.2-rc1"), vec!["1", "2", "1"]);
        assert_eq!(numeric_tokens("25.4.214123.zh"), vec!["25", "4", "214123"]);
        assert_eq!(numeric_tokens("1.0-rc1x"), vec!["1", "0", "1x"]);
        assert_eq!(compare("1.2-rc2", "1.2-rc1"), Ordering::Less);
    }

    #[test]
    fn test_opaque_versions_compare_equal() {
        assert_eq!(compare("nightly", "1.0.0"), Ordering::Equal);
        assert_eq!(compare("abc", "def"), Ordering::Equal);
        assert_eq!(
            sorted(&["nightly", "snapshot", "latest"]),
            vec!["nightly", "snapshot", "latest"]
        );
    }

    #[test]
    fn test_relation_is_not_transitive() {
        assert_eq!(compare("1.0.0", "nightly"), Ordering::Equal);
        assert_eq!(compare("nightly", "2.0.0"), Ordering::Equal);
        assert_eq!(compare("1.0.0", "2.0.0"), Ordering::Greater);
    }

    #[test]
    fn test_sort_is_idempotent() {
        let once = sorted(&["1.0.0", "nightly", "0.9", "2.0.0", "1.20.1-forge", "10", "9"]);
        let mut twice = once.clone();
        sort_descending(&mut twice);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_sorted_input_is_unchanged() {
        let input = ["3.0.0", "2.1.0", "2.0.0", "2.0.0-rc.1", "0.1.0"];
        assert_eq!(sorted(&input), input.to_vec());
    }

    #[test]
    fn test_undecided_pairs_do_not_warn() {
        let logs = crate::test_support::LogCapture::default();
        let _guard = logs.set_default(tracing::Level::WARN);

        sorted(&["nightly", "beta", "alpha", "snapshot", "1.0.0", "2.0.0"]);

        assert_eq!(logs.contents(), "");
    }

    #[test]
    fn test_is_maybe_version() {
        for ok in ["1", "1.2.3", "1.2-beta", "25.4.214123.zh", "1.20.1-forge", "2024-05-01"] {
            assert!(is_maybe_version(ok), "{ok} should be accepted");
        }
        for bad in ["", "v1.2", "1.2.", "1.2-", "abc", "latest", ".1"] {
            assert!(!is_maybe_version(bad), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("1.2.3"), VersionClass::Semantic);
        assert_eq!(classify("v1.2.3-rc.1"), VersionClass::Semantic);
        assert_eq!(classify("1.2"), VersionClass::NumericLike);
        assert_eq!(classify("25.4.214123.zh"), VersionClass::NumericLike);
        assert_eq!(classify("nightly"), VersionClass::Opaque);
        // Suffix after a full triple is a semver pre-release
        assert_eq!(classify("1.20.1-forge"), VersionClass::Semantic);
        assert_eq!(classify("1.7.10.2"), VersionClass::NumericLike);
        assert_eq!(VersionClass::NumericLike.to_string(), "numeric-like");
    }
}
