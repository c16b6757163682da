//! Versions and version ranges.
//!
//! Module descriptors carry a [`Version`]; dependency declarations and
//! manifest contributions carry a [`VersionRange`]. A range is normalized into
//! a single half-open or closed interval so two ranges can be intersected in
//! constant time, which is what the structured merge needs when two modules
//! ask for the same package.
//!
//! Accepted range syntax (npm/cargo flavoured):
//!
//! | Input | Interval |
//! |-------|----------|
//! | `*`, `x`, `latest` | unbounded |
//! | `1.2.3`, `=1.2.3` | exactly 1.2.3 |
//! | `1.2`, `1.2.x` | `>=1.2.0 <1.3.0` |
//! | `^1.2.3` | `>=1.2.3 <2.0.0` |
//! | `^0.2.3` | `>=0.2.3 <0.3.0` |
//! | `~1.2.3` | `>=1.2.3 <1.3.0` |
//! | `>=1.0 <2`, `>=1.0, <2` | comparator sets (AND) |
//! | `1.0.0 - 2.0.0` | `>=1.0.0 <=2.0.0` |
//!
//! Disjunctions (`||`) and pre-release tags are rejected.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::error::DomainError;

// ── Version ──────────────────────────────────────────────────────────────────

/// A `major.minor.patch` release version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Version {
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse a full `major.minor.patch` version. A leading `v` is tolerated.
    pub fn parse(input: &str) -> Result<Self, DomainError> {
        let partial = Partial::parse(input).map_err(|reason| DomainError::InvalidVersion {
            input: input.to_string(),
            reason,
        })?;
        match (partial.minor, partial.patch) {
            (Some(minor), Some(patch)) => Ok(Self::new(partial.major, minor, patch)),
            _ => Err(DomainError::InvalidVersion {
                input: input.to_string(),
                reason: "expected major.minor.patch".into(),
            }),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for Version {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Version {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// A possibly-incomplete version as written inside a range (`1`, `1.2`, `1.2.x`).
#[derive(Debug, Clone, Copy)]
struct Partial {
    major: u64,
    minor: Option<u64>,
    patch: Option<u64>,
}

impl Partial {
    fn parse(input: &str) -> Result<Self, String> {
        let s = input.trim();
        let s = s.strip_prefix(['v', 'V']).unwrap_or(s);
        if s.is_empty() {
            return Err("empty version".into());
        }
        if s.contains(['-', '+']) {
            return Err("pre-release and build metadata are not supported".into());
        }

        let mut parts = s.split('.');
        let major = parse_component(parts.next())?.ok_or("major version cannot be a wildcard")?;
        let minor = parse_component(parts.next())?;
        let patch = match minor {
            Some(_) => parse_component(parts.next())?,
            None => {
                // `1.x.3` is meaningless; anything after a wildcard must be a wildcard.
                match parts.next() {
                    None => None,
                    Some(p) if is_wildcard(p) => None,
                    Some(_) => return Err("components after a wildcard must be wildcards".into()),
                }
            }
        };
        if parts.next().is_some() {
            return Err("too many components".into());
        }
        Ok(Self {
            major,
            minor,
            patch,
        })
    }

    fn floor(self) -> Version {
        Version::new(self.major, self.minor.unwrap_or(0), self.patch.unwrap_or(0))
    }

    /// First version past everything this partial version covers.
    fn ceiling(self) -> Version {
        match (self.minor, self.patch) {
            (None, _) => Version::new(self.major + 1, 0, 0),
            (Some(minor), None) => Version::new(self.major, minor + 1, 0),
            (Some(minor), Some(patch)) => Version::new(self.major, minor, patch + 1),
        }
    }

    fn is_complete(self) -> bool {
        self.minor.is_some() && self.patch.is_some()
    }
}

fn is_wildcard(s: &str) -> bool {
    matches!(s, "x" | "X" | "*")
}

fn parse_component(part: Option<&str>) -> Result<Option<u64>, String> {
    match part {
        None => Ok(None),
        Some(p) if is_wildcard(p) => Ok(None),
        Some(p) => p
            .parse::<u64>()
            .map(Some)
            .map_err(|_| format!("'{p}' is not a number")),
    }
}

// ── Bounds ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bound {
    Unbounded,
    Inclusive(Version),
    Exclusive(Version),
}

/// Pick the tighter (higher) of two lower bounds.
fn max_lower(a: Bound, b: Bound) -> Bound {
    match (a, b) {
        (Bound::Unbounded, x) | (x, Bound::Unbounded) => x,
        (Bound::Inclusive(x), Bound::Inclusive(y)) => Bound::Inclusive(x.max(y)),
        (Bound::Exclusive(x), Bound::Exclusive(y)) => Bound::Exclusive(x.max(y)),
        (Bound::Inclusive(i), Bound::Exclusive(e)) | (Bound::Exclusive(e), Bound::Inclusive(i)) => {
            if i > e {
                Bound::Inclusive(i)
            } else {
                Bound::Exclusive(e)
            }
        }
    }
}

/// Pick the tighter (lower) of two upper bounds.
fn min_upper(a: Bound, b: Bound) -> Bound {
    match (a, b) {
        (Bound::Unbounded, x) | (x, Bound::Unbounded) => x,
        (Bound::Inclusive(x), Bound::Inclusive(y)) => Bound::Inclusive(x.min(y)),
        (Bound::Exclusive(x), Bound::Exclusive(y)) => Bound::Exclusive(x.min(y)),
        (Bound::Inclusive(i), Bound::Exclusive(e)) | (Bound::Exclusive(e), Bound::Inclusive(i)) => {
            if i < e {
                Bound::Inclusive(i)
            } else {
                Bound::Exclusive(e)
            }
        }
    }
}

// ── VersionRange ─────────────────────────────────────────────────────────────

/// A contiguous set of acceptable versions.
///
/// Equality compares the normalized interval, not the source text: `^1.2`
/// and `>=1.2.0 <2.0.0` are equal.
#[derive(Debug, Clone)]
pub struct VersionRange {
    lower: Bound,
    upper: Bound,
    raw: String,
}

impl VersionRange {
    /// The range that accepts every version.
    pub fn any() -> Self {
        Self {
            lower: Bound::Unbounded,
            upper: Bound::Unbounded,
            raw: "*".into(),
        }
    }

    pub fn parse(input: &str) -> Result<Self, DomainError> {
        let invalid = |reason: String| DomainError::InvalidVersionRange {
            input: input.to_string(),
            reason,
        };

        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(invalid("empty range".into()));
        }
        if trimmed.contains("||") {
            return Err(invalid("disjunctions ('||') are not supported".into()));
        }

        let tokens: Vec<&str> = trimmed
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|t| !t.is_empty())
            .collect();

        let mut range = Self::any();
        range.raw = trimmed.to_string();

        // Hyphen range: `1.0.0 - 2.0.0`
        if tokens.len() == 3 && tokens[1] == "-" {
            let low = Partial::parse(tokens[0]).map_err(invalid)?;
            let high = Partial::parse(tokens[2]).map_err(invalid)?;
            range.lower = Bound::Inclusive(low.floor());
            range.upper = if high.is_complete() {
                Bound::Inclusive(high.floor())
            } else {
                Bound::Exclusive(high.ceiling())
            };
            return range.non_empty(input);
        }

        for token in tokens {
            let (lower, upper) = parse_comparator(token).map_err(invalid)?;
            range.lower = max_lower(range.lower, lower);
            range.upper = min_upper(range.upper, upper);
        }
        range.non_empty(input)
    }

    fn non_empty(self, input: &str) -> Result<Self, DomainError> {
        if self.is_empty() {
            return Err(DomainError::InvalidVersionRange {
                input: input.to_string(),
                reason: "no version satisfies this range".into(),
            });
        }
        Ok(self)
    }

    fn is_empty(&self) -> bool {
        let (low, low_inclusive) = match self.lower {
            Bound::Unbounded => return false,
            Bound::Inclusive(v) => (v, true),
            Bound::Exclusive(v) => (v, false),
        };
        let (high, high_inclusive) = match self.upper {
            Bound::Unbounded => return false,
            Bound::Inclusive(v) => (v, true),
            Bound::Exclusive(v) => (v, false),
        };
        match low.cmp(&high) {
            Ordering::Greater => true,
            Ordering::Equal => !(low_inclusive && high_inclusive),
            Ordering::Less => false,
        }
    }

    /// Whether `version` lies inside this range.
    pub fn contains(&self, version: &Version) -> bool {
        let above = match self.lower {
            Bound::Unbounded => true,
            Bound::Inclusive(v) => *version >= v,
            Bound::Exclusive(v) => *version > v,
        };
        let below = match self.upper {
            Bound::Unbounded => true,
            Bound::Inclusive(v) => *version <= v,
            Bound::Exclusive(v) => *version < v,
        };
        above && below
    }

    /// Intersect two ranges. Returns `None` when no version satisfies both.
    ///
    /// When the result equals one of the inputs, that input's source text is
    /// kept so manifests stay in the author's notation.
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        let lower = max_lower(self.lower, other.lower);
        let upper = min_upper(self.upper, other.upper);
        let mut out = Self {
            lower,
            upper,
            raw: String::new(),
        };
        if out.is_empty() {
            return None;
        }
        out.raw = if out == *self {
            self.raw.clone()
        } else if out == *other {
            other.raw.clone()
        } else {
            out.canonical()
        };
        Some(out)
    }

    /// Normalized textual form, e.g. `>=1.2.0 <2.0.0`.
    pub fn canonical(&self) -> String {
        match (self.lower, self.upper) {
            (Bound::Unbounded, Bound::Unbounded) => "*".into(),
            (Bound::Inclusive(a), Bound::Inclusive(b)) if a == b => format!("={a}"),
            (lower, upper) => {
                let mut parts = Vec::with_capacity(2);
                match lower {
                    Bound::Unbounded => {}
                    Bound::Inclusive(v) => parts.push(format!(">={v}")),
                    Bound::Exclusive(v) => parts.push(format!(">{v}")),
                }
                match upper {
                    Bound::Unbounded => {}
                    Bound::Inclusive(v) => parts.push(format!("<={v}")),
                    Bound::Exclusive(v) => parts.push(format!("<{v}")),
                }
                parts.join(" ")
            }
        }
    }

    /// The range as originally written (or canonical form after intersection).
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Heuristic used by the structured merge: does this string look like a
    /// version requirement rather than an arbitrary value?
    pub fn looks_like_range(s: &str) -> bool {
        let s = s.trim();
        !s.is_empty()
            && s.chars().next().is_some_and(|c| {
                c.is_ascii_digit() || matches!(c, '^' | '~' | '>' | '<' | '=' | '*')
            })
            && Self::parse(s).is_ok()
    }
}

fn parse_comparator(token: &str) -> Result<(Bound, Bound), String> {
    if matches!(token, "*" | "x" | "X" | "latest") {
        return Ok((Bound::Unbounded, Bound::Unbounded));
    }

    if let Some(rest) = token.strip_prefix(">=") {
        let p = Partial::parse(rest)?;
        return Ok((Bound::Inclusive(p.floor()), Bound::Unbounded));
    }
    if let Some(rest) = token.strip_prefix("<=") {
        let p = Partial::parse(rest)?;
        let upper = if p.is_complete() {
            Bound::Inclusive(p.floor())
        } else {
            Bound::Exclusive(p.ceiling())
        };
        return Ok((Bound::Unbounded, upper));
    }
    if let Some(rest) = token.strip_prefix('>') {
        let p = Partial::parse(rest)?;
        let lower = if p.is_complete() {
            Bound::Exclusive(p.floor())
        } else {
            Bound::Inclusive(p.ceiling())
        };
        return Ok((lower, Bound::Unbounded));
    }
    if let Some(rest) = token.strip_prefix('<') {
        let p = Partial::parse(rest)?;
        return Ok((Bound::Unbounded, Bound::Exclusive(p.floor())));
    }
    if let Some(rest) = token.strip_prefix('^') {
        let p = Partial::parse(rest)?;
        let upper = match (p.major, p.minor, p.patch) {
            (0, Some(0), Some(patch)) => Version::new(0, 0, patch + 1),
            (0, Some(minor), _) if minor > 0 || p.patch.is_none() => Version::new(0, minor + 1, 0),
            (major, _, _) => Version::new(major + 1, 0, 0),
        };
        return Ok((Bound::Inclusive(p.floor()), Bound::Exclusive(upper)));
    }
    if let Some(rest) = token.strip_prefix('~') {
        let p = Partial::parse(rest)?;
        let upper = match p.minor {
            Some(minor) => Version::new(p.major, minor + 1, 0),
            None => Version::new(p.major + 1, 0, 0),
        };
        return Ok((Bound::Inclusive(p.floor()), Bound::Exclusive(upper)));
    }

    let rest = token.strip_prefix('=').unwrap_or(token);
    let p = Partial::parse(rest)?;
    if p.is_complete() {
        Ok((Bound::Inclusive(p.floor()), Bound::Inclusive(p.floor())))
    } else {
        Ok((Bound::Inclusive(p.floor()), Bound::Exclusive(p.ceiling())))
    }
}

impl PartialEq for VersionRange {
    fn eq(&self, other: &Self) -> bool {
        self.lower == other.lower && self.upper == other.upper
    }
}

impl Eq for VersionRange {}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for VersionRange {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for VersionRange {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for VersionRange {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn r(s: &str) -> VersionRange {
        VersionRange::parse(s).unwrap()
    }

    #[test]
    fn version_parses_and_orders() {
        assert_eq!(v("1.2.3"), Version::new(1, 2, 3));
        assert_eq!(v("v2.0.0"), Version::new(2, 0, 0));
        assert!(v("1.10.0") > v("1.9.9"));
        assert!(Version::parse("1.2").is_err());
        assert!(Version::parse("1.2.3-beta").is_err());
        assert!(Version::parse("one.two.three").is_err());
    }

    #[test]
    fn caret_ranges() {
        assert_eq!(r("^1.2.3"), r(">=1.2.3 <2.0.0"));
        assert_eq!(r("^0.2.3"), r(">=0.2.3 <0.3.0"));
        assert_eq!(r("^0.0.3"), r(">=0.0.3 <0.0.4"));
        assert_eq!(r("^1.2"), r(">=1.2.0 <2.0.0"));
        assert_eq!(r("^0"), r(">=0.0.0 <1.0.0"));
    }

    #[test]
    fn tilde_and_partial_ranges() {
        assert_eq!(r("~1.2.3"), r(">=1.2.3 <1.3.0"));
        assert_eq!(r("~1"), r(">=1.0.0 <2.0.0"));
        assert_eq!(r("1.2"), r(">=1.2.0 <1.3.0"));
        assert_eq!(r("1.2.x"), r("~1.2"));
        assert_eq!(r("1.0.0 - 2.0.0"), r(">=1.0.0 <=2.0.0"));
    }

    #[test]
    fn exact_and_any() {
        let exact = r("=1.4.0");
        assert!(exact.contains(&v("1.4.0")));
        assert!(!exact.contains(&v("1.4.1")));
        assert!(r("*").contains(&v("99.0.0")));
        assert_eq!(r("latest"), VersionRange::any());
    }

    #[test]
    fn rejects_unsupported_forms() {
        assert!(VersionRange::parse("").is_err());
        assert!(VersionRange::parse("^1 || ^2").is_err());
        assert!(VersionRange::parse(">=2.0.0 <1.0.0").is_err());
        assert!(VersionRange::parse("^1.0.0-rc.1").is_err());
        assert!(VersionRange::parse("next").is_err());
    }

    #[test]
    fn intersection_of_overlapping_ranges() {
        let both = r("^4.17.0").intersect(&r(">=4.18.0")).unwrap();
        assert_eq!(both, r(">=4.18.0 <5.0.0"));
        assert_eq!(both.as_str(), ">=4.18.0 <5.0.0");
    }

    #[test]
    fn intersection_keeps_source_text_when_one_side_wins() {
        let narrow = r("~4.18.2");
        let out = r("^4.0.0").intersect(&narrow).unwrap();
        assert_eq!(out.as_str(), "~4.18.2");
    }

    #[test]
    fn intersection_of_disjoint_ranges_is_none() {
        assert!(r("^1.0.0").intersect(&r("^2.0.0")).is_none());
        assert!(r("<1.0.0").intersect(&r(">=1.0.0")).is_none());
        assert!(r("<=1.0.0").intersect(&r(">=1.0.0")).is_some());
    }

    #[test]
    fn looks_like_range_heuristic() {
        assert!(VersionRange::looks_like_range("^1.2.3"));
        assert!(VersionRange::looks_like_range("1.0.0"));
        assert!(!VersionRange::looks_like_range("hello"));
        assert!(!VersionRange::looks_like_range("node index.js"));
        assert!(!VersionRange::looks_like_range(""));
    }

    #[test]
    fn serde_uses_source_text() {
        let range: VersionRange = serde_json::from_str("\"^18.2.0\"").unwrap();
        assert_eq!(serde_json::to_string(&range).unwrap(), "\"^18.2.0\"");
    }
}
