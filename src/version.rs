//! Semantic version handling for artifact filenames.

use std::cmp::Ordering;
use std::fmt;

/// A `major.minor.patch[-tag]` version as embedded in artifact names
/// (e.g. `app-2.3.1-SNAPSHOT.jar` carries `2.3.1-SNAPSHOT`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemVer {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub tag: Option<String>,
}

impl SemVer {
    /// Parse `"1.2.3"`, `"v1.2.3"` or `"1.2.3-SNAPSHOT"`. Returns `None`
    /// for anything that is not at least `major.minor`.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.strip_prefix('v').unwrap_or(s);
        let (numbers, tag) = match s.find('-') {
            Some(idx) => (&s[..idx], Some(s[idx + 1..].to_string())),
            None => (s, None),
        };

        let mut parts = numbers.split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next()?.parse().ok()?;
        let patch = parts.next().map_or(Some(0), |p| p.parse().ok())?;
        if parts.next().is_some() {
            return None;
        }

        Some(Self { major, minor, patch, tag })
    }
}

impl fmt::Display for SemVer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(ref tag) = self.tag {
            write!(f, "-{}", tag)?;
        }
        Ok(())
    }
}

impl Ord for SemVer {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch).cmp(&(other.major, other.minor, other.patch))
    }
}

impl PartialOrd for SemVer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_triple() {
        let v = SemVer::parse("2.3.1").unwrap();
        assert_eq!((v.major, v.minor, v.patch), (2, 3, 1));
        assert!(v.tag.is_none());
    }

    #[test]
    fn parse_snapshot_tag() {
        let v = SemVer::parse("2.3.1-SNAPSHOT").unwrap();
        assert_eq!(v.tag.as_deref(), Some("SNAPSHOT"));
        assert_eq!((v.major, v.minor, v.patch), (2, 3, 1));
        assert_eq!(v.to_string(), "2.3.1-SNAPSHOT");
    }

    #[test]
    fn parse_v_prefix_and_short_form() {
        let v = SemVer::parse("v1.4").unwrap();
        assert_eq!((v.major, v.minor, v.patch), (1, 4, 0));
    }

    #[test]
    fn rejects_garbage() {
        assert!(SemVer::parse("").is_none());
        assert!(SemVer::parse("1").is_none());
        assert!(SemVer::parse("a.b.c").is_none());
        assert!(SemVer::parse("1.2.3.4").is_none());
    }

    #[test]
    fn ordering_ignores_tag() {
        let a = SemVer::parse("1.2.3-SNAPSHOT").unwrap();
        let b = SemVer::parse("1.2.10").unwrap();
        let c = SemVer::parse("2.0.0").unwrap();
        assert!(a < b);
        assert!(b < c);
        assert_eq!(a.cmp(&SemVer::parse("1.2.3").unwrap()), Ordering::Equal);
    }
}
