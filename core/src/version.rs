//! Server version compatibility check.
//!
//! The webservice reports its version in the `psws-version` response header.
//! A version outside the supported range only produces a warning; the call
//! that carried it still succeeds.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use tracing::warn;

pub const MIN_COMPATIBLE_VERSION: &str = "1.4.0.17";
pub const MAX_COMPATIBLE_VERSION: &str = "1.5.9.0";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Component {
    Number(u64),
    Text(String),
}

/// A loosely formatted version such as `1.5.4.1` or `1.6.0rc2`.
///
/// The string is split into runs of digits and runs of other characters,
/// dots dropped. Versions compare component by component; a number sorts
/// before text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct LooseVersion {
    components: Vec<Component>,
    raw: String,
}

impl LooseVersion {
    pub fn parse(raw: &str) -> Self {
        let mut components = Vec::new();
        let mut chars = raw.trim().chars().peekable();
        while let Some(&c) = chars.peek() {
            if c == '.' {
                chars.next();
            } else if c.is_ascii_digit() {
                let mut digits = String::new();
                while let Some(&d) = chars.peek().filter(|d| d.is_ascii_digit()) {
                    digits.push(d);
                    chars.next();
                }
                components.push(match digits.parse() {
                    Ok(number) => Component::Number(number),
                    Err(_) => Component::Text(digits),
                });
            } else {
                let mut text = String::new();
                while let Some(&t) = chars.peek().filter(|t| !t.is_ascii_digit() && **t != '.') {
                    text.push(t);
                    chars.next();
                }
                components.push(Component::Text(text));
            }
        }
        Self {
            components,
            raw: raw.trim().to_string(),
        }
    }

    fn compare(&self, other: &Self) -> Ordering {
        self.components.cmp(&other.components)
    }
}

impl FromStr for LooseVersion {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for LooseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Whether the range ends are part of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RangeBound {
    #[default]
    Inclusive,
    Exclusive,
}

/// Range of server versions the client is known to work with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    min: LooseVersion,
    max: LooseVersion,
    bound: RangeBound,
}

impl VersionRange {
    pub fn new(min: &str, max: &str, bound: RangeBound) -> Self {
        Self {
            min: LooseVersion::parse(min),
            max: LooseVersion::parse(max),
            bound,
        }
    }

    pub fn contains(&self, version: &LooseVersion) -> bool {
        let above = version.compare(&self.min);
        let below = version.compare(&self.max);
        match self.bound {
            RangeBound::Inclusive => above != Ordering::Less && below != Ordering::Greater,
            RangeBound::Exclusive => above == Ordering::Greater && below == Ordering::Less,
        }
    }
}

impl Default for VersionRange {
    fn default() -> Self {
        Self::new(MIN_COMPATIBLE_VERSION, MAX_COMPATIBLE_VERSION, RangeBound::Inclusive)
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bound {
            RangeBound::Inclusive => write!(f, "[{}, {}]", self.min, self.max),
            RangeBound::Exclusive => write!(f, "({}, {})", self.min, self.max),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compatibility {
    /// No version header was present.
    Unknown,
    Compatible,
    Incompatible(LooseVersion),
}

/// Compare the reported `version` against `range`, warning when outside it.
pub fn check_version(version: Option<&str>, range: &VersionRange) -> Compatibility {
    let Some(raw) = version.filter(|v| !v.trim().is_empty()) else {
        return Compatibility::Unknown;
    };
    let version = LooseVersion::parse(raw);
    if range.contains(&version) {
        return Compatibility::Compatible;
    }
    warn!(
        %version,
        supported = %range,
        "this library may not be compatible with this version of PrestaShop ({version}), please upgrade or downgrade this library"
    );
    Compatibility::Incompatible(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn components_compare_numerically() {
        assert!(LooseVersion::parse("1.4.10") > LooseVersion::parse("1.4.9"));
        assert!(LooseVersion::parse("1.5") < LooseVersion::parse("1.5.0.1"));
        assert!(LooseVersion::parse("1.6.0") < LooseVersion::parse("1.6.0rc"));
    }

    #[test]
    fn missing_header_is_unknown() {
        let range = VersionRange::default();
        assert_eq!(check_version(None, &range), Compatibility::Unknown);
        assert_eq!(check_version(Some(""), &range), Compatibility::Unknown);
    }

    #[test]
    fn inclusive_range_accepts_its_ends() {
        let range = VersionRange::default();
        assert_eq!(check_version(Some("1.4.0.17"), &range), Compatibility::Compatible);
        assert_eq!(check_version(Some("1.5.4.1"), &range), Compatibility::Compatible);
        assert_eq!(check_version(Some("1.5.9.0"), &range), Compatibility::Compatible);
    }

    #[test]
    fn outside_range_is_incompatible() {
        let range = VersionRange::default();
        assert!(matches!(
            check_version(Some("1.7.8.0"), &range),
            Compatibility::Incompatible(v) if v.to_string() == "1.7.8.0"
        ));
        assert!(matches!(
            check_version(Some("1.3"), &range),
            Compatibility::Incompatible(_)
        ));
    }

    #[test]
    fn exclusive_range_rejects_its_ends() {
        let range = VersionRange::new("1.4.0.17", "1.5.9.0", RangeBound::Exclusive);
        assert!(!range.contains(&LooseVersion::parse("1.5.9.0")));
        assert!(!range.contains(&LooseVersion::parse("1.4.0.17")));
        assert!(range.contains(&LooseVersion::parse("1.5.0.0")));
    }
}
