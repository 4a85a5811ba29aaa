//! Mozilla-style version parsing and ordering
//!
//! Versions look like `major.minor1[.minor2][.minor3][a|b][alphaVer][pre[preVer][a|b]]`,
//! e.g. `3.6.4`, `4.0b2`, `1.1pre1a`. Anything after the recognized prefix
//! (such as `build17`) is ignored.
//!
//! Each version is encoded into a fixed-width decimal integer so that plain
//! integer comparison gives version ordering. Field layout, most significant
//! first:
//!
//! ```text
//! major | minor1 | minor2 | minor3 | alpha | alphaVer | pre | preVer | preAlpha
//!  ...  |  5     |  5     |  5     |  1    |  5       |  1  |  5     |  1
//! ```
//!
//! `alpha` and `preAlpha` encode `a` → 0, `b` → 1, absent → 2. `pre` encodes
//! present → 0, absent → 1, so `1.0pre1` sorts before `1.0`.
//!
//! Numeric fields are clamped to their width: components above 99999 (or a
//! major above 10^10 - 1) all encode as the maximum and compare equal to each
//! other.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::memo::Memoized;

static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        ^(?P<major>\d+)
        \.(?P<minor1>\d+)
        \.?(?P<minor2>\d+)?
        \.?(?P<minor3>\d+)?
        (?P<alpha>[ab]?)
        (?P<alpha_ver>\d*)
        (?:(?P<pre>pre)(?P<pre_ver>\d*)(?P<pre_alpha>[ab])?)?
        ",
    )
    .expect("version regex is valid")
});

/// Parsed records by input string. Entries never expire, so the memo holds
/// every distinct version string parsed for the life of the process.
static PARSED: LazyLock<Memoized<String, VersionRecord>> = LazyLock::new(Memoized::new);

/// Width in decimal digits of every numeric field except `major`
const FIELD_WIDTH: u32 = 5;
const FIELD_MAX: u64 = 10u64.pow(FIELD_WIDTH) - 1;
/// Keeps `major * 10^28` inside `u128`
const MAJOR_MAX: u64 = 10u64.pow(10) - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlphaKind {
    #[default]
    None,
    Alpha,
    Beta,
}

impl AlphaKind {
    fn from_marker(marker: Option<&str>) -> Self {
        match marker {
            Some("a") => AlphaKind::Alpha,
            Some("b") => AlphaKind::Beta,
            _ => AlphaKind::None,
        }
    }

    fn digit(self) -> u128 {
        match self {
            AlphaKind::Alpha => 0,
            AlphaKind::Beta => 1,
            AlphaKind::None => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AlphaKind::Alpha => "a",
            AlphaKind::Beta => "b",
            AlphaKind::None => "",
        }
    }
}

/// Parsed components of a version string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VersionRecord {
    pub major: Option<u64>,
    pub minor1: Option<u64>,
    pub minor2: Option<u64>,
    pub minor3: Option<u64>,
    pub alpha: AlphaKind,
    pub alpha_version: Option<u64>,
    pub is_prerelease: bool,
    pub prerelease_version: Option<u64>,
    /// Alpha/beta marker trailing a `pre` suffix, as in `1.1pre1a`
    pub prerelease_alpha: AlphaKind,
}

impl VersionRecord {
    /// Parse a version string. Unparseable input yields a record with every
    /// field unset, whose order key is `0`.
    pub fn parse(version: &str) -> Self {
        PARSED.get_or_insert_with(version, || Self::parse_uncached(version))
    }

    fn parse_uncached(version: &str) -> Self {
        let Some(caps) = VERSION_RE.captures(version) else {
            return Self::default();
        };

        let number = |name: &str| -> Option<u64> {
            caps.name(name)
                .map(|m| m.as_str())
                .filter(|s| !s.is_empty())
                // Digit runs too long for u64 saturate; they are clamped when encoded anyway
                .map(|s| s.parse().unwrap_or(u64::MAX))
        };
        let marker = |name: &str| -> Option<AlphaKind> {
            caps.name(name).map(|m| AlphaKind::from_marker(Some(m.as_str())))
        };

        Self {
            major: number("major"),
            minor1: number("minor1"),
            minor2: number("minor2"),
            minor3: number("minor3"),
            alpha: marker("alpha").unwrap_or_default(),
            alpha_version: number("alpha_ver"),
            is_prerelease: caps.name("pre").is_some(),
            prerelease_version: number("pre_ver"),
            prerelease_alpha: marker("pre_alpha").unwrap_or_default(),
        }
    }

    /// True when the input did not match the version grammar at all
    pub fn is_unparsed(&self) -> bool {
        self.major.is_none()
    }

    /// Order-preserving integer encoding of this version
    pub fn order_key(&self) -> u128 {
        if self.is_unparsed() {
            return 0;
        }

        let field = |value: Option<u64>| u128::from(value.unwrap_or(0).min(FIELD_MAX));
        let shift = |key: u128, digits: u32, value: u128| key * 10u128.pow(digits) + value;

        let mut key = u128::from(self.major.unwrap_or(0).min(MAJOR_MAX));
        key = shift(key, FIELD_WIDTH, field(self.minor1));
        key = shift(key, FIELD_WIDTH, field(self.minor2));
        key = shift(key, FIELD_WIDTH, field(self.minor3));
        key = shift(key, 1, self.alpha.digit());
        key = shift(key, FIELD_WIDTH, field(self.alpha_version));
        key = shift(key, 1, if self.is_prerelease { 0 } else { 1 });
        key = shift(key, FIELD_WIDTH, field(self.prerelease_version));
        shift(key, 1, self.prerelease_alpha.digit())
    }

    /// Minimal display form, with build cruft and zero components removed.
    ///
    /// The `pre` suffix is only rendered when a nonzero alpha/beta version is
    /// present too (`4.0b2pre1` keeps it, `1.0pre1` renders as `1.0`).
    pub fn simplified(&self) -> String {
        let nonzero = |value: Option<u64>| value.filter(|&v| v != 0);

        let mut out = format!("{}.{}", self.major.unwrap_or(0), self.minor1.unwrap_or(0));
        for minor in [self.minor2, self.minor3].into_iter().filter_map(nonzero) {
            out.push('.');
            out.push_str(&minor.to_string());
        }

        let Some(alpha_version) = nonzero(self.alpha_version) else {
            return out;
        };

        if self.alpha != AlphaKind::None {
            out.push_str(self.alpha.as_str());
            out.push_str(&alpha_version.to_string());
        }

        if self.is_prerelease {
            out.push_str("pre");
            if let Some(pre_version) = nonzero(self.prerelease_version) {
                out.push_str(&pre_version.to_string());
            }
            out.push_str(self.prerelease_alpha.as_str());
        }

        out
    }

    /// Beta builds; nightlies carrying a `b` marker are not betas
    pub fn is_beta(&self) -> bool {
        self.alpha == AlphaKind::Beta && !self.is_nightly()
    }

    pub fn is_nightly(&self) -> bool {
        self.is_prerelease
    }

    pub fn is_release(&self) -> bool {
        !(self.is_beta() || self.is_nightly())
    }
}

/// A version string together with its parsed record.
///
/// Equality, ordering and hashing use only the order key, so `1.1pre` and
/// `1.1pre0` are the same version.
#[derive(Debug, Clone)]
pub struct Version {
    raw: String,
    record: VersionRecord,
}

impl Version {
    pub fn parse(version: &str) -> Self {
        Self {
            raw: version.to_string(),
            record: VersionRecord::parse(version),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn record(&self) -> &VersionRecord {
        &self.record
    }

    pub fn order_key(&self) -> u128 {
        self.record.order_key()
    }

    pub fn simplified(&self) -> String {
        self.record.simplified()
    }

    pub fn is_beta(&self) -> bool {
        self.record.is_beta()
    }

    pub fn is_nightly(&self) -> bool {
        self.record.is_nightly()
    }

    pub fn is_release(&self) -> bool {
        self.record.is_release()
    }
}

impl FromStr for Version {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.order_key() == other.order_key()
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.order_key().cmp(&other.order_key())
    }
}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.order_key().hash(state);
    }
}

/// Order key of a version string; `0` for unparseable input
pub fn order_key(version: &str) -> u128 {
    VersionRecord::parse(version).order_key()
}

/// Strip cruft like `build1`, which never shows up in a UA string, by parsing
/// and re-rendering the version
pub fn simplify(version: &str) -> String {
    VersionRecord::parse(version).simplified()
}

/// Compare two version strings
pub fn compare(a: &str, b: &str) -> Ordering {
    order_key(a).cmp(&order_key(b))
}
