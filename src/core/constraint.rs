//! Version requirement parsing and evaluation.
//!
//! A requirement string is a package name followed by zero or more
//! comparator clauses, e.g. `raibo_msgs>=1.0.0,<2.0.0`. Clauses are ANDed
//! and evaluated with strict semantic-version precedence, so a pre-release
//! sorts before the release with the same numeric tuple.

use std::fmt;
use std::str::FromStr;

use semver::Version;
use thiserror::Error;

/// Error produced when a requirement string cannot be parsed.
#[derive(Debug, Clone, Error)]
pub enum ConstraintError {
    #[error("malformed constraint `{text}`: expected comparator+version clauses")]
    Malformed { text: String },

    #[error("malformed requirement `{text}`: missing package name")]
    MissingName { text: String },
}

/// A single comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl Comparator {
    fn matches(self, candidate: &Version, bound: &Version) -> bool {
        match self {
            Comparator::Eq => candidate == bound,
            Comparator::Ne => candidate != bound,
            Comparator::Gt => candidate > bound,
            Comparator::Ge => candidate >= bound,
            Comparator::Lt => candidate < bound,
            Comparator::Le => candidate <= bound,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Comparator::Eq => "==",
            Comparator::Ne => "!=",
            Comparator::Gt => ">",
            Comparator::Ge => ">=",
            Comparator::Lt => "<",
            Comparator::Le => "<=",
        }
    }
}

/// One `comparator version` clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub cmp: Comparator,
    pub version: Version,
}

/// An ANDed set of comparator clauses. An empty set is valid and matches
/// every version ("any version >= 0.0.0").
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstraintSet {
    clauses: Vec<Clause>,
}

impl ConstraintSet {
    /// The unconstrained set.
    pub fn any() -> Self {
        ConstraintSet::default()
    }

    /// Parse a constraint expression like `>=1.0.0,<2.0.0`.
    ///
    /// Empty (or whitespace-only) input is valid and unconstrained.
    pub fn parse(text: &str) -> Result<Self, ConstraintError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(ConstraintSet::any());
        }

        let mut clauses = Vec::new();
        for token in trimmed.split(',') {
            clauses.push(parse_clause(token).ok_or_else(|| ConstraintError::Malformed {
                text: text.to_string(),
            })?);
        }

        Ok(ConstraintSet { clauses })
    }

    /// Whether no clauses constrain the version.
    pub fn is_unconstrained(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Check a concrete version against every clause.
    pub fn satisfies(&self, version: &Version) -> bool {
        self.clauses
            .iter()
            .all(|c| c.cmp.matches(version, &c.version))
    }

    /// Pick the best version from `candidates`, each tagged with its
    /// prerelease flag as reported by the release feed.
    ///
    /// Returns the highest satisfying version. Prereleases are only
    /// eligible when `allow_prerelease` is set.
    pub fn select_best(
        &self,
        candidates: &[(Version, bool)],
        allow_prerelease: bool,
    ) -> Option<Version> {
        candidates
            .iter()
            .filter(|(_, prerelease)| allow_prerelease || !prerelease)
            .filter(|(version, _)| self.satisfies(version))
            .map(|(version, _)| version)
            .max()
            .cloned()
    }
}

impl fmt::Display for ConstraintSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.clauses.is_empty() {
            return write!(f, "*");
        }
        for (i, clause) in self.clauses.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}{}", clause.cmp.as_str(), clause.version)?;
        }
        Ok(())
    }
}

impl FromStr for ConstraintSet {
    type Err = ConstraintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConstraintSet::parse(s)
    }
}

fn parse_clause(token: &str) -> Option<Clause> {
    let token = token.trim();

    let (cmp, rest) = if let Some(rest) = token.strip_prefix(">=") {
        (Comparator::Ge, rest)
    } else if let Some(rest) = token.strip_prefix("<=") {
        (Comparator::Le, rest)
    } else if let Some(rest) = token.strip_prefix("==") {
        (Comparator::Eq, rest)
    } else if let Some(rest) = token.strip_prefix("!=") {
        (Comparator::Ne, rest)
    } else if let Some(rest) = token.strip_prefix('>') {
        (Comparator::Gt, rest)
    } else if let Some(rest) = token.strip_prefix('<') {
        (Comparator::Lt, rest)
    } else if let Some(rest) = token.strip_prefix('=') {
        (Comparator::Eq, rest)
    } else {
        return None;
    };

    let version = parse_version_lenient(rest.trim())?;
    Some(Clause { cmp, version })
}

/// A parsed requirement string: package name plus constraint set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencySpec {
    pub name: String,
    pub constraint: ConstraintSet,
}

impl DependencySpec {
    /// Parse a requirement token like `raibo_msgs>=1.0.0,<2.0.0` or `raibo`.
    pub fn parse(token: &str) -> Result<Self, ConstraintError> {
        let trimmed = token.trim();

        let name_end = trimmed
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.'))
            .unwrap_or(trimmed.len());

        let name = &trimmed[..name_end];
        if name.is_empty() {
            return Err(ConstraintError::MissingName {
                text: token.to_string(),
            });
        }

        let constraint = ConstraintSet::parse(&trimmed[name_end..])?;

        Ok(DependencySpec {
            name: name.to_string(),
            constraint,
        })
    }
}

impl fmt::Display for DependencySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.constraint.is_unconstrained() {
            write!(f, "{}", self.constraint)?;
        }
        Ok(())
    }
}

/// Parse a version string, allowing for a `v` prefix and incomplete
/// versions like `1.2`.
pub fn parse_version_lenient(s: &str) -> Option<Version> {
    let s = s.trim().trim_start_matches(['v', 'V']);

    if let Ok(v) = s.parse() {
        return Some(v);
    }

    // Try adding missing components
    let parts: Vec<&str> = s.split('.').collect();
    match parts.len() {
        1 => {
            let major: u64 = parts[0].parse().ok()?;
            Some(Version::new(major, 0, 0))
        }
        2 => {
            let major: u64 = parts[0].parse().ok()?;
            let minor: u64 = parts[1].parse().ok()?;
            Some(Version::new(major, minor, 0))
        }
        _ => None,
    }
}
