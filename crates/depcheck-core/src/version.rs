//! Version relations and the version-comparison oracle contract.
//!
//! The engine never parses or compares version strings itself — §6 of the
//! design spec calls this out explicitly as an external collaborator with
//! an opaque three-way comparison contract. [`VersionOracle`] is that
//! contract; everything in this crate that evaluates a versioned
//! [`Relation`] is generic over it (or takes `&dyn VersionOracle`) rather
//! than assuming any particular version grammar.

use std::cmp::Ordering;
use std::fmt;

/// A dependency/conflict version relation.
///
/// Mirrors the reference implementation's `dependency_relation` enum
/// (`dr_NOOP, dr_LT, dr_LTEQ, dr_EQ, dr_GTEQ, dr_GT`) as a small closed sum
/// type rather than a dynamically dispatched comparator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    /// No version constraint; matches any provider regardless of version.
    Any,
    Lt,
    Le,
    Eq,
    Ge,
    Gt,
}

impl Relation {
    /// Does `candidate_version op required_version` hold?
    ///
    /// A provider with no concrete version (`candidate_version == None`,
    /// i.e. a pure virtual provides-entry) never satisfies a versioned
    /// relation — only `Relation::Any` matches it.
    #[must_use]
    pub fn matches(
        self,
        candidate_version: Option<&str>,
        required_version: &str,
        oracle: &dyn VersionOracle,
    ) -> bool {
        if self == Self::Any {
            return true;
        }
        let Some(candidate) = candidate_version else {
            return false;
        };
        let ordering = oracle.compare(candidate, required_version);
        match self {
            Self::Any => unreachable!(),
            Self::Lt => ordering == Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
            Self::Eq => ordering == Ordering::Equal,
            Self::Ge => ordering != Ordering::Less,
            Self::Gt => ordering == Ordering::Greater,
        }
    }
}

impl fmt::Display for Relation {
    /// Canonical display spelling, matching the reference implementation's
    /// `dependency_relation_sym[]` table. Note this is the *canonical*
    /// spelling used for output, not necessarily the spelling a parser
    /// accepted on input (the grammar also accepts legacy `<`/`>` as
    /// aliases for `<=`/`>=`).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sym = match self {
            Self::Any => "",
            Self::Lt => "<<",
            Self::Le => "<=",
            Self::Eq => "=",
            Self::Ge => ">=",
            Self::Gt => ">>",
        };
        write!(f, "{sym}")
    }
}

/// The external version-comparison collaborator.
///
/// Implementations need only provide a total three-way comparison; the
/// engine makes no assumption about epoch/upstream/revision structure
/// beyond what `compare` reports.
pub trait VersionOracle {
    /// Compare two version strings, returning their ordering.
    fn compare(&self, left: &str, right: &str) -> Ordering;
}

/// A reference `VersionOracle` implementing the classic epoch:upstream-revision
/// comparison used by Debian-family distributions, for use in tests and
/// examples. Production callers are expected to supply their own oracle
/// backed by whatever version grammar their distribution actually uses.
#[derive(Debug, Clone, Copy, Default)]
pub struct DebianLikeVersionOracle;

impl VersionOracle for DebianLikeVersionOracle {
    fn compare(&self, left: &str, right: &str) -> Ordering {
        let (left_epoch, left_rest) = split_epoch(left);
        let (right_epoch, right_rest) = split_epoch(right);
        if left_epoch != right_epoch {
            return left_epoch.cmp(&right_epoch);
        }

        let (left_upstream, left_revision) = split_revision(left_rest);
        let (right_upstream, right_revision) = split_revision(right_rest);

        match compare_version_part(left_upstream, right_upstream) {
            Ordering::Equal => compare_version_part(left_revision, right_revision),
            other => other,
        }
    }
}

fn split_epoch(version: &str) -> (u64, &str) {
    match version.split_once(':') {
        Some((epoch, rest)) => (epoch.parse().unwrap_or(0), rest),
        None => (0, version),
    }
}

fn split_revision(rest: &str) -> (&str, &str) {
    match rest.rfind('-') {
        Some(idx) => (&rest[..idx], &rest[idx + 1..]),
        None => (rest, ""),
    }
}

/// Compare two version components using the dpkg algorithm: alternating
/// runs of non-digits (compared lexically, with `~` sorting before
/// everything, even the empty string) and digits (compared numerically).
fn compare_version_part(left: &str, right: &str) -> Ordering {
    let mut left = left.chars().peekable();
    let mut right = right.chars().peekable();

    loop {
        let mut left_alpha = String::new();
        while let Some(&c) = left.peek() {
            if c.is_ascii_digit() {
                break;
            }
            left_alpha.push(c);
            left.next();
        }
        let mut right_alpha = String::new();
        while let Some(&c) = right.peek() {
            if c.is_ascii_digit() {
                break;
            }
            right_alpha.push(c);
            right.next();
        }
        match compare_alpha_runs(&left_alpha, &right_alpha) {
            Ordering::Equal => {}
            other => return other,
        }

        if left.peek().is_none() && right.peek().is_none() {
            return Ordering::Equal;
        }

        let mut left_digits = String::new();
        while let Some(&c) = left.peek() {
            if !c.is_ascii_digit() {
                break;
            }
            left_digits.push(c);
            left.next();
        }
        let mut right_digits = String::new();
        while let Some(&c) = right.peek() {
            if !c.is_ascii_digit() {
                break;
            }
            right_digits.push(c);
            right.next();
        }
        let left_num: u64 = left_digits.parse().unwrap_or(0);
        let right_num: u64 = right_digits.parse().unwrap_or(0);
        match left_num.cmp(&right_num) {
            Ordering::Equal => {}
            other => return other,
        }

        if left.peek().is_none() && right.peek().is_none() {
            return Ordering::Equal;
        }
    }
}

/// `~` sorts before everything, including the end of the string, so that
/// e.g. `1.0~beta1 < 1.0`.
fn compare_alpha_runs(left: &str, right: &str) -> Ordering {
    let mut left_chars = left.chars();
    let mut right_chars = right.chars();
    loop {
        let l = left_chars.next();
        let r = right_chars.next();
        if l.is_none() && r.is_none() {
            return Ordering::Equal;
        }
        let rank = |c: Option<char>| match c {
            None => 1,
            Some('~') => -1,
            Some(c) => i32::try_from(u32::from(c)).unwrap_or(i32::MAX) + 2,
        };
        match rank(l).cmp(&rank(r)) {
            Ordering::Equal => {}
            other => return other,
        }
    }
}
