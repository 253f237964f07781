//! The binary package data model: dependency kinds, version atoms, and the
//! `Package` record itself.
//!
//! Grounded directly in the reference implementation's `dpkg_package`
//! struct (`package`, `version`, `source`, `source_ver`, `priority`,
//! `arch_all`, `depends[4]`, `conflicts`, `provides`) — the field layout
//! below is a one-to-one translation, minus the free-text details
//! paragraph, which nothing in the installability/migration hard core
//! ever reads.

use crate::intern::Symbol;
use crate::version::Relation;
use smallvec::SmallVec;

/// Which dependency field a clause came from.
///
/// The reference implementation keeps four parallel `deplistlist`
/// pointers (`depends[4]`) indexed by an implicit `dr_*`-adjacent
/// ordering; `DepKind` gives that ordering a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DepKind {
    PreDepends = 0,
    Depends = 1,
    Recommends = 2,
    Suggests = 3,
}

impl DepKind {
    /// All four kinds, in field order.
    pub const ALL: [Self; 4] = [Self::PreDepends, Self::Depends, Self::Recommends, Self::Suggests];

    const fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

/// A bitmask over [`DepKind`], selecting which dependency fields the
/// solver treats as binding.
///
/// This is the configurable counterpart to the reference implementation's
/// hardcoded choice to only ever walk `depends[dep_PreDepends]` and
/// `depends[dep_Depends]` — see the crate-level design notes for why that
/// got turned into a runtime setting rather than staying a compile-time
/// constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepKindMask(u8);

impl DepKindMask {
    /// An empty mask: no dependency kind is considered binding.
    #[must_use]
    pub const fn none() -> Self {
        Self(0)
    }

    /// A mask containing exactly the given kinds.
    #[must_use]
    pub fn of(kinds: &[DepKind]) -> Self {
        let mut mask = 0;
        for kind in kinds {
            mask |= kind.bit();
        }
        Self(mask)
    }

    /// Is `kind` set in this mask?
    #[must_use]
    pub const fn contains(self, kind: DepKind) -> bool {
        self.0 & kind.bit() != 0
    }

    /// Add `kind` to the mask, returning the updated mask.
    #[must_use]
    pub const fn with(self, kind: DepKind) -> Self {
        Self(self.0 | kind.bit())
    }
}

impl Default for DepKindMask {
    /// Pre-Depends and Depends are binding; Recommends and Suggests are
    /// not — matching the reference implementation's hardcoded choice of
    /// which dependency fields `checkinstallable` actually walks.
    fn default() -> Self {
        Self::of(&[DepKind::PreDepends, DepKind::Depends])
    }
}

/// One `package (relation version)` atom inside a dependency or conflict
/// clause.
///
/// Mirrors the reference implementation's `dependency` struct
/// (`package`, `op`, `version`), with the package name and version
/// interned rather than heap-allocated per atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Atom {
    /// The named package (may be a virtual/provides-only name).
    pub package: Symbol,
    /// The version relation to test against `version`.
    pub relation: Relation,
    /// The required version, meaningless when `relation` is `Relation::Any`.
    pub version: Option<Symbol>,
}

impl Atom {
    /// An atom with no version constraint at all.
    #[must_use]
    pub const fn unversioned(package: Symbol) -> Self {
        Self {
            package,
            relation: Relation::Any,
            version: None,
        }
    }
}

/// An OR-clause of alternative atoms, any one of which satisfies the
/// dependency.
///
/// A `SmallVec` because the overwhelming majority of real-world clauses
/// are a single atom or a short `a | b` alternation; this mirrors the
/// reference implementation's `deplist` (a `LIST` of `dependency*`) one
/// level down from `deplistlist`.
pub type Clause = SmallVec<[Atom; 4]>;

/// A binary package, as carried by a [`crate::source::Source`].
///
/// One-to-one with the reference implementation's `dpkg_package`, minus
/// the `details` paragraph (parsing/raw-field storage is out of scope for
/// this crate; see the design notes on that trim).
#[derive(Debug, Clone)]
pub struct Package {
    /// The binary package name.
    pub name: Symbol,
    /// The binary package's own version.
    pub version: Symbol,
    /// The name of the source package this binary was built from.
    pub source: Symbol,
    /// The version of the source package this binary was built from.
    pub source_version: Symbol,
    /// Lower is more important, matching the reference implementation's
    /// raw priority ordinal.
    pub priority: i32,
    /// True for an architecture-independent ("Architecture: all") binary.
    pub arch_all: bool,
    /// One clause list per [`DepKind`], indexed by `DepKind as usize`.
    pub depends: [Vec<Clause>; 4],
    /// Flat list of conflicting atoms (conflicts have no OR-alternation).
    pub conflicts: Vec<Atom>,
    /// Virtual package names this binary provides, unversioned.
    pub provides: Vec<Symbol>,
}

impl Package {
    /// The clauses for a given dependency kind.
    #[must_use]
    pub fn clauses(&self, kind: DepKind) -> &[Clause] {
        &self.depends[kind as usize]
    }
}
