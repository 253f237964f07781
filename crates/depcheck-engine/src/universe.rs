//! The installability universe: one architecture's worth of collected
//! packages plus the virtual-package (provides) index used to resolve
//! dependency atoms to candidate packages.
//!
//! Grounded in the reference implementation's `dpkg_packages` /
//! `dpkg_collected_package` / `virtualpkgtbl`: a package table keyed by
//! name, a parallel virtual-package table mapping every provided name
//! (including a package's own name, against its own version) to the set
//! of collected packages offering it, and per-package `installed`,
//! `conflicted`, `installable`, `mayaffect` bookkeeping used by the
//! solver.

use crate::config::SolverConfig;
use crate::solver;
use ahash::AHashMap;
use depcheck_core::arena::DEFAULT_BLOCK_CAPACITY;
use depcheck_core::{Atom, Clause, Error, ObjectArena, Package, Relation, Result, SlotId, Symbol, VersionOracle};
use std::sync::Arc;
use tracing::debug;

/// Whether a collected package is known installable.
///
/// There is no `No` variant: the reference implementation's comment on
/// `dpkg_collected_package.installable` explains why — a negative result
/// can't be cached across a mutation to the universe (adding a package
/// elsewhere might open up a path that didn't exist before), but a
/// positive one can, because of the `mayaffect` invalidation list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Installability {
    Unknown,
    Yes,
}

/// A package together with the solver's working state for it.
#[derive(Debug)]
pub struct CollectedPackage {
    pub pkg: Arc<Package>,
    pub installed: u32,
    pub conflicted: u32,
    pub installability: Installability,
    /// Names of packages whose installability was established while this
    /// package was part of the witness install set; cleared back to
    /// `Unknown` if this package is ever removed.
    pub mayaffect: Vec<Symbol>,
}

impl CollectedPackage {
    fn new(pkg: Arc<Package>) -> Self {
        Self {
            pkg,
            installed: 0,
            conflicted: 0,
            installability: Installability::Unknown,
            mayaffect: Vec::new(),
        }
    }
}

/// Maps a provided name (real or virtual) to every collected package that
/// offers it, paired with the version offered under that name (`None` for
/// a pure virtual `Provides`, `Some` for a package's own real name).
pub type VirtualIndex = AHashMap<Symbol, Vec<(SlotId, Option<Symbol>)>>;

/// One architecture's collected packages.
#[derive(Debug)]
pub struct Universe {
    arch: String,
    packages: ObjectArena<CollectedPackage>,
    index: AHashMap<Symbol, SlotId>,
    virtual_index: VirtualIndex,
}

impl Universe {
    /// Create an empty universe for the given architecture.
    #[must_use]
    pub fn new(arch: impl Into<String>) -> Self {
        Self {
            arch: arch.into(),
            packages: ObjectArena::new(DEFAULT_BLOCK_CAPACITY),
            index: AHashMap::new(),
            virtual_index: VirtualIndex::default(),
        }
    }

    /// The architecture this universe was built for.
    #[must_use]
    pub fn arch(&self) -> &str {
        &self.arch
    }

    /// Number of packages currently collected.
    #[must_use]
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Add a binary package to the universe.
    ///
    /// A no-op if a package of the same name is already present, matching
    /// `add_package`'s silent-ignore behaviour.
    pub fn add_binary(&mut self, pkg: Arc<Package>) {
        if self.index.contains_key(&pkg.name) {
            return;
        }
        let name = pkg.name;
        let version = pkg.version;
        let provides = pkg.provides.clone();
        let slot = self.packages.insert(CollectedPackage::new(pkg));
        self.index.insert(name, slot);
        self.virtual_index.entry(name).or_default().push((slot, Some(version)));
        for provided in provides {
            self.virtual_index.entry(provided).or_default().push((slot, None));
        }
    }

    /// Remove a binary package from the universe by name.
    ///
    /// Matches `remove_package`: every package on the removed package's
    /// `mayaffect` list has its cached installability invalidated back to
    /// `Unknown`, since the witness install set that proved it
    /// installable may have depended on the package now being removed.
    ///
    /// Returns whether a package of this name was actually present (and
    /// so actually removed) — `false` is a no-op, matching
    /// `remove_binary; remove_binary` idempotence.
    pub fn remove_binary(&mut self, name: Symbol) -> bool {
        let Some(&slot) = self.index.get(&name) else {
            return false;
        };
        let Some(cpkg) = self.packages.get(slot) else {
            return false;
        };
        let mayaffect = cpkg.mayaffect.clone();
        let provides = cpkg.pkg.provides.clone();
        for affected in mayaffect {
            if let Some(&affected_slot) = self.index.get(&affected) {
                if let Some(cpkg) = self.packages.get_mut(affected_slot) {
                    cpkg.installability = Installability::Unknown;
                }
            }
        }

        self.index.remove(&name);
        self.packages.remove(slot);
        retain_provider(&mut self.virtual_index, name, slot);
        for provided in provides {
            retain_provider(&mut self.virtual_index, provided, slot);
        }
        true
    }

    /// Is a package of this name present?
    #[must_use]
    pub fn is_present(&self, name: Symbol) -> bool {
        self.index.contains_key(&name)
    }

    /// Names of every package currently collected, sorted by their
    /// resolved string form.
    #[must_use]
    pub fn packages(&self, resolve: impl Fn(Symbol) -> String) -> Vec<Symbol> {
        let mut names: Vec<Symbol> = self.index.keys().copied().collect();
        names.sort_by_key(|&name| resolve(name));
        names
    }

    /// The source package name a binary was built from.
    pub fn get_source(&self, name: Symbol, resolve: impl Fn(Symbol) -> String) -> Result<Symbol> {
        self.slot_of(name)
            .and_then(|slot| self.get(slot))
            .map(|cpkg| cpkg.pkg.source)
            .ok_or_else(|| Error::unknown_package(resolve(name)))
    }

    /// The version of the source package a binary was built from.
    pub fn get_source_version(&self, name: Symbol, resolve: impl Fn(Symbol) -> String) -> Result<Symbol> {
        self.slot_of(name)
            .and_then(|slot| self.get(slot))
            .map(|cpkg| cpkg.pkg.source_version)
            .ok_or_else(|| Error::unknown_package(resolve(name)))
    }

    /// Is the named binary architecture-independent (`Architecture: all`)?
    pub fn is_arch_all(&self, name: Symbol, resolve: impl Fn(Symbol) -> String) -> Result<bool> {
        self.slot_of(name)
            .and_then(|slot| self.get(slot))
            .map(|cpkg| cpkg.pkg.arch_all)
            .ok_or_else(|| Error::unknown_package(resolve(name)))
    }

    /// Look up a collected package by slot.
    #[must_use]
    pub fn get(&self, slot: SlotId) -> Option<&CollectedPackage> {
        self.packages.get(slot)
    }

    #[must_use]
    pub(crate) fn get_mut(&mut self, slot: SlotId) -> Option<&mut CollectedPackage> {
        self.packages.get_mut(slot)
    }

    /// Look up a collected package by name.
    #[must_use]
    pub fn slot_of(&self, name: Symbol) -> Option<SlotId> {
        self.index.get(&name).copied()
    }

    /// The version of the named package.
    pub fn get_version(&self, name: Symbol, resolve: impl Fn(Symbol) -> String) -> Result<Symbol> {
        self.slot_of(name)
            .and_then(|slot| self.get(slot))
            .map(|cpkg| cpkg.pkg.version)
            .ok_or_else(|| Error::unknown_package(resolve(name)))
    }

    /// Every package offering `atom.package` whose version (if the atom
    /// is versioned) satisfies `atom.relation`.
    ///
    /// Mirrors `get_matching_low`: walks every provider of the named
    /// virtual (or real) package and keeps the ones whose version
    /// satisfies the relation, treating an unversioned relation as always
    /// satisfied and a provider with no concrete version (a pure
    /// `Provides`) as never satisfying a versioned relation.
    pub fn matching(&self, atom: &Atom, resolve: impl Fn(Symbol) -> String, oracle: &dyn VersionOracle) -> Vec<SlotId> {
        let Some(providers) = self.virtual_index.get(&atom.package) else {
            return Vec::new();
        };
        let required = atom.version.map(|sym| resolve(sym));
        providers
            .iter()
            .filter(|(_, version)| {
                let candidate = version.map(|sym| resolve(sym));
                match &required {
                    None => true,
                    Some(required) => atom.relation.matches(candidate.as_deref(), required, oracle),
                }
            })
            .map(|(slot, _)| *slot)
            .collect()
    }

    /// Every slot that satisfies at least one alternative in `clause`.
    pub fn matching_clause(&self, clause: &Clause, resolve: impl Fn(Symbol) -> String + Copy, oracle: &dyn VersionOracle) -> Vec<SlotId> {
        clause.iter().flat_map(|atom| self.matching(atom, resolve, oracle)).collect()
    }

    /// Dependency clauses of `name` that currently have no candidate at
    /// all, for the given set of binding kinds.
    ///
    /// Mirrors `checkunsatisfiabledeps`, scoped to a single package rather
    /// than a whole distribution's worth of `deplistlist`s.
    pub fn unsatisfiable_deps(
        &self,
        name: Symbol,
        config: &SolverConfig,
        resolve: impl Fn(Symbol) -> String + Copy,
        oracle: &dyn VersionOracle,
    ) -> Result<Vec<Clause>> {
        let slot = self.slot_of(name).ok_or_else(|| Error::unknown_package(resolve(name)))?;
        let pkg = self.get(slot).expect("slot_of returned a live slot").pkg.clone();
        let mut unsatisfiable = Vec::new();
        for kind in depcheck_core::DepKind::ALL {
            if !config.active_kinds.contains(kind) {
                continue;
            }
            for clause in pkg.clauses(kind) {
                if self.matching_clause(clause, resolve, oracle).is_empty() {
                    unsatisfiable.push(clause.clone());
                }
            }
        }
        Ok(unsatisfiable)
    }

    /// Is `name` installable in this universe, under `config`?
    pub fn is_installable(
        &mut self,
        name: Symbol,
        config: &SolverConfig,
        resolve: impl Fn(Symbol) -> String + Copy,
        oracle: &dyn VersionOracle,
    ) -> Result<solver::Installability> {
        let slot = self.slot_of(name).ok_or_else(|| Error::unknown_package(resolve(name)))?;
        debug!(package = %resolve(name), "checking installability");
        solver::check_installable(self, &[slot], config, resolve, oracle)
    }
}

fn retain_provider(virtual_index: &mut VirtualIndex, name: Symbol, slot: SlotId) {
    if let Some(providers) = virtual_index.get_mut(&name) {
        providers.retain(|(s, _)| *s != slot);
        if providers.is_empty() {
            virtual_index.remove(&name);
        }
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use depcheck_core::Interner;
    use proptest::prelude::*;

    fn package(interner: &mut Interner, name: &str) -> Arc<Package> {
        let name = interner.intern(name);
        let version = interner.intern("1.0");
        Arc::new(Package {
            name,
            version,
            source: name,
            source_version: version,
            priority: 0,
            arch_all: false,
            depends: [vec![], vec![], vec![], vec![]],
            conflicts: vec![],
            provides: vec![],
        })
    }

    proptest! {
        /// Adding a package and immediately removing it always returns the
        /// universe to empty, for any package name — the add/remove
        /// idempotence law.
        #[test]
        fn add_then_remove_restores_emptiness(name in "[a-z][a-z0-9-]{0,12}") {
            let mut interner = Interner::new();
            let mut universe = Universe::new("amd64");
            let pkg = package(&mut interner, &name);
            let sym = pkg.name;

            universe.add_binary(pkg);
            prop_assert!(universe.is_present(sym));
            prop_assert!(universe.remove_binary(sym));
            prop_assert!(universe.is_empty());
            prop_assert!(!universe.is_present(sym));
        }

        /// Removing a name that was never added is always a no-op,
        /// regardless of how many times it's repeated.
        #[test]
        fn removing_an_absent_name_is_always_false(name in "[a-z][a-z0-9-]{0,12}", repeats in 1u32..5) {
            let mut interner = Interner::new();
            let mut universe = Universe::new("amd64");
            let sym = interner.intern(&name);
            for _ in 0..repeats {
                prop_assert!(!universe.remove_binary(sym));
            }
        }

        /// Adding the same package name twice never grows the universe
        /// past one entry, whatever the name.
        #[test]
        fn adding_a_duplicate_name_never_grows_the_universe(name in "[a-z][a-z0-9-]{0,12}") {
            let mut interner = Interner::new();
            let mut universe = Universe::new("amd64");
            universe.add_binary(package(&mut interner, &name));
            universe.add_binary(package(&mut interner, &name));
            prop_assert_eq!(universe.len(), 1);
        }
    }
}
