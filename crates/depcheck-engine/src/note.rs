//! The suite note: one [`Universe`] per architecture, a table of which
//! source package currently owns which binaries, and an undo journal of
//! snapshots taken before each mutating operation.
//!
//! Grounded in the reference implementation's `dpkg_sources_note` /
//! `dpkg_source_note` / the `upgrade_source`, `upgrade_arch`,
//! `remove_source`, `undo_change`, `commit_changes` family of functions.

use crate::universe::Universe;
use depcheck_core::{Error, Package, Result, Symbol};
use ahash::AHashMap;
use std::sync::Arc;
use tracing::info;

/// A snapshot of one source package's binaries at the time it was last
/// touched, kept around so an in-progress batch of operations can be
/// rolled back.
///
/// `binaries = None` is the sentinel the reference implementation spells
/// as `srcn->binaries == NULL`: it means there was no prior source note
/// for this name at all (the source is new to the suite), as opposed to
/// `Some(vec![vec![], ...])`, which means the source existed but happened
/// to have zero binaries on every architecture.
#[derive(Debug, Clone)]
struct SourceNote {
    source: Symbol,
    /// One binary list per architecture, or `None` for the "never
    /// existed before" sentinel.
    binaries: Option<Vec<Vec<Arc<Package>>>>,
}

/// One mutating operation's worth of saved [`SourceNote`]s, the unit the
/// undo journal is a stack of.
type UndoOp = Vec<SourceNote>;

/// The full suite: a [`Universe`] per architecture plus the undo journal.
#[derive(Debug)]
pub struct SuiteNote {
    arch_names: Vec<String>,
    universes: Vec<Universe>,
    /// Current binaries owned by each source, by source name.
    sources: AHashMap<Symbol, Vec<Vec<Arc<Package>>>>,
    /// Which source currently owns each binary name, across every
    /// architecture. Kept in lockstep with `sources` and the universes so
    /// collisions can be detected by name alone, without scanning every
    /// source's binary lists.
    binary_owner: AHashMap<Symbol, Symbol>,
    undo: Vec<UndoOp>,
}

impl SuiteNote {
    /// Create a suite note for the given architectures, each starting
    /// with an empty universe.
    #[must_use]
    pub fn new(arches: &[&str]) -> Self {
        let arch_names: Vec<String> = arches.iter().map(|s| (*s).to_string()).collect();
        let universes = arch_names.iter().map(|a| Universe::new(a.clone())).collect();
        Self {
            arch_names,
            universes,
            sources: AHashMap::new(),
            binary_owner: AHashMap::new(),
            undo: Vec::new(),
        }
    }

    /// The per-architecture universes.
    #[must_use]
    pub fn universes(&self) -> &[Universe] {
        &self.universes
    }

    /// Mutable access to a single architecture's universe, by index.
    pub fn universe_mut(&mut self, arch_index: usize) -> Option<&mut Universe> {
        self.universes.get_mut(arch_index)
    }

    fn arch_index(&self, arch: &str) -> Result<usize> {
        self.arch_names
            .iter()
            .position(|a| a == arch)
            .ok_or_else(|| Error::unknown_architecture(arch))
    }

    /// Can the most recent batch of operations be rolled back?
    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    /// Start a new undoable operation.
    fn new_op(&mut self) {
        self.undo.push(Vec::new());
    }

    /// Save `note` into the current operation's undo set, unless a
    /// snapshot of this source was already saved during this operation.
    fn save_source_note(&mut self, note: SourceNote) {
        let current = self.undo.last_mut().expect("new_op called first");
        if current.iter().any(|existing| existing.source == note.source) {
            return;
        }
        current.push(note);
    }

    fn save_empty_source_note(&mut self, source: Symbol) {
        let current = self.undo.last_mut().expect("new_op called first");
        if current.iter().any(|existing| existing.source == source) {
            return;
        }
        current.push(SourceNote { source, binaries: None });
    }

    /// Snapshot `source`'s current, pre-operation state into the active
    /// undo set, whether it already has binaries on record or has never
    /// been seen before. A no-op if this source was already snapshotted
    /// earlier in the same operation (including by a collision steal).
    fn snapshot_current(&mut self, source: Symbol) {
        match self.sources.get(&source).cloned() {
            Some(binaries) => self.save_source_note(SourceNote { source, binaries: Some(binaries) }),
            None => self.save_empty_source_note(source),
        }
    }

    /// Remove `name`'s binaries from `arch_index`. When `skip_arch_all`
    /// is set, architecture-independent binaries are left in place
    /// (matches `remove_binaries_by_arch`'s `SKIP_ARCHALL` mode, used
    /// when only one architecture's binaries are being replaced).
    fn remove_binaries_by_arch(&mut self, binaries: &[Arc<Package>], arch_index: usize, skip_arch_all: bool) -> Vec<Arc<Package>> {
        let mut leftovers = Vec::new();
        for pkg in binaries {
            if skip_arch_all && pkg.arch_all {
                leftovers.push(pkg.clone());
                continue;
            }
            self.universes[arch_index].remove_binary(pkg.name);
            self.binary_owner.remove(&pkg.name);
        }
        leftovers
    }

    /// Add `binaries` to `arch_index` under `owner`, stealing any binary
    /// that's currently owned by a different source first. Mirrors the
    /// reference `add_binaries_by_arch`'s collision detection
    /// (`dpkg.c:1744-1774`): a binary name can only ever belong to one
    /// source at a time, so a second source publishing the same binary
    /// name takes it away from whoever held it.
    fn add_binaries_by_arch(&mut self, binaries: &[Arc<Package>], arch_index: usize, skip_arch_all: bool, owner: Symbol) {
        for pkg in binaries {
            if skip_arch_all && pkg.arch_all {
                continue;
            }
            if let Some(&previous_owner) = self.binary_owner.get(&pkg.name) {
                if previous_owner != owner {
                    self.steal_binary(pkg.name, previous_owner);
                }
            }
            self.universes[arch_index].add_binary(pkg.clone());
            self.binary_owner.insert(pkg.name, owner);
        }
    }

    /// Take `binary_name` away from `previous_owner`: snapshot that
    /// source's pre-theft state into the active undo operation (so an
    /// undo gives the binary back), then remove it from whichever of
    /// `previous_owner`'s architecture lists currently holds it.
    fn steal_binary(&mut self, binary_name: Symbol, previous_owner: Symbol) {
        self.snapshot_current(previous_owner);
        let Some(mut binaries) = self.sources.remove(&previous_owner) else {
            return;
        };
        for (arch_index, per_arch) in binaries.iter_mut().enumerate() {
            if let Some(pos) = per_arch.iter().position(|p| p.name == binary_name) {
                per_arch.remove(pos);
                self.universes[arch_index].remove_binary(binary_name);
                break;
            }
        }
        self.sources.insert(previous_owner, binaries);
    }

    /// Re-add `pkg` under `owner` without running collision detection.
    /// Used only by [`Self::undo_change`]: a rollback restores an
    /// already-consistent past state, so re-running the steal logic
    /// would be redundant at best and could cascade into undoing a
    /// different source's unrelated, already-committed steal at worst.
    fn restore_binary(&mut self, pkg: &Arc<Package>, arch_index: usize, owner: Symbol) {
        self.universes[arch_index].add_binary(pkg.clone());
        self.binary_owner.insert(pkg.name, owner);
    }

    /// Replace every architecture's binaries for `source` with the ones
    /// it now carries. Mirrors `upgrade_source`: the prior source note
    /// (if any) is snapshotted whole before being torn down, and any
    /// binary that moves in from another source steals it from its
    /// previous owner.
    pub fn upgrade_source(&mut self, name: Symbol, per_arch_binaries: Vec<Vec<Arc<Package>>>, resolve: impl Fn(Symbol) -> String + Copy) {
        self.new_op();
        self.snapshot_current(name);

        if let Some(old) = self.sources.remove(&name) {
            for (arch_index, binaries) in old.iter().enumerate() {
                self.remove_binaries_by_arch(binaries, arch_index, false);
            }
        }

        for (arch_index, binaries) in per_arch_binaries.iter().enumerate() {
            self.add_binaries_by_arch(binaries, arch_index, false, name);
        }
        self.sources.insert(name, per_arch_binaries);
        info!(source = %resolve(name), "source upgraded across all architectures");
    }

    /// Replace a single architecture's binaries for `source`, leaving its
    /// architecture-independent binaries alone. Mirrors `upgrade_arch`.
    pub fn upgrade_arch(&mut self, name: Symbol, arch: &str, new_binaries: Vec<Arc<Package>>, resolve: impl Fn(Symbol) -> String + Copy) -> Result<()> {
        let arch_index = self.arch_index(arch)?;
        let existing = self.sources.get(&name).cloned().ok_or_else(|| Error::unknown_source(resolve(name)))?;

        self.new_op();
        self.snapshot_current(name);

        let old_for_arch = existing[arch_index].clone();
        let leftovers = self.remove_binaries_by_arch(&old_for_arch, arch_index, true);
        self.add_binaries_by_arch(&new_binaries, arch_index, true, name);

        let mut updated = existing;
        let mut merged = leftovers;
        merged.extend(new_binaries);
        updated[arch_index] = merged;
        self.sources.insert(name, updated);
        info!(source = %resolve(name), arch, "source upgraded for one architecture");
        Ok(())
    }

    /// Drop a source and every binary it owns, on every architecture.
    /// Mirrors `remove_source`.
    pub fn remove_source(&mut self, name: Symbol, resolve: impl Fn(Symbol) -> String + Copy) -> Result<()> {
        let old = self.sources.remove(&name).ok_or_else(|| Error::unknown_source(resolve(name)))?;
        self.new_op();
        self.snapshot_current(name);
        for (arch_index, binaries) in old.iter().enumerate() {
            self.remove_binaries_by_arch(binaries, arch_index, false);
        }
        info!(source = %resolve(name), "source removed");
        Ok(())
    }

    /// Roll back the most recent operation. Mirrors `undo_change`: this
    /// deliberately bypasses the collision detection `add_binaries_by_arch`
    /// normally performs (see [`Self::restore_binary`]) — restoring a
    /// prior, already-consistent state should not re-trigger theft.
    pub fn undo_change(&mut self) {
        let Some(op) = self.undo.pop() else {
            return;
        };
        for note in op {
            if let Some(current) = self.sources.remove(&note.source) {
                for (arch_index, binaries) in current.iter().enumerate() {
                    self.remove_binaries_by_arch(binaries, arch_index, false);
                }
            }
            match note.binaries {
                None => {}
                Some(binaries) => {
                    for (arch_index, per_arch) in binaries.iter().enumerate() {
                        for pkg in per_arch {
                            self.restore_binary(pkg, arch_index, note.source);
                        }
                    }
                    self.sources.insert(note.source, binaries);
                }
            }
        }
    }

    /// Discard the undo journal, making every operation since the last
    /// commit permanent. Mirrors `commit_changes`.
    pub fn commit_changes(&mut self) {
        self.undo.clear();
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use depcheck_core::Interner;
    use proptest::prelude::*;

    fn package(interner: &mut Interner, name: &str, version: &str) -> Arc<Package> {
        let name = interner.intern(name);
        let version = interner.intern(version);
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
        /// Upgrading a source's binaries and then undoing it always
        /// restores the exact pre-upgrade version string, whatever the
        /// two version numbers were — the undo round-trip law.
        #[test]
        fn undo_round_trips_a_version_bump(v1 in "[0-9]\\.[0-9]", v2 in "[0-9]\\.[0-9]") {
            prop_assume!(v1 != v2);
            let mut interner = Interner::new();
            let mut suite = SuiteNote::new(&["amd64"]);
            let name = interner.intern("libfoo");
            let resolve = |sym: Symbol| interner.resolve(sym).to_string();

            let first = package(&mut interner, "libfoo", &v1);
            suite.upgrade_source(name, vec![vec![first]], resolve);
            suite.commit_changes();

            let second = package(&mut interner, "libfoo", &v2);
            suite.upgrade_source(name, vec![vec![second]], resolve);
            suite.undo_change();

            let slot = suite.universes()[0].slot_of(name).unwrap();
            let restored_version = interner.resolve(suite.universes()[0].get(slot).unwrap().pkg.version);
            prop_assert_eq!(restored_version, v1);
        }

        /// Upgrading then immediately undoing a brand-new source is
        /// always a no-op, whatever it was named.
        #[test]
        fn undo_of_a_brand_new_source_is_always_a_no_op(source_name in "[a-z][a-z0-9-]{0,10}", bin_name in "[a-z][a-z0-9-]{0,10}") {
            let mut interner = Interner::new();
            let mut suite = SuiteNote::new(&["amd64"]);
            let source = interner.intern(&source_name);
            let bin = interner.intern(&bin_name);
            let resolve = |sym: Symbol| interner.resolve(sym).to_string();

            let pkg = package(&mut interner, &bin_name, "1.0");
            suite.upgrade_source(source, vec![vec![pkg]], resolve);
            prop_assert!(suite.universes()[0].is_present(bin));

            suite.undo_change();
            prop_assert!(!suite.universes()[0].is_present(bin));
            prop_assert!(!suite.can_undo());
        }
    }
}
