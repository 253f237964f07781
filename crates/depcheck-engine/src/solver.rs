//! The installability solver: a backtracking search over alternative ways
//! to satisfy a package's (and its dependencies', and so on) dependency
//! clauses without two mutually conflicting packages ending up installed
//! at once.
//!
//! This is a close translation of the reference implementation's
//! `checkinstallable`. The reference represents the search frontier as a
//! hand-rolled doubly-linked list (`instonelist`) allocated out of its
//! bump arena and addressed by pointer; a flat `Vec<Frame>` addressed by
//! plain index would not work here, because the algorithm splices new
//! frames into the middle of the frontier (`insert_instonelist`) and
//! trims frontier tails (`trim_instonelist_after`) — both operations that
//! would silently invalidate any other frame's stored `usize` under
//! `Vec::insert`/`Vec::remove`. [`Frontier`] is instead a slab-backed
//! intrusive doubly-linked list addressed by small stable [`FrameId`]s,
//! which is exactly the translation the design notes sanction for this
//! shape of problem.

use crate::config::SolverConfig;
use crate::universe::Universe;
use depcheck_core::{Clause, DepKind, Package, SlotId, Symbol, VersionOracle};
use std::sync::Arc;
use tracing::{trace, warn};

/// The result of an installability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Installability {
    /// A way was found to install the package (and its binding
    /// dependencies) without conflicts.
    Yes,
    /// No such way exists.
    No,
    /// The search exhausted its iteration budget before reaching an
    /// answer either way.
    GaveUp,
}

/// A stable handle to a [`Frame`] inside a [`Frontier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FrameId(usize);

/// One node of the search frontier: a still-to-be-resolved OR-clause
/// (`instone`, a set of alternative candidate packages, any one of which
/// would satisfy it) plus the backtracking state for working through
/// those alternatives.
///
/// Mirrors `struct instonelist` field for field: `instoneX` -> `instone`,
/// `curX` -> `cursor`, `cutoffX` -> `cutoff`, `expandedX` -> `expanded`,
/// `nextX`/`prevX` -> `next`/`prev`.
#[derive(Debug)]
struct Frame {
    instone: Vec<SlotId>,
    /// Index into `instone` of the alternative currently being tried.
    cursor: Option<usize>,
    /// The frontier tail at the moment this frame was first visited;
    /// backtracking into this frame trims every frame inserted after it.
    cutoff: Option<FrameId>,
    /// Whether this frame's singleton fast-path dependency expansion has
    /// already run once.
    expanded: bool,
    prev: Option<FrameId>,
    next: Option<FrameId>,
}

/// A slab-backed intrusive doubly-linked list of [`Frame`]s.
#[derive(Debug, Default)]
struct Frontier {
    slots: Vec<Option<Frame>>,
    free: Vec<usize>,
}

impl Frontier {
    fn new() -> Self {
        Self::default()
    }

    fn frame(&self, id: FrameId) -> &Frame {
        self.slots[id.0].as_ref().expect("dangling FrameId")
    }

    fn frame_mut(&mut self, id: FrameId) -> &mut Frame {
        self.slots[id.0].as_mut().expect("dangling FrameId")
    }

    /// Insert a new frame for `instone` immediately after `after` (or at
    /// the head, if `after` is `None`). Mirrors `insert_instonelist`.
    fn insert_after(&mut self, after: Option<FrameId>, instone: Vec<SlotId>) -> FrameId {
        let next = after.map(|id| self.frame(id).next).unwrap_or(None);
        let new_id = match self.free.pop() {
            Some(idx) => idx,
            None => {
                self.slots.push(None);
                self.slots.len() - 1
            }
        };
        self.slots[new_id] = Some(Frame {
            instone,
            cursor: None,
            cutoff: None,
            expanded: false,
            prev: after,
            next,
        });
        let new_id = FrameId(new_id);

        if let Some(after) = after {
            self.frame_mut(after).next = Some(new_id);
        }
        if let Some(next) = next {
            self.frame_mut(next).prev = Some(new_id);
        }
        new_id
    }

    /// Free every frame after `first`, leaving `first` as the new tail.
    /// Mirrors `trim_instonelist_after`.
    fn trim_after(&mut self, first: FrameId) {
        let mut current = self.frame(first).next;
        self.frame_mut(first).next = None;
        while let Some(id) = current {
            current = self.frame(id).next;
            self.slots[id.0] = None;
            self.free.push(id.0);
        }
    }
}

/// Can `slot` be installed right now, given what's already installed?
///
/// Mirrors `caninstall`: a package already installed is trivially fine to
/// install again (refcounted); a package some other installed package
/// already conflicts with cannot be installed at all.
fn can_install(universe: &Universe, slot: SlotId, resolve: impl Fn(Symbol) -> String + Copy, oracle: &dyn VersionOracle) -> bool {
    let Some(cpkg) = universe.get(slot) else {
        return false;
    };
    if cpkg.installed > 0 {
        return true;
    }
    if cpkg.conflicted > 0 {
        return false;
    }
    !cpkg.pkg.conflicts.iter().any(|conflict| {
        universe
            .matching(conflict, resolve, oracle)
            .into_iter()
            .any(|other| universe.get(other).is_some_and(|c| c.installed > 0))
    })
}

fn install(universe: &mut Universe, slot: SlotId, resolve: impl Fn(Symbol) -> String + Copy, oracle: &dyn VersionOracle) {
    let Some(cpkg) = universe.get(slot) else {
        return;
    };
    if cpkg.installed == 0 {
        let conflicts = cpkg.pkg.conflicts.clone();
        for conflict in &conflicts {
            for other in universe.matching(conflict, resolve, oracle) {
                if other == slot {
                    continue;
                }
                if let Some(c) = universe.get_mut(other) {
                    c.conflicted += 1;
                }
            }
        }
    }
    if let Some(c) = universe.get_mut(slot) {
        c.installed += 1;
    }
}

fn uninstall(universe: &mut Universe, slot: SlotId, resolve: impl Fn(Symbol) -> String + Copy, oracle: &dyn VersionOracle) {
    let Some(cpkg) = universe.get(slot) else {
        return;
    };
    let now_zero = cpkg.installed <= 1;
    if let Some(c) = universe.get_mut(slot) {
        c.installed = c.installed.saturating_sub(1);
    }
    if now_zero {
        let conflicts = universe.get(slot).map(|c| c.pkg.conflicts.clone()).unwrap_or_default();
        for conflict in &conflicts {
            for other in universe.matching(conflict, resolve, oracle) {
                if other == slot {
                    continue;
                }
                if let Some(c) = universe.get_mut(other) {
                    c.conflicted = c.conflicted.saturating_sub(1);
                }
            }
        }
    }
}

/// Check whether installing any one package from `instoneof` is possible
/// without conflicts, recursively pulling in binding dependencies.
///
/// Entry point mirroring `checkinstallable`. Short-circuits if any
/// candidate in `instoneof` is already memoized as installable.
pub fn check_installable(
    universe: &mut Universe,
    instoneof: &[SlotId],
    config: &SolverConfig,
    resolve: impl Fn(Symbol) -> String + Copy,
    oracle: &dyn VersionOracle,
) -> depcheck_core::Result<Installability> {
    use crate::universe::Installability as Cached;

    if instoneof
        .iter()
        .any(|&slot| universe.get(slot).is_some_and(|c| c.installability == Cached::Yes))
    {
        return Ok(Installability::Yes);
    }

    let mut frontier = Frontier::new();
    let list = frontier.insert_after(None, instoneof.to_vec());
    let mut last = list;
    let mut pointer = Some(list);
    let mut counter = config.max_iterations;

    while counter > 0 && pointer.is_some() {
        counter -= 1;
        let p = pointer.expect("checked above");

        if frontier.frame(p).cursor.is_none() {
            let instone = &frontier.frame(p).instone;
            let mut chosen = instone
                .iter()
                .position(|&slot| universe.get(slot).is_some_and(|c| c.installed != 0));
            if chosen.is_none() && !instone.is_empty() {
                chosen = Some(0);
            }
            frontier.frame_mut(p).cursor = chosen;
            frontier.frame_mut(p).cutoff = Some(last);
        } else {
            let cur_idx = frontier.frame(p).cursor.expect("checked above");
            let cur_slot = frontier.frame(p).instone[cur_idx];
            uninstall(universe, cur_slot, resolve, oracle);
            let cutoff = frontier.frame(p).cutoff.expect("set on first visit");
            frontier.trim_after(cutoff);
            last = cutoff;

            let still_installed = universe.get(cur_slot).is_some_and(|c| c.installed > 0);
            if still_installed {
                // Even without this candidate, the package stays
                // installed via some other path: trying further
                // alternatives here wouldn't help.
                frontier.frame_mut(p).cursor = None;
            } else {
                let next = cur_idx + 1;
                let len = frontier.frame(p).instone.len();
                frontier.frame_mut(p).cursor = if next < len { Some(next) } else { None };
            }
        }

        while let Some(idx) = frontier.frame(p).cursor {
            let slot = frontier.frame(p).instone[idx];
            if can_install(universe, slot, resolve, oracle) {
                break;
            }
            let next = idx + 1;
            let len = frontier.frame(p).instone.len();
            frontier.frame_mut(p).cursor = if next < len { Some(next) } else { None };
        }

        if frontier.frame(p).cursor.is_none() {
            let Some(prev) = frontier.frame(p).prev else {
                break;
            };
            pointer = Some(prev);
            continue;
        }

        let inst_slot = frontier.frame(p).instone[frontier.frame(p).cursor.expect("checked above")];
        install(universe, inst_slot, resolve, oracle);

        if universe.get(inst_slot).is_some_and(|c| c.installed == 1) {
            let pkg: Arc<Package> = universe.get(inst_slot).expect("just installed").pkg.clone();
            let mut bother = true;
            let expanded = frontier.frame(p).expanded;

            for kind in DepKind::ALL {
                if !config.active_kinds.contains(kind) {
                    continue;
                }
                for clause in pkg.clauses(kind) {
                    let matching = universe.matching_clause(clause, resolve, oracle);
                    if matching.is_empty() {
                        bother = false;
                    } else if let [only] = matching.as_slice() {
                        if !schedule_singleton_dep(&mut frontier, p, *only, &mut last, expanded, clause) {
                            bother = false;
                        }
                    } else {
                        last = frontier.insert_after(last, matching);
                    }
                }
            }

            if !bother {
                trace!("dependency unsatisfiable, retrying alternatives at this frame");
                continue;
            }
        }

        pointer = frontier.frame(p).next;
    }

    if counter == 0 {
        warn!(max_iterations = config.max_iterations, "installability search exhausted its iteration budget");
        let mut cursor = pointer;
        while let Some(id) = cursor {
            if let Some(idx) = frontier.frame(id).cursor {
                let slot = frontier.frame(id).instone[idx];
                uninstall(universe, slot, resolve, oracle);
            }
            cursor = frontier.frame(id).prev;
        }
        return Ok(Installability::GaveUp);
    }

    if pointer.is_none() {
        let winner_idx = frontier.frame(list).cursor.expect("search succeeded");
        let winner = frontier.frame(list).instone[winner_idx];

        let mut cursor = Some(last);
        while let Some(id) = cursor {
            let idx = frontier.frame(id).cursor.expect("search succeeded");
            let slot = frontier.frame(id).instone[idx];
            if universe.get(slot).is_some_and(|c| c.installed == 1) {
                let winner_name = universe.get(winner).expect("winner is live").pkg.name;
                if let Some(c) = universe.get_mut(slot) {
                    c.mayaffect.push(winner_name);
                }
            }
            uninstall(universe, slot, resolve, oracle);
            cursor = frontier.frame(id).prev;
        }

        if let Some(c) = universe.get_mut(winner) {
            c.installability = crate::universe::Installability::Yes;
        }
        return Ok(Installability::Yes);
    }

    Ok(Installability::No)
}

/// Handle the reference implementation's singleton-dependency fast path:
/// when a clause has exactly one matching candidate, install it as soon
/// as possible instead of waiting at the tail of the frontier, to keep
/// the combinatorial blowup down.
///
/// Returns `false` when the candidate was already tried and rejected as an
/// earlier alternative at this very frame — mirrors `dpkg.c`'s
/// `bother = 0` on that path: the singleton dependency can only be
/// satisfied by the package whose own alternative just lost, so the
/// current candidate must be abandoned rather than treated as satisfied,
/// or the `X deps: Y|bar, bar deps: Y` virtual-provider case would report
/// installable when it isn't.
fn schedule_singleton_dep(frontier: &mut Frontier, p: FrameId, candidate: SlotId, last: &mut FrameId, expanded: bool, clause: &Clause) -> bool {
    let _ = clause;
    let cur_idx = frontier.frame(p).cursor.expect("caller just installed this frame's candidate");
    let already_tried = frontier.frame(p).instone[..cur_idx].contains(&candidate);
    if already_tried {
        return false;
    }

    if frontier.frame(p).instone.len() == 1 {
        if !expanded {
            frontier.insert_after(Some(p), vec![candidate]);
            frontier.frame_mut(p).expanded = true;
        }
    } else {
        let cutoff = frontier.frame(p).cutoff.expect("set on first visit to this frame");
        frontier.insert_after(Some(cutoff), vec![candidate]);
    }

    if let Some(next_of_last) = frontier.frame(*last).next {
        *last = next_of_last;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::universe::Universe;
    use depcheck_core::{Atom, DebianLikeVersionOracle, Interner, Package};

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

    #[test]
    fn a_package_with_no_dependencies_is_trivially_installable() {
        let mut interner = Interner::new();
        let mut universe = Universe::new("amd64");
        let pkg = package(&mut interner, "leaf", "1.0");
        let name = pkg.name;
        universe.add_binary(pkg);
        let slot = universe.slot_of(name).unwrap();

        let oracle = DebianLikeVersionOracle;
        let config = SolverConfig::default();
        let resolve = |sym: Symbol| interner.resolve(sym).to_string();
        let result = check_installable(&mut universe, &[slot], &config, resolve, &oracle).unwrap();
        assert_eq!(result, Installability::Yes);
    }

    #[test]
    fn a_package_depending_on_a_missing_package_is_not_installable() {
        let mut interner = Interner::new();
        let mut universe = Universe::new("amd64");
        let missing = interner.intern("ghost");
        let mut pkg = package(&mut interner, "needy", "1.0");
        Arc::get_mut(&mut pkg).unwrap().depends[DepKind::Depends as usize] = vec![smallvec::smallvec![Atom::unversioned(missing)]];
        let name = pkg.name;
        universe.add_binary(pkg);
        let slot = universe.slot_of(name).unwrap();

        let oracle = DebianLikeVersionOracle;
        let config = SolverConfig::default();
        let resolve = |sym: Symbol| interner.resolve(sym).to_string();
        let result = check_installable(&mut universe, &[slot], &config, resolve, &oracle).unwrap();
        assert_eq!(result, Installability::No);
    }

    #[test]
    fn two_packages_that_conflict_cannot_both_satisfy_a_dependency() {
        let mut interner = Interner::new();
        let mut universe = Universe::new("amd64");

        let a_name = interner.intern("impl-a");
        let b_name = interner.intern("impl-b");
        let virt = interner.intern("virtual-thing");

        let mut a = package(&mut interner, "impl-a", "1.0");
        Arc::get_mut(&mut a).unwrap().provides = vec![virt];
        Arc::get_mut(&mut a).unwrap().conflicts = vec![Atom::unversioned(b_name)];

        let mut b = package(&mut interner, "impl-b", "1.0");
        Arc::get_mut(&mut b).unwrap().provides = vec![virt];
        Arc::get_mut(&mut b).unwrap().conflicts = vec![Atom::unversioned(a_name)];

        universe.add_binary(a);
        universe.add_binary(b);

        let mut root = package(&mut interner, "root", "1.0");
        Arc::get_mut(&mut root).unwrap().depends[DepKind::Depends as usize] = vec![smallvec::smallvec![Atom::unversioned(virt)]];
        let root_name = root.name;
        universe.add_binary(root);
        let slot = universe.slot_of(root_name).unwrap();

        let oracle = DebianLikeVersionOracle;
        let config = SolverConfig::default();
        let resolve = |sym: Symbol| interner.resolve(sym).to_string();
        let result = check_installable(&mut universe, &[slot], &config, resolve, &oracle).unwrap();
        assert_eq!(result, Installability::Yes);
    }

    /// `root` deps `y|bar`; `y` is itself uninstallable; `bar` deps `y`
    /// (singleton). Once `y` fails and the search falls through to `bar`,
    /// `bar`'s own singleton dependency on `y` must not be treated as
    /// satisfied just because `y` is present in the universe — `y` was
    /// already tried and rejected as `root`'s own first alternative, so
    /// the candidate must be abandoned instead of accepted.
    #[test]
    fn a_singleton_dep_equal_to_an_already_rejected_alternative_is_not_installable() {
        let mut interner = Interner::new();
        let mut universe = Universe::new("amd64");

        let missing = interner.intern("ghost");
        let mut y = package(&mut interner, "y", "1.0");
        Arc::get_mut(&mut y).unwrap().depends[DepKind::Depends as usize] = vec![smallvec::smallvec![Atom::unversioned(missing)]];
        let y_name = y.name;
        universe.add_binary(y);

        let mut bar = package(&mut interner, "bar", "1.0");
        Arc::get_mut(&mut bar).unwrap().depends[DepKind::Depends as usize] = vec![smallvec::smallvec![Atom::unversioned(y_name)]];
        let bar_name = bar.name;
        universe.add_binary(bar);

        let mut root = package(&mut interner, "root", "1.0");
        Arc::get_mut(&mut root).unwrap().depends[DepKind::Depends as usize] =
            vec![smallvec::smallvec![Atom::unversioned(y_name), Atom::unversioned(bar_name)]];
        let root_name = root.name;
        universe.add_binary(root);
        let slot = universe.slot_of(root_name).unwrap();

        let oracle = DebianLikeVersionOracle;
        let config = SolverConfig::default();
        let resolve = |sym: Symbol| interner.resolve(sym).to_string();
        let result = check_installable(&mut universe, &[slot], &config, resolve, &oracle).unwrap();
        assert_eq!(result, Installability::No);
    }

    #[test]
    fn a_tiny_iteration_budget_gives_up_rather_than_hanging() {
        let mut interner = Interner::new();
        let mut universe = Universe::new("amd64");
        let pkg = package(&mut interner, "leaf", "1.0");
        let name = pkg.name;
        universe.add_binary(pkg);
        let slot = universe.slot_of(name).unwrap();

        let oracle = DebianLikeVersionOracle;
        let config = SolverConfig { max_iterations: 0, ..SolverConfig::default() };
        let resolve = |sym: Symbol| interner.resolve(sym).to_string();
        let result = check_installable(&mut universe, &[slot], &config, resolve, &oracle).unwrap();
        assert_eq!(result, Installability::GaveUp);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::universe::Universe;
    use depcheck_core::{Atom, DebianLikeVersionOracle, DepKind, Interner};
    use proptest::prelude::*;

    fn build_chain(interner: &mut Interner, length: u32) -> (Universe, Symbol) {
        let mut universe = Universe::new("amd64");
        let mut previous: Option<Symbol> = None;
        let mut root_name = None;
        for i in 0..length {
            let name = interner.intern(&format!("pkg-{i}"));
            let version = interner.intern("1.0");
            let mut depends: [Vec<Clause>; 4] = [vec![], vec![], vec![], vec![]];
            if let Some(dep) = previous {
                depends[DepKind::Depends as usize] = vec![smallvec::smallvec![Atom::unversioned(dep)]];
            }
            let pkg = Arc::new(Package {
                name,
                version,
                source: name,
                source_version: version,
                priority: 0,
                arch_all: false,
                depends,
                conflicts: vec![],
                provides: vec![],
            });
            universe.add_binary(pkg);
            root_name = Some(name);
            previous = Some(name);
        }
        (universe, root_name.expect("length > 0"))
    }

    proptest! {
        /// Checking the same chain of dependencies twice, from two
        /// independently built universes, always agrees: the solver is a
        /// pure function of the universe and query, not of incidental
        /// call order or caching happenstance.
        #[test]
        fn chain_installability_is_deterministic(length in 1u32..12) {
            let oracle = DebianLikeVersionOracle;
            let config = SolverConfig::default();

            let mut interner_a = Interner::new();
            let (mut universe_a, root_a) = build_chain(&mut interner_a, length);
            let resolve_a = |sym: Symbol| interner_a.resolve(sym).to_string();
            let slot_a = universe_a.slot_of(root_a).unwrap();
            let result_a = check_installable(&mut universe_a, &[slot_a], &config, resolve_a, &oracle).unwrap();

            let mut interner_b = Interner::new();
            let (mut universe_b, root_b) = build_chain(&mut interner_b, length);
            let resolve_b = |sym: Symbol| interner_b.resolve(sym).to_string();
            let slot_b = universe_b.slot_of(root_b).unwrap();
            let result_b = check_installable(&mut universe_b, &[slot_b], &config, resolve_b, &oracle).unwrap();

            prop_assert_eq!(result_a, result_b);
            prop_assert_eq!(result_a, Installability::Yes);
        }

        /// Re-running the check against the very same, now-memoized
        /// universe returns the same answer as the first run.
        #[test]
        fn rechecking_a_memoized_universe_is_stable(length in 1u32..12) {
            let oracle = DebianLikeVersionOracle;
            let config = SolverConfig::default();
            let mut interner = Interner::new();
            let (mut universe, root) = build_chain(&mut interner, length);
            let resolve = |sym: Symbol| interner.resolve(sym).to_string();
            let slot = universe.slot_of(root).unwrap();

            let first = check_installable(&mut universe, &[slot], &config, resolve, &oracle).unwrap();
            let second = check_installable(&mut universe, &[slot], &config, resolve, &oracle).unwrap();
            prop_assert_eq!(first, second);
        }
    }
}
