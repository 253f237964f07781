//! The installability solver and staged migration engine.
//!
//! Built on top of `depcheck-core`'s data model:
//! - [`universe`] holds one architecture's installed-candidate bookkeeping
//!   (the per-package installed/conflicted refcounts and cached
//!   installability verdicts).
//! - [`solver`] is the backtracking installability checker itself.
//! - [`config`] exposes the solver's tunables.
//! - [`note`] is the suite-wide undo journal layered on top of a set of
//!   per-architecture universes, used to stage and roll back migration
//!   candidates before they're committed.

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod note;
pub mod solver;
pub mod universe;

// `universe::Installability` and `solver::Installability` answer different
// questions (cached per-package verdict vs. one check's outcome) so both
// stay qualified rather than being re-exported under one ambiguous name.
pub use config::SolverConfig;
pub use note::SuiteNote;
pub use universe::{CollectedPackage, Universe};

pub use depcheck_core::{Error, Result};
