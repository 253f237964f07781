//! Core data model for the depcheck installability and migration engine.
//!
//! This crate provides the foundational types shared by every depcheck
//! component:
//! - A safe-Rust slab arena and string interner, standing in for the
//!   reference implementation's bump-allocated memory blocks
//! - The dependency/conflict/version-relation data model
//! - Source packages and the source catalogue they live in
//! - Error types
//!
//! Parsing, persistence, and the installability solver itself live in
//! `depcheck-engine`; this crate only carries the data the solver
//! operates on.

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod arena;
pub mod error;
pub mod intern;
pub mod package;
pub mod source;
pub mod version;

pub use arena::{find_longest_free_run, ObjectArena, SlotId};
pub use error::{Error, ErrorCode, Result};
pub use intern::{Interner, Symbol};
pub use package::{Atom, Clause, DepKind, DepKindMask, Package};
pub use source::{Source, SourceCatalogue};
pub use version::{DebianLikeVersionOracle, Relation, VersionOracle};

// Re-export commonly used collection types.
pub use ahash::{AHashMap, AHashSet};
