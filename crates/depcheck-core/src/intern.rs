//! String interning.
//!
//! The reference implementation chains bump-allocated character arenas and
//! hands back interior pointers that live for the process lifetime. Doing
//! that safely in Rust would require aliasing a growing buffer, so instead
//! every interned string is stored once in an id-indexed table and callers
//! carry a small `Symbol` handle instead of a pointer. Strings are still
//! never individually freed — an `Interner` only grows for as long as its
//! owning `SourceCatalogue` lives.

use ahash::AHashMap;
use std::fmt;

/// A handle to an interned string. Cheap to copy, compare, and hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol(u32);

impl Symbol {
    /// Construct a `Symbol` from its raw index. Only meaningful when paired
    /// with the `Interner` that produced it.
    #[must_use]
    pub const fn from_raw(index: u32) -> Self {
        Self(index)
    }

    /// The raw index backing this symbol.
    #[must_use]
    pub const fn as_raw(self) -> u32 {
        self.0
    }
}

/// A deduplicating string table.
///
/// `intern` is idempotent: interning the same string twice returns the same
/// `Symbol`. This mirrors the reference interner's "rare-repeat" cache,
/// generalized to cover every string rather than just the most recent 1000
/// field names, since a `Symbol`-keyed hash lookup costs about the same.
#[derive(Debug, Default)]
pub struct Interner {
    strings: Vec<Box<str>>,
    lookup: AHashMap<Box<str>, Symbol>,
}

impl Interner {
    /// Create an empty interner.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `s`, returning its `Symbol`. Subsequent interns of an equal
    /// string return the same `Symbol`.
    pub fn intern(&mut self, s: &str) -> Symbol {
        if let Some(&sym) = self.lookup.get(s) {
            return sym;
        }
        let boxed: Box<str> = s.into();
        let sym = Symbol(self.strings.len() as u32);
        self.strings.push(boxed.clone());
        self.lookup.insert(boxed, sym);
        sym
    }

    /// Resolve a `Symbol` back to its string.
    ///
    /// # Panics
    /// Panics if `sym` was not produced by this interner.
    #[must_use]
    pub fn resolve(&self, sym: Symbol) -> &str {
        &self.strings[sym.0 as usize]
    }

    /// Number of distinct strings interned so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_same_string_is_idempotent() {
        let mut interner = Interner::new();
        let a = interner.intern("libfoo");
        let b = interner.intern("libfoo");
        assert_eq!(a, b);
        assert_eq!(interner.len(), 1);
    }

    #[test]
    fn distinct_strings_get_distinct_symbols() {
        let mut interner = Interner::new();
        let a = interner.intern("libfoo");
        let b = interner.intern("libbar");
        assert_ne!(a, b);
        assert_eq!(interner.resolve(a), "libfoo");
        assert_eq!(interner.resolve(b), "libbar");
    }

    #[test]
    fn empty_interner_reports_empty() {
        let interner = Interner::new();
        assert!(interner.is_empty());
    }
}
