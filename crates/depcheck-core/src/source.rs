//! Source packages and the source catalogue.
//!
//! Grounded in the reference implementation's `dpkg_source` /
//! `dpkg_sources` structs: a source package owns one binary-package list
//! per architecture (`packages: ownedpackagelist**`), and the catalogue
//! hashes sources by name and records the known architecture list
//! (`n_arches` / `archname`). The `details` raw-paragraph field is
//! dropped — nothing in the installability/migration hard core reads it,
//! since parsing is out of scope for this crate.

use crate::error::{Error, Result};
use crate::intern::{Interner, Symbol};
use crate::package::Package;
use ahash::AHashMap;
use std::sync::Arc;

/// A source package: the thing that, built for each architecture,
/// produces zero or more binary packages.
#[derive(Debug, Clone)]
pub struct Source {
    /// Source package name.
    pub name: Symbol,
    /// Source package version.
    pub version: Symbol,
    /// A fake source stands in for a binary whose source package was
    /// never actually seen (e.g. an orphaned binary); it carries no real
    /// upload history of its own.
    pub fake: bool,
    /// One binary-package list per architecture, indexed the same way as
    /// [`SourceCatalogue::arches`].
    pub packages: Vec<Vec<Arc<Package>>>,
}

impl Source {
    /// Binaries this source produces for a given architecture index.
    #[must_use]
    pub fn binaries(&self, arch_index: usize) -> &[Arc<Package>] {
        self.packages.get(arch_index).map_or(&[], Vec::as_slice)
    }
}

/// The full set of known source packages, indexed by name, plus the
/// architecture list they were built for.
///
/// Mirrors `dpkg_sources`: a hash table of sources keyed by name, and a
/// parallel architecture name list that every `Source.packages` vector is
/// indexed against.
#[derive(Debug)]
pub struct SourceCatalogue {
    arch_names: Vec<Symbol>,
    sources: AHashMap<Symbol, Source>,
    interner: Interner,
}

impl SourceCatalogue {
    /// Create a catalogue for the given architectures. Architecture order
    /// is significant: it fixes the index every `Source.packages` vector
    /// is built against.
    #[must_use]
    pub fn new(arches: &[&str]) -> Self {
        let mut interner = Interner::new();
        let arch_names = arches.iter().map(|a| interner.intern(a)).collect();
        Self {
            arch_names,
            sources: AHashMap::new(),
            interner,
        }
    }

    /// The known architecture names, in index order.
    #[must_use]
    pub fn arches(&self) -> impl Iterator<Item = &str> {
        self.arch_names.iter().map(|&sym| self.interner.resolve(sym))
    }

    /// Number of known architectures.
    #[must_use]
    pub fn arch_count(&self) -> usize {
        self.arch_names.len()
    }

    /// Resolve an architecture name to its index, or an error if it was
    /// never registered.
    pub fn arch_index(&self, arch: &str) -> Result<usize> {
        self.arch_names
            .iter()
            .position(|&sym| self.interner.resolve(sym) == arch)
            .ok_or_else(|| Error::unknown_architecture(arch))
    }

    /// Intern a string through this catalogue's shared interner.
    pub fn intern(&mut self, s: &str) -> Symbol {
        self.interner.intern(s)
    }

    /// Resolve a `Symbol` back to its string, via this catalogue's
    /// interner.
    #[must_use]
    pub fn resolve(&self, sym: Symbol) -> &str {
        self.interner.resolve(sym)
    }

    /// All known sources, by name.
    #[must_use]
    pub fn sources(&self) -> impl Iterator<Item = &Source> {
        self.sources.values()
    }

    /// Insert or replace a source package record.
    pub fn insert_source(&mut self, source: Source) {
        self.sources.insert(source.name, source);
    }

    /// Look up a source by name.
    #[must_use]
    pub fn source(&self, name: Symbol) -> Option<&Source> {
        self.sources.get(&name)
    }

    /// Is a source package with this name present in the catalogue?
    #[must_use]
    pub fn is_present(&self, name: Symbol) -> bool {
        self.sources.contains_key(&name)
    }

    /// Is the named source a fake stand-in (see [`Source::fake`])?
    pub fn is_fake(&self, name: Symbol) -> Result<bool> {
        self.source(name)
            .map(|s| s.fake)
            .ok_or_else(|| Error::unknown_source(self.interner.resolve(name).to_string()))
    }

    /// The version of the named source package.
    pub fn get_version(&self, name: Symbol) -> Result<Symbol> {
        self.source(name)
            .map(|s| s.version)
            .ok_or_else(|| Error::unknown_source(self.interner.resolve(name).to_string()))
    }

    /// The binaries the named source produces for a given architecture.
    pub fn binaries(&self, name: Symbol, arch_index: usize) -> Result<&[Arc<Package>]> {
        self.source(name)
            .map(|s| s.binaries(arch_index))
            .ok_or_else(|| Error::unknown_source(self.interner.resolve(name).to_string()))
    }

    /// All binaries for every source, for a given architecture.
    pub fn packages_for_arch(&self, arch_index: usize) -> impl Iterator<Item = &Arc<Package>> {
        self.sources.values().flat_map(move |s| s.binaries(arch_index).iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::Package;
    use pretty_assertions::assert_eq;

    fn sample_package(catalogue: &mut SourceCatalogue, name: &str, version: &str) -> Arc<Package> {
        let name = catalogue.intern(name);
        let version = catalogue.intern(version);
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
    fn arch_index_resolves_known_architectures_in_order() {
        let catalogue = SourceCatalogue::new(&["amd64", "arm64"]);
        assert_eq!(catalogue.arch_index("amd64").unwrap(), 0);
        assert_eq!(catalogue.arch_index("arm64").unwrap(), 1);
    }

    #[test]
    fn arch_index_rejects_unknown_architectures() {
        let catalogue = SourceCatalogue::new(&["amd64"]);
        assert!(catalogue.arch_index("riscv64").is_err());
    }

    #[test]
    fn binaries_are_retrievable_per_architecture() {
        let mut catalogue = SourceCatalogue::new(&["amd64", "arm64"]);
        let pkg = sample_package(&mut catalogue, "libfoo", "1.0");
        let name = pkg.name;
        let version = pkg.version;
        catalogue.insert_source(Source {
            name,
            version,
            fake: false,
            packages: vec![vec![pkg.clone()], vec![]],
        });

        let amd64_bins = catalogue.binaries(name, 0).unwrap();
        assert_eq!(amd64_bins.len(), 1);
        let arm64_bins = catalogue.binaries(name, 1).unwrap();
        assert!(arm64_bins.is_empty());
    }

    #[test]
    fn unknown_source_lookups_report_an_error() {
        let mut catalogue = SourceCatalogue::new(&["amd64"]);
        let bogus = catalogue.intern("never-heard-of-it");
        assert!(catalogue.get_version(bogus).is_err());
    }

    #[test]
    fn fake_sources_are_reported_as_such() {
        let mut catalogue = SourceCatalogue::new(&["amd64"]);
        let name = catalogue.intern("orphan");
        let version = catalogue.intern("0");
        catalogue.insert_source(Source {
            name,
            version,
            fake: true,
            packages: vec![vec![]],
        });
        assert!(catalogue.is_fake(name).unwrap());
    }
}
