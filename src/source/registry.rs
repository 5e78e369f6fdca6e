use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use super::Source;

/// Identifies a loaded source buffer. Stable for the lifetime of the
/// registry that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(pub usize);

/// Owns every source buffer loaded during a compilation and deduplicates
/// by canonical path. This is what gives module compilation its
/// idempotence (§4.7): asking for the same canonical path twice returns
/// the same `SourceId`, so the evaluator's per-path module cache never
/// even has to consider re-parsing.
#[derive(Debug, Default)]
pub struct SourceRegistry {
    by_path: HashMap<PathBuf, SourceId>,
    sources: Vec<Rc<Source>>,
}

impl SourceRegistry {
    pub fn new() -> SourceRegistry {
        SourceRegistry { by_path: HashMap::new(), sources: Vec::new() }
    }

    /// Registers already-read contents under a canonical path. If the
    /// path was already registered, returns the existing id and does
    /// not touch `contents` — this is the dedup seam.
    pub fn insert(&mut self, path: PathBuf, contents: String) -> SourceId {
        let canonical = canonicalize_best_effort(&path);
        if let Some(&id) = self.by_path.get(&canonical) {
            log::trace!("source registry hit for {}", canonical.display());
            return id;
        }

        let id = SourceId(self.sources.len());
        self.sources.push(Rc::new(Source::new(path, contents)));
        self.by_path.insert(canonical, id);
        id
    }

    /// Loads a file from disk and registers it. Kept separate from
    /// `insert` so the core's own tests never need a filesystem.
    pub fn load(&mut self, path: impl AsRef<Path>) -> std::io::Result<SourceId> {
        let path = path.as_ref().to_path_buf();
        let contents = std::fs::read_to_string(&path)?;
        Ok(self.insert(path, contents))
    }

    pub fn get(&self, id: SourceId) -> &Rc<Source> {
        &self.sources[id.0]
    }

    pub fn is_loaded(&self, path: impl AsRef<Path>) -> bool {
        self.by_path.contains_key(&canonicalize_best_effort(path.as_ref()))
    }
}

/// `std::fs::canonicalize` requires the path to exist on disk, which
/// in-memory sources (tests, synthetic modules) never satisfy. Fall
/// back to the path as given rather than failing dedup outright.
fn canonicalize_best_effort(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn dedups_by_canonical_path() {
        let mut registry = SourceRegistry::new();
        let a = registry.insert(PathBuf::from("/tmp/does-not-exist.ald"), "x := 1;".to_string());
        let b = registry.insert(PathBuf::from("/tmp/does-not-exist.ald"), "x := 2;".to_string());
        assert_eq!(a, b);
        assert_eq!(registry.get(a).contents, "x := 1;");
    }

    #[test]
    fn distinct_paths_get_distinct_ids() {
        let mut registry = SourceRegistry::new();
        let a = registry.insert(PathBuf::from("/tmp/a.ald"), "a := 1;".to_string());
        let b = registry.insert(PathBuf::from("/tmp/b.ald"), "b := 2;".to_string());
        assert_ne!(a, b);
    }
}
