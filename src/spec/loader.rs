//! Spec resolution: `extends` inheritance, search-root discovery, and a
//! single-writer-locked cache keyed by resolved path (§4.1).

use super::{markdown, Spec};
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Resolves named specs to files and merges `extends` chains.
///
/// Search roots are tried in order for a bare spec name (no path
/// separators): the project's own `.canvas/specs/` directory, then a
/// directory of built-in specs shipped alongside the binary/library.
pub struct SpecLoader {
    search_roots: Vec<PathBuf>,
    cache: SpecCache,
}

impl SpecLoader {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        let project_root = project_root.into();
        Self {
            search_roots: vec![project_root.join(".canvas").join("specs"), project_root],
            cache: SpecCache::default(),
        }
    }

    pub fn with_search_roots(search_roots: Vec<PathBuf>) -> Self {
        Self { search_roots, cache: SpecCache::default() }
    }

    /// Load and fully resolve a spec, following `extends` to the root
    /// ancestor and merging checks by id (most-derived wins on conflict).
    pub fn load(&self, name_or_path: &str) -> Result<Spec> {
        let mut loading = Vec::new();
        self.resolve(name_or_path, &mut loading)
    }

    fn resolve(&self, name_or_path: &str, loading: &mut Vec<String>) -> Result<Spec> {
        let path = self.locate(name_or_path)?;
        let canonical = path.to_string_lossy().to_string();

        if loading.contains(&canonical) {
            loading.push(canonical.clone());
            return Err(Error::SpecCycle(loading.join(" -> ")));
        }

        if let Some(cached) = self.cache.get(&canonical) {
            return Ok(cached);
        }

        loading.push(canonical.clone());
        let source = std::fs::read_to_string(&path)
            .map_err(|_| Error::SpecNotFound(name_or_path.to_string()))?;
        let (mut spec, overrides) = markdown::parse_with_overrides(&source)?;
        spec.resolved_from.push(canonical.clone());

        if let Some(parent_name) = spec.extends.clone() {
            let parent = self.resolve(&parent_name, loading)?;
            spec = merge(parent, spec);
        }
        loading.pop();

        // `## Overrides` targets the fully-merged spec, so inherited
        // checks are in scope by the time patches are applied (§4.1).
        markdown::apply_overrides(&mut spec, overrides);

        let errors = spec.validate();
        if !errors.is_empty() {
            return Err(Error::SpecParseError(errors.join("; ")));
        }

        self.cache.put(canonical, spec.clone());
        Ok(spec)
    }

    fn locate(&self, name_or_path: &str) -> Result<PathBuf> {
        let direct = Path::new(name_or_path);
        if direct.is_file() {
            return Ok(direct.to_path_buf());
        }

        for root in &self.search_roots {
            let candidate = root.join(format!("{name_or_path}.md"));
            if candidate.is_file() {
                return Ok(candidate);
            }
            let candidate = root.join(name_or_path);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }

        Err(Error::SpecNotFound(name_or_path.to_string()))
    }
}

/// Merge a resolved parent into a child spec: checks are merged by id, with
/// the child's own definition of a check (if any) taking precedence over
/// the inherited one; inherited checks keep the parent's pillar placement
/// unless the child redefines the check under a different pillar.
fn merge(parent: Spec, mut child: Spec) -> Spec {
    let mut child_ids: std::collections::HashSet<String> =
        child.checks_in_order().map(|(_, c)| c.id.clone()).collect();

    for parent_pillar in &parent.pillars {
        let inherited: Vec<_> = parent_pillar
            .checks
            .iter()
            .filter(|c| !child_ids.contains(c.id.as_str()))
            .cloned()
            .collect();
        if inherited.is_empty() {
            continue;
        }
        match child.pillars.iter_mut().find(|p| p.name == parent_pillar.name) {
            Some(pillar) => {
                for check in &inherited {
                    child_ids.insert(check.id.clone());
                }
                // Inherited checks keep the parent's ordering ahead of the
                // child's own additions to the same pillar.
                pillar.checks.splice(0..0, inherited);
            }
            None => {
                for check in &inherited {
                    child_ids.insert(check.id.clone());
                }
                let mut pillar = parent_pillar.clone();
                pillar.checks = inherited;
                child.pillars.push(pillar);
            }
        }
    }

    child.resolved_from.splice(0..0, parent.resolved_from);
    let mut warnings = parent.warnings;
    warnings.extend(child.warnings);
    child.warnings = warnings;
    child
}

/// Single-writer cache of fully-resolved specs, guarded by a mutex rather
/// than `RwLock` — loads are infrequent and never on a hot path, so
/// reader/writer contention isn't worth the extra complexity.
#[derive(Default)]
pub struct SpecCache {
    inner: Mutex<HashMap<String, Spec>>,
}

impl SpecCache {
    pub fn get(&self, key: &str) -> Option<Spec> {
        self.inner.lock().expect("spec cache lock poisoned").get(key).cloned()
    }

    pub fn put(&self, key: String, spec: Spec) {
        self.inner.lock().expect("spec cache lock poisoned").insert(key, spec);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_spec(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(format!("{name}.md"));
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    const BASE: &str = "---\nname: base\n---\n\n## Pillar A\n\n#### check-one\n- **Severity**: minor\n";

    #[test]
    fn loads_standalone_spec() {
        let dir = tempfile::tempdir().unwrap();
        write_spec(dir.path(), "base", BASE);
        let loader = SpecLoader::with_search_roots(vec![dir.path().to_path_buf()]);
        let spec = loader.load("base").unwrap();
        assert_eq!(spec.name, "base");
        assert_eq!(spec.pillars[0].checks.len(), 1);
    }

    #[test]
    fn merges_extends_chain() {
        let dir = tempfile::tempdir().unwrap();
        write_spec(dir.path(), "base", BASE);
        write_spec(
            dir.path(),
            "child",
            "---\nname: child\nextends: base\n---\n\n## Pillar A\n\n#### check-two\n- **Severity**: major\n",
        );
        let loader = SpecLoader::with_search_roots(vec![dir.path().to_path_buf()]);
        let spec = loader.load("child").unwrap();
        let ids: Vec<_> = spec.checks_in_order().map(|(_, c)| c.id.clone()).collect();
        assert_eq!(ids, vec!["check-one", "check-two"]);
    }

    #[test]
    fn child_redefinition_wins_over_inherited() {
        let dir = tempfile::tempdir().unwrap();
        write_spec(dir.path(), "base", BASE);
        write_spec(
            dir.path(),
            "child",
            "---\nname: child\nextends: base\n---\n\n## Pillar A\n\n#### check-one\n- **Severity**: blocking\n",
        );
        let loader = SpecLoader::with_search_roots(vec![dir.path().to_path_buf()]);
        let spec = loader.load("child").unwrap();
        assert_eq!(spec.pillars[0].checks.len(), 1);
        assert_eq!(spec.get_check("check-one").unwrap().1.severity, super::super::Severity::Blocking);
    }

    #[test]
    fn override_targets_inherited_check() {
        // Scenario C (§8): a child extends a parent and overrides a check
        // it never redeclares itself — the override must still land on
        // the inherited check, not be dropped as dangling.
        let dir = tempfile::tempdir().unwrap();
        write_spec(
            dir.path(),
            "parent",
            "---\nname: parent\n---\n\n## Pillar A\n\n#### accessibility-grade\n- **Severity**: major\n- **Config**: minimum_grade=C\n",
        );
        write_spec(
            dir.path(),
            "child",
            "---\nname: child\nextends: parent\n---\n\n## Overrides\n\n#### accessibility-grade\n- **Config**: minimum_grade=B\n",
        );
        let loader = SpecLoader::with_search_roots(vec![dir.path().to_path_buf()]);
        let spec = loader.load("child").unwrap();
        assert!(spec.warnings.is_empty());
        let (_, check) = spec.get_check("accessibility-grade").unwrap();
        assert_eq!(check.severity, super::super::Severity::Major);
        assert_eq!(check.config_str("minimum_grade"), Some("B"));
    }

    #[test]
    fn detects_extends_cycle() {
        let dir = tempfile::tempdir().unwrap();
        write_spec(dir.path(), "a", "---\nname: a\nextends: b\n---\n\n## P\n\n#### x\n- **Severity**: minor\n");
        write_spec(dir.path(), "b", "---\nname: b\nextends: a\n---\n\n## P\n\n#### y\n- **Severity**: minor\n");
        let loader = SpecLoader::with_search_roots(vec![dir.path().to_path_buf()]);
        assert!(matches!(loader.load("a"), Err(Error::SpecCycle(_))));
    }

    #[test]
    fn missing_spec_errors() {
        let dir = tempfile::tempdir().unwrap();
        let loader = SpecLoader::with_search_roots(vec![dir.path().to_path_buf()]);
        assert!(matches!(loader.load("nope"), Err(Error::SpecNotFound(_))));
    }

    #[test]
    fn second_load_hits_cache() {
        let dir = tempfile::tempdir().unwrap();
        write_spec(dir.path(), "base", BASE);
        let loader = SpecLoader::with_search_roots(vec![dir.path().to_path_buf()]);
        let first = loader.load("base").unwrap();
        let second = loader.load("base").unwrap();
        assert_eq!(first.name, second.name);
    }
}
