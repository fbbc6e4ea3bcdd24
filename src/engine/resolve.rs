//! Name resolution: alias maps, generic stripping, namespace qualification,
//! and the project-internal filter. Everything here is a pure function over
//! the per-file context; nothing mutates shared state.

use crate::model::Import;
use std::collections::{BTreeMap, BTreeSet};

/// Builds the short-name -> fully-qualified-name table from a file's
/// imports. Later entries overwrite earlier ones for a duplicate key,
/// mirroring shadowing semantics. Must be fully built before inheritance or
/// call resolution starts for the file.
pub fn build_alias_map(imports: &[Import], separator: &str) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for import in imports {
        let target = if import.is_scoped_import {
            match import.imported_names.first() {
                Some(name) => format!("{}{}{}", import.module, separator, name),
                None => import.module.clone(),
            }
        } else {
            import.module.clone()
        };
        if let Some(alias) = &import.alias {
            map.insert(alias.clone(), target);
            continue;
        }
        // An unaliased import still binds a short name: the imported entity
        // for scoped imports, the last path segment for whole-module ones.
        if import.is_scoped_import {
            if let Some(name) = import.imported_names.first() {
                map.insert(name.clone(), target);
            }
        } else if let Some(last) = import.module.rsplit(separator).next() {
            if last != import.module {
                map.insert(last.to_string(), import.module.clone());
            }
        }
    }
    map
}

/// Substitutes the prefix of `raw` (up to the first separator) when it is an
/// alias. A bare name matching an alias is substituted whole. No recursive
/// substitution: an alias map is not chained.
pub fn resolve_alias(raw: &str, alias_map: &BTreeMap<String, String>, separator: &str) -> String {
    match raw.split_once(separator) {
        Some((prefix, rest)) => match alias_map.get(prefix) {
            Some(real) => format!("{real}{separator}{rest}"),
            None => raw.to_string(),
        },
        None => match alias_map.get(raw) {
            Some(real) => real.clone(),
            None => raw.to_string(),
        },
    }
}

/// Drops generic/type-parameter syntax, keeping only the base type name:
/// `Repository<User>` -> `Repository`, `Generic[T]` -> `Generic`.
pub fn strip_generics(name: &str) -> String {
    let cut = name
        .find('<')
        .into_iter()
        .chain(name.find('['))
        .min()
        .unwrap_or(name.len());
    name[..cut].trim().to_string()
}

/// Prefixes `name` with the file namespace unless it is already qualified or
/// the namespace is empty.
pub fn qualify(name: &str, namespace: &str, separator: &str) -> String {
    if namespace.is_empty() || name.contains(separator) {
        name.to_string()
    } else {
        format!("{namespace}{separator}{name}")
    }
}

/// Resolution order for an inheritance parent: implicit base-type table,
/// alias map, same-namespace fallback. Unresolvable names are preserved as
/// written, never dropped.
pub fn resolve_parent(
    stripped: &str,
    implicit: Option<String>,
    alias_map: &BTreeMap<String, String>,
    namespace: &str,
    separator: &str,
) -> String {
    if let Some(builtin) = implicit {
        return builtin;
    }
    let resolved = resolve_alias(stripped, alias_map, separator);
    if resolved != stripped {
        return resolved;
    }
    qualify(stripped, namespace, separator)
}

pub fn starts_uppercase(name: &str) -> bool {
    name.chars().next().is_some_and(|ch| ch.is_uppercase())
}

/// A callee with no namespace qualifier at all is a same-file call and is
/// always internal. Qualified callees are retained only when a project
/// namespace prefix matches segment-wise.
pub fn is_project_internal(
    resolved: &str,
    was_bare: bool,
    project: &BTreeSet<String>,
    separator: &str,
) -> bool {
    if was_bare {
        return true;
    }
    project.iter().any(|prefix| {
        resolved == prefix
            || resolved.starts_with(&format!("{prefix}{separator}"))
    })
}

/// First segment of a namespace, used by project-namespace auto-detection.
pub fn namespace_root<'a>(namespace: &'a str, separator: &str) -> Option<&'a str> {
    let root = namespace.split(separator).next().unwrap_or("");
    if root.is_empty() { None } else { Some(root) }
}

/// Auto-detection: namespace roots seen in at least `min_files` files are
/// treated as project-internal. The exact threshold is heuristic and
/// configurable, not a contract.
pub fn detect_project_namespaces(roots: &[String], min_files: usize) -> BTreeSet<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for root in roots {
        *counts.entry(root.as_str()).or_default() += 1;
    }
    counts
        .into_iter()
        .filter(|(_, count)| *count >= min_files)
        .map(|(root, _)| root.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Import;

    fn scoped(module: &str, name: &str, alias: Option<&str>) -> Import {
        Import {
            module: module.to_string(),
            imported_names: vec![name.to_string()],
            alias: alias.map(|a| a.to_string()),
            is_scoped_import: true,
        }
    }

    fn whole(module: &str, alias: Option<&str>) -> Import {
        Import {
            module: module.to_string(),
            imported_names: Vec::new(),
            alias: alias.map(|a| a.to_string()),
            is_scoped_import: false,
        }
    }

    #[test]
    fn alias_map_last_import_wins() {
        let imports = vec![whole("pkg.first", Some("p")), whole("pkg.second", Some("p"))];
        let map = build_alias_map(&imports, ".");
        assert_eq!(map.get("p").map(String::as_str), Some("pkg.second"));
    }

    #[test]
    fn alias_map_scoped_import_binds_qualified_target() {
        let imports = vec![scoped("pkg.util", "helper", Some("h"))];
        let map = build_alias_map(&imports, ".");
        assert_eq!(map.get("h").map(String::as_str), Some("pkg.util.helper"));
    }

    #[test]
    fn alias_map_unaliased_single_type_import() {
        let imports = vec![whole("java.util.List", None)];
        let map = build_alias_map(&imports, ".");
        assert_eq!(map.get("List").map(String::as_str), Some("java.util.List"));
    }

    #[test]
    fn resolve_alias_substitutes_prefix_once() {
        let mut map = BTreeMap::new();
        map.insert("np".to_string(), "numpy".to_string());
        assert_eq!(resolve_alias("np.array", &map, "."), "numpy.array");
        assert_eq!(resolve_alias("np", &map, "."), "numpy");
        assert_eq!(resolve_alias("other.array", &map, "."), "other.array");
    }

    #[test]
    fn resolve_alias_does_not_chain() {
        let mut map = BTreeMap::new();
        map.insert("a".to_string(), "b".to_string());
        map.insert("b".to_string(), "c".to_string());
        assert_eq!(resolve_alias("a.f", &map, "."), "b.f");
    }

    #[test]
    fn strip_generics_handles_both_syntaxes() {
        assert_eq!(strip_generics("Repository<User>"), "Repository");
        assert_eq!(strip_generics("Generic[T]"), "Generic");
        assert_eq!(strip_generics("Map<String, List<Integer>>"), "Map");
        assert_eq!(strip_generics("Plain"), "Plain");
    }

    #[test]
    fn resolve_parent_priority_order() {
        let mut map = BTreeMap::new();
        map.insert("Base".to_string(), "lib.core.Base".to_string());
        // implicit table wins over the alias map
        assert_eq!(
            resolve_parent("Base", Some("java.lang.Base".to_string()), &map, "app", "."),
            "java.lang.Base"
        );
        // alias map wins over same-namespace fallback
        assert_eq!(resolve_parent("Base", None, &map, "app", "."), "lib.core.Base");
        // same-namespace fallback
        assert_eq!(
            resolve_parent("Local", None, &map, "app", "."),
            "app.Local"
        );
        // unresolvable without a namespace stays as written
        assert_eq!(resolve_parent("Local", None, &map, "", "."), "Local");
    }

    #[test]
    fn project_filter_prefix_is_segment_wise() {
        let project: BTreeSet<String> = ["app".to_string()].into();
        assert!(is_project_internal("app.service.run", false, &project, "."));
        assert!(!is_project_internal("apples.run", false, &project, "."));
        assert!(!is_project_internal("requests.get", false, &project, "."));
        assert!(is_project_internal("anything", true, &project, "."));
    }

    #[test]
    fn auto_detect_threshold() {
        let roots = vec![
            "app".to_string(),
            "app".to_string(),
            "app".to_string(),
            "scripts".to_string(),
        ];
        let detected = detect_project_namespaces(&roots, 2);
        assert!(detected.contains("app"));
        assert!(!detected.contains("scripts"));
    }
}
