//! Relative import resolution to candidate file keys.

use crate::config::{DependencyEdge, ImportDescriptor};

/// Whether the specifier points inside the project.
pub fn is_relative(specifier: &str) -> bool {
    specifier.starts_with("./") || specifier.starts_with("../") || specifier == "." || specifier == ".."
}

/// Resolve a relative specifier written in `from_key` to a candidate file key.
///
/// Bare and absolute specifiers are external and resolve to `None`.
/// The candidate is not checked against the set of known files.
pub fn resolve_specifier(from_key: &str, specifier: &str) -> Option<String> {
    if !is_relative(specifier) {
        return None;
    }
    let dir = match from_key.rfind('/') {
        Some(idx) => &from_key[..idx],
        None => "",
    };
    let joined = if dir.is_empty() {
        specifier.to_string()
    } else {
        format!("{dir}/{specifier}")
    };
    let path = normalize_path(&joined);
    if path.is_empty() || path.starts_with("..") {
        return None;
    }
    Some(infer_extension(&path))
}

fn infer_extension(path: &str) -> String {
    if let Some(stem) = path.strip_suffix(".jsx") {
        format!("{stem}.tsx")
    } else if let Some(stem) = path.strip_suffix(".js") {
        format!("{stem}.ts")
    } else if path.ends_with(".ts") || path.ends_with(".tsx") {
        path.to_string()
    } else {
        format!("{path}.ts")
    }
}

/// One edge per import whose specifier resolves.
pub fn resolve_edges(from_key: &str, imports: &[ImportDescriptor]) -> Vec<DependencyEdge> {
    imports
        .iter()
        .filter_map(|import| {
            let to = resolve_specifier(from_key, &import.source)?;
            Some(DependencyEdge {
                from: from_key.to_string(),
                to,
                specifiers: import.specifiers.clone(),
                type_only: import.type_only,
            })
        })
        .collect()
}

/// Collapse `.`/`..` segments and convert backslashes.
pub fn normalize_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "." | "" => {}
            ".." => {
                if !parts.is_empty() && parts.last() != Some(&"..") {
                    parts.pop();
                } else {
                    parts.push("..");
                }
            }
            _ => parts.push(segment),
        }
    }
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_segments() {
        assert_eq!(normalize_path("src/./a/../b.ts"), "src/b.ts");
        assert_eq!(normalize_path("src\\win\\path.ts"), "src/win/path.ts");
        assert_eq!(normalize_path("../up.ts"), "../up.ts");
    }

    #[test]
    fn extension_inference() {
        assert_eq!(resolve_specifier("src/a.ts", "./b.js").as_deref(), Some("src/b.ts"));
        assert_eq!(resolve_specifier("src/a.ts", "./view.jsx").as_deref(), Some("src/view.tsx"));
        assert_eq!(resolve_specifier("src/a.ts", "./c").as_deref(), Some("src/c.ts"));
        assert_eq!(resolve_specifier("src/a.ts", "./d.ts").as_deref(), Some("src/d.ts"));
        assert_eq!(resolve_specifier("src/a.ts", "./e.tsx").as_deref(), Some("src/e.tsx"));
    }

    #[test]
    fn parent_directory_specifiers() {
        assert_eq!(
            resolve_specifier("src/services/user.service.ts", "../repositories/user.repository.js")
                .as_deref(),
            Some("src/repositories/user.repository.ts")
        );
        assert_eq!(resolve_specifier("index.ts", "./src/app").as_deref(), Some("src/app.ts"));
        assert_eq!(resolve_specifier("index.ts", "../outside"), None);
    }

    #[test]
    fn bare_and_absolute_specifiers_are_external() {
        assert_eq!(resolve_specifier("src/a.ts", "express"), None);
        assert_eq!(resolve_specifier("src/a.ts", "@scope/pkg"), None);
        assert_eq!(resolve_specifier("src/a.ts", "/abs/path"), None);
    }

    #[test]
    fn edges_carry_specifiers() {
        let imports = vec![
            ImportDescriptor {
                source: "./b.js".to_string(),
                specifiers: vec!["run".to_string()],
                type_only: false,
            },
            ImportDescriptor {
                source: "lodash".to_string(),
                specifiers: vec!["map".to_string()],
                type_only: false,
            },
            ImportDescriptor {
                source: "./types".to_string(),
                specifiers: vec!["User".to_string()],
                type_only: true,
            },
        ];
        let edges = resolve_edges("src/a.ts", &imports);
        assert_eq!(edges.len(), 2);
        assert_eq!(edges[0].to, "src/b.ts");
        assert_eq!(edges[0].specifiers, vec!["run"]);
        assert_eq!(edges[1].to, "src/types.ts");
        assert!(edges[1].type_only);
    }
}
