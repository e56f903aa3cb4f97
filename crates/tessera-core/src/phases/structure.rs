//! File keys, include/exclude policy, role and layer heuristics.

use std::path::Path;

use ignore::gitignore::{Gitignore, GitignoreBuilder};

use crate::config::FileRole;
use crate::error::{Result, TesseraError};
use crate::phases::imports::normalize_path;

/// Include/exclude glob policy evaluated against file keys.
#[derive(Debug)]
pub struct PathPolicy {
    include: Gitignore,
    exclude: Gitignore,
}

impl PathPolicy {
    pub fn new(root: &Path, include: &[String], exclude: &[String]) -> Result<Self> {
        Ok(Self {
            include: build_matcher(root, include)?,
            exclude: build_matcher(root, exclude)?,
        })
    }

    /// Whether the file key survives the policy. An empty include list keeps everything.
    pub fn retains(&self, key: &str) -> bool {
        let included = self.include.is_empty()
            || self
                .include
                .matched_path_or_any_parents(key, false)
                .is_ignore();
        included
            && !self
                .exclude
                .matched_path_or_any_parents(key, false)
                .is_ignore()
    }
}

/// Gitignore-style matcher over `patterns`, relative to `root`.
pub(crate) fn build_matcher(root: &Path, patterns: &[String]) -> Result<Gitignore> {
    let mut builder = GitignoreBuilder::new(root);
    for pattern in patterns {
        builder
            .add_line(None, pattern)
            .map_err(|source| TesseraError::Glob {
                pattern: pattern.clone(),
                source,
            })?;
    }
    builder.build().map_err(|source| TesseraError::Glob {
        pattern: patterns.join(", "),
        source,
    })
}

/// Project-relative, forward-slash key for `path`.
pub fn normalize_key(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    normalize_path(&rel.to_string_lossy())
}

/// Whether the key names a declaration-only file.
pub fn is_declaration_key(key: &str) -> bool {
    key.ends_with(".d.ts") || key.ends_with(".d.mts") || key.ends_with(".d.cts")
}

/// Classify a file by path substrings. Test detection wins over everything else.
pub fn classify_role(key: &str) -> FileRole {
    let lower = key.to_lowercase();
    let has = |needle: &str| lower.contains(needle);

    if has(".test.")
        || has(".spec.")
        || has("__tests__/")
        || has("/test/")
        || has("/tests/")
        || lower.starts_with("test/")
        || lower.starts_with("tests/")
    {
        return FileRole::Test;
    }
    if has("controller") {
        return FileRole::Controller;
    }
    if has("service") {
        return FileRole::Service;
    }
    if has("repository") || has("/repositories/") {
        return FileRole::Repository;
    }
    if has("config") {
        return FileRole::Config;
    }
    if has("/types/")
        || has(".types.")
        || has(".d.")
        || has("/models/")
        || has(".model.")
        || has("/interfaces/")
    {
        return FileRole::Type;
    }
    if has("util") || has("helper") {
        return FileRole::Util;
    }
    FileRole::Unknown
}

/// First configured layer occurring in the key, case-insensitively.
pub fn assign_layer(key: &str, layers: &[String]) -> Option<String> {
    let lower = key.to_lowercase();
    layers
        .iter()
        .find(|layer| !layer.is_empty() && lower.contains(&layer.to_lowercase()))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_wins() {
        assert_eq!(classify_role("src/user.controller.test.ts"), FileRole::Test);
        assert_eq!(classify_role("src/__tests__/service.ts"), FileRole::Test);
        assert_eq!(classify_role("tests/helpers.ts"), FileRole::Test);
        assert_eq!(classify_role("src/services/user.spec.ts"), FileRole::Test);
    }

    #[test]
    fn role_heuristics_in_order() {
        assert_eq!(classify_role("src/controllers/user.controller.ts"), FileRole::Controller);
        assert_eq!(classify_role("src/services/user.service.ts"), FileRole::Service);
        assert_eq!(classify_role("src/data/user.repository.ts"), FileRole::Repository);
        assert_eq!(classify_role("src/app.config.ts"), FileRole::Config);
        assert_eq!(classify_role("src/types/user.ts"), FileRole::Type);
        assert_eq!(classify_role("src/user.model.ts"), FileRole::Type);
        assert_eq!(classify_role("src/utils/format.ts"), FileRole::Util);
        assert_eq!(classify_role("src/string-helpers.ts"), FileRole::Util);
        assert_eq!(classify_role("src/main.ts"), FileRole::Unknown);
    }

    #[test]
    fn layer_is_first_case_insensitive_match() {
        let layers = vec!["Domain".to_string(), "infra".to_string()];
        assert_eq!(assign_layer("src/domain/user.ts", &layers), Some("Domain".to_string()));
        assert_eq!(assign_layer("src/Infra/db.ts", &layers), Some("infra".to_string()));
        assert_eq!(assign_layer("src/app.ts", &layers), None);
        assert_eq!(assign_layer("src/app.ts", &[]), None);
    }

    #[test]
    fn policy_include_and_exclude() {
        let root = Path::new("/repo");
        let policy = PathPolicy::new(
            root,
            &["src/**".to_string()],
            &["**/*.d.ts".to_string(), "**/generated/**".to_string()],
        )
        .unwrap();
        assert!(policy.retains("src/app.ts"));
        assert!(policy.retains("src/deep/nested/app.ts"));
        assert!(!policy.retains("scripts/build.ts"));
        assert!(!policy.retains("src/global.d.ts"));
        assert!(!policy.retains("src/generated/api.ts"));
    }

    #[test]
    fn empty_include_retains_everything() {
        let policy = PathPolicy::new(Path::new("/repo"), &[], &[]).unwrap();
        assert!(policy.retains("anything/at/all.ts"));
    }

    #[test]
    fn invalid_glob_is_a_config_error() {
        let err = PathPolicy::new(Path::new("/repo"), &["src/{a,b".to_string()], &[]).unwrap_err();
        assert!(matches!(err, TesseraError::Glob { .. }));
    }

    #[test]
    fn keys_are_relative_and_forward_slashed() {
        assert_eq!(
            normalize_key(Path::new("/repo"), Path::new("/repo/src/./a/../b.ts")),
            "src/b.ts"
        );
        assert!(is_declaration_key("src/global.d.ts"));
        assert!(!is_declaration_key("src/data.ts"));
    }
}
