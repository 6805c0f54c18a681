//! Ignore rules for directory scans.
//!
//! Built-in patterns are matched against the base name of every entry.
//! Caller patterns are matched twice: as `*/<pattern>` against the path
//! relative to the scan root, and as-is against the base name. `*` never
//! crosses a path separator.

use std::path::Path;

use glob::{MatchOptions, Pattern};

/// Always skipped: VCS metadata, dependency trees, lock files, binaries,
/// media, archives and fonts.
pub const DEFAULT_IGNORES: &[&str] = &[
    ".git",
    ".gitignore",
    ".gitmodules",
    ".gitattributes",
    "node_modules",
    "*.gz",
    "*.bz2",
    "*.zip",
    "*.tar",
    "*.tgz",
    "*.xz",
    "*.rar",
    "*.7z",
    "vendor",
    "*.exe",
    "*.dll",
    "*.so",
    "*.dylib",
    "*.tar.gz",
    "*.jpg",
    "*.jpeg",
    "*.png",
    "*.gif",
    "*.ico",
    "*.tif",
    "*.tiff",
    "*.bmp",
    "*.svg",
    "*.webp",
    "*.mpg",
    "*.mp2",
    "*.mpeg",
    "*.ogg",
    "*.mp3",
    "*.mp4",
    "*.avi",
    "*.pdf",
    "*.doc",
    "*.docx",
    "*.class",
    "*.pyc",
    "*.o",
    "poetry.lock",
    "yarn.lock",
    "package-lock.json",
    "composer.lock",
    "pytest_cache",
    "pypy_cache",
    "pyproject.toml",
    "poetry.toml",
    "bin",
    "LICENSE",
    "AUTHORS",
    "CONTRIBUTORS",
    "OWNERS",
    "CONTRIBUTING.md",
    "CHANGELOG.md",
    "go.sum",
    "go.mod",
    ".obsidian",
    ".vscode",
    ".idea",
    ".DS_Store",
    "*.apk",
    "*.ipa",
    "*.dmg",
    "*.iso",
    "*.msi",
    "*.deb",
    "*.rpm",
    "*.jar",
    "*.war",
    "*.ttf",
    "*.woff",
    "*.woff2",
    "*.otf",
];

const MATCH: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

#[derive(Debug, Clone)]
pub struct IgnoreRules {
    defaults: Vec<Pattern>,
    /// `*/<pattern>`, matched against the relative path
    custom_paths: Vec<Pattern>,
    /// `<pattern>`, matched against the base name
    custom_names: Vec<Pattern>,
}

impl IgnoreRules {
    /// Built-in rules plus `extra` caller patterns. Malformed patterns are
    /// skipped with a warning.
    pub fn new<S: AsRef<str>>(extra: &[S]) -> Self {
        let defaults = DEFAULT_IGNORES
            .iter()
            .filter_map(|p| Pattern::new(p).ok())
            .collect();

        let mut custom_paths = Vec::new();
        let mut custom_names = Vec::new();
        for raw in extra {
            let raw = raw.as_ref().trim();
            if raw.is_empty() {
                continue;
            }
            match (Pattern::new(&format!("*/{raw}")), Pattern::new(raw)) {
                (Ok(path), Ok(name)) => {
                    custom_paths.push(path);
                    custom_names.push(name);
                }
                (Err(e), _) | (_, Err(e)) => log::warn!("ignoring bad pattern {raw:?}: {e}"),
            }
        }

        Self {
            defaults,
            custom_paths,
            custom_names,
        }
    }

    /// `relative` is the entry's path relative to the scan root.
    pub fn is_ignored(&self, relative: &Path) -> bool {
        let Some(name) = relative.file_name().map(|n| n.to_string_lossy()) else {
            return false;
        };
        if self.defaults.iter().any(|p| p.matches_with(&name, MATCH)) {
            return true;
        }
        let rel = relative.to_string_lossy();
        self.custom_paths.iter().any(|p| p.matches_with(&rel, MATCH))
            || self.custom_names.iter().any(|p| p.matches_with(&name, MATCH))
    }
}

impl Default for IgnoreRules {
    fn default() -> Self {
        Self::new::<&str>(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ignored(rules: &IgnoreRules, rel: &str) -> bool {
        rules.is_ignored(Path::new(rel))
    }

    #[test]
    fn defaults_match_base_names_at_any_depth() {
        let rules = IgnoreRules::default();
        assert!(ignored(&rules, ".git"));
        assert!(ignored(&rules, "web/node_modules"));
        assert!(ignored(&rules, "assets/img/logo.png"));
        assert!(ignored(&rules, "dist/app.tar.gz"));
        assert!(ignored(&rules, "Cargo/LICENSE"));
        assert!(!ignored(&rules, "src/main.rs"));
        assert!(!ignored(&rules, "README.md"));
    }

    #[test]
    fn every_default_pattern_compiles() {
        assert_eq!(IgnoreRules::default().defaults.len(), DEFAULT_IGNORES.len());
    }

    #[test]
    fn custom_pattern_matches_base_name() {
        let rules = IgnoreRules::new(&["tests", "*.snap"]);
        assert!(ignored(&rules, "tests"));
        assert!(ignored(&rules, "crate/tests"));
        assert!(ignored(&rules, "a/b/c/out.snap"));
        assert!(!ignored(&rules, "src/testsuite.rs"));
    }

    #[test]
    fn custom_path_pattern_is_one_level_deep() {
        let rules = IgnoreRules::new(&["docs/internal"]);
        assert!(ignored(&rules, "project/docs/internal"));
        // `*` does not cross separators
        assert!(!ignored(&rules, "a/b/docs/internal"));
    }

    #[test]
    fn blank_and_malformed_patterns_are_skipped() {
        let rules = IgnoreRules::new(&["", "  ", "[unclosed"]);
        assert!(rules.custom_paths.is_empty());
        assert!(!ignored(&rules, "src/lib.rs"));
    }

    #[test]
    fn scan_root_is_never_ignored() {
        let rules = IgnoreRules::new(&["*"]);
        assert!(!ignored(&rules, ""));
    }
}
