//! Artifact file naming.
//!
//! Every accepted item gets `<prefix>-<slug>.md` in the output directory.
//! Names are assigned on the coordinator thread before dispatch, in input
//! order, so two items never write the same file.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use url::Url;

use crate::classify::{SourceKind, WorkItem, video_id};

const MAX_SLUG_LEN: usize = 80;

/// Filesystem-safe slug: `[A-Za-z0-9._-]`, runs of anything else become one
/// `-`, no leading or trailing separators.
pub fn sanitize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() || c == '.' || c == '_' {
            out.push(c);
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    let trimmed = out.trim_matches(|c| c == '-' || c == '.');
    let mut slug: String = trimmed.chars().take(MAX_SLUG_LEN).collect();
    while slug.ends_with('-') || slug.ends_with('.') {
        slug.pop();
    }
    slug
}

/// Unsanitized slug source for one location
fn raw_slug(item: &WorkItem) -> String {
    let location = item.location.as_str();
    match item.kind {
        SourceKind::Transcript => video_id(location).unwrap_or_else(|| location.to_string()),
        SourceKind::Repository => Url::parse(location)
            .ok()
            .and_then(|url| {
                let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).take(2).collect();
                Some(segments.join("-"))
            })
            .map(|s| s.trim_end_matches(".git").to_string())
            .unwrap_or_else(|| location.to_string()),
        SourceKind::GenericPage => Url::parse(location)
            .ok()
            .map(|url| format!("{}{}", url.host_str().unwrap_or_default(), url.path()))
            .unwrap_or_else(|| location.to_string()),
        SourceKind::Directory => directory_name(Path::new(location)),
    }
}

/// Base name of a directory location; `.`, `..` and `/` resolve through the
/// filesystem when possible.
fn directory_name(path: &Path) -> String {
    let named = |p: &Path| {
        p.file_name()
            .filter(|n| *n != "." && *n != "..")
            .map(|n| n.to_string_lossy().into_owned())
    };
    named(path)
        .or_else(|| path.canonicalize().ok().as_deref().and_then(named))
        .unwrap_or_else(|| "root".to_string())
}

/// Assigns collision-free artifact paths within one batch.
#[derive(Debug)]
pub struct ArtifactNamer {
    output_dir: PathBuf,
    taken: HashSet<String>,
}

impl ArtifactNamer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            taken: HashSet::new(),
        }
    }

    /// Path for `item`. Repeated slugs get `-2`, `-3`, ... in call order.
    pub fn assign(&mut self, item: &WorkItem) -> PathBuf {
        let mut slug = sanitize(&raw_slug(item));
        if slug.is_empty() {
            slug = "item".to_string();
        }
        let base = format!("{}-{slug}", item.kind.artifact_prefix());

        let mut name = base.clone();
        let mut n = 1;
        while !self.taken.insert(name.clone()) {
            n += 1;
            name = format!("{base}-{n}");
        }
        self.output_dir.join(format!("{name}.md"))
    }
}
