//! Collaborator contract: one blocking `produce` call per work item.
//!
//! The pool knows nothing about git, HTTP or HTML. It hands each item to the
//! [`Produce`] implementation registered for its [`SourceKind`] and treats the
//! call as a black box that either writes the artifact or fails.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::classify::SourceKind;
use crate::error::CollaboratorError;

/// Per-call options passed to a collaborator.
#[derive(Debug, Clone, Copy)]
pub struct ProduceOptions<'a> {
    /// Where the artifact must be written (unique within the batch)
    pub artifact: &'a Path,
    /// Caller-supplied ignore patterns (directory and repository sources)
    pub ignore_patterns: &'a [String],
    /// Shared scratch directory for side artifacts such as images
    pub image_dir: &'a Path,
}

/// Turns one location into one artifact.
pub trait Produce: Send + Sync {
    fn produce(
        &self,
        location: &str,
        options: &ProduceOptions<'_>,
    ) -> Result<PathBuf, CollaboratorError>;
}

impl<F> Produce for F
where
    F: Fn(&str, &ProduceOptions<'_>) -> Result<PathBuf, CollaboratorError> + Send + Sync,
{
    fn produce(
        &self,
        location: &str,
        options: &ProduceOptions<'_>,
    ) -> Result<PathBuf, CollaboratorError> {
        self(location, options)
    }
}

/// Batch-wide settings shared by every produce call.
#[derive(Debug, Clone, Default)]
pub struct SharedOptions {
    pub ignore_patterns: Vec<String>,
    pub image_dir: PathBuf,
}

impl SharedOptions {
    pub fn for_artifact<'a>(&'a self, artifact: &'a Path) -> ProduceOptions<'a> {
        ProduceOptions {
            artifact,
            ignore_patterns: &self.ignore_patterns,
            image_dir: &self.image_dir,
        }
    }
}

/// Routing table from source kind to collaborator.
#[derive(Clone)]
pub struct Collaborators {
    repository: Arc<dyn Produce>,
    transcript: Arc<dyn Produce>,
    directory: Arc<dyn Produce>,
    page: Arc<dyn Produce>,
}

impl Collaborators {
    pub fn new(
        repository: Arc<dyn Produce>,
        transcript: Arc<dyn Produce>,
        directory: Arc<dyn Produce>,
        page: Arc<dyn Produce>,
    ) -> Self {
        Self {
            repository,
            transcript,
            directory,
            page,
        }
    }

    /// Route every kind to the same collaborator (instrumentation, tests)
    pub fn uniform(producer: Arc<dyn Produce>) -> Self {
        Self::new(producer.clone(), producer.clone(), producer.clone(), producer)
    }

    pub fn for_kind(&self, kind: SourceKind) -> &dyn Produce {
        match kind {
            SourceKind::Repository => self.repository.as_ref(),
            SourceKind::Transcript => self.transcript.as_ref(),
            SourceKind::Directory => self.directory.as_ref(),
            SourceKind::GenericPage => self.page.as_ref(),
        }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tagged(tag: &'static str) -> Arc<dyn Produce> {
        Arc::new(
            move |_: &str, _: &ProduceOptions<'_>| -> Result<PathBuf, CollaboratorError> {
                Ok(PathBuf::from(tag))
            },
        )
    }

    #[test]
    fn routes_by_kind() {
        let c = Collaborators::new(
            tagged("repo"),
            tagged("transcript"),
            tagged("dir"),
            tagged("page"),
        );
        let shared = SharedOptions::default();
        let artifact = PathBuf::from("out.md");
        let opts = shared.for_artifact(&artifact);
        for (kind, expected) in [
            (SourceKind::Repository, "repo"),
            (SourceKind::Transcript, "transcript"),
            (SourceKind::Directory, "dir"),
            (SourceKind::GenericPage, "page"),
        ] {
            let out = c.for_kind(kind).produce("x", &opts).unwrap();
            assert_eq!(out, PathBuf::from(expected));
        }
    }

    #[test]
    fn options_borrow_shared_settings() {
        let shared = SharedOptions {
            ignore_patterns: vec!["tests".into()],
            image_dir: PathBuf::from("context/images"),
        };
        let artifact = PathBuf::from("context/dir-a.md");
        let opts = shared.for_artifact(&artifact);
        assert_eq!(opts.artifact, Path::new("context/dir-a.md"));
        assert_eq!(opts.ignore_patterns, ["tests".to_string()]);
        assert_eq!(opts.image_dir, Path::new("context/images"));
    }
}
