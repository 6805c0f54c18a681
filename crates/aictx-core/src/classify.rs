//! Location classification: raw input string → typed work item.
//!
//! Rules are checked in a fixed priority order and the first match wins:
//! video host, source-control host, local path, any other web URL.
//! Everything else is rejected.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

static TRANSCRIPT_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://(youtu\.be/.+|(www\.)?youtube\.com/watch\?v=.+)").expect("invalid regex")
});

static REPOSITORY_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://(github\.com|gitlab\.com)/[^/]+/.+").expect("invalid regex")
});

static WEB_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://.+").expect("invalid regex"));

/// Kind of content source behind a location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SourceKind {
    Repository,
    Transcript,
    Directory,
    GenericPage,
}

impl SourceKind {
    pub const ALL: [SourceKind; 4] = [
        SourceKind::Repository,
        SourceKind::Transcript,
        SourceKind::Directory,
        SourceKind::GenericPage,
    ];

    /// File name prefix for artifacts of this kind
    pub fn artifact_prefix(self) -> &'static str {
        match self {
            Self::Repository => "repo",
            Self::Transcript => "transcript",
            Self::Directory => "dir",
            Self::GenericPage => "page",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Repository => "repository",
            Self::Transcript => "transcript",
            Self::Directory => "directory",
            Self::GenericPage => "page",
        };
        f.write_str(name)
    }
}

/// One classified unit of input, consumed exactly once by a worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub location: String,
    pub kind: SourceKind,
}

/// A location no rule matched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejected {
    pub location: String,
}

impl fmt::Display for Rejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unrecognized location format: {:?}", self.location)
    }
}

impl std::error::Error for Rejected {}

fn is_local_path(location: &str) -> bool {
    matches!(location, "." | "..")
        || location.starts_with("./")
        || location.starts_with("../")
        || location.starts_with('/')
}

/// Classify a raw location string.
///
/// Pure and deterministic: the same input always yields the same kind.
pub fn classify(location: &str) -> Result<WorkItem, Rejected> {
    let kind = if TRANSCRIPT_URL.is_match(location) {
        SourceKind::Transcript
    } else if REPOSITORY_URL.is_match(location) {
        SourceKind::Repository
    } else if is_local_path(location) {
        SourceKind::Directory
    } else if WEB_URL.is_match(location) {
        SourceKind::GenericPage
    } else {
        return Err(Rejected {
            location: location.to_string(),
        });
    };

    Ok(WorkItem {
        location: location.to_string(),
        kind,
    })
}

/// Extract the video identifier from a video-host URL.
///
/// `https://youtu.be/<id>` uses the last path segment; the long forms use the
/// `v` query parameter.
pub fn video_id(location: &str) -> Option<String> {
    let url = Url::parse(location).ok()?;
    let host = url.host_str()?;
    let id = if host == "youtu.be" {
        url.path_segments()?.rfind(|s| !s.is_empty())?.to_string()
    } else if host.ends_with("youtube.com") {
        url.query_pairs()
            .find(|(k, _)| k == "v")
            .map(|(_, v)| v.into_owned())?
    } else {
        return None;
    };
    (!id.is_empty()).then_some(id)
}
