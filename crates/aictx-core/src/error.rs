//! Error taxonomy for batch ingestion.
//!
//! - [`Rejected`](crate::Rejected): classification failure, recorded, never dispatched
//! - [`CollaboratorError`]: failure inside one produce call, recorded per item
//! - [`SetupError`]: shared output location unusable, aborts before dispatch
//! - [`PipelineError::Cleanup`]: shared scratch removal failed, recorded last

use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::classify::Rejected;

/// Failure inside a single collaborator call.
#[derive(Debug)]
pub enum CollaboratorError {
    /// Network or HTTP status failure
    Http {
        status: Option<u16>,
        message: String,
    },
    /// Local filesystem failure
    Io(io::Error),
    /// Response or input could not be interpreted
    Parse(String),
    /// External program exited unsuccessfully
    Command {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
    /// The collaborator panicked; the pool recovered
    Panicked(String),
}

impl fmt::Display for CollaboratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http {
                status: Some(s),
                message,
            } => write!(f, "HTTP {s}: {message}"),
            Self::Http {
                status: None,
                message,
            } => write!(f, "HTTP error: {message}"),
            Self::Io(e) => write!(f, "IO: {e}"),
            Self::Parse(msg) => write!(f, "parse: {msg}"),
            Self::Command {
                program,
                code,
                stderr,
            } => {
                match code {
                    Some(c) => write!(f, "{program} exited with status {c}")?,
                    None => write!(f, "{program} terminated by signal")?,
                }
                let stderr = stderr.trim();
                if !stderr.is_empty() {
                    write!(f, ": {stderr}")?;
                }
                Ok(())
            }
            Self::Panicked(msg) => write!(f, "panicked: {msg}"),
        }
    }
}

impl std::error::Error for CollaboratorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for CollaboratorError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// A recorded per-location failure in a batch outcome.
#[derive(Debug)]
pub enum PipelineError {
    Classification(Rejected),
    Collaborator(CollaboratorError),
    Cleanup { path: PathBuf, source: io::Error },
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Classification(e) => write!(f, "{e}"),
            Self::Collaborator(e) => write!(f, "{e}"),
            Self::Cleanup { path, source } => {
                write!(f, "cannot remove {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Classification(e) => Some(e),
            Self::Collaborator(e) => Some(e),
            Self::Cleanup { source, .. } => Some(source),
        }
    }
}

impl From<Rejected> for PipelineError {
    fn from(e: Rejected) -> Self {
        Self::Classification(e)
    }
}

impl From<CollaboratorError> for PipelineError {
    fn from(e: CollaboratorError) -> Self {
        Self::Collaborator(e)
    }
}

/// Fatal failure before any item is dispatched.
#[derive(Debug)]
pub enum SetupError {
    /// Output or scratch directory cannot be created
    Directory { path: PathBuf, source: io::Error },
    /// Worker threads cannot be started
    Threads(String),
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Directory { path, source } => {
                write!(f, "cannot prepare {}: {source}", path.display())
            }
            Self::Threads(msg) => write!(f, "cannot start workers: {msg}"),
        }
    }
}

impl std::error::Error for SetupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Directory { source, .. } => Some(source),
            Self::Threads(_) => None,
        }
    }
}
