//! aictx sources - the collaborators behind each source kind
//!
//! Each source turns one location into one markdown artifact with a single
//! blocking call. Network access goes through the shared client in [`http`].

pub mod directory;
pub mod http;
pub mod ignore;
pub mod markdown;
pub mod page;
pub mod repository;
pub mod transcript;

use std::sync::Arc;

use aictx_core::Collaborators;

// Re-exports for convenience
pub use directory::{DirectorySource, is_binary};
pub use http::{HttpConfig, HttpError, SHARED_RUNTIME, http_client, set_http_config};
pub use ignore::{DEFAULT_IGNORES, IgnoreRules};
pub use page::PageSource;
pub use repository::RepositorySource;
pub use transcript::{TranscriptEndpoints, TranscriptSource};

/// Routing table with the real collaborator for every source kind.
pub fn collaborators(endpoints: TranscriptEndpoints) -> Collaborators {
    Collaborators::new(
        Arc::new(RepositorySource),
        Arc::new(TranscriptSource::new(endpoints)),
        Arc::new(DirectorySource),
        Arc::new(PageSource),
    )
}
