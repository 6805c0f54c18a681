//! Remote repositories: shallow clone, then scan like a local directory.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use aictx_core::{CollaboratorError, Produce, ProduceOptions};
use url::Url;

use crate::directory::write_context;
use crate::ignore::IgnoreRules;

/// Environment variable holding a GitHub access token for private repositories
pub const TOKEN_ENV: &str = "GH_TOKEN";

/// Only clones from this host carry the token
pub const TOKEN_HOST: &str = "github.com";

/// Clone URL with `token` as basic-auth credentials (user `git`). URLs on any
/// host other than [`TOKEN_HOST`] are returned unchanged.
pub fn authenticated_url(location: &str, token: Option<&str>) -> Result<String, CollaboratorError> {
    let Some(token) = token.filter(|t| !t.is_empty()) else {
        return Ok(location.to_string());
    };
    let mut url =
        Url::parse(location).map_err(|e| CollaboratorError::Parse(format!("{location}: {e}")))?;
    if url.host_str() != Some(TOKEN_HOST) {
        return Ok(location.to_string());
    }
    url.set_username("git")
        .and_then(|()| url.set_password(Some(token)))
        .map_err(|()| CollaboratorError::Parse(format!("{location}: cannot carry credentials")))?;
    Ok(url.into())
}

fn redact(text: &str, token: Option<&str>) -> String {
    match token.filter(|t| !t.is_empty()) {
        Some(t) => text.replace(t, "***"),
        None => text.to_string(),
    }
}

/// `git clone --depth 1 <url> <dest>`
pub fn shallow_clone(url: &str, dest: &Path, token: Option<&str>) -> Result<(), CollaboratorError> {
    let output = Command::new("git")
        .args(["clone", "--depth", "1", "--quiet", url])
        .arg(dest)
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .output()?;

    if output.status.success() {
        return Ok(());
    }
    Err(CollaboratorError::Command {
        program: "git".into(),
        code: output.status.code(),
        stderr: redact(&String::from_utf8_lossy(&output.stderr), token),
    })
}

/// Collaborator for source-control URLs
#[derive(Debug, Default, Clone, Copy)]
pub struct RepositorySource;

impl Produce for RepositorySource {
    fn produce(
        &self,
        location: &str,
        options: &ProduceOptions<'_>,
    ) -> Result<PathBuf, CollaboratorError> {
        let token = std::env::var(TOKEN_ENV).ok();
        let url = authenticated_url(location, token.as_deref())?;
        if url != location {
            log::debug!("{location}: using {TOKEN_ENV} for authentication");
        }

        // removed on drop, success or not
        let checkout = tempfile::Builder::new().prefix("aictx-clone-").tempdir()?;
        shallow_clone(&url, checkout.path(), token.as_deref())?;
        log::debug!("{location}: cloned into {}", checkout.path().display());

        write_context(
            checkout.path(),
            &IgnoreRules::new(options.ignore_patterns),
            options.artifact,
        )
    }
}
