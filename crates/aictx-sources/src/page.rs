//! Generic web pages: fetch, download images locally, convert to markdown.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use aictx_core::{CollaboratorError, IMAGE_DIR, Produce, ProduceOptions};
use regex::Regex;
use url::Url;
use uuid::Uuid;

use crate::http;
use crate::markdown::to_markdown;

/// Largest image downloaded (16 MiB)
const MAX_IMAGE_BYTES: usize = 16 * 1024 * 1024;

static LINKED_IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[!\[(.*?)\]\((.*?)\)\]\(.*?\)").expect("invalid regex")
});

/// `[![alt](src)](href)` → `![alt](src)`
pub fn unwrap_linked_images(markdown: &str) -> String {
    LINKED_IMAGE.replace_all(markdown, "![$1]($2)").into_owned()
}

/// Local file name for an image: random, keeping the source extension.
pub fn image_file_name(src: &Url) -> String {
    let ext = Path::new(src.path())
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    format!("{}{ext}", Uuid::new_v4())
}

/// Download `src` into `image_dir`, returning the markdown reference
/// (`images/<name>`). Failures are logged and yield `None`.
fn download_image(src: &Url, image_dir: &Path) -> Option<String> {
    if !matches!(src.scheme(), "http" | "https") {
        return None;
    }
    let bytes = match http::get_bytes(src.as_str(), MAX_IMAGE_BYTES) {
        Ok(bytes) => bytes,
        Err(e) => {
            log::warn!("skipping image {src}: {e}");
            return None;
        }
    };
    let name = image_file_name(src);
    if let Err(e) = fs::write(image_dir.join(&name), bytes) {
        log::warn!("skipping image {src}: {e}");
        return None;
    }
    Some(format!("{IMAGE_DIR}/{name}"))
}

pub fn render(url: &Url, markdown: &str) -> String {
    format!(
        "# Webpage Context: {}\n\nSource: {url}\n\n{markdown}",
        url.host_str().unwrap_or_default()
    )
}

/// Collaborator for any other web URL
#[derive(Debug, Default, Clone, Copy)]
pub struct PageSource;

impl Produce for PageSource {
    fn produce(
        &self,
        location: &str,
        options: &ProduceOptions<'_>,
    ) -> Result<PathBuf, CollaboratorError> {
        let url = Url::parse(location)
            .map_err(|e| CollaboratorError::Parse(format!("{location}: {e}")))?;
        let html = http::get_text(url.as_str())?;

        let mut saved = 0usize;
        let mut images = |src: &Url| {
            let local = download_image(src, options.image_dir);
            saved += usize::from(local.is_some());
            local
        };
        let markdown = unwrap_linked_images(&to_markdown(&html, Some(&url), &mut images));
        log::debug!("{location}: {saved} images saved");

        fs::write(options.artifact, render(&url, &markdown))?;
        Ok(options.artifact.to_path_buf())
    }
}
