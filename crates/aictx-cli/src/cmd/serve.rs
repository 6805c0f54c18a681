//! Serve subcommand - JSON API over a single context file
//!
//! Every generate request replaces the output directory's context with the
//! artifact of one location. Requests that touch the directory run one at a
//! time.
//!
//! # Routes
//!
//! - `POST /generate` - `{url, ignore}` in, `{content}` out
//! - `GET /load` - current context, empty when there is none
//! - `POST /clear` - remove context files and downloaded images
//! - `GET /download` - the context file, zipped with `images/` when a page
//!   saved any

use std::fs;
use std::io::{Cursor, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use aictx_core::{BatchConfig, Collaborators, IMAGE_DIR, NoProgress, PipelineError, run_batch};
use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Args;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::run::merge_patterns;
use crate::config::Config;

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on (default: serve.bind from config)
    #[arg(short, long)]
    pub bind: Option<SocketAddr>,

    /// Output directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn run(args: ServeArgs, config: &Config) -> Result<ExitCode> {
    let bind = args.bind.unwrap_or(config.serve.bind);
    let state = ServeState::new(
        args.output.unwrap_or_else(|| config.output.dir.clone()),
        config.ignore.patterns.clone(),
        aictx_sources::collaborators(config.endpoints()),
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("aictx-serve")
        .build()
        .context("Failed to start server runtime")?;
    runtime.block_on(serve(bind, state))?;
    Ok(ExitCode::SUCCESS)
}

async fn serve(bind: SocketAddr, state: ServeState) -> Result<()> {
    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to listen on {bind}"))?;
    // printed even when logging is quiet
    eprintln!("Serving on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server stopped unexpectedly")?;
    log::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!("cannot listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}

/// Shared by every handler; clones are cheap
#[derive(Clone)]
pub struct ServeState {
    output_dir: Arc<PathBuf>,
    ignore_patterns: Arc<Vec<String>>,
    collaborators: Collaborators,
    busy: Arc<Mutex<()>>,
}

impl ServeState {
    pub fn new(output_dir: PathBuf, ignore_patterns: Vec<String>, collaborators: Collaborators) -> Self {
        Self {
            output_dir: Arc::new(output_dir),
            ignore_patterns: Arc::new(ignore_patterns),
            collaborators,
            busy: Arc::new(Mutex::new(())),
        }
    }

    /// Clear the output directory, then run a one-item batch with a budget
    /// of one and return the artifact text.
    fn generate(&self, url: &str, ignore: &[String]) -> Result<String, ApiError> {
        if let Err(e) = clear_context(&self.output_dir) {
            log::warn!("could not clear {}: {e}", self.output_dir.display());
        }
        let config = BatchConfig {
            output_dir: self.output_dir.to_path_buf(),
            budget: 1,
            ignore_patterns: merge_patterns(&self.ignore_patterns, ignore),
        };
        let outcome = run_batch(&[url], &config, &self.collaborators, &NoProgress)
            .map_err(|e| ApiError::Internal(e.to_string()))?;

        let Some((_, artifact)) = outcome.artifacts.first() else {
            return Err(match outcome.errors.first() {
                Some((_, e @ PipelineError::Classification(_))) => ApiError::BadRequest(e.to_string()),
                Some((_, e)) => ApiError::Internal(e.to_string()),
                None => ApiError::Internal("no context file produced".into()),
            });
        };
        fs::read_to_string(artifact).map_err(|e| {
            log::error!("cannot read {}: {e}", artifact.display());
            ApiError::Internal("Failed to read context file".into())
        })
    }
}

pub fn router(state: ServeState) -> Router {
    Router::new()
        .route("/generate", post(generate))
        .route("/load", get(load))
        .route("/clear", post(clear))
        .route("/download", get(download))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub ignore: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub content: String,
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            Self::NotFound(m) => (StatusCode::NOT_FOUND, m),
            Self::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Run filesystem and pipeline work off the async workers
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(format!("request worker failed: {e}")))?
}

async fn generate(
    State(state): State<ServeState>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let url = request.url.trim().to_string();
    if url.is_empty() {
        return Err(ApiError::BadRequest("URL is required".into()));
    }
    log::info!("generate: {url}");

    let _busy = state.busy.lock().await;
    let worker = state.clone();
    let content = blocking(move || worker.generate(&url, &request.ignore)).await?;
    Ok(Json(GenerateResponse { content }))
}

async fn load(State(state): State<ServeState>) -> Result<Json<GenerateResponse>, ApiError> {
    let dir = state.output_dir.clone();
    let content = blocking(move || {
        let Some(path) = find_context_file(&dir) else {
            return Ok(String::new());
        };
        fs::read_to_string(&path).map_err(|e| {
            log::error!("cannot read {}: {e}", path.display());
            ApiError::Internal("Failed to read context file".into())
        })
    })
    .await?;
    Ok(Json(GenerateResponse { content }))
}

async fn clear(State(state): State<ServeState>) -> Result<StatusCode, ApiError> {
    let _busy = state.busy.lock().await;
    let dir = state.output_dir.clone();
    blocking(move || {
        clear_context(&dir).map_err(|e| {
            log::error!("cannot clear {}: {e}", dir.display());
            ApiError::Internal("Failed to clear context file".into())
        })
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn download(State(state): State<ServeState>) -> Result<Bundle, ApiError> {
    let dir = state.output_dir.clone();
    blocking(move || bundle(&dir)).await
}

/// First markdown file in `dir`, by name
pub fn find_context_file(dir: &Path) -> Option<PathBuf> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "md"))
        .collect();
    files.sort();
    files.into_iter().next()
}

/// Remove every markdown file in `dir` and the image directory. Individual
/// markdown files that cannot be removed are logged and skipped.
pub fn clear_context(dir: &Path) -> std::io::Result<()> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "md") {
            if let Err(e) = fs::remove_file(&path) {
                log::warn!("cannot remove {}: {e}", path.display());
            }
        }
    }
    let images = dir.join(IMAGE_DIR);
    if images.exists() {
        fs::remove_dir_all(&images)?;
    }
    Ok(())
}

/// Downloadable context: the markdown alone, or a zip with its images
#[derive(Debug)]
pub struct Bundle {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

impl IntoResponse for Bundle {
    fn into_response(self) -> Response {
        (
            [
                (header::CONTENT_TYPE, self.content_type.to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", self.file_name),
                ),
            ],
            self.bytes,
        )
            .into_response()
    }
}

pub fn bundle(dir: &Path) -> Result<Bundle, ApiError> {
    let path = find_context_file(dir)
        .ok_or_else(|| ApiError::NotFound("Could not find context file.".into()))?;
    let markdown = fs::read(&path).map_err(|e| {
        log::error!("cannot read {}: {e}", path.display());
        ApiError::Internal("Could not read context file.".into())
    })?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let images = list_images(&dir.join(IMAGE_DIR));
    if images.is_empty() {
        return Ok(Bundle {
            file_name,
            content_type: "text/markdown",
            bytes: markdown,
        });
    }

    let bytes = zip_bundle(&file_name, &markdown, &images).map_err(|e| {
        log::error!("cannot build archive: {e}");
        ApiError::Internal("Failed to finalize zip file.".into())
    })?;
    let stem = file_name.strip_suffix(".md").unwrap_or(&file_name);
    Ok(Bundle {
        file_name: format!("{stem}.zip"),
        content_type: "application/zip",
        bytes,
    })
}

fn list_images(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut images: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .collect();
    images.sort();
    images
}

fn zip_bundle(file_name: &str, markdown: &[u8], images: &[PathBuf]) -> zip::result::ZipResult<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    writer.start_file(file_name, options)?;
    writer.write_all(markdown)?;
    for image in images {
        let data = match fs::read(image) {
            Ok(data) => data,
            Err(e) => {
                log::warn!("skipping {} in archive: {e}", image.display());
                continue;
            }
        };
        let name = image
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        writer.start_file(format!("{IMAGE_DIR}/{name}"), options)?;
        writer.write_all(&data)?;
    }
    Ok(writer.finish()?.into_inner())
}
