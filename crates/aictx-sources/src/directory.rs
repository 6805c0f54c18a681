//! Directory scanner: one markdown document with a tree and every text file.

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use aictx_core::{CollaboratorError, Produce, ProduceOptions};
use chrono::{DateTime, Local, SecondsFormat};
use walkdir::WalkDir;

use crate::ignore::IgnoreRules;

/// Bytes inspected by [`is_binary`]
const SNIFF_LEN: usize = 512;

/// Heuristic: any NUL byte, or more than 30% control bytes other than
/// `\n`, `\r` and `\t`, within the first 512 bytes.
pub fn is_binary(content: &[u8]) -> bool {
    let head = &content[..content.len().min(SNIFF_LEN)];
    if head.is_empty() {
        return false;
    }
    let mut control = 0usize;
    for &b in head {
        match b {
            0 => return true,
            b'\n' | b'\r' | b'\t' => {}
            b if b < 32 => control += 1,
            _ => {}
        }
    }
    control as f64 / head.len() as f64 > 0.3
}

/// Fence tag for a file, from its extension
pub fn detect_language(path: &Path) -> &'static str {
    if path.file_name().is_some_and(|n| n == "Dockerfile") {
        return "dockerfile";
    }
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "go" => "go",
        "js" => "javascript",
        "ts" => "typescript",
        "py" => "python",
        "java" => "java",
        "c" => "c",
        "cpp" => "cpp",
        "cs" => "csharp",
        "rb" => "ruby",
        "php" => "php",
        "swift" => "swift",
        "rs" => "rust",
        "sh" => "bash",
        "yml" | "yaml" => "yaml",
        "json" => "json",
        "md" => "markdown",
        "html" => "html",
        "css" => "css",
        "sql" => "sql",
        "dockerfile" => "dockerfile",
        _ => "",
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Relative to the scan root
    pub path: String,
    pub content: String,
    pub language: &'static str,
}

/// Everything a context document needs from one walk
#[derive(Debug, Default)]
pub struct Scan {
    pub files: Vec<FileEntry>,
    pub total_size: u64,
    pub tree: String,
}

fn walk_error(e: walkdir::Error) -> CollaboratorError {
    let message = e.to_string();
    match e.into_io_error() {
        Some(io) => CollaboratorError::Io(io::Error::new(io.kind(), message)),
        None => CollaboratorError::Io(io::Error::other(message)),
    }
}

/// Walk `root` in lexical order, pruning ignored entries.
pub fn scan(root: &Path, rules: &IgnoreRules) -> Result<Scan, CollaboratorError> {
    let mut out = Scan::default();

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || entry
                    .path()
                    .strip_prefix(root)
                    .is_ok_and(|rel| !rules.is_ignored(rel))
        });

    for entry in walker {
        let entry = entry.map_err(walk_error)?;
        if entry.depth() == 0 {
            continue;
        }
        let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let name = entry.file_name().to_string_lossy();
        let indent = "  ".repeat(entry.depth() - 1);

        if entry.file_type().is_dir() {
            let _ = writeln!(out.tree, "{indent}{name}/");
            continue;
        }
        let _ = writeln!(out.tree, "{indent}{name}");

        let content = fs::read(entry.path())?;
        if is_binary(&content) {
            log::debug!("skipping binary {}", rel.display());
            continue;
        }
        out.total_size += content.len() as u64;
        out.files.push(FileEntry {
            path: rel.to_string_lossy().into_owned(),
            content: String::from_utf8_lossy(&content).into_owned(),
            language: detect_language(rel),
        });
    }

    log::debug!(
        "scanned {}: {} files, {} bytes",
        root.display(),
        out.files.len(),
        out.total_size
    );
    Ok(out)
}

/// Render the context document.
pub fn render(scan: &Scan, generated: DateTime<Local>) -> String {
    let mut doc = String::new();
    let _ = write!(
        doc,
        "# Source Code Context\n\n\
         Generated on: {}\n\n\
         ## Repository Overview\n\
         - Total Files: {}\n\
         - Total Size: {} bytes\n\n\
         ## Directory Structure\n\
         ```\n{}\n```\n\n\
         ## File Contents\n\n",
        generated.to_rfc3339_opts(SecondsFormat::Secs, true),
        scan.files.len(),
        scan.total_size,
        scan.tree,
    );
    for file in &scan.files {
        let _ = write!(
            doc,
            "\n### File: {}\n\n```{}\n{}\n```\n\n\n\n\n",
            file.path, file.language, file.content
        );
    }
    doc
}

/// Scan `root` and write the document to `artifact`.
pub fn write_context(
    root: &Path,
    rules: &IgnoreRules,
    artifact: &Path,
) -> Result<PathBuf, CollaboratorError> {
    let scan = scan(root, rules)?;
    fs::write(artifact, render(&scan, Local::now()))?;
    Ok(artifact.to_path_buf())
}

/// Collaborator for local directory locations
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectorySource;

impl Produce for DirectorySource {
    fn produce(
        &self,
        location: &str,
        options: &ProduceOptions<'_>,
    ) -> Result<PathBuf, CollaboratorError> {
        let root = Path::new(location);
        if !root.is_dir() {
            return Err(CollaboratorError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{location} is not a directory"),
            )));
        }
        write_context(root, &IgnoreRules::new(options.ignore_patterns), options.artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn fixture() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("src/nested")).unwrap();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::write(root.join("README.md"), "# hello\n").unwrap();
        fs::write(root.join("src/main.rs"), "fn main() {}\n").unwrap();
        fs::write(root.join("src/nested/util.py"), "x = 1\n").unwrap();
        fs::write(root.join("src/blob.dat"), [0u8, 1, 2, 3]).unwrap();
        fs::write(root.join("node_modules/pkg/index.js"), "skip").unwrap();
        fs::write(root.join("logo.png"), "png").unwrap();
        tmp
    }

    #[test]
    fn binary_detection() {
        assert!(!is_binary(b""));
        assert!(!is_binary(b"plain text\nwith lines\r\n\tand tabs"));
        assert!(is_binary(b"abc\0def"));
        assert!(is_binary(&[1, 2, 3, 4, b'a']));
        // 30% exactly is still text
        let mut mostly_text = vec![b'a'; 7];
        mostly_text.extend_from_slice(&[1, 2, 3]);
        assert!(!is_binary(&mostly_text));
    }

    #[test]
    fn nul_after_sniff_window_is_text() {
        let mut content = vec![b'a'; SNIFF_LEN];
        content.push(0);
        assert!(!is_binary(&content));
    }

    #[test]
    fn language_by_extension() {
        assert_eq!(detect_language(Path::new("a/b.rs")), "rust");
        assert_eq!(detect_language(Path::new("deploy.YAML")), "yaml");
        assert_eq!(detect_language(Path::new("run.sh")), "bash");
        assert_eq!(detect_language(Path::new("Dockerfile")), "dockerfile");
        assert_eq!(detect_language(Path::new("notes.txt")), "");
    }

    #[test]
    fn scan_prunes_and_orders() {
        let tmp = fixture();
        let scan = scan(tmp.path(), &IgnoreRules::default()).unwrap();

        let paths: Vec<&str> = scan.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, ["README.md", "src/main.rs", "src/nested/util.py"]);
        assert_eq!(scan.total_size, 8 + 13 + 6);
        assert_eq!(
            scan.tree,
            "README.md\nsrc/\n  blob.dat\n  main.rs\n  nested/\n    util.py\n"
        );
    }

    #[test]
    fn caller_patterns_prune_directories() {
        let tmp = fixture();
        let rules = IgnoreRules::new(&["nested"]);
        let scan = scan(tmp.path(), &rules).unwrap();
        assert!(scan.files.iter().all(|f| !f.path.contains("nested")));
        assert!(!scan.tree.contains("util.py"));
    }

    #[test]
    fn render_layout() {
        let scan = Scan {
            files: vec![FileEntry {
                path: "main.go".into(),
                content: "package main".into(),
                language: "go",
            }],
            total_size: 12,
            tree: "main.go\n".into(),
        };
        let when = Local.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let doc = render(&scan, when);

        assert!(doc.starts_with("# Source Code Context\n\nGenerated on: 2024-01-02T03:04:05"));
        assert!(doc.contains("- Total Files: 1\n- Total Size: 12 bytes\n"));
        assert!(doc.contains("## Directory Structure\n```\nmain.go\n\n```\n"));
        assert!(doc.contains("### File: main.go\n\n```go\npackage main\n```\n"));
    }

    #[test]
    fn produce_writes_artifact() {
        let tmp = fixture();
        let out = TempDir::new().unwrap();
        let artifact = out.path().join("dir-fixture.md");
        let options = ProduceOptions {
            artifact: &artifact,
            ignore_patterns: &[],
            image_dir: out.path(),
        };
        let location = tmp.path().to_string_lossy().into_owned();
        let written = DirectorySource.produce(&location, &options).unwrap();

        assert_eq!(written, artifact);
        let doc = fs::read_to_string(&artifact).unwrap();
        assert!(doc.contains("### File: src/main.rs"));
        assert!(!doc.contains("node_modules"));
    }

    #[test]
    fn produce_rejects_missing_directory() {
        let out = TempDir::new().unwrap();
        let artifact = out.path().join("x.md");
        let options = ProduceOptions {
            artifact: &artifact,
            ignore_patterns: &[],
            image_dir: out.path(),
        };
        let err = DirectorySource
            .produce("./definitely/not/here", &options)
            .unwrap_err();
        assert!(matches!(err, CollaboratorError::Io(_)));
        assert!(!artifact.exists());
    }
}
