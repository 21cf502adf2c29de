//! Source discovery: turns a file or directory argument into source units.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub const SOURCE_EXTENSION: &str = "json";
pub const ARTIFACT_EXTENSION: &str = "jsc";
const DIRECTORY_ARTIFACT: &str = "output.jsc";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveErrorKind {
    NotFound,
    Io,
    NoSources,
}

#[derive(Debug, Error)]
#[error("{message}")]
pub struct ResolveError {
    pub kind: ResolveErrorKind,
    pub message: String,
    pub path: PathBuf,
}

impl ResolveError {
    fn new(kind: ResolveErrorKind, message: impl Into<String>, path: &Path) -> Self {
        Self {
            kind,
            message: message.into(),
            path: path.to_path_buf(),
        }
    }
}

/// One JSON program document. `id` prefixes every diagnostic raised for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnit {
    pub id: String,
    pub text: String,
}

impl SourceUnit {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }

    pub fn load(path: &Path) -> io::Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(Self::new(path.display().to_string(), text))
    }
}

/// A file resolves to itself; a directory to every `*.json` below it, sorted.
pub fn resolve_sources(path: &Path) -> Result<Vec<PathBuf>, ResolveError> {
    if !path.exists() {
        return Err(ResolveError::new(
            ResolveErrorKind::NotFound,
            format!("Path not found: {}", path.display()),
            path,
        ));
    }
    if !path.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }
    let mut out = Vec::new();
    scan_dir(path, &mut out)?;
    if out.is_empty() {
        return Err(ResolveError::new(
            ResolveErrorKind::NoSources,
            format!("No .{SOURCE_EXTENSION} files found in {}", path.display()),
            path,
        ));
    }
    out.sort();
    Ok(out)
}

fn scan_dir(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), ResolveError> {
    let entries = fs::read_dir(dir).map_err(|e| {
        ResolveError::new(
            ResolveErrorKind::Io,
            format!("Failed to read directory {}: {}", dir.display(), e),
            dir,
        )
    })?;
    for entry in entries {
        let entry = entry.map_err(|e| {
            ResolveError::new(
                ResolveErrorKind::Io,
                format!("Failed to read directory entry in {}: {}", dir.display(), e),
                dir,
            )
        })?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| {
            ResolveError::new(
                ResolveErrorKind::Io,
                format!("Failed to read file type for {}: {}", path.display(), e),
                &path,
            )
        })?;
        if file_type.is_dir() {
            scan_dir(&path, out)?;
            continue;
        }
        if file_type.is_file()
            && path.extension().and_then(|e| e.to_str()) == Some(SOURCE_EXTENSION)
        {
            out.push(path);
        }
    }
    Ok(())
}

/// `<dir>/output.jsc` for a directory input, `<file>.jsc` for a file.
pub fn default_artifact_path(input: &Path) -> PathBuf {
    if input.is_dir() {
        input.join(DIRECTORY_ARTIFACT)
    } else {
        input.with_extension(ARTIFACT_EXTENSION)
    }
}
