//! Static files for the browser front end

use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

pub const INDEX: &str = "index.html";

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("asset not found: {0}")]
    NotFound(String),

    #[error("failed to read asset: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug)]
pub struct Asset {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
}

/// Read the file at `path` under `root`. Paths that leave the root, through
/// `..` or a symlink, are treated as missing
pub fn serve_asset(root: &Path, path: &str) -> Result<Asset, AssetError> {
    let path = path.trim_start_matches('/');
    let relative = if path.is_empty() { INDEX } else { path };
    let not_found = || AssetError::NotFound(relative.to_string());

    let mut file = PathBuf::new();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(name) => file.push(name),
            Component::CurDir => {}
            _ => return Err(not_found()),
        }
    }

    let root = canonical(root).ok_or_else(not_found)?;
    let file = canonical(&root.join(file)).ok_or_else(not_found)?;
    if !file.starts_with(&root) || !file.is_file() {
        return Err(not_found());
    }

    let bytes = std::fs::read(&file).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => not_found(),
        _ => AssetError::Io(e),
    })?;

    Ok(Asset {
        bytes,
        content_type: content_type(&file),
    })
}

fn canonical(path: &Path) -> Option<PathBuf> {
    path.canonicalize().ok()
}

fn content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        Some("js") | Some("mjs") => "text/javascript; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("json") => "application/json",
        Some("txt") => "text/plain; charset=utf-8",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        _ => "application/octet-stream",
    }
}
