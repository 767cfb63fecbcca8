//! Source URLs: list loading and output filename derivation.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;

/// Fallback when the URL path yields no usable last segment.
const DEFAULT_FILENAME: &str = "download.bin";

/// True when the CLI argument is a URL rather than a path to a URL-list file.
pub fn looks_like_url(arg: &str) -> bool {
    arg.starts_with("http://") || arg.starts_with("https://")
}

/// Derives the output filename from the last path segment of `url`.
pub fn derive_filename(url: &str) -> String {
    filename_from_url_path(url).unwrap_or_else(|| DEFAULT_FILENAME.to_string())
}

fn filename_from_url_path(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let segment = parsed.path().split('/').filter(|s| !s.is_empty()).last()?;
    if segment == "." || segment == ".." {
        return None;
    }
    Some(segment.to_string())
}

/// Loads an ordered URL list, one per line. Blank lines are skipped; an empty
/// list is an error.
pub fn load_url_list(path: &Path) -> Result<Vec<String>> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("unable to access URL list {}", path.display()))?;
    let urls: Vec<String> = data
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();
    if urls.is_empty() {
        bail!("URL list {} contains no URLs", path.display());
    }
    Ok(urls)
}
