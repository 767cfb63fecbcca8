//! HTTP HEAD probe: learns the total resource size before planning.

use anyhow::{bail, Context, Result};
use std::str;
use std::time::Duration;

/// Metadata from the probe request.
#[derive(Debug, Clone)]
pub struct ProbeResult {
    /// Total size in bytes, if `Content-Length` is present.
    pub content_length: Option<u64>,
    /// True if the server sent `Accept-Ranges: bytes`.
    pub accept_ranges: bool,
}

/// Performs a HEAD request and returns parsed metadata. Follows redirects.
pub fn probe(url: &str, connect_timeout: Duration, timeout: Duration) -> Result<ProbeResult> {
    let mut headers: Vec<String> = Vec::new();

    let mut easy = curl::easy::Easy::new();
    easy.url(url).context("invalid URL")?;
    easy.nobody(true)?; // HEAD request
    easy.follow_location(true)?;
    easy.connect_timeout(connect_timeout)?;
    easy.timeout(timeout)?;

    {
        let mut transfer = easy.transfer();
        transfer.header_function(|data| {
            if let Ok(s) = str::from_utf8(data) {
                headers.push(s.trim_end().to_string());
            }
            true
        })?;
        transfer.perform().context("HEAD request failed")?;
    }

    let code = easy.response_code().context("no response code")?;
    if !(200..300).contains(&code) {
        bail!("HEAD {} returned HTTP {}", url, code);
    }

    Ok(parse_headers(&headers))
}

fn parse_headers(lines: &[String]) -> ProbeResult {
    let mut content_length = None;
    let mut accept_ranges = false;

    for line in lines {
        let line = line.trim();
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            let value = value.trim();
            if name.eq_ignore_ascii_case("content-length") {
                if let Ok(n) = value.parse::<u64>() {
                    content_length = Some(n);
                }
            }
            if name.eq_ignore_ascii_case("accept-ranges") {
                accept_ranges = value.eq_ignore_ascii_case("bytes");
            }
        }
    }

    ProbeResult {
        content_length,
        accept_ranges,
    }
}
