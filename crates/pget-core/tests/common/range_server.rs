//! Minimal HTTP/1.1 server that supports HEAD and Range GET for integration
//! tests.
//!
//! Serves a single static body and records every GET's Range header so tests
//! can assert exactly which byte ranges were requested.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;

/// Log of the GET requests the server has answered: the parsed
/// `(start, end_inclusive)` of each Range header, or `None` for a full GET.
#[derive(Debug, Default)]
pub struct RequestLog {
    gets: Mutex<Vec<Option<(u64, u64)>>>,
}

impl RequestLog {
    pub fn get_ranges(&self) -> Vec<Option<(u64, u64)>> {
        self.gets.lock().unwrap().clone()
    }

    pub fn get_count(&self) -> usize {
        self.gets.lock().unwrap().len()
    }

    pub fn clear(&self) {
        self.gets.lock().unwrap().clear();
    }

    fn record(&self, range: Option<(u64, u64)>) {
        self.gets.lock().unwrap().push(range);
    }
}

/// Server behavior toggles for tests that need a misbehaving peer.
#[derive(Debug, Clone, Copy)]
pub struct RangeServerOptions {
    /// When false the server ignores Range headers and answers every GET
    /// with 200 and the full body, like a server without range support.
    pub support_ranges: bool,
}

impl Default for RangeServerOptions {
    fn default() -> Self {
        RangeServerOptions { support_ranges: true }
    }
}

/// Starts a server in a background thread serving `body`. Returns the base
/// URL (e.g. "http://127.0.0.1:12345/") plus the request log. The server runs
/// until the process exits.
pub fn start(body: Vec<u8>) -> (String, Arc<RequestLog>) {
    start_with_options(body, RangeServerOptions::default())
}

pub fn start_with_options(
    body: Vec<u8>,
    options: RangeServerOptions,
) -> (String, Arc<RequestLog>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let body = Arc::new(body);
    let log = Arc::new(RequestLog::default());
    let log_srv = Arc::clone(&log);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let body = Arc::clone(&body);
            let log = Arc::clone(&log_srv);
            thread::spawn(move || handle(stream, &body, &log, options));
        }
    });
    (format!("http://127.0.0.1:{}/", port), log)
}

fn handle(mut stream: std::net::TcpStream, body: &[u8], log: &RequestLog, options: RangeServerOptions) {
    let _ = stream.set_read_timeout(Some(std::time::Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(std::time::Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) => return,
        Ok(n) => n,
        Err(_) => return,
    };
    let request = match std::str::from_utf8(&buf[..n]) {
        Ok(s) => s,
        Err(_) => return,
    };
    let (method, range) = parse_request(request);
    let total = body.len() as u64;

    if method.eq_ignore_ascii_case("HEAD") {
        let accept = if options.support_ranges {
            "Accept-Ranges: bytes\r\n"
        } else {
            ""
        };
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n{}Connection: close\r\n\r\n",
            total, accept
        );
        let _ = stream.write_all(response.as_bytes());
        return;
    }

    if method.eq_ignore_ascii_case("GET") {
        log.record(range);
        let range = if options.support_ranges { range } else { None };
        let (status, content_range, slice) = match range {
            Some((start, end_incl)) => {
                let start = start.min(total);
                let end_incl = end_incl.min(total.saturating_sub(1));
                if start > end_incl {
                    (
                        "416 Range Not Satisfiable",
                        format!("bytes */{}", total),
                        &body[0..0],
                    )
                } else {
                    let end_excl = (end_incl + 1) as usize;
                    (
                        "206 Partial Content",
                        format!("bytes {}-{}/{}", start, end_incl, total),
                        &body[start as usize..end_excl],
                    )
                }
            }
            None => (
                "200 OK",
                format!("bytes 0-{}/{}", total.saturating_sub(1), total),
                body,
            ),
        };
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Length: {}\r\nContent-Range: {}\r\nAccept-Ranges: bytes\r\nConnection: close\r\n\r\n",
            status,
            slice.len(),
            content_range
        );
        let _ = stream.write_all(response.as_bytes());
        let _ = stream.write_all(slice);
        return;
    }

    let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nConnection: close\r\n\r\n");
}

/// Returns (method, optional (start, end_inclusive) for `Range: bytes=X-Y`).
fn parse_request(request: &str) -> (&str, Option<(u64, u64)>) {
    let mut method = "";
    let mut range = None;
    for line in request.lines() {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if method.is_empty() {
            method = line.split_whitespace().next().unwrap_or("");
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("range") {
                let value = value.trim();
                if let Some(part) = value.strip_prefix("bytes=") {
                    if let Some((a, b)) = part.split_once('-') {
                        let start = a.trim().parse::<u64>().unwrap_or(0);
                        let end = b.trim();
                        let end_incl = if end.is_empty() {
                            u64::MAX
                        } else {
                            end.parse::<u64>().unwrap_or(0)
                        };
                        range = Some((start, end_incl));
                    }
                }
            }
        }
    }
    (method, range)
}
