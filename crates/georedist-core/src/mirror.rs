//! HTTP access to the redistribution mirror.
//!
//! Uses the curl crate (libcurl). Every call blocks the current thread; async
//! callers go through `spawn_blocking`. Only a connect timeout is set here,
//! whole-transfer limits are left to libcurl defaults.

use crate::db::DbName;
use crate::error::UpdateError;
use std::cell::RefCell;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use url::Url;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on a digest response; anything bigger is not a digest.
const MAX_TEXT_BYTES: usize = 4096;

/// Resolves resource URLs against the mirror base.
#[derive(Debug, Clone)]
pub struct Mirror {
    base: Url,
}

impl Mirror {
    pub fn new(base_url: &str) -> Result<Self, UpdateError> {
        // Without a trailing slash `join` would replace the last path segment.
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base = Url::parse(&normalized)
            .map_err(|e| UpdateError::network(base_url, format!("invalid mirror URL: {}", e)))?;
        Ok(Self { base })
    }

    pub fn base(&self) -> &str {
        self.base.as_str()
    }

    pub fn checksum_url(&self, db: DbName) -> Result<String, UpdateError> {
        self.resource_url(&db.checksum_resource())
    }

    pub fn archive_url(&self, db: DbName) -> Result<String, UpdateError> {
        self.resource_url(&db.archive_resource())
    }

    fn resource_url(&self, resource: &str) -> Result<String, UpdateError> {
        self.base
            .join(resource)
            .map(String::from)
            .map_err(|e| UpdateError::network(self.base.as_str(), e))
    }
}

fn new_easy(url: &str) -> Result<curl::easy::Easy, curl::Error> {
    let mut easy = curl::easy::Easy::new();
    easy.url(url)?;
    easy.follow_location(true)?;
    easy.max_redirections(10)?;
    easy.connect_timeout(CONNECT_TIMEOUT)?;
    easy.useragent(concat!("georedist/", env!("CARGO_PKG_VERSION")))?;
    Ok(easy)
}

fn check_status(easy: &mut curl::easy::Easy, url: &str) -> Result<(), UpdateError> {
    let code = easy
        .response_code()
        .map_err(|e| UpdateError::network(url, e))?;
    if !(200..300).contains(&code) {
        return Err(UpdateError::network(url, format!("HTTP {}", code)));
    }
    Ok(())
}

/// GET a small text resource and return the body.
/// Fails if the transfer is incomplete, the status is not 2xx, or the body is not UTF-8.
pub fn fetch_text(url: &str) -> Result<String, UpdateError> {
    let mut body: Vec<u8> = Vec::new();
    let mut easy = new_easy(url).map_err(|e| UpdateError::network(url, e))?;
    {
        let mut transfer = easy.transfer();
        transfer
            .write_function(|data| {
                if body.len() + data.len() > MAX_TEXT_BYTES {
                    return Ok(0); // abort transfer
                }
                body.extend_from_slice(data);
                Ok(data.len())
            })
            .map_err(|e| UpdateError::network(url, e))?;
        transfer
            .perform()
            .map_err(|e| UpdateError::network(url, e))?;
    }
    check_status(&mut easy, url)?;
    String::from_utf8(body).map_err(|_| UpdateError::network(url, "response is not UTF-8"))
}

/// GET `url` and stream the body into a new file at `dest`.
///
/// Stops early when `abort` is raised (another download in the batch failed).
/// Returns the number of bytes written.
pub fn fetch_to_file(url: &str, dest: &Path, abort: &AtomicBool) -> Result<u64, UpdateError> {
    let mut file = File::create(dest).map_err(|e| UpdateError::filesystem(dest, e))?;
    let write_error: RefCell<Option<std::io::Error>> = RefCell::new(None);
    let mut written = 0u64;

    let mut easy = new_easy(url).map_err(|e| UpdateError::network(url, e))?;
    let performed = {
        let mut transfer = easy.transfer();
        transfer
            .write_function(|data| {
                if abort.load(Ordering::Relaxed) {
                    return Ok(0);
                }
                match file.write_all(data) {
                    Ok(()) => {
                        written += data.len() as u64;
                        Ok(data.len())
                    }
                    Err(e) => {
                        *write_error.borrow_mut() = Some(e);
                        Ok(0) // abort transfer
                    }
                }
            })
            .map_err(|e| UpdateError::network(url, e))?;
        transfer.perform()
    };

    if let Some(e) = write_error.into_inner() {
        return Err(UpdateError::filesystem(dest, e));
    }
    if abort.load(Ordering::Relaxed) {
        return Err(UpdateError::network(url, "aborted: another download in the batch failed"));
    }
    performed.map_err(|e| UpdateError::network(url, e))?;
    check_status(&mut easy, url)?;
    file.flush().map_err(|e| UpdateError::filesystem(dest, e))?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::net::TcpListener;

    /// One-shot server that promises `declared` bytes but sends only `body`, then hangs up.
    fn short_body_server(declared: usize, body: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        std::thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut buf) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let head = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    declared
                );
                let _ = stream.write_all(head.as_bytes());
                let _ = stream.write_all(body);
            }
        });
        format!("http://127.0.0.1:{}/redist/GeoLite2-ASN.mmdb.sha384", port)
    }

    const DIGEST: &[u8] = b"38b060a751ac96384cd9327eb1b1e36a21fdb71114be07434c0cc7bf63f6e1da274edebfe76f65fbd51ad2f14898b95b";

    #[test]
    fn truncated_text_response_is_network_error() {
        // A full-length digest inside a response cut short is still rejected.
        let url = short_body_server(200, DIGEST);
        let err = fetch_text(&url).unwrap_err();
        match err {
            UpdateError::Network { url: failed, .. } => assert_eq!(failed, url),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn complete_text_response_is_returned() {
        let url = short_body_server(DIGEST.len(), DIGEST);
        assert_eq!(fetch_text(&url).unwrap().as_bytes(), DIGEST);
    }

    #[test]
    fn truncated_file_response_is_network_error() {
        let dir = tempfile::tempdir().unwrap();
        let url = short_body_server(4096, b"partial archive");
        let abort = AtomicBool::new(false);
        let err = fetch_to_file(&url, &dir.path().join("GeoLite2-ASN.tar.gz"), &abort).unwrap_err();
        assert!(matches!(err, UpdateError::Network { .. }));
    }

    #[test]
    fn resource_urls_join_onto_base() {
        let m = Mirror::new("https://example.org/redist/").unwrap();
        assert_eq!(
            m.checksum_url(DbName::Asn).unwrap(),
            "https://example.org/redist/GeoLite2-ASN.mmdb.sha384"
        );
        assert_eq!(
            m.archive_url(DbName::City).unwrap(),
            "https://example.org/redist/GeoLite2-City.tar.gz"
        );
    }

    #[test]
    fn base_without_trailing_slash_keeps_last_segment() {
        let m = Mirror::new("https://example.org/redist").unwrap();
        assert_eq!(m.base(), "https://example.org/redist/");
        assert_eq!(
            m.archive_url(DbName::Country).unwrap(),
            "https://example.org/redist/GeoLite2-Country.tar.gz"
        );
    }

    #[test]
    fn invalid_base_is_a_network_error() {
        let err = Mirror::new("not a url").unwrap_err();
        assert!(matches!(err, UpdateError::Network { .. }));
    }
}
