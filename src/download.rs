//! Streaming download engine with integrity verification.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use log::{debug, info, warn};

use crate::error::Error;
use crate::session::USER_AGENT;

const CHUNK_SIZE: usize = 64 * 1024;

/// Idempotence check: a finished file at the final path means the whole item
/// was already downloaded and tagged, so no network call is needed.
pub fn skip_if_exists(final_path: &Path) -> bool {
    final_path.is_file()
}

fn verify_length(expected: Option<u64>, written: u64) -> Result<(), Error> {
    match expected {
        Some(expected) if expected != written => Err(Error::Integrity { expected, written }),
        _ => Ok(()),
    }
}

fn remove_partial(temp_path: &Path) {
    if let Err(error) = fs::remove_file(temp_path) {
        warn!(
            "Could not remove partial download {}: {}",
            temp_path.display(),
            error
        );
    }
}

/// Streams the response body to `temp_path` in fixed-size chunks.
///
/// `progress` receives the monotonically increasing byte counter. The written
/// size must match the declared content length; on any failure the partial
/// file is removed and never resumed.
pub fn fetch(
    agent: &ureq::Agent,
    url: &str,
    temp_path: &Path,
    progress: &mut dyn FnMut(u64),
) -> Result<u64, Error> {
    let response = agent
        .get(url)
        .set("User-Agent", USER_AGENT)
        .call()
        .map_err(|error| Error::Http(Box::new(error)))?;
    let expected: Option<u64> = response
        .header("Content-Length")
        .and_then(|value| value.parse().ok());

    let mut file = File::create(temp_path)?;
    let mut reader = response.into_reader();
    let mut buffer = [0u8; CHUNK_SIZE];
    let mut written: u64 = 0;
    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => read,
            Err(error) => {
                drop(file);
                remove_partial(temp_path);
                return Err(Error::Io(error));
            }
        };
        if let Err(error) = file.write_all(&buffer[..read]) {
            drop(file);
            remove_partial(temp_path);
            return Err(Error::Io(error));
        }
        written += read as u64;
        progress(written);
    }
    file.flush()?;
    drop(file);

    if let Err(error) = verify_length(expected, written) {
        remove_partial(temp_path);
        return Err(error);
    }
    debug!("Fetched {written} bytes to {}", temp_path.display());
    Ok(written)
}

/// Fetches a small asset (cover art) fully into memory.
pub fn fetch_bytes(agent: &ureq::Agent, url: &str) -> Result<Vec<u8>, Error> {
    let response = agent
        .get(url)
        .set("User-Agent", USER_AGENT)
        .call()
        .map_err(|error| Error::Http(Box::new(error)))?;
    let mut bytes = Vec::new();
    response.into_reader().read_to_end(&mut bytes)?;
    Ok(bytes)
}

/// Rewrites a standard-size cover url to the original-quality variant.
pub fn original_quality_cover_url(url: &str) -> String {
    url.replace("_600.", "_org.")
}

/// Downloads a sibling asset (`cover.jpg`, `booklet.pdf`) into the album
/// folder, skipping when it is already present.
pub fn fetch_sibling(
    agent: &ureq::Agent,
    url: &str,
    directory: &Path,
    file_name: &str,
) -> Result<(), Error> {
    let target = directory.join(file_name);
    if target.is_file() {
        info!("{file_name} was already downloaded");
        return Ok(());
    }
    fetch(agent, url, &target, &mut |_| {})?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{fetch, original_quality_cover_url, skip_if_exists, verify_length};
    use crate::error::Error;
    use std::fs;
    use std::io::Write;
    use std::net::TcpListener;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn unique_temp_path(name: &str) -> PathBuf {
        let nonce = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time should be valid")
            .as_nanos();
        std::env::temp_dir().join(format!("quaver_{name}_{nonce}"))
    }

    #[test]
    fn test_verify_length_mismatch_is_integrity_error() {
        match verify_length(Some(100), 42) {
            Err(Error::Integrity { expected, written }) => {
                assert_eq!(expected, 100);
                assert_eq!(written, 42);
            }
            other => panic!("expected integrity error, got {other:?}"),
        }
        assert!(verify_length(Some(42), 42).is_ok());
        assert!(verify_length(None, 42).is_ok());
    }

    #[test]
    fn test_skip_if_exists() {
        let path = unique_temp_path("exists.flac");
        assert!(!skip_if_exists(&path));
        fs::write(&path, b"audio").expect("fixture should be writable");
        assert!(skip_if_exists(&path));
        fs::remove_file(&path).expect("fixture should be removable");
    }

    #[test]
    fn test_original_quality_cover_url() {
        assert_eq!(
            original_quality_cover_url("https://images.example.com/ab/cover_600.jpg"),
            "https://images.example.com/ab/cover_org.jpg"
        );
    }

    #[test]
    fn test_short_body_leaves_no_file_behind() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
        let address = listener.local_addr().expect("listener should have an address");
        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("client should connect");
            // Declares 100 bytes but sends only 10, then closes.
            let _ = stream.write_all(
                b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\nConnection: close\r\n\r\n0123456789",
            );
        });

        let agent = ureq::AgentBuilder::new().build();
        let temp_path = unique_temp_path("short_body.tmp");
        let result = fetch(
            &agent,
            &format!("http://{address}/file"),
            &temp_path,
            &mut |_| {},
        );
        server.join().expect("server thread should finish");

        assert!(result.is_err(), "short body must not be accepted");
        assert!(!temp_path.exists(), "partial file must be removed");
    }

    #[test]
    fn test_complete_body_reports_monotonic_progress() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
        let address = listener.local_addr().expect("listener should have an address");
        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("client should connect");
            let _ = stream.write_all(
                b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\nConnection: close\r\n\r\n0123456789",
            );
        });

        let agent = ureq::AgentBuilder::new().build();
        let temp_path = unique_temp_path("full_body.tmp");
        let mut reported = Vec::new();
        let written = fetch(
            &agent,
            &format!("http://{address}/file"),
            &temp_path,
            &mut |bytes| reported.push(bytes),
        )
        .expect("complete body should download");
        server.join().expect("server thread should finish");

        assert_eq!(written, 10);
        assert!(reported.windows(2).all(|pair| pair[0] <= pair[1]));
        assert_eq!(reported.last().copied(), Some(10));
        fs::remove_file(&temp_path).expect("fixture should be removable");
    }
}
