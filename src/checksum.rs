//! Checksum computation
//!
//! The inventory engine does not hash files itself; it asks a
//! [`ChecksumProvider`]. The default provider streams file content through the
//! RustCrypto digest implementations. Tests and embedders can pass any closure
//! with the same signature.
//!
//! Hashing failures come in two kinds. [`ChecksumError::Io`] is a problem with
//! one file and is recorded in that file's row. [`ChecksumError::Unavailable`]
//! means the storage itself went away (a network share dropped, a disk was
//! unplugged); the run flushes its checkpoint and waits for a
//! [`ResumeGate`] before trying the same file again.

use crate::types::ChecksumAlgorithm;
use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Failure reported by a checksum provider
#[derive(Debug, Error)]
pub enum ChecksumError {
    /// The storage holding the file is unreachable; retrying later may work
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// The file itself could not be read
    #[error("cannot read {path:?}: {source}")]
    Io {
        /// File being hashed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },
}

impl ChecksumError {
    /// Classify an I/O error raised while hashing `path`
    pub fn from_io(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotConnected
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::TimedOut => ChecksumError::Unavailable(format!("{:?}: {}", path, err)),
            _ => ChecksumError::Io {
                path: path.to_path_buf(),
                source: err,
            },
        }
    }
}

/// Computes a hex digest for a file
pub trait ChecksumProvider {
    /// Hash the content of `path` with `algorithm`, returning lowercase hex
    fn checksum(&self, path: &Path, algorithm: ChecksumAlgorithm) -> Result<String, ChecksumError>;
}

impl<F> ChecksumProvider for F
where
    F: Fn(&Path, ChecksumAlgorithm) -> Result<String, ChecksumError>,
{
    fn checksum(&self, path: &Path, algorithm: ChecksumAlgorithm) -> Result<String, ChecksumError> {
        self(path, algorithm)
    }
}

/// Default provider hashing file content in-process
#[derive(Debug, Clone, Default)]
pub struct DigestChecksumProvider;

impl DigestChecksumProvider {
    /// Create a new provider
    pub fn new() -> Self {
        Self
    }
}

impl ChecksumProvider for DigestChecksumProvider {
    fn checksum(&self, path: &Path, algorithm: ChecksumAlgorithm) -> Result<String, ChecksumError> {
        let file = File::open(path).map_err(|e| ChecksumError::from_io(path, e))?;
        let digest = match algorithm {
            ChecksumAlgorithm::Md5 => hash_reader::<Md5, _>(file),
            ChecksumAlgorithm::Sha1 => hash_reader::<Sha1, _>(file),
            ChecksumAlgorithm::Sha256 => hash_reader::<Sha256, _>(file),
        };
        digest.map_err(|e| ChecksumError::from_io(path, e))
    }
}

/// Hash everything readable from `reader` with digest `D`
///
/// Reads in 64KB chunks so memory use does not grow with file size.
pub fn hash_reader<D: Digest, R: Read>(mut reader: R) -> io::Result<String> {
    let mut hasher = D::new();
    let mut buffer = vec![0u8; 64 * 1024];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// What to do after storage became unavailable mid-run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeDecision {
    /// Try the same file again
    Retry,
    /// Stop the run; the checkpoint file is kept for a later resume
    Abort,
}

/// Acknowledgment step required before hashing resumes after a connectivity loss
pub trait ResumeGate {
    /// Block until the run may continue, or decide to stop
    fn wait_for_resume(&mut self, path: &Path, reason: &str) -> ResumeDecision;
}

/// Asks the operator on the terminal
///
/// Enter retries; `q` or end of input stops the run.
#[derive(Debug, Default)]
pub struct StdinResumeGate;

impl ResumeGate for StdinResumeGate {
    fn wait_for_resume(&mut self, path: &Path, reason: &str) -> ResumeDecision {
        eprintln!(
            "\nLost access while hashing {}\n  {}\nReconnect the storage, then press Enter to continue (q to stop): ",
            path.display(),
            reason
        );
        let _ = io::stderr().flush();

        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => ResumeDecision::Abort,
            Ok(_) if line.trim().eq_ignore_ascii_case("q") => ResumeDecision::Abort,
            Ok(_) => ResumeDecision::Retry,
        }
    }
}

/// Retries on its own for unattended runs
///
/// Sleeps `delay` before each retry and gives up after `max_attempts`
/// pauses in one run.
#[derive(Debug, Clone)]
pub struct AutoResume {
    delay: Duration,
    max_attempts: usize,
    attempts: usize,
}

impl AutoResume {
    /// Create a gate that retries up to `max_attempts` times
    pub fn new(delay: Duration, max_attempts: usize) -> Self {
        Self {
            delay,
            max_attempts,
            attempts: 0,
        }
    }

    /// Number of pauses seen so far
    pub fn attempts(&self) -> usize {
        self.attempts
    }
}

impl ResumeGate for AutoResume {
    fn wait_for_resume(&mut self, path: &Path, reason: &str) -> ResumeDecision {
        if self.attempts >= self.max_attempts {
            warn!("Giving up on {:?} after {} retries: {}", path, self.attempts, reason);
            return ResumeDecision::Abort;
        }
        self.attempts += 1;
        debug!(
            "Retry {}/{} for {:?} in {:?}",
            self.attempts, self.max_attempts, path, self.delay
        );
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        ResumeDecision::Retry
    }
}
