use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use chrono::Utc;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid project id: {0:?}")]
    InvalidProjectId(String),

    #[error("invalid username: {0:?}")]
    InvalidUsername(String),

    #[error("unrecognized URL: {0}")]
    UnrecognizedUrl(String),

    #[error("unsafe asset name: {0:?}")]
    UnsafeAssetName(String),

    #[error("malformed project document: {0}")]
    MalformedProject(String),

    #[error("HTTP error: {0}")]
    Http(#[from] attohttpc::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Append-only `error.log` inside a download directory.
#[derive(Debug, Clone)]
pub struct ErrorLog {
    path: PathBuf,
}

impl ErrorLog {
    pub const FILE_NAME: &'static str = "error.log";

    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            path: dir.as_ref().join(Self::FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one line for a failed download of `label`.
    pub fn record(&self, label: &str, err: &Error) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(
            file,
            "{} Error downloading {}: {}",
            Utc::now().format("%Y-%m-%d %H:%M:%S"),
            label,
            err
        )
    }
}
