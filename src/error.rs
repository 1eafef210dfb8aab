use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum UploadError {
    #[error("invalid item identifier: {0}")]
    InvalidIdentifier(String),

    #[error("missing config file scan-upload.json in current directory")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("failed to read spreadsheet {path}: {message}")]
    Spreadsheet { path: PathBuf, message: String },

    #[error("row metadata has no `{0}` field")]
    MissingField(String),

    #[error("scan directory does not exist: {0}")]
    #[diagnostic(help("Did you remember to mount the scan share before running the batch?"))]
    MissingScanDirectory(PathBuf),

    #[error("ran out of temporary storage while archiving {0}")]
    #[diagnostic(help(
        "The temporary filesystem is full; give the tmpfs mounted at /tmp more space (size= in /etc/fstab) or point TMPDIR at a larger volume."
    ))]
    StorageExhausted(PathBuf),

    #[error("metadata field cannot be sent as a header: {0}")]
    InvalidMetadataField(String),

    #[error("missing Internet Archive credentials (set IA_ACCESS_KEY and IA_SECRET_KEY)")]
    MissingCredentials,

    #[error("archive error: {0}")]
    Archive(String),

    #[error("Internet Archive request failed: {0}")]
    ArchiveHttp(String),

    #[error("Internet Archive returned status {status}: {message}")]
    ArchiveStatus { status: u16, message: String },

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
