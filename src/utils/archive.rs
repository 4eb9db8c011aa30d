//! Taproot Assets database archiving
//!
//! Packs the tapd SQLite files into an in-memory tar.gz and computes a
//! SHA-256 checksum per file from the same bytes that went into the archive.

use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Database files archived when present, in archive order
pub const TAPD_DB_FILES: [&str; 3] = ["tapd.db", "tapd.db-wal", "tapd.db-shm"];

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Failed to read {path:?}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("No tapd database files found in {0:?}")]
    NoDatabaseFiles(PathBuf),

    #[error("Failed to build archive: {0}")]
    Build(#[from] io::Error),
}

/// Name and hex SHA-256 of one archived file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChecksum {
    pub file_name: String,
    pub sha256: String,
}

/// Compressed archive plus the checksums of its members
#[derive(Debug, Clone)]
pub struct TapdArchive {
    pub bytes: Vec<u8>,
    pub checksums: Vec<FileChecksum>,
}

/// Database files present in `data_dir`
pub fn collect_db_files(data_dir: &Path) -> Vec<PathBuf> {
    TAPD_DB_FILES
        .iter()
        .map(|name| data_dir.join(name))
        .filter(|path| path.is_file())
        .collect()
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Build `tapd-backup-{timestamp}.tar.gz` contents from the db files in `data_dir`
///
/// Entries are named `tapd-backup-{timestamp}/{file}`.
pub fn build_tapd_archive(data_dir: &Path, timestamp: &str) -> Result<TapdArchive, ArchiveError> {
    let files = collect_db_files(data_dir);
    if files.is_empty() {
        return Err(ArchiveError::NoDatabaseFiles(data_dir.to_path_buf()));
    }

    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    let mut checksums = Vec::with_capacity(files.len());

    for path in &files {
        let read_err = |source| ArchiveError::Read {
            path: path.clone(),
            source,
        };
        let contents = fs::read(path).map_err(read_err)?;
        let metadata = fs::metadata(path).map_err(read_err)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let checksum = sha256_hex(&contents);
        debug!("Adding {} to archive (sha256 {}...)", file_name, &checksum[..16]);

        let mut header = tar::Header::new_gnu();
        header.set_metadata(&metadata);
        header.set_size(contents.len() as u64);
        builder.append_data(
            &mut header,
            format!("tapd-backup-{}/{}", timestamp, file_name),
            contents.as_slice(),
        )?;

        checksums.push(FileChecksum {
            file_name,
            sha256: checksum,
        });
    }

    let bytes = builder.into_inner()?.finish()?;
    info!("Created tapd archive with {} files ({} bytes)", checksums.len(), bytes.len());

    Ok(TapdArchive { bytes, checksums })
}

/// Checksum side-file contents: one `name: hex` line per file
pub fn render_checksums(checksums: &[FileChecksum]) -> String {
    checksums
        .iter()
        .map(|c| format!("{}: {}", c.file_name, c.sha256))
        .collect::<Vec<_>>()
        .join("\n")
}
