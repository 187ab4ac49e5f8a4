//! Builds the local side of a deployment diff from a live directory walk:
//! every eligible regular file, hashed, in a deterministic order.

use camino::{Utf8Path, Utf8PathBuf};
use rayon::prelude::*;
use skiff_core::path_utils::SyncPath;
use skiff_core::{ExclusionMatcher, FileEntry, Manifest};
use std::fs;
use std::io::Read;
use std::sync::Mutex;
use tracing::{debug, info};
use walkdir::WalkDir;

#[derive(Debug, thiserror::Error)]
pub enum ScannerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("non-utf8 path under sync root: {0:?}")]
    NonUtf8Path(std::path::PathBuf),
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ScanStats {
    pub files_hashed: u64,
    pub files_excluded: u64,
    pub bytes_hashed: u64,
}

/// The result of one tree scan. `entries` preserves enumeration order,
/// which downstream diffing relies on for stable diagnostic output.
#[derive(Debug, Clone)]
pub struct Scan {
    pub entries: Vec<FileEntry>,
    pub stats: ScanStats,
}

impl Scan {
    /// The manifest view of the scan: path -> digest.
    pub fn to_manifest(&self) -> Manifest {
        self.entries
            .iter()
            .map(|e| (e.path.clone(), e.digest.clone()))
            .collect()
    }
}

pub struct Scanner;

impl Scanner {
    /// Walk `root` and hash every file that survives the exclusion list.
    /// The walk is lexicographic at each directory level, so repeated scans
    /// of the same tree enumerate identically; hashing runs in parallel but
    /// the entry order is the enumeration order.
    pub fn scan_tree(root: &Utf8Path, excludes: &ExclusionMatcher) -> Result<Scan, ScannerError> {
        info!("scanning {root}");
        let stats = Mutex::new(ScanStats::default());

        let mut files: Vec<(String, Utf8PathBuf)> = Vec::new();
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let fs_path = Utf8PathBuf::from_path_buf(entry.into_path())
                .map_err(ScannerError::NonUtf8Path)?;
            let rel = match fs_path.strip_prefix(root) {
                Ok(rel) => SyncPath::normalize(rel.as_str()),
                Err(_) => continue,
            };
            if excludes.is_excluded(&rel) {
                debug!("excluded {rel}");
                stats.lock().unwrap().files_excluded += 1;
                continue;
            }
            files.push((rel, fs_path));
        }

        let entries: Vec<FileEntry> = files
            .par_iter()
            .map(|(rel, fs_path)| {
                let entry = hash_file(rel, fs_path)?;
                let mut stats = stats.lock().unwrap();
                stats.files_hashed += 1;
                stats.bytes_hashed += entry.size;
                Ok(entry)
            })
            .collect::<Result<_, ScannerError>>()?;

        let stats = stats.into_inner().unwrap();
        info!(
            files = entries.len(),
            excluded = stats.files_excluded,
            bytes = stats.bytes_hashed,
            "scan complete"
        );
        Ok(Scan { entries, stats })
    }
}

fn hash_file(rel: &str, fs_path: &Utf8Path) -> Result<FileEntry, ScannerError> {
    let file = fs::File::open(fs_path)?;
    let mut reader = std::io::BufReader::new(file);
    let mut hasher = md5::Context::new();
    let mut buf = [0u8; 8192];
    let mut size = 0u64;
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.consume(&buf[..n]);
        size += n as u64;
    }
    Ok(FileEntry {
        path: rel.to_string(),
        size,
        digest: format!("{:x}", hasher.finalize()),
    })
}
