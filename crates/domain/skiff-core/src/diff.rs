//! Manifest diff: decides which files must be created, updated, or
//! deleted to bring the remote tree into agreement with the local scan.
//! Used by transports that cannot report changes themselves; transports
//! that can (the itemized report) go through [`crate::itemize`] instead,
//! and both paths produce the same record model.

use crate::record::{ChangeRecord, FileKind, Reason, Update};
use crate::transport::{Transport, TransportError};
use crate::{FileEntry, Manifest};
use camino::Utf8Path;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, Default)]
pub struct DiffOptions {
    /// Re-derive change status by probing the live remote instead of
    /// trusting a stored manifest.
    pub full: bool,
    /// Upload everything, bypassing existence and size checks. Only valid
    /// together with `full`.
    pub force: bool,
    /// Remove remote paths that no longer exist locally.
    pub delete: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    #[error("incremental diff requires a remote baseline manifest")]
    MissingBaseline,
    #[error("force mode is only valid together with a full diff")]
    ForceRequiresFull,
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Compare the ordered local scan against the remote state and emit the
/// change set: creates and updates first, in local enumeration order, then
/// deletes in remote manifest order. Every record backed by a local file
/// carries its absolute source path resolved against `local_root`.
pub fn diff(
    local: &[FileEntry],
    remote: Option<&Manifest>,
    opts: &DiffOptions,
    remote_fs: &mut dyn Transport,
    local_root: &Utf8Path,
) -> Result<Vec<ChangeRecord>, DiffError> {
    if opts.force && !opts.full {
        return Err(DiffError::ForceRequiresFull);
    }

    let mut records = if opts.force {
        forced(local, local_root)
    } else if opts.full {
        full(local, remote, remote_fs, local_root)?
    } else {
        match remote {
            Some(baseline) => incremental(local, baseline, local_root),
            None => return Err(DiffError::MissingBaseline),
        }
    };

    if opts.delete {
        if let Some(baseline) = remote {
            records.extend(deletions(local, baseline));
        }
    }

    Ok(records)
}

fn upload(
    update: Update,
    reason: Reason,
    entry: &FileEntry,
    local_root: &Utf8Path,
) -> ChangeRecord {
    ChangeRecord::new(update, FileKind::File, [reason], entry.path.clone())
        .with_local_path(local_root.join(&entry.path))
}

/// The remote state cannot be trusted at all: resend every local file.
fn forced(local: &[FileEntry], local_root: &Utf8Path) -> Vec<ChangeRecord> {
    local
        .iter()
        .map(|entry| upload(Update::Sent, Reason::Forced, entry, local_root))
        .collect()
}

/// Probe the live remote per file. A known remote digest wins over the
/// size comparison; an unknown or unreported size counts as a difference,
/// since the file cannot be verified unchanged.
fn full(
    local: &[FileEntry],
    remote: Option<&Manifest>,
    remote_fs: &mut dyn Transport,
    local_root: &Utf8Path,
) -> Result<Vec<ChangeRecord>, DiffError> {
    let mut records = Vec::new();
    for entry in local {
        if !remote_fs.exists(&entry.path)? {
            records.push(upload(Update::Created, Reason::Missing, entry, local_root));
            continue;
        }
        if let Some(known) = remote.and_then(|m| m.digest(&entry.path)) {
            if known != entry.digest {
                records.push(upload(Update::Sent, Reason::Checksum, entry, local_root));
            }
            continue;
        }
        let remote_size = remote_fs.size(&entry.path)?;
        if remote_size != Some(entry.size) {
            records.push(upload(Update::Sent, Reason::Size, entry, local_root));
        }
    }
    Ok(records)
}

/// Trust and compare the two manifests directly.
fn incremental(
    local: &[FileEntry],
    baseline: &Manifest,
    local_root: &Utf8Path,
) -> Vec<ChangeRecord> {
    let mut records = Vec::new();
    for entry in local {
        match baseline.digest(&entry.path) {
            Some(digest) if digest != entry.digest => {
                records.push(upload(Update::Sent, Reason::Checksum, entry, local_root));
            }
            Some(_) => {}
            None => {
                records.push(upload(Update::Created, Reason::Missing, entry, local_root));
            }
        }
    }
    records
}

fn deletions(local: &[FileEntry], baseline: &Manifest) -> Vec<ChangeRecord> {
    let local_paths: BTreeSet<&str> = local.iter().map(|e| e.path.as_str()).collect();
    baseline
        .paths()
        .filter(|path| !local_paths.contains(path))
        .map(|path| ChangeRecord::new(Update::Deleted, FileKind::File, [Reason::Missing], path))
        .collect()
}
