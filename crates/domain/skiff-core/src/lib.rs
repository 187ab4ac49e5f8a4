use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod diff;
pub mod exclude;
pub mod formats;
pub mod itemize;
pub mod path_utils;
pub mod record;
pub mod result;
pub mod transport;

pub use diff::{diff, DiffError, DiffOptions};
pub use exclude::{ExcludeError, ExclusionMatcher};
pub use itemize::ItemizeDecoder;
pub use record::{ChangeRecord, FileKind, Reason, SchemaError, Update};
pub use result::DeploymentResult;
pub use transport::{Transport, TransportError};

pub type Md5Digest = String;

/// One endpoint's known file state: relative path -> lowercase hex content
/// digest. Serializes as a plain JSON object, which is the payload of the
/// remote manifest document (see [`formats::checksum_doc`]).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    files: BTreeMap<String, Md5Digest>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        path: impl Into<String>,
        digest: impl Into<Md5Digest>,
    ) -> Option<Md5Digest> {
        self.files.insert(path.into(), digest.into())
    }

    pub fn remove(&mut self, path: &str) -> Option<Md5Digest> {
        self.files.remove(path)
    }

    pub fn digest(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Entries in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.files.iter().map(|(p, d)| (p.as_str(), d.as_str()))
    }

    /// Paths in lexicographic order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }
}

impl FromIterator<(String, Md5Digest)> for Manifest {
    fn from_iter<I: IntoIterator<Item = (String, Md5Digest)>>(iter: I) -> Self {
        Self {
            files: iter.into_iter().collect(),
        }
    }
}

/// A single regular file seen by the local scan, in enumeration order.
/// The diff engine needs the size alongside the digest because full-mode
/// comparisons fall back to sizes when no remote digest is known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    pub size: u64,
    pub digest: Md5Digest,
}
