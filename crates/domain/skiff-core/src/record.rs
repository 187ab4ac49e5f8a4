use camino::Utf8PathBuf;
use std::collections::BTreeSet;
use std::fmt;

/// Direction / kind of a single filesystem change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Update {
    Sent,
    Received,
    Created,
    Deleted,
    Link,
    Attributes,
}

impl Update {
    pub const ALLOWED: &'static [&'static str] = &[
        "sent",
        "received",
        "created",
        "deleted",
        "link",
        "attributes",
    ];

    pub fn parse(value: &str) -> Result<Self, SchemaError> {
        match value {
            "sent" => Ok(Self::Sent),
            "received" => Ok(Self::Received),
            "created" => Ok(Self::Created),
            "deleted" => Ok(Self::Deleted),
            "link" => Ok(Self::Link),
            "attributes" => Ok(Self::Attributes),
            other => Err(SchemaError::UnknownValue {
                field: "update",
                value: other.to_string(),
                allowed: Self::ALLOWED,
            }),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Received => "received",
            Self::Created => "created",
            Self::Deleted => "deleted",
            Self::Link => "link",
            Self::Attributes => "attributes",
        }
    }
}

impl fmt::Display for Update {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FileKind {
    File,
    Directory,
    Symlink,
    Device,
    Special,
}

impl FileKind {
    pub const ALLOWED: &'static [&'static str] =
        &["file", "directory", "symlink", "device", "special"];

    pub fn parse(value: &str) -> Result<Self, SchemaError> {
        match value {
            "file" => Ok(Self::File),
            "directory" => Ok(Self::Directory),
            "symlink" => Ok(Self::Symlink),
            "device" => Ok(Self::Device),
            "special" => Ok(Self::Special),
            other => Err(SchemaError::UnknownValue {
                field: "filetype",
                value: other.to_string(),
                allowed: Self::ALLOWED,
            }),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Directory => "directory",
            Self::Symlink => "symlink",
            Self::Device => "device",
            Self::Special => "special",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a change is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Reason {
    Checksum,
    New,
    Size,
    Time,
    Permissions,
    Owner,
    Group,
    Acl,
    Extended,
    Missing,
    Forced,
}

impl Reason {
    pub const ALLOWED: &'static [&'static str] = &[
        "checksum",
        "new",
        "size",
        "time",
        "permissions",
        "owner",
        "group",
        "acl",
        "extended",
        "missing",
        "forced",
    ];

    pub fn parse(value: &str) -> Result<Self, SchemaError> {
        match value {
            "checksum" => Ok(Self::Checksum),
            "new" => Ok(Self::New),
            "size" => Ok(Self::Size),
            "time" => Ok(Self::Time),
            "permissions" => Ok(Self::Permissions),
            "owner" => Ok(Self::Owner),
            "group" => Ok(Self::Group),
            "acl" => Ok(Self::Acl),
            "extended" => Ok(Self::Extended),
            "missing" => Ok(Self::Missing),
            "forced" => Ok(Self::Forced),
            other => Err(SchemaError::UnknownValue {
                field: "reason",
                value: other.to_string(),
                allowed: Self::ALLOWED,
            }),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Checksum => "checksum",
            Self::New => "new",
            Self::Size => "size",
            Self::Time => "time",
            Self::Permissions => "permissions",
            Self::Owner => "owner",
            Self::Group => "group",
            Self::Acl => "acl",
            Self::Extended => "extended",
            Self::Missing => "missing",
            Self::Forced => "forced",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A malformed change record. Always fatal: it indicates a bug in the
/// component that produced the record, never something to coerce.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("field `{field}` expects a {expected}")]
    InvalidType {
        field: &'static str,
        expected: &'static str,
    },
    #[error("field `{field}` has invalid value `{value}`, expected one of {allowed:?}")]
    UnknownValue {
        field: &'static str,
        value: String,
        allowed: &'static [&'static str],
    },
    #[error("field `filename` must be a non-empty path relative to the sync root, got `{0}`")]
    InvalidFilename(String),
    #[error("`deleted` record for `{0}` does not carry the `missing` reason")]
    DeletedWithoutMissing(String),
    #[error("`{update}` record for `{filename}` has an empty reason set")]
    EmptyReason { update: Update, filename: String },
}

/// One entry describing a single filesystem change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
    pub update: Update,
    pub kind: FileKind,
    pub reason: BTreeSet<Reason>,
    /// Path relative to the synchronization root.
    pub filename: String,
    /// Present only when a local source file backs the record; callers that
    /// upload bytes read from here.
    pub local_path: Option<Utf8PathBuf>,
}

impl ChangeRecord {
    pub fn new(
        update: Update,
        kind: FileKind,
        reason: impl IntoIterator<Item = Reason>,
        filename: impl Into<String>,
    ) -> Self {
        Self {
            update,
            kind,
            reason: reason.into_iter().collect(),
            filename: filename.into(),
            local_path: None,
        }
    }

    pub fn with_local_path(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.local_path = Some(path.into());
        self
    }

    /// Structural invariants of the change-record schema.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.filename.is_empty() || self.filename.starts_with('/') {
            return Err(SchemaError::InvalidFilename(self.filename.clone()));
        }
        match self.update {
            Update::Deleted => {
                if !self.reason.contains(&Reason::Missing) {
                    return Err(SchemaError::DeletedWithoutMissing(self.filename.clone()));
                }
            }
            // The decoder legitimately emits reason-less records for these.
            Update::Link | Update::Attributes | Update::Created | Update::Sent => {}
            Update::Received => {
                if self.reason.is_empty() {
                    return Err(SchemaError::EmptyReason {
                        update: self.update,
                        filename: self.filename.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}
