//! The capability interface through which the diff engine and the
//! deployment orchestration touch the remote side. Protocol sessions
//! (FTP, SFTP, SSH) implement this in their own collaborator crates; the
//! core only consumes the trait, so every protocol shares one diff
//! implementation. Paths are relative to the remote deployment root.

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("remote path not found: {0}")]
    NotFound(String),
    #[error("transport protocol error: {0}")]
    Protocol(String),
}

pub trait Transport {
    /// Whether `rel` names an existing remote file.
    fn exists(&mut self, rel: &str) -> Result<bool, TransportError>;

    /// Size of the remote file in bytes, or `None` when the protocol
    /// cannot report one.
    fn size(&mut self, rel: &str) -> Result<Option<u64>, TransportError>;

    fn read(&mut self, rel: &str) -> Result<Vec<u8>, TransportError>;

    fn write(&mut self, rel: &str, data: &[u8]) -> Result<(), TransportError>;

    fn mkdir(&mut self, rel: &str) -> Result<(), TransportError>;

    fn delete(&mut self, rel: &str) -> Result<(), TransportError>;
}
