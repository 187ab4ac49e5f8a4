//! The manifest document stored on the remote target: a gzip-compressed
//! UTF-8 JSON object mapping relative paths to lowercase hex digests.

use crate::Manifest;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// Well-known location of the document, relative to the deployment root.
pub const REMOTE_MANIFEST_PATH: &str = "checksums.json.gz";

/// Corrupt or undecodable manifest bytes. Fatal here; the caller decides
/// whether to treat the remote as having no baseline instead.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("manifest document is not valid gzip: {0}")]
    Compression(#[from] std::io::Error),
    #[error("manifest document is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
}

pub fn encode(manifest: &Manifest) -> Result<Vec<u8>, DocumentError> {
    let json = serde_json::to_vec(manifest)?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json)?;
    Ok(encoder.finish()?)
}

pub fn decode(bytes: &[u8]) -> Result<Manifest, DocumentError> {
    let mut json = Vec::new();
    GzDecoder::new(bytes).read_to_end(&mut json)?;
    Ok(serde_json::from_slice(&json)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_manifest() {
        let mut manifest = Manifest::new();
        manifest.insert("src/app.php", "0123456789abcdef0123456789abcdef");
        manifest.insert("web/index.php", "fedcba9876543210fedcba9876543210");

        let bytes = encode(&manifest).unwrap();
        assert_eq!(decode(&bytes).unwrap(), manifest);
    }

    #[test]
    fn round_trips_the_empty_manifest() {
        let manifest = Manifest::new();
        let bytes = encode(&manifest).unwrap();
        assert_eq!(decode(&bytes).unwrap(), manifest);
    }

    #[test]
    fn rejects_bytes_that_are_not_gzip() {
        assert!(matches!(
            decode(b"{\"a\": \"b\"}"),
            Err(DocumentError::Compression(_))
        ));
    }

    #[test]
    fn rejects_gzip_that_is_not_json() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"not json at all").unwrap();
        let bytes = encoder.finish().unwrap();
        assert!(matches!(decode(&bytes), Err(DocumentError::Malformed(_))));
    }

    #[test]
    fn document_payload_is_a_plain_json_object() {
        let mut manifest = Manifest::new();
        manifest.insert("a", "00");
        let bytes = encode(&manifest).unwrap();

        let mut json = Vec::new();
        GzDecoder::new(bytes.as_slice())
            .read_to_end(&mut json)
            .unwrap();
        assert_eq!(String::from_utf8(json).unwrap(), r#"{"a":"00"}"#);
    }
}
