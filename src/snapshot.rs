//! Snapshot files: a [`MemoryFile`] persisted to disk
//!
//! Layout: 4-byte magic, one format version byte, one codec tag byte, then the
//! bincode-encoded [`MemoryFile`] compressed with that codec. [`SnapshotEngine`] opens such
//! files as single-file engine inputs.

use crate::codec::Codec;
use crate::engine::{ArrayEngine, DataFile, Location, NC_ENOTNC};
use crate::error::{NcError, Result};
use crate::memory::MemoryFile;
use async_trait::async_trait;
use std::path::Path;
use tokio::fs;

/// Magic number for snapshot files
pub const SNAPSHOT_MAGIC: &[u8; 4] = b"NCS\0";

/// Current snapshot format version
pub const SNAPSHOT_VERSION: u8 = 1;

const HEADER_LEN: usize = SNAPSHOT_MAGIC.len() + 2;

/// Encode a file into snapshot bytes
pub fn encode_snapshot(file: &MemoryFile, codec: Codec, level: u8) -> Result<Vec<u8>> {
    let body = bincode::serialize(file)?;
    let body = codec.encode(&body, level)?;

    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    out.extend_from_slice(SNAPSHOT_MAGIC);
    out.push(SNAPSHOT_VERSION);
    out.push(codec.tag());
    out.extend_from_slice(&body);
    Ok(out)
}

/// Decode snapshot bytes
///
/// A missing magic, unknown version or unknown codec fails with the engine's
/// "not a recognised file" code.
pub fn decode_snapshot(bytes: &[u8]) -> Result<MemoryFile> {
    if bytes.len() < HEADER_LEN || &bytes[..SNAPSHOT_MAGIC.len()] != SNAPSHOT_MAGIC {
        return Err(NcError::underlying(NC_ENOTNC, "missing snapshot magic"));
    }

    let version = bytes[SNAPSHOT_MAGIC.len()];
    if version != SNAPSHOT_VERSION {
        return Err(NcError::underlying(
            NC_ENOTNC,
            format!("unsupported snapshot version {}", version),
        ));
    }

    let tag = bytes[SNAPSHOT_MAGIC.len() + 1];
    let codec = Codec::from_tag(tag)
        .ok_or_else(|| NcError::underlying(NC_ENOTNC, format!("unknown codec tag {}", tag)))?;

    let body = codec.decode(&bytes[HEADER_LEN..])?;
    Ok(bincode::deserialize(&body)?)
}

/// Write `file` to `path` as a snapshot
pub async fn write_snapshot(path: impl AsRef<Path>, file: &MemoryFile, codec: Codec) -> Result<()> {
    let path = path.as_ref();
    let bytes = encode_snapshot(file, codec, 6)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    fs::write(path, &bytes).await?;

    tracing::debug!(path = %path.display(), bytes = bytes.len(), ?codec, "wrote snapshot");
    Ok(())
}

/// Read a snapshot from `path`
pub async fn read_snapshot(path: impl AsRef<Path>) -> Result<MemoryFile> {
    let bytes = fs::read(path.as_ref()).await.map_err(|e| {
        NcError::underlying(
            e.raw_os_error().unwrap_or(-1),
            format!("{}: {}", path.as_ref().display(), e),
        )
    })?;
    decode_snapshot(&bytes)
}

/// Engine that opens snapshot files from the local filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct SnapshotEngine;

impl SnapshotEngine {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ArrayEngine for SnapshotEngine {
    async fn open(&self, location: &Location) -> Result<Box<dyn DataFile>> {
        let file = read_snapshot(location.path()).await?;
        Ok(file.into_data_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ENOENT;
    use crate::types::{Attribute, DataType, Dimension, VariableSchema};
    use tempfile::TempDir;

    fn sample_file() -> MemoryFile {
        let data: Vec<u8> = (0..8i32).flat_map(|v| v.to_ne_bytes()).collect();
        MemoryFile::new()
            .with_dimension(Dimension::growable("time", 4))
            .with_dimension(Dimension::new("band", 2))
            .with_global_attribute(Attribute::text("source", "unit test"))
            .with_variable(
                VariableSchema::new("flux", DataType::Int, &["time", "band"]),
                data,
            )
            .unwrap()
    }

    #[test]
    fn test_header_layout() {
        let bytes = encode_snapshot(&sample_file(), Codec::Zstd, 3).unwrap();
        assert_eq!(&bytes[..4], SNAPSHOT_MAGIC);
        assert_eq!(bytes[4], SNAPSHOT_VERSION);
        assert_eq!(bytes[5], Codec::Zstd.tag());
        assert_eq!(decode_snapshot(&bytes).unwrap(), sample_file());
    }

    #[test]
    fn test_rejects_foreign_bytes() {
        let err = decode_snapshot(b"CDF\x01 classic").unwrap_err();
        assert_eq!(err.native_code(), Some(NC_ENOTNC));

        let mut bytes = encode_snapshot(&sample_file(), Codec::None, 0).unwrap();
        bytes[5] = 42;
        assert_eq!(
            decode_snapshot(&bytes).unwrap_err().native_code(),
            Some(NC_ENOTNC)
        );
    }

    #[tokio::test]
    async fn test_engine_reads_written_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("runs").join("a.ncs");
        write_snapshot(&path, &sample_file(), Codec::Deflate)
            .await
            .unwrap();

        let location = Location::parse(path.to_str().unwrap()).unwrap();
        let mut file = SnapshotEngine::new().open(&location).await.unwrap();
        let schema = file.schema().await.unwrap();
        assert_eq!(schema.dimensions.len(), 2);

        let bytes = file.read("flux", &[3, 0], &[1, 2]).await.unwrap();
        assert_eq!(bytes.len(), 8);
    }

    #[tokio::test]
    async fn test_missing_snapshot_reports_os_code() {
        let temp_dir = TempDir::new().unwrap();
        let location = Location::parse(temp_dir.path().join("nope.ncs").to_str().unwrap()).unwrap();
        let err = SnapshotEngine::new().open(&location).await.err().unwrap();
        assert_eq!(err.native_code(), Some(ENOENT));
    }
}
