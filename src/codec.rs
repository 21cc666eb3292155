//! Body codecs for snapshot files

use crate::error::{NcError, Result};
use flate2::read::{DeflateDecoder, DeflateEncoder};
use flate2::Compression as FlateCompression;
use serde::{Deserialize, Serialize};
use std::io::Read;

/// How a snapshot body is compressed on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Codec {
    /// Stored as-is
    #[default]
    None = 0,
    /// Deflate/ZIP
    Deflate = 1,
    /// Zstandard
    Zstd = 2,
}

impl Codec {
    /// Codec from its header tag byte
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Codec::None),
            1 => Some(Codec::Deflate),
            2 => Some(Codec::Zstd),
            _ => None,
        }
    }

    pub fn tag(&self) -> u8 {
        *self as u8
    }

    /// Compress `data`; `level` is clamped to 0-9
    pub fn encode(&self, data: &[u8], level: u8) -> Result<Vec<u8>> {
        let level = level.min(9);
        match self {
            Codec::None => Ok(data.to_vec()),
            Codec::Deflate => {
                let mut encoder = DeflateEncoder::new(data, FlateCompression::new(level as u32));
                let mut compressed = Vec::new();
                encoder
                    .read_to_end(&mut compressed)
                    .map_err(|e| NcError::Compression(e.to_string()))?;
                Ok(compressed)
            }
            Codec::Zstd => zstd::encode_all(data, level as i32)
                .map_err(|e| NcError::Compression(e.to_string())),
        }
    }

    pub fn decode(&self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Codec::None => Ok(data.to_vec()),
            Codec::Deflate => {
                let mut decoder = DeflateDecoder::new(data);
                let mut decompressed = Vec::new();
                decoder
                    .read_to_end(&mut decompressed)
                    .map_err(|e| NcError::Compression(e.to_string()))?;
                Ok(decompressed)
            }
            Codec::Zstd => zstd::decode_all(data).map_err(|e| NcError::Compression(e.to_string())),
        }
    }
}
