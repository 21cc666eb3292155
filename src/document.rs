//! Persisted series documents
//!
//! A series document records only the ordered file list. Boundary tables and schemas are
//! always recomputed from the live files when the document is opened.

use crate::error::{NcError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

/// Series document format version
pub const SERIES_DOCUMENT_VERSION: u32 = 1;

/// The saved form of a series: its ordered file list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesDocument {
    pub format_version: u32,

    /// File paths or `file://` URLs, in series order
    pub locations: Vec<String>,

    pub saved_at: DateTime<Utc>,
}

impl SeriesDocument {
    pub fn new(locations: Vec<String>) -> Self {
        Self {
            format_version: SERIES_DOCUMENT_VERSION,
            locations,
            saved_at: Utc::now(),
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let document: SeriesDocument = serde_json::from_slice(bytes)?;
        if document.format_version != SERIES_DOCUMENT_VERSION {
            return Err(NcError::InvalidFormat(format!(
                "unsupported series document version {}",
                document.format_version
            )));
        }
        Ok(document)
    }

    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_json()?).await?;
        tracing::debug!(path = %path.display(), files = self.locations.len(), "saved series document");
        Ok(())
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = fs::read(path.as_ref()).await?;
        Self::from_json(&bytes)
    }
}
