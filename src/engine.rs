//! Boundary to the single-file array engine
//!
//! The series layer never decodes files itself. It consumes an [`ArrayEngine`] that can
//! open a location and hand back a [`DataFile`]: a schema listing plus a hyperslab read
//! primitive. Engines are not assumed to be reentrant per open file, so every open file is
//! wrapped in a [`FileHandle`] whose mutex is held only for one engine call.

use crate::error::{NcError, Result};
use crate::types::{Attribute, Dimension, VariableSchema};
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Native engine code: variable not found
pub const NC_ENOTVAR: i32 = -49;
/// Native engine code: index exceeds dimension bound
pub const NC_EINVALCOORDS: i32 = -40;
/// Native engine code: start + count exceeds dimension bound
pub const NC_EEDGE: i32 = -57;
/// Native engine code: not a recognised file
pub const NC_ENOTNC: i32 = -51;
/// OS code: no such file or directory
pub const ENOENT: i32 = 2;

/// A file location: a plain path or a `file://` URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    raw: String,
    path: PathBuf,
}

impl Location {
    /// Parse a location string
    pub fn parse(raw: &str) -> Result<Self> {
        let path = if let Some(scheme_end) = raw.find("://") {
            let scheme = &raw[..scheme_end];
            match scheme {
                "file" => &raw[scheme_end + 3..],
                _ => {
                    return Err(NcError::InvalidLocation(format!(
                        "Unsupported scheme: {}",
                        scheme
                    )))
                }
            }
        } else {
            raw
        };

        if path.is_empty() {
            return Err(NcError::InvalidLocation("empty path".to_string()));
        }

        Ok(Self {
            raw: raw.to_string(),
            path: PathBuf::from(path),
        })
    }

    /// The location exactly as supplied
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Everything a file declares about itself
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileSchema {
    pub dimensions: Vec<Dimension>,
    pub variables: Vec<VariableSchema>,
    pub global_attributes: Vec<Attribute>,
}

impl FileSchema {
    pub fn dimension(&self, name: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.name == name)
    }

    pub fn variable(&self, name: &str) -> Option<&VariableSchema> {
        self.variables.iter().find(|v| v.name == name)
    }

    pub fn growable_dimension(&self) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.growable)
    }

    pub fn global_attribute(&self, name: &str) -> Option<&Attribute> {
        self.global_attributes.iter().find(|a| a.name == name)
    }

    /// Per-axis lengths of a variable in this file
    pub fn variable_shape(&self, name: &str) -> Option<Vec<usize>> {
        self.variable(name)?.shape(&self.dimensions)
    }
}

/// One open file of the single-file engine
#[async_trait]
pub trait DataFile: Send {
    /// List dimensions, variables and global attributes
    async fn schema(&mut self) -> Result<FileSchema>;

    /// Read the hyperslab `start`/`edges` of `variable` as native-endian row-major bytes
    async fn read(&mut self, variable: &str, start: &[usize], edges: &[usize]) -> Result<Bytes>;
}

/// Opens files for the series layer
#[async_trait]
pub trait ArrayEngine: Send + Sync {
    async fn open(&self, location: &Location) -> Result<Box<dyn DataFile>>;
}

/// An open file guarded by its own lock
pub struct FileHandle {
    location: Location,
    schema: FileSchema,
    file: Mutex<Box<dyn DataFile>>,
}

impl FileHandle {
    /// Open `location` and cache its schema
    pub async fn open(engine: &dyn ArrayEngine, location: Location) -> Result<Self> {
        let mut file = engine.open(&location).await?;
        let schema = file.schema().await?;
        tracing::debug!(
            location = %location,
            dimensions = schema.dimensions.len(),
            variables = schema.variables.len(),
            "opened file"
        );

        Ok(Self {
            location,
            schema,
            file: Mutex::new(file),
        })
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn schema(&self) -> &FileSchema {
        &self.schema
    }

    /// Local length of the named dimension in this file
    pub fn dimension_length(&self, name: &str) -> Option<usize> {
        self.schema.dimension(name).map(|d| d.length)
    }

    /// Read through the engine; the file lock is held only for this call
    pub async fn read(&self, variable: &str, start: &[usize], edges: &[usize]) -> Result<Bytes> {
        let mut file = self.file.lock().await;
        file.read(variable, start, edges).await
    }
}

impl fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileHandle")
            .field("location", &self.location)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}
