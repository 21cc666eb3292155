//! In-process single-file engine
//!
//! [`MemoryEngine`] keeps whole files in memory, keyed by location path. It is the engine
//! used by the test suite and by [`crate::snapshot`], and it is handy for feeding data
//! produced elsewhere through the series layer.

use crate::engine::{
    ArrayEngine, DataFile, FileSchema, Location, ENOENT, NC_EEDGE, NC_EINVALCOORDS, NC_ENOTVAR,
};
use crate::error::{NcError, Result};
use crate::slab::Slab;
use crate::types::{Attribute, Dimension, VariableSchema};
use crate::utils::checked_byte_len;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// A complete file held in memory
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryFile {
    schema: FileSchema,
    data: BTreeMap<String, Bytes>,
}

impl MemoryFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dimension(mut self, dimension: Dimension) -> Self {
        self.schema.dimensions.push(dimension);
        self
    }

    pub fn with_global_attribute(mut self, attribute: Attribute) -> Self {
        self.schema.global_attributes.push(attribute);
        self
    }

    /// Add a variable and its full row-major contents
    ///
    /// Every dimension the variable names must already exist, and `data` must hold
    /// exactly one element per cell of the variable's shape.
    pub fn with_variable(mut self, variable: VariableSchema, data: impl Into<Bytes>) -> Result<Self> {
        let data = data.into();
        let shape = variable.shape(&self.schema.dimensions).ok_or_else(|| {
            NcError::NotFound(format!(
                "dimension of variable {} ({:?})",
                variable.name, variable.dimension_names
            ))
        })?;

        let expected = checked_byte_len(&shape, variable.data_type.size_in_bytes())
            .unwrap_or(usize::MAX);
        if data.len() != expected {
            return Err(NcError::ShapeMismatch {
                expected,
                actual: data.len(),
            });
        }

        self.data.insert(variable.name.clone(), data);
        self.schema.variables.push(variable);
        Ok(self)
    }

    pub fn schema(&self) -> &FileSchema {
        &self.schema
    }

    pub(crate) fn into_data_file(self) -> Box<dyn DataFile> {
        Box::new(MemoryDataFile {
            file: Arc::new(self),
        })
    }

    /// Hyperslab read with engine-style error codes
    pub fn read(&self, variable: &str, start: &[usize], edges: &[usize]) -> Result<Bytes> {
        let schema = self
            .schema
            .variable(variable)
            .ok_or_else(|| NcError::underlying(NC_ENOTVAR, format!("no variable {}", variable)))?;
        let shape = schema.shape(&self.schema.dimensions).ok_or_else(|| {
            NcError::underlying(NC_ENOTVAR, format!("variable {} has no shape", variable))
        })?;

        if start.len() != shape.len() || edges.len() != shape.len() {
            return Err(NcError::underlying(
                NC_EINVALCOORDS,
                format!(
                    "{} expects {} coordinates, got {}/{}",
                    variable,
                    shape.len(),
                    start.len(),
                    edges.len()
                ),
            ));
        }
        for axis in 0..shape.len() {
            if start[axis] > shape[axis] {
                return Err(NcError::underlying(
                    NC_EINVALCOORDS,
                    format!("start {} beyond axis {} of {}", start[axis], axis, variable),
                ));
            }
            if start[axis]
                .checked_add(edges[axis])
                .map_or(true, |end| end > shape[axis])
            {
                return Err(NcError::underlying(
                    NC_EEDGE,
                    format!("edge {} beyond axis {} of {}", edges[axis], axis, variable),
                ));
            }
        }

        let data = self.data.get(variable).cloned().unwrap_or_default();
        Slab::new(data, schema.data_type, shape)?.sub_slab(start, edges)
    }
}

struct MemoryDataFile {
    file: Arc<MemoryFile>,
}

#[async_trait]
impl DataFile for MemoryDataFile {
    async fn schema(&mut self) -> Result<FileSchema> {
        Ok(self.file.schema.clone())
    }

    async fn read(&mut self, variable: &str, start: &[usize], edges: &[usize]) -> Result<Bytes> {
        self.file.read(variable, start, edges)
    }
}

/// Engine serving [`MemoryFile`]s registered by location
#[derive(Default)]
pub struct MemoryEngine {
    files: RwLock<HashMap<String, Arc<MemoryFile>>>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(location: &str) -> Result<String> {
        Ok(Location::parse(location)?
            .path()
            .to_string_lossy()
            .into_owned())
    }

    /// Register or replace the file at `location`
    ///
    /// Files already opened keep serving the contents they were opened with.
    pub fn insert(&self, location: &str, file: MemoryFile) -> Result<()> {
        self.files.write().insert(Self::key(location)?, Arc::new(file));
        Ok(())
    }

    pub fn remove(&self, location: &str) -> Result<Option<Arc<MemoryFile>>> {
        Ok(self.files.write().remove(&Self::key(location)?))
    }

    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.read().is_empty()
    }
}

#[async_trait]
impl ArrayEngine for MemoryEngine {
    async fn open(&self, location: &Location) -> Result<Box<dyn DataFile>> {
        let key = location.path().to_string_lossy().into_owned();
        let file = self.files.read().get(&key).cloned().ok_or_else(|| {
            NcError::underlying(ENOENT, format!("no such file: {}", location))
        })?;
        Ok(Box::new(MemoryDataFile { file }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{decode_elements, DataType};

    fn grid_file() -> MemoryFile {
        let data: Vec<u8> = (0..12i16).flat_map(|v| v.to_ne_bytes()).collect();
        MemoryFile::new()
            .with_dimension(Dimension::growable("time", 2))
            .with_dimension(Dimension::new("cell", 6))
            .with_variable(
                VariableSchema::new("count", DataType::Short, &["time", "cell"]),
                data,
            )
            .unwrap()
    }

    #[test]
    fn test_with_variable_validates() {
        let err = MemoryFile::new()
            .with_dimension(Dimension::new("x", 3))
            .with_variable(VariableSchema::new("v", DataType::Int, &["x"]), vec![0u8; 8])
            .unwrap_err();
        assert!(matches!(err, NcError::ShapeMismatch { expected: 12, actual: 8 }));

        let err = MemoryFile::new()
            .with_variable(VariableSchema::new("v", DataType::Int, &["y"]), vec![0u8; 4])
            .unwrap_err();
        assert!(matches!(err, NcError::NotFound(_)));
    }

    #[test]
    fn test_read_hyperslab() {
        let file = grid_file();
        let bytes = file.read("count", &[1, 2], &[1, 3]).unwrap();
        let values: Vec<i16> = decode_elements(DataType::Short, &bytes).unwrap();
        assert_eq!(values, vec![8, 9, 10]);
    }

    #[test]
    fn test_read_errors_carry_native_codes() {
        let file = grid_file();
        assert_eq!(
            file.read("missing", &[0], &[1]).unwrap_err().native_code(),
            Some(NC_ENOTVAR)
        );
        assert_eq!(
            file.read("count", &[0], &[1]).unwrap_err().native_code(),
            Some(NC_EINVALCOORDS)
        );
        assert_eq!(
            file.read("count", &[1, 0], &[2, 6]).unwrap_err().native_code(),
            Some(NC_EEDGE)
        );
        assert_eq!(
            file.read("count", &[1, 3], &[1, usize::MAX]).unwrap_err().native_code(),
            Some(NC_EEDGE)
        );
    }

    #[tokio::test]
    async fn test_engine_open_by_path_or_url() {
        let engine = MemoryEngine::new();
        engine.insert("/runs/a.nc", grid_file()).unwrap();
        assert_eq!(engine.len(), 1);

        let url = Location::parse("file:///runs/a.nc").unwrap();
        let mut file = engine.open(&url).await.unwrap();
        let schema = file.schema().await.unwrap();
        assert_eq!(schema.variables.len(), 1);

        let missing = Location::parse("/runs/b.nc").unwrap();
        let err = engine.open(&missing).await.err().unwrap();
        assert_eq!(err.native_code(), Some(ENOENT));
    }
}
