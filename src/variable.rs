//! Series variables: one logical variable read across every file of a series
//!
//! A variable that uses the growable dimension must use it as axis 0. Per-file reads then
//! return whole row-major runs that can be appended in fragment order with no
//! interleaving. Variables without the growable axis are served from the root file.

use crate::dimension::SeriesDimension;
use crate::engine::FileHandle;
use crate::error::{NcError, Result};
use crate::series::SeriesSnapshot;
use crate::slab::Slab;
use crate::types::{Attribute, DataType, Value, VariableSchema};
use crate::utils::element_count;
use bytes::{Bytes, BytesMut};
use std::sync::{Arc, Weak};

/// A variable spanning the files of a series
#[derive(Debug, Clone)]
pub struct SeriesVariable {
    name: String,
    data_type: DataType,
    dimension_names: Vec<String>,
    shape: Vec<usize>,
    growable: Option<SeriesDimension>,
    attributes: Vec<Attribute>,
    snapshot: Weak<SeriesSnapshot>,
}

impl SeriesVariable {
    /// Resolve a root-file variable against the series
    ///
    /// Fails with `ConstructionMismatch` when a dimension is unknown, when the growable
    /// dimension is not axis 0, or when another file disagrees on the variable's type,
    /// dimensions or fixed-axis shape. The result is unbound until the owning snapshot
    /// attaches it.
    pub(crate) fn new(
        schema: &VariableSchema,
        dimensions: &[SeriesDimension],
        files: &[Arc<FileHandle>],
    ) -> Result<Self> {
        let resolved = schema
            .dimension_names
            .iter()
            .map(|name| {
                dimensions.iter().find(|d| d.name() == name).ok_or_else(|| {
                    NcError::ConstructionMismatch(format!(
                        "variable {} uses unknown dimension {}",
                        schema.name, name
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let growable_axis = resolved.iter().position(|d| d.is_growable());
        if let Some(axis) = growable_axis {
            if axis != 0 {
                return Err(NcError::ConstructionMismatch(format!(
                    "variable {} uses growable dimension {} as axis {}, not axis 0",
                    schema.name,
                    resolved[axis].name(),
                    axis
                )));
            }
            if resolved.iter().skip(1).any(|d| d.is_growable()) {
                return Err(NcError::ConstructionMismatch(format!(
                    "variable {} uses more than one growable dimension",
                    schema.name
                )));
            }
            Self::check_files(schema, &resolved, files)?;
        }

        Ok(Self {
            name: schema.name.clone(),
            data_type: schema.data_type,
            dimension_names: schema.dimension_names.clone(),
            shape: resolved.iter().map(|d| d.len()).collect(),
            growable: growable_axis.map(|axis| resolved[axis].clone()),
            attributes: schema.attributes.clone(),
            snapshot: Weak::new(),
        })
    }

    fn check_files(
        schema: &VariableSchema,
        resolved: &[&SeriesDimension],
        files: &[Arc<FileHandle>],
    ) -> Result<()> {
        for file in files {
            let other = file.schema().variable(&schema.name).ok_or_else(|| {
                NcError::ConstructionMismatch(format!(
                    "{} has no variable {}",
                    file.location(),
                    schema.name
                ))
            })?;

            if other.data_type != schema.data_type {
                return Err(NcError::ConstructionMismatch(format!(
                    "variable {} is {} in {} but {} in the root file",
                    schema.name,
                    other.data_type,
                    file.location(),
                    schema.data_type
                )));
            }
            if other.dimension_names != schema.dimension_names {
                return Err(NcError::ConstructionMismatch(format!(
                    "variable {} has dimensions {:?} in {}, expected {:?}",
                    schema.name,
                    other.dimension_names,
                    file.location(),
                    schema.dimension_names
                )));
            }

            let shape = file.schema().variable_shape(&schema.name).ok_or_else(|| {
                NcError::ConstructionMismatch(format!(
                    "variable {} has unresolved dimensions in {}",
                    schema.name,
                    file.location()
                ))
            })?;
            for (axis, dim) in resolved.iter().enumerate().skip(1) {
                if shape[axis] != dim.len() {
                    return Err(NcError::ConstructionMismatch(format!(
                        "variable {} axis {} is {} long in {}, expected {}",
                        schema.name,
                        axis,
                        shape[axis],
                        file.location(),
                        dim.len()
                    )));
                }
            }
        }
        Ok(())
    }

    pub(crate) fn attach(mut self, snapshot: Weak<SeriesSnapshot>) -> Self {
        self.snapshot = snapshot;
        self
    }

    fn snapshot(&self) -> Result<Arc<SeriesSnapshot>> {
        self.snapshot.upgrade().ok_or_else(|| {
            NcError::Detached(format!(
                "variable {} outlived the series it was built from",
                self.name
            ))
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn type_name(&self) -> &'static str {
        self.data_type.type_name()
    }

    /// Dimension names in significance order
    pub fn dimension_names(&self) -> &[String] {
        &self.dimension_names
    }

    /// Series-wide per-axis lengths
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Position of the growable axis; always `Some(0)` when present
    pub fn growable_axis(&self) -> Option<usize> {
        self.growable.as_ref().map(|_| 0)
    }

    pub fn is_growable(&self) -> bool {
        self.growable.is_some()
    }

    /// Series-wide length of the growable axis
    pub fn growable_length(&self) -> Option<usize> {
        self.growable.as_ref().map(SeriesDimension::len)
    }

    pub fn uses_dimension(&self, name: &str) -> bool {
        self.dimension_names.iter().any(|d| d == name)
    }

    /// A coordinate variable: one axis named like the variable itself
    pub fn is_dimension_variable(&self) -> bool {
        self.dimension_names.len() == 1 && self.dimension_names[0] == self.name
    }

    pub fn element_count(&self) -> usize {
        element_count(&self.shape)
    }

    pub fn byte_size(&self) -> usize {
        self.element_count() * self.data_type.size_in_bytes()
    }

    /// Dimension names as `time, lat, lon`
    pub fn dim_description(&self) -> String {
        self.dimension_names.join(", ")
    }

    /// CDL-style declaration such as `float tas(time, lat, lon)`
    pub fn type_with_dim_description(&self) -> String {
        format!(
            "{} {}({})",
            self.data_type,
            self.name,
            self.dim_description()
        )
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    fn check_request(&self, start: &[usize], edges: &[usize]) -> Result<()> {
        if start.len() != self.rank() || edges.len() != self.rank() {
            return Err(NcError::OutOfRange(format!(
                "{} has {} axes, got {} start and {} edge values",
                self.name,
                self.rank(),
                start.len(),
                edges.len()
            )));
        }

        for axis in 0..self.rank() {
            let end = start[axis].checked_add(edges[axis]);
            if end.map_or(true, |end| end > self.shape[axis]) {
                return Err(NcError::OutOfRange(format!(
                    "{}: {}+{} on axis {} exceeds length {}",
                    self.name, start[axis], edges[axis], axis, self.shape[axis]
                )));
            }
        }
        Ok(())
    }

    /// Read the region `start`/`edges` as native-endian row-major bytes
    ///
    /// The growable-axis range is split into per-file fragments, each file is read in turn
    /// and the results are appended in fragment order. The first failing file read aborts
    /// the whole request.
    pub async fn read(&self, start: &[usize], edges: &[usize]) -> Result<Bytes> {
        let snapshot = self.snapshot()?;

        let Some(dimension) = &self.growable else {
            return snapshot.root().read(&self.name, start, edges).await;
        };

        self.check_request(start, edges)?;
        let fragments = dimension.fragments_for_start(start[0], edges[0])?;
        let expected = element_count(edges) * self.data_type.size_in_bytes();
        tracing::debug!(
            variable = %self.name,
            ?start,
            ?edges,
            fragments = fragments.len(),
            "reading across files"
        );

        let mut out = BytesMut::with_capacity(expected);
        let mut local_start = start.to_vec();
        let mut local_edges = edges.to_vec();
        for fragment in &fragments {
            local_start[0] = fragment.local_start;
            local_edges[0] = fragment.local_length;

            let file = snapshot.file(fragment.file_index)?;
            let bytes = file
                .read(&self.name, &local_start, &local_edges)
                .await
                .map_err(|e| {
                    tracing::warn!(
                        variable = %self.name,
                        location = %file.location(),
                        error = %e,
                        "fragment read failed"
                    );
                    e
                })?;
            out.extend_from_slice(&bytes);
        }

        if out.len() != expected {
            return Err(NcError::ShapeMismatch {
                expected,
                actual: out.len(),
            });
        }
        Ok(out.freeze())
    }

    /// Every value of the variable across all files
    pub async fn read_all(&self) -> Result<Bytes> {
        let start = vec![0; self.rank()];
        self.read(&start, &self.shape).await
    }

    /// Decode the single element at `coordinates`
    pub async fn single_value(&self, coordinates: &[usize]) -> Result<Value> {
        let edges = vec![1; coordinates.len()];
        let bytes = self.read(coordinates, &edges).await?;
        Value::decode(self.data_type, &bytes)
    }

    /// The single element at `coordinates`, formatted for display
    pub async fn string_value(&self, coordinates: &[usize]) -> Result<String> {
        Ok(self.single_value(coordinates).await?.to_string())
    }

    /// Read a region into a [`Slab`] for repeated in-memory slicing
    pub async fn read_slab(&self, start: &[usize], edges: &[usize]) -> Result<Slab> {
        let bytes = self.read(start, edges).await?;
        Slab::new(bytes, self.data_type, edges.to_vec())
    }

    /// The whole variable as a [`Slab`]
    pub async fn read_all_slab(&self) -> Result<Slab> {
        let bytes = self.read_all().await?;
        Slab::new(bytes, self.data_type, self.shape.clone())
    }
}
