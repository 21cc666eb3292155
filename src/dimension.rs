//! Series dimensions: one logical axis spanning an ordered file list
//!
//! A fixed dimension has the same length in every file and is copied from the root file.
//! The growable (unlimited) dimension is concatenated across files in caller order: each
//! file contributes its local length, and a prefix-sum boundary table maps global positions
//! back to `(file, local position)`.

use crate::engine::FileHandle;
use crate::error::{NcError, Result};
use crate::types::Dimension;
use std::ops::Range;
use std::sync::Arc;

/// The part of a global growable-axis range that lives in one file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fragment {
    /// Index of the file in the series
    pub file_index: usize,
    /// First position inside that file
    pub local_start: usize,
    /// Number of positions taken from that file
    pub local_length: usize,
    /// Global position of `local_start`
    pub global_start: usize,
}

impl Fragment {
    /// Global half-open range covered by the fragment
    pub fn global_range(&self) -> Range<usize> {
        self.global_start..self.global_start + self.local_length
    }
}

/// A dimension as seen across the whole series
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesDimension {
    name: String,
    length: usize,
    growable: bool,
    local_lengths: Vec<usize>,
    boundaries: Vec<usize>,
}

impl SeriesDimension {
    /// Fixed dimension copied from a representative file dimension
    pub fn fixed(dimension: &Dimension) -> Self {
        Self {
            name: dimension.name.clone(),
            length: dimension.length,
            growable: false,
            local_lengths: Vec::new(),
            boundaries: Vec::new(),
        }
    }

    /// Growable dimension built from per-file local lengths, in file order
    pub fn from_local_lengths(name: impl Into<String>, local_lengths: Vec<usize>) -> Self {
        let boundaries: Vec<usize> = local_lengths
            .iter()
            .scan(0usize, |total, &len| {
                *total += len;
                Some(*total)
            })
            .collect();

        Self {
            name: name.into(),
            length: boundaries.last().copied().unwrap_or(0),
            growable: true,
            local_lengths,
            boundaries,
        }
    }

    /// Growable dimension spanning `files`
    ///
    /// Fails with `ConstructionMismatch` if any file lacks the dimension.
    pub fn growable(dimension: &Dimension, files: &[Arc<FileHandle>]) -> Result<Self> {
        let local_lengths = files
            .iter()
            .map(|file| {
                file.dimension_length(&dimension.name).ok_or_else(|| {
                    NcError::ConstructionMismatch(format!(
                        "{} has no dimension {}",
                        file.location(),
                        dimension.name
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::from_local_lengths(dimension.name.clone(), local_lengths))
    }

    /// Fixed or growable, depending on the representative dimension
    pub fn from_files(dimension: &Dimension, files: &[Arc<FileHandle>]) -> Result<Self> {
        if dimension.growable {
            Self::growable(dimension, files)
        } else {
            Ok(Self::fixed(dimension))
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Total length; for the growable dimension this spans all files
    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn is_growable(&self) -> bool {
        self.growable
    }

    /// Running totals of the local lengths; empty for fixed dimensions
    pub fn boundaries(&self) -> &[usize] {
        &self.boundaries
    }

    /// Per-file lengths; empty for fixed dimensions
    pub fn local_lengths(&self) -> &[usize] {
        &self.local_lengths
    }

    pub fn file_count(&self) -> usize {
        self.local_lengths.len()
    }

    fn require_growable(&self) -> Result<()> {
        if self.growable {
            Ok(())
        } else {
            Err(NcError::Unsupported(format!(
                "dimension {} is not growable",
                self.name
            )))
        }
    }

    /// File index and local position holding global position `position`
    pub fn file_for_position(&self, position: usize) -> Result<(usize, usize)> {
        if position >= self.length {
            return Err(NcError::OutOfRange(format!(
                "position {} outside {} of length {}",
                position, self.name, self.length
            )));
        }
        if !self.growable {
            return Ok((0, position));
        }

        let file_index = self.boundaries.partition_point(|&b| b <= position);
        let file_start = file_index
            .checked_sub(1)
            .map_or(0, |previous| self.boundaries[previous]);
        Ok((file_index, position - file_start))
    }

    /// Split the global range `start..start + length` into per-file fragments
    ///
    /// Fragments come back in ascending file order and tile the request exactly; callers
    /// concatenate per-file reads in this order. Files with no positions in the range
    /// produce no fragment.
    pub fn fragments_for_start(&self, start: usize, length: usize) -> Result<Vec<Fragment>> {
        self.require_growable()?;

        let end = start.checked_add(length);
        if end.map_or(true, |end| end > self.length) {
            return Err(NcError::OutOfRange(format!(
                "range {}+{} outside {} of length {}",
                start, length, self.name, self.length
            )));
        }
        if length == 0 {
            return Ok(Vec::new());
        }

        let (mut file_index, mut local_start) = self.file_for_position(start)?;
        let mut remaining = length;
        let mut global_start = start;
        let mut fragments = Vec::new();

        while remaining > 0 {
            let available = self.local_lengths[file_index] - local_start;
            let local_length = remaining.min(available);
            if local_length > 0 {
                fragments.push(Fragment {
                    file_index,
                    local_start,
                    local_length,
                    global_start,
                });
            }

            remaining -= local_length;
            global_start += local_length;
            file_index += 1;
            local_start = 0;
        }

        tracing::trace!(
            dimension = %self.name,
            start,
            length,
            fragments = fragments.len(),
            "partitioned range"
        );
        Ok(fragments)
    }

    /// Same as [`SeriesDimension::fragments_for_start`] for a half-open range
    pub fn fragments_for_range(&self, range: Range<usize>) -> Result<Vec<Fragment>> {
        if range.end < range.start {
            return Err(NcError::OutOfRange(format!(
                "reversed range {}..{} on {}",
                range.start, range.end, self.name
            )));
        }
        self.fragments_for_start(range.start, range.end - range.start)
    }
}
