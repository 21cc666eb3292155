//! In-memory N-dimensional slabs
//!
//! A [`Slab`] is an immutable snapshot of a variable's data over some coordinate region,
//! held as one row-major byte buffer. Axis 0 is the most significant (slowest varying)
//! axis and the last axis varies fastest.
//!
//! Slabs exist so that a region read once from the files can be sliced many times in
//! memory. Every [`Slab::sub_slab`] call returns a freshly allocated buffer, so callers on
//! different threads never alias each other's output.

use crate::error::{NcError, Result};
use crate::types::{decode_elements, DataType, Element, Value};
use crate::utils::{checked_byte_len, element_count, format_shape, row_major_strides};
use bytes::Bytes;
use ndarray::{ArrayD, IxDyn};

/// Immutable row-major view over a byte buffer
#[derive(Debug, Clone, PartialEq)]
pub struct Slab {
    data_type: DataType,
    lengths: Vec<usize>,
    strides: Vec<usize>,
    data: Bytes,
}

impl Slab {
    /// Wrap `data` as a slab of `data_type` elements shaped by `lengths`
    ///
    /// Fails with [`NcError::ShapeMismatch`] unless the buffer holds exactly
    /// `product(lengths)` elements. Shapes whose byte size overflows `usize` report
    /// `expected: usize::MAX`.
    pub fn new(data: impl Into<Bytes>, data_type: DataType, lengths: Vec<usize>) -> Result<Self> {
        let data = data.into();
        let expected =
            checked_byte_len(&lengths, data_type.size_in_bytes()).unwrap_or(usize::MAX);
        if data.len() != expected {
            return Err(NcError::ShapeMismatch {
                expected,
                actual: data.len(),
            });
        }

        let strides = row_major_strides(&lengths);
        Ok(Self {
            data_type,
            lengths,
            strides,
            data,
        })
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// The whole buffer
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Per-axis lengths in significance order
    pub fn lengths(&self) -> &[usize] {
        &self.lengths
    }

    pub fn rank(&self) -> usize {
        self.lengths.len()
    }

    pub fn element_count(&self) -> usize {
        element_count(&self.lengths)
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// Row-major element index of `coords`
    ///
    /// This is an element count, not a byte offset.
    pub fn position_from_coordinates(&self, coords: &[usize]) -> Result<usize> {
        if coords.len() != self.rank() {
            return Err(NcError::OutOfRange(format!(
                "expected {} coordinates, got {}",
                self.rank(),
                coords.len()
            )));
        }

        for (axis, (&coord, &length)) in coords.iter().zip(&self.lengths).enumerate() {
            if coord >= length {
                return Err(NcError::OutOfRange(format!(
                    "coordinate {} on axis {} outside length {}",
                    coord, axis, length
                )));
            }
        }

        Ok(self.offset_of(coords))
    }

    fn offset_of(&self, coords: &[usize]) -> usize {
        coords
            .iter()
            .zip(&self.strides)
            .map(|(coord, stride)| coord * stride)
            .sum()
    }

    fn check_region(&self, start: &[usize], lengths: &[usize]) -> Result<()> {
        if start.len() != self.rank() || lengths.len() != self.rank() {
            return Err(NcError::OutOfRange(format!(
                "region rank ({}, {}) does not match slab rank {}",
                start.len(),
                lengths.len(),
                self.rank()
            )));
        }

        for axis in 0..self.rank() {
            let end = start[axis].checked_add(lengths[axis]);
            if end.map_or(true, |end| end > self.lengths[axis]) {
                return Err(NcError::OutOfRange(format!(
                    "region {}+{} on axis {} exceeds length {}",
                    start[axis], lengths[axis], axis, self.lengths[axis]
                )));
            }
        }

        Ok(())
    }

    /// Copy out the region starting at `start` with per-axis `lengths`
    ///
    /// When the innermost axis is selected over its full extent, one contiguous run is
    /// copied per combination of outer coordinates; otherwise elements are gathered one by
    /// one. Both paths produce identical output.
    pub fn sub_slab(&self, start: &[usize], lengths: &[usize]) -> Result<Bytes> {
        self.check_region(start, lengths)?;

        if element_count(lengths) == 0 {
            return Ok(Bytes::new());
        }
        if self.rank() == 0 {
            return Ok(Bytes::copy_from_slice(&self.data));
        }

        let inner = self.rank() - 1;
        if start[inner] == 0 && lengths[inner] == self.lengths[inner] {
            Ok(self.copy_runs(start, lengths))
        } else {
            Ok(self.gather(start, lengths))
        }
    }

    /// Same region as [`Slab::sub_slab`], always using the element-by-element path
    pub fn sub_slab_gather(&self, start: &[usize], lengths: &[usize]) -> Result<Bytes> {
        self.check_region(start, lengths)?;

        if element_count(lengths) == 0 {
            return Ok(Bytes::new());
        }
        Ok(self.gather(start, lengths))
    }

    /// Region copy wrapped back into a slab
    pub fn sub_slab_as_slab(&self, start: &[usize], lengths: &[usize]) -> Result<Slab> {
        let data = self.sub_slab(start, lengths)?;
        Slab::new(data, self.data_type, lengths.to_vec())
    }

    fn copy_runs(&self, start: &[usize], lengths: &[usize]) -> Bytes {
        let width = self.data_type.size_in_bytes();
        let run_bytes = lengths[self.rank() - 1] * width;
        let mut out = Vec::with_capacity(element_count(lengths) * width);

        let mut cursor = start.to_vec();
        let mut next = Some(self.offset_of(&cursor));
        while let Some(position) = next {
            let begin = position * width;
            out.extend_from_slice(&self.data[begin..begin + run_bytes]);
            next = self.next_run_start(&mut cursor, start, lengths);
        }

        Bytes::from(out)
    }

    fn gather(&self, start: &[usize], lengths: &[usize]) -> Bytes {
        let width = self.data_type.size_in_bytes();
        let mut out = Vec::with_capacity(element_count(lengths) * width);

        let mut cursor = start.to_vec();
        loop {
            let begin = self.offset_of(&cursor) * width;
            out.extend_from_slice(&self.data[begin..begin + width]);

            // Odometer over every axis, innermost first
            let mut axis = self.rank();
            loop {
                if axis == 0 {
                    return Bytes::from(out);
                }
                axis -= 1;
                cursor[axis] += 1;
                if cursor[axis] < start[axis] + lengths[axis] {
                    break;
                }
                cursor[axis] = start[axis];
            }
        }
    }

    /// Advance `cursor` to the start of the next contiguous run of the region
    ///
    /// Runs cover the whole innermost axis of the region, so only the outer axes take part
    /// in the ripple-carry increment. Returns the element index where the next run starts,
    /// or `None` once the region is exhausted or when any slice does not match the slab rank.
    pub fn next_run_start(
        &self,
        cursor: &mut [usize],
        start: &[usize],
        lengths: &[usize],
    ) -> Option<usize> {
        let rank = self.rank();
        if cursor.len() != rank || start.len() != rank || lengths.len() != rank {
            return None;
        }
        let outer = rank.checked_sub(1)?;

        for axis in (0..outer).rev() {
            cursor[axis] += 1;
            if cursor[axis] < start[axis] + lengths[axis] {
                return Some(self.offset_of(cursor));
            }
            cursor[axis] = start[axis];
        }

        None
    }

    /// Decode the element at `coords`
    pub fn value_at(&self, coords: &[usize]) -> Result<Value> {
        let width = self.data_type.size_in_bytes();
        let begin = self.position_from_coordinates(coords)? * width;
        Value::decode(self.data_type, &self.data[begin..begin + width])
    }

    /// All elements as typed values, in row-major order
    pub fn values<T: Element>(&self) -> Result<Vec<T>> {
        decode_elements(self.data_type, &self.data)
    }

    /// Copy the slab into an owned `ndarray` of the slab's shape
    pub fn to_ndarray<T: Element>(&self) -> Result<ArrayD<T>> {
        let values = self.values::<T>()?;
        ArrayD::from_shape_vec(IxDyn(&self.lengths), values)
            .map_err(|e| NcError::InvalidFormat(e.to_string()))
    }

    pub fn summary(&self) -> String {
        format!(
            "{} slab [{}], {} elements",
            self.data_type,
            format_shape(&self.lengths),
            self.element_count()
        )
    }
}
