//! Dimensioned arrays: a numeric buffer paired one-to-one with per-axis
//! [`Dimension`] values.
//!
//! The buffer and its dimension list travel together through every
//! operation. Anything that changes an axis's length either keeps that
//! axis's Dimension (length unaffected) or derives the new one through the
//! dimension's size-transition rule; metadata is never silently dropped.
//!
//! Composition over subclassing: the buffer is a plain [`ArrayData`] and
//! the semantics live in the parallel `Vec<Dimension>`.

use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::dimension::{Dimension, IndexSpec};
use crate::error::{ArrayError, AudiolithResult};

/// Element type of a column or array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DType {
    F32,
    F64,
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DType::F32 => write!(f, "f32"),
            DType::F64 => write!(f, "f64"),
        }
    }
}

/// Typed numeric payload, row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArrayData {
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl ArrayData {
    pub fn dtype(&self) -> DType {
        match self {
            ArrayData::F32(_) => DType::F32,
            ArrayData::F64(_) => DType::F64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ArrayData::F32(v) => v.len(),
            ArrayData::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Zero-filled payload of the given type and length.
    pub fn zeros(dtype: DType, len: usize) -> Self {
        match dtype {
            DType::F32 => ArrayData::F32(vec![0.0; len]),
            DType::F64 => ArrayData::F64(vec![0.0; len]),
        }
    }

    /// Element at a flat index, widened to f64.
    pub fn get(&self, index: usize) -> Option<f64> {
        match self {
            ArrayData::F32(v) => v.get(index).map(|&x| f64::from(x)),
            ArrayData::F64(v) => v.get(index).copied(),
        }
    }

    fn copy_region(&self, shape: &[usize], ranges: &[Range<usize>]) -> ArrayData {
        match self {
            ArrayData::F32(v) => ArrayData::F32(copy_region(v, shape, ranges)),
            ArrayData::F64(v) => ArrayData::F64(copy_region(v, shape, ranges)),
        }
    }
}

fn row_major_strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![1; shape.len()];
    for axis in (0..shape.len().saturating_sub(1)).rev() {
        strides[axis] = strides[axis + 1] * shape[axis + 1];
    }
    strides
}

/// Copy the sub-block described by one range per axis out of a row-major
/// buffer. Runs of the last axis are copied contiguously; an odometer
/// walks the outer axes.
fn copy_region<T: Copy>(data: &[T], shape: &[usize], ranges: &[Range<usize>]) -> Vec<T> {
    let rank = shape.len();
    if rank == 0 {
        return data.to_vec();
    }
    let strides = row_major_strides(shape);
    let out_len: usize = ranges.iter().map(Range::len).product();
    let mut out = Vec::with_capacity(out_len);
    if out_len == 0 {
        return out;
    }

    let last = &ranges[rank - 1];
    let mut odometer: Vec<usize> = ranges[..rank - 1].iter().map(|r| r.start).collect();
    loop {
        let base: usize = odometer
            .iter()
            .zip(&strides[..rank - 1])
            .map(|(i, s)| i * s)
            .sum();
        out.extend_from_slice(&data[base + last.start..base + last.end]);

        // Advance the outer-axis odometer, rightmost axis fastest.
        let mut axis = rank - 1;
        loop {
            if axis == 0 {
                return out;
            }
            axis -= 1;
            odometer[axis] += 1;
            if odometer[axis] < ranges[axis].end {
                break;
            }
            odometer[axis] = ranges[axis].start;
        }
    }
}

/// A multidimensional numeric buffer with one [`Dimension`] per axis.
#[derive(Debug, Clone, PartialEq)]
pub struct DimArray {
    data: ArrayData,
    shape: Vec<usize>,
    dims: Vec<Dimension>,
}

impl DimArray {
    /// Construct from a buffer, its shape, and one Dimension per axis.
    pub fn new(
        data: ArrayData,
        shape: Vec<usize>,
        dims: Vec<Dimension>,
    ) -> AudiolithResult<Self> {
        if dims.len() != shape.len() {
            return Err(ArrayError::RankMismatch {
                rank: shape.len(),
                dims: dims.len(),
            }
            .into());
        }
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(ArrayError::DimensionMismatch {
                axis: 0,
                message: format!(
                    "buffer holds {} element(s) but shape {:?} implies {}",
                    data.len(),
                    shape,
                    expected
                ),
            }
            .into());
        }
        Ok(Self { data, shape, dims })
    }

    /// Rank-1 f32 array.
    pub fn from_f32(values: Vec<f32>, dim: Dimension) -> Self {
        let shape = vec![values.len()];
        Self {
            data: ArrayData::F32(values),
            shape,
            dims: vec![dim],
        }
    }

    /// Rank-1 f64 array.
    pub fn from_f64(values: Vec<f64>, dim: Dimension) -> Self {
        let shape = vec![values.len()];
        Self {
            data: ArrayData::F64(values),
            shape,
            dims: vec![dim],
        }
    }

    /// Rank-0 (single value) array, used by scalar features.
    pub fn scalar_f32(value: f32) -> Self {
        Self {
            data: ArrayData::F32(vec![value]),
            shape: vec![],
            dims: vec![],
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    pub fn dims(&self) -> &[Dimension] {
        &self.dims
    }

    pub fn dim(&self, axis: usize) -> Option<&Dimension> {
        self.dims.get(axis)
    }

    pub fn data(&self) -> &ArrayData {
        &self.data
    }

    /// Flat f32 view, if this is an f32 array.
    pub fn as_f32(&self) -> Option<&[f32]> {
        match &self.data {
            ArrayData::F32(v) => Some(v),
            ArrayData::F64(_) => None,
        }
    }

    /// Flat f64 view, if this is an f64 array.
    pub fn as_f64(&self) -> Option<&[f64]> {
        match &self.data {
            ArrayData::F64(v) => Some(v),
            ArrayData::F32(_) => None,
        }
    }

    /// Element at a multi-index, widened to f64.
    pub fn at(&self, index: &[usize]) -> Option<f64> {
        if index.len() != self.rank() {
            return None;
        }
        let strides = row_major_strides(&self.shape);
        let mut flat = 0;
        for (axis, (&i, &s)) in index.iter().zip(&strides).enumerate() {
            if i >= self.shape[axis] {
                return None;
            }
            flat += i * s;
        }
        self.data.get(flat)
    }

    /// Decompose into buffer, shape, and dimensions.
    pub fn into_parts(self) -> (ArrayData, Vec<usize>, Vec<Dimension>) {
        (self.data, self.shape, self.dims)
    }

    /// Semantic slice: one [`IndexSpec`] per axis.
    ///
    /// Index resolution is delegated to each axis's Dimension, the numeric
    /// slice is taken, and the metadata is rebuilt through `metaslice`.
    pub fn slice(&self, specs: &[IndexSpec]) -> AudiolithResult<DimArray> {
        if specs.len() != self.rank() {
            return Err(ArrayError::RankMismatch {
                rank: self.rank(),
                dims: specs.len(),
            }
            .into());
        }
        let mut ranges = Vec::with_capacity(self.rank());
        for (axis, spec) in specs.iter().enumerate() {
            ranges.push(self.dims[axis].integer_slice(axis, spec, self.shape[axis])?);
        }
        Ok(self.slice_ranges(&ranges))
    }

    /// Positional slice with pre-resolved ranges. Ranges must be in
    /// bounds; callers resolve them through `integer_slice` first.
    pub(crate) fn slice_ranges(&self, ranges: &[Range<usize>]) -> DimArray {
        let data = self.data.copy_region(&self.shape, ranges);
        let shape: Vec<usize> = ranges.iter().map(Range::len).collect();
        let dims: Vec<Dimension> = self
            .dims
            .iter()
            .zip(ranges)
            .map(|(dim, range)| dim.metaslice(range))
            .collect();
        DimArray { data, shape, dims }
    }

    /// Concatenate along `axis`. Every input must share the same dtype,
    /// rank, off-axis lengths, and off-axis Dimensions.
    pub fn concatenate(axis: usize, parts: &[&DimArray]) -> AudiolithResult<DimArray> {
        let first = parts.first().ok_or(ArrayError::DimensionMismatch {
            axis,
            message: "cannot concatenate zero arrays".into(),
        })?;
        if axis >= first.rank() {
            return Err(ArrayError::DimensionMismatch {
                axis,
                message: format!("axis out of bounds for rank {}", first.rank()),
            }
            .into());
        }
        let mut axis_total = 0;
        for part in parts {
            if part.dtype() != first.dtype() {
                return Err(ArrayError::DimensionMismatch {
                    axis,
                    message: format!(
                        "dtype mismatch: {} versus {}",
                        first.dtype(),
                        part.dtype()
                    ),
                }
                .into());
            }
            if part.rank() != first.rank() {
                return Err(ArrayError::RankMismatch {
                    rank: first.rank(),
                    dims: part.rank(),
                }
                .into());
            }
            for other_axis in 0..first.rank() {
                if other_axis == axis {
                    continue;
                }
                if part.shape[other_axis] != first.shape[other_axis] {
                    return Err(ArrayError::DimensionMismatch {
                        axis: other_axis,
                        message: format!(
                            "length {} versus {}",
                            first.shape[other_axis], part.shape[other_axis]
                        ),
                    }
                    .into());
                }
                if part.dims[other_axis] != first.dims[other_axis] {
                    return Err(ArrayError::DimensionMismatch {
                        axis: other_axis,
                        message: "off-axis dimensions differ".into(),
                    }
                    .into());
                }
            }
            axis_total += part.shape[axis];
        }

        let mut shape = first.shape.clone();
        shape[axis] = axis_total;
        let outer: usize = first.shape[..axis].iter().product();
        let inner: usize = first.shape[axis + 1..].iter().product();

        let data = match first.dtype() {
            DType::F32 => ArrayData::F32(concat_blocks(
                parts.iter().map(|p| (p.as_f32().unwrap_or(&[]), p.shape[axis])),
                outer,
                inner,
            )),
            DType::F64 => ArrayData::F64(concat_blocks(
                parts.iter().map(|p| (p.as_f64().unwrap_or(&[]), p.shape[axis])),
                outer,
                inner,
            )),
        };

        Ok(DimArray {
            data,
            shape,
            dims: first.dims.clone(),
        })
    }

    /// Stack equal-shaped arrays along a new leading axis carrying
    /// `outer_dim`.
    pub fn stack(outer_dim: Dimension, parts: &[DimArray]) -> AudiolithResult<DimArray> {
        let first = parts.first().ok_or(ArrayError::DimensionMismatch {
            axis: 0,
            message: "cannot stack zero arrays".into(),
        })?;
        let mut data = ArrayData::zeros(first.dtype(), 0);
        for part in parts {
            if part.shape != first.shape || part.dims != first.dims {
                return Err(ArrayError::DimensionMismatch {
                    axis: 0,
                    message: "stacked arrays must share shape and dimensions".into(),
                }
                .into());
            }
            match (&mut data, &part.data) {
                (ArrayData::F32(acc), ArrayData::F32(v)) => acc.extend_from_slice(v),
                (ArrayData::F64(acc), ArrayData::F64(v)) => acc.extend_from_slice(v),
                _ => {
                    return Err(ArrayError::DimensionMismatch {
                        axis: 0,
                        message: "stacked arrays must share a dtype".into(),
                    }
                    .into());
                }
            }
        }
        let mut shape = Vec::with_capacity(first.rank() + 1);
        shape.push(parts.len());
        shape.extend_from_slice(&first.shape);
        let mut dims = Vec::with_capacity(first.rank() + 1);
        dims.push(outer_dim);
        dims.extend_from_slice(&first.dims);
        Ok(DimArray { data, shape, dims })
    }

    /// Windowed reshape.
    ///
    /// Two forms are supported, both required to map onto a
    /// `modified_dimension` transition: splitting a rank-1 axis `(n,)`
    /// into equal windows `(m, k)` with `m * k == n`, and flattening a
    /// rank-2 array back to `(n,)`. Anything else fails
    /// `IncompatibleResize`.
    pub fn reshape(&self, new_shape: &[usize]) -> AudiolithResult<DimArray> {
        let old_len: usize = self.shape.iter().product();
        let new_len: usize = new_shape.iter().product();
        if old_len != new_len {
            return Err(ArrayError::IncompatibleResize {
                old_size: old_len,
                new_size: new_len,
            }
            .into());
        }

        match (self.rank(), new_shape.len()) {
            // (n,) -> (m, k): outer axis derives from the size transition,
            // window interior keeps the original per-position meaning.
            (1, 2) => {
                let outer = self.dims[0].modified_dimension(old_len, new_shape[0])?;
                Ok(DimArray {
                    data: self.data.clone(),
                    shape: new_shape.to_vec(),
                    dims: vec![outer, self.dims[0].clone()],
                })
            }
            // (m, k) -> (n,): the flattened axis derives from the outer
            // axis's size transition.
            (2, 1) => {
                let flat = self.dims[0].modified_dimension(self.shape[0], new_shape[0])?;
                Ok(DimArray {
                    data: self.data.clone(),
                    shape: new_shape.to_vec(),
                    dims: vec![flat],
                })
            }
            _ if self.shape.as_slice() == new_shape => Ok(self.clone()),
            _ => Err(ArrayError::IncompatibleResize {
                old_size: old_len,
                new_size: new_len,
            }
            .into()),
        }
    }

    /// In-place row accumulation used by overlap-add reconstruction: add
    /// `other`'s rows into `self` starting at `start_row`. Both arrays
    /// must be rank-2 f64 or rank-2 f32 with equal column counts; rows
    /// past the end of `self` are dropped.
    pub(crate) fn accumulate_rows(&mut self, start_row: usize, other: &DimArray) {
        debug_assert_eq!(self.rank(), 2);
        debug_assert_eq!(other.rank(), 2);
        debug_assert_eq!(self.shape[1], other.shape[1]);
        let cols = self.shape[1];
        let rows_avail = self.shape[0].saturating_sub(start_row);
        let rows = other.shape[0].min(rows_avail);
        match (&mut self.data, &other.data) {
            (ArrayData::F32(dst), ArrayData::F32(src)) => {
                for (i, x) in src[..rows * cols].iter().enumerate() {
                    dst[start_row * cols + i] += x;
                }
            }
            (ArrayData::F64(dst), ArrayData::F64(src)) => {
                for (i, x) in src[..rows * cols].iter().enumerate() {
                    dst[start_row * cols + i] += x;
                }
            }
            _ => debug_assert!(false, "accumulate_rows dtype mismatch"),
        }
    }
}

/// Row-major concatenation along an interior axis: for each of the
/// `outer` leading blocks, append every part's `axis_len * inner` run.
fn concat_blocks<'a, T: Copy + 'a>(
    parts: impl Iterator<Item = (&'a [T], usize)> + Clone,
    outer: usize,
    inner: usize,
) -> Vec<T> {
    let mut out = Vec::new();
    for block in 0..outer {
        for (data, axis_len) in parts.clone() {
            let run = axis_len * inner;
            out.extend_from_slice(&data[block * run..(block + 1) * run]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimension::{TimeDimension, TimeSpan};
    use std::time::Duration;

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    fn time_1d(n: usize, period: f64) -> DimArray {
        DimArray::from_f32(
            (0..n).map(|i| i as f32).collect(),
            Dimension::Time(TimeDimension::new(secs(period))),
        )
    }

    #[test]
    fn construction_checks_rank_and_buffer_length() {
        let err = DimArray::new(
            ArrayData::F32(vec![0.0; 6]),
            vec![2, 3],
            vec![Dimension::Identity],
        );
        assert!(matches!(
            err,
            Err(crate::error::AudiolithError::Array(
                ArrayError::RankMismatch { rank: 2, dims: 1 }
            ))
        ));

        let err = DimArray::new(
            ArrayData::F32(vec![0.0; 5]),
            vec![2, 3],
            vec![Dimension::Identity, Dimension::Identity],
        );
        assert!(err.is_err());
    }

    #[test]
    fn semantic_time_slice_resolves_through_the_dimension() {
        let arr = time_1d(100, 0.01);
        let sliced = arr
            .slice(&[IndexSpec::Span(TimeSpan::new(secs(0.10), secs(0.05)))])
            .unwrap();
        assert_eq!(sliced.shape(), &[5]);
        assert_eq!(sliced.as_f32().unwrap(), &[10.0, 11.0, 12.0, 13.0, 14.0]);
        // Slicing a time axis does not change its meaning.
        assert_eq!(sliced.dims(), arr.dims());
    }

    #[test]
    fn rank2_positional_slice_copies_the_right_block() {
        let data: Vec<f32> = (0..12).map(|i| i as f32).collect();
        let arr = DimArray::new(
            ArrayData::F32(data),
            vec![3, 4],
            vec![Dimension::Identity, Dimension::Identity],
        )
        .unwrap();
        let block = arr
            .slice(&[IndexSpec::Range(1..3), IndexSpec::Range(1..3)])
            .unwrap();
        assert_eq!(block.shape(), &[2, 2]);
        assert_eq!(block.as_f32().unwrap(), &[5.0, 6.0, 9.0, 10.0]);
    }

    #[test]
    fn concatenate_requires_matching_off_axis_dimensions() {
        let a = time_1d(4, 0.01);
        let b = time_1d(4, 0.01);
        let joined = DimArray::concatenate(0, &[&a, &b]).unwrap();
        assert_eq!(joined.shape(), &[8]);

        let c = time_1d(4, 0.02);
        // Rank-1 concat has no off-axis dims to clash on; build rank-2.
        let a2 = a.reshape(&[2, 2]).unwrap();
        let c2 = c.reshape(&[2, 2]).unwrap();
        assert!(matches!(
            DimArray::concatenate(0, &[&a2, &c2]),
            Err(crate::error::AudiolithError::Array(
                ArrayError::DimensionMismatch { .. }
            ))
        ));
    }

    #[test]
    fn concat_along_axis_one_interleaves_blocks() {
        let a = DimArray::new(
            ArrayData::F32(vec![1.0, 2.0, 3.0, 4.0]),
            vec![2, 2],
            vec![Dimension::Identity, Dimension::Identity],
        )
        .unwrap();
        let b = DimArray::new(
            ArrayData::F32(vec![5.0, 6.0]),
            vec![2, 1],
            vec![Dimension::Identity, Dimension::Identity],
        )
        .unwrap();
        let joined = DimArray::concatenate(1, &[&a, &b]).unwrap();
        assert_eq!(joined.shape(), &[2, 3]);
        assert_eq!(joined.as_f32().unwrap(), &[1.0, 2.0, 5.0, 3.0, 4.0, 6.0]);
    }

    #[test]
    fn windowed_reshape_derives_the_outer_time_dimension() {
        let arr = time_1d(8, 0.01);
        let windowed = arr.reshape(&[4, 2]).unwrap();
        assert_eq!(windowed.shape(), &[4, 2]);
        let Dimension::Time(outer) = &windowed.dims()[0] else {
            panic!("expected a time outer axis");
        };
        assert!((outer.frequency.as_secs_f64() - 0.02).abs() < 1e-9);
        // Interior keeps the per-sample meaning.
        assert_eq!(windowed.dims()[1], arr.dims()[0]);
    }

    #[test]
    fn identity_reshape_rejects_non_integer_windowing() {
        let arr = DimArray::from_f32(vec![0.0; 10], Dimension::Identity);
        assert!(arr.reshape(&[5, 2]).is_ok());
        // Flattening (2, 5) back out would need 2 to be a multiple of 10.
        assert!(arr.reshape(&[2, 5]).unwrap().reshape(&[10]).is_err());
        let odd = DimArray::from_f32(vec![0.0; 12], Dimension::Identity);
        // A rank-3 target is not an equal-sized windowing.
        assert!(odd.reshape(&[2, 2, 3]).is_err());
    }

    #[test]
    fn stack_adds_a_leading_axis_with_the_given_dimension() {
        let frames: Vec<DimArray> = (0..3)
            .map(|i| DimArray::from_f32(vec![i as f32; 4], Dimension::Identity))
            .collect();
        let outer = Dimension::Time(TimeDimension::new(secs(0.05)));
        let stacked = DimArray::stack(outer.clone(), &frames).unwrap();
        assert_eq!(stacked.shape(), &[3, 4]);
        assert_eq!(stacked.dims()[0], outer);
        assert_eq!(stacked.at(&[2, 0]), Some(2.0));
    }

    #[test]
    fn accumulate_rows_adds_instead_of_overwriting() {
        let mut out = DimArray::new(
            ArrayData::F32(vec![1.0; 6]),
            vec![3, 2],
            vec![Dimension::Identity, Dimension::Identity],
        )
        .unwrap();
        let add = DimArray::new(
            ArrayData::F32(vec![2.0; 4]),
            vec![2, 2],
            vec![Dimension::Identity, Dimension::Identity],
        )
        .unwrap();
        out.accumulate_rows(1, &add);
        assert_eq!(out.as_f32().unwrap(), &[1.0, 1.0, 3.0, 3.0, 3.0, 3.0]);
    }
}
