//! Frequency-adaptive transform: a two-axis dimensioned array whose
//! frequency axis is ragged, each band spanning its own column count.
//!
//! Lower bands of a constant-Q style transform carry fewer coefficients
//! per frame than upper bands. [`FrequencyAdaptive`] keeps the per-band
//! column ranges in the axis metadata and can equalize all bands onto a
//! common width (`square`), optionally reconstructing overlapping frames
//! into a continuous output by overlap-add.

pub mod resample;

pub use resample::{resample, resample_rows};

use std::time::Duration;

use rustfft::FftNum;

use crate::array::{ArrayData, DType, DimArray};
use crate::dimension::{
    Dimension, ExplicitFrequencyDimension, FrequencyDimension, FrequencyScale, TimeDimension,
};
use crate::error::{ArrayError, AudiolithResult};

/// A ragged time-frequency representation.
///
/// Axis 0 is time (one row per frame), axis 1 concatenates every band's
/// coefficients; the explicit-frequency dimension records each band's
/// half-open column range.
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyAdaptive {
    arr: DimArray,
}

impl FrequencyAdaptive {
    /// Build from one rank-2 array per band, all sharing the same frame
    /// count, concatenating bands along axis 1 in scale order.
    pub fn new(
        bands: Vec<DimArray>,
        time_dimension: TimeDimension,
        scale: FrequencyScale,
    ) -> AudiolithResult<Self> {
        if bands.len() != scale.len() {
            return Err(ArrayError::DimensionMismatch {
                axis: 1,
                message: format!(
                    "{} band array(s) for a scale of {} band(s)",
                    bands.len(),
                    scale.len()
                ),
            }
            .into());
        }
        let mut slices = Vec::with_capacity(bands.len());
        let mut start = 0;
        let mut normalized = Vec::with_capacity(bands.len());
        for (i, band) in bands.into_iter().enumerate() {
            if band.rank() != 2 {
                return Err(ArrayError::RankMismatch {
                    rank: band.rank(),
                    dims: 2,
                }
                .into());
            }
            let (data, shape, _) = band.into_parts();
            slices.push(start..start + shape[1]);
            start += shape[1];
            // Band arrays may arrive with differing axis metadata; the
            // concatenated array gets fresh dimensions below.
            normalized.push(DimArray::new(
                data,
                shape,
                vec![Dimension::Identity, Dimension::Identity],
            )?);
            if normalized[i].shape()[0] != normalized[0].shape()[0] {
                return Err(ArrayError::DimensionMismatch {
                    axis: 0,
                    message: format!(
                        "band {i} has {} frame(s), band 0 has {}",
                        normalized[i].shape()[0],
                        normalized[0].shape()[0]
                    ),
                }
                .into());
            }
        }

        let refs: Vec<&DimArray> = normalized.iter().collect();
        let joined = DimArray::concatenate(1, &refs)?;
        let (data, shape, _) = joined.into_parts();
        let efd = ExplicitFrequencyDimension::new(scale, slices)?;
        let arr = DimArray::new(
            data,
            shape,
            vec![
                Dimension::Time(time_dimension),
                Dimension::ExplicitFrequency(efd),
            ],
        )?;
        Ok(Self { arr })
    }

    /// Rebuild the ragged representation from a dimensioned array whose
    /// axis 1 carries an explicit-frequency dimension, e.g. one read back
    /// from storage.
    pub fn from_dim_array(arr: DimArray) -> AudiolithResult<Self> {
        if arr.rank() != 2 {
            return Err(ArrayError::RankMismatch {
                rank: arr.rank(),
                dims: 2,
            }
            .into());
        }
        let Some(Dimension::Time(_)) = arr.dim(0) else {
            return Err(ArrayError::DimensionMismatch {
                axis: 0,
                message: format!(
                    "expected a time axis, got {}",
                    arr.dim(0).map_or("nothing", Dimension::variant_name)
                ),
            }
            .into());
        };
        let Some(Dimension::ExplicitFrequency(efd)) = arr.dim(1) else {
            return Err(ArrayError::DimensionMismatch {
                axis: 1,
                message: format!(
                    "expected an explicit-frequency axis, got {}",
                    arr.dim(1).map_or("nothing", Dimension::variant_name)
                ),
            }
            .into());
        };
        if efd.total_columns() != arr.shape()[1] {
            return Err(ArrayError::DimensionMismatch {
                axis: 1,
                message: format!(
                    "band ranges cover {} column(s), buffer has {}",
                    efd.total_columns(),
                    arr.shape()[1]
                ),
            }
            .into());
        }
        Ok(Self { arr })
    }

    pub fn time_dimension(&self) -> &TimeDimension {
        match &self.arr.dims()[0] {
            Dimension::Time(td) => td,
            _ => unreachable!("validated at construction"),
        }
    }

    pub fn frequency_dimension(&self) -> &ExplicitFrequencyDimension {
        match &self.arr.dims()[1] {
            Dimension::ExplicitFrequency(efd) => efd,
            _ => unreachable!("validated at construction"),
        }
    }

    pub fn scale(&self) -> &FrequencyScale {
        &self.frequency_dimension().scale
    }

    pub fn n_bands(&self) -> usize {
        self.frequency_dimension().n_bands()
    }

    /// Frame count.
    pub fn n_frames(&self) -> usize {
        self.arr.shape()[0]
    }

    pub fn as_array(&self) -> &DimArray {
        &self.arr
    }

    pub fn into_array(self) -> DimArray {
        self.arr
    }

    /// One band as its own sub-array; the axis-1 dimension narrows to a
    /// uniform single-band layout.
    pub fn band(&self, index: usize) -> Option<DimArray> {
        let slice = self.frequency_dimension().band_slice(index)?;
        Some(self.arr.slice_ranges(&[0..self.n_frames(), slice]))
    }

    /// Lazy, restartable iteration over bands in scale order.
    pub fn iter_bands(&self) -> impl Iterator<Item = DimArray> + '_ {
        (0..self.n_bands()).filter_map(|i| self.band(i))
    }

    /// Equalize every band onto `n_coeffs` columns via bandlimited
    /// resampling.
    ///
    /// Without overlap-add the result is a uniform
    /// `[frame, coefficient, band]` array. With overlap-add, successive
    /// frames are accumulated (added, not overwritten) at a stride of
    /// `n_coeffs * overlap_ratio`, reconstructing fractionally overlapping
    /// windows into a continuous `[time, band]` output; when the time axis
    /// has no overlap the flattened array is returned unchanged.
    pub fn square(&self, n_coeffs: usize, do_overlap_add: bool) -> AudiolithResult<DimArray> {
        let rows = self.n_frames();
        let n_bands = self.n_bands();
        let time_dim = *self.time_dimension();
        let scale = self.scale().clone();

        let bands: Vec<DimArray> = self.iter_bands().collect();
        let stacked_data = match self.arr.dtype() {
            DType::F32 => {
                let views: Vec<(&[f32], usize)> = bands
                    .iter()
                    .map(|b| (b.as_f32().unwrap_or(&[]), b.shape()[1]))
                    .collect();
                ArrayData::F32(squared_bands(&views, rows, n_coeffs))
            }
            DType::F64 => {
                let views: Vec<(&[f64], usize)> = bands
                    .iter()
                    .map(|b| (b.as_f64().unwrap_or(&[]), b.shape()[1]))
                    .collect();
                ArrayData::F64(squared_bands(&views, rows, n_coeffs))
            }
        };

        // Each frame now spans n_coeffs equal sub-steps of its window.
        let chunk_frequency =
            Duration::from_secs_f64(time_dim.duration.as_secs_f64() / n_coeffs as f64);
        let td = Dimension::Time(TimeDimension::new(chunk_frequency));
        let fdim = Dimension::Frequency(FrequencyDimension::new(scale));

        if !do_overlap_add {
            return DimArray::new(
                stacked_data,
                vec![rows, n_coeffs, n_bands],
                vec![Dimension::Time(time_dim), td, fdim],
            );
        }

        let stacked = DimArray::new(
            stacked_data,
            vec![rows * n_coeffs, n_bands],
            vec![td.clone(), fdim.clone()],
        )?;

        let overlap_ratio = time_dim.overlap_ratio();
        if overlap_ratio == 0.0 {
            // Frames abut exactly; the flattened array already is the
            // continuous signal.
            return Ok(stacked);
        }

        let step = (n_coeffs as f64 * overlap_ratio) as usize;
        let out_rows = ((rows * n_coeffs) as f64 * overlap_ratio
            + n_coeffs as f64 * overlap_ratio)
            .round() as usize;

        let mut output = DimArray::new(
            ArrayData::zeros(self.arr.dtype(), out_rows * n_bands),
            vec![out_rows, n_bands],
            vec![td, fdim],
        )?;
        for i in 0..rows {
            let chunk = stacked.slice_ranges(&[i * n_coeffs..(i + 1) * n_coeffs, 0..n_bands]);
            output.accumulate_rows(i * step, &chunk);
        }
        Ok(output)
    }
}

/// Resample every band to `n_coeffs` columns and interleave them into a
/// row-major `(rows * n_coeffs, n_bands)` buffer.
fn squared_bands<T: FftNum>(
    bands: &[(&[T], usize)],
    rows: usize,
    n_coeffs: usize,
) -> Vec<T> {
    let n_bands = bands.len();
    let mut out = vec![T::zero(); rows * n_coeffs * n_bands];
    for (b, &(data, width)) in bands.iter().enumerate() {
        let resampled = resample::resample_rows(data, rows, width, n_coeffs);
        for (t, &v) in resampled.iter().enumerate() {
            out[t * n_bands + b] = v;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimension::FrequencyBand;
    use std::time::Duration;

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    fn band_array(rows: usize, width: usize, value: f32) -> DimArray {
        DimArray::new(
            ArrayData::F32(vec![value; rows * width]),
            vec![rows, width],
            vec![Dimension::Identity, Dimension::Identity],
        )
        .unwrap()
    }

    fn two_band(rows: usize, time_dim: TimeDimension) -> FrequencyAdaptive {
        let scale = FrequencyScale::geometric(FrequencyBand::new(100.0, 400.0), 2);
        FrequencyAdaptive::new(
            vec![band_array(rows, 8, 1.0), band_array(rows, 4, 2.0)],
            time_dim,
            scale,
        )
        .unwrap()
    }

    #[test]
    fn construction_records_band_ranges() {
        let fa = two_band(3, TimeDimension::new(secs(0.5)));
        assert_eq!(fa.n_bands(), 2);
        assert_eq!(fa.n_frames(), 3);
        assert_eq!(fa.as_array().shape(), &[3, 12]);
        assert_eq!(fa.frequency_dimension().band_slice(0), Some(0..8));
        assert_eq!(fa.frequency_dimension().band_slice(1), Some(8..12));
    }

    #[test]
    fn construction_rejects_unequal_frame_counts() {
        let scale = FrequencyScale::linear(FrequencyBand::new(0.0, 200.0), 2);
        let result = FrequencyAdaptive::new(
            vec![band_array(3, 8, 1.0), band_array(2, 4, 2.0)],
            TimeDimension::new(secs(0.5)),
            scale,
        );
        assert!(result.is_err());
    }

    #[test]
    fn iter_bands_is_restartable_and_in_scale_order() {
        let fa = two_band(3, TimeDimension::new(secs(0.5)));
        let widths: Vec<usize> = fa.iter_bands().map(|b| b.shape()[1]).collect();
        assert_eq!(widths, vec![8, 4]);
        // A second call starts over.
        let again: Vec<usize> = fa.iter_bands().map(|b| b.shape()[1]).collect();
        assert_eq!(again, widths);
        // Selecting one band narrows the axis to a single-band layout.
        let first = fa.band(0).unwrap();
        assert!(matches!(first.dim(1), Some(Dimension::Frequency(_))));
    }

    #[test]
    fn round_trip_through_plain_array() {
        let fa = two_band(2, TimeDimension::new(secs(0.5)));
        let rebuilt = FrequencyAdaptive::from_dim_array(fa.clone().into_array()).unwrap();
        assert_eq!(rebuilt, fa);
    }

    #[test]
    fn square_equalizes_differing_band_widths() {
        let fa = two_band(3, TimeDimension::new(secs(0.5)));
        let squared = fa.square(4, false).unwrap();
        assert_eq!(squared.shape(), &[3, 4, 2]);
        // Constant bands stay constant under bandlimited resampling.
        assert!((squared.at(&[1, 2, 0]).unwrap() - 1.0).abs() < 1e-5);
        assert!((squared.at(&[1, 2, 1]).unwrap() - 2.0).abs() < 1e-5);
        // The interior time axis spans the window in n_coeffs sub-steps.
        let Some(Dimension::Time(td)) = squared.dim(1) else {
            panic!("expected a time axis");
        };
        assert!((td.frequency.as_secs_f64() - 0.125).abs() < 1e-9);
    }

    #[test]
    fn square_without_overlap_flattens_unchanged() {
        // Abutting frames: duration == frequency, overlap ratio zero.
        let fa = two_band(2, TimeDimension::new(secs(0.5)));
        let out = fa.square(4, true).unwrap();
        assert_eq!(out.shape(), &[8, 2]);
        assert!((out.at(&[0, 0]).unwrap() - 1.0).abs() < 1e-5);
        assert!((out.at(&[7, 1]).unwrap() - 2.0).abs() < 1e-5);
    }

    #[test]
    fn overlap_add_sums_frame_contributions_at_the_midpoint() {
        // Two frames, 50% overlap: window 1 s, step 0.5 s.
        let time_dim = TimeDimension::with_duration(secs(0.5), secs(1.0));
        let scale = FrequencyScale::linear(FrequencyBand::new(0.0, 100.0), 1);
        let fa = FrequencyAdaptive::new(
            vec![band_array(2, 4, 1.0)],
            time_dim,
            scale,
        )
        .unwrap();

        let out = fa.square(4, true).unwrap();
        // round(2*4*0.5 + 4*0.5) = 6 output rows.
        assert_eq!(out.shape(), &[6, 1]);
        // Frame 0 covers rows 0..4, frame 1 rows 2..6; the midpoint region
        // receives the sum of both contributions.
        let values: Vec<f64> = (0..6).map(|r| out.at(&[r, 0]).unwrap()).collect();
        let expected = [1.0, 1.0, 2.0, 2.0, 1.0, 1.0];
        for (v, e) in values.iter().zip(expected) {
            assert!((v - e).abs() < 1e-5, "{values:?}");
        }
    }
}
