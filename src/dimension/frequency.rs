//! Frequency value types: bands, scales, and the two frequency axis
//! layouts (uniform one-column-per-band, and ragged per-band column ranges).

use std::ops::Range;

use crate::dimension::Dimension;
use crate::error::ArrayError;

/// A half-open frequency interval in hertz.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrequencyBand {
    pub start_hz: f64,
    pub stop_hz: f64,
}

impl FrequencyBand {
    /// Callers must supply `start_hz < stop_hz`; an empty or inverted band
    /// is a programming error, checked in debug builds.
    pub fn new(start_hz: f64, stop_hz: f64) -> Self {
        debug_assert!(start_hz < stop_hz, "empty frequency band");
        Self { start_hz, stop_hz }
    }

    pub fn center_frequency(&self) -> f64 {
        (self.start_hz + self.stop_hz) / 2.0
    }

    pub fn bandwidth(&self) -> f64 {
        self.stop_hz - self.start_hz
    }

    /// Band centered on `center_hz` spanning `bandwidth` hertz.
    pub fn from_center(center_hz: f64, bandwidth: f64) -> Self {
        Self::new(center_hz - bandwidth / 2.0, center_hz + bandwidth / 2.0)
    }

    pub fn intersects(&self, other: &FrequencyBand) -> bool {
        self.start_hz < other.stop_hz && other.start_hz < self.stop_hz
    }

    pub fn contains_hz(&self, hz: f64) -> bool {
        hz >= self.start_hz && hz < self.stop_hz
    }
}

/// An ordered set of frequency bands covering a span.
///
/// Bands are stored low to high. Linear scales have equal bandwidths;
/// geometric scales have log-spaced edges, which is the layout a
/// frequency-adaptive transform typically works over.
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyScale {
    bands: Vec<FrequencyBand>,
}

impl FrequencyScale {
    /// Build a scale from explicit bands (assumed ordered low to high).
    pub fn from_bands(bands: Vec<FrequencyBand>) -> Self {
        Self { bands }
    }

    /// `n_bands` equal-width bands over `span`; zero bands yields an
    /// empty scale.
    pub fn linear(span: FrequencyBand, n_bands: usize) -> Self {
        if n_bands == 0 {
            return Self { bands: Vec::new() };
        }
        let width = span.bandwidth() / n_bands as f64;
        let bands = (0..n_bands)
            .map(|i| {
                FrequencyBand::new(
                    span.start_hz + width * i as f64,
                    span.start_hz + width * (i + 1) as f64,
                )
            })
            .collect();
        Self { bands }
    }

    /// `n_bands` log-spaced bands over `span`; zero bands yields an
    /// empty scale.
    pub fn geometric(span: FrequencyBand, n_bands: usize) -> Self {
        if n_bands == 0 {
            return Self { bands: Vec::new() };
        }
        let ratio = (span.stop_hz / span.start_hz).powf(1.0 / n_bands as f64);
        let bands = (0..n_bands)
            .map(|i| {
                FrequencyBand::new(
                    span.start_hz * ratio.powi(i as i32),
                    span.start_hz * ratio.powi(i as i32 + 1),
                )
            })
            .collect();
        Self { bands }
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    pub fn band(&self, index: usize) -> Option<&FrequencyBand> {
        self.bands.get(index)
    }

    pub fn bands(&self) -> &[FrequencyBand] {
        &self.bands
    }

    pub fn iter(&self) -> impl Iterator<Item = &FrequencyBand> {
        self.bands.iter()
    }

    /// Full span from the lowest band edge to the highest.
    pub fn span(&self) -> Option<FrequencyBand> {
        let first = self.bands.first()?;
        let last = self.bands.last()?;
        Some(FrequencyBand::new(first.start_hz, last.stop_hz))
    }

    /// Indices of bands intersecting the request, as a contiguous range.
    fn intersecting(&self, band: &FrequencyBand) -> Range<usize> {
        let mut start = None;
        let mut stop = 0;
        for (i, b) in self.bands.iter().enumerate() {
            if b.intersects(band) {
                if start.is_none() {
                    start = Some(i);
                }
                stop = i + 1;
            }
        }
        match start {
            Some(s) => s..stop,
            None => 0..0,
        }
    }
}

/// Uniform frequency layout: column `i` holds the scale's band `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyDimension {
    pub scale: FrequencyScale,
}

impl FrequencyDimension {
    pub fn new(scale: FrequencyScale) -> Self {
        Self { scale }
    }

    /// Column range for the bands intersecting the request.
    pub(crate) fn index_range(&self, band: &FrequencyBand) -> Range<usize> {
        self.scale.intersecting(band)
    }

    /// Re-bin the same overall span onto `n_bands` equal-width bands.
    pub(crate) fn rebinned(&self, n_bands: usize) -> FrequencyDimension {
        match self.scale.span() {
            Some(span) => FrequencyDimension::new(FrequencyScale::linear(span, n_bands)),
            None => self.clone(),
        }
    }
}

/// Ragged frequency layout: band `i` occupies the half-open column range
/// `slices[i]` of a single concatenated buffer.
///
/// Invariant: the ranges are contiguous, start at zero, and partition the
/// full column count exactly once.
#[derive(Debug, Clone, PartialEq)]
pub struct ExplicitFrequencyDimension {
    pub scale: FrequencyScale,
    slices: Vec<Range<usize>>,
}

impl ExplicitFrequencyDimension {
    /// Build from a scale and per-band column ranges, validating the
    /// partition invariant.
    pub fn new(scale: FrequencyScale, slices: Vec<Range<usize>>) -> Result<Self, ArrayError> {
        if scale.len() != slices.len() {
            return Err(ArrayError::DimensionMismatch {
                axis: 1,
                message: format!(
                    "{} band(s) in scale but {} column range(s)",
                    scale.len(),
                    slices.len()
                ),
            });
        }
        let mut expected = 0;
        for (i, s) in slices.iter().enumerate() {
            if s.start != expected || s.end < s.start {
                return Err(ArrayError::DimensionMismatch {
                    axis: 1,
                    message: format!(
                        "band {i} spans columns {s:?}, expected to start at {expected}"
                    ),
                });
            }
            expected = s.end;
        }
        Ok(Self { scale, slices })
    }

    pub fn n_bands(&self) -> usize {
        self.slices.len()
    }

    /// Column range of band `index`.
    pub fn band_slice(&self, index: usize) -> Option<Range<usize>> {
        self.slices.get(index).cloned()
    }

    /// Total column count across all bands.
    pub fn total_columns(&self) -> usize {
        self.slices.last().map_or(0, |s| s.end)
    }

    /// Column range covering every stored band intersecting the request.
    pub(crate) fn index_range(&self, band: &FrequencyBand) -> Range<usize> {
        let bands = self.scale.intersecting(band);
        if bands.is_empty() {
            return 0..0;
        }
        self.slices[bands.start].start..self.slices[bands.end - 1].end
    }

    /// Narrow to the bands fully covered by `range`. Selecting exactly one
    /// band changes the axis's meaning from multi-band ragged to uniform
    /// single-band.
    pub(crate) fn metaslice(&self, range: &Range<usize>) -> Dimension {
        let kept: Vec<usize> = (0..self.slices.len())
            .filter(|&i| self.slices[i].start >= range.start && self.slices[i].end <= range.end)
            .collect();

        if kept.len() == 1 {
            let band = self.scale.bands[kept[0]];
            return Dimension::Frequency(FrequencyDimension::new(FrequencyScale::from_bands(
                vec![band],
            )));
        }

        let scale = FrequencyScale::from_bands(
            kept.iter().map(|&i| self.scale.bands[i]).collect(),
        );
        let slices = kept
            .iter()
            .map(|&i| {
                let s = &self.slices[i];
                s.start - range.start..s.end - range.start
            })
            .collect();
        match ExplicitFrequencyDimension::new(scale, slices) {
            Ok(efd) => Dimension::ExplicitFrequency(efd),
            // A slice that cuts through band boundaries has no band
            // semantics left; fall back to a positional axis.
            Err(_) => Dimension::Identity,
        }
    }
}
