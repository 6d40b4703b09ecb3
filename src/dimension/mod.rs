//! Dimension model: what one array axis *means*.
//!
//! A [`Dimension`] attaches physical semantics to an axis of a numeric
//! buffer (positional, elapsed time, frequency band layout) and answers two
//! questions the array model delegates to it:
//!
//! - what does this axis become after a size change (windowing, resampling)?
//! - how does a semantic slice request (a time span, a frequency band) map
//!   to integer index bounds?
//!
//! Variants live here; the frequency value types are in [`frequency`].

pub mod frequency;

use std::ops::Range;
use std::time::Duration;

use crate::error::ArrayError;

pub use frequency::{
    ExplicitFrequencyDimension, FrequencyBand, FrequencyDimension, FrequencyScale,
};

/// A span of elapsed time, used for semantic slicing of Time axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSpan {
    pub start: Duration,
    pub duration: Duration,
}

impl TimeSpan {
    pub fn new(start: Duration, duration: Duration) -> Self {
        Self { start, duration }
    }

    /// Exclusive end of the span.
    pub fn end(&self) -> Duration {
        self.start + self.duration
    }
}

/// Fixed-rate time axis: each position advances by `frequency`, and each
/// position's sample covers `duration` of signal.
///
/// For raw audio the two are equal (one sample period). For windowed frames
/// `frequency` is the step and `duration` the window, which is where the
/// overlap ratio used by overlap-add reconstruction comes from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeDimension {
    pub frequency: Duration,
    pub duration: Duration,
}

impl TimeDimension {
    /// A time axis where each position covers exactly one period.
    pub fn new(frequency: Duration) -> Self {
        Self {
            frequency,
            duration: frequency,
        }
    }

    /// A time axis with overlapping coverage (step `frequency`, window
    /// `duration`).
    pub fn with_duration(frequency: Duration, duration: Duration) -> Self {
        Self { frequency, duration }
    }

    /// Per-sample time axis for the given sample rate.
    pub fn audio_rate(sample_rate: u32) -> Self {
        Self::new(Duration::from_secs_f64(1.0 / f64::from(sample_rate)))
    }

    /// Total span covered by `n` positions at this rate.
    pub fn span(&self, n: usize) -> Duration {
        Duration::from_secs_f64(self.frequency.as_secs_f64() * n as f64)
    }

    /// Fraction of each position's coverage shared with its successor:
    /// `(duration - frequency) / duration`, zero when positions abut.
    pub fn overlap_ratio(&self) -> f64 {
        let duration = self.duration.as_secs_f64();
        if duration == 0.0 {
            return 0.0;
        }
        ((duration - self.frequency.as_secs_f64()) / duration).max(0.0)
    }

    fn index_range(&self, span: &TimeSpan, len: usize) -> Range<usize> {
        let freq = self.frequency.as_secs_f64();
        let start = (span.start.as_secs_f64() / freq).floor() as usize;
        let stop = (span.end().as_secs_f64() / freq).ceil() as usize;
        start.min(len)..stop.min(len)
    }
}

/// One axis's physical meaning.
#[derive(Debug, Clone, PartialEq)]
pub enum Dimension {
    /// Purely positional axis with no attached semantics.
    Identity,
    /// Fixed-rate elapsed time.
    Time(TimeDimension),
    /// Uniform frequency layout: one column per scale band.
    Frequency(FrequencyDimension),
    /// Ragged frequency layout: each band spans its own column range.
    ExplicitFrequency(ExplicitFrequencyDimension),
}

/// A per-axis slice request, semantic or positional.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexSpec {
    /// Keep the whole axis.
    All,
    /// Single position, kept as a length-1 axis.
    Index(usize),
    /// Half-open positional range.
    Range(Range<usize>),
    /// Time span, valid against Time axes.
    Span(TimeSpan),
    /// Frequency band, valid against Frequency axes.
    Band(FrequencyBand),
}

impl Dimension {
    /// Derive the dimension for an axis whose length changed from
    /// `old_size` to `new_size` through equal-sized windowing.
    pub fn modified_dimension(
        &self,
        old_size: usize,
        new_size: usize,
    ) -> Result<Dimension, ArrayError> {
        if new_size == 0 || old_size == 0 {
            return Err(ArrayError::IncompatibleResize { old_size, new_size });
        }
        match self {
            Dimension::Identity => {
                if old_size % new_size == 0 {
                    Ok(Dimension::Identity)
                } else {
                    Err(ArrayError::IncompatibleResize { old_size, new_size })
                }
            }
            Dimension::Time(td) => {
                let factor = old_size as f64 / new_size as f64;
                Ok(Dimension::Time(TimeDimension::with_duration(
                    Duration::from_secs_f64(td.frequency.as_secs_f64() * factor),
                    Duration::from_secs_f64(td.duration.as_secs_f64() * factor),
                )))
            }
            Dimension::Frequency(fd) => Ok(Dimension::Frequency(fd.rebinned(new_size))),
            // A ragged band layout has no uniform size-transition rule.
            Dimension::ExplicitFrequency(_) => {
                Err(ArrayError::IncompatibleResize { old_size, new_size })
            }
        }
    }

    /// Resolve a slice request into integer index bounds for an axis of
    /// length `len`. `axis` is carried only for diagnostics.
    pub fn integer_slice(
        &self,
        axis: usize,
        spec: &IndexSpec,
        len: usize,
    ) -> Result<Range<usize>, ArrayError> {
        match spec {
            IndexSpec::All => Ok(0..len),
            IndexSpec::Index(i) => {
                if *i >= len {
                    return Err(ArrayError::DimensionMismatch {
                        axis,
                        message: format!("index {i} out of bounds for axis of length {len}"),
                    });
                }
                Ok(*i..*i + 1)
            }
            IndexSpec::Range(r) => {
                if r.start > r.end || r.end > len {
                    return Err(ArrayError::DimensionMismatch {
                        axis,
                        message: format!("range {r:?} out of bounds for axis of length {len}"),
                    });
                }
                Ok(r.clone())
            }
            IndexSpec::Span(span) => match self {
                Dimension::Time(td) => Ok(td.index_range(span, len)),
                other => Err(ArrayError::DimensionMismatch {
                    axis,
                    message: format!("time span requested against {}", other.variant_name()),
                }),
            },
            IndexSpec::Band(band) => match self {
                Dimension::Frequency(fd) => Ok(fd.index_range(band)),
                Dimension::ExplicitFrequency(efd) => Ok(efd.index_range(band)),
                other => Err(ArrayError::DimensionMismatch {
                    axis,
                    message: format!("frequency band requested against {}", other.variant_name()),
                }),
            },
        }
    }

    /// Dimension for the sub-axis produced by slicing to `range`.
    ///
    /// Most variants are unchanged by slicing; the ragged frequency layout
    /// narrows, and collapses to a uniform single-band layout when the
    /// slice selects exactly one band.
    pub fn metaslice(&self, range: &Range<usize>) -> Dimension {
        match self {
            Dimension::ExplicitFrequency(efd) => efd.metaslice(range),
            other => other.clone(),
        }
    }

    pub(crate) fn variant_name(&self) -> &'static str {
        match self {
            Dimension::Identity => "an identity axis",
            Dimension::Time(_) => "a time axis",
            Dimension::Frequency(_) => "a frequency axis",
            Dimension::ExplicitFrequency(_) => "an explicit-frequency axis",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    #[test]
    fn identity_windowing_requires_exact_multiple() {
        let dim = Dimension::Identity;
        assert!(matches!(
            dim.modified_dimension(100, 10),
            Ok(Dimension::Identity)
        ));
        assert!(matches!(
            dim.modified_dimension(100, 7),
            Err(ArrayError::IncompatibleResize { .. })
        ));
    }

    #[test]
    fn time_dimension_scales_with_size_ratio() {
        let dim = Dimension::Time(TimeDimension::new(secs(0.001)));
        let Ok(Dimension::Time(scaled)) = dim.modified_dimension(1000, 10) else {
            panic!("expected a time dimension");
        };
        assert!((scaled.frequency.as_secs_f64() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn time_span_maps_to_sample_indices() {
        // 10 ms per sample, 100 samples.
        let dim = Dimension::Time(TimeDimension::new(secs(0.01)));
        let span = TimeSpan::new(secs(0.05), secs(0.02));
        let range = dim
            .integer_slice(0, &IndexSpec::Span(span), 100)
            .unwrap();
        assert_eq!(range, 5..7);
    }

    #[test]
    fn time_span_clamps_to_axis_length() {
        let dim = Dimension::Time(TimeDimension::new(secs(0.01)));
        let span = TimeSpan::new(secs(0.95), secs(0.5));
        let range = dim.integer_slice(0, &IndexSpec::Span(span), 100).unwrap();
        assert_eq!(range, 95..100);
    }

    #[test]
    fn span_against_identity_axis_is_a_dimension_mismatch() {
        let dim = Dimension::Identity;
        let span = TimeSpan::new(secs(0.0), secs(1.0));
        assert!(matches!(
            dim.integer_slice(1, &IndexSpec::Span(span), 10),
            Err(ArrayError::DimensionMismatch { axis: 1, .. })
        ));
    }

    #[test]
    fn overlap_ratio_half_for_double_window() {
        let td = TimeDimension::with_duration(secs(0.5), secs(1.0));
        assert!((td.overlap_ratio() - 0.5).abs() < 1e-12);
        let abutting = TimeDimension::new(secs(0.5));
        assert_eq!(abutting.overlap_ratio(), 0.0);
    }

    #[test]
    fn positional_specs_are_bounds_checked() {
        let dim = Dimension::Identity;
        assert_eq!(dim.integer_slice(0, &IndexSpec::Index(3), 10).unwrap(), 3..4);
        assert!(dim.integer_slice(0, &IndexSpec::Index(10), 10).is_err());
        assert!(dim.integer_slice(0, &IndexSpec::Range(4..20), 10).is_err());
    }
}
