//! Audio analysis configuration.
//!
//! Supplied by the embedding application, never read from ambient global
//! state: an [`AudioConfig`] value is threaded into schema compilation and
//! store construction explicitly.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::dimension::TimeDimension;
use crate::error::ConfigError;

/// Immutable audio analysis parameters.
///
/// `window_size` is the number of samples per analysis frame and
/// `step_size` the number of samples advanced per frame. A step smaller
/// than the window yields overlapping frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub window_size: usize,
    pub step_size: usize,
}

impl AudioConfig {
    /// Validate and build a configuration.
    pub fn new(sample_rate: u32, window_size: usize, step_size: usize) -> Result<Self, ConfigError> {
        if sample_rate == 0 {
            return Err(ConfigError::InvalidConfig {
                message: "sample rate must be nonzero".into(),
            });
        }
        if window_size == 0 || step_size == 0 {
            return Err(ConfigError::InvalidConfig {
                message: format!(
                    "window size ({window_size}) and step size ({step_size}) must be nonzero"
                ),
            });
        }
        if step_size > window_size {
            return Err(ConfigError::InvalidConfig {
                message: format!(
                    "step size ({step_size}) must not exceed window size ({window_size})"
                ),
            });
        }
        Ok(Self {
            sample_rate,
            window_size,
            step_size,
        })
    }

    /// Duration of one sample.
    pub fn sample_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.sample_rate))
    }

    /// Time axis of raw audio at this sample rate.
    pub fn sample_time_dimension(&self) -> TimeDimension {
        TimeDimension::audio_rate(self.sample_rate)
    }

    /// Time axis of the analysis frames: step as frequency, window as
    /// duration, so the overlap ratio falls out of the two.
    pub fn frame_time_dimension(&self) -> TimeDimension {
        let period = self.sample_period().as_secs_f64();
        TimeDimension::with_duration(
            Duration::from_secs_f64(period * self.step_size as f64),
            Duration::from_secs_f64(period * self.window_size as f64),
        )
    }

    /// Number of analysis frames covering `n_samples` of audio.
    ///
    /// Audio shorter than one window still yields a single (zero-padded)
    /// frame; a trailing partial window is likewise padded.
    pub fn frame_count(&self, n_samples: usize) -> usize {
        if n_samples == 0 {
            return 0;
        }
        if n_samples <= self.window_size {
            return 1;
        }
        1 + (n_samples - self.window_size).div_ceil(self.step_size)
    }
}
