//! Reference extractors: a magnitude-spectrum feature and a scalar
//! loudness feature derived from it.
//!
//! These exist so a schema is usable end-to-end out of the box; the core
//! never depends on them, only on the [`Extractor`] trait.

use std::sync::Mutex;

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

use crate::array::{DType, DimArray};
use crate::config::AudioConfig;
use crate::dimension::{Dimension, FrequencyBand, FrequencyDimension, FrequencyScale};
use crate::error::AudiolithResult;
use crate::feature::Extractor;

/// Magnitude spectrum of the analysis window: `window_size / 2` f32
/// coefficients per frame (positive frequencies of a real signal).
pub struct FftExtractor {
    planner: Mutex<FftPlanner<f32>>,
}

impl FftExtractor {
    pub fn new() -> Self {
        Self {
            planner: Mutex::new(FftPlanner::new()),
        }
    }
}

impl Default for FftExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor for FftExtractor {
    fn dim(&self, config: &AudioConfig) -> Vec<usize> {
        vec![config.window_size / 2]
    }

    fn dtype(&self) -> DType {
        DType::F32
    }

    fn feature_dims(&self, config: &AudioConfig) -> Vec<Dimension> {
        let nyquist = f64::from(config.sample_rate) / 2.0;
        vec![Dimension::Frequency(FrequencyDimension::new(
            FrequencyScale::linear(FrequencyBand::new(0.0, nyquist), config.window_size / 2),
        ))]
    }

    fn process(&self, inputs: &[&DimArray]) -> AudiolithResult<DimArray> {
        let window = inputs[0].as_f32().unwrap_or(&[]);
        let n = window.len();

        // Hann window against spectral leakage; a single-sample window has
        // no taper to apply.
        let mut buffer: Vec<Complex<f32>> = window
            .iter()
            .enumerate()
            .map(|(i, &sample)| {
                let w = if n > 1 {
                    0.5 * (1.0
                        - (std::f32::consts::TAU * i as f32 / (n as f32 - 1.0)).cos())
                } else {
                    1.0
                };
                Complex::new(sample * w, 0.0)
            })
            .collect();

        let fft = self
            .planner
            .lock()
            .expect("FFT planner lock poisoned")
            .plan_fft_forward(n);
        fft.process(&mut buffer);

        let magnitudes: Vec<f32> = buffer[..n / 2].iter().map(|c| c.norm()).collect();
        Ok(DimArray::from_f32(magnitudes, Dimension::Identity))
    }
}

/// Scalar loudness per frame: mean magnitude of the upstream spectrum.
pub struct LoudnessExtractor;

impl Extractor for LoudnessExtractor {
    fn dim(&self, _config: &AudioConfig) -> Vec<usize> {
        vec![]
    }

    fn dtype(&self) -> DType {
        DType::F32
    }

    fn process(&self, inputs: &[&DimArray]) -> AudiolithResult<DimArray> {
        let spectrum = inputs[0].as_f32().unwrap_or(&[]);
        let loudness = if spectrum.is_empty() {
            0.0
        } else {
            spectrum.iter().sum::<f32>() / spectrum.len() as f32
        };
        Ok(DimArray::scalar_f32(loudness))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::SchemaBuilder;

    fn config() -> AudioConfig {
        AudioConfig::new(8_000, 64, 32).unwrap()
    }

    fn sine(freq_hz: f32, config: &AudioConfig, n: usize) -> Vec<f32> {
        (0..n)
            .map(|i| {
                (std::f32::consts::TAU * freq_hz * i as f32 / config.sample_rate as f32).sin()
            })
            .collect()
    }

    #[test]
    fn fft_peak_lands_in_the_right_bin() {
        let cfg = config();
        // 1 kHz at 8 kHz sample rate, window 64: bin 8.
        let audio = sine(1_000.0, &cfg, 64);
        let fft = FftExtractor::new();
        let window = DimArray::from_f32(audio, Dimension::Identity);
        let spectrum = fft.process(&[&window]).unwrap();
        assert_eq!(spectrum.shape(), &[32]);
        let mags = spectrum.as_f32().unwrap();
        let peak = mags
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, 8);
    }

    #[test]
    fn single_sample_window_stays_finite() {
        let cfg = AudioConfig::new(8_000, 1, 1).unwrap();
        let fft = FftExtractor::new();
        let window = DimArray::from_f32(vec![0.7], Dimension::Identity);
        let spectrum = fft.process(&[&window]).unwrap();
        // window_size / 2 rounds to zero coefficients; the point is that
        // the untapered sample produced no NaN on the way there.
        assert_eq!(spectrum.shape(), &[0]);

        let schema = SchemaBuilder::new("degenerate")
            .feature("fft", FftExtractor::new(), &[], true)
            .feature("loudness", LoudnessExtractor, &["fft"], true)
            .compile()
            .unwrap();
        let result = schema.execute(&cfg, &[0.5, -0.5]).unwrap();
        for &v in result.feature("loudness").unwrap().as_f32().unwrap() {
            assert!(v.is_finite());
        }
    }

    #[test]
    fn loudness_tracks_signal_level() {
        let cfg = config();
        let loud = sine(500.0, &cfg, 128);
        let quiet: Vec<f32> = loud.iter().map(|x| x * 0.1).collect();

        let schema = SchemaBuilder::new("loudness")
            .feature("fft", FftExtractor::new(), &[], false)
            .indexed_feature("loudness", LoudnessExtractor, &["fft"])
            .compile()
            .unwrap();

        let loud_result = schema.execute(&cfg, &loud).unwrap();
        let quiet_result = schema.execute(&cfg, &quiet).unwrap();
        let l = loud_result.feature("loudness").unwrap().at(&[0]).unwrap();
        let q = quiet_result.feature("loudness").unwrap().at(&[0]).unwrap();
        assert!(l > q * 5.0, "loud {l} vs quiet {q}");
    }

    #[test]
    fn loudness_is_scalar_per_frame() {
        let cfg = config();
        let schema = SchemaBuilder::new("shape")
            .feature("fft", FftExtractor::new(), &[], true)
            .feature("loudness", LoudnessExtractor, &["fft"], true)
            .compile()
            .unwrap();
        let result = schema.execute(&cfg, &sine(440.0, &cfg, 128)).unwrap();
        // 128 samples, window 64, step 32: 3 frames.
        assert_eq!(result.feature("loudness").unwrap().shape(), &[3]);
        assert_eq!(result.feature("fft").unwrap().shape(), &[3, 32]);
    }
}
