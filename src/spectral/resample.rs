//! Bandlimited resampling in the FFT domain.
//!
//! The classic Fourier-method resampler: forward FFT, carry the shared
//! low-frequency bins into a spectrum of the target length (splitting or
//! folding the Nyquist bin as needed), inverse FFT. Exact for signals
//! bandlimited below the smaller Nyquist rate.

use rustfft::num_complex::Complex;
use rustfft::num_traits::Zero;
use rustfft::{FftNum, FftPlanner};

fn scalar<T: FftNum>(x: f64) -> T {
    // f32/f64 are the only element types in practice; both represent
    // these constants.
    T::from_f64(x).expect("FftNum type cannot represent an f64 constant")
}

/// Resample `input` to `n_out` samples.
pub fn resample<T: FftNum>(input: &[T], n_out: usize) -> Vec<T> {
    let mut planner = FftPlanner::<T>::new();
    resample_with(&mut planner, input, n_out)
}

/// Resample each row of a row-major `(rows, n_in)` buffer to `n_out`
/// columns, reusing one FFT plan across rows.
pub fn resample_rows<T: FftNum>(
    input: &[T],
    rows: usize,
    n_in: usize,
    n_out: usize,
) -> Vec<T> {
    debug_assert_eq!(input.len(), rows * n_in);
    let mut planner = FftPlanner::<T>::new();
    let mut out = Vec::with_capacity(rows * n_out);
    for row in 0..rows {
        out.extend(resample_with(
            &mut planner,
            &input[row * n_in..(row + 1) * n_in],
            n_out,
        ));
    }
    out
}

fn resample_with<T: FftNum>(planner: &mut FftPlanner<T>, input: &[T], n_out: usize) -> Vec<T> {
    let n = input.len();
    if n_out == 0 {
        return Vec::new();
    }
    if n == 0 {
        return vec![T::zero(); n_out];
    }
    if n == n_out {
        return input.to_vec();
    }

    let mut spec: Vec<Complex<T>> = input
        .iter()
        .map(|&x| Complex::new(x, T::zero()))
        .collect();
    planner.plan_fft_forward(n).process(&mut spec);

    let mut out_spec = vec![Complex::zero(); n_out];
    let k = n.min(n_out);
    let half = k / 2;

    // DC and strictly positive frequencies below Nyquist.
    out_spec[..(k + 1) / 2].copy_from_slice(&spec[..(k + 1) / 2]);
    if k % 2 == 1 {
        for j in 1..=half {
            out_spec[n_out - j] = spec[n - j];
        }
    } else {
        for j in 1..half {
            out_spec[n_out - j] = spec[n - j];
        }
        // Shared Nyquist bin: split when upsampling, fold when
        // downsampling, so the result stays the transform of a real
        // signal.
        if n_out > n {
            let split = spec[half] * scalar::<T>(0.5);
            out_spec[half] = split;
            out_spec[n_out - half] = split;
        } else {
            out_spec[half] = spec[half] + spec[n - half];
        }
    }

    planner.plan_fft_inverse(n_out).process(&mut out_spec);

    // Forward and inverse are both unnormalized; 1/n restores amplitude.
    let norm = scalar::<T>(1.0 / n as f64);
    out_spec.into_iter().map(|c| c.re * norm).collect()
}
