//! Benchmarks for frequency-adaptive squaring and FFT-domain resampling.

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use audiolith::array::{ArrayData, DimArray};
use audiolith::dimension::{Dimension, FrequencyBand, FrequencyScale, TimeDimension};
use audiolith::spectral::{resample, FrequencyAdaptive};

fn adaptive(n_frames: usize) -> FrequencyAdaptive {
    let scale = FrequencyScale::geometric(FrequencyBand::new(20.0, 20_000.0), 16);
    let time_dim = TimeDimension::with_duration(
        Duration::from_millis(50),
        Duration::from_millis(100),
    );

    // Band widths grow with center frequency, as a constant-Q transform
    // would produce.
    let bands = (0..16)
        .map(|band| {
            let width = 8 + band * 4;
            let data = vec![1.0f32; n_frames * width];
            DimArray::new(
                ArrayData::F32(data),
                vec![n_frames, width],
                vec![Dimension::Time(time_dim), Dimension::Identity],
            )
            .unwrap()
        })
        .collect();

    FrequencyAdaptive::new(bands, time_dim, scale).unwrap()
}

fn bench_square(c: &mut Criterion) {
    let fa = adaptive(64);
    c.bench_function("square_64x16_no_overlap", |bench| {
        bench.iter(|| black_box(fa.square(32, false).unwrap()))
    });
    c.bench_function("square_64x16_overlap_add", |bench| {
        bench.iter(|| black_box(fa.square(32, true).unwrap()))
    });
}

fn bench_resample(c: &mut Criterion) {
    let input: Vec<f32> = (0..1024)
        .map(|i| (std::f32::consts::TAU * 7.0 * i as f32 / 1024.0).sin())
        .collect();
    c.bench_function("resample_1024_to_4096", |bench| {
        bench.iter(|| black_box(resample(&input, 4096)))
    });
    c.bench_function("resample_1024_to_256", |bench| {
        bench.iter(|| black_box(resample(&input, 256)))
    });
}

criterion_group!(benches, bench_square, bench_resample);
criterion_main!(benches);
