//! # audiolith
//!
//! An embeddable audio feature engine: dimension-aware arrays, a declarative
//! feature dependency graph, and a schema-derived persistent columnar store.
//!
//! ## Architecture
//!
//! - **Dimensioned arrays** (`array`, `dimension`): multidimensional buffers
//!   whose axes carry time/frequency semantics that survive slicing,
//!   concatenation, and reshaping
//! - **Spectral support** (`spectral`): FFT-domain bandlimited resampling and
//!   frequency-adaptive (ragged per-band) representations via `rustfft`
//! - **Feature graph** (`feature`): declared extractors compiled into an
//!   acyclic schema with a deterministic execution order and per-frame
//!   shape/dtype contracts
//! - **Frame store** (`frame`): append-only columnar storage over `redb`,
//!   one column per stored feature plus raw audio, with optional
//!   order-preserving value indexes
//!
//! ## Library usage
//!
//! ```no_run
//! use audiolith::config::AudioConfig;
//! use audiolith::feature::SchemaBuilder;
//! use audiolith::feature::extractors::{FftExtractor, LoudnessExtractor};
//! use audiolith::frame::FrameStore;
//!
//! let config = AudioConfig::new(44_100, 4096, 2048).unwrap();
//! let schema = SchemaBuilder::new("frames")
//!     .feature("fft", FftExtractor::new(), &[], true)
//!     .indexed_feature("loudness", LoudnessExtractor, &["fft"])
//!     .compile()
//!     .unwrap();
//!
//! let mut store = FrameStore::open("frames.redb", schema, config).unwrap();
//! store.append("pattern-0", &vec![0.0f32; 44_100]).unwrap();
//! let group = store.read("pattern-0").unwrap();
//! println!("{:?}", group.feature("fft").unwrap().shape());
//! store.close().unwrap();
//! ```

pub mod array;
pub mod config;
pub mod dimension;
pub mod error;
pub mod feature;
pub mod frame;
pub mod spectral;
