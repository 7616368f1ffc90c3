#![no_std]

//! Capture, spectrum analysis and beat detection for the light box.
//!
//! Data flows capture interrupt → [`SampleCapture`] → [`SpectrumAnalyzer`]
//! → consumers ([`BeatDetector`], column mapping in `micro-viz`).

pub mod analyzer;
pub mod beat;
pub mod capture;
pub mod error;
pub mod fft;
pub mod tables;
pub mod window;

pub use analyzer::{AnalyzerConfig, MaximumMode, SpectrumAnalyzer, SpectrumFrame};
pub use beat::{sample_from_bins, BeatConfig, BeatDetector, BeatReading};
pub use capture::{pcm_to_raw, Calibration, CaptureBuffer, PushOutcome, SampleCapture};
pub use error::ConfigError;
pub use fft::MagnitudeScale;
pub use microfft::Complex32;

/// Complex slots per capture buffer on the matrix build.
pub const FFT_SIZE: usize = 128;
/// Usable bins for [`FFT_SIZE`].
pub const NUM_BINS: usize = FFT_SIZE / 2;
