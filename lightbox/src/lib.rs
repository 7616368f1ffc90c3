#![no_std]

//! Board support for the light box: I2S microphone feeding the shared
//! capture buffer, and APA102 ("DotStar") output for the matrix and strip.

pub mod config;
pub mod dotstar;
pub mod microphone;

use micro_dsp::{Calibration, SampleCapture};
use micro_viz::Clock;

/// Filled by the microphone task, drained by the render loop.
pub static CAPTURE: SampleCapture<{ config::FFT_SIZE }> =
    SampleCapture::new(Calibration::I2S_16BIT);

/// Milliseconds since boot from the embassy time driver.
pub struct EmbassyClock;

impl Clock for EmbassyClock {
    fn now_ms(&self) -> u64 {
        embassy_time::Instant::now().as_millis()
    }
}

pub type MatrixDotStar = dotstar::DotStar<'static, { config::MATRIX_LEDS }, { config::MATRIX_FRAME_BYTES }>;
pub type StripDotStar = dotstar::DotStar<'static, { config::STRIP_LEDS }, { config::STRIP_FRAME_BYTES }>;
