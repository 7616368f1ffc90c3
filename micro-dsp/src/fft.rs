use microfft::{complex, Complex32};
#[allow(unused_imports)]
use micromath::F32Ext;

pub const VALID_FFT_SIZES: [usize; 5] = [64, 128, 256, 512, 1024];

pub fn is_valid_fft_size(value: usize) -> bool {
    VALID_FFT_SIZES.contains(&value)
}

/// How raw bin energy is expressed before the noise floor is removed.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "logging", derive(defmt::Format))]
pub enum MagnitudeScale {
    /// `|X|`
    Linear,
    /// `|X|^2`
    Power,
    /// `10 * log10(|X|^2)`, clipped at 0 dB.
    Decibel,
}

macro_rules! dispatch_cfft {
    ($buf:expr, $($len:literal => $func:path),+ $(,)?) => {
        match $buf.len() {
            $(
                $len => {
                    if let Ok(array) = <&mut [Complex32; $len]>::try_from(&mut *$buf) {
                        let _ = $func(array);
                    }
                }
            )+
            other => panic!("unsupported FFT length {}", other),
        }
    };
}

/// Compute the complex FFT of `buffer` in place.
///
/// Panics if the length is not in [`VALID_FFT_SIZES`]; analyzers validate
/// their size when they are built, so this only fires on a programming error.
pub fn compute_fft(buffer: &mut [Complex32]) {
    dispatch_cfft!(
        buffer,
        64 => complex::cfft_64,
        128 => complex::cfft_128,
        256 => complex::cfft_256,
        512 => complex::cfft_512,
        1024 => complex::cfft_1024,
    );
}

/// Magnitude of a single bin in the requested scale.
pub fn bin_magnitude(component: Complex32, scale: MagnitudeScale) -> f32 {
    let power = component.re * component.re + component.im * component.im;
    match scale {
        MagnitudeScale::Linear => {
            if power <= 0.0 {
                0.0
            } else {
                power.sqrt()
            }
        }
        MagnitudeScale::Power => power,
        MagnitudeScale::Decibel => {
            if power <= 1.0 {
                0.0
            } else {
                10.0 * power.log10()
            }
        }
    }
}

/// Write magnitudes of the first `output.len()` bins of `fft_output`.
pub fn compute_magnitude(fft_output: &[Complex32], output: &mut [f32], scale: MagnitudeScale) {
    assert!(
        output.len() <= fft_output.len(),
        "magnitude output longer than FFT output"
    );
    for (out, &component) in output.iter_mut().zip(fft_output.iter()) {
        *out = bin_magnitude(component, scale);
    }
}
