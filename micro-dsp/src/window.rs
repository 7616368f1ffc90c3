use core::f32::consts::PI;

use microfft::Complex32;
#[allow(unused_imports)]
use micromath::F32Ext;

/// Precomputed raised-cosine (Hann) window, one coefficient per complex slot.
pub struct HannWindow<const N: usize> {
    coefficients: [f32; N],
}

impl<const N: usize> HannWindow<N> {
    /// `w[i] = 0.5 - 0.5 * cos(2 * pi * i / (N - 1))`
    pub fn new() -> Self {
        assert!(N > 1, "window needs at least two points");
        let mut coefficients = [0.0; N];
        let denominator = (N - 1) as f32;
        for (i, coefficient) in coefficients.iter_mut().enumerate() {
            *coefficient = 0.5 - 0.5 * (2.0 * PI * i as f32 / denominator).cos();
        }
        Self { coefficients }
    }

    pub fn coefficients(&self) -> &[f32; N] {
        &self.coefficients
    }

    /// Scale the real part of every slot. Imaginary parts are left alone.
    pub fn apply(&self, samples: &mut [Complex32; N]) {
        for (sample, &w) in samples.iter_mut().zip(self.coefficients.iter()) {
            sample.re *= w;
        }
    }
}

impl<const N: usize> Default for HannWindow<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f32 = 1e-2;

    #[test]
    fn test_window_endpoints_and_centre() {
        let window = HannWindow::<65>::new();
        let w = window.coefficients();
        assert!(w[0].abs() < TOLERANCE);
        assert!(w[64].abs() < TOLERANCE);
        assert!((w[32] - 1.0).abs() < TOLERANCE);
    }

    #[test]
    fn test_window_is_symmetric() {
        let window = HannWindow::<128>::new();
        let w = window.coefficients();
        for i in 0..64 {
            assert!((w[i] - w[127 - i]).abs() < TOLERANCE, "asymmetric at {}", i);
        }
    }

    #[test]
    fn test_apply_scales_real_part_only() {
        let window = HannWindow::<64>::new();
        let mut samples = [Complex32 { re: 1.0, im: 0.0 }; 64];
        window.apply(&mut samples);
        for (sample, &w) in samples.iter().zip(window.coefficients().iter()) {
            assert_eq!(sample.re, w);
            assert_eq!(sample.im, 0.0);
        }
    }
}
