use heapless::HistoryBuffer;
use microfft::Complex32;

#[cfg(feature = "logging")]
use defmt::trace;

use crate::capture::SampleCapture;
use crate::error::ConfigError;
use crate::fft::{compute_fft, compute_magnitude, is_valid_fft_size, MagnitudeScale};
use crate::tables;
use crate::window::HannWindow;

/// Which maximum [`SpectrumAnalyzer::maximum`] reports to consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "logging", derive(defmt::Format))]
pub enum MaximumMode {
    /// Maximum of the latest frame.
    Instant,
    /// Mean of the per-frame maxima held in the rolling history.
    RollingMean,
}

/// Supported depths of the rolling maximum history.
pub const MIN_HISTORY_DEPTH: usize = 6;
pub const MAX_HISTORY_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy)]
pub struct AnalyzerConfig {
    pub sample_rate_hz: u32,
    /// Apply the Hann window before the transform.
    pub windowed: bool,
    pub scale: MagnitudeScale,
    /// Weight of the previous smoothed value, strictly between 0 and 1.
    pub smoothing: f32,
    pub noise_floor: &'static [f32],
    pub equalization: &'static [f32],
    pub maximum_mode: MaximumMode,
}

impl AnalyzerConfig {
    /// 12-bit ADC free-running at 48 MHz / 64 / 13 cycles.
    pub const DEFAULT: AnalyzerConfig = AnalyzerConfig {
        sample_rate_hz: 57_692,
        windowed: true,
        scale: MagnitudeScale::Linear,
        smoothing: 0.75,
        noise_floor: &tables::NOISE_FLOOR,
        equalization: &tables::EQUALIZATION,
        maximum_mode: MaximumMode::Instant,
    };

    /// No window, no correction. Output equals the raw magnitudes, smoothed.
    pub const UNCORRECTED: AnalyzerConfig = AnalyzerConfig {
        sample_rate_hz: 57_692,
        windowed: false,
        scale: MagnitudeScale::Linear,
        smoothing: 0.75,
        noise_floor: &tables::FLAT_NOISE_FLOOR,
        equalization: &tables::FLAT_EQUALIZATION,
        maximum_mode: MaximumMode::Instant,
    };

    pub fn validate(&self, fft_size: usize, history_depth: usize) -> Result<(), ConfigError> {
        if !is_valid_fft_size(fft_size) {
            return Err(ConfigError::UnsupportedFftSize(fft_size));
        }
        if !(MIN_HISTORY_DEPTH..=MAX_HISTORY_DEPTH).contains(&history_depth) {
            return Err(ConfigError::HistoryDepth {
                depth: history_depth,
                min: MIN_HISTORY_DEPTH,
                max: MAX_HISTORY_DEPTH,
            });
        }
        if !(self.smoothing > 0.0 && self.smoothing < 1.0) {
            return Err(ConfigError::SmoothingOutOfRange);
        }
        let bins = fft_size / 2;
        tables::validate_noise_floor(self.noise_floor, bins)?;
        tables::validate_equalization(self.equalization, bins)?;
        Ok(())
    }
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Read-only view of the latest analysis, valid until the next call.
#[derive(Debug, Clone, Copy)]
pub struct SpectrumFrame<'a> {
    pub smoothed: &'a [f32],
    pub equalized: &'a [f32],
    pub max_value: f32,
    pub max_index: usize,
    pub average: f32,
    /// Maximum selected by [`MaximumMode`].
    pub maximum: f32,
}

/// Windowed FFT followed by noise-floor removal, equalization and
/// fast-attack/slow-decay smoothing.
///
/// `N` is the number of complex slots (FFT length); `N / 2` bins are used.
/// `H` is the depth of the rolling maximum history. All storage is inline, so
/// nothing is allocated after construction.
pub struct SpectrumAnalyzer<const N: usize, const H: usize> {
    config: AnalyzerConfig,
    window: HannWindow<N>,
    work: [Complex32; N],
    magnitudes: [f32; N],
    equalized: [f32; N],
    smoothed: [f32; N],
    last_max_value: f32,
    last_max_index: usize,
    average_value: f32,
    history: HistoryBuffer<f32, H>,
}

impl<const N: usize, const H: usize> SpectrumAnalyzer<N, H> {
    pub const BINS: usize = N / 2;

    pub fn new(config: AnalyzerConfig) -> Result<Self, ConfigError> {
        config.validate(N, H)?;
        Ok(Self {
            config,
            window: HannWindow::new(),
            work: [Complex32::new(0.0, 0.0); N],
            magnitudes: [0.0; N],
            equalized: [0.0; N],
            smoothed: [0.0; N],
            last_max_value: 0.0,
            last_max_index: 0,
            average_value: 0.0,
            history: HistoryBuffer::new(),
        })
    }

    /// Analyze one captured buffer. `samples` itself is never modified; the
    /// transform runs on an internal copy.
    pub fn analyze(&mut self, samples: &[Complex32; N]) -> SpectrumFrame<'_> {
        self.work.copy_from_slice(samples);
        self.transform();
        self.correct_and_smooth();
        self.frame()
    }

    /// Analyze the capture's completed buffer, if there is one.
    ///
    /// Returns `None` without touching any output when no fill has completed,
    /// so each buffer is analyzed at most once per capture cycle.
    pub fn analyze_capture(&mut self, capture: &SampleCapture<N>) -> Option<SpectrumFrame<'_>> {
        if !capture.take_frame(&mut self.work) {
            return None;
        }
        self.transform();
        self.correct_and_smooth();
        Some(self.frame())
    }

    /// Run noise removal, equalization and smoothing on magnitudes produced
    /// elsewhere. `magnitudes` must hold exactly `N / 2` bins.
    pub fn process_magnitudes(&mut self, magnitudes: &[f32]) -> SpectrumFrame<'_> {
        assert_eq!(
            magnitudes.len(),
            Self::BINS,
            "expected {} magnitudes",
            Self::BINS
        );
        self.magnitudes[..Self::BINS].copy_from_slice(magnitudes);
        self.correct_and_smooth();
        self.frame()
    }

    fn transform(&mut self) {
        if self.config.windowed {
            self.window.apply(&mut self.work);
        }
        compute_fft(&mut self.work);
        compute_magnitude(
            &self.work,
            &mut self.magnitudes[..Self::BINS],
            self.config.scale,
        );
    }

    fn correct_and_smooth(&mut self) {
        let alpha = self.config.smoothing;
        let mut max_value = 0.0f32;
        let mut max_index = 0;
        let mut sum = 0.0f32;

        for i in 0..Self::BINS {
            let above_floor = (self.magnitudes[i] - self.config.noise_floor[i]).max(0.0);
            let equalized = above_floor * self.config.equalization[i];
            self.equalized[i] = equalized;

            let decayed = alpha * self.smoothed[i] + (1.0 - alpha) * equalized;
            let smoothed = decayed.max(equalized);
            self.smoothed[i] = smoothed;

            if smoothed > max_value {
                max_value = smoothed;
                max_index = i;
            }
            sum += smoothed;
        }

        self.last_max_value = max_value;
        self.last_max_index = max_index;
        self.average_value = sum / Self::BINS as f32;
        self.history.write(max_value);

        #[cfg(feature = "logging")]
        trace!(
            "spectrum: max {} at bin {}, avg {}",
            max_value,
            max_index,
            self.average_value
        );
    }

    fn frame(&self) -> SpectrumFrame<'_> {
        SpectrumFrame {
            smoothed: self.smoothed_output(),
            equalized: self.equalized_output(),
            max_value: self.last_max_value,
            max_index: self.last_max_index,
            average: self.average_value,
            maximum: self.maximum(),
        }
    }

    /// Magnitudes straight out of the transform, before any correction.
    pub fn raw_output(&self) -> &[f32] {
        &self.magnitudes[..Self::BINS]
    }

    pub fn equalized_output(&self) -> &[f32] {
        &self.equalized[..Self::BINS]
    }

    pub fn smoothed_output(&self) -> &[f32] {
        &self.smoothed[..Self::BINS]
    }

    pub fn last_maximum_value(&self) -> f32 {
        self.last_max_value
    }

    pub fn last_maximum_index(&self) -> usize {
        self.last_max_index
    }

    pub fn average_value(&self) -> f32 {
        self.average_value
    }

    /// Mean of the recent per-frame maxima.
    pub fn rolling_maximum(&self) -> f32 {
        let recent = self.history.as_slice();
        if recent.is_empty() {
            return self.last_max_value;
        }
        recent.iter().sum::<f32>() / recent.len() as f32
    }

    /// Largest per-frame maximum still in the history.
    pub fn history_peak(&self) -> f32 {
        self.history
            .as_slice()
            .iter()
            .copied()
            .fold(self.last_max_value, f32::max)
    }

    pub fn maximum(&self) -> f32 {
        match self.config.maximum_mode {
            MaximumMode::Instant => self.last_max_value,
            MaximumMode::RollingMean => self.rolling_maximum(),
        }
    }

    pub fn bin_frequency(&self, bin: usize) -> f32 {
        bin as f32 * self.config.sample_rate_hz as f32 / N as f32
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    type Analyzer = SpectrumAnalyzer<128, 8>;

    fn tone_magnitudes(bin: usize, magnitude: f32) -> [f32; 64] {
        let mut magnitudes = [0.0; 64];
        magnitudes[bin] = magnitude;
        magnitudes
    }

    #[test]
    fn test_rejects_bad_configuration() {
        let mut config = AnalyzerConfig::DEFAULT;
        config.smoothing = 1.0;
        assert!(matches!(
            Analyzer::new(config),
            Err(ConfigError::SmoothingOutOfRange)
        ));
        assert!(matches!(
            SpectrumAnalyzer::<256, 8>::new(AnalyzerConfig::DEFAULT),
            Err(ConfigError::TableLength { expected: 128, actual: 64 })
        ));
        assert!(matches!(
            SpectrumAnalyzer::<128, 65>::new(AnalyzerConfig::DEFAULT),
            Err(ConfigError::HistoryDepth { depth: 65, .. })
        ));
        assert!(matches!(
            SpectrumAnalyzer::<128, 5>::new(AnalyzerConfig::DEFAULT),
            Err(ConfigError::HistoryDepth { depth: 5, min: 6, max: 64 })
        ));
        assert!(SpectrumAnalyzer::<128, 6>::new(AnalyzerConfig::DEFAULT).is_ok());
    }

    #[test]
    fn test_pure_tone_attacks_instantly() {
        let mut analyzer = Analyzer::new(AnalyzerConfig::DEFAULT).unwrap();
        let bin = 10;
        let magnitude = 5.0;
        let frame = analyzer.process_magnitudes(&tone_magnitudes(bin, magnitude));

        let expected = (magnitude - tables::NOISE_FLOOR[bin]) * tables::EQUALIZATION[bin];
        assert_abs_diff_eq!(frame.equalized[bin], expected, epsilon = 1e-5);
        assert_abs_diff_eq!(frame.smoothed[bin], expected, epsilon = 1e-5);
        assert_eq!(frame.max_index, bin);
        assert_abs_diff_eq!(frame.max_value, expected, epsilon = 1e-5);
        assert_abs_diff_eq!(frame.average, expected / 64.0, epsilon = 1e-5);
    }

    #[test]
    fn test_tone_below_noise_floor_is_removed() {
        let mut analyzer = Analyzer::new(AnalyzerConfig::DEFAULT).unwrap();
        let frame = analyzer.process_magnitudes(&tone_magnitudes(0, 3.0));
        assert_eq!(frame.equalized[0], 0.0);
        assert_eq!(frame.max_value, 0.0);
    }

    #[test]
    fn test_smoothing_decays_gradually() {
        let mut analyzer = Analyzer::new(AnalyzerConfig::UNCORRECTED).unwrap();
        analyzer.process_magnitudes(&tone_magnitudes(4, 8.0));
        let frame = analyzer.process_magnitudes(&[0.0; 64]);
        assert_eq!(frame.equalized[4], 0.0);
        assert_abs_diff_eq!(frame.smoothed[4], 6.0, epsilon = 1e-5);
        let frame = analyzer.process_magnitudes(&[0.0; 64]);
        assert_abs_diff_eq!(frame.smoothed[4], 4.5, epsilon = 1e-5);
    }

    #[test]
    fn test_equalized_non_negative_and_smoothed_dominates() {
        let mut rng = SmallRng::seed_from_u64(7);
        for &smoothing in &[0.05f32, 0.5, 0.95] {
            let mut config = AnalyzerConfig::DEFAULT;
            config.smoothing = smoothing;
            let mut analyzer = Analyzer::new(config).unwrap();
            for _ in 0..50 {
                let mut magnitudes = [0.0f32; 64];
                for value in magnitudes.iter_mut() {
                    *value = rng.random_range(-5.0..40.0);
                }
                let frame = analyzer.process_magnitudes(&magnitudes);
                for i in 0..64 {
                    assert!(frame.equalized[i] >= 0.0);
                    assert!(frame.smoothed[i] >= frame.equalized[i]);
                }
            }
        }
    }

    #[test]
    fn test_rolling_maximum_is_mean_of_history() {
        let mut config = AnalyzerConfig::UNCORRECTED;
        config.maximum_mode = MaximumMode::RollingMean;
        let mut analyzer = SpectrumAnalyzer::<128, 6>::new(config).unwrap();
        for magnitude in [2.0, 4.0, 8.0, 12.0, 16.0, 20.0, 24.0] {
            // Reset smoothing memory so each frame's max is the injected value.
            analyzer.smoothed = [0.0; 128];
            analyzer.process_magnitudes(&tone_magnitudes(1, magnitude));
        }
        // The oldest value has been evicted: mean of 4..=24 is 14.
        assert_eq!(analyzer.last_maximum_value(), 24.0);
        assert_abs_diff_eq!(analyzer.rolling_maximum(), 14.0, epsilon = 1e-5);
        assert_abs_diff_eq!(analyzer.maximum(), 14.0, epsilon = 1e-5);
        assert_eq!(analyzer.history_peak(), 24.0);
    }

    #[test]
    fn test_analyze_leaves_input_untouched() {
        let mut analyzer = Analyzer::new(AnalyzerConfig::DEFAULT).unwrap();
        let mut samples = [Complex32::new(0.0, 0.0); 128];
        for (i, sample) in samples.iter_mut().enumerate() {
            sample.re = if i % 4 < 2 { 0.5 } else { -0.5 };
        }
        let copy = samples;
        analyzer.analyze(&samples);
        assert_eq!(samples, copy);
    }

    #[test]
    fn test_zero_buffer_gives_zero_spectrum() {
        let mut analyzer = Analyzer::new(AnalyzerConfig::DEFAULT).unwrap();
        let frame = analyzer.analyze(&[Complex32::new(0.0, 0.0); 128]);
        assert!(frame.equalized.iter().all(|&v| v == 0.0));
        assert!(frame.smoothed.iter().all(|&v| v == 0.0));
        assert_eq!(frame.max_value, 0.0);
    }

    #[test]
    fn test_bin_frequency() {
        let analyzer = Analyzer::new(AnalyzerConfig::DEFAULT).unwrap();
        assert_eq!(analyzer.bin_frequency(0), 0.0);
        assert_abs_diff_eq!(analyzer.bin_frequency(2), 2.0 * 57_692.0 / 128.0, epsilon = 1e-2);
    }
}
