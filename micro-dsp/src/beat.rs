//! Adaptive-threshold beat detector driving a VU-style brightness envelope.
//!
//! This is not a tempo tracker. It reacts to sudden jumps of the low-band
//! level relative to the recent local average, attacks in one step and then
//! decays at a fixed rate.

use heapless::HistoryBuffer;
#[allow(unused_imports)]
use micromath::F32Ext;

#[cfg(feature = "logging")]
use defmt::trace;

use crate::error::ConfigError;

/// Supported lengths of the low-band sample log.
pub const MIN_BEAT_HISTORY: usize = 8;
pub const MAX_BEAT_HISTORY: usize = 64;

#[derive(Debug, Clone, Copy)]
pub struct BeatConfig {
    /// Multiplier applied to `largest_read` when forming the threshold.
    pub decay_factor: f32,
    /// Multiplier applied to the rolling average when forming the threshold.
    pub sensitivity: f32,
    pub floor: u8,
    pub ceiling: u8,
    /// Brightness lost per tick without a beat.
    pub brightness_decay: u8,
    /// `largest_read` lost per tick without a beat.
    pub largest_read_decay: f32,
    pub largest_read_floor: f32,
    /// Milliseconds between beats that add one unit of phase.
    pub phase_ms_per_step: u32,
    pub max_phase_step: u8,
}

impl BeatConfig {
    /// Tuned for the 16-pixel strip pulsing on kick drums.
    pub const STRIP: BeatConfig = BeatConfig {
        decay_factor: 0.6,
        sensitivity: 1.5,
        floor: 16,
        ceiling: 200,
        brightness_decay: 30,
        largest_read_decay: 0.5,
        largest_read_floor: 1.0,
        phase_ms_per_step: 8,
        max_phase_step: 48,
    };

    pub fn validate(&self, depth: usize) -> Result<(), ConfigError> {
        if !(MIN_BEAT_HISTORY..=MAX_BEAT_HISTORY).contains(&depth) {
            return Err(ConfigError::HistoryDepth {
                depth,
                min: MIN_BEAT_HISTORY,
                max: MAX_BEAT_HISTORY,
            });
        }
        if self.floor > self.ceiling {
            return Err(ConfigError::EnvelopeBounds {
                floor: self.floor,
                ceiling: self.ceiling,
            });
        }
        Ok(())
    }
}

impl Default for BeatConfig {
    fn default() -> Self {
        Self::STRIP
    }
}

/// Combined level of the two lowest bins.
pub fn sample_from_bins(bins: &[f32]) -> f32 {
    bins.iter().take(2).sum()
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "logging", derive(defmt::Format))]
pub struct BeatReading {
    pub brightness: u8,
    pub phase: u8,
    pub is_beat: bool,
    pub average: f32,
    pub threshold: f32,
}

/// Keeps the last `K` low-band samples and a slowly decaying ceiling.
pub struct BeatDetector<const K: usize> {
    config: BeatConfig,
    reads: HistoryBuffer<f32, K>,
    largest_read: f32,
    brightness: u8,
    phase: u8,
    last_beat_ms: Option<u64>,
    is_beat: bool,
}

impl<const K: usize> BeatDetector<K> {
    pub fn new(config: BeatConfig) -> Result<Self, ConfigError> {
        config.validate(K)?;
        Ok(Self {
            config,
            reads: HistoryBuffer::new(),
            largest_read: config.largest_read_floor,
            brightness: config.floor,
            phase: 0,
            last_beat_ms: None,
            is_beat: false,
        })
    }

    /// Mean of the rolling log; an empty log counts as 1.
    pub fn average(&self) -> f32 {
        let reads = self.reads.as_slice();
        if reads.is_empty() {
            1.0
        } else {
            reads.iter().sum::<f32>() / reads.len() as f32
        }
    }

    pub fn threshold(&self) -> f32 {
        (self.largest_read * self.config.decay_factor).max(self.average() * self.config.sensitivity)
    }

    pub fn update(&mut self, sample: f32, now_ms: u64) -> BeatReading {
        let average = self.average();
        let threshold = self.threshold();
        self.is_beat = sample > threshold;

        if self.is_beat {
            let excess = 255.0 * (sample - average) / sample;
            let target = excess
                .round()
                .clamp(self.config.floor as f32, self.config.ceiling as f32) as u8;
            if target > self.brightness {
                self.brightness = target;
            }
            self.advance_phase(now_ms);
        } else {
            self.brightness = self
                .brightness
                .saturating_sub(self.config.brightness_decay)
                .max(self.config.floor);
            self.largest_read = (self.largest_read - self.config.largest_read_decay)
                .max(self.config.largest_read_floor);
        }

        if sample > self.largest_read {
            self.largest_read = sample;
        }
        self.reads.write(sample);

        #[cfg(feature = "logging")]
        trace!(
            "beat: sample {} avg {} threshold {} brightness {}",
            sample,
            average,
            threshold,
            self.brightness
        );

        BeatReading {
            brightness: self.brightness,
            phase: self.phase,
            is_beat: self.is_beat,
            average,
            threshold,
        }
    }

    fn advance_phase(&mut self, now_ms: u64) {
        let max_step = self.config.max_phase_step.max(1) as u64;
        let step = match self.last_beat_ms {
            Some(last) => {
                let elapsed = now_ms.saturating_sub(last);
                (elapsed / self.config.phase_ms_per_step.max(1) as u64).clamp(1, max_step)
            }
            None => max_step,
        };
        self.phase = self.phase.wrapping_add(step as u8);
        self.last_beat_ms = Some(now_ms);
    }

    pub fn brightness(&self) -> u8 {
        self.brightness
    }

    pub fn phase(&self) -> u8 {
        self.phase
    }

    pub fn largest_read(&self) -> f32 {
        self.largest_read
    }

    pub fn is_beat(&self) -> bool {
        self.is_beat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn primed_detector() -> BeatDetector<16> {
        let mut detector = BeatDetector::<16>::new(BeatConfig::STRIP).unwrap();
        for t in 0..16 {
            detector.update(1.0, t * 10);
        }
        detector
    }

    #[test]
    fn test_empty_log_averages_to_one() {
        let detector = BeatDetector::<8>::new(BeatConfig::STRIP).unwrap();
        assert_eq!(detector.average(), 1.0);
        assert_eq!(detector.threshold(), 1.5);
    }

    #[test]
    fn test_rejects_short_log() {
        assert!(matches!(
            BeatDetector::<7>::new(BeatConfig::STRIP),
            Err(ConfigError::HistoryDepth { depth: 7, min: 8, max: 64 })
        ));
        assert!(BeatDetector::<64>::new(BeatConfig::STRIP).is_ok());
    }

    #[test]
    fn test_rejects_inverted_bounds() {
        let mut config = BeatConfig::STRIP;
        config.floor = 220;
        assert!(matches!(
            BeatDetector::<8>::new(config),
            Err(ConfigError::EnvelopeBounds { .. })
        ));
    }

    #[test]
    fn test_steady_signal_stays_at_floor() {
        let detector = primed_detector();
        assert_eq!(detector.brightness(), BeatConfig::STRIP.floor);
        assert!(!detector.is_beat());
        assert_eq!(detector.phase(), 0);
    }

    #[test]
    fn test_spike_raises_envelope_to_clamped_excess() {
        let mut detector = primed_detector();
        let reading = detector.update(100.0, 200);
        assert!(reading.is_beat);
        // 255 * 99 / 100 = 252, clamped to the ceiling.
        assert_eq!(reading.brightness, 200);
        assert_eq!(detector.largest_read(), 100.0);

        let mut detector = primed_detector();
        let reading = detector.update(2.0, 200);
        // 255 * (2 - 1) / 2 = 127.5 rounds to 128.
        assert_eq!(reading.brightness, 128);
    }

    #[test]
    fn test_envelope_monotone_while_above_threshold() {
        let mut detector = primed_detector();
        let mut previous = detector.brightness();
        let mut t = 200;
        for sample in [3.0, 5.0, 8.0, 13.0, 21.0, 34.0] {
            let reading = detector.update(sample, t);
            assert!(reading.is_beat, "{} should be a beat", sample);
            assert!(reading.brightness >= previous);
            previous = reading.brightness;
            t += 40;
        }
    }

    #[test]
    fn test_envelope_decays_to_floor_in_bounded_ticks() {
        let config = BeatConfig::STRIP;
        let mut detector = primed_detector();
        let initial = detector.update(100.0, 200).brightness;
        let span = (initial - config.floor) as u32;
        let step = config.brightness_decay as u32;
        let bound = span.div_ceil(step);

        let mut previous = initial;
        for tick in 1..=16u32 {
            let reading = detector.update(0.0, 200 + tick as u64 * 10);
            assert!(!reading.is_beat);
            assert!(reading.brightness <= previous);
            assert!(reading.brightness >= config.floor);
            if tick >= bound {
                assert_eq!(reading.brightness, config.floor, "tick {}", tick);
            }
            previous = reading.brightness;
        }
    }

    #[test]
    fn test_largest_read_decays_to_floor() {
        let mut detector = primed_detector();
        detector.update(4.0, 200);
        for tick in 0..16 {
            detector.update(0.0, 210 + tick);
        }
        assert_eq!(detector.largest_read(), BeatConfig::STRIP.largest_read_floor);
    }

    #[test]
    fn test_phase_advances_with_time_between_beats() {
        let mut detector = primed_detector();
        detector.update(100.0, 1_000);
        assert_eq!(detector.phase(), BeatConfig::STRIP.max_phase_step);
        for tick in 0..8 {
            detector.update(0.0, 1_010 + tick * 10);
        }
        // 160 ms later at 8 ms per step.
        detector.update(500.0, 1_160);
        assert_eq!(detector.phase(), BeatConfig::STRIP.max_phase_step + 20);
    }

    #[test]
    fn test_sample_from_bins() {
        assert_eq!(sample_from_bins(&[1.5, 2.0, 9.0]), 3.5);
        assert_eq!(sample_from_bins(&[4.0]), 4.0);
    }
}
