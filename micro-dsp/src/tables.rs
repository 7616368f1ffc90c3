//! Per-bin calibration tables for a 128-point transform (64 usable bins).
//!
//! Values were measured against a silent room with the electret capsule on the
//! 12-bit converter, Hann window enabled, linear magnitudes.

use crate::error::ConfigError;

pub const CALIBRATED_BINS: usize = 64;

/// Subtracted from each bin before equalization. Non-negative and
/// non-increasing: the lowest bins carry DC offset and mains hum.
#[rustfmt::skip]
pub const NOISE_FLOOR: [f32; CALIBRATED_BINS] = [
    6.20, 2.40, 1.35, 0.98, 0.81, 0.72, 0.66, 0.61,
    0.57, 0.54, 0.51, 0.49, 0.47, 0.45, 0.43, 0.42,
    0.41, 0.40, 0.39, 0.38, 0.37, 0.36, 0.35, 0.34,
    0.33, 0.32, 0.31, 0.30, 0.29, 0.28, 0.27, 0.26,
    0.25, 0.25, 0.24, 0.24, 0.23, 0.23, 0.22, 0.22,
    0.21, 0.21, 0.20, 0.20, 0.19, 0.19, 0.18, 0.18,
    0.17, 0.17, 0.16, 0.16, 0.15, 0.15, 0.14, 0.14,
    0.13, 0.13, 0.12, 0.12, 0.11, 0.11, 0.10, 0.10,
];

/// Multiplier applied after noise removal. Lifts the upper bins, where the
/// capsule rolls off and the noise correction eats most of the signal.
#[rustfmt::skip]
pub const EQUALIZATION: [f32; CALIBRATED_BINS] = [
    0.40, 0.65, 0.85, 1.00, 1.00, 1.05, 1.10, 1.15,
    1.20, 1.25, 1.30, 1.35, 1.40, 1.45, 1.50, 1.55,
    1.60, 1.65, 1.70, 1.75, 1.80, 1.85, 1.90, 1.95,
    2.00, 2.05, 2.10, 2.15, 2.20, 2.25, 2.30, 2.35,
    2.40, 2.45, 2.50, 2.55, 2.60, 2.65, 2.70, 2.75,
    2.80, 2.85, 2.90, 2.95, 3.00, 3.05, 3.10, 3.15,
    3.20, 3.25, 3.30, 3.35, 3.40, 3.45, 3.50, 3.55,
    3.60, 3.65, 3.70, 3.75, 3.80, 3.85, 3.90, 4.00,
];

/// No correction at all; useful for tests and uncalibrated hardware.
pub const FLAT_NOISE_FLOOR: [f32; CALIBRATED_BINS] = [0.0; CALIBRATED_BINS];
pub const FLAT_EQUALIZATION: [f32; CALIBRATED_BINS] = [1.0; CALIBRATED_BINS];

pub fn validate_noise_floor(table: &[f32], bins: usize) -> Result<(), ConfigError> {
    if table.len() != bins {
        return Err(ConfigError::TableLength {
            expected: bins,
            actual: table.len(),
        });
    }
    for (bin, &value) in table.iter().enumerate() {
        if !(value >= 0.0) {
            return Err(ConfigError::NegativeNoiseFloor { bin });
        }
        if bin > 0 && value > table[bin - 1] {
            return Err(ConfigError::NoiseFloorNotMonotonic { bin });
        }
    }
    Ok(())
}

pub fn validate_equalization(table: &[f32], bins: usize) -> Result<(), ConfigError> {
    if table.len() != bins {
        return Err(ConfigError::TableLength {
            expected: bins,
            actual: table.len(),
        });
    }
    match table.iter().position(|&w| !w.is_finite() || w < 0.0) {
        Some(bin) => Err(ConfigError::InvalidEqualization { bin }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shipped_tables_are_valid() {
        assert_eq!(validate_noise_floor(&NOISE_FLOOR, CALIBRATED_BINS), Ok(()));
        assert_eq!(validate_equalization(&EQUALIZATION, CALIBRATED_BINS), Ok(()));
        assert_eq!(validate_noise_floor(&FLAT_NOISE_FLOOR, CALIBRATED_BINS), Ok(()));
    }

    #[test]
    fn test_rising_noise_floor_is_rejected() {
        let table = [1.0, 0.5, 0.6, 0.1];
        assert_eq!(
            validate_noise_floor(&table, 4),
            Err(ConfigError::NoiseFloorNotMonotonic { bin: 2 })
        );
    }

    #[test]
    fn test_negative_noise_floor_is_rejected() {
        let table = [0.0, -0.1];
        assert_eq!(
            validate_noise_floor(&table, 2),
            Err(ConfigError::NegativeNoiseFloor { bin: 1 })
        );
    }

    #[test]
    fn test_length_mismatch_is_rejected() {
        assert_eq!(
            validate_equalization(&EQUALIZATION, 32),
            Err(ConfigError::TableLength {
                expected: 32,
                actual: 64
            })
        );
    }
}
