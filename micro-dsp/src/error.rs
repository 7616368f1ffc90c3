use core::fmt;

/// Invalid static configuration. These are checked once, at construction, and
/// are expected to be fatal for the firmware.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "logging", derive(defmt::Format))]
pub enum ConfigError {
    /// FFT length is not one of the supported powers of two.
    UnsupportedFftSize(usize),
    /// A per-bin table does not have exactly one entry per usable bin.
    TableLength { expected: usize, actual: usize },
    /// Noise floor entry is negative.
    NegativeNoiseFloor { bin: usize },
    /// Noise floor rises between `bin - 1` and `bin`.
    NoiseFloorNotMonotonic { bin: usize },
    /// Equalization multipliers must be finite and non-negative.
    InvalidEqualization { bin: usize },
    /// Smoothing factor must lie strictly between 0 and 1.
    SmoothingOutOfRange,
    /// Rolling history depth outside the supported range.
    HistoryDepth { depth: usize, min: usize, max: usize },
    /// Beat detector floor is above its ceiling.
    EnvelopeBounds { floor: u8, ceiling: u8 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ConfigError::UnsupportedFftSize(n) => {
                write!(f, "unsupported FFT size {}, expected one of {:?}", n, crate::fft::VALID_FFT_SIZES)
            }
            ConfigError::TableLength { expected, actual } => {
                write!(f, "table has {} entries, expected {}", actual, expected)
            }
            ConfigError::NegativeNoiseFloor { bin } => {
                write!(f, "noise floor is negative at bin {}", bin)
            }
            ConfigError::NoiseFloorNotMonotonic { bin } => {
                write!(f, "noise floor increases at bin {}", bin)
            }
            ConfigError::InvalidEqualization { bin } => {
                write!(f, "equalization weight is invalid at bin {}", bin)
            }
            ConfigError::SmoothingOutOfRange => f.write_str("smoothing factor must be in (0, 1)"),
            ConfigError::HistoryDepth { depth, min, max } => {
                write!(f, "history depth {} outside {}..={}", depth, min, max)
            }
            ConfigError::EnvelopeBounds { floor, ceiling } => {
                write!(f, "envelope floor {} is above ceiling {}", floor, ceiling)
            }
        }
    }
}
