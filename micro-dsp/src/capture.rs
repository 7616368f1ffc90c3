//! Sample capture shared between the converter interrupt and the main loop.
//!
//! The interrupt appends one sample per call. When the buffer fills it stops
//! accepting samples and raises a ready flag; the main loop copies the frame
//! out, analyzes and renders it, and only then re-arms capture. Capture and
//! analysis therefore never touch the same memory at the same time.

use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use critical_section::Mutex;
use microfft::Complex32;

/// Maps an unsigned converter reading onto `[-1, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    /// Reading that corresponds to silence.
    pub midpoint: u16,
    /// Multiplier applied after removing the midpoint.
    pub scale: f32,
}

impl Calibration {
    /// 12-bit successive-approximation ADC, mic biased at half supply.
    pub const ADC_12BIT: Calibration = Calibration {
        midpoint: 2048,
        scale: 1.0 / 2048.0,
    };

    /// Signed 16-bit I2S samples offset into unsigned range.
    pub const I2S_16BIT: Calibration = Calibration {
        midpoint: 32768,
        scale: 1.0 / 32768.0,
    };

    pub fn convert(&self, raw: u16) -> f32 {
        let centered = raw as i32 - self.midpoint as i32;
        (centered as f32 * self.scale).clamp(-1.0, 1.0)
    }
}

/// Offset a signed PCM sample into the unsigned range the capture expects.
pub fn pcm_to_raw(sample: i16) -> u16 {
    (sample as i32 + 32768) as u16
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "logging", derive(defmt::Format))]
pub enum PushOutcome {
    Stored,
    /// This sample filled the last slot.
    Filled,
    /// Buffer already full, or capture disarmed.
    Dropped,
}

/// Fixed-size linear buffer of complex slots, filled one real sample at a time.
pub struct CaptureBuffer<const N: usize> {
    samples: [Complex32; N],
    position: usize,
    armed: bool,
}

impl<const N: usize> CaptureBuffer<N> {
    pub const fn new() -> Self {
        Self {
            samples: [Complex32::new(0.0, 0.0); N],
            position: 0,
            armed: true,
        }
    }

    pub fn push(&mut self, value: f32) -> PushOutcome {
        if !self.armed || self.position >= N {
            return PushOutcome::Dropped;
        }
        self.samples[self.position] = Complex32::new(value, 0.0);
        self.position += 1;
        if self.position == N {
            PushOutcome::Filled
        } else {
            PushOutcome::Stored
        }
    }

    pub fn is_full(&self) -> bool {
        self.position >= N
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Start a new fill cycle. Old samples are overwritten, not zeroed.
    pub fn rearm(&mut self) {
        self.position = 0;
        self.armed = true;
    }

    pub fn disarm(&mut self) {
        self.armed = false;
    }

    pub fn samples(&self) -> &[Complex32; N] {
        &self.samples
    }
}

impl<const N: usize> Default for CaptureBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Interrupt-safe wrapper around a [`CaptureBuffer`], meant to live in a `static`.
pub struct SampleCapture<const N: usize> {
    buffer: Mutex<RefCell<CaptureBuffer<N>>>,
    ready: AtomicBool,
    dropped: AtomicU32,
    calibration: Calibration,
}

impl<const N: usize> SampleCapture<N> {
    pub const fn new(calibration: Calibration) -> Self {
        Self {
            buffer: Mutex::new(RefCell::new(CaptureBuffer::new())),
            ready: AtomicBool::new(false),
            dropped: AtomicU32::new(0),
            calibration,
        }
    }

    /// Converter interrupt entry point. Never blocks; samples that arrive
    /// while the buffer is full or capture is disarmed are discarded.
    pub fn on_sample_ready(&self, raw: u16) {
        let value = self.calibration.convert(raw);
        let outcome = critical_section::with(|cs| self.buffer.borrow_ref_mut(cs).push(value));
        match outcome {
            PushOutcome::Stored => {}
            PushOutcome::Filled => self.ready.store(true, Ordering::Release),
            PushOutcome::Dropped => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Begin a new fill cycle. A ready flag left over from the previous
    /// cycle is cleared so the same frame is never reported twice.
    pub fn arm_capture(&self) {
        critical_section::with(|cs| {
            self.ready.store(false, Ordering::Release);
            self.buffer.borrow_ref_mut(cs).rearm();
        });
    }

    pub fn disarm_capture(&self) {
        critical_section::with(|cs| self.buffer.borrow_ref_mut(cs).disarm());
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Copy the completed frame into `dest`, consuming the ready signal.
    ///
    /// Returns `false` and leaves `dest` untouched when no fill has completed
    /// since the last call (or since the last re-arm).
    pub fn take_frame(&self, dest: &mut [Complex32; N]) -> bool {
        if !self.ready.swap(false, Ordering::AcqRel) {
            return false;
        }
        critical_section::with(|cs| {
            let buffer = self.buffer.borrow_ref(cs);
            if buffer.is_full() {
                dest.copy_from_slice(buffer.samples());
                true
            } else {
                false
            }
        })
    }

    /// Samples discarded because they arrived between fill and re-arm.
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn calibration(&self) -> Calibration {
        self.calibration
    }
}
