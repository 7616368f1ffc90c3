use embassy_time::Duration;

// --- Audio Config ---
pub const SAMPLE_RATE_KHZ: u32 = 48; // I2S sample rate
pub const FFT_SIZE: usize = micro_dsp::FFT_SIZE; // Complex slots per capture
pub const MAX_HISTORY: usize = 16; // Rolling maximum depth
pub const BEAT_HISTORY: usize = 16; // Low-band reads averaged by the beat detector
pub const DMA_BUFFER_SIZE: usize = 4096 * 3;
pub const DMA_CHUNK_SIZE: usize = 4096;
pub const BYTES_PER_FRAME: usize = 4; // 16-bit stereo, left channel used

// --- Display Config ---
pub const MATRIX_TILES: usize = 2; // 8x8 boards, left to right
pub const MATRIX_LEDS: usize = MATRIX_TILES * 64;
pub const STRIP_LEDS: usize = 16;
pub const DOTSTAR_CLOCK_MHZ: u32 = 8;

// --- Task Timing ---
pub const LOOP_YIELD: Duration = Duration::from_millis(1); // Lets the microphone task drain DMA
pub const STATS_INTERVAL: Duration = Duration::from_secs(10);
pub const MATRIX_FRAME_BYTES: usize = crate::dotstar::frame_len(MATRIX_LEDS);
pub const STRIP_FRAME_BYTES: usize = crate::dotstar::frame_len(STRIP_LEDS);
