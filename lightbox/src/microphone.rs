use defmt::{info, warn};
use esp_hal::{
    i2s::master::{Error as I2sError, I2sRx},
    Async,
};
use micro_dsp::{pcm_to_raw, SampleCapture};

use crate::config::{BYTES_PER_FRAME, DMA_CHUNK_SIZE, FFT_SIZE};

/// Left-channel samples of a chunk of 16-bit stereo frames.
pub fn left_channel(data: &[u8]) -> impl Iterator<Item = i16> + '_ {
    data.chunks_exact(BYTES_PER_FRAME)
        .map(|frame| i16::from_le_bytes([frame[0], frame[1]]))
}

/// Streams the circular DMA buffer into `capture` one sample at a time.
///
/// Samples arriving while the capture buffer waits for the render loop are
/// dropped by the capture itself.
pub async fn start_reading(
    i2s_rx: I2sRx<'static, Async>,
    rx_buffer: &'static mut [u8],
    capture: &'static SampleCapture<FFT_SIZE>,
) -> Result<(), I2sError> {
    let mut transaction = i2s_rx.read_dma_circular_async(rx_buffer)?;
    let mut data = [0u8; DMA_CHUNK_SIZE];

    loop {
        transaction.available().await?;
        let count = transaction.pop(&mut data).await?;
        for sample in left_channel(&data[..count]) {
            capture.on_sample_ready(pcm_to_raw(sample));
        }
    }
}

#[embassy_executor::task]
pub async fn microphone_task(
    i2s_rx: I2sRx<'static, Async>,
    rx_buffer: &'static mut [u8],
    capture: &'static SampleCapture<FFT_SIZE>,
) {
    info!("Starting microphone task");
    if let Err(err) = start_reading(i2s_rx, rx_buffer, capture).await {
        warn!("Microphone stopped: {}", defmt::Debug2Format(&err));
    }
}
