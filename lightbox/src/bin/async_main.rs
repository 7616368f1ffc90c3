#![no_std]
#![no_main]

use defmt::{info, warn};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_time::{Instant, Timer};
use esp_backtrace as _;
use esp_hal::{
    dma_buffers,
    i2s::master::{DataFormat, I2s, Standard},
    rng::Rng,
    spi::{
        master::{Config as SpiConfig, Spi},
        Mode as SpiMode,
    },
    time::Rate,
    timer::{timg::TimerGroup, AnyTimer},
};
use micro_dsp::{sample_from_bins, AnalyzerConfig, BeatConfig, BeatDetector, SpectrumAnalyzer};
use micro_viz::{
    Clock, EngineConfig, SpectrumInput, StripPulse, TiledLayout, VisualizationEngine,
    COLUMN_HISTORY, MATRIX_WIDTH,
};
use rand::{rngs::SmallRng, SeedableRng};

use lightbox::{
    config::{
        BEAT_HISTORY, DMA_BUFFER_SIZE, DOTSTAR_CLOCK_MHZ, FFT_SIZE, LOOP_YIELD, MAX_HISTORY,
        SAMPLE_RATE_KHZ, STATS_INTERVAL, STRIP_LEDS,
    },
    dotstar::{ColorOrder, Wiring},
    microphone::microphone_task,
    EmbassyClock, MatrixDotStar, StripDotStar, CAPTURE,
};

#[esp_hal_embassy::main]
async fn main(spawner: Spawner) {
    info!("Init!");

    let peripherals = esp_hal::init(esp_hal::Config::default());

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    let timer0: AnyTimer = timg0.timer0.into();
    let timg1 = TimerGroup::new(peripherals.TIMG1);
    let timer1: AnyTimer = timg1.timer0.into();
    esp_hal_embassy::init([timer0, timer1]);

    // --- Microphone ---
    let (rx_buffer, rx_descriptors, _, tx_descriptors) = dma_buffers!(DMA_BUFFER_SIZE, 0);
    let i2s = I2s::new(
        peripherals.I2S0,
        Standard::Philips,
        DataFormat::Data16Channel16,
        Rate::from_khz(SAMPLE_RATE_KHZ),
        peripherals.DMA_CH0,
        rx_descriptors,
        tx_descriptors,
    )
    .into_async();
    let i2s_rx = i2s
        .i2s_rx
        .with_bclk(peripherals.GPIO4)
        .with_ws(peripherals.GPIO5)
        .with_din(peripherals.GPIO6)
        .build();

    // --- LEDs ---
    let spi_config = SpiConfig::default()
        .with_frequency(Rate::from_mhz(DOTSTAR_CLOCK_MHZ))
        .with_mode(SpiMode::_0);
    let matrix_spi = match Spi::new(peripherals.SPI2, spi_config) {
        Ok(spi) => spi
            .with_sck(peripherals.GPIO12)
            .with_mosi(peripherals.GPIO11)
            .into_async(),
        Err(err) => panic!("matrix SPI config: {:?}", err),
    };
    let strip_spi = match Spi::new(peripherals.SPI3, spi_config) {
        Ok(spi) => spi
            .with_sck(peripherals.GPIO1)
            .with_mosi(peripherals.GPIO2)
            .into_async(),
        Err(err) => panic!("strip SPI config: {:?}", err),
    };
    let mut matrix = MatrixDotStar::new(
        matrix_spi,
        Wiring::Tiled(TiledLayout::MATRIX),
        ColorOrder::Bgr,
    );
    let mut strip = StripDotStar::new(strip_spi, Wiring::Linear(STRIP_LEDS), ColorOrder::Brg);

    let mut rng = SmallRng::seed_from_u64(Rng::new(peripherals.RNG).random() as u64);

    let analyzer_config = AnalyzerConfig {
        sample_rate_hz: SAMPLE_RATE_KHZ * 1000,
        ..AnalyzerConfig::DEFAULT
    };
    let mut analyzer = match SpectrumAnalyzer::<FFT_SIZE, MAX_HISTORY>::new(analyzer_config) {
        Ok(analyzer) => analyzer,
        Err(err) => panic!("analyzer config: {}", err),
    };
    let mut beat = match BeatDetector::<BEAT_HISTORY>::new(BeatConfig::STRIP) {
        Ok(beat) => beat,
        Err(err) => panic!("beat config: {}", err),
    };
    let pulse = StripPulse::PHASE_HUE;

    let clock = EmbassyClock;
    let mut engine = VisualizationEngine::<MATRIX_WIDTH, COLUMN_HISTORY>::matrix(
        EngineConfig::MATRIX,
        clock.now_ms(),
    );

    spawner.must_spawn(microphone_task(i2s_rx, rx_buffer, &CAPTURE));
    CAPTURE.arm_capture();

    let mut stats_start = Instant::now();
    let mut spectra = 0u32;

    loop {
        let now = clock.now_ms();

        let analyzed = if let Some(frame) = analyzer.analyze_capture(&CAPTURE) {
            let reading = beat.update(sample_from_bins(frame.equalized), now);
            let Ok(()) = pulse.render(&reading, &mut strip);
            if let Err(err) = strip.flush().await {
                warn!("Strip SPI write failed: {}", defmt::Debug2Format(&err));
            }
            spectra += 1;
            true
        } else {
            false
        };

        let spectrum = SpectrumInput::from_analyzer(&analyzer).with_fresh(analyzed);
        let Ok(()) = engine.run_frame(now, &spectrum, &mut matrix, &mut rng);
        if let Err(err) = matrix.flush().await {
            warn!("Matrix SPI write failed: {}", defmt::Debug2Format(&err));
        }

        // Rearming resets the fill position, so only do it once the frame has been used.
        if analyzed {
            CAPTURE.arm_capture();
        }

        if stats_start.elapsed() >= STATS_INTERVAL {
            info!(
                "{} spectra in {} ms, {} samples dropped, mode {}",
                spectra,
                stats_start.elapsed().as_millis(),
                CAPTURE.dropped(),
                engine.mode()
            );
            stats_start = Instant::now();
            spectra = 0;
        }

        Timer::after(LOOP_YIELD).await;
    }
}
