use std::{
    convert::Infallible,
    thread,
    time::{Duration, Instant},
};

use embedded_graphics::{pixelcolor::Rgb888, prelude::*, Pixel};
use embedded_graphics_simulator::{OutputSettingsBuilder, SimulatorDisplay, SimulatorEvent, Window};
use micro_dsp::{
    sample_from_bins, AnalyzerConfig, BeatConfig, BeatDetector, Calibration, SampleCapture,
    SpectrumAnalyzer, FFT_SIZE,
};
use micro_viz::{
    scale_brightness, Clock, EngineConfig, Mode, PixelSink, SpectrumInput, StripChase,
    StripPulse, VisualizationEngine, COLUMN_HISTORY, MATRIX_HEIGHT, MATRIX_WIDTH,
};

pub const STRIP_PIXELS: u32 = 16;
pub const FRAME_DELAY_MS: u64 = 8;
const SAMPLE_RATE_HZ: f32 = 57_692.0;

static CAPTURE: SampleCapture<FFT_SIZE> = SampleCapture::new(Calibration::ADC_12BIT);

struct SystemClock {
    start: Instant,
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

/// Draw buffer plus a dimmed copy shown in the window on `show`.
struct SimulatorSink {
    buffer: SimulatorDisplay<Rgb888>,
    output: SimulatorDisplay<Rgb888>,
    window: Window,
    brightness: u8,
}

impl SimulatorSink {
    fn new(size: Size, title: &str, scale: u32) -> Self {
        let settings = OutputSettingsBuilder::new()
            .scale(scale)
            .pixel_spacing(2)
            .build();
        Self {
            buffer: SimulatorDisplay::new(size),
            output: SimulatorDisplay::new(size),
            window: Window::new(title, &settings),
            brightness: 255,
        }
    }

    fn quit_requested(&mut self) -> bool {
        self.window
            .events()
            .any(|event| matches!(event, SimulatorEvent::Quit))
    }
}

impl OriginDimensions for SimulatorSink {
    fn size(&self) -> Size {
        self.buffer.size()
    }
}

impl DrawTarget for SimulatorSink {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        self.buffer.draw_iter(pixels)
    }
}

impl PixelSink for SimulatorSink {
    fn show(&mut self) -> Result<(), Self::Error> {
        let brightness = self.brightness;
        let bounds = self.buffer.bounding_box();
        let buffer = &self.buffer;
        self.output.draw_iter(
            bounds
                .points()
                .map(|p| Pixel(p, scale_brightness(buffer.get_pixel(p), brightness))),
        )?;
        self.window.update(&self.output);
        Ok(())
    }

    fn set_brightness(&mut self, level: u8) {
        self.brightness = level;
    }
}

/// Stand-in for the microphone: a slow bass/treble sweep with a kick every 500 ms.
struct SyntheticMic {
    sample_index: u64,
}

impl SyntheticMic {
    fn next_raw(&mut self) -> u16 {
        let t = self.sample_index as f32 / SAMPLE_RATE_HZ;
        self.sample_index += 1;

        let sweep_hz = 600.0 + 9_000.0 * (0.5 + 0.5 * (t * 0.4).sin());
        let kick_age = t % 0.5;
        let kick = (-kick_age * 18.0).exp() * (2.0 * std::f32::consts::PI * 120.0 * t).sin();
        let value = 0.25 * (2.0 * std::f32::consts::PI * sweep_hz * t).sin() + 0.6 * kick;

        let cal = CAPTURE.calibration();
        (cal.midpoint as f32 + value / cal.scale)
            .round()
            .clamp(0.0, 4095.0) as u16
    }
}

fn main() -> Result<(), Infallible> {
    let strip_mode = std::env::args().any(|arg| arg == "--strip");
    let clock = SystemClock {
        start: Instant::now(),
    };
    let mut rng = rand::rng();
    let mut mic = SyntheticMic { sample_index: 0 };

    let mut analyzer = match SpectrumAnalyzer::<FFT_SIZE, 16>::new(AnalyzerConfig::DEFAULT) {
        Ok(analyzer) => analyzer,
        Err(err) => panic!("analyzer config: {}", err),
    };

    if strip_mode {
        let mut detector = match BeatDetector::<16>::new(BeatConfig::STRIP) {
            Ok(detector) => detector,
            Err(err) => panic!("beat config: {}", err),
        };
        let mut strip = SimulatorSink::new(Size::new(STRIP_PIXELS, 1), "light box strip", 24);
        let mut chase = StripChase::new(4, StripChase::FRAME_INTERVAL_MS);
        let chase_only = std::env::args().any(|arg| arg == "--chase");
        loop {
            for _ in 0..FFT_SIZE {
                CAPTURE.on_sample_ready(mic.next_raw());
            }
            if let Some(frame) = analyzer.analyze_capture(&CAPTURE) {
                let reading = detector.update(sample_from_bins(frame.equalized), clock.now_ms());
                if !chase_only {
                    StripPulse::PHASE_HUE.render(&reading, &mut strip)?;
                }
                CAPTURE.arm_capture();
            }
            if chase_only {
                chase.run_frame(clock.now_ms(), &mut strip)?;
            }

            if strip.quit_requested() {
                break;
            }
            thread::sleep(Duration::from_millis(FRAME_DELAY_MS));
        }
        return Ok(());
    }

    let mut matrix = SimulatorSink::new(
        Size::new(MATRIX_WIDTH as u32, MATRIX_HEIGHT as u32),
        "light box",
        24,
    );
    let mut engine = VisualizationEngine::<MATRIX_WIDTH, COLUMN_HISTORY>::matrix(
        EngineConfig::MATRIX,
        clock.now_ms(),
    );
    let mut last_mode = Mode::Visualize;

    loop {
        for _ in 0..FFT_SIZE {
            CAPTURE.on_sample_ready(mic.next_raw());
        }
        let fresh = analyzer.analyze_capture(&CAPTURE).is_some();
        engine.tick(
            &clock,
            &SpectrumInput::from_analyzer(&analyzer).with_fresh(fresh),
            &mut matrix,
            &mut rng,
        )?;
        if fresh {
            CAPTURE.arm_capture();
        }

        if engine.mode() != last_mode {
            println!("{} ms: {:?} -> {:?}", clock.now_ms(), last_mode, engine.mode());
            last_mode = engine.mode();
        }

        if matrix.quit_requested() {
            break;
        }
        thread::sleep(Duration::from_millis(FRAME_DELAY_MS));
    }

    Ok(())
}
