//! APA102 ("DotStar") chains driven over SPI.
//!
//! Drawing and `show` only touch RAM: `show` packs the wire frame, and
//! [`DotStar::flush`] clocks it out asynchronously from the render loop.

use core::convert::Infallible;

use embedded_graphics::{pixelcolor::Rgb888, prelude::*, Pixel};
use embedded_hal_async::spi::SpiBus;
use esp_hal::spi::{master::Spi, Error as SpiError};
use micro_viz::{scale_brightness, PixelSink, TiledLayout};

/// Byte order of the colour channels on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorOrder {
    Bgr,
    Brg,
}

/// How display coordinates map onto the LED chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wiring {
    Tiled(TiledLayout),
    /// One row, chain index equals x.
    Linear(usize),
}

impl Wiring {
    pub fn size(&self) -> Size {
        match self {
            Wiring::Tiled(layout) => Size::new(layout.width() as u32, layout.height() as u32),
            Wiring::Linear(len) => Size::new(*len as u32, 1),
        }
    }

    pub fn index(&self, point: Point) -> Option<usize> {
        if point.x < 0 || point.y < 0 {
            return None;
        }
        let (x, y) = (point.x as usize, point.y as usize);
        match self {
            Wiring::Tiled(layout) => layout.index(x, y),
            Wiring::Linear(len) => (y == 0 && x < *len).then_some(x),
        }
    }
}

/// Wire bytes for `leds` pixels: start frame, 4 bytes per LED, end frame.
pub const fn frame_len(leds: usize) -> usize {
    4 + 4 * leds + (leds + 15) / 16
}

/// `N` LEDs packed into a `BYTES` long wire frame; `BYTES` must equal
/// [`frame_len(N)`](frame_len).
pub struct DotStar<'d, const N: usize, const BYTES: usize> {
    spi: Spi<'d, esp_hal::Async>,
    wiring: Wiring,
    order: ColorOrder,
    pixels: [Rgb888; N],
    frame: [u8; BYTES],
    brightness: u8,
    pending: bool,
}

impl<'d, const N: usize, const BYTES: usize> DotStar<'d, N, BYTES> {
    pub fn new(spi: Spi<'d, esp_hal::Async>, wiring: Wiring, order: ColorOrder) -> Self {
        assert_eq!(BYTES, frame_len(N), "frame buffer does not fit {} LEDs", N);
        let size = wiring.size();
        assert!(
            (size.width * size.height) as usize <= N,
            "wiring addresses more than {} LEDs",
            N
        );
        let mut frame = [0u8; BYTES];
        // Start frame stays zero, end frame stays 0xFF.
        for byte in frame[4 + 4 * N..].iter_mut() {
            *byte = 0xFF;
        }
        Self {
            spi,
            wiring,
            order,
            pixels: [Rgb888::BLACK; N],
            frame,
            brightness: 255,
            pending: false,
        }
    }

    fn pack(&mut self) {
        for (i, color) in self.pixels.iter().enumerate() {
            let color = scale_brightness(*color, self.brightness);
            let offset = 4 + 4 * i;
            let [a, b, c] = match self.order {
                ColorOrder::Bgr => [color.b(), color.g(), color.r()],
                ColorOrder::Brg => [color.b(), color.r(), color.g()],
            };
            self.frame[offset..offset + 4].copy_from_slice(&[0xFF, a, b, c]);
        }
        self.pending = true;
    }

    /// Sends the last shown frame, if it has not been sent yet.
    pub async fn flush(&mut self) -> Result<(), SpiError> {
        if !self.pending {
            return Ok(());
        }
        transmit_frame(&mut self.spi, &self.frame).await?;
        self.pending = false;
        Ok(())
    }
}

impl<const N: usize, const BYTES: usize> OriginDimensions for DotStar<'_, N, BYTES> {
    fn size(&self) -> Size {
        self.wiring.size()
    }
}

impl<const N: usize, const BYTES: usize> DrawTarget for DotStar<'_, N, BYTES> {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if let Some(index) = self.wiring.index(point) {
                if let Some(slot) = self.pixels.get_mut(index) {
                    *slot = color;
                }
            }
        }
        Ok(())
    }
}

impl<const N: usize, const BYTES: usize> PixelSink for DotStar<'_, N, BYTES> {
    fn show(&mut self) -> Result<(), Self::Error> {
        self.pack();
        Ok(())
    }

    fn set_brightness(&mut self, level: u8) {
        self.brightness = level;
    }
}

/// APA102 has no chip select: the start frame resynchronises the chain.
async fn transmit_frame(spi: &mut Spi<'_, esp_hal::Async>, data: &[u8]) -> Result<(), SpiError> {
    SpiBus::write(spi, data).await?;
    SpiBus::flush(spi).await
}
