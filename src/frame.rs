//! 1-bit frame buffer for monochrome e-paper panels.
//!
//! Pixels are packed eight to a byte, most significant bit first, one row
//! after another. A set bit is white paper, a cleared bit is black ink,
//! which is the layout the panel controller expects in its RAM.
//!
//! The frame implements [`DrawTarget`] with [`BinaryColor`], where
//! `BinaryColor::On` means ink.

use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use std::convert::Infallible;

/// Packed monochrome frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    buffer: Vec<u8>,
}

impl Frame {
    /// A blank (all white) frame.
    pub fn new(width: u32, height: u32) -> Self {
        let bytes_per_row = width.div_ceil(8);
        let buffer_size = (bytes_per_row * height) as usize;
        Self {
            width,
            height,
            buffer: vec![0xFF; buffer_size],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bytes_per_row(&self) -> u32 {
        self.width.div_ceil(8)
    }

    /// Raw packed bytes, row-major, MSB first.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Fill the whole frame with white.
    pub fn clear_white(&mut self) {
        self.buffer.fill(0xFF);
    }

    /// Set a pixel; `ink = true` paints black. Out-of-range writes are ignored.
    pub fn set_pixel(&mut self, x: i32, y: i32, ink: bool) {
        let Some((index, mask)) = self.locate(x, y) else {
            return;
        };
        if ink {
            self.buffer[index] &= !mask;
        } else {
            self.buffer[index] |= mask;
        }
    }

    /// True when the pixel is black. Out-of-range reads as white.
    pub fn is_ink(&self, x: i32, y: i32) -> bool {
        self.locate(x, y)
            .is_some_and(|(index, mask)| self.buffer[index] & mask == 0)
    }

    /// Number of black pixels, ignoring row padding bits.
    pub fn ink_count(&self) -> usize {
        let mut count = 0;
        for y in 0..self.height as i32 {
            for x in 0..self.width as i32 {
                if self.is_ink(x, y) {
                    count += 1;
                }
            }
        }
        count
    }

    /// Bounding box of all ink as `(min_x, min_y, max_x, max_y)`.
    pub fn ink_bounds(&self) -> Option<(i32, i32, i32, i32)> {
        let mut bounds: Option<(i32, i32, i32, i32)> = None;
        for y in 0..self.height as i32 {
            for x in 0..self.width as i32 {
                if self.is_ink(x, y) {
                    bounds = Some(match bounds {
                        None => (x, y, x, y),
                        Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
                    });
                }
            }
        }
        bounds
    }

    fn locate(&self, x: i32, y: i32) -> Option<(usize, u8)> {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return None;
        }
        let (x, y) = (x as u32, y as u32);
        let index = (y * self.bytes_per_row() + x / 8) as usize;
        Some((index, 0x80 >> (x % 8)))
    }
}

impl OriginDimensions for Frame {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

impl DrawTarget for Frame {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            self.set_pixel(point.x, point.y, color.is_on());
        }
        Ok(())
    }
}
