use bitvec::prelude::*;

#[cfg(feature = "embedded-graphics")]
use embedded_graphics::{image::ImageRaw, pixelcolor::BinaryColor};

pub const WIDTH: usize = 64;
pub const HEIGHT: usize = 32;
pub(crate) const MEM_LENGTH: usize = WIDTH * HEIGHT / 8;

/// An opaque struct holding one monochrome 64x32 frame
///
/// The only write paths are the sprite blit and the full clear, both
/// reserved for the executing machine.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Frame([u8; MEM_LENGTH]);

/// A shared view over a `Frame`
///
/// Has different accessors for the content of frames, which can be used independently
/// to fulfill the needs.
///
/// Each pixel is represented either by a corresponding bit being set, or by `true` value.
/// Internally, the data is stored in a form of concatenating rows from top to bottom of the frame.
/// Rows are represented as an individual bits of continuous memory, matching the state of pixels
/// from left to the right.
///
/// #Note:
/// Can return ImageRaw instance with `embedded_graphics` feature on.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct FrameView<'a>(&'a [u8; MEM_LENGTH]);

impl<'a> FrameView<'a> {
    /// View the raw memory of a frame
    pub fn as_raw(&self) -> &[u8] {
        self.0
    }

    /// Create an owned snapshot of the viewed frame
    pub fn copied(self) -> Frame {
        Frame(*self.0)
    }

    /// Read a single pixel, `None` outside of the 64x32 grid
    pub fn get(&self, x: usize, y: usize) -> Option<bool> {
        self.iter_rows_as_bitslices()
            .nth(y)
            .and_then(|row| row.get(x))
            .copied()
    }

    /// Get iterator over rows in a form of a `BitSlice`s
    pub fn iter_rows_as_bitslices(&self) -> impl Iterator<Item = &'a BitSlice<Msb0, u8>> {
        self.0.chunks(WIDTH / 8).map(|row| row.view_bits::<_>())
    }

    /// Get `ImageRaw` structure from frame's data
    #[cfg(feature = "embedded-graphics")]
    pub fn as_raw_image(&self) -> ImageRaw<'_, BinaryColor> {
        ImageRaw::new(self.as_raw(), WIDTH as u32, HEIGHT as u32)
    }
}

impl Frame {
    pub(crate) fn new() -> Self {
        Self([0; MEM_LENGTH])
    }

    /// Get view over frame
    pub fn view(&self) -> FrameView<'_> {
        FrameView(&self.0)
    }

    /// Flip a single pixel, returning its value prior to the flip
    ///
    /// The previous value is what the draw operation needs to detect a
    /// collision, a set pixel going unset. `None` outside of the grid.
    pub(crate) fn xor_pixel(&mut self, x: usize, y: usize) -> Option<bool> {
        self.iter_rows_as_bitslices_mut()
            .nth(y)
            .and_then(|row| {
                row.get_mut(x).map(|mut bit| {
                    let previous = *bit;
                    *bit = !previous;
                    previous
                })
            })
    }

    /// Unset every pixel
    pub(crate) fn clear(&mut self) {
        self.0.iter_mut().for_each(|byte| *byte = 0);
    }

    pub(crate) fn iter_rows_as_bitslices_mut(
        &mut self,
    ) -> impl Iterator<Item = &mut BitSlice<Msb0, u8>> {
        self.0
            .chunks_mut(WIDTH / 8)
            .map(|row| row.view_bits_mut::<_>())
    }
}

#[cfg(test)]
impl<'a> FrameView<'a> {
    pub(crate) fn new(frame: &'a [u8; MEM_LENGTH]) -> Self {
        Self(frame)
    }
}

#[cfg(test)]
impl Frame {
    pub(crate) fn as_raw_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}
