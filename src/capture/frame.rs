//! Summed image returned by an exposure.

use crate::error::CameraError;
use image::{ImageBuffer, Luma};

/// Pixel-wise sum of one or more raw 16-bit frames.
///
/// Samples are stored row-major. Accumulation wraps modulo 65536 and
/// nothing is normalised, so a sum of `n` frames is `n` times brighter
/// than a single one.
#[derive(Clone, PartialEq, Eq)]
pub struct SumImage {
    pixels: Vec<u16>,
    width: usize,
    height: usize,
    frames: u32,
}

impl SumImage {
    /// Allocates a zeroed image.
    ///
    /// Fails with [`CameraError::AllocationFailure`] instead of aborting
    /// when the buffer cannot be reserved. A size that does not fit in
    /// `usize` reports `usize::MAX` bytes.
    pub fn zeroed(width: usize, height: usize) -> Result<Self, CameraError> {
        let (len, bytes) = width
            .checked_mul(height)
            .and_then(|len| Some((len, len.checked_mul(std::mem::size_of::<u16>())?)))
            .ok_or(CameraError::AllocationFailure { bytes: usize::MAX })?;

        let mut pixels = Vec::new();
        pixels
            .try_reserve_exact(len)
            .map_err(|_| CameraError::AllocationFailure { bytes })?;
        pixels.resize(len, 0);
        Ok(Self {
            pixels,
            width,
            height,
            frames: 0,
        })
    }

    /// Builds an image where every sample has the same value.
    ///
    /// Counts as a single frame.
    pub fn filled(width: usize, height: usize, value: u16) -> Result<Self, CameraError> {
        let mut image = Self::zeroed(width, height)?;
        image.pixels.fill(value);
        image.frames = 1;
        Ok(image)
    }

    /// Adds one frame into the sum with wrapping 16-bit arithmetic.
    ///
    /// Only the first `width * height` samples of `frame` are used; the
    /// caller checks that the frame is at least that long.
    pub fn accumulate(&mut self, frame: &[u16]) {
        for (dst, &src) in self.pixels.iter_mut().zip(frame) {
            *dst = dst.wrapping_add(src);
        }
        self.frames += 1;
    }

    /// Sample at column `x`, row `y`.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Option<u16> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get(y * self.width + x).copied()
    }

    /// One row of samples.
    pub fn row(&self, y: usize) -> Option<&[u16]> {
        if y >= self.height {
            return None;
        }
        let start = y * self.width;
        Some(&self.pixels[start..start + self.width])
    }

    /// Iterates over rows, top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[u16]> {
        self.pixels.chunks_exact(self.width.max(1))
    }

    /// All samples, row-major.
    #[inline]
    pub fn pixels(&self) -> &[u16] {
        &self.pixels
    }

    /// Consumes the image, returning the sample buffer.
    pub fn into_pixels(self) -> Vec<u16> {
        self.pixels
    }

    /// Image width.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Image height.
    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of frames summed into this image.
    #[inline]
    pub fn frames(&self) -> u32 {
        self.frames
    }

    /// Copies the samples into a 16-bit grayscale `image` buffer.
    pub fn to_luma16(&self) -> Option<ImageBuffer<Luma<u16>, Vec<u16>>> {
        ImageBuffer::from_raw(self.width as u32, self.height as u32, self.pixels.clone())
    }
}

impl std::fmt::Debug for SumImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SumImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("frames", &self.frames)
            .finish()
    }
}
