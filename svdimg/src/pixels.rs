use crate::error::{Error, Result};

/// An interleaved 8-bit raster laid out as `[height, width, channel]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelArray {
    height: usize,
    width: usize,
    channels: usize,
    data: Vec<u8>,
}

impl PixelArray {
    /// Wrap a raw interleaved buffer.
    ///
    /// The buffer must hold exactly `height * width * channels` samples.
    /// Empty dimensions are accepted here and rejected by the compressor.
    pub fn from_raw(height: usize, width: usize, channels: usize, data: Vec<u8>) -> Result<Self> {
        let expected = height * width * channels;
        if data.len() != expected {
            return Err(Error::BufferSize {
                expected,
                actual: data.len(),
            });
        }

        Ok(Self {
            height,
            width,
            channels,
            data,
        })
    }

    /// An image where every sample has the same value.
    pub fn filled(height: usize, width: usize, channels: usize, value: u8) -> Self {
        Self {
            height,
            width,
            channels,
            data: vec![value; height * width * channels],
        }
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// The interleaved samples.
    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn as_raw_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    /// Sample at row `y`, column `x`, channel `c`, or `None` if any index
    /// is out of range.
    pub fn get(&self, y: usize, x: usize, c: usize) -> Option<u8> {
        if y >= self.height || x >= self.width || c >= self.channels {
            return None;
        }

        self.data.get((y * self.width + x) * self.channels + c).copied()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.height == 0 || self.width == 0 || self.channels == 0
    }

    /// Mean squared difference between the samples of two equally shaped
    /// images, or `None` if the shapes differ.
    pub fn mean_squared_error(&self, other: &PixelArray) -> Option<f64> {
        if self.shape() != other.shape() {
            return None;
        }
        if self.data.is_empty() {
            return Some(0.0);
        }

        let sum: f64 = self
            .data
            .iter()
            .zip(&other.data)
            .map(|(&a, &b)| {
                let d = a as f64 - b as f64;
                d * d
            })
            .sum();

        Some(sum / self.data.len() as f64)
    }

    /// Peak signal-to-noise ratio in decibels. Identical images give
    /// infinity.
    pub fn psnr(&self, other: &PixelArray) -> Option<f64> {
        let mse = self.mean_squared_error(other)?;
        if mse == 0.0 {
            return Some(f64::INFINITY);
        }

        Some(10.0 * f64::log10(255.0 * 255.0 / mse))
    }

    fn shape(&self) -> (usize, usize, usize) {
        (self.height, self.width, self.channels)
    }
}
