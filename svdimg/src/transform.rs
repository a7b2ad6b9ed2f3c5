use log::debug;
use nalgebra::DMatrix;

use crate::{
    error::{Error, Result},
    factorize::{Factorize, NalgebraSvd},
    factors::{ChannelFactors, FactorSet},
    pixels::PixelArray,
    rank::CompressionRate,
};

/// Factor an image and keep as many components as `rate` allows, using the
/// default [`NalgebraSvd`] factorizer.
pub fn compress(pixels: &PixelArray, rate: CompressionRate) -> Result<FactorSet> {
    compress_with(pixels, rate, &NalgebraSvd::default())
}

/// Like [`compress`], with a caller supplied factorizer.
pub fn compress_with<F: Factorize + ?Sized>(
    pixels: &PixelArray,
    rate: CompressionRate,
    factorizer: &F,
) -> Result<FactorSet> {
    let full = factorize_full(pixels, factorizer)?;

    match rate.rank(full.height(), full.width()) {
        None => Ok(full),
        Some(k) => {
            debug!("rate {rate} keeps rank {} of {}", k.min(full.rank()), full.rank());
            Ok(full.truncate(k))
        }
    }
}

/// Decompose every channel at full rank with a single factorizer call.
pub(crate) fn factorize_full<F: Factorize + ?Sized>(
    pixels: &PixelArray,
    factorizer: &F,
) -> Result<FactorSet> {
    if pixels.is_empty() {
        return Err(Error::InvalidShape {
            height: pixels.height(),
            width: pixels.width(),
            channels: pixels.channels(),
        });
    }

    debug!(
        "factorizing {}×{}×{} image",
        pixels.height(),
        pixels.width(),
        pixels.channels()
    );

    let stack = channel_matrices(pixels);
    let factors = factorizer.factorize_stack(&stack)?;
    if factors.len() != stack.len() {
        return Err(Error::MismatchedFactors(format!(
            "factorizer returned {} channels for {}",
            factors.len(),
            stack.len()
        )));
    }

    FactorSet::new(pixels.height(), pixels.width(), factors)
}

/// Split interleaved samples into one `f32` matrix per channel.
fn channel_matrices(pixels: &PixelArray) -> Vec<DMatrix<f32>> {
    let (height, width, channels) = (pixels.height(), pixels.width(), pixels.channels());
    let data = pixels.as_raw();

    (0..channels)
        .map(|c| DMatrix::from_fn(height, width, |y, x| data[(y * width + x) * channels + c] as f32))
        .collect()
}

/// Rebuild an approximate image from its factors.
///
/// Samples are clamped to `[0, 255]` and rounded half to even. A rank zero
/// factor set gives an all black image.
pub fn reconstruct(factors: &FactorSet) -> PixelArray {
    let (height, width, channels) = (factors.height(), factors.width(), factors.channel_count());
    let mut pixels = PixelArray::filled(height, width, channels, 0);

    if factors.rank() == 0 {
        return pixels;
    }

    let data = pixels.as_raw_mut();
    for (c, channel) in factors.channels().iter().enumerate() {
        let matrix = channel_product(channel);

        for y in 0..height {
            for x in 0..width {
                data[(y * width + x) * channels + c] = to_sample(matrix[(y, x)]);
            }
        }
    }

    pixels
}

/// `u · diag(s) · v`, scaling the columns of `u` instead of building the
/// diagonal matrix.
fn channel_product(channel: &ChannelFactors) -> DMatrix<f32> {
    let mut scaled = channel.u.clone();
    for (mut column, &s) in scaled.column_iter_mut().zip(channel.s.iter()) {
        column *= s;
    }

    scaled * &channel.v
}

fn to_sample(value: f32) -> u8 {
    value.clamp(0.0, 255.0).round_ties_even() as u8
}

#[cfg(test)]
pub(crate) mod tests {
    use std::cell::Cell;

    use super::*;

    /// A wrapping gradient with some texture, so every rank matters a bit.
    pub(crate) fn test_image(height: usize, width: usize, channels: usize) -> PixelArray {
        let mut data = Vec::with_capacity(height * width * channels);
        for y in 0..height {
            for x in 0..width {
                for c in 0..channels {
                    let v = (y * 255 / height.max(1) + x * 7 + c * 40 + (x * y) % 13) % 256;
                    data.push(v as u8);
                }
            }
        }

        PixelArray::from_raw(height, width, channels, data).unwrap()
    }

    fn rate(r: f64) -> CompressionRate {
        CompressionRate::new(r).unwrap()
    }

    /// Counts how often the wrapped default factorizer runs.
    #[derive(Default)]
    pub(crate) struct Counting {
        pub(crate) calls: Cell<usize>,
    }

    impl Factorize for Counting {
        fn factorize_stack(&self, channels: &[DMatrix<f32>]) -> Result<Vec<ChannelFactors>> {
            self.calls.set(self.calls.get() + 1);
            NalgebraSvd::default().factorize_stack(channels)
        }
    }

    #[test]
    fn flat_image_full_rate() {
        let pixels = PixelArray::filled(4, 4, 1, 100);
        let factors = compress(&pixels, rate(1.0)).unwrap();

        assert_eq!(factors.rank(), 4);
        assert_eq!(reconstruct(&factors), pixels);
    }

    #[test]
    fn flat_image_zero_rate() {
        let pixels = PixelArray::filled(4, 4, 1, 100);
        let factors = compress(&pixels, rate(0.0)).unwrap();

        assert_eq!(factors.rank(), 0);
        assert_eq!(reconstruct(&factors), PixelArray::filled(4, 4, 1, 0));
    }

    #[test]
    fn full_rate_keeps_min_dimension() {
        for &(h, w) in &[(6, 9), (9, 6), (7, 7)] {
            let factors = compress(&test_image(h, w, 3), rate(2.0)).unwrap();
            assert_eq!(factors.rank(), h.min(w));
            assert_eq!(factors.channel_count(), 3);
        }
    }

    #[test]
    fn full_rate_is_near_lossless() {
        let pixels = test_image(12, 10, 3);
        let restored = reconstruct(&compress(&pixels, rate(1.0)).unwrap());

        for (&a, &b) in pixels.as_raw().iter().zip(restored.as_raw()) {
            assert!(a.abs_diff(b) <= 1, "{a} vs {b}");
        }
    }

    #[test]
    fn partial_rate_uses_estimated_rank() {
        let pixels = test_image(20, 30, 3);
        let factors = compress(&pixels, rate(0.5)).unwrap();

        // floor(0.5 * 600 / 51) = 5
        assert_eq!(factors.rank(), 5);
        assert_eq!(factors.channels()[2].u.shape(), (20, 5));
        assert_eq!(factors.channels()[2].v.shape(), (5, 30));
    }

    #[test]
    fn estimated_rank_stays_within_dimensions() {
        for &(h, w) in &[(40, 10), (2, 200), (9, 9)] {
            let pixels = test_image(h, w, 1);
            for &r in &[0.1, 0.5, 0.9, 0.999] {
                let factors = compress(&pixels, rate(r)).unwrap();
                assert!(factors.rank() <= h.min(w));
            }
        }
    }

    #[test]
    fn empty_image_is_rejected() {
        for pixels in [
            PixelArray::filled(0, 4, 3, 0),
            PixelArray::filled(4, 0, 3, 0),
            PixelArray::filled(4, 4, 0, 0),
        ] {
            assert!(matches!(
                compress(&pixels, rate(1.0)),
                Err(Error::InvalidShape { .. })
            ));
        }
    }

    #[test]
    fn one_factorization_per_compression() {
        let counting = Counting::default();
        compress_with(&test_image(8, 8, 4), rate(0.3), &counting).unwrap();
        assert_eq!(counting.calls.get(), 1);
    }

    /// Drops the last channel, or every component past the first of it.
    struct Broken {
        drop_channel: bool,
    }

    impl Factorize for Broken {
        fn factorize_stack(&self, channels: &[DMatrix<f32>]) -> Result<Vec<ChannelFactors>> {
            let mut factors = NalgebraSvd::default().factorize_stack(channels)?;
            if self.drop_channel {
                factors.pop();
            } else if let Some(last) = factors.last_mut() {
                *last = last.truncate(1);
            }
            Ok(factors)
        }
    }

    #[test]
    fn bad_factorizer_output_is_not_archive_corruption() {
        let pixels = test_image(6, 5, 3);
        for drop_channel in [true, false] {
            let result = compress_with(&pixels, rate(1.0), &Broken { drop_channel });
            assert!(
                matches!(result, Err(Error::MismatchedFactors(_))),
                "{result:?}"
            );
        }
    }

    #[test]
    fn error_shrinks_as_rate_grows() {
        let pixels = test_image(24, 24, 3);
        let reference = reconstruct(&compress(&pixels, rate(1.0)).unwrap());

        let errors: Vec<f64> = [0.05, 0.1, 0.2, 0.4, 0.6, 0.8, 1.0]
            .iter()
            .map(|&r| {
                let restored = reconstruct(&compress(&pixels, rate(r)).unwrap());
                restored.mean_squared_error(&reference).unwrap()
            })
            .collect();

        assert!(errors.windows(2).all(|w| w[0] >= w[1]), "{errors:?}");
        assert_eq!(*errors.last().unwrap(), 0.0);
    }

    #[test]
    fn samples_are_clamped_and_rounded() {
        assert_eq!(to_sample(-12.0), 0);
        assert_eq!(to_sample(300.0), 255);
        assert_eq!(to_sample(99.5), 100);
        assert_eq!(to_sample(100.5), 100);
        assert_eq!(to_sample(100.49), 100);
        assert_eq!(to_sample(f32::NAN), 0);
    }

    #[test]
    fn product_matches_diagonal_form() {
        let channel = ChannelFactors {
            u: DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 1.0]),
            s: nalgebra::DVector::from_vec(vec![3.0, 2.0]),
            v: DMatrix::from_row_slice(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]),
        };

        let expected = &channel.u * DMatrix::from_diagonal(&channel.s) * &channel.v;
        assert_eq!(channel_product(&channel), expected);
    }
}
