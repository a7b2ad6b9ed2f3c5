use log::debug;

use crate::{
    error::Result,
    factorize::{Factorize, NalgebraSvd},
    pixels::PixelArray,
    rank::CompressionRate,
    transform::{factorize_full, reconstruct},
};

/// A sweep from lossless down to a fifth of the raw size.
pub const DEFAULT_PREVIEW_RATES: [f64; 10] = [1.0, 0.95, 0.9, 0.8, 0.7, 0.6, 0.5, 0.4, 0.3, 0.2];

/// One reconstructed image per entry of `rates`, in the same order.
///
/// The image is factorized a single time; each rate then slices its own
/// rank out of the shared full decomposition.
pub fn preview(pixels: &PixelArray, rates: &[CompressionRate]) -> Result<Vec<PixelArray>> {
    preview_with(pixels, rates, &NalgebraSvd::default())
}

/// Like [`preview`], with a caller supplied factorizer.
pub fn preview_with<F: Factorize + ?Sized>(
    pixels: &PixelArray,
    rates: &[CompressionRate],
    factorizer: &F,
) -> Result<Vec<PixelArray>> {
    let full = factorize_full(pixels, factorizer)?;

    let previews = rates
        .iter()
        .map(|rate| match rate.rank(full.height(), full.width()) {
            None => reconstruct(&full),
            Some(k) => {
                debug!("preview at rate {rate} keeps rank {}", k.min(full.rank()));
                reconstruct(&full.truncate(k))
            }
        })
        .collect();

    Ok(previews)
}
