//! svdimg compresses images by truncated **s**ingular **v**alue
//! **d**ecomposition. Each color channel is factored as `U · diag(S) · V`,
//! and only the leading components are kept, trading fidelity for size.
//!
//! This is a rank reduction compressor, not an image format: there is no
//! entropy coding or perceptual quantization. Factor sets are stored as
//! NumPy `.npz` archives, so they can be inspected with `numpy.load`.
//!
//! How many components to keep is controlled by a [`CompressionRate`], the
//! nominal ratio of stored values to raw samples. For a `height`×`width`
//! image, rate `r` keeps `floor(r * height * width / (height + width + 1))`
//! components, and any rate of `1` or more keeps all of them.
//!
//! # Example
//! ## Compressing and restoring an image
//! ```no_run
//! use svdimg::{archive, ArchiveOptions, CompressionRate, PixelArray};
//!
//! // A 2×2 RGB image, interleaved as [height, width, channel].
//! let pixels = PixelArray::from_raw(2, 2, 3, vec![
//!     0xFF, 0x00, 0x00,  0x00, 0xFF, 0x00,
//!     0x00, 0x00, 0xFF,  0xFF, 0xFF, 0xFF,
//! ]).expect("Buffer does not match the shape");
//!
//! // Factor the image and keep half of the storage.
//! let rate = CompressionRate::new(0.5).unwrap();
//! let factors = svdimg::compress(&pixels, rate).expect("Could not compress");
//!
//! // Store the factors, then load them and rebuild an approximation.
//! archive::save("my_image.npz", &factors, ArchiveOptions::default())
//!     .expect("Could not save the archive");
//! let loaded = archive::load("my_image.npz").expect("Could not load the archive");
//! let restored = svdimg::reconstruct(&loaded);
//! ```
//!
//! ## Previewing several rates
//! ```no_run
//! use svdimg::{CompressionRate, PixelArray, DEFAULT_PREVIEW_RATES};
//!
//! let pixels = PixelArray::filled(64, 64, 3, 128);
//! let rates: Vec<_> = DEFAULT_PREVIEW_RATES
//!     .iter()
//!     .map(|&r| CompressionRate::new(r).unwrap())
//!     .collect();
//!
//! // The image is only factorized once for the whole sweep.
//! let previews = svdimg::preview(&pixels, &rates).expect("Could not preview");
//! ```

mod error;
mod factors;
mod npy;
mod pixels;
mod rank;
mod transform;

pub mod archive;
pub mod factorize;
pub mod preview;

// ----------------------- //
// INLINED USEFUL FEATURES //
// ----------------------- //
#[doc(inline)]
pub use error::{Error, Result};

#[doc(inline)]
pub use pixels::PixelArray;

#[doc(inline)]
pub use rank::{rank_for, CompressionRate};

#[doc(inline)]
pub use factors::{ChannelFactors, FactorSet};

#[doc(inline)]
pub use factorize::{Factorize, NalgebraSvd};

#[doc(inline)]
pub use transform::{compress, compress_with, reconstruct};

#[doc(inline)]
pub use preview::{preview, preview_with, DEFAULT_PREVIEW_RATES};

#[doc(inline)]
pub use archive::{ArchiveCompression, ArchiveOptions};
