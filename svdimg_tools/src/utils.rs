use std::path::Path;

use anyhow::{Context, Result};
use image::{imageops, ColorType, DynamicImage, GenericImageView, ImageBuffer, RgbaImage};
use svdimg::PixelArray;
use text_io::read;

pub enum Assume {
    Yes,
    No,
}

/// Convert a decoded image into an interleaved pixel array, keeping the
/// channel layout of 8-bit images and widening everything else to RGB(A).
pub fn pixels_from_image(image: DynamicImage) -> Result<PixelArray> {
    let (width, height) = (image.width() as usize, image.height() as usize);

    let (channels, data) = match image.color() {
        ColorType::L8 => (1, image.into_luma8().into_raw()),
        ColorType::La8 => (2, image.into_luma_alpha8().into_raw()),
        ColorType::Rgb8 => (3, image.into_rgb8().into_raw()),
        ColorType::Rgba8 => (4, image.into_rgba8().into_raw()),
        c if c.has_alpha() => (4, image.into_rgba8().into_raw()),
        _ => (3, image.into_rgb8().into_raw()),
    };

    Ok(PixelArray::from_raw(height, width, channels, data)?)
}

/// Convert a pixel array back into an image.
pub fn image_from_pixels(pixels: PixelArray) -> Result<DynamicImage> {
    let (width, height) = (pixels.width() as u32, pixels.height() as u32);
    let channels = pixels.channels();
    let data = pixels.into_raw();

    let image = match channels {
        1 => ImageBuffer::from_raw(width, height, data).map(DynamicImage::ImageLuma8),
        2 => ImageBuffer::from_raw(width, height, data).map(DynamicImage::ImageLumaA8),
        3 => ImageBuffer::from_raw(width, height, data).map(DynamicImage::ImageRgb8),
        4 => ImageBuffer::from_raw(width, height, data).map(DynamicImage::ImageRgba8),
        c => anyhow::bail!("Cannot build an image with {c} channels"),
    };

    image.context("Pixel buffer does not match the image size")
}

/// Lay out equally sized images in a grid, `columns` per row.
pub fn contact_sheet(images: &[DynamicImage], columns: usize) -> RgbaImage {
    let columns = columns.max(1);
    let (width, height) = images.first().map_or((0, 0), |i| i.dimensions());
    let rows = images.len().div_ceil(columns);

    let mut sheet = RgbaImage::new(width * columns.min(images.len()) as u32, height * rows as u32);
    for (i, image) in images.iter().enumerate() {
        let x = (i % columns) as i64 * width as i64;
        let y = (i / columns) as i64 * height as i64;
        imageops::overlay(&mut sheet, &image.to_rgba8(), x, y);
    }

    sheet
}

pub fn exists_decision<P: AsRef<Path>>(place: &str, action: &str, path: &P, assume: Option<Assume>) -> bool {
    let path = path.as_ref();

    match assume {
        Some(Assume::Yes) => return true,
        Some(Assume::No) => return false,
        None => (),
    }

    loop {
        print!("{place} file {path:?} already exists. {action}? [y/N] ");

        let opt: String = read!("{}\n");
        let opt = opt.to_lowercase();

        if opt == "y" {
            return true
        } else if opt.is_empty() || opt == "n" {
            return false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_channel_layout() {
        let gray = DynamicImage::ImageLuma8(ImageBuffer::from_raw(2, 1, vec![10, 20]).unwrap());
        let pixels = pixels_from_image(gray).unwrap();

        assert_eq!((pixels.height(), pixels.width(), pixels.channels()), (1, 2, 1));
        assert_eq!(pixels.as_raw(), &[10, 20]);
    }

    #[test]
    fn wide_images_are_narrowed() {
        let image = DynamicImage::new_rgb16(3, 2);
        let pixels = pixels_from_image(image).unwrap();
        assert_eq!(pixels.channels(), 3);

        let image = DynamicImage::new_rgba32f(3, 2);
        let pixels = pixels_from_image(image).unwrap();
        assert_eq!(pixels.channels(), 4);
    }

    #[test]
    fn image_round_trip() {
        let pixels = PixelArray::from_raw(1, 2, 3, vec![1, 2, 3, 4, 5, 6]).unwrap();
        let image = image_from_pixels(pixels.clone()).unwrap();

        assert_eq!(image.color(), ColorType::Rgb8);
        assert_eq!(pixels_from_image(image).unwrap(), pixels);
    }

    #[test]
    fn sheet_grid() {
        let tile = DynamicImage::new_rgb8(4, 3);
        let sheet = contact_sheet(&vec![tile; 7], 5);
        assert_eq!(sheet.dimensions(), (20, 6));

        let tile = DynamicImage::new_rgb8(4, 3);
        let sheet = contact_sheet(&vec![tile; 2], 5);
        assert_eq!(sheet.dimensions(), (8, 3));
    }
}
