mod utils;

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand};
use image::ImageReader;
use log::info;
use svdimg::{ArchiveCompression, ArchiveOptions, CompressionRate, DEFAULT_PREVIEW_RATES};
use utils::{Assume, contact_sheet, exists_decision, image_from_pixels, pixels_from_image};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Subcommands,

    /// Overwrite output files
    #[arg(short = 'n', long = "overwrite", conflicts_with = "assumeno")]
    assumeyes: bool,

    /// Do not overwrite output files
    #[arg(short = 'y', long = "preserve", conflicts_with = "assumeyes")]
    assumeno: bool,
}

#[derive(Debug, Subcommand)]
enum Subcommands {
    /// Compress an image into an SVD factor archive
    Compress(CompressArgs),

    /// Rebuild an image from an SVD factor archive
    Decompress(DecompressArgs),

    /// Render an image at several compression rates side by side
    Preview(PreviewArgs),
}

#[derive(Debug, Args)]
struct CompressArgs {
    /// Input image file of any type supported by `image`
    input: PathBuf,
    /// Output path of the `.npz` archive
    output: PathBuf,

    /// Nominal ratio of stored values to raw samples. 1 or more keeps
    /// every singular component.
    #[arg(default_value = "0.5", short, long)]
    rate: CompressionRate,

    /// Deflate the archive members, like `numpy.savez_compressed`
    #[arg(short, long)]
    deflate: bool,
}

#[derive(Debug, Args)]
struct DecompressArgs {
    /// Input `.npz` archive
    input: PathBuf,

    /// Output image file
    output: PathBuf,
}

#[derive(Debug, Args)]
struct PreviewArgs {
    /// Input image file of any type supported by `image`
    input: PathBuf,

    /// Output image file holding every preview
    output: PathBuf,

    /// Rates to preview, in order. Defaults to a sweep from 1 down to 0.2
    #[arg(short, long, num_args = 1.., value_delimiter = ',')]
    rates: Vec<CompressionRate>,

    /// Previews per row of the output grid
    #[arg(default_value_t = 5, short, long, value_parser = clap::value_parser!(u16).range(1..))]
    columns: u16,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Cli::parse();

    let assume = if args.assumeyes {
        Some(Assume::Yes)
    } else if args.assumeno {
        Some(Assume::No)
    } else {
        None
    };

    match args.command {
        Subcommands::Compress(a) => compress(a, assume),
        Subcommands::Decompress(a) => decompress(a, assume),
        Subcommands::Preview(a) => preview(a, assume),
    }
}

/// Check the input exists and whether the output may be written.
fn check_paths(input: &Path, output: &Path, assume: Option<Assume>) -> Result<bool> {
    if !input.try_exists()? {
        bail!("Input file {:?} does not exist", input);
    }

    if output.try_exists()?
        && !exists_decision("Output", "Overwrite", &output, assume)
    {
        return Ok(false)
    }

    Ok(true)
}

fn compress(args: CompressArgs, assume: Option<Assume>) -> Result<()> {
    if !check_paths(&args.input, &args.output, assume)? {
        return Ok(())
    }

    let image = ImageReader::open(&args.input)?
        .decode()?;
    let pixels = pixels_from_image(image)?;

    let factors = svdimg::compress(&pixels, args.rate)?;
    info!(
        "kept rank {} of {} ({:.3} of the raw size)",
        factors.rank(),
        pixels.height().min(pixels.width()),
        factors.effective_rate()
    );

    let options = ArchiveOptions {
        compression: if args.deflate {
            ArchiveCompression::Deflated
        } else {
            ArchiveCompression::Stored
        },
    };
    svdimg::archive::save(&args.output, &factors, options)?;

    Ok(())
}

fn decompress(args: DecompressArgs, assume: Option<Assume>) -> Result<()> {
    if !check_paths(&args.input, &args.output, assume)? {
        return Ok(())
    }

    let factors = svdimg::archive::load(&args.input)?;
    info!(
        "loaded {}×{} image with {} channels at rank {}",
        factors.width(),
        factors.height(),
        factors.channel_count(),
        factors.rank()
    );

    let image = image_from_pixels(svdimg::reconstruct(&factors))?;
    image.save(&args.output)?;

    Ok(())
}

fn preview(args: PreviewArgs, assume: Option<Assume>) -> Result<()> {
    if !check_paths(&args.input, &args.output, assume)? {
        return Ok(())
    }

    let rates = if args.rates.is_empty() {
        DEFAULT_PREVIEW_RATES
            .iter()
            .map(|&r| CompressionRate::new(r))
            .collect::<Result<Vec<_>, _>>()?
    } else {
        args.rates
    };

    let image = ImageReader::open(&args.input)?
        .decode()?;
    let pixels = pixels_from_image(image)?;

    let previews = svdimg::preview(&pixels, &rates)?;

    let max_rank = pixels.height().min(pixels.width());
    let mut images = Vec::with_capacity(previews.len());
    for (rate, preview) in rates.iter().zip(previews) {
        let rank = rate.rank(pixels.height(), pixels.width()).unwrap_or(max_rank).min(max_rank);
        let psnr = pixels.psnr(&preview).unwrap_or(f64::NAN);
        info!("rate={rate}: rank {rank}, PSNR {psnr:.2} dB");

        images.push(image_from_pixels(preview)?);
    }

    contact_sheet(&images, args.columns as usize).save(&args.output)?;

    Ok(())
}
