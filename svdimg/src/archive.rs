//! Storage of factor sets as `.npz` archives.
//!
//! An archive is a zip file with three `.npy` members, the same layout
//! `numpy.savez(path, u=u, s=s, v=v)` produces:
//!
//! | member  | shape                    |
//! |---------|--------------------------|
//! | `u.npy` | `[channels, height, rank]` |
//! | `s.npy` | `[channels, rank]`         |
//! | `v.npy` | `[channels, rank, width]`  |

use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Seek, Write},
    path::Path,
};

use log::debug;
use nalgebra::{DMatrix, DVector};
use zip::{result::ZipError, write::SimpleFileOptions, CompressionMethod, ZipArchive, ZipWriter};

use crate::{
    error::{Error, Result},
    factors::{ChannelFactors, FactorSet},
    npy,
};

/// Byte level compression of the archive members. This is independent of
/// the rank truncation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ArchiveCompression {
    /// Members are stored as is, like `numpy.savez`.
    #[default]
    Stored,

    /// Members are deflated, like `numpy.savez_compressed`.
    Deflated,
}

/// Parameters to pass to [`save`] and [`write_into`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveOptions {
    pub compression: ArchiveCompression,
}

/// Write a factor set to the archive at `path`, replacing any existing file.
pub fn save<P: AsRef<Path>>(path: P, factors: &FactorSet, options: ArchiveOptions) -> Result<()> {
    let path = path.as_ref();
    debug!("saving rank {} factors to {}", factors.rank(), path.display());

    let file = BufWriter::new(File::create(path)?);
    write_into(file, factors, options)?.flush()?;

    Ok(())
}

/// Read the factor set stored in the archive at `path`.
pub fn load<P: AsRef<Path>>(path: P) -> Result<FactorSet> {
    let file = BufReader::new(File::open(path)?);
    read_from(file)
}

/// Encode a factor set into anything that implements [Write] and [Seek],
/// returning the writer once the archive is complete.
pub fn write_into<W: Write + Seek>(
    output: W,
    factors: &FactorSet,
    options: ArchiveOptions,
) -> Result<W> {
    let (c, h, w, r) = (
        factors.channel_count(),
        factors.height(),
        factors.width(),
        factors.rank(),
    );

    let mut u = Vec::with_capacity(c * h * r);
    let mut s = Vec::with_capacity(c * r);
    let mut v = Vec::with_capacity(c * r * w);
    for channel in factors.channels() {
        for row in channel.u.row_iter() {
            u.extend(row.iter());
        }
        s.extend(channel.s.iter());
        for row in channel.v.row_iter() {
            v.extend(row.iter());
        }
    }

    let method = match options.compression {
        ArchiveCompression::Stored => CompressionMethod::Stored,
        ArchiveCompression::Deflated => CompressionMethod::Deflated,
    };

    let mut zip = ZipWriter::new(output);
    for (key, shape, data) in [
        ("u", vec![c, h, r], u),
        ("s", vec![c, r], s),
        ("v", vec![c, r, w], v),
    ] {
        let mut member = Vec::new();
        npy::write_f32(&mut member, &shape, &data)?;

        let member_options = SimpleFileOptions::default()
            .compression_method(method)
            .large_file(member.len() as u64 > u32::MAX as u64);

        zip.start_file(format!("{key}.npy"), member_options)?;
        zip.write_all(&member)?;
    }

    Ok(zip.finish()?)
}

/// Decode a factor set from anything that implements [Read] and [Seek].
pub fn read_from<R: Read + Seek>(input: R) -> Result<FactorSet> {
    let mut archive = ZipArchive::new(input).map_err(container_error)?;

    let u = read_member(&mut archive, "u")?;
    let s = read_member(&mut archive, "s")?;
    let v = read_member(&mut archive, "v")?;

    assemble(u, s, v)
}

fn read_member<R: Read + Seek>(archive: &mut ZipArchive<R>, key: &str) -> Result<npy::Array> {
    let mut member = match archive.by_name(&format!("{key}.npy")) {
        Ok(m) => m,
        Err(ZipError::FileNotFound) => {
            return Err(Error::ArchiveCorrupt(format!("missing entry {key:?}")))
        }
        Err(e) => return Err(container_error(e)),
    };

    npy::read_f32(&mut member)
}

fn container_error(error: ZipError) -> Error {
    match error {
        ZipError::Io(e) => Error::Io(e),
        ZipError::InvalidArchive(_) | ZipError::UnsupportedArchive(_) => {
            Error::ArchiveCorrupt(error.to_string())
        }
        e => Error::Archive(e),
    }
}

/// Split the stacked arrays back into per channel factors.
fn assemble(u: npy::Array, s: npy::Array, v: npy::Array) -> Result<FactorSet> {
    let (&[c, h, r], &[s_c, s_r], &[v_c, v_r, w]) =
        (u.shape.as_slice(), s.shape.as_slice(), v.shape.as_slice())
    else {
        return Err(Error::ArchiveCorrupt(format!(
            "entries have shapes {:?}, {:?}, {:?}",
            u.shape, s.shape, v.shape
        )));
    };

    if c == 0 || (s_c, v_c) != (c, c) || (s_r, v_r) != (r, r) {
        return Err(Error::ArchiveCorrupt(format!(
            "inconsistent shapes u {:?}, s {:?}, v {:?}",
            u.shape, s.shape, v.shape
        )));
    }

    let channels = (0..c)
        .map(|i| ChannelFactors {
            u: DMatrix::from_row_slice(h, r, &u.data[i * h * r..(i + 1) * h * r]),
            s: DVector::from_column_slice(&s.data[i * r..(i + 1) * r]),
            v: DMatrix::from_row_slice(r, w, &v.data[i * r * w..(i + 1) * r * w]),
        })
        .collect();

    FactorSet::new(h, w, channels).map_err(|e| match e {
        Error::MismatchedFactors(m) => Error::ArchiveCorrupt(m),
        e => e,
    })
}
