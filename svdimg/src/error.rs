use thiserror::Error;

/// Errors produced while compressing, reconstructing, or persisting an image.
#[derive(Error, Debug)]
pub enum Error {
    #[error("image has an empty dimension ({height}×{width}×{channels})")]
    InvalidShape {
        height: usize,
        width: usize,
        channels: usize,
    },

    #[error("pixel buffer holds {actual} samples, expected {expected}")]
    BufferSize { expected: usize, actual: usize },

    #[error("invalid compression rate {0}, must be finite and not negative")]
    InvalidRate(f64),

    #[error("archive is corrupt: {0}")]
    ArchiveCorrupt(String),

    #[error("factor shapes do not agree: {0}")]
    MismatchedFactors(String),

    #[error("singular value decomposition did not converge for channel {channel}")]
    Factorization { channel: usize },

    #[error("io error")]
    Io(#[from] std::io::Error),

    #[error("archive container error")]
    Archive(#[from] zip::result::ZipError),
}

pub type Result<T> = std::result::Result<T, Error>;
