use nalgebra::{DMatrix, DVector};

use crate::error::{Error, Result};

/// The singular value decomposition of one channel, possibly truncated.
///
/// `u · diag(s) · v` approximates the channel's `height`×`width` matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelFactors {
    /// Left singular vectors, `height`×`rank`.
    pub u: DMatrix<f32>,

    /// Singular values in descending order.
    pub s: DVector<f32>,

    /// Right singular vectors (already transposed), `rank`×`width`.
    pub v: DMatrix<f32>,
}

impl ChannelFactors {
    pub fn rank(&self) -> usize {
        self.s.len()
    }

    /// Keep the leading `k` components, clamped to the available rank.
    pub fn truncate(&self, k: usize) -> ChannelFactors {
        let k = k.min(self.rank());

        ChannelFactors {
            u: self.u.columns(0, k).into_owned(),
            s: self.s.rows(0, k).into_owned(),
            v: self.v.rows(0, k).into_owned(),
        }
    }

    fn check(&self, height: usize, width: usize, rank: usize) -> bool {
        self.u.shape() == (height, rank) && self.s.len() == rank && self.v.shape() == (rank, width)
    }
}

/// Factors for every channel of an image, all sharing the same size and
/// rank.
#[derive(Debug, Clone, PartialEq)]
pub struct FactorSet {
    height: usize,
    width: usize,
    rank: usize,
    channels: Vec<ChannelFactors>,
}

impl FactorSet {
    /// Assemble a factor set, checking that every channel has the shapes of
    /// a `height`×`width` decomposition with a common rank no larger than
    /// `min(height, width)`.
    pub fn new(height: usize, width: usize, channels: Vec<ChannelFactors>) -> Result<Self> {
        let rank = channels.first().map(ChannelFactors::rank).unwrap_or(0);

        if rank > height.min(width) {
            return Err(Error::MismatchedFactors(format!(
                "rank {rank} exceeds the {height}×{width} image"
            )));
        }

        if let Some(i) = channels.iter().position(|c| !c.check(height, width, rank)) {
            return Err(Error::MismatchedFactors(format!(
                "channel {i} does not match a {height}×{width} rank {rank} decomposition"
            )));
        }

        Ok(Self {
            height,
            width,
            rank,
            channels,
        })
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn channels(&self) -> &[ChannelFactors] {
        &self.channels
    }

    /// A new factor set keeping the leading `k` components of every
    /// channel. `k` larger than the current rank keeps everything.
    pub fn truncate(&self, k: usize) -> FactorSet {
        let rank = k.min(self.rank);

        FactorSet {
            height: self.height,
            width: self.width,
            rank,
            channels: self.channels.iter().map(|c| c.truncate(rank)).collect(),
        }
    }

    /// Number of values needed to store the factors.
    pub fn stored_len(&self) -> usize {
        (self.height + self.width + 1) * self.rank * self.channels.len()
    }

    /// Ratio of stored values to raw samples.
    pub fn effective_rate(&self) -> f64 {
        let raw = self.height * self.width * self.channels.len();
        if raw == 0 {
            return 0.0;
        }

        self.stored_len() as f64 / raw as f64
    }
}
