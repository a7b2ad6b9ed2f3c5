use std::{fmt, str::FromStr};

use crate::error::{Error, Result};

/// Nominal ratio between the size of the stored factors and the size of the
/// original image, used to pick how many singular components to keep.
///
/// This is not a guarantee about the output size. Rates of `1` and above
/// keep every component.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct CompressionRate(f64);

impl CompressionRate {
    /// Keep every component.
    pub const FULL: CompressionRate = CompressionRate(1.0);

    pub fn new(rate: f64) -> Result<Self> {
        if !rate.is_finite() || rate < 0.0 {
            return Err(Error::InvalidRate(rate));
        }

        Ok(Self(rate))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// Whether this rate skips truncation entirely.
    pub fn is_full(self) -> bool {
        self.0 >= 1.0
    }

    /// The rank to keep for an image of the given size, or `None` when no
    /// truncation should happen.
    pub fn rank(self, height: usize, width: usize) -> Option<usize> {
        if self.is_full() {
            None
        } else {
            Some(rank_for(height, width, self.0))
        }
    }
}

impl Default for CompressionRate {
    fn default() -> Self {
        Self::FULL
    }
}

impl fmt::Display for CompressionRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CompressionRate {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let value: f64 = s
            .trim()
            .parse()
            .map_err(|_| format!("invalid compression rate {s}"))?;

        CompressionRate::new(value).map_err(|e| e.to_string())
    }
}

/// Number of singular components that fit in `rate` of the raw storage of a
/// `height`×`width` channel.
///
/// A rank-k channel stores `k` columns of `U`, `k` rows of `V` and `k`
/// singular values, so `rate = (height + width + 1) * k / (height * width)`.
/// The result may exceed `min(height, width)`; truncation clamps it.
pub fn rank_for(height: usize, width: usize, rate: f64) -> usize {
    let area = height as f64 * width as f64;
    let per_component = (height + width + 1) as f64;

    (rate * area / per_component).floor().max(0.0) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_half_rate() {
        assert_eq!(rank_for(100, 100, 0.5), 24);
    }

    #[test]
    fn matches_closed_form() {
        for &(h, w) in &[(1, 1), (4, 4), (17, 33), (512, 512), (480, 640)] {
            for &rate in &[0.0, 0.01, 0.2, 0.5, 0.95] {
                let expected = (rate * (h * w) as f64 / (h + w + 1) as f64).floor() as usize;
                assert_eq!(rank_for(h, w, rate), expected, "{h}x{w} at {rate}");
            }
        }
    }

    #[test]
    fn tiny_image_rounds_to_zero() {
        assert_eq!(rank_for(2, 2, 0.5), 0);
    }

    #[test]
    fn full_rate_skips_estimation() {
        assert_eq!(CompressionRate::new(1.0).unwrap().rank(100, 100), None);
        assert_eq!(CompressionRate::new(3.5).unwrap().rank(100, 100), None);
        assert_eq!(CompressionRate::new(0.5).unwrap().rank(100, 100), Some(24));
    }

    #[test]
    fn rejects_bad_rates() {
        assert!(CompressionRate::new(-0.1).is_err());
        assert!(CompressionRate::new(f64::NAN).is_err());
        assert!(CompressionRate::new(f64::INFINITY).is_err());
        assert!(CompressionRate::new(0.0).is_ok());
    }

    #[test]
    fn parse() {
        assert_eq!("0.25".parse::<CompressionRate>().unwrap().value(), 0.25);
        assert!("abc".parse::<CompressionRate>().is_err());
        assert!("-1".parse::<CompressionRate>().is_err());
    }
}
