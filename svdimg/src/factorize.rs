use log::trace;
use nalgebra::{DMatrix, DVector, SVD};
use rayon::iter::{IndexedParallelIterator, IntoParallelRefIterator, ParallelIterator};

use crate::{
    error::{Error, Result},
    factors::ChannelFactors,
};

/// A dense singular value decomposition over a stack of channel matrices.
///
/// Implementations return one full-rank (`min(height, width)`) decomposition
/// per input matrix, in input order, with singular values sorted in
/// descending order.
pub trait Factorize {
    fn factorize_stack(&self, channels: &[DMatrix<f32>]) -> Result<Vec<ChannelFactors>>;
}

/// Thin SVD provided by [nalgebra], one channel per rayon task.
#[derive(Debug, Clone, Copy)]
pub struct NalgebraSvd {
    /// Convergence tolerance passed to the SVD iteration.
    pub eps: f32,

    /// Iteration limit, `0` for no limit.
    pub max_iterations: usize,
}

impl Default for NalgebraSvd {
    fn default() -> Self {
        Self {
            eps: f32::EPSILON,
            max_iterations: 0,
        }
    }
}

impl Factorize for NalgebraSvd {
    fn factorize_stack(&self, channels: &[DMatrix<f32>]) -> Result<Vec<ChannelFactors>> {
        channels
            .par_iter()
            .enumerate()
            .map(|(channel, matrix)| self.factorize(channel, matrix))
            .collect()
    }
}

impl NalgebraSvd {
    fn factorize(&self, channel: usize, matrix: &DMatrix<f32>) -> Result<ChannelFactors> {
        trace!("factorizing channel {channel} ({}×{})", matrix.nrows(), matrix.ncols());

        let svd = SVD::try_new(matrix.clone(), true, true, self.eps, self.max_iterations)
            .ok_or(Error::Factorization { channel })?;

        let (Some(u), Some(v_t)) = (svd.u, svd.v_t) else {
            return Err(Error::Factorization { channel });
        };

        Ok(sorted(u, svd.singular_values.as_slice(), v_t))
    }
}

/// Reorder components by descending singular value.
fn sorted(u: DMatrix<f32>, s: &[f32], v_t: DMatrix<f32>) -> ChannelFactors {
    let mut order: Vec<usize> = (0..s.len()).collect();
    order.sort_by(|&a, &b| s[b].total_cmp(&s[a]));

    ChannelFactors {
        u: u.select_columns(&order),
        s: DVector::from_iterator(order.len(), order.iter().map(|&i| s[i])),
        v: v_t.select_rows(&order),
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn product(f: &ChannelFactors) -> DMatrix<f32> {
        &f.u * DMatrix::from_diagonal(&f.s) * &f.v
    }

    #[test]
    fn decomposes_each_channel() {
        let a = DMatrix::from_fn(6, 4, |i, j| ((i * 7 + j * 3) % 11) as f32);
        let b = DMatrix::from_fn(6, 4, |i, j| (i as f32 - j as f32).abs() * 10.0);

        let factors = NalgebraSvd::default()
            .factorize_stack(&[a.clone(), b.clone()])
            .unwrap();

        assert_eq!(factors.len(), 2);
        for (f, m) in factors.iter().zip([&a, &b]) {
            assert_eq!(f.rank(), 4);
            assert_eq!(f.u.shape(), (6, 4));
            assert_eq!(f.v.shape(), (4, 4));
            assert_relative_eq!(product(f), m.clone(), epsilon = 1e-3);
        }
    }

    #[test]
    fn singular_values_descend() {
        let m = DMatrix::from_fn(5, 8, |i, j| ((i + 1) * (j + 2) % 13) as f32 + i as f32);
        let factors = NalgebraSvd::default().factorize_stack(&[m]).unwrap();
        let s = &factors[0].s;

        assert_eq!(s.len(), 5);
        assert!(s.iter().all(|&x| x >= 0.0));
        assert!(s.as_slice().windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn sorting_moves_vectors_with_values() {
        let u = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        let v = DMatrix::from_row_slice(2, 2, &[5.0, 6.0, 7.0, 8.0]);
        let f = sorted(u, &[1.0, 3.0], v);

        assert_eq!(f.s, DVector::from_vec(vec![3.0, 1.0]));
        assert_eq!(f.u, DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 4.0, 3.0]));
        assert_eq!(f.v, DMatrix::from_row_slice(2, 2, &[7.0, 8.0, 5.0, 6.0]));
    }
}
