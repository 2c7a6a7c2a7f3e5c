//! Discrete prolate spheroidal (Slepian) sequences.
//!
//! The tapers are the eigenvectors of the symmetric tridiagonal matrix
//!
//! ```text
//! diag[i]   = ((N − 1 − 2i) / 2)² · cos(2πW)
//! off[i]    = i (N − i) / 2                     i = 1 … N−1
//! W         = half_nbw / N
//! ```
//!
//! ordered by decreasing eigenvalue.  Signs follow the usual convention:
//! even tapers sum to a positive value, odd tapers start with a positive
//! lobe.  Each taper has unit energy.
use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::Array2;

use crate::error::{PipelineError, Result};

/// Tapers and their spectral concentration in `[-W, W]`.
#[derive(Debug, Clone)]
pub struct Dpss {
    /// `[K, N]`
    pub tapers: Array2<f64>,
    pub concentrations: Vec<f64>,
}

/// First `k_max` tapers of length `n`.
///
/// With `sym = false` the periodic variant is returned: `n + 1` points are
/// computed and the last one dropped.
pub fn dpss_windows(n: usize, half_nbw: f64, k_max: usize, sym: bool) -> Result<Dpss> {
    if n < 2 {
        return Err(PipelineError::invalid(format!("DPSS length must be at least 2, got {n}")));
    }
    if !(half_nbw > 0.0) || k_max == 0 || k_max > n {
        return Err(PipelineError::invalid(format!(
            "DPSS needs half_nbw > 0 and 1 <= k_max <= {n}, got ({half_nbw}, {k_max})"
        )));
    }
    let m = if sym { n } else { n + 1 };
    let w = half_nbw / m as f64;
    let cos_w = (std::f64::consts::TAU * w).cos();

    let mut t = DMatrix::<f64>::zeros(m, m);
    for i in 0..m {
        let c = (m as f64 - 1.0 - 2.0 * i as f64) / 2.0;
        t[(i, i)] = c * c * cos_w;
        if i + 1 < m {
            let k = (i + 1) as f64;
            let off = k * (m as f64 - k) / 2.0;
            t[(i, i + 1)] = off;
            t[(i + 1, i)] = off;
        }
    }
    let eig = SymmetricEigen::new(t);
    let mut order: Vec<usize> = (0..m).collect();
    order.sort_by(|&a, &b| eig.eigenvalues[b].total_cmp(&eig.eigenvalues[a]));

    let thresh = (1.0 / m as f64).max(1e-7);
    let mut full = Array2::<f64>::zeros((k_max, m));
    for (k, &col) in order.iter().take(k_max).enumerate() {
        let mut v: Vec<f64> = eig.eigenvectors.column(col).iter().copied().collect();
        let flip = if k % 2 == 0 {
            v.iter().sum::<f64>() < 0.0
        } else {
            v.iter().find(|x| *x * *x > thresh).is_some_and(|x| *x < 0.0)
        };
        if flip {
            v.iter_mut().for_each(|x| *x = -*x);
        }
        for (j, x) in v.into_iter().enumerate() {
            full[[k, j]] = x;
        }
    }

    let concentrations = full.outer_iter().map(|v| concentration(&v.to_vec(), w)).collect();

    let mut tapers = full.slice(ndarray::s![.., ..n]).to_owned();
    for mut row in tapers.outer_iter_mut() {
        let norm = row.dot(&row).sqrt();
        if norm > 0.0 {
            row /= norm;
        }
    }
    Ok(Dpss { tapers, concentrations })
}

/// Energy fraction of `v` inside the band `[-w, w]` (cycles per sample).
fn concentration(v: &[f64], w: f64) -> f64 {
    let n = v.len();
    let energy: f64 = v.iter().map(|x| x * x).sum();
    if energy == 0.0 {
        return 0.0;
    }
    let mut acc = 0.0;
    for i in 0..n {
        for j in 0..n {
            let b = if i == j {
                2.0 * w
            } else {
                let d = i as f64 - j as f64;
                (std::f64::consts::TAU * w * d).sin() / (std::f64::consts::PI * d)
            };
            acc += v[i] * b * v[j];
        }
    }
    acc / energy
}
