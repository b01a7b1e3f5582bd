//! Matrix helpers over `ndarray`. Rows are `1 x n` matrices throughout.

use crate::error::{Error, Result};
use crate::utils::ZeroOut;

use ndarray::{concatenate, s, Array2, Axis};
use rand::distributions::Uniform;
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

/// Dense row-major matrix of `f64`. Row vectors are `1 x n` matrices.
pub type Mat = Array2<f64>;

/// Builds a `1 x n` row vector from `values`.
pub fn row(values: &[f64]) -> Mat {
    Mat::from_shape_fn((1, values.len()), |(_, c)| values[c])
}

/// Checks that `m` is a `1 x width` row vector.
pub fn expect_row(m: &Mat, width: usize, context: &'static str) -> Result<()> {
    if m.nrows() != 1 || m.ncols() != width {
        return Err(Error::width(context, width, m.nrows(), m.ncols()));
    }
    Ok(())
}

/// Appends a constant `1` column to a row vector.
pub fn with_bias(m: &Mat) -> Mat {
    let mut biased = Mat::ones((m.nrows(), m.ncols() + 1));
    biased.slice_mut(s![.., ..m.ncols()]).assign(m);
    biased
}

/// Drops the last column.
pub fn without_last_column(m: &Mat) -> Mat {
    m.slice(s![.., ..m.ncols() - 1]).to_owned()
}

/// Concatenates row vectors side by side.
pub fn concat_rows(parts: &[&Mat]) -> Result<Mat> {
    let views: Vec<_> = parts.iter().map(|m| m.view()).collect();
    concatenate(Axis(1), &views).map_err(|_| {
        let shapes: Vec<_> = parts
            .iter()
            .map(|m| format!("{}x{}", m.nrows(), m.ncols()))
            .collect();
        Error::Dimension {
            context: "row concatenation",
            expected: "parts with one shared row count".to_string(),
            found: shapes.join(", "),
        }
    })
}

/// Mean of all elements, `0` for an empty matrix.
pub fn mean(m: &Mat) -> f64 {
    m.mean().unwrap_or(0.0)
}

/// Mean of the absolute element-wise difference between `a` and `b`.
pub fn mean_abs_diff(a: &Mat, b: &Mat) -> f64 {
    mean(&(a - b).mapv(f64::abs))
}

/// A matrix of independent standard-normal samples scaled by `scale`.
pub fn gaussian<R: Rng + ?Sized>(rng: &mut R, rows: usize, cols: usize, scale: f64) -> Mat {
    Mat::from_shape_simple_fn((rows, cols), || {
        let x: f64 = StandardNormal.sample(rng);
        x * scale
    })
}

/// Adds uniform noise from `[-magnitude, magnitude]` to every element.
pub fn perturb<R: Rng + ?Sized>(m: &mut Mat, rng: &mut R, magnitude: f64) {
    let magnitude = magnitude.abs();
    if magnitude == 0.0 {
        return;
    }
    let noise = Uniform::new_inclusive(-magnitude, magnitude);
    m.mapv_inplace(|v| v + noise.sample(rng));
}

impl ZeroOut for Mat {
    fn zero_out(&mut self) {
        self.fill(0.0);
    }
}
