// Conversions between ndarray and nalgebra for the few dense factorizations we need

use nalgebra::DMatrix;
use ndarray::Array2;

use crate::error::{Error, Result};

fn to_dmatrix(a: &Array2<f64>) -> DMatrix<f64> {
    DMatrix::from_fn(a.nrows(), a.ncols(), |i, j| a[[i, j]])
}

fn to_array(m: &DMatrix<f64>) -> Array2<f64> {
    Array2::from_shape_fn((m.nrows(), m.ncols()), |(i, j)| m[(i, j)])
}

/// Lower triangular `L` with `a = L L^T`.
pub fn cholesky_lower(a: &Array2<f64>) -> Result<Array2<f64>> {
    let chol = to_dmatrix(a).cholesky().ok_or(Error::NotPositiveDefinite)?;
    Ok(to_array(&chol.l()))
}

/// Inverse of a symmetric positive definite matrix through its Cholesky factor.
pub fn inverse_spd(a: &Array2<f64>) -> Result<Array2<f64>> {
    let chol = to_dmatrix(a).cholesky().ok_or(Error::NotPositiveDefinite)?;
    Ok(to_array(&chol.inverse()))
}
