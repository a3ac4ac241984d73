use std::ops::Range;

use proptest::collection::vec;
use proptest::prelude::*;

use crate::matrix::Matrix;

pub fn random_vec_in(range: Range<f64>, len: usize) -> impl Strategy<Value = Vec<f64>> {
    vec(range, len)
}

pub fn random_vec(len: usize) -> impl Strategy<Value = Vec<f64>> {
    random_vec_in(-10.0..10.0, len)
}

pub fn small_random_vec(len: usize) -> impl Strategy<Value = Vec<f64>> {
    random_vec_in(-1.0..1.0, len)
}

fn rdp_with_epsilon(a: f64, b: f64) -> f64 {
    (a - b).abs() / (a.abs() + b.abs()).max(1e-2)
}

pub fn max_rdp(a: &[f64], b: &[f64]) -> f64 {
    //https://stats.stackexchange.com/a/201864
    assert_eq!(a.len(), b.len());

    a.iter()
        .zip(b)
        .map(|(a, b)| rdp_with_epsilon(*a, *b))
        .fold(0.0, f64::max)
}

pub fn max_abs_diff(a: &[f64], b: &[f64]) -> f64 {
    assert_eq!(a.len(), b.len());

    a.iter()
        .zip(b)
        .map(|(a, b)| (a - b).abs())
        .fold(0.0, f64::max)
}

/// Central finite difference of `<dout, f(params)>` with respect to every
/// entry of `params`.
///
/// This is the gradient that backpropagating `dout` through `f` must produce.
pub fn numerical_diff(
    params: &mut Matrix,
    dout: &[f64],
    mut f: impl FnMut(&Matrix) -> Vec<f64>,
) -> Matrix {
    const H: f64 = 1e-6;

    let (rows, cols) = params.shape();
    let mut dparams = Matrix::zeros(rows, cols);

    for r in 0..rows {
        for c in 0..cols {
            let original_value = params[(r, c)];

            params[(r, c)] = original_value + H;
            let fwd_out = f(params);

            params[(r, c)] = original_value - H;
            let bkw_out = f(params);

            params[(r, c)] = original_value;

            let projected: f64 = fwd_out
                .iter()
                .zip(&bkw_out)
                .zip(dout)
                .map(|((f, b), d)| (f - b) * d)
                .sum();

            dparams[(r, c)] = projected / (2.0 * H);
        }
    }

    dparams
}
