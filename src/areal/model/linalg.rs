use ndarray::{Array1, Array2};

/// Lower-triangular Cholesky factor of a symmetric positive-definite matrix.
/// Returns `None` when a pivot is not clearly positive (singular or indefinite input).
pub(super) fn cholesky(a: &Array2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    debug_assert_eq!(n, a.ncols());

    let scale = a.diag().iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    let tol = 1e-10 * scale.max(f64::MIN_POSITIVE);

    let mut l = Array2::<f64>::zeros((n, n));
    for j in 0..n {
        let d = a[[j, j]] - (0..j).map(|k| l[[j, k]] * l[[j, k]]).sum::<f64>();
        if !(d > tol) { return None } // also rejects NaN
        let pivot = d.sqrt();
        l[[j, j]] = pivot;

        for i in j + 1..n {
            let s = a[[i, j]] - (0..j).map(|k| l[[i, k]] * l[[j, k]]).sum::<f64>();
            l[[i, j]] = s / pivot;
        }
    }

    Some(l)
}

/// Solve `L Lᵀ x = b` given the Cholesky factor `L`.
pub(super) fn cholesky_solve(l: &Array2<f64>, b: &Array1<f64>) -> Array1<f64> {
    let n = l.nrows();

    // Forward substitution: L y = b
    let mut y = Array1::<f64>::zeros(n);
    for i in 0..n {
        let s = b[i] - (0..i).map(|k| l[[i, k]] * y[k]).sum::<f64>();
        y[i] = s / l[[i, i]];
    }

    // Back substitution: Lᵀ x = y
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let s = y[i] - (i + 1..n).map(|k| l[[k, i]] * x[k]).sum::<f64>();
        x[i] = s / l[[i, i]];
    }

    x
}

/// Inverse of `L Lᵀ` given the Cholesky factor `L`.
pub(super) fn cholesky_inverse(l: &Array2<f64>) -> Array2<f64> {
    let n = l.nrows();
    let mut inv = Array2::<f64>::zeros((n, n));
    for j in 0..n {
        let mut e = Array1::<f64>::zeros(n);
        e[j] = 1.0;
        inv.column_mut(j).assign(&cholesky_solve(l, &e));
    }
    inv
}
