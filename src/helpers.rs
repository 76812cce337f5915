//! Numeric constants and quadrature helpers shared across the crate.

/// Small epsilon for numerical comparisons (e.g., grid spacing checks).
pub const NUMERICAL_EPS: f64 = 1e-10;

/// Stabiliser added to denominators when normalising weights and loadings.
pub const INV_EPS: f64 = 1e-15;

/// Default convergence tolerance for the power method.
pub const DEFAULT_CONVERGENCE_TOL: f64 = 1e-6;

/// Default iteration cap for the power method.
pub const DEFAULT_MAX_ITER: usize = 500;

/// Default number of FPLS components.
pub const DEFAULT_N_COMPONENTS: usize = 5;

/// Number of points used when integrating basis functions numerically.
///
/// Odd so that composite Simpson's rule covers the grid exactly.
pub const QUADRATURE_POINTS: usize = 1001;

/// Simpson weights for the pair of intervals `[x0, x1]`, `[x1, x2]`.
///
/// Handles unequal spacing `h0 != h1`.
fn simpson_panel(h0: f64, h1: f64) -> [f64; 3] {
    let hsum = h0 + h1;
    [
        hsum / 6.0 * (2.0 - h1 / h0),
        hsum / 6.0 * (hsum * hsum / (h0 * h1)),
        hsum / 6.0 * (2.0 - h0 / h1),
    ]
}

/// Accumulate composite Simpson weights for `argvals[start..=end]` into `weights`.
///
/// The sub-range must contain an odd number of points.
fn accumulate_simpson(argvals: &[f64], start: usize, end: usize, scale: f64, weights: &mut [f64]) {
    let mut i = start;
    while i + 2 <= end {
        let h0 = argvals[i + 1] - argvals[i];
        let h1 = argvals[i + 2] - argvals[i + 1];
        let panel = simpson_panel(h0, h1);
        weights[i] += scale * panel[0];
        weights[i + 1] += scale * panel[1];
        weights[i + 2] += scale * panel[2];
        i += 2;
    }
}

/// Compute Simpson's rule integration weights for a (possibly non-uniform) grid.
///
/// With an odd number of points this is the composite Simpson's rule. With an
/// even number, the result averages two rules: Simpson on the first `n - 1`
/// points plus the trapezoid on the last interval, and the trapezoid on the
/// first interval plus Simpson on the last `n - 1` points.
///
/// # Arguments
/// * `argvals` - Grid points (evaluation points), strictly increasing
///
/// # Returns
/// Vector of integration weights, one per grid point
pub fn simpsons_weights(argvals: &[f64]) -> Vec<f64> {
    let n = argvals.len();
    if n < 2 {
        return vec![1.0; n];
    }

    let mut weights = vec![0.0; n];

    if n == 2 {
        let h = argvals[1] - argvals[0];
        weights[0] = h / 2.0;
        weights[1] = h / 2.0;
        return weights;
    }

    if n % 2 == 1 {
        accumulate_simpson(argvals, 0, n - 1, 1.0, &mut weights);
        return weights;
    }

    // Simpson on [0, n-2], trapezoid on the last interval
    accumulate_simpson(argvals, 0, n - 2, 0.5, &mut weights);
    let h_last = argvals[n - 1] - argvals[n - 2];
    weights[n - 2] += 0.25 * h_last;
    weights[n - 1] += 0.25 * h_last;

    // Trapezoid on the first interval, Simpson on [1, n-1]
    let h_first = argvals[1] - argvals[0];
    weights[0] += 0.25 * h_first;
    weights[1] += 0.25 * h_first;
    accumulate_simpson(argvals, 1, n - 1, 0.5, &mut weights);

    weights
}

/// Uniform grid with `n` points over `[a, b]`.
pub fn linspace(a: f64, b: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![a],
        _ => {
            let step = (b - a) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { b } else { a + i as f64 * step })
                .collect()
        }
    }
}

/// Whether `argvals` is non-empty and strictly increasing.
pub fn is_strictly_increasing(argvals: &[f64]) -> bool {
    !argvals.is_empty()
        && argvals.iter().all(|v| v.is_finite())
        && argvals.windows(2).all(|w| w[1] > w[0])
}
