//! Bootstrap shape: how far messages sit below the base modulus, the
//! cosine approximation used for modular reduction, and how many levels
//! each pipeline segment consumes.

use std::f64::consts::PI;

use crate::eval_poly::eval_poly_depth;

#[derive(Clone)]
pub struct BootParameter {
    /// Messages are kept `2^log_message_ratio` below the base modulus.
    log_message_ratio: u32,
    /// Half-width of the integer range the reduction must cover.
    initial_k: usize,
    num_double_angle: usize,
    poly_degree: usize,
    poly_threshold: usize,
    num_cts_phases: usize,
    num_stc_phases: usize,
    chebyshev_coeffs: Vec<f64>,
}

impl BootParameter {
    pub fn new(
        log_message_ratio: u32,
        initial_k: usize,
        num_double_angle: usize,
        poly_degree: usize,
        poly_threshold: usize,
        num_cts_phases: usize,
        num_stc_phases: usize,
    ) -> Self {
        assert!(initial_k >= 1);
        assert!(poly_threshold.is_power_of_two());
        let chebyshev_coeffs = interpolate_target(initial_k, num_double_angle, poly_degree);
        Self {
            log_message_ratio,
            initial_k,
            num_double_angle,
            poly_degree,
            poly_threshold,
            num_cts_phases,
            num_stc_phases,
            chebyshev_coeffs,
        }
    }

    pub fn log_message_ratio(&self) -> u32 {
        self.log_message_ratio
    }

    pub fn initial_k(&self) -> usize {
        self.initial_k
    }

    pub fn num_double_angle(&self) -> usize {
        self.num_double_angle
    }

    pub fn poly_degree(&self) -> usize {
        self.poly_degree
    }

    pub fn poly_threshold(&self) -> usize {
        self.poly_threshold
    }

    pub fn num_cts_phases(&self) -> usize {
        self.num_cts_phases
    }

    pub fn num_stc_phases(&self) -> usize {
        self.num_stc_phases
    }

    pub fn chebyshev_coeffs(&self) -> &[f64] {
        &self.chebyshev_coeffs
    }

    /// `(2 pi)^(-2^(k+1) / 2^da)`, the constant subtracted by the `k`-th
    /// double-angle step.
    pub fn double_angle_constant(&self, k: usize) -> f64 {
        let e = (k as i32 + 1) - self.num_double_angle as i32;
        (2.0 * PI).powf(-(2f64.powi(e)))
    }

    /// Normalization plus polynomial plus double-angle levels.
    pub fn eval_mod_depth(&self) -> usize {
        1 + eval_poly_depth(self.poly_degree, self.poly_threshold) + self.num_double_angle
    }

    /// Levels a full bootstrap consumes below the starting level.
    pub fn total_depth(&self) -> usize {
        self.num_cts_phases + self.eval_mod_depth() + self.num_stc_phases
    }
}

impl Default for BootParameter {
    fn default() -> Self {
        Self::new(5, 20, 3, 31, 8, 2, 2)
    }
}

/// Chebyshev interpolant of the seed the double-angle steps expand:
/// `g_0(x) = (2 pi)^(-1/2^da) * cos(2 pi K x / 2^da)`. Doubling the
/// angle `da` times turns it into `sin(2 pi v) / (2 pi)` with
/// `x = (v - 1/4) / K`.
fn interpolate_target(initial_k: usize, num_double_angle: usize, degree: usize) -> Vec<f64> {
    let amp = (2.0 * PI).powf(-1.0 / 2f64.powi(num_double_angle as i32));
    let freq = 2.0 * PI * initial_k as f64 / 2f64.powi(num_double_angle as i32);
    let f = |x: f64| amp * (freq * x).cos();
    chebyshev_interpolate(f, degree)
}

/// Coefficients of the degree-`degree` interpolant at Chebyshev nodes.
fn chebyshev_interpolate(f: impl Fn(f64) -> f64, degree: usize) -> Vec<f64> {
    let n = degree + 1;
    let samples: Vec<f64> = (0..n)
        .map(|j| f((PI * (j as f64 + 0.5) / n as f64).cos()))
        .collect();
    (0..n)
        .map(|k| {
            let weight = if k == 0 { 1.0 } else { 2.0 } / n as f64;
            weight
                * samples
                    .iter()
                    .enumerate()
                    .map(|(j, &s)| s * (PI * k as f64 * (j as f64 + 0.5) / n as f64).cos())
                    .sum::<f64>()
        })
        .collect()
}
