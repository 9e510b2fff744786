//! Coefficients of the recursive gaussian.
//!
//! Implements "Recursive Implementation of the Gaussian Filter Using Truncated
//! Cosine Functions" by Charalampidis [2016]. The impulse response is a sum of
//! three cosines `k = {1, 3, 5}` truncated to `[-N, N]`, each produced by a
//! second order recursion driven by the sum of the input `N + 1` samples
//! behind and `N - 1` samples ahead of the current output.

use crate::error::BlurError;

/// Number of outputs computed per iteration of the unrolled row loop.
pub(crate) const LANES: usize = 4;

/// Number of cosine terms, `k = {1, 3, 5}` in that order.
pub(crate) const SECTIONS: usize = 3;

/// Largest sigma accepted by [`RecursiveGaussian::new`].
///
/// Beyond it the `f32` recursions accumulate enough rounding error that the
/// impulse response drifts away from the gaussian.
pub const MAX_SIGMA: f64 = 200.0;

/// Precomputed state of the recursive gaussian for one sigma.
///
/// The value is immutable and may be shared by any number of concurrent
/// [`fast_gaussian_1d`](crate::fast::fast_gaussian_1d) and
/// [`fast_gaussian`](crate::fast::fast_gaussian) calls using the same sigma.
///
/// Every table holds one group of four lanes per section so a whole group can
/// be loaded as one vector.
#[derive(Clone, Debug, PartialEq)]
#[repr(C, align(16))]
pub struct RecursiveGaussian {
    // Per section, broadcast to all lanes. Used only for the column pass.
    pub(crate) n2: [[f32; LANES]; SECTIONS],
    pub(crate) d1: [[f32; LANES]; SECTIONS],

    // The row pass is unrolled 4x, one output per lane. These are each lane's
    // multiplier for the previous output (relative to the first of the four).
    pub(crate) mul_prev: [[f32; LANES]; SECTIONS],
    // Ditto for the second to last output.
    pub(crate) mul_prev2: [[f32; LANES]; SECTIONS],

    // Lane j multiplies input k <= j by mul_in[j - k]; lane 0 only sees input 0.
    pub(crate) mul_in: [[f32; LANES]; SECTIONS],

    pub(crate) radius: usize,
    sigma: f64,
}

impl RecursiveGaussian {
    /// Derive the recursive filter for `sigma`.
    ///
    /// # Arguments
    ///
    /// * `sigma` - The sigma of the gaussian in pixels, in `(0, MAX_SIGMA]`.
    ///
    /// The impulse response stays within 2% of the kernel peak for
    /// `1 <= sigma <= MAX_SIGMA` and within 10% for `0.1 <= sigma < 1`.
    /// Sigmas below 0.1 are accepted but approximate the gaussian coarsely.
    ///
    /// # Errors
    ///
    /// Returns [`BlurError::InvalidSigma`] for a non-positive or non-finite
    /// sigma, [`BlurError::SigmaTooLarge`] above [`MAX_SIGMA`] and
    /// [`BlurError::UnstableCoefficients`] if the weights cannot be solved for.
    ///
    /// # Example
    ///
    /// ```
    /// use planeblur_filter::recursive::RecursiveGaussian;
    ///
    /// let rg = RecursiveGaussian::new(1.5).unwrap();
    /// assert_eq!(rg.radius(), 5);
    /// ```
    pub fn new(sigma: f64) -> Result<Self, BlurError> {
        if !(sigma > 0.0) || !sigma.is_finite() {
            return Err(BlurError::InvalidSigma(sigma));
        }
        if sigma > MAX_SIGMA {
            return Err(BlurError::SigmaTooLarge(sigma, MAX_SIGMA));
        }

        // (57), "N". Below two the cosine system degenerates.
        let radius = (3.2795 * sigma + 0.2546).round().max(2.0);

        // Table I, first row
        let pi_div_2r = std::f64::consts::PI / (2.0 * radius);
        let omega = [pi_div_2r, 3.0 * pi_div_2r, 5.0 * pi_div_2r];

        // (37), k={1,3,5}
        let p_1 = 1.0 / (0.5 * omega[0]).tan();
        let p_3 = -1.0 / (0.5 * omega[1]).tan();
        let p_5 = 1.0 / (0.5 * omega[2]).tan();

        // (44), k={1,3,5}
        let r_1 = p_1 * p_1 / omega[0].sin();
        let r_3 = -p_3 * p_3 / omega[1].sin();
        let r_5 = p_5 * p_5 / omega[2].sin();

        // (50), k={1,3,5}
        let neg_half_sigma2 = -0.5 * sigma * sigma;
        let recip_radius = 1.0 / radius;
        let rho = omega.map(|w| (neg_half_sigma2 * w * w).exp() * recip_radius);

        // second part of (52), k1,k2 = 1,3; 3,5; 5,1
        let d_13 = p_1 * r_3 - r_1 * p_3;
        let d_35 = p_3 * r_5 - r_3 * p_5;
        let d_51 = p_5 * r_1 - r_5 * p_1;

        // (52), k=5
        let recip_d13 = 1.0 / d_13;
        let zeta_15 = d_35 * recip_d13;
        let zeta_35 = d_51 * recip_d13;

        // (56)
        let a = [[p_1, p_3, p_5], [r_1, r_3, r_5], [zeta_15, zeta_35, 1.0]];
        // (55)
        let gamma = [
            1.0,
            radius * radius - sigma * sigma,
            zeta_15 * rho[0] + zeta_35 * rho[1] + rho[2],
        ];
        // (53)
        let beta = solve_3x3(&a, &gamma).ok_or(BlurError::UnstableCoefficients(sigma))?;

        // (39), the weights of a gaussian integrate to one
        let dc_gain = beta[0] * p_1 + beta[1] * p_3 + beta[2] * p_5;
        if (dc_gain - 1.0).abs() > 1e-9 {
            return Err(BlurError::UnstableCoefficients(sigma));
        }

        let mut rg = Self {
            n2: [[0.0; LANES]; SECTIONS],
            d1: [[0.0; LANES]; SECTIONS],
            mul_prev: [[0.0; LANES]; SECTIONS],
            mul_prev2: [[0.0; LANES]; SECTIONS],
            mul_in: [[0.0; LANES]; SECTIONS],
            radius: radius as usize,
            sigma,
        };

        for i in 0..SECTIONS {
            // (33)
            let n2 = -beta[i] * (omega[i] * (radius + 1.0)).cos();
            let d1 = -2.0 * omega[i].cos();
            let d_2 = d1 * d1;

            rg.n2[i] = [n2 as f32; LANES];
            rg.d1[i] = [d1 as f32; LANES];

            // Four consecutive steps of o = n2 * i - d1 * p - pp, expanded:
            //   o0 = n2 i0 - d1 p - pp
            //   o1 = n2 i1 - d1 o0 - p
            //   o2 = n2 i2 - d1 o1 - o0
            //   o3 = n2 i3 - d1 o2 - o1
            // and gathered by p (prev), pp (prev2) and the inputs.
            rg.mul_prev[i] = [
                -d1,
                d_2 - 1.0,
                -d_2 * d1 + 2.0 * d1,
                d_2 * d_2 - 3.0 * d_2 + 1.0,
            ]
            .map(|v| v as f32);
            rg.mul_prev2[i] = [-1.0, d1, -d_2 + 1.0, d_2 * d1 - 2.0 * d1].map(|v| v as f32);
            rg.mul_in[i] = [
                n2,
                -d1 * n2,
                d_2 * n2 - n2,
                -d_2 * d1 * n2 + 2.0 * d1 * n2,
            ]
            .map(|v| v as f32);
        }

        log::debug!("recursive gaussian: sigma={sigma} radius={}", rg.radius);

        Ok(rg)
    }

    /// The sigma the coefficients were derived for.
    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Number of samples `N` an output reaches on each side.
    ///
    /// Output `n` reads inputs `n - N - 1` and `n + N - 1`, so the first and
    /// last `N` outputs of a row depend on zero padding.
    pub fn radius(&self) -> usize {
        self.radius
    }
}

/// Solves `a * x = b` through the adjugate of `a`.
fn solve_3x3(a: &[[f64; 3]; 3], b: &[f64; 3]) -> Option<[f64; 3]> {
    let [[a00, a01, a02], [a10, a11, a12], [a20, a21, a22]] = *a;

    let c00 = a11 * a22 - a12 * a21;
    let c01 = a12 * a20 - a10 * a22;
    let c02 = a10 * a21 - a11 * a20;

    let det = a00 * c00 + a01 * c01 + a02 * c02;
    if det == 0.0 || !det.is_finite() {
        return None;
    }
    let recip_det = 1.0 / det;

    let inv = [
        [c00, a02 * a21 - a01 * a22, a01 * a12 - a02 * a11],
        [c01, a00 * a22 - a02 * a20, a02 * a10 - a00 * a12],
        [c02, a01 * a20 - a00 * a21, a00 * a11 - a01 * a10],
    ];

    Some(inv.map(|row| (row[0] * b[0] + row[1] * b[1] + row[2] * b[2]) * recip_det))
}
