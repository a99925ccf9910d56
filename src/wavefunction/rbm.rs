//! Restricted Boltzmann machine wavefunction.
//!
//! With visible biases `a`, hidden biases `b` and weights `W` (Nv × Nh), the
//! amplitude of a spin configuration `s` is
//!
//! ```text
//! ln Ψ(s) = Σ_v a_v s_v + Σ_h ln cosh(θ_h),    θ_h = b_h + Σ_v s_v W_vh
//! ```
//!
//! The vector θ is the look-up table: once known for `s`, the ratio for a
//! configuration differing in a few spins costs O(|flips| · Nh).

use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;
use rand::Rng;
use rand_distr::{Distribution, Normal};

use super::traits::SpinWfn;
use crate::error::VmcError;

/// Independent normal real and imaginary parts.
struct ComplexNormal(Normal<f64>);

impl Distribution<Complex64> for ComplexNormal {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Complex64 {
        Complex64::new(self.0.sample(rng), self.0.sample(rng))
    }
}

/// Beyond this |x|, `ln cosh x` is replaced by its asymptote `|x| - ln 2`.
const LNCOSH_CUTOFF: f64 = 12.0;

/// `ln cosh x` for real `x`, safe against overflow of `cosh`.
pub fn ln_cosh_real(x: f64) -> f64 {
    let xp = x.abs();
    if xp <= LNCOSH_CUTOFF {
        xp.cosh().ln()
    } else {
        xp - std::f64::consts::LN_2
    }
}

/// `ln cosh z` for complex `z = x + iy`.
///
/// Uses `cosh(x + iy) = cosh x (cos y + i tanh x sin y)` so the modulus goes
/// through [`ln_cosh_real`] and only a bounded number reaches the complex log.
pub fn ln_cosh(z: Complex64) -> Complex64 {
    let (x, y) = (z.re, z.im);
    let phase = Complex64::new(y.cos(), x.tanh() * y.sin());
    Complex64::new(ln_cosh_real(x), 0.0) + phase.ln()
}

/// Pretrained RBM parameters. Immutable once built.
#[derive(Clone, Debug)]
pub struct Rbm {
    visible_bias: DVector<Complex64>,
    hidden_bias: DVector<Complex64>,
    weights: DMatrix<Complex64>,
}

impl Rbm {
    /// Assemble a model, checking that the shapes agree.
    pub fn new(
        visible_bias: DVector<Complex64>,
        hidden_bias: DVector<Complex64>,
        weights: DMatrix<Complex64>,
    ) -> Result<Self, VmcError> {
        if weights.nrows() != visible_bias.len() || weights.ncols() != hidden_bias.len() {
            return Err(VmcError::Load(format!(
                "weight matrix is {}x{} but there are {} visible and {} hidden biases",
                weights.nrows(),
                weights.ncols(),
                visible_bias.len(),
                hidden_bias.len()
            )));
        }
        Ok(Self { visible_bias, hidden_bias, weights })
    }

    /// Random parameters with real and imaginary parts drawn from N(0, sigma).
    pub fn random<R: Rng + ?Sized>(
        n_visible: usize,
        n_hidden: usize,
        sigma: f64,
        rng: &mut R,
    ) -> Result<Self, VmcError> {
        let normal = Normal::new(0.0, sigma)
            .map_err(|e| VmcError::Configuration(format!("invalid parameter width {sigma}: {e}")))?;
        let dist = ComplexNormal(normal);
        let visible_bias = DVector::from_distribution(n_visible, &dist, &mut *rng);
        let hidden_bias = DVector::from_distribution(n_hidden, &dist, &mut *rng);
        let weights = DMatrix::from_distribution(n_visible, n_hidden, &dist, rng);
        Self::new(visible_bias, hidden_bias, weights)
    }

    pub fn n_visible(&self) -> usize {
        self.visible_bias.len()
    }

    pub fn n_hidden(&self) -> usize {
        self.hidden_bias.len()
    }

    pub fn visible_bias(&self) -> &DVector<Complex64> {
        &self.visible_bias
    }

    pub fn hidden_bias(&self) -> &DVector<Complex64> {
        &self.hidden_bias
    }

    pub fn weights(&self) -> &DMatrix<Complex64> {
        &self.weights
    }

    fn spins_as_vector(spins: &[i8]) -> DVector<Complex64> {
        DVector::from_iterator(
            spins.len(),
            spins.iter().map(|&s| Complex64::new(f64::from(s), 0.0)),
        )
    }
}

impl SpinWfn for Rbm {
    type Lookup = DVector<Complex64>;

    fn n_spins(&self) -> usize {
        self.n_visible()
    }

    fn log_value(&self, spins: &[i8]) -> Complex64 {
        let s = Self::spins_as_vector(spins);
        let theta = &self.hidden_bias + self.weights.tr_mul(&s);
        let bias_term: Complex64 = self
            .visible_bias
            .iter()
            .zip(spins)
            .map(|(&a, &sv)| a * f64::from(sv))
            .sum();
        bias_term + theta.iter().map(|&t| ln_cosh(t)).sum::<Complex64>()
    }

    fn init_lookup(&self, spins: &[i8]) -> DVector<Complex64> {
        let s = Self::spins_as_vector(spins);
        &self.hidden_bias + self.weights.tr_mul(&s)
    }

    fn log_pop(&self, spins: &[i8], lookup: &DVector<Complex64>, flips: &[usize]) -> Complex64 {
        if flips.is_empty() {
            return Complex64::new(0.0, 0.0);
        }

        let mut logpop = Complex64::new(0.0, 0.0);
        for &flip in flips {
            logpop -= self.visible_bias[flip] * (2.0 * f64::from(spins[flip]));
        }

        for (h, &theta) in lookup.iter().enumerate() {
            let mut theta_new = theta;
            for &flip in flips {
                theta_new -= self.weights[(flip, h)] * (2.0 * f64::from(spins[flip]));
            }
            logpop += ln_cosh(theta_new) - ln_cosh(theta);
        }
        logpop
    }

    fn update_lookup(&self, lookup: &mut DVector<Complex64>, spins: &[i8], flips: &[usize]) {
        for &flip in flips {
            let factor = 2.0 * f64::from(spins[flip]);
            for (theta, w) in lookup.iter_mut().zip(self.weights.row(flip).iter()) {
                *theta -= *w * factor;
            }
        }
    }

    fn lookup_distance(&self, a: &DVector<Complex64>, b: &DVector<Complex64>) -> f64 {
        a.iter()
            .zip(b.iter())
            .map(|(&x, &y)| (x - y).norm())
            .fold(0.0, f64::max)
    }
}
