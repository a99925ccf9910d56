//! Wave function traits for spin systems.
//!
//! `SpinWfn` is the capability the sampler and the energy estimator need from a
//! variational state: full evaluation of `ln Ψ(s)` and cheap ratios
//! `ln Ψ(s') / Ψ(s)` through a cached look-up table.

use num_complex::Complex64;

/// Variational wavefunction over configurations of ±1 spins.
pub trait SpinWfn {
    /// Per-configuration cache that makes `log_pop` cheap.
    type Lookup;

    /// Number of spins (visible units).
    fn n_spins(&self) -> usize;

    /// Evaluate `ln Ψ(spins)` from scratch.
    fn log_value(&self, spins: &[i8]) -> Complex64;

    /// Build the look-up table for `spins` from scratch.
    fn init_lookup(&self, spins: &[i8]) -> Self::Lookup;

    /// `ln(Ψ(s') / Ψ(s))` where `s'` is `spins` with the sites in `flips` flipped.
    ///
    /// `lookup` must describe `spins`. An empty `flips` yields exactly zero.
    fn log_pop(&self, spins: &[i8], lookup: &Self::Lookup, flips: &[usize]) -> Complex64;

    /// Update `lookup` for flipping `flips`, reading the *pre-flip* values in `spins`.
    ///
    /// Callers outside this module should go through
    /// [`SpinState::apply`](super::SpinState::apply), which also toggles the spins.
    fn update_lookup(&self, lookup: &mut Self::Lookup, spins: &[i8], flips: &[usize]);

    /// Largest absolute difference between two look-up tables.
    fn lookup_distance(&self, a: &Self::Lookup, b: &Self::Lookup) -> f64;

    /// `Ψ(s') / Ψ(s)`.
    fn pop(&self, spins: &[i8], lookup: &Self::Lookup, flips: &[usize]) -> Complex64 {
        self.log_pop(spins, lookup, flips).exp()
    }

    /// Same ratio as `log_pop`, evaluated with two full evaluations.
    fn log_pop_exact(&self, spins: &[i8], flips: &[usize]) -> Complex64 {
        let mut flipped = spins.to_vec();
        for &site in flips {
            flipped[site] = -flipped[site];
        }
        self.log_value(&flipped) - self.log_value(spins)
    }
}
