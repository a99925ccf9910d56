//! A spin configuration bundled with the look-up table describing it.

use num_complex::Complex64;

use super::traits::SpinWfn;
use crate::error::VmcError;
use crate::hamiltonian::FlipSet;

/// Spin configuration and its look-up table, kept in sync.
///
/// The only way to change the spins is [`SpinState::apply`], which updates the
/// table from the pre-flip spins and then toggles them. Moves are [`FlipSet`]s,
/// so a site never appears twice; sites outside the configuration are refused.
pub struct SpinState<'a, W: SpinWfn> {
    wfn: &'a W,
    spins: Vec<i8>,
    lookup: W::Lookup,
}

impl<'a, W: SpinWfn> SpinState<'a, W> {
    /// Take ownership of `spins` and build its look-up table.
    pub fn new(wfn: &'a W, spins: Vec<i8>) -> Result<Self, VmcError> {
        if spins.len() != wfn.n_spins() {
            return Err(VmcError::Load(format!(
                "configuration has {} spins but the wavefunction has {} visible units",
                spins.len(),
                wfn.n_spins()
            )));
        }
        if let Some(bad) = spins.iter().find(|&&s| s != 1 && s != -1) {
            return Err(VmcError::Precondition(format!("spin value {bad} is not +1 or -1")));
        }
        let lookup = wfn.init_lookup(&spins);
        Ok(Self { wfn, spins, lookup })
    }

    pub fn spins(&self) -> &[i8] {
        &self.spins
    }

    pub fn len(&self) -> usize {
        self.spins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spins.is_empty()
    }

    pub fn magnetization(&self) -> i64 {
        self.spins.iter().map(|&s| i64::from(s)).sum()
    }

    pub fn lookup(&self) -> &W::Lookup {
        &self.lookup
    }

    fn check_sites(&self, flips: FlipSet) -> Result<(), VmcError> {
        match flips.as_slice().iter().find(|&&site| site >= self.spins.len()) {
            Some(site) => Err(VmcError::Precondition(format!(
                "site {site} is outside a configuration of {} spins",
                self.spins.len()
            ))),
            None => Ok(()),
        }
    }

    /// `ln(Ψ(s') / Ψ(s))` for the current configuration.
    pub fn log_pop(&self, flips: FlipSet) -> Result<Complex64, VmcError> {
        self.check_sites(flips)?;
        Ok(self.wfn.log_pop(&self.spins, &self.lookup, flips.as_slice()))
    }

    pub fn pop(&self, flips: FlipSet) -> Result<Complex64, VmcError> {
        Ok(self.log_pop(flips)?.exp())
    }

    /// Flip the sites in `flips`, keeping the look-up table consistent.
    ///
    /// Nothing changes when a site is out of range.
    pub fn apply(&mut self, flips: FlipSet) -> Result<(), VmcError> {
        self.check_sites(flips)?;
        self.wfn.update_lookup(&mut self.lookup, &self.spins, flips.as_slice());
        for &site in flips.as_slice() {
            self.spins[site] = -self.spins[site];
        }
        Ok(())
    }

    /// Recompute the table from scratch and compare with the maintained one.
    pub fn verify_lookup(&self, tol: f64) -> Result<(), VmcError> {
        let fresh = self.wfn.init_lookup(&self.spins);
        let drift = self.wfn.lookup_distance(&fresh, &self.lookup);
        if drift > tol || drift.is_nan() {
            return Err(VmcError::InvariantViolation(format!(
                "look-up table drifted by {drift:e} from the configuration (tolerance {tol:e})"
            )));
        }
        Ok(())
    }
}
