//! Local-energy measurement and binning analysis.

use std::fmt;

use num_complex::Complex64;

use crate::error::VmcError;
use crate::hamiltonian::{Hamiltonian, MatrixElements};
use crate::wavefunction::{SpinState, SpinWfn};

/// Default number of bins of the binning analysis.
pub const DEFAULT_N_BLOCKS: usize = 50;

/// Local energy `Σ <s'|H|s> Ψ(s')/Ψ(s)` on the current configuration.
pub fn local_energy<W: SpinWfn>(
    state: &SpinState<'_, W>,
    elements: &MatrixElements,
) -> Result<Complex64, VmcError> {
    elements
        .iter()
        .map(|e| Ok(e.value * state.pop(e.flips)?))
        .sum()
}

/// Welford running mean and variance.
#[derive(Clone, Debug, Default)]
pub struct RunningStats {
    n: usize,
    mean: f64,
    m2: f64,
}

impl RunningStats {
    pub fn push(&mut self, x: f64) {
        self.n += 1;
        let delta = x - self.mean;
        self.mean += delta / self.n as f64;
        let delta2 = x - self.mean;
        self.m2 += delta * delta2;
    }

    pub fn count(&self) -> usize {
        self.n
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn variance_unbiased(&self) -> f64 {
        if self.n < 2 {
            0.0
        } else {
            self.m2 / (self.n as f64 - 1.0)
        }
    }
}

/// Result of the binning analysis of an energy trace.
#[derive(Clone, Debug, PartialEq)]
pub struct EnergyReport {
    /// Mean energy per site.
    pub energy_per_site: f64,
    /// Standard error of `energy_per_site`.
    pub error: f64,
    pub n_blocks: usize,
    pub block_size: usize,
    /// Mean of the block means (total, not per site).
    pub blocked_mean: f64,
    /// Variance of the block means.
    pub blocked_variance: f64,
    /// Variance of the individual samples.
    pub unblocked_variance: f64,
    pub autocorrelation_time: f64,
    pub n_samples: usize,
}

/// Bin `trace` into `n_blocks` blocks and estimate the energy per site.
///
/// Samples left over after the last full block take part in the unblocked
/// variance but not in any block.
pub fn binning_analysis(
    trace: &[Complex64],
    n_blocks: usize,
    n_sites: usize,
) -> Result<EnergyReport, VmcError> {
    if n_blocks < 2 {
        return Err(VmcError::Configuration(format!(
            "binning needs at least 2 blocks, got {n_blocks}"
        )));
    }
    if trace.len() < n_blocks {
        return Err(VmcError::Configuration(format!(
            "{} samples cannot fill {n_blocks} blocks",
            trace.len()
        )));
    }
    if n_sites == 0 {
        return Err(VmcError::Configuration("energy per site of an empty system".into()));
    }

    let block_size = trace.len() / n_blocks;
    let mut blocked = RunningStats::default();
    let mut unblocked = RunningStats::default();

    for block in trace.chunks(block_size).take(n_blocks) {
        let eblock = block.iter().map(|e| e.re).sum::<f64>() / block_size as f64;
        blocked.push(eblock);
    }
    for e in trace {
        unblocked.push(e.re);
    }

    let blocked_variance = blocked.variance_unbiased();
    let unblocked_variance = unblocked.variance_unbiased();
    let autocorrelation_time = if unblocked_variance == 0.0 {
        0.0
    } else {
        0.5 * block_size as f64 * blocked_variance / unblocked_variance
    };

    Ok(EnergyReport {
        energy_per_site: blocked.mean() / n_sites as f64,
        error: (blocked_variance / n_blocks as f64).sqrt() / n_sites as f64,
        n_blocks,
        block_size,
        blocked_mean: blocked.mean(),
        blocked_variance,
        unblocked_variance,
        autocorrelation_time,
        n_samples: trace.len(),
    })
}

/// Collects one local-energy sample per production sweep.
pub struct EnergyEstimator {
    n_blocks: usize,
    trace: Vec<Complex64>,
    elements: MatrixElements,
}

impl EnergyEstimator {
    pub fn new(n_blocks: usize) -> Self {
        Self { n_blocks, trace: Vec::new(), elements: MatrixElements::new() }
    }

    pub fn with_capacity(n_blocks: usize, capacity: usize) -> Self {
        Self { n_blocks, trace: Vec::with_capacity(capacity), elements: MatrixElements::new() }
    }

    /// Measure the local energy of `state` and append it to the trace.
    pub fn measure<W: SpinWfn, H: Hamiltonian>(
        &mut self,
        hamiltonian: &H,
        state: &SpinState<'_, W>,
    ) -> Result<Complex64, VmcError> {
        hamiltonian.find_conn(state.spins(), &mut self.elements);
        let energy = local_energy(state, &self.elements)?;
        self.trace.push(energy);
        Ok(energy)
    }

    pub fn trace(&self) -> &[Complex64] {
        &self.trace
    }

    pub fn into_trace(self) -> Vec<Complex64> {
        self.trace
    }

    pub fn report(&self, n_sites: usize) -> Result<EnergyReport, VmcError> {
        binning_analysis(&self.trace, self.n_blocks, n_sites)
    }
}

/// Scientific notation with a signed exponent of at least two digits, `1.50e-03`.
struct Scientific(f64, usize);

impl fmt::Display for Scientific {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = format!("{:.*e}", self.1, self.0);
        match text.split_once('e') {
            Some((mantissa, exponent)) => {
                let (sign, digits) = match exponent.strip_prefix('-') {
                    Some(digits) => ('-', digits),
                    None => ('+', exponent),
                };
                write!(f, "{mantissa}e{sign}{digits:0>2}")
            }
            None => f.write_str(&text),
        }
    }
}

impl fmt::Display for EnergyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // as many digits as the error resolves, with two guard digits
        let digits = if self.error > 0.0 {
            let exponent = self.error.log10() as i32;
            if exponent < 0 { (2 - exponent) as usize } else { 0 }
        } else {
            6
        };
        writeln!(f, "# Estimated average energy per spin : ")?;
        writeln!(
            f,
            "# {} +/-  {}",
            Scientific(self.energy_per_site, digits),
            Scientific(self.error, 0)
        )?;
        writeln!(
            f,
            "# Error estimated with binning analysis consisting of {} bins ",
            self.n_blocks
        )?;
        writeln!(f, "# Block size is {}", self.block_size)?;
        write!(
            f,
            "# Estimated autocorrelation time is {}",
            Scientific(self.autocorrelation_time, 0)
        )
    }
}
