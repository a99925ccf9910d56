//! Metropolis-Hastings sampling of |Ψ|² over spin configurations.
//!
//! One sampler drives one Markov chain. It owns the configuration (through a
//! [`SpinState`]), the random number stream and the acceptance counters; the
//! wavefunction and the Hamiltonian are only borrowed.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use super::stats::{EnergyEstimator, EnergyReport, DEFAULT_N_BLOCKS};
use crate::error::VmcError;
use crate::hamiltonian::{FlipSet, Hamiltonian};
use crate::wavefunction::{SpinState, SpinWfn};

/// Minimum number of production sweeps accepted by [`MonteCarloSampler::run`].
pub const MIN_SWEEPS: usize = 50;

/// Largest drift tolerated between the maintained and a fresh look-up table.
const LOOKUP_TOLERANCE: f64 = 1e-6;

/// Parameters of a sampling run.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RunParams {
    /// Production sweeps, each giving one energy sample.
    pub n_sweeps: usize,
    /// Fraction of `n_sweeps` run and discarded before production.
    pub therm_factor: f64,
    /// Moves per sweep, in units of the number of spins.
    pub sweep_factor: usize,
    /// Spins flipped per move; the Hamiltonian's minimum when `None`.
    pub n_flips: Option<usize>,
    /// Keep the total magnetization at zero; on for two-spin moves when `None`.
    pub zero_magnetization: Option<bool>,
    /// Bins of the final binning analysis.
    pub n_blocks: usize,
}

impl Default for RunParams {
    fn default() -> Self {
        Self {
            n_sweeps: 10_000,
            therm_factor: 0.1,
            sweep_factor: 1,
            n_flips: None,
            zero_magnetization: None,
            n_blocks: DEFAULT_N_BLOCKS,
        }
    }
}

impl RunParams {
    pub fn with_n_sweeps(mut self, n: usize) -> Self {
        self.n_sweeps = n;
        self
    }

    pub fn with_therm_factor(mut self, f: f64) -> Self {
        self.therm_factor = f;
        self
    }

    pub fn with_n_flips(mut self, n: usize) -> Self {
        self.n_flips = Some(n);
        self
    }

    pub fn with_n_blocks(mut self, n: usize) -> Self {
        self.n_blocks = n;
        self
    }

    pub fn with_zero_magnetization(mut self, on: bool) -> Self {
        self.zero_magnetization = Some(on);
        self
    }

    /// Check the parameters and resolve the defaults that depend on the Hamiltonian.
    pub fn resolve(&self, min_flips: usize) -> Result<Proposal, VmcError> {
        let n_flips = self.n_flips.unwrap_or(min_flips);
        if !(1..=2).contains(&n_flips) {
            return Err(VmcError::Configuration(format!(
                "the number of spin flips should be 1 or 2, got {n_flips}"
            )));
        }
        if !(0.0..=1.0).contains(&self.therm_factor) {
            return Err(VmcError::Configuration(format!(
                "the thermalization factor should be between 0 and 1, got {}",
                self.therm_factor
            )));
        }
        if self.n_sweeps < MIN_SWEEPS {
            return Err(VmcError::Configuration(format!(
                "please use at least {MIN_SWEEPS} sweeps, got {}",
                self.n_sweeps
            )));
        }
        if self.sweep_factor == 0 {
            return Err(VmcError::Configuration("the sweep factor should be at least 1".into()));
        }
        if self.n_blocks < 2 || self.n_blocks > self.n_sweeps {
            return Err(VmcError::Configuration(format!(
                "the number of bins should be between 2 and the number of sweeps ({}), got {}",
                self.n_sweeps, self.n_blocks
            )));
        }
        Ok(Proposal {
            n_flips,
            zero_magnetization: self.zero_magnetization.unwrap_or(n_flips == 2),
        })
    }

    /// Sweeps discarded before production.
    pub fn n_thermalization(&self) -> usize {
        (self.n_sweeps as f64 * self.therm_factor).floor() as usize
    }
}

/// How single Metropolis moves are proposed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Proposal {
    pub n_flips: usize,
    pub zero_magnetization: bool,
}

/// Accepted and attempted moves since the last reset.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct AcceptanceStats {
    pub accepted: u64,
    pub attempted: u64,
}

impl AcceptanceStats {
    /// Fraction of accepted moves, 0 before any attempt.
    pub fn ratio(&self) -> f64 {
        if self.attempted == 0 {
            0.0
        } else {
            self.accepted as f64 / self.attempted as f64
        }
    }
}

/// Results of a sampling run.
#[derive(Clone, Debug)]
pub struct VmcResults {
    pub report: EnergyReport,
    /// Acceptance over the production sweeps.
    pub acceptance: f64,
    /// Local energy after every production sweep.
    pub energies: Vec<Complex64>,
    pub final_spins: Vec<i8>,
    /// Seed the random stream was started from.
    pub seed: u64,
}

/// Seed from `seed`, or from the wall clock when absent.
fn seeded_rng(seed: Option<u64>) -> (StdRng, u64) {
    let seed = seed.unwrap_or_else(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default()
    });
    (StdRng::seed_from_u64(seed), seed)
}

fn write_state<O: Write + ?Sized>(out: &mut O, spins: &[i8]) -> std::io::Result<()> {
    for s in spins {
        write!(out, "{s:>2} ")?;
    }
    writeln!(out)
}

/// Single-chain Metropolis-Hastings sampler.
pub struct MonteCarloSampler<'a, W: SpinWfn, H: Hamiltonian> {
    wavefunction: &'a W,
    hamiltonian: &'a H,
    n_spins: usize,
    seed: Option<u64>,
    rng: StdRng,
    state: Option<SpinState<'a, W>>,
    stats: AcceptanceStats,
    states_out: Option<Box<dyn Write + 'a>>,
}

impl<'a, W: SpinWfn, H: Hamiltonian> MonteCarloSampler<'a, W, H> {
    /// Sampler for `wavefunction` and `hamiltonian`; `seed = None` seeds from the clock.
    pub fn new(wavefunction: &'a W, hamiltonian: &'a H, seed: Option<u64>) -> Result<Self, VmcError> {
        let n_spins = wavefunction.n_spins();
        if n_spins == 0 {
            return Err(VmcError::Load("the wavefunction has no visible units".into()));
        }
        if hamiltonian.n_sites() != n_spins {
            return Err(VmcError::Load(format!(
                "the Hamiltonian acts on {} sites but the wavefunction has {n_spins} spins",
                hamiltonian.n_sites()
            )));
        }
        let (rng, _) = seeded_rng(seed);
        Ok(Self {
            wavefunction,
            hamiltonian,
            n_spins,
            seed,
            rng,
            state: None,
            stats: AcceptanceStats::default(),
            states_out: None,
        })
    }

    /// Append every production configuration to `writer`, one line per sweep.
    pub fn set_state_writer(&mut self, writer: Box<dyn Write + 'a>) {
        self.states_out = Some(writer);
    }

    /// Append every production configuration to the file at `path`.
    pub fn set_file_states(&mut self, path: &Path) -> Result<(), VmcError> {
        let file = File::create(path)?;
        info!(path = %path.display(), "saving sampled configurations");
        self.set_state_writer(Box::new(BufWriter::new(file)));
        Ok(())
    }

    pub fn n_spins(&self) -> usize {
        self.n_spins
    }

    pub fn state(&self) -> Option<&SpinState<'a, W>> {
        self.state.as_ref()
    }

    pub fn stats(&self) -> AcceptanceStats {
        self.stats
    }

    /// Fraction of accepted moves since the last reset.
    pub fn acceptance(&self) -> f64 {
        self.stats.ratio()
    }

    pub fn reset_stats(&mut self) {
        self.stats = AcceptanceStats::default();
    }

    /// Draw a fresh random configuration and rebuild the look-up table.
    ///
    /// With `zero_magnetization`, randomly chosen majority spins are flipped
    /// until the total magnetization vanishes.
    pub fn init_random_state(&mut self, zero_magnetization: bool) -> Result<(), VmcError> {
        let n = self.n_spins;
        if zero_magnetization && n % 2 == 1 {
            return Err(VmcError::Precondition(format!(
                "cannot prepare a state with zero magnetization on an odd number of spins ({n})"
            )));
        }

        let mut spins: Vec<i8> = (0..n)
            .map(|_| if self.rng.gen::<f64>() < 0.5 { -1 } else { 1 })
            .collect();

        if zero_magnetization {
            let mut magnetization: i64 = spins.iter().map(|&s| i64::from(s)).sum();
            while magnetization != 0 {
                let majority: i8 = if magnetization > 0 { 1 } else { -1 };
                let mut site = self.rng.gen_range(0..n);
                while spins[site] != majority {
                    site = self.rng.gen_range(0..n);
                }
                spins[site] = -majority;
                magnetization -= 2 * i64::from(majority);
            }
        }

        self.state = Some(SpinState::new(self.wavefunction, spins)?);
        Ok(())
    }

    /// One Metropolis move on the current configuration. Returns whether it was accepted.
    pub fn propose_and_move(&mut self, proposal: Proposal) -> Result<bool, VmcError> {
        if !(1..=2).contains(&proposal.n_flips) {
            return Err(VmcError::Configuration(format!(
                "the number of spin flips should be 1 or 2, got {}",
                proposal.n_flips
            )));
        }
        let state = self.state.as_mut().ok_or_else(no_state)?;
        Self::metropolis_step(&mut self.rng, state, proposal, &mut self.stats)
    }

    /// `n_spins * sweep_factor` moves.
    pub fn sweep(&mut self, proposal: Proposal, sweep_factor: usize) -> Result<(), VmcError> {
        let state = self.state.as_mut().ok_or_else(no_state)?;
        for _ in 0..self.n_spins * sweep_factor {
            Self::metropolis_step(&mut self.rng, state, proposal, &mut self.stats)?;
        }
        Ok(())
    }

    /// Two-spin proposals drawing the same site, or two equal spins under zero
    /// magnetization, are rejected without evaluating the amplitude.
    fn metropolis_step(
        rng: &mut StdRng,
        state: &mut SpinState<'a, W>,
        proposal: Proposal,
        stats: &mut AcceptanceStats,
    ) -> Result<bool, VmcError> {
        stats.attempted += 1;

        let n = state.len();
        let first = rng.gen_range(0..n);
        let flips = if proposal.n_flips == 2 {
            let second = rng.gen_range(0..n);
            let spins = state.spins();
            if proposal.zero_magnetization && spins[first] == spins[second] {
                return Ok(false);
            }
            match FlipSet::pair(first, second) {
                Some(flips) => flips,
                None => return Ok(false),
            }
        } else {
            FlipSet::single(first)
        };

        let acceptance = state.pop(flips)?.norm_sqr();
        if acceptance > rng.gen::<f64>() {
            state.apply(flips)?;
            stats.accepted += 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Run the full sampling: thermalization, production and binning analysis.
    pub fn run(&mut self, params: &RunParams) -> Result<VmcResults, VmcError> {
        let proposal = params.resolve(self.hamiltonian.min_flips())?;

        let (rng, seed) = seeded_rng(self.seed);
        self.rng = rng;
        info!(
            n_sweeps = params.n_sweeps,
            n_flips = proposal.n_flips,
            zero_magnetization = proposal.zero_magnetization,
            seed,
            "starting Monte Carlo sampling"
        );

        self.init_random_state(proposal.zero_magnetization)?;
        self.reset_stats();

        let n_therm = params.n_thermalization();
        info!(n_therm, "thermalization");
        for _ in 0..n_therm {
            self.sweep(proposal, params.sweep_factor)?;
        }
        self.reset_stats();

        info!("sweeping");
        let mut estimator = EnergyEstimator::with_capacity(params.n_blocks, params.n_sweeps);
        for _ in 0..params.n_sweeps {
            self.sweep(proposal, params.sweep_factor)?;
            let state = self.state.as_ref().ok_or_else(no_state)?;
            if let Some(out) = self.states_out.as_mut() {
                write_state(out, state.spins())?;
            }
            estimator.measure(self.hamiltonian, state)?;
        }
        if let Some(out) = self.states_out.as_mut() {
            out.flush()?;
        }

        let state = self.state.as_ref().ok_or_else(no_state)?;
        state.verify_lookup(LOOKUP_TOLERANCE)?;
        let final_spins = state.spins().to_vec();

        let report = estimator.report(self.n_spins)?;
        let acceptance = self.acceptance();
        info!(acceptance, "sampling done");

        Ok(VmcResults {
            report,
            acceptance,
            energies: estimator.into_trace(),
            final_spins,
            seed,
        })
    }
}

fn no_state() -> VmcError {
    VmcError::Precondition("no spin configuration yet, call init_random_state first".into())
}
