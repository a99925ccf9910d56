//! Sampling module - Metropolis-Hastings chain and energy statistics.

mod stats;
mod vmc;

pub use stats::{
    binning_analysis, local_energy, EnergyEstimator, EnergyReport, RunningStats, DEFAULT_N_BLOCKS,
};
pub use vmc::{AcceptanceStats, MonteCarloSampler, Proposal, RunParams, VmcResults, MIN_SWEEPS};
