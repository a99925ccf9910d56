use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use nqs_vmc::{model_from_filename, read_rbm, read_run_config, MonteCarloSampler, RunConfig, RunParams, SpinWfn, VmcError};

/// Energy of a pretrained neural-network quantum state by Variational Monte Carlo.
///
/// The weight file name selects the Hamiltonian ("Ising", "Heisenberg1d" or
/// "Heisenberg2d") and its coupling, given as the third `_`-separated token.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Weight file of the RBM wavefunction
    #[arg(long)]
    filename: String,

    /// Number of production sweeps
    #[arg(long, default_value_t = 1.0e4)]
    nsweeps: f64,

    /// Random seed; negative values seed from the system clock
    #[arg(long, default_value_t = -1, allow_hyphen_values = true)]
    seed: i64,

    /// Append every sampled configuration to this file
    #[arg(long)]
    filestates: Option<PathBuf>,

    /// YAML file with further sampling settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn run(args: &Args) -> Result<(), VmcError> {
    let config = match &args.config {
        Some(path) => read_run_config(path)?,
        None => RunConfig::default(),
    };

    let wavefunction = read_rbm(&args.filename)?;
    let hamiltonian = model_from_filename(&args.filename, wavefunction.n_spins(), config.periodic())?;

    let seed = u64::try_from(args.seed).ok();
    let mut sampler = MonteCarloSampler::new(&wavefunction, &hamiltonian, seed)?;
    if let Some(path) = &args.filestates {
        sampler.set_file_states(path)?;
    }

    let params = config.apply(RunParams::default().with_n_sweeps(args.nsweeps as usize));
    let results = sampler.run(&params)?;

    info!(seed = results.seed, acceptance = results.acceptance, "done");
    println!("{}", results.report);
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    let log_level_filter = args
        .log_level
        .parse::<tracing_subscriber::filter::LevelFilter>()
        .unwrap_or(tracing_subscriber::filter::LevelFilter::INFO);

    tracing_subscriber::fmt()
        .with_max_level(log_level_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
