use std::{io::Write, path::PathBuf};

use clap::Parser;

mod backend;
mod config;
mod datatypes;
mod error;
mod femm;
mod geometry;
mod model;
mod post_processor;
mod regions;

use crate::{
    backend::SolverBackend,
    config::RunConfig,
    error::MotorError,
    femm::FemmSession,
};

/// Builds a permanent-magnet machine cross-section in FEMM, solves it and
/// reports the back-iron flux density and coil current density
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Machine parameters, circuits and windings as json
    #[arg(long)]
    params: Option<String>,

    /// FEMM executable
    #[arg(long, default_value = "femm")]
    femm: String,

    /// Directory for the project, script and result files
    #[arg(long, default_value = ".")]
    workdir: PathBuf,

    /// Write the FEMM script and stop before solving
    #[arg(long)]
    script_only: bool,

    /// Also write the results to this json file
    #[arg(long)]
    report: Option<PathBuf>,

    /// Log debug detail
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "{}: {}",
                record.level().as_str().to_lowercase(),
                record.args()
            )
        })
        .init();
}

fn run(cli: &Cli) -> Result<(), MotorError> {
    let config = match &cli.params {
        Some(path) => config::load(path)?,
        None => RunConfig::default(),
    };

    let mut session = FemmSession::open(&cli.femm, &cli.workdir)?;
    let model = model::prepare(&config, &mut session)?;
    log::info!(
        "model ready: {} teeth, {} coil labels",
        model.geometry.teeth.len(),
        model.regions.coils().count()
    );

    if cli.script_only {
        session.keep_script();
        let path = session.write_script()?;
        log::info!("wrote FEMM script to {}", path.display());
        return Ok(());
    }

    session.execute()?;

    let results = post_processor::read_results(&cli.workdir)?;

    println!(
        "Bc_mean = {} J = {}",
        results.back_iron_flux_density, results.coil_current_density
    );

    if let Some(report) = &cli.report {
        post_processor::write_report(&results, report)?;
    }

    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(err) = run(&cli) {
        log::error!("{err}");
        std::process::exit(1);
    }
}
