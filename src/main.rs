use anyhow::{bail, Result};
use boxchem::demos;
use boxchem::errors::BoxModelError;
use boxchem::{Configuration, CsvOutput};
use clap::builder::PossibleValuesParser;
use clap::{CommandFactory, Parser};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Exit code for a missing configuration file argument.
const USAGE_ERROR: u8 = 3;

/// Run a box model simulation.
#[derive(Parser, Debug)]
#[command(name = "boxchem", version, about)]
struct Args {
    /// JSON configuration file.
    config: Option<PathBuf>,

    /// Run a bundled example instead of a configuration file.
    #[arg(
        short,
        long,
        value_name = "NAME",
        value_parser = PossibleValuesParser::new(demos::NAMES)
    )]
    example: Option<String>,

    /// CSV file to write results to. Results go to standard output if absent.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write a self-contained copy of the configuration into DIR instead of
    /// running it.
    #[arg(long, value_name = "DIR")]
    preprocess: Option<PathBuf>,

    /// Maximum level of log messages written to standard error.
    #[arg(short, long, default_value = "warn")]
    log_level: Level,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("warning: logging disabled: {e}");
    }

    if args.config.is_none() && args.example.is_none() {
        eprintln!(
            "error: a configuration file is required\n\n{}",
            Args::command().render_usage()
        );
        return ExitCode::from(USAGE_ERROR);
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<BoxModelError>() {
                Some(error) => eprintln!("{}: {error}", error.kind()),
                None => eprintln!("Error: {e:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<()> {
    // The example directory lives until the run is over
    let (config, _example_dir) = match (&args.example, &args.config) {
        (Some(name), _) => {
            let example = demos::find(name)?;
            info!(example = example.name, "{}", example.description);
            let dir = tempfile::tempdir()?;
            (example.write_to(dir.path())?, Some(dir))
        }
        (None, Some(config)) => (config.clone(), None),
        (None, None) => bail!("a configuration file is required"),
    };
    run_configuration(&config, args.output.clone(), args.preprocess.as_deref())
}

fn run_configuration(
    config: &Path,
    output: Option<PathBuf>,
    preprocess: Option<&Path>,
) -> Result<()> {
    let configuration = Configuration::from_file(config)?;
    let mut driver = configuration.build_driver(Box::new(CsvOutput::new(output)))?;

    if let Some(dir) = preprocess {
        let path = driver.preprocess_input(dir)?;
        info!(path = %path.display(), "Preprocessing complete");
        return Ok(());
    }

    driver.run()?;
    info!(
        steps = driver.step_sizes().len(),
        outputs = driver.output_times().len(),
        "Simulation complete"
    );
    Ok(())
}
