#![doc = include_str!("../README.md")]
#![deny(clippy::all)]

use std::{ffi::OsString, path::PathBuf};

use clap::{Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};

mod bundle;
mod inspect;
pub mod run;
pub mod structure_file;

#[derive(Parser, Debug)]
#[command(name = "fmu-cosim", bin_name = "fmu-cosim")]
#[command(about = "Package model libraries as FMUs and run co-simulations")]
struct Cli {
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Package a model library as an FMU for the host platform
    Bundle {
        /// Model identifier; names the library entry and the default output file
        #[arg(value_name = "MODEL_IDENTIFIER")]
        model_identifier: String,
        /// Path to the built model library
        #[arg(value_name = "LIBRARY")]
        library: PathBuf,
        /// Where to write the FMU [default: ./<MODEL_IDENTIFIER>.fmu]
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List the entries and ports of an FMU
    Inspect {
        /// Path to the FMU file to inspect
        #[arg(value_name = "FMU")]
        fmu: PathBuf,
    },
    /// Run a fixed-step co-simulation and print the outputs
    Run(run::RunOptions),
}

pub fn entrypoint() -> anyhow::Result<()> {
    entrypoint_from(std::env::args_os())
}

pub fn entrypoint_from<I, T>(args: I) -> anyhow::Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let Cli { verbose, command } = Cli::parse_from(args);

    let _logger = flexi_logger::Logger::try_with_env_or_str(
        verbose.log_level_filter().to_string().to_lowercase(),
    )?
    .set_palette("b1;3;2;4;6".to_string())
    .start()?;

    match command {
        Commands::Bundle {
            model_identifier,
            library,
            output,
        } => bundle::bundle(&model_identifier, &library, output)?,
        Commands::Inspect { fmu } => inspect::inspect(&fmu)?,
        Commands::Run(options) => {
            let trace = run::simulate(&options)?;
            println!("{}", trace.to_table());
        }
    }

    Ok(())
}
