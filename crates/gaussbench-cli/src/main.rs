//! GaussBench command-line interface.
//!
//! Run bench documents from TOML or JSON job files:
//! ```sh
//! gaussbench run job.toml
//! gaussbench validate job.toml
//! gaussbench kinds
//! ```

mod config;
mod runner;
mod units;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use gaussbench_core::{OpticsBench, OpticsType};

#[derive(Parser)]
#[command(name = "gaussbench")]
#[command(about = "GaussBench: Gaussian beam propagation on an optical bench")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the tasks of a job file.
    Run {
        /// Path to the job file (.toml or .json).
        config: PathBuf,
        /// Output directory (overrides the job file setting).
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Optimizer seed (overrides the document setting).
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Check that a job file describes a valid bench.
    Validate {
        /// Path to the job file (.toml or .json).
        config: PathBuf,
    },
    /// List the available element types.
    Kinds,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            output,
            seed,
        } => {
            println!("GaussBench");
            println!("==========");
            let job = config::load_config(&config)?;
            println!("Configuration: {}", config.display());

            let bench = runner::run_job(&job, seed)?;

            let out_dir = output.unwrap_or_else(|| PathBuf::from(&job.output.directory));
            println!();
            if job.output.save_profile {
                runner::write_profile_csv(&bench, job.tasks.samples, &out_dir.join("profile.csv"))?;
            }
            if job.output.save_document {
                runner::write_document_json(&bench, &out_dir.join("bench.json"))?;
            }

            println!("Done.");
            Ok(())
        }
        Commands::Validate { config } => {
            let job = config::load_config(&config)?;
            let bench = OpticsBench::from_document(&job.bench)?;
            println!(
                "Configuration is valid: {} ({} elements)",
                config.display(),
                bench.len()
            );
            Ok(())
        }
        Commands::Kinds => {
            println!("Element types:");
            println!();
            for t in OpticsType::ALL {
                println!("  {:<2} {}", t.name_prefix(), t.label());
            }
            Ok(())
        }
    }
}
