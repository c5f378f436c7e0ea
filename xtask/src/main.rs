use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;

mod synth;
mod verify;

use synth::SynthOptions;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Developer automation for the congeal workspace")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write perturbed copies of a synthetic bundle for smoke runs
    SynthDataset {
        /// Output directory for the .vtk subjects
        #[arg(short, long, default_value = "test_data/synthetic")]
        output: PathBuf,

        /// Number of subjects
        #[arg(short, long, default_value_t = 4)]
        subjects: usize,

        /// Fibers per subject
        #[arg(short, long, default_value_t = 500)]
        fibers: usize,

        /// Maximum translation per axis (mm)
        #[arg(long, default_value_t = 5.0)]
        max_shift: f64,

        /// Maximum rotation per axis (degrees)
        #[arg(long, default_value_t = 5.0)]
        max_rotation: f64,

        /// Random seed
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },

    /// Check the checkpoint layout of a registration output directory
    VerifyOutput {
        /// Output directory of a registration run
        output_dir: PathBuf,
    },

    /// Remove a generated directory
    Clean {
        /// Directory to remove
        #[arg(short, long, default_value = "test_data")]
        data_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::SynthDataset {
            output,
            subjects,
            fibers,
            max_shift,
            max_rotation,
            seed,
        } => {
            let options = SynthOptions {
                subjects,
                fibers,
                max_shift,
                max_rotation_deg: max_rotation,
                seed,
                ..SynthOptions::default()
            };
            info!("Writing {} synthetic subjects to {}", subjects, output.display());
            synth::write_dataset(&output, &options)?;
        }
        Commands::VerifyOutput { output_dir } => {
            verify::verify_output(&output_dir)?;
        }
        Commands::Clean { data_dir } => {
            clean(&data_dir)?;
        }
    }

    Ok(())
}

fn clean(data_dir: &Path) -> Result<()> {
    if data_dir.exists() {
        info!("Removing directory: {}", data_dir.display());
        std::fs::remove_dir_all(data_dir)?;
        info!("Cleaned successfully");
    } else {
        info!("Nothing to clean");
    }
    Ok(())
}
