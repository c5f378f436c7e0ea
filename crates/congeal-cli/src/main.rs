use anyhow::{bail, Context, Result};
use clap::Parser;
use congeal_core::SubjectSet;
use congeal_io::{load_directory, DirectorySink, LoadOptions};
use congeal_registration::{
    CongealEngine, ConsoleProgressCallback, DistanceMethod, EngineSettings, MultiscaleScheduler,
    RegistrationEngine, ScheduleConfig, DEFAULT_FIBERS_RENDERED,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod progress_bar;
mod report;

use progress_bar::ProgressBarCallback;
use report::RunReport;

#[derive(Parser, Debug)]
#[command(name = "congeal-register")]
#[command(version, about = "Runs multisubject unbiased group registration of tractography.")]
struct Cli {
    /// A directory of whole-brain tractography as legacy VTK polydata (.vtk).
    input_directory: PathBuf,

    /// Output directory; created if it does not exist.
    output_directory: PathBuf,

    /// Number of fibers to analyze from each dataset.
    #[arg(short = 'f', long = "fibers", default_value_t = 300)]
    fibers: usize,

    /// Minimum length (in mm) of fibers to analyze.
    #[arg(short = 'l', long = "min-length", default_value_t = 75.0)]
    min_length: f64,

    /// Number of worker threads. Defaults to the number of CPUs.
    #[arg(short = 'j', long = "jobs")]
    jobs: Option<usize>,

    /// Number of points per fiber during registration.
    #[arg(long = "points-per-fiber", default_value_t = 5)]
    points_per_fiber: usize,

    /// Write a checkpoint after every stage and log every solver call.
    #[arg(short, long)]
    verbose: bool,

    /// Fiber distance: hausdorff, mean-closest-point or pointwise.
    #[arg(long, default_value = "hausdorff")]
    distance: DistanceMethod,

    /// Seed for fiber selection and sampling.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// JSON file overriding the stage schedule.
    #[arg(long)]
    schedule: Option<PathBuf>,

    /// Fibers per subject drawn in the preview images.
    #[arg(long, default_value_t = DEFAULT_FIBERS_RENDERED)]
    fibers_rendered: usize,

    /// Hide the progress bar.
    #[arg(long)]
    no_progress: bool,
}

impl Cli {
    fn schedule_config(&self) -> Result<ScheduleConfig> {
        let mut config = match &self.schedule {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read schedule {}", path.display()))?;
                serde_json::from_str::<ScheduleConfig>(&text)
                    .with_context(|| format!("Failed to parse schedule {}", path.display()))?
            }
            None => ScheduleConfig::default(),
        };
        config.fiber_count = self.fibers;
        config.validate()?;
        Ok(config)
    }

    fn engine_settings(&self) -> EngineSettings {
        let mut settings = EngineSettings::default()
            .with_points_per_fiber(self.points_per_fiber)
            .with_distance_method(self.distance)
            .with_seed(self.seed);
        if let Some(jobs) = self.jobs {
            settings = settings.with_parallel_jobs(jobs);
        }
        settings
    }

    fn load_options(&self) -> LoadOptions {
        LoadOptions {
            min_length: self.min_length,
            max_count: self.fibers,
            seed: self.seed,
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run(cli: &Cli) -> Result<RunReport> {
    if !cli.input_directory.is_dir() {
        bail!("Input directory {} does not exist", cli.input_directory.display());
    }
    let config = cli.schedule_config()?;
    let settings = cli.engine_settings();
    settings.validate()?;

    info!("Input directory: {}", cli.input_directory.display());
    info!("Output directory: {}", cli.output_directory.display());
    info!(
        "Fibers per subject: {}, minimum length: {} mm, jobs: {}, points per fiber: {}, distance: {}",
        cli.fibers, cli.min_length, settings.parallel_jobs, settings.points_per_fiber, settings.distance_method
    );

    if !cli.output_directory.exists() {
        info!("Output directory does not exist, creating it");
    }
    fs::create_dir_all(&cli.output_directory)
        .with_context(|| format!("Failed to create {}", cli.output_directory.display()))?;

    let dataset = load_directory(&cli.input_directory, &cli.load_options())?;
    let mut scheduler = MultiscaleScheduler::new(config)
        .with_verbose(cli.verbose)
        .with_fibers_rendered(cli.fibers_rendered);
    // Fail on an unusable schedule before any subject is resampled.
    scheduler.plan(dataset.len())?;

    let mut engine = CongealEngine::new(settings.clone())?;
    for bundle in &dataset.bundles {
        engine.add_subject(bundle.clone())?;
    }
    let subjects = SubjectSet::new(dataset.bundles.clone(), dataset.ids.clone())?;
    let mut sink = DirectorySink::new(&cli.output_directory).with_sources(dataset.source_map());

    let console = if cli.verbose {
        ConsoleProgressCallback::new().verbose()
    } else {
        ConsoleProgressCallback::new()
    };
    scheduler = scheduler.with_progress(Arc::new(console));
    if !cli.no_progress {
        scheduler = scheduler.with_progress(Arc::new(ProgressBarCallback::new()));
    }

    let outcome = scheduler.run(engine, &subjects, &mut sink)?;
    Ok(RunReport::new(
        &cli.input_directory,
        &cli.output_directory,
        dataset.ids,
        settings,
        &outcome,
    ))
}

fn write_report(report: &RunReport, dir: &Path) -> Result<()> {
    let path = report.write(dir)?;
    info!("Wrote {}", path.display());
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let report = run(&cli)?;
    println!("TIME: {:?}", report.elapsed_seconds());
    write_report(&report, &cli.output_directory)?;
    Ok(())
}
