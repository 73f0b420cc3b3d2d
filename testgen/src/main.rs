//! Coverage-driven unit test generator.
//!
//! Generates Jest test files for JavaScript/TypeScript sources with a
//! generative model, measures their line coverage and regenerates with
//! feedback until a threshold is met or the attempt budget runs out.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::info;

use testgen::agents::generator::TestGenerator;
use testgen::core::filter::FileFilter;
use testgen::exit_codes;
use testgen::io::config::{
    CONFIG_FILE_NAME, ConfigOverrides, TestgenConfig, load_config, load_dotenv,
    resolve_credentials, write_config,
};
use testgen::io::coverage::JestCoverageRunner;
use testgen::io::git::Git;
use testgen::io::model::GeminiModel;
use testgen::logging;
use testgen::run::{RunContext, WorkItem, execute, plan_backfill, plan_files, plan_incremental};
use testgen::workflow::WorkflowSettings;

#[derive(Parser)]
#[command(
    name = "testgen",
    version,
    about = "Generate unit tests until they reach a line coverage threshold"
)]
struct Cli {
    /// Project root (where `package.json` and `testgen.toml` live).
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,
    /// Config file; defaults to `<root>/testgen.toml`.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Override `coverage_threshold` (percent).
    #[arg(long, global = true)]
    threshold: Option<f64>,
    /// Override `max_regeneration_attempts`.
    #[arg(long, global = true)]
    max_attempts: Option<u32>,
    /// Override `jobs` (files processed concurrently).
    #[arg(long, global = true)]
    jobs: Option<usize>,
    /// Also write the run report as JSON to this path.
    #[arg(long, global = true)]
    report: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default `testgen.toml` into the project root.
    Init {
        /// Overwrite an existing config file.
        #[arg(short, long)]
        force: bool,
    },
    /// Generate tests for every eligible source file in the project.
    Backfill,
    /// Generate tests for files changed between two git revisions.
    Incremental { from: String, to: String },
    /// Generate tests for the given files.
    File {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}

fn main() {
    logging::init();
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let root = cli.root.clone();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| root.join(CONFIG_FILE_NAME));

    if let Command::Init { force } = cli.command {
        init_config(&config_path, force)?;
        println!("wrote {}", config_path.display());
        return Ok(exit_codes::OK);
    }

    load_dotenv(&root)?;
    let config = load_config(&config_path)?.with_overrides(&ConfigOverrides {
        coverage_threshold: cli.threshold,
        max_regeneration_attempts: cli.max_attempts,
        jobs: cli.jobs,
    })?;
    let credentials = resolve_credentials(&config.model, |name| std::env::var(name).ok())?;
    let filter = FileFilter::new(&config.supported_extensions, &config.ignore_patterns)?;

    let items = plan(&cli.command, &root, &filter)?;
    info!(files = items.len(), jobs = config.jobs, "starting run");

    let model = GeminiModel::new(&config.model, &credentials)?;
    let generator = TestGenerator::new(config.testing_framework.clone())?;
    let runner = JestCoverageRunner::new(root.clone(), &config.runner);
    let ctx = RunContext {
        root: &root,
        generator: &generator,
        model: &model,
        runner: &runner,
        settings: WorkflowSettings {
            threshold: config.coverage_threshold,
            max_attempts: config.max_regeneration_attempts,
        },
    };
    let report = execute(&ctx, &items, config.jobs);

    print!("{}", report.render_summary());
    if let Some(path) = &cli.report {
        report.write_json(path)?;
    }
    Ok(report.exit_code())
}

fn plan(command: &Command, root: &Path, filter: &FileFilter) -> Result<Vec<WorkItem>> {
    match command {
        Command::Backfill => plan_backfill(root, filter),
        Command::Incremental { from, to } => plan_incremental(&Git::new(root), from, to, filter),
        Command::File { paths } => Ok(plan_files(root, paths, filter)),
        Command::Init { .. } => bail!("init does not plan work"),
    }
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    write_config(path, &TestgenConfig::default())
}
