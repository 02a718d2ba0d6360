use std::path::{Path, PathBuf};
use std::process::ExitCode;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use assetscope::compress::compressor_from_config;
use assetscope::config::{AssetScopeConfig, CliOverrides, MatchPolicy};
use assetscope::export::{write_report, ExportFormat};
use assetscope::logger::init_logger;
use assetscope::pipeline::{self, Analysis, PipelineResult};
use assetscope::report::{Report, ReportMode};

#[derive(Parser)]
#[command(name = "assetscope")]
#[command(author = "Zachary Woods <143150513+zach-fau@users.noreply.github.com>")]
#[command(version)]
#[command(about = "Find unused game-ad assets, compress the used ones, delete the dead ones safely", long_about = None)]
struct Cli {
    /// Project root to analyze
    #[arg(short, long, global = true, default_value = ".")]
    path: PathBuf,

    /// Config file (defaults to assetscope.toml in the project root)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Errors only
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Disable colored log output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// How references are matched.
#[derive(Args, Debug, Clone, Copy)]
struct MatchArgs {
    /// Ignore references inside comments
    #[arg(long)]
    strict: bool,

    /// Only count references that resolve to an asset's full path
    #[arg(long)]
    exact_only: bool,
}

/// Where and how the report is written.
#[derive(Args, Debug, Clone)]
struct OutputArgs {
    /// Report format
    #[arg(short, long, value_enum, default_value_t = ExportFormat::Text)]
    format: ExportFormat,

    /// Write the report to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify assets as used or unused. Changes nothing on disk
    Analyze {
        #[command(flatten)]
        matching: MatchArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Compress used assets through the TinyPNG API
    Compress {
        #[command(flatten)]
        matching: MatchArgs,

        /// Maximum requests in flight
        #[arg(long)]
        concurrency: Option<usize>,

        /// Keep a copy of each original before replacing it
        #[arg(long)]
        backup: bool,

        /// Also write a deletion manifest for the unused assets
        #[arg(long)]
        plan_deletion: bool,

        #[command(flatten)]
        output: OutputArgs,
    },
    /// Write a deletion manifest for the unused assets. Deletes nothing
    PlanDelete {
        #[command(flatten)]
        matching: MatchArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Delete the files listed in the manifest written by plan-delete
    ConfirmDelete {
        /// Keep a copy of each file before deleting it
        #[arg(long)]
        backup: bool,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Browse the classification in a terminal UI
    Review {
        #[command(flatten)]
        matching: MatchArgs,
    },
    /// Show version information
    Version,
}

impl Commands {
    fn overrides(&self) -> CliOverrides {
        let mut overrides = CliOverrides::default();
        let matching = match self {
            Commands::Analyze { matching, .. }
            | Commands::Compress { matching, .. }
            | Commands::PlanDelete { matching, .. }
            | Commands::Review { matching } => Some(*matching),
            Commands::ConfirmDelete { .. } | Commands::Version => None,
        };
        if let Some(matching) = matching {
            // Flags only ever switch a setting on; off is left to the config file
            overrides.strict = matching.strict.then_some(true);
            overrides.match_policy = matching.exact_only.then_some(MatchPolicy::ExactOnly);
        }
        match self {
            Commands::Compress {
                concurrency, backup, ..
            } => {
                overrides.compression.concurrency = *concurrency;
                overrides.backup = backup.then_some(true);
            }
            Commands::ConfirmDelete { backup, .. } => {
                overrides.backup = backup.then_some(true);
            }
            _ => {}
        }
        overrides
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("assetscope - game-ad asset optimizer");
        println!("Run 'assetscope analyze' to find unused assets");
        println!("Run 'assetscope --help' for more information");
        return Ok(ExitCode::SUCCESS);
    };
    if let Commands::Version = command {
        println!("assetscope v{}", env!("CARGO_PKG_VERSION"));
        return Ok(ExitCode::SUCCESS);
    }

    init_logger(cli.verbose, cli.quiet, cli.no_color);

    let root = cli.path.as_path();
    anyhow::ensure!(root.is_dir(), "Not a directory: {}", root.display());
    let config = AssetScopeConfig::load(root, cli.config.as_deref(), &command.overrides())
        .context("Failed to load configuration")?;

    match command {
        Commands::Analyze { output, .. } => {
            finish(root, ReportMode::Analyze, pipeline::analyze(root, &config), &output)
        }
        Commands::Compress {
            plan_deletion,
            output,
            ..
        } => {
            let compressor = compressor_from_config(&config.compression);
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("Failed to start async runtime")?;
            let result = runtime.block_on(pipeline::compress(
                root,
                &config,
                compressor,
                plan_deletion,
            ));
            finish(root, ReportMode::Compress, result, &output)
        }
        Commands::PlanDelete { output, .. } => finish(
            root,
            ReportMode::PlanDelete,
            pipeline::plan_deletion(root, &config),
            &output,
        ),
        Commands::ConfirmDelete { output, .. } => finish(
            root,
            ReportMode::ConfirmDelete,
            pipeline::confirm_deletion(root, &config),
            &output,
        ),
        Commands::Review { .. } => {
            let analysis = Analysis::run(root, &config)?;
            assetscope::ui::review(&analysis).context("Terminal UI failed")?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Version => Ok(ExitCode::SUCCESS),
    }
}

/// Write the report for a finished run, or a failure report for a refused one.
fn finish(
    root: &Path,
    mode: ReportMode,
    result: PipelineResult<Report>,
    output: &OutputArgs,
) -> Result<ExitCode> {
    let (report, code) = match result {
        Ok(report) => (report, ExitCode::SUCCESS),
        Err(err) => {
            tracing::error!("{}", err);
            (pipeline::failure_report(root, mode, &err), ExitCode::FAILURE)
        }
    };

    write_report(output.format, &report, output.output.as_deref()).with_context(|| {
        match &output.output {
            Some(path) => format!("Failed to write report to {}", path.display()),
            None => "Failed to write report".to_string(),
        }
    })?;
    Ok(code)
}
