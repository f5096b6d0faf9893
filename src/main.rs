use actionflow::cli::{self, OutputMode};
use actionflow::config::{Settings, Verbosity};
use actionflow::{default_registry, logging};
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "actionflow")]
#[command(about = "Run action-list workflows - loops, jumps and failure policies")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project directory for .actionflow/config.toml (defaults to current)
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,

    /// Suppress progress output; failures and prints are still shown
    #[arg(long, global = true)]
    quiet: bool,

    /// Report every action, loop and jump
    #[arg(long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Append logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a job from a manifest
    Run {
        /// Manifest file (TOML, or JSON with a .json extension)
        manifest: PathBuf,

        /// Job key
        job: String,

        /// Seed a var, as key=value (repeatable)
        #[arg(long = "var", value_name = "KEY=VALUE")]
        vars: Vec<String>,

        /// Output mode: console, json or quiet
        #[arg(long)]
        output: Option<String>,

        /// Write a timestamped log for this run under the config directory
        #[arg(long)]
        log: bool,
    },

    /// Validate a manifest without running
    Validate {
        /// Manifest file
        manifest: PathBuf,
    },

    /// List the jobs of a manifest
    Jobs {
        /// Manifest file
        manifest: PathBuf,
    },

    /// List built-in operators and registered actions
    Actions,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.dir.as_deref())?;
    if cli.quiet {
        settings.defaults.verbosity = Verbosity::Quiet;
    } else if cli.verbose {
        settings.defaults.verbosity = Verbosity::Verbose;
    }

    let log_file = match (&cli.log_file, &cli.command) {
        (Some(path), _) => Some(path.clone()),
        (None, Commands::Run { job, log: true, .. }) => Some(logging::default_log_path(job)?),
        _ => settings.defaults.log_file.clone(),
    };
    logging::init_logging(cli.debug, cli.quiet, log_file)?;

    let code = match cli.command {
        Commands::Run {
            manifest,
            job,
            vars,
            output,
            ..
        } => {
            let mode: OutputMode = output
                .as_deref()
                .unwrap_or(&settings.defaults.output)
                .parse()
                .map_err(anyhow::Error::msg)?;
            let handler = cli::create_handler(mode);
            cli::run_job(&manifest, &job, &vars, &settings, handler)?
        }

        Commands::Validate { manifest } => {
            let handler = cli::create_handler(OutputMode::Console);
            cli::validate_manifest(&manifest, handler.as_ref())
        }

        Commands::Jobs { manifest } => {
            let handler = cli::create_handler(OutputMode::Console);
            cli::list_jobs(&manifest, handler.as_ref())?;
            0
        }

        Commands::Actions => {
            let handler = cli::create_handler(OutputMode::Console);
            cli::list_actions(&default_registry(), handler.as_ref());
            0
        }
    };

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
