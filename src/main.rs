use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use tracing::debug;

use ferat::config::ColorMode;
use ferat::error::{codes, PipelineError};
use ferat::pipeline::{profile, Pipeline, PipelineOptions};
use ferat::subprocess::TokioProcessRunner;
use ferat::ux::{Ux, BANNER};

const VERSION: &str = "v0.9.0";

/// Generate and verify FERAT proofs from input QBFs.
#[derive(Parser)]
#[command(name = "ferat")]
#[command(about = "Generate and verify FERAT proofs from input QBFs", long_about = None)]
struct Cli {
    /// Use LRAT instead of (D)RAT in the pipeline
    #[arg(short = 'l', long, global = true)]
    lrat: bool,

    /// Show the invocation and output of every external tool
    #[arg(short = 'c', long, global = true)]
    show_command: bool,

    /// Do not explain the pipeline stages as they run
    #[arg(long, global = true)]
    no_explain: bool,

    /// Increase diagnostic output (-v, -vv, -vvv); implies --show-command
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Produce the least output
    #[arg(short = 'q', long, global = true)]
    quiet: bool,

    /// Seconds each external tool may run, 0 for no limit
    #[arg(
        short = 't',
        long,
        default_value_t = 0.0,
        value_name = "SECONDS",
        global = true
    )]
    timeout: f64,

    /// Keep the temporary directory after the run
    #[arg(short = 'K', long, global = true)]
    keep_tmp: bool,

    /// Directory for intermediate files
    #[arg(
        short = 'T',
        long = "tmp",
        default_value = "./tmp",
        value_name = "DIR",
        global = true
    )]
    tmp_dir: PathBuf,

    /// Directory holding the solver and checker binaries
    #[arg(
        short = 'd',
        long = "deps",
        default_value = "./deps",
        value_name = "DIR",
        global = true
    )]
    deps_dir: PathBuf,

    /// When to use ANSI colors
    #[arg(
        short = 'C',
        long,
        value_enum,
        default_value_t = ColorMode::Auto,
        value_name = "WHEN",
        global = true
    )]
    color: ColorMode,

    /// Report the execution time of each pipeline step
    #[arg(long, global = true)]
    profile: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the version and exit
    Version,
    /// Generate a FERAT proof from a QBF
    Generate {
        /// Reuse this expansion of the single input QBF and skip the
        /// solving step
        #[arg(long, value_name = "CNF")]
        expansion: Option<PathBuf>,

        /// One or more input QBF files followed by the output path; a
        /// directory output receives one proof per input
        #[arg(required = true, num_args = 2.., value_name = "FILE")]
        files: Vec<PathBuf>,
    },
    /// Check an existing FERAT proof against a QBF
    Check {
        /// The input QBF file
        qbf: PathBuf,
        /// The FERAT proof to verify
        ferat: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr)
        .with_target(cli.verbose >= 2)
        .init();

    let verbose = cli.verbose > 0;
    let echo_commands = !cli.quiet && (verbose || cli.show_command);
    let explain = !cli.quiet && (verbose || !cli.no_explain);
    let color = cli.color.enabled();
    let ux = Ux::new(color, explain);

    if matches!(cli.command, Commands::Version) {
        println!(
            "{} by Simader, Seidl, and Rebola-Pardo",
            ux.style(BANNER, "FERAT")
        );
        println!("Version {VERSION}");
        return;
    }

    let timeout = if cli.timeout > 0.0 {
        match Duration::try_from_secs_f64(cli.timeout) {
            Ok(limit) => Some(limit),
            Err(_) => {
                ux.fatal(
                    codes::CLI_ERR,
                    format!("invalid timeout of {} seconds", cli.timeout),
                );
                process::exit(codes::CLI_ERR);
            }
        }
    } else {
        None
    };

    debug!(verbosity = cli.verbose, "ferat {} starting", VERSION);

    let options = PipelineOptions {
        lrat: cli.lrat,
        timeout,
        tmp_dir: cli.tmp_dir.clone(),
        keep_tmp: cli.keep_tmp,
        deps_dir: cli.deps_dir.clone(),
        echo_commands,
        explain,
        color,
        profile: cli.profile,
    };
    let pipeline = Pipeline::new(Arc::new(TokioProcessRunner), options);

    let started = Instant::now();
    let result = run(&pipeline, &cli.command).await;

    let code = match result {
        Ok(()) => 0,
        Err(err) => {
            let code = err.exit_code();
            ux.fatal(code, &err);
            code
        }
    };
    if cli.profile {
        ux.timing(profile::TOTAL, started.elapsed().as_micros());
    }
    pipeline.cleanup();
    process::exit(code);
}

async fn run(pipeline: &Pipeline, command: &Commands) -> Result<(), PipelineError> {
    match command {
        // Handled before the pipeline is even constructed.
        Commands::Version => Ok(()),
        Commands::Generate { expansion, files } => {
            pipeline.preflight("generate")?;
            // The final path is the output, everything before it an input.
            let (output, inputs) = match files.split_last() {
                Some(split) => split,
                None => return Err(PipelineError::Usage("no files given".into())),
            };
            pipeline
                .run_generate(inputs, output, expansion.as_deref())
                .await
        }
        Commands::Check { qbf, ferat } => {
            pipeline.preflight("check")?;
            pipeline.run_check(qbf, ferat).await
        }
    }
}
