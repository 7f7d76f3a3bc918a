//! clapx - command line front end
//!
//! Locates installed packages and exercises the clapx wrappers:
//! `--redirect`, `--traceback`, `--version` and `--icon`.

use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use clapx::cli::exit_codes::status_byte;
use clapx::cli::{print_exit_codes, ExitCodes, PackageIcon};
use clapx::{AppConfig, Locator, RedirectArgs, TracebackArgs, VersionInfo};
use tracing::{debug, warn};

/// Icon shipped with the package, relative to its directory
const ICON_FILE: &str = "assets/clapx.svg";

/// Environment variable naming the config file
const CONFIG_ENV: &str = "CLAPX_CONFIG";

/// clapx CLI
#[derive(Parser, Debug)]
#[command(
    name = "clapx",
    about = "Locate installed packages and their resources",
    long_about = None
)]
struct Cli {
    #[command(flatten)]
    redirect: RedirectArgs,

    #[command(flatten)]
    traceback: TracebackArgs,

    /// Config file
    #[arg(long, global = true, value_name = "FILE", env = CONFIG_ENV)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the directory of an installed package
    Locate {
        /// Package name
        name: String,
    },

    /// Print the library name of an installed package
    Module {
        /// Package name
        name: String,
    },

    /// Show name, version and homepage of an installed package
    Metadata {
        /// Package name
        name: String,

        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// List exit codes
    ExitCodes,

    /// Write text to the console, then succeed, fail or panic
    Emit {
        /// Text written to stdout
        text: Option<String>,

        /// Text written to stderr
        #[arg(long, value_name = "TEXT")]
        stderr: Option<String>,

        /// Fail with this error message
        #[arg(long, value_name = "MESSAGE", conflicts_with = "panic")]
        fail: Option<String>,

        /// Panic with this message
        #[arg(long, value_name = "MESSAGE")]
        panic: Option<String>,

        /// Exit code returned on success
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        code: i32,
    },
}

fn main() -> ExitCode {
    let args: Vec<OsString> = env::args_os().collect();

    let config = match load_config(config_arg(&args).as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::from(status_byte(ExitCodes::USAGE));
        }
    };

    let info = VersionInfo::new(clapx::package_metadata!());
    let icon = PackageIcon::new(ICON_FILE)
        .package(clapx::NAME)
        .exit_code(ExitCodes::SUCCESS)
        .locator(config.locator());
    let mut cmd = info
        .augment(Cli::command())
        .mut_arg("redirect", |arg| arg.value_parser(config.redirect_file()))
        .arg(icon.arg());

    let matches = cmd.clone().get_matches_from(&args);
    info.exit_if_requested(&matches, clapx::NAME);
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

    init_logging(&config, cli.verbose);
    debug!("Starting clapx v{}", clapx::VERSION);

    let boundary = config.boundary(cli.traceback.traceback);
    if boundary.traceback {
        // anyhow only captures backtraces when asked to
        env::set_var("RUST_LIB_BACKTRACE", "1");
    }
    if let Err(e) = boundary.install_interrupt_handler() {
        warn!("Ctrl-C handler not installed: {}", e);
    }

    let redirect = config.redirect();
    let locator = config.locator();
    boundary
        .run(|| redirect.run(cli.redirect.redirect.as_ref(), || run(&cli, &locator, &mut cmd)))
        .into()
}

/// Value of `--config` (or `CLAPX_CONFIG`), needed before the command is built.
///
/// `--redirect` is read as a plain path here so the pre-parse creates no file.
fn config_arg(args: &[OsString]) -> Option<PathBuf> {
    Cli::command()
        .ignore_errors(true)
        .mut_arg("redirect", |arg| arg.value_parser(clap::value_parser!(PathBuf)))
        .try_get_matches_from(args)
        .ok()?
        .get_one::<PathBuf>("config")
        .cloned()
}

fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::load_from(path)?,
        None => match clapx::config::config_file() {
            Some(path) => AppConfig::load_from(&path)?,
            None => AppConfig::default(),
        },
    };
    Ok(config)
}

fn init_logging(config: &AppConfig, verbose: bool) {
    let level = if verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli, locator: &Locator, cmd: &mut clap::Command) -> anyhow::Result<i32> {
    let Some(command) = &cli.command else {
        cmd.print_help()?;
        return Ok(ExitCodes::SUCCESS);
    };

    match command {
        Commands::Locate { name } => {
            let dir = locator.package_dir(name)?;
            println!("{}", dir.display());
        }
        Commands::Module { name } => {
            println!("{}", locator.module_name(name)?);
        }
        Commands::Metadata { name, json } => {
            let metadata = locator.metadata(name)?;
            if *json {
                let text = serde_json::to_string_pretty(&metadata)
                    .context("failed to serialize metadata")?;
                println!("{}", text);
            } else {
                println!("{} {}", metadata.name, metadata.version);
                if !metadata.url().is_empty() {
                    println!("{}", metadata.url());
                }
            }
        }
        Commands::ExitCodes => print_exit_codes(),
        Commands::Emit {
            text,
            stderr,
            fail,
            panic,
            code,
        } => {
            if let Some(text) = text {
                println!("{}", text);
            }
            if let Some(text) = stderr {
                eprintln!("{}", text);
            }
            if let Some(message) = fail {
                bail!("{}", message);
            }
            if let Some(message) = panic {
                panic!("{}", message);
            }
            return Ok(*code);
        }
    }

    Ok(ExitCodes::SUCCESS)
}
