// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Command-line interface code. More specific options for `oskar`
//! subcommands are contained in modules.
//!
//! All booleans must have `#[serde(default)]` annotated, and anything that
//! isn't a boolean must be optional. This allows all arguments to be optional
//! *and* usable in an arguments file.
//!
//! Only 3 things should be public in this module: `Oskar`, `Oskar::run`, and
//! `OskarError`.

#[macro_use]
mod common;
mod beam_pattern;
mod error;
mod simulate;

pub use error::OskarError;

use std::path::PathBuf;

use clap::{AppSettings, Args, Parser, Subcommand};
use log::info;

use crate::PROGRESS_BARS;

// Add build-time information from the "built" crate.
include!(concat!(env!("OUT_DIR"), "/built.rs"));

#[derive(Debug, Parser)]
#[clap(
    version,
    author,
    about = r#"Simulate radio interferometer visibilities of a sky model, and image them"#
)]
#[clap(global_setting(AppSettings::DeriveDisplayOrder))]
#[clap(disable_help_subcommand = true)]
#[clap(infer_subcommands = true)]
#[clap(propagate_version = true)]
#[clap(infer_long_args = true)]
pub struct Oskar {
    #[clap(flatten)]
    global_opts: GlobalArgs,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    /// Disable progress bars (they are also hidden when stderr isn't a
    /// terminal).
    #[clap(long, global = true)]
    no_progress_bars: bool,

    /// Print more messages; -v gives debug messages, -vv trace messages and
    /// -vvv also shows where each message came from.
    #[clap(short, long, parse(from_occurrences), global = true)]
    verbosity: u8,

    /// Read and check all arguments, report what would be done, then exit.
    #[clap(long, global = true)]
    dry_run: bool,

    /// Write the merged arguments to this TOML file. It can be given back as
    /// an argument file to repeat the run.
    #[clap(long, global = true)]
    save_toml: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
#[clap(arg_required_else_help = true)]
enum Command {
    #[clap(alias = "simulate-vis")]
    #[clap(about = r#"Simulate the visibilities of a sky model and image them.
The sky model is given as [[sky]] tables in an argument file."#)]
    Simulate(simulate::SimulateArgs),

    #[clap(alias = "beam")]
    #[clap(about = "Make a FITS image of a station beam.")]
    BeamPattern(beam_pattern::BeamPatternArgs),
}

impl Oskar {
    pub fn run(self) -> Result<(), OskarError> {
        let GlobalArgs {
            no_progress_bars,
            verbosity,
            dry_run,
            save_toml,
        } = self.global_opts;
        if let Err(e) = setup_logging(verbosity) {
            // Only one logger may be set per process.
            eprintln!("Couldn't set up logging: {e}");
        }
        PROGRESS_BARS.store(!no_progress_bars);

        let sub_command = self.command.name();
        info!("oskar {sub_command} {}", env!("CARGO_PKG_VERSION"));
        display_build_info();

        // Merge the command line with any argument file, optionally save the
        // result, then run.
        macro_rules! merge_save_run {
            ($args:expr) => {{
                let args = $args.merge()?;
                if let Some(toml_file) = save_toml {
                    let toml_str = toml::to_string(&args).map_err(|e| {
                        OskarError::ArgFile(format!("Couldn't serialise arguments to toml: {e}"))
                    })?;
                    std::fs::write(&toml_file, toml_str)?;
                    info!("Saved arguments to {}", toml_file.display());
                }
                args.run(dry_run)?
            }};
        }

        match self.command {
            Command::Simulate(args) => merge_save_run!(args),
            Command::BeamPattern(args) => merge_save_run!(args),
        }

        info!("oskar {sub_command} complete.");
        Ok(())
    }
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Simulate(_) => "simulate",
            Command::BeamPattern(_) => "beam-pattern",
        }
    }
}

/// Send log messages to stdout. `RUST_LOG` overrides the level chosen by
/// `verbosity`. Colours are only used on a terminal.
fn setup_logging(verbosity: u8) -> Result<(), log::SetLoggerError> {
    let level = match verbosity {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    let mut builder = env_logger::Builder::new();
    builder
        .target(env_logger::Target::Stdout)
        .filter_level(level)
        .format_target(false)
        .parse_default_env();
    if verbosity >= 3 {
        builder.format(|buf, record| {
            use std::io::Write;

            writeln!(
                buf,
                "[{} {} {}:{}] {}",
                buf.timestamp(),
                record.level(),
                record.module_path().unwrap_or("?"),
                record.line().unwrap_or(0),
                record.args()
            )
        });
    }
    builder.try_init()
}

/// Log the git revision and compiler this binary was built with.
fn display_build_info() {
    let revision = match (GIT_COMMIT_HASH_SHORT, GIT_DIRTY) {
        (Some(hash), Some(true)) => format!("{hash} (dirty)"),
        (Some(hash), _) => hash.to_string(),
        (None, _) => "<no git info>".to_string(),
    };
    info!("Built from git revision {revision}");
    if let Some(head) = GIT_HEAD_REF {
        info!("        on {head}");
    }
    info!("        at {BUILT_TIME_UTC}");
    info!("        with {RUSTC_VERSION}");
    info!("");
}
