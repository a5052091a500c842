// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Command-line interface code. More specific options for `cbf-verify`
//! subcommands are contained in modules.
//!
//! All booleans must have `#[serde(default)]` annotated, and anything that
//! isn't a boolean must be optional. This allows all arguments to be optional
//! *and* usable in an arguments file.
//!
//! Only 3 things should be public in this module: `CbfVerify`,
//! `CbfVerify::run`, and `CbfVerifyError`.

#[macro_use]
mod common;
mod baselines;
mod channelisation;
mod consistency;
mod delays;
mod error;
mod flags;
mod freq_plan;
mod sfdr;
mod vacc;

pub use error::CbfVerifyError;

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
    about = r#"Channelisation and data-product verification for FPGA correlator/beamformers.
Every test runs against a simulated digitiser and correlator."#
)]
#[clap(global_setting(AppSettings::DeriveDisplayOrder))]
#[clap(disable_help_subcommand = true)]
#[clap(infer_subcommands = true)]
#[clap(propagate_version = true)]
#[clap(infer_long_args = true)]
pub struct CbfVerify {
    #[clap(flatten)]
    global_opts: GlobalArgs,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    /// Don't draw progress bars.
    #[clap(long)]
    #[clap(global = true)]
    no_progress_bars: bool,

    /// The verbosity of the program. Increase by specifying multiple times
    /// (e.g. -vv). The default is to print only high-level information.
    #[clap(short, long, parse(from_occurrences))]
    #[clap(global = true)]
    verbosity: u8,

    /// Only verify that arguments were correctly ingested and print out
    /// high-level information.
    #[clap(long)]
    #[clap(global = true)]
    dry_run: bool,

    /// Save the input arguments into a new TOML file that can be used to
    /// reproduce this run.
    #[clap(long)]
    #[clap(global = true)]
    save_toml: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
#[clap(arg_required_else_help = true)]
enum Command {
    #[clap(alias = "plan")]
    #[clap(about = "Print the frequencies a channelisation sweep would use.")]
    FreqPlan(freq_plan::FreqPlanArgs),

    #[clap(about = r#"Sweep a tone across a channel and its neighbours, checking that each
frequency peaks in the right channel and that in-channel ripple is small."#)]
    Channelisation(channelisation::ChannelisationArgs),

    #[clap(
        about = "Put a tone in every channel and check for spurious responses in other channels."
    )]
    Sfdr(sfdr::SfdrArgs),

    #[clap(about = "Check that identical inputs give identical dumps, back-to-back and across repeated scans.")]
    Consistency(consistency::ConsistencyArgs),

    #[clap(about = "Check that coarse delays produce the expected phase slopes across the band.")]
    Delays(delays::DelaysArgs),

    #[clap(about = "Check that the vector accumulator sums exactly for several accumulation lengths.")]
    Vacc(vacc::VaccArgs),

    #[clap(about = "Check that x-engine flags are raised for exactly the dump they apply to.")]
    Flags(flags::FlagsArgs),

    #[clap(about = "Check that every baseline carries data, and that zeroed inputs only zero their own baselines.")]
    Baselines(baselines::BaselinesArgs),
}

impl CbfVerify {
    pub fn run(self) -> Result<(), CbfVerifyError> {
        // Set up logging.
        let GlobalArgs {
            verbosity,
            dry_run,
            no_progress_bars,
            save_toml,
        } = self.global_opts;
        setup_logging(verbosity).expect("Failed to initialise logging.");
        // Enable progress bars if the user didn't say "no progress bars".
        if !no_progress_bars {
            PROGRESS_BARS.store(true);
        }

        // Print the version of cbf-verify and its build-time information.
        let sub_command = match &self.command {
            Command::FreqPlan(_) => "freq-plan",
            Command::Channelisation(_) => "channelisation",
            Command::Sfdr(_) => "sfdr",
            Command::Consistency(_) => "consistency",
            Command::Delays(_) => "delays",
            Command::Vacc(_) => "vacc",
            Command::Flags(_) => "flags",
            Command::Baselines(_) => "baselines",
        };
        info!("cbf-verify {} {}", sub_command, env!("CARGO_PKG_VERSION"));
        display_build_info();

        macro_rules! merge_save_run {
            ($args:expr) => {{
                let args = $args.merge()?;
                if let Some(toml) = save_toml {
                    use std::{
                        fs::File,
                        io::{BufWriter, Write},
                    };

                    let mut f = BufWriter::new(File::create(toml)?);
                    let toml_str = toml::to_string(&args).map_err(|e| {
                        CbfVerifyError::ArgFile(format!("Couldn't serialise arguments: {e}"))
                    })?;
                    f.write_all(toml_str.as_bytes())?;
                }
                args.run(dry_run)?;
            }};
        }

        match self.command {
            Command::FreqPlan(args) => merge_save_run!(args),
            Command::Channelisation(args) => merge_save_run!(args),
            Command::Sfdr(args) => merge_save_run!(args),
            Command::Consistency(args) => merge_save_run!(args),
            Command::Delays(args) => merge_save_run!(args),
            Command::Vacc(args) => merge_save_run!(args),
            Command::Flags(args) => merge_save_run!(args),
            Command::Baselines(args) => merge_save_run!(args),
        }

        info!("cbf-verify {} complete.", sub_command);
        Ok(())
    }
}

/// Activate a logger. All log messages are put onto `stdout`. `env_logger`
/// automatically only uses colours and fancy symbols if we're on a tty (e.g. a
/// terminal); piped output will be formatted sensibly. Source code lines are
/// displayed in log messages when verbosity >= 3.
fn setup_logging(verbosity: u8) -> Result<(), log::SetLoggerError> {
    let mut builder = env_logger::Builder::from_default_env();
    builder.target(env_logger::Target::Stdout);
    builder.format_target(false);
    match verbosity {
        0 => builder.filter_level(log::LevelFilter::Info),
        1 => builder.filter_level(log::LevelFilter::Debug),
        2 => builder.filter_level(log::LevelFilter::Trace),
        _ => {
            builder.filter_level(log::LevelFilter::Trace);
            builder.format(|buf, record| {
                use std::io::Write;

                let timestamp = buf.timestamp();
                let level = record.level();
                let target = record.target();
                let line = record.line().unwrap_or(0);
                let message = record.args();

                writeln!(buf, "[{timestamp} {level} {target}:{line}] {message}")
            })
        }
    };
    builder.try_init()?;

    Ok(())
}

/// Write many info-level log lines of how this executable was compiled.
fn display_build_info() {
    let dirty = match GIT_DIRTY {
        Some(true) => " (dirty)",
        _ => "",
    };
    match GIT_COMMIT_HASH_SHORT {
        Some(hash) => {
            info!("Compiled on git commit hash: {hash}{dirty}");
        }
        None => info!("Compiled on git commit hash: <no git info>"),
    }
    if let Some(hr) = GIT_HEAD_REF {
        info!("            git head ref: {}", hr);
    }
    info!("            {}", BUILT_TIME_UTC);
    info!("         with compiler {}", RUSTC_VERSION);
    info!("");
}
