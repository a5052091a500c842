// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! X-engine flags must be raised for exactly the dump in which their
//! condition was raised.

use std::{borrow::Cow, path::PathBuf};

use clap::Parser;
use itertools::Itertools;
use log::{debug, info, trace};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use super::common::{
    display_warnings, finish_report, CorrelatorArgs, InfoPrinter, SweepArgs, ARG_FILE_HELP,
};
use crate::{
    flags::{check_flag_dumps, XengFlag},
    freq::CorrelatorConfig,
    report::Report,
    sim::SimulatedCorrelator,
    sweep::{flag_dumps, SweepSettings},
    CbfVerifyError,
};

lazy_static::lazy_static! {
    static ref FLAGS_HELP: String =
        format!("The flags to test. Values: {}. Default: all of them", XengFlag::iter().map(flag_arg_name).join(", "));
}

/// How a flag is named on the command line.
fn flag_arg_name(flag: XengFlag) -> String {
    flag.to_string().replace(' ', "-")
}

/// The condition that is raised to trigger a flag.
fn condition(flag: XengFlag) -> &'static str {
    match flag {
        XengFlag::Overrange => "ADC overrange",
        XengFlag::NoiseDiode => "the noise diode",
        XengFlag::Corruption => "fake data corruption",
    }
}

fn parse_flag(s: &str) -> Result<XengFlag, CbfVerifyError> {
    let normalised = s.trim().to_lowercase().replace(['_', ' '], "-");
    XengFlag::iter()
        .find(|&f| flag_arg_name(f) == normalised)
        .ok_or_else(|| {
            CbfVerifyError::Args(format!(
                "Unknown flag '{s}'; valid flags are {}",
                XengFlag::iter().map(flag_arg_name).join(", ")
            ))
        })
}

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct FlagsArgs {
    #[clap(name = "ARGUMENTS_FILE", help = ARG_FILE_HELP.as_str(), parse(from_os_str))]
    args_file: Option<PathBuf>,

    #[clap(short, long, multiple_values(true), help = FLAGS_HELP.as_str())]
    flags: Option<Vec<String>>,

    #[clap(flatten)]
    #[serde(rename = "correlator")]
    #[serde(default)]
    correlator_args: CorrelatorArgs,

    #[clap(flatten)]
    #[serde(rename = "sweep")]
    #[serde(default)]
    sweep_args: SweepArgs,
}

impl FlagsArgs {
    pub(super) fn merge(self) -> Result<FlagsArgs, CbfVerifyError> {
        debug!("Merging command-line arguments with the argument file");

        let cli_args = self;

        if let Some(arg_file) = cli_args.args_file {
            let file_args: FlagsArgs = unpack_arg_file!(arg_file);
            Ok(FlagsArgs {
                args_file: None,
                flags: cli_args.flags.or(file_args.flags),
                correlator_args: cli_args.correlator_args.merge(file_args.correlator_args),
                sweep_args: cli_args.sweep_args.merge(file_args.sweep_args),
            })
        } else {
            Ok(cli_args)
        }
    }

    fn parse(self) -> Result<FlagsParams, CbfVerifyError> {
        let (config, _) = self.correlator_args.parse()?;
        let settings = self.sweep_args.parse()?;
        let flags: Vec<XengFlag> = match self.flags {
            Some(names) => names
                .iter()
                .map(|s| parse_flag(s))
                .collect::<Result<Vec<_>, _>>()?
                .into_iter()
                .unique()
                .collect(),
            None => XengFlag::iter().collect(),
        };
        if flags.is_empty() {
            return Err(CbfVerifyError::Args("No flags were given".to_string()));
        }

        let mut printer = InfoPrinter::new("Flags setup".into());
        printer.push_block(
            flags
                .iter()
                .map(|&f| Cow::from(format!("{f} (bit {}), triggered by {}", f.bit(), condition(f))))
                .collect(),
        );
        printer.display();

        Ok(FlagsParams {
            config,
            flags,
            settings,
        })
    }

    pub(super) fn run(self, dry_run: bool) -> Result<(), CbfVerifyError> {
        debug!("Converting arguments into parameters");
        trace!("{:#?}", self);
        let params = self.parse()?;
        display_warnings();

        if dry_run {
            info!("Dry run -- exiting now.");
            return Ok(());
        }

        params.run()
    }
}

struct FlagsParams {
    config: CorrelatorConfig,
    flags: Vec<XengFlag>,
    settings: SweepSettings,
}

impl FlagsParams {
    fn run(self) -> Result<(), CbfVerifyError> {
        let mut inst = SimulatedCorrelator::new(&self.config)?;
        let mut report = Report::new("flags");

        for flag in self.flags {
            let condition = condition(flag);
            let (before, during, after) =
                flag_dumps(&mut inst, flag, condition, &self.settings, &mut report)?;
            debug!("Flag words: {before:#x} {during:#x} {after:#x}");
            check_flag_dumps(&mut report, flag, condition, before, during, after);
        }

        finish_report(&report)
    }
}
