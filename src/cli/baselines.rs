// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Every baseline must carry data, and zeroing an input must only zero the
//! baselines it's part of.

use std::path::PathBuf;

use clap::Parser;
use log::{debug, info, trace};
use serde::{Deserialize, Serialize};

use super::common::{
    display_warnings, finish_report, print_setup, CorrelatorArgs, SweepArgs, ARG_FILE_HELP,
};
use crate::{
    constants::DEFAULT_NOISE_SCALE,
    freq::{CorrelatorConfig, CorrelatorFreqInfo},
    report::Report,
    sim::SimulatedCorrelator,
    sweep::{product_baselines, SweepSettings},
    CbfVerifyError,
};

lazy_static::lazy_static! {
    static ref NOISE_SCALE_HELP: String =
        format!("The scale of the correlated noise, between 0 and 1. Default: {DEFAULT_NOISE_SCALE}");
}

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct BaselinesArgs {
    #[clap(name = "ARGUMENTS_FILE", help = ARG_FILE_HELP.as_str(), parse(from_os_str))]
    args_file: Option<PathBuf>,

    #[clap(long, help = NOISE_SCALE_HELP.as_str())]
    noise_scale: Option<f64>,

    #[clap(flatten)]
    #[serde(rename = "correlator")]
    #[serde(default)]
    correlator_args: CorrelatorArgs,

    #[clap(flatten)]
    #[serde(rename = "sweep")]
    #[serde(default)]
    sweep_args: SweepArgs,
}

impl BaselinesArgs {
    pub(super) fn merge(self) -> Result<BaselinesArgs, CbfVerifyError> {
        debug!("Merging command-line arguments with the argument file");

        let cli_args = self;

        if let Some(arg_file) = cli_args.args_file {
            let file_args: BaselinesArgs = unpack_arg_file!(arg_file);
            Ok(BaselinesArgs {
                args_file: None,
                noise_scale: cli_args.noise_scale.or(file_args.noise_scale),
                correlator_args: cli_args.correlator_args.merge(file_args.correlator_args),
                sweep_args: cli_args.sweep_args.merge(file_args.sweep_args),
            })
        } else {
            Ok(cli_args)
        }
    }

    fn parse(self) -> Result<BaselinesParams, CbfVerifyError> {
        let (config, freq_info) = self.correlator_args.parse()?;
        let settings = self.sweep_args.parse()?;
        let noise_scale = self.noise_scale.unwrap_or(DEFAULT_NOISE_SCALE);
        if !(noise_scale > 0.0 && noise_scale <= 1.0) {
            return Err(CbfVerifyError::Args(format!(
                "--noise-scale must be greater than 0 and at most 1 (got {noise_scale})"
            )));
        }

        print_setup(
            "Baselines",
            &freq_info,
            vec![format!("Noise scale: {noise_scale}").into()],
        );

        Ok(BaselinesParams {
            config,
            freq_info,
            noise_scale,
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

struct BaselinesParams {
    config: CorrelatorConfig,
    freq_info: CorrelatorFreqInfo,
    noise_scale: f64,
    settings: SweepSettings,
}

impl BaselinesParams {
    fn run(self) -> Result<(), CbfVerifyError> {
        let mut inst = SimulatedCorrelator::new(&self.config)?;
        let mut report = Report::new("baselines");

        let all_ok = product_baselines(
            &mut inst,
            &self.freq_info,
            self.noise_scale,
            &self.settings,
            &mut report,
        )?;
        debug!("Product baselines all OK: {all_ok}");

        finish_report(&report)
    }
}
