// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Dumps taken with identical inputs must be identical, both back-to-back
//! and across repeated frequency scans.

use std::path::PathBuf;

use clap::Parser;
use log::{debug, info, trace};
use serde::{Deserialize, Serialize};

use super::common::{
    check_at_least, display_warnings, finish_report, print_setup, CorrelatorArgs, SweepArgs,
    ThresholdArgs, ARG_FILE_HELP,
};
use crate::{
    constants::{
        DEFAULT_BACK_TO_BACK_DUMPS, DEFAULT_BACK_TO_BACK_SAMPLES_PER_CHAN, DEFAULT_NUM_SCANS,
        DEFAULT_SCAN_SAMPLES_PER_CHAN, DEFAULT_TEST_CHANNEL,
    },
    freq::{CorrelatorConfig, CorrelatorFreqInfo},
    report::Report,
    sim::SimulatedCorrelator,
    sweep::{back_to_back_dumps, freq_scans, SweepSettings},
    verify::consistency::{check_back_to_back, check_freq_scans},
    CbfVerifyError,
};

/// Both halves of the test sweep the test channel and one channel either
/// side.
const CONSISTENCY_CHANS_AROUND: usize = 1;

lazy_static::lazy_static! {
    static ref TEST_CHAN_HELP: String =
        format!("The channel to test around. Default: {DEFAULT_TEST_CHANNEL}");

    static ref NUM_DUMPS_HELP: String =
        format!("The number of back-to-back dumps to compare at each frequency. Default: {DEFAULT_BACK_TO_BACK_DUMPS}");

    static ref B2B_SAMPLES_HELP: String =
        format!("The number of frequencies per channel for back-to-back dumps. Default: {DEFAULT_BACK_TO_BACK_SAMPLES_PER_CHAN}");

    static ref NUM_SCANS_HELP: String =
        format!("The number of repeated frequency scans to compare. Default: {DEFAULT_NUM_SCANS}");

    static ref SCAN_SAMPLES_HELP: String =
        format!("The number of frequencies per channel for each scan. Default: {DEFAULT_SCAN_SAMPLES_PER_CHAN}");
}

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct ConsistencyArgs {
    #[clap(name = "ARGUMENTS_FILE", help = ARG_FILE_HELP.as_str(), parse(from_os_str))]
    args_file: Option<PathBuf>,

    #[clap(short, long, help = TEST_CHAN_HELP.as_str())]
    test_chan: Option<usize>,

    #[clap(long, help = NUM_DUMPS_HELP.as_str())]
    num_dumps: Option<usize>,

    #[clap(long, help = B2B_SAMPLES_HELP.as_str())]
    back_to_back_samples_per_chan: Option<usize>,

    #[clap(long, help = NUM_SCANS_HELP.as_str())]
    num_scans: Option<usize>,

    #[clap(long, help = SCAN_SAMPLES_HELP.as_str())]
    scan_samples_per_chan: Option<usize>,

    #[clap(flatten)]
    #[serde(rename = "correlator")]
    #[serde(default)]
    correlator_args: CorrelatorArgs,

    #[clap(flatten)]
    #[serde(rename = "sweep")]
    #[serde(default)]
    sweep_args: SweepArgs,

    #[clap(flatten)]
    #[serde(rename = "thresholds")]
    #[serde(default)]
    threshold_args: ThresholdArgs,
}

impl ConsistencyArgs {
    pub(super) fn merge(self) -> Result<ConsistencyArgs, CbfVerifyError> {
        debug!("Merging command-line arguments with the argument file");

        let cli_args = self;

        if let Some(arg_file) = cli_args.args_file {
            let file_args: ConsistencyArgs = unpack_arg_file!(arg_file);
            Ok(ConsistencyArgs {
                args_file: None,
                test_chan: cli_args.test_chan.or(file_args.test_chan),
                num_dumps: cli_args.num_dumps.or(file_args.num_dumps),
                back_to_back_samples_per_chan: cli_args
                    .back_to_back_samples_per_chan
                    .or(file_args.back_to_back_samples_per_chan),
                num_scans: cli_args.num_scans.or(file_args.num_scans),
                scan_samples_per_chan: cli_args
                    .scan_samples_per_chan
                    .or(file_args.scan_samples_per_chan),
                correlator_args: cli_args.correlator_args.merge(file_args.correlator_args),
                sweep_args: cli_args.sweep_args.merge(file_args.sweep_args),
                threshold_args: cli_args.threshold_args.merge(file_args.threshold_args),
            })
        } else {
            Ok(cli_args)
        }
    }

    fn parse(self) -> Result<ConsistencyParams, CbfVerifyError> {
        let ConsistencyArgs {
            args_file: _,
            test_chan,
            num_dumps,
            back_to_back_samples_per_chan,
            num_scans,
            scan_samples_per_chan,
            correlator_args,
            sweep_args,
            threshold_args,
        } = self;

        let (config, freq_info) = correlator_args.parse()?;
        let settings = sweep_args.parse()?;
        let thresholds = threshold_args.parse()?;
        let test_chan = test_chan.unwrap_or(DEFAULT_TEST_CHANNEL);
        let num_dumps = check_at_least(
            "num-dumps",
            2,
            num_dumps.unwrap_or(DEFAULT_BACK_TO_BACK_DUMPS),
        )?;
        let num_scans = check_at_least("num-scans", 2, num_scans.unwrap_or(DEFAULT_NUM_SCANS))?;
        let b2b_spc = check_at_least(
            "back-to-back-samples-per-chan",
            1,
            back_to_back_samples_per_chan.unwrap_or(DEFAULT_BACK_TO_BACK_SAMPLES_PER_CHAN),
        )?;
        let scan_spc = check_at_least(
            "scan-samples-per-chan",
            1,
            scan_samples_per_chan.unwrap_or(DEFAULT_SCAN_SAMPLES_PER_CHAN),
        )?;
        let b2b_plan = freq_info.calc_freq_samples(test_chan, b2b_spc, CONSISTENCY_CHANS_AROUND)?;
        let scan_plan = freq_info.calc_freq_samples(test_chan, scan_spc, CONSISTENCY_CHANS_AROUND)?;

        print_setup(
            "Consistency",
            &freq_info,
            vec![
                format!(
                    "{num_dumps} back-to-back dumps at each of {} frequencies",
                    b2b_plan.len()
                )
                .into(),
                format!("{num_scans} scans of {} frequencies", scan_plan.len()).into(),
                format!("Threshold: {:e}", thresholds.consistency).into(),
            ],
        );

        Ok(ConsistencyParams {
            config,
            freq_info,
            test_chan,
            num_dumps,
            b2b_spc,
            num_scans,
            scan_spc,
            settings,
            threshold: thresholds.consistency,
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

struct ConsistencyParams {
    config: CorrelatorConfig,
    freq_info: CorrelatorFreqInfo,
    test_chan: usize,
    num_dumps: usize,
    b2b_spc: usize,
    num_scans: usize,
    scan_spc: usize,
    settings: SweepSettings,
    threshold: f64,
}

impl ConsistencyParams {
    fn run(self) -> Result<(), CbfVerifyError> {
        let mut inst = SimulatedCorrelator::new(&self.config)?;
        let mut report = Report::new("consistency");

        let captures = back_to_back_dumps(
            &mut inst,
            &self.freq_info,
            self.test_chan,
            self.b2b_spc,
            CONSISTENCY_CHANS_AROUND,
            self.num_dumps,
            &self.settings,
            &mut report,
        )?;
        let mut worst: f64 = 0.0;
        for (freq, dumps) in &captures {
            if let Some(diff) = check_back_to_back(dumps, self.threshold, *freq, &mut report) {
                worst = worst.max(diff);
            }
        }
        info!("Largest back-to-back difference: {worst:e}");

        let (freqs, scans) = freq_scans(
            &mut inst,
            &self.freq_info,
            self.test_chan,
            self.scan_spc,
            CONSISTENCY_CHANS_AROUND,
            self.num_scans,
            &self.settings,
            &mut report,
        )?;
        let worst = check_freq_scans(&scans, &freqs, self.threshold, &mut report);
        info!("Largest difference between scans: {worst:e}");

        finish_report(&report)
    }
}
