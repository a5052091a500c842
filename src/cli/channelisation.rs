// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Sweep a tone across a channel and check the channel response.

use std::path::PathBuf;

use clap::Parser;
use log::{debug, info, trace};
use serde::{Deserialize, Serialize};

use super::common::{
    check_at_least, display_warnings, finish_report, print_setup, CorrelatorArgs, PlotArgs,
    SweepArgs, ThresholdArgs, Warn, ARG_FILE_HELP,
};
use crate::{
    constants::{DEFAULT_CHANS_AROUND, DEFAULT_SAMPLES_PER_CHAN, DEFAULT_TEST_CHANNEL},
    freq::{CorrelatorConfig, CorrelatorFreqInfo},
    plotting::plot_channel_response,
    report::Report,
    sim::SimulatedCorrelator,
    sweep::{channelisation_sweep, SweepSettings},
    verify::{ChannelResponseVerifier, Thresholds},
    CbfVerifyError,
};

lazy_static::lazy_static! {
    static ref TEST_CHAN_HELP: String =
        format!("The channel to sweep across. Default: {DEFAULT_TEST_CHANNEL}");

    static ref SAMPLES_PER_CHAN_HELP: String =
        format!("The number of frequencies to test per channel. Default: {DEFAULT_SAMPLES_PER_CHAN}");

    static ref CHANS_AROUND_HELP: String =
        format!("The number of neighbouring channels either side of the test channel to sweep. Default: {DEFAULT_CHANS_AROUND}");
}

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct ChannelisationArgs {
    #[clap(name = "ARGUMENTS_FILE", help = ARG_FILE_HELP.as_str(), parse(from_os_str))]
    args_file: Option<PathBuf>,

    #[clap(short, long, help = TEST_CHAN_HELP.as_str())]
    test_chan: Option<usize>,

    #[clap(short, long, help = SAMPLES_PER_CHAN_HELP.as_str())]
    samples_per_chan: Option<usize>,

    #[clap(short, long, help = CHANS_AROUND_HELP.as_str())]
    chans_around: Option<usize>,

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

    #[clap(flatten)]
    #[serde(rename = "plots")]
    #[serde(default)]
    plot_args: PlotArgs,
}

impl ChannelisationArgs {
    pub(super) fn merge(self) -> Result<ChannelisationArgs, CbfVerifyError> {
        debug!("Merging command-line arguments with the argument file");

        let cli_args = self;

        if let Some(arg_file) = cli_args.args_file {
            let file_args: ChannelisationArgs = unpack_arg_file!(arg_file);
            Ok(ChannelisationArgs {
                args_file: None,
                test_chan: cli_args.test_chan.or(file_args.test_chan),
                samples_per_chan: cli_args.samples_per_chan.or(file_args.samples_per_chan),
                chans_around: cli_args.chans_around.or(file_args.chans_around),
                correlator_args: cli_args.correlator_args.merge(file_args.correlator_args),
                sweep_args: cli_args.sweep_args.merge(file_args.sweep_args),
                threshold_args: cli_args.threshold_args.merge(file_args.threshold_args),
                plot_args: cli_args.plot_args.merge(file_args.plot_args),
            })
        } else {
            Ok(cli_args)
        }
    }

    fn parse(self) -> Result<ChannelisationParams, CbfVerifyError> {
        let ChannelisationArgs {
            args_file: _,
            test_chan,
            samples_per_chan,
            chans_around,
            correlator_args,
            sweep_args,
            threshold_args,
            plot_args,
        } = self;

        let (config, freq_info) = correlator_args.parse()?;
        let settings = sweep_args.parse()?;
        let thresholds = threshold_args.parse()?;
        let test_chan = test_chan.unwrap_or(DEFAULT_TEST_CHANNEL);
        let samples_per_chan = check_at_least(
            "samples-per-chan",
            1,
            samples_per_chan.unwrap_or(DEFAULT_SAMPLES_PER_CHAN),
        )?;
        let chans_around = chans_around.unwrap_or(DEFAULT_CHANS_AROUND);
        // Catch a bad plan before any signals are set.
        let plan = freq_info.calc_freq_samples(test_chan, samples_per_chan, chans_around)?;

        if samples_per_chan % 2 == 0 {
            format!("An even number of samples per channel ({samples_per_chan}) means the channel centre isn't tested").warn();
        }
        if cfg!(not(feature = "plotting")) && plot_args.plot_dir.is_some() {
            "cbf-verify was compiled without the \"plotting\" feature; no plots will be made".warn();
        }

        print_setup(
            "Channelisation",
            &freq_info,
            vec![
                format!(
                    "Test channel {test_chan} at {:.6} MHz",
                    freq_info.chan_freqs[test_chan] / 1e6
                )
                .into(),
                format!(
                    "{} frequencies over channels {} to {}",
                    plan.len(),
                    plan.start_chan,
                    plan.end_chan
                )
                .into(),
            ],
        );

        Ok(ChannelisationParams {
            config,
            freq_info,
            test_chan,
            samples_per_chan,
            chans_around,
            settings,
            thresholds,
            plot_dir: plot_args.plot_dir,
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

struct ChannelisationParams {
    config: CorrelatorConfig,
    freq_info: CorrelatorFreqInfo,
    test_chan: usize,
    samples_per_chan: usize,
    chans_around: usize,
    settings: SweepSettings,
    thresholds: Thresholds,
    plot_dir: Option<PathBuf>,
}

impl ChannelisationParams {
    fn run(self) -> Result<(), CbfVerifyError> {
        let mut inst = SimulatedCorrelator::new(&self.config)?;
        let mut report = Report::new("channelisation");

        let records = channelisation_sweep(
            &mut inst,
            &self.freq_info,
            self.test_chan,
            self.samples_per_chan,
            self.chans_around,
            &self.settings,
            &mut report,
        )?;
        info!("Captured {} channel responses", records.len());

        let verifier = ChannelResponseVerifier::new(&self.freq_info, self.thresholds);
        let summary = verifier.check_channelisation(&records, self.test_chan, &mut report);
        if let Some(ripple) = summary.ripple_db {
            info!("In-channel ripple: {ripple:.4} dB");
        }
        for mismatch in &summary.peak_mismatches {
            debug!(
                "{:.3} Hz peaked in {:?} instead of channel {}",
                mismatch.freq, mismatch.actual, mismatch.expected
            );
        }

        if cfg!(feature = "plotting") {
            if let Some(plot_dir) = &self.plot_dir {
                let chan = self.test_chan;
                for (central_only, name) in [
                    (false, format!("channel_{chan}_response.png")),
                    (true, format!("channel_{chan}_central_response.png")),
                ] {
                    let Some(data) =
                        verifier.channel_response_plot_data(&records, chan, central_only)
                    else {
                        continue;
                    };
                    let path = plot_dir.join(name);
                    plot_channel_response(&data, &path)?;
                    info!("Wrote {}", path.display());
                }
            }
        }

        finish_report(&report)
    }
}
