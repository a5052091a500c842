// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Spurious-free dynamic range: a tone in every channel, with no other
//! channel allowed to respond strongly.

use std::path::PathBuf;

use clap::Parser;
use log::{debug, info, trace};
use serde::{Deserialize, Serialize};

use super::common::{
    display_warnings, finish_report, print_setup, CorrelatorArgs, PlotArgs, SweepArgs,
    ThresholdArgs, Warn, ARG_FILE_HELP,
};
use crate::{
    freq::{CorrelatorConfig, CorrelatorFreqInfo},
    plotting::plot_channel_response,
    report::Report,
    sim::SimulatedCorrelator,
    sweep::{sfdr_sweep, SweepSettings},
    verify::{ChannelResponseVerifier, Thresholds},
    CbfVerifyError,
};

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct SfdrArgs {
    #[clap(name = "ARGUMENTS_FILE", help = ARG_FILE_HELP.as_str(), parse(from_os_str))]
    args_file: Option<PathBuf>,

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

impl SfdrArgs {
    pub(super) fn merge(self) -> Result<SfdrArgs, CbfVerifyError> {
        debug!("Merging command-line arguments with the argument file");

        let cli_args = self;

        if let Some(arg_file) = cli_args.args_file {
            let file_args: SfdrArgs = unpack_arg_file!(arg_file);
            Ok(SfdrArgs {
                args_file: None,
                correlator_args: cli_args.correlator_args.merge(file_args.correlator_args),
                sweep_args: cli_args.sweep_args.merge(file_args.sweep_args),
                threshold_args: cli_args.threshold_args.merge(file_args.threshold_args),
                plot_args: cli_args.plot_args.merge(file_args.plot_args),
            })
        } else {
            Ok(cli_args)
        }
    }

    fn parse(self) -> Result<SfdrParams, CbfVerifyError> {
        let (config, freq_info) = self.correlator_args.parse()?;
        let settings = self.sweep_args.parse()?;
        let thresholds = self.threshold_args.parse()?;
        if cfg!(not(feature = "plotting")) && self.plot_args.plot_dir.is_some() {
            "cbf-verify was compiled without the \"plotting\" feature; no plots will be made".warn();
        }

        print_setup(
            "SFDR",
            &freq_info,
            vec![
                format!(
                    "A tone in each of channels 1 to {}",
                    freq_info.n_chans.saturating_sub(1)
                )
                .into(),
                format!("Spurious cutoff: {} dB", thresholds.sfdr_cutoff_db).into(),
            ],
        );

        Ok(SfdrParams {
            config,
            freq_info,
            settings,
            thresholds,
            plot_dir: self.plot_args.plot_dir,
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

struct SfdrParams {
    config: CorrelatorConfig,
    freq_info: CorrelatorFreqInfo,
    settings: SweepSettings,
    thresholds: Thresholds,
    plot_dir: Option<PathBuf>,
}

impl SfdrParams {
    fn run(self) -> Result<(), CbfVerifyError> {
        let mut inst = SimulatedCorrelator::new(&self.config)?;
        let mut report = Report::new("SFDR");

        let records = sfdr_sweep(&mut inst, &self.freq_info, &self.settings, &mut report)?;
        let verifier = ChannelResponseVerifier::new(&self.freq_info, self.thresholds);
        let summary = verifier.check_sfdr(&records, &mut report);
        info!(
            "{} of {} channels had spurious responses",
            summary.num_spurious_records(),
            records.len()
        );
        for (record, extra) in records.iter().zip(summary.extra_peaks.iter()) {
            if !extra.is_empty() {
                debug!("Channel {}: spurious responses in {extra:?}", record.channel);
            }
        }

        let worst = verifier.worst_sfdr_record(&records);
        if let Some((record, level)) = worst {
            info!(
                "Strongest spurious response: {level:.1} dB relative to the peak (channel {})",
                record.channel
            );
        }
        if cfg!(feature = "plotting") {
            if let (Some(plot_dir), Some((record, _))) = (&self.plot_dir, worst) {
                if let Some(data) = verifier.sfdr_plot_data(record) {
                    let path = plot_dir.join(format!("sfdr_channel_{}_response.png", record.channel));
                    plot_channel_response(&data, &path)?;
                    info!("Wrote {}", path.display());
                }
            }
        }

        finish_report(&report)
    }
}
