// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Print (and optionally save) the frequencies a channelisation sweep would
//! use, without touching an instrument.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::PathBuf,
};

use clap::Parser;
use log::{debug, info, trace};
use serde::{Deserialize, Serialize};

use super::common::{
    check_at_least, display_warnings, CorrelatorArgs, InfoPrinter, Warn, ARG_FILE_HELP,
};
use crate::{
    constants::{DEFAULT_CHANS_AROUND, DEFAULT_SAMPLES_PER_CHAN, DEFAULT_TEST_CHANNEL},
    freq::{CorrelatorFreqInfo, FrequencyPlan},
    CbfVerifyError,
};

lazy_static::lazy_static! {
    static ref TEST_CHAN_HELP: String =
        format!("The channel to plan a sweep over. Default: {DEFAULT_TEST_CHANNEL}");

    static ref SAMPLES_PER_CHAN_HELP: String =
        format!("The number of frequencies per channel. Default: {DEFAULT_SAMPLES_PER_CHAN}");

    static ref CHANS_AROUND_HELP: String =
        format!("The number of channels either side of the test channel to include. Default: {DEFAULT_CHANS_AROUND}");
}

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct FreqPlanArgs {
    #[clap(name = "ARGUMENTS_FILE", help = ARG_FILE_HELP.as_str(), parse(from_os_str))]
    args_file: Option<PathBuf>,

    #[clap(flatten)]
    #[serde(rename = "correlator")]
    #[serde(default)]
    correlator_args: CorrelatorArgs,

    #[clap(short, long, help = TEST_CHAN_HELP.as_str())]
    test_chan: Option<usize>,

    #[clap(short, long, help = SAMPLES_PER_CHAN_HELP.as_str())]
    samples_per_chan: Option<usize>,

    #[clap(short, long, help = CHANS_AROUND_HELP.as_str())]
    chans_around: Option<usize>,

    /// Write the planned frequencies [Hz] to this JSON file.
    #[clap(short, long, parse(from_os_str), help_heading = "OUTPUT")]
    output: Option<PathBuf>,
}

impl FreqPlanArgs {
    /// Both command-line and file arguments overlap in terms of what is
    /// available; this function consolidates everything that was specified
    /// into a single struct. Where applicable, it will prefer CLI parameters
    /// over those in the file.
    pub(super) fn merge(self) -> Result<FreqPlanArgs, CbfVerifyError> {
        debug!("Merging command-line arguments with the argument file");

        let cli_args = self;

        if let Some(arg_file) = cli_args.args_file {
            let file_args: FreqPlanArgs = unpack_arg_file!(arg_file);
            Ok(FreqPlanArgs {
                args_file: None,
                correlator_args: cli_args.correlator_args.merge(file_args.correlator_args),
                test_chan: cli_args.test_chan.or(file_args.test_chan),
                samples_per_chan: cli_args.samples_per_chan.or(file_args.samples_per_chan),
                chans_around: cli_args.chans_around.or(file_args.chans_around),
                output: cli_args.output.or(file_args.output),
            })
        } else {
            Ok(cli_args)
        }
    }

    fn parse(self) -> Result<FreqPlanParams, CbfVerifyError> {
        let FreqPlanArgs {
            args_file: _,
            correlator_args,
            test_chan,
            samples_per_chan,
            chans_around,
            output,
        } = self;

        let (_, freq_info) = correlator_args.parse()?;
        let test_chan = test_chan.unwrap_or(DEFAULT_TEST_CHANNEL);
        let samples_per_chan = check_at_least(
            "samples-per-chan",
            1,
            samples_per_chan.unwrap_or(DEFAULT_SAMPLES_PER_CHAN),
        )?;
        let chans_around = chans_around.unwrap_or(DEFAULT_CHANS_AROUND);
        let plan = freq_info.calc_freq_samples(test_chan, samples_per_chan, chans_around)?;

        if samples_per_chan % 2 == 0 {
            format!("An even number of samples per channel ({samples_per_chan}) means no frequency lands on a channel centre").warn();
        }

        Ok(FreqPlanParams {
            freq_info,
            test_chan,
            samples_per_chan,
            plan,
            output,
        })
    }

    pub(super) fn run(self, dry_run: bool) -> Result<(), CbfVerifyError> {
        debug!("Converting arguments into parameters");
        trace!("{:#?}", self);
        let params = self.parse()?;

        if dry_run {
            info!("Dry run -- exiting now.");
            display_warnings();
            return Ok(());
        }

        params.run()
    }
}

struct FreqPlanParams {
    freq_info: CorrelatorFreqInfo,
    test_chan: usize,
    samples_per_chan: usize,
    plan: FrequencyPlan,
    output: Option<PathBuf>,
}

impl FreqPlanParams {
    fn run(self) -> Result<(), CbfVerifyError> {
        let FreqPlanParams {
            freq_info,
            test_chan,
            samples_per_chan,
            plan,
            output,
        } = self;

        let mut printer = InfoPrinter::new("Frequency plan".into());
        printer.push_block(vec![
            format!(
                "Channel {test_chan} is centred on {:.6} MHz ({:.3} kHz wide)",
                freq_info.chan_freqs[test_chan] / 1e6,
                freq_info.delta_f / 1e3
            )
            .into(),
            format!(
                "{} frequencies over channels {} to {}, {samples_per_chan} per channel",
                plan.len(),
                plan.start_chan,
                plan.end_chan
            )
            .into(),
            format!(
                "From {:.6} MHz to {:.6} MHz",
                plan.first() / 1e6,
                plan.last() / 1e6
            )
            .into(),
        ]);
        printer.display();
        display_warnings();

        for (i, freq) in plan.iter().enumerate() {
            debug!(
                "{i:>5}: {freq:.3} Hz (channel {})",
                freq_info.closest_channel(*freq)
            );
        }

        if let Some(output) = output {
            let mut f = BufWriter::new(File::create(&output)?);
            serde_json::to_writer_pretty(&mut f, plan.freqs())
                .map_err(|e| CbfVerifyError::Generic(e.to_string()))?;
            f.flush()?;
            info!("Wrote frequency plan to {}", output.display());
        }

        Ok(())
    }
}
