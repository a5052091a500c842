// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Vector accumulator: the sum over several accumulation lengths must be
//! exactly what the requantised spectrum predicts.

use std::path::PathBuf;

use clap::Parser;
use itertools::Itertools;
use log::{debug, info, trace};
use serde::{Deserialize, Serialize};

use super::common::{
    display_warnings, finish_report, print_setup, CorrelatorArgs, SweepArgs, Warn, ARG_FILE_HELP,
};
use crate::{
    constants::{DEFAULT_VACC_ACC_TIMES_S, DEFAULT_VACC_EQ_SCALING, VACC_FULL_RANGE},
    freq::{CorrelatorConfig, CorrelatorFreqInfo},
    report::Report,
    sim::SimulatedCorrelator,
    sweep::{vacc_dumps, SweepSettings},
    unit_parsing::{parse_freq_hz, parse_time_s},
    verify::vacc::{
        accumulation_lengths, check_quantiser_spectrum, check_vacc_response,
        expected_vacc_response, vacc_offset,
    },
    CbfVerifyError,
};

lazy_static::lazy_static! {
    static ref ACC_TIMES_HELP: String =
        format!("Accumulation times to test. Supports units (e.g. 50ms); plain numbers are seconds. Default: {}", DEFAULT_VACC_ACC_TIMES_S.iter().join(" "));

    static ref EQ_SCALING_HELP: String =
        format!("The equalisation gain of the test channel. Default: {DEFAULT_VACC_EQ_SCALING}");
}

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct VaccArgs {
    #[clap(name = "ARGUMENTS_FILE", help = ARG_FILE_HELP.as_str(), parse(from_os_str))]
    args_file: Option<PathBuf>,

    /// The frequency of the test tone. Supports units (e.g. 428MHz); plain
    /// numbers are Hz. Default: half the bandwidth
    #[clap(long)]
    test_freq: Option<String>,

    #[clap(long, multiple_values(true), help = ACC_TIMES_HELP.as_str())]
    acc_times: Option<Vec<String>>,

    #[clap(long, help = EQ_SCALING_HELP.as_str())]
    eq_scaling: Option<f64>,

    #[clap(flatten)]
    #[serde(rename = "correlator")]
    #[serde(default)]
    correlator_args: CorrelatorArgs,

    #[clap(flatten)]
    #[serde(rename = "sweep")]
    #[serde(default)]
    sweep_args: SweepArgs,
}

impl VaccArgs {
    pub(super) fn merge(self) -> Result<VaccArgs, CbfVerifyError> {
        debug!("Merging command-line arguments with the argument file");

        let cli_args = self;

        if let Some(arg_file) = cli_args.args_file {
            let file_args: VaccArgs = unpack_arg_file!(arg_file);
            Ok(VaccArgs {
                args_file: None,
                test_freq: cli_args.test_freq.or(file_args.test_freq),
                acc_times: cli_args.acc_times.or(file_args.acc_times),
                eq_scaling: cli_args.eq_scaling.or(file_args.eq_scaling),
                correlator_args: cli_args.correlator_args.merge(file_args.correlator_args),
                sweep_args: cli_args.sweep_args.merge(file_args.sweep_args),
            })
        } else {
            Ok(cli_args)
        }
    }

    fn parse(self) -> Result<VaccParams, CbfVerifyError> {
        let VaccArgs {
            args_file: _,
            test_freq,
            acc_times,
            eq_scaling,
            correlator_args,
            sweep_args,
        } = self;

        let (config, freq_info) = correlator_args.parse()?;
        let settings = sweep_args.parse()?;
        let test_freq = match test_freq {
            Some(f) => parse_freq_hz(&f)?,
            None => freq_info.bandwidth / 2.0,
        };
        if !(0.0..=freq_info.bandwidth).contains(&test_freq) {
            return Err(CbfVerifyError::Args(format!(
                "--test-freq ({test_freq} Hz) must be within the band (0 to {} Hz)",
                freq_info.bandwidth
            )));
        }
        let eq_scaling = eq_scaling.unwrap_or(DEFAULT_VACC_EQ_SCALING);
        if !(eq_scaling.is_finite() && eq_scaling > 0.0) {
            return Err(CbfVerifyError::Args(format!(
                "--eq-scaling must be positive (got {eq_scaling})"
            )));
        }
        let acc_times = match acc_times {
            Some(times) => times
                .iter()
                .map(|t| parse_time_s(t))
                .collect::<Result<Vec<_>, _>>()?,
            None => DEFAULT_VACC_ACC_TIMES_S.to_vec(),
        };
        if acc_times.is_empty() {
            return Err(CbfVerifyError::Args(
                "No accumulation times were given".to_string(),
            ));
        }
        if let Some(t) = acc_times.iter().find(|t| !(t.is_finite() && **t > 0.0)) {
            return Err(CbfVerifyError::Args(format!(
                "Accumulation times must be positive (got {t})"
            )));
        }
        let acc_lens = accumulation_lengths(
            &acc_times,
            freq_info.fft_period,
            freq_info.xeng_accumulation_len,
        );

        print_setup(
            "VACC",
            &freq_info,
            vec![
                format!(
                    "Test tone at {:.6} MHz (channel {})",
                    test_freq / 1e6,
                    freq_info.closest_channel(test_freq)
                )
                .into(),
                format!("Equalisation gain {eq_scaling}").into(),
                format!("Accumulation lengths: {}", acc_lens.iter().join(", ")).into(),
            ],
        );

        Ok(VaccParams {
            config,
            freq_info,
            test_freq,
            eq_scaling,
            acc_lens,
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

struct VaccParams {
    config: CorrelatorConfig,
    freq_info: CorrelatorFreqInfo,
    test_freq: f64,
    eq_scaling: f64,
    acc_lens: Vec<usize>,
    settings: SweepSettings,
}

impl VaccParams {
    fn run(self) -> Result<(), CbfVerifyError> {
        let mut inst = SimulatedCorrelator::new(&self.config)?;
        let mut report = Report::new("VACC");

        let capture = vacc_dumps(
            &mut inst,
            &self.freq_info,
            self.test_freq,
            self.eq_scaling,
            &self.acc_lens,
            &self.settings,
            &mut report,
        )?;
        check_quantiser_spectrum(
            capture.quantiser_spectrum.view(),
            capture.test_chan,
            &mut report,
        );

        for (acc_len, dump) in &capture.dumps {
            let num_accumulations = self.freq_info.xeng_accumulation_len * acc_len;
            let expected = expected_vacc_response(capture.quantiser_spectrum.view(), num_accumulations);
            let max_expected = expected.iter().copied().fold(0.0, f64::max);
            if max_expected >= VACC_FULL_RANGE {
                format!(
                    "The expected response with accumulation length {acc_len} ({max_expected}) overflows the accumulator"
                )
                .warn();
            }

            let offset = vacc_offset(dump.xeng_raw.view());
            report.equals(
                &offset,
                &Some(0),
                format!("Check that the VACC output is not offset for accumulation length {acc_len}"),
            );
            check_vacc_response(expected.view(), dump.baseline(0), *acc_len, &mut report);
        }
        display_warnings();

        finish_report(&report)
    }
}
