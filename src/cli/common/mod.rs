// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Common arguments for command-line interfaces. Every test subcommand talks
//! to a correlator, and most of them sweep tones and check thresholds, so
//! those arguments are shared between them.

mod printers;

pub(super) use printers::InfoPrinter;
pub(crate) use printers::{display_warnings, Warn};

use std::{borrow::Cow, path::PathBuf, time::Duration};

use clap::Args;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};
use thiserror::Error;

use super::CbfVerifyError;
use crate::{
    constants::*,
    freq::{CorrelatorConfig, CorrelatorFreqInfo, FreqPlanError},
    report::Report,
    sweep::SweepSettings,
    unit_parsing::{parse_freq_hz, parse_time_s, UnitParseError},
    verify::Thresholds,
};

lazy_static::lazy_static! {
    pub(super) static ref ARG_FILE_TYPES_COMMA_SEPARATED: String = ArgFileTypes::iter().join(", ");

    pub(super) static ref ARG_FILE_HELP: String =
        format!("All arguments may be specified in a file. Any CLI arguments override arguments set in the file. Supported formats: {}", *ARG_FILE_TYPES_COMMA_SEPARATED);

    static ref N_CHANS_HELP: String =
        format!("The number of frequency channels produced by the correlator. Default: {DEFAULT_N_CHANS}");

    static ref BANDWIDTH_HELP: String =
        format!("The processed bandwidth. Supports units (e.g. 856MHz); plain numbers are Hz. Default: {} MHz", DEFAULT_BANDWIDTH_HZ / 1e6);

    static ref SAMPLE_RATE_HELP: String =
        format!("The digitiser sample rate. Supports units (e.g. 1712MHz); plain numbers are Hz. Default: {} MHz", DEFAULT_SAMPLE_RATE_HZ / 1e6);

    static ref XENG_ACC_LEN_HELP: String =
        format!("The number of spectra accumulated inside the X-engine. Default: {DEFAULT_XENG_ACCUMULATION_LEN}");

    static ref ACC_LEN_HELP: String =
        format!("The number of X-engine accumulations in the vector accumulator. Default: {DEFAULT_ACCUMULATION_LEN}");

    static ref TIMEOUT_HELP: String =
        format!("How long to wait for each dump. Supports units (e.g. 500ms); plain numbers are seconds. Default: {DEFAULT_DUMP_TIMEOUT_S} s");

    static ref TONE_SCALE_HELP: String =
        format!("The amplitude scale of test tones, between 0 and 1. Default: {DEFAULT_TONE_SCALE}");

    static ref RIPPLE_HELP: String =
        format!("The largest acceptable in-channel ripple [dB]. Default: {DEFAULT_RIPPLE_THRESHOLD_DB}");

    static ref SFDR_CUTOFF_HELP: String =
        format!("Any channel responding within this much of the peak channel is a spurious response [dB]. Default: {DEFAULT_SFDR_CUTOFF_DB}");

    static ref DYNAMIC_RANGE_HELP: String =
        format!("The dynamic range shown on response plots [dB]. Default: {DEFAULT_DYNAMIC_RANGE_DB}");

    static ref CENTRAL_FRACTION_HELP: String =
        format!("The fraction of a channel's width, centred on the channel, used for peak-channel and ripple checks. Default: {DEFAULT_CENTRAL_FRACTION}");

    static ref OVERRANGE_HELP: String =
        format!("VACC outputs at or above this fraction of full scale are overranging. Default: {DEFAULT_OVERRANGE_FRACTION}");

    static ref CONSISTENCY_HELP: String =
        format!("The largest acceptable relative difference between dumps that should be identical. Default: {DEFAULT_CONSISTENCY_THRESHOLD:e}");

    static ref PHASE_TOLERANCE_HELP: String =
        format!("The largest acceptable difference between measured and expected phases [radians]. Default: {DEFAULT_PHASE_TOLERANCE}");
}

#[derive(Debug, Display, EnumIter, EnumString)]
pub(super) enum ArgFileTypes {
    #[strum(serialize = "toml")]
    Toml,
    #[strum(serialize = "json")]
    Json,
}

macro_rules! unpack_arg_file {
    ($arg_file:expr) => ({
        use std::{fs::File, io::Read, str::FromStr};

        use crate::cli::common::{ArgFileTypes, ARG_FILE_TYPES_COMMA_SEPARATED};

        debug!("Attempting to parse argument file {}", $arg_file.display());

        let mut contents = String::new();
        let arg_file_type = $arg_file
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .and_then(|e| ArgFileTypes::from_str(&e).ok());

        match arg_file_type {
            Some(ArgFileTypes::Toml) => {
                debug!("Parsing toml file...");
                let mut fh = File::open(&$arg_file)?;
                fh.read_to_string(&mut contents)?;
                match toml::from_str(&contents) {
                    Ok(p) => p,
                    Err(err) => {
                        return Err(CbfVerifyError::ArgFile(format!(
                            "Couldn't decode toml structure from {:?}:\n{err}",
                            $arg_file
                        )))
                    }
                }
            }
            Some(ArgFileTypes::Json) => {
                debug!("Parsing json file...");
                let mut fh = File::open(&$arg_file)?;
                fh.read_to_string(&mut contents)?;
                match serde_json::from_str(&contents) {
                    Ok(p) => p,
                    Err(err) => {
                        return Err(CbfVerifyError::ArgFile(format!(
                            "Couldn't decode json structure from {:?}:\n{err}",
                            $arg_file
                        )))
                    }
                }
            }

            _ => {
                return Err(CbfVerifyError::ArgFile(format!(
                    "Argument file '{:?}' doesn't have a recognised file extension! Valid extensions are: {}", $arg_file, *ARG_FILE_TYPES_COMMA_SEPARATED)
                ))
            }
        }
    });
}

#[derive(Error, Debug)]
pub(super) enum CommonArgsError {
    #[error("--{arg} must be positive (got {value})")]
    NotPositive { arg: &'static str, value: f64 },

    #[error("--{arg} must be greater than 0 and at most 1 (got {value})")]
    BadFraction { arg: &'static str, value: f64 },

    #[error("--{arg} must be at least {min} (got {value})")]
    TooFew {
        arg: &'static str,
        min: usize,
        value: usize,
    },

    #[error(transparent)]
    UnitParse(#[from] UnitParseError),

    #[error(transparent)]
    Config(#[from] FreqPlanError),
}

fn check_positive(arg: &'static str, value: f64) -> Result<f64, CommonArgsError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(CommonArgsError::NotPositive { arg, value })
    }
}

fn check_fraction(arg: &'static str, value: f64) -> Result<f64, CommonArgsError> {
    if value > 0.0 && value <= 1.0 {
        Ok(value)
    } else {
        Err(CommonArgsError::BadFraction { arg, value })
    }
}

pub(super) fn check_at_least(
    arg: &'static str,
    min: usize,
    value: usize,
) -> Result<usize, CommonArgsError> {
    if value >= min {
        Ok(value)
    } else {
        Err(CommonArgsError::TooFew { arg, min, value })
    }
}

/// Arguments describing the correlator under test.
#[derive(Args, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(super) struct CorrelatorArgs {
    #[clap(long, help = N_CHANS_HELP.as_str(), help_heading = "CORRELATOR")]
    pub(super) n_chans: Option<usize>,

    #[clap(long, help = BANDWIDTH_HELP.as_str(), help_heading = "CORRELATOR")]
    pub(super) bandwidth: Option<String>,

    #[clap(long, help = SAMPLE_RATE_HELP.as_str(), help_heading = "CORRELATOR")]
    pub(super) sample_rate: Option<String>,

    #[clap(long, help = XENG_ACC_LEN_HELP.as_str(), help_heading = "CORRELATOR")]
    pub(super) xeng_acc_len: Option<usize>,

    #[clap(long, help = ACC_LEN_HELP.as_str(), help_heading = "CORRELATOR")]
    pub(super) acc_len: Option<usize>,
}

impl CorrelatorArgs {
    /// Merge arguments, preferring `self` over `other`.
    pub(super) fn merge(self, other: Self) -> Self {
        Self {
            n_chans: self.n_chans.or(other.n_chans),
            bandwidth: self.bandwidth.or(other.bandwidth),
            sample_rate: self.sample_rate.or(other.sample_rate),
            xeng_acc_len: self.xeng_acc_len.or(other.xeng_acc_len),
            acc_len: self.acc_len.or(other.acc_len),
        }
    }

    pub(super) fn parse(self) -> Result<(CorrelatorConfig, CorrelatorFreqInfo), CommonArgsError> {
        let Self {
            n_chans,
            bandwidth,
            sample_rate,
            xeng_acc_len,
            acc_len,
        } = self;

        let bandwidth_hz = match bandwidth {
            Some(b) => parse_freq_hz(&b)?,
            None => DEFAULT_BANDWIDTH_HZ,
        };
        let sample_rate_hz = match sample_rate {
            Some(s) => parse_freq_hz(&s)?,
            None => DEFAULT_SAMPLE_RATE_HZ,
        };
        let config = CorrelatorConfig {
            n_chans: n_chans.unwrap_or(DEFAULT_N_CHANS),
            bandwidth_hz,
            sample_rate_hz,
            xeng_accumulation_len: check_at_least(
                "xeng-acc-len",
                1,
                xeng_acc_len.unwrap_or(DEFAULT_XENG_ACCUMULATION_LEN),
            )?,
            accumulation_len: check_at_least(
                "acc-len",
                1,
                acc_len.unwrap_or(DEFAULT_ACCUMULATION_LEN),
            )?,
        };
        let freq_info = CorrelatorFreqInfo::new(&config)?;
        Ok((config, freq_info))
    }
}

/// Arguments controlling how signals are set and dumps are waited for.
#[derive(Args, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(super) struct SweepArgs {
    #[clap(long, help = TIMEOUT_HELP.as_str(), help_heading = "SWEEP")]
    pub(super) timeout: Option<String>,

    #[clap(long, help = TONE_SCALE_HELP.as_str(), help_heading = "SWEEP")]
    pub(super) tone_scale: Option<f64>,
}

impl SweepArgs {
    pub(super) fn merge(self, other: Self) -> Self {
        Self {
            timeout: self.timeout.or(other.timeout),
            tone_scale: self.tone_scale.or(other.tone_scale),
        }
    }

    pub(super) fn parse(self) -> Result<SweepSettings, CommonArgsError> {
        let timeout_s = match self.timeout {
            Some(t) => check_positive("timeout", parse_time_s(&t)?)?,
            None => DEFAULT_DUMP_TIMEOUT_S,
        };
        let tone_scale = check_fraction("tone-scale", self.tone_scale.unwrap_or(DEFAULT_TONE_SCALE))?;
        Ok(SweepSettings {
            timeout: Duration::from_secs_f64(timeout_s),
            tone_scale,
        })
    }
}

/// Pass/fail thresholds. Each test only looks at the thresholds relevant to
/// it.
#[derive(Args, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(super) struct ThresholdArgs {
    #[clap(long, help = RIPPLE_HELP.as_str(), help_heading = "THRESHOLDS")]
    pub(super) ripple_threshold: Option<f64>,

    #[clap(long, help = SFDR_CUTOFF_HELP.as_str(), help_heading = "THRESHOLDS")]
    pub(super) sfdr_cutoff: Option<f64>,

    #[clap(long, help = DYNAMIC_RANGE_HELP.as_str(), help_heading = "THRESHOLDS")]
    pub(super) dynamic_range: Option<f64>,

    #[clap(long, help = CENTRAL_FRACTION_HELP.as_str(), help_heading = "THRESHOLDS")]
    pub(super) central_fraction: Option<f64>,

    #[clap(long, help = OVERRANGE_HELP.as_str(), help_heading = "THRESHOLDS")]
    pub(super) overrange_fraction: Option<f64>,

    #[clap(long, help = CONSISTENCY_HELP.as_str(), help_heading = "THRESHOLDS")]
    pub(super) consistency_threshold: Option<f64>,

    #[clap(long, help = PHASE_TOLERANCE_HELP.as_str(), help_heading = "THRESHOLDS")]
    pub(super) phase_tolerance: Option<f64>,
}

impl ThresholdArgs {
    pub(super) fn merge(self, other: Self) -> Self {
        Self {
            ripple_threshold: self.ripple_threshold.or(other.ripple_threshold),
            sfdr_cutoff: self.sfdr_cutoff.or(other.sfdr_cutoff),
            dynamic_range: self.dynamic_range.or(other.dynamic_range),
            central_fraction: self.central_fraction.or(other.central_fraction),
            overrange_fraction: self.overrange_fraction.or(other.overrange_fraction),
            consistency_threshold: self.consistency_threshold.or(other.consistency_threshold),
            phase_tolerance: self.phase_tolerance.or(other.phase_tolerance),
        }
    }

    pub(super) fn parse(self) -> Result<Thresholds, CommonArgsError> {
        let d = Thresholds::default();
        Ok(Thresholds {
            ripple_db: check_positive("ripple-threshold", self.ripple_threshold.unwrap_or(d.ripple_db))?,
            sfdr_cutoff_db: check_positive("sfdr-cutoff", self.sfdr_cutoff.unwrap_or(d.sfdr_cutoff_db))?,
            dynamic_range_db: check_positive("dynamic-range", self.dynamic_range.unwrap_or(d.dynamic_range_db))?,
            central_fraction: check_fraction(
                "central-fraction",
                self.central_fraction.unwrap_or(d.central_fraction),
            )?,
            overrange_fraction: check_fraction(
                "overrange-fraction",
                self.overrange_fraction.unwrap_or(d.overrange_fraction),
            )?,
            consistency: check_positive(
                "consistency-threshold",
                self.consistency_threshold.unwrap_or(d.consistency),
            )?,
            phase_tolerance: check_positive(
                "phase-tolerance",
                self.phase_tolerance.unwrap_or(d.phase_tolerance),
            )?,
        })
    }
}

/// Print the setup of a test.
pub(super) fn print_setup(test: &str, freq_info: &CorrelatorFreqInfo, extra: Vec<Cow<'static, str>>) {
    let mut printer = InfoPrinter::new(format!("{test} setup").into());
    printer.push_block(vec![
        format!(
            "{} channels over {:.3} MHz ({:.3} kHz each)",
            freq_info.n_chans,
            freq_info.bandwidth / 1e6,
            freq_info.delta_f / 1e3
        )
        .into(),
        format!("Sample rate {:.3} MHz", freq_info.sample_freq / 1e6).into(),
        format!(
            "{} spectra per X-engine accumulation",
            freq_info.xeng_accumulation_len
        )
        .into(),
    ]);
    if !extra.is_empty() {
        printer.push_block(extra);
    }
    printer.display();
}

/// Print the outcomes of a test. If any check failed, the result is an
/// error.
pub(super) fn finish_report(report: &Report) -> Result<(), CbfVerifyError> {
    let mut printer = InfoPrinter::new(format!("{} results", report.name).into());
    let lines = report
        .outcomes()
        .map(|o| {
            let verdict = if o.passed {
                console::style("PASSED").green()
            } else {
                console::style("FAILED").red()
            };
            Cow::from(format!("{verdict} {}", o.message))
        })
        .collect::<Vec<_>>();
    if !lines.is_empty() {
        printer.push_block(lines);
    }
    let num_passed = report.num_passed();
    let num_failed = report.num_failed();
    printer.push_line(format!("{num_passed} passed, {num_failed} failed").into());
    printer.display();

    if num_failed > 0 {
        Err(CbfVerifyError::VerificationFailed {
            test: report.name.clone(),
            num_failed,
            num_checks: num_passed + num_failed,
        })
    } else {
        Ok(())
    }
}

/// Where plots go, if anywhere.
#[derive(Args, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(super) struct PlotArgs {
    /// Write plots into this directory. Only available if compiled with the
    /// "plotting" feature.
    #[clap(long, parse(from_os_str), help_heading = "OUTPUT")]
    pub(super) plot_dir: Option<PathBuf>,
}

impl PlotArgs {
    pub(super) fn merge(self, other: Self) -> Self {
        Self {
            plot_dir: self.plot_dir.or(other.plot_dir),
        }
    }
}
