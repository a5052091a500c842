// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error type for all cbf-verify-related errors. This should be the *only*
//! error enum that is publicly visible from the CLI.

use thiserror::Error;

use super::common::CommonArgsError;
use crate::{
    freq::FreqPlanError,
    plotting::PlotError,
    sweep::{ControlError, SweepError},
    unit_parsing::UnitParseError,
};

/// The *only* publicly visible error from the cbf-verify CLI. Each message
/// should include a hint, unless it's "generic".
#[derive(Error, Debug)]
pub enum CbfVerifyError {
    /// A problem with the requested frequency plan.
    #[error("{0}\n\nChannel indices start at 0; the test channel plus and minus the channels around it must all be valid channels.")]
    FreqPlan(String),

    /// A problem with the correlator configuration.
    #[error("{0}\n\nThe correlator needs at least one channel, and a positive bandwidth and sample rate.")]
    Config(String),

    /// A dump couldn't be captured, so no verdict was reached.
    #[error("{0}\n\nThe test is indeterminate; check that the correlator is producing data (try turning up verbosity with -v or -vv).")]
    Capture(String),

    /// The instrument refused a setting.
    #[error("{0}")]
    Control(String),

    /// A value on the command line or in an argument file couldn't be
    /// understood.
    #[error("{0}\n\nFrequencies may be given in Hz, kHz, MHz or GHz, and times in s or ms; numbers without units are Hz and seconds.")]
    Args(String),

    /// An error related to argument files.
    #[error("{0}\n\nArgument files use the same names as the long command-line flags (with underscores instead of dashes).")]
    ArgFile(String),

    /// An error related to plotting.
    #[error("{0}")]
    Plot(String),

    /// The test ran, but some of its checks failed.
    #[error("{num_failed} of {num_checks} checks failed in the {test} test")]
    VerificationFailed {
        test: String,
        num_failed: usize,
        num_checks: usize,
    },

    /// A generic error that can't be clarified further, e.g. IO errors.
    #[error("{0}")]
    Generic(String),
}

// When changing the error propagation below, ensure `Self::from(e)` uses the
// correct `e`!

impl From<FreqPlanError> for CbfVerifyError {
    fn from(e: FreqPlanError) -> Self {
        let s = e.to_string();
        match e {
            FreqPlanError::InvalidRange { .. } | FreqPlanError::ZeroSamplesPerChan => {
                Self::FreqPlan(s)
            }
            FreqPlanError::NoChannels
            | FreqPlanError::BadBandwidth(_)
            | FreqPlanError::BadSampleRate(_) => Self::Config(s),
        }
    }
}

impl From<SweepError> for CbfVerifyError {
    fn from(e: SweepError) -> Self {
        match e {
            SweepError::InvalidRange(e) => Self::from(e),
            SweepError::IndeterminateCapture { .. } => Self::Capture(e.to_string()),
            SweepError::Control(e) => Self::from(e),
            SweepError::NoBaseline(..) | SweepError::TooFewInputs(_) => {
                Self::Generic(e.to_string())
            }
        }
    }
}

impl From<ControlError> for CbfVerifyError {
    fn from(e: ControlError) -> Self {
        Self::Control(e.to_string())
    }
}

impl From<UnitParseError> for CbfVerifyError {
    fn from(e: UnitParseError) -> Self {
        Self::Args(e.to_string())
    }
}

impl From<CommonArgsError> for CbfVerifyError {
    fn from(e: CommonArgsError) -> Self {
        match e {
            CommonArgsError::UnitParse(e) => Self::from(e),
            CommonArgsError::Config(e) => Self::from(e),
            _ => Self::Args(e.to_string()),
        }
    }
}

impl From<PlotError> for CbfVerifyError {
    fn from(e: PlotError) -> Self {
        Self::Plot(e.to_string())
    }
}

impl From<std::io::Error> for CbfVerifyError {
    fn from(e: std::io::Error) -> Self {
        Self::Generic(e.to_string())
    }
}
