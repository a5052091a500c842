// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

use crate::freq::FreqPlanError;

/// Errors from capturing data off an instrument.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaptureError {
    #[error("No dump was received within {timeout_s} s")]
    Timeout { timeout_s: f64 },

    #[error("The dump contained no x-engine data")]
    NoData,

    #[error("Expected x-engine data with shape {expected:?}, but got {got:?}")]
    Shape {
        expected: (usize, usize, usize),
        got: (usize, usize, usize),
    },

    #[error("Unknown correlator input '{0}'")]
    UnknownInput(String),
}

/// Errors from configuring an instrument.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ControlError {
    #[error("Unknown correlator input '{0}'")]
    UnknownInput(String),

    #[error("Cannot produce a tone at {freq} Hz; the digitiser covers 0 to {max} Hz")]
    BadFrequency { freq: f64, max: f64 },

    #[error("Signal scales must be between 0 and 1 (got {0})")]
    BadScale(f64),

    #[error("Expected {expected} equalisation gains, but got {got}")]
    BadEq { expected: usize, got: usize },

    #[error("The VACC accumulation length must be positive")]
    ZeroAccumulationLen,
}

#[derive(Error, Debug)]
pub enum SweepError {
    #[error(transparent)]
    InvalidRange(#[from] FreqPlanError),

    /// There's no sensible response to verify without a capture.
    #[error("Could not capture a dump while {during}: {source}")]
    IndeterminateCapture {
        during: String,
        #[source]
        source: CaptureError,
    },

    #[error(transparent)]
    Control(#[from] ControlError),

    #[error("The correlator has no baseline ({0}, {1})")]
    NoBaseline(String, String),

    #[error("The correlator needs at least two inputs for this test (it has {0})")]
    TooFewInputs(usize),
}
