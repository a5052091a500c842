// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Channelisation and data-product verification for FPGA correlator/beamformers.

The computational core is split into a frequency-sweep planner ([freq]) and a
set of verifiers ([verify]) that are pure functions over already-captured
data. Driving an instrument happens in [sweep], through traits that are
implemented by the simulated instrument in [sim] (or anything else that can
produce x-engine dumps).
 */

pub mod constants;
pub mod flags;
pub mod freq;
pub mod plotting;
pub mod report;
pub mod sim;
pub mod spectrum;
pub mod sweep;
pub(crate) mod unit_parsing;
pub mod verify;

mod cli;

use crossbeam_utils::atomic::AtomicCell;

// Re-exports.
pub use cli::{CbfVerify, CbfVerifyError};
pub use freq::{calc_freq_samples, CorrelatorConfig, CorrelatorFreqInfo, FreqPlanError, FrequencyPlan};
pub use report::{Outcome, Report};
pub use spectrum::ChannelSpectrum;
pub use sweep::{CaptureError, Dump, DumpReceiver, SignalGenerator, SweepError};
pub use verify::{ChannelResponseVerifier, ResponseRecord, Thresholds};

#[allow(non_camel_case_types)]
pub type c64 = num_complex::Complex64;

/// Should progress bars be drawn? Sweeps over every channel can take a long
/// time against real hardware.
pub(crate) static PROGRESS_BARS: AtomicCell<bool> = AtomicCell::new(false);
