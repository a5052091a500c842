// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Useful constants.

All constants *must* be double precision. Responses are handled in double
precision from the moment they leave the x-engine integers.
 */

pub use std::f64::consts::{PI, TAU};

/// The maximum range of the integers coming out of the vector accumulator.
pub const VACC_FULL_RANGE: f64 = 2147483648.0; // 2^31

/// Default acceptable in-channel ripple [dB].
pub const DEFAULT_RIPPLE_THRESHOLD_DB: f64 = 0.3;

/// Default spurious-response cutoff relative to the peak channel [dB].
pub const DEFAULT_SFDR_CUTOFF_DB: f64 = 20.0;

/// Default dynamic range rendered below the peak of a log response [dB].
pub const DEFAULT_DYNAMIC_RANGE_DB: f64 = 90.0;

/// The fraction of a channel's width (centred on the channel) used for the
/// peak-channel and ripple checks.
pub const DEFAULT_CENTRAL_FRACTION: f64 = 0.8;

/// VACC outputs at or above this fraction of the full range are considered
/// to be overranging.
pub const DEFAULT_OVERRANGE_FRACTION: f64 = 0.99;

/// Maximum relative difference between dumps that should be identical
/// (-70 dB).
pub const DEFAULT_CONSISTENCY_THRESHOLD: f64 = 1e-7;

/// Absolute tolerance when comparing measured and expected phases [radians].
pub const DEFAULT_PHASE_TOLERANCE: f64 = 0.01;

/// The amplitude scale of the test tone used for channelisation sweeps.
pub const DEFAULT_TONE_SCALE: f64 = 0.125;

/// The requantiser outputs signed 8-bit integers, but snapshots normalise them
/// to [-1, 1). Multiply by this to get the integers back.
pub const QUANTISER_DENORM: f64 = 128.0;

/// The channel that channelisation sweeps are centred on when the user
/// doesn't specify one.
pub const DEFAULT_TEST_CHANNEL: usize = 1500;

/// How long to wait for a clean dump before giving up [seconds].
pub const DEFAULT_DUMP_TIMEOUT_S: f64 = 10.0;

// MeerKAT L-band defaults.
pub const DEFAULT_N_CHANS: usize = 4096;
pub const DEFAULT_BANDWIDTH_HZ: f64 = 856e6;
pub const DEFAULT_SAMPLE_RATE_HZ: f64 = 1712e6;
pub const DEFAULT_XENG_ACCUMULATION_LEN: usize = 256;
pub const DEFAULT_ACCUMULATION_LEN: usize = 408;

/// Frequency samples per channel for a channelisation sweep.
pub const DEFAULT_SAMPLES_PER_CHAN: usize = 101;

/// Channels either side of the test channel covered by a channelisation
/// sweep.
pub const DEFAULT_CHANS_AROUND: usize = 2;

/// Frequency samples per channel when capturing back-to-back dumps.
pub const DEFAULT_BACK_TO_BACK_SAMPLES_PER_CHAN: usize = 9;

/// Dumps captured at each frequency when checking back-to-back consistency.
pub const DEFAULT_BACK_TO_BACK_DUMPS: usize = 3;

/// Frequency samples per channel when repeating frequency scans.
pub const DEFAULT_SCAN_SAMPLES_PER_CHAN: usize = 3;

/// The number of repeated frequency scans.
pub const DEFAULT_NUM_SCANS: usize = 3;

/// The scale of correlated noise for the delay and baseline tests.
pub const DEFAULT_NOISE_SCALE: f64 = 0.25;

/// The equalisation gain of the test channel in the VACC test.
pub const DEFAULT_VACC_EQ_SCALING: f64 = 30.0;

/// VACC accumulation times to test [seconds].
pub const DEFAULT_VACC_ACC_TIMES_S: [f64; 4] = [0.05, 0.1, 0.5, 1.0];
