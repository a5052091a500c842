// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FreqPlanError {
    #[error("Cannot sweep channel {chan} with {chans_around} channel(s) either side; valid channel indices are 0 to {max_chan}")]
    InvalidRange {
        chan: usize,
        chans_around: usize,
        max_chan: usize,
    },

    #[error("At least one frequency sample per channel is required")]
    ZeroSamplesPerChan,

    #[error("The correlator must have at least one channel")]
    NoChannels,

    #[error("The correlator bandwidth must be positive and finite (got {0} Hz)")]
    BadBandwidth(f64),

    #[error("The correlator sample rate must be positive and finite (got {0} Hz)")]
    BadSampleRate(f64),
}
