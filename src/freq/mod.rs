// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Correlator frequency information and the planning of test-tone sweeps.
//!
//! The first channel is centred on 0 Hz and channels are spaced by
//! `bandwidth / n_chans`; this is the layout produced by the F-engine PFB.

mod error;
#[cfg(test)]
mod tests;

pub use error::FreqPlanError;

use serde::{Deserialize, Serialize};
use vec1::Vec1;

use crate::constants::{
    DEFAULT_ACCUMULATION_LEN, DEFAULT_BANDWIDTH_HZ, DEFAULT_N_CHANS, DEFAULT_SAMPLE_RATE_HZ,
    DEFAULT_XENG_ACCUMULATION_LEN,
};

/// The subset of a correlator configuration needed to reason about
/// frequencies and accumulations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelatorConfig {
    /// The number of frequency channels produced by the F-engines.
    pub n_chans: usize,

    /// The processed bandwidth [Hz].
    pub bandwidth_hz: f64,

    /// The digitiser sample rate [Hz].
    pub sample_rate_hz: f64,

    /// The number of spectra accumulated inside the X-engine before the
    /// vector accumulator sees them.
    pub xeng_accumulation_len: usize,

    /// The number of X-engine accumulations in the vector accumulator.
    pub accumulation_len: usize,
}

impl Default for CorrelatorConfig {
    fn default() -> Self {
        Self {
            n_chans: DEFAULT_N_CHANS,
            bandwidth_hz: DEFAULT_BANDWIDTH_HZ,
            sample_rate_hz: DEFAULT_SAMPLE_RATE_HZ,
            xeng_accumulation_len: DEFAULT_XENG_ACCUMULATION_LEN,
            accumulation_len: DEFAULT_ACCUMULATION_LEN,
        }
    }
}

/// Frequency information derived from a [`CorrelatorConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelatorFreqInfo {
    pub n_chans: usize,

    /// [Hz]
    pub bandwidth: f64,

    /// The spacing between frequency channels [Hz].
    pub delta_f: f64,

    /// Channel centre frequencies [Hz].
    pub chan_freqs: Vec<f64>,

    /// [Hz]
    pub sample_freq: f64,

    /// [seconds]
    pub sample_period: f64,

    /// The time length of a single FFT [seconds].
    pub fft_period: f64,

    pub xeng_accumulation_len: usize,
}

impl CorrelatorFreqInfo {
    pub fn new(config: &CorrelatorConfig) -> Result<CorrelatorFreqInfo, FreqPlanError> {
        if config.n_chans == 0 {
            return Err(FreqPlanError::NoChannels);
        }
        if !(config.bandwidth_hz.is_finite() && config.bandwidth_hz > 0.0) {
            return Err(FreqPlanError::BadBandwidth(config.bandwidth_hz));
        }
        if !(config.sample_rate_hz.is_finite() && config.sample_rate_hz > 0.0) {
            return Err(FreqPlanError::BadSampleRate(config.sample_rate_hz));
        }

        let delta_f = config.bandwidth_hz / config.n_chans as f64;
        let chan_freqs = (0..config.n_chans)
            .map(|i_chan| i_chan as f64 * delta_f)
            .collect();
        let sample_period = config.sample_rate_hz.recip();

        Ok(CorrelatorFreqInfo {
            n_chans: config.n_chans,
            bandwidth: config.bandwidth_hz,
            delta_f,
            chan_freqs,
            sample_freq: config.sample_rate_hz,
            sample_period,
            fft_period: sample_period * 2.0 * config.n_chans as f64,
            xeng_accumulation_len: config.xeng_accumulation_len,
        })
    }

    /// Plan the frequencies to sweep over `chan`. See [`calc_freq_samples`].
    pub fn calc_freq_samples(
        &self,
        chan: usize,
        samples_per_chan: usize,
        chans_around: usize,
    ) -> Result<FrequencyPlan, FreqPlanError> {
        calc_freq_samples(
            chan,
            samples_per_chan,
            chans_around,
            self.delta_f,
            &self.chan_freqs,
        )
    }

    /// The index of the channel whose centre is closest to `freq`.
    pub fn closest_channel(&self, freq: f64) -> usize {
        let mut best = 0;
        let mut best_diff = f64::INFINITY;
        for (i_chan, &chan_freq) in self.chan_freqs.iter().enumerate() {
            let diff = (chan_freq - freq).abs();
            if diff < best_diff {
                best = i_chan;
                best_diff = diff;
            }
        }
        best
    }

    /// The lower and upper edges of a channel [Hz].
    pub fn channel_edges(&self, chan: usize) -> (f64, f64) {
        self.central_band(chan, 1.0)
    }

    /// The frequency range [Hz] spanning `fraction` of a channel's width,
    /// centred on the channel's centre. A fraction of 0.8 gives the "±40%"
    /// band. `chan` must be less than `n_chans`.
    pub fn central_band(&self, chan: usize, fraction: f64) -> (f64, f64) {
        let fc = self.chan_freqs[chan];
        let half_width = fraction * self.delta_f / 2.0;
        (fc - half_width, fc + half_width)
    }
}

/// An ordered set of test-tone frequencies [Hz] spanning one or more
/// channels.
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyPlan {
    freqs: Vec1<f64>,

    /// The first channel covered by the plan.
    pub start_chan: usize,

    /// The last channel covered by the plan (inclusive).
    pub end_chan: usize,
}

impl FrequencyPlan {
    pub fn freqs(&self) -> &[f64] {
        self.freqs.as_slice()
    }

    pub fn len(&self) -> usize {
        self.freqs.len()
    }

    /// Plans are never empty; this exists to keep clippy happy.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn first(&self) -> f64 {
        *self.freqs.first()
    }

    pub fn last(&self) -> f64 {
        *self.freqs.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, f64> {
        self.freqs.iter()
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.freqs.into_vec()
    }
}

impl<'a> IntoIterator for &'a FrequencyPlan {
    type Item = &'a f64;
    type IntoIter = std::slice::Iter<'a, f64>;

    fn into_iter(self) -> Self::IntoIter {
        self.freqs.iter()
    }
}

/// Calculate frequency points to sweep over a test channel.
///
/// `chans_around` extra channels are included either side of `chan`. If
/// `samples_per_chan` is 1, the result is the centre frequency of every
/// covered channel. Otherwise the points are evenly spaced from the lower
/// edge of the first covered channel to the upper edge of the last, so that
/// samples land on channel boundaries, and (with an odd `samples_per_chan`)
/// on channel centres too.
pub fn calc_freq_samples(
    chan: usize,
    samples_per_chan: usize,
    chans_around: usize,
    channel_width: f64,
    channel_centres: &[f64],
) -> Result<FrequencyPlan, FreqPlanError> {
    if samples_per_chan == 0 {
        return Err(FreqPlanError::ZeroSamplesPerChan);
    }
    let n_chans = channel_centres.len();
    if n_chans == 0 {
        return Err(FreqPlanError::NoChannels);
    }
    let invalid_range = || FreqPlanError::InvalidRange {
        chan,
        chans_around,
        max_chan: n_chans - 1,
    };
    let start_chan = chan.checked_sub(chans_around).ok_or_else(invalid_range)?;
    let end_chan = chan
        .checked_add(chans_around)
        .filter(|&end| end < n_chans)
        .ok_or_else(invalid_range)?;

    let freqs = if samples_per_chan == 1 {
        channel_centres[start_chan..=end_chan].to_vec()
    } else {
        let start_freq = channel_centres[start_chan] - channel_width / 2.0;
        let end_freq = channel_centres[end_chan] + channel_width / 2.0;
        let sample_spacing = channel_width / (samples_per_chan - 1) as f64;
        let num_samples = ((end_freq - start_freq) / sample_spacing).round() as usize + 1;
        linspace(start_freq, end_freq, num_samples)
    };

    Ok(FrequencyPlan {
        // There is always at least one covered channel.
        freqs: Vec1::try_from_vec(freqs).map_err(|_| invalid_range())?,
        start_chan,
        end_chan,
    })
}

/// Evenly spaced values over `[start, end]`, with `end` hit exactly.
fn linspace(start: f64, end: f64, num: usize) -> Vec<f64> {
    match num {
        0 => vec![],
        1 => vec![start],
        _ => {
            let step = (end - start) / (num - 1) as f64;
            (0..num)
                .map(|i| {
                    if i == num - 1 {
                        end
                    } else {
                        start + i as f64 * step
                    }
                })
                .collect()
        }
    }
}
