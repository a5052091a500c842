// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Helpers to turn raw x-engine visibilities into channel responses.
//!
//! X-engine data comes as `[real, imag]` integer pairs; for a single
//! baseline this is a `(num_chans, 2)` array, and for a whole dump it is
//! `(num_chans, num_baselines, 2)`.


use std::collections::BTreeSet;

use ndarray::prelude::*;

use crate::{c64, constants::VACC_FULL_RANGE};

/// Convert `[real, imag]` pairs into complex numbers.
pub fn complexise(input_data: ArrayView2<i32>) -> Array1<c64> {
    input_data
        .outer_iter()
        .map(|pair| c64::new(pair[0] as f64, pair[1] as f64))
        .collect()
}

/// The magnitude of each `[real, imag]` pair.
pub fn magnitudes(input_data: ArrayView2<i32>) -> Array1<f64> {
    complexise(input_data).mapv(|c| c.norm())
}

/// Normalise VACC magnitudes to the VACC's full range.
pub fn normalise(magnitudes: ArrayView1<f64>) -> Array1<f64> {
    magnitudes.mapv(|m| m / VACC_FULL_RANGE)
}

/// The per-channel magnitude of a single baseline, normalised to the VACC's
/// full range.
pub fn normalised_magnitude(input_data: ArrayView2<i32>) -> ChannelSpectrum {
    ChannelSpectrum::new(normalise(magnitudes(input_data).view()))
}

/// Convert linear responses to dB, clipping anything more than
/// `dynamic_range` dB below the peak.
///
/// The peak is `normalise_to` if it's supplied, otherwise the largest value
/// in `data`. If `normalise` is true, the maximum of the clipped data is
/// subtracted so the peak sits at 0 dB. A response that is zero everywhere
/// has no peak; it is rendered as flat at `-dynamic_range`.
pub fn loggerise(
    data: ArrayView1<f64>,
    dynamic_range: f64,
    normalise: bool,
    normalise_to: Option<f64>,
) -> Array1<f64> {
    let mut log_data = data.mapv(|d| 10.0 * d.log10());
    let max_log = normalise_to.unwrap_or_else(|| max_finite(log_data.view()).unwrap_or(0.0));
    let min_log_clip = max_log - dynamic_range;
    log_data.mapv_inplace(|l| if l < min_log_clip || l.is_nan() { min_log_clip } else { l });
    if normalise {
        if let Some(max) = max_finite(log_data.view()) {
            log_data.mapv_inplace(|l| l - max);
        }
    }
    log_data
}

fn max_finite(data: ArrayView1<f64>) -> Option<f64> {
    data.iter()
        .copied()
        .filter(|d| d.is_finite())
        .fold(None, |acc, d| match acc {
            Some(m) if m >= d => Some(m),
            _ => Some(d),
        })
}

/// Linear magnitudes, one per frequency channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSpectrum(Array1<f64>);

impl ChannelSpectrum {
    pub fn new(magnitudes: Array1<f64>) -> ChannelSpectrum {
        ChannelSpectrum(magnitudes)
    }

    pub fn view(&self) -> ArrayView1<f64> {
        self.0.view()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The response in a single channel. `None` if the spectrum doesn't
    /// have that channel.
    pub fn response(&self, chan: usize) -> Option<f64> {
        self.0.get(chan).copied()
    }

    /// The response in a single channel [dB].
    pub fn response_db(&self, chan: usize) -> Option<f64> {
        self.response(chan).map(|r| 10.0 * r.log10())
    }

    /// Is every channel zero (or is there no data at all)?
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&m| m == 0.0)
    }

    /// The largest response in any channel.
    pub fn max(&self) -> Option<f64> {
        max_finite(self.0.view())
    }

    /// The channel with the largest response. The first such channel is
    /// returned on ties. `None` is returned if the spectrum is empty or zero
    /// everywhere; there is no meaningful peak in either case.
    pub fn peak_channel(&self) -> Option<usize> {
        if self.is_zero() {
            return None;
        }
        let mut peak = None;
        let mut peak_value = f64::NEG_INFINITY;
        for (i_chan, &m) in self.0.iter().enumerate() {
            if m > peak_value {
                peak = Some(i_chan);
                peak_value = m;
            }
        }
        peak
    }

    pub fn loggerise(&self, dynamic_range: f64) -> Array1<f64> {
        loggerise(self.0.view(), dynamic_range, false, None)
    }
}

/// Apply a test function to x-engine data one baseline at a time, returning
/// the indices of the baselines that match.
pub fn baseline_checker<F>(xeng_raw: ArrayView3<i32>, check_fn: F) -> BTreeSet<usize>
where
    F: Fn(ArrayView2<i32>) -> bool,
{
    xeng_raw
        .axis_iter(Axis(1))
        .enumerate()
        .filter(|(_, bl_data)| check_fn(bl_data.view()))
        .map(|(i_bl, _)| i_bl)
        .collect()
}

/// Baseline indices that have all-zero data.
pub fn zero_baselines(xeng_raw: ArrayView3<i32>) -> BTreeSet<usize> {
    baseline_checker(xeng_raw, |bl_data| bl_data.iter().all(|&v| v == 0))
}

/// Baseline indices that have some non-zero data.
pub fn nonzero_baselines(xeng_raw: ArrayView3<i32>) -> BTreeSet<usize> {
    baseline_checker(xeng_raw, |bl_data| bl_data.iter().any(|&v| v != 0))
}

/// Baseline indices that have non-zero data in every channel.
pub fn all_nonzero_baselines(xeng_raw: ArrayView3<i32>) -> BTreeSet<usize> {
    baseline_checker(xeng_raw, |bl_data| {
        bl_data
            .outer_iter()
            .all(|pair| pair.iter().any(|&v| v != 0))
    })
}
