// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Checks over already-captured data.
//!
//! Nothing in here talks to an instrument. Every check pushes its outcome
//! into a [`Report`] and keeps going, so one sweep gives a complete picture
//! of what failed.

pub mod baselines;
pub mod consistency;
pub mod delay;
pub mod vacc;
#[cfg(test)]
mod tests;

use std::collections::BTreeSet;

use log::debug;
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    constants::*,
    freq::CorrelatorFreqInfo,
    report::Report,
    spectrum::{loggerise, ChannelSpectrum},
};

/// A captured channel response, along with the frequency that the signal
/// generator actually produced and the channel the tone was aimed at.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseRecord {
    /// The realised source frequency [Hz].
    pub freq: f64,

    /// The nominal channel of the source frequency.
    pub channel: usize,

    pub spectrum: ChannelSpectrum,
}

/// Limits used by the verifiers. These are test margins rather than hard
/// requirements, so all of them can be supplied by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// The maximum acceptable in-channel ripple [dB].
    pub ripple_db: f64,

    /// Responses within this many dB of the peak are spurious [dB].
    pub sfdr_cutoff_db: f64,

    /// The dynamic range of log plots [dB].
    pub dynamic_range_db: f64,

    /// The fraction of a channel's width, centred on the channel, used for
    /// the peak-channel and ripple checks.
    pub central_fraction: f64,

    /// The fraction of VACC full-scale at which responses are considered to
    /// be overranging.
    pub overrange_fraction: f64,

    /// The maximum relative difference between dumps that should be
    /// identical.
    pub consistency: f64,

    /// The absolute tolerance when comparing phases [radians].
    pub phase_tolerance: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            ripple_db: DEFAULT_RIPPLE_THRESHOLD_DB,
            sfdr_cutoff_db: DEFAULT_SFDR_CUTOFF_DB,
            dynamic_range_db: DEFAULT_DYNAMIC_RANGE_DB,
            central_fraction: DEFAULT_CENTRAL_FRACTION,
            overrange_fraction: DEFAULT_OVERRANGE_FRACTION,
            consistency: DEFAULT_CONSISTENCY_THRESHOLD,
            phase_tolerance: DEFAULT_PHASE_TOLERANCE,
        }
    }
}

/// A source frequency within the central band of its channel that peaked
/// somewhere else (or nowhere).
#[derive(Debug, Clone, PartialEq)]
pub struct PeakMismatch {
    pub freq: f64,
    pub expected: usize,
    pub actual: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelisationSummary {
    pub peak_mismatches: Vec<PeakMismatch>,

    /// The number of records within the central band of the test channel.
    pub num_central: usize,

    /// The in-channel ripple over the central band [dB]. `None` if there
    /// were no central records.
    pub ripple_db: Option<f64>,

    /// The largest normalised response of the test channel over the central
    /// band.
    pub max_response: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SfdrSummary {
    /// The peak channel of each record.
    pub peak_channels: Vec<Option<usize>>,

    /// The spurious channels of each record.
    pub extra_peaks: Vec<BTreeSet<usize>>,
}

impl SfdrSummary {
    pub fn num_spurious_records(&self) -> usize {
        self.extra_peaks.iter().filter(|e| !e.is_empty()).count()
    }
}

/// Vertical markers for a single channel on a response plot [Hz].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelMarkers {
    pub centre: f64,

    /// The edges of the central band (±40% of the channel width by default).
    pub central: (f64, f64),

    /// The channel edges (±50%).
    pub edges: (f64, f64),
}

/// Everything needed to draw a channel response against frequency.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponsePlotData {
    pub title: String,

    /// What the frequencies are.
    pub x_desc: &'static str,

    /// [Hz]
    pub freqs: Vec<f64>,

    /// Log responses, one per frequency [dB].
    pub responses_db: Array1<f64>,

    pub markers: ChannelMarkers,

    /// An optional horizontal line [dB].
    pub cutoff_db: Option<f64>,
}

const SOURCE_FREQ_DESC: &str = "Source frequency (MHz)";
const CHANNEL_FREQ_DESC: &str = "Channel frequency (MHz)";

/// The channels of a spectrum (other than `peak`) whose response is within
/// `cutoff_db` of the peak's.
pub fn extra_peaks(spectrum: &ChannelSpectrum, peak: usize, cutoff_db: f64) -> BTreeSet<usize> {
    let Some(peak_response) = spectrum.response(peak) else {
        return BTreeSet::new();
    };
    let unwanted_cutoff = peak_response / 10_f64.powf(cutoff_db / 10.0);
    spectrum
        .view()
        .iter()
        .enumerate()
        .filter(|&(i_chan, &resp)| i_chan != peak && resp >= unwanted_cutoff)
        .map(|(i_chan, _)| i_chan)
        .collect()
}

/// The strongest response outside a spectrum's peak channel, relative to
/// the peak [dB]. `None` if there's no peak or only one channel.
pub fn spur_level_db(spectrum: &ChannelSpectrum) -> Option<f64> {
    let peak = spectrum.peak_channel()?;
    let peak_response = spectrum.response(peak)?;
    let spur = spectrum
        .view()
        .iter()
        .enumerate()
        .filter(|&(i_chan, _)| i_chan != peak)
        .map(|(_, &resp)| resp)
        .fold(None, |acc: Option<f64>, r| Some(acc.map_or(r, |a| a.max(r))))?;
    Some(10.0 * (spur / peak_response).log10())
}

/// The spread of some responses [dB]. `None` if there are no responses.
pub fn ripple_db<I: IntoIterator<Item = f64>>(responses_db: I) -> Option<f64> {
    responses_db
        .into_iter()
        .fold(None, |acc, r| match acc {
            None => Some((r, r)),
            Some((min, max)) => Some((min.min(r), max.max(r))),
        })
        .map(|(min, max)| max - min)
}

/// Checks the response of the channeliser to swept test tones.
pub struct ChannelResponseVerifier<'a> {
    freq_info: &'a CorrelatorFreqInfo,
    pub thresholds: Thresholds,
}

impl<'a> ChannelResponseVerifier<'a> {
    pub fn new(freq_info: &'a CorrelatorFreqInfo, thresholds: Thresholds) -> Self {
        Self {
            freq_info,
            thresholds,
        }
    }

    pub fn freq_info(&self) -> &CorrelatorFreqInfo {
        self.freq_info
    }

    /// Is `freq` within the central band of `chan`? Always false if `chan`
    /// isn't one of the correlator's channels.
    pub fn is_central(&self, freq: f64, chan: usize) -> bool {
        if chan >= self.freq_info.n_chans {
            return false;
        }
        let (lo, hi) = self
            .freq_info
            .central_band(chan, self.thresholds.central_fraction);
        (lo..=hi).contains(&freq)
    }

    /// The records whose spectra cover every channel and whose nominal
    /// channel exists. Every other record is a failure in `report`.
    fn usable_records<'r>(
        &self,
        records: &'r [ResponseRecord],
        report: &mut Report,
    ) -> Vec<&'r ResponseRecord> {
        let n_chans = self.freq_info.n_chans;
        records
            .iter()
            .filter(|record| {
                if record.spectrum.len() != n_chans {
                    report.failed(format!(
                        "The response to {:.3} Hz has {} channels; expected {n_chans}",
                        record.freq,
                        record.spectrum.len()
                    ));
                    false
                } else if record.channel >= n_chans {
                    report.failed(format!(
                        "The response to {:.3} Hz is attributed to channel {}, but there are only {n_chans} channels",
                        record.freq, record.channel
                    ));
                    false
                } else {
                    true
                }
            })
            .collect()
    }

    /// Check the records of a channelisation sweep around `test_chan`.
    ///
    /// * Every record whose source frequency is within the central band of
    ///   its nominal channel must peak in that channel;
    /// * the test channel must not be overranging over its central band;
    /// * the ripple of the test channel over its central band must be below
    ///   the ripple threshold.
    ///
    /// Records that don't fit the correlator's channels are failures and
    /// are otherwise ignored.
    pub fn check_channelisation(
        &self,
        records: &[ResponseRecord],
        test_chan: usize,
        report: &mut Report,
    ) -> ChannelisationSummary {
        let records = self.usable_records(records, report);
        let mut peak_mismatches = vec![];
        let mut zero_freqs = vec![];
        for record in &records {
            if !self.is_central(record.freq, record.channel) {
                continue;
            }
            let peak = record.spectrum.peak_channel();
            if peak.is_none() {
                zero_freqs.push(record.freq);
            }
            if peak != Some(record.channel) {
                debug!(
                    "Source freq {} Hz peaked in channel {:?}, not {}",
                    record.freq, peak, record.channel
                );
                peak_mismatches.push(PeakMismatch {
                    freq: record.freq,
                    expected: record.channel,
                    actual: peak,
                });
            }
        }
        let pct = self.central_pct();
        report.equals(
            &zero_freqs,
            &vec![],
            format!("Check that no channel response within ±{pct}% of a channel centre is zero"),
        );
        report.equals(
            &peak_mismatches.len(),
            &0,
            format!("Check that every source frequency within ±{pct}% of a channel centre peaks in that channel"),
        );

        let central: Vec<&ResponseRecord> = records
            .iter()
            .copied()
            .filter(|r| self.is_central(r.freq, test_chan))
            .collect();
        let max_response = central
            .iter()
            .filter_map(|r| r.spectrum.response(test_chan))
            .map(f64::abs)
            .fold(None, |acc: Option<f64>, r| Some(acc.map_or(r, |a| a.max(r))));
        let ripple = ripple_db(
            central
                .iter()
                .filter_map(|r| r.spectrum.response_db(test_chan)),
        );

        match (max_response, ripple) {
            (Some(max_response), Some(ripple)) => {
                report.less(
                    max_response,
                    self.thresholds.overrange_fraction,
                    format!(
                        "Check that VACC output is at < {}% of maximum value",
                        self.thresholds.overrange_fraction * 100.0
                    ),
                );
                report.less(
                    ripple,
                    self.thresholds.ripple_db,
                    format!(
                        "Check that ripple within {}% of channel {test_chan} fc is < {} dB",
                        self.thresholds.central_fraction * 100.0,
                        self.thresholds.ripple_db
                    ),
                );
            }
            _ if test_chan >= self.freq_info.n_chans => report.failed(format!(
                "Channel {test_chan} is not one of the {} channels; cannot check overrange or ripple",
                self.freq_info.n_chans
            )),
            _ => report.failed(format!(
                "No source frequencies fell within ±{pct}% of channel {test_chan}; cannot check overrange or ripple"
            )),
        }

        ChannelisationSummary {
            peak_mismatches,
            num_central: central.len(),
            ripple_db: ripple,
            max_response,
        }
    }

    /// Check the records of a sweep with one tone per channel. Each record
    /// must peak in its declared channel, and no other channel may respond
    /// within the SFDR cutoff of the peak. Records that don't fit the
    /// correlator's channels are failures, and are left out of the summary.
    pub fn check_sfdr(&self, records: &[ResponseRecord], report: &mut Report) -> SfdrSummary {
        let records = self.usable_records(records, report);
        let cutoff_db = self.thresholds.sfdr_cutoff_db;
        let mut peak_channels = Vec::with_capacity(records.len());
        let mut extra = Vec::with_capacity(records.len());
        for record in &records {
            let peak = record.spectrum.peak_channel();
            peak_channels.push(peak);
            extra.push(
                peak.map(|p| extra_peaks(&record.spectrum, p, cutoff_db))
                    .unwrap_or_default(),
            );
        }

        let zero_chans: Vec<usize> = records
            .iter()
            .zip(peak_channels.iter())
            .filter(|(_, p)| p.is_none())
            .map(|(r, _)| r.channel)
            .collect();
        report.equals(
            &zero_chans,
            &vec![],
            "Check that no channel response is zero",
        );
        let expected: Vec<Option<usize>> = records.iter().map(|r| Some(r.channel)).collect();
        report.equals(
            &peak_channels,
            &expected,
            "Check that the correct channels have the peak response to each frequency",
        );
        let spurious: Vec<(usize, &BTreeSet<usize>)> = records
            .iter()
            .zip(extra.iter())
            .filter(|(_, e)| !e.is_empty())
            .map(|(r, e)| (r.channel, e))
            .collect();
        report.equals(
            &spurious,
            &vec![],
            format!("Check that no other channels responded > -{cutoff_db} dB"),
        );

        SfdrSummary {
            peak_channels,
            extra_peaks: extra,
        }
    }

    /// The markers for a channel on a response plot. `None` if `chan` isn't
    /// one of the correlator's channels.
    pub fn channel_markers(&self, chan: usize) -> Option<ChannelMarkers> {
        let centre = *self.freq_info.chan_freqs.get(chan)?;
        Some(ChannelMarkers {
            centre,
            central: self
                .freq_info
                .central_band(chan, self.thresholds.central_fraction),
            edges: self.freq_info.channel_edges(chan),
        })
    }

    /// The response of `test_chan` against source frequency, in dB relative
    /// to VACC full scale. If `central_only` is set, only records within the
    /// central band of `test_chan` are used. `None` if `test_chan` isn't one
    /// of the correlator's channels.
    pub fn channel_response_plot_data(
        &self,
        records: &[ResponseRecord],
        test_chan: usize,
        central_only: bool,
    ) -> Option<ResponsePlotData> {
        let markers = self.channel_markers(test_chan)?;
        let (freqs, responses): (Vec<f64>, Vec<f64>) = records
            .iter()
            .filter(|r| !central_only || self.is_central(r.freq, test_chan))
            .filter_map(|r| Some((r.freq, r.spectrum.response(test_chan)?)))
            .unzip();
        let responses_db = loggerise(
            ArrayView1::from(&responses),
            self.thresholds.dynamic_range_db,
            false,
            None,
        );
        Some(ResponsePlotData {
            title: format!(
                "Channel {test_chan} ({:.3} MHz) {}response",
                markers.centre / 1e6,
                if central_only { "central " } else { "" }
            ),
            x_desc: SOURCE_FREQ_DESC,
            freqs,
            responses_db,
            markers,
            cutoff_db: None,
        })
    }

    /// The SFDR record whose strongest spurious response is closest to its
    /// peak.
    pub fn worst_sfdr_record<'r>(
        &self,
        records: &'r [ResponseRecord],
    ) -> Option<(&'r ResponseRecord, f64)> {
        records
            .iter()
            .filter(|r| r.spectrum.len() == self.freq_info.n_chans)
            .filter_map(|r| Some((r, spur_level_db(&r.spectrum)?)))
            .fold(None, |worst, (r, level)| match worst {
                Some((_, worst_level)) if worst_level >= level => worst,
                _ => Some((r, level)),
            })
    }

    /// The response of an SFDR record across every channel, in dB relative
    /// to its peak, with the SFDR cutoff drawn as a horizontal line. `None`
    /// if the record doesn't fit the correlator's channels.
    pub fn sfdr_plot_data(&self, record: &ResponseRecord) -> Option<ResponsePlotData> {
        if record.spectrum.len() != self.freq_info.n_chans {
            return None;
        }
        let markers = self.channel_markers(record.channel)?;
        let responses_db = loggerise(
            record.spectrum.view(),
            self.thresholds.dynamic_range_db,
            true,
            None,
        );
        Some(ResponsePlotData {
            title: format!(
                "Response to {:.3} MHz (channel {})",
                record.freq / 1e6,
                record.channel
            ),
            x_desc: CHANNEL_FREQ_DESC,
            freqs: self.freq_info.chan_freqs.clone(),
            responses_db,
            markers,
            cutoff_db: Some(-self.thresholds.sfdr_cutoff_db),
        })
    }

    fn central_pct(&self) -> f64 {
        self.thresholds.central_fraction * 50.0
    }
}
