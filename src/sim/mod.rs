// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! A deterministic model of a digitiser simulator feeding a two-input
//! correlator.
//!
//! The model is not a bit-accurate F-engine; it is the smallest thing that
//! behaves like one for the purposes of the checks in this crate:
//!
//! * a tone on the first input is channelised with a response of
//!   `1 / (1 + (2|x|)^(2n))` in power, where `x` is the offset from a
//!   channel centre in channel widths;
//! * each channel's voltage is equalised and requantised to signed 8-bit
//!   integers, and the x-engine accumulates exact integer products;
//! * correlated noise goes to every input, with coarse delays showing up as
//!   phase slopes across the band;
//! * x-engine flags raised during an accumulation are latched into the next
//!   dump.


use std::time::Duration;

use log::trace;
use ndarray::prelude::*;

use crate::{
    c64,
    constants::{QUANTISER_DENORM, TAU},
    flags::XengFlag,
    freq::{CorrelatorConfig, CorrelatorFreqInfo, FreqPlanError},
    sweep::{CaptureError, ControlError, CorrelatorControl, Dump, DumpReceiver, SignalGenerator},
};

/// The frequency resolution of the tone generator is the sample rate divided
/// by this.
const TONE_RESOLUTION_DIVISOR: f64 = 4194304.0; // 2^22

/// The order of the channel response model.
const FILTER_ORDER: i32 = 8;

/// Requantiser units produced by a full-scale tone with unity
/// equalisation.
const TONE_AMPLITUDE: f64 = 20.0;

/// Requantiser power per channel of full-scale correlated noise with unity
/// equalisation.
const NOISE_POWER: f64 = 64.0;

/// The equalisation gain applied to every channel at startup.
pub const DEFAULT_EQ: f64 = 30.0;

const QUANTISER_MAX: f64 = 127.0;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Tone {
    freq: f64,
    scale: f64,
}

/// A simulated digitiser and correlator. Implements [`SignalGenerator`],
/// [`DumpReceiver`] and [`CorrelatorControl`].
#[derive(Debug, Clone)]
pub struct SimulatedCorrelator {
    freq_info: CorrelatorFreqInfo,
    input_labels: Vec<String>,

    /// Indices into `input_labels`.
    baselines: Vec<(usize, usize)>,

    /// [Hz]
    tone_resolution: f64,

    tone: Option<Tone>,
    noise_scale: f64,

    /// Per input [seconds].
    delays: Vec<f64>,

    /// Per input, per channel.
    eqs: Vec<Array1<c64>>,

    /// The number of X-engine accumulations per dump.
    acc_len: usize,

    /// Flags whose condition is currently raised.
    flags_on: u64,

    /// Flags raised at some point during the current accumulation.
    flags_latched: u64,

    dump_count: u64,
    stopped: bool,
}

impl SimulatedCorrelator {
    pub fn new(config: &CorrelatorConfig) -> Result<SimulatedCorrelator, FreqPlanError> {
        let freq_info = CorrelatorFreqInfo::new(config)?;
        let input_labels = vec!["m000_x".to_string(), "m000_y".to_string()];
        let eqs = vec![Array1::from_elem(freq_info.n_chans, c64::new(DEFAULT_EQ, 0.0)); 2];
        Ok(SimulatedCorrelator {
            tone_resolution: freq_info.sample_freq / TONE_RESOLUTION_DIVISOR,
            freq_info,
            input_labels,
            baselines: vec![(0, 0), (1, 1), (0, 1)],
            tone: None,
            noise_scale: 0.0,
            delays: vec![0.0; 2],
            eqs,
            acc_len: config.accumulation_len.max(1),
            flags_on: 0,
            flags_latched: 0,
            dump_count: 0,
            stopped: false,
        })
    }

    pub fn freq_info(&self) -> &CorrelatorFreqInfo {
        &self.freq_info
    }

    /// Stop producing dumps; every subsequent capture times out.
    pub fn stop_data(&mut self) {
        self.stopped = true;
    }

    /// The frequency the tone generator would produce for `freq`.
    pub fn realise_freq(&self, freq: f64) -> f64 {
        (freq / self.tone_resolution).round() * self.tone_resolution
    }

    /// The power response of a channel to a tone `x` channel widths from its
    /// centre.
    pub fn channel_response(x: f64) -> f64 {
        1.0 / (1.0 + (2.0 * x.abs()).powi(2 * FILTER_ORDER))
    }

    fn input_index(&self, input: &str) -> Option<usize> {
        self.input_labels.iter().position(|l| l == input)
    }

    fn num_accumulations(&self) -> f64 {
        (self.freq_info.xeng_accumulation_len * self.acc_len) as f64
    }

    /// The requantised voltage spectrum of the tone path of an input.
    fn quantised_tone(&self, i_input: usize) -> Array1<c64> {
        let mut q = Array1::from_elem(self.freq_info.n_chans, c64::new(0.0, 0.0));
        // The tone only feeds the first input.
        if i_input != 0 {
            return q;
        }
        if let Some(tone) = self.tone {
            let delta_f = self.freq_info.delta_f;
            q.iter_mut()
                .zip(self.freq_info.chan_freqs.iter())
                .zip(self.eqs[i_input].iter())
                .for_each(|((q, &fc), &eq)| {
                    let x = (tone.freq - fc) / delta_f;
                    let v = eq * tone.scale * TONE_AMPLITUDE * Self::channel_response(x).sqrt();
                    *q = c64::new(requantise(v.re), requantise(v.im));
                });
        }
        q
    }

    /// The phase of an input's noise in each channel. Delays are applied
    /// relative to the middle of the band.
    fn noise_phases(&self, i_input: usize) -> Array1<f64> {
        let delay = self.delays[i_input];
        let f_max = self.freq_info.chan_freqs.last().copied().unwrap_or(0.0);
        self.freq_info
            .chan_freqs
            .iter()
            .map(|&f| TAU * f * delay - TAU * f_max * delay / 2.0)
            .collect()
    }

    fn make_dump(&mut self) -> Dump {
        let n_chans = self.freq_info.n_chans;
        let n_accs = self.num_accumulations();
        let tones: Vec<Array1<c64>> = (0..self.input_labels.len())
            .map(|i| self.quantised_tone(i))
            .collect();
        let noise_power = self.noise_scale * self.noise_scale * NOISE_POWER;
        let phases: Vec<Array1<f64>> = (0..self.input_labels.len())
            .map(|i| self.noise_phases(i))
            .collect();

        let mut xeng_raw = Array3::zeros((n_chans, self.baselines.len(), 2));
        for (i_bl, &(a, b)) in self.baselines.iter().enumerate() {
            for i_chan in 0..n_chans {
                // Integer products of the requantised tone are exact.
                let mut corr = tones[a][i_chan] * tones[b][i_chan].conj();
                if noise_power > 0.0 {
                    let eq = self.eqs[a][i_chan] * self.eqs[b][i_chan].conj();
                    let phase = phases[b][i_chan] - phases[a][i_chan];
                    corr += eq * noise_power * c64::from_polar(1.0, phase);
                }
                corr *= n_accs;
                xeng_raw[(i_chan, i_bl, 0)] = corr.re.round() as i32;
                xeng_raw[(i_chan, i_bl, 1)] = corr.im.round() as i32;
            }
        }

        self.dump_count += 1;
        let flags = self.flags_latched | self.flags_on;
        self.flags_latched = 0;
        trace!("Simulated dump {} with flags {flags:#x}", self.dump_count);
        Dump {
            xeng_raw,
            flags,
            timestamp: self.dump_count,
        }
    }
}

fn requantise(v: f64) -> f64 {
    v.round().clamp(-QUANTISER_MAX, QUANTISER_MAX)
}

fn check_scale(scale: f64) -> Result<(), ControlError> {
    if (0.0..=1.0).contains(&scale) {
        Ok(())
    } else {
        Err(ControlError::BadScale(scale))
    }
}

impl SignalGenerator for SimulatedCorrelator {
    fn set_tone(&mut self, freq: f64, scale: f64) -> Result<f64, ControlError> {
        check_scale(scale)?;
        let max = self.freq_info.sample_freq / 2.0;
        if !(0.0..=max).contains(&freq) {
            return Err(ControlError::BadFrequency { freq, max });
        }
        let freq = self.realise_freq(freq);
        self.tone = Some(Tone { freq, scale });
        Ok(freq)
    }

    fn set_noise(&mut self, scale: f64) -> Result<(), ControlError> {
        check_scale(scale)?;
        self.noise_scale = scale;
        Ok(())
    }

    fn reset(&mut self) -> Result<(), ControlError> {
        self.tone = None;
        self.noise_scale = 0.0;
        Ok(())
    }
}

impl DumpReceiver for SimulatedCorrelator {
    fn get_clean_dump(&mut self, timeout: Duration) -> Result<Dump, CaptureError> {
        if self.stopped {
            return Err(CaptureError::Timeout {
                timeout_s: timeout.as_secs_f64(),
            });
        }
        // Throw away the accumulation in progress.
        self.flags_latched = 0;
        self.dump_count += 1;
        Ok(self.make_dump())
    }

    fn get_next_dump(&mut self, timeout: Duration) -> Result<Dump, CaptureError> {
        if self.stopped {
            return Err(CaptureError::Timeout {
                timeout_s: timeout.as_secs_f64(),
            });
        }
        Ok(self.make_dump())
    }
}

impl CorrelatorControl for SimulatedCorrelator {
    fn input_labels(&self) -> Vec<String> {
        self.input_labels.clone()
    }

    fn baselines(&self) -> Vec<(String, String)> {
        self.baselines
            .iter()
            .map(|&(a, b)| (self.input_labels[a].clone(), self.input_labels[b].clone()))
            .collect()
    }

    fn set_delay(&mut self, input: &str, delay: f64) -> Result<(), ControlError> {
        let i = self
            .input_index(input)
            .ok_or_else(|| ControlError::UnknownInput(input.to_string()))?;
        self.delays[i] = delay;
        Ok(())
    }

    fn set_accumulation_len(&mut self, vacc_accumulations: usize) -> Result<(), ControlError> {
        if vacc_accumulations == 0 {
            return Err(ControlError::ZeroAccumulationLen);
        }
        self.acc_len = vacc_accumulations;
        Ok(())
    }

    fn accumulation_len(&self) -> usize {
        self.acc_len
    }

    fn eq(&self, input: &str) -> Result<Vec<c64>, ControlError> {
        let i = self
            .input_index(input)
            .ok_or_else(|| ControlError::UnknownInput(input.to_string()))?;
        Ok(self.eqs[i].to_vec())
    }

    fn set_eq(&mut self, input: &str, gains: &[c64]) -> Result<(), ControlError> {
        let i = self
            .input_index(input)
            .ok_or_else(|| ControlError::UnknownInput(input.to_string()))?;
        if gains.len() != self.freq_info.n_chans {
            return Err(ControlError::BadEq {
                expected: self.freq_info.n_chans,
                got: gains.len(),
            });
        }
        self.eqs[i] = Array1::from(gains.to_vec());
        Ok(())
    }

    fn quantiser_snapshot(&mut self, input: &str) -> Result<Array1<c64>, CaptureError> {
        let i = self
            .input_index(input)
            .ok_or_else(|| CaptureError::UnknownInput(input.to_string()))?;
        Ok(self.quantised_tone(i).mapv(|q| q / QUANTISER_DENORM))
    }

    fn set_flag(&mut self, flag: XengFlag, on: bool) -> Result<(), ControlError> {
        let bit = 1 << flag.bit();
        if on {
            self.flags_on |= bit;
            self.flags_latched |= bit;
        } else {
            self.flags_on &= !bit;
        }
        Ok(())
    }
}
