// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Driving an instrument through tests.
//!
//! Instruments are only reachable through the [`SignalGenerator`],
//! [`DumpReceiver`] and [`CorrelatorControl`] traits. The functions here set
//! up signals, capture dumps and hand the captured data back; the checks in
//! [`crate::verify`] are run on the results. Frequency plans are computed
//! before anything is sent to the instrument, so an invalid plan never
//! touches hardware.

mod error;

pub use error::{CaptureError, ControlError, SweepError};

use std::{collections::BTreeSet, time::Duration};

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::{debug, info};
use ndarray::prelude::*;

use crate::{
    c64,
    constants::{DEFAULT_DUMP_TIMEOUT_S, DEFAULT_TONE_SCALE},
    flags::XengFlag,
    freq::CorrelatorFreqInfo,
    report::Report,
    spectrum::{normalised_magnitude, ChannelSpectrum},
    verify::{
        baselines::{all_baselines_present, check_all_baselines_live, check_live_inputs},
        delay::measured_phases,
        vacc::denormalise_quantiser,
        ResponseRecord,
    },
    PROGRESS_BARS,
};

/// A single accumulation from the correlator.
#[derive(Debug, Clone, PartialEq)]
pub struct Dump {
    /// Visibilities with shape `(num_chans, num_baselines, 2)`; the last
    /// axis is `[real, imag]`.
    pub xeng_raw: Array3<i32>,

    /// The packed x-engine flags.
    pub flags: u64,

    /// The dump counter.
    pub timestamp: u64,
}

impl Dump {
    pub fn num_chans(&self) -> usize {
        self.xeng_raw.len_of(Axis(0))
    }

    pub fn num_baselines(&self) -> usize {
        self.xeng_raw.len_of(Axis(1))
    }

    /// The `(num_chans, 2)` data of a single baseline.
    pub fn baseline(&self, i_bl: usize) -> ArrayView2<i32> {
        self.xeng_raw.index_axis(Axis(1), i_bl)
    }

    /// The response of a single baseline, normalised to VACC full scale.
    pub fn normalised_magnitude(&self, i_bl: usize) -> ChannelSpectrum {
        normalised_magnitude(self.baseline(i_bl))
    }
}

/// A digitiser (or digitiser simulator) that can inject test signals.
pub trait SignalGenerator {
    /// Set a sine tone. The generator has finite frequency resolution, so
    /// the frequency actually produced is returned.
    fn set_tone(&mut self, freq: f64, scale: f64) -> Result<f64, ControlError>;

    /// Set correlated noise on all outputs.
    fn set_noise(&mut self, scale: f64) -> Result<(), ControlError>;

    /// Turn off all signals.
    fn reset(&mut self) -> Result<(), ControlError>;
}

/// Something that receives correlator dumps.
pub trait DumpReceiver {
    /// Discard any dump that may have started accumulating before now, and
    /// return the next complete one.
    fn get_clean_dump(&mut self, timeout: Duration) -> Result<Dump, CaptureError>;

    /// Return the next dump from the queue.
    fn get_next_dump(&mut self, timeout: Duration) -> Result<Dump, CaptureError>;
}

/// The parts of a correlator that tests need to change.
pub trait CorrelatorControl {
    fn input_labels(&self) -> Vec<String>;

    /// The input pair of each baseline, in dump order.
    fn baselines(&self) -> Vec<(String, String)>;

    /// Set the coarse delay of an input [seconds].
    fn set_delay(&mut self, input: &str, delay: f64) -> Result<(), ControlError>;

    /// Set the number of X-engine accumulations in each dump.
    fn set_accumulation_len(&mut self, vacc_accumulations: usize) -> Result<(), ControlError>;

    fn accumulation_len(&self) -> usize;

    /// The per-channel equalisation gains of an input.
    fn eq(&self, input: &str) -> Result<Vec<c64>, ControlError>;

    fn set_eq(&mut self, input: &str, gains: &[c64]) -> Result<(), ControlError>;

    /// A snapshot of an input's requantised spectrum, normalised to [-1, 1).
    fn quantiser_snapshot(&mut self, input: &str) -> Result<Array1<c64>, CaptureError>;

    /// Raise or lower the condition behind an x-engine flag.
    fn set_flag(&mut self, flag: XengFlag, on: bool) -> Result<(), ControlError>;
}

/// How signals are set and dumps are waited for.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepSettings {
    pub timeout: Duration,
    pub tone_scale: f64,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs_f64(DEFAULT_DUMP_TIMEOUT_S),
            tone_scale: DEFAULT_TONE_SCALE,
        }
    }
}

/// Make a progress bar for a sweep.
fn make_sweep_progress_bar(len: usize, message: String) -> ProgressBar {
    ProgressBar::with_draw_target(
        Some(len as _),
        if PROGRESS_BARS.load() {
            ProgressDrawTarget::stdout()
        } else {
            ProgressDrawTarget::hidden()
        },
    )
    .with_style(
        ProgressStyle::default_bar()
            .template("{msg}: [{wide_bar:.blue}] {pos:4}/{len:4} ({elapsed_precise}<{eta_precise})")
            .unwrap()
            .progress_chars("=> "),
    )
    .with_position(0)
    .with_message(message)
}

/// What a captured dump must look like before its visibilities are used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DumpShape {
    pub(crate) n_chans: usize,
    pub(crate) min_baselines: usize,
}

impl DumpShape {
    pub(crate) fn new(n_chans: usize, min_baselines: usize) -> DumpShape {
        DumpShape {
            n_chans,
            min_baselines,
        }
    }

    pub(crate) fn check(&self, dump: &Dump) -> Result<(), CaptureError> {
        if dump.xeng_raw.is_empty() {
            return Err(CaptureError::NoData);
        }
        let got = dump.xeng_raw.dim();
        if got.0 != self.n_chans || got.1 < self.min_baselines || got.2 != 2 {
            return Err(CaptureError::Shape {
                expected: (self.n_chans, self.min_baselines, 2),
                got,
            });
        }
        Ok(())
    }
}

fn checked_dump(
    dump: Result<Dump, CaptureError>,
    shape: Option<DumpShape>,
    during: impl FnOnce() -> String,
) -> Result<Dump, SweepError> {
    dump.and_then(|dump| {
        if let Some(shape) = shape {
            shape.check(&dump)?;
        }
        Ok(dump)
    })
    .map_err(|source| SweepError::IndeterminateCapture {
        during: during(),
        source,
    })
}

/// Get a clean dump. If `shape` is given, a dump that doesn't have it is an
/// indeterminate capture.
fn clean_dump<R: DumpReceiver + ?Sized>(
    receiver: &mut R,
    timeout: Duration,
    shape: Option<DumpShape>,
    during: impl FnOnce() -> String,
) -> Result<Dump, SweepError> {
    checked_dump(receiver.get_clean_dump(timeout), shape, during)
}

fn next_dump<R: DumpReceiver + ?Sized>(
    receiver: &mut R,
    timeout: Duration,
    shape: Option<DumpShape>,
    during: impl FnOnce() -> String,
) -> Result<Dump, SweepError> {
    checked_dump(receiver.get_next_dump(timeout), shape, during)
}

/// The index of the baseline between two inputs, in either order.
pub fn baseline_index(baselines: &[(String, String)], a: &str, b: &str) -> Option<usize> {
    baselines
        .iter()
        .position(|(i, j)| (i == a && j == b) || (i == b && j == a))
}

/// Sweep a tone across `test_chan` (and `chans_around` channels either
/// side), recording the response of baseline 0 at each realised frequency.
/// Frequencies that the generator realises identically to the previous one
/// are skipped.
pub fn channelisation_sweep<I>(
    inst: &mut I,
    freq_info: &CorrelatorFreqInfo,
    test_chan: usize,
    samples_per_chan: usize,
    chans_around: usize,
    settings: &SweepSettings,
    report: &mut Report,
) -> Result<Vec<ResponseRecord>, SweepError>
where
    I: SignalGenerator + DumpReceiver + ?Sized,
{
    let plan = freq_info.calc_freq_samples(test_chan, samples_per_chan, chans_around)?;
    report.step(format!(
        "Sweeping {} frequencies over channels {} to {}",
        plan.len(),
        plan.start_chan,
        plan.end_chan
    ));

    let shape = Some(DumpShape::new(freq_info.n_chans, 1));
    let pb = make_sweep_progress_bar(plan.len(), "Channel response".to_string());
    let mut records = Vec::with_capacity(plan.len());
    let mut last_source_freq = None;
    for (i, &freq) in plan.iter().enumerate() {
        let source_freq = inst.set_tone(freq, settings.tone_scale)?;
        pb.inc(1);
        if last_source_freq == Some(source_freq) {
            info!(
                "Skipping channel response for freq {}/{}: {} MHz; digitiser frequency is same as previous",
                i + 1,
                plan.len(),
                freq / 1e6
            );
            continue;
        }
        last_source_freq = Some(source_freq);

        let dump = clean_dump(inst, settings.timeout, shape, || {
            format!("sweeping {:.6} MHz", source_freq / 1e6)
        })?;
        debug!("Got dump {} for {source_freq} Hz", dump.timestamp);
        records.push(ResponseRecord {
            freq: source_freq,
            channel: freq_info.closest_channel(source_freq),
            spectrum: dump.normalised_magnitude(0),
        });
    }
    pb.finish();

    Ok(records)
}

/// Put a tone at the centre of every channel (skipping the DC channel) and
/// record the response of baseline 0.
pub fn sfdr_sweep<I>(
    inst: &mut I,
    freq_info: &CorrelatorFreqInfo,
    settings: &SweepSettings,
    report: &mut Report,
) -> Result<Vec<ResponseRecord>, SweepError>
where
    I: SignalGenerator + DumpReceiver + ?Sized,
{
    let start_chan = 1;
    let num_chans = freq_info.n_chans.saturating_sub(start_chan);
    report.step(format!(
        "Getting the response to a tone in each of channels {start_chan} to {}",
        freq_info.n_chans.saturating_sub(1)
    ));

    let shape = Some(DumpShape::new(freq_info.n_chans, 1));
    let pb = make_sweep_progress_bar(num_chans, "SFDR".to_string());
    let mut records = Vec::with_capacity(num_chans);
    for (chan, &chan_freq) in freq_info.chan_freqs.iter().enumerate().skip(start_chan) {
        let source_freq = inst.set_tone(chan_freq, settings.tone_scale)?;
        let dump = clean_dump(inst, settings.timeout, shape, || {
            format!("getting the response of channel {chan}")
        })?;
        records.push(ResponseRecord {
            freq: source_freq,
            channel: chan,
            spectrum: dump.normalised_magnitude(0),
        });
        pb.inc(1);
    }
    pb.finish();

    Ok(records)
}

/// At each planned frequency, capture one clean dump followed by
/// `num_dumps - 1` consecutive dumps.
#[allow(clippy::too_many_arguments)]
pub fn back_to_back_dumps<I>(
    inst: &mut I,
    freq_info: &CorrelatorFreqInfo,
    test_chan: usize,
    samples_per_chan: usize,
    chans_around: usize,
    num_dumps: usize,
    settings: &SweepSettings,
    report: &mut Report,
) -> Result<Vec<(f64, Vec<Array3<i32>>)>, SweepError>
where
    I: SignalGenerator + DumpReceiver + ?Sized,
{
    let plan = freq_info.calc_freq_samples(test_chan, samples_per_chan, chans_around)?;
    report.step(format!(
        "Capturing {num_dumps} back-to-back dumps at each of {} frequencies",
        plan.len()
    ));

    let shape = Some(DumpShape::new(freq_info.n_chans, 1));
    let pb = make_sweep_progress_bar(plan.len(), "Back-to-back dumps".to_string());
    let mut out = Vec::with_capacity(plan.len());
    for &freq in &plan {
        let source_freq = inst.set_tone(freq, settings.tone_scale)?;
        let mut dumps = Vec::with_capacity(num_dumps);
        for i_dump in 0..num_dumps {
            let during = || format!("capturing dump {} at {:.6} MHz", i_dump + 1, source_freq / 1e6);
            let dump = if i_dump == 0 {
                clean_dump(inst, settings.timeout, shape, during)?
            } else {
                next_dump(inst, settings.timeout, shape, during)?
            };
            dumps.push(dump.xeng_raw);
        }
        out.push((source_freq, dumps));
        pb.inc(1);
    }
    pb.finish();

    Ok(out)
}

/// Repeat a frequency scan `num_scans` times. Returns the realised
/// frequencies of the first scan and `scans[i][j]`, the dump of scan `i` at
/// frequency `j`.
#[allow(clippy::too_many_arguments)]
pub fn freq_scans<I>(
    inst: &mut I,
    freq_info: &CorrelatorFreqInfo,
    test_chan: usize,
    samples_per_chan: usize,
    chans_around: usize,
    num_scans: usize,
    settings: &SweepSettings,
    report: &mut Report,
) -> Result<(Vec<f64>, Vec<Vec<Array3<i32>>>), SweepError>
where
    I: SignalGenerator + DumpReceiver + ?Sized,
{
    let plan = freq_info.calc_freq_samples(test_chan, samples_per_chan, chans_around)?;
    report.step(format!(
        "Scanning {} frequencies {num_scans} times",
        plan.len()
    ));

    let shape = Some(DumpShape::new(freq_info.n_chans, 1));
    let pb = make_sweep_progress_bar(plan.len() * num_scans, "Frequency scans".to_string());
    let mut source_freqs = Vec::with_capacity(plan.len());
    let mut scans = Vec::with_capacity(num_scans);
    for i_scan in 0..num_scans {
        let mut scan = Vec::with_capacity(plan.len());
        for &freq in &plan {
            let source_freq = inst.set_tone(freq, settings.tone_scale)?;
            if i_scan == 0 {
                source_freqs.push(source_freq);
            }
            let dump = clean_dump(inst, settings.timeout, shape, || {
                format!("scan {} at {:.6} MHz", i_scan + 1, source_freq / 1e6)
            })?;
            scan.push(dump.xeng_raw);
            pb.inc(1);
        }
        scans.push(scan);
    }
    pb.finish();

    Ok((source_freqs, scans))
}

/// With correlated noise on all inputs, apply each delay to the second
/// input and measure the phases on the baseline between the first two
/// inputs. The delay is cleared afterwards.
pub fn delay_phases<I>(
    inst: &mut I,
    freq_info: &CorrelatorFreqInfo,
    delays: &[f64],
    noise_scale: f64,
    settings: &SweepSettings,
    report: &mut Report,
) -> Result<Vec<(f64, Array1<f64>)>, SweepError>
where
    I: SignalGenerator + DumpReceiver + CorrelatorControl + ?Sized,
{
    let inputs = inst.input_labels();
    let (ref_input, delayed_input) = match inputs.as_slice() {
        [a, b, ..] => (a.clone(), b.clone()),
        _ => return Err(SweepError::TooFewInputs(inputs.len())),
    };
    let i_bl = baseline_index(&inst.baselines(), &ref_input, &delayed_input)
        .ok_or_else(|| SweepError::NoBaseline(ref_input.clone(), delayed_input.clone()))?;
    let shape = Some(DumpShape::new(freq_info.n_chans, i_bl + 1));

    report.step(format!("Setting correlated noise with scale {noise_scale}"));
    inst.reset()?;
    inst.set_noise(noise_scale)?;

    let mut measured = Vec::with_capacity(delays.len());
    for &delay in delays {
        report.step(format!(
            "Setting a delay of {:.3} ns on {delayed_input}",
            delay * 1e9
        ));
        inst.set_delay(&delayed_input, delay)?;
        let dump = clean_dump(inst, settings.timeout, shape, || {
            format!("measuring phases with a {:.3} ns delay", delay * 1e9)
        })?;
        measured.push((delay, measured_phases(dump.baseline(i_bl))));
    }
    inst.set_delay(&delayed_input, 0.0)?;

    Ok(measured)
}

/// What was captured for the VACC test.
#[derive(Debug, Clone, PartialEq)]
pub struct VaccCapture {
    pub test_chan: usize,

    /// The requantised spectrum of the test input, as integers.
    pub quantiser_spectrum: Array1<c64>,

    /// The VACC accumulation length and the dump taken with it.
    pub dumps: Vec<(usize, Dump)>,
}

/// Put a tone into the channel closest to `test_freq`, zero the
/// equalisation of the first input everywhere except that channel, then
/// capture a dump with each VACC accumulation length. The initial
/// equalisation and accumulation length are restored afterwards.
pub fn vacc_dumps<I>(
    inst: &mut I,
    freq_info: &CorrelatorFreqInfo,
    test_freq: f64,
    eq_scaling: f64,
    acc_lens: &[usize],
    settings: &SweepSettings,
    report: &mut Report,
) -> Result<VaccCapture, SweepError>
where
    I: SignalGenerator + DumpReceiver + CorrelatorControl + ?Sized,
{
    let test_input = inst
        .input_labels()
        .into_iter()
        .next()
        .ok_or(SweepError::TooFewInputs(0))?;
    let test_chan = freq_info.closest_channel(test_freq);
    let initial_eq = inst.eq(&test_input)?;
    let initial_acc_len = inst.accumulation_len();
    let shape = Some(DumpShape::new(freq_info.n_chans, 1));

    let mut eqs = vec![c64::new(0.0, 0.0); freq_info.n_chans];
    eqs[test_chan] = c64::new(eq_scaling, 0.0);
    report.step(format!(
        "Setting the equalisation of {test_input} to {eq_scaling} in channel {test_chan} and 0 elsewhere"
    ));
    inst.reset()?;
    inst.set_eq(&test_input, &eqs)?;
    inst.set_tone(test_freq, settings.tone_scale)?;

    let result = (|| -> Result<VaccCapture, SweepError> {
        let snapshot = inst
            .quantiser_snapshot(&test_input)
            .map_err(|source| SweepError::IndeterminateCapture {
                during: format!("getting a quantiser snapshot of {test_input}"),
                source,
            })?;
        let quantiser_spectrum = denormalise_quantiser(snapshot.view());

        let mut dumps = Vec::with_capacity(acc_lens.len());
        for &acc_len in acc_lens {
            report.step(format!("Setting the VACC accumulation length to {acc_len}"));
            inst.set_accumulation_len(acc_len)?;
            let dump = clean_dump(inst, settings.timeout, shape, || {
                format!("accumulating {acc_len} times")
            })?;
            dumps.push((acc_len, dump));
        }
        Ok(VaccCapture {
            test_chan,
            quantiser_spectrum,
            dumps,
        })
    })();

    // Restore the instrument even if the capture failed.
    inst.set_eq(&test_input, &initial_eq)?;
    inst.set_accumulation_len(initial_acc_len)?;
    result
}

/// Capture a dump, raise and then lower the condition behind `flag` within
/// the next accumulation, then capture the next two dumps. Returns the
/// packed flags of the three dumps.
pub fn flag_dumps<I>(
    inst: &mut I,
    flag: XengFlag,
    condition: &str,
    settings: &SweepSettings,
    report: &mut Report,
) -> Result<(u64, u64, u64), SweepError>
where
    I: DumpReceiver + CorrelatorControl + ?Sized,
{
    report.step(format!("Getting correlator dump 1 before setting {condition}"));
    let dump1 = clean_dump(inst, settings.timeout, None, || "getting dump 1".to_string())?;
    report.step(format!("Setting {condition}"));
    inst.set_flag(flag, true)?;
    report.step(format!("Clearing {condition}"));
    inst.set_flag(flag, false)?;
    report.step(format!(
        "Getting correlator dump 2 after setting and clearing {condition}"
    ));
    let dump2 = next_dump(inst, settings.timeout, None, || "getting dump 2".to_string())?;
    report.step("Getting correlator dump 3");
    let dump3 = next_dump(inst, settings.timeout, None, || "getting dump 3".to_string())?;
    Ok((dump1.flags, dump2.flags, dump3.flags))
}

/// Check that every baseline carries data with correlated noise on all
/// inputs, and that zeroing inputs (through their equalisation) zeroes
/// exactly the baselines they're part of. Inputs are then restored one at a
/// time, with checks after each.
pub fn product_baselines<I>(
    inst: &mut I,
    freq_info: &CorrelatorFreqInfo,
    noise_scale: f64,
    settings: &SweepSettings,
    report: &mut Report,
) -> Result<bool, SweepError>
where
    I: SignalGenerator + DumpReceiver + CorrelatorControl + ?Sized,
{
    let inputs = inst.input_labels();
    let baselines = inst.baselines();
    let shape = Some(DumpShape::new(freq_info.n_chans, baselines.len()));
    report.step(format!("Setting correlated noise with scale {noise_scale}"));
    inst.reset()?;
    inst.set_noise(noise_scale)?;

    let mut ok = report.is_true(
        all_baselines_present(&inputs, &baselines),
        "Check that all baselines are present in correlator output",
    );
    let dump = clean_dump(inst, settings.timeout, shape, || "checking live baselines".to_string())?;
    ok &= check_all_baselines_live(dump.xeng_raw.view(), report);

    let initial_eqs = inputs
        .iter()
        .map(|input| inst.eq(input))
        .collect::<Result<Vec<_>, _>>()?;
    let zeros = vec![c64::new(0.0, 0.0); freq_info.n_chans];

    let result = (|| -> Result<bool, SweepError> {
        report.step("Setting the equalisation of every input to zero");
        for input in &inputs {
            inst.set_eq(input, &zeros)?;
        }
        let dump = clean_dump(inst, settings.timeout, shape, || "checking zeroed inputs".to_string())?;
        let mut ok = report.is_true(
            dump.xeng_raw.iter().all(|&v| v == 0),
            "Check that all baseline visibilities are zero",
        );

        let mut nonzero_inputs = BTreeSet::new();
        for (input, eq) in inputs.iter().zip(initial_eqs.iter()) {
            report.step(format!("Restoring the equalisation of {input}"));
            inst.set_eq(input, eq)?;
            nonzero_inputs.insert(input.clone());
            let dump = clean_dump(inst, settings.timeout, shape, || {
                format!("checking baselines with {input} restored")
            })?;
            ok &= check_live_inputs(dump.xeng_raw.view(), &baselines, &nonzero_inputs, report);
        }
        Ok(ok)
    })();

    for (input, eq) in inputs.iter().zip(initial_eqs.iter()) {
        inst.set_eq(input, eq)?;
    }
    result.map(|r| ok && r)
}
