// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Vector accumulator checks.

use ndarray::prelude::*;

use crate::{
    c64,
    constants::QUANTISER_DENORM,
    report::Report,
    spectrum::{complexise, magnitudes},
};

/// Convert requested accumulation times [seconds] into VACC accumulation
/// lengths. Each VACC accumulation is `xeng_accumulation_len` FFTs long.
pub fn accumulation_lengths(
    acc_times: &[f64],
    fft_period: f64,
    xeng_accumulation_len: usize,
) -> Vec<usize> {
    let delta_acc_t = fft_period * xeng_accumulation_len as f64;
    acc_times
        .iter()
        .map(|t| (t / delta_acc_t).ceil() as usize)
        .collect()
}

/// Assuming a tone is only on the first input, work out if the VACC output
/// is rotated by a baseline. `None` if it can't be determined.
pub fn vacc_offset(xeng_raw: ArrayView3<i32>) -> Option<usize> {
    if xeng_raw.len_of(Axis(1)) < 2 {
        return None;
    }
    let max = |i_bl: usize| {
        magnitudes(xeng_raw.index_axis(Axis(1), i_bl))
            .iter()
            .copied()
            .fold(0.0, f64::max)
    };
    match (max(0) > 0.0, max(1) > 0.0) {
        // The autocorrelation of the first input is in baseline 0 when the
        // VACC is aligned.
        (true, false) => Some(0),
        (false, true) => Some(1),
        _ => None,
    }
}

/// Snapshots of the requantiser are normalised to [-1, 1); get the integers
/// back.
pub fn denormalise_quantiser(snapshot: ArrayView1<c64>) -> Array1<c64> {
    snapshot.mapv(|q| q * QUANTISER_DENORM)
}

/// The requantised spectrum must only have power in the test channel.
pub fn check_quantiser_spectrum(
    quantiser_spectrum: ArrayView1<c64>,
    test_chan: usize,
    report: &mut Report,
) -> bool {
    let zero = c64::new(0.0, 0.0);
    let nonzero_in_test = quantiser_spectrum
        .get(test_chan)
        .map(|&q| q != zero)
        .unwrap_or(false);
    let zero_elsewhere = quantiser_spectrum
        .iter()
        .enumerate()
        .all(|(i_chan, &q)| i_chan == test_chan || q == zero);
    let a = report.is_true(
        nonzero_in_test,
        format!("Check that the spectrum is not zero in test channel {test_chan}"),
    );
    let b = report.is_true(
        zero_elsewhere,
        "Check that the spectrum is zero except in the test channel",
    );
    a && b
}

/// What the VACC should produce for an autocorrelation of the requantised
/// spectrum over `num_accumulations` spectra.
pub fn expected_vacc_response(quantiser_spectrum: ArrayView1<c64>, num_accumulations: usize) -> Array1<f64> {
    quantiser_spectrum.mapv(|q| q.norm_sqr() * num_accumulations as f64)
}

/// The accumulated autocorrelation in `baseline_data` must exactly equal the
/// expected response.
pub fn check_vacc_response(
    expected: ArrayView1<f64>,
    baseline_data: ArrayView2<i32>,
    vacc_accumulations: usize,
    report: &mut Report,
) -> bool {
    let response = complexise(baseline_data);
    let equal = response.len() == expected.len()
        && response
            .iter()
            .zip(expected.iter())
            .all(|(r, &e)| r.re == e && r.im == 0.0);
    report.is_true(
        equal,
        format!("Check that the accumulator response is equal to the expected response for {vacc_accumulations} accumulation length"),
    )
}
