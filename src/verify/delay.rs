// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Delay tracking: a delay applied to one input of a baseline shows up as a
//! phase slope across the band.

use ndarray::prelude::*;

use crate::{constants::TAU, report::Report, spectrum::complexise};

/// The phases expected on a baseline when `delay` [seconds] is applied to
/// its second input. The delay is applied relative to the middle of the
/// band, so the slope is offset by half its maximum.
pub fn expected_phases(chan_freqs: &[f64], delay: f64) -> Array1<f64> {
    let mut phases: Array1<f64> = chan_freqs.iter().map(|f| f * TAU * delay).collect();
    let max = phases.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max.is_finite() {
        phases.mapv_inplace(|p| p - max / 2.0);
    }
    phases
}

/// The phase of each channel of a single baseline's `[real, imag]` data.
pub fn measured_phases(baseline_data: ArrayView2<i32>) -> Array1<f64> {
    complexise(baseline_data).mapv(|c| c.arg())
}

/// The peak-to-peak span of some phases, rounded to 2 decimal places.
pub fn phase_span(phases: ArrayView1<f64>) -> f64 {
    let (min, max) = phases
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), &p| {
            (min.min(p), max.max(p))
        });
    if min > max {
        return 0.0;
    }
    ((max - min) * 100.0).round() / 100.0
}

/// The largest absolute difference between two phase arrays.
pub fn max_abs_error(actual: ArrayView1<f64>, expected: ArrayView1<f64>) -> f64 {
    actual
        .iter()
        .zip(expected.iter())
        .map(|(a, e)| (a - e).abs())
        .fold(0.0, f64::max)
}

/// Check the phases measured for each delay against the expected phase
/// slopes. `measured` pairs each applied delay [seconds] with the phases
/// read from the delayed baseline. Returns whether every check passed.
pub fn check_delay_phases(
    chan_freqs: &[f64],
    measured: &[(f64, Array1<f64>)],
    tolerance: f64,
    report: &mut Report,
) -> bool {
    let mut ok = true;
    for (delay, actual) in measured {
        let delay_ns = delay * 1e9;
        if actual.len() != chan_freqs.len() {
            report.failed(format!(
                "Expected {} phases at delay {delay_ns:.3} ns, got {}",
                chan_freqs.len(),
                actual.len()
            ));
            ok = false;
            continue;
        }
        let expected = expected_phases(chan_freqs, *delay);
        let expected_span = phase_span(expected.view());
        let actual_span = phase_span(actual.view());
        ok &= report.equals(
            &actual_span,
            &expected_span,
            format!("Check that the expected ({expected_span:.2}) and actual ({actual_span:.2}) phase spans are equal at delay {delay_ns:.3} ns"),
        );

        if *delay == 0.0 {
            let span = actual
                .iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), &p| {
                    (min.min(p), max.max(p))
                });
            ok &= report.less(
                span.1 - span.0,
                tolerance,
                "Check that the phase slope with zero delay is flat",
            );
        } else {
            let degrees = (TAU * chan_freqs.last().copied().unwrap_or(0.0) * delay).to_degrees();
            ok &= report.less(
                max_abs_error(actual.view(), expected.view()),
                tolerance,
                format!("Check that the phase change across the band is {degrees:.0} degrees at delay {delay_ns:.3} ns"),
            );
        }
    }
    ok
}
