// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Checks that dumps taken with identical inputs are identical.

use itertools::Itertools;
use ndarray::prelude::*;

use crate::report::Report;

/// The largest absolute difference between two x-engine dumps, relative to
/// `norm`.
pub fn relative_difference(a: ArrayView3<i32>, b: ArrayView3<i32>, norm: f64) -> f64 {
    let max_diff = a
        .iter()
        .zip(b.iter())
        .map(|(&a, &b)| (i64::from(a) - i64::from(b)).unsigned_abs())
        .max()
        .unwrap_or(0);
    max_diff as f64 / norm
}

fn max_value(a: ArrayView3<i32>) -> Option<f64> {
    a.iter().copied().max().map(f64::from).filter(|&m| m > 0.0)
}

/// Compare every dump after the first against the first. Returns the
/// largest relative difference, or `None` if the comparison couldn't be
/// made.
pub fn check_back_to_back(
    dumps: &[Array3<i32>],
    threshold: f64,
    freq: f64,
    report: &mut Report,
) -> Option<f64> {
    let (first, rest) = match dumps.split_first() {
        Some((first, rest)) if !rest.is_empty() => (first, rest),
        _ => {
            report.failed(format!(
                "At least two dumps are needed for a back-to-back comparison at {:.6} MHz (got {})",
                freq / 1e6,
                dumps.len()
            ));
            return None;
        }
    };
    let norm = match max_value(first.view()) {
        Some(n) => n,
        None => {
            report.failed(format!(
                "The first dump at {:.6} MHz has no positive data to normalise by",
                freq / 1e6
            ));
            return None;
        }
    };
    if rest.iter().any(|d| d.dim() != first.dim()) {
        report.failed(format!(
            "Back-to-back dumps at {:.6} MHz have different shapes",
            freq / 1e6
        ));
        return None;
    }

    let worst = rest
        .iter()
        .map(|d| relative_difference(first.view(), d.view(), norm))
        .fold(0.0, f64::max);
    report.less(
        worst,
        threshold,
        format!(
            "Check that back-to-back dumps at {:.6} MHz differ by no more than {} dB",
            freq / 1e6,
            10.0 * threshold.log10()
        ),
    );
    Some(worst)
}

/// Compare repeated frequency scans against the first scan. `scans[i][j]` is
/// the dump of scan `i` at frequency `freqs[j]`. A single outcome is
/// recorded, listing every frequency that differed.
pub fn check_freq_scans(
    scans: &[Vec<Array3<i32>>],
    freqs: &[f64],
    threshold: f64,
    report: &mut Report,
) -> f64 {
    let mut worst: f64 = 0.0;
    let mut failures = vec![];
    if let Some((first, rest)) = scans.split_first() {
        for (i_freq, s0) in first.iter().enumerate() {
            let freq = freqs.get(i_freq).copied().unwrap_or(f64::NAN);
            let norm = match max_value(s0.view()) {
                Some(n) => n,
                None => {
                    failures.push(format!("{:.6} MHz (no data)", freq / 1e6));
                    continue;
                }
            };
            for (i_scan, scan) in rest.iter().enumerate() {
                let diff = match scan.get(i_freq) {
                    Some(s) if s.dim() == s0.dim() => relative_difference(s0.view(), s.view(), norm),
                    _ => f64::INFINITY,
                };
                worst = worst.max(diff);
                if diff >= threshold || diff.is_nan() {
                    failures.push(format!(
                        "{:.6} MHz (scan {}: {diff:e})",
                        freq / 1e6,
                        i_scan + 1
                    ));
                }
            }
        }
    }

    let msg = format!(
        "Check that identical frequency scans differ by no more than {} dB",
        10.0 * threshold.log10()
    );
    if scans.len() < 2 {
        report.failed(format!("{msg}; at least two scans are needed"));
    } else if failures.is_empty() {
        report.passed(msg);
    } else {
        report.failed(format!("{msg}; failing frequencies: {}", failures.iter().join(", ")));
    }
    worst
}
