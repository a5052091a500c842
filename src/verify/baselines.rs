// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Baseline correlation products: every baseline formed from a live pair of
//! inputs must have data, and every other baseline must be zero.

use std::collections::BTreeSet;

use itertools::Itertools;
use ndarray::prelude::*;

use crate::{
    report::Report,
    spectrum::{all_nonzero_baselines, nonzero_baselines, zero_baselines},
};

/// Are all input pairs (in either order) present in the baseline ordering?
pub fn all_baselines_present(input_labels: &[String], baselines: &[(String, String)]) -> bool {
    input_labels
        .iter()
        .cartesian_product(input_labels.iter())
        .all(|(a, b)| {
            baselines
                .iter()
                .any(|(i, j)| (i == a && j == b) || (i == b && j == a))
        })
}

/// Split baseline indices by whether both of their inputs are live.
/// Returns (zero, non-zero).
pub fn expected_baselines(
    baselines: &[(String, String)],
    nonzero_inputs: &BTreeSet<String>,
) -> (BTreeSet<usize>, BTreeSet<usize>) {
    baselines
        .iter()
        .enumerate()
        .partition_map(|(i_bl, (a, b))| {
            if nonzero_inputs.contains(a) && nonzero_inputs.contains(b) {
                itertools::Either::Right(i_bl)
            } else {
                itertools::Either::Left(i_bl)
            }
        })
}

/// With correlated noise on every input, no baseline may be zero in any
/// channel.
pub fn check_all_baselines_live(xeng_raw: ArrayView3<i32>, report: &mut Report) -> bool {
    let a = report.equals(
        &zero_baselines(xeng_raw),
        &BTreeSet::new(),
        "Check that no baselines have all-zero visibilities",
    );
    let b = report.equals(
        &nonzero_baselines(xeng_raw),
        &all_nonzero_baselines(xeng_raw),
        "Check that all baseline visibilities are non-zero across all channels",
    );
    a && b
}

/// With some inputs zeroed, only baselines between live inputs may have
/// data.
pub fn check_live_inputs(
    xeng_raw: ArrayView3<i32>,
    baselines: &[(String, String)],
    nonzero_inputs: &BTreeSet<String>,
    report: &mut Report,
) -> bool {
    let (expected_zero, expected_nonzero) = expected_baselines(baselines, nonzero_inputs);
    let a = report.equals(
        &all_nonzero_baselines(xeng_raw),
        &expected_nonzero,
        format!(
            "Check that expected baseline visibilities are non-zero with non-zero inputs [{}]",
            nonzero_inputs.iter().join(", ")
        ),
    );
    let b = report.equals(
        &zero_baselines(xeng_raw),
        &expected_zero,
        "Also check that expected baseline visibilities are zero",
    );
    a && b
}
