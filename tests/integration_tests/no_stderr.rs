// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Tests to ensure there is no stderr output for successful commands.

use crate::{cbf_verify, get_cmd_output, N_CHANS};

fn assert_no_stderr(args: &[&str]) {
    let cmd = cbf_verify()
        .args(args)
        .args(["--n-chans", N_CHANS, "--no-progress-bars"])
        .ok();
    assert!(cmd.is_ok(), "{} failed: {}", args[0], cmd.err().unwrap());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.is_empty(), "stderr wasn't empty: {stderr}");
}

#[test]
fn test_freq_plan_no_stderr() {
    assert_no_stderr(&["freq-plan", "--test-chan", "10", "--samples-per-chan", "5"]);
}

#[test]
fn test_channelisation_no_stderr() {
    assert_no_stderr(&[
        "channelisation",
        "--test-chan", "20",
        "--samples-per-chan", "5",
        "--chans-around", "1",
    ]);
}

#[test]
fn test_sfdr_no_stderr() {
    assert_no_stderr(&["sfdr"]);
}

#[test]
fn test_consistency_no_stderr() {
    assert_no_stderr(&["consistency", "--test-chan", "20"]);
}

#[test]
fn test_delays_no_stderr() {
    assert_no_stderr(&["delays"]);
}

#[test]
fn test_vacc_no_stderr() {
    assert_no_stderr(&["vacc", "--acc-times", "1ms", "2ms"]);
}

#[test]
fn test_flags_no_stderr() {
    assert_no_stderr(&["flags"]);
}

#[test]
fn test_baselines_no_stderr() {
    assert_no_stderr(&["baselines"]);
}
