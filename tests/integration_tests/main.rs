// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Integration tests.
//!
//! Some help for laying out these tests was taken from:
//! https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html

mod no_stderr;
mod subcommands;

use std::{process::Output, str::from_utf8};

use assert_cmd::{output::OutputError, Command};

/// The number of channels used for every test; the default (4096) makes the
/// sweeps needlessly slow.
const N_CHANS: &str = "64";

fn cbf_verify() -> Command {
    Command::cargo_bin("cbf-verify").unwrap()
}

fn get_cmd_output(result: Result<Output, OutputError>) -> (String, String) {
    let output = match result {
        Ok(o) => o,
        Err(o) => o.as_output().unwrap().clone(),
    };
    (
        from_utf8(&output.stdout).unwrap().to_string(),
        from_utf8(&output.stderr).unwrap().to_string(),
    )
}

#[test]
fn test_help_lists_subcommands() {
    let cmd = cbf_verify().arg("--help").ok();
    assert!(cmd.is_ok(), "{:?}", cmd.err());
    let (stdout, _) = get_cmd_output(cmd);
    for sub in [
        "freq-plan",
        "channelisation",
        "sfdr",
        "consistency",
        "delays",
        "vacc",
        "flags",
        "baselines",
    ] {
        assert!(stdout.contains(sub), "{sub} missing from help:\n{stdout}");
    }
}

#[test]
fn test_no_subcommand_is_an_error() {
    let cmd = cbf_verify().ok();
    assert!(cmd.is_err());
}
