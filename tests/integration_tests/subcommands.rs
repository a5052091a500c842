// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Running each subcommand end-to-end against the simulated correlator.

use std::{fs::File, io::Write};

use approx::assert_abs_diff_eq;
use indoc::indoc;
use tempfile::TempDir;

use crate::{cbf_verify, get_cmd_output, N_CHANS};

#[test]
fn test_freq_plan_writes_json() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let output = tmp_dir.path().join("plan.json");

    #[rustfmt::skip]
    let cmd = cbf_verify()
        .args([
            "freq-plan",
            "--n-chans", N_CHANS,
            "--test-chan", "10",
            "--samples-per-chan", "5",
            "--chans-around", "1",
            "--output", &format!("{}", output.display()),
        ])
        .ok();
    assert!(cmd.is_ok(), "freq-plan failed: {}", cmd.err().unwrap());

    let freqs: Vec<f64> =
        serde_json::from_reader(File::open(&output).unwrap()).expect("plan isn't JSON");
    // 3 channels, 4 spacings per channel, plus the last edge.
    assert_eq!(freqs.len(), 13);
    let delta_f = 856e6 / 64.0;
    assert_abs_diff_eq!(freqs[0], 8.5 * delta_f, epsilon = 1e-3);
    assert_abs_diff_eq!(freqs[6], 10.0 * delta_f, epsilon = 1e-3);
    assert_abs_diff_eq!(freqs[12], 11.5 * delta_f, epsilon = 1e-3);
}

#[test]
fn test_invalid_plan_is_reported() {
    #[rustfmt::skip]
    let cmd = cbf_verify()
        .args([
            "channelisation",
            "--n-chans", N_CHANS,
            "--test-chan", "63",
            "--chans-around", "1",
            "--no-progress-bars",
        ])
        .ok();
    assert!(cmd.is_err());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(
        stderr.contains("Cannot sweep channel 63"),
        "unexpected stderr: {stderr}"
    );
}

#[test]
fn test_default_test_channel_needs_enough_channels() {
    let cmd = cbf_verify()
        .args(["consistency", "--n-chans", N_CHANS, "--dry-run"])
        .ok();
    assert!(cmd.is_err());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.contains("valid channel indices are 0 to 63"), "{stderr}");
}

#[test]
fn test_bad_units_are_reported() {
    let cmd = cbf_verify()
        .args(["sfdr", "--bandwidth", "856 furlongs", "--dry-run"])
        .ok();
    assert!(cmd.is_err());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.contains("856 furlongs"), "{stderr}");
}

#[test]
fn test_dry_run_doesnt_sweep() {
    #[rustfmt::skip]
    let cmd = cbf_verify()
        .args([
            "channelisation",
            "--n-chans", N_CHANS,
            "--test-chan", "20",
            "--dry-run",
        ])
        .ok();
    assert!(cmd.is_ok(), "{}", cmd.err().unwrap());
    let (stdout, _) = get_cmd_output(cmd);
    assert!(stdout.contains("Dry run"), "{stdout}");
    assert!(!stdout.contains("channelisation results"), "{stdout}");
}

#[test]
fn test_channelisation_passes() {
    #[rustfmt::skip]
    let cmd = cbf_verify()
        .args([
            "channelisation",
            "--n-chans", N_CHANS,
            "--test-chan", "20",
            "--samples-per-chan", "5",
            "--chans-around", "1",
            "--no-progress-bars",
        ])
        .ok();
    assert!(cmd.is_ok(), "{}", cmd.err().unwrap());
    let (stdout, _) = get_cmd_output(cmd);
    assert!(stdout.contains("0 failed"), "{stdout}");
    assert!(!stdout.contains("FAILED"), "{stdout}");
}

#[test]
fn test_args_file() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let args_file = tmp_dir.path().join("channelisation.toml");
    let mut f = File::create(&args_file).unwrap();
    f.write_all(
        indoc! {r#"
            test_chan = 63
            samples_per_chan = 5
            chans_around = 1

            [correlator]
            n_chans = 64
        "#}
        .as_bytes(),
    )
    .unwrap();
    drop(f);

    // Channel 63 can't have a channel above it.
    let cmd = cbf_verify()
        .args(["channelisation", &format!("{}", args_file.display()), "--dry-run"])
        .ok();
    assert!(cmd.is_err());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.contains("Cannot sweep channel 63"), "{stderr}");

    // CLI arguments take precedence over the file.
    #[rustfmt::skip]
    let cmd = cbf_verify()
        .args([
            "channelisation",
            &format!("{}", args_file.display()),
            "--test-chan", "20",
            "--no-progress-bars",
        ])
        .ok();
    assert!(cmd.is_ok(), "{}", cmd.err().unwrap());
}

#[test]
fn test_unknown_args_file_type() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let args_file = tmp_dir.path().join("args.yaml");
    File::create(&args_file).unwrap();

    let cmd = cbf_verify()
        .args(["flags", &format!("{}", args_file.display()), "--dry-run"])
        .ok();
    assert!(cmd.is_err());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.contains("recognised file extension"), "{stderr}");
}

#[test]
fn test_save_toml_round_trips() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let toml = tmp_dir.path().join("saved.toml");

    #[rustfmt::skip]
    let cmd = cbf_verify()
        .args([
            "delays",
            "--n-chans", N_CHANS,
            "--noise-scale", "0.5",
            "--save-toml", &format!("{}", toml.display()),
            "--dry-run",
        ])
        .ok();
    assert!(cmd.is_ok(), "{}", cmd.err().unwrap());
    let contents = std::fs::read_to_string(&toml).unwrap();
    assert!(contents.contains("noise_scale = 0.5"), "{contents}");
    assert!(contents.contains("n_chans = 64"), "{contents}");

    // The saved file reproduces the run.
    let cmd = cbf_verify()
        .args(["delays", &format!("{}", toml.display()), "--no-progress-bars"])
        .ok();
    assert!(cmd.is_ok(), "{}", cmd.err().unwrap());
}

#[test]
fn test_json_args_file() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let args_file = tmp_dir.path().join("flags.json");
    let mut f = File::create(&args_file).unwrap();
    f.write_all(br#"{"flags": ["noise-diode"], "correlator": {"n_chans": 64}}"#)
        .unwrap();
    drop(f);

    let cmd = cbf_verify()
        .args(["flags", &format!("{}", args_file.display()), "--no-progress-bars"])
        .ok();
    assert!(cmd.is_ok(), "{}", cmd.err().unwrap());
    let (stdout, _) = get_cmd_output(cmd);
    assert!(stdout.contains("noise diode"), "{stdout}");
    assert!(!stdout.contains("triggered by ADC overrange"), "{stdout}");
}

#[test]
fn test_unknown_flag() {
    let cmd = cbf_verify()
        .args(["flags", "--flags", "gremlins", "--dry-run"])
        .ok();
    assert!(cmd.is_err());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.contains("Unknown flag 'gremlins'"), "{stderr}");
}

#[test]
fn test_vacc_overflow_fails() {
    // A one-second accumulation with 64 channels is far more than the
    // accumulator can hold.
    #[rustfmt::skip]
    let cmd = cbf_verify()
        .args([
            "vacc",
            "--n-chans", N_CHANS,
            "--acc-times", "1s",
            "--no-progress-bars",
        ])
        .ok();
    assert!(cmd.is_err());
    let (stdout, stderr) = get_cmd_output(cmd);
    assert!(stdout.contains("overflows the accumulator"), "{stdout}");
    assert!(stderr.contains("checks failed in the VACC test"), "{stderr}");
}

#[test]
fn test_consistency_passes() {
    #[rustfmt::skip]
    let cmd = cbf_verify()
        .args([
            "consistency",
            "--n-chans", N_CHANS,
            "--test-chan", "20",
            "--num-dumps", "4",
            "--num-scans", "2",
            "--no-progress-bars",
        ])
        .ok();
    assert!(cmd.is_ok(), "{}", cmd.err().unwrap());
}

#[test]
fn test_too_few_dumps() {
    #[rustfmt::skip]
    let cmd = cbf_verify()
        .args([
            "consistency",
            "--n-chans", N_CHANS,
            "--test-chan", "20",
            "--num-dumps", "1",
            "--dry-run",
        ])
        .ok();
    assert!(cmd.is_err());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.contains("--num-dumps must be at least 2"), "{stderr}");
}

#[test]
fn test_sfdr_plot_dir_is_saved() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let toml = tmp_dir.path().join("sfdr.toml");
    let plot_dir = tmp_dir.path().join("plots");

    #[rustfmt::skip]
    let cmd = cbf_verify()
        .args([
            "sfdr",
            "--n-chans", N_CHANS,
            "--plot-dir", &format!("{}", plot_dir.display()),
            "--save-toml", &format!("{}", toml.display()),
            "--dry-run",
        ])
        .ok();
    assert!(cmd.is_ok(), "{}", cmd.err().unwrap());
    let contents = std::fs::read_to_string(&toml).unwrap();
    assert!(contents.contains("[plots]"), "{contents}");
    assert!(contents.contains("plot_dir"), "{contents}");
}
