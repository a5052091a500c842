// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use approx::assert_abs_diff_eq;
use ndarray::Array3;

use super::*;
use crate::{c64, freq::CorrelatorConfig};

/// 8 channels, 100 Hz apart.
fn small_freq_info() -> CorrelatorFreqInfo {
    CorrelatorFreqInfo::new(&CorrelatorConfig {
        n_chans: 8,
        bandwidth_hz: 800.0,
        sample_rate_hz: 1600.0,
        ..Default::default()
    })
    .unwrap()
}

fn single_bin(n: usize, k: usize, value: f64) -> ChannelSpectrum {
    let mut m = Array1::zeros(n);
    m[k] = value;
    ChannelSpectrum::new(m)
}

fn record(freq: f64, channel: usize, spectrum: ChannelSpectrum) -> ResponseRecord {
    ResponseRecord {
        freq,
        channel,
        spectrum,
    }
}

#[test]
fn test_single_bin_has_no_extra_peaks() {
    for k in 0..8 {
        let spectrum = single_bin(8, k, 0.3);
        let peak = spectrum.peak_channel().unwrap();
        assert_eq!(peak, k);
        assert!(extra_peaks(&spectrum, peak, 20.0).is_empty());
    }
}

#[test]
fn test_extra_peak_within_cutoff() {
    let mut m = Array1::zeros(8);
    m[3] = 1.0;
    // -15 dB
    m[5] = 10_f64.powf(-1.5);
    // -25 dB
    m[6] = 10_f64.powf(-2.5);
    let spectrum = ChannelSpectrum::new(m);
    assert_eq!(extra_peaks(&spectrum, 3, 20.0), BTreeSet::from([5]));
    assert_eq!(extra_peaks(&spectrum, 3, 26.0), BTreeSet::from([5, 6]));
}

#[test]
fn test_ripple_db() {
    assert_eq!(ripple_db(std::iter::empty()), None);
    assert_abs_diff_eq!(ripple_db([-3.0, -3.0, -3.0]).unwrap(), 0.0);
    assert_abs_diff_eq!(ripple_db([-3.0, -3.2, -2.9]).unwrap(), 0.3, epsilon = 1e-12);
}

#[test]
fn test_flat_ripple_passes() {
    let freq_info = small_freq_info();
    let verifier = ChannelResponseVerifier::new(&freq_info, Thresholds::default());
    // Channel 3 is centred at 300 Hz; its central band is 260 to 340 Hz.
    let records: Vec<ResponseRecord> = [260.0, 280.0, 300.0, 320.0, 340.0]
        .into_iter()
        .map(|f| record(f, 3, single_bin(8, 3, 0.25)))
        .collect();
    let mut report = Report::new("channelisation");
    let summary = verifier.check_channelisation(&records, 3, &mut report);
    assert_eq!(summary.num_central, 5);
    assert_abs_diff_eq!(summary.ripple_db.unwrap(), 0.0);
    assert_abs_diff_eq!(summary.max_response.unwrap(), 0.25);
    assert!(summary.peak_mismatches.is_empty());
    assert!(report.all_passed(), "{:?}", report.failures().collect::<Vec<_>>());
}

#[test]
fn test_records_outside_the_central_band_are_ignored() {
    let freq_info = small_freq_info();
    let verifier = ChannelResponseVerifier::new(&freq_info, Thresholds::default());
    let records = vec![
        // On the channel edge, the response is allowed to be anywhere.
        record(250.0, 3, single_bin(8, 2, 0.1)),
        record(300.0, 3, single_bin(8, 3, 0.2)),
        record(350.0, 3, single_bin(8, 4, 0.1)),
    ];
    let mut report = Report::new("channelisation");
    let summary = verifier.check_channelisation(&records, 3, &mut report);
    assert_eq!(summary.num_central, 1);
    assert!(report.all_passed());
}

#[test]
fn test_peak_mismatch_is_recorded_and_continues() {
    let freq_info = small_freq_info();
    let verifier = ChannelResponseVerifier::new(&freq_info, Thresholds::default());
    let mut wrong = Array1::zeros(8);
    wrong[3] = 0.2;
    wrong[4] = 0.3;
    let records = vec![
        record(290.0, 3, single_bin(8, 3, 0.2)),
        record(310.0, 3, ChannelSpectrum::new(wrong)),
    ];
    let mut report = Report::new("channelisation");
    let summary = verifier.check_channelisation(&records, 3, &mut report);
    assert_eq!(
        summary.peak_mismatches,
        vec![PeakMismatch {
            freq: 310.0,
            expected: 3,
            actual: Some(4)
        }]
    );
    assert_eq!(report.num_failed(), 1);
    // Overrange and ripple were still checked.
    assert!(summary.ripple_db.is_some());
    assert_eq!(report.outcomes().count(), 4);
}

#[test]
fn test_zero_spectrum_is_a_distinct_failure() {
    let freq_info = small_freq_info();
    let verifier = ChannelResponseVerifier::new(&freq_info, Thresholds::default());
    let records = vec![record(300.0, 3, ChannelSpectrum::new(Array1::zeros(8)))];
    let mut report = Report::new("channelisation");
    let summary = verifier.check_channelisation(&records, 3, &mut report);
    assert_eq!(summary.peak_mismatches[0].actual, None);
    let failures: Vec<&str> = report.failures().map(|o| o.message.as_str()).collect();
    assert!(failures[0].contains("is zero"));
    // The zero response also fails the ripple check.
    assert_eq!(report.num_failed(), 3);
}

#[test]
fn test_ripple_and_overrange_failures() {
    let freq_info = small_freq_info();
    let verifier = ChannelResponseVerifier::new(&freq_info, Thresholds::default());
    let records = vec![
        record(290.0, 3, single_bin(8, 3, 0.995)),
        // 0.5 dB down.
        record(310.0, 3, single_bin(8, 3, 0.995 * 10_f64.powf(-0.05))),
    ];
    let mut report = Report::new("channelisation");
    let summary = verifier.check_channelisation(&records, 3, &mut report);
    assert_abs_diff_eq!(summary.ripple_db.unwrap(), 0.5, epsilon = 1e-9);
    assert_eq!(report.num_failed(), 2);

    // A looser caller-supplied ripple threshold passes.
    let verifier = ChannelResponseVerifier::new(
        &freq_info,
        Thresholds {
            ripple_db: 0.6,
            overrange_fraction: 1.0,
            ..Default::default()
        },
    );
    let mut report = Report::new("channelisation");
    verifier.check_channelisation(&records, 3, &mut report);
    assert!(report.all_passed());
}

#[test]
fn test_no_central_records_fails() {
    let freq_info = small_freq_info();
    let verifier = ChannelResponseVerifier::new(&freq_info, Thresholds::default());
    let records = vec![record(100.0, 1, single_bin(8, 1, 0.2))];
    let mut report = Report::new("channelisation");
    let summary = verifier.check_channelisation(&records, 3, &mut report);
    assert_eq!(summary.num_central, 0);
    assert_eq!(summary.ripple_db, None);
    assert_eq!(report.num_failed(), 1);
}

#[test]
fn test_sfdr() {
    let freq_info = small_freq_info();
    let verifier = ChannelResponseVerifier::new(&freq_info, Thresholds::default());
    let mut records: Vec<ResponseRecord> = (1..8)
        .map(|chan| record(freq_info.chan_freqs[chan], chan, single_bin(8, chan, 0.25)))
        .collect();
    let mut report = Report::new("sfdr");
    let summary = verifier.check_sfdr(&records, &mut report);
    assert!(report.all_passed());
    assert_eq!(summary.num_spurious_records(), 0);
    assert_eq!(summary.peak_channels[0], Some(1));

    // A spur at -15 dB in channel 6 while testing channel 2.
    let mut m = Array1::zeros(8);
    m[2] = 0.25;
    m[6] = 0.25 * 10_f64.powf(-1.5);
    records[1].spectrum = ChannelSpectrum::new(m);
    let mut report = Report::new("sfdr");
    let summary = verifier.check_sfdr(&records, &mut report);
    assert_eq!(summary.extra_peaks[1], BTreeSet::from([6]));
    assert_eq!(summary.num_spurious_records(), 1);
    assert_eq!(report.num_failed(), 1);
    // A 10 dB cutoff tolerates it.
    let verifier = ChannelResponseVerifier::new(
        &freq_info,
        Thresholds {
            sfdr_cutoff_db: 10.0,
            ..Default::default()
        },
    );
    let mut report = Report::new("sfdr");
    verifier.check_sfdr(&records, &mut report);
    assert!(report.all_passed());
}

#[test]
fn test_sfdr_wrong_peak() {
    let freq_info = small_freq_info();
    let verifier = ChannelResponseVerifier::new(&freq_info, Thresholds::default());
    let records = vec![record(100.0, 1, single_bin(8, 2, 0.25))];
    let mut report = Report::new("sfdr");
    let summary = verifier.check_sfdr(&records, &mut report);
    assert_eq!(summary.peak_channels, vec![Some(2)]);
    assert_eq!(report.num_failed(), 1);
}

#[test]
fn test_plot_data() {
    let freq_info = small_freq_info();
    let verifier = ChannelResponseVerifier::new(&freq_info, Thresholds::default());
    let records = vec![
        record(250.0, 3, single_bin(8, 3, 0.05)),
        record(300.0, 3, single_bin(8, 3, 0.5)),
        record(350.0, 3, single_bin(8, 3, 0.0)),
    ];
    let data = verifier.channel_response_plot_data(&records, 3, false).unwrap();
    assert_eq!(data.freqs, vec![250.0, 300.0, 350.0]);
    assert_abs_diff_eq!(data.responses_db[0], -13.010299956639813, epsilon = 1e-9);
    assert_abs_diff_eq!(data.responses_db[1], -3.010299956639812, epsilon = 1e-9);
    // Clipped to the dynamic range below the peak.
    assert_abs_diff_eq!(data.responses_db[2], -93.010299956639812, epsilon = 1e-9);
    assert_abs_diff_eq!(data.markers.centre, 300.0);
    assert_abs_diff_eq!(data.markers.central.0, 260.0);
    assert_abs_diff_eq!(data.markers.central.1, 340.0);
    assert_abs_diff_eq!(data.markers.edges.0, 250.0);
    assert_abs_diff_eq!(data.markers.edges.1, 350.0);

    let data = verifier.channel_response_plot_data(&records, 3, true).unwrap();
    assert_eq!(data.freqs, vec![300.0]);
    assert!(data.title.contains("central"));
    assert_eq!(data.cutoff_db, None);

    assert!(verifier.channel_response_plot_data(&records, 8, false).is_none());
}

#[test]
fn test_mismatched_records_fail_without_panicking() {
    let freq_info = small_freq_info();
    let verifier = ChannelResponseVerifier::new(&freq_info, Thresholds::default());
    let records = vec![
        // Only 4 channels, but the correlator has 8.
        record(290.0, 3, single_bin(4, 3, 0.2)),
        // A channel the correlator doesn't have.
        record(300.0, 10, single_bin(8, 3, 0.2)),
        record(310.0, 3, single_bin(8, 3, 0.2)),
    ];
    let mut report = Report::new("channelisation");
    let summary = verifier.check_channelisation(&records, 3, &mut report);
    assert_eq!(summary.num_central, 1);
    assert!(summary.peak_mismatches.is_empty());
    let failures: Vec<&str> = report.failures().map(|o| o.message.as_str()).collect();
    assert_eq!(failures.len(), 2, "{failures:?}");
    assert!(failures[0].contains("has 4 channels; expected 8"));
    assert!(failures[1].contains("attributed to channel 10"));
    // The usable record was still checked for overrange and ripple.
    assert_eq!(report.outcomes().count(), 6);

    // A test channel the correlator doesn't have.
    let mut report = Report::new("channelisation");
    let summary = verifier.check_channelisation(&records[2..], 64, &mut report);
    assert_eq!(summary.num_central, 0);
    assert!(report
        .failures()
        .any(|o| o.message.contains("Channel 64 is not one of the 8 channels")));

    let mut report = Report::new("sfdr");
    let summary = verifier.check_sfdr(&records, &mut report);
    assert_eq!(summary.peak_channels, vec![Some(3)]);
    assert_eq!(report.num_failed(), 2);
}

#[test]
fn test_spur_level() {
    let mut m = Array1::zeros(8);
    m[3] = 1.0;
    m[5] = 0.01;
    assert_abs_diff_eq!(spur_level_db(&ChannelSpectrum::new(m)).unwrap(), -20.0, epsilon = 1e-9);
    assert_eq!(spur_level_db(&single_bin(8, 2, 0.3)), Some(f64::NEG_INFINITY));
    assert_eq!(spur_level_db(&ChannelSpectrum::new(Array1::zeros(8))), None);
    assert_eq!(spur_level_db(&single_bin(1, 0, 0.3)), None);
}

#[test]
fn test_sfdr_plot_data() {
    let freq_info = small_freq_info();
    let verifier = ChannelResponseVerifier::new(&freq_info, Thresholds::default());
    let mut spurious = Array1::zeros(8);
    spurious[2] = 0.5;
    spurious[6] = 0.05;
    let records = vec![
        record(100.0, 1, single_bin(8, 1, 0.25)),
        record(200.0, 2, ChannelSpectrum::new(spurious)),
        record(300.0, 3, single_bin(4, 3, 0.25)),
    ];

    let (worst, level) = verifier.worst_sfdr_record(&records).unwrap();
    assert_eq!(worst.channel, 2);
    assert_abs_diff_eq!(level, -10.0, epsilon = 1e-9);

    let data = verifier.sfdr_plot_data(worst).unwrap();
    assert_eq!(data.cutoff_db, Some(-DEFAULT_SFDR_CUTOFF_DB));
    assert_eq!(data.freqs, freq_info.chan_freqs);
    assert_eq!(data.x_desc, CHANNEL_FREQ_DESC);
    // Normalised to the peak.
    assert_abs_diff_eq!(data.responses_db[2], 0.0);
    assert_abs_diff_eq!(data.responses_db[6], -10.0, epsilon = 1e-9);
    assert_abs_diff_eq!(data.markers.centre, 200.0);

    // A caller-supplied cutoff is what gets drawn.
    let verifier = ChannelResponseVerifier::new(
        &freq_info,
        Thresholds {
            sfdr_cutoff_db: 30.0,
            ..Default::default()
        },
    );
    assert_eq!(verifier.sfdr_plot_data(&records[0]).unwrap().cutoff_db, Some(-30.0));
    // The spectrum doesn't cover the correlator's channels.
    assert!(verifier.sfdr_plot_data(&records[2]).is_none());
}

#[test]
fn test_thresholds_from_toml() {
    let t: Thresholds = toml::from_str("ripple_db = 0.5").unwrap();
    assert_abs_diff_eq!(t.ripple_db, 0.5);
    assert_abs_diff_eq!(t.sfdr_cutoff_db, DEFAULT_SFDR_CUTOFF_DB);
}

mod consistency {
    use super::*;
    use crate::verify::consistency::*;

    fn dump(value: i32) -> Array3<i32> {
        let mut d = Array3::from_elem((4, 3, 2), 1);
        d[(2, 0, 0)] = value;
        d
    }

    #[test]
    fn test_back_to_back() {
        let mut report = Report::new("b2b");
        let dumps = vec![dump(1000), dump(1000), dump(1000)];
        let worst = check_back_to_back(&dumps, 1e-7, 428e6, &mut report);
        assert_abs_diff_eq!(worst.unwrap(), 0.0);
        assert!(report.all_passed());

        let dumps = vec![dump(1000), dump(1000), dump(999)];
        let worst = check_back_to_back(&dumps, 1e-7, 428e6, &mut report);
        assert_abs_diff_eq!(worst.unwrap(), 1e-3);
        assert_eq!(report.num_failed(), 1);
    }

    #[test]
    fn test_back_to_back_needs_two_dumps() {
        let mut report = Report::new("b2b");
        assert!(check_back_to_back(&[dump(1000)], 1e-7, 0.0, &mut report).is_none());
        let zeros = vec![Array3::zeros((2, 1, 2)); 2];
        assert!(check_back_to_back(&zeros, 1e-7, 0.0, &mut report).is_none());
        assert_eq!(report.num_failed(), 2);
    }

    #[test]
    fn test_freq_scans() {
        let freqs = [1.0, 2.0];
        let scan = vec![dump(100), dump(200)];
        let mut report = Report::new("scans");
        let worst = check_freq_scans(&[scan.clone(), scan.clone()], &freqs, 1e-7, &mut report);
        assert_abs_diff_eq!(worst, 0.0);
        assert!(report.all_passed());

        let bad = vec![dump(100), dump(180)];
        let mut report = Report::new("scans");
        let worst = check_freq_scans(&[scan.clone(), scan, bad], &freqs, 1e-7, &mut report);
        assert_abs_diff_eq!(worst, 0.1);
        assert_eq!(report.num_failed(), 1);
        let msg = &report.failures().next().unwrap().message;
        assert!(msg.contains("scan 2"), "{msg}");
    }
}

mod delay {
    use super::*;
    use crate::verify::delay::*;

    #[test]
    fn test_expected_phases() {
        let freqs = [0.0, 100.0, 200.0];
        let phases = expected_phases(&freqs, 1e-3);
        // 2π f τ = [0, 0.2π, 0.4π], minus 0.2π.
        assert_abs_diff_eq!(phases[0], -0.2 * PI, epsilon = 1e-12);
        assert_abs_diff_eq!(phases[1], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(phases[2], 0.2 * PI, epsilon = 1e-12);

        let flat = expected_phases(&freqs, 0.0);
        assert!(flat.iter().all(|&p| p == 0.0));
    }

    #[test]
    fn test_phase_span_rounds() {
        assert_abs_diff_eq!(phase_span(array![-1.0, 0.5, 2.1234].view()), 3.12);
        assert_abs_diff_eq!(phase_span(Array1::zeros(0).view()), 0.0);
    }

    #[test]
    fn test_measured_phases() {
        let data = array![[1, 0], [0, 1], [-1, 0]];
        let phases = measured_phases(data.view());
        assert_abs_diff_eq!(phases, array![0.0, PI / 2.0, PI], epsilon = 1e-12);
    }

    #[test]
    fn test_check_delay_phases() {
        let freq_info = small_freq_info();
        let delays = [0.0, freq_info.sample_period, 1.5 * freq_info.sample_period];
        let measured: Vec<(f64, Array1<f64>)> = delays
            .iter()
            .map(|&d| (d, expected_phases(&freq_info.chan_freqs, d) + 0.001))
            .collect();
        let mut report = Report::new("delays");
        assert!(check_delay_phases(
            &freq_info.chan_freqs,
            &measured,
            0.01,
            &mut report
        ));
        assert_eq!(report.num_passed(), 6);

        // The delay wasn't applied at all.
        let measured = vec![(freq_info.sample_period, Array1::zeros(8))];
        let mut report = Report::new("delays");
        assert!(!check_delay_phases(
            &freq_info.chan_freqs,
            &measured,
            0.01,
            &mut report
        ));
        assert_eq!(report.num_failed(), 2);
    }
}

mod vacc {
    use super::*;
    use crate::verify::vacc::*;

    #[test]
    fn test_accumulation_lengths() {
        let freq_info = CorrelatorFreqInfo::new(&CorrelatorConfig::default()).unwrap();
        let lens = accumulation_lengths(
            &[0.05, 0.1, 0.5, 1.0],
            freq_info.fft_period,
            freq_info.xeng_accumulation_len,
        );
        assert_eq!(lens, vec![41, 82, 409, 817]);
    }

    #[test]
    fn test_vacc_offset() {
        let mut xeng = Array3::zeros((4, 3, 2));
        assert_eq!(vacc_offset(xeng.view()), None);
        xeng[(1, 0, 0)] = 10;
        assert_eq!(vacc_offset(xeng.view()), Some(0));
        xeng[(1, 0, 0)] = 0;
        xeng[(1, 1, 0)] = 10;
        assert_eq!(vacc_offset(xeng.view()), Some(1));
        xeng[(1, 0, 1)] = 10;
        assert_eq!(vacc_offset(xeng.view()), None);
    }

    #[test]
    fn test_quantiser_spectrum() {
        let mut q = Array1::from_elem(8, c64::new(0.0, 0.0));
        q[5] = c64::new(75.0 / 128.0, 0.0);
        let q = denormalise_quantiser(q.view());
        assert_abs_diff_eq!(q[5].re, 75.0);

        let mut report = Report::new("vacc");
        assert!(check_quantiser_spectrum(q.view(), 5, &mut report));
        assert!(!check_quantiser_spectrum(q.view(), 4, &mut report));
        assert_eq!(report.num_failed(), 2);
    }

    #[test]
    fn test_vacc_response() {
        let mut q = Array1::from_elem(4, c64::new(0.0, 0.0));
        q[2] = c64::new(3.0, 4.0);
        let expected = expected_vacc_response(q.view(), 100);
        assert_abs_diff_eq!(expected, array![0.0, 0.0, 2500.0, 0.0]);

        let mut data = Array2::zeros((4, 2));
        data[(2, 0)] = 2500;
        let mut report = Report::new("vacc");
        assert!(check_vacc_response(expected.view(), data.view(), 100, &mut report));
        data[(2, 1)] = 1;
        assert!(!check_vacc_response(expected.view(), data.view(), 100, &mut report));
    }
}

mod baselines {
    use super::*;
    use crate::verify::baselines::*;

    fn labels() -> (Vec<String>, Vec<(String, String)>) {
        let x = "m000_x".to_string();
        let y = "m000_y".to_string();
        (
            vec![x.clone(), y.clone()],
            vec![(x.clone(), x.clone()), (y.clone(), y.clone()), (x, y)],
        )
    }

    #[test]
    fn test_all_baselines_present() {
        let (inputs, bls) = labels();
        assert!(all_baselines_present(&inputs, &bls));
        assert!(!all_baselines_present(&inputs, &bls[..2]));
    }

    #[test]
    fn test_expected_baselines() {
        let (_, bls) = labels();
        let live = BTreeSet::from(["m000_x".to_string()]);
        let (zero, nonzero) = expected_baselines(&bls, &live);
        assert_eq!(zero, BTreeSet::from([1, 2]));
        assert_eq!(nonzero, BTreeSet::from([0]));
    }

    #[test]
    fn test_check_live_inputs() {
        let (_, bls) = labels();
        let mut xeng = Array3::zeros((4, 3, 2));
        xeng.slice_mut(s![.., 0, 0]).fill(7);
        let live = BTreeSet::from(["m000_x".to_string()]);
        let mut report = Report::new("baselines");
        assert!(check_live_inputs(xeng.view(), &bls, &live, &mut report));
        assert!(!check_all_baselines_live(xeng.view(), &mut report));
        assert_eq!(report.num_failed(), 1);
    }
}
