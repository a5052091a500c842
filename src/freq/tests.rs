// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use approx::assert_abs_diff_eq;

use super::*;

fn small_config() -> CorrelatorConfig {
    CorrelatorConfig {
        n_chans: 16,
        bandwidth_hz: 1600.0,
        sample_rate_hz: 3200.0,
        xeng_accumulation_len: 4,
        accumulation_len: 2,
    }
}

#[test]
fn test_freq_info_derived_values() {
    let info = CorrelatorFreqInfo::new(&CorrelatorConfig::default()).unwrap();
    assert_eq!(info.n_chans, 4096);
    assert_abs_diff_eq!(info.delta_f, 856e6 / 4096.0);
    assert_abs_diff_eq!(info.chan_freqs[0], 0.0);
    assert_abs_diff_eq!(info.chan_freqs[1500], 1500.0 * 856e6 / 4096.0);
    assert_abs_diff_eq!(info.sample_period, 1.0 / 1712e6);
    assert_abs_diff_eq!(info.fft_period, 2.0 * 4096.0 / 1712e6, epsilon = 1e-18);
}

#[test]
fn test_freq_info_rejects_bad_configs() {
    let mut config = small_config();
    config.n_chans = 0;
    assert_eq!(
        CorrelatorFreqInfo::new(&config).unwrap_err(),
        FreqPlanError::NoChannels
    );

    let mut config = small_config();
    config.bandwidth_hz = -1.0;
    assert!(matches!(
        CorrelatorFreqInfo::new(&config),
        Err(FreqPlanError::BadBandwidth(_))
    ));

    let mut config = small_config();
    config.sample_rate_hz = f64::NAN;
    assert!(matches!(
        CorrelatorFreqInfo::new(&config),
        Err(FreqPlanError::BadSampleRate(_))
    ));
}

#[test]
fn test_two_samples_per_chan_hit_channel_edges() {
    let info = CorrelatorFreqInfo::new(&small_config()).unwrap();
    let w = info.delta_f;
    for target in 1..15 {
        let plan = info.calc_freq_samples(target, 2, 1).unwrap();
        // Three channels of width w sampled every w: 4 points, all on edges.
        assert_eq!(plan.len(), 2 * (2 * 1 + 1) - 2 * 1);
        assert_abs_diff_eq!(plan.first(), info.chan_freqs[target - 1] - w / 2.0);
        assert_abs_diff_eq!(plan.last(), info.chan_freqs[target + 1] + w / 2.0);
        for (i, &f) in plan.iter().enumerate() {
            assert_abs_diff_eq!(f, plan.first() + i as f64 * w, epsilon = 1e-9);
        }
        assert_eq!(plan.start_chan, target - 1);
        assert_eq!(plan.end_chan, target + 1);
    }
}

#[test]
fn test_one_sample_per_chan_gives_centres() {
    let info = CorrelatorFreqInfo::new(&small_config()).unwrap();
    let plan = info.calc_freq_samples(7, 1, 2).unwrap();
    assert_eq!(plan.freqs(), &info.chan_freqs[5..=9]);
    assert!(plan.freqs().windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_odd_samples_per_chan_include_centre() {
    let info = CorrelatorFreqInfo::new(&small_config()).unwrap();
    let plan = info.calc_freq_samples(4, 101, 2).unwrap();
    // 5 channels of 100 intervals each.
    assert_eq!(plan.len(), 501);
    let fc = info.chan_freqs[4];
    assert!(plan.iter().any(|&f| (f - fc).abs() < 1e-9));
    // Edges of the target channel are sampled too.
    let (lo, hi) = info.channel_edges(4);
    assert!(plan.iter().any(|&f| (f - lo).abs() < 1e-9));
    assert!(plan.iter().any(|&f| (f - hi).abs() < 1e-9));
}

#[test]
fn test_zero_chans_around_is_allowed() {
    let info = CorrelatorFreqInfo::new(&small_config()).unwrap();
    let plan = info.calc_freq_samples(0, 1, 0).unwrap();
    assert_eq!(plan.freqs(), &[0.0]);

    let plan = info.calc_freq_samples(15, 3, 0).unwrap();
    assert_eq!(plan.len(), 3);
    assert_abs_diff_eq!(plan.freqs()[1], info.chan_freqs[15]);
}

#[test]
fn test_invalid_ranges() {
    let info = CorrelatorFreqInfo::new(&small_config()).unwrap();
    assert_eq!(
        info.calc_freq_samples(1, 3, 2).unwrap_err(),
        FreqPlanError::InvalidRange {
            chan: 1,
            chans_around: 2,
            max_chan: 15
        }
    );
    assert!(matches!(
        info.calc_freq_samples(14, 3, 2),
        Err(FreqPlanError::InvalidRange { .. })
    ));
    assert!(matches!(
        info.calc_freq_samples(16, 1, 0),
        Err(FreqPlanError::InvalidRange { .. })
    ));
    assert!(matches!(
        info.calc_freq_samples(usize::MAX, 1, 1),
        Err(FreqPlanError::InvalidRange { .. })
    ));
    assert_eq!(
        info.calc_freq_samples(5, 0, 1).unwrap_err(),
        FreqPlanError::ZeroSamplesPerChan
    );
}

#[test]
fn test_planning_is_deterministic() {
    let info = CorrelatorFreqInfo::new(&CorrelatorConfig::default()).unwrap();
    let a = info.calc_freq_samples(1500, 101, 2).unwrap();
    let b = info.calc_freq_samples(1500, 101, 2).unwrap();
    let a_bits: Vec<u64> = a.iter().map(|f| f.to_bits()).collect();
    let b_bits: Vec<u64> = b.iter().map(|f| f.to_bits()).collect();
    assert_eq!(a_bits, b_bits);

    let c = calc_freq_samples(1500, 101, 2, info.delta_f, &info.chan_freqs).unwrap();
    assert_eq!(a, c);
}

#[test]
fn test_closest_channel_and_bands() {
    let info = CorrelatorFreqInfo::new(&small_config()).unwrap();
    assert_eq!(info.closest_channel(-50.0), 0);
    assert_eq!(info.closest_channel(149.0), 1);
    assert_eq!(info.closest_channel(151.0), 2);
    assert_eq!(info.closest_channel(1e9), 15);

    let (lo, hi) = info.central_band(3, 0.8);
    assert_abs_diff_eq!(lo, 300.0 - 40.0);
    assert_abs_diff_eq!(hi, 300.0 + 40.0);
    let (lo, hi) = info.channel_edges(3);
    assert_abs_diff_eq!(lo, 250.0);
    assert_abs_diff_eq!(hi, 350.0);
}
