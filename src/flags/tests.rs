// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use super::*;

#[test]
fn test_get_bit_flag() {
    assert!(get_bit_flag(0b101, 0));
    assert!(!get_bit_flag(0b101, 1));
    assert!(get_bit_flag(0b101, 2));
    assert!(get_bit_flag(1 << 63, 63));
    // Bits past the word are never set.
    assert!(!get_bit_flag(u64::MAX, 64));
}

#[test]
fn test_get_set_bits() {
    assert_eq!(get_set_bits(0, None), BTreeSet::new());
    assert_eq!(get_set_bits(0b1011, None), BTreeSet::from([0, 1, 3]));

    let consider = BTreeSet::from([1, 2, 3]);
    assert_eq!(get_set_bits(0b1011, Some(&consider)), BTreeSet::from([1, 3]));

    let packed = (1 << 33) | (1 << 5);
    assert_eq!(
        get_set_bits(packed, Some(&XengFlag::all_bits())),
        BTreeSet::from([33])
    );
}

#[test]
fn test_xeng_flag_bits() {
    assert_eq!(XengFlag::all_bits(), BTreeSet::from([32, 33, 34]));
    assert_eq!(XengFlag::NoiseDiode.bit(), 32);
    assert_eq!(XengFlag::Overrange.to_string(), "overrange");
}

#[test]
fn test_check_flag_dumps() {
    let overrange = 1 << XengFlag::Overrange.bit();
    let mut report = Report::new("flags");
    assert!(check_flag_dumps(
        &mut report,
        XengFlag::Overrange,
        "ADC overflow",
        0,
        overrange,
        0
    ));
    assert!(report.all_passed());
    assert_eq!(report.num_passed(), 6);

    // The flag never cleared, and the noise diode fired too.
    let mut report = Report::new("flags");
    let noise = 1 << XengFlag::NoiseDiode.bit();
    assert!(!check_flag_dumps(
        &mut report,
        XengFlag::Overrange,
        "ADC overflow",
        0,
        overrange | noise,
        overrange
    ));
    assert_eq!(report.num_failed(), 2);
}
