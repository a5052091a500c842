// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use super::*;

use approx::assert_abs_diff_eq;

#[test]
fn test_parse_freq_str_without_units() {
    for s in ["1", "1.0", " 1.0 ", "1e0"] {
        let result = parse_freq(s);
        assert!(result.is_ok(), "{:?}", result.unwrap_err());
        let pair = result.unwrap();
        assert_abs_diff_eq!(pair.0, 1.0);
        assert_eq!(pair.1, None);
    }
}

#[test]
fn test_parse_freq_str_with_units() {
    // Iterate over all possible units.
    for freq_format in FreqFormat::iter() {
        let freq_format_str: &'static str = freq_format.into();
        for freq_format_str in [
            freq_format_str.to_string(),
            freq_format_str.to_lowercase(),
            freq_format_str.to_uppercase(),
        ] {
            for s in [
                format!("1{freq_format_str}"),
                format!("1.0{freq_format_str}"),
                format!(" 1.0{freq_format_str} "),
                format!(" 1.0 {freq_format_str} "),
            ] {
                let result = parse_freq(&s);
                assert!(result.is_ok(), "{:?}", result.unwrap_err());
                let pair = result.unwrap();
                assert_abs_diff_eq!(pair.0, 1.0);
                assert_eq!(pair.1, Some(freq_format));
            }
        }
    }
}

#[test]
fn test_parse_freq_hz() {
    assert_abs_diff_eq!(parse_freq_hz("428MHz").unwrap(), 428e6);
    assert_abs_diff_eq!(parse_freq_hz("1.712 GHz").unwrap(), 1.712e9, epsilon = 1e-3);
    assert_abs_diff_eq!(parse_freq_hz("13.375kHz").unwrap(), 13375.0);
    assert_abs_diff_eq!(parse_freq_hz("2.5e2 MHz").unwrap(), 250e6);
    assert_abs_diff_eq!(parse_freq_hz("50").unwrap(), 50.0);
}

#[test]
fn test_parse_bad_freqs() {
    assert_eq!(
        parse_freq("MHz"),
        Err(UnitParseError::GotUnitButCantParse {
            input: "MHz".to_string(),
            unit_type: "frequency"
        })
    );
    assert_eq!(
        parse_freq("1.2.3MHz"),
        Err(UnitParseError::GotUnitButCantParse {
            input: "1.2.3MHz".to_string(),
            unit_type: "frequency"
        })
    );
    assert_eq!(
        parse_freq("1THz"),
        Err(UnitParseError::Unknown {
            input: "1THz".to_string(),
            unit_type: "frequency"
        })
    );
    assert!(parse_freq("").is_err());
}

#[test]
fn test_parse_time() {
    for time_format in TimeFormat::iter() {
        let time_format_str: &'static str = time_format.into();
        let result = parse_time(&format!("0.5{}", time_format_str.to_lowercase()));
        assert!(result.is_ok(), "{:?}", result.unwrap_err());
        assert_eq!(result.unwrap(), (0.5, Some(time_format)));
    }
    assert_abs_diff_eq!(parse_time_s("50ms").unwrap(), 0.05, epsilon = 1e-12);
    assert_abs_diff_eq!(parse_time_s("10 s").unwrap(), 10.0);
    assert_abs_diff_eq!(parse_time_s("0.1").unwrap(), 0.1);
    assert!(matches!(
        parse_time_s("1 min"),
        Err(UnitParseError::Unknown { unit_type: "time", .. })
    ));
}
