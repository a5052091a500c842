// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Code to parse strings into plain numbers or some quantity with a unit.

mod error;
#[cfg(test)]
mod tests;

pub(crate) use error::*;

use strum::IntoEnumIterator;
use strum_macros::{EnumIter, EnumString, IntoStaticStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, EnumString, IntoStaticStr)]
#[allow(non_camel_case_types)]
pub(crate) enum FreqFormat {
    Hz,
    kHz,
    MHz,
    GHz,
}

impl FreqFormat {
    /// The number of Hz in one of this unit.
    pub(crate) fn to_hz(self) -> f64 {
        match self {
            FreqFormat::Hz => 1.0,
            FreqFormat::kHz => 1e3,
            FreqFormat::MHz => 1e6,
            FreqFormat::GHz => 1e9,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, EnumString, IntoStaticStr)]
pub(crate) enum TimeFormat {
    /// Seconds
    S,

    /// Milliseconds
    Ms,
}

impl TimeFormat {
    /// The number of seconds in one of this unit.
    pub(crate) fn to_seconds(self) -> f64 {
        match self {
            TimeFormat::S => 1.0,
            TimeFormat::Ms => 1e-3,
        }
    }
}

/// Split a string into its numerical part and any trailing unit. Exponents
/// ("1.5e6MHz") stay with the number.
fn split_unit(s: &str) -> (&str, &str) {
    let s = s.trim();
    let number = s.trim_end_matches(char::is_alphabetic).trim_end();
    let unit = s[number.len()..].trim();
    (number, unit)
}

/// Parse a string with a unit drawn from `U`. A naked number has no unit.
fn parse_with_unit<U>(s: &str, unit_type: &'static str) -> Result<(f64, Option<U>), UnitParseError>
where
    U: IntoEnumIterator + Into<&'static str> + Copy,
{
    // Try to parse a naked number.
    if let Ok(number) = s.trim().parse() {
        return Ok((number, None));
    }

    // That didn't work; let's search over our supported units.
    let (prefix, suffix) = split_unit(s);
    for unit in U::iter() {
        let unit_str: &'static str = unit.into();
        if suffix.to_uppercase() == unit_str.to_uppercase() {
            return match prefix.parse() {
                Ok(number) => Ok((number, Some(unit))),
                Err(_) => Err(UnitParseError::GotUnitButCantParse {
                    input: s.to_string(),
                    unit_type,
                }),
            };
        }
    }

    // If we made it this far, we don't know how to parse the string.
    Err(UnitParseError::Unknown {
        input: s.to_string(),
        unit_type,
    })
}

/// Parse a string that may have a unit of frequency attached to it.
pub(crate) fn parse_freq(s: &str) -> Result<(f64, Option<FreqFormat>), UnitParseError> {
    parse_with_unit(s, "frequency")
}

/// Parse a frequency into Hz. Naked numbers are taken to be Hz.
pub(crate) fn parse_freq_hz(s: &str) -> Result<f64, UnitParseError> {
    let (number, unit) = parse_freq(s)?;
    Ok(number * unit.map(FreqFormat::to_hz).unwrap_or(1.0))
}

/// Parse a string that may have a unit of time attached to it.
pub(crate) fn parse_time(s: &str) -> Result<(f64, Option<TimeFormat>), UnitParseError> {
    parse_with_unit(s, "time")
}

/// Parse a time into seconds. Naked numbers are taken to be seconds.
pub(crate) fn parse_time_s(s: &str) -> Result<f64, UnitParseError> {
    let (number, unit) = parse_time(s)?;
    Ok(number * unit.map(TimeFormat::to_seconds).unwrap_or(1.0))
}
