// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Bit-flag inspection of packed flag words, e.g. the x-engine flags that
//! accompany every dump.

#[cfg(test)]
mod tests;

use std::collections::BTreeSet;

use itertools::Itertools;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};

use crate::report::Report;

/// Is `flag_bit` set in `packed`?
pub fn get_bit_flag(packed: u64, flag_bit: u32) -> bool {
    flag_bit < u64::BITS && packed & (1 << flag_bit) != 0
}

/// All of the bits set in `packed`. If `consider_bits` is supplied, only
/// those bits are reported.
pub fn get_set_bits(packed: u64, consider_bits: Option<&BTreeSet<u32>>) -> BTreeSet<u32> {
    let set_bits = (0..u64::BITS).filter(|&bit| get_bit_flag(packed, bit));
    match consider_bits {
        Some(consider) => set_bits.filter(|bit| consider.contains(bit)).collect(),
        None => set_bits.collect(),
    }
}

/// Flags set by the x-engines in the `flags_xeng_raw` word of each dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum XengFlag {
    /// Data corrupted somewhere in the data path.
    #[strum(serialize = "corruption")]
    Corruption,

    /// Overrange in the data path (ADC or FFT).
    #[strum(serialize = "overrange")]
    Overrange,

    /// The noise diode was on during the integration.
    #[strum(serialize = "noise diode")]
    NoiseDiode,
}

impl XengFlag {
    pub fn bit(self) -> u32 {
        match self {
            XengFlag::Corruption => 34,
            XengFlag::Overrange => 33,
            XengFlag::NoiseDiode => 32,
        }
    }

    /// The bits of every known x-engine flag.
    pub fn all_bits() -> BTreeSet<u32> {
        XengFlag::iter().map(XengFlag::bit).collect()
    }
}

/// Check the flag words of three dumps taken before, while, and after a
/// condition was toggled. `flag` must only be set in the `during` dump, and
/// no other known flag may be set in any of them.
pub fn check_flag_dumps(
    report: &mut Report,
    flag: XengFlag,
    condition: &str,
    before: u64,
    during: u64,
    after: u64,
) -> bool {
    let all_bits = XengFlag::all_bits();
    let flag_bit = flag.bit();
    let other_bits: BTreeSet<u32> = all_bits.iter().copied().filter(|&b| b != flag_bit).collect();
    let flag_descr = format!("{flag}, bit {flag_bit},");
    let other_descr = other_bits.iter().join(", ");

    let mut ok = true;
    for (i_dump, packed, expect_set, when) in [
        (1, before, false, "before setting"),
        (2, during, true, "while toggling"),
        (3, after, false, "after clearing"),
    ] {
        let set_bits = get_set_bits(packed, Some(&all_bits));
        let msg = if expect_set {
            format!("Check that {flag_descr} is set in dump {i_dump} {when} {condition}")
        } else {
            format!("Check that {flag_descr} is not set in dump {i_dump} {when} {condition}")
        };
        ok &= report.equals(&set_bits.contains(&flag_bit), &expect_set, msg);

        let other_set_bits: BTreeSet<u32> = set_bits.intersection(&other_bits).copied().collect();
        ok &= report.equals(
            &other_set_bits,
            &BTreeSet::new(),
            format!("Check that no other flag bits (any of {other_descr}) are set in dump {i_dump}"),
        );
    }
    ok
}
